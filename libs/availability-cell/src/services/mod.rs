pub mod availability;
pub mod slots;
pub mod store;

pub use availability::AvailabilityService;
pub use slots::{SlotGenerator, Slots};
pub use store::{AvailabilityRepository, InMemoryAvailabilityRepository, SupabaseAvailabilityRepository};

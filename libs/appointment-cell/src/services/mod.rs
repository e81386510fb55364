pub mod booking;
pub mod conflict;
pub mod consistency;
pub mod lifecycle;
pub mod repository;
pub mod scheduling;

pub use booking::AppointmentBookingService;
pub use conflict::{BookingCandidate, ConflictDetector};
pub use consistency::SchedulingConsistencyService;
pub use lifecycle::AppointmentLifecycleService;
pub use repository::{
    AppointmentRepository, BookOutcome, InMemoryAppointmentRepository, StatusChange, SupabaseAppointmentRepository,
};
pub use scheduling::SlotService;

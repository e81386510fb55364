pub mod auth;
pub mod error;
pub mod range;

pub use auth::{CallerIdentity, CallerRole};
pub use error::AppError;
pub use range::DateRange;

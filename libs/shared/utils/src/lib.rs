pub mod deadline;
pub mod extractor;
pub mod test_utils;

pub use deadline::{within, DeadlineExceeded};
pub use extractor::identity_middleware;

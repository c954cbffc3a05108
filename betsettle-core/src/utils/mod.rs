pub mod retry;
pub mod timeout;

pub use retry::calculate_retry_delay;
pub use timeout::{TimedOut, with_timeout};

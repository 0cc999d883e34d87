pub mod completion;
pub mod config;
mod containment;
mod state;
pub mod throttler;

pub use completion::Completion;
pub use config::{ErrorObserver, ThrottleConfig, ThrottlerBuilder};
pub use throttler::Throttler;

#[derive(Debug, thiserror::Error)]
pub enum ThrottleError {
    #[error("wait window must be greater than zero")]
    ZeroWait,

    #[error("wait window was not configured")]
    MissingWait,
}

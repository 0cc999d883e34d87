//! # trailcrab
//!
//! An async throttler that runs a wrapped operation at most once per wait
//! window while guaranteeing that the latest request is eventually honored.
//!
//! ## Overview
//!
//! - The first request executes immediately.
//! - Requests made while the window is closed, or while an execution is in
//!   flight, collapse into a single **trailing execution** that uses the
//!   arguments of the last of them.
//! - The trailing execution never starts before the window reopens and never
//!   overlaps another execution.
//! - Operation failures never reach callers. They are reported to an optional
//!   error observer instead.
//!
//! ## Quick Start
//!
//! ```
//! use std::time::Duration;
//! use trailcrab::ThrottlerBuilder;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let search = ThrottlerBuilder::new()
//!     .wait(Duration::from_millis(200))
//!     .on_error(|e: &String| eprintln!("search failed: {e}"))
//!     .build(|query: String| async move { Ok::<_, String>(query.len()) })
//!     .unwrap();
//!
//! // Runs right away
//! let first = search.request("r".to_string());
//! // Both are throttled; only "rust" will be searched
//! let second = search.request("ru".to_string());
//! let third = search.request("rust".to_string());
//!
//! assert_eq!(first.await, Some(1));
//! assert_eq!(second.await, Some(4));
//! assert_eq!(third.await, Some(4));
//! assert_eq!(search.execution_count(), 2);
//! # }
//! ```
//!
//! ## Several arguments
//!
//! The operation takes a single argument; pass a tuple when more are needed.
//!
//! ```
//! use trailcrab::{ThrottleConfig, Throttler};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let save = Throttler::new(
//!     |(id, body): (u64, String)| async move { Ok::<_, std::io::Error>((id, body.len())) },
//!     ThrottleConfig::from_millis(500),
//! )
//! .unwrap();
//!
//! assert_eq!(save.request((7, "draft".to_string())).await, Some((7, 5)));
//! # }
//! ```

pub mod core;
pub mod metrics;

pub use crate::core::{
    Completion, ErrorObserver, ThrottleConfig, ThrottleError, Throttler, ThrottlerBuilder,
};
pub use metrics::{MetricsSnapshot, ThrottleMetrics};

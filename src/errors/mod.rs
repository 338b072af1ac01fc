//! Centralized error handling for m3u-curator
//!
//! Errors are grouped by the stage that raises them so that callers can
//! decide at which granularity to recover:
//!
//! - **Fetch errors**: download or staging failures, fatal to one source
//! - **Rule compilation errors**: bad filter/transformation pattern, fatal to one model
//! - **Record extraction / missing field errors**: fatal to one playlist record
//! - **Timestamp parse errors**: fatal to one programme element
//!
//! # Usage
//!
//! ```rust
//! use m3u_curator::errors::{AppError, AppResult};
//!
//! fn example_function() -> AppResult<String> {
//!     Err(AppError::configuration("no sources configured"))
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for fetch Results
pub type FetchResult<T> = Result<T, FetchError>;

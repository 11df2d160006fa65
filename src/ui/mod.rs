//! Presentation layer.
//!
//! - [`page`]: the server-rendered chat page
//! - [`wall`]: message wall bookkeeping, including reply timing

pub mod page;
pub mod wall;

pub use page::{MAX_MESSAGE_CHARS, render_page};
pub use wall::DurationTracker;

//! Small shared helpers.

pub mod time;

pub use time::{now_ms, stamp_or_now};

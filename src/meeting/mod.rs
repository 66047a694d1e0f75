//! Meeting domain types.

pub mod status;

pub use status::{MeetingStatus, Transition};

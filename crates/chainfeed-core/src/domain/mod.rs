//! Canonical domain model shared by providers, pipeline, and storage.

mod frame;
mod interval;
mod symbol;
mod timestamp;

pub use frame::Frame;
pub use interval::Interval;
pub use symbol::Symbol;
pub use timestamp::UtcDateTime;

//! Rule-pattern matching: zero-cost extraction before any model call.

pub mod library;
pub mod score;
pub mod segment;

pub use library::Matcher;
pub use score::{score_segment, CompiledPattern, SegmentScore};
pub use segment::{segment_document, Segment};

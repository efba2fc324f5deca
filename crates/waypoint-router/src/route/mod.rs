// Route pattern module
// Compiles declared route paths into typed segments and ranks them

pub mod parser;
pub mod pattern;

pub use parser::{RankKey, RoutePattern};
pub use pattern::{classify_segment, Segment, SegmentKind};

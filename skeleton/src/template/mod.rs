//! Template syntax: placeholders, paths, structural markers and loop regions.

pub mod marker;
pub mod path;
pub mod region;
pub mod scanner;

pub use marker::{Markable, Marker};
pub use path::{Path, PathSegment};
pub use region::{LoopRegion, MarkerError, Regions, Segment, detect};
pub use scanner::{Placeholder, Scanner, Token, scan};

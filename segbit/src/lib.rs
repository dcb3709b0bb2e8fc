pub mod geometry;
pub mod seg;

pub use geometry::Geometry;
pub use seg::SegBitVec;

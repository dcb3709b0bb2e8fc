pub mod bitwise;
pub mod word;

pub use bitwise::{BitLength, Bitwise, BitwiseMut};

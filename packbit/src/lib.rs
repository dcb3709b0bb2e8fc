pub mod bit;
pub use bit::{BitLength, Bitwise, BitwiseMut, word};
pub use bit::word::{WORD_BITS, Word};

pub mod copy;
pub use copy::{copy_bits, move_bits};

pub mod vec;
pub use vec::BitVec;

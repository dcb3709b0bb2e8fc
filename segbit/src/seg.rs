//! Segmented bit vectors: trees of flat vectors indexed by big integers.

use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::{ToPrimitive, Zero};

use crate::geometry::Geometry;
use packbit::{BitVec, WORD_BITS, Word};

/// A bit vector whose length and indices are arbitrary-precision integers.
///
/// Lengths at or below the configured leaf threshold are stored in a single
/// flat [`BitVec`]; longer vectors become a branch of same-shaped children
/// whose per-child capacity (the *fragment*) comes from a geometric ladder,
/// so both the branching factor and the tree depth stay bounded. Point and
/// short-range operations recurse into the one or two children they touch;
/// whole-vector operators map across children pairwise.
///
/// # Examples
///
/// ```
/// use num_bigint::BigUint;
/// use segbit::{Geometry, SegBitVec};
///
/// // A small geometry keeps the example tiny; the default leaf holds 2^20
/// // bits.
/// let geometry = Geometry::new(6, 2);
/// let mut v = SegBitVec::with_len_in(&BigUint::from(1000u32), geometry);
/// v.set(&BigUint::from(777u32), true);
/// assert!(v.get(&BigUint::from(777u32)));
/// assert_eq!(v.count_ones(), BigUint::from(1u32));
/// ```
///
/// A segmented vector does not support structural insertion or removal; it
/// is a fixed-length array family, resized only by rebuilding.
#[must_use]
#[derive(Clone, Debug)]
pub struct SegBitVec {
    geometry: Geometry,
    length: BigUint,
    node: Node,
    revision: u64,
}

/// Either one flat run of bits or an ordered sequence of same-shaped
/// subtrees. The two states are mutually exclusive by construction.
#[derive(Clone, Debug)]
enum Node {
    Leaf(BitVec),
    Branch {
        fragment: BigUint,
        children: Vec<SegBitVec>,
    },
}

const LEAF_ADDRESSING: &str = "leaf index exceeds native addressing";
const CHILD_ADDRESSING: &str = "branching factor exceeds native addressing";

impl SegBitVec {
    /// Creates an empty vector with the default geometry.
    pub fn new() -> SegBitVec {
        SegBitVec::with_len(&BigUint::zero())
    }

    /// Creates a vector of `len` zero bits with the default geometry.
    pub fn with_len(len: &BigUint) -> SegBitVec {
        SegBitVec::with_len_in(len, Geometry::default())
    }

    /// Creates a vector of `len` zero bits with the given geometry.
    pub fn with_len_in(len: &BigUint, geometry: Geometry) -> SegBitVec {
        SegBitVec::repeat_in(false, len, geometry)
    }

    /// Creates a vector of `len` copies of `bit` with the default geometry.
    pub fn repeat(bit: bool, len: &BigUint) -> SegBitVec {
        SegBitVec::repeat_in(bit, len, Geometry::default())
    }

    /// Creates a vector of `len` copies of `bit` with the given geometry.
    pub fn repeat_in(bit: bool, len: &BigUint, geometry: Geometry) -> SegBitVec {
        let vec = SegBitVec {
            geometry,
            length: len.clone(),
            node: Node::filled(bit, len, geometry),
            revision: 0,
        };
        vec.debug_validate();
        vec
    }

    /// Wraps a flat vector, reusing its buffer when it fits in one leaf.
    pub fn from_bit_vec(bits: BitVec) -> SegBitVec {
        SegBitVec::from_bit_vec_in(bits, Geometry::default())
    }

    /// Wraps a flat vector with the given geometry.
    pub fn from_bit_vec_in(bits: BitVec, geometry: Geometry) -> SegBitVec {
        let length = BigUint::from(bits.len());
        if bits.len() <= geometry.leaf_capacity() {
            let vec = SegBitVec {
                geometry,
                length,
                node: Node::Leaf(bits),
                revision: 0,
            };
            vec.debug_validate();
            return vec;
        }
        let mut vec = SegBitVec::with_len_in(&length, geometry);
        let mut index = 0;
        while index < bits.len() {
            let chunk = WORD_BITS.min(bits.len() - index);
            vec.set_word_inner(&BigUint::from(index), chunk, bits.get_word_range(index, chunk));
            index += chunk;
        }
        vec.debug_validate();
        vec
    }

    /// Creates a vector from whole words, least significant bit first.
    pub fn from_words(words: &[Word]) -> SegBitVec {
        SegBitVec::from_bit_vec(BitVec::from_words(words, words.len() * WORD_BITS))
    }

    /// Creates a vector from a slice of booleans.
    pub fn from_bools(bits: &[bool]) -> SegBitVec {
        SegBitVec::from_bit_vec(BitVec::from_bools(bits))
    }

    /// Length in bits.
    #[must_use]
    pub fn len(&self) -> &BigUint {
        &self.length
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.length.is_zero()
    }

    /// Geometry this vector was built with.
    #[must_use]
    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// Number of branch levels above the leaves.
    #[must_use]
    pub fn depth(&self) -> usize {
        match &self.node {
            Node::Leaf(_) => 0,
            // Every child but possibly the last is full, so the first child
            // is as deep as any.
            Node::Branch { children, .. } => 1 + children[0].depth(),
        }
    }

    /// Revision counter, bumped by every mutating operation on this vector.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Value of the bit at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    #[must_use]
    pub fn get(&self, index: &BigUint) -> bool {
        assert!(index < &self.length, "bit index out of bounds");
        match &self.node {
            Node::Leaf(bits) => bits.get(index.to_usize().expect(LEAF_ADDRESSING)),
            Node::Branch { fragment, children } => {
                let (child, within) = index.div_rem(fragment);
                children[child.to_usize().expect(CHILD_ADDRESSING)].get(&within)
            }
        }
    }

    /// Sets the bit at `index` to `bit`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn set(&mut self, index: &BigUint, bit: bool) {
        assert!(index < &self.length, "bit index out of bounds");
        self.set_inner(index, bit);
        self.changed();
    }

    fn set_inner(&mut self, index: &BigUint, bit: bool) {
        match &mut self.node {
            Node::Leaf(bits) => bits.set(index.to_usize().expect(LEAF_ADDRESSING), bit),
            Node::Branch { fragment, children } => {
                let (child, within) = index.div_rem(fragment);
                children[child.to_usize().expect(CHILD_ADDRESSING)].set_inner(&within, bit);
            }
        }
    }

    /// Inverts the bit at `index`.
    pub fn flip(&mut self, index: &BigUint) {
        let bit = self.get(index);
        self.set(index, !bit);
    }

    /// Up to one word's worth of bits starting at `index`, packed into the
    /// low bits of the result. A read straddling a child boundary is served
    /// as two partial reads combined by shifting.
    ///
    /// # Panics
    ///
    /// Panics if `len` exceeds the word width or the range is out of bounds.
    #[must_use]
    pub fn get_word_range(&self, index: &BigUint, len: usize) -> Word {
        assert!(len <= WORD_BITS, "a word range is at most one word wide");
        assert!(
            index + BigUint::from(len) <= self.length,
            "requested range reaches past the end of the vector"
        );
        if len == 0 {
            return 0;
        }
        self.word_range_inner(index, len)
    }

    fn word_range_inner(&self, index: &BigUint, len: usize) -> Word {
        match &self.node {
            Node::Leaf(bits) => bits.get_word_range(index.to_usize().expect(LEAF_ADDRESSING), len),
            Node::Branch { fragment, children } => {
                let (child, within) = index.div_rem(fragment);
                let child = child.to_usize().expect(CHILD_ADDRESSING);
                let available = &children[child].length - &within;
                if available >= BigUint::from(len) {
                    return children[child].word_range_inner(&within, len);
                }
                let first = available.to_usize().expect(LEAF_ADDRESSING);
                let low = children[child].word_range_inner(&within, first);
                let high = children[child + 1].word_range_inner(&BigUint::zero(), len - first);
                low | (high << first)
            }
        }
    }

    /// Writes the low `len` bits of `bits` at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `len` exceeds the word width or the range is out of bounds.
    pub fn set_word_range(&mut self, index: &BigUint, len: usize, bits: Word) {
        assert!(len <= WORD_BITS, "a word range is at most one word wide");
        assert!(
            index + BigUint::from(len) <= self.length,
            "written range reaches past the end of the vector"
        );
        if len == 0 {
            return;
        }
        self.set_word_inner(index, len, bits);
        self.changed();
    }

    fn set_word_inner(&mut self, index: &BigUint, len: usize, bits: Word) {
        match &mut self.node {
            Node::Leaf(leaf) => leaf.set_word_range(index.to_usize().expect(LEAF_ADDRESSING), len, bits),
            Node::Branch { fragment, children } => {
                let (child, within) = index.div_rem(fragment);
                let child = child.to_usize().expect(CHILD_ADDRESSING);
                let available = &children[child].length - &within;
                if available >= BigUint::from(len) {
                    children[child].set_word_inner(&within, len, bits);
                    return;
                }
                let first = available.to_usize().expect(LEAF_ADDRESSING);
                children[child].set_word_inner(&within, first, bits);
                children[child + 1].set_word_inner(&BigUint::zero(), len - first, bits >> first);
            }
        }
    }

    /// Sets the `len` bits starting at `index` to `bit`, recursing into the
    /// straddled children only.
    ///
    /// # Panics
    ///
    /// Panics if the range reaches past the end of the vector.
    pub fn fill_range(&mut self, bit: bool, index: &BigUint, len: &BigUint) {
        assert!(
            index + len <= self.length,
            "filled range reaches past the end of the vector"
        );
        if len.is_zero() {
            return;
        }
        self.fill_inner(bit, index, len);
        self.changed();
    }

    /// Sets the `len` bits starting at `index`.
    pub fn set_range(&mut self, index: &BigUint, len: &BigUint) {
        self.fill_range(true, index, len);
    }

    /// Clears the `len` bits starting at `index`.
    pub fn clear_range(&mut self, index: &BigUint, len: &BigUint) {
        self.fill_range(false, index, len);
    }

    fn fill_inner(&mut self, bit: bool, index: &BigUint, len: &BigUint) {
        match &mut self.node {
            Node::Leaf(bits) => bits.fill_range(
                bit,
                index.to_usize().expect(LEAF_ADDRESSING),
                len.to_usize().expect(LEAF_ADDRESSING),
            ),
            Node::Branch { fragment, children } => {
                let (first_child, within) = index.div_rem(fragment);
                let first_child = first_child.to_usize().expect(CHILD_ADDRESSING);
                let last_child = ((index + len - 1u32) / &*fragment)
                    .to_usize()
                    .expect(CHILD_ADDRESSING);
                if first_child == last_child {
                    children[first_child].fill_inner(bit, &within, len);
                    return;
                }
                let first_part = &*fragment - &within;
                children[first_child].fill_inner(bit, &within, &first_part);
                let mut done = first_part;
                let full = fragment.clone();
                for child in &mut children[first_child + 1..last_child] {
                    child.fill_inner(bit, &BigUint::zero(), &full);
                    done += &full;
                }
                children[last_child].fill_inner(bit, &BigUint::zero(), &(len - done));
            }
        }
    }

    /// Sets every bit to `bit`.
    pub fn set_all(&mut self, bit: bool) {
        self.for_each_leaf(&|bits| bits.set_all(bit));
        self.changed();
    }

    /// In-place bitwise AND with an equal-length vector.
    ///
    /// # Panics
    ///
    /// Panics if the operand lengths differ.
    pub fn and_assign(&mut self, other: &SegBitVec) {
        self.require_equal_length(other);
        self.combine(other, &|left, right| left.and_assign(right));
        self.changed();
    }

    /// In-place bitwise OR with an equal-length vector.
    ///
    /// # Panics
    ///
    /// Panics if the operand lengths differ.
    pub fn or_assign(&mut self, other: &SegBitVec) {
        self.require_equal_length(other);
        self.combine(other, &|left, right| left.or_assign(right));
        self.changed();
    }

    /// In-place bitwise XOR with an equal-length vector.
    ///
    /// # Panics
    ///
    /// Panics if the operand lengths differ.
    pub fn xor_assign(&mut self, other: &SegBitVec) {
        self.require_equal_length(other);
        self.combine(other, &|left, right| left.xor_assign(right));
        self.changed();
    }

    /// In-place bitwise NOT.
    pub fn not_assign(&mut self) {
        self.for_each_leaf(&|bits| bits.not_assign());
        self.changed();
    }

    fn require_equal_length(&self, other: &SegBitVec) {
        assert_eq!(
            self.length, other.length,
            "bitwise operations require operands of equal length"
        );
    }

    /// Maps an operation pairwise over the leaves of two equal-shape trees.
    /// Equal lengths with differing structure indicate a corrupted tree.
    fn combine(&mut self, other: &SegBitVec, op: &impl Fn(&mut BitVec, &BitVec)) {
        match (&mut self.node, &other.node) {
            (Node::Leaf(left), Node::Leaf(right)) => op(left, right),
            (
                Node::Branch { fragment, children },
                Node::Branch {
                    fragment: other_fragment,
                    children: other_children,
                },
            ) if *fragment == *other_fragment && children.len() == other_children.len() => {
                for (left, right) in children.iter_mut().zip(other_children) {
                    left.combine(right, op);
                }
            }
            _ => panic!("equal-length segmented vectors with mismatched structure"),
        }
    }

    fn for_each_leaf(&mut self, op: &impl Fn(&mut BitVec)) {
        match &mut self.node {
            Node::Leaf(bits) => op(bits),
            Node::Branch { children, .. } => {
                for child in children {
                    child.for_each_leaf(op);
                }
            }
        }
    }

    /// Copies `len` bits of `src` starting at `src_index` over the bits of
    /// `self` starting at `dst_index`, chunked at word grain.
    ///
    /// # Panics
    ///
    /// Panics if either vector is empty or either range is out of bounds.
    pub fn copy_range_from(&mut self, src: &SegBitVec, src_index: &BigUint, dst_index: &BigUint, len: &BigUint) {
        assert!(!src.is_empty(), "source vector must not be empty");
        assert!(!self.is_empty(), "destination vector must not be empty");
        assert!(
            src_index + len <= src.length,
            "source range reaches past the end of the source vector"
        );
        assert!(
            dst_index + len <= self.length,
            "destination range reaches past the end of the vector"
        );
        let word = BigUint::from(WORD_BITS);
        let mut copied = BigUint::zero();
        while &copied < len {
            let remaining = len - &copied;
            let chunk = if remaining >= word {
                WORD_BITS
            } else {
                remaining.to_usize().expect(LEAF_ADDRESSING)
            };
            let bits = src.word_range_inner(&(src_index + &copied), chunk);
            self.set_word_inner(&(dst_index + &copied), chunk, bits);
            copied += chunk;
        }
        self.changed();
    }

    /// Number of set bits.
    #[must_use]
    pub fn count_ones(&self) -> BigUint {
        match &self.node {
            Node::Leaf(bits) => BigUint::from(bits.count_ones()),
            Node::Branch { children, .. } => children.iter().map(SegBitVec::count_ones).sum(),
        }
    }

    /// The vector's bits as words, least significant bit first.
    ///
    /// # Panics
    ///
    /// Panics if the flattened buffer would exceed native addressing.
    #[must_use]
    pub fn flatten(&self) -> Vec<Word> {
        let words = self
            .length
            .div_ceil(&BigUint::from(WORD_BITS))
            .to_usize()
            .expect("flattened vector exceeds native addressing");
        let mut out = Vec::with_capacity(words);
        self.flatten_into(&mut out);
        out
    }

    // Children of a branch always hold whole-word multiples except the very
    // last leaf of the tree, so concatenating per-child words is exact.
    fn flatten_into(&self, out: &mut Vec<Word>) {
        match &self.node {
            Node::Leaf(bits) => out.extend_from_slice(bits.as_words()),
            Node::Branch { children, .. } => {
                for child in children {
                    child.flatten_into(out);
                }
            }
        }
    }

    /// The whole vector as one flat [`BitVec`].
    ///
    /// # Panics
    ///
    /// Panics if the length exceeds native addressing.
    #[must_use]
    pub fn to_bit_vec(&self) -> BitVec {
        let length = self
            .length
            .to_usize()
            .expect("flattened vector exceeds native addressing");
        BitVec::from_words(&self.flatten(), length)
    }

    fn changed(&mut self) {
        self.revision += 1;
    }

    fn debug_validate(&self) {
        #[cfg(debug_assertions)]
        self.validate();
    }

    /// Structural consistency: children lengths sum to the node length and
    /// every child but the last fills its fragment.
    #[cfg(debug_assertions)]
    fn validate(&self) {
        match &self.node {
            Node::Leaf(bits) => {
                debug_assert_eq!(BigUint::from(bits.len()), self.length);
                debug_assert!(bits.len() <= self.geometry.leaf_capacity());
            }
            Node::Branch { fragment, children } => {
                debug_assert!(!children.is_empty());
                let mut sum = BigUint::zero();
                for (position, child) in children.iter().enumerate() {
                    if position + 1 < children.len() {
                        debug_assert_eq!(child.length, *fragment);
                    }
                    sum += &child.length;
                    child.validate();
                }
                debug_assert_eq!(sum, self.length);
            }
        }
    }
}

impl Node {
    /// Representation for `len` bits: a flat leaf at or below the leaf
    /// threshold, otherwise a branch of ladder-sized children.
    fn filled(bit: bool, len: &BigUint, geometry: Geometry) -> Node {
        if *len <= BigUint::from(geometry.leaf_capacity()) {
            return Node::Leaf(BitVec::repeat(bit, len.to_usize().expect(LEAF_ADDRESSING)));
        }
        let fragment = geometry.fragment_for(len);
        let (full, remainder) = len.div_rem(&fragment);
        let full = full.to_usize().expect(CHILD_ADDRESSING);
        let mut children = Vec::with_capacity(full + usize::from(!remainder.is_zero()));
        for _ in 0..full {
            children.push(SegBitVec {
                geometry,
                length: fragment.clone(),
                node: Node::filled(bit, &fragment, geometry),
                revision: 0,
            });
        }
        if !remainder.is_zero() {
            children.push(SegBitVec {
                geometry,
                length: remainder.clone(),
                node: Node::filled(bit, &remainder, geometry),
                revision: 0,
            });
        }
        Node::Branch { fragment, children }
    }
}

impl Default for SegBitVec {
    fn default() -> Self {
        SegBitVec::new()
    }
}

impl PartialEq for SegBitVec {
    /// Bit-for-bit equality, independent of tree structure or geometry.
    fn eq(&self, other: &Self) -> bool {
        if self.length != other.length {
            return false;
        }
        let word = BigUint::from(WORD_BITS);
        let mut compared = BigUint::zero();
        while compared < self.length {
            let remaining = &self.length - &compared;
            let chunk = if remaining >= word {
                WORD_BITS
            } else {
                remaining.to_usize().expect(LEAF_ADDRESSING)
            };
            if self.word_range_inner(&compared, chunk) != other.word_range_inner(&compared, chunk) {
                return false;
            }
            compared += chunk;
        }
        true
    }
}

impl Eq for SegBitVec {}

impl From<BitVec> for SegBitVec {
    fn from(bits: BitVec) -> Self {
        SegBitVec::from_bit_vec(bits)
    }
}

impl From<&SegBitVec> for BitVec {
    fn from(vec: &SegBitVec) -> Self {
        vec.to_bit_vec()
    }
}

impl FromIterator<bool> for SegBitVec {
    fn from_iter<Iterator: IntoIterator<Item = bool>>(iterator: Iterator) -> Self {
        SegBitVec::from_bit_vec(iterator.into_iter().collect())
    }
}

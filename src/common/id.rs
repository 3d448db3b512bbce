//! Node identifier and XOR distance metric.

use std::fmt::{self, Debug, Formatter};

/// The size of identifiers in bytes.
///
/// The configured bit-width `m` of a run may be anything up to
/// [MAX_BITS]; identifiers then occupy the low `m` bits.
pub const ID_SIZE: usize = 32;

/// The largest supported identifier space in bits.
pub const MAX_BITS: usize = ID_SIZE * 8;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
/// Node Id or a lookup target, a big-endian integer in `[0, 2^m - 1]`.
pub struct Id(pub [u8; ID_SIZE]);

impl Id {
    /// Create an Id from a small integer, useful for explicit identities
    /// in tests and synthetic bucket-refresh targets.
    pub fn from_u64(value: u64) -> Id {
        let mut bytes = [0u8; ID_SIZE];
        bytes[ID_SIZE - 8..].copy_from_slice(&value.to_be_bytes());

        Id(bytes)
    }

    /// `2^bit`, the lower bound of bucket `bit`'s distance range.
    ///
    /// `bit` must be below [MAX_BITS]; `2^256` does not fit.
    pub fn pow2(bit: usize) -> Id {
        debug_assert!(bit < MAX_BITS, "2^{} exceeds the identifier space", bit);

        let mut bytes = [0u8; ID_SIZE];
        bytes[ID_SIZE - 1 - (bit / 8)] = 1 << (bit % 8);

        Id(bytes)
    }

    /// `2^bits - 1`, the largest value representable in `bits` bits,
    /// for `bits` up to [MAX_BITS].
    pub fn max_for_bits(bits: usize) -> Id {
        debug_assert!(bits <= MAX_BITS, "{} bits exceed the identifier space", bits);

        let mut bytes = [0u8; ID_SIZE];

        for i in 0..bits {
            bytes[ID_SIZE - 1 - (i / 8)] |= 1 << (i % 8);
        }

        Id(bytes)
    }

    /// XOR distance between this Id and a target Id.
    ///
    /// Symmetric, and zero exactly for the distance to self. Not a true
    /// metric (no triangle inequality), but its prefix-matching property
    /// is all the bucket scheme relies on.
    pub fn xor(&self, other: &Id) -> Distance {
        let mut bytes = [0u8; ID_SIZE];

        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = self.0[i] ^ other.0[i];
        }

        Distance(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ID_SIZE] {
        &self.0
    }
}

impl Debug for Id {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Id({:x?})", &self.0)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
/// XOR distance between two [Id]s, ordered numerically.
pub struct Distance(pub(crate) [u8; ID_SIZE]);

impl Distance {
    pub const ZERO: Distance = Distance([0; ID_SIZE]);
    pub const MAX: Distance = Distance([0xff; ID_SIZE]);

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|byte| *byte == 0)
    }

    /// The position of the highest set bit, i.e. `floor(log2(d)) + 1`.
    ///
    /// Zero for the zero distance. A nonzero distance `d` belongs in
    /// bucket `bit_length() - 1`.
    pub fn bit_length(&self) -> usize {
        for (i, byte) in self.0.iter().enumerate() {
            if *byte != 0 {
                return (ID_SIZE - i) * 8 - byte.leading_zeros() as usize;
            }
        }

        0
    }
}

impl Debug for Distance {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Distance({:x?})", &self.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn distance_to_self_is_zero() {
        let id = Id::from_u64(42);

        assert!(id.xor(&id).is_zero());
        assert_eq!(id.xor(&id).bit_length(), 0);
    }

    #[test]
    fn distance_is_symmetric() {
        let a = Id::from_u64(0b1010);
        let b = Id::from_u64(0b0110);

        assert_eq!(a.xor(&b), b.xor(&a));
        assert_eq!(a.xor(&b), Id::from_u64(0b1100).xor(&Id::from_u64(0)));
    }

    #[test]
    fn bit_length() {
        assert_eq!(Id::from_u64(0).xor(&Id::from_u64(1)).bit_length(), 1);
        assert_eq!(Id::from_u64(0).xor(&Id::from_u64(9)).bit_length(), 4);
        assert_eq!(Id::from_u64(5).xor(&Id::from_u64(2)).bit_length(), 3);

        let furthest = Id::max_for_bits(MAX_BITS);
        assert_eq!(Id::from_u64(0).xor(&furthest).bit_length(), MAX_BITS);
    }

    #[test]
    fn pow2_and_max_for_bits() {
        assert_eq!(Id::pow2(0), Id::from_u64(1));
        assert_eq!(Id::pow2(3), Id::from_u64(8));
        assert_eq!(Id::pow2(16), Id::from_u64(1 << 16));

        assert_eq!(Id::max_for_bits(4), Id::from_u64(15));
        assert_eq!(Id::max_for_bits(9), Id::from_u64(511));
    }

    #[test]
    #[should_panic(expected = "exceeds the identifier space")]
    fn pow2_rejects_bits_outside_the_space() {
        Id::pow2(MAX_BITS);
    }

    #[test]
    fn ordering_is_numeric() {
        let zero = Id::from_u64(0);

        let mut distances = vec![
            zero.xor(&Id::from_u64(300)),
            zero.xor(&Id::from_u64(2)),
            zero.xor(&Id::from_u64(70_000)),
            zero.xor(&Id::from_u64(15)),
        ];
        distances.sort();

        let lengths: Vec<usize> = distances.iter().map(|d| d.bit_length()).collect();
        assert_eq!(lengths, vec![2, 4, 9, 17]);
    }
}

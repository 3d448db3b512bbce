//! Issuer of unique random identifiers, uniform over the whole space or
//! over an arbitrary sub-range such as a bucket's distance range.

use std::collections::HashSet;

use rand::Rng;

use crate::common::{Id, ID_SIZE};
use crate::Config;

/// One identifier namespace for one run.
///
/// Passed explicitly to whoever creates nodes, instead of living in
/// global state, so concurrent independent runs compose.
///
/// Generation recovers from collisions by resampling. If the caller asks
/// for more unique values than the range holds, generation never
/// terminates; [Config::new](crate::Config::new) rejects such runs up
/// front.
#[derive(Debug)]
pub struct IdGenerator {
    config: Config,
    issued: HashSet<Id>,
}

impl IdGenerator {
    pub fn new(config: Config) -> Self {
        IdGenerator {
            config,
            issued: HashSet::new(),
        }
    }

    pub fn config(&self) -> Config {
        self.config
    }

    /// The number of identifiers issued so far.
    pub fn issued_count(&self) -> usize {
        self.issued.len()
    }

    // === Public Methods ===

    /// Draw a value uniformly from `[0, 2^m - 1]`, resampling until it is
    /// distinct from every identifier issued before, then record it.
    pub fn generate(&mut self) -> Id {
        let high = Id::max_for_bits(self.config.m);

        loop {
            let id = random_in_range(&Id::from_u64(0), &high);

            if self.issued.insert(id) {
                return id;
            }
        }
    }

    /// Draw a value uniformly from `[low, high]` that collides with no
    /// issued identifier, without recording it as issued.
    ///
    /// Used to synthesize lookup targets that are guaranteed to fall in a
    /// given range without claiming them as node identities.
    pub fn unique_in_range(&self, low: Id, high: Id) -> Id {
        loop {
            let id = random_in_range(&low, &high);

            if !self.issued.contains(&id) {
                return id;
            }
        }
    }

    /// A fresh lookup target inside bucket `bucket_index`'s distance
    /// range `[2^i, 2^(i+1) - 1]`, for bucket-refresh lookups.
    ///
    /// `bucket_index` must be one of the run's `m` bucket indices.
    pub fn random_in_bucket(&self, bucket_index: usize) -> Id {
        debug_assert!(
            bucket_index < self.config.m,
            "bucket {} is outside the configured table",
            bucket_index
        );

        self.unique_in_range(Id::pow2(bucket_index), Id::max_for_bits(bucket_index + 1))
    }
}

/// Uniform sample from `[low, high]`.
fn random_in_range(low: &Id, high: &Id) -> Id {
    let (low, high) = if low > high { (high, low) } else { (low, high) };

    let width = sub(high.as_bytes(), low.as_bytes());

    Id(add(low.as_bytes(), &random_up_to(&width)))
}

/// Uniform sample from `[0, max]` over big-endian byte arrays.
///
/// Masks the most significant nonzero byte down to the bit length of
/// `max` before the rejection test, so a draw is rejected at most ~50% of
/// the time instead of the near-certain rejection of sampling the next
/// power of 256.
fn random_up_to(max: &[u8; ID_SIZE]) -> [u8; ID_SIZE] {
    let first = match max.iter().position(|byte| *byte != 0) {
        Some(index) => index,
        None => return [0; ID_SIZE],
    };

    let mask = 0xffu8 >> max[first].leading_zeros();

    let mut rng = rand::thread_rng();
    let mut bytes = [0u8; ID_SIZE];

    loop {
        rng.fill(&mut bytes[first..]);
        bytes[first] &= mask;

        if &bytes <= max {
            return bytes;
        }
    }
}

/// `a - b`, assuming `a >= b`.
fn sub(a: &[u8; ID_SIZE], b: &[u8; ID_SIZE]) -> [u8; ID_SIZE] {
    let mut out = [0u8; ID_SIZE];
    let mut borrow = 0i16;

    for i in (0..ID_SIZE).rev() {
        let mut diff = a[i] as i16 - b[i] as i16 - borrow;

        if diff < 0 {
            diff += 256;
            borrow = 1;
        } else {
            borrow = 0;
        }

        out[i] = diff as u8;
    }

    out
}

/// `a + b`, which the callers keep below `2^256`.
fn add(a: &[u8; ID_SIZE], b: &[u8; ID_SIZE]) -> [u8; ID_SIZE] {
    let mut out = [0u8; ID_SIZE];
    let mut carry = 0u16;

    for i in (0..ID_SIZE).rev() {
        let sum = a[i] as u16 + b[i] as u16 + carry;

        out[i] = sum as u8;
        carry = sum >> 8;
    }

    out
}

#[cfg(test)]
mod test {
    use super::*;

    fn config(n: u64, m: usize) -> Config {
        Config::new(n, m, 2, 1).expect("valid test config")
    }

    #[test]
    fn generates_unique_ids_within_space() {
        let mut generator = IdGenerator::new(config(100, 8));
        let limit = Id::max_for_bits(8);

        let mut seen = HashSet::new();

        for _ in 0..100 {
            let id = generator.generate();

            assert!(id <= limit);
            assert!(seen.insert(id), "generator issued {:?} twice", id);
        }

        assert_eq!(generator.issued_count(), 100);
    }

    #[test]
    fn unique_in_range_respects_bounds_and_issued_set() {
        let mut generator = IdGenerator::new(config(6, 4));

        for _ in 0..6 {
            generator.generate();
        }

        let low = Id::pow2(3);
        let high = Id::max_for_bits(4);

        for _ in 0..50 {
            let id = generator.unique_in_range(low, high);

            assert!(id >= low && id <= high);
            assert!(!generator.issued.contains(&id));
        }
    }

    #[test]
    fn random_in_bucket_falls_in_bucket_range() {
        let generator = IdGenerator::new(config(4, 8));

        for bucket_index in 0..8 {
            let id = generator.random_in_bucket(bucket_index);

            assert!(id >= Id::pow2(bucket_index));
            assert!(id <= Id::max_for_bits(bucket_index + 1));
        }
    }

    #[test]
    #[should_panic(expected = "outside the configured table")]
    fn random_in_bucket_rejects_out_of_table_index() {
        let generator = IdGenerator::new(config(4, 8));

        generator.random_in_bucket(8);
    }

    #[test]
    fn degenerate_range_returns_its_only_value() {
        let generator = IdGenerator::new(config(1, 8));
        let five = Id::from_u64(5);

        assert_eq!(generator.unique_in_range(five, five), five);
    }

    #[test]
    fn byte_array_arithmetic_carries() {
        let a = Id::from_u64(0x1_00).as_bytes().to_owned();
        let b = Id::from_u64(0x01).as_bytes().to_owned();

        assert_eq!(sub(&a, &b), *Id::from_u64(0xff).as_bytes());
        assert_eq!(add(&a, &b), *Id::from_u64(0x101).as_bytes());

        // Carry across the u64 boundary: u64::MAX + 1 = 2^64.
        let max = Id::from_u64(u64::MAX).as_bytes().to_owned();
        assert_eq!(Id(add(&max, &b)), Id::pow2(64));
    }
}

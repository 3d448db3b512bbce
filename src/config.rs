//! Routing parameters shared by every node in a run.

use crate::common::MAX_BITS;
use crate::{Error, Result};

/// K = the default maximum size of a k-bucket, and of a lookup result.
pub const MAX_BUCKET_SIZE_K: usize = 20;

/// Alpha = the default number of peers queried concurrently per lookup round.
pub const DEFAULT_ALPHA: usize = 3;

/// The default bit-width of the identifier space.
pub const DEFAULT_BIT_WIDTH: usize = 160;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Process-wide routing parameters.
///
/// Fixed before any [Node](crate::Node) is constructed and copied into
/// every node and routing table created for a run, so independent runs
/// with different parameters compose.
pub struct Config {
    /// Number of nodes the caller intends to create. Only used to verify
    /// the identifier space is large enough; the harness owns the actual
    /// node registry.
    pub n: u64,
    /// Bit-width of the identifier space, and the number of buckets in
    /// every routing table.
    pub m: usize,
    /// Bucket capacity and lookup result-set size.
    pub k: usize,
    /// Lookup fan-out: peers queried concurrently per round.
    pub alpha: usize,
}

impl Config {
    /// Validate a set of routing parameters.
    ///
    /// Returns [Error::IdentifierSpaceTooSmall] if `2^m - 1 < n`, since a
    /// run with more nodes than identifiers would loop forever generating
    /// a unique identity.
    pub fn new(n: u64, m: usize, k: usize, alpha: usize) -> Result<Config> {
        if m == 0 || m > MAX_BITS {
            return Err(Error::InvalidConfig("m must be in 1..=256"));
        }
        if k == 0 {
            return Err(Error::InvalidConfig("k must be at least 1"));
        }
        if alpha == 0 {
            return Err(Error::InvalidConfig("alpha must be at least 1"));
        }

        if m < 64 && (1u64 << m) - 1 < n {
            return Err(Error::IdentifierSpaceTooSmall { m, n });
        }

        Ok(Config { n, m, k, alpha })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            n: 1024,
            m: DEFAULT_BIT_WIDTH,
            k: MAX_BUCKET_SIZE_K,
            alpha: DEFAULT_ALPHA,
        }
    }
}

//! Main Crate Error

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// Kadroute crate error enum.
pub enum Error {
    /// The configured identifier space cannot hold the requested number
    /// of unique node identities. Rejected before any node is created.
    #[error("identifier space of {m} bits cannot hold {n} unique nodes")]
    IdentifierSpaceTooSmall { m: usize, n: u64 },

    /// A routing parameter is outside its supported range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    /// A peer's XOR distance does not fall into any of the `m` configured
    /// bucket ranges. Signals a routing-table invariant violation and is
    /// fatal, unlike an empty lookup result.
    #[error("distance of {bits} bits does not fit in any of {m} buckets")]
    BucketIndexOutOfRange { bits: usize, m: usize },
}

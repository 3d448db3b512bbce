#![doc = include_str!("../README.md")]

mod closest_nodes;
mod common;
mod config;
mod error;
mod id_generator;
mod lookup;

pub use crate::closest_nodes::ClosestNodes;
pub use crate::common::{
    Distance, FindNodeResponse, Id, KBucket, Node, Peer, RoutingTable, ID_SIZE, MAX_BITS,
};
pub use crate::config::{Config, DEFAULT_ALPHA, DEFAULT_BIT_WIDTH, MAX_BUCKET_SIZE_K};
pub use crate::error::{Error, Result};
pub use crate::id_generator::IdGenerator;

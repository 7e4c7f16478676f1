pub mod node;
pub mod ring;
pub mod config;
pub mod data_store;
pub mod error;
pub mod remote;
pub mod retry;

pub use node::*;
pub use config::*;
pub use error::*;

use std::{
	collections::hash_map::DefaultHasher,
	hash::{Hash, Hasher}
};
use ring::Ring;

pub fn calculate_hash(data: &[u8]) -> u64 {
	let mut hasher = DefaultHasher::new();
	data.hash(&mut hasher);
	hasher.finish()
}

/// Build a peer handle from its address, deriving the identifier from
/// the address hash.
pub fn construct_node(addr: &str, ring: Ring) -> Node {
	Node {
		id: ring.identifier(addr.as_bytes()),
		addr: addr.to_string()
	}
}

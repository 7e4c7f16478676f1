#![allow(dead_code)]

use chord_ring::core::{
	ring::Ring,
	Config,
	Node,
	NodeServer
};
use rand::Rng;

/// Small ring with the background tasks disabled; tests drive the
/// maintenance passes by hand.
pub fn test_config() -> Config {
	Config {
		ring_bits: 7,
		stabilize_interval: 0,
		fix_finger_interval: 0,
		update_successors_interval: 0,
		migrate_interval: 0,
		..Config::default()
	}
}

pub fn node(id: u64, port: u16) -> Node {
	Node {
		id,
		addr: format!("127.0.0.1:{}", port)
	}
}

pub async fn fix_all_fingers(server: &NodeServer) {
	for i in 1..server.ring().bits() {
		server.fix_finger(i).await.unwrap();
	}
}

/// Run enough stabilize rounds for the pointers to settle, then
/// refresh fingers and successor lists everywhere.
pub async fn converge(servers: &[&NodeServer]) {
	for _ in 0..servers.len() + 1 {
		for server in servers.iter().rev() {
			server.stabilize().await.unwrap();
		}
	}
	for server in servers {
		fix_all_fingers(server).await;
	}
	for _ in 0..servers.len() {
		for server in servers {
			server.update_successor_list().await.unwrap();
		}
	}
}

/// Generate a key whose digest lands in (start, end]
pub fn key_owned_by<T: Rng>(ring: Ring, rng: &mut T, start: u64, end: u64) -> String {
	loop {
		let key = format!("key-{:08x}", rng.gen::<u32>());
		if ring.in_range(ring.identifier(key.as_bytes()), start + 1, end + 1) {
			return key;
		}
	}
}

use chord_ring::core::{
	self,
	config::*,
	ring::Ring,
	NodeServer,
	Node
};
use clap::Parser;

#[derive(Parser)]
struct Args {
	/// Local addr to bind (<host>:<port>)
	addr: String,

	/// Join an existing node on init (<host>:<port>)
	#[clap(short, long)]
	join: Option<String>,

	/// Ring exponent m (identifier space of size 2^m)
	#[clap(short = 'm', long, default_value_t = 32)]
	ring_bits: u8,

	/// Successor list length, counting the immediate successor
	#[clap(short, long, default_value_t = 4)]
	successors: usize
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	env_logger::init();
	let args = Args::parse();

	let config = Config {
		ring_bits: args.ring_bits,
		num_successors: args.successors,
		..Config::default()
	};
	let ring = Ring::new(config.ring_bits);
	let node = core::construct_node(&args.addr, ring);
	let join_node: Option<Node> = args.join.as_ref()
		.map(|n| core::construct_node(n, ring));

	let s = NodeServer::new(node, config);
	let manager = s.start(join_node).await?;
	manager.wait().await?;
	Ok(())
}

// Sequential joins repaired by the stabilize/notify protocol
use chord_ring::{
	core::NodeServer,
	client::setup_client
};
use tarpc::context;

mod common;
use common::*;

#[tokio::test]
async fn sequential_joins_converge() -> anyhow::Result<()> {
	let _ = env_logger::builder().is_test(true).try_init();
	let config = test_config();
	let n0 = node(0, 9801);
	let n32 = node(32, 9802);
	let n64 = node(64, 9803);
	let n96 = node(96, 9804);

	let s0 = NodeServer::new(n0.clone(), config.clone());
	let m0 = s0.start(None).await?;
	s0.stabilize().await?;
	// singleton ring points at itself
	assert_eq!(s0.get_predecessor().unwrap().id, 0);
	assert_eq!(s0.successor().await?.id, 0);

	// node 32 joins via node 0
	let s32 = NodeServer::new(n32.clone(), config.clone());
	let m32 = s32.start(Some(n0.clone())).await?;
	assert_eq!(s32.successor().await?.id, 0);

	// stabilize the joiner first so it announces itself
	s32.stabilize().await?;
	assert_eq!(s0.get_predecessor().unwrap().id, 32);
	s0.stabilize().await?;
	assert_eq!(s0.successor().await?.id, 32);
	assert_eq!(s32.get_predecessor().unwrap().id, 0);

	// node 64 joins via node 32
	let s64 = NodeServer::new(n64.clone(), config.clone());
	let m64 = s64.start(Some(n32.clone())).await?;
	assert_eq!(s64.successor().await?.id, 0);
	s64.stabilize().await?;
	s32.stabilize().await?;
	s0.stabilize().await?;
	assert_eq!(s0.get_predecessor().unwrap().id, 64);
	assert_eq!(s32.get_predecessor().unwrap().id, 0);
	assert_eq!(s64.get_predecessor().unwrap().id, 32);
	assert_eq!(s32.successor().await?.id, 64);

	// node 96 joins via node 0
	let s96 = NodeServer::new(n96.clone(), config.clone());
	let m96 = s96.start(Some(n0.clone())).await?;
	s96.stabilize().await?;
	s64.stabilize().await?;
	s32.stabilize().await?;
	s0.stabilize().await?;

	assert_eq!(s0.get_predecessor().unwrap().id, 96);
	assert_eq!(s32.get_predecessor().unwrap().id, 0);
	assert_eq!(s64.get_predecessor().unwrap().id, 32);
	assert_eq!(s96.get_predecessor().unwrap().id, 64);
	assert_eq!(s0.successor().await?.id, 32);
	assert_eq!(s32.successor().await?.id, 64);
	assert_eq!(s64.successor().await?.id, 96);
	assert_eq!(s96.successor().await?.id, 0);

	// successor lists propagate transitively from the successor
	for _ in 0..3 {
		for s in [&s0, &s32, &s64, &s96] {
			s.update_successor_list().await?;
		}
	}
	let ids: Vec<u64> = s0.get_successor_list().iter().map(|n| n.id).collect();
	assert_eq!(ids, vec![32, 64, 96]);

	// the same answers over the wire
	fix_all_fingers(&s0).await;
	let c0 = setup_client(&n0.addr).await?;
	assert_eq!(c0.get_successor_rpc(context::current()).await?.unwrap().id, 32);
	assert_eq!(c0.find_successor_rpc(context::current(), 70).await?.unwrap().id, 96);
	assert_eq!(c0.get_successor_list_rpc(context::current()).await?.len(), 3);

	m0.stop().await?;
	m32.stop().await?;
	m64.stop().await?;
	m96.stop().await?;
	Ok(())
}

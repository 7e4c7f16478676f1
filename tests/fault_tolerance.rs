// Failure of the immediate successor is absorbed by the successor list
use chord_ring::core::NodeServer;

mod common;
use common::*;

#[tokio::test]
async fn successor_list_survives_successor_failure() -> anyhow::Result<()> {
	let _ = env_logger::builder().is_test(true).try_init();
	let config = test_config();
	let n10 = node(10, 10201);
	let n40 = node(40, 10202);
	let n90 = node(90, 10203);

	let s10 = NodeServer::new(n10.clone(), config.clone());
	let m10 = s10.start(None).await?;
	let s40 = NodeServer::new(n40.clone(), config.clone());
	let m40 = s40.start(Some(n10.clone())).await?;
	let s90 = NodeServer::new(n90.clone(), config.clone());
	let m90 = s90.start(Some(n10.clone())).await?;

	converge(&[&s10, &s40, &s90]).await;

	assert_eq!(s10.successor().await?.id, 40);
	let ids: Vec<u64> = s10.get_successor_list().iter().map(|n| n.id).collect();
	assert_eq!(&ids[..2], &[40, 90]);

	// kill the immediate successor
	m40.stop().await?;

	// the next live list entry takes over without manual repair
	assert_eq!(s10.successor().await?.id, 90);

	// one stabilize cycle heals the ring of two
	s10.stabilize().await?;
	s90.stabilize().await?;
	assert_eq!(s10.successor().await?.id, 90);
	assert_eq!(s90.successor().await?.id, 10);
	assert_eq!(s90.get_predecessor().unwrap().id, 10);
	assert_eq!(s10.get_predecessor().unwrap().id, 90);

	// the dead peer drains out of the successor lists
	for _ in 0..2 {
		s10.update_successor_list().await?;
		s90.update_successor_list().await?;
	}
	let ids: Vec<u64> = s10.get_successor_list().iter().map(|n| n.id).collect();
	assert_eq!(ids[0], 90);
	assert!(!ids.contains(&40));

	m10.stop().await?;
	m90.stop().await?;
	Ok(())
}

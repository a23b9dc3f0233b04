use std::sync::Arc;

use rp_config::DatasetMode;
use rp_domain::dataset::Snapshot;
use rp_storage::{
	Error,
	dataset::{DatasetError, DatasetProvider},
};
use rp_testkit::TestDir;

fn local_cfg(dir: &TestDir) -> rp_config::Dataset {
	let path = dir.join("snapshot.json");

	std::fs::write(&path, rp_testkit::SAMPLE_SNAPSHOT_JSON).expect("Failed to write snapshot.");

	rp_config::Dataset {
		mode: DatasetMode::Local,
		local_path: path,
		remote_url: None,
		remote_timeout_ms: 500,
	}
}

#[tokio::test]
async fn loads_local_snapshot_once() {
	let dir = TestDir::new("dataset_local").expect("Failed to create test dir.");
	let provider = DatasetProvider::new(local_cfg(&dir));

	assert!(!provider.is_loaded());

	let first = provider.snapshot().await.expect("Snapshot must load.");
	let second = provider.snapshot().await.expect("Snapshot must load.");

	assert!(provider.is_loaded());
	assert!(Arc::ptr_eq(&first, &second));
	assert!(!first.live);
	assert_eq!(provider.city_median("toronto", "1bed").await.expect("Median."), 2300.0);

	dir.cleanup().expect("Failed to clean up.");
}

#[tokio::test]
async fn remote_failure_falls_back_to_local() {
	let dir = TestDir::new("dataset_remote").expect("Failed to create test dir.");
	let mut cfg = local_cfg(&dir);

	cfg.mode = DatasetMode::Remote;
	cfg.remote_url = Some("http://127.0.0.1:9/snapshot.json".to_string());

	let provider = DatasetProvider::new(cfg);
	let snapshot = provider.snapshot().await.expect("Fallback snapshot must load.");

	assert!(!snapshot.live);
	assert!(snapshot.city("Montreal").is_ok());

	dir.cleanup().expect("Failed to clean up.");
}

#[tokio::test]
async fn missing_file_is_unavailable_not_unknown_city() {
	let dir = TestDir::new("dataset_missing").expect("Failed to create test dir.");
	let cfg = rp_config::Dataset {
		mode: DatasetMode::Local,
		local_path: dir.join("absent.json"),
		remote_url: None,
		remote_timeout_ms: 500,
	};
	let provider = DatasetProvider::new(cfg);

	assert!(matches!(provider.snapshot().await, Err(Error::Unavailable { .. })));

	let err = provider.city_median("Toronto", "1bed").await.expect_err("Expected failure.");

	assert!(matches!(err, DatasetError::Unavailable { .. }));
	assert!(!err.is_city_not_found());
	assert!(!provider.is_loaded());
}

#[tokio::test]
async fn distinguishes_unknown_city_and_property_type() {
	let value = rp_testkit::sample_snapshot_value().expect("Fixture must parse.");
	let snapshot = Snapshot::from_value(value).expect("Snapshot must parse.");
	let provider = DatasetProvider::from_snapshot(snapshot);

	let err = provider.city_median("Halifax", "1bed").await.expect_err("Expected failure.");

	assert!(err.is_city_not_found());

	let err = provider.city_median("Vancouver", "3bed").await.expect_err("Expected failure.");

	assert!(matches!(err, DatasetError::Lookup(_)));
	assert!(!err.is_city_not_found());

	let neighbourhoods = provider.list_neighbourhoods("Toronto").await.expect("Neighbourhoods.");

	assert_eq!(neighbourhoods.len(), 6);
}

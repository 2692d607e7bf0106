#![allow(dead_code)]

pub mod fixtures;
pub mod records;
pub mod storage;

use harbor_core::{Config, InMemoryFileRecordStore};
use harbor_services::{HarborService, Storage};
use std::sync::Arc;
use tempfile::TempDir;

/// Harbor wired to a temp-dir local backend and an in-memory record store.
pub struct TestHarbor {
    pub service: HarborService,
    pub storage: Arc<dyn Storage>,
    pub records: Arc<InMemoryFileRecordStore>,
    pub config: Config,
    pub _temp_dir: TempDir,
}

/// Config for tests: local backend rooted at `dir`, defaults elsewhere.
pub fn test_config(dir: &TempDir) -> Config {
    let root = dir.path().to_string_lossy().to_string();
    Config::from_lookup(|name| match name {
        "STORAGE_BACKEND" => Some("local".to_string()),
        "LOCAL_STORAGE_PATH" => Some(root.clone()),
        "LOCAL_STORAGE_BASE_URL" => Some("http://harbor.test/files".to_string()),
        _ => None,
    })
    .expect("test config")
}

pub async fn setup_harbor() -> TestHarbor {
    let temp_dir = TempDir::new().expect("temp dir");
    let config = test_config(&temp_dir);
    let storage = harbor_services::create_storage(&config)
        .await
        .expect("local storage");
    setup_harbor_with(temp_dir, config, storage)
}

/// Same wiring around a caller-supplied storage wrapper.
pub fn setup_harbor_with(temp_dir: TempDir, config: Config, storage: Arc<dyn Storage>) -> TestHarbor {
    let records = Arc::new(InMemoryFileRecordStore::new());
    let service = HarborService::new(&config, Arc::clone(&storage), records.clone());
    TestHarbor {
        service,
        storage,
        records,
        config,
        _temp_dir: temp_dir,
    }
}

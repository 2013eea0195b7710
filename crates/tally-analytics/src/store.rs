// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Key-value persistence for super properties.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use tally_analytics_core::Properties;
use tempfile::NamedTempFile;
use tokio::fs;
use tracing::{debug, warn};

use crate::error::StoreError;

/// Default storage key for persisted super properties.
pub const DEFAULT_STORAGE_KEY: &str = "mixpanel:super:props";

/// Async string key-value storage.
#[async_trait]
pub trait KeyValueStore: Send + Sync + std::fmt::Debug + 'static {
	/// Reads the value stored under `key`.
	async fn get_item(&self, key: &str) -> Result<Option<String>, StoreError>;

	/// Writes `value` under `key`, replacing any previous value.
	async fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// Write locks shared by every [`FileKeyValueStore`] in the process, keyed by file path.
static FILE_WRITE_LOCKS: OnceLock<parking_lot::Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>> =
	OnceLock::new();

fn file_write_lock(path: &Path) -> Arc<tokio::sync::Mutex<()>> {
	let mut locks = FILE_WRITE_LOCKS.get_or_init(Default::default).lock();
	let lock = locks.entry(path.to_path_buf()).or_default();
	Arc::clone(lock)
}

/// Store backed by a single JSON object file.
///
/// Every store pointing at the same path shares one write lock, so concurrent
/// `set_item` calls for different keys never drop each other's entries. Each
/// write goes to a fresh temp file in the same directory which is then
/// renamed over the target.
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
	path: PathBuf,
}

impl FileKeyValueStore {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	/// Store at `<data dir>/tally/storage.json`, if the platform has a data dir.
	pub fn in_data_dir() -> Option<Self> {
		dirs::data_dir().map(|dir| Self::new(dir.join("tally").join("storage.json")))
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	async fn read_all(&self) -> Result<HashMap<String, String>, StoreError> {
		if !fs::try_exists(&self.path).await? {
			return Ok(HashMap::new());
		}

		let contents = fs::read_to_string(&self.path).await?;
		Ok(serde_json::from_str(&contents)?)
	}

	/// Reads the current entries for a rewrite. A corrupt file is replaced.
	async fn read_for_update(&self) -> Result<HashMap<String, String>, StoreError> {
		match self.read_all().await {
			Err(StoreError::Serialization(e)) => {
				warn!(path = ?self.path, error = %e, "Replacing corrupt key-value store file");
				Ok(HashMap::new())
			}
			other => other,
		}
	}

	async fn write_all(&self, entries: &HashMap<String, String>) -> Result<(), StoreError> {
		let parent = match self.path.parent() {
			Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
			_ => PathBuf::from("."),
		};
		fs::create_dir_all(&parent).await?;

		let contents = serde_json::to_string_pretty(entries)?;
		let path = self.path.clone();

		tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
			let mut temp = NamedTempFile::new_in(&parent)?;
			temp.write_all(contents.as_bytes())?;
			temp.as_file().sync_all()?;
			temp.persist(&path).map_err(|e| StoreError::from(e.error))?;
			Ok(())
		})
		.await
		.map_err(|e| StoreError::Io(format!("write task failed: {e}")))??;

		debug!(path = ?self.path, "Key-value store written");
		Ok(())
	}
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
	async fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
		Ok(self.read_all().await?.remove(key))
	}

	async fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError> {
		let lock = file_write_lock(&self.path);
		let _guard = lock.lock().await;

		let mut entries = self.read_for_update().await?;
		entries.insert(key.to_string(), value.to_string());
		self.write_all(&entries).await
	}
}

/// In-process store. Contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
	entries: tokio::sync::RwLock<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a store pre-populated with one entry.
	pub fn with_item(key: impl Into<String>, value: impl Into<String>) -> Self {
		let mut entries = HashMap::new();
		entries.insert(key.into(), value.into());
		Self {
			entries: tokio::sync::RwLock::new(entries),
		}
	}
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
	async fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
		Ok(self.entries.read().await.get(key).cloned())
	}

	async fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError> {
		self.entries
			.write()
			.await
			.insert(key.to_string(), value.to_string());
		Ok(())
	}
}

/// Picks the file store in the user's data dir, or an in-memory store.
pub fn default_store() -> Arc<dyn KeyValueStore> {
	match FileKeyValueStore::in_data_dir() {
		Some(store) => Arc::new(store),
		None => {
			warn!("No data directory available, super properties will not survive restarts");
			Arc::new(MemoryKeyValueStore::new())
		}
	}
}

/// Reads persisted super properties.
///
/// Returns `None` when nothing usable is stored: the key is absent, the read
/// fails, or the value is not JSON. A JSON value that is not an object yields
/// an empty bag.
pub async fn load_super_properties(store: &dyn KeyValueStore, key: &str) -> Option<Properties> {
	let raw = match store.get_item(key).await {
		Ok(Some(raw)) if !raw.is_empty() => raw,
		Ok(_) => return None,
		Err(e) => {
			warn!(key = %key, error = %e, "Failed to read persisted super properties");
			return None;
		}
	};

	match serde_json::from_str::<serde_json::Value>(&raw) {
		Ok(value) => Some(Properties::from(value)),
		Err(e) => {
			warn!(key = %key, error = %e, "Ignoring malformed persisted super properties");
			None
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[derive(Debug)]
	struct BrokenStore;

	#[async_trait]
	impl KeyValueStore for BrokenStore {
		async fn get_item(&self, _key: &str) -> Result<Option<String>, StoreError> {
			Err(StoreError::Io("disk on fire".to_string()))
		}

		async fn set_item(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
			Err(StoreError::Io("disk on fire".to_string()))
		}
	}

	#[tokio::test]
	async fn test_memory_store_roundtrip() {
		let store = MemoryKeyValueStore::new();
		assert_eq!(store.get_item(DEFAULT_STORAGE_KEY).await.unwrap(), None);

		store.set_item(DEFAULT_STORAGE_KEY, r#"{"a":1}"#).await.unwrap();

		assert_eq!(
			store.get_item(DEFAULT_STORAGE_KEY).await.unwrap().as_deref(),
			Some(r#"{"a":1}"#)
		);
	}

	#[tokio::test]
	async fn test_file_store_roundtrip() {
		let temp_dir = tempfile::tempdir().unwrap();
		let path = temp_dir.path().join("nested").join("storage.json");
		let store = FileKeyValueStore::new(&path);

		store.set_item("k1", "v1").await.unwrap();
		store.set_item("k2", "v2").await.unwrap();
		assert!(path.exists());

		assert_eq!(store.get_item("k1").await.unwrap().as_deref(), Some("v1"));
		assert_eq!(store.get_item("k2").await.unwrap().as_deref(), Some("v2"));
		assert_eq!(store.get_item("missing").await.unwrap(), None);
	}

	#[tokio::test]
	async fn test_file_store_survives_reopen() {
		let temp_dir = tempfile::tempdir().unwrap();
		let path = temp_dir.path().join("storage.json");

		FileKeyValueStore::new(&path)
			.set_item(DEFAULT_STORAGE_KEY, r#"{"plan":"pro"}"#)
			.await
			.unwrap();

		let reopened = FileKeyValueStore::new(&path);
		let props = load_super_properties(&reopened, DEFAULT_STORAGE_KEY)
			.await
			.unwrap();
		assert_eq!(props.get("plan"), Some(&json!("pro")));
	}

	#[tokio::test]
	async fn test_file_store_missing_file_reads_none() {
		let temp_dir = tempfile::tempdir().unwrap();
		let store = FileKeyValueStore::new(temp_dir.path().join("absent.json"));
		assert_eq!(store.get_item("k").await.unwrap(), None);
	}

	#[tokio::test]
	async fn test_file_store_corrupt_file_is_error() {
		let temp_dir = tempfile::tempdir().unwrap();
		let path = temp_dir.path().join("storage.json");
		std::fs::write(&path, "not json").unwrap();

		let store = FileKeyValueStore::new(&path);
		assert!(matches!(
			store.get_item("k").await,
			Err(StoreError::Serialization(_))
		));
	}

	#[tokio::test]
	async fn test_file_store_overwrites_corrupt_file() {
		let temp_dir = tempfile::tempdir().unwrap();
		let path = temp_dir.path().join("storage.json");
		std::fs::write(&path, "{truncated").unwrap();

		let store = FileKeyValueStore::new(&path);
		store.set_item(DEFAULT_STORAGE_KEY, r#"{"a":1}"#).await.unwrap();

		assert_eq!(
			store.get_item(DEFAULT_STORAGE_KEY).await.unwrap().as_deref(),
			Some(r#"{"a":1}"#)
		);
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn test_file_store_concurrent_writers_keep_every_key() {
		let temp_dir = tempfile::tempdir().unwrap();
		let path = temp_dir.path().join("storage.json");

		let mut tasks = Vec::new();
		for i in 0..50 {
			let first = FileKeyValueStore::new(&path);
			let second = FileKeyValueStore::new(&path);
			tasks.push(tokio::spawn(async move {
				first.set_item(&format!("app:a:{i}"), "a").await
			}));
			tasks.push(tokio::spawn(async move {
				second.set_item(&format!("app:b:{i}"), "b").await
			}));
		}
		for task in tasks {
			task.await.unwrap().unwrap();
		}

		let store = FileKeyValueStore::new(&path);
		for i in 0..50 {
			assert_eq!(store.get_item(&format!("app:a:{i}")).await.unwrap().as_deref(), Some("a"));
			assert_eq!(store.get_item(&format!("app:b:{i}")).await.unwrap().as_deref(), Some("b"));
		}

		let leftovers: Vec<_> = std::fs::read_dir(temp_dir.path())
			.unwrap()
			.filter_map(|entry| entry.ok())
			.filter(|entry| entry.path() != path)
			.collect();
		assert!(leftovers.is_empty(), "temp files left behind: {leftovers:?}");
	}

	#[tokio::test]
	async fn test_load_missing_key() {
		let store = MemoryKeyValueStore::new();
		assert!(load_super_properties(&store, DEFAULT_STORAGE_KEY).await.is_none());
	}

	#[tokio::test]
	async fn test_load_malformed_value() {
		let store = MemoryKeyValueStore::with_item(DEFAULT_STORAGE_KEY, "{broken");
		assert!(load_super_properties(&store, DEFAULT_STORAGE_KEY).await.is_none());
	}

	#[tokio::test]
	async fn test_load_null_value_is_empty() {
		let store = MemoryKeyValueStore::with_item(DEFAULT_STORAGE_KEY, "null");
		let props = load_super_properties(&store, DEFAULT_STORAGE_KEY).await.unwrap();
		assert!(props.is_empty());
	}

	#[tokio::test]
	async fn test_load_read_failure_is_swallowed() {
		assert!(load_super_properties(&BrokenStore, DEFAULT_STORAGE_KEY).await.is_none());
	}

	#[tokio::test]
	async fn test_load_custom_key() {
		let store = MemoryKeyValueStore::with_item("acme:supers", r#"{"tier":"gold"}"#);
		assert!(load_super_properties(&store, DEFAULT_STORAGE_KEY).await.is_none());

		let props = load_super_properties(&store, "acme:supers").await.unwrap();
		assert_eq!(props.get("tier"), Some(&json!("gold")));
	}
}

//! JSON import and export of a whole collection.
//!
//! The file is a JSON array of [`RawEntry`] records whose `value` is the
//! store codec's serialized form, so a file is only portable between stores
//! sharing a codec.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{info, instrument};

use crate::entry::RawEntry;
use crate::error::{StoreError, StoreResult};
use crate::store::KeyValueStore;

/// Counts reported by [`import_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    /// Entries left alone because the key already existed.
    pub skipped: usize,
}

/// Import records may omit `value`; that is reported as [`StoreError::NoValue`].
#[derive(Deserialize)]
struct ImportRecord {
    key: String,
    value: Option<String>,
}

/// Append `.json` unless the path already ends with it.
fn json_path(path: &Path) -> PathBuf {
    if path.extension().is_some_and(|ext| ext == "json") {
        return path.to_path_buf();
    }
    let mut raw = path.as_os_str().to_owned();
    raw.push(".json");
    PathBuf::from(raw)
}

/// Write every entry of `store` to `path` and return how many were written.
#[instrument(skip(store, path), fields(store = %store.name()))]
pub async fn export_all(store: &KeyValueStore, path: impl AsRef<Path>) -> StoreResult<usize> {
    let path = json_path(path.as_ref());

    let records = store
        .all()
        .await?
        .into_iter()
        .filter_map(|pair| pair.value.map(|value| (pair.key, value)))
        .map(|(key, value)| -> StoreResult<RawEntry> {
            Ok(RawEntry::new(key, store.codec().serialize(&value)?))
        })
        .collect::<StoreResult<Vec<_>>>()?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&path, serde_json::to_vec(&records)?).await?;

    info!(path = %path.display(), count = records.len(), "exported entries");
    Ok(records.len())
}

/// Load entries from `path` into `store`.
///
/// Existing keys are skipped unless `replace` is set.
#[instrument(skip(store, path), fields(store = %store.name()))]
pub async fn import_all(
    store: &KeyValueStore,
    path: impl AsRef<Path>,
    replace: bool,
) -> StoreResult<ImportSummary> {
    let path = json_path(path.as_ref());
    let content = tokio::fs::read(&path).await?;
    let records: Vec<ImportRecord> = serde_json::from_slice(&content)?;

    let mut summary = ImportSummary::default();
    for record in records {
        let raw = record
            .value
            .ok_or_else(|| StoreError::NoValue {
                key: record.key.clone(),
            })?;
        let value = store.codec().deserialize(&raw)?;

        if !replace && store.get(record.key.as_str()).await?.exists() {
            summary.skipped += 1;
            continue;
        }
        store.set(record.key, value).await?;
        summary.imported += 1;
    }

    info!(
        path = %path.display(),
        imported = summary.imported,
        skipped = summary.skipped,
        "imported entries"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::backend::MemoryBackend;

    async fn store() -> KeyValueStore {
        let store = KeyValueStore::builder("kv", Arc::new(MemoryBackend::new("kv")))
            .build()
            .unwrap();
        store.connect().await.unwrap();
        store
    }

    #[test]
    fn json_suffix_is_appended_once() {
        assert_eq!(json_path(Path::new("dump")), PathBuf::from("dump.json"));
        assert_eq!(json_path(Path::new("a/dump.json")), PathBuf::from("a/dump.json"));
        assert_eq!(json_path(Path::new("dump.bak")), PathBuf::from("dump.bak.json"));
    }

    #[tokio::test]
    async fn export_then_import() {
        let dir = tempfile::tempdir().unwrap();
        let source = store().await;
        source.set("a", json!({"x": [1, 2]})).await.unwrap();
        source.set("b", json!("text")).await.unwrap();

        let path = dir.path().join("nested").join("dump");
        assert_eq!(export_all(&source, &path).await.unwrap(), 2);

        let written = std::fs::read_to_string(dir.path().join("nested/dump.json")).unwrap();
        let records: Vec<RawEntry> = serde_json::from_str(&written).unwrap();
        assert_eq!(records[1], RawEntry::new("b", "\"text\""));

        let target = store().await;
        target.set("b", json!("kept")).await.unwrap();
        let summary = import_all(&target, &path, false).await.unwrap();
        assert_eq!(summary, ImportSummary { imported: 1, skipped: 1 });
        assert_eq!(target.get("b").await.unwrap().value, Some(json!("kept")));

        let summary = import_all(&target, &path, true).await.unwrap();
        assert_eq!(summary.imported, 2);
        assert_eq!(target.get("b").await.unwrap().value, Some(json!("text")));
        assert_eq!(target.get("a.x.1").await.unwrap().value, Some(json!(2)));
    }

    #[tokio::test]
    async fn missing_value_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"[{"key": "k"}]"#).unwrap();

        let err = import_all(&store().await, &path, false).await.unwrap_err();
        assert!(matches!(err, StoreError::NoValue { .. }));
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = import_all(&store().await, dir.path().join("absent"), false)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
    }
}

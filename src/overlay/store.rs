// src/overlay/store.rs - JSON-file overlay store (writer side)
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use super::{normalize_status, ActivityStatusEntry, StatusOverlay, OVERLAY_TIME_FORMAT};

/// Oldest change-history entries are dropped past this length.
pub const MAX_HISTORY_ENTRIES: usize = 5000;

pub const HISTORY_FILE_NAME: &str = "change_history.json";

/// Persistent `identity_key -> status` store. The pipeline only reads it;
/// field tools write through [`StatusOverlayStore::set`].
pub trait StatusOverlayStore {
    fn get_all(&self) -> Result<StatusOverlay>;

    fn get(&self, key: &str) -> Result<Option<ActivityStatusEntry>> {
        Ok(self.get_all()?.remove(key))
    }

    fn set(&self, key: &str, status: &str, notes: &str, author: &str, timestamp: NaiveDateTime) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeHistoryEntry {
    pub timestamp: String,
    pub record_key: String,
    pub user: String,
    pub old_status: String,
    pub new_status: String,
    pub old_notes: String,
    pub new_notes: String,
}

#[derive(Debug, Clone)]
pub struct JsonFileStatusStore {
    path: PathBuf,
    history_path: PathBuf,
}

impl JsonFileStatusStore {
    /// Store at `path`; the change history lives next to it.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let history_path = path.with_file_name(HISTORY_FILE_NAME);
        Self { path, history_path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Change history as stored. Reading never touches the file.
    pub fn history(&self) -> Result<Vec<ChangeHistoryEntry>> {
        Ok(parse_history(&self.history_path, read_json(&self.history_path)?))
    }

    fn append_history(&self, entry: ChangeHistoryEntry) -> Result<()> {
        let mut history = parse_history(&self.history_path, read_json_or_backup(&self.history_path)?);
        history.push(entry);
        if history.len() > MAX_HISTORY_ENTRIES {
            let excess = history.len() - MAX_HISTORY_ENTRIES;
            history.drain(..excess);
        }
        write_json_atomic(&self.history_path, &history)
    }

    /// The overlay document as raw JSON, for rewriting. Entries this crate
    /// cannot read are kept verbatim so a write never loses them.
    fn load_document(&self) -> Result<Map<String, Value>> {
        match read_json_or_backup(&self.path)? {
            None => Ok(Map::new()),
            Some(Value::Object(map)) => Ok(map),
            Some(_) => {
                backup_file(&self.path, "top level is not a JSON object")?;
                Ok(Map::new())
            }
        }
    }
}

impl StatusOverlayStore for JsonFileStatusStore {
    /// Read-only: a corrupt file reads as empty and is left in place.
    fn get_all(&self) -> Result<StatusOverlay> {
        let Some(value) = read_json(&self.path)? else {
            return Ok(StatusOverlay::new());
        };
        let Value::Object(map) = value else {
            warn!("Overlay {} is not a JSON object; treating as empty", self.path.display());
            return Ok(StatusOverlay::new());
        };

        let mut overlay = StatusOverlay::with_capacity(map.len());
        for (key, raw) in map {
            match serde_json::from_value::<ActivityStatusEntry>(raw) {
                Ok(entry) => {
                    overlay.insert(key, entry);
                }
                Err(e) => warn!("Skipping unreadable overlay entry {}: {}", key, e),
            }
        }
        Ok(overlay)
    }

    fn set(&self, key: &str, status: &str, notes: &str, author: &str, timestamp: NaiveDateTime) -> Result<()> {
        let mut document = self.load_document()?;
        let old: ActivityStatusEntry = document
            .get(key)
            .and_then(|raw| serde_json::from_value(raw.clone()).ok())
            .unwrap_or_default();
        let changed_at = timestamp.format(OVERLAY_TIME_FORMAT).to_string();

        let new = ActivityStatusEntry {
            status: normalize_status(status),
            notes: notes.to_string(),
            changed_at: changed_at.clone(),
            changed_by: author.to_string(),
        };
        let changed = old.status != new.status || old.notes != new.notes;

        document.insert(
            key.to_string(),
            serde_json::to_value(&new).context("serializing overlay entry")?,
        );
        write_json_atomic(&self.path, &document)?;

        if changed {
            self.append_history(ChangeHistoryEntry {
                timestamp: changed_at,
                record_key: key.to_string(),
                user: author.to_string(),
                old_status: old.status,
                new_status: new.status,
                old_notes: old.notes,
                new_notes: new.notes,
            })?;
        }
        Ok(())
    }
}

fn parse_history(path: &Path, value: Option<Value>) -> Vec<ChangeHistoryEntry> {
    match value {
        Some(v) => serde_json::from_value(v).unwrap_or_else(|e| {
            warn!("Ignoring malformed change history {}: {}", path.display(), e);
            Vec::new()
        }),
        None => Vec::new(),
    }
}

fn read_bytes(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(b) => Ok(Some(b)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
    }
}

/// Parsed JSON at `path`, `None` when the file is missing or undecodable.
/// Never modifies the file.
fn read_json(path: &Path) -> Result<Option<Value>> {
    let Some(bytes) = read_bytes(path)? else {
        return Ok(None);
    };
    match serde_json::from_slice(&bytes) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            warn!("Corrupt JSON in {}: {}; reading it as empty", path.display(), e);
            Ok(None)
        }
    }
}

/// Writer-side read: an undecodable file is renamed to
/// `<stem>.bak_<YYYYmmddHHMMSS>` and reads as `None`.
fn read_json_or_backup(path: &Path) -> Result<Option<Value>> {
    let Some(bytes) = read_bytes(path)? else {
        return Ok(None);
    };
    match serde_json::from_slice(&bytes) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            backup_file(path, &e.to_string())?;
            Ok(None)
        }
    }
}

fn backup_file(path: &Path, reason: &str) -> Result<()> {
    let stamp = chrono::Local::now().format("%Y%m%d%H%M%S");
    let backup = path.with_extension(format!("bak_{}", stamp));
    warn!("Unusable JSON in {} ({}); moving it to {}", path.display(), reason, backup.display());
    fs::rename(path, &backup).with_context(|| format!("backing up {}", path.display()))
}

/// Writes `value` to a temporary sibling, syncs it, and renames it over `path`.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir)
        .with_context(|| format!("creating temp file in {}", dir.display()))?;
    serde_json::to_writer_pretty(&mut tmp, value).context("serializing JSON")?;
    tmp.flush().context("flushing temp file")?;
    tmp.as_file().sync_all().context("syncing temp file")?;
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("replacing {}", path.display()))?;
    info!("💾 Saved {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap().and_hms_opt(h, 0, 0).unwrap()
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStatusStore::new(dir.path().join("activity_status.json"));
        assert!(store.get_all().unwrap().is_empty());
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn test_set_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStatusStore::new(dir.path().join("data").join("activity_status.json"));
        store.set("카페a_서울강남구역삼동123", "상담중", "다음주 재방문", "김", ts(10)).unwrap();

        let entry = store.get("카페a_서울강남구역삼동123").unwrap().unwrap();
        assert_eq!(entry.status, "🟡 상담중");
        assert_eq!(entry.notes, "다음주 재방문");
        assert_eq!(entry.changed_at, "2024-05-01 10:00:00");
        assert_eq!(entry.changed_by, "김");
    }

    #[test]
    fn test_atomic_write_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStatusStore::new(dir.path().join("activity_status.json"));
        store.set("a", "방문", "", "김", ts(9)).unwrap();
        store.set("b", "방문", "", "김", ts(9)).unwrap();

        let mut names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["activity_status.json", "change_history.json"]);
    }

    fn backups(dir: &Path) -> usize {
        fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("activity_status.bak_"))
            .count()
    }

    #[test]
    fn test_corrupt_file_is_backed_up_on_write_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("activity_status.json");
        fs::write(&path, "{ not json").unwrap();
        let store = JsonFileStatusStore::new(&path);

        // Reading leaves the file alone.
        assert!(store.get_all().unwrap().is_empty());
        assert_eq!(fs::read_to_string(&path).unwrap(), "{ not json");
        assert_eq!(backups(dir.path()), 0);

        store.set("a", "방문", "", "김", ts(9)).unwrap();
        assert_eq!(backups(dir.path()), 1);
        assert_eq!(store.get("a").unwrap().unwrap().status, "✅ 방문");
    }

    const LEGACY_OVERLAY: &str = r#"{
        "a_1": {"활동진행상태": "상담중", "특이사항": null, "변경일시": "2024-05-01 10:00:00", "변경자": null},
        "b_2": {"활동진행상태": "방문", "특이사항": "", "변경일시": "2024-05-01 11:00:00", "변경자": "김"},
        "c_3": "not an entry"
    }"#;

    #[test]
    fn test_null_fields_do_not_drop_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("activity_status.json");
        fs::write(&path, LEGACY_OVERLAY).unwrap();
        let store = JsonFileStatusStore::new(&path);

        let overlay = store.get_all().unwrap();
        let mut keys: Vec<&String> = overlay.keys().collect();
        keys.sort();
        assert_eq!(keys, vec!["a_1", "b_2"]);
        assert_eq!(overlay["a_1"].status, "상담중");
        assert_eq!(overlay["a_1"].changed_by, "");
    }

    #[test]
    fn test_write_preserves_other_entries_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("activity_status.json");
        fs::write(&path, LEGACY_OVERLAY).unwrap();
        let store = JsonFileStatusStore::new(&path);

        store.set("b_2", "계약완료", "서명", "이", ts(12)).unwrap();

        let on_disk: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk["a_1"]["변경자"], Value::Null);
        assert_eq!(on_disk["a_1"]["활동진행상태"], "상담중");
        assert_eq!(on_disk["c_3"], "not an entry");
        assert_eq!(on_disk["b_2"]["활동진행상태"], "🟢 계약완료");
        assert_eq!(store.get("a_1").unwrap().unwrap().status, "상담중");
    }

    #[test]
    fn test_history_records_only_changes() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStatusStore::new(dir.path().join("activity_status.json"));
        store.set("a", "방문", "", "김", ts(9)).unwrap();
        store.set("a", "✅ 방문", "", "이", ts(10)).unwrap();
        store.set("a", "계약완료", "서명", "이", ts(11)).unwrap();

        let history = store.history().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].old_status, "");
        assert_eq!(history[0].new_status, "✅ 방문");
        assert_eq!(history[1].new_status, "🟢 계약완료");
        assert_eq!(history[1].user, "이");
        // Unchanged status still refreshes the author and time.
        assert_eq!(store.get("a").unwrap().unwrap().changed_by, "이");
    }

    #[test]
    fn test_history_is_capped() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStatusStore::new(dir.path().join("activity_status.json"));
        let seed: Vec<ChangeHistoryEntry> = (0..MAX_HISTORY_ENTRIES)
            .map(|i| ChangeHistoryEntry {
                timestamp: String::new(),
                record_key: format!("k{}", i),
                user: String::new(),
                old_status: String::new(),
                new_status: String::new(),
                old_notes: String::new(),
                new_notes: String::new(),
            })
            .collect();
        write_json_atomic(&dir.path().join(HISTORY_FILE_NAME), &seed).unwrap();

        store.set("new", "방문", "", "김", ts(9)).unwrap();
        let history = store.history().unwrap();
        assert_eq!(history.len(), MAX_HISTORY_ENTRIES);
        assert_eq!(history[0].record_key, "k1");
        assert_eq!(history.last().unwrap().record_key, "new");
    }
}

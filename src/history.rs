//! History Store (§4.6): a single JSON file under the app-data directory,
//! rewritten in full on every mutation. Append-only from the caller's
//! perspective; `clear_history` is the one operation allowed to truncate it.

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::model::DownloadTaskDTO;

pub struct HistoryStore {
    path: PathBuf,
    records: RwLock<Vec<DownloadTaskDTO>>,
}

impl HistoryStore {
    /// Loads `path` if present. A missing file starts empty; a malformed
    /// file is logged and also starts empty, but is left untouched on
    /// disk so the user can recover it manually (§4.6, §8).
    pub fn load(path: PathBuf) -> Self {
        let records = match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<Vec<DownloadTaskDTO>>(&contents) {
                Ok(records) => records,
                Err(e) => {
                    tracing::error!("failed to parse history file {}: {e}", path.display());
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                tracing::error!("failed to read history file {}: {e}", path.display());
                Vec::new()
            }
        };
        Self { path, records: RwLock::new(records) }
    }

    pub fn add_record(&self, dto: DownloadTaskDTO) {
        let mut records = self.records.write().unwrap();
        records.push(dto);
        if let Err(e) = Self::persist(&self.path, &records) {
            tracing::error!("failed to persist download history: {e}");
        }
    }

    /// Defensive copy; callers never observe internal mutation.
    pub fn get_history(&self) -> Vec<DownloadTaskDTO> {
        self.records.read().unwrap().clone()
    }

    pub fn clear_history(&self) {
        let mut records = self.records.write().unwrap();
        records.clear();
        if let Err(e) = Self::persist(&self.path, &records) {
            tracing::error!("failed to persist cleared download history: {e}");
        }
    }

    fn persist(path: &Path, records: &[DownloadTaskDTO]) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(records)?;
        std::fs::write(path, json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DownloadTask;

    fn sample_dto(name: &str) -> DownloadTaskDTO {
        let mut task = DownloadTask::new("https://example.com/album".to_string());
        task.name = name.to_string();
        task.to_dto()
    }

    #[test]
    fn missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::load(dir.path().join("no_such_file.json"));
        assert!(store.get_history().is_empty());
    }

    #[test]
    fn malformed_file_starts_empty_and_is_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(&path, "not json").unwrap();
        let store = HistoryStore::load(path.clone());
        assert!(store.get_history().is_empty());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "not json");
    }

    #[test]
    fn add_then_reload_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        let store = HistoryStore::load(path.clone());
        store.add_record(sample_dto("album-one"));
        store.add_record(sample_dto("album-two"));

        let reloaded = HistoryStore::load(path);
        let history = reloaded.get_history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].name, "album-one");
        assert_eq!(history[1].name, "album-two");
    }

    #[test]
    fn clear_history_empties_memory_and_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        let store = HistoryStore::load(path.clone());
        store.add_record(sample_dto("album-one"));
        store.clear_history();
        assert!(store.get_history().is_empty());

        let reloaded = HistoryStore::load(path);
        assert!(reloaded.get_history().is_empty());
    }
}

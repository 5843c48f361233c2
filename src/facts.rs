//! Flat per-user fact table persisted as a single JSON document.
//!
//! Last-write-wins, whole-file rewrite on every update. Read failures degrade
//! to an empty table and write failures to a logged no-op; callers never see
//! I/O errors, the conversation keeps going.

use std::collections::BTreeMap;
use std::io::Write as _;
use std::path::PathBuf;

use tracing::warn;

type FactTable = BTreeMap<String, BTreeMap<String, String>>;

/// Normalize a user identifier: lowercase, whitespace collapsed to `_`.
/// Distinct users can normalize to the same key; there is no collision
/// detection.
pub fn normalize_user(user: &str) -> String {
    let trimmed = user.trim();
    let base = if trimmed.is_empty() { "anonymous" } else { trimmed };
    base.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

#[derive(Clone)]
pub struct FactStore {
    path: PathBuf,
}

impl FactStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load(&self) -> FactTable {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(path = %self.path.display(), error = %e, "fact file unreadable, starting empty");
                FactTable::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => FactTable::new(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "fact file read failed, starting empty");
                FactTable::new()
            }
        }
    }

    /// Write to a temp file in the same directory, then rename, so a crash
    /// mid-write cannot corrupt the table.
    fn persist(&self, table: &FactTable) -> std::io::Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let data = serde_json::to_vec_pretty(table)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        let mut tmp_name = self.path.clone().into_os_string();
        tmp_name.push(".tmp");
        let tmp = PathBuf::from(tmp_name);

        let mut f = std::fs::File::create(&tmp)?;
        f.write_all(&data)?;
        f.sync_all()?;
        drop(f);
        std::fs::rename(&tmp, &self.path)
    }

    /// Overwrite the value unconditionally and persist the whole table.
    pub fn update_fact(&self, user: &str, key: &str, value: &str) {
        let user = normalize_user(user);
        let mut table = self.load();
        table
            .entry(user)
            .or_default()
            .insert(key.to_string(), value.to_string());
        if let Err(e) = self.persist(&table) {
            warn!(path = %self.path.display(), error = %e, "fact store write failed, update dropped");
        }
    }

    pub fn get_fact(&self, user: &str, key: &str) -> Option<String> {
        self.load().get(&normalize_user(user))?.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, FactStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FactStore::open(dir.path().join("user_facts.json"));
        (dir, store)
    }

    #[test]
    fn missing_file_reads_empty() {
        let (_dir, store) = store();
        assert_eq!(store.get_fact("sam", "name"), None);
    }

    #[test]
    fn update_then_get() {
        let (_dir, store) = store();
        store.update_fact("sam", "name", "Sam");
        assert_eq!(store.get_fact("sam", "name"), Some("Sam".into()));
        assert_eq!(store.get_fact("sam", "city"), None);
    }

    #[test]
    fn last_write_wins() {
        let (_dir, store) = store();
        store.update_fact("sam", "city", "Portland");
        store.update_fact("sam", "city", "Tokyo");
        assert_eq!(store.get_fact("sam", "city"), Some("Tokyo".into()));
    }

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("user_facts.json");
        FactStore::open(&path).update_fact("sam", "name", "Sam");
        let reopened = FactStore::open(&path);
        assert_eq!(reopened.get_fact("sam", "name"), Some("Sam".into()));
    }

    #[test]
    fn corrupt_file_degrades_to_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("user_facts.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = FactStore::open(&path);
        assert_eq!(store.get_fact("sam", "name"), None);
        // a write repairs the file
        store.update_fact("sam", "name", "Sam");
        assert_eq!(store.get_fact("sam", "name"), Some("Sam".into()));
    }

    #[test]
    fn users_are_namespaced_by_normalized_id() {
        let (_dir, store) = store();
        store.update_fact("Anna Lee", "name", "Anna");
        // "anna lee" normalizes to the same key, known collision, not resolved
        assert_eq!(store.get_fact("anna lee", "name"), Some("Anna".into()));
        assert_eq!(store.get_fact("someone else", "name"), None);
    }

    #[test]
    fn normalize_user_rules() {
        assert_eq!(normalize_user("Anna Lee"), "anna_lee");
        assert_eq!(normalize_user("  SAM  "), "sam");
        assert_eq!(normalize_user(""), "anonymous");
    }
}

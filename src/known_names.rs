//! Persisted lists of canonical author and series names.
//!
//! Two JSON arrays in the assets directory, one per [`NameKind`]:
//!
//! ```text
//! <assets_dir>/
//! ├── authors.json        ["J. R. R. Tolkien", "Ursula K. Le Guin"]
//! ├── authors.json.lock
//! ├── series.json         ["Discworld"]
//! └── series.json.lock
//! ```
//!
//! The lists are append-only and deduplicated case-insensitively. Every
//! [`add_if_absent`](KnownNamesStore::add_if_absent) runs its whole
//! read-modify-write cycle while holding both an in-process mutex and an
//! exclusive `fs2` lock on the sibling `.lock` file, so neither threads nor
//! other processes can lose an addition. The new list is written to a temp
//! file and renamed over the old one.

use fs2::FileExt;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Which list a name belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameKind {
    Author,
    Series,
}

impl NameKind {
    pub const ALL: [NameKind; 2] = [NameKind::Author, NameKind::Series];

    pub fn file_name(self) -> &'static str {
        match self {
            NameKind::Author => "authors.json",
            NameKind::Series => "series.json",
        }
    }
}

impl fmt::Display for NameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NameKind::Author => "author",
            NameKind::Series => "series",
        })
    }
}

/// File-backed known-names lists.
#[derive(Debug)]
pub struct KnownNamesStore {
    dir: PathBuf,
    guard: Mutex<()>,
}

impl KnownNamesStore {
    /// Open the store in `dir`, creating the directory and any missing list
    /// file as an empty array.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let store = Self {
            dir,
            guard: Mutex::new(()),
        };
        for kind in NameKind::ALL {
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(store.path(kind))
            {
                Ok(mut file) => file.write_all(b"[]")?,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, kind: NameKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }

    /// Current list, in insertion order. A missing file reads as empty.
    pub fn load(&self, kind: NameKind) -> Result<Vec<String>, StoreError> {
        let path = self.path(kind);
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&content).map_err(|source| StoreError::Json { path, source })
    }

    /// Append `name` unless an equal name (ignoring case) is already listed.
    ///
    /// Returns `true` when the name was added. Blank names are never added.
    pub fn add_if_absent(&self, kind: NameKind, name: &str) -> Result<bool, StoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(false);
        }

        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        let _lock = self.acquire_lock(kind)?;

        let mut names = self.load(kind)?;
        if contains_ignore_case(&names, name) {
            return Ok(false);
        }
        names.push(name.to_string());
        self.write(kind, &names)?;
        Ok(true)
    }

    /// Exclusive lock on `<list>.lock`, released when the handle drops.
    fn acquire_lock(&self, kind: NameKind) -> Result<File, StoreError> {
        let lock_path = self.dir.join(format!("{}.lock", kind.file_name()));
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)?;
        lock_file.lock_exclusive()?;
        Ok(lock_file)
    }

    fn write(&self, kind: NameKind, names: &[String]) -> Result<(), StoreError> {
        let path = self.path(kind);
        let json = serde_json::to_string_pretty(names).map_err(|source| StoreError::Json {
            path: path.clone(),
            source,
        })?;
        let temp_path = self.dir.join(format!("{}.tmp", kind.file_name()));
        fs::write(&temp_path, json)?;
        fs::rename(&temp_path, &path)?;
        Ok(())
    }
}

/// Case-insensitive membership test used for every known-names comparison.
pub fn contains_ignore_case(names: &[String], name: &str) -> bool {
    let needle = name.to_lowercase();
    names.iter().any(|n| n.to_lowercase() == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    // =========================================================================
    // Opening and loading
    // =========================================================================

    #[test]
    fn open_creates_empty_lists() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("assets");
        let store = KnownNamesStore::open(&dir).unwrap();

        assert_eq!(fs::read_to_string(dir.join("authors.json")).unwrap(), "[]");
        assert_eq!(fs::read_to_string(dir.join("series.json")).unwrap(), "[]");
        assert!(store.load(NameKind::Author).unwrap().is_empty());
    }

    #[test]
    fn open_keeps_existing_lists() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("authors.json"), r#"["Stanislaw Lem"]"#).unwrap();
        let store = KnownNamesStore::open(tmp.path()).unwrap();
        assert_eq!(store.load(NameKind::Author).unwrap(), vec!["Stanislaw Lem"]);
        assert!(store.load(NameKind::Series).unwrap().is_empty());
    }

    #[test]
    fn corrupt_list_is_a_json_error() {
        let tmp = TempDir::new().unwrap();
        let store = KnownNamesStore::open(tmp.path()).unwrap();
        fs::write(store.path(NameKind::Series), "{not json").unwrap();
        assert!(matches!(
            store.load(NameKind::Series),
            Err(StoreError::Json { .. })
        ));
    }

    #[test]
    fn deleted_list_reads_as_empty() {
        let tmp = TempDir::new().unwrap();
        let store = KnownNamesStore::open(tmp.path()).unwrap();
        fs::remove_file(store.path(NameKind::Author)).unwrap();
        assert!(store.load(NameKind::Author).unwrap().is_empty());
    }

    // =========================================================================
    // add_if_absent()
    // =========================================================================

    #[test]
    fn adds_new_name_and_writes_pretty_json() {
        let tmp = TempDir::new().unwrap();
        let store = KnownNamesStore::open(tmp.path()).unwrap();

        assert!(store.add_if_absent(NameKind::Author, "Ursula K. Le Guin").unwrap());
        let raw = fs::read_to_string(store.path(NameKind::Author)).unwrap();
        assert_eq!(raw, "[\n  \"Ursula K. Le Guin\"\n]");
        assert!(!tmp.path().join("authors.json.tmp").exists());
    }

    #[test]
    fn duplicate_ignoring_case_is_not_added() {
        let tmp = TempDir::new().unwrap();
        let store = KnownNamesStore::open(tmp.path()).unwrap();

        assert!(store.add_if_absent(NameKind::Series, "Discworld").unwrap());
        assert!(!store.add_if_absent(NameKind::Series, "DISCWORLD").unwrap());
        assert!(!store.add_if_absent(NameKind::Series, "  discworld ").unwrap());
        assert_eq!(store.load(NameKind::Series).unwrap(), vec!["Discworld"]);
    }

    #[test]
    fn blank_name_is_never_added() {
        let tmp = TempDir::new().unwrap();
        let store = KnownNamesStore::open(tmp.path()).unwrap();
        assert!(!store.add_if_absent(NameKind::Author, "   ").unwrap());
        assert!(store.load(NameKind::Author).unwrap().is_empty());
    }

    #[test]
    fn kinds_are_independent() {
        let tmp = TempDir::new().unwrap();
        let store = KnownNamesStore::open(tmp.path()).unwrap();
        store.add_if_absent(NameKind::Author, "Dune").unwrap();
        assert!(store.add_if_absent(NameKind::Series, "Dune").unwrap());
    }

    #[test]
    fn insertion_order_is_preserved() {
        let tmp = TempDir::new().unwrap();
        let store = KnownNamesStore::open(tmp.path()).unwrap();
        for name in ["C", "A", "B"] {
            store.add_if_absent(NameKind::Author, name).unwrap();
        }
        assert_eq!(store.load(NameKind::Author).unwrap(), vec!["C", "A", "B"]);
    }

    #[test]
    fn concurrent_additions_are_not_lost() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(KnownNamesStore::open(tmp.path()).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for i in 0..10 {
                        store
                            .add_if_absent(NameKind::Author, &format!("Author {t}-{i}"))
                            .unwrap();
                        store.add_if_absent(NameKind::Author, "Shared Name").unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let names = store.load(NameKind::Author).unwrap();
        assert_eq!(names.len(), 81);
        assert_eq!(names.iter().filter(|n| *n == "Shared Name").count(), 1);
    }

    #[test]
    fn separate_store_instances_share_the_file_lock() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().to_path_buf();

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let dir = dir.clone();
                thread::spawn(move || {
                    let store = KnownNamesStore::open(&dir).unwrap();
                    for i in 0..10 {
                        store
                            .add_if_absent(NameKind::Series, &format!("Series {t}-{i}"))
                            .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let store = KnownNamesStore::open(&dir).unwrap();
        assert_eq!(store.load(NameKind::Series).unwrap().len(), 40);
    }

    #[test]
    fn contains_ignore_case_handles_unicode() {
        let names = vec!["Стругацкий".to_string()];
        assert!(contains_ignore_case(&names, "СТРУГАЦКИЙ"));
        assert!(!contains_ignore_case(&names, "Strugatsky"));
    }
}

//! Single-file JSON store.
//!
//! The whole record set is loaded at open and the whole file is rewritten on
//! every mutation (write to a sibling temp file, then rename). A mutation is
//! applied to a copy first, so a failed write leaves memory untouched.

use parking_lot::RwLock;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::memory::RecordSet;
use super::{CertificateStore, StorageError, StorageResult};
use crate::core::record::CertificateRecord;

#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    records: RwLock<RecordSet>,
}

impl JsonFileStore {
    /// Open `path`, creating an empty store file when it does not exist.
    ///
    /// A file that fails to parse is moved aside to `<path>.corrupt` and the
    /// store starts empty.
    pub fn open(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let records = if path.exists() {
            let content = fs::read_to_string(&path)?;
            match serde_json::from_str::<RecordSet>(&content) {
                Ok(set) => set,
                Err(e) => {
                    let aside = path.with_extension("json.corrupt");
                    warn!(
                        "Store file {} is unreadable ({}); moving it to {}",
                        path.display(),
                        e,
                        aside.display()
                    );
                    fs::rename(&path, &aside)?;
                    RecordSet::default()
                }
            }
        } else {
            RecordSet::default()
        };

        let store = Self {
            path,
            records: RwLock::new(records),
        };
        if !store.path.exists() {
            store.persist(&store.records.read())?;
        }
        info!(
            "📂 Certificate store opened: {} ({} records)",
            store.path.display(),
            store.records.read().len()
        );
        Ok(store)
    }

    /// Read the record set at `path` without creating, rewriting or moving anything.
    pub fn read_snapshot(path: impl AsRef<Path>) -> StorageResult<Vec<CertificateRecord>> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("store file {} does not exist", path.display()),
            )));
        }
        let content = fs::read_to_string(path)?;
        let set: RecordSet = serde_json::from_str(&content)
            .map_err(|e| StorageError::Corrupt(format!("{}: {}", path.display(), e)))?;
        Ok(set.certificates)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, set: &RecordSet) -> StorageResult<()> {
        let json = serde_json::to_string_pretty(set)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        debug!("Store file rewritten: {} records", set.len());
        Ok(())
    }

    /// Apply `change` to a copy, persist it, then publish it.
    fn mutate<F>(&self, change: F) -> StorageResult<()>
    where
        F: FnOnce(&mut RecordSet) -> StorageResult<()>,
    {
        let mut guard = self.records.write();
        let mut next = guard.clone();
        change(&mut next)?;
        self.persist(&next)?;
        *guard = next;
        Ok(())
    }
}

impl CertificateStore for JsonFileStore {
    fn find_by_active_or_previous_code(&self, code: &str) -> StorageResult<Option<CertificateRecord>> {
        Ok(self.records.read().find_by_code(code).cloned())
    }

    fn find_by_id(&self, id: &str) -> StorageResult<Option<CertificateRecord>> {
        Ok(self.records.read().find_by_id(id).cloned())
    }

    fn find_by_external_id(&self, external_id: &str) -> StorageResult<Option<CertificateRecord>> {
        Ok(self.records.read().find_by_external_id(external_id).cloned())
    }

    fn append(&self, record: CertificateRecord) -> StorageResult<()> {
        self.mutate(|set| set.append(record))
    }

    fn update_in_place(&self, record: CertificateRecord) -> StorageResult<()> {
        self.mutate(|set| set.replace(record))
    }

    fn all_records(&self) -> StorageResult<Vec<CertificateRecord>> {
        Ok(self.records.read().certificates.clone())
    }

    fn count(&self) -> StorageResult<usize> {
        Ok(self.records.read().len())
    }

    fn active_code_in_use(&self, code: &str) -> StorageResult<bool> {
        Ok(self.records.read().active_code_in_use(code))
    }
}

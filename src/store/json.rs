use crate::core::error::{RateError, RateResult};
use serde::{Serialize, de::DeserializeOwned};
use std::collections::HashMap;
use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tempfile::NamedTempFile;
use tracing::debug;

/// JSON documents stored as files in one directory.
///
/// Every file name gets its own lock, so readers never observe a half
/// written document and read-modify-write cycles on the same file are
/// serialized. Writes land in a temporary file in the same directory and
/// are renamed over the target only once fully flushed.
pub struct JsonStore {
    dir: PathBuf,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl JsonStore {
    pub fn open(dir: &Path) -> RateResult<Self> {
        fs::create_dir_all(dir).map_err(|e| {
            RateError::Database(format!("Failed to create {}: {e}", dir.display()))
        })?;
        Ok(Self {
            dir: dir.to_path_buf(),
            locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    fn file_lock(&self, name: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(name.to_string()).or_default())
    }

    /// Reads a document, returning `T::default()` when the file is missing.
    pub fn read<T>(&self, name: &str) -> RateResult<T>
    where
        T: DeserializeOwned + Default,
    {
        let lock = self.file_lock(name);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.read_unlocked(name)
    }

    pub fn write<T>(&self, name: &str, data: &T) -> RateResult<()>
    where
        T: Serialize,
    {
        let lock = self.file_lock(name);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.write_unlocked(name, data)
    }

    /// Atomic read-modify-write. The file is rewritten only if `f` changed
    /// the document; an error from `f` leaves the file untouched.
    pub fn update<T, R, F>(&self, name: &str, f: F) -> RateResult<R>
    where
        T: Serialize + DeserializeOwned + Default + Clone + PartialEq,
        F: FnOnce(&mut T) -> RateResult<R>,
    {
        let lock = self.file_lock(name);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut data: T = self.read_unlocked(name)?;
        let before = data.clone();
        let result = f(&mut data)?;
        if data != before {
            self.write_unlocked(name, &data)?;
        } else {
            debug!(file = name, "Document unchanged, skipping write");
        }
        Ok(result)
    }

    fn read_unlocked<T>(&self, name: &str) -> RateResult<T>
    where
        T: DeserializeOwned + Default,
    {
        let path = self.path(name);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(T::default()),
            Err(e) => {
                return Err(RateError::Database(format!(
                    "Failed to read {}: {e}",
                    path.display()
                )));
            }
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(T::default());
        }
        serde_json::from_slice(&bytes).map_err(|e| {
            RateError::Database(format!("Malformed JSON in {}: {e}", path.display()))
        })
    }

    fn write_unlocked<T>(&self, name: &str, data: &T) -> RateResult<()>
    where
        T: Serialize,
    {
        let path = self.path(name);
        let write = || -> std::io::Result<()> {
            // Dropping the temp file on any early return removes it.
            let mut tmp = NamedTempFile::new_in(&self.dir)?;
            {
                let mut writer = BufWriter::new(tmp.as_file_mut());
                serde_json::to_writer_pretty(&mut writer, data)?;
                writer.flush()?;
            }
            tmp.as_file().sync_all()?;
            tmp.persist(&path).map_err(|e| e.error)?;
            Ok(())
        };
        write().map_err(|e| {
            RateError::Database(format!("Failed to write {}: {e}", path.display()))
        })?;
        debug!(file = name, "Document written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::ser::Error as _;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn file_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_read_missing_file_is_default() {
        let dir = tempdir().unwrap();
        let store = JsonStore::open(dir.path()).unwrap();

        let data: BTreeMap<String, f64> = store.read("rates.json").unwrap();
        assert!(data.is_empty());
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempdir().unwrap();
        let store = JsonStore::open(dir.path()).unwrap();

        let data = BTreeMap::from([("USD_EUR".to_string(), 0.85)]);
        store.write("rates.json", &data).unwrap();

        let back: BTreeMap<String, f64> = store.read("rates.json").unwrap();
        assert_eq!(back, data);
        assert_eq!(file_names(dir.path()), vec!["rates.json"]);
    }

    #[test]
    fn test_malformed_file_is_a_database_error() {
        let dir = tempdir().unwrap();
        let store = JsonStore::open(dir.path()).unwrap();
        fs::write(store.path("rates.json"), "{ not json").unwrap();

        let result: RateResult<BTreeMap<String, f64>> = store.read("rates.json");
        assert!(matches!(result, Err(RateError::Database(_))));
    }

    struct Flaky(bool);

    impl Serialize for Flaky {
        fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            if self.0 {
                Err(S::Error::custom("boom"))
            } else {
                serializer.serialize_f64(1.0)
            }
        }
    }

    #[test]
    fn test_failed_write_leaves_store_unchanged() {
        let dir = tempdir().unwrap();
        let store = JsonStore::open(dir.path()).unwrap();

        let data = BTreeMap::from([("USD_EUR".to_string(), 0.85)]);
        store.write("rates.json", &data).unwrap();

        let broken = BTreeMap::from([("A_B", Flaky(false)), ("C_D", Flaky(true))]);
        let result = store.write("rates.json", &broken);
        assert!(matches!(result, Err(RateError::Database(_))));

        let back: BTreeMap<String, f64> = store.read("rates.json").unwrap();
        assert_eq!(back, data);
        // No temp file left behind
        assert_eq!(file_names(dir.path()), vec!["rates.json"]);
    }

    #[test]
    fn test_update_skips_write_when_unchanged_and_on_error() {
        let dir = tempdir().unwrap();
        let store = JsonStore::open(dir.path()).unwrap();

        let count = store
            .update("rates.json", |data: &mut BTreeMap<String, f64>| {
                data.insert("USD_EUR".to_string(), 0.85);
                Ok(data.len())
            })
            .unwrap();
        assert_eq!(count, 1);

        store
            .update("rates.json", |_: &mut BTreeMap<String, f64>| Ok(()))
            .unwrap();

        let result = store.update("rates.json", |data: &mut BTreeMap<String, f64>| {
            data.clear();
            Err::<(), _>(RateError::Database("aborted".to_string()))
        });
        assert!(result.is_err());

        let back: BTreeMap<String, f64> = store.read("rates.json").unwrap();
        assert_eq!(back.get("USD_EUR"), Some(&0.85));
    }

    #[test]
    fn test_concurrent_updates_are_serialized() {
        let dir = tempdir().unwrap();
        let store = Arc::new(JsonStore::open(dir.path()).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for j in 0..10 {
                        store
                            .update("counter.json", |data: &mut BTreeMap<String, u32>| {
                                data.insert(format!("{i}_{j}"), j);
                                Ok(())
                            })
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let data: BTreeMap<String, u32> = store.read("counter.json").unwrap();
        assert_eq!(data.len(), 80);
    }
}

/*!
Scratch key-value store used to group records by AS while ingesting.

The store keeps all keys for one run inside a single container (a RocksDB column family). Writes
happen inside [Transaction]s: one writer at a time, staged in memory and committed atomically with
a single RocksDB write. Readers never block on the writer.

[KeyValueStore::batch_append] hands the append to a background batcher that coalesces many
concurrent calls into one physical commit and reports each call's outcome on a caller-supplied
completion sink.

```no_run
use bgp_distill::store::{KeyValueStore, StoreOptions};

let store = KeyValueStore::create("scratch.db", StoreOptions::default()).unwrap();
store.set_container("BGP").unwrap();
store.append("6830", "first").unwrap();
store.append("6830", "second").unwrap();
assert_eq!(store.get_string("6830").unwrap(), "first\nsecond");
store.destroy().unwrap();
```
*/
mod batch;

use crate::error::StoreError;
use batch::{BatchCall, Batcher};
use chrono::Utc;
use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use rocksdb::{ColumnFamily, Options, WriteBatch, DB};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Receives exactly one result per [KeyValueStore::batch_append] call.
pub type CompletionSink = crossbeam_channel::Sender<Result<(), StoreError>>;

/// Reserved key holding the time the container was last selected. Never a data record.
pub const MODIFICATION_TIME_KEY: &str = "Container Modification Time";

const OPEN_RETRY_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// How long to keep retrying while another handle holds the store lock.
    pub open_timeout: Duration,
    /// Maximum number of batched appends coalesced into one commit.
    pub max_batch_size: usize,
    /// Maximum time the batcher waits for more appends before committing.
    pub max_batch_delay: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        StoreOptions {
            open_timeout: Duration::from_secs(1),
            max_batch_size: 1000,
            max_batch_delay: Duration::from_millis(10),
        }
    }
}

/// State shared between the store handle and its batcher thread.
struct Shared {
    db: RwLock<Option<DB>>,
    container: RwLock<Option<String>>,
    writer: Mutex<()>,
}

impl Shared {
    /// Run `f` inside a read-write transaction and commit it if `f` succeeds.
    fn update<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<T, StoreError>,
    {
        let _writer = self.writer.lock();
        let guard = self.db.read();
        let db = guard.as_ref().ok_or(StoreError::Closed)?;
        let container = self.container.read().clone().ok_or(StoreError::NoContainer)?;
        let cf = db.cf_handle(&container).ok_or(StoreError::NoContainer)?;

        let mut tx = Transaction {
            db,
            cf,
            staged: HashMap::new(),
        };
        let value = f(&mut tx)?;
        tx.commit()?;
        Ok(value)
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let guard = self.db.read();
        let Some(db) = guard.as_ref() else {
            return Ok(None);
        };
        let Some(container) = self.container.read().clone() else {
            return Err(StoreError::NoContainer);
        };
        let cf = db.cf_handle(&container).ok_or(StoreError::NoContainer)?;
        Ok(db.get_cf(cf, key)?)
    }
}

/// A read-write transaction over the current container.
///
/// Writes are staged and become visible to other readers only when the transaction commits.
/// Reads inside the transaction see its own staged writes.
pub struct Transaction<'a> {
    db: &'a DB,
    cf: &'a ColumnFamily,
    staged: HashMap<Vec<u8>, Vec<u8>>,
}

impl Transaction<'_> {
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        match self.staged.get(key) {
            Some(value) => Ok(Some(value.clone())),
            None => Ok(self.db.get_cf(self.cf, key)?),
        }
    }

    pub fn put(&mut self, key: &[u8], value: &[u8]) {
        self.staged.insert(key.to_vec(), value.to_vec());
    }

    /// Store `value` under `key`, or append it to the current value separated by a newline.
    pub fn append(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let stored = match self.staged.remove(key) {
            Some(staged) => Some(staged),
            None => self.db.get_cf(self.cf, key)?,
        };
        let new_value = match stored {
            None => value.to_vec(),
            Some(mut current) => {
                current.reserve(value.len() + 1);
                current.push(b'\n');
                current.extend_from_slice(value);
                current
            }
        };
        self.staged.insert(key.to_vec(), new_value);
        Ok(())
    }

    fn commit(self) -> Result<(), StoreError> {
        if self.staged.is_empty() {
            return Ok(());
        }
        let mut batch = WriteBatch::default();
        for (key, value) in &self.staged {
            batch.put_cf(self.cf, key, value);
        }
        self.db.write(batch)?;
        Ok(())
    }
}

/// Persistent, transactional, single-container key-value store.
pub struct KeyValueStore {
    path: PathBuf,
    shared: Arc<Shared>,
    batcher: Mutex<Option<Batcher>>,
}

impl KeyValueStore {
    /// Open or create the store at `path`.
    ///
    /// Keeps retrying for [StoreOptions::open_timeout] while the store is locked by another
    /// handle, then gives up with [StoreError::Open].
    pub fn create<P: AsRef<Path>>(path: P, options: StoreOptions) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        info!("creating store at {}", path.display());

        let db = open_with_timeout(&path, options.open_timeout)?;
        let shared = Arc::new(Shared {
            db: RwLock::new(Some(db)),
            container: RwLock::new(None),
            writer: Mutex::new(()),
        });
        let batcher = Batcher::spawn(
            Arc::clone(&shared),
            options.max_batch_size,
            options.max_batch_delay,
        )?;

        Ok(KeyValueStore {
            path,
            shared,
            batcher: Mutex::new(Some(batcher)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn container(&self) -> Option<String> {
        self.shared.container.read().clone()
    }

    /// Select the container used by every later operation, creating it if absent, and stamp
    /// it with the current time under [MODIFICATION_TIME_KEY].
    pub fn set_container(&self, name: &str) -> Result<(), StoreError> {
        {
            let mut guard = self.shared.db.write();
            let db = guard.as_mut().ok_or(StoreError::Closed)?;
            if db.cf_handle(name).is_none() {
                db.create_cf(name, &Options::default())?;
            }
        }
        *self.shared.container.write() = Some(name.to_string());
        info!("modifying container {}", name);

        let now = Utc::now().to_rfc3339();
        info!("setting '{}' to {}", MODIFICATION_TIME_KEY, now);
        self.put(MODIFICATION_TIME_KEY, &now)
    }

    /// Like [KeyValueStore::set_container], but discards whatever the container already holds.
    pub fn reset_container(&self, name: &str) -> Result<(), StoreError> {
        {
            let _writer = self.shared.writer.lock();
            let mut guard = self.shared.db.write();
            let db = guard.as_mut().ok_or(StoreError::Closed)?;
            if db.cf_handle(name).is_some() {
                warn!("discarding existing container {} in {}", name, self.path.display());
                db.drop_cf(name)?;
            }
        }
        self.set_container(name)
    }

    /// The modification marker written by [KeyValueStore::set_container].
    pub fn modified_at(&self) -> Option<String> {
        self.get(MODIFICATION_TIME_KEY)
            .ok()
            .flatten()
            .map(|v| String::from_utf8_lossy(&v).into_owned())
    }

    /// Run `f` inside one atomic read-write transaction.
    pub fn update<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<T, StoreError>,
    {
        self.shared.update(f)
    }

    /// Overwrite the value of `key`.
    pub fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.update(|tx| {
            tx.put(key.as_bytes(), value.as_bytes());
            Ok(())
        })
    }

    /// Store `value` under `key`, or append it to the existing value after a newline.
    pub fn append(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.update(|tx| tx.append(key.as_bytes(), value.as_bytes()))
    }

    /// Same as [KeyValueStore::append], but coalesced with other concurrent calls into fewer
    /// commits. Returns immediately; the outcome is sent on `sink` exactly once.
    pub fn batch_append(
        &self,
        key: impl Into<String>,
        value: impl Into<String>,
        sink: &CompletionSink,
    ) {
        let call = BatchCall::new(key.into(), value.into(), sink.clone());
        match self.batcher.lock().as_ref() {
            Some(batcher) => batcher.submit(call),
            None => call.complete(Err(StoreError::Closed)),
        }
    }

    /// Value stored under `key`. A closed store has no values.
    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.shared.get(key.as_bytes())
    }

    /// Value stored under `key` as a string; absent keys read as an empty string.
    pub fn get_string(&self, key: &str) -> Result<String, StoreError> {
        Ok(self
            .get(key)?
            .map(|v| String::from_utf8_lossy(&v).into_owned())
            .unwrap_or_default())
    }

    pub fn is_closed(&self) -> bool {
        self.shared.db.read().is_none()
    }

    /// Flush pending batched appends and release the database handle.
    pub fn close(&self) {
        if let Some(batcher) = self.batcher.lock().take() {
            batcher.shutdown();
        }
        if self.shared.db.write().take().is_some() {
            info!("closing store {}", self.path.display());
        }
    }

    /// Close the store and remove its files.
    pub fn destroy(&self) -> Result<(), StoreError> {
        self.close();
        warn!("removing store {}", self.path.display());
        if self.path.exists() {
            DB::destroy(&Options::default(), &self.path)?;
        }
        if self.path.exists() {
            std::fs::remove_dir_all(&self.path)?;
        }
        Ok(())
    }
}

impl Drop for KeyValueStore {
    fn drop(&mut self) {
        self.close();
    }
}

fn open_with_timeout(path: &Path, timeout: Duration) -> Result<DB, StoreError> {
    let mut opts = Options::default();
    opts.create_if_missing(true);
    opts.create_missing_column_families(true);

    // a fresh store has no column families to list
    let column_families = DB::list_cf(&opts, path).unwrap_or_default();
    let deadline = Instant::now() + timeout;
    loop {
        let attempt = if column_families.is_empty() {
            DB::open(&opts, path)
        } else {
            DB::open_cf(&opts, path, &column_families)
        };
        match attempt {
            Ok(db) => return Ok(db),
            Err(e) if Instant::now() < deadline => {
                debug!("store {} not ready, retrying: {}", path.display(), e);
                thread::sleep(OPEN_RETRY_INTERVAL);
            }
            Err(source) => {
                return Err(StoreError::Open {
                    path: path.to_path_buf(),
                    source,
                })
            }
        }
    }
}

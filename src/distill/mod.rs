/*!
The grouping pipeline: ingest records into a scratch store, then aggregate and emit them per AS.

1. [ingest::store_records] reads every record, derives its grouping key and appends it to the
   store through a [scheduler::BatchScheduler], which bounds how many appends are in flight.
2. Once every append has been confirmed, [emit::dump_store] reads each key's blob back, reduces it
   with [aggregate::aggregate_record] and writes the JSON array.

[distill_file] runs both steps against a scratch store that is removed afterwards, whether the run
succeeded or not.
*/
pub mod aggregate;
pub mod emit;
pub mod ingest;
pub mod progress;
pub mod scheduler;

pub use aggregate::{aggregate_record, system_paths, unique_prefixes};
pub use emit::{dump_store, JsonArrayWriter};
pub use ingest::{store_records, IngestSummary};
pub use progress::{ProgressTracker, DEFAULT_UPDATE_INTERVAL};
pub use scheduler::{BatchAppender, BatchScheduler, DEFAULT_BATCH_SIZE};

use crate::error::DistillError;
use crate::io::get_reader;
use crate::store::{KeyValueStore, StoreOptions};
use crate::utils::store_path;
use log::{error, info};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Container holding all keys of a run.
pub const DEFAULT_CONTAINER: &str = "BGP";

#[derive(Debug, Clone)]
pub struct DistillConfig {
    /// Maximum number of store appends in flight.
    pub batch_size: usize,
    /// Accepted records between progress lines; 0 disables them.
    pub update_interval: u64,
    pub container: String,
    pub store_options: StoreOptions,
}

impl Default for DistillConfig {
    fn default() -> Self {
        DistillConfig {
            batch_size: DEFAULT_BATCH_SIZE,
            update_interval: DEFAULT_UPDATE_INTERVAL,
            container: DEFAULT_CONTAINER.to_string(),
            store_options: StoreOptions::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DistillSummary {
    /// Records accepted into the store.
    pub records: u64,
    /// Records dropped while reading.
    pub skipped: u64,
    /// Autonomous systems written to the output.
    pub autonomous_systems: usize,
    pub output: PathBuf,
    pub elapsed: Duration,
}

/// Distill the pipe-separated dump at `input` into a JSON array at `output`.
///
/// The scratch store lives next to `output` with a `.db` extension and is destroyed before
/// returning.
pub fn distill_file(
    input: &Path,
    output: &Path,
    config: &DistillConfig,
) -> Result<DistillSummary, DistillError> {
    let start = Instant::now();
    let store = KeyValueStore::create(store_path(output), config.store_options.clone())?;

    let result = distill_with_store(&store, input, output, config);
    if let Err(e) = store.destroy() {
        error!("failed to remove store {}: {}", store.path().display(), e);
    }

    let (ingest, autonomous_systems) = result?;
    Ok(DistillSummary {
        records: ingest.records,
        skipped: ingest.skipped,
        autonomous_systems,
        output: output.to_path_buf(),
        elapsed: start.elapsed(),
    })
}

fn distill_with_store(
    store: &KeyValueStore,
    input: &Path,
    output: &Path,
    config: &DistillConfig,
) -> Result<(IngestSummary, usize), DistillError> {
    // discard anything left by an interrupted run
    store.reset_container(&config.container)?;

    let reader = get_reader(input)?;
    let ingest = store_records(reader, store, config)?;

    info!("dumping store to file {}", output.display());
    let file = File::create(output)?;
    let written = dump_store(store, ingest.asns.keys(), BufWriter::new(file))?;
    Ok((ingest, written))
}

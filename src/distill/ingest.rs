use crate::distill::progress::ProgressTracker;
use crate::distill::scheduler::{BatchAppender, BatchScheduler};
use crate::distill::DistillConfig;
use crate::error::DistillError;
use crate::psv::DumpRecordIter;
use log::{info, warn};
use std::collections::HashMap;
use std::io::BufRead;
use std::time::{Duration, Instant};

/// Outcome of storing every record of one input.
#[derive(Debug, Default, Clone)]
pub struct IngestSummary {
    /// Records accepted and appended to the store.
    pub records: u64,
    /// Records dropped for being malformed or having no grouping key.
    pub skipped: u64,
    /// Accepted records per grouping key. Its key set drives emission.
    pub asns: HashMap<String, u64>,
    pub elapsed: Duration,
}

/// Append every record from `reader` to `store` under the last AS of its expanded path.
///
/// Returns once all appends have been confirmed, or with the first failed append.
pub fn store_records<R, S>(
    reader: R,
    store: &S,
    config: &DistillConfig,
) -> Result<IngestSummary, DistillError>
where
    R: BufRead,
    S: BatchAppender + ?Sized,
{
    let start = Instant::now();
    let mut scheduler = BatchScheduler::new(store, config.batch_size);
    let mut progress = ProgressTracker::new(config.update_interval);
    let mut asns: HashMap<String, u64> = HashMap::new();
    let mut skipped = 0;

    for item in DumpRecordIter::new(reader) {
        let mut record = match item {
            Ok(record) => record,
            Err(DistillError::MalformedRecord(msg)) => {
                warn!("skipping record: {}", msg);
                skipped += 1;
                continue;
            }
            Err(e) => return Err(e),
        };

        record.expand_as_path();
        let key = match record.grouping_key() {
            Some(key) => key.to_string(),
            None => {
                warn!("no key for record {:?}", record.to_line());
                skipped += 1;
                continue;
            }
        };

        *asns.entry(key.clone()).or_default() += 1;
        scheduler.submit(&key, record.to_line())?;
        progress.observe(scheduler.submitted());
    }

    let records = scheduler.finish()?;
    let elapsed = start.elapsed();
    info!("processed {} total records in {:?}", records, elapsed);
    if skipped > 0 {
        info!("skipped {} records", skipped);
    }

    Ok(IngestSummary {
        records,
        skipped,
        asns,
        elapsed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::{KeyValueStore, StoreOptions};
    use std::io::Cursor;

    const INPUT: &str = "\
TABLE_DUMP2|1474983369|B|212.25.27.44|8758|0.0.0.0/0|8758 6830|IGP|212.25.27.44|0|0|8758:110|NAG||
TABLE_DUMP2|1474983370|B|212.25.27.44|8758|10.0.0.0/8|8758 {3356,6830}|IGP|212.25.27.44|0|0||NAG||
TABLE_DUMP2|1474983371|B|212.25.27.44|8758|10.1.0.0/16||IGP|212.25.27.44|0|0||NAG||
garbage
TABLE_DUMP2|1474983372|B|212.25.27.44|8758|10.2.0.0/16|8758 3356 6830|IGP|212.25.27.44|0|0||NAG||
";

    fn config(batch_size: usize) -> DistillConfig {
        DistillConfig {
            batch_size,
            ..Default::default()
        }
    }

    #[test]
    fn test_store_records() {
        let dir = tempfile::tempdir().unwrap();
        let store =
            KeyValueStore::create(dir.path().join("ingest.db"), StoreOptions::default()).unwrap();
        store.set_container("BGP").unwrap();

        let summary = store_records(Cursor::new(INPUT), &store, &config(2)).unwrap();
        assert_eq!(summary.records, 3);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.asns.len(), 1);
        assert_eq!(summary.asns["6830"], 3);

        let blob = store.get_string("6830").unwrap();
        let lines: Vec<&str> = blob.split('\n').collect();
        assert_eq!(lines.len(), 3);
        assert!(lines.contains(
            &"TABLE_DUMP2|1474983370|B|212.25.27.44|8758|10.0.0.0/8|8758 3356 6830|IGP|212.25.27.44|0|0||NAG||"
        ));
    }

    #[test]
    fn test_failed_append_aborts_ingestion() {
        let dir = tempfile::tempdir().unwrap();
        let store =
            KeyValueStore::create(dir.path().join("fail.db"), StoreOptions::default()).unwrap();

        // no container selected, so every batched append fails
        let result = store_records(Cursor::new(INPUT), &store, &config(2));
        assert!(matches!(
            result,
            Err(DistillError::BatchWrite(StoreError::NoContainer))
        ));
    }

    #[test]
    fn test_whole_input_is_drained() {
        let dir = tempfile::tempdir().unwrap();
        let store =
            KeyValueStore::create(dir.path().join("drain.db"), StoreOptions::default()).unwrap();
        store.set_container("BGP").unwrap();

        let input: String = (0..2501)
            .map(|i| {
                format!(
                    "TABLE_DUMP2|{}|B|10.0.0.1|1|10.0.0.0/8|1 {}|IGP\n",
                    i,
                    i % 7
                )
            })
            .collect();
        let summary = store_records(Cursor::new(input), &store, &config(1000)).unwrap();
        assert_eq!(summary.records, 2501);

        let stored: usize = summary
            .asns
            .keys()
            .map(|key| store.get_string(key).unwrap().split('\n').count())
            .sum();
        assert_eq!(stored, 2501);
    }
}

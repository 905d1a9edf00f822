//! Background batcher behind [KeyValueStore::batch_append](super::KeyValueStore::batch_append).
//!
//! Calls are queued to a single thread which collects up to `max_batch_size` of them, or as many
//! as arrive within `max_batch_delay` of the first one, and applies them in arrival order inside
//! one transaction. If that combined transaction fails, each call is retried in a transaction of
//! its own so that only the failing call reports an error.
use super::{CompletionSink, Shared};
use crate::error::StoreError;
use crossbeam_channel::{unbounded, Receiver, SendError, Sender};
use log::{debug, error};
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// One queued append. Dropping a call that was never completed reports [StoreError::Closed].
pub(super) struct BatchCall {
    key: String,
    value: String,
    sink: Option<CompletionSink>,
}

impl BatchCall {
    pub(super) fn new(key: String, value: String, sink: CompletionSink) -> Self {
        BatchCall {
            key,
            value,
            sink: Some(sink),
        }
    }

    pub(super) fn complete(mut self, result: Result<(), StoreError>) {
        if let Some(sink) = self.sink.take() {
            // the caller may have stopped listening after an earlier failure
            let _ = sink.send(result);
        }
    }

    fn apply(&self, shared: &Shared) -> Result<(), StoreError> {
        shared.update(|tx| tx.append(self.key.as_bytes(), self.value.as_bytes()))
    }
}

impl Drop for BatchCall {
    fn drop(&mut self) {
        if let Some(sink) = self.sink.take() {
            let _ = sink.send(Err(StoreError::Closed));
        }
    }
}

pub(super) struct Batcher {
    calls: Sender<BatchCall>,
    handle: JoinHandle<()>,
}

impl Batcher {
    pub(super) fn spawn(
        shared: Arc<Shared>,
        max_batch_size: usize,
        max_batch_delay: Duration,
    ) -> io::Result<Self> {
        let (calls, queue) = unbounded();
        let max_batch_size = max_batch_size.max(1);
        let handle = thread::Builder::new()
            .name("store-batcher".to_string())
            .spawn(move || run(&shared, &queue, max_batch_size, max_batch_delay))?;
        Ok(Batcher { calls, handle })
    }

    pub(super) fn submit(&self, call: BatchCall) {
        if let Err(SendError(call)) = self.calls.send(call) {
            call.complete(Err(StoreError::Closed));
        }
    }

    /// Stop accepting calls, commit whatever is queued and wait for the thread to exit.
    pub(super) fn shutdown(self) {
        drop(self.calls);
        if self.handle.join().is_err() {
            error!("store batcher thread panicked");
        }
    }
}

fn run(
    shared: &Shared,
    queue: &Receiver<BatchCall>,
    max_batch_size: usize,
    max_batch_delay: Duration,
) {
    while let Ok(first) = queue.recv() {
        let deadline = Instant::now() + max_batch_delay;
        let mut pending = Vec::with_capacity(max_batch_size);
        pending.push(first);
        while pending.len() < max_batch_size {
            match queue.recv_deadline(deadline) {
                Ok(call) => pending.push(call),
                Err(_) => break,
            }
        }
        commit(shared, pending);
    }
}

fn commit(shared: &Shared, pending: Vec<BatchCall>) {
    let combined = shared.update(|tx| {
        for call in &pending {
            tx.append(call.key.as_bytes(), call.value.as_bytes())?;
        }
        Ok(())
    });

    match combined {
        Ok(()) => {
            for call in pending {
                call.complete(Ok(()));
            }
        }
        Err(e) if pending.len() == 1 => {
            if let Some(call) = pending.into_iter().next() {
                call.complete(Err(e));
            }
        }
        Err(e) => {
            debug!(
                "coalesced commit of {} appends failed ({}), retrying one by one",
                pending.len(),
                e
            );
            for call in pending {
                let result = call.apply(shared);
                call.complete(result);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::{bounded, Receiver};
    use parking_lot::{Mutex, RwLock};
    use rocksdb::{Options, DB};

    fn closed_shared() -> Shared {
        Shared {
            db: RwLock::new(None),
            container: RwLock::new(None),
            writer: Mutex::new(()),
        }
    }

    fn calls(count: usize) -> (Vec<BatchCall>, Receiver<Result<(), StoreError>>) {
        let (sink, completions) = bounded(count);
        let calls = (0..count)
            .map(|i| BatchCall::new("k".to_string(), i.to_string(), sink.clone()))
            .collect();
        (calls, completions)
    }

    /// Collect every completion once all senders are gone.
    fn drain(completions: Receiver<Result<(), StoreError>>) -> Vec<Result<(), StoreError>> {
        completions.iter().collect()
    }

    #[test]
    fn test_failed_coalesced_commit_reports_each_call_once() {
        let shared = closed_shared();
        let (pending, completions) = calls(3);
        commit(&shared, pending);

        let results = drain(completions);
        assert_eq!(results.len(), 3);
        assert!(results
            .iter()
            .all(|r| matches!(r, Err(StoreError::Closed))));
    }

    #[test]
    fn test_failed_single_call() {
        let shared = closed_shared();
        let (pending, completions) = calls(1);
        commit(&shared, pending);

        let results = drain(completions);
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(StoreError::Closed)));
    }

    #[test]
    fn test_commit_without_container_fails_each_call() {
        let dir = tempfile::tempdir().unwrap();
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let shared = Shared {
            db: RwLock::new(Some(DB::open(&opts, dir.path().join("batch.db")).unwrap())),
            container: RwLock::new(None),
            writer: Mutex::new(()),
        };
        let (pending, completions) = calls(4);
        commit(&shared, pending);

        let results = drain(completions);
        assert_eq!(results.len(), 4);
        assert!(results
            .iter()
            .all(|r| matches!(r, Err(StoreError::NoContainer))));
    }

    #[test]
    fn test_successful_commit_applies_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let mut db = DB::open(&opts, dir.path().join("batch.db")).unwrap();
        db.create_cf("c", &Options::default()).unwrap();
        let shared = Shared {
            db: RwLock::new(Some(db)),
            container: RwLock::new(Some("c".to_string())),
            writer: Mutex::new(()),
        };
        let (pending, completions) = calls(3);
        commit(&shared, pending);

        assert!(drain(completions).iter().all(|r| r.is_ok()));
        assert_eq!(shared.get(b"k").unwrap(), Some(b"0\n1\n2".to_vec()));
    }

    #[test]
    fn test_dropped_call_reports_closed() {
        let (pending, completions) = calls(2);
        let mut pending = pending.into_iter();
        if let Some(first) = pending.next() {
            first.complete(Ok(()));
        }
        drop(pending);

        let results = drain(completions);
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(StoreError::Closed)));
    }
}

/*!
Bounded scheduling of batched store appends.

Every accepted record becomes one asynchronous [BatchAppender::batch_append] call. The scheduler
lets at most `batch_size` of those be outstanding: once that many have been submitted it blocks
until exactly that many completions have come back, and the first failed completion aborts the
run. [BatchScheduler::finish] drains the final partial window, so after it returns every
submitted append has been committed.

Each window gets its own completion channel. The scheduler drops its sender before draining, so
an append whose sink is dropped without a result ends the drain with
[DistillError::CompletionLost] instead of waiting forever.
*/
use crate::error::{DistillError, StoreError};
use crate::store::{CompletionSink, KeyValueStore};
use crossbeam_channel::{bounded, Receiver};
use log::debug;

/// Number of appends allowed in flight before the scheduler drains completions.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Something that can append asynchronously and report back on a completion sink.
pub trait BatchAppender {
    /// Append `value` to `key`, sending exactly one result on `sink` when done.
    fn batch_append(&self, key: &str, value: String, sink: &CompletionSink);
}

impl BatchAppender for KeyValueStore {
    fn batch_append(&self, key: &str, value: String, sink: &CompletionSink) {
        KeyValueStore::batch_append(self, key, value, sink)
    }
}

pub struct BatchScheduler<'a, S: BatchAppender + ?Sized> {
    store: &'a S,
    batch_size: usize,
    /// Sender of the current window; `None` from a drain until the next submit.
    sink: Option<CompletionSink>,
    completions: Receiver<Result<(), StoreError>>,
    outstanding: usize,
    submitted: u64,
}

impl<'a, S: BatchAppender + ?Sized> BatchScheduler<'a, S> {
    pub fn new(store: &'a S, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        let (sink, completions) = bounded(batch_size);
        BatchScheduler {
            store,
            batch_size,
            sink: Some(sink),
            completions,
            outstanding: 0,
            submitted: 0,
        }
    }

    /// Launch an append of `value` to `key`, draining the window once it is full.
    pub fn submit(&mut self, key: &str, value: String) -> Result<(), DistillError> {
        let batch_size = self.batch_size;
        let completions = &mut self.completions;
        let sink = self.sink.get_or_insert_with(|| {
            let (sink, receiver) = bounded(batch_size);
            *completions = receiver;
            sink
        });
        self.store.batch_append(key, value, sink);
        self.outstanding += 1;
        self.submitted += 1;

        if self.outstanding == self.batch_size {
            self.drain()?;
        }
        Ok(())
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Appends submitted but not yet confirmed.
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Appends submitted so far.
    pub fn submitted(&self) -> u64 {
        self.submitted
    }

    /// Drain the remaining partial window. Returns the total number of appends submitted.
    pub fn finish(mut self) -> Result<u64, DistillError> {
        self.drain()?;
        Ok(self.submitted)
    }

    fn drain(&mut self) -> Result<(), DistillError> {
        debug!("draining {} batch completions", self.outstanding);
        self.sink = None;
        while self.outstanding > 0 {
            let completion = self
                .completions
                .recv()
                .map_err(|_| DistillError::CompletionLost {
                    outstanding: self.outstanding,
                })?;
            self.outstanding -= 1;
            completion.map_err(DistillError::BatchWrite)?;
        }
        Ok(())
    }
}

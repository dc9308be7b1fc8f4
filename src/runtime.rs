//! Drives the conversion of many chunks on a worker pool and the final flush.

use crate::barrier::FlushCoordinator;
use crate::convert::{ChunkConverter, Conversion, ConversionStats};
use crate::error::{RunError, StoreError};
use crate::position::ChunkPosition;
use crate::provider::RegionSet;
use crate::store::{ChunkStore, FlushReport};
use log::{error, info, warn};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Lifecycle of one chunk conversion.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Decoding,
    Resolved,
    Written,
    Completed,
    Failed,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed)
    }

    fn next(self) -> Option<TaskState> {
        use TaskState::*;
        match self {
            Pending => Some(Decoding),
            Decoding => Some(Resolved),
            Resolved => Some(Written),
            Written => Some(Completed),
            Completed | Failed => None,
        }
    }
}

/// One requested chunk in flight.
#[derive(Debug, Clone)]
pub struct ConversionTask {
    position: ChunkPosition,
    history: Vec<TaskState>,
    placeholder: bool,
    stats: ConversionStats,
    error: Option<String>,
}

impl ConversionTask {
    pub fn new(position: ChunkPosition) -> Self {
        ConversionTask {
            position,
            history: vec![TaskState::Pending],
            placeholder: false,
            stats: ConversionStats::default(),
            error: None,
        }
    }

    pub fn position(&self) -> ChunkPosition {
        self.position
    }

    pub fn state(&self) -> TaskState {
        self.history.last().copied().unwrap_or(TaskState::Pending)
    }

    /// Every state the task went through, starting with `Pending`.
    pub fn history(&self) -> &[TaskState] {
        &self.history
    }

    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    pub fn stats(&self) -> ConversionStats {
        self.stats
    }

    /// Reason of a failed task.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Moves to the next state of the lifecycle. Skipping a state or leaving a
    /// terminal state is refused.
    pub fn advance(&mut self, state: TaskState) -> bool {
        if self.state().next() != Some(state) {
            warn!(
                target: "anvil-convert",
                "Chunk {}: refused transition {:?} -> {:?}",
                self.position,
                self.state(),
                state
            );
            return false;
        }

        self.history.push(state);
        true
    }

    pub fn fail<S: Into<String>>(&mut self, reason: S) -> bool {
        if self.state().is_terminal() {
            return false;
        }

        self.error = Some(reason.into());
        self.history.push(TaskState::Failed);
        true
    }
}

/// Chunks to convert: every chunk with `-radius <= x < radius` and
/// `-radius <= z < radius`, or every present column without a radius.
pub fn requested_chunks(radius: Option<u32>, regions: &RegionSet) -> Vec<ChunkPosition> {
    match radius {
        Some(radius) => {
            let radius = radius.min(i32::MAX as u32) as i32;

            (-radius..radius)
                .flat_map(|x| (-radius..radius).map(move |z| ChunkPosition::new(x, z)))
                .collect()
        }
        None => regions.chunk_positions(),
    }
}

/// Outcome of a whole run.
#[derive(Debug)]
pub struct RunSummary {
    pub tasks: Vec<ConversionTask>,
    pub flush: FlushReport,
}

impl RunSummary {
    pub fn completed(&self) -> usize {
        self.count(TaskState::Completed)
    }

    pub fn failed(&self) -> usize {
        self.count(TaskState::Failed)
    }

    pub fn placeholders(&self) -> usize {
        self.tasks.iter().filter(|t| t.is_placeholder()).count()
    }

    /// Voxel and biome statistics summed over every task.
    pub fn stats(&self) -> ConversionStats {
        self.tasks
            .iter()
            .fold(ConversionStats::default(), |mut total, task| {
                let stats = task.stats();
                total.written += stats.written;
                total.unset += stats.unset;
                total.skipped += stats.skipped;
                total.biome_fallbacks += stats.biome_fallbacks;
                total
            })
    }

    fn count(&self, state: TaskState) -> usize {
        self.tasks.iter().filter(|t| t.state() == state).count()
    }
}

/// Converts a list of chunks concurrently, saves every batch and flushes the
/// store once all of them completed.
pub struct ConversionRun {
    converter: Arc<ChunkConverter>,
    store: Arc<dyn ChunkStore>,
    threads: Option<usize>,
}

impl ConversionRun {
    pub fn new(converter: Arc<ChunkConverter>, store: Arc<dyn ChunkStore>) -> Self {
        ConversionRun {
            converter,
            store,
            threads: None,
        }
    }

    /// Worker count, defaults to one per logical CPU.
    pub fn threads(mut self, threads: Option<usize>) -> Self {
        self.threads = threads;
        self
    }

    pub fn run(self, chunks: &[ChunkPosition]) -> Result<RunSummary, RunError> {
        let store = self.store.clone();
        let coordinator = FlushCoordinator::new(chunks.len(), move || store.flush());

        let mut builder = ThreadPoolBuilder::new();
        if let Some(threads) = self.threads {
            builder = builder.num_threads(threads);
        }
        let pool = builder.build()?;

        info!(
            target: "anvil-convert",
            "Converting {} chunks on {} workers",
            chunks.len(),
            pool.current_num_threads()
        );

        let tasks: Vec<ConversionTask> = pool.install(|| {
            chunks
                .par_iter()
                .map(|&position| {
                    let task = self.run_task(position);
                    coordinator.complete();
                    task
                })
                .collect()
        });

        info!(target: "anvil-convert", "saving");
        let flush = coordinator.wait().ok_or(RunError::FlushPanicked)??;
        info!(target: "anvil-convert", "done");

        Ok(RunSummary { tasks, flush })
    }

    /// Always returns a task in a terminal state.
    fn run_task(&self, position: ChunkPosition) -> ConversionTask {
        let mut task = ConversionTask::new(position);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| -> Result<(), StoreError> {
            task.advance(TaskState::Decoding);
            let Conversion { mut batch, stats } = self.converter.convert(position);

            for populator in self.converter.populators() {
                populator.populate(&mut batch);
            }

            task.advance(TaskState::Resolved);
            task.placeholder = batch.is_placeholder();
            task.stats = stats;

            self.store.save(batch)?;
            task.advance(TaskState::Written);

            Ok(())
        }));

        match outcome {
            Ok(Ok(())) => {
                task.advance(TaskState::Completed);
            }
            Ok(Err(e)) => {
                error!(target: "anvil-convert", "Chunk {}: failed to save: {}", position, e);
                task.fail(e.to_string());
            }
            Err(panic) => {
                let reason = panic_message(&*panic);
                error!(target: "anvil-convert", "Chunk {}: conversion panicked: {}", position, reason);
                task.fail(reason);
            }
        }

        task
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_owned()
    }
}

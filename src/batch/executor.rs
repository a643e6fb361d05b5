//! Bounded-concurrency batch executor
//!
//! Runs a list of task thunks with at most `concurrency_limit` of them in
//! flight at any time:
//! - Dispatch is greedy and strictly index-ascending; a freed slot is
//!   refilled with the next undispatched task
//! - Results come back index-aligned with the input, whatever order the
//!   tasks finish in
//! - The first observed failure settles the batch; nothing is dispatched
//!   after it
//!
//! Coordination happens on a single control flow polling a
//! [`FuturesUnordered`], so the cursor, counters and result buffer need no
//! locking.

use std::future::Future;
use std::panic;
use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::batch::{BatchConfig, BatchError, BatchStats, InFlightPolicy, ProgressCallback};

/// Run `tasks` with at most `concurrency_limit` in flight.
///
/// Each thunk is invoked at most once, at dispatch time. On the first task
/// error the batch fails with [`BatchError::TaskFailure`] carrying that
/// task's index; tasks still in flight are dropped, which cancels them at
/// their next await point. Does not need a tokio runtime.
///
/// ```
/// use bounded_batch::run_batch;
///
/// # tokio_test::block_on(async {
/// let tasks = (1..=3).map(|i| move || async move { Ok::<_, std::io::Error>(i * 10) });
/// let results = run_batch(tasks, 2).await.unwrap();
/// assert_eq!(results, vec![10, 20, 30]);
/// # });
/// ```
pub async fn run_batch<I, F, Fut, T, E>(
    tasks: I,
    concurrency_limit: usize,
) -> Result<Vec<T>, BatchError<E>>
where
    I: IntoIterator<Item = F>,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let tasks: Vec<F> = tasks.into_iter().collect();
    drive(tasks, concurrency_limit, None, |index, task| {
        dispatch_inline(index, task)
    })
    .await
    .map(|(results, _)| results)
}

/// Like [`run_batch`], but every dispatched task is spawned onto the tokio
/// runtime.
///
/// When a task fails, siblings that are already running are detached: they
/// keep running to completion in the background and their outcomes are
/// ignored. Undispatched tasks are still never invoked.
pub async fn run_batch_detached<I, F, Fut, T, E>(
    tasks: I,
    concurrency_limit: usize,
) -> Result<Vec<T>, BatchError<E>>
where
    I: IntoIterator<Item = F>,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    let tasks: Vec<F> = tasks.into_iter().collect();
    drive(tasks, concurrency_limit, None, |index, task| {
        dispatch_spawned(index, task)
    })
    .await
    .map(|(results, _)| results)
}

/// Invoke the thunk now; the returned future only awaits it.
fn dispatch_inline<F, Fut, T, E>(
    index: usize,
    task: F,
) -> impl Future<Output = Result<T, BatchError<E>>>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let running = task();
    async move {
        running
            .await
            .map_err(|source| BatchError::TaskFailure { index, source })
    }
}

/// Invoke the thunk now and hand its future to the runtime. Dropping the
/// returned future detaches the task instead of cancelling it.
fn dispatch_spawned<F, Fut, T, E>(
    index: usize,
    task: F,
) -> impl Future<Output = Result<T, BatchError<E>>>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    let handle = tokio::spawn(task());
    async move {
        match handle.await {
            Ok(outcome) => outcome.map_err(|source| BatchError::TaskFailure { index, source }),
            Err(join_err) if join_err.is_panic() => panic::resume_unwind(join_err.into_panic()),
            Err(_) => Err(BatchError::Aborted { index }),
        }
    }
}

/// Core dispatch loop shared by every entry point.
#[instrument(
    skip_all,
    fields(batch_id = %Uuid::new_v4(), task_count = tasks.len(), concurrency_limit = concurrency_limit)
)]
async fn drive<F, T, E, D, DFut>(
    tasks: Vec<F>,
    concurrency_limit: usize,
    progress: Option<&ProgressCallback>,
    mut dispatch: D,
) -> Result<(Vec<T>, BatchStats), BatchError<E>>
where
    D: FnMut(usize, F) -> DFut,
    DFut: Future<Output = Result<T, BatchError<E>>>,
{
    if concurrency_limit == 0 {
        return Err(BatchError::InvalidArgument(
            "concurrency limit must be a positive integer, got 0".to_string(),
        ));
    }

    let total = tasks.len();
    let started = Instant::now();
    let mut stats = BatchStats {
        total_tasks: total,
        ..Default::default()
    };

    if total == 0 {
        debug!("No tasks to execute in batch");
        return Ok((Vec::new(), stats));
    }

    let mut slots: Vec<Option<T>> = std::iter::repeat_with(|| None).take(total).collect();
    let mut pending = tasks.into_iter().enumerate();
    let mut in_flight = FuturesUnordered::new();

    loop {
        // Refill free slots in index order
        while in_flight.len() < concurrency_limit {
            let Some((index, task)) = pending.next() else {
                break;
            };
            debug!(index, in_flight = in_flight.len() + 1, "Dispatching task");
            in_flight.push(dispatch(index, task).map(move |outcome| (index, outcome)));
            stats.dispatched += 1;
            stats.peak_in_flight = stats.peak_in_flight.max(in_flight.len());
        }

        let Some((index, outcome)) = in_flight.next().await else {
            break;
        };

        match outcome {
            Ok(value) => {
                slots[index] = Some(value);
                stats.completed += 1;
                debug!(index, completed = stats.completed, "Task completed");
                if let Some(callback) = progress {
                    callback(stats.completed, total);
                }
            }
            Err(err) => {
                warn!(
                    index,
                    dispatched = stats.dispatched,
                    abandoned = in_flight.len(),
                    never_started = total - stats.dispatched,
                    "Task failed, abandoning batch"
                );
                return Err(err);
            }
        }
    }

    stats.duration = started.elapsed();
    info!(
        total_tasks = total,
        peak_in_flight = stats.peak_in_flight,
        duration_ms = stats.duration.as_millis() as u64,
        "Batch execution completed"
    );

    let results: Vec<T> = slots.into_iter().flatten().collect();
    debug_assert_eq!(results.len(), total);
    Ok((results, stats))
}

/// Configurable batch executor.
///
/// [`execute`](Self::execute) takes `Send + 'static` tasks so that either
/// policy can be chosen at runtime. Tasks that borrow from the caller go
/// through [`execute_borrowed`](Self::execute_borrowed), which only runs
/// under [`InFlightPolicy::Cancel`].
pub struct BatchExecutor {
    config: BatchConfig,
    progress_callback: Option<Arc<ProgressCallback>>,
}

impl BatchExecutor {
    /// Create a new batch executor with default settings
    pub fn new() -> Self {
        Self::from_config(BatchConfig::default())
    }

    /// Create an executor from a loaded configuration
    pub fn from_config(config: BatchConfig) -> Self {
        Self {
            config,
            progress_callback: None,
        }
    }

    /// Set concurrency limit (number of tasks in flight).
    ///
    /// Zero is accepted here and rejected when the batch runs.
    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.config.concurrency_limit = limit;
        self
    }

    /// Set what happens to in-flight tasks after a failure
    pub fn with_in_flight_policy(mut self, policy: InFlightPolicy) -> Self {
        self.config.in_flight = policy;
        self
    }

    /// Set progress callback
    pub fn with_progress_callback<C>(mut self, callback: C) -> Self
    where
        C: Fn(usize, usize) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(Box::new(callback)));
        self
    }

    /// Active configuration
    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Execute a batch and return its index-ordered results
    pub async fn execute<I, F, Fut, T, E>(&self, tasks: I) -> Result<Vec<T>, BatchError<E>>
    where
        I: IntoIterator<Item = F>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        self.execute_with_stats(tasks)
            .await
            .map(|(results, _)| results)
    }

    /// Execute a batch, also returning execution statistics
    pub async fn execute_with_stats<I, F, Fut, T, E>(
        &self,
        tasks: I,
    ) -> Result<(Vec<T>, BatchStats), BatchError<E>>
    where
        I: IntoIterator<Item = F>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let tasks: Vec<F> = tasks.into_iter().collect();
        let limit = self.config.concurrency_limit;
        let progress = self.progress_callback.as_deref();

        match self.config.in_flight {
            InFlightPolicy::Cancel => {
                drive(tasks, limit, progress, |index, task| {
                    dispatch_inline(index, task)
                })
                .await
            }
            InFlightPolicy::Detach => {
                drive(tasks, limit, progress, |index, task| {
                    dispatch_spawned(index, task)
                })
                .await
            }
        }
    }

    /// Execute a batch of tasks that need not be `Send` or `'static`
    pub async fn execute_borrowed<I, F, Fut, T, E>(&self, tasks: I) -> Result<Vec<T>, BatchError<E>>
    where
        I: IntoIterator<Item = F>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute_borrowed_with_stats(tasks)
            .await
            .map(|(results, _)| results)
    }

    /// Like [`execute_borrowed`](Self::execute_borrowed), also returning
    /// execution statistics.
    ///
    /// Borrowed tasks cannot outlive the call, so an [`InFlightPolicy::Detach`]
    /// configuration is rejected with [`BatchError::InvalidArgument`] before
    /// anything is dispatched.
    pub async fn execute_borrowed_with_stats<I, F, Fut, T, E>(
        &self,
        tasks: I,
    ) -> Result<(Vec<T>, BatchStats), BatchError<E>>
    where
        I: IntoIterator<Item = F>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if self.config.in_flight == InFlightPolicy::Detach {
            return Err(BatchError::InvalidArgument(
                "detach policy needs 'static tasks, use execute instead".to_string(),
            ));
        }

        let tasks: Vec<F> = tasks.into_iter().collect();
        drive(
            tasks,
            self.config.concurrency_limit,
            self.progress_callback.as_deref(),
            |index, task| dispatch_inline(index, task),
        )
        .await
    }
}

impl Default for BatchExecutor {
    fn default() -> Self {
        Self::new()
    }
}

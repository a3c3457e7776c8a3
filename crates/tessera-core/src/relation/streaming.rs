//! Asynchronous evaluation.
//!
//! [`StreamingEvaluable`] hands each evaluation to an [`Executor`] and returns
//! immediately; results arrive on a channel as they complete. The default
//! [`ThreadExecutor`] owns one worker thread and runs jobs in submission order,
//! so its results arrive in submission order too. Other executors make no
//! ordering promise.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::JoinHandle;

use parking_lot::Mutex;

use crate::collect::PackedCollection;
use crate::error::{Error, Result};

use super::evaluable::Evaluable;

/// A unit of work submitted to an [`Executor`].
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs submitted jobs somewhere other than the calling thread.
pub trait Executor: Send + Sync {
    /// Schedules `job`. Must not block until the job completes.
    fn execute(&self, job: Job);
}

/// Executor backed by a single dedicated worker thread.
pub struct ThreadExecutor {
    sender: Mutex<Option<Sender<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ThreadExecutor {
    /// Spawns the worker thread.
    pub fn spawn() -> Result<Self> {
        let (sender, receiver) = mpsc::channel::<Job>();
        let worker = std::thread::Builder::new()
            .name("tessera-eval".into())
            .spawn(move || {
                for job in receiver {
                    job();
                }
            })
            .map_err(|e| Error::execution(format!("failed to spawn evaluation thread: {e}")))?;
        Ok(Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        })
    }
}

impl Executor for ThreadExecutor {
    fn execute(&self, job: Job) {
        if let Some(sender) = self.sender.lock().as_ref() {
            if sender.send(job).is_err() {
                tracing::warn!("evaluation thread has exited; job dropped");
            }
        }
    }
}

impl Drop for ThreadExecutor {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop once queued jobs finish.
        self.sender.lock().take();
        if let Some(worker) = self.worker.lock().take() {
            let _ = worker.join();
        }
    }
}

/// Non-blocking wrapper around an evaluable.
pub struct StreamingEvaluable<T> {
    inner: Arc<dyn Evaluable<T>>,
    executor: Arc<dyn Executor>,
    sender: Sender<Result<T>>,
    receiver: Receiver<Result<T>>,
}

impl<T: Send + 'static> StreamingEvaluable<T> {
    /// Wraps `inner`, dispatching evaluations to `executor`.
    pub fn new(inner: Arc<dyn Evaluable<T>>, executor: Arc<dyn Executor>) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            inner,
            executor,
            sender,
            receiver,
        }
    }

    /// Submits an evaluation and returns without waiting for it.
    pub fn submit(&self, args: Vec<PackedCollection>) {
        let inner = Arc::clone(&self.inner);
        let sender = self.sender.clone();
        self.executor.execute(Box::new(move || {
            let _ = sender.send(inner.evaluate(&args));
        }));
    }

    /// Channel on which completed results arrive.
    pub fn results(&self) -> &Receiver<Result<T>> {
        &self.receiver
    }

    /// Blocks until the next result arrives.
    pub fn next_result(&self) -> Result<T> {
        self.receiver
            .recv()
            .map_err(|_| Error::execution("result stream closed"))?
    }
}

/// Adds [`into_async`](EvaluableExt::into_async) to shared evaluables.
pub trait EvaluableExt<T> {
    /// Wraps the evaluable for asynchronous execution.
    ///
    /// With no executor a dedicated [`ThreadExecutor`] is spawned.
    fn into_async(self, executor: Option<Arc<dyn Executor>>) -> Result<StreamingEvaluable<T>>;
}

impl<T: Send + 'static> EvaluableExt<T> for Arc<dyn Evaluable<T>> {
    fn into_async(self, executor: Option<Arc<dyn Executor>>) -> Result<StreamingEvaluable<T>> {
        let executor = match executor {
            Some(executor) => executor,
            None => Arc::new(ThreadExecutor::spawn()?),
        };
        Ok(StreamingEvaluable::new(self, executor))
    }
}

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, error, info, warn};

use crate::error::WorkerError;
use crate::pipeline::Pipeline;
use crate::worker::job::WorkItem;

const RECV_TIMEOUT: Duration = Duration::from_millis(100);

/// Fixed set of OS threads running pipelines from a shared queue.
///
/// The queue is unbounded; submission never blocks. Outcomes are logged, the
/// durable stores hold the actual results.
pub struct WorkerPool {
    job_sender: Sender<WorkItem>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    pub fn new(pipeline: Arc<Pipeline>, worker_count: usize) -> Result<Self, WorkerError> {
        if worker_count == 0 {
            return Err(WorkerError::SpawnFailed(
                "worker_count must be > 0".to_string(),
            ));
        }
        let (job_sender, job_receiver) = unbounded::<WorkItem>();
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let job_rx = job_receiver.clone();
            let shutdown_flag = Arc::clone(&shutdown);
            let worker_pipeline = Arc::clone(&pipeline);

            let handle = thread::Builder::new()
                .name(format!("docpipe-worker-{}", worker_id))
                .spawn(move || run_worker(worker_id, job_rx, shutdown_flag, worker_pipeline))
                .map_err(|e| WorkerError::SpawnFailed(e.to_string()))?;

            workers.push(handle);
        }

        info!("Started {} workers", worker_count);

        Ok(Self {
            job_sender,
            workers,
            shutdown,
        })
    }

    pub fn submit(&self, item: WorkItem) -> Result<(), WorkerError> {
        if self.shutdown.load(Ordering::Relaxed) {
            return Err(WorkerError::ChannelClosed);
        }

        self.job_sender
            .send(item)
            .map_err(|_| WorkerError::ChannelClosed)
    }

    /// Number of jobs waiting for a worker.
    pub fn queued(&self) -> usize {
        self.job_sender.len()
    }

    /// Stops accepting work. Workers exit after their current job.
    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Processes everything still queued (unless shut down) and joins all workers.
    pub fn wait(self) {
        // Drop sender to signal workers to exit once the queue is empty
        drop(self.job_sender);

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

fn run_worker(
    worker_id: usize,
    job_receiver: Receiver<WorkItem>,
    shutdown: Arc<AtomicBool>,
    pipeline: Arc<Pipeline>,
) {
    debug!("Worker {} started", worker_id);

    loop {
        if shutdown.load(Ordering::Relaxed) {
            debug!("Worker {} received shutdown signal", worker_id);
            break;
        }

        match job_receiver.recv_timeout(RECV_TIMEOUT) {
            Ok(item) => {
                let job_id = item.job_id.clone();
                debug!("Worker {} processing job {}", worker_id, job_id);

                match panic::catch_unwind(AssertUnwindSafe(|| pipeline.run(item))) {
                    Ok(Ok(report)) => info!(
                        "Worker {} completed job {} ({} stage(s) skipped)",
                        worker_id,
                        report.job_id,
                        report.skipped.len()
                    ),
                    Ok(Err(e)) => warn!("Worker {} job {} failed: {}", worker_id, job_id, e),
                    Err(payload) => {
                        let message = panic_message(payload.as_ref());
                        error!(
                            "Worker {} panicked while running job {}: {}",
                            worker_id, job_id, message
                        );
                        // A second panic while recording must not take the worker down.
                        if panic::catch_unwind(AssertUnwindSafe(|| {
                            pipeline.record_panic(&job_id, &message)
                        }))
                        .is_err()
                        {
                            error!("Worker {} could not record failure of job {}", worker_id, job_id);
                        }
                    }
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                continue;
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                debug!("Worker {} job channel disconnected", worker_id);
                break;
            }
        }
    }

    debug!("Worker {} stopped", worker_id);
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

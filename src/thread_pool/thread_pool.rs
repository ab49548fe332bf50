use crossbeam_channel::{unbounded, Sender};
use log::warn;

use crate::dataloader::error::DataLoaderError;

use super::worker::{BatchWork, WorkFuture, WorkItem, Worker, WorkerSeed};

/// Fixed set of batch-loading threads, each with its own queue and generator.
///
/// Batch `n` always goes to worker `n % size`, so with [`WorkerSeed::Fixed`]
/// the augmentation applied to every batch is the same from run to run.
pub struct ThreadPool {
    queues: Vec<Sender<WorkItem>>,
    workers: Vec<Worker>,
}

impl ThreadPool {
    pub fn new(size: usize, seed: WorkerSeed) -> Result<ThreadPool, DataLoaderError> {
        let size = size.max(1);
        let mut queues = Vec::with_capacity(size);
        let mut workers = Vec::with_capacity(size);

        for id in 0..size {
            let (sender, receiver) = unbounded();
            queues.push(sender);
            workers.push(Worker::new(id, receiver, seed)?);
        }

        Ok(ThreadPool { queues, workers })
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    pub fn submit_work(&self, work: BatchWork) -> Result<WorkFuture, DataLoaderError> {
        let worker_id = work.batch_number % self.queues.len();
        let (result, future) = WorkFuture::new(worker_id);

        self.queues[worker_id]
            .send(WorkItem { work, result })
            .map_err(|_| DataLoaderError::WorkerDisconnected(worker_id))?;

        Ok(future)
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        // Closing the queues ends each worker's receive loop
        self.queues.clear();

        for worker in &mut self.workers {
            if let Some(thread) = worker.thread.take() {
                if thread.join().is_err() {
                    warn!("Worker {} panicked", worker.id);
                }
            }
        }
    }
}

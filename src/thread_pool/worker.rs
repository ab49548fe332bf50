use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, Receiver, Sender};
use log::debug;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::dataloader::data_batch::{load_batch, DataBatch};
use crate::dataloader::error::DataLoaderError;
use crate::dataset::Dataset;

/// How a worker seeds its generator when it starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerSeed {
    /// Worker `id` uses `seed + id`, so runs are repeatable.
    Fixed(u64),
    Entropy,
}

impl WorkerSeed {
    pub fn rng_for(&self, worker_id: usize) -> StdRng {
        match self {
            WorkerSeed::Fixed(seed) => StdRng::seed_from_u64(seed.wrapping_add(worker_id as u64)),
            WorkerSeed::Entropy => StdRng::from_entropy(),
        }
    }
}

pub struct BatchWork {
    pub dataset: Arc<dyn Dataset>,
    pub batch_number: usize,
    pub indices: Vec<usize>,
}

impl BatchWork {
    fn run(self, rng: &mut StdRng) -> Result<DataBatch, DataLoaderError> {
        load_batch(&*self.dataset, self.batch_number, &self.indices, rng)
    }
}

pub type WorkResult = Result<DataBatch, DataLoaderError>;

pub struct WorkItem {
    pub work: BatchWork,
    pub result: Sender<WorkResult>,
}

/// Handle to a batch submitted to a worker.
pub struct WorkFuture {
    receiver: Receiver<WorkResult>,
    worker_id: usize,
}

impl WorkFuture {
    pub fn new(worker_id: usize) -> (Sender<WorkResult>, Self) {
        let (sender, receiver) = bounded(1);
        (sender, WorkFuture { receiver, worker_id })
    }

    /// Blocks until the worker has produced the batch.
    pub fn wait(self) -> WorkResult {
        self.receiver
            .recv()
            .map_err(|_| DataLoaderError::WorkerDisconnected(self.worker_id))?
    }
}

pub struct Worker {
    pub id: usize,
    pub thread: Option<thread::JoinHandle<()>>,
}

impl Worker {
    pub fn new(id: usize, queue: Receiver<WorkItem>, seed: WorkerSeed) -> Result<Worker, DataLoaderError> {
        let thread = thread::Builder::new()
            .name(format!("loader-worker-{id}"))
            .spawn(move || {
                // Seeded before the first batch so results don't depend on scheduling
                let mut rng = seed.rng_for(id);
                debug!("Worker {id} started ({seed:?})");

                for item in queue.iter() {
                    let result = item.work.run(&mut rng);
                    // The iterator that asked for this batch may already be gone
                    let _ = item.result.send(result);
                }

                debug!("Worker {id} stopped");
            })?;

        Ok(Worker {
            id,
            thread: Some(thread),
        })
    }
}

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use log::debug;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::dataset::Dataset;
use crate::thread_pool::worker::{BatchWork, WorkFuture};
use crate::thread_pool::{ThreadPool, WorkerSeed};

use super::data_batch::{load_batch, DataBatch};
use super::error::DataLoaderError;
use super::sampler::Sampler;

/// Batches a dataset in the order its sampler dictates.
///
/// Each call to [`DataLoader::iter`] is one epoch: the sampler is asked for a
/// fresh set of indices and the batches are produced lazily from them.
pub struct DataLoader {
    dataset: Arc<dyn Dataset>,
    sampler: Box<dyn Sampler>,
    batch_size: usize,
    prefetch_count: usize,
    thread_pool: Option<ThreadPool>,
    // Used when there are no workers
    rng: Mutex<StdRng>,
}

impl DataLoader {
    pub fn builder(dataset: Arc<dyn Dataset>, sampler: Box<dyn Sampler>) -> DataLoaderBuilder {
        DataLoaderBuilder::new(dataset, sampler)
    }

    pub fn iter(&self) -> BatchIterator<'_> {
        BatchIterator::new(self)
    }

    /// Number of batches per epoch. The last one may be smaller than the batch size.
    pub fn len(&self) -> usize {
        self.sampler.len().div_ceil(self.batch_size)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of samples visited per epoch.
    pub fn num_samples(&self) -> usize {
        self.sampler.len()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn num_workers(&self) -> usize {
        self.thread_pool.as_ref().map_or(0, ThreadPool::size)
    }
}

impl<'a> IntoIterator for &'a DataLoader {
    type Item = Result<DataBatch, DataLoaderError>;
    type IntoIter = BatchIterator<'a>;

    fn into_iter(self) -> BatchIterator<'a> {
        self.iter()
    }
}

pub struct DataLoaderBuilder {
    dataset: Arc<dyn Dataset>,
    sampler: Box<dyn Sampler>,
    batch_size: usize,
    num_workers: usize,
    prefetch_count: usize,
    worker_seed: WorkerSeed,
    rng: Option<StdRng>,
}

impl DataLoaderBuilder {
    pub fn new(dataset: Arc<dyn Dataset>, sampler: Box<dyn Sampler>) -> Self {
        Self {
            dataset,
            sampler,
            batch_size: 1,
            num_workers: 0,
            prefetch_count: 2,
            worker_seed: WorkerSeed::Entropy,
            rng: None,
        }
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn num_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers;
        self
    }

    pub fn prefetch_count(mut self, prefetch_count: usize) -> Self {
        self.prefetch_count = prefetch_count;
        self
    }

    pub fn worker_seed(mut self, worker_seed: WorkerSeed) -> Self {
        self.worker_seed = worker_seed;
        self
    }

    /// Generator for loading without workers.
    pub fn rng(mut self, rng: StdRng) -> Self {
        self.rng = Some(rng);
        self
    }

    pub fn build(self) -> Result<DataLoader, DataLoaderError> {
        if self.batch_size == 0 {
            return Err(DataLoaderError::InvalidBatchSize);
        }

        let thread_pool = if self.num_workers > 0 {
            Some(ThreadPool::new(self.num_workers, self.worker_seed)?)
        } else {
            None
        };

        debug!(
            "DataLoader: {} samples, batch size {}, {} worker(s)",
            self.sampler.len(),
            self.batch_size,
            self.num_workers
        );

        Ok(DataLoader {
            dataset: self.dataset,
            sampler: self.sampler,
            batch_size: self.batch_size,
            prefetch_count: self.prefetch_count.max(1),
            thread_pool,
            rng: Mutex::new(self.rng.unwrap_or_else(StdRng::from_entropy)),
        })
    }
}

/// One epoch of batches.
pub struct BatchIterator<'a> {
    loader: &'a DataLoader,
    indices: Vec<usize>,
    next_batch: usize,
    next_submit: usize,
    pending: VecDeque<Result<WorkFuture, DataLoaderError>>,
}

impl<'a> BatchIterator<'a> {
    fn new(loader: &'a DataLoader) -> Self {
        let mut iterator = BatchIterator {
            loader,
            indices: loader.sampler.iter().collect(),
            next_batch: 0,
            next_submit: 0,
            pending: VecDeque::with_capacity(loader.prefetch_count),
        };

        iterator.request_next_batches();

        iterator
    }

    fn num_batches(&self) -> usize {
        self.indices.len().div_ceil(self.loader.batch_size)
    }

    fn batch_indices(&self, batch_number: usize) -> &[usize] {
        let start = batch_number * self.loader.batch_size;
        let end = (start + self.loader.batch_size).min(self.indices.len());
        &self.indices[start..end]
    }

    fn request_next_batches(&mut self) {
        let loader = self.loader;
        let Some(pool) = &loader.thread_pool else {
            return;
        };

        while self.pending.len() < loader.prefetch_count && self.next_submit < self.num_batches() {
            let work = BatchWork {
                dataset: loader.dataset.clone(),
                batch_number: self.next_submit,
                indices: self.batch_indices(self.next_submit).to_vec(),
            };
            self.pending.push_back(pool.submit_work(work));
            self.next_submit += 1;
        }
    }

    fn load_on_this_thread(&mut self) -> Option<Result<DataBatch, DataLoaderError>> {
        if self.next_batch >= self.num_batches() {
            return None;
        }

        let batch_number = self.next_batch;
        self.next_batch += 1;

        let loader = self.loader;
        let mut rng = loader.rng.lock().unwrap_or_else(PoisonError::into_inner);
        Some(load_batch(
            &*loader.dataset,
            batch_number,
            self.batch_indices(batch_number),
            &mut rng,
        ))
    }

    fn wait_for_next_batch(&mut self) -> Option<Result<DataBatch, DataLoaderError>> {
        let future = self.pending.pop_front()?;
        self.next_batch += 1;
        self.request_next_batches();
        Some(future.and_then(WorkFuture::wait))
    }
}

impl Iterator for BatchIterator<'_> {
    type Item = Result<DataBatch, DataLoaderError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.loader.thread_pool.is_some() {
            self.wait_for_next_batch()
        } else {
            self.load_on_this_thread()
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.num_batches() - self.next_batch;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for BatchIterator<'_> {}

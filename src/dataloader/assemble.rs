use std::sync::Arc;

use log::{info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::dataset::{Dataset, DatasetName};
use crate::thread_pool::WorkerSeed;

use super::config::LoaderConfig;
use super::dataloader::DataLoader;
use super::error::DataLoaderError;
use super::sampler::{get_sampler, Sampler};
use super::subset::split_list;

/// The loaders of one training run.
pub struct DataLoaders {
    pub train: Arc<DataLoader>,
    /// Same loader as `test` when the validation split is empty
    pub valid: Arc<DataLoader>,
    pub test: Arc<DataLoader>,
    /// `[1, channels, height, width]` of a training sample
    pub input_shape: [usize; 4],
}

impl DataLoaders {
    pub fn validation_is_test(&self) -> bool {
        Arc::ptr_eq(&self.valid, &self.test)
    }
}

/// Loads `config.dataset` from `config.data_dir` and builds its loaders.
pub fn load_data(config: &LoaderConfig) -> Result<DataLoaders, DataLoaderError> {
    let dataset: DatasetName = config.dataset.parse()?;
    let config = config.clone().build()?;

    let (train_dataset, test_dataset) = dataset.get_datasets(&config.data_dir)?;
    info!(
        "Loaded {}: {} training and {} test samples",
        dataset,
        train_dataset.len(),
        test_dataset.len()
    );

    get_data_loaders(train_dataset, test_dataset, &config)
}

/// Splits the training set into train/validation partitions and builds the three loaders.
pub fn get_data_loaders(
    train_dataset: Arc<dyn Dataset>,
    test_dataset: Arc<dyn Dataset>,
    config: &LoaderConfig,
) -> Result<DataLoaders, DataLoaderError> {
    let config = config.clone().build()?;

    let mut rng = config.root_rng();
    let worker_seed = config.worker_seed();
    if config.deterministic {
        info!("Deterministic loading with seed {}", config.seed);
    }

    // Shuffled once so that class-ordered datasets don't give class-exclusive partitions
    let mut indices: Vec<usize> = (0..train_dataset.len()).collect();
    indices.shuffle(&mut rng);
    let (valid_indices, train_indices) = split_list(&indices, config.validation_split);

    // Every sampler is built before any worker thread, so a bad ratio leaves nothing behind
    let train_sampler = get_sampler(
        train_indices,
        config.effective_train_size,
        config.fixed_subset,
        child_rng(&mut rng),
    )?;

    let valid_sampler = if valid_indices.is_empty() {
        None
    } else {
        Some(get_sampler(
            valid_indices,
            config.effective_valid_size,
            config.fixed_subset,
            child_rng(&mut rng),
        )?)
    };

    let test_indices = (0..test_dataset.len()).collect();
    let test_sampler = get_sampler(
        test_indices,
        config.effective_test_size,
        config.fixed_subset,
        child_rng(&mut rng),
    )?;

    let input_shape = image_size(&*train_dataset, &mut rng)?;

    let train = Arc::new(build_loader(
        train_dataset.clone(),
        train_sampler,
        &config,
        worker_seed,
        child_rng(&mut rng),
    )?);

    let valid = match valid_sampler {
        Some(sampler) => Some(Arc::new(build_loader(
            train_dataset,
            sampler,
            &config,
            worker_seed,
            child_rng(&mut rng),
        )?)),
        None => None,
    };

    let test = Arc::new(build_loader(
        test_dataset,
        test_sampler,
        &config,
        worker_seed,
        child_rng(&mut rng),
    )?);

    let valid = valid.unwrap_or_else(|| {
        warn!("Validation split is empty, the test set is used for validation");
        test.clone()
    });

    info!(
        "Samples per epoch: train {}, validation {}, test {}; input shape {:?}",
        train.num_samples(),
        valid.num_samples(),
        test.num_samples(),
        input_shape
    );

    Ok(DataLoaders {
        train,
        valid,
        test,
        input_shape,
    })
}

fn build_loader(
    dataset: Arc<dyn Dataset>,
    sampler: Box<dyn Sampler>,
    config: &LoaderConfig,
    worker_seed: WorkerSeed,
    rng: StdRng,
) -> Result<DataLoader, DataLoaderError> {
    DataLoader::builder(dataset, sampler)
        .batch_size(config.batch_size)
        .num_workers(config.workers)
        .prefetch_count(config.prefetch_count)
        .worker_seed(worker_seed)
        .rng(rng)
        .build()
}

/// Independent generator seeded from `rng`.
fn child_rng(rng: &mut StdRng) -> StdRng {
    StdRng::seed_from_u64(rng.gen())
}

/// Shape of the first sample, with a batch dimension of one prepended.
fn image_size(dataset: &dyn Dataset, rng: &mut StdRng) -> Result<[usize; 4], DataLoaderError> {
    if dataset.is_empty() {
        return Err(DataLoaderError::EmptyDataset);
    }
    Ok(dataset.get(0, rng)?.image.batched_shape())
}

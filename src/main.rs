use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;

use vision_loaders::dataloader::info::print_dataset_info;
use vision_loaders::{load_data, DataLoader, LoaderConfig};

/// Builds the train/validation/test loaders of a dataset and walks them.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Dataset to load (cifar10 or imagenet)
    #[arg(short, long, default_value = "cifar10")]
    dataset: String,

    /// Directory holding the dataset
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    #[arg(short, long, default_value_t = 32)]
    batch_size: usize,

    /// Loader threads, 0 loads on the main thread
    #[arg(short, long, default_value_t = num_cpus::get())]
    workers: usize,

    #[arg(long, default_value_t = 4)]
    prefetch_count: usize,

    /// Portion of the training set used for validation
    #[arg(long, default_value_t = 0.1)]
    validation_split: f64,

    /// Seed all randomness from --seed
    #[arg(long)]
    deterministic: bool,

    #[arg(long, default_value_t = 0)]
    seed: u64,

    #[arg(long, default_value_t = 1.0)]
    effective_train_size: f64,

    #[arg(long, default_value_t = 1.0)]
    effective_valid_size: f64,

    #[arg(long, default_value_t = 1.0)]
    effective_test_size: f64,

    /// Keep the same subset of every split for the whole run
    #[arg(long)]
    fixed_subset: bool,

    /// JSON loader config, replaces all the flags above
    #[arg(long)]
    config: Option<PathBuf>,

    /// Epochs to walk over the training loader
    #[arg(long, default_value_t = 1)]
    epochs: usize,
}

impl Args {
    fn loader_config(&self) -> LoaderConfig {
        LoaderConfig {
            dataset: self.dataset.clone(),
            data_dir: self.data_dir.clone(),
            batch_size: self.batch_size,
            workers: self.workers,
            prefetch_count: self.prefetch_count,
            validation_split: self.validation_split,
            deterministic: self.deterministic,
            seed: self.seed,
            effective_train_size: self.effective_train_size,
            effective_valid_size: self.effective_valid_size,
            effective_test_size: self.effective_test_size,
            fixed_subset: self.fixed_subset,
        }
    }
}

fn walk(name: &str, loader: &DataLoader) -> Result<(), vision_loaders::DataLoaderError> {
    let start = Instant::now();
    let mut samples = 0;
    let mut batches = 0;

    for batch in loader {
        let batch = batch?;
        samples += batch.samples_in_batch();
        batches += 1;
    }

    println!(
        "{}: {} samples in {} batches ({:.2?})",
        name,
        samples,
        batches,
        start.elapsed()
    );
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => LoaderConfig::from_json_file(path)?,
        None => args.loader_config().build()?,
    };

    let loaders = load_data(&config)?;
    print_dataset_info(&loaders);

    for epoch in 0..args.epochs {
        walk(&format!("Epoch {} train", epoch + 1), &loaders.train)?;
    }
    walk("Validation", &loaders.valid)?;
    walk("Test", &loaders.test)?;

    Ok(())
}

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::thread_pool::WorkerSeed;

use super::error::DataLoaderError;
use super::subset::{check_effective_size, check_validation_split};

// TODO: Make bad values impossible using NonZeroUsize etc
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// One of `cifar10` or `imagenet`
    pub dataset: String,
    pub data_dir: PathBuf,
    pub batch_size: usize,
    /// Zero loads batches on the iterating thread
    pub workers: usize,
    /// Batches requested ahead of the one being consumed
    pub prefetch_count: usize,
    /// Portion of the training set set aside for validation
    pub validation_split: f64,
    /// Seed every generator from `seed` instead of OS entropy
    pub deterministic: bool,
    pub seed: u64,
    /// Portion of each partition visited per epoch, applied after the validation split
    pub effective_train_size: f64,
    pub effective_valid_size: f64,
    pub effective_test_size: f64,
    /// Keep the same subset for the whole run instead of drawing a new one each epoch
    pub fixed_subset: bool,
}

impl LoaderConfig {
    pub fn build(self) -> Result<Self, DataLoaderError> {
        if self.batch_size == 0 {
            return Err(DataLoaderError::InvalidBatchSize);
        }
        check_validation_split(self.validation_split)?;
        check_effective_size(self.effective_train_size)?;
        check_effective_size(self.effective_valid_size)?;
        check_effective_size(self.effective_test_size)?;

        Ok(self)
    }

    /// Reads a JSON config, missing fields take their default value.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, DataLoaderError> {
        let file = File::open(path)?;
        let config: LoaderConfig = serde_json::from_reader(BufReader::new(file))?;
        config.build()
    }

    /// Generator for the train/validation shuffle and the samplers.
    pub fn root_rng(&self) -> StdRng {
        if self.deterministic {
            StdRng::seed_from_u64(self.seed)
        } else {
            StdRng::from_entropy()
        }
    }

    pub fn worker_seed(&self) -> WorkerSeed {
        if self.deterministic {
            WorkerSeed::Fixed(self.seed)
        } else {
            WorkerSeed::Entropy
        }
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            dataset: "cifar10".to_string(),
            data_dir: PathBuf::from("data"),
            batch_size: 32,
            workers: num_cpus::get(),
            prefetch_count: 4,
            validation_split: 0.1,
            deterministic: false,
            seed: 0,
            effective_train_size: 1.0,
            effective_valid_size: 1.0,
            effective_test_size: 1.0,
            fixed_subset: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn default_config_is_valid() {
        let config = LoaderConfig::default().build().unwrap();
        assert_eq!(config.validation_split, 0.1);
        assert_eq!(config.effective_train_size, 1.0);
        assert!(!config.fixed_subset);
    }

    #[test]
    fn build_rejects_bad_values() {
        let bad = [
            LoaderConfig { batch_size: 0, ..Default::default() },
            LoaderConfig { validation_split: 1.2, ..Default::default() },
            LoaderConfig { effective_train_size: 0.0, ..Default::default() },
            LoaderConfig { effective_valid_size: -1.0, ..Default::default() },
            LoaderConfig { effective_test_size: 1.01, ..Default::default() },
        ];

        for config in bad {
            let err = config.build().unwrap_err();
            assert!(err.is_invalid_argument(), "{err}");
        }
    }

    #[test]
    fn reads_partial_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loader.json");
        std::fs::write(
            &path,
            r#"{ "dataset": "imagenet", "batch_size": 8, "deterministic": true, "seed": 3 }"#,
        )
        .unwrap();

        let config = LoaderConfig::from_json_file(&path).unwrap();
        assert_eq!(config.dataset, "imagenet");
        assert_eq!(config.batch_size, 8);
        assert_eq!(config.seed, 3);
        assert_eq!(config.validation_split, 0.1);
    }

    #[test]
    fn invalid_json_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loader.json");
        std::fs::write(&path, r#"{ "effective_test_size": 0 }"#).unwrap();

        assert!(matches!(
            LoaderConfig::from_json_file(&path),
            Err(DataLoaderError::InvalidEffectiveSize(_))
        ));

        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            LoaderConfig::from_json_file(&path),
            Err(DataLoaderError::ConfigError(_))
        ));
    }

    #[test]
    fn deterministic_rng_follows_seed() {
        let config = LoaderConfig {
            deterministic: true,
            seed: 11,
            ..Default::default()
        };

        assert_eq!(config.root_rng().gen::<u64>(), config.root_rng().gen::<u64>());
        assert_eq!(config.worker_seed(), WorkerSeed::Fixed(11));
        assert_eq!(LoaderConfig::default().worker_seed(), WorkerSeed::Entropy);
    }
}

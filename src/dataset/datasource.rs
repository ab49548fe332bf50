use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use crate::dataloader::error::DataLoaderError;

use super::cifar10::cifar10_get_datasets;
use super::image_folder::imagenet_get_datasets;
use super::Dataset;

/// `(train, test)` datasets of one provider.
pub type DatasetPair = (Arc<dyn Dataset>, Arc<dyn Dataset>);

/// Names accepted by [`DatasetName::from_str`], matched exactly.
pub const DATASET_NAMES: [&str; 2] = ["cifar10", "imagenet"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetName {
    Cifar10,
    Imagenet,
}

impl DatasetName {
    const ALL: [DatasetName; 2] = [DatasetName::Cifar10, DatasetName::Imagenet];

    pub fn as_str(&self) -> &'static str {
        DATASET_NAMES[*self as usize]
    }

    pub fn get_datasets(&self, data_dir: &Path) -> Result<DatasetPair, DataLoaderError> {
        match self {
            DatasetName::Cifar10 => cifar10_get_datasets(data_dir),
            DatasetName::Imagenet => imagenet_get_datasets(data_dir),
        }
    }
}

impl FromStr for DatasetName {
    type Err = DataLoaderError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        DATASET_NAMES
            .iter()
            .position(|&known| known == name)
            .map(|position| Self::ALL[position])
            .ok_or_else(|| DataLoaderError::UnsupportedDataset(name.to_string()))
    }
}

impl fmt::Display for DatasetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

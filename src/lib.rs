//! Data loaders for image classification datasets (CIFAR-10 and ImageNet-style folders).
//!
//! [`load_data`] splits the training set into train/validation partitions,
//! restricts each partition to a random (or fixed) subset per epoch and
//! returns batch loaders for train, validation and test.

pub mod dataloader;
pub mod dataset;
pub mod thread_pool;

pub use dataloader::{get_data_loaders, load_data, DataLoader, DataLoaderError, DataLoaders, LoaderConfig};
pub use dataset::{Dataset, DatasetName, ImageTensor, InMemDataset, Sample};

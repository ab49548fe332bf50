pub mod assemble;
pub mod config;
pub mod data_batch;
pub mod dataloader;
pub mod error;
pub mod info;
pub mod sampler;
pub mod subset;

pub use assemble::{get_data_loaders, load_data, DataLoaders};
pub use config::LoaderConfig;
pub use data_batch::DataBatch;
pub use dataloader::{BatchIterator, DataLoader, DataLoaderBuilder};
pub use error::DataLoaderError;
pub use sampler::{get_sampler, FixedSubsetSampler, Sampler, SwitchingSubsetSampler};
pub use subset::{split_list, subset_length};

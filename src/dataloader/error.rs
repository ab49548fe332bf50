use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataLoaderError {
    // Argument errors, raised before any work is done
    #[error("Effective size must be in (0..1], got {0}")]
    InvalidEffectiveSize(f64),

    #[error("Validation split must be in [0..1], got {0}")]
    InvalidValidationSplit(f64),

    #[error("Batch size must be greater than zero")]
    InvalidBatchSize,

    #[error("Unsupported dataset: {0}")]
    UnsupportedDataset(String),

    // IO and decoding errors
    #[error("Directory not found: {0}")]
    DirectoryNotFound(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Image error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Config error: {0}")]
    ConfigError(#[from] serde_json::Error),

    #[error("No images found in the dataset")]
    EmptyDataset,

    #[error("Corrupt record in {path}: {reason}")]
    CorruptRecord { path: String, reason: String },

    // Batching errors
    #[error("Index {index} out of bounds for dataset of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("Sample shape {found:?} does not match batch shape {expected:?}")]
    ShapeMismatch {
        expected: [usize; 3],
        found: [usize; 3],
    },

    #[error("Worker {0} disconnected before returning its batch")]
    WorkerDisconnected(usize),
}

impl DataLoaderError {
    /// True for errors caused by a bad argument rather than by the data itself.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            DataLoaderError::InvalidEffectiveSize(_)
                | DataLoaderError::InvalidValidationSplit(_)
                | DataLoaderError::InvalidBatchSize
                | DataLoaderError::UnsupportedDataset(_)
        )
    }
}

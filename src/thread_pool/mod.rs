pub mod thread_pool;
pub mod worker;

pub use thread_pool::ThreadPool;
pub use worker::WorkerSeed;

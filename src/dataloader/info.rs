use super::assemble::DataLoaders;
use super::dataloader::DataLoader;

fn print_split_info(name: &str, loader: &DataLoader) {
    let size = loader.num_samples();
    let last_batch = match size % loader.batch_size() {
        0 if size > 0 => loader.batch_size(),
        rest => rest,
    };

    println!("{} split:", name);
    println!("  Samples per epoch: {}", size);
    println!("  Batches: {}", loader.len());
    println!("  Last batch size: {}", last_batch);
    println!();
}

pub fn print_dataset_info(loaders: &DataLoaders) {
    println!("Dataset Information:");
    println!("-------------------");
    println!("Input shape: {:?}", loaders.input_shape);
    println!("Batch size: {}", loaders.train.batch_size());
    println!("Workers: {}", loaders.train.num_workers());
    println!();
    print_split_info("Train", &loaders.train);
    if loaders.validation_is_test() {
        println!("Validation split: empty, using the test split");
        println!();
    } else {
        print_split_info("Validation", &loaders.valid);
    }
    print_split_info("Test", &loaders.test);
}

//! `datasets` command

use crate::dataset::Dataset;

/// Print every dataset with its provider and description
pub fn execute() -> i32 {
    println!("{:<24} {:<8} DESCRIPTION", "DATASET", "SOURCE");
    for dataset in Dataset::ALL {
        println!(
            "{:<24} {:<8} {}",
            dataset.name(),
            dataset.provider().to_string(),
            dataset.description()
        );
    }
    0
}

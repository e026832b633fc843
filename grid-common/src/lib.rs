// grid-common: error classification and logging shared by the ingestion crates

pub mod error;
pub mod logging;

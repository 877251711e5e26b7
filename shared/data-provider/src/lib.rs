mod dataset;
mod hub;
mod local;

pub use dataset::{Dataset, DatasetIter, Row, Split};
pub use hub::{download_dataset_repo_sync, download_model_repo_sync, PARQUET_CONVERSION_REVISION};
pub use hf_hub::api::sync::ApiError;
pub use local::local_repo_files;
pub use parquet::record::{ListAccessor, RowAccessor};

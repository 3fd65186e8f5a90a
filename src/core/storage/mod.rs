pub mod object_storage;
pub mod storage_models;

pub use object_storage::{ObjectStorage, StorageError};
pub use storage_models::{DownloadedObject, StorageCredentials};

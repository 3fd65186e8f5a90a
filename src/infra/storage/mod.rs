pub mod gcs_client;

pub use gcs_client::GcsClient;

//! Outbound clients and helpers used by the HTTP handlers

pub mod geo;
pub mod image_storage;
pub mod midtrans_client;
pub mod ml_client;
pub mod slug;

pub use image_storage::{ImageError, ImageSource, ImageStore, StoredImage};
pub use midtrans_client::{MidtransClient, MidtransError};
pub use ml_client::{ClassifyImage, MlClient, MlClientError};

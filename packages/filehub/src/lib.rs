pub mod config;
pub mod database;
pub mod entity;
pub mod error;
pub mod hub;
pub mod models;
pub mod services;
pub mod utils;

pub use error::HubError;
pub use hub::{FileHub, UploadRequest};

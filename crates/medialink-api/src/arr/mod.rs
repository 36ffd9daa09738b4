pub mod client;
pub mod models;

pub use client::{ApiVersion, ArrClient};
pub use models::{Field, MetadataProfile, Provider, QualityProfile, RootFolder, SystemStatus};

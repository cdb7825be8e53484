pub mod enums;
pub mod error;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use enums::{AiModel, BrandStatus, Breed, Department, Purpose, QualityTier};
pub use error::CoreError;
pub use structs::{BrandRegistration, LogoGeneration, Snapshot, StatusChangeEvent};

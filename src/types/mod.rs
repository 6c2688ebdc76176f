//! Core data types for record collection.
//!
//! Defines fundamental types used throughout the engine:
//! - `ParamBag` / `ParamSet`: parameter maps
//! - `CollectorError`: Error types for all operations
//! - `Result`: Convenient result type alias

pub mod error;
pub mod params;

pub use error::CollectorError;
pub use params::{ParamBag, ParamSet};

/// Result type for collection operations.
pub type Result<T> = std::result::Result<T, CollectorError>;

//! Device error types.

use thiserror::Error;

/// Errors that can occur in the device layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphicsError {
    /// Failed to initialize the backend or the device.
    #[error("initialization failed: {0}")]
    InitializationFailed(String),
    /// A descriptor is missing a required field or is inconsistent.
    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),
    /// An index is beyond the capacity of the addressed object.
    #[error("index {index} out of range (capacity {capacity})")]
    OutOfRange {
        /// The requested index.
        index: u32,
        /// The number of valid slots.
        capacity: u32,
    },
    /// Failed to create a resource.
    #[error("resource creation failed: {0}")]
    ResourceCreationFailed(String),
    /// The resource has already been destroyed.
    #[error("resource already destroyed: {0}")]
    ResourceDestroyed(String),
    /// A requested feature is not supported by the backend.
    #[error("feature not supported: {0}")]
    FeatureNotSupported(String),
    /// Out of GPU memory.
    #[error("out of GPU memory")]
    OutOfMemory,
    /// The GPU device was lost or has been dropped.
    #[error("GPU device lost")]
    DeviceLost,
    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result alias used across the crate.
pub type GraphicsResult<T> = Result<T, GraphicsError>;

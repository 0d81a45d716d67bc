//! Background services

pub mod staged_cleanup;

pub use staged_cleanup::StagedImageCleanup;

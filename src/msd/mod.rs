//! MSD (Mass Storage Device) module
//!
//! Caller-side policy around the gadget backends: image validation, option
//! checks, backend selection, the cross-process lock and dry runs.
//!
//! Architecture:
//! ```text
//! CLI / config --> MsdController --> select_backend --> Backend --> kernel
//!                       |
//!               validate_image + OperationLock
//! ```

pub mod controller;
pub mod image;
pub mod lock;
pub mod types;

pub use controller::MsdController;
pub use image::{validate_image, ImageInfo};
pub use lock::OperationLock;
pub use types::{MountPlan, MountRequest, UnmountPlan};

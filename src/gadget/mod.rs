//! USB gadget backends
//!
//! Three kernel interfaces can expose a file as USB mass storage. This module
//! puts them behind one mount/unmount/status contract:
//! - ConfigFS: modern composable gadget tree
//! - UDC: legacy gadget statically bound to a controller
//! - Sysfs: legacy Android `android_usb` driver
//!
//! Architecture:
//! ```text
//! select_backend()
//!     └── Backend (closed enum, GadgetBackend)
//!             ├── ConfigFsBackend ── DetachedGadget ── MassStorageFunction
//!             ├── UdcBackend ─────── SoftDisconnect
//!             └── SysfsBackend
//!                     │
//!              attr (read/write/exists) + verify (LUN read-back)
//! ```

pub mod attr;
pub mod backend;
pub mod configfs;
pub mod detach;
pub mod function;
pub mod paths;
pub mod selector;
pub mod sysfs;
pub mod udc;
pub mod verify;

pub use backend::{
    Backend, BackendKind, Capabilities, GadgetBackend, MountMode, MountOptions, MountStatus,
};
pub use configfs::{ConfigFsBackend, GadgetDescriptor};
pub use detach::{DetachedGadget, SoftDisconnect};
pub use function::MassStorageFunction;
pub use paths::GadgetPaths;
pub use selector::{select_backend, select_from};
pub use sysfs::SysfsBackend;
pub use udc::UdcBackend;
pub use verify::{verify_mount, verify_unmount};

//! clpick: benchmark-driven device selection for double-precision compute
//!
//! clpick picks, among all installed compute platforms, the group of
//! double-precision devices that actually runs fastest, then compiles and
//! dispatches kernels on that group.
//!
//! # Architecture
//!
//! - **catalog**: platform enumeration and fp64 device filtering
//! - **compiler**: builds kernel source for a whole device group
//! - **dispatch**: positional argument binding, launch, and deferred readback
//! - **bench**: times a reference kernel per platform and keeps the fastest
//! - **runtime**: the accelerator runtime interface, and its OpenCL binding
//!
//! # Example
//!
//! ```ignore
//! use clpick::prelude::*;
//! use clpick::runtime::OpenClRuntime;
//!
//! let rt = OpenClRuntime::new();
//! let devices = get_most_flops_device_group(&rt)?;
//! let program = make_program(&rt, &devices, source)?;
//! let mut handle = run(&rt, &program, "add", n, vec![
//!     KernelArg::read_only(&a),
//!     KernelArg::read_only(&b),
//!     KernelArg::new(&mut c),
//! ])?;
//! handle.sync(2)?;
//! ```
//!
//! # Feature Flags
//!
//! - `opencl`: OpenCL runtime via `opencl3`

// ============================================================================
// Modules
// ============================================================================

pub mod bench;
pub mod catalog;
pub mod compiler;
pub mod dispatch;
pub mod dtype;
pub mod error;
pub mod runtime;

#[cfg(test)]
pub(crate) mod testing;

// ============================================================================
// Re-exports
// ============================================================================

pub use bench::{
    BenchConfig, Selection, benchmark, get_most_flops_device_group,
    get_most_flops_device_group_with, select_device_group,
};
pub use catalog::{get_double_precision_devices, platform_size, promote_supervisor};
pub use compiler::{Program, make_program};
pub use dispatch::{KernelArg, SyncHandle, Synchronize, run};
pub use dtype::{DType, Scalar};
pub use error::{Error, Result};
pub use runtime::Runtime;

// ============================================================================
// Prelude
// ============================================================================

/// Prelude module with commonly used types and traits
pub mod prelude {
    pub use crate::bench::{BenchConfig, get_most_flops_device_group};
    pub use crate::catalog::{get_double_precision_devices, platform_size, promote_supervisor};
    pub use crate::compiler::{Program, make_program};
    pub use crate::dispatch::{KernelArg, SyncHandle, Synchronize, run};
    pub use crate::error::{Error, Result};
    pub use crate::runtime::Runtime;
}

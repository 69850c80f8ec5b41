//! Error kinds reported by device selection, compilation and dispatch.
//!
//! Every runtime status collapses into one of five kinds. The underlying
//! runtime message is logged where the collapse happens and is not carried
//! by the error value itself.

use std::fmt::Display;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum Error {
    /// Platform or device enumeration failed
    #[error("failed to query the accelerator runtime")]
    RuntimeQuery,

    /// Kernel source failed to build for the device group
    #[error("kernel source failed to build for the device group")]
    Build,

    /// Named kernel is absent from the compiled program
    #[error("kernel not found in the compiled program")]
    KernelResolution,

    /// Buffer allocation, argument binding or enqueue failed
    #[error("kernel dispatch failed")]
    Dispatch,

    /// Device-to-host transfer failed
    #[error("device-to-host readback failed")]
    Readback,
}

impl Error {
    /// Returns a closure that logs a runtime failure and collapses it into `self`.
    ///
    /// Meant for `map_err`: `runtime.build(..).map_err(Error::Build.collapse("build program"))`.
    pub(crate) fn collapse<E: Display>(self, operation: &'static str) -> impl FnOnce(E) -> Error {
        move |cause| {
            log::warn!("{operation} failed: {cause}");
            self
        }
    }
}

//! Accelerator runtime interface.
//!
//! Catalog, compiler, dispatcher and benchmark are generic over [`Runtime`],
//! which exposes exactly the primitives they consume: platform and device
//! enumeration, context/program/kernel/queue/buffer construction, a 1-D
//! kernel enqueue and a blocking buffer read.

use std::fmt::{Debug, Display};

#[cfg(feature = "opencl")]
pub mod opencl;

#[cfg(feature = "opencl")]
pub use opencl::OpenClRuntime;

/// Compute-offload runtime trait
///
/// All calls block until the runtime reports completion or failure. Failures
/// are reported through [`Runtime::Error`] and mapped onto [`crate::Error`]
/// kinds by the caller.
pub trait Runtime {
    /// Handle to a device owned by the runtime. Devices are looked up, never
    /// constructed, so cloning only copies the handle.
    type Device: Clone + PartialEq + Debug;
    /// Association of devices sharing program and memory objects
    type Context;
    /// Program compiled for every device of a context
    type Binary;
    /// Named entry point of a binary with its bound arguments
    type Kernel;
    /// In-order submission channel rooted at one device
    type Queue;
    /// Device-side memory allocation
    type Buffer;
    type Error: Display;

    /// Number of installed platforms
    fn platform_count(&self) -> Result<usize, Self::Error>;

    /// Every device of the platform at `platform`, in runtime order
    fn devices(&self, platform: usize) -> Result<Vec<Self::Device>, Self::Error>;

    /// Space-separated extension string of a device
    fn extensions(&self, device: &Self::Device) -> Result<String, Self::Error>;

    /// Human readable device name, for diagnostics only
    fn device_name(&self, device: &Self::Device) -> String;

    fn create_context(&self, devices: &[Self::Device]) -> Result<Self::Context, Self::Error>;

    /// Compiles `source` for every device in `devices` under `context`.
    fn build(
        &self,
        context: &Self::Context,
        devices: &[Self::Device],
        source: &str,
    ) -> Result<Self::Binary, Self::Error>;

    fn create_kernel(&self, binary: &Self::Binary, name: &str) -> Result<Self::Kernel, Self::Error>;

    fn create_queue(
        &self,
        context: &Self::Context,
        device: &Self::Device,
    ) -> Result<Self::Queue, Self::Error>;

    /// Allocates a read-write buffer of `contents.len()` bytes initialized
    /// with a copy of `contents`.
    fn create_buffer(
        &self,
        context: &Self::Context,
        contents: &[u8],
    ) -> Result<Self::Buffer, Self::Error>;

    /// Binds `buffer` to the kernel parameter at `index`.
    fn set_arg(
        &self,
        kernel: &mut Self::Kernel,
        index: usize,
        buffer: &Self::Buffer,
    ) -> Result<(), Self::Error>;

    /// Launches `kernel` over a 1-D range of `global_size` work items with a
    /// runtime-chosen local size, and waits for it to finish. Faults raised
    /// while the kernel executes are reported here.
    fn enqueue(
        &self,
        queue: &Self::Queue,
        kernel: &Self::Kernel,
        global_size: usize,
    ) -> Result<(), Self::Error>;

    /// Blocking copy of `buffer` into `dst`; `dst.len()` bytes are read.
    fn read(
        &self,
        queue: &Self::Queue,
        buffer: &Self::Buffer,
        dst: &mut [u8],
    ) -> Result<(), Self::Error>;
}

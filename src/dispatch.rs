//! Kernel dispatcher with deferred, caller-initiated readback.
//!
//! [`run`] copies every bound host slice into a fresh device buffer, binds the
//! buffers positionally and launches the kernel. Nothing is copied back until
//! the caller asks for it through [`Synchronize::sync`], so outputs can be
//! read selectively and inputs never pay for a transfer back.
//!
//! ```ignore
//! let mut c = vec![0.0f64; n];
//! let mut handle = run(&runtime, &program, "add", n, vec![
//!     KernelArg::read_only(&a),
//!     KernelArg::read_only(&b),
//!     KernelArg::new(&mut c),
//! ])?;
//! handle.sync(2)?;
//! drop(handle); // releases the device buffers and the borrow of `c`
//! ```

use crate::compiler::Program;
use crate::dtype::{DType, Scalar};
use crate::error::{Error, Result};
use crate::runtime::Runtime;

enum HostMemory<'a> {
    ReadWrite(&'a mut [u8]),
    ReadOnly(&'a [u8]),
}

impl HostMemory<'_> {
    fn bytes(&self) -> &[u8] {
        match self {
            HostMemory::ReadWrite(bytes) => &bytes[..],
            HostMemory::ReadOnly(bytes) => bytes,
        }
    }
}

/// Positional kernel argument: a host slice of arithmetic elements
pub struct KernelArg<'a> {
    memory: HostMemory<'a>,
    len: usize,
    dtype: DType,
}

impl<'a> KernelArg<'a> {
    /// Binds a host slice that can later be synchronized from the device.
    pub fn new<T: Scalar>(data: &'a mut [T]) -> Self {
        let len = data.len();
        let byte_len = std::mem::size_of_val(data);
        // Safety: `Scalar` types have no padding and accept every bit pattern.
        let bytes =
            unsafe { std::slice::from_raw_parts_mut(data.as_mut_ptr().cast::<u8>(), byte_len) };
        Self {
            memory: HostMemory::ReadWrite(bytes),
            len,
            dtype: T::DTYPE,
        }
    }

    /// Binds an input-only host slice. Synchronizing it is a contract violation.
    pub fn read_only<T: Scalar>(data: &'a [T]) -> Self {
        let len = data.len();
        let byte_len = std::mem::size_of_val(data);
        // Safety: `Scalar` types have no padding bytes.
        let bytes = unsafe { std::slice::from_raw_parts(data.as_ptr().cast::<u8>(), byte_len) };
        Self {
            memory: HostMemory::ReadOnly(bytes),
            len,
            dtype: T::DTYPE,
        }
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Element count times element size
    pub fn byte_len(&self) -> usize {
        self.len * self.dtype.size()
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self.memory, HostMemory::ReadOnly(_))
    }
}

/// Capability to copy one kernel argument back into host memory
pub trait Synchronize {
    /// Blocking read of argument `index` from the device into its host slice.
    fn sync(&mut self, index: usize) -> Result<()>;
}

struct Binding<'a, R: Runtime> {
    host: HostMemory<'a>,
    device: R::Buffer,
    dtype: DType,
}

/// Result of a kernel launch
///
/// Owns the command queue and one device buffer per argument, and holds the
/// host borrows until it is dropped. Dropping it releases the device buffers;
/// results that were never synchronized are discarded.
pub struct SyncHandle<'a, R: Runtime> {
    runtime: &'a R,
    bindings: Vec<Binding<'a, R>>,
    queue: R::Queue,
}

impl<R: Runtime> SyncHandle<'_, R> {
    /// Number of bound arguments
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl<R: Runtime> Synchronize for SyncHandle<'_, R> {
    /// # Panics
    ///
    /// Panics if `index` is out of range or the argument was bound read-only.
    fn sync(&mut self, index: usize) -> Result<()> {
        assert!(
            index < self.bindings.len(),
            "argument index {} out of range for {} bindings",
            index,
            self.bindings.len()
        );
        let binding = &mut self.bindings[index];
        let HostMemory::ReadWrite(host) = &mut binding.host else {
            panic!("argument {index} is bound read-only and cannot be synchronized");
        };
        log::trace!(
            "Sync argument {} ({} bytes of {})",
            index,
            host.len(),
            binding.dtype
        );
        self.runtime
            .read(&self.queue, &binding.device, host)
            .map_err(Error::Readback.collapse("read buffer"))
    }
}

/// Launches `kernel_name` from `program` over `global_size` work items.
///
/// Arguments are bound in order: argument `i` becomes kernel parameter `i`.
/// Each host slice is copied to a new device buffer before launch; no data
/// comes back until [`Synchronize::sync`] is called on the returned handle.
/// Buffers created before a failure are released on return.
pub fn run<'a, R: Runtime>(
    runtime: &'a R,
    program: &Program<R>,
    kernel_name: &str,
    global_size: usize,
    args: Vec<KernelArg<'a>>,
) -> Result<SyncHandle<'a, R>> {
    let mut kernel = runtime
        .create_kernel(program.binary(), kernel_name)
        .map_err(Error::KernelResolution.collapse("resolve kernel"))?;
    let queue = runtime
        .create_queue(program.context(), program.supervisor())
        .map_err(Error::Dispatch.collapse("create command queue"))?;

    let mut bindings = Vec::with_capacity(args.len());
    for (index, arg) in args.into_iter().enumerate() {
        let device = runtime
            .create_buffer(program.context(), arg.memory.bytes())
            .map_err(Error::Dispatch.collapse("create buffer"))?;
        runtime
            .set_arg(&mut kernel, index, &device)
            .map_err(Error::Dispatch.collapse("set kernel argument"))?;
        log::debug!(
            "{}: bound argument {} as {} x {} ({} bytes)",
            kernel_name,
            index,
            arg.len,
            arg.dtype,
            arg.byte_len()
        );
        bindings.push(Binding {
            host: arg.memory,
            device,
            dtype: arg.dtype,
        });
    }

    runtime
        .enqueue(&queue, &kernel, global_size)
        .map_err(Error::Dispatch.collapse("enqueue kernel"))?;
    log::debug!(
        "{}: launched {} work items on {}",
        kernel_name,
        global_size,
        runtime.device_name(program.supervisor())
    );

    Ok(SyncHandle {
        runtime,
        bindings,
        queue,
    })
}

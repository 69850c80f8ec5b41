//! OpenCL runtime backed by `opencl3`.

mod device;

pub use device::{ClDevice, OpenClError};

use std::ptr;

use opencl3::command_queue::CommandQueue;
use opencl3::context::Context;
use opencl3::kernel::Kernel;
use opencl3::memory::{Buffer as ClBuffer, CL_MEM_COPY_HOST_PTR, CL_MEM_READ_WRITE, ClMem};
use opencl3::program::Program;
use opencl3::types::{CL_BLOCKING, cl_device_id, cl_uint};

use super::Runtime;

/// OpenCL implementation of [`Runtime`]
///
/// Stateless: every call goes straight to the installed ICD loader.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenClRuntime;

impl OpenClRuntime {
    pub fn new() -> Self {
        Self
    }

    /// Returns true if some platform exposes at least one device.
    pub fn is_available() -> bool {
        let Ok(platforms) = opencl3::platform::get_platforms() else {
            return false;
        };
        platforms.iter().any(|platform| {
            device::list_ids(platform)
                .map(|ids| !ids.is_empty())
                .unwrap_or(false)
        })
    }
}

fn device_ids(devices: &[ClDevice]) -> Vec<cl_device_id> {
    devices.iter().map(ClDevice::id).collect()
}

impl Runtime for OpenClRuntime {
    type Device = ClDevice;
    type Context = Context;
    type Binary = Program;
    type Kernel = Kernel;
    type Queue = CommandQueue;
    type Buffer = ClBuffer<u8>;
    type Error = OpenClError;

    fn platform_count(&self) -> Result<usize, OpenClError> {
        Ok(opencl3::platform::get_platforms()?.len())
    }

    fn devices(&self, index: usize) -> Result<Vec<ClDevice>, OpenClError> {
        let platforms = opencl3::platform::get_platforms()?;
        let platform = platforms.get(index).ok_or_else(|| {
            format!(
                "Platform index {} out of range (available: {})",
                index,
                platforms.len()
            )
        })?;
        Ok(device::list_ids(platform)?
            .into_iter()
            .map(ClDevice::new)
            .collect())
    }

    fn extensions(&self, device: &ClDevice) -> Result<String, OpenClError> {
        Ok(device.cl_device().extensions()?)
    }

    fn device_name(&self, device: &ClDevice) -> String {
        device.name()
    }

    fn create_context(&self, devices: &[ClDevice]) -> Result<Context, OpenClError> {
        let ids = device_ids(devices);
        Ok(Context::from_devices(&ids, &[], None, ptr::null_mut())?)
    }

    fn build(
        &self,
        context: &Context,
        devices: &[ClDevice],
        source: &str,
    ) -> Result<Program, OpenClError> {
        let ids = device_ids(devices);
        let mut program = Program::create_from_source(context, source)?;
        if let Err(e) = program.build(&ids, "") {
            for device in devices {
                if let Ok(build_log) = program.get_build_log(device.id()) {
                    log::debug!("Build log for {}:\n{}", device.name(), build_log);
                }
            }
            return Err(e.into());
        }
        Ok(program)
    }

    fn create_kernel(&self, binary: &Program, name: &str) -> Result<Kernel, OpenClError> {
        Ok(Kernel::create(binary, name)?)
    }

    fn create_queue(
        &self,
        context: &Context,
        device: &ClDevice,
    ) -> Result<CommandQueue, OpenClError> {
        // The default queue is rooted at the first device the context was built with.
        if context.default_device() != device.id() {
            return Err(format!(
                "Queue device {} is not the context's first device",
                device.name()
            )
            .into());
        }
        Ok(CommandQueue::create_default(context, 0)?)
    }

    fn create_buffer(
        &self,
        context: &Context,
        contents: &[u8],
    ) -> Result<ClBuffer<u8>, OpenClError> {
        // CL_MEM_COPY_HOST_PTR only reads from the host pointer.
        let buffer = unsafe {
            ClBuffer::<u8>::create(
                context,
                CL_MEM_READ_WRITE | CL_MEM_COPY_HOST_PTR,
                contents.len(),
                contents.as_ptr() as *mut _,
            )?
        };
        Ok(buffer)
    }

    fn set_arg(
        &self,
        kernel: &mut Kernel,
        index: usize,
        buffer: &ClBuffer<u8>,
    ) -> Result<(), OpenClError> {
        let mem = buffer.get();
        unsafe { kernel.set_arg(index as cl_uint, &mem)? };
        Ok(())
    }

    fn enqueue(
        &self,
        queue: &CommandQueue,
        kernel: &Kernel,
        global_size: usize,
    ) -> Result<(), OpenClError> {
        let global_work_size = [global_size];
        let event = unsafe {
            queue.enqueue_nd_range_kernel(
                kernel.get(),
                1,
                ptr::null(),
                global_work_size.as_ptr(),
                ptr::null(),
                &[],
            )?
        };
        event.wait()?;
        Ok(())
    }

    fn read(
        &self,
        queue: &CommandQueue,
        buffer: &ClBuffer<u8>,
        dst: &mut [u8],
    ) -> Result<(), OpenClError> {
        unsafe {
            queue.enqueue_read_buffer(buffer, CL_BLOCKING, 0, dst, &[])?;
        }
        Ok(())
    }
}

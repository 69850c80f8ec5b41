//! In-process runtime for unit tests.
//!
//! Kernels are Rust functions registered by name. A build succeeds when the
//! source is well-bracketed, declares at least one `kernel void <name>(`, and
//! (if it mentions `double`) every device in the group advertises fp64.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use crate::runtime::Runtime;

pub type KernelFn = fn(global_size: usize, args: &mut [Vec<u8>]);

pub const FP64_EXTENSIONS: &str =
    "cl_khr_byte_addressable_store cl_khr_fp64 cl_khr_int64_base_atomics";
pub const AMD_FP64_EXTENSIONS: &str = "cl_khr_byte_addressable_store cl_amd_fp64";
pub const FP32_EXTENSIONS: &str = "cl_khr_byte_addressable_store cl_khr_fp16";

#[derive(Debug, Clone, PartialEq)]
pub struct HostDevice {
    pub name: String,
    pub extensions: String,
    pub launch_latency: Duration,
}

impl HostDevice {
    pub fn new(name: &str, extensions: &str) -> Self {
        Self {
            name: name.to_string(),
            extensions: extensions.to_string(),
            launch_latency: Duration::ZERO,
        }
    }

    pub fn fp64(name: &str) -> Self {
        Self::new(name, FP64_EXTENSIONS)
    }

    pub fn fp32(name: &str) -> Self {
        Self::new(name, FP32_EXTENSIONS)
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.launch_latency = latency;
        self
    }

    fn has_fp64(&self) -> bool {
        self.extensions.contains("fp64")
    }
}

#[derive(Debug, Clone)]
pub struct HostError(pub String);

impl std::fmt::Display for HostError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "host runtime error: {}", self.0)
    }
}

impl From<&str> for HostError {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

pub struct HostContext {
    devices: Vec<HostDevice>,
}

pub struct HostBinary {
    kernels: Vec<String>,
}

pub struct HostKernel {
    func: KernelFn,
    args: Vec<Option<Rc<RefCell<Vec<u8>>>>>,
}

pub struct HostQueue {
    device: HostDevice,
}

/// Device allocation; decrements the runtime's live count when dropped.
pub struct HostBuffer {
    data: Rc<RefCell<Vec<u8>>>,
    live: Rc<Cell<usize>>,
}

impl Drop for HostBuffer {
    fn drop(&mut self) {
        self.live.set(self.live.get() - 1);
    }
}

#[derive(Default)]
pub struct HostRuntime {
    platforms: Vec<Vec<HostDevice>>,
    kernels: HashMap<String, KernelFn>,
    pub fail_enumeration: Cell<bool>,
    /// Platform whose device query should fail
    pub fail_devices_at: Cell<Option<usize>>,
    pub fail_queue: Cell<bool>,
    /// Zero-based argument index whose binding should fail
    pub fail_set_arg_at: Cell<Option<usize>>,
    pub fail_enqueue: Cell<bool>,
    /// Kernel runs but reports a fault when waited on
    pub fail_execution: Cell<bool>,
    pub fail_readback: Cell<bool>,
    /// Zero-based index of the allocation that should fail
    pub fail_allocation_at: Cell<Option<usize>>,
    pub allocations: Cell<usize>,
    pub launches: Cell<usize>,
    pub reads: Cell<usize>,
    live_buffers: Rc<Cell<usize>>,
}

impl HostRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_platform(mut self, devices: Vec<HostDevice>) -> Self {
        self.platforms.push(devices);
        self
    }

    pub fn with_kernel(mut self, name: &str, func: KernelFn) -> Self {
        self.kernels.insert(name.to_string(), func);
        self
    }

    /// Number of device buffers not yet released
    pub fn live_buffers(&self) -> usize {
        self.live_buffers.get()
    }
}

fn is_well_bracketed(source: &str) -> bool {
    let mut stack = Vec::new();
    for c in source.chars() {
        match c {
            '(' | '{' | '[' => stack.push(c),
            ')' => {
                if stack.pop() != Some('(') {
                    return false;
                }
            }
            '}' => {
                if stack.pop() != Some('{') {
                    return false;
                }
            }
            ']' => {
                if stack.pop() != Some('[') {
                    return false;
                }
            }
            _ => {}
        }
    }
    stack.is_empty()
}

fn declared_kernels(source: &str) -> Vec<String> {
    source
        .split("kernel void")
        .skip(1)
        .filter_map(|rest| rest.split('(').next())
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

impl Runtime for HostRuntime {
    type Device = HostDevice;
    type Context = HostContext;
    type Binary = HostBinary;
    type Kernel = HostKernel;
    type Queue = HostQueue;
    type Buffer = HostBuffer;
    type Error = HostError;

    fn platform_count(&self) -> Result<usize, HostError> {
        if self.fail_enumeration.get() {
            return Err("CL_PLATFORM_NOT_FOUND_KHR".into());
        }
        Ok(self.platforms.len())
    }

    fn devices(&self, platform: usize) -> Result<Vec<HostDevice>, HostError> {
        if self.fail_enumeration.get() || self.fail_devices_at.get() == Some(platform) {
            return Err("CL_DEVICE_NOT_FOUND".into());
        }
        self.platforms
            .get(platform)
            .cloned()
            .ok_or_else(|| "CL_INVALID_PLATFORM".into())
    }

    fn extensions(&self, device: &HostDevice) -> Result<String, HostError> {
        Ok(device.extensions.clone())
    }

    fn device_name(&self, device: &HostDevice) -> String {
        device.name.clone()
    }

    fn create_context(&self, devices: &[HostDevice]) -> Result<HostContext, HostError> {
        if devices.is_empty() {
            return Err("CL_INVALID_VALUE".into());
        }
        Ok(HostContext {
            devices: devices.to_vec(),
        })
    }

    fn build(
        &self,
        context: &HostContext,
        devices: &[HostDevice],
        source: &str,
    ) -> Result<HostBinary, HostError> {
        if devices.iter().any(|d| !context.devices.contains(d)) {
            return Err("CL_INVALID_DEVICE".into());
        }
        let kernels = declared_kernels(source);
        if !is_well_bracketed(source) || kernels.is_empty() {
            return Err("CL_BUILD_PROGRAM_FAILURE".into());
        }
        if source.contains("double") && devices.iter().any(|d| !d.has_fp64()) {
            return Err("CL_BUILD_PROGRAM_FAILURE".into());
        }
        Ok(HostBinary { kernels })
    }

    fn create_kernel(&self, binary: &HostBinary, name: &str) -> Result<HostKernel, HostError> {
        if !binary.kernels.iter().any(|k| k == name) {
            return Err("CL_INVALID_KERNEL_NAME".into());
        }
        let func = *self
            .kernels
            .get(name)
            .ok_or(HostError::from("no host implementation registered"))?;
        Ok(HostKernel {
            func,
            args: Vec::new(),
        })
    }

    fn create_queue(
        &self,
        context: &HostContext,
        device: &HostDevice,
    ) -> Result<HostQueue, HostError> {
        if !context.devices.contains(device) {
            return Err("CL_INVALID_DEVICE".into());
        }
        if self.fail_queue.get() {
            return Err("CL_OUT_OF_HOST_MEMORY".into());
        }
        Ok(HostQueue {
            device: device.clone(),
        })
    }

    fn create_buffer(
        &self,
        _context: &HostContext,
        contents: &[u8],
    ) -> Result<HostBuffer, HostError> {
        let index = self.allocations.get();
        self.allocations.set(index + 1);
        if self.fail_allocation_at.get() == Some(index) {
            return Err("CL_MEM_OBJECT_ALLOCATION_FAILURE".into());
        }
        self.live_buffers.set(self.live_buffers.get() + 1);
        Ok(HostBuffer {
            data: Rc::new(RefCell::new(contents.to_vec())),
            live: Rc::clone(&self.live_buffers),
        })
    }

    fn set_arg(
        &self,
        kernel: &mut HostKernel,
        index: usize,
        buffer: &HostBuffer,
    ) -> Result<(), HostError> {
        if self.fail_set_arg_at.get() == Some(index) {
            return Err("CL_INVALID_ARG_SIZE".into());
        }
        if kernel.args.len() <= index {
            kernel.args.resize(index + 1, None);
        }
        kernel.args[index] = Some(Rc::clone(&buffer.data));
        Ok(())
    }

    fn enqueue(
        &self,
        queue: &HostQueue,
        kernel: &HostKernel,
        global_size: usize,
    ) -> Result<(), HostError> {
        if self.fail_enqueue.get() {
            return Err("CL_OUT_OF_RESOURCES".into());
        }
        let mut args = Vec::with_capacity(kernel.args.len());
        for arg in &kernel.args {
            let arg = arg.as_ref().ok_or(HostError::from("CL_INVALID_KERNEL_ARGS"))?;
            args.push(arg.borrow().clone());
        }
        std::thread::sleep(queue.device.launch_latency);
        (kernel.func)(global_size, &mut args);
        for (arg, data) in kernel.args.iter().flatten().zip(args) {
            *arg.borrow_mut() = data;
        }
        self.launches.set(self.launches.get() + 1);
        if self.fail_execution.get() {
            return Err("CL_EXEC_STATUS_ERROR_FOR_EVENTS_IN_WAIT_LIST".into());
        }
        Ok(())
    }

    fn read(
        &self,
        _queue: &HostQueue,
        buffer: &HostBuffer,
        dst: &mut [u8],
    ) -> Result<(), HostError> {
        if self.fail_readback.get() {
            return Err("CL_INVALID_COMMAND_QUEUE".into());
        }
        let data = buffer.data.borrow();
        dst.copy_from_slice(&data[..dst.len()]);
        self.reads.set(self.reads.get() + 1);
        Ok(())
    }
}

pub fn decode_f64(bytes: &[u8]) -> Vec<f64> {
    bytes
        .chunks_exact(8)
        .map(|c| f64::from_ne_bytes(c.try_into().unwrap()))
        .collect()
}

pub fn decode_i32(bytes: &[u8]) -> Vec<i32> {
    bytes
        .chunks_exact(4)
        .map(|c| i32::from_ne_bytes(c.try_into().unwrap()))
        .collect()
}

/// `add(ulong *n, double *a, double *b, double *c)`: `c[i] = a[i] + b[i]`
pub fn add_f64(global_size: usize, args: &mut [Vec<u8>]) {
    let a = decode_f64(&args[1]);
    let b = decode_f64(&args[2]);
    for i in 0..global_size {
        let sum = (a[i] + b[i]).to_ne_bytes();
        args[3][i * 8..(i + 1) * 8].copy_from_slice(&sum);
    }
}

/// `add_i32(int *a, int *b, int *c)`: `c[i] = a[i] + b[i]`
pub fn add_i32(global_size: usize, args: &mut [Vec<u8>]) {
    let a = decode_i32(&args[0]);
    let b = decode_i32(&args[1]);
    for i in 0..global_size {
        let sum = a[i].wrapping_add(b[i]).to_ne_bytes();
        args[2][i * 4..(i + 1) * 4].copy_from_slice(&sum);
    }
}

pub const ADD_I32_SOURCE: &str = r#"
    kernel void add_i32(global const int *a, global const int *b, global int *c) {
        size_t i = get_global_id(0);
        c[i] = a[i] + b[i];
    }
"#;

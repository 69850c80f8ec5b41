//! OpenCL device handles and error type.

use opencl3::device::{CL_DEVICE_TYPE_ALL, Device};
use opencl3::error_codes::ClError;
use opencl3::platform::Platform;
use opencl3::types::cl_device_id;

/// Error type for OpenCL runtime operations
#[derive(Debug, Clone)]
pub struct OpenClError(String);

impl std::fmt::Display for OpenClError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OpenCL error: {}", self.0)
    }
}

impl std::error::Error for OpenClError {}

impl From<ClError> for OpenClError {
    fn from(e: ClError) -> Self {
        Self(e.to_string())
    }
}

impl From<String> for OpenClError {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OpenClError {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Handle to an OpenCL device
///
/// Wraps the raw device id; the device itself is owned by its platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClDevice(cl_device_id);

impl ClDevice {
    pub(crate) fn new(id: cl_device_id) -> Self {
        Self(id)
    }

    /// Raw OpenCL device id
    pub fn id(&self) -> cl_device_id {
        self.0
    }

    pub(crate) fn cl_device(&self) -> Device {
        Device::new(self.0)
    }

    /// Get the device name
    pub fn name(&self) -> String {
        self.cl_device()
            .name()
            .unwrap_or_else(|_| "Unknown".to_string())
    }

    /// Get the device vendor
    pub fn vendor(&self) -> String {
        self.cl_device()
            .vendor()
            .unwrap_or_else(|_| "Unknown".to_string())
    }
}

/// Lists the ids of every device on `platform`, whatever its type.
pub(crate) fn list_ids(platform: &Platform) -> Result<Vec<cl_device_id>, ClError> {
    platform.get_devices(CL_DEVICE_TYPE_ALL)
}

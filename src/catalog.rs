//! Device catalog: platform enumeration and double-precision filtering.

use crate::error::{Error, Result};
use crate::runtime::Runtime;

/// Extension tokens advertising double-precision support
///
/// `cl_khr_fp64` is the Khronos spelling; older AMD drivers only report
/// `cl_amd_fp64`.
pub const DOUBLE_PRECISION_EXTENSIONS: [&str; 2] = ["cl_khr_fp64", "cl_amd_fp64"];

/// Returns the number of installed platforms.
pub fn platform_size<R: Runtime>(runtime: &R) -> Result<usize> {
    runtime
        .platform_count()
        .map_err(Error::RuntimeQuery.collapse("enumerate platforms"))
}

/// Returns true if an extension string advertises double precision.
pub fn supports_double_precision(extensions: &str) -> bool {
    DOUBLE_PRECISION_EXTENSIONS
        .iter()
        .any(|token| extensions.contains(token))
}

/// Returns the devices of platform `platform_index` that support double precision.
///
/// Device order is the runtime's enumeration order. A platform without any
/// such device yields an empty group; only a failing query is an error.
pub fn get_double_precision_devices<R: Runtime>(
    runtime: &R,
    platform_index: usize,
) -> Result<Vec<R::Device>> {
    let devices = runtime
        .devices(platform_index)
        .map_err(Error::RuntimeQuery.collapse("enumerate devices"))?;

    let mut group = Vec::with_capacity(devices.len());
    for device in devices {
        let extensions = runtime
            .extensions(&device)
            .map_err(Error::RuntimeQuery.collapse("query device extensions"))?;
        if supports_double_precision(&extensions) {
            group.push(device);
        } else {
            log::debug!(
                "Platform {}: skipping {} (no double precision)",
                platform_index,
                runtime.device_name(&device)
            );
        }
    }
    Ok(group)
}

/// Moves the device at `index` to the front of the group, making it the supervisor.
///
/// The device previously at the front takes position `index`.
///
/// # Panics
///
/// Panics if `index` is out of bounds.
pub fn promote_supervisor<D>(devices: &mut [D], index: usize) {
    assert!(
        index < devices.len(),
        "supervisor index {} out of range for a group of {} devices",
        index,
        devices.len()
    );
    devices.swap(0, index);
}

//! Program compiler: builds kernel source for a whole device group.

use crate::error::{Error, Result};
use crate::runtime::Runtime;

/// Kernel binary compiled for every device of a group under one context
///
/// The supervisor is the group's first device at build time; its queue
/// issues all work dispatched from this program.
pub struct Program<R: Runtime> {
    supervisor: R::Device,
    context: R::Context,
    binary: R::Binary,
}

impl<R: Runtime> Program<R> {
    /// Device whose command queue issues work for this program
    pub fn supervisor(&self) -> &R::Device {
        &self.supervisor
    }

    pub fn context(&self) -> &R::Context {
        &self.context
    }

    pub fn binary(&self) -> &R::Binary {
        &self.binary
    }
}

impl<R: Runtime> std::fmt::Debug for Program<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Program")
            .field("supervisor", &self.supervisor)
            .finish_non_exhaustive()
    }
}

/// Builds `source` into a program spanning every device of `devices`.
///
/// One context is created over the whole group and the source is compiled
/// for each device in it. Failure on any device fails the whole build.
///
/// # Panics
///
/// Panics if `devices` is empty.
pub fn make_program<R: Runtime>(
    runtime: &R,
    devices: &[R::Device],
    source: &str,
) -> Result<Program<R>> {
    assert!(
        !devices.is_empty(),
        "cannot build a program for an empty device group"
    );

    let supervisor = devices[0].clone();
    let context = runtime
        .create_context(devices)
        .map_err(Error::Build.collapse("create context"))?;
    let binary = runtime
        .build(&context, devices, source)
        .map_err(Error::Build.collapse("build program"))?;

    log::debug!(
        "Built {} bytes of kernel source for {} device(s), supervisor {}",
        source.len(),
        devices.len(),
        runtime.device_name(&supervisor)
    );

    Ok(Program {
        supervisor,
        context,
        binary,
    })
}

//! Benchmark-driven device group selection.
//!
//! Advertised capabilities say little about real double-precision
//! throughput, so every platform's fp64-capable group is timed on the same
//! reference kernel and the fastest group wins.

use std::time::{Duration, Instant};

use crate::catalog::{get_double_precision_devices, platform_size};
use crate::compiler::make_program;
use crate::dispatch::{KernelArg, Synchronize, run};
use crate::error::Result;
use crate::runtime::Runtime;

/// Element-wise addition of two double arrays; `n` carries the element count.
pub const REFERENCE_KERNEL: &str = r#"
kernel void add(global const ulong *n,
                global const double *a,
                global const double *b,
                global double *c) {
    size_t i = get_global_id(0);
    c[i] = a[i] + b[i];
}
"#;

pub const REFERENCE_KERNEL_NAME: &str = "add";

/// Environment variable overriding [`BenchConfig::element_count`]
pub const ELEMENTS_ENV: &str = "CLPICK_BENCH_ELEMENTS";

/// Benchmark problem configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BenchConfig {
    /// Length of each reference array, and the number of work items launched
    pub element_count: usize,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            element_count: 1 << 25,
        }
    }
}

impl BenchConfig {
    pub fn with_element_count(mut self, element_count: usize) -> Self {
        self.element_count = element_count;
        self
    }

    /// Returns true if three `f64` arrays of `count` elements can be allocated.
    ///
    /// Zero is rejected, as is any count whose byte size exceeds `isize::MAX`.
    pub fn is_valid_element_count(count: usize) -> bool {
        count > 0
            && count
                .checked_mul(std::mem::size_of::<f64>())
                .is_some_and(|bytes| bytes <= isize::MAX as usize)
    }

    /// Default configuration overridden by `CLPICK_BENCH_ELEMENTS` when set.
    pub fn from_env() -> Self {
        Self::from_env_value(std::env::var(ELEMENTS_ENV).ok().as_deref())
    }

    fn from_env_value(value: Option<&str>) -> Self {
        let config = Self::default();
        let Some(value) = value else {
            return config;
        };
        match value.trim().parse::<usize>() {
            Ok(count) if Self::is_valid_element_count(count) => config.with_element_count(count),
            _ => {
                log::warn!(
                    "Ignoring {}={:?}; using {} elements",
                    ELEMENTS_ENV,
                    value,
                    config.element_count
                );
                config
            }
        }
    }
}

/// Builds and runs the reference kernel on `devices`, reading back only the output.
pub fn run_reference<R: Runtime>(
    runtime: &R,
    devices: &[R::Device],
    config: &BenchConfig,
) -> Result<()> {
    let n = config.element_count;
    let count = [n as u64];
    let a = vec![0.0f64; n];
    let b = vec![0.0f64; n];
    let mut c = vec![0.0f64; n];

    let program = make_program(runtime, devices, REFERENCE_KERNEL)?;
    let mut handle = run(
        runtime,
        &program,
        REFERENCE_KERNEL_NAME,
        n,
        vec![
            KernelArg::read_only(&count),
            KernelArg::read_only(&a),
            KernelArg::read_only(&b),
            KernelArg::new(&mut c),
        ],
    )?;
    handle.sync(3)
}

/// Wall-clock time of one [`run_reference`] on `devices`.
pub fn benchmark<R: Runtime>(
    runtime: &R,
    devices: &[R::Device],
    config: &BenchConfig,
) -> Result<Duration> {
    let start = Instant::now();
    run_reference(runtime, devices, config)?;
    Ok(start.elapsed())
}

/// Returns the candidate with the smallest measured duration.
///
/// Candidates are measured one at a time in iteration order; on a tie the
/// first one seen is kept. Returns `None` for an empty sequence.
pub fn select_fastest<T, E, I, F>(
    candidates: I,
    mut measure: F,
) -> std::result::Result<Option<(T, Duration)>, E>
where
    I: IntoIterator<Item = T>,
    F: FnMut(&T) -> std::result::Result<Duration, E>,
{
    let mut best: Option<(T, Duration)> = None;
    for candidate in candidates {
        let elapsed = measure(&candidate)?;
        if best.as_ref().is_none_or(|(_, fastest)| elapsed < *fastest) {
            best = Some((candidate, elapsed));
        }
    }
    Ok(best)
}

/// Winning device group of a selection scan
#[derive(Debug, Clone, PartialEq)]
pub struct Selection<D> {
    /// Index of the platform the group belongs to
    pub platform: usize,
    /// Double-precision devices of that platform, in runtime order
    pub devices: Vec<D>,
    /// Reference kernel time measured for the group during the scan
    pub elapsed: Duration,
}

/// Returns the fastest double-precision device group at the default problem size.
///
/// See [`get_most_flops_device_group_with`].
pub fn get_most_flops_device_group<R: Runtime>(runtime: &R) -> Result<Vec<R::Device>> {
    get_most_flops_device_group_with(runtime, &BenchConfig::default())
}

/// Benchmarks every platform's double-precision group and returns the fastest.
///
/// The result is empty when no platform qualifies. See [`select_device_group`].
pub fn get_most_flops_device_group_with<R: Runtime>(
    runtime: &R,
    config: &BenchConfig,
) -> Result<Vec<R::Device>> {
    Ok(select_device_group(runtime, config)?
        .map(|selection| selection.devices)
        .unwrap_or_default())
}

/// Scans the platforms in order and keeps the fastest double-precision group.
///
/// Each platform is queried only when the scan reaches it, and only the best
/// group so far is retained. Platforms without a double-precision device are
/// skipped. Any runtime failure aborts the scan. Returns `None` when no
/// platform qualifies.
pub fn select_device_group<R: Runtime>(
    runtime: &R,
    config: &BenchConfig,
) -> Result<Option<Selection<R::Device>>> {
    let mut enumeration = Ok(());
    let groups = (0..platform_size(runtime)?)
        .map_while(|platform| match get_double_precision_devices(runtime, platform) {
            Ok(group) => Some((platform, group)),
            Err(e) => {
                enumeration = Err(e);
                None
            }
        })
        .filter(|(platform, group)| {
            if group.is_empty() {
                log::debug!("Platform {}: no double-precision devices", platform);
            }
            !group.is_empty()
        });

    let fastest = select_fastest(groups, |(platform, group)| -> Result<Duration> {
        let elapsed = benchmark(runtime, group, config)?;
        log::info!(
            "Platform {}: {} device(s) added {} doubles in {:?}",
            platform,
            group.len(),
            config.element_count,
            elapsed
        );
        Ok(elapsed)
    })?;
    enumeration?;

    match fastest {
        Some(((platform, devices), elapsed)) => {
            let names: Vec<_> = devices.iter().map(|d| runtime.device_name(d)).collect();
            log::info!(
                "Selected platform {} ({:?}) at {:?}",
                platform,
                names,
                elapsed
            );
            Ok(Some(Selection {
                platform,
                devices,
                elapsed,
            }))
        }
        None => {
            log::info!("No double-precision device group found");
            Ok(None)
        }
    }
}

//! clpick: run kernels on the fastest double-precision OpenCL device group
//!
//! Usage:
//!   clpick devices
//!   clpick select [--elements N]
//!   clpick run <FILE> [--kernel NAME] [--size N] [--supervisor K]
//!
//! Examples:
//!   clpick select --elements 1048576
//!   clpick run kernels/add.cl --size 134217728
//!   RUST_LOG=debug clpick run kernels/add.cl --supervisor 1

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};

use clpick::catalog::supports_double_precision;
use clpick::runtime::opencl::ClDevice;
use clpick::runtime::{OpenClRuntime, Runtime};
use clpick::{
    BenchConfig, KernelArg, Selection, Synchronize, make_program, platform_size,
    promote_supervisor, run, select_device_group,
};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser, Debug)]
#[command(name = "clpick")]
#[command(about = "Pick the fastest double-precision OpenCL device group and run kernels on it")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List every device and whether it supports double precision
    Devices,

    /// Benchmark every platform and print the fastest device group
    Select {
        /// Reference problem size (default: $CLPICK_BENCH_ELEMENTS, else 2^25)
        #[arg(long, value_name = "N")]
        elements: Option<usize>,
    },

    /// Run a kernel from an OpenCL C source file on the fastest device group
    ///
    /// The kernel receives (uchar *a, ulong *b, ulong *c) with a[i] = i mod 255
    /// and b[i] = i; only c is read back.
    Run {
        /// Kernel source file (.cl, UTF-8)
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Kernel entry point
        #[arg(short, long, default_value = "add")]
        kernel: String,

        /// Number of elements and work items
        #[arg(short = 'n', long, default_value_t = 1 << 27)]
        size: usize,

        /// Index within the selected group of the device that issues the work
        #[arg(long, default_value_t = 0)]
        supervisor: usize,

        /// Reference problem size used for device selection
        #[arg(long, value_name = "N")]
        elements: Option<usize>,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = execute(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn execute(cli: Cli) -> CliResult<()> {
    if !OpenClRuntime::is_available() {
        return Err("no OpenCL platform with a device was found".into());
    }
    let runtime = OpenClRuntime::new();
    let mut stdout = io::stdout().lock();

    match cli.command {
        Commands::Devices => list_devices(&runtime, &mut stdout),
        Commands::Select { elements } => {
            let selection = select_group(&runtime, &bench_config(elements))?;
            print_selection(&mut stdout, &selection)?;
            Ok(())
        }
        Commands::Run {
            input,
            kernel,
            size,
            supervisor,
            elements,
        } => {
            let source = read_source(&input)?;
            let mut group = select_group(&runtime, &bench_config(elements))?.devices;
            if supervisor >= group.len() {
                return Err(format!(
                    "supervisor index {} out of range (group has {} devices)",
                    supervisor,
                    group.len()
                )
                .into());
            }
            promote_supervisor(&mut group, supervisor);
            log::info!("Supervisor: {}", group[0].name());

            let (elapsed, c) = run_driver_kernel(&runtime, &group, &source, &kernel, size)?;
            report(&mut stdout, elapsed, &c)?;
            Ok(())
        }
    }
}

/// Benchmark configuration: the flag wins over the environment.
fn bench_config(elements: Option<usize>) -> BenchConfig {
    match elements {
        Some(n) if BenchConfig::is_valid_element_count(n) => {
            BenchConfig::default().with_element_count(n)
        }
        Some(n) => {
            log::warn!("Ignoring --elements {}", n);
            BenchConfig::from_env()
        }
        None => BenchConfig::from_env(),
    }
}

fn select_group(
    runtime: &OpenClRuntime,
    config: &BenchConfig,
) -> CliResult<Selection<ClDevice>> {
    select_device_group(runtime, config)?
        .ok_or_else(|| "no device with double-precision support was found".into())
}

/// Reads kernel source, which must be UTF-8 to be handed to the compiler.
fn read_source(path: &Path) -> CliResult<String> {
    let bytes =
        fs::read(path).map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    String::from_utf8(bytes).map_err(|e| {
        format!(
            "{} is not valid UTF-8 (invalid byte at offset {})",
            path.display(),
            e.utf8_error().valid_up_to()
        )
        .into()
    })
}

/// Host inputs of the driver's fixed binding layout
fn driver_inputs(size: usize) -> (Vec<u8>, Vec<u64>) {
    let a = (0..size).map(|i| (i % 0xFF) as u8).collect();
    let b = (0..size as u64).collect();
    (a, b)
}

/// Builds `source`, runs `kernel` with `(a, b, c)` and reads back `c`.
///
/// The returned duration covers dispatch and readback, not the build.
fn run_driver_kernel(
    runtime: &OpenClRuntime,
    group: &[ClDevice],
    source: &str,
    kernel: &str,
    size: usize,
) -> CliResult<(Duration, Vec<u64>)> {
    let (a, b) = driver_inputs(size);
    let mut c = vec![0u64; size];
    let program = make_program(runtime, group, source)?;

    let start = Instant::now();
    let mut handle = run(
        runtime,
        &program,
        kernel,
        size,
        vec![
            KernelArg::read_only(&a),
            KernelArg::read_only(&b),
            KernelArg::new(&mut c),
        ],
    )?;
    handle.sync(2)?;
    drop(handle);
    Ok((start.elapsed(), c))
}

fn list_devices(runtime: &OpenClRuntime, out: &mut impl Write) -> CliResult<()> {
    for platform in 0..platform_size(runtime)? {
        writeln!(out, "platform {}:", platform)?;
        for device in runtime.devices(platform)? {
            let fp64 = supports_double_precision(&runtime.extensions(&device)?);
            writeln!(
                out,
                "  {} ({}) fp64: {}",
                device.name(),
                device.vendor(),
                if fp64 { "yes" } else { "no" }
            )?;
        }
    }
    Ok(())
}

fn print_selection(out: &mut impl Write, selection: &Selection<ClDevice>) -> io::Result<()> {
    writeln!(out, "platform {}:", selection.platform)?;
    for (i, device) in selection.devices.iter().enumerate() {
        let role = if i == 0 { " (supervisor)" } else { "" };
        writeln!(out, "{}: {}{}", i, device.name(), role)?;
    }
    writeln!(out, "reference kernel: {} us", selection.elapsed.as_micros())
}

/// Prints the elapsed milliseconds followed by the first five results.
fn report(out: &mut impl Write, elapsed: Duration, c: &[u64]) -> io::Result<()> {
    writeln!(out, "{}", elapsed.as_millis())?;
    for value in c.iter().take(5) {
        writeln!(out, "{}", value)?;
    }
    Ok(())
}

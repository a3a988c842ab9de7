//! `accel-stream`: stream buffers through an FPGA accelerator channel.
//!
//! ```text
//! USAGE:
//!   accel-stream transfer -i in.bin -o out.bin   Process a file of u32 words
//!   accel-stream plan --length 100 --chunk-size 40 --lead 80
//!                                                 Print the operation schedule
//!   accel-stream selftest                         Loopback run, verify output
//!   accel-stream bench [--loopback]               Sustained throughput
//! ```

use accel_stream_driver::{
    select_channel, ChannelSelection, ChunkPlan, DeviceConfig, LoopbackChannel, RecordingChannel,
    StreamController, TransferConfig, TransferReport, Word, DEFAULT_DEVICE_PATH,
    DEFAULT_POLL_TIMEOUT_MS, MAX_CHUNK_ELEMENTS, WORD_BYTES,
};
use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "accel-stream",
    about = "Chunked, pipelined transfers through an accelerator DMA channel",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Stream a file of little-endian u32 words through the device.
    Transfer {
        /// Input file.
        #[arg(short, long)]
        input: PathBuf,
        /// Output file (written with the device output).
        #[arg(short, long)]
        output: PathBuf,
        #[command(flatten)]
        device: DeviceArgs,
        #[command(flatten)]
        shape: ShapeArgs,
    },
    /// Print the interleaved write/read schedule without touching hardware.
    Plan {
        /// Buffer length in elements.
        #[arg(long)]
        length: usize,
        #[command(flatten)]
        shape: ShapeArgs,
    },
    /// Run a transfer through the software pipeline model and verify it.
    Selftest {
        /// Buffer length in elements.
        #[arg(long, default_value_t = 100_000)]
        length: usize,
        /// Pipeline fill latency of the model, in elements (also the
        /// default lead).
        #[arg(long, default_value_t = 2048)]
        latency: usize,
        #[command(flatten)]
        shape: ShapeArgs,
    },
    /// Measure sustained transfer throughput.
    Bench {
        /// Use the loopback model instead of the device.
        #[arg(long)]
        loopback: bool,
        /// Buffer length in elements.
        #[arg(long, default_value_t = 1 << 20)]
        length: usize,
        /// Timed iterations.
        #[arg(long, default_value_t = 20)]
        iterations: usize,
        #[command(flatten)]
        device: DeviceArgs,
        #[command(flatten)]
        shape: ShapeArgs,
    },
}

#[derive(Args)]
struct DeviceArgs {
    /// DMA character device.
    #[arg(long, default_value = DEFAULT_DEVICE_PATH)]
    device: PathBuf,
    /// How long one chunk may wait for the device (ms).
    #[arg(long, default_value_t = DEFAULT_POLL_TIMEOUT_MS)]
    timeout_ms: u64,
}

impl DeviceArgs {
    fn config(&self) -> DeviceConfig {
        DeviceConfig::new(&self.device).with_poll_timeout_ms(self.timeout_ms)
    }
}

#[derive(Args)]
struct ShapeArgs {
    /// Elements per device operation.
    #[arg(long)]
    chunk_size: Option<usize>,
    /// Bytes per device operation (rounded up to whole words).
    #[arg(long, conflicts_with = "chunk_size")]
    chunk_bytes: Option<usize>,
    /// Elements written before reading starts.
    #[arg(long)]
    lead: Option<usize>,
    /// Derive chunk and lead from a row-major image width (two-row lead).
    #[arg(long, conflicts_with_all = ["chunk_size", "chunk_bytes", "lead"])]
    image_width: Option<usize>,
}

impl ShapeArgs {
    fn config(&self) -> TransferConfig {
        self.config_with_lead(0)
    }

    /// Configuration with `default_lead` when no lead was given
    fn config_with_lead(&self, default_lead: usize) -> TransferConfig {
        if let Some(width) = self.image_width {
            return TransferConfig::for_image(width);
        }
        let lead = self.lead.unwrap_or(default_lead);
        match self.chunk_bytes {
            Some(bytes) => TransferConfig::from_chunk_bytes(bytes, lead),
            None => TransferConfig::default()
                .with_chunk_size(self.chunk_size.unwrap_or(MAX_CHUNK_ELEMENTS))
                .with_lead_elements(lead),
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Cmd::Transfer {
            input,
            output,
            device,
            shape,
        } => cmd_transfer(&input, &output, &device.config(), shape.config())?,
        Cmd::Plan { length, shape } => cmd_plan(length, shape.config())?,
        Cmd::Selftest {
            length,
            latency,
            shape,
        } => cmd_selftest(length, latency, shape.config_with_lead(latency))?,
        Cmd::Bench {
            loopback,
            length,
            iterations,
            device,
            shape,
        } => cmd_bench(loopback, length, iterations, &device.config(), shape.config())?,
    }

    Ok(())
}

fn cmd_transfer(
    input: &Path,
    output: &Path,
    device: &DeviceConfig,
    config: TransferConfig,
) -> Result<()> {
    let mut buffer = read_words(input)?;
    if buffer.is_empty() {
        bail!("{} holds no words", input.display());
    }
    tracing::info!("Read {} words from {}", buffer.len(), input.display());

    let mut channel = select_channel(ChannelSelection::Device, device);
    let report = StreamController::new(config)
        .run(channel.as_mut(), &mut buffer)
        .with_context(|| {
            format!(
                "streaming {} through {}",
                input.display(),
                device.path.display()
            )
        })?;

    write_words(output, &buffer)?;
    tracing::info!("Wrote {} words to {}", buffer.len(), output.display());
    print_report(&report);
    Ok(())
}

fn cmd_plan(length: usize, config: TransferConfig) -> Result<()> {
    let plan = ChunkPlan::new(length, config.chunk_size)?;
    let mut channel = RecordingChannel::new();
    let mut buffer = vec![0; length];
    let report = StreamController::new(config).run(&mut channel, &mut buffer)?;

    println!(
        "Schedule: {length} elements, chunk {} ({} bytes), lead {}",
        config.chunk_size,
        config.chunk_bytes(),
        config.lead_elements
    );
    let sizes: Vec<String> = plan.chunks().map(|chunk| chunk.len.to_string()).collect();
    println!("Per side : {} ops [{}]", plan.op_count(), sizes.join(", "));
    println!();
    for (i, op) in channel.ops().iter().enumerate() {
        println!("  {i:>4}  {op}");
    }
    println!();
    print_report(&report);
    Ok(())
}

fn cmd_selftest(length: usize, latency: usize, config: TransferConfig) -> Result<()> {
    if config.lead_elements < latency.min(length) {
        println!(
            "note: lead {} is below the model latency {latency}; expect an underrun",
            config.lead_elements
        );
    }

    let mut channel =
        LoopbackChannel::new(|word| word.rotate_left(7)).with_pipeline(latency, length);
    let mut buffer = pattern(length);
    let expected: Vec<Word> = buffer.iter().map(|word| word.rotate_left(7)).collect();

    let report = StreamController::new(config).run(&mut channel, &mut buffer)?;

    if let Some(index) = buffer.iter().zip(&expected).position(|(got, want)| got != want) {
        bail!(
            "mismatch at element {index}: got {:#010x}, expected {:#010x}",
            buffer[index],
            expected[index]
        );
    }

    println!("Self-test passed: {length} elements verified");
    print_report(&report);
    Ok(())
}

fn cmd_bench(
    loopback: bool,
    length: usize,
    iterations: usize,
    device: &DeviceConfig,
    config: TransferConfig,
) -> Result<()> {
    let selection = if loopback {
        ChannelSelection::Loopback
    } else {
        ChannelSelection::Device
    };
    let mut channel = select_channel(selection, device);
    let controller = StreamController::new(config);
    let mut buffer = pattern(length);

    println!("Transfer throughput benchmark");
    println!("=============================");
    println!("Channel    : {}", channel.kind());
    println!("Length     : {length} elements ({} KB)", length * WORD_BYTES / 1024);
    println!(
        "Chunk/lead : {} ({} bytes) / {}",
        config.chunk_size,
        config.chunk_bytes(),
        config.lead_elements
    );
    println!("Iterations : {iterations}");
    println!();

    // Warmup
    controller.run(channel.as_mut(), &mut buffer)?;

    let mut moved = 0;
    let t0 = Instant::now();
    for _ in 0..iterations {
        moved += controller.run(channel.as_mut(), &mut buffer)?.bytes_moved();
    }
    let elapsed = t0.elapsed();

    let mbps = accel_stream_driver::calculate_throughput(moved, elapsed.as_secs_f64());
    println!("Sustained  : {mbps:.1} MB/s (read + write)");
    println!("Per call   : {:?}", per_call(elapsed, iterations));
    Ok(())
}

fn per_call(elapsed: Duration, iterations: usize) -> Duration {
    u32::try_from(iterations)
        .ok()
        .filter(|&n| n > 0)
        .map_or(elapsed, |n| elapsed / n)
}

fn print_report(report: &TransferReport) {
    println!(
        "Writes {} / reads {} ({} short), {} iterations",
        report.write_ops, report.read_ops, report.short_ops, report.iterations
    );
    if let Some(at) = report.read_released_at {
        println!("Reading started after {at} elements written");
    }
    println!(
        "{} elements in {:?} ({:.2} MB/s)",
        report.elements_read, report.duration, report.throughput_mbps
    );
}

fn pattern(length: usize) -> Vec<Word> {
    (0..length)
        .map(|i| (i as Word).wrapping_mul(0x9E37_79B9))
        .collect()
}

fn read_words(path: &Path) -> Result<Vec<Word>> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    if bytes.len() % WORD_BYTES != 0 {
        bail!(
            "{} is {} bytes, not a whole number of {WORD_BYTES}-byte words",
            path.display(),
            bytes.len()
        );
    }
    Ok(bytes
        .chunks_exact(WORD_BYTES)
        .map(|b| Word::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

fn write_words(path: &Path, words: &[Word]) -> Result<()> {
    let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
    std::fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))
}

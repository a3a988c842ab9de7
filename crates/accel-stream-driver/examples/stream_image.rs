//! Stream a synthetic image through the accelerator
//!
//! Uses `/dev/simple_dma0` when present, the loopback model otherwise.
//!
//! ```text
//! cargo run --example stream_image -- 640 480
//! ```

use accel_stream_driver::{
    select_channel, ChannelSelection, DeviceConfig, Result, StreamController, TransferConfig,
    Word,
};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("accel_stream_driver=info")
        .init();

    let args: Vec<usize> = std::env::args()
        .skip(1)
        .filter_map(|a| a.parse().ok())
        .collect();
    let width = args.first().copied().unwrap_or(640);
    let height = args.get(1).copied().unwrap_or(480);

    let config = TransferConfig::for_image(width);
    println!(
        "Image {width}x{height}: chunk {} elements, lead {} elements",
        config.chunk_size, config.lead_elements
    );

    let mut channel = select_channel(ChannelSelection::Auto, &DeviceConfig::default());
    println!("Channel: {}", channel.kind());

    let mut image: Vec<Word> = (0..width * height)
        .map(|i| (((i % width) ^ (i / width)) & 0xff) as Word)
        .collect();

    let report = StreamController::new(config).run(channel.as_mut(), &mut image)?;

    println!(
        "Processed {} pixels: {} writes, {} reads, {:.2} MB/s",
        report.elements_read, report.write_ops, report.read_ops, report.throughput_mbps
    );
    println!("First row: {:?}", &image[..width.min(8)]);

    Ok(())
}

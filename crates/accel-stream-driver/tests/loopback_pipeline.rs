//! End-to-end transfers through the software pipeline model
//!
//! The loopback channel refuses reads the pipeline has not produced yet, so
//! these tests show that the lead is what keeps the reader behind the
//! accelerator's fill latency.

use accel_stream_driver::{
    select_channel, transfer, ChannelError, ChannelSelection, DeviceConfig, Direction,
    LoopbackChannel, StreamController, StreamError, TransferConfig, Word,
};

fn invert(word: Word) -> Word {
    !word
}

#[test]
fn lead_covering_latency_completes() {
    let length = 100;
    let mut channel = LoopbackChannel::new(invert).with_pipeline(80, length);
    let mut buffer: Vec<Word> = (0..length as Word).collect();

    let report = transfer(&mut channel, &mut buffer, length, 40, 80).expect("transfer");

    assert_eq!(report.write_ops, 3);
    assert_eq!(report.read_ops, 3);
    for (i, &word) in buffer.iter().enumerate() {
        assert_eq!(word, !(i as Word));
    }
}

#[test]
fn lead_below_latency_underruns() {
    let length = 100;
    let mut channel = LoopbackChannel::new(invert).with_pipeline(80, length);
    let mut buffer = vec![0; length];

    let err = transfer(&mut channel, &mut buffer, length, 40, 0).unwrap_err();

    match err {
        StreamError::TransferFailure {
            direction: Direction::Read,
            source: ChannelError::Underrun { requested, .. },
            ..
        } => assert_eq!(requested, 40),
        other => panic!("expected read underrun, got {other}"),
    }
}

#[test]
fn image_config_streams_rows() {
    // 32 rows of 48 pixels through a stencil that needs two rows of fill.
    let width = 48;
    let height = 32;
    let length = width * height;
    let config = TransferConfig::for_image(width);

    let mut channel =
        LoopbackChannel::new(|px| px.saturating_mul(3)).with_pipeline(2 * width, length);
    let mut image: Vec<Word> = (0..length as Word).map(|i| i % 251).collect();
    let expected: Vec<Word> = image.iter().map(|px| px * 3).collect();

    let report = StreamController::new(config)
        .run(&mut channel, &mut image)
        .expect("image transfer");

    assert_eq!(image, expected);
    assert_eq!(report.write_ops, height);
    assert_eq!(report.read_released_at, Some(2 * width));
}

#[test]
fn repeated_transfers_reuse_the_channel() {
    let mut channel = LoopbackChannel::identity();
    let controller = StreamController::new(TransferConfig::new(8, 8));

    for round in 0..3 {
        let mut buffer: Vec<Word> = (0..37).map(|i| i + round).collect();
        let original = buffer.clone();
        controller.run(&mut channel, &mut buffer).expect("round");
        assert_eq!(buffer, original);
    }
}

#[test]
fn auto_selection_without_hardware_uses_loopback() {
    let config = DeviceConfig::new("/dev/accel-stream-missing0");
    let mut channel = select_channel(ChannelSelection::Auto, &config);
    let mut buffer: Vec<Word> = (0..64).collect();

    let report = transfer(channel.as_mut(), &mut buffer, 64, 16, 0).expect("transfer");
    assert_eq!(report.elements_read, 64);
    assert!(buffer.iter().copied().eq(0..64));
}

#[test]
fn missing_device_is_unavailable() {
    let config = DeviceConfig::new("/dev/accel-stream-missing0");
    let mut channel = select_channel(ChannelSelection::Device, &config);
    let mut buffer = vec![0; 16];

    let err = transfer(channel.as_mut(), &mut buffer, 16, 4, 0).unwrap_err();
    assert!(matches!(
        err,
        StreamError::DeviceUnavailable {
            source: ChannelError::DeviceNotFound { .. }
        }
    ));
}

#[test]
#[ignore] // Requires the DMA kernel module and a loaded bitstream
fn hardware_round_trip() {
    let mut channel = select_channel(ChannelSelection::Device, &DeviceConfig::default());
    let mut buffer: Vec<Word> = (0..4096).collect();

    let report = transfer(channel.as_mut(), &mut buffer, 4096, 1024, 2048).expect("transfer");
    println!(
        "{} elements, {:.2} MB/s",
        report.elements_read, report.throughput_mbps
    );
}

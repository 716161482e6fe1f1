//! Pipeline tests for decoding sessions
//!
//! These run synthetic captures through the reader, demultiplexer and file
//! sink and check what lands on disk and in the report.

use super::*;
use crate::crc::calc_crc;
use crate::sink::CollectingSink;
use crate::test_utils::{
    MpduMuxer, RecordingDecompressor, RecordingFileManager, encode_fill_packet, encode_frame,
    encode_packet, encode_packet_with_crc, first_segment_data,
};
use crate::types::SequenceFlag;
use anyhow::{Context, Result, ensure};
use proptest::prelude::*;
use std::path::Path;
use tracing::info;

const FRAME: usize = 128;

fn session_over(capture: Vec<u8>, dir: &Path) -> Result<DemuxSession<std::io::Cursor<Vec<u8>>, FileSink>> {
    let config = DemuxConfig { frame_size: FRAME, ..DemuxConfig::new("13", dir) };
    let reader = FrameReader::from_bytes(capture, FRAME)?;
    Ok(DemuxSession::from_reader(reader, config))
}

#[test]
fn standalone_packet_round_trips_to_disk() -> Result<()> {
    let _ = tracing_subscriber::fmt::try_init();

    let dir = tempfile::tempdir()?;
    let image = b"standalone image payload";
    let user_data = first_segment_data(10, 24, 0, image);
    let mut muxer = MpduMuxer::new(FRAME);
    muxer.push_packet(&encode_packet(42, SequenceFlag::Standalone, 3, &user_data));

    let mut session = session_over(muxer.capture(), dir.path())?;
    let report = session.run()?;
    info!("{}", report);

    let written = std::fs::read(dir.path().join("13").join("42_0.lrit"))?;
    ensure!(written == user_data[10..], "payload after the transport prefix is written verbatim");
    ensure!(report.stats.packets_saved == 1, "one packet saved");
    ensure!(report.stats.crc_failures == 0, "no CRC failures");
    Ok(())
}

#[test]
fn segmented_group_reassembles_in_order() -> Result<()> {
    let _ = tracing_subscriber::fmt::try_init();

    let dir = tempfile::tempdir()?;
    let head = first_segment_data(10, 300, 0, b"<header>");
    let middle: Vec<u8> = (0..250u32).map(|i| (i * 7) as u8).collect();
    let tail: Vec<u8> = (0..90u32).map(|i| (i * 3) as u8).collect();

    let mut muxer = MpduMuxer::new(FRAME);
    muxer
        .push_packet(&encode_packet(17, SequenceFlag::First, 10, &head))
        .push_packet(&encode_packet(17, SequenceFlag::Continuation, 11, &middle))
        .push_packet(&encode_packet(17, SequenceFlag::Last, 12, &tail));

    let manager = RecordingFileManager::default();
    let config = DemuxConfig { frame_size: FRAME, ..DemuxConfig::new("13", dir.path()) };
    let sink = FileSink::from_config(&config).with_file_manager(manager.clone());
    let reader = FrameReader::from_bytes(muxer.capture(), FRAME)?;
    let report = DemuxSession::with_sink(config, reader, sink).run()?;

    let path = dir.path().join("13").join("17_0.lrit");
    let mut expected = head[10..].to_vec();
    expected.extend_from_slice(&middle);
    expected.extend_from_slice(&tail);

    ensure!(std::fs::read(&path)? == expected, "no duplicated or missing bytes");
    ensure!(manager.files() == vec![path], "finished file handed to the file manager once");
    ensure!(report.stats.packets_saved == 3, "three segments saved");
    Ok(())
}

#[test]
fn compressed_group_is_decompressed_once_at_its_end() -> Result<()> {
    let _ = tracing_subscriber::fmt::try_init();

    let dir = tempfile::tempdir()?;
    let mut muxer = MpduMuxer::new(FRAME);
    muxer.push_packet(&encode_packet(13, SequenceFlag::First, 0, &first_segment_data(10, 5424, 1, &[])));
    for sequence in 1..=4u16 {
        muxer.push_packet(&encode_packet(13, SequenceFlag::Continuation, sequence, &[sequence as u8; 150]));
    }
    muxer.push_packet(&encode_packet(13, SequenceFlag::Last, 5, &[5; 150]));

    let decompressor = RecordingDecompressor::default();
    let manager = RecordingFileManager::default();
    let config = DemuxConfig { frame_size: FRAME, ..DemuxConfig::new("13", dir.path()) };
    let sink = FileSink::from_config(&config)
        .with_decompressor(decompressor.clone())
        .with_file_manager(manager.clone());
    let reader = FrameReader::from_bytes(muxer.capture(), FRAME)?;
    let report = DemuxSession::with_sink(config, reader, sink).run()?;

    let channel_dir = dir.path().join("13");
    for sequence in 1..=5u16 {
        let segment = std::fs::read(channel_dir.join(format!("13_0_{sequence}.lrit")))?;
        ensure!(segment == vec![sequence as u8; 150], "segment {} written separately", sequence);
    }

    let requests = decompressor.requests();
    ensure!(requests.len() == 1, "one decompression per group");
    let request = &requests[0];
    ensure!(request.prefix == channel_dir.join("13_0_"), "prefix names the group");
    ensure!(request.pixel_count == 5424, "pixel count from the image structure header");
    ensure!((request.start_segment, request.end_segment) == (0, 5), "full segment range");
    ensure!(manager.files() == vec![channel_dir.join("13_0__decomp0.lrit")], "merged file managed");
    ensure!(report.stats.decompressions == 1, "decompression counted");
    Ok(())
}

#[test]
fn dropped_frame_is_counted_and_degrades_the_packet() -> Result<()> {
    let _ = tracing_subscriber::fmt::try_init();

    let packet = encode_packet(33, SequenceFlag::Standalone, 0, &[0x5A; 700]);
    let frames = MpduMuxer::new(FRAME).push_packet(&packet).frames();
    ensure!(frames.len() >= 6, "packet spans at least six frames");

    // Counter sequence 0, 1, 2, 4, 5: frame 3 is lost.
    let capture: Vec<u8> =
        [0usize, 1, 2, 4, 5].iter().flat_map(|&i| frames[i].iter().copied()).collect();

    let mut session = DemuxSession::with_sink(
        DemuxConfig::new("13", "unused"),
        FrameReader::from_bytes(capture, FRAME)?,
        CollectingSink::new(),
    );
    let report = session.run()?;

    ensure!(report.stats.frames_dropped == 1, "one frame dropped");
    let packets = session.into_sink().into_packets();
    let first = packets.first().context("packet flushed")?;
    ensure!(first.frames_dropped, "packet in flight at the gap is flagged");
    Ok(())
}

#[test]
fn corrupt_packet_is_dropped_by_default() -> Result<()> {
    let _ = tracing_subscriber::fmt::try_init();

    let user_data = first_segment_data(10, 16, 0, b"corrupted");
    let bad_crc = calc_crc(&user_data) ^ 0x0101;
    let mut muxer = MpduMuxer::new(FRAME);
    muxer.push_packet(&encode_packet_with_crc(44, SequenceFlag::Standalone, 0, &user_data, bad_crc));
    let capture = muxer.capture();

    let dir = tempfile::tempdir()?;
    let report = session_over(capture.clone(), dir.path())?.run()?;
    ensure!(report.stats.crc_failures == 1, "failure counted");
    ensure!(report.stats.packets_saved == 0, "nothing saved");
    ensure!(!dir.path().join("13").join("44_0.lrit").exists(), "nothing written");

    let dir = tempfile::tempdir()?;
    let config = DemuxConfig {
        frame_size: FRAME,
        export_corrupt: true,
        ..DemuxConfig::new("13", dir.path())
    };
    let report = DemuxSession::from_reader(FrameReader::from_bytes(capture, FRAME)?, config).run()?;
    ensure!(report.stats.crc_failures == 1, "still flagged when exported");
    ensure!(report.stats.corrupt_exported == 1, "export counted");
    let written = std::fs::read(dir.path().join("13").join("44_0.lrit"))?;
    ensure!(written == user_data[10..], "corrupt payload exported");
    Ok(())
}

#[test]
fn orphan_continuation_leaves_other_groups_intact() -> Result<()> {
    let _ = tracing_subscriber::fmt::try_init();

    let dir = tempfile::tempdir()?;
    let head = first_segment_data(10, 64, 0, b"H");
    let mut muxer = MpduMuxer::new(FRAME);
    muxer
        .push_packet(&encode_packet(60, SequenceFlag::First, 1, &head))
        .push_packet(&encode_packet(61, SequenceFlag::Continuation, 9, &[0xEE; 40]))
        .push_packet(&encode_packet(60, SequenceFlag::Last, 2, b"-end"));

    let report = session_over(muxer.capture(), dir.path())?.run()?;

    ensure!(report.stats.orphan_segments == 1, "orphan reported");
    ensure!(report.stats.packets_saved == 2, "the open group is unaffected");
    let written = std::fs::read(dir.path().join("13").join("60_0.lrit"))?;
    ensure!(written == [&head[10..], &b"-end"[..]].concat(), "group bytes intact");
    ensure!(!dir.path().join("13").join("61_0.lrit").exists(), "orphan not written");
    Ok(())
}

#[test]
fn back_to_back_packets_flush_in_arrival_order() -> Result<()> {
    let _ = tracing_subscriber::fmt::try_init();

    let a = encode_packet(70, SequenceFlag::Standalone, 0, &[1; 20]);
    let b = encode_packet(71, SequenceFlag::Standalone, 0, &[2; 30]);
    let mut muxer = MpduMuxer::new(FRAME);
    muxer.push_packet(&a).push_packet(&b);
    ensure!(muxer.frames().len() == 1, "both packets share one frame");

    let mut session = DemuxSession::with_sink(
        DemuxConfig::new("13", "unused"),
        FrameReader::from_bytes(muxer.capture(), FRAME)?,
        CollectingSink::new(),
    );
    session.run()?;

    let packets = session.into_sink().into_packets();
    ensure!(packets.len() == 2, "both packets flushed");
    ensure!(packets[0].apid() == 70 && packets[1].apid() == 71, "arrival order kept");
    ensure!(packets[0].data == a[6..] && packets[1].data == b[6..], "separated at the boundary");
    Ok(())
}

#[test]
fn reconstructed_packets_match_declared_lengths() -> Result<()> {
    let _ = tracing_subscriber::fmt::try_init();

    let mut muxer = MpduMuxer::new(FRAME);
    for (i, len) in [3usize, 117, 118, 119, 240, 1, 64, 500].into_iter().enumerate() {
        let user_data: Vec<u8> = (0..len).map(|b| (b + i) as u8).collect();
        muxer.push_packet(&encode_packet(100 + i as u16, SequenceFlag::Standalone, i as u16, &user_data));
    }

    let mut session = DemuxSession::with_sink(
        DemuxConfig::new("13", "unused"),
        FrameReader::from_bytes(muxer.capture(), FRAME)?,
        CollectingSink::new(),
    );
    let report = session.run()?;
    ensure!(report.stats.frames_dropped == 0, "clean capture");

    let packets = session.into_sink().into_packets();
    ensure!(packets.len() == 8, "every packet flushed, got {}", packets.len());
    for packet in &packets {
        ensure!(packet.data.len() == packet.header.packet_length(), "length of APID {}", packet.apid());
        let (payload, crc) = crate::crc::split_trailer(&packet.data).context("trailer present")?;
        ensure!(crate::crc::validate(payload, crc), "CRC of APID {}", packet.apid());
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn random_streams_reassemble_byte_for_byte(
        frame_size in 16usize..140,
        lengths in prop::collection::vec(1usize..400, 1..12),
        fills in prop::collection::vec(prop::option::of(7usize..120), 12),
    ) {
        let mut muxer = MpduMuxer::new(frame_size);
        let mut sent = Vec::with_capacity(lengths.len());
        for (i, &len) in lengths.iter().enumerate() {
            if let Some(fill_len) = fills[i] {
                muxer.push_packet(&encode_fill_packet(fill_len));
            }
            let user_data: Vec<u8> = (0..len).map(|b| (b * 31 + i) as u8).collect();
            let packet = encode_packet(100 + i as u16, SequenceFlag::Standalone, i as u16, &user_data);
            muxer.push_packet(&packet);
            sent.push(packet);
        }

        let reader = FrameReader::from_bytes(muxer.capture(), frame_size).expect("reader");
        let mut session =
            DemuxSession::with_sink(DemuxConfig::new("13", "unused"), reader, CollectingSink::new());
        let report = session.run().expect("run");
        prop_assert_eq!(report.stats.frames_dropped, 0);
        prop_assert_eq!(report.stats.orphan_segments, 0);

        let packets = session.into_sink().into_packets();
        prop_assert_eq!(packets.len(), sent.len());
        for (packet, bytes) in packets.iter().zip(&sent) {
            prop_assert_eq!(&packet.data[..], &bytes[6..]);
            prop_assert!(!packet.frames_dropped);
            let (payload, crc) = crate::crc::split_trailer(&packet.data).expect("trailer");
            prop_assert!(crate::crc::validate(payload, crc));
        }
    }
}

#[test]
fn counter_wrap_is_not_a_gap() -> Result<()> {
    let user_data: Vec<u8> = (0..500u32).map(|i| (i * 13) as u8).collect();
    let packet = encode_packet(12, SequenceFlag::Standalone, 0, &user_data);
    let mut muxer = MpduMuxer::new(FRAME).starting_at(0xFF_FFFE);
    muxer.push_packet(&packet);
    ensure!(muxer.frames().len() >= 4, "packet crosses the counter wrap");

    let mut session = DemuxSession::with_sink(
        DemuxConfig::new("13", "unused"),
        FrameReader::from_bytes(muxer.capture(), FRAME)?,
        CollectingSink::new(),
    );
    let report = session.run()?;
    ensure!(report.stats.frames_dropped == 0, "wrap counted as drops");
    ensure!(report.stats.counter_regressions == 0, "wrap counted as regression");

    let packets = session.into_sink().into_packets();
    let only = packets.first().context("packet flushed")?;
    ensure!(only.data == packet[6..], "payload intact across the wrap");
    ensure!(!only.frames_dropped, "packet not degraded");
    Ok(())
}

#[test]
fn capture_starting_mid_packet_skips_to_first_header() -> Result<()> {
    let packet = encode_packet(8, SequenceFlag::Standalone, 1, &[0x42; 30]);
    let mut muxer = MpduMuxer::new(FRAME);
    muxer.push_raw(&[0xAB; 40]).push_packet(&packet);

    let mut session = DemuxSession::with_sink(
        DemuxConfig::new("13", "unused"),
        FrameReader::from_bytes(muxer.capture(), FRAME)?,
        CollectingSink::new(),
    );
    let report = session.run()?;
    ensure!(report.stats.orphan_segments == 0, "leading bytes never parsed");

    let packets = session.into_sink().into_packets();
    ensure!(packets.len() == 1, "one packet, got {}", packets.len());
    ensure!(packets[0].data == packet[6..], "packet after the leading bytes intact");
    Ok(())
}

#[test]
fn gap_inside_a_split_header_drops_only_the_broken_packet() -> Result<()> {
    let zone = FRAME - 8;
    let a = encode_packet(13, SequenceFlag::Standalone, 1, &[0x11; 117 - 8]);
    ensure!(a.len() == zone - 3, "three header bytes of the next packet end the first frame");
    let b = encode_packet(14, SequenceFlag::First, 2, &[0x22; 300]);
    let c = encode_packet(15, SequenceFlag::Standalone, 3, &[0x33; 10]);
    let frames = MpduMuxer::new(FRAME).push_packet(&a).push_packet(&b).push_packet(&c).frames();

    // Frame 1 is lost.
    let capture: Vec<u8> =
        frames.iter().enumerate().filter(|(i, _)| *i != 1).flat_map(|(_, f)| f.iter().copied()).collect();
    let mut session = DemuxSession::with_sink(
        DemuxConfig::new("13", "unused"),
        FrameReader::from_bytes(capture, FRAME)?,
        CollectingSink::new(),
    );
    let report = session.run()?;
    ensure!(report.stats.frames_dropped == 1, "one frame dropped");

    let packets = session.into_sink().into_packets();
    let apids: Vec<u16> = packets.iter().map(|p| p.apid()).collect();
    ensure!(apids == [13, 15], "no packet built from a broken header, got {:?}", apids);
    ensure!(packets.iter().all(|p| !p.frames_dropped), "intact packets are not degraded");
    ensure!(packets[1].data == c[6..], "packet after the gap intact");
    Ok(())
}

#[test]
fn truncated_tail_is_reported_not_fatal() -> Result<()> {
    let _ = tracing_subscriber::fmt::try_init();

    let dir = tempfile::tempdir()?;
    let mut muxer = MpduMuxer::new(FRAME);
    muxer.push_packet(&encode_packet(42, SequenceFlag::Standalone, 0, &first_segment_data(10, 8, 0, b"ok")));
    let mut capture = muxer.capture();
    capture.extend_from_slice(&[0u8; 50]);

    let report = session_over(capture, dir.path())?.run()?;
    ensure!(report.stats.truncated_tail_bytes == 50, "tail size reported");
    ensure!(report.stats.packets_saved == 1, "earlier frames still processed");
    Ok(())
}

#[test]
fn run_reports_once() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let capture = encode_frame(FRAME, 13, 0, crate::frame::NO_HEADER_POINTER, &[]);
    let mut session = session_over(capture, dir.path())?;

    let first = session.run()?;
    let second = session.run()?;
    ensure!(first == second, "second run returns the same report");
    ensure!(first.stats.frames_read == 1, "frame counted once");
    ensure!(first.to_string().starts_with("Report for channel 13:"), "report header");
    Ok(())
}

#[test]
fn open_reads_the_configured_capture() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut muxer = MpduMuxer::new(crate::frame::FRAME_SIZE);
    muxer.push_packet(&encode_packet(5, SequenceFlag::Standalone, 0, &first_segment_data(10, 4, 0, b"disk")));

    let config = DemuxConfig::new("21", dir.path());
    std::fs::write(config.input_path(), muxer.capture())?;

    let report = DemuxSession::open(config)?.run()?;
    ensure!(report.channel_id == "21", "channel named in report");
    ensure!(report.stats.packets_saved == 1, "packet saved");
    ensure!(dir.path().join("21").join("5_0.lrit").exists(), "output under the channel directory");
    Ok(())
}

#[test]
fn missing_capture_is_fatal() {
    let config = DemuxConfig::new("99", "/nonexistent/lrit");
    let result = DemuxSession::open(config);
    assert!(matches!(result, Err(crate::DemuxError::File { .. })));
}

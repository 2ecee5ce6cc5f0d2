//! End-to-end tests: noisy byte stream in, packets out through the
//! scanner, the sink and the hub.

use std::time::Duration;

use framelink::core::frame::to_frame_bytes;
use framelink::scanner::LossReason;
use framelink::sink::persist;
use framelink::{BroadcastHub, FrameCodec, FrameScanner, HubConfig, PacketSink, ScanEvent};
use futures::StreamExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;

/// Deterministic line noise that never contains a header byte.
fn noise(seed: u32, len: usize) -> Vec<u8> {
    let mut state = seed;
    (0..len)
        .map(|_| {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            ((state >> 16) as u8).min(0xFE)
        })
        .collect()
}

fn noisy_stream(payloads: &[Vec<u8>]) -> Vec<u8> {
    let mut wire = Vec::new();
    for (i, payload) in payloads.iter().enumerate() {
        wire.extend(noise(i as u32, i % 5));
        wire.extend(to_frame_bytes(payload).unwrap());
    }
    wire
}

#[test]
fn test_scanner_recovers_packets_from_noise() {
    let payloads: Vec<Vec<u8>> = (0..50u8).map(|i| noise(i as u32 + 100, i as usize % 30)).collect();
    let wire = noisy_stream(&payloads);

    let sink = PacketSink::new();
    let mut scanner = FrameScanner::new(&wire[..], CancellationToken::new());
    loop {
        match scanner.next_packet() {
            Ok(Some(packet)) => sink.append(packet),
            Ok(None) => unreachable!("scanner was not cancelled"),
            Err(framelink::Error::SourceClosed) => break,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    let recorded: Vec<Vec<u8>> = sink.snapshot().iter().map(|p| p.to_vec()).collect();
    assert_eq!(recorded, payloads);
    assert_eq!(scanner.stats().frames_lost, 0);

    let mut file = Vec::new();
    persist::write_binary(&mut file, &sink.snapshot()).unwrap();
    assert_eq!(&file[..4], 50u32.to_le_bytes());
    assert_eq!(file.len(), 4 + payloads.iter().map(Vec::len).sum::<usize>());
}

#[tokio::test]
async fn test_framed_read_over_slow_link() {
    let (mut link, device) = tokio::io::duplex(8);
    let mut corrupted = to_frame_bytes(b"bad").unwrap();
    corrupted[4] ^= 0x40;

    let writer = tokio::spawn(async move {
        let mut wire = to_frame_bytes(b"first").unwrap();
        wire.extend(corrupted);
        wire.extend(to_frame_bytes(b"second").unwrap());
        for byte in wire {
            link.write_all(&[byte]).await.unwrap();
        }
    });

    let events: Vec<ScanEvent> = FramedRead::new(device, FrameCodec::new())
        .map(|event| event.unwrap())
        .collect()
        .await;
    writer.await.unwrap();

    assert_eq!(events.len(), 3);
    assert_eq!(events[0].clone().into_packet().unwrap().as_bytes(), b"first");
    assert!(matches!(
        events[1],
        ScanEvent::FrameLost(loss) if loss.reason == LossReason::ChecksumMismatch
    ));
    assert_eq!(events[2].clone().into_packet().unwrap().as_bytes(), b"second");
}

#[tokio::test]
async fn test_scanned_packets_reach_tcp_client() {
    let stop = CancellationToken::new();
    let config = HubConfig::new()
        .with_stream_addr("127.0.0.1:0".parse().unwrap())
        .with_poll_timeout(Duration::from_millis(50));
    let hub = BroadcastHub::start(config, stop.clone()).await.unwrap();

    let mut client = TcpStream::connect(hub.stream_addr().unwrap()).await.unwrap();
    client.write_all(b"?").await.unwrap();
    let mut echo = [0u8; 1];
    client.read_exact(&mut echo).await.unwrap();

    let wire = noisy_stream(&[b"abc".to_vec(), Vec::new(), b"def".to_vec()]);
    let sink = PacketSink::new();
    let scan_sink = sink.clone();
    let scan_stop = stop.clone();
    let packets = tokio::task::spawn_blocking(move || {
        let mut scanner = FrameScanner::new(&wire[..], scan_stop);
        let mut out = Vec::new();
        while let Ok(Some(packet)) = scanner.next_packet() {
            scan_sink.append(packet.clone());
            out.push(packet);
        }
        out
    })
    .await
    .unwrap();

    for packet in packets {
        hub.submit(packet).unwrap();
    }

    let mut received = [0u8; 6];
    tokio::time::timeout(Duration::from_secs(5), client.read_exact(&mut received))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&received, b"abcdef");
    // The empty packet is recorded but not broadcast.
    assert_eq!(sink.len(), 3);

    hub.stop().await;
}

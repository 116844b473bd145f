//! End-to-end tests over real TCP sockets with an in-memory strand

use std::time::Duration;

use strand_server::{
    channel::handoff,
    network::{CommandClient, Ingest, RawClient, StrandListener},
    protocol::{Payload, WireCommand, ACTION_SET_PIXELS},
    AnimationSpec, Command, FrameScheduler, MemoryStrand, Pixel, RawFrame,
};

const RED: Pixel = Pixel::new(255, 0, 0);
const GREEN: Pixel = Pixel::new(0, 255, 0);
const BLUE: Pixel = Pixel::new(0, 0, 255);
const WHITE: Pixel = Pixel::new(255, 255, 255);

const FRAME_PERIOD: Duration = Duration::from_millis(2);

/// Poll the strand's last flushed frame until it matches or time runs out
async fn wait_for_frame(strand: &MemoryStrand, expected: &[Pixel]) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if strand.snapshot().flushed == expected {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "strand never showed {:?}, last flushed {:?}",
            expected,
            strand.snapshot().flushed
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Start a scheduler plus a listener of the requested kind on an ephemeral port
fn start_server(pixels: usize, raw: bool) -> (std::net::SocketAddr, MemoryStrand) {
    let strand = MemoryStrand::new(pixels);
    let (command_tx, command_rx) = handoff::<Command>();
    let (raw_tx, raw_rx) = handoff::<RawFrame>();

    let listener = StrandListener::bind("127.0.0.1:0".parse().unwrap()).unwrap();
    let addr = listener.local_addr().unwrap();
    let ingest = if raw {
        Ingest::Raw {
            frames: raw_tx,
            pixel_count: pixels,
        }
    } else {
        Ingest::Commands(command_tx)
    };
    tokio::spawn(listener.run(ingest));

    let scheduler =
        FrameScheduler::<_, AnimationSpec>::with_frame_period(strand.clone(), FRAME_PERIOD);
    tokio::spawn(scheduler.run(command_rx, raw_rx));

    (addr, strand)
}

#[tokio::test]
async fn test_commands_reach_the_strand() {
    let (addr, strand) = start_server(3, false);
    let mut client = CommandClient::connect(addr).await.unwrap();

    client
        .send(Command::SetPixels(vec![RED, GREEN, BLUE]))
        .await
        .unwrap();
    wait_for_frame(&strand, &[RED, GREEN, BLUE]).await;

    client.send(Command::Clear).await.unwrap();
    wait_for_frame(&strand, &[Pixel::BLACK; 3]).await;

    client
        .send(Command::QueueAnimations(vec![AnimationSpec::Fill { color: BLUE }]))
        .await
        .unwrap();
    wait_for_frame(&strand, &[BLUE; 3]).await;
}

#[tokio::test]
async fn test_malformed_record_is_skipped() {
    let (addr, strand) = start_server(2, false);
    let mut client = CommandClient::connect(addr).await.unwrap();

    client
        .send(Command::QueueAnimations(vec![AnimationSpec::Fill { color: RED }]))
        .await
        .unwrap();
    wait_for_frame(&strand, &[RED, RED]).await;

    // Set-pixels tag carrying an animation payload
    client
        .send_record(&WireCommand {
            action: ACTION_SET_PIXELS,
            payload: Payload::Animations(vec![AnimationSpec::Fill { color: WHITE }]),
        })
        .await
        .unwrap();

    // Overwritten on every tick for as long as the fill is still queued
    client
        .send(Command::SetPixels(vec![GREEN, GREEN]))
        .await
        .unwrap();

    let writes_before = strand.writes();
    for _ in 0..20 {
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(strand.snapshot().flushed, vec![RED, RED]);
    }
    assert!(strand.writes() > writes_before);

    // Same connection keeps working after the bad record
    client.send(Command::Clear).await.unwrap();
    wait_for_frame(&strand, &[Pixel::BLACK; 2]).await;
}

#[tokio::test]
async fn test_separate_connections_share_the_strand() {
    let (addr, strand) = start_server(2, false);

    let mut first = CommandClient::connect(addr).await.unwrap();
    first.send(Command::SetPixels(vec![GREEN])).await.unwrap();
    first.close().await.unwrap();
    wait_for_frame(&strand, &[GREEN, Pixel::BLACK]).await;

    let mut second = CommandClient::connect(addr).await.unwrap();
    second
        .send(Command::SetPixels(vec![GREEN, BLUE]))
        .await
        .unwrap();
    wait_for_frame(&strand, &[GREEN, BLUE]).await;
}

#[tokio::test]
async fn test_raw_frames_reach_the_strand() {
    let (addr, strand) = start_server(3, true);
    let mut client = RawClient::connect(addr, 3).await.unwrap();

    client.send_frame(&[BLUE, RED, GREEN]).await.unwrap();
    wait_for_frame(&strand, &[BLUE, RED, GREEN]).await;

    client.send_frame(&[WHITE; 3]).await.unwrap();
    wait_for_frame(&strand, &[WHITE; 3]).await;
}

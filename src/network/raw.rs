//! Raw frame connection handler
//!
//! Every read must deliver exactly one frame. Reads of any other size are
//! discarded rather than stitched together, so senders whose writes get split
//! in transit lose those frames.

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::{ConnectionEnd, ConnectionStats};
use crate::channel::HandoffSender;
use crate::protocol::RawFrame;

/// Serve one raw connection until it closes or fails
pub async fn serve_raw<R>(
    mut stream: R,
    pixel_count: usize,
    frames: HandoffSender<RawFrame>,
) -> (ConnectionEnd, ConnectionStats)
where
    R: AsyncRead + Unpin,
{
    let frame_len = RawFrame::frame_len(pixel_count);
    let mut stats = ConnectionStats::default();

    loop {
        let mut buf = BytesMut::zeroed(frame_len);
        let n = match stream.read(&mut buf[..]).await {
            Ok(0) => return (ConnectionEnd::Closed, stats),
            Ok(n) => n,
            Err(e) => return (ConnectionEnd::ReadError(e), stats),
        };

        let Some(frame) = RawFrame::new(buf.split_to(n).freeze(), pixel_count) else {
            tracing::debug!("Discarding {}-byte read, expected {}", n, frame_len);
            stats.dropped += 1;
            continue;
        };

        if frames.send(frame).await.is_err() {
            return (ConnectionEnd::SchedulerGone, stats);
        }
        stats.forwarded += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::handoff;
    use crate::protocol::Pixel;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_exact_frames_forwarded() {
        let (mut client, server) = tokio::io::duplex(64);
        let (tx, mut rx) = handoff();
        let handler = tokio::spawn(serve_raw(server, 2, tx));

        client.write_all(&[1, 2, 3, 4, 5, 6]).await.unwrap();
        let frame = rx.recv().await.unwrap();
        assert_eq!(
            frame.pixels().collect::<Vec<_>>(),
            vec![Pixel::new(1, 2, 3), Pixel::new(4, 5, 6)]
        );

        client.write_all(&[6, 5, 4, 3, 2, 1]).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().as_bytes(), &[6, 5, 4, 3, 2, 1]);

        drop(client);
        let (end, stats) = handler.await.unwrap();
        assert!(matches!(end, ConnectionEnd::Closed));
        assert_eq!(stats.forwarded, 2);
    }

    #[tokio::test]
    async fn test_short_read_discarded_not_merged() {
        let (mut client, server) = tokio::io::duplex(64);
        let (tx, mut rx) = handoff();
        let handler = tokio::spawn(serve_raw(server, 2, tx));

        client.write_all(&[9, 9, 9, 9, 9]).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        client.write_all(&[1, 2, 3, 4, 5, 6]).await.unwrap();

        assert_eq!(rx.recv().await.unwrap().as_bytes(), &[1, 2, 3, 4, 5, 6]);

        drop(client);
        let (_, stats) = handler.await.unwrap();
        assert_eq!(stats, ConnectionStats { forwarded: 1, dropped: 1 });
        assert!(rx.try_recv().is_none());
    }
}

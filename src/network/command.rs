//! Command protocol connection handler
//!
//! Decodes one record at a time from the stream and hands each command to the
//! scheduler, waiting for it to be taken before decoding the next one.

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::{ConnectionEnd, ConnectionStats};
use crate::channel::HandoffSender;
use crate::protocol::{Command, CommandDecoder};

const READ_BUFFER_SIZE: usize = 4096;

/// Serve one command connection until it closes or stops decoding
pub async fn serve_commands<R>(
    mut stream: R,
    commands: HandoffSender<Command>,
) -> (ConnectionEnd, ConnectionStats)
where
    R: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(READ_BUFFER_SIZE);
    let mut decoder = CommandDecoder::new();
    let mut stats = ConnectionStats::default();

    loop {
        loop {
            let decoded = decoder
                .decode(&mut buf)
                .and_then(|record| record.map(Command::try_from).transpose());

            match decoded {
                Ok(Some(command)) => {
                    tracing::trace!(command = command.name(), "decoded command");
                    if commands.send(command).await.is_err() {
                        return (ConnectionEnd::SchedulerGone, stats);
                    }
                    stats.forwarded += 1;
                }
                Ok(None) => break,
                Err(e) if e.is_recoverable() => {
                    tracing::warn!("Dropping command: {}", e);
                    stats.dropped += 1;
                }
                Err(e) => return (ConnectionEnd::DecodeError(e), stats),
            }
        }

        buf.reserve(read_reserve(buf.len()));
        match stream.read_buf(&mut buf).await {
            Ok(0) => {
                if !buf.is_empty() {
                    tracing::debug!("Discarding {} bytes of incomplete record", buf.len());
                }
                return (ConnectionEnd::Closed, stats);
            }
            Ok(_) => {}
            Err(e) => return (ConnectionEnd::ReadError(e), stats),
        }
    }
}

/// Room to make before the next read
///
/// Grows with the incomplete record already buffered, so a large record is
/// re-parsed a logarithmic number of times rather than once per 4 KiB.
fn read_reserve(pending: usize) -> usize {
    pending.max(READ_BUFFER_SIZE)
}

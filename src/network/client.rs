//! Clients for the command and raw protocols

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::error::{NetworkError, Result};
use crate::protocol::{encode_command, encode_record, Command, Pixel, RawFrame, WireCommand};

async fn connect(addr: impl ToSocketAddrs) -> Result<TcpStream> {
    let stream = TcpStream::connect(addr)
        .await
        .map_err(NetworkError::ConnectionFailed)?;
    stream
        .set_nodelay(true)
        .map_err(NetworkError::ConnectionFailed)?;
    Ok(stream)
}

/// Sends commands over one connection
///
/// The server never replies; a successful send only means the bytes were
/// written to the socket.
pub struct CommandClient {
    stream: TcpStream,
    commands_sent: u64,
}

impl CommandClient {
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        Ok(Self {
            stream: connect(addr).await?,
            commands_sent: 0,
        })
    }

    pub async fn send(&mut self, command: Command) -> Result<()> {
        let bytes = encode_command(command)?;
        self.write(&bytes).await
    }

    /// Send an arbitrary wire record, including ones the server will reject
    pub async fn send_record(&mut self, record: &WireCommand) -> Result<()> {
        let bytes = encode_record(record)?;
        self.write(&bytes).await
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream
            .write_all(bytes)
            .await
            .map_err(NetworkError::SendFailed)?;
        self.commands_sent += 1;
        Ok(())
    }

    pub fn commands_sent(&self) -> u64 {
        self.commands_sent
    }

    /// Flush and close the write half
    pub async fn close(mut self) -> Result<()> {
        self.stream
            .shutdown()
            .await
            .map_err(NetworkError::SendFailed)?;
        Ok(())
    }
}

/// Streams full-strand frames over the raw protocol
pub struct RawClient {
    stream: TcpStream,
    pixel_count: usize,
    buffer: Vec<u8>,
}

impl RawClient {
    pub async fn connect(addr: impl ToSocketAddrs, pixel_count: usize) -> Result<Self> {
        Ok(Self {
            stream: connect(addr).await?,
            pixel_count,
            buffer: Vec::with_capacity(RawFrame::frame_len(pixel_count)),
        })
    }

    /// Send one frame; `pixels` must cover the strand exactly
    pub async fn send_frame(&mut self, pixels: &[Pixel]) -> Result<()> {
        if pixels.len() != self.pixel_count {
            return Err(NetworkError::FrameSize {
                expected: RawFrame::frame_len(self.pixel_count),
                actual: RawFrame::frame_len(pixels.len()),
            }
            .into());
        }

        self.buffer.clear();
        for pixel in pixels {
            self.buffer.extend_from_slice(&pixel.to_bytes());
        }
        self.stream
            .write_all(&self.buffer)
            .await
            .map_err(NetworkError::SendFailed)?;
        Ok(())
    }

    pub async fn close(mut self) -> Result<()> {
        self.stream
            .shutdown()
            .await
            .map_err(NetworkError::SendFailed)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_raw_client_rejects_wrong_length() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let mut client = RawClient::connect(addr, 3).await.unwrap();
        let result = client.send_frame(&[Pixel::BLACK; 2]).await;
        assert!(matches!(
            result,
            Err(Error::Network(NetworkError::FrameSize {
                expected: 9,
                actual: 6
            }))
        ));
    }

    #[tokio::test]
    async fn test_command_client_writes_encoded_bytes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let mut client = CommandClient::connect(addr).await.unwrap();
        let (mut server, _) = listener.accept().await.unwrap();

        client.send(Command::Clear).await.unwrap();
        assert_eq!(client.commands_sent(), 1);
        client.close().await.unwrap();

        let mut received = Vec::new();
        server.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, encode_command(Command::Clear).unwrap());
    }
}

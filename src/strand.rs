//! Pixel strand handles
//!
//! A strand is an in-memory pixel buffer plus a flush primitive that pushes the
//! buffer to hardware. The frame scheduler is the only code that ever holds one
//! mutably.

use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use crate::error::StrandError;
use crate::protocol::Pixel;

/// Abstract LED strand
///
/// Indices at or past [`Strand::len`] are ignored by `set`.
pub trait Strand: Send {
    /// Number of pixels in the strand
    fn len(&self) -> usize;

    /// Read back one pixel from the in-memory buffer
    fn get(&self, index: usize) -> Option<Pixel>;

    /// Write one pixel into the in-memory buffer
    fn set(&mut self, index: usize, pixel: Pixel);

    /// Set every pixel to the same value
    fn wipe(&mut self, pixel: Pixel);

    /// Flush the in-memory buffer to the hardware
    fn write(&mut self) -> Result<(), StrandError>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Strand attached to an SPI character device (WS2801-style, 3 bytes per pixel)
pub struct SpiStrand {
    device: File,
    pixels: Vec<Pixel>,
    /// Reused transmit buffer
    tx_buffer: Vec<u8>,
}

impl SpiStrand {
    /// Open the device at `path` for a strand of `pixel_count` pixels
    pub fn open(pixel_count: usize, path: impl AsRef<Path>) -> Result<Self, StrandError> {
        let path = path.as_ref();
        let device = OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|source| StrandError::Open {
                path: path.display().to_string(),
                source,
            })?;

        tracing::debug!("Opened strand device {} ({} pixels)", path.display(), pixel_count);

        Ok(Self {
            device,
            pixels: vec![Pixel::BLACK; pixel_count],
            tx_buffer: Vec::with_capacity(pixel_count * 3),
        })
    }
}

impl Strand for SpiStrand {
    fn len(&self) -> usize {
        self.pixels.len()
    }

    fn get(&self, index: usize) -> Option<Pixel> {
        self.pixels.get(index).copied()
    }

    fn set(&mut self, index: usize, pixel: Pixel) {
        if let Some(slot) = self.pixels.get_mut(index) {
            *slot = pixel;
        }
    }

    fn wipe(&mut self, pixel: Pixel) {
        self.pixels.fill(pixel);
    }

    fn write(&mut self) -> Result<(), StrandError> {
        self.tx_buffer.clear();
        for pixel in &self.pixels {
            self.tx_buffer.extend_from_slice(&pixel.to_bytes());
        }
        self.device
            .write_all(&self.tx_buffer)
            .and_then(|()| self.device.flush())
            .map_err(StrandError::Flush)
    }
}

/// Snapshot of a [`MemoryStrand`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryState {
    /// Current in-memory buffer
    pub pixels: Vec<Pixel>,
    /// Buffer contents as of the most recent flush
    pub flushed: Vec<Pixel>,
    /// Number of flushes performed
    pub writes: u64,
}

/// In-memory strand with no hardware behind it
///
/// Clones share the same buffer, so a caller can keep a handle for inspection
/// while the scheduler owns another.
#[derive(Debug, Clone)]
pub struct MemoryStrand {
    state: Arc<Mutex<MemoryState>>,
    len: usize,
}

impl MemoryStrand {
    pub fn new(pixel_count: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                pixels: vec![Pixel::BLACK; pixel_count],
                flushed: vec![Pixel::BLACK; pixel_count],
                writes: 0,
            })),
            len: pixel_count,
        }
    }

    /// Copy of the current buffer and flush statistics
    pub fn snapshot(&self) -> MemoryState {
        self.state.lock().clone()
    }

    /// Current in-memory pixels
    pub fn pixels(&self) -> Vec<Pixel> {
        self.state.lock().pixels.clone()
    }

    /// Number of flushes so far
    pub fn writes(&self) -> u64 {
        self.state.lock().writes
    }
}

impl Strand for MemoryStrand {
    fn len(&self) -> usize {
        self.len
    }

    fn get(&self, index: usize) -> Option<Pixel> {
        self.state.lock().pixels.get(index).copied()
    }

    fn set(&mut self, index: usize, pixel: Pixel) {
        if let Some(slot) = self.state.lock().pixels.get_mut(index) {
            *slot = pixel;
        }
    }

    fn wipe(&mut self, pixel: Pixel) {
        self.state.lock().pixels.fill(pixel);
    }

    fn write(&mut self) -> Result<(), StrandError> {
        let mut state = self.state.lock();
        state.flushed = state.pixels.clone();
        state.writes += 1;
        tracing::trace!(writes = state.writes, "memory strand flushed");
        Ok(())
    }
}

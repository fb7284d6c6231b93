//! Bounded in-memory byte pipe connecting the packer to the uploader
//!
//! Single-producer/single-consumer. The producer blocks once `capacity`
//! chunks are in flight, so memory use is bounded by
//! `capacity * chunk_size` no matter how large the archive is. The
//! producer can close the pipe with an error, which the consumer observes
//! as a read failure.

use std::io::{self, Read, Write};
use std::sync::mpsc;

/// Pipe sizing
#[derive(Debug, Clone)]
pub struct PipeConfig {
    /// Number of chunks that may be in flight
    pub capacity: usize,
    /// Size of each chunk in bytes
    pub chunk_size: usize,
}

impl Default for PipeConfig {
    fn default() -> Self {
        PipeConfig {
            capacity: 64,            // 64 chunks in flight
            chunk_size: 1024 * 1024, // 1MB chunks
        }
    }
}

/// Create a connected writer/reader pair
pub fn pipe(config: &PipeConfig) -> (PipeWriter, PipeReader) {
    let (tx, rx) = mpsc::sync_channel::<io::Result<Vec<u8>>>(config.capacity);
    (
        PipeWriter {
            tx,
            buffer: Vec::with_capacity(config.chunk_size),
            chunk_size: config.chunk_size,
        },
        PipeReader {
            rx,
            buffer: Vec::new(),
            buffer_pos: 0,
        },
    )
}

/// Write half: chunks bytes through the bounded channel
pub struct PipeWriter {
    tx: mpsc::SyncSender<io::Result<Vec<u8>>>,
    buffer: Vec<u8>,
    chunk_size: usize,
}

impl PipeWriter {
    fn flush_buffer(&mut self) -> io::Result<()> {
        if !self.buffer.is_empty() {
            let chunk = std::mem::replace(&mut self.buffer, Vec::with_capacity(self.chunk_size));
            self.tx
                .send(Ok(chunk))
                .map_err(|e| io::Error::new(io::ErrorKind::BrokenPipe, e))?;
        }
        Ok(())
    }

    /// Close the pipe with an error; the reader sees it as a read failure
    pub fn fail(mut self, err: io::Error) {
        // Discard the partial chunk so nothing trails the error
        self.buffer.clear();
        let _ = self.tx.send(Err(err));
    }
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut written = 0;
        let mut remaining = buf;

        while !remaining.is_empty() {
            let available = self.chunk_size - self.buffer.len();
            let to_write = remaining.len().min(available);

            self.buffer.extend_from_slice(&remaining[..to_write]);
            written += to_write;
            remaining = &remaining[to_write..];

            if self.buffer.len() >= self.chunk_size {
                self.flush_buffer()?;
            }
        }

        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_buffer()
    }
}

impl Drop for PipeWriter {
    fn drop(&mut self) {
        // Flush the partial chunk; channel disconnect then signals EOF
        let _ = self.flush_buffer();
    }
}

/// Read half: yields chunks FIFO, disconnect is EOF
pub struct PipeReader {
    rx: mpsc::Receiver<io::Result<Vec<u8>>>,
    buffer: Vec<u8>,
    buffer_pos: usize,
}

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        // Drain the current chunk first
        if self.buffer_pos < self.buffer.len() {
            let available = self.buffer.len() - self.buffer_pos;
            let to_copy = available.min(buf.len());
            buf[..to_copy]
                .copy_from_slice(&self.buffer[self.buffer_pos..self.buffer_pos + to_copy]);
            self.buffer_pos += to_copy;
            return Ok(to_copy);
        }

        loop {
            match self.rx.recv() {
                Ok(Ok(chunk)) => {
                    // An empty chunk is not EOF, more may follow
                    if chunk.is_empty() {
                        continue;
                    }

                    self.buffer = chunk;
                    self.buffer_pos = 0;

                    let to_copy = self.buffer.len().min(buf.len());
                    buf[..to_copy].copy_from_slice(&self.buffer[..to_copy]);
                    self.buffer_pos = to_copy;
                    return Ok(to_copy);
                }
                Ok(Err(e)) => return Err(e),
                Err(_) => return Ok(0), // Producer dropped, EOF
            }
        }
    }
}

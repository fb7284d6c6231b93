//! Progress-tracking uploader
//!
//! Wraps the archive source in a counting reader and hands it to the
//! transport's store call. The only recovered error is a missing remote
//! directory, created once before retrying the chdir.

use std::io::{self, Read};

use crate::transport::{Transport, TransportError};

/// Observer for upload progress: (bytes so far, total when known)
pub type ProgressFn<'a> = &'a mut dyn FnMut(u64, Option<u64>);

/// Read decorator that reports a running byte total after every read
pub struct CountingReader<'a, R> {
    inner: R,
    count: u64,
    total: Option<u64>,
    on_progress: ProgressFn<'a>,
}

impl<'a, R: Read> CountingReader<'a, R> {
    pub fn new(inner: R, total: Option<u64>, on_progress: ProgressFn<'a>) -> Self {
        Self {
            inner,
            count: 0,
            total,
            on_progress,
        }
    }

    /// Bytes read so far
    pub fn count(&self) -> u64 {
        self.count
    }
}

impl<'a, R: Read> Read for CountingReader<'a, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n > 0 {
            self.count += n as u64;
            (self.on_progress)(self.count, self.total);
        }
        Ok(n)
    }
}

/// Change into `dest_dir`, creating it once if the transport says it is
/// absent. Any other chdir failure is fatal.
pub fn ensure_remote_dir(
    transport: &mut dyn Transport,
    dest_dir: &str,
) -> Result<(), TransportError> {
    match transport.chdir(dest_dir) {
        Ok(()) => Ok(()),
        Err(e) if e.is_not_found() => {
            transport.mkdir(dest_dir)?;
            transport.chdir(dest_dir)
        }
        Err(e) => Err(e),
    }
}

/// Upload `reader` as `remote_name` inside `dest_dir`.
///
/// `total` is the expected byte count when uploading a completed archive
/// file, or `None` when streaming straight from the packer. Returns the
/// number of bytes read from the source.
pub fn upload<R: Read>(
    transport: &mut dyn Transport,
    reader: R,
    dest_dir: &str,
    remote_name: &str,
    total: Option<u64>,
    on_progress: ProgressFn<'_>,
) -> Result<u64, TransportError> {
    ensure_remote_dir(transport, dest_dir)?;

    let mut counting = CountingReader::new(reader, total, on_progress);
    transport.store(remote_name, &mut counting)?;
    Ok(counting.count())
}

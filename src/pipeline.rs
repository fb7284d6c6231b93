//! Pack/upload composition
//!
//! Two modes: stream the tar bytes through the bounded pipe while they are
//! produced, or spool the whole archive to a temp file first and upload it
//! with a known size.

use anyhow::{anyhow, Context, Result};
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;
use std::thread;

use crate::filter::ExcludeFilter;
use crate::logger::Logger;
use crate::pack::{pack, PackStats};
use crate::pipe::{pipe, PipeConfig};
use crate::transport::Transport;
use crate::upload::{upload, ProgressFn};

/// Outcome of one archive-and-upload run
#[derive(Debug, Clone, Copy)]
pub struct UploadSummary {
    pub files: u64,
    pub bytes_packed: u64,
    pub bytes_sent: u64,
}

/// Pack and upload concurrently through the bounded pipe.
///
/// The packer runs on a background thread; its terminal result comes back
/// through the join handle, and a mid-stream failure poisons the pipe so
/// the uploader aborts. A packer error wins over the resulting transport
/// error since it is the root cause.
pub fn stream_upload(
    transport: &mut dyn Transport,
    source_root: &Path,
    dest_dir: &str,
    remote_name: &str,
    filter: ExcludeFilter,
    config: &PipeConfig,
    on_progress: ProgressFn<'_>,
    logger: &dyn Logger,
) -> Result<UploadSummary> {
    let (writer, reader) = pipe(config);
    let source = source_root.to_path_buf();

    let packer = thread::spawn(move || -> Result<PackStats> {
        let mut writer = writer;
        match pack(&source, &mut writer, &filter) {
            Ok(stats) => Ok(stats),
            Err(e) => {
                // Poison the pipe so the uploader sees a read failure
                writer.fail(std::io::Error::other(format!("{:#}", e)));
                Err(e)
            }
        }
    });

    let store_result = upload(transport, reader, dest_dir, remote_name, None, on_progress);
    // upload() consumed and dropped the reader; a packer still blocked on a
    // full pipe has been unblocked by the disconnect, so the join cannot hang

    let pack_result = packer
        .join()
        .map_err(|_| anyhow!("Packer thread panicked"))?;

    match (pack_result, store_result) {
        (Ok(stats), Ok(sent)) => {
            logger.pack_done(stats.files, stats.bytes);
            logger.stored(remote_name, sent);
            Ok(UploadSummary {
                files: stats.files,
                bytes_packed: stats.bytes,
                bytes_sent: sent,
            })
        }
        (Err(pack_err), Err(store_err)) if packer_died_of_disconnect(&pack_err) => {
            // The consumer dropping the pipe killed the packer; the
            // transport failure is the actual cause
            logger.error("upload", &store_err.to_string());
            Err(anyhow!(store_err).context("Upload failed"))
        }
        (Err(pack_err), _) => {
            logger.error("pack", &format!("{:#}", pack_err));
            Err(pack_err.context("Packing failed"))
        }
        (Ok(_), Err(store_err)) => {
            logger.error("upload", &store_err.to_string());
            Err(anyhow!(store_err).context("Upload failed"))
        }
    }
}

/// A packer whose pipe write failed with BrokenPipe was cut off by the
/// reader going away, not by its own traversal
fn packer_died_of_disconnect(err: &anyhow::Error) -> bool {
    err.root_cause()
        .downcast_ref::<std::io::Error>()
        .map(|e| e.kind() == std::io::ErrorKind::BrokenPipe)
        .unwrap_or(false)
}

/// Pack to a local spool file, then upload it with a known total size
pub fn spool_upload(
    transport: &mut dyn Transport,
    source_root: &Path,
    dest_dir: &str,
    remote_name: &str,
    filter: ExcludeFilter,
    on_progress: ProgressFn<'_>,
    logger: &dyn Logger,
) -> Result<UploadSummary> {
    let mut spool = tempfile::NamedTempFile::new().context("Failed to create spool file")?;

    let stats = match pack(source_root, spool.as_file_mut(), &filter) {
        Ok(stats) => stats,
        Err(e) => {
            logger.error("pack", &format!("{:#}", e));
            return Err(e.context("Packing failed"));
        }
    };
    logger.pack_done(stats.files, stats.bytes);

    spool.as_file_mut().flush()?;
    let total = spool.as_file().metadata()?.len();
    spool.as_file_mut().seek(SeekFrom::Start(0))?;

    let sent = upload(
        transport,
        spool.as_file_mut(),
        dest_dir,
        remote_name,
        Some(total),
        on_progress,
    )
    .map_err(|e| {
        logger.error("upload", &e.to_string());
        anyhow!(e).context("Upload failed")
    })?;
    logger.stored(remote_name, sent);

    Ok(UploadSummary {
        files: stats.files,
        bytes_packed: stats.bytes,
        bytes_sent: sent,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::NoopLogger;
    use crate::upload::mock::MockTransport;
    use std::collections::BTreeMap;
    use std::fs;
    use std::io::Read;
    use tar::Archive;

    fn sample_tree() -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("a.txt"), b"alpha").unwrap();
        fs::create_dir_all(tmp.path().join("dir1/dir2")).unwrap();
        fs::write(tmp.path().join("dir1/b.bin"), vec![9u8; 300_000]).unwrap();
        fs::write(tmp.path().join("dir1/dir2/c.dat"), b"gamma").unwrap();
        tmp
    }

    fn unpack(archive: &[u8]) -> BTreeMap<String, Vec<u8>> {
        let mut out = BTreeMap::new();
        let mut ar = Archive::new(archive);
        for entry in ar.entries().unwrap() {
            let mut entry = entry.unwrap();
            let name = entry.path().unwrap().to_string_lossy().into_owned();
            let mut contents = Vec::new();
            entry.read_to_end(&mut contents).unwrap();
            out.insert(name, contents);
        }
        out
    }

    #[test]
    fn test_stream_upload_roundtrip() {
        let tmp = sample_tree();
        let mut transport = MockTransport::new(&["backups"]);
        let mut last = 0u64;
        let mut on_progress = |count: u64, total: Option<u64>| {
            // Streaming mode never knows the total up front
            assert_eq!(total, None);
            assert!(count > last);
            last = count;
        };

        // Small pipe to force plenty of backpressure cycles
        let config = PipeConfig {
            capacity: 2,
            chunk_size: 16 * 1024,
        };
        let summary = stream_upload(
            &mut transport,
            tmp.path(),
            "backups",
            "archive.tar",
            ExcludeFilter::default(),
            &config,
            &mut on_progress,
            &NoopLogger,
        )
        .unwrap();

        assert_eq!(summary.files, 3);
        assert_eq!(summary.bytes_packed, 5 + 300_000 + 5);
        assert_eq!(last, summary.bytes_sent);

        let (name, data) = &transport.stored[0];
        assert_eq!(name, "archive.tar");
        let entries = unpack(data);
        assert_eq!(entries["a.txt"], b"alpha");
        assert_eq!(entries["dir1/b.bin"], vec![9u8; 300_000]);
        assert_eq!(entries["dir1/dir2/c.dat"], b"gamma");
    }

    #[test]
    fn test_spool_upload_reports_known_total() {
        let tmp = sample_tree();
        let mut transport = MockTransport::new(&["backups"]);
        let mut final_count = 0u64;
        let mut reported_total = None;
        let mut on_progress = |count: u64, total: Option<u64>| {
            final_count = count;
            reported_total = total;
        };

        let summary = spool_upload(
            &mut transport,
            tmp.path(),
            "backups",
            "archive.tar",
            ExcludeFilter::default(),
            &mut on_progress,
            &NoopLogger,
        )
        .unwrap();

        // Spool mode knows the archive size before the upload starts
        assert_eq!(reported_total, Some(summary.bytes_sent));
        assert_eq!(final_count, summary.bytes_sent);
        assert_eq!(
            transport.stored[0].1.len() as u64,
            summary.bytes_sent
        );
    }

    #[test]
    fn test_stream_upload_packer_failure_wins() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("vanished");
        let mut transport = MockTransport::new(&["backups"]);
        let mut noop = |_: u64, _: Option<u64>| {};

        let err = stream_upload(
            &mut transport,
            &missing,
            "backups",
            "archive.tar",
            ExcludeFilter::default(),
            &PipeConfig::default(),
            &mut noop,
            &NoopLogger,
        )
        .unwrap_err();

        // The packer's error is the root cause, not the aborted store
        assert!(format!("{:#}", err).contains("Failed to resolve source directory"));
        assert!(transport.stored.is_empty());
    }

    #[test]
    fn test_stream_upload_mid_walk_failure_poisons_pipe() {
        let tmp = tempfile::tempdir().unwrap();
        // Sorted walk order: the big file streams first, the victim last
        fs::write(tmp.path().join("a_big.bin"), vec![5u8; 8 * 1024 * 1024]).unwrap();
        let victim = tmp.path().join("z_late.txt");
        fs::write(&victim, b"gone soon").unwrap();

        let mut transport = MockTransport::new(&["backups"]);
        // Tiny pipe: when the first progress report arrives the packer is
        // still near the start of a_big.bin, held back by backpressure, so
        // removing the victim here is reliably mid-walk
        let config = PipeConfig {
            capacity: 1,
            chunk_size: 4 * 1024,
        };
        let mut removed = false;
        let mut on_progress = |_count: u64, _total: Option<u64>| {
            if !removed {
                fs::remove_file(&victim).unwrap();
                removed = true;
            }
        };

        let err = stream_upload(
            &mut transport,
            tmp.path(),
            "backups",
            "archive.tar",
            ExcludeFilter::default(),
            &config,
            &mut on_progress,
            &NoopLogger,
        )
        .unwrap_err();

        // The vanished file's error is reported as the root cause and the
        // incomplete upload is not counted as a success
        let msg = format!("{:#}", err);
        assert!(msg.contains("Packing failed"), "unexpected error: {msg}");
        assert!(removed);
        assert!(transport.stored.is_empty());
    }

    #[test]
    fn test_stream_upload_transport_failure_does_not_hang() {
        let tmp = sample_tree();
        let mut transport = MockTransport::new(&["backups"]);
        transport.store_fault_after = Some(4 * 1024);
        let mut noop = |_: u64, _: Option<u64>| {};

        // Tiny pipe: the packer will be blocked mid-stream when the store
        // call dies; dropping the reader must still unblock it
        let config = PipeConfig {
            capacity: 1,
            chunk_size: 4 * 1024,
        };
        let err = stream_upload(
            &mut transport,
            tmp.path(),
            "backups",
            "archive.tar",
            ExcludeFilter::default(),
            &config,
            &mut noop,
            &NoopLogger,
        )
        .unwrap_err();

        assert!(format!("{:#}", err).contains("connection reset"));
    }
}

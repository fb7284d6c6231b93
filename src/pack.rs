//! Tar packer: serialize a directory tree into a streaming tar archive
//!
//! Directories emit no records of their own; structure is reconstructed
//! from the slash-normalized relative entry names. The first traversal or
//! read error aborts the whole pack.

use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;
use tar::Builder;
use walkdir::WalkDir;

use crate::filter::ExcludeFilter;

/// What went into the archive
#[derive(Debug, Clone, Copy, Default)]
pub struct PackStats {
    pub files: u64,
    pub bytes: u64,
}

/// Pack `source_root` into `sink` as a tar stream.
///
/// Entry names are rewritten relative to `source_root` with forward-slash
/// separators, so the archive unpacks the same tree on any host. The sink
/// receives the tar end-of-archive marker before this returns.
pub fn pack<W: Write>(source_root: &Path, sink: W, filter: &ExcludeFilter) -> Result<PackStats> {
    // Canonicalize up front so relative paths don't depend on the CWD
    let root = source_root
        .canonicalize()
        .with_context(|| format!("Failed to resolve source directory {:?}", source_root))?;

    let mut builder = Builder::new(sink);
    let mut stats = PackStats::default();

    for entry in WalkDir::new(&root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            // Prune excluded directories so we never walk into them.
            // Patterns match components inside the tree only, not the
            // canonicalized path of the root's own ancestors.
            if e.file_type().is_dir() {
                filter.include_dir(e.path().strip_prefix(&root).unwrap_or(e.path()))
            } else {
                true
            }
        })
    {
        // A vanished or unreadable node aborts the pack, no skip-and-continue
        let entry = entry.context("Failed to walk source directory")?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if !filter.include_file(path) {
            continue;
        }

        let rel_path = path.strip_prefix(&root).unwrap_or(path);
        let metadata = entry
            .metadata()
            .with_context(|| format!("Failed to stat {:?}", path))?;

        // Header carries size, mode and mtime from the metadata; the tar
        // builder normalizes the name to forward slashes
        builder
            .append_path_with_name(path, rel_path)
            .with_context(|| format!("Failed to pack {:?}", path))?;

        stats.files += 1;
        stats.bytes += metadata.len();
    }

    // End-of-archive marker
    builder.finish().context("Failed to finish archive")?;
    let mut sink = builder.into_inner()?;
    sink.flush()?;

    Ok(stats)
}

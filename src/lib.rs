//! Tarship library
//!
//! Streams a directory tree as a tar archive into an FTP/FTPS upload,
//! either through a bounded in-memory pipe or via a local spool file.

pub mod filter;
pub mod logger;
pub mod pack;
pub mod pipe;
pub mod pipeline;
pub mod progress;
pub mod transport;
pub mod upload;

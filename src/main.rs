//! Tarship - pack a directory into a tar stream and upload it over FTP/FTPS
//!
//! One-shot: walk, pack, upload. No diffing, no resume, no retry.

mod filter;
mod logger;
mod pack;
mod pipe;
mod pipeline;
mod progress;
mod transport;
mod upload;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use crate::filter::ExcludeFilter;
use crate::logger::{Logger, NoopLogger, TextLogger};
use crate::pipe::PipeConfig;
use crate::pipeline::{spool_upload, stream_upload, UploadSummary};
use crate::progress::UploadBar;
use crate::transport::{FtpTransport, TlsMode, Transport};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Tarship - pack a directory into a tar archive and upload it to an FTP/FTPS server"
)]
struct Args {
    /// Source directory to pack and upload
    #[arg(default_value = ".")]
    source: PathBuf,

    /// FTP host address
    #[arg(long)]
    host: String,

    /// FTP port
    #[arg(long, default_value_t = 21)]
    port: u16,

    /// FTP username
    #[arg(short, long, default_value = "ftpuser")]
    user: String,

    /// FTP password (prompted when omitted)
    #[arg(short, long)]
    pass: Option<String>,

    /// Remote directory to upload into (created when missing)
    #[arg(long = "remote-dir", default_value = "/")]
    remote_dir: String,

    /// Remote archive file name
    #[arg(long = "remote-name", default_value = "remote_archive.tar")]
    remote_name: String,

    /// Connect with FTPS (explicit TLS)
    #[arg(long)]
    ftps: bool,

    /// Skip TLS certificate verification (FTPS only)
    #[arg(long, requires = "ftps")]
    insecure: bool,

    /// Pack to a local spool file first instead of streaming
    #[arg(long)]
    spool: bool,

    /// Exclude files matching patterns (/XF)
    #[arg(long = "xf", action = clap::ArgAction::Append)]
    exclude_files: Vec<String>,

    /// Exclude directories matching patterns (/XD)
    #[arg(long = "xd", action = clap::ArgAction::Append)]
    exclude_dirs: Vec<String>,

    /// Suppress the progress display
    #[arg(short, long)]
    quiet: bool,

    /// Write log entries to file
    #[arg(long = "log-file")]
    log_file: Option<PathBuf>,
}

fn main() -> Result<()> {
    // Set up Ctrl-C handler
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupted by user. Exiting (Ctrl-C)...");
        // Exit immediately with 130 (128 + SIGINT)
        std::process::exit(130);
    })
    .expect("Error setting Ctrl-C handler");

    let args = Args::parse();

    // Choose logger once; NoopLogger keeps the hot path free
    let logger: Arc<dyn Logger + Send + Sync> = if let Some(ref p) = args.log_file {
        match TextLogger::new(p) {
            Ok(l) => Arc::new(l),
            Err(_) => Arc::new(NoopLogger),
        }
    } else {
        Arc::new(NoopLogger)
    };

    let password = match args.pass.clone() {
        Some(p) => p,
        None => rpassword::prompt_password(format!("Password for {}@{}: ", args.user, args.host))
            .context("Failed to read password")?,
    };

    let tls = if args.ftps {
        TlsMode::On {
            accept_invalid_certs: args.insecure,
        }
    } else {
        TlsMode::Off
    };

    logger.start(&args.source, &args.host, &args.remote_dir);

    let mut ftp = FtpTransport::connect(&args.host, args.port, tls)
        .with_context(|| format!("Failed to connect to {}:{}", args.host, args.port))?;
    ftp.login(&args.user, &password)
        .context("FTP login failed")?;

    let filter = ExcludeFilter {
        exclude_files: args.exclude_files.clone(),
        exclude_dirs: args.exclude_dirs.clone(),
    };

    let bar = UploadBar::new(args.quiet);
    let summary = run_upload(&mut ftp, &args, filter, &bar, logger.as_ref());

    match summary {
        Ok(summary) => {
            bar.finish_success(summary.files, summary.bytes_sent);
            logger.done(summary.files, summary.bytes_sent, bar.elapsed_secs());
            let _ = ftp.quit();
            println!("Tar archive uploaded successfully.");
            Ok(())
        }
        Err(e) => {
            bar.finish_error();
            let _ = ftp.quit();
            Err(e)
        }
    }
}

fn run_upload(
    ftp: &mut FtpTransport,
    args: &Args,
    filter: ExcludeFilter,
    bar: &UploadBar,
    logger: &dyn Logger,
) -> Result<UploadSummary> {
    let mut on_progress = |count: u64, total: Option<u64>| bar.observe(count, total);
    if args.spool {
        spool_upload(
            ftp,
            &args.source,
            &args.remote_dir,
            &args.remote_name,
            filter,
            &mut on_progress,
            logger,
        )
    } else {
        stream_upload(
            ftp,
            &args.source,
            &args.remote_dir,
            &args.remote_name,
            filter,
            &PipeConfig::default(),
            &mut on_progress,
            logger,
        )
    }
}

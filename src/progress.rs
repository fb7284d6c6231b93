//! Upload progress display
//!
//! Starts as a byte spinner (streaming mode never knows the archive size
//! up front) and upgrades itself to a byte-position bar on the first
//! progress report that carries a total (spool mode).

use indicatif::{ProgressBar, ProgressStyle};
use std::cell::Cell;
use std::time::{Duration, Instant};

pub struct UploadBar {
    bar: ProgressBar,
    start_time: Instant,
    sized: Cell<bool>,
}

impl UploadBar {
    pub fn new(quiet: bool) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} [{elapsed_precise}] {bytes} uploaded ({bytes_per_sec})")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        };

        Self {
            bar,
            start_time: Instant::now(),
            sized: Cell::new(false),
        }
    }

    /// Suitable as the uploader's on_progress callback
    pub fn observe(&self, count: u64, total: Option<u64>) {
        if let Some(len) = total {
            if !self.sized.get() {
                self.bar.set_length(len);
                self.bar.set_style(
                    ProgressStyle::default_bar()
                        .template(
                            "{spinner:.green} [{elapsed_precise}] [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec})",
                        )
                        .unwrap_or_else(|_| ProgressStyle::default_bar()),
                );
                self.sized.set(true);
            }
        }
        self.bar.set_position(count);
    }

    pub fn finish_success(&self, files: u64, bytes: u64) {
        self.bar.finish_and_clear();
        let elapsed = self.start_time.elapsed();
        let throughput = bytes as f64 / elapsed.as_secs_f64().max(0.001) / 1_048_576.0;

        println!(
            "Uploaded {} files ({:.1} MB) in {:.1}s ({:.1} MB/s)",
            files,
            bytes as f64 / 1_048_576.0,
            elapsed.as_secs_f64(),
            throughput
        );
    }

    pub fn finish_error(&self) {
        self.bar.abandon();
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }
}

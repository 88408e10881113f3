// 进度显示
use crate::bridge::ProgressFn;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Display-only progress bar for one transfer. Nothing reads state back out
/// of it.
#[derive(Clone)]
pub struct ProgressTracker {
    progress_bar: ProgressBar,
    transferred_bytes: Arc<AtomicU64>,
    start_time: Arc<Instant>,
    last_update_time: Arc<Mutex<Instant>>,
    last_bytes: Arc<AtomicU64>,
}

impl ProgressTracker {
    pub fn new(description: &str) -> Self {
        Self::with_bar(ProgressBar::new(0), description)
    }

    pub fn hidden() -> Self {
        Self::with_bar(ProgressBar::hidden(), "")
    }

    fn with_bar(progress_bar: ProgressBar, description: &str) -> Self {
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta}) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        progress_bar.set_style(style);
        progress_bar.set_message(description.to_string());

        Self {
            progress_bar,
            transferred_bytes: Arc::new(AtomicU64::new(0)),
            start_time: Arc::new(Instant::now()),
            last_update_time: Arc::new(Mutex::new(Instant::now())),
            last_bytes: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Adapter handed to the bridge as its progress callback.
    pub fn callback(&self) -> ProgressFn {
        let tracker = self.clone();
        Arc::new(move |fraction, done, total| tracker.report(fraction, done, total))
    }

    pub fn report(&self, fraction: f64, done: u64, total: u64) {
        if fraction == 0.0 && done == 0 {
            self.progress_bar.set_length(total);
            self.progress_bar.set_message("Preparing File...");
            return;
        }
        self.progress_bar.set_length(total);
        self.transferred_bytes.store(done, Ordering::Relaxed);
        self.progress_bar.set_position(done);

        self.update_speed(done);
    }

    pub fn finish(&self) {
        let elapsed = self.start_time.elapsed();
        let total = self.transferred_bytes.load(Ordering::Relaxed);

        let avg_speed = if elapsed.as_secs() > 0 {
            total / elapsed.as_secs()
        } else {
            total
        };

        self.progress_bar
            .finish_with_message(format!("done (avg speed: {})", format_speed(avg_speed)));
    }

    pub fn finish_with_error(&self, error: &str) {
        self.progress_bar.abandon_with_message(format!("failed: {}", error));
    }

    // 每200ms更新一次速度，避免太频繁刷新
    fn update_speed(&self, current_bytes: u64) {
        let now = Instant::now();
        let Ok(mut last_time) = self.last_update_time.lock() else {
            return;
        };
        let elapsed = now.duration_since(*last_time);

        if elapsed >= Duration::from_millis(200) {
            let last_bytes = self.last_bytes.load(Ordering::Relaxed);
            let bytes_diff = current_bytes.saturating_sub(last_bytes);
            let speed = (bytes_diff as f64 / elapsed.as_secs_f64()) as u64;

            self.progress_bar.set_message(format_speed(speed));

            *last_time = now;
            self.last_bytes.store(current_bytes, Ordering::Relaxed);
        }
    }
}

pub fn format_speed(bytes_per_sec: u64) -> String {
    if bytes_per_sec < 1024 {
        format!("{} B/s", bytes_per_sec)
    } else if bytes_per_sec < 1024 * 1024 {
        format!("{:.2} KB/s", bytes_per_sec as f64 / 1024.0)
    } else if bytes_per_sec < 1024 * 1024 * 1024 {
        format!("{:.2} MB/s", bytes_per_sec as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB/s", bytes_per_sec as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

// 上传进度显示
use indicatif::{ProgressBar, ProgressStyle};
use std::cell::Cell;
use std::time::{Duration, Instant};

const SPEED_REFRESH: Duration = Duration::from_millis(200);

/// Progress bar for one streamed upload. Lives on the uploading thread only.
pub struct ProgressTracker {
    progress_bar: ProgressBar,
    start_time: Instant,
    transferred_bytes: Cell<u64>,
    last_update_time: Cell<Instant>,
    last_bytes: Cell<u64>,
}

impl ProgressTracker {
    pub fn new(total_size: u64, description: &str) -> Self {
        let progress_bar = ProgressBar::new(total_size);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta}) {msg}")
            .map(|style| style.progress_chars("#>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        progress_bar.set_style(style);
        progress_bar.set_message(description.to_string());

        let now = Instant::now();
        Self {
            progress_bar,
            start_time: now,
            transferred_bytes: Cell::new(0),
            last_update_time: Cell::new(now),
            last_bytes: Cell::new(0),
        }
    }

    pub fn update(&self, bytes_transferred: u64) {
        self.transferred_bytes.set(bytes_transferred);
        self.progress_bar.set_position(bytes_transferred);
        self.update_speed(bytes_transferred);
    }

    pub fn finish(&self) {
        let elapsed = self.start_time.elapsed().as_secs();
        let total = self.transferred_bytes.get();
        let avg_speed = if elapsed > 0 { total / elapsed } else { total };

        self.progress_bar.finish_with_message(format!(
            "Upload completed (avg speed: {})",
            format_speed(avg_speed)
        ));
    }

    pub fn finish_with_error(&self, error: &str) {
        self.progress_bar.finish_with_message(format!("Upload failed: {}", error));
    }

    fn update_speed(&self, current_bytes: u64) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update_time.get());
        if elapsed < SPEED_REFRESH {
            return;
        }

        let bytes_diff = current_bytes.saturating_sub(self.last_bytes.get());
        let speed = (bytes_diff as f64 / elapsed.as_secs_f64()) as u64;
        self.progress_bar.set_message(format_speed(speed));

        self.last_update_time.set(now);
        self.last_bytes.set(current_bytes);
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

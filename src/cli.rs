use anyhow::{Context, Result};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;

use bigip_xfer::{ApplianceClient, DownloadOutcome, Mode, TransferError};
use tokio_util::sync::CancellationToken;

pub async fn run_download(
    client: &ApplianceClient,
    mode: Mode,
    output_path: &Path,
    cancel: &CancellationToken,
) -> Result<()> {
    eprintln!("  Appliance : {}", client.base_url());
    eprintln!("  Mode      : {}", mode);
    eprintln!("  Output    : {}", output_path.display());
    eprintln!("  Chunk size: {}", human_size(client.settings().chunk_size));
    eprintln!();

    let start_time = Instant::now();
    let progress = ProgressPrinter::new(start_time);

    let result = bigip_xfer::download_with_cancel(
        client, mode, output_path, Some(|done: u64, total: u64| progress.update(done, total)), cancel,
    ).await;

    eprint!("\r\x1b[2K");

    match result {
        Ok(DownloadOutcome::Complete { bytes_written, chunks }) => {
            let secs = start_time.elapsed().as_secs_f64();
            let avg = if secs > 0.1 { (bytes_written as f64 / secs) as u64 } else { 0 };
            eprintln!("  ✅ Download complete: {}", output_path.display());
            eprintln!("  {} in {} chunk(s), {:.1}s ({})",
                human_size(bytes_written), chunks, secs, format_rate(avg),
            );
            Ok(())
        }

        Ok(DownloadOutcome::Empty) => {
            eprintln!("  File is empty, nothing written.");
            Ok(())
        }

        Ok(DownloadOutcome::Cancelled { bytes_written }) => {
            eprintln!("  ✖ Download interrupted after {}.", human_size(bytes_written));
            eprintln!("  Partial data kept in {}", output_path.display());
            Ok(())
        }

        Err(e) => {
            eprintln!("  ❌ Download failed.");
            if !matches!(e, TransferError::UnsupportedMode { .. } | TransferError::InvalidFilename(_)) {
                eprintln!("  Partial data may remain in {}", output_path.display());
            }
            Err(e).with_context(|| format!("Download of {} failed", output_path.display()))
        }
    }
}

pub async fn run_upload(
    client: &ApplianceClient,
    mode: Mode,
    source_path: &Path,
    cancel: &CancellationToken,
) -> Result<()> {
    let size = tokio::fs::metadata(source_path)
        .await
        .with_context(|| format!("Cannot read source file: {}", source_path.display()))?
        .len();

    eprintln!("  Appliance : {}", client.base_url());
    eprintln!("  Mode      : {}", mode);
    eprintln!("  Source    : {}", source_path.display());
    eprintln!("  File size : {} ({} bytes)", human_size(size), size);
    eprintln!();

    let start_time = Instant::now();
    let progress = ProgressPrinter::new(start_time);

    let result = bigip_xfer::upload_with_cancel(
        client, mode, source_path, Some(|done: u64, total: u64| progress.update(done, total)), cancel,
    ).await;

    eprint!("\r\x1b[2K");

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("  ❌ Upload failed.");
            return Err(e).with_context(|| format!("Upload of {} failed", source_path.display()));
        }
    };

    if outcome.cancelled {
        eprintln!("  ✖ Upload interrupted after {} of {}.", human_size(outcome.bytes_sent), human_size(size));
        return Ok(());
    }

    let secs = start_time.elapsed().as_secs_f64();
    let avg = if secs > 0.1 { (outcome.bytes_sent as f64 / secs) as u64 } else { 0 };

    if outcome.rejected_chunks > 0 {
        eprintln!("  ⚠ Upload finished, but the appliance rejected {} of {} chunk(s).",
            outcome.rejected_chunks, outcome.chunks);
    } else {
        eprintln!("  ✅ Upload complete: {}", source_path.display());
    }
    eprintln!("  {} in {} chunk(s), {:.1}s ({})",
        human_size(outcome.bytes_sent), outcome.chunks, secs, format_rate(avg),
    );
    Ok(())
}

/// Single-line progress bar with a speed estimate over the last 3 seconds.
struct ProgressPrinter {
    start_time: Instant,
    speed_samples: Mutex<VecDeque<(u64, u64)>>,
}

impl ProgressPrinter {
    fn new(start_time: Instant) -> Self {
        Self { start_time, speed_samples: Mutex::new(VecDeque::new()) }
    }

    fn update(&self, done: u64, total: u64) {
        let elapsed_ms = self.start_time.elapsed().as_millis() as u64;
        let rate = match self.speed_samples.lock() {
            Ok(mut samples) => {
                samples.push_back((elapsed_ms, done));
                while samples.len() > 1 && samples.front().is_some_and(|s| elapsed_ms - s.0 > 3000) {
                    samples.pop_front();
                }
                match (samples.front(), samples.len()) {
                    (Some(oldest), n) if n >= 2 => {
                        let dt = (elapsed_ms - oldest.0) as f64 / 1000.0;
                        let db = done.saturating_sub(oldest.1) as f64;
                        if dt > 0.1 { (db / dt) as u64 } else { 0 }
                    }
                    _ => 0,
                }
            }
            Err(_) => 0,
        };
        if total > 0 {
            eprint!("\r\x1b[2K  {}", progress_line(done, total, rate));
        }
    }
}

const BAR_CELLS: u64 = 30;

/// `[#########---------]  50% 1.2 MiB/2.5 MiB  640.0 KiB/s  eta 0:02`
fn progress_line(done: u64, total: u64, rate: u64) -> String {
    let done = done.min(total);
    let filled = (done * BAR_CELLS / total) as usize;
    let bar: String = (0..BAR_CELLS as usize)
        .map(|cell| if cell < filled { '#' } else { '-' })
        .collect();

    let eta = match total.checked_sub(done).zip(std::num::NonZeroU64::new(rate)) {
        Some((left, rate)) => clock(left / rate),
        None => "-:--".to_string(),
    };

    format!(
        "[{}] {:>3}% {}/{}  {}  eta {}",
        bar,
        done * 100 / total,
        human_size(done),
        human_size(total),
        format_rate(rate),
        eta,
    )
}

/// Seconds as `m:ss`, or `h:mm:ss` past the hour.
fn clock(secs: u64) -> String {
    let (h, m, s) = (secs / 3600, secs / 60 % 60, secs % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}

fn format_rate(bytes_per_sec: u64) -> String {
    match bytes_per_sec {
        0 => "stalled".to_string(),
        n => format!("{}/s", human_size(n)),
    }
}

fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

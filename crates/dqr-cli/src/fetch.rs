//! Blocking HTTP fetch collaborator built on libcurl.
//!
//! One GET per job against its direct URL, written to `<target>.part` and
//! renamed into place on success. The abort token is observed in the
//! progress callback, never mid-write.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use dqr_core::config::FetchConfig;
use dqr_core::queue::{FetchOutcome, Fetcher, Job, ProgressSink};

pub struct HttpFetcher {
    connect_timeout: Duration,
    low_speed_secs: u64,
    /// Receive-rate cap in bytes/s, pushed at runtime via `UpdateSettings`.
    max_recv_speed: Mutex<Option<u64>>,
}

impl HttpFetcher {
    pub fn new(cfg: &FetchConfig) -> Self {
        Self {
            connect_timeout: Duration::from_secs(cfg.connect_timeout_secs),
            low_speed_secs: cfg.low_speed_secs,
            max_recv_speed: Mutex::new(None),
        }
    }

    fn transfer(
        &self,
        url: &str,
        part: &Path,
        progress: &ProgressSink,
        abort: &AtomicBool,
    ) -> Result<u32> {
        if let Some(parent) = part.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = File::create(part).context("cannot create output file")?;

        let mut easy = curl::easy::Easy::new();
        easy.url(url).context("invalid URL")?;
        easy.follow_location(true)?;
        easy.max_redirections(10)?;
        easy.connect_timeout(self.connect_timeout)?;
        easy.low_speed_limit(1024)?;
        easy.low_speed_time(Duration::from_secs(self.low_speed_secs))?;
        let speed = self.max_recv_speed.lock().map(|g| *g).unwrap_or(None);
        if let Some(speed) = speed {
            easy.max_recv_speed(speed)?;
        }
        easy.progress(true)?;

        {
            let mut transfer = easy.transfer();
            transfer.progress_function(|dltotal, dlnow, _ultotal, _ulnow| {
                if abort.load(Ordering::Relaxed) {
                    return false; // cancel at this checkpoint
                }
                if dlnow > 0.0 {
                    progress.report(dlnow as u64, dltotal as u64);
                }
                true
            })?;
            transfer.write_function(|data| match file.write_all(data) {
                Ok(()) => Ok(data.len()),
                Err(e) => {
                    tracing::warn!("write to part file failed: {e}");
                    Ok(0) // abort transfer
                }
            })?;
            transfer.perform().context("GET request failed")?;
        }

        easy.response_code().context("no response code")
    }
}

impl Fetcher for HttpFetcher {
    fn update_settings(&self, settings: &serde_json::Value) {
        let speed = settings.get("max_recv_speed").and_then(|v| v.as_u64());
        if let Ok(mut guard) = self.max_recv_speed.lock() {
            *guard = speed;
            tracing::debug!(?speed, "transfer settings updated");
        }
    }

    fn fetch(&self, job: &Job, progress: &ProgressSink, abort: &AtomicBool) -> FetchOutcome {
        let Some(url) = job.direct_url.as_deref().filter(|u| !u.trim().is_empty()) else {
            return FetchOutcome::Failed(format!("job {} has no direct URL", job.id));
        };
        let target = PathBuf::from(&job.target_path);
        let part = PathBuf::from(format!("{}.part", job.target_path));

        let code = match self.transfer(url, &part, progress, abort) {
            Ok(code) => code,
            Err(e) => {
                fs::remove_file(&part).ok();
                if abort.load(Ordering::Relaxed) {
                    return FetchOutcome::Aborted;
                }
                return FetchOutcome::Failed(format!("{e:#}"));
            }
        };

        match code {
            200..=299 => match fs::rename(&part, &target) {
                Ok(()) => FetchOutcome::Done,
                Err(e) => {
                    fs::remove_file(&part).ok();
                    FetchOutcome::Failed(format!("cannot move file into place: {e}"))
                }
            },
            401 | 403 | 404 => {
                fs::remove_file(&part).ok();
                FetchOutcome::ServiceDenied(format!("HTTP {code} for {url}"))
            }
            _ => {
                fs::remove_file(&part).ok();
                FetchOutcome::Failed(format!("GET {url} returned HTTP {code}"))
            }
        }
    }
}

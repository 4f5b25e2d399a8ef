// Run layer: drives the fixed sequence login -> list -> download each job
// and draws a progress bar per archive with `indicatif`.
//
// Login, listing and creating the output directory are fatal. A failed
// download is logged and the loop carries on with the next job.

use crate::api::ApiClient;
use crate::config::Config;
use crate::error::DownloadError;
use crate::job::{archive_file_name, download_stamp, JobDescriptor, TimestampPolicy};
use crate::session::Session;
use anyhow::{Context, Result};
use chrono::Local;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::PathBuf;
use tracing::{error, info};

/// Outcome counts of one run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub listed: usize,
    pub downloaded: usize,
    pub failed: usize,
}

/// Log in, list the jobs and download every archive into the output directory.
pub fn run(api: &ApiClient, config: &Config) -> Result<RunSummary> {
    let session = api
        .authenticate(&config.credentials)
        .context("Login failed")?;

    let jobs = api
        .list_jobs(&session)
        .context("Failed to fetch job list")?;
    info!(count = jobs.len(), "jobs listed");

    fs::create_dir_all(&config.out_dir).with_context(|| {
        format!(
            "Failed to create output directory {}",
            config.out_dir.display()
        )
    })?;

    let mut summary = RunSummary {
        listed: jobs.len(),
        ..RunSummary::default()
    };
    for job in &jobs {
        match download_job(api, &session, config, job) {
            Ok(_) => summary.downloaded += 1,
            Err(e) => {
                error!(job_id = %job.job_id, error = %e, "archive download failed");
                summary.failed += 1;
            }
        }
    }
    Ok(summary)
}

/// Download one archive and return where it was written.
fn download_job(
    api: &ApiClient,
    session: &Session,
    config: &Config,
    job: &JobDescriptor,
) -> Result<PathBuf, DownloadError> {
    info!(job_id = %job.job_id, patient_id = %job.patient_id, "downloading archive");

    // Stamped when this download starts, not when the list was fetched.
    let stamp = match config.timestamp {
        TimestampPolicy::Download => Some(download_stamp(Local::now())),
        TimestampPolicy::None => None,
    };
    let dest = config.out_dir.join(archive_file_name(job, stamp.as_deref()));

    let bar = progress_bar(config.progress, &job.job_id);
    let result = api.download_archive(session, job, &dest, &bar);
    bar.finish_and_clear();
    let bytes = result?;

    info!(job_id = %job.job_id, path = %dest.display(), bytes, "archive saved");
    Ok(dest)
}

fn progress_bar(enabled: bool, job_id: &str) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(0);
    let style = ProgressStyle::with_template(
        "{spinner} {msg} [{bar:30}] {bytes}/{total_bytes} ({bytes_per_sec})",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style);
    bar.set_message(job_id.to_string());
    bar
}

// API client module: one blocking HTTP client shared by the three calls a
// run makes (login, job list, archive download). Requests go out one at a
// time; nothing is retried.
//
// Two server flavours are supported (see `ApiVariant`). They differ in the
// listing endpoint, its body shape and how archive URLs are built.

use crate::config::{ApiVariant, Config, Credentials};
use crate::error::{AuthError, DownloadError, ListError};
use crate::job::{patient_id_from, JobDescriptor};
use crate::session::Session;
use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset};
use indicatif::ProgressBar;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use tracing::{debug, info, warn};

/// Number of sessions requested from the sessions API; the server caps it here.
pub const LIST_LIMIT: u32 = 50;

const COPY_BUF_SIZE: usize = 64 * 1024;

/// Blocking API client holding the HTTP connection pool, the base URL and
/// the flavour of the server.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    variant: ApiVariant,
}

/// Login request payload.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest<'a> {
    pub facility_code: &'a str,
    pub username: &'a str,
    pub password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pin: Option<&'a str>,
}

impl<'a> From<&'a Credentials> for LoginRequest<'a> {
    fn from(c: &'a Credentials) -> Self {
        LoginRequest {
            facility_code: &c.facility,
            username: &c.username,
            password: &c.password,
            pin: c.pin.as_deref(),
        }
    }
}

/// Login body of the sessions API. Only the facility id is used.
#[derive(Deserialize, Debug)]
struct LoginResponse {
    facility: FacilityRef,
}

#[derive(Deserialize, Debug)]
struct FacilityRef {
    id: String,
}

#[derive(Serialize, Debug)]
struct ListRequest {
    limit: u32,
}

/// Listing body of the sessions API, keyed by session.
#[derive(Deserialize, Debug)]
struct SessionsResponse {
    session: Option<BTreeMap<String, SessionEntry>>,
}

/// A session may not have a job yet; such entries are skipped.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct SessionEntry {
    #[serde(default)]
    imaging_session_uid: String,
    #[serde(default)]
    job: Option<SessionJob>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct SessionJob {
    #[serde(default)]
    id: String,
    #[serde(default)]
    updated_at: Option<DateTime<FixedOffset>>,
}

/// One element of the jobs API listing.
#[derive(Deserialize, Debug)]
struct JobEntry {
    #[serde(rename = "jobId", alias = "id", alias = "job_id")]
    job_id: String,
    #[serde(rename = "patientId", alias = "patient_id")]
    patient_id: String,
}

impl ApiClient {
    /// Build the client from the run configuration.
    ///
    /// No cookie store is enabled; the `Session` returned by `authenticate`
    /// is attached to each request explicitly.
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(ApiClient {
            client,
            base_url: config.base_url.clone(),
            variant: config.variant,
        })
    }

    pub fn variant(&self) -> ApiVariant {
        self.variant
    }

    pub fn login_url(&self) -> String {
        format!("{}/api/v1/auth/login", self.base_url)
    }

    pub fn job_list_url(&self, session: &Session) -> Option<String> {
        match self.variant {
            ApiVariant::Sessions => session.facility_id().map(|facility| {
                format!(
                    "{}/api/v1/infinitome-sessions/{}/latest",
                    self.base_url, facility
                )
            }),
            ApiVariant::Jobs => Some(format!("{}/api/v1/jobs", self.base_url)),
        }
    }

    pub fn archive_url(&self, session: &Session, job_id: &str) -> Option<String> {
        match self.variant {
            ApiVariant::Sessions => session.facility_id().map(|facility| {
                format!("{}/api/v1/jobs/{}/{}/files", self.base_url, facility, job_id)
            }),
            ApiVariant::Jobs => Some(format!("{}/api/v1/jobs/{}/files", self.base_url, job_id)),
        }
    }

    /// POST the credentials to the login endpoint and capture the session.
    pub fn authenticate(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        let res = self
            .client
            .post(self.login_url())
            .header(CONTENT_TYPE, "application/json")
            .json(&LoginRequest::from(credentials))
            .send()?;
        if res.status() != StatusCode::OK {
            return Err(AuthError::Status(res.status()));
        }

        // Cookies are read off the headers before the body is consumed.
        let session = Session::from_response(&res);
        let session = match self.variant {
            ApiVariant::Sessions => {
                let body = res.bytes()?;
                let login: LoginResponse = serde_json::from_slice(&body)?;
                session.with_facility_id(login.facility.id)
            }
            ApiVariant::Jobs => session,
        };

        if session.is_empty() {
            warn!(user = %credentials.username, "login response set no session cookies");
        }
        info!(
            user = %credentials.username,
            facility = %credentials.facility,
            "logged in"
        );
        Ok(session)
    }

    /// Fetch the jobs visible to this session.
    ///
    /// The order is whatever the decoded response yields.
    pub fn list_jobs(&self, session: &Session) -> Result<Vec<JobDescriptor>, ListError> {
        let url = self.job_list_url(session).ok_or(ListError::MissingFacility)?;
        let req = match self.variant {
            ApiVariant::Sessions => self
                .client
                .post(&url)
                .header(CONTENT_TYPE, "application/json")
                .json(&ListRequest { limit: LIST_LIMIT }),
            ApiVariant::Jobs => self.client.get(&url),
        };
        let res = session.attach(req).send()?;
        if res.status() != StatusCode::OK {
            return Err(ListError::Status(res.status()));
        }
        let body = res.bytes()?;

        let jobs: Vec<JobDescriptor> = match self.variant {
            ApiVariant::Sessions => {
                let parsed: SessionsResponse = serde_json::from_slice(&body)?;
                parsed
                    .session
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|(key, entry)| session_job(&key, entry))
                    .collect()
            }
            ApiVariant::Jobs => {
                let parsed: Vec<JobEntry> = serde_json::from_slice(&body)?;
                parsed
                    .into_iter()
                    .map(|entry| JobDescriptor {
                        job_id: entry.job_id,
                        patient_id: entry.patient_id,
                    })
                    .collect()
            }
        };
        debug!(url = %url, count = jobs.len(), "job list fetched");
        Ok(jobs)
    }

    /// Stream one job's archive into `dest`.
    ///
    /// `dest` is only created once the server has answered 200. If the
    /// transfer breaks off, the partial file is removed again. Returns the
    /// number of bytes written.
    pub fn download_archive(
        &self,
        session: &Session,
        job: &JobDescriptor,
        dest: &Path,
        progress: &ProgressBar,
    ) -> Result<u64, DownloadError> {
        let url = self
            .archive_url(session, &job.job_id)
            .ok_or(DownloadError::MissingFacility)?;
        debug!(url = %url, "requesting archive");

        let mut res = session.attach(self.client.get(&url)).send()?;
        if res.status() != StatusCode::OK {
            return Err(DownloadError::Status(res.status()));
        }
        if let Some(len) = res.content_length() {
            progress.set_length(len);
        }

        let file = File::create(dest)?;
        let result = copy_body(&mut res, BufWriter::new(file), progress);
        if result.is_err() {
            if let Err(e) = fs::remove_file(dest) {
                warn!(path = %dest.display(), error = %e, "could not remove partial archive");
            }
        }
        result
    }
}

fn session_job(key: &str, entry: SessionEntry) -> Option<JobDescriptor> {
    let job = match entry.job {
        Some(job) if !job.id.is_empty() => job,
        _ => {
            warn!(session = %key, "session has no job yet, skipping");
            return None;
        }
    };
    // Without a timestamp the uid alone identifies the patient.
    let patient_id = match &job.updated_at {
        Some(updated_at) => patient_id_from(&entry.imaging_session_uid, updated_at),
        None => {
            warn!(session = %key, job_id = %job.id, "job has no updatedAt");
            entry.imaging_session_uid
        }
    };
    Some(JobDescriptor {
        job_id: job.id,
        patient_id,
    })
}

/// Copy the body into `out`, keeping read failures (transport) apart from
/// write failures (local disk).
fn copy_body<R: Read, W: Write>(
    body: &mut R,
    mut out: W,
    progress: &ProgressBar,
) -> Result<u64, DownloadError> {
    let mut buf = vec![0u8; COPY_BUF_SIZE];
    let mut written = 0u64;
    loop {
        let n = match body.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(DownloadError::Stream(e)),
        };
        out.write_all(&buf[..n])?;
        written += n as u64;
        progress.inc(n as u64);
    }
    out.flush()?;
    Ok(written)
}

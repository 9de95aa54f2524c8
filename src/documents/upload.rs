//! Document upload and ingestion-job polling
//!
//! A successful upload returns a job id that the backend processes in the
//! background. The job is tracked in the session and polled on a timer
//! while its status is `processing`; any terminal status ends tracking.

use crate::config::UploadConfig;
use crate::gateway::{format_api_error, ApiCall, ApiGateway, FilePart, Outcome};
use crate::session::{JobStatus, NoticeLevel, Session, UploadJob};
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

const UPLOAD_PATH: &str = "/documents/upload";

/// Lowercased 422 detail fragments that mean the file had nothing to ingest
const UNREADABLE_MARKERS: [&str; 4] = ["no readable text", "0 chunks", "empty", "extract"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    #[error("A document is still being processed")]
    JobInProgress,

    #[error("Unsupported file type; accepted: {accepted}")]
    UnsupportedType { accepted: String },

    #[error("File too large (max 2.5 MB)")]
    TooLarge,

    #[error("Invalid file format or empty PDF")]
    EmptyOrInvalid,

    #[error("Document processing failed")]
    ProcessingFailed,

    #[error("Network failure")]
    Network,

    #[error("{0}")]
    Server(String),

    #[error("Session expired")]
    SessionExpired,

    #[error("Please login first")]
    NotAuthenticated,
}

/// Body of a successful upload
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadAccepted {
    #[serde(deserialize_with = "crate::threads::id_as_string")]
    pub job_id: String,
    #[serde(default = "processing")]
    pub status: JobStatus,
    #[serde(default)]
    pub message: Option<String>,
}

fn processing() -> JobStatus {
    JobStatus::Processing
}

#[derive(Deserialize)]
struct StatusResponse {
    status: JobStatus,
}

pub struct UploadPoller<'a> {
    gateway: &'a ApiGateway,
    config: &'a UploadConfig,
}

impl<'a> UploadPoller<'a> {
    pub fn new(gateway: &'a ApiGateway, config: &'a UploadConfig) -> Self {
        Self { gateway, config }
    }

    /// Upload a file and start tracking its ingestion job
    pub async fn submit(
        &self,
        session: &mut Session,
        file: FilePart,
    ) -> Result<UploadAccepted, UploadError> {
        if !session.is_authenticated() {
            return Err(UploadError::NotAuthenticated);
        }
        if session.upload_job.is_some() {
            return Err(UploadError::JobInProgress);
        }
        let accepted = file
            .extension()
            .is_some_and(|ext| self.config.accepted_extensions.iter().any(|a| a == &ext));
        if !accepted {
            return Err(UploadError::UnsupportedType {
                accepted: self.config.accepted_extensions.join(", "),
            });
        }

        tracing::info!("Uploading {} ({} bytes)", file.file_name, file.bytes.len());
        let call = ApiCall::post(UPLOAD_PATH).file(file);
        let response = match self.gateway.call(session, call).await {
            Outcome::Response(resp) => resp,
            Outcome::Network(_) => return Err(UploadError::Network),
            Outcome::SessionExpired => return Err(UploadError::SessionExpired),
        };

        match response.status {
            StatusCode::OK => {
                let job = response.json::<UploadAccepted>().ok_or_else(|| {
                    UploadError::Server("Unexpected response from upload".to_string())
                })?;
                self.track(session, &job);
                Ok(job)
            }
            StatusCode::PAYLOAD_TOO_LARGE => Err(UploadError::TooLarge),
            StatusCode::UNPROCESSABLE_ENTITY => {
                let detail = response.detail().unwrap_or_default().to_lowercase();
                tracing::debug!("Upload rejected: {}", detail);
                if UNREADABLE_MARKERS.iter().any(|m| detail.contains(m)) {
                    Err(UploadError::EmptyOrInvalid)
                } else {
                    Err(UploadError::ProcessingFailed)
                }
            }
            _ => Err(UploadError::Server(format_api_error(&response))),
        }
    }

    fn track(&self, session: &mut Session, job: &UploadAccepted) {
        if job.status.is_terminal() {
            finish(session, &job.job_id, job.status);
            return;
        }
        tracing::info!("Tracking upload job {}", job.job_id);
        session.upload_job = Some(UploadJob {
            id: job.job_id.clone(),
            status: job.status,
        });
        session.notify(
            NoticeLevel::Info,
            "File uploaded! Document is being processed in background...",
        );
    }

    /// One poll of the tracked job; a no-op unless it is still processing
    ///
    /// Returns the status observed, if any.
    pub async fn poll(&self, session: &mut Session) -> Option<JobStatus> {
        let job_id = match session.upload_job() {
            Some(job) if job.status == JobStatus::Processing => job.id.clone(),
            _ => return None,
        };

        let path = format!("/documents/upload-status/{}", job_id);
        let outcome = self.gateway.call(session, ApiCall::get(path)).await;
        let status = match outcome.ok().and_then(|resp| resp.json::<StatusResponse>()) {
            Some(body) => body.status,
            None => {
                tracing::debug!("No usable status for job {}, will retry", job_id);
                return None;
            }
        };

        if status.is_terminal() {
            finish(session, &job_id, status);
        } else {
            tracing::debug!("Job {} still processing", job_id);
        }
        Some(status)
    }
}

fn finish(session: &mut Session, job_id: &str, status: JobStatus) {
    session.upload_job = None;
    tracing::info!("Upload job {} finished: {:?}", job_id, status);
    match status {
        JobStatus::Done => {
            session.notify(NoticeLevel::Success, "Document processing completed!")
        }
        JobStatus::Failed => session.notify(NoticeLevel::Error, "Document processing failed."),
        JobStatus::Deleted => session.notify(NoticeLevel::Warning, "Document was deleted."),
        JobStatus::Processing => {}
    }
}

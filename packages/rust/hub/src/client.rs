//! Minimal HTTP client for the dataset hub's repo and commit endpoints.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use url::Url;

use splitmerge_shared::{HubSettings, Result, SplitMergeError};

use crate::RepoId;

/// User-Agent string for hub requests.
const USER_AGENT: &str = concat!("splitmerge/", env!("CARGO_PKG_VERSION"));

/// Bytes of each file sent to the preupload check.
const PREUPLOAD_SAMPLE_LEN: usize = 512;

/// A file to place in the dataset repository.
#[derive(Debug, Clone)]
pub struct UploadFile {
    /// Destination path inside the repository (e.g., `data/train.csv`).
    pub path_in_repo: String,
    pub content: Vec<u8>,
}

/// Identifiers of a created commit.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitInfo {
    pub commit_url: String,
    pub commit_oid: String,
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct CreateRepoRequest<'a> {
    #[serde(rename = "type")]
    repo_type: &'a str,
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    organization: Option<&'a str>,
    private: bool,
}

#[derive(Serialize)]
struct PreuploadRequest<'a> {
    files: Vec<PreuploadFile<'a>>,
}

#[derive(Serialize)]
struct PreuploadFile<'a> {
    path: &'a str,
    sample: String,
    size: usize,
}

#[derive(Deserialize)]
struct PreuploadResponse {
    files: Vec<PreuploadVerdict>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PreuploadVerdict {
    path: String,
    upload_mode: String,
}

/// One line of the NDJSON commit body.
#[derive(Serialize)]
#[serde(tag = "key", content = "value", rename_all = "lowercase")]
enum CommitLine<'a> {
    Header {
        summary: &'a str,
        description: &'a str,
    },
    File {
        content: String,
        path: &'a str,
        encoding: &'a str,
    },
}

// ---------------------------------------------------------------------------
// HubClient
// ---------------------------------------------------------------------------

/// Authenticated client for one hub endpoint and branch.
#[derive(Debug, Clone)]
pub struct HubClient {
    http: Client,
    endpoint: Url,
    token: String,
    revision: String,
}

impl HubClient {
    /// Build a client from hub settings and an access token.
    pub fn new(settings: &HubSettings, token: impl Into<String>) -> Result<Self> {
        let endpoint = settings.endpoint_url()?;
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| SplitMergeError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint,
            token: token.into(),
            revision: settings.revision.clone(),
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api/{path}", self.endpoint.as_str().trim_end_matches('/'))
    }

    fn encoded_revision(&self) -> String {
        self.revision.replace('/', "%2F")
    }

    /// Create the dataset repository. Returns `false` if it already existed.
    #[instrument(skip_all, fields(repo = %repo))]
    pub async fn create_repo(&self, repo: &RepoId, private: bool) -> Result<bool> {
        let body = CreateRepoRequest {
            repo_type: "dataset",
            name: &repo.name,
            organization: repo.namespace.as_deref(),
            private,
        };

        let response = self
            .http
            .post(self.api_url("repos/create"))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| SplitMergeError::Network(format!("create repo {repo}: {e}")))?;

        if response.status() == StatusCode::CONFLICT {
            debug!("repository already exists");
            return Ok(false);
        }
        check_status(response, "create repo").await?;
        info!(private, "created dataset repository");
        Ok(true)
    }

    /// Ask the hub how each file would be stored. Files the hub wants in
    /// LFS are refused.
    #[instrument(skip_all, fields(repo = %repo, files = files.len()))]
    pub async fn preupload(&self, repo: &RepoId, files: &[UploadFile]) -> Result<()> {
        let body = PreuploadRequest {
            files: files
                .iter()
                .map(|f| PreuploadFile {
                    path: &f.path_in_repo,
                    sample: STANDARD
                        .encode(&f.content[..f.content.len().min(PREUPLOAD_SAMPLE_LEN)]),
                    size: f.content.len(),
                })
                .collect(),
        };

        let url = self.api_url(&format!(
            "datasets/{repo}/preupload/{}",
            self.encoded_revision()
        ));
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| SplitMergeError::Network(format!("preupload {repo}: {e}")))?;
        let response = check_status(response, "preupload").await?;

        let parsed: PreuploadResponse = response.json().await.map_err(|e| {
            SplitMergeError::hub(200, format!("invalid preupload response: {e}"))
        })?;

        if let Some(lfs) = parsed.files.iter().find(|v| v.upload_mode == "lfs") {
            return Err(SplitMergeError::hub(
                200,
                format!(
                    "{} must be uploaded through LFS, which splitmerge does not support",
                    lfs.path
                ),
            ));
        }
        Ok(())
    }

    /// Commit `files` to the configured branch in a single commit.
    #[instrument(skip_all, fields(repo = %repo, files = files.len()))]
    pub async fn commit(
        &self,
        repo: &RepoId,
        files: &[UploadFile],
        summary: &str,
    ) -> Result<CommitInfo> {
        let body = commit_body(files, summary)?;
        let url = self.api_url(&format!(
            "datasets/{repo}/commit/{}",
            self.encoded_revision()
        ));

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(body)
            .send()
            .await
            .map_err(|e| SplitMergeError::Network(format!("commit to {repo}: {e}")))?;
        let response = check_status(response, "commit").await?;

        let info: CommitInfo = response
            .json()
            .await
            .map_err(|e| SplitMergeError::hub(200, format!("invalid commit response: {e}")))?;
        info!(oid = %info.commit_oid, "commit created");
        Ok(info)
    }
}

/// Build the NDJSON commit payload: a header line, then one base64 line per file.
fn commit_body(files: &[UploadFile], summary: &str) -> Result<String> {
    let mut lines = Vec::with_capacity(files.len() + 1);
    lines.push(CommitLine::Header {
        summary,
        description: "",
    });
    for f in files {
        lines.push(CommitLine::File {
            content: STANDARD.encode(&f.content),
            path: &f.path_in_repo,
            encoding: "base64",
        });
    }

    let mut body = String::new();
    for line in &lines {
        let json = serde_json::to_string(line)
            .map_err(|e| SplitMergeError::parse(format!("commit payload: {e}")))?;
        body.push_str(&json);
        body.push('\n');
    }
    Ok(body)
}

/// Turn a non-success response into a hub error carrying status and body.
async fn check_status(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(SplitMergeError::hub(
        status.as_u16(),
        format!("{what} failed: {}", body.trim()),
    ))
}

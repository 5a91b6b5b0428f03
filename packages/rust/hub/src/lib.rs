//! Publishing merged splits to a hosted dataset repository.
//!
//! The publisher expects one CSV per split in a directory, uploads them as
//! `data/<split>.csv` together with a dataset card, and commits everything
//! to the configured branch in one commit.

mod client;

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{info, instrument};

use splitmerge_shared::{Result, Split, SplitLayout, SplitMergeError};

pub use client::{CommitInfo, HubClient, UploadFile};

// ---------------------------------------------------------------------------
// Data files
// ---------------------------------------------------------------------------

/// The split files found in a directory, in [`Split::ALL`] order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFiles {
    pub base_dir: PathBuf,
    pub files: Vec<(Split, PathBuf)>,
}

impl DataFiles {
    /// Local path of `split`.
    pub fn path(&self, split: Split) -> Option<&Path> {
        self.files
            .iter()
            .find(|(s, _)| *s == split)
            .map(|(_, p)| p.as_path())
    }
}

/// Locate every split file in `base_dir` under `layout` naming.
///
/// Fails if `base_dir` is not a directory or any split file is missing.
pub fn resolve_data_files(base_dir: &Path, layout: SplitLayout) -> Result<DataFiles> {
    if !base_dir.is_dir() {
        return Err(SplitMergeError::config(format!(
            "Expected directory at {}",
            base_dir.display()
        )));
    }

    let mut files = Vec::with_capacity(Split::ALL.len());
    for split in Split::ALL {
        let path = base_dir.join(split.file_name(layout));
        if !path.is_file() {
            return Err(SplitMergeError::MissingSplit { split, path });
        }
        files.push((split, path));
    }

    Ok(DataFiles {
        base_dir: base_dir.to_path_buf(),
        files,
    })
}

/// Destination of a split inside the dataset repository.
pub fn repo_path(split: Split) -> String {
    format!("data/{}", split.file_name(SplitLayout::Combined))
}

// ---------------------------------------------------------------------------
// RepoId
// ---------------------------------------------------------------------------

/// A dataset repository identifier: `name` or `namespace/name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoId {
    pub namespace: Option<String>,
    pub name: String,
}

impl RepoId {
    /// Parse and validate a repository id.
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = || {
            SplitMergeError::config(format!(
                "invalid repo id '{raw}': expected 'name' or 'namespace/name' using letters, digits, '-', '_' or '.'"
            ))
        };
        let valid_segment = |s: &str| {
            !s.is_empty()
                && s.chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        };

        let mut parts = raw.split('/');
        let (namespace, name) = match (parts.next(), parts.next(), parts.next()) {
            (Some(name), None, None) => (None, name),
            (Some(ns), Some(name), None) => (Some(ns), name),
            _ => return Err(invalid()),
        };

        if !valid_segment(name) || namespace.is_some_and(|ns| !valid_segment(ns)) {
            return Err(invalid());
        }

        Ok(Self {
            namespace: namespace.map(str::to_owned),
            name: name.to_owned(),
        })
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{ns}/{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

// ---------------------------------------------------------------------------
// Dataset card
// ---------------------------------------------------------------------------

/// README.md for the dataset repository, declaring one file per split.
pub fn dataset_card(repo: &RepoId, data_files: &DataFiles) -> String {
    let mut card = String::from("---\nconfigs:\n- config_name: default\n  data_files:\n");
    for (split, _) in &data_files.files {
        card.push_str(&format!("  - split: {split}\n    path: {}\n", repo_path(*split)));
    }
    card.push_str("---\n\n");
    card.push_str(&format!("# {}\n\n", repo.name));
    card.push_str("Deduplicated train/validation/test splits.\n");
    card
}

// ---------------------------------------------------------------------------
// publish
// ---------------------------------------------------------------------------

/// Options for [`publish`].
#[derive(Debug, Clone)]
pub struct PublishOptions {
    pub repo: RepoId,
    /// Create the repository as private (ignored if it already exists).
    pub private: bool,
    /// Commit summary line.
    pub commit_message: String,
}

/// Result of [`publish`].
#[derive(Debug)]
pub struct PublishResult {
    pub repo: RepoId,
    /// Whether the repository was created by this run.
    pub created: bool,
    /// Number of files committed, dataset card included.
    pub file_count: usize,
    pub commit: CommitInfo,
}

/// Progress callback for reporting publish status.
pub trait PublishProgress {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when the commit has been created.
    fn published(&self, result: &PublishResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl PublishProgress for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn published(&self, _result: &PublishResult) {}
}

/// Upload the split files and a dataset card in one commit.
#[instrument(skip_all, fields(repo = %options.repo, dir = %data_files.base_dir.display()))]
pub async fn publish(
    client: &HubClient,
    data_files: &DataFiles,
    options: &PublishOptions,
    progress: &dyn PublishProgress,
) -> Result<PublishResult> {
    progress.phase("Reading split files");
    let mut files = Vec::with_capacity(data_files.files.len() + 1);
    for (split, path) in &data_files.files {
        let content = std::fs::read(path).map_err(|e| SplitMergeError::io(path, e))?;
        files.push(UploadFile {
            path_in_repo: repo_path(*split),
            content,
        });
    }
    files.push(UploadFile {
        path_in_repo: "README.md".into(),
        content: dataset_card(&options.repo, data_files).into_bytes(),
    });

    progress.phase("Creating repository");
    let created = client.create_repo(&options.repo, options.private).await?;

    progress.phase("Checking upload modes");
    client.preupload(&options.repo, &files).await?;

    progress.phase("Committing files");
    let commit = client
        .commit(&options.repo, &files, &options.commit_message)
        .await?;

    let result = PublishResult {
        repo: options.repo.clone(),
        created,
        file_count: files.len(),
        commit,
    };

    info!(
        repo = %result.repo,
        created,
        files = result.file_count,
        url = %result.commit.commit_url,
        "dataset published"
    );

    progress.published(&result);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use splitmerge_shared::HubSettings;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Scratch directory removed on drop.
    struct ScratchDir(PathBuf);

    impl std::ops::Deref for ScratchDir {
        type Target = Path;

        fn deref(&self) -> &Path {
            &self.0
        }
    }

    impl Drop for ScratchDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
        }
    }

    fn temp_dir(prefix: &str) -> ScratchDir {
        let dir = std::env::temp_dir().join(format!("sm-{prefix}-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        ScratchDir(dir)
    }

    fn combined_dir(prefix: &str) -> ScratchDir {
        let dir = temp_dir(prefix);
        for split in Split::ALL {
            std::fs::write(
                dir.join(split.file_name(SplitLayout::Combined)),
                format!("text,In Use\r\n{split}-row,1\r\n"),
            )
            .unwrap();
        }
        dir
    }

    fn client_for(server: &MockServer) -> HubClient {
        let settings = HubSettings {
            endpoint: server.uri(),
            ..HubSettings::default()
        };
        HubClient::new(&settings, "hf_test_token").unwrap()
    }

    fn options() -> PublishOptions {
        PublishOptions {
            repo: RepoId::parse("yfhe/C-STANCE-B").unwrap(),
            private: false,
            commit_message: "Upload deduplicated splits".into(),
        }
    }

    #[test]
    fn resolves_all_splits() {
        let dir = combined_dir("hub-resolve");
        let files = resolve_data_files(&dir, SplitLayout::Combined).unwrap();
        assert_eq!(files.files.len(), 3);
        assert_eq!(files.path(Split::Test), Some(dir.join("test.csv").as_path()));
    }

    #[test]
    fn missing_split_is_reported() {
        let dir = combined_dir("hub-missing");
        std::fs::remove_file(dir.join("validation.csv")).unwrap();

        let err = resolve_data_files(&dir, SplitLayout::Combined).unwrap_err();
        match err {
            SplitMergeError::MissingSplit { split, path } => {
                assert_eq!(split, Split::Validation);
                assert!(path.ends_with("validation.csv"));
            }
            other => panic!("expected MissingSplit, got {other:?}"),
        }

        // Raw layout names differ, so the same directory lacks every raw file.
        let err = resolve_data_files(&dir, SplitLayout::Raw).unwrap_err();
        assert!(err.to_string().contains("split 'train'"));
    }

    #[test]
    fn missing_dir_is_config_error() {
        let scratch = temp_dir("hub-nodir");
        let err = resolve_data_files(&scratch.join("absent"), SplitLayout::Combined).unwrap_err();
        assert!(matches!(err, SplitMergeError::Config { .. }));
    }

    #[test]
    fn scratch_dir_is_removed_on_drop() {
        let dir = combined_dir("hub-cleanup");
        let root = dir.to_path_buf();
        assert!(root.join("train.csv").is_file());
        drop(dir);
        assert!(!root.exists());
    }

    #[test]
    fn repo_id_validation() {
        let id = RepoId::parse("yfhe/C-STANCE-A").unwrap();
        assert_eq!(id.namespace.as_deref(), Some("yfhe"));
        assert_eq!(id.name, "C-STANCE-A");
        assert_eq!(id.to_string(), "yfhe/C-STANCE-A");

        let bare = RepoId::parse("c_stance.v2").unwrap();
        assert!(bare.namespace.is_none());

        for bad in ["", "a/b/c", "/name", "ns/", "has space/x", "ns/na$me"] {
            assert!(RepoId::parse(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn dataset_card_lists_every_split() {
        let dir = combined_dir("hub-card");
        let files = resolve_data_files(&dir, SplitLayout::Combined).unwrap();
        let card = dataset_card(&RepoId::parse("yfhe/C-STANCE-B").unwrap(), &files);

        assert!(card.starts_with("---\nconfigs:\n"));
        assert!(card.contains("  - split: train\n    path: data/train.csv\n"));
        assert!(card.contains("  - split: validation\n    path: data/validation.csv\n"));
        assert!(card.contains("  - split: test\n    path: data/test.csv\n"));
        assert!(card.contains("# C-STANCE-B"));
    }

    #[tokio::test]
    async fn publish_creates_and_commits() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/repos/create"))
            .and(header("authorization", "Bearer hf_test_token"))
            .and(body_string_contains(r#""type":"dataset""#))
            .and(body_string_contains(r#""organization":"yfhe""#))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({ "url": "https://hub.example/datasets/yfhe/C-STANCE-B" }),
            ))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/api/datasets/yfhe/C-STANCE-B/preupload/main"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "files": [
                    { "path": "data/train.csv", "uploadMode": "regular" },
                    { "path": "README.md", "uploadMode": "regular" }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/api/datasets/yfhe/C-STANCE-B/commit/main"))
            .and(header("content-type", "application/x-ndjson"))
            .and(body_string_contains(r#""path":"data/validation.csv""#))
            .and(body_string_contains(r#""summary":"Upload deduplicated splits""#))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "commitUrl": "https://hub.example/datasets/yfhe/C-STANCE-B/commit/abc123",
                "commitOid": "abc123"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = combined_dir("hub-publish");
        let files = resolve_data_files(&dir, SplitLayout::Combined).unwrap();
        let result = publish(&client_for(&server), &files, &options(), &SilentProgress)
            .await
            .unwrap();

        assert!(result.created);
        assert_eq!(result.file_count, 4);
        assert_eq!(result.commit.commit_oid, "abc123");
    }

    #[tokio::test]
    async fn existing_repo_is_not_an_error() {
        let server = MockServer::start().await;
        let client = client_for(&server);

        Mock::given(method("POST"))
            .and(path("/api/repos/create"))
            .respond_with(ResponseTemplate::new(409).set_body_string("already created"))
            .mount(&server)
            .await;

        let created = client.create_repo(&options().repo, true).await.unwrap();
        assert!(!created);
    }

    #[tokio::test]
    async fn lfs_upload_mode_is_refused() {
        let server = MockServer::start().await;
        let client = client_for(&server);

        Mock::given(method("POST"))
            .and(path("/api/datasets/yfhe/C-STANCE-B/preupload/main"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "files": [{ "path": "data/train.csv", "uploadMode": "lfs" }]
            })))
            .mount(&server)
            .await;

        let files = vec![UploadFile {
            path_in_repo: "data/train.csv".into(),
            content: vec![b'x'; 16],
        }];
        let err = client.preupload(&options().repo, &files).await.unwrap_err();
        assert!(err.to_string().contains("LFS"));
    }

    #[tokio::test]
    async fn rejected_commit_surfaces_status() {
        let server = MockServer::start().await;
        let client = client_for(&server);

        Mock::given(method("POST"))
            .and(path("/api/datasets/yfhe/C-STANCE-B/commit/main"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Invalid credentials"))
            .mount(&server)
            .await;

        let err = client
            .commit(&options().repo, &[], "Upload")
            .await
            .unwrap_err();
        match err {
            SplitMergeError::Hub { status, message } => {
                assert_eq!(status, 401);
                assert!(message.contains("Invalid credentials"));
            }
            other => panic!("expected Hub error, got {other:?}"),
        }
    }
}

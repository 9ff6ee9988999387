//! Fetch a remote repository into a disposable workspace.

use std::path::Path;
use std::process::Stdio;

use tempfile::TempDir;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::error::CloneError;

const ALLOWED_SCHEMES: &[&str] = &["https://", "http://", "ssh://", "git@", "file://"];

/// A cloned working tree that is removed when closed or dropped.
#[derive(Debug)]
pub struct ClonedRepo {
    dir: TempDir,
}

impl ClonedRepo {
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Delete the working tree now, reporting failures that drop would hide.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be removed.
    pub fn close(self) -> std::io::Result<()> {
        self.dir.close()
    }
}

/// Reject URLs git could misread as options or that use an unknown transport.
///
/// # Errors
///
/// Returns [`CloneError::InvalidUrl`] describing the problem.
pub fn validate_url(url: &str) -> Result<(), CloneError> {
    if url.is_empty() {
        return Err(CloneError::InvalidUrl("URL is empty".to_owned()));
    }
    if url.chars().any(char::is_whitespace) {
        return Err(CloneError::InvalidUrl(
            "URL must not contain whitespace".to_owned(),
        ));
    }
    if !ALLOWED_SCHEMES.iter().any(|s| url.starts_with(s)) {
        return Err(CloneError::InvalidUrl(format!(
            "unsupported URL scheme: {url}"
        )));
    }
    Ok(())
}

/// Clone `url` into a fresh temporary directory.
///
/// `depth` requests a shallow clone. The git child process is killed if
/// `cancel` fires or the returned future is dropped; the partial tree is
/// removed either way.
///
/// # Errors
///
/// Returns an error if the URL is rejected, the workspace cannot be created,
/// git cannot be started, git exits unsuccessfully, or the clone is cancelled.
pub async fn clone_repository(
    url: &str,
    depth: Option<u32>,
    cancel: &CancellationToken,
) -> Result<ClonedRepo, CloneError> {
    validate_url(url)?;

    let dir = tempfile::Builder::new()
        .prefix("gitask-")
        .tempdir()
        .map_err(CloneError::Workspace)?;

    let mut command = Command::new("git");
    command.arg("clone").arg("--quiet");
    if let Some(depth) = depth {
        command.arg(format!("--depth={depth}"));
    }
    command
        .arg("--")
        .arg(url)
        .arg(dir.path())
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    tracing::info!(url, path = %dir.path().display(), "cloning repository");
    let output = tokio::select! {
        biased;
        () = cancel.cancelled() => {
            tracing::info!(url, "clone cancelled");
            return Err(CloneError::Cancelled);
        }
        output = command.output() => output.map_err(CloneError::Spawn)?,
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
        return Err(CloneError::Failed {
            url: url.to_owned(),
            code: output.status.code().unwrap_or(-1),
            stderr,
        });
    }

    Ok(ClonedRepo { dir })
}

//! Git history retriever - commit history via the `git` CLI

use crate::error::{Error, Result};
use crate::registry::{
    RetrievalKind, RetrievalOutput, RetrievalTask, Retriever, RetrieverDefinition,
};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tracing::debug;

/// Commits fetched per file
const MAX_COMMITS: usize = 20;

/// Fetches commit history for the files in a task's scope.
pub struct GitHistoryRetriever {
    definition: RetrieverDefinition,
    workdir: PathBuf,
}

impl GitHistoryRetriever {
    /// Create a retriever rooted at `workdir`
    #[must_use]
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            definition: RetrieverDefinition::new(
                RetrievalKind::HistoryLookup,
                "Commit history for files via git log",
            ),
            workdir: workdir.into(),
        }
    }

    async fn log_for_file(&self, file: &str) -> Result<Vec<serde_json::Value>> {
        let mut cmd = Command::new("git");
        cmd.arg("log")
            .arg(format!("--max-count={MAX_COMMITS}"))
            // Unit separator is unlikely to appear in commit subjects
            .arg("--pretty=format:%H\u{1f}%an\u{1f}%aI\u{1f}%s")
            .arg("--")
            .arg(file)
            .current_dir(&self.workdir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let output = cmd
            .output()
            .await
            .map_err(|e| Error::Execution(format!("failed to run git log: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Execution(format!("git log failed: {stderr}")));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let commits = stdout
            .lines()
            .filter(|line| !line.is_empty())
            .filter_map(|line| {
                let mut parts = line.split('\u{1f}');
                Some(serde_json::json!({
                    "sha": parts.next()?,
                    "author": parts.next()?,
                    "date": parts.next()?,
                    "message": parts.next()?,
                }))
            })
            .collect();
        Ok(commits)
    }
}

#[async_trait::async_trait]
impl Retriever for GitHistoryRetriever {
    fn definition(&self) -> &RetrieverDefinition {
        &self.definition
    }

    async fn retrieve(&self, task: &RetrievalTask) -> Result<RetrievalOutput> {
        let start = Instant::now();

        if task.scope.is_empty() {
            return Ok(RetrievalOutput::failure(
                "history lookup requires target files",
                start.elapsed().as_millis() as u64,
            ));
        }

        let mut history = serde_json::Map::new();
        let mut total_commits = 0usize;
        for file in &task.scope {
            match self.log_for_file(file).await {
                Ok(commits) => {
                    total_commits += commits.len();
                    history.insert(file.clone(), serde_json::Value::Array(commits));
                }
                Err(e) => {
                    // One unreadable file does not fail the whole lookup
                    debug!(file = %file, error = %e, "git log failed for file");
                    history.insert(
                        file.clone(),
                        serde_json::json!({ "error": e.to_string() }),
                    );
                }
            }
        }

        let duration = start.elapsed().as_millis() as u64;
        debug!(
            files = task.scope.len(),
            total_commits,
            duration_ms = duration,
            "Git history lookup completed"
        );

        Ok(RetrievalOutput::success(
            serde_json::json!({
                "total_commits": total_commits,
                "history": serde_json::Value::Object(history),
            }),
            duration,
        ))
    }
}

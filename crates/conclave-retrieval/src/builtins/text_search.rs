//! Text search retriever - substring search over the working tree

use crate::error::Result;
use crate::registry::{
    RetrievalKind, RetrievalOutput, RetrievalTask, Retriever, RetrieverDefinition,
};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::debug;

/// Maximum number of matches returned per task
const MAX_MATCHES: usize = 50;

/// Maximum file size scanned, in bytes
const MAX_FILE_BYTES: u64 = 1024 * 1024;

/// Searches files under a working directory for a query string.
///
/// When the task carries a scope, only those paths (relative to the working
/// directory) are scanned; otherwise the whole tree is walked, skipping
/// hidden directories and `target/`.
pub struct TextSearchRetriever {
    definition: RetrieverDefinition,
    workdir: PathBuf,
}

impl TextSearchRetriever {
    /// Create a retriever rooted at `workdir`
    #[must_use]
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            definition: RetrieverDefinition::new(
                RetrievalKind::TextSearch,
                "Substring search over the working tree",
            ),
            workdir: workdir.into(),
        }
    }

    fn candidate_files(&self, scope: &[String]) -> Vec<PathBuf> {
        if !scope.is_empty() {
            return scope.iter().map(|s| self.workdir.join(s)).collect();
        }

        let mut files = Vec::new();
        let mut stack = vec![self.workdir.clone()];
        while let Some(dir) = stack.pop() {
            let Ok(entries) = std::fs::read_dir(&dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                let name = entry.file_name();
                let name = name.to_string_lossy();
                if name.starts_with('.') || name == "target" {
                    continue;
                }
                if path.is_dir() {
                    stack.push(path);
                } else {
                    files.push(path);
                }
            }
        }
        files.sort();
        files
    }

    async fn search_file(
        path: &Path,
        query: &str,
        matches: &mut Vec<serde_json::Value>,
    ) -> Result<()> {
        let meta = tokio::fs::metadata(path).await?;
        if !meta.is_file() || meta.len() > MAX_FILE_BYTES {
            return Ok(());
        }
        let Ok(content) = tokio::fs::read_to_string(path).await else {
            // Binary or non-UTF8 file, skip
            return Ok(());
        };
        for (idx, line) in content.lines().enumerate() {
            if matches.len() >= MAX_MATCHES {
                break;
            }
            if line.contains(query) {
                matches.push(serde_json::json!({
                    "file": path.display().to_string(),
                    "line": idx + 1,
                    "content": line.trim_end(),
                }));
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Retriever for TextSearchRetriever {
    fn definition(&self) -> &RetrieverDefinition {
        &self.definition
    }

    async fn retrieve(&self, task: &RetrievalTask) -> Result<RetrievalOutput> {
        let start = Instant::now();

        if task.query.is_empty() {
            return Ok(RetrievalOutput::failure(
                "text search requires a query",
                start.elapsed().as_millis() as u64,
            ));
        }

        let mut matches = Vec::new();
        for path in self.candidate_files(&task.scope) {
            if matches.len() >= MAX_MATCHES {
                break;
            }
            Self::search_file(&path, &task.query, &mut matches).await?;
        }

        let duration = start.elapsed().as_millis() as u64;
        debug!(
            query = %task.query,
            matches = matches.len(),
            duration_ms = duration,
            "Text search completed"
        );

        Ok(RetrievalOutput::success(
            serde_json::json!({
                "query": task.query,
                "total_matches": matches.len(),
                "truncated": matches.len() >= MAX_MATCHES,
                "matches": matches,
            }),
            duration,
        ))
    }
}

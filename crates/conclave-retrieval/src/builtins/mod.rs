//! Built-in retrievers
//!
//! Local retrievers that need no external services: text search over the
//! working tree and git history via the `git` CLI. Symbol and coverage
//! lookups are expected to come from external capabilities registered by
//! the embedding application.

mod git_history;
mod text_search;

pub use git_history::GitHistoryRetriever;
pub use text_search::TextSearchRetriever;

use crate::registry::RetrieverRegistry;
use std::path::PathBuf;
use std::sync::Arc;

/// Register all built-in retrievers rooted at `workdir`
pub fn register_builtins(registry: &mut RetrieverRegistry, workdir: impl Into<PathBuf>) {
    let workdir = workdir.into();
    registry.register(Arc::new(TextSearchRetriever::new(workdir.clone())));
    registry.register(Arc::new(GitHistoryRetriever::new(workdir)));
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Placeholder resolution for prompt templates
//!
//! Tokens are `{name}` (required) and `{!name}` (optional). Resolution
//! order per name: static builtins, context builtins (backed by tracking
//! state), then the configured source maps. File reads are mtime-cached
//! and all placeholders in one prompt resolve in parallel.

use cm_manifest::{PlaceholderConfig, PlaceholderSource};
use parking_lot::Mutex;
use regex::Regex;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use std::time::SystemTime;
use thiserror::Error;

/// Exact token grammar. `{!name}` marks the placeholder optional.
// Allow expect here as the regex is compile-time verified to be valid
#[allow(clippy::expect_used)]
static TOKEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{(!)?([A-Za-z_][A-Za-z0-9_]*)\}").expect("constant regex pattern is valid")
});

/// A required placeholder could not be resolved.
#[derive(Debug, Error)]
#[error("placeholder '{{{name}}}' could not be resolved (expected at {path})")]
pub struct PlaceholderError {
    pub name: String,
    pub path: String,
}

/// Access to context builtins (`project_name`, `selected_track`,
/// `selected_conditions`). Implemented by the step-index manager.
pub trait ContextLookup: Send + Sync {
    fn context_value(&self, name: &str) -> Option<String>;
}

impl ContextLookup for cm_storage::StepIndexManager {
    fn context_value(&self, name: &str) -> Option<String> {
        cm_storage::StepIndexManager::context_value(self, name)
    }
}

/// No context available (tests, detached prompt processing).
pub struct NoContext;

impl ContextLookup for NoContext {
    fn context_value(&self, _name: &str) -> Option<String> {
        None
    }
}

const CONTEXT_NAMES: &[&str] = &["project_name", "selected_track", "selected_conditions"];

#[derive(Clone)]
struct CacheEntry {
    mtime: SystemTime,
    content: String,
}

/// Bounded FIFO cache of file contents keyed by absolute path.
struct FileCache {
    entries: HashMap<PathBuf, CacheEntry>,
    order: VecDeque<PathBuf>,
    capacity: usize,
}

impl FileCache {
    fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    fn get(&mut self, path: &Path, mtime: SystemTime) -> Option<String> {
        match self.entries.get(path) {
            Some(entry) if entry.mtime == mtime => Some(entry.content.clone()),
            Some(_) => {
                // Stale: the file changed underneath us.
                self.entries.remove(path);
                self.order.retain(|p| p != path);
                None
            }
            None => None,
        }
    }

    fn insert(&mut self, path: PathBuf, mtime: SystemTime, content: String) {
        if self.entries.contains_key(&path) {
            self.order.retain(|p| p != &path);
        } else if self.entries.len() >= self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.entries.remove(&evicted);
            }
        }
        self.order.push_back(path.clone());
        self.entries.insert(path, CacheEntry { mtime, content });
    }
}

/// How one name resolved.
#[derive(Debug, Clone, PartialEq)]
enum Resolution {
    Value(String),
    /// In config but the file is missing.
    Missing { path: String },
    /// Not a builtin and not in config: the token stays untouched.
    NotInConfig,
}

/// Resolves `{name}` / `{!name}` tokens against builtins and configured
/// source files. Behavior is identical for prompts loaded from files and
/// already-loaded strings.
pub struct PlaceholderProcessor {
    config: PlaceholderConfig,
    /// Base for `user_dir` sources (the project working dir).
    user_base: PathBuf,
    /// Base for `package_dir` sources (the install dir).
    package_base: PathBuf,
    context: Arc<dyn ContextLookup>,
    cache: Mutex<FileCache>,
}

impl PlaceholderProcessor {
    pub fn new(
        config: PlaceholderConfig,
        user_base: impl Into<PathBuf>,
        package_base: impl Into<PathBuf>,
        context: Arc<dyn ContextLookup>,
    ) -> Self {
        Self {
            config,
            user_base: user_base.into(),
            package_base: package_base.into(),
            context,
            cache: Mutex::new(FileCache::new(100)),
        }
    }

    /// Substitute every resolvable token in `prompt`.
    ///
    /// Required-and-found and builtins substitute their content; optional
    /// missing substitutes the empty string; names absent from config stay
    /// untouched. The first required-and-missing name fails the whole call.
    pub async fn process(&self, prompt: &str) -> Result<String, PlaceholderError> {
        let mut names: Vec<String> = Vec::new();
        for capture in TOKEN_PATTERN.captures_iter(prompt) {
            let name = capture[2].to_string();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        if names.is_empty() {
            return Ok(prompt.to_string());
        }

        // Every unique name resolves concurrently; file reads go through
        // the shared mtime-validated cache.
        let resolutions =
            futures::future::join_all(names.iter().map(|name| self.resolve(name))).await;
        let resolved: HashMap<&str, Resolution> = names
            .iter()
            .map(String::as_str)
            .zip(resolutions)
            .collect();

        let mut failure: Option<PlaceholderError> = None;
        let output = TOKEN_PATTERN.replace_all(prompt, |caps: &regex::Captures| {
            let optional = caps.get(1).is_some();
            let name = &caps[2];
            match resolved.get(name) {
                Some(Resolution::Value(content)) => content.clone(),
                Some(Resolution::Missing { path }) => {
                    if optional {
                        String::new()
                    } else {
                        if failure.is_none() {
                            failure = Some(PlaceholderError {
                                name: name.to_string(),
                                path: path.clone(),
                            });
                        }
                        caps[0].to_string()
                    }
                }
                Some(Resolution::NotInConfig) | None => caps[0].to_string(),
            }
        });

        match failure {
            Some(error) => Err(error),
            None => Ok(output.into_owned()),
        }
    }

    async fn resolve(&self, name: &str) -> Resolution {
        if let Some(value) = static_builtin(name) {
            return Resolution::Value(value);
        }
        if CONTEXT_NAMES.contains(&name) {
            return match self.context.context_value(name) {
                Some(value) => Resolution::Value(value),
                None => Resolution::Value(String::new()),
            };
        }
        let Some(source) = self.config.lookup(name) else {
            return Resolution::NotInConfig;
        };
        let (base, relative) = match source {
            PlaceholderSource::UserDir(path) => (&self.user_base, path),
            PlaceholderSource::PackageDir(path) => (&self.package_base, path),
        };
        let Some(path) = self.resolve_path(base, relative) else {
            return Resolution::Missing {
                path: base.join(relative).display().to_string(),
            };
        };
        match self.read_cached(&path).await {
            Some(content) => Resolution::Value(content),
            None => Resolution::Missing {
                path: path.display().to_string(),
            },
        }
    }

    /// A `*` in the relative path globs; the newest match by mtime wins.
    /// This is the only place the engine discovers input files by pattern.
    fn resolve_path(&self, base: &Path, relative: &str) -> Option<PathBuf> {
        if !relative.contains('*') {
            let path = base.join(relative);
            return path.exists().then_some(path);
        }
        let pattern = base.join(relative);
        let matches = glob::glob(&pattern.to_string_lossy()).ok()?;
        matches
            .flatten()
            .filter_map(|path| {
                let mtime = std::fs::metadata(&path).ok()?.modified().ok()?;
                Some((path, mtime))
            })
            .max_by_key(|(_, mtime)| *mtime)
            .map(|(path, _)| path)
    }

    async fn read_cached(&self, path: &Path) -> Option<String> {
        let mtime = tokio::fs::metadata(path).await.ok()?.modified().ok()?;
        if let Some(content) = self.cache.lock().get(path, mtime) {
            return Some(content);
        }
        let content = tokio::fs::read_to_string(path).await.ok()?;
        self.cache
            .lock()
            .insert(path.to_path_buf(), mtime, content.clone());
        Some(content)
    }
}

fn static_builtin(name: &str) -> Option<String> {
    match name {
        "date" => Some(chrono::Local::now().format("%Y-%m-%d").to_string()),
        "datetime" => Some(chrono::Local::now().to_rfc3339()),
        "timestamp" => Some(chrono::Utc::now().timestamp_millis().to_string()),
        "user_name" => Some(
            std::env::var("USER")
                .or_else(|_| std::env::var("USERNAME"))
                .unwrap_or_else(|_| "unknown".to_string()),
        ),
        _ => None,
    }
}

#[cfg(test)]
#[path = "placeholder_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-agent append-only log files
//!
//! One file per monitoring id, single writer, many readers. The logger owns
//! only file paths, not agent identity, so it survives the monitor being
//! cleared.

use cm_core::MonitoringId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Append-only log store under `.codemachine/logs/`.
pub struct AgentLogger {
    dir: PathBuf,
    paths: Mutex<HashMap<MonitoringId, PathBuf>>,
}

impl AgentLogger {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            paths: Mutex::new(HashMap::new()),
        }
    }

    /// Create the log file for a monitoring id and register its path.
    ///
    /// File name: `agent-{id}-{name}-{YYYY-MM-DDTHH-MM-SS}.log`.
    pub fn open(&self, id: MonitoringId, agent_name: &str) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let stamp = chrono::Local::now().format("%Y-%m-%dT%H-%M-%S");
        let path = self
            .dir
            .join(format!("agent-{}-{}-{}.log", id, slug(agent_name), stamp));
        std::fs::File::create(&path)?;
        self.paths.lock().insert(id, path.clone());
        Ok(path)
    }

    /// Register an existing log file (resume after restart).
    pub fn attach(&self, id: MonitoringId, path: impl Into<PathBuf>) {
        self.paths.lock().insert(id, path.into());
    }

    pub fn path(&self, id: MonitoringId) -> Option<PathBuf> {
        self.paths.lock().get(&id).cloned()
    }

    /// Write the originally-sent prompt into the log header so a UI can
    /// show the initiating instruction.
    pub fn store_full_prompt(&self, id: MonitoringId, prompt: &str) -> std::io::Result<()> {
        self.append(id, &format!("=== prompt ===\n{}\n=== output ===", prompt.trim_end()))
    }

    /// Append one chunk. Chunks for one id arrive from a single stream
    /// callback, so append order equals stream order.
    pub fn write(&self, id: MonitoringId, text: &str) -> std::io::Result<()> {
        self.append(id, text)
    }

    fn append(&self, id: MonitoringId, text: &str) -> std::io::Result<()> {
        let Some(path) = self.path(id) else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no log registered for monitoring id {id}"),
            ));
        };
        let mut file = std::fs::OpenOptions::new().append(true).open(&path)?;
        file.write_all(text.as_bytes())?;
        file.write_all(b"\n")
    }

    /// Read a snapshot from `from_byte`, up to `limit` bytes when given.
    /// Returns the chunk and the next offset to read from.
    pub fn read(
        &self,
        id: MonitoringId,
        from_byte: u64,
        limit: Option<usize>,
    ) -> std::io::Result<(String, u64)> {
        let Some(path) = self.path(id) else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no log registered for monitoring id {id}"),
            ));
        };
        read_from(&path, from_byte, limit)
    }
}

fn read_from(path: &Path, from_byte: u64, limit: Option<usize>) -> std::io::Result<(String, u64)> {
    let mut file = std::fs::File::open(path)?;
    let len = file.metadata()?.len();
    let start = from_byte.min(len);
    file.seek(SeekFrom::Start(start))?;
    let mut buf = Vec::new();
    match limit {
        Some(limit) => {
            let mut handle = file.take(limit as u64);
            handle.read_to_end(&mut buf)?;
        }
        None => {
            file.read_to_end(&mut buf)?;
        }
    }
    let next = start + buf.len() as u64;
    Ok((String::from_utf8_lossy(&buf).into_owned(), next))
}

/// File-name-safe slug of an agent name.
fn slug(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' => c,
            _ => '-',
        })
        .collect();
    sanitized
        .split('-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
#[path = "agent_log_tests.rs"]
mod tests;

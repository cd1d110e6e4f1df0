// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Directive evaluation
//!
//! After a step's engine run returns, the evaluator looks for a sidecar
//! `directive.json` in the working dir, and if absent, the last fenced
//! JSON block in the agent's final output. Parse errors degrade to "no
//! directive" (the engine treats that as continue) with a debug log; the
//! sidecar file is deleted once consumed.

use cm_core::Directive;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

// Allow expect here as the regex is compile-time verified to be valid
#[allow(clippy::expect_used)]
static FENCED_JSON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("constant regex pattern is valid")
});

/// Read and consume the step's directive, file first, then trailing block.
pub fn read_directive(working_dir: &Path, output: &str) -> Option<Directive> {
    let sidecar = working_dir.join("directive.json");
    if sidecar.exists() {
        let content = std::fs::read_to_string(&sidecar);
        // Consume the file regardless of parse outcome; it is single-use.
        if let Err(error) = std::fs::remove_file(&sidecar) {
            tracing::warn!(%error, "failed to delete consumed directive.json");
        }
        return match content {
            Ok(content) => parse_payload(&content),
            Err(error) => {
                tracing::debug!(%error, "directive.json unreadable, treating as continue");
                None
            }
        };
    }
    trailing_directive(output)
}

/// The directive carried by the last fenced JSON block of `text`, if any.
pub fn trailing_directive(text: &str) -> Option<Directive> {
    let block = FENCED_JSON
        .captures_iter(text)
        .last()
        .and_then(|caps| caps.get(1))?;
    parse_payload(block.as_str())
}

/// `text` with a trailing directive block removed (used when the
/// controller's reply doubles as the next instruction).
pub fn strip_trailing_block(text: &str) -> String {
    let Some(last) = FENCED_JSON.find_iter(text).last() else {
        return text.to_string();
    };
    if text[last.end()..].trim().is_empty() {
        text[..last.start()].trim_end().to_string()
    } else {
        text.to_string()
    }
}

fn parse_payload(content: &str) -> Option<Directive> {
    let value: serde_json::Value = match serde_json::from_str(content) {
        Ok(value) => value,
        Err(error) => {
            tracing::debug!(%error, "directive payload is not JSON, treating as continue");
            return None;
        }
    };
    let directive = Directive::from_payload(&value);
    if directive.is_none() {
        tracing::debug!(payload = %value, "directive payload has no usable action");
    }
    if matches!(directive, Some(Directive::Continue)) {
        tracing::debug!(payload = %value, "directive resolved to continue");
    }
    directive
}

#[cfg(test)]
#[path = "directive_eval_tests.rs"]
mod tests;

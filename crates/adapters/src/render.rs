// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rendering of engine stream records into human-readable log lines

use std::io::IsTerminal;

pub mod codes {
    /// Tool invocations: pastel cyan / steel blue
    pub const TOOL: u8 = 74;
    /// Successful results: green
    pub const OK: u8 = 71;
    /// Errors: red
    pub const ERR: u8 = 167;
    /// Thinking / reasoning: medium grey
    pub const THINKING: u8 = 245;
    /// Status and summaries: darker grey
    pub const MUTED: u8 = 240;
}

/// Determine if color output should be enabled.
///
/// Priority: `NO_COLOR=1` disables → `COLOR=1` forces → TTY check.
pub fn should_colorize() -> bool {
    if std::env::var("NO_COLOR").is_ok_and(|v| v == "1") {
        return false;
    }
    if std::env::var("COLOR").is_ok_and(|v| v == "1") {
        return true;
    }
    std::io::stdout().is_terminal()
}

fn fg256(code: u8) -> String {
    format!("\x1b[38;5;{code}m")
}

const RESET: &str = "\x1b[0m";

fn paint(code: u8, text: &str, colorize: bool) -> String {
    if colorize {
        format!("{}{}{}", fg256(code), text, RESET)
    } else {
        text.to_string()
    }
}

/// Stateless line renderer; one per adapter run so color choice is stable.
#[derive(Debug, Clone, Copy)]
pub struct LineRenderer {
    colorize: bool,
}

impl Default for LineRenderer {
    fn default() -> Self {
        Self {
            colorize: should_colorize(),
        }
    }
}

impl LineRenderer {
    pub fn plain() -> Self {
        Self { colorize: false }
    }

    /// `⏺ ToolName(args…)` — a tool invocation starting.
    pub fn tool_start(&self, name: &str, detail: &str) -> String {
        if detail.is_empty() {
            paint(codes::TOOL, &format!("⏺ {name}"), self.colorize)
        } else {
            paint(codes::TOOL, &format!("⏺ {name}({detail})"), self.colorize)
        }
    }

    /// `  ⎿ result…` — a tool finishing cleanly.
    pub fn tool_ok(&self, detail: &str) -> String {
        paint(codes::OK, &format!("  ⎿ {detail}"), self.colorize)
    }

    /// `  ⎿ error…` — a tool failing.
    pub fn tool_err(&self, detail: &str) -> String {
        paint(codes::ERR, &format!("  ⎿ {detail}"), self.colorize)
    }

    /// `✳ thinking…` — reasoning summaries.
    pub fn thinking(&self, text: &str) -> String {
        paint(codes::THINKING, &format!("✳ {text}"), self.colorize)
    }

    /// Dim status line (session start, model switches).
    pub fn status(&self, text: &str) -> String {
        paint(codes::MUTED, text, self.colorize)
    }

    /// End-of-run summary (tokens, cost, duration).
    pub fn summary(&self, text: &str) -> String {
        paint(codes::MUTED, &format!("∑ {text}"), self.colorize)
    }
}

/// Truncate a detail string for display, keeping it one line.
pub fn brief(text: &str, max: usize) -> String {
    let one_line = text.replace('\n', " ");
    if one_line.len() <= max {
        one_line
    } else {
        let mut cut = max;
        while !one_line.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}…", &one_line[..cut])
    }
}

#[cfg(test)]
#[path = "render_tests.rs"]
mod tests;

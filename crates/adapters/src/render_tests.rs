// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn plain_renderer_emits_no_escape_codes() {
    let renderer = LineRenderer::plain();
    assert_eq!(renderer.tool_start("Read", "src/main.rs"), "⏺ Read(src/main.rs)");
    assert_eq!(renderer.tool_ok("12 lines"), "  ⎿ 12 lines");
    assert_eq!(renderer.tool_err("no such file"), "  ⎿ no such file");
    assert_eq!(renderer.thinking("planning"), "✳ planning");
    assert_eq!(renderer.summary("1.2k tokens"), "∑ 1.2k tokens");
}

#[test]
fn tool_start_without_detail_omits_parens() {
    let renderer = LineRenderer::plain();
    assert_eq!(renderer.tool_start("TodoWrite", ""), "⏺ TodoWrite");
}

#[yare::parameterized(
    short = { "hello", 10, "hello" },
    exact = { "0123456789", 10, "0123456789" },
    long = { "0123456789abc", 10, "0123456789…" },
)]
fn brief_truncates(input: &str, max: usize, expected: &str) {
    assert_eq!(brief(input, max), expected);
}

#[test]
fn brief_flattens_newlines() {
    assert_eq!(brief("a\nb", 10), "a b");
}

#[test]
fn brief_respects_char_boundaries() {
    // multi-byte char straddling the cut point must not panic
    let s = "ééééééé";
    let out = brief(s, 3);
    assert!(out.ends_with('…'));
}

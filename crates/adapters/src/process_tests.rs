// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::abort::AbortHandle;
use std::time::Duration;

mod normalizer {
    use super::*;

    #[test]
    fn buffers_partial_lines_across_chunks() {
        let mut normalizer = LineNormalizer::new();
        assert!(normalizer.push(b"hel").is_empty());
        assert_eq!(normalizer.push(b"lo\nwor"), vec!["hello"]);
        assert_eq!(normalizer.push(b"ld\n"), vec!["world"]);
        assert!(normalizer.finish().is_empty());
    }

    #[test]
    fn crlf_is_a_plain_newline() {
        let mut normalizer = LineNormalizer::new();
        assert_eq!(normalizer.push(b"one\r\ntwo\r\n"), vec!["one", "two"]);
    }

    #[test]
    fn cr_rewrites_fold_to_final_form() {
        let mut normalizer = LineNormalizer::new();
        assert_eq!(
            normalizer.push(b"progress 10%\rprogress 60%\rdone\n"),
            vec!["done"]
        );
    }

    #[test]
    fn cr_split_across_chunks_still_folds() {
        let mut normalizer = LineNormalizer::new();
        assert!(normalizer.push(b"loading\r").is_empty());
        assert_eq!(normalizer.push(b"ready\n"), vec!["ready"]);
    }

    #[test]
    fn cr_at_chunk_end_then_newline_is_one_line() {
        let mut normalizer = LineNormalizer::new();
        assert!(normalizer.push(b"line\r").is_empty());
        assert_eq!(normalizer.push(b"\nnext\n"), vec!["line", "next"]);
    }

    #[test]
    fn trailing_cr_flushes_as_line() {
        let mut normalizer = LineNormalizer::new();
        assert!(normalizer.push(b"tail\r").is_empty());
        assert_eq!(normalizer.finish(), vec!["tail"]);
    }

    #[test]
    fn runs_of_newlines_collapse_to_two() {
        let mut normalizer = LineNormalizer::new();
        // a \n\n\n\n b  →  a, one blank, b
        assert_eq!(normalizer.push(b"a\n\n\n\nb\n"), vec!["a", "", "b"]);
    }

    #[test]
    fn double_newline_is_preserved() {
        let mut normalizer = LineNormalizer::new();
        assert_eq!(normalizer.push(b"a\n\nb\n"), vec!["a", "", "b"]);
    }

    #[test]
    fn invalid_utf8_is_replaced_not_dropped() {
        let mut normalizer = LineNormalizer::new();
        let lines = normalizer.push(b"ok \xff\xfe bytes\n");
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("ok "));
    }
}

#[tokio::test]
async fn captures_stdout_and_exit_code() {
    let mut spec = SpawnSpec::new("sh");
    spec.args = vec!["-c".into(), "echo out; echo err >&2; exit 3".into()];
    let mut seen = Vec::new();
    let output = run(
        spec,
        |line| seen.push(line.to_string()),
        |_| {},
        &AbortSignal::never(),
    )
    .await
    .unwrap();
    assert_eq!(output.exit_code, 3);
    assert_eq!(output.stdout, "out\n");
    assert_eq!(output.stderr, "err\n");
    assert_eq!(seen, vec!["out"]);
}

#[tokio::test]
async fn stdin_is_piped_and_closed() {
    let mut spec = SpawnSpec::new("cat");
    spec.stdin = Some("from stdin\n".to_string());
    let output = run(spec, |_| {}, |_| {}, &AbortSignal::never())
        .await
        .unwrap();
    assert_eq!(output.exit_code, 0);
    assert_eq!(output.stdout, "from stdin\n");
}

#[tokio::test]
async fn missing_binary_reports_install_hint() {
    let mut spec = SpawnSpec::new("definitely-not-a-real-binary-xyz");
    spec.install_hint = Some("Install it with: npm install -g xyz".to_string());
    let err = run(spec, |_| {}, |_| {}, &AbortSignal::never())
        .await
        .unwrap_err();
    match err {
        SupervisorError::BinaryNotFound { hint, .. } => {
            assert!(hint.contains("npm install"));
        }
        other => panic!("expected BinaryNotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn timeout_terminates_the_child() {
    let mut spec = SpawnSpec::new("sleep");
    spec.args = vec!["30".into()];
    spec.timeout = Duration::from_millis(100);
    let err = run(spec, |_| {}, |_| {}, &AbortSignal::never())
        .await
        .unwrap_err();
    assert!(matches!(err, SupervisorError::Timeout(_)));
}

#[tokio::test]
async fn abort_terminates_the_child() {
    let handle = AbortHandle::new();
    let signal = handle.signal();
    let mut spec = SpawnSpec::new("sleep");
    spec.args = vec!["30".into()];
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.abort();
    });
    let err = run(spec, |_| {}, |_| {}, &signal).await.unwrap_err();
    assert!(matches!(err, SupervisorError::Aborted));
}

#[tokio::test]
async fn stream_order_matches_emission_order() {
    let mut spec = SpawnSpec::new("sh");
    spec.args = vec!["-c".into(), "for i in 1 2 3 4 5; do echo $i; done".into()];
    let mut seen = Vec::new();
    run(
        spec,
        |line| seen.push(line.to_string()),
        |_| {},
        &AbortSignal::never(),
    )
    .await
    .unwrap();
    assert_eq!(seen, vec!["1", "2", "3", "4", "5"]);
}

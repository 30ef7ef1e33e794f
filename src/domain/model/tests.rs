// Unit tests for domain models

use super::*;
use std::time::Duration;

#[test]
fn test_cancel_token_starts_clear() {
    let token = CancelToken::new();
    assert!(!token.is_cancelled());
}

#[test]
fn test_cancel_token_sets_once() {
    let token = CancelToken::new();
    assert!(token.cancel());
    assert!(!token.cancel());
    assert!(token.is_cancelled());
}

#[test]
fn test_cancel_token_clones_share_flag() {
    let token = CancelToken::new();
    let reader = token.clone();
    token.cancel();
    assert!(reader.is_cancelled());
}

#[test]
fn test_fresh_tokens_do_not_inherit_cancellation() {
    let first = CancelToken::new();
    first.cancel();
    let second = CancelToken::new();
    assert!(!second.is_cancelled());
}

#[tokio::test]
async fn test_cancelled_resolves_when_set_from_another_thread() {
    let token = CancelToken::new();
    let writer = token.clone();
    std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(50));
        writer.cancel();
    });

    tokio::time::timeout(Duration::from_secs(2), token.cancelled())
        .await
        .expect("cancelled() should resolve");
}

#[tokio::test]
async fn test_cancelled_resolves_immediately_when_already_set() {
    let token = CancelToken::new();
    token.cancel();
    tokio::time::timeout(Duration::from_millis(100), token.cancelled())
        .await
        .expect("already-cancelled token should resolve at once");
}

#[test]
fn test_stat_snapshot_defaults() {
    let stats = StatSnapshot::default();
    assert_eq!(stats.time, "00:00:00");
    assert_eq!(stats.size, "0kB");
    assert_eq!(stats.bitrate, "0kbits/s");
    assert_eq!(stats.speed, "0x");
    assert_eq!(stats.fps, "0");
    assert_eq!(stats.drop, "0");
    assert_eq!(stats.dup, "0");
}

#[test]
fn test_shared_stats_update_is_visible_to_clones() {
    let stats = SharedStats::new();
    let reader = stats.clone();
    stats.update(|s| s.fps = "25".to_string());
    assert_eq!(reader.snapshot().fps, "25");
}

#[test]
fn test_operation_result_exit_codes() {
    let completed = OperationResult::Completed {
        output: PathBuf::from("out.mp4"),
        size: 10,
    };
    let failed = OperationResult::Failed {
        reason: "boom".to_string(),
        exit_code: Some(1),
    };
    assert_eq!(completed.exit_code(), 0);
    assert_eq!(failed.exit_code(), 1);
    assert_eq!(OperationResult::Cancelled.exit_code(), 130);
    assert!(OperationResult::Cancelled.is_cancelled());
    assert!(!failed.is_cancelled());
}

#[test]
fn test_failed_keeps_exit_code() {
    let err = SupervisorError::ProcessExit {
        code: 2,
        detail: String::new(),
    };
    match OperationResult::failed(&err) {
        OperationResult::Failed { reason, exit_code } => {
            assert_eq!(exit_code, Some(2));
            assert!(reason.contains('2'));
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[test]
fn test_from_output_reads_size() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clip.mp4");
    std::fs::write(&path, b"12345").unwrap();

    assert_eq!(
        OperationResult::from_output(&path),
        OperationResult::Completed {
            output: path,
            size: 5
        }
    );
}

#[test]
fn test_from_output_without_file_is_failure() {
    let dir = tempfile::tempdir().unwrap();
    let absent = dir.path().join("never-written.mp4");
    let empty = dir.path().join("empty.mp4");
    std::fs::write(&empty, b"").unwrap();

    for path in [&absent, &empty, &dir.path().to_path_buf()] {
        match OperationResult::from_output(path) {
            OperationResult::Failed { reason, exit_code } => {
                assert!(reason.contains("missing"), "reason: {}", reason);
                assert_eq!(exit_code, None);
            }
            other => panic!("unexpected outcome for {}: {:?}", path.display(), other),
        }
    }
}

#[test]
fn test_operation_result_serializes_with_status_tag() {
    let json = serde_json::to_value(OperationResult::Cancelled).unwrap();
    assert_eq!(json["status"], "cancelled");
}

#[test]
fn test_process_spec_from_argv() {
    let spec = ProcessSpec::from_argv(
        "Encode",
        vec!["ffmpeg".to_string(), "-i".to_string(), "in.mov".to_string()],
        "out.mp4",
    )
    .unwrap();
    assert_eq!(spec.program, "ffmpeg");
    assert_eq!(spec.args, vec!["-i", "in.mov"]);
    assert_eq!(spec.output, PathBuf::from("out.mp4"));
}

#[test]
fn test_process_spec_rejects_empty_argv() {
    assert!(matches!(
        ProcessSpec::from_argv("Encode", Vec::new(), "out.mp4"),
        Err(SupervisorError::EmptyCommand)
    ));
    assert!(ProcessSpec::from_argv("Encode", vec!["  ".to_string()], "out.mp4").is_err());
}

#[test]
fn test_work_kind_label() {
    let work = WorkKind::Opaque(OpaqueCall::new("Split", || Ok(PathBuf::from("a"))));
    assert_eq!(work.label(), "Split");
}

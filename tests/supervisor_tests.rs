//! Integration tests for the operation supervisor

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tempfile::TempDir;
use vidsup::engine::{NoopKeyInput, StatusSink};
use vidsup::{
    KeyInput, OpaqueCall, OperationPort, OperationResult, OperationSupervisor, SupervisorConfig,
    SupervisorResult, WorkKind,
};

// Test utilities

/// Presses the cancel key once, some time after the first raw-mode session starts
struct DelayedKeyPress {
    delay: Duration,
    pressed_at: Mutex<Option<Instant>>,
    sessions: AtomicUsize,
    pressed: AtomicBool,
    raw: AtomicBool,
}

impl DelayedKeyPress {
    fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            pressed_at: Mutex::new(None),
            sessions: AtomicUsize::new(0),
            pressed: AtomicBool::new(false),
            raw: AtomicBool::new(false),
        })
    }
}

impl KeyInput for DelayedKeyPress {
    fn name(&self) -> &'static str {
        "delayed"
    }

    fn enter_raw_mode(&self) -> SupervisorResult<()> {
        if self.sessions.fetch_add(1, Ordering::SeqCst) == 0 {
            *self.pressed_at.lock().unwrap() = Some(Instant::now() + self.delay);
        }
        self.raw.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn read_key(&self, timeout: Duration) -> SupervisorResult<Option<char>> {
        let due = *self.pressed_at.lock().unwrap();
        if let Some(due) = due {
            if Instant::now() >= due && !self.pressed.swap(true, Ordering::SeqCst) {
                return Ok(Some('q'));
            }
        }
        std::thread::sleep(timeout.min(Duration::from_millis(10)));
        Ok(None)
    }

    fn restore_mode(&self) -> SupervisorResult<()> {
        self.raw.store(false, Ordering::SeqCst);
        Ok(())
    }
}

fn buffer_sink() -> (Arc<Mutex<Vec<u8>>>, StatusSink) {
    let buffer = Arc::new(Mutex::new(Vec::new()));
    let sink: StatusSink = buffer.clone();
    (buffer, sink)
}

fn fast_config() -> SupervisorConfig {
    SupervisorConfig {
        repaint_interval_ms: 20,
        ..SupervisorConfig::default()
    }
}

fn quiet_supervisor() -> (OperationSupervisor, Arc<Mutex<Vec<u8>>>) {
    let (buffer, sink) = buffer_sink();
    (
        OperationSupervisor::with_io(fast_config(), Arc::new(NoopKeyInput), sink),
        buffer,
    )
}

#[tokio::test]
async fn test_opaque_call_success_completes_with_size() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("out.bin");
    let target = output.clone();
    let (supervisor, buffer) = quiet_supervisor();

    let call = OpaqueCall::new("Split", move || {
        std::thread::sleep(Duration::from_millis(100));
        std::fs::write(&target, b"0123456789")?;
        Ok(target)
    });
    let result = supervisor.run(WorkKind::Opaque(call)).await;

    assert_eq!(result, OperationResult::Completed { output, size: 10 });
    let painted = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
    assert!(painted.contains("Split"));
    assert!(painted.contains("Elapsed: 00:00"));
    assert!(painted.ends_with('\n'));
}

#[tokio::test]
async fn test_opaque_call_error_fails() {
    let (supervisor, _) = quiet_supervisor();

    let call = OpaqueCall::new("Merge", || -> anyhow::Result<PathBuf> {
        anyhow::bail!("codec not supported")
    });
    let result = supervisor.run(WorkKind::Opaque(call)).await;

    match result {
        OperationResult::Failed { reason, exit_code } => {
            assert!(reason.contains("codec not supported"), "reason: {}", reason);
            assert_eq!(exit_code, None);
        }
        other => panic!("expected failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_opaque_call_without_output_fails() {
    let dir = TempDir::new().unwrap();
    let claimed = dir.path().join("never-written.mp4");
    let returned = claimed.clone();
    let (supervisor, _) = quiet_supervisor();

    let call = OpaqueCall::new("Split", move || Ok(returned));
    let result = supervisor.run(WorkKind::Opaque(call)).await;

    match result {
        OperationResult::Failed { reason, exit_code } => {
            assert!(reason.contains("missing"), "reason: {}", reason);
            assert!(reason.contains("never-written.mp4"), "reason: {}", reason);
            assert_eq!(exit_code, None);
        }
        other => panic!("expected failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_opaque_call_panic_becomes_failure() {
    let (supervisor, _) = quiet_supervisor();

    let call = OpaqueCall::new("Merge", || -> anyhow::Result<PathBuf> { panic!("decoder exploded") });
    let result = supervisor.run(WorkKind::Opaque(call)).await;

    match result {
        OperationResult::Failed { reason, .. } => {
            assert!(reason.contains("decoder exploded"), "reason: {}", reason);
        }
        other => panic!("expected failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_opaque_cancellation_is_advisory() {
    let (_, sink) = buffer_sink();
    let keys = DelayedKeyPress::new(Duration::from_millis(200));
    let key_input: Arc<dyn KeyInput> = keys.clone();
    let supervisor = OperationSupervisor::with_io(fast_config(), key_input, sink);

    let finished = Arc::new(AtomicBool::new(false));
    let call_finished = Arc::clone(&finished);
    let call = OpaqueCall::new("Split", move || {
        std::thread::sleep(Duration::from_millis(1500));
        call_finished.store(true, Ordering::SeqCst);
        Ok(PathBuf::from("ignored"))
    });

    let started = Instant::now();
    let result = supervisor.run(WorkKind::Opaque(call)).await;

    assert_eq!(result, OperationResult::Cancelled);
    assert!(started.elapsed() < Duration::from_millis(1200), "took {:?}", started.elapsed());
    assert!(!keys.raw.load(Ordering::SeqCst));
    assert!(!finished.load(Ordering::SeqCst));

    // The call itself keeps running to completion in the background.
    tokio::time::sleep(Duration::from_millis(1800)).await;
    assert!(finished.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_each_operation_gets_a_fresh_token() {
    let (_, sink) = buffer_sink();
    let keys = DelayedKeyPress::new(Duration::from_millis(50));
    let key_input: Arc<dyn KeyInput> = keys.clone();
    let supervisor = OperationSupervisor::with_io(fast_config(), key_input, sink);

    let slow = OpaqueCall::new("First", || {
        std::thread::sleep(Duration::from_millis(800));
        Ok(PathBuf::from("first"))
    });
    assert!(supervisor.run(WorkKind::Opaque(slow)).await.is_cancelled());

    let dir = TempDir::new().unwrap();
    let output = dir.path().join("second.bin");
    let target = output.clone();
    let quick = OpaqueCall::new("Second", move || {
        std::fs::write(&target, b"ok")?;
        Ok(target)
    });
    let result = supervisor.run(WorkKind::Opaque(quick)).await;

    assert_eq!(result, OperationResult::Completed { output, size: 2 });
    assert_eq!(keys.sessions.load(Ordering::SeqCst), 2);
}

#[cfg(unix)]
mod process_flavor {
    use super::*;
    use vidsup::ProcessSpec;

    fn sh(script: &str, output: &std::path::Path) -> ProcessSpec {
        ProcessSpec::new("Encode", "sh", output)
            .arg("-c")
            .arg(script)
            .arg(output.display().to_string())
    }

    #[tokio::test]
    async fn test_process_completes_through_supervisor() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("out.mp4");
        let (supervisor, _) = quiet_supervisor();

        let result = supervisor
            .run(WorkKind::Process(sh("printf data > \"$0\"", &output)))
            .await;

        assert_eq!(result, OperationResult::Completed { output, size: 4 });
    }

    #[tokio::test]
    async fn test_cancel_key_terminates_process() {
        let dir = TempDir::new().unwrap();
        let (_, sink) = buffer_sink();
        let keys = DelayedKeyPress::new(Duration::from_millis(200));
        let key_input: Arc<dyn KeyInput> = keys.clone();
        let supervisor = OperationSupervisor::with_io(fast_config(), key_input, sink);

        let started = Instant::now();
        let result = supervisor
            .run(WorkKind::Process(sh("exec sleep 30", &dir.path().join("out.mp4"))))
            .await;

        assert_eq!(result, OperationResult::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(3), "took {:?}", started.elapsed());
        assert!(!keys.raw.load(Ordering::SeqCst));
    }
}

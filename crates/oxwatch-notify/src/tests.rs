use crate::{ActionExecutor, RecordingExecutor, ShellExecutor};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn wait_for(path: &std::path::Path) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if path.exists() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    false
}

#[test]
fn recording_keeps_commands_in_order() {
    let executor = RecordingExecutor::new();
    executor.execute("echo one").unwrap();
    executor.execute("echo two").unwrap();
    assert_eq!(executor.name(), "recording");
    assert_eq!(executor.commands(), ["echo one", "echo two"]);

    executor.clear();
    assert!(executor.commands().is_empty());
}

#[test]
fn recording_is_usable_behind_a_trait_object() {
    let recorder = Arc::new(RecordingExecutor::new());
    let executor: Arc<dyn ActionExecutor> = recorder.clone();
    executor.execute("logger high load").unwrap();
    assert_eq!(recorder.commands(), ["logger high load"]);
}

#[test]
fn shell_runs_the_command() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("escalated");
    let executor = ShellExecutor::new();
    assert_eq!(executor.name(), "shell");

    executor
        .execute(&format!("echo fired > '{}'", marker.display()))
        .unwrap();
    assert!(wait_for(&marker), "escalation command never ran");
}

#[test]
fn shell_does_not_wait_for_the_command() {
    let executor = ShellExecutor::new();
    let started = Instant::now();
    executor.execute("sleep 2").unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[test]
fn shell_failure_exit_is_not_an_error() {
    ShellExecutor::new().execute("exit 3").unwrap();
}

#[test]
fn missing_shell_is_an_error() {
    let executor = ShellExecutor::with_shell("/nonexistent/oxwatch-shell");
    let err = executor.execute("true").unwrap_err();
    assert!(err.to_string().contains("failed to spawn"));
}

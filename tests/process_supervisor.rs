// tests/process_supervisor.rs
//
// Drives the real supervisor against `demos/fake-build-tool.sh` run by `sh`.

mod common;
use crate::common::{fake_tool_script, init_tracing, shell_launch, with_timeout, write_script};

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use buildlane::errors::BuildlaneError;
use buildlane::output::OutputEvent;
use buildlane::process::{CommandProtocol, LaunchConfig, ProcessSupervisor, Supervisor};
use buildlane::types::Delivery;

type TestResult = Result<(), Box<dyn Error>>;

async fn started_supervisor(dir: &TempDir) -> Result<ProcessSupervisor, Box<dyn Error>> {
    let supervisor = ProcessSupervisor::new();
    let config = shell_launch(dir.path(), &fake_tool_script());
    supervisor.start(&config, true).await?;
    Ok(supervisor)
}

#[tokio::test]
async fn missing_launcher_is_a_launch_error() -> TestResult {
    init_tracing();
    let dir = TempDir::new()?;

    let supervisor = ProcessSupervisor::new();
    let config = shell_launch(dir.path(), &dir.path().join("no-such-launcher.jar"));

    match supervisor.launch(&config) {
        Err(BuildlaneError::LaunchError(msg)) => assert!(msg.contains("no-such-launcher.jar")),
        other => panic!("expected LaunchError, got {other:?}"),
    }
    assert!(!supervisor.is_alive());
    assert_eq!(supervisor.current_process(), None);
    Ok(())
}

#[tokio::test]
async fn missing_interpreter_is_a_launch_error() -> TestResult {
    let dir = TempDir::new()?;
    let config = LaunchConfig::new(
        dir.path().join("bin/java"),
        dir.path(),
        fake_tool_script(),
        vec![],
    )?;

    let result = ProcessSupervisor::new().launch(&config);
    assert!(matches!(result, Err(BuildlaneError::LaunchError(_))), "got {result:?}");
    Ok(())
}

#[test]
fn missing_working_directory_is_a_config_error() {
    let result = LaunchConfig::new("sh", "/definitely/not/here", fake_tool_script(), vec![]);
    assert!(matches!(result, Err(BuildlaneError::ConfigError(_))), "got {result:?}");
}

#[tokio::test]
async fn output_taken_before_release_includes_the_first_line() -> TestResult {
    init_tracing();
    let dir = TempDir::new()?;

    let supervisor = ProcessSupervisor::new();
    let token = supervisor.launch(&shell_launch(dir.path(), &fake_tool_script()))?;
    let mut output = supervisor
        .subscribe_to_output(Delivery::Primary)
        .expect("launched process has output");
    supervisor.finish_start(true).await?;

    let first = with_timeout(output.next_line()).await.unwrap_or_default();
    assert!(first.starts_with("[info] fake build tool starting"), "got {first:?}");
    assert_eq!(with_timeout(output.next_line()).await.as_deref(), Some(">"));

    assert_eq!(token.generation, 1);
    assert!(token.pid.is_some());
    assert_eq!(supervisor.current_process(), Some(token));

    supervisor.destroy();
    Ok(())
}

#[tokio::test]
async fn execute_reports_success_and_error_lines() -> TestResult {
    init_tracing();
    let dir = TempDir::new()?;
    let supervisor = started_supervisor(&dir).await?;

    assert!(with_timeout(supervisor.execute("compile")).await?);
    assert!(!with_timeout(supervisor.execute("fail compile")).await?);
    // An error in one action does not leak into the next.
    assert!(with_timeout(supervisor.execute("test")).await?);
    assert!(supervisor.is_alive());

    supervisor.destroy();
    Ok(())
}

#[tokio::test]
async fn error_in_a_burst_larger_than_the_buffer_still_fails_the_action() -> TestResult {
    init_tracing();
    let dir = TempDir::new()?;
    let script = write_script(
        dir.path(),
        "noisy-tool.sh",
        r#"echo ">"
while read a; do
  i=0
  while [ $i -lt 3000 ]; do
    i=$((i + 1))
    if [ "$a" = "broken" ] && [ $i -eq 1500 ]; then
      echo "[error] broken at line $i"
    else
      echo "[info] $a line $i"
    fi
  done
  echo ">"
done
"#,
    );

    let supervisor = ProcessSupervisor::with_output_capacity(16);
    supervisor.start(&shell_launch(dir.path(), &script), true).await?;
    let mut console = supervisor
        .subscribe_to_output(Delivery::Primary)
        .ok_or("no output to subscribe to")?;

    assert!(!with_timeout(supervisor.execute("broken")).await?);
    assert!(with_timeout(supervisor.execute("clean")).await?);

    // The idle console did lose lines; the verdicts above did not.
    assert!(
        matches!(with_timeout(console.recv()).await, Some(OutputEvent::Dropped(_))),
        "expected the idle console to have fallen behind"
    );

    supervisor.destroy();
    Ok(())
}

#[tokio::test]
async fn prompt_without_trailing_newline_is_recognised() -> TestResult {
    init_tracing();
    let dir = TempDir::new()?;
    let script = write_script(
        dir.path(),
        "inline-prompt-tool.sh",
        "printf '> '\nwhile read a; do\n  echo \"[info] $a\"\n  printf '> '\ndone\n",
    );
    // Long enough that a missed prompt trips the test timeout instead.
    let config = shell_launch(dir.path(), &script).with_protocol(
        CommandProtocol::default().with_startup_timeout(Duration::from_secs(60)),
    );

    let supervisor = ProcessSupervisor::new();
    let mut console = supervisor.launch(&config).map(|_| {
        supervisor
            .subscribe_to_output(Delivery::Primary)
            .expect("freshly launched process has output")
    })?;
    with_timeout(supervisor.finish_start(true)).await?;

    assert!(with_timeout(supervisor.execute("compile")).await?);
    assert!(with_timeout(supervisor.execute("test")).await?);

    assert_eq!(with_timeout(console.next_line()).await.as_deref(), Some("> "));
    assert_eq!(
        with_timeout(console.next_line()).await.as_deref(),
        Some("[info] compile")
    );
    assert_eq!(with_timeout(console.next_line()).await.as_deref(), Some("> "));

    supervisor.destroy();
    Ok(())
}

#[tokio::test]
async fn first_execute_waits_for_the_ready_prompt() -> TestResult {
    init_tracing();
    let dir = TempDir::new()?;

    let supervisor = ProcessSupervisor::new();
    supervisor.start(&shell_launch(dir.path(), &fake_tool_script()), false).await?;

    assert!(with_timeout(supervisor.execute("compile")).await?);
    supervisor.destroy();
    Ok(())
}

#[tokio::test]
async fn stderr_is_merged_into_the_output() -> TestResult {
    init_tracing();
    let dir = TempDir::new()?;
    let supervisor = started_supervisor(&dir).await?;

    let mut output = supervisor
        .subscribe_to_output(Delivery::Primary)
        .expect("live process has output");
    assert!(with_timeout(supervisor.execute("warn deprecated")).await?);

    // stdout and stderr are read independently, so the warning may arrive
    // before or after the prompt.
    let saw_warning = with_timeout(async {
        while let Some(line) = output.next_line().await {
            if line == "[warn] warn deprecated" {
                return true;
            }
        }
        false
    })
    .await;
    assert!(saw_warning);

    supervisor.destroy();
    Ok(())
}

#[tokio::test]
async fn destroy_is_idempotent() -> TestResult {
    init_tracing();
    let dir = TempDir::new()?;
    let supervisor = started_supervisor(&dir).await?;

    supervisor.destroy();
    supervisor.destroy();
    assert!(!supervisor.is_alive());
    assert_eq!(supervisor.current_process(), None);

    // Destroy on a supervisor that never launched is fine too.
    ProcessSupervisor::new().destroy();
    Ok(())
}

#[tokio::test]
async fn destroy_during_an_action_fails_that_action() -> TestResult {
    init_tracing();
    let dir = TempDir::new()?;
    let supervisor = Arc::new(started_supervisor(&dir).await?);

    let running = {
        let supervisor = Arc::clone(&supervisor);
        tokio::spawn(async move { supervisor.execute("sleep 3").await })
    };

    tokio::time::sleep(Duration::from_millis(200)).await;
    supervisor.destroy();

    let result = with_timeout(running).await?;
    match result {
        Err(e) => assert!(e.is_communication(), "got {e:?}"),
        Ok(success) => panic!("expected a communication error, got Ok({success})"),
    }
    assert!(!supervisor.is_alive());
    Ok(())
}

#[tokio::test]
async fn relaunch_after_destroy_gets_a_new_generation() -> TestResult {
    init_tracing();
    let dir = TempDir::new()?;
    let supervisor = started_supervisor(&dir).await?;
    let first = supervisor.current_process().expect("running");

    supervisor.destroy();
    supervisor
        .start(&shell_launch(dir.path(), &fake_tool_script()), true)
        .await?;
    let second = supervisor.current_process().expect("running again");

    assert!(second.generation > first.generation);
    assert_ne!(first, second);
    assert!(with_timeout(supervisor.execute("compile")).await?);

    supervisor.destroy();
    Ok(())
}

#[tokio::test]
async fn launch_while_alive_replaces_the_old_process() -> TestResult {
    init_tracing();
    let dir = TempDir::new()?;
    let supervisor = started_supervisor(&dir).await?;
    let first = supervisor.current_process().expect("running");

    let second = supervisor.launch(&shell_launch(dir.path(), &fake_tool_script()))?;
    supervisor.finish_start(true).await?;

    assert_ne!(first, second);
    assert_eq!(supervisor.current_process(), Some(second));
    supervisor.destroy();
    Ok(())
}

#[tokio::test]
async fn process_exiting_mid_action_is_a_communication_error() -> TestResult {
    init_tracing();
    let dir = TempDir::new()?;
    let supervisor = started_supervisor(&dir).await?;

    let result = with_timeout(supervisor.execute("crash")).await;
    assert!(matches!(&result, Err(e) if e.is_communication()), "got {result:?}");
    assert!(!supervisor.is_alive());
    Ok(())
}

#[tokio::test]
async fn write_failure_is_a_communication_error_and_kills_the_process() -> TestResult {
    init_tracing();
    let dir = TempDir::new()?;
    // Closes its stdin, then reports ready.
    let script = write_script(
        dir.path(),
        "deaf-tool.sh",
        "exec 0<&-\necho \">\"\nsleep 5\n",
    );

    let supervisor = ProcessSupervisor::new();
    supervisor.start(&shell_launch(dir.path(), &script), true).await?;

    let result = with_timeout(supervisor.execute("compile")).await;
    assert!(matches!(&result, Err(e) if e.is_communication()), "got {result:?}");
    assert!(!supervisor.is_alive());
    Ok(())
}

#[tokio::test]
async fn exit_during_startup_fails_the_start() -> TestResult {
    init_tracing();
    let dir = TempDir::new()?;
    let script = write_script(dir.path(), "broken-tool.sh", "echo \"no jar\"\nexit 1\n");

    let supervisor = ProcessSupervisor::new();
    let result = with_timeout(supervisor.start(&shell_launch(dir.path(), &script), true)).await;

    assert!(matches!(&result, Err(e) if e.is_communication()), "got {result:?}");
    assert!(!supervisor.is_alive());
    Ok(())
}

#[tokio::test]
async fn startup_timeout_defers_the_failure_to_the_first_action() -> TestResult {
    init_tracing();
    let dir = TempDir::new()?;
    let script = write_script(dir.path(), "silent-tool.sh", "sleep 5\n");
    let config = shell_launch(dir.path(), &script).with_protocol(
        CommandProtocol::default().with_startup_timeout(Duration::from_millis(200)),
    );

    let supervisor = ProcessSupervisor::new();
    // Only a warning: the tool may just be slow.
    with_timeout(supervisor.start(&config, true)).await?;
    assert!(supervisor.is_alive());

    let result = with_timeout(supervisor.execute("compile")).await;
    assert!(matches!(&result, Err(e) if e.is_communication()), "got {result:?}");
    assert!(!supervisor.is_alive());
    Ok(())
}

#[tokio::test]
async fn command_timeout_fails_a_hung_action() -> TestResult {
    init_tracing();
    let dir = TempDir::new()?;
    let config = shell_launch(dir.path(), &fake_tool_script()).with_protocol(
        CommandProtocol::default()
            .with_startup_timeout(Duration::from_secs(5))
            .with_command_timeout(Some(Duration::from_millis(200))),
    );

    let supervisor = ProcessSupervisor::new();
    supervisor.start(&config, true).await?;

    let result = with_timeout(supervisor.execute("sleep 3")).await;
    assert!(matches!(&result, Err(e) if e.is_communication()), "got {result:?}");
    assert!(!supervisor.is_alive());
    Ok(())
}

#[tokio::test]
async fn execute_without_a_process_is_a_communication_error() {
    let result = ProcessSupervisor::new().execute("compile").await;
    assert!(matches!(&result, Err(e) if e.is_communication()), "got {result:?}");
}

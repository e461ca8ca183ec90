#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use buildlane::process::{CommandProtocol, LaunchConfig};

pub use buildlane_test_utils::{init_tracing, with_timeout};

/// The shell stand-in for a build tool shipped under `demos/`.
pub fn fake_tool_script() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos/fake-build-tool.sh")
}

/// Write a throwaway shell script into `dir`.
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).expect("failed to write test script");
    path
}

/// Launch `script` with `sh` in `project_dir`, with a short startup timeout.
pub fn shell_launch(project_dir: &Path, script: &Path) -> LaunchConfig {
    LaunchConfig::new("sh", project_dir, script, vec![])
        .expect("valid launch config")
        .with_launcher_flag(None)
        .with_protocol(CommandProtocol::default().with_startup_timeout(Duration::from_secs(5)))
}

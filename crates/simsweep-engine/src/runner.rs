//! External simulator invocation and exit classification.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::Context;
use simsweep_types::{ExitClass, ToolMetadata};

/// Fixed input-file argument handed to the simulator in every run directory.
pub const SIMULATOR_INPUT_FILE: &str = "vpl.in";

/// Per-run log file receiving the child's stderr then stdout, appended
/// across attempts.
pub const RUN_LOG_FILE: &str = "vplanet_log";

/// Simulator binary used when none is configured.
pub const DEFAULT_SIMULATOR: &str = "vplanet";

/// Help/introspection flag for the one-shot metadata capture.
const DESCRIBE_FLAG: &str = "-H";

/// Executes one simulation in a given run directory.
///
/// Implementations must be `Send + Sync`; the scheduler shares one runner
/// across every worker.
pub trait SimulationRunner: Send + Sync {
    /// Run the simulation for `run_dir` and classify the outcome.
    ///
    /// Infallible: any failure to spawn, drain, or log is part of the
    /// `Failure` classification, and the surrounding worker re-pends the run
    /// rather than dying.
    fn execute(&self, run_dir: &Path) -> ExitClass;
}

/// Child-process runner for the real simulator binary.
///
/// Spawns `[binary, "vpl.in"]` with the run directory as the child's working
/// directory (the engine's own working directory is never touched) and the
/// argument vector passed verbatim to the OS; no shell is involved.
pub struct ProcessRunner {
    binary: String,
}

impl ProcessRunner {
    #[must_use]
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn run_once(&self, run_dir: &Path) -> std::io::Result<ExitClass> {
        let mut log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(run_dir.join(RUN_LOG_FILE))?;

        // output() waits for the final exit status while draining both
        // pipes; an undrained child can block forever on large outputs, and
        // classification before the wait would race the child.
        let output = Command::new(&self.binary)
            .arg(SIMULATOR_INPUT_FILE)
            .current_dir(run_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()?;

        log.write_all(&output.stderr)?;
        log.write_all(&output.stdout)?;

        Ok(if output.status.success() {
            ExitClass::Success
        } else {
            ExitClass::Failure
        })
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new(DEFAULT_SIMULATOR)
    }
}

impl SimulationRunner for ProcessRunner {
    fn execute(&self, run_dir: &Path) -> ExitClass {
        match self.run_once(run_dir) {
            Ok(class) => class,
            Err(error) => {
                tracing::warn!(
                    run = %run_dir.display(),
                    binary = self.binary,
                    %error,
                    "simulation could not be executed"
                );
                ExitClass::Failure
            }
        }
    }
}

/// Capture the simulator's help/introspection output as opaque metadata.
///
/// Performed exactly once per sweep by the orchestrator before any worker
/// starts; the value is shared read-only with every worker and never
/// re-acquired per run (re-invoking the simulator while an archive handle is
/// open inherits file descriptors into the child and can deadlock the pool).
///
/// # Errors
///
/// Returns an error if the binary cannot be spawned at all; the exit status
/// of the help invocation itself is not inspected.
pub fn describe_simulator(binary: &str) -> anyhow::Result<ToolMetadata> {
    let output = Command::new(binary)
        .arg(DESCRIBE_FLAG)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .with_context(|| format!("unable to invoke simulator '{binary}'; is it on your PATH?"))?;
    Ok(ToolMetadata::new(
        String::from_utf8_lossy(&output.stdout).into_owned(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;

    /// Write an executable stand-in for the simulator.
    fn fake_simulator(dir: &Path, script: &str) -> PathBuf {
        let path = dir.join("fake_sim");
        fs::write(&path, format!("#!/bin/sh\n{script}")).unwrap();
        let mut perms = fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).unwrap();
        path
    }

    fn run_dir(dir: &Path) -> PathBuf {
        let run = dir.join("r0");
        fs::create_dir(&run).unwrap();
        run
    }

    #[test]
    fn zero_exit_classifies_success() {
        let tmp = tempfile::tempdir().unwrap();
        let sim = fake_simulator(tmp.path(), "echo finished\nexit 0\n");
        let run = run_dir(tmp.path());

        let runner = ProcessRunner::new(sim.to_string_lossy());
        assert_eq!(runner.execute(&run), ExitClass::Success);
        assert!(run.join(RUN_LOG_FILE).exists());
    }

    #[test]
    fn nonzero_exit_classifies_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let sim = fake_simulator(tmp.path(), "echo boom >&2\nexit 3\n");
        let run = run_dir(tmp.path());

        let runner = ProcessRunner::new(sim.to_string_lossy());
        assert_eq!(runner.execute(&run), ExitClass::Failure);
    }

    #[test]
    fn log_records_stderr_before_stdout() {
        let tmp = tempfile::tempdir().unwrap();
        let sim = fake_simulator(tmp.path(), "echo normal\necho warning >&2\nexit 0\n");
        let run = run_dir(tmp.path());

        let runner = ProcessRunner::new(sim.to_string_lossy());
        runner.execute(&run);

        let log = fs::read_to_string(run.join(RUN_LOG_FILE)).unwrap();
        assert_eq!(log, "warning\nnormal\n");
    }

    #[test]
    fn log_appends_across_attempts() {
        let tmp = tempfile::tempdir().unwrap();
        let sim = fake_simulator(tmp.path(), "echo attempt\nexit 0\n");
        let run = run_dir(tmp.path());

        let runner = ProcessRunner::new(sim.to_string_lossy());
        runner.execute(&run);
        runner.execute(&run);

        let log = fs::read_to_string(run.join(RUN_LOG_FILE)).unwrap();
        assert_eq!(log, "attempt\nattempt\n");
    }

    #[test]
    fn missing_binary_classifies_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let run = run_dir(tmp.path());
        let runner = ProcessRunner::new("/no/such/simulator");
        assert_eq!(runner.execute(&run), ExitClass::Failure);
    }

    #[test]
    fn missing_run_directory_classifies_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let sim = fake_simulator(tmp.path(), "exit 0\n");
        let runner = ProcessRunner::new(sim.to_string_lossy());
        assert_eq!(runner.execute(&tmp.path().join("gone")), ExitClass::Failure);
    }

    #[test]
    fn describe_captures_help_output() {
        let tmp = tempfile::tempdir().unwrap();
        let sim = fake_simulator(tmp.path(), "echo \"usage: sim [options]\"\nexit 0\n");
        let metadata = describe_simulator(&sim.to_string_lossy()).unwrap();
        assert_eq!(metadata.as_str(), "usage: sim [options]\n");
    }

    #[test]
    fn describe_missing_binary_is_fatal() {
        let err = describe_simulator("/no/such/simulator").unwrap_err();
        assert!(err.to_string().contains("PATH"));
    }
}

//! End-to-end sweep scenarios over real manifests, run directories, and a
//! fake simulator binary.
//!
//! The fake simulator is a generated shell script, so these tests exercise
//! the real child-process path (spawn, drain, log, classify) without a
//! simulator installation.

use std::collections::HashSet;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use simsweep_engine::archive::{read_group_names, OutputGatherer, RecordSink};
use simsweep_engine::runner::{SimulationRunner, RUN_LOG_FILE};
use simsweep_engine::{execute_sweep, run_sweep, SweepDeps, SweepOptions, SweepOutcome};
use simsweep_state::{CheckpointStore, TextCheckpoint};
use simsweep_types::ExitClass;

/// Lay out a manifest and run directories under `root`, returning the
/// manifest path.
fn setup_sweep(root: &Path, runs: &[&str]) -> PathBuf {
    let dest = root.join("Sweep");
    for name in runs {
        let run = dest.join(name);
        fs::create_dir_all(&run).unwrap();
        fs::write(run.join("vpl.in"), "sSystemName test\nsAge 4.5e9\n").unwrap();
        fs::write(run.join("earth.in"), "sName earth\ndMass -1.0\n").unwrap();
    }
    let manifest = root.join("vspace.in");
    fs::write(&manifest, "destfolder Sweep\nfile earth.in\n").unwrap();
    manifest
}

/// Generate an executable simulator stand-in.
fn fake_simulator(root: &Path, script: &str) -> PathBuf {
    let path = root.join("fake_sim");
    fs::write(&path, format!("#!/bin/sh\n{script}")).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
    path
}

fn options(root: &Path, simulator: &Path, cores: u32) -> SweepOptions {
    SweepOptions {
        cores,
        simulator: simulator.to_string_lossy().into_owned(),
        work_dir: Some(root.to_path_buf()),
        ..SweepOptions::default()
    }
}

struct AlwaysSuccess;
impl SimulationRunner for AlwaysSuccess {
    fn execute(&self, _run_dir: &Path) -> ExitClass {
        ExitClass::Success
    }
}

/// Fails the first attempt for each named run, succeeds afterwards.
struct FailOnce {
    failing: Vec<PathBuf>,
    seen: Mutex<HashSet<PathBuf>>,
    invocations: Mutex<Vec<PathBuf>>,
}

impl FailOnce {
    fn new(failing: Vec<PathBuf>) -> Self {
        Self {
            failing,
            seen: Mutex::new(HashSet::new()),
            invocations: Mutex::new(Vec::new()),
        }
    }
}

impl SimulationRunner for FailOnce {
    fn execute(&self, run_dir: &Path) -> ExitClass {
        self.invocations.lock().unwrap().push(run_dir.to_path_buf());
        let first = self.seen.lock().unwrap().insert(run_dir.to_path_buf());
        if first && self.failing.iter().any(|f| f == run_dir) {
            ExitClass::Failure
        } else {
            ExitClass::Success
        }
    }
}

fn stub_deps(runner: Arc<dyn SimulationRunner>) -> SweepDeps {
    SweepDeps {
        runner,
        gatherer: Arc::new(OutputGatherer),
        sink: Arc::new(RecordSink),
    }
}

fn final_counts(root: &Path) -> simsweep_types::CheckpointCounts {
    TextCheckpoint::open(root.join(".Sweep"))
        .unwrap()
        .counts()
        .unwrap()
}

#[tokio::test]
async fn serial_sweep_completes_every_run() {
    let tmp = tempfile::tempdir().unwrap();
    let manifest = setup_sweep(tmp.path(), &["r0", "r1", "r2"]);
    let sim = fake_simulator(tmp.path(), "echo done\nexit 0\n");

    let outcome = run_sweep(&manifest, &options(tmp.path(), &sim, 1))
        .await
        .unwrap();

    let SweepOutcome::Run(result) = outcome else {
        panic!("expected a full run");
    };
    assert_eq!(result.counts.completed, 3);
    assert!(result.counts.is_complete());
    assert_eq!(result.totals.executed, 3);

    for name in ["r0", "r1", "r2"] {
        assert!(
            tmp.path().join("Sweep").join(name).join(RUN_LOG_FILE).exists(),
            "{name} must have a per-run log"
        );
    }
    assert!(!tmp.path().join("Sweep.bpa").exists());
}

#[tokio::test]
async fn parallel_sweep_matches_serial_result() {
    let tmp = tempfile::tempdir().unwrap();
    let manifest = setup_sweep(tmp.path(), &["r0", "r1", "r2"]);
    let sim = fake_simulator(tmp.path(), "exit 0\n");

    let outcome = run_sweep(&manifest, &options(tmp.path(), &sim, 3))
        .await
        .unwrap();

    let SweepOutcome::Run(result) = outcome else {
        panic!("expected a full run");
    };
    assert_eq!(result.counts.completed, 3);
    assert!(!tmp.path().join("Sweep.bpa").exists());
}

#[tokio::test]
async fn restart_resumes_an_interrupted_sweep() {
    let tmp = tempfile::tempdir().unwrap();
    let manifest = setup_sweep(tmp.path(), &["r0", "r1", "r2"]);
    let sim = fake_simulator(tmp.path(), "exit 0\n");

    // Checkpoint left by a killed execution: one complete, one in flight,
    // one never started.
    let dest = tmp.path().canonicalize().unwrap().join("Sweep");
    fs::write(
        tmp.path().join(".Sweep"),
        format!(
            "Vspace File: {}\n\
             Total Number of Simulations: 3\n\
             {} 1\n\
             {} 0\n\
             {} -1\n\
             THE END\n",
            manifest.display(),
            dest.join("r0").display(),
            dest.join("r1").display(),
            dest.join("r2").display()
        ),
    )
    .unwrap();

    let outcome = run_sweep(&manifest, &options(tmp.path(), &sim, 2))
        .await
        .unwrap();

    let SweepOutcome::Run(result) = outcome else {
        panic!("expected a full run");
    };
    assert_eq!(result.counts.completed, 3);
    // Only the re-pended and pending entries were executed again.
    assert_eq!(result.totals.executed, 2);
}

#[tokio::test]
async fn transient_failure_is_retried_to_completion() {
    let tmp = tempfile::tempdir().unwrap();
    let manifest = setup_sweep(tmp.path(), &["r0", "r1", "r2"]);
    let dest = tmp.path().canonicalize().unwrap().join("Sweep");

    let runner = Arc::new(FailOnce::new(vec![dest.join("r1")]));
    let opts = SweepOptions {
        cores: 1,
        work_dir: Some(tmp.path().to_path_buf()),
        ..SweepOptions::default()
    };
    let outcome = execute_sweep(&manifest, &opts, stub_deps(runner.clone()))
        .await
        .unwrap();

    let SweepOutcome::Run(result) = outcome else {
        panic!("expected a full run");
    };
    assert!(result.counts.is_complete());
    let attempts_on_r1 = runner
        .invocations
        .lock()
        .unwrap()
        .iter()
        .filter(|dir| dir.ends_with("r1"))
        .count();
    assert!(attempts_on_r1 >= 2, "failed run must be re-dispatched");
}

#[tokio::test]
async fn archive_mode_creates_one_group_per_run() {
    let tmp = tempfile::tempdir().unwrap();
    let manifest = setup_sweep(tmp.path(), &["r0", "r1", "r2"]);
    // Answers the one-shot -H probe without touching disk, and produces the
    // log output the gatherer snapshots when run inside a run directory.
    let sim = fake_simulator(
        tmp.path(),
        "if [ \"$1\" = \"-H\" ]; then echo \"usage: fake\"; exit 0; fi\n\
         echo evolved > vpl.log\n\
         exit 0\n",
    );

    let mut opts = options(tmp.path(), &sim, 4);
    opts.bigplanet = true;
    let outcome = run_sweep(&manifest, &opts).await.unwrap();

    let SweepOutcome::Run(result) = outcome else {
        panic!("expected a full run");
    };
    assert!(result.counts.is_complete());

    let archive = tmp.path().join("Sweep.bpa");
    assert!(archive.exists());
    let mut groups = read_group_names(&archive).unwrap();
    groups.sort();
    assert_eq!(groups, vec!["r0", "r1", "r2"]);
}

#[tokio::test]
async fn stale_archive_is_removed_when_not_requested() {
    let tmp = tempfile::tempdir().unwrap();
    let manifest = setup_sweep(tmp.path(), &["r0"]);
    let sim = fake_simulator(tmp.path(), "exit 0\n");
    fs::write(tmp.path().join("Sweep.bpa"), b"left over").unwrap();

    run_sweep(&manifest, &options(tmp.path(), &sim, 1))
        .await
        .unwrap();

    assert!(!tmp.path().join("Sweep.bpa").exists());
}

#[tokio::test]
async fn completed_sweep_is_not_re_run_without_force() {
    let tmp = tempfile::tempdir().unwrap();
    let manifest = setup_sweep(tmp.path(), &["r0", "r1"]);
    let dest = tmp.path().canonicalize().unwrap().join("Sweep");
    fs::write(
        tmp.path().join(".Sweep"),
        format!(
            "Vspace File: {}\n\
             Total Number of Simulations: 2\n\
             {} 1\n\
             {} 1\n\
             THE END\n",
            manifest.display(),
            dest.join("r0").display(),
            dest.join("r1").display()
        ),
    )
    .unwrap();

    let runner = Arc::new(FailOnce::new(Vec::new()));
    let opts = SweepOptions {
        cores: 1,
        work_dir: Some(tmp.path().to_path_buf()),
        ..SweepOptions::default()
    };
    let outcome = execute_sweep(&manifest, &opts, stub_deps(runner.clone()))
        .await
        .unwrap();

    assert!(matches!(outcome, SweepOutcome::AlreadyDone));
    assert!(runner.invocations.lock().unwrap().is_empty());
    assert!(tmp.path().join(".Sweep").exists());
}

#[tokio::test]
async fn force_wipes_and_re_runs_a_completed_sweep() {
    let tmp = tempfile::tempdir().unwrap();
    let manifest = setup_sweep(tmp.path(), &["r0", "r1"]);
    let dest = tmp.path().canonicalize().unwrap().join("Sweep");
    fs::write(
        tmp.path().join(".Sweep"),
        format!(
            "Vspace File: {}\n\
             Total Number of Simulations: 2\n\
             {} 1\n\
             {} 1\n\
             THE END\n",
            manifest.display(),
            dest.join("r0").display(),
            dest.join("r1").display()
        ),
    )
    .unwrap();

    let runner = Arc::new(AlwaysSuccess);
    let opts = SweepOptions {
        cores: 1,
        force: true,
        work_dir: Some(tmp.path().to_path_buf()),
        ..SweepOptions::default()
    };
    let outcome = execute_sweep(&manifest, &opts, stub_deps(runner))
        .await
        .unwrap();

    let SweepOutcome::Run(result) = outcome else {
        panic!("expected a full re-run");
    };
    assert_eq!(result.counts.completed, 2);
    assert_eq!(result.totals.executed, 2);
    assert!(!dest.join("r0").exists(), "force removes the run directories");
    assert_eq!(final_counts(tmp.path()).completed, 2);
}

#[tokio::test]
async fn working_directory_is_never_mutated() {
    let tmp = tempfile::tempdir().unwrap();
    let manifest = setup_sweep(tmp.path(), &["r0", "r1"]);
    let sim = fake_simulator(tmp.path(), "exit 0\n");

    let before = std::env::current_dir().unwrap();
    run_sweep(&manifest, &options(tmp.path(), &sim, 2))
        .await
        .unwrap();
    assert_eq!(std::env::current_dir().unwrap(), before);
}

#[tokio::test]
async fn missing_destination_folder_fails_setup() {
    let tmp = tempfile::tempdir().unwrap();
    let manifest = tmp.path().join("vspace.in");
    fs::write(&manifest, "destfolder Missing\n").unwrap();

    let err = run_sweep(&manifest, &SweepOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, simsweep_engine::SweepError::Config(_)));
}

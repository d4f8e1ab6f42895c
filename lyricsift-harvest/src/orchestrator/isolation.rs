//! Running workers as threads or child processes
//!
//! **Thread:** each worker gets a dedicated thread from the tokio blocking
//! pool and drives its own loop with `Handle::block_on`. Handles are shared.
//! A panic ends that thread only and is reported as a failed partition.
//!
//! **Process:** each worker is the `lyricsift worker` subcommand reading a
//! JSON spec. The child builds its own handles and writes a JSON report. To
//! cancel, the parent closes the child's stdin; the child stops at its next
//! check and exits normally.

use crate::summary::WorkerReport;
use crate::worker::{read_report, write_spec, Worker, WorkerHandles, WorkerSpec};
use futures::future::join_all;
use std::any::Any;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::{Child, Command};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// How one worker ended
#[derive(Debug)]
pub struct WorkerRun {
    pub index: usize,
    pub output: PathBuf,
    pub result: Result<WorkerReport, String>,
}

pub(crate) async fn run_threads(
    specs: Vec<WorkerSpec>,
    handles: WorkerHandles,
    cancel: &CancellationToken,
) -> Vec<WorkerRun> {
    let runtime = Handle::current();

    let launched: Vec<_> = specs
        .into_iter()
        .map(|spec| {
            let index = spec.index;
            let output = spec.output.clone();
            let worker = Worker::new(spec, handles.clone(), cancel.child_token());
            let runtime = runtime.clone();
            let join = tokio::task::spawn_blocking(move || runtime.block_on(worker.run()));
            (index, output, join)
        })
        .collect();

    info!(workers = launched.len(), "Worker threads launched");

    let mut runs = Vec::with_capacity(launched.len());
    for (index, output, join) in launched {
        let result = match join.await {
            Ok(Ok(report)) => Ok(report),
            Ok(Err(e)) => Err(e.to_string()),
            Err(e) if e.is_panic() => Err(format!("panicked: {}", panic_message(e.into_panic()))),
            Err(e) => Err(e.to_string()),
        };
        runs.push(WorkerRun {
            index,
            output,
            result,
        });
    }
    runs
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

pub(crate) async fn run_processes(
    specs: Vec<WorkerSpec>,
    program: &Path,
    scratch: &Path,
    cancel: &CancellationToken,
) -> Vec<WorkerRun> {
    let mut supervised: Vec<Supervision> = Vec::with_capacity(specs.len());

    for spec in specs {
        let index = spec.index;
        let output = spec.output.clone();
        let spec_path = scratch.join(format!("w{}.spec.json", index));
        let report_path = scratch.join(format!("w{}.report.json", index));

        match spawn_worker(program, &spec, &spec_path, &report_path) {
            Ok(child) => {
                info!(worker = index, pid = ?child.id(), "Worker process started");
                supervised.push(supervise(index, output, child, report_path, cancel.clone()));
            }
            Err(reason) => {
                error!(worker = index, "Worker process not started: {}", reason);
                supervised.push(Box::pin(async move {
                    WorkerRun {
                        index,
                        output,
                        result: Err(reason),
                    }
                }));
            }
        }
    }

    join_all(supervised).await
}

fn spawn_worker(
    program: &Path,
    spec: &WorkerSpec,
    spec_path: &Path,
    report_path: &Path,
) -> Result<Child, String> {
    write_spec(spec, spec_path).map_err(|e| format!("cannot write spec: {}", e))?;
    Command::new(program)
        .arg("worker")
        .arg("--spec")
        .arg(spec_path)
        .arg("--report")
        .arg(report_path)
        .stdin(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| format!("cannot spawn {}: {}", program.display(), e))
}

type Supervision = std::pin::Pin<Box<dyn std::future::Future<Output = WorkerRun> + Send>>;

fn supervise(
    index: usize,
    output: PathBuf,
    mut child: Child,
    report_path: PathBuf,
    cancel: CancellationToken,
) -> Supervision {
    Box::pin(async move {
        let mut stdin = child.stdin.take();
        let status = tokio::select! {
            status = child.wait() => status,
            _ = cancel.cancelled() => {
                warn!(worker = index, "Cancelling worker process");
                drop(stdin.take());
                child.wait().await
            }
        };

        let result = match status {
            Ok(status) if status.success() => read_report(&report_path)
                .map_err(|e| format!("unreadable report: {}", e)),
            Ok(status) => Err(format!("exited with {}", status)),
            Err(e) => Err(format!("wait failed: {}", e)),
        };
        drop(stdin);

        WorkerRun {
            index,
            output,
            result,
        }
    })
}

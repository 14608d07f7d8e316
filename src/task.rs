//! Continuation tasks run once a cache is ready

use crate::error::{StrataError, StrataResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// A unit of work to run after a successful cache check
#[async_trait]
pub trait Task: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self) -> StrataResult<()>;
}

/// Runs tasks in the background or in the foreground
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Queue `task` for background execution
    fn enqueue(&self, task: Box<dyn Task>) -> StrataResult<()>;

    /// Run `task` to completion now
    async fn execute(&self, task: Box<dyn Task>) -> StrataResult<()>;
}

/// Outcome of draining a [`TaskQueue`]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TaskReport {
    pub completed: usize,
    /// (task name, error) in execution order
    pub failed: Vec<(String, String)>,
}

impl TaskReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Sequential background executor: tasks run one at a time in enqueue order
pub struct TaskQueue {
    tx: Mutex<Option<mpsc::UnboundedSender<Box<dyn Task>>>>,
    worker: Mutex<Option<JoinHandle<TaskReport>>>,
}

impl TaskQueue {
    /// Start the worker on the current runtime
    pub fn start() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Box<dyn Task>>();

        let worker = tokio::spawn(async move {
            let mut report = TaskReport::default();
            while let Some(task) = rx.recv().await {
                debug!("Running task {}", task.name());
                match task.run().await {
                    Ok(()) => report.completed += 1,
                    Err(e) => {
                        warn!("Task {} failed: {}", task.name(), e);
                        report.failed.push((task.name().to_string(), e.to_string()));
                    }
                }
            }
            report
        });

        Self {
            tx: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Stop accepting tasks and wait for queued ones to finish
    pub async fn drain(&self) -> StrataResult<TaskReport> {
        self.tx.lock().take();
        let worker = self.worker.lock().take();
        match worker {
            Some(worker) => worker
                .await
                .map_err(|e| StrataError::Internal(format!("task worker failed: {}", e))),
            None => Ok(TaskReport::default()),
        }
    }
}

#[async_trait]
impl TaskExecutor for TaskQueue {
    fn enqueue(&self, task: Box<dyn Task>) -> StrataResult<()> {
        let tx = self.tx.lock();
        let Some(tx) = tx.as_ref() else {
            return Err(StrataError::Internal("task queue is closed".to_string()));
        };
        debug!("Queued task {}", task.name());
        tx.send(task)
            .map_err(|_| StrataError::Internal("task queue is closed".to_string()))
    }

    async fn execute(&self, task: Box<dyn Task>) -> StrataResult<()> {
        task.run().await
    }
}

/// Runs an external command inside a directory
#[derive(Debug, Clone)]
pub struct CommandTask {
    name: String,
    argv: Vec<String>,
    dir: PathBuf,
}

impl CommandTask {
    pub fn new(argv: Vec<String>, dir: impl Into<PathBuf>) -> StrataResult<Self> {
        let Some(program) = argv.first() else {
            return Err(StrataError::User("No command given".to_string()));
        };
        Ok(Self {
            name: program.clone(),
            argv,
            dir: dir.into(),
        })
    }
}

#[async_trait]
impl Task for CommandTask {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> StrataResult<()> {
        info!("Running {} in {}", self.argv.join(" "), self.dir.display());

        let status = Command::new(&self.argv[0])
            .args(&self.argv[1..])
            .current_dir(&self.dir)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| StrataError::TaskFailed {
                name: self.name.clone(),
                reason: e.to_string(),
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(StrataError::TaskFailed {
                name: self.name.clone(),
                reason: match status.code() {
                    Some(code) => format!("exited with status {}", code),
                    None => "terminated by signal".to_string(),
                },
            })
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::LogTask;
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn queue_runs_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let queue = TaskQueue::start();
        for name in ["a", "b", "c"] {
            queue.enqueue(LogTask::boxed(name, &log)).unwrap();
        }

        let report = queue.drain().await.unwrap();
        assert_eq!(report.completed, 3);
        assert!(report.is_success());
        assert_eq!(*log.lock(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn failure_does_not_stop_queue() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let queue = TaskQueue::start();
        queue
            .enqueue(Box::new(LogTask {
                name: "bad".to_string(),
                log: Arc::clone(&log),
                fail: true,
            }))
            .unwrap();
        queue.enqueue(LogTask::boxed("good", &log)).unwrap();

        let report = queue.drain().await.unwrap();
        assert_eq!(report.completed, 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "bad");
    }

    #[tokio::test]
    async fn closed_queue_rejects_tasks() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let queue = TaskQueue::start();
        queue.drain().await.unwrap();
        assert!(queue.enqueue(LogTask::boxed("late", &log)).is_err());
    }

    #[test]
    fn command_task_requires_program() {
        assert!(CommandTask::new(Vec::new(), "/tmp").is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_task_runs_in_directory() {
        let temp = TempDir::new().unwrap();
        let task = CommandTask::new(
            vec!["sh".into(), "-c".into(), "echo done > marker".into()],
            temp.path(),
        )
        .unwrap();

        task.run().await.unwrap();
        assert!(temp.path().join("marker").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_task_reports_exit_status() {
        let temp = TempDir::new().unwrap();
        let task = CommandTask::new(vec!["sh".into(), "-c".into(), "exit 3".into()], temp.path())
            .unwrap();

        let err = task.run().await.unwrap_err();
        assert!(err.to_string().contains("status 3"));
    }
}

use std::{
    path::PathBuf,
    sync::mpsc,
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use rusqlite::{Connection, Transaction};
use tokio::sync::oneshot;

use super::migrations::run_migrations;

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

type Task = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

/// Owns the thread holding the connection. Dropping the last handle closes
/// the task channel, which ends the worker loop, then joins the thread.
struct Worker {
    tasks: Option<mpsc::Sender<Task>>,
    handle: Option<JoinHandle<()>>,
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.tasks.take();
        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.join() {
                log_error!("annotation database thread panicked: {err:?}");
            }
        }
    }
}

/// Annotation database. Every statement runs on one dedicated thread; the
/// async API hands closures over and awaits their result.
#[derive(Clone)]
pub struct Database {
    worker: std::sync::Arc<Worker>,
}

impl Database {
    /// Opens (or creates) the database file and brings its schema up to date
    /// before returning.
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let (task_tx, task_rx) = mpsc::channel::<Task>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();
        let path = db_path.clone();

        let handle = thread::Builder::new()
            .name("em31view-db".into())
            .spawn(move || {
                let mut conn = match open_annotations(&path) {
                    Ok(conn) => conn,
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                if ready_tx.send(Ok(())).is_err() {
                    return;
                }
                for task in task_rx {
                    task(&mut conn);
                }
                log_info!("annotation database closed");
            })
            .context("failed to spawn annotation database thread")?;

        ready_rx
            .recv()
            .context("annotation database thread exited during startup")??;
        log_info!("annotation database ready at {}", db_path.display());

        Ok(Self {
            worker: std::sync::Arc::new(Worker {
                tasks: Some(task_tx),
                handle: Some(handle),
            }),
        })
    }

    /// Runs `task` on the database thread.
    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let tasks = self
            .worker
            .tasks
            .as_ref()
            .ok_or_else(|| anyhow!("annotation database is closed"))?;
        let (reply_tx, reply_rx) = oneshot::channel();
        tasks
            .send(Box::new(move |conn| {
                let _ = reply_tx.send(task(conn));
            }))
            .map_err(|_| anyhow!("annotation database thread has stopped"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("annotation database thread dropped the request"))?
    }

    /// Runs `task` inside a transaction that commits only when it returns `Ok`.
    pub async fn transaction<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let value = task(&tx)?;
            tx.commit().context("failed to commit annotation change")?;
            Ok(value)
        })
        .await
    }
}

fn open_annotations(path: &std::path::Path) -> Result<Connection> {
    let mut conn = Connection::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
        log_error!("failed to enable WAL mode: {err}");
    }
    run_migrations(&mut conn).context("failed to migrate annotation database")?;
    Ok(conn)
}

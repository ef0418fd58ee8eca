use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use log::{error, info};
use rusqlite::{Connection, TransactionBehavior};
use tokio::sync::oneshot;

use crate::utils::Clock;

use super::{
    documents::{read_document, DocChange, DocPath, DocTransaction},
    error::RemoteError,
    migrations::run_migrations,
    watch::{DocumentWatch, WatchRegistry},
};

const MAX_TRANSACTION_ATTEMPTS: u32 = 5;
const BUSY_TIMEOUT: Duration = Duration::from_millis(250);

type DbTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum DbCommand {
    Execute(DbTask),
    Shutdown,
}

struct DatabaseInner {
    sender: mpsc::Sender<DbCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for DatabaseInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(DbCommand::Shutdown) {
                error!("Failed to send shutdown to DB thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join DB thread: {join_err:?}");
            }
        }
    }
}

enum DbTarget {
    File(PathBuf),
    Memory,
}

/// The document store. A single worker thread owns the SQLite connection;
/// every operation is shipped to it as a closure and answered over a oneshot.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
    db_path: Arc<Option<PathBuf>>,
    watchers: Arc<WatchRegistry>,
    clock: Arc<dyn Clock>,
}

impl Database {
    pub fn new(db_path: PathBuf, clock: Arc<dyn Clock>) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }
        Self::spawn(DbTarget::File(db_path), clock)
    }

    /// A private in-memory database, gone when the last handle drops.
    pub fn in_memory(clock: Arc<dyn Clock>) -> Result<Self> {
        Self::spawn(DbTarget::Memory, clock)
    }

    fn spawn(target: DbTarget, clock: Arc<dyn Clock>) -> Result<Self> {
        let (command_tx, command_rx) = mpsc::channel::<DbCommand>();
        let (ready_tx, ready_rx) = mpsc::channel();
        let db_path = match &target {
            DbTarget::File(path) => Some(path.clone()),
            DbTarget::Memory => None,
        };

        let worker = thread::Builder::new()
            .name("odaki-db".into())
            .spawn(move || {
                let opened = match &target {
                    DbTarget::File(path) => Connection::open(path),
                    DbTarget::Memory => Connection::open_in_memory(),
                };
                let mut conn = match opened {
                    Ok(connection) => connection,
                    Err(err) => {
                        let _ = ready_tx.send(Err(anyhow::Error::new(err)
                            .context("failed to open SQLite database")));
                        return;
                    }
                };

                if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                    error!("Failed to enable WAL mode: {err}");
                }
                if let Err(err) = conn.busy_timeout(BUSY_TIMEOUT) {
                    error!("Failed to set busy timeout: {err}");
                }

                let init_result =
                    run_migrations(&mut conn).context("failed to run database migrations");
                if ready_tx.send(init_result).is_err() {
                    error!("DB initialization receiver dropped before ready signal");
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        DbCommand::Execute(task) => {
                            task(&mut conn);
                        }
                        DbCommand::Shutdown => break,
                    }
                }

                info!("Database thread shutting down");
            })
            .with_context(|| "failed to spawn database worker thread")?;

        ready_rx
            .recv()
            .context("database worker exited before signaling readiness")??;

        match &db_path {
            Some(path) => info!("Database initialized at {}", path.display()),
            None => info!("In-memory database initialized"),
        }

        Ok(Self {
            inner: Arc::new(DatabaseInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
            db_path: Arc::new(db_path),
            watchers: Arc::new(WatchRegistry::default()),
            clock,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let sender = self.inner.sender.clone();
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = DbCommand::Execute(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                error!("DB caller dropped before receiving result");
            }
        }));

        sender
            .send(command)
            .map_err(|err| anyhow!("failed to send command to DB thread: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("database thread terminated unexpectedly"))?
    }

    /// Runs `task` atomically. The closure may run more than once when the
    /// database is contended, so it must not have side effects outside the
    /// transaction. Returning `Err` rolls everything back.
    pub async fn transaction<F, T>(&self, task: F) -> Result<T, RemoteError>
    where
        F: FnMut(&mut DocTransaction<'_>) -> Result<T, RemoteError> + Send + 'static,
        T: Send + 'static,
    {
        let watchers = Arc::clone(&self.watchers);
        let now_ms = self.clock.now_ms();
        self.execute(move |conn| Ok(run_transaction(conn, &watchers, now_ms, task)))
            .await?
    }

    /// Subscribes to one document. The watch first yields the current state,
    /// then every committed change.
    pub async fn watch_document(&self, path: &DocPath) -> Result<DocumentWatch, RemoteError> {
        let watchers = Arc::clone(&self.watchers);
        let path = path.clone();
        self.execute(move |conn| {
            let current = read_document(conn, &path).map_err(anyhow::Error::from)?;
            Ok(watchers.register(&path, current))
        })
        .await
        .map_err(RemoteError::from)
    }
}

fn run_transaction<F, T>(
    conn: &mut Connection,
    watchers: &WatchRegistry,
    now_ms: i64,
    mut task: F,
) -> Result<T, RemoteError>
where
    F: FnMut(&mut DocTransaction<'_>) -> Result<T, RemoteError>,
{
    let mut attempts = 0;
    loop {
        attempts += 1;
        match attempt_transaction(conn, now_ms, &mut task) {
            Ok((value, changes)) => {
                watchers.publish(changes);
                return Ok(value);
            }
            Err(err) if err.is_busy() => {
                if attempts >= MAX_TRANSACTION_ATTEMPTS {
                    return Err(RemoteError::TransactionConflict { attempts });
                }
                thread::sleep(busy_backoff(attempts));
            }
            Err(err) => return Err(err),
        }
    }
}

fn attempt_transaction<F, T>(
    conn: &mut Connection,
    now_ms: i64,
    task: &mut F,
) -> Result<(T, Vec<DocChange>), RemoteError>
where
    F: FnMut(&mut DocTransaction<'_>) -> Result<T, RemoteError>,
{
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let mut doc_tx = DocTransaction::new(&tx, now_ms);
    let value = task(&mut doc_tx)?;
    let changes = doc_tx.into_changes();
    tx.commit()?;
    Ok((value, changes))
}

/// Linear backoff with +/-25% jitter.
fn busy_backoff(attempts: u32) -> Duration {
    let base_ms = u64::from(attempts).saturating_mul(10).min(500);
    let jitter_range = base_ms / 4;
    let jitter = if jitter_range > 0 {
        rand::random::<u64>() % (jitter_range * 2 + 1)
    } else {
        0
    };
    Duration::from_millis(base_ms.saturating_sub(jitter_range) + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Query, SetMode};
    use crate::utils::SystemClock;

    fn db() -> Database {
        Database::in_memory(Arc::new(SystemClock)).unwrap()
    }

    #[tokio::test]
    async fn failed_transaction_leaves_no_trace() {
        let db = db();
        let path = DocPath::new("users", "u1").unwrap();

        let target = path.clone();
        let result: Result<(), RemoteError> = db
            .transaction(move |tx| {
                tx.set(&target, crate::fields! { "name" => "x" }, SetMode::Overwrite)?;
                Err(RemoteError::PermissionDenied("nope".into()))
            })
            .await;
        assert!(matches!(result, Err(RemoteError::PermissionDenied(_))));

        let target = path.clone();
        let found = db.transaction(move |tx| tx.get(&target)).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn watch_sees_initial_state_and_committed_writes() {
        let db = db();
        let path = DocPath::new("users", "u1").unwrap();
        let mut watch = db.watch_document(&path).await.unwrap();

        assert!(watch.next().await.unwrap().document.is_none());

        let target = path.clone();
        db.transaction(move |tx| {
            tx.set(&target, crate::fields! { "streak" => 2 }, SetMode::Merge)
        })
        .await
        .unwrap();

        let snapshot = watch.next().await.unwrap();
        let document = snapshot.document.unwrap();
        assert_eq!(document.data["streak"], 2);
    }

    #[tokio::test]
    async fn watch_closes_when_database_drops() {
        let db = db();
        let path = DocPath::new("users", "u1").unwrap();
        let mut watch = db.watch_document(&path).await.unwrap();
        watch.next().await.unwrap();

        drop(db);
        assert!(watch.next().await.is_err());
    }

    #[tokio::test]
    async fn transaction_retries_until_conflict_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("busy.sqlite3");
        let db = Database::new(path.clone(), Arc::new(SystemClock)).unwrap();

        // A second connection holding the write lock keeps every attempt busy.
        let blocker = Connection::open(&path).unwrap();
        blocker.execute_batch("BEGIN IMMEDIATE").unwrap();

        let result = db
            .transaction(|tx| tx.count(&Query::collection("users")))
            .await;
        assert!(matches!(
            result,
            Err(RemoteError::TransactionConflict { attempts: MAX_TRANSACTION_ATTEMPTS })
        ));

        blocker.execute_batch("ROLLBACK").unwrap();
        assert_eq!(
            db.transaction(|tx| tx.count(&Query::collection("users")))
                .await
                .unwrap(),
            0
        );
    }

    #[test]
    fn backoff_grows_linearly_within_jitter() {
        for attempt in 1..=5 {
            let base = u64::from(attempt) * 10;
            let delay = busy_backoff(attempt).as_millis() as u64;
            assert!(delay >= base - base / 4 && delay <= base + base / 4);
        }
    }
}

//! Live queries: query results that recompute whenever their tables change.
//!
//! A [`LiveQuery`] owns a background worker that runs the query once, then
//! waits on the database change broadcast and re-runs the query every time a
//! committed write touches one of the watched tables. Results are published
//! through a tokio `watch` channel, so a consumer always sees the latest
//! result set and never a backlog. Dropping the `LiveQuery` stops the worker.

use std::sync::Arc;

use rusqlite::Connection;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use br_core::error::BrResult;

use crate::db::{Database, Table};

/// Failure of one live-query evaluation, delivered as a value on the stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct QueryError(pub String);

/// One emission of a live query.
pub type LiveResult<T> = Result<T, QueryError>;

/// A continuously updating query result.
pub struct LiveQuery<T> {
    rx: watch::Receiver<Option<LiveResult<T>>>,
    worker: JoinHandle<()>,
}

impl<T> LiveQuery<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Latest emitted result, or `None` before the first evaluation finished.
    pub fn current(&self) -> Option<LiveResult<T>> {
        self.rx.borrow().clone()
    }

    /// Wait for the next emission. Returns `None` once the worker has stopped.
    pub async fn next(&mut self) -> Option<LiveResult<T>> {
        self.rx.changed().await.ok()?;
        self.rx.borrow_and_update().clone()
    }

    /// Wait until a successful emission satisfies `pred`, checking the
    /// current value first.
    pub async fn wait_until<P>(&mut self, mut pred: P) -> Option<T>
    where
        P: FnMut(&T) -> bool,
    {
        loop {
            if let Some(Ok(value)) = self.rx.borrow_and_update().as_ref() {
                if pred(value) {
                    return Some(value.clone());
                }
            }
            if self.rx.changed().await.is_err() {
                return None;
            }
        }
    }
}

impl<T> Drop for LiveQuery<T> {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

impl Database {
    /// Start a live query over `tables`.
    ///
    /// Must be called from within a tokio runtime. The query closure runs on
    /// the blocking thread pool.
    pub fn watch<T, F>(&self, tables: &[Table], query: F) -> LiveQuery<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(&Connection) -> BrResult<T> + Send + Sync + 'static,
    {
        let (tx, rx) = watch::channel(None);
        // Subscribe before the first evaluation so no commit slips between the two.
        let mut changes = self.subscribe_changes();
        let db = self.clone();
        let tables = tables.to_vec();
        let query = Arc::new(query);

        let worker = tokio::spawn(async move {
            loop {
                let result = evaluate(&db, query.clone()).await;
                if tx.send(Some(result)).is_err() {
                    return;
                }

                loop {
                    match changes.recv().await {
                        Ok(change) if change.touches(&tables) => break,
                        Ok(_) => continue,
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            debug!("live query lagged by {n} change sets, recomputing");
                            break;
                        }
                        Err(broadcast::error::RecvError::Closed) => return,
                    }
                }
            }
        });

        LiveQuery { rx, worker }
    }
}

async fn evaluate<T, F>(db: &Database, query: Arc<F>) -> LiveResult<T>
where
    T: Send + 'static,
    F: Fn(&Connection) -> BrResult<T> + Send + Sync + 'static,
{
    let db = db.clone();
    let joined = tokio::task::spawn_blocking(move || db.read(|conn| query(conn))).await;
    match joined {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            warn!("live query failed: {e}");
            Err(QueryError(e.to_string()))
        }
        Err(e) => Err(QueryError(format!("live query worker failed: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use br_core::config::DatabaseConfig;
    use br_core::error::BrError;
    use tempfile::TempDir;

    fn test_db() -> (Database, TempDir) {
        let dir = TempDir::new().unwrap();
        let db = Database::init(&dir.path().join("live.db"), &DatabaseConfig::default()).unwrap();
        (db, dir)
    }

    fn photo_count(conn: &Connection) -> BrResult<i64> {
        conn.query_row("SELECT COUNT(*) FROM photos", [], |row| row.get(0))
            .map_err(|e| BrError::Database(e.to_string()))
    }

    fn insert_photo(db: &Database, url: &str) {
        db.write(|conn| {
            conn.execute("INSERT INTO photos (name, url) VALUES ('p', ?1)", [url])
                .map_err(|e| BrError::Database(e.to_string()))?;
            Ok(())
        })
        .unwrap();
    }

    #[tokio::test]
    async fn test_initial_value_then_recompute() {
        let (db, _dir) = test_db();
        let mut live = db.watch(&[Table::Photos], photo_count);

        assert_eq!(live.next().await, Some(Ok(0)));
        insert_photo(&db, "https://img/1.png");
        assert_eq!(live.wait_until(|n| *n == 1).await, Some(1));
    }

    #[tokio::test]
    async fn test_unrelated_tables_do_not_recompute() {
        let (db, _dir) = test_db();
        let mut live = db.watch(&[Table::Incidents], photo_count);
        assert_eq!(live.next().await, Some(Ok(0)));

        insert_photo(&db, "https://img/1.png");
        let waited = tokio::time::timeout(std::time::Duration::from_millis(100), live.next()).await;
        assert!(waited.is_err(), "photos write must not wake an incidents watcher");
    }

    #[tokio::test]
    async fn test_query_failure_is_a_value() {
        let (db, _dir) = test_db();
        let mut live = db.watch(&[Table::Photos], |conn: &Connection| -> BrResult<i64> {
            conn.query_row("SELECT COUNT(*) FROM no_such_table", [], |row| row.get(0))
                .map_err(|e| BrError::Database(e.to_string()))
        });
        let first = live.next().await.unwrap();
        assert!(first.is_err());
    }
}

//! Database initialization, connection pooling, and change notification.
//!
//! Uses SQLite in WAL mode with r2d2 connection pooling. Every pooled
//! connection carries an update hook that records which tables a write
//! touched; once a [`Database::write`] transaction commits, the collected
//! tables are broadcast as a [`ChangeSet`] so live queries can recompute.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::hooks::Action;
use rusqlite::{Connection, TransactionBehavior};
use tokio::sync::broadcast;
use tracing::{debug, error, info};

use br_core::config::DatabaseConfig;
use br_core::constants::CHANGE_CHANNEL_CAPACITY;
use br_core::error::{BrError, BrResult};

use crate::migrations;
use crate::schema;

/// Type alias for the SQLite connection pool.
pub type DbPool = Pool<SqliteConnectionManager>;

/// Pooled connection handed out by [`Database::conn`].
pub type PooledConn = r2d2::PooledConnection<SqliteConnectionManager>;

/// Tables whose changes are tracked and broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Table {
    Roles,
    Photos,
    Users,
    Incidents,
    Messages,
    RecipientCopies,
    Conversations,
    ConversationParticipants,
}

impl Table {
    /// Every tracked table.
    pub const ALL: [Table; 8] = [
        Table::Roles,
        Table::Photos,
        Table::Users,
        Table::Incidents,
        Table::Messages,
        Table::RecipientCopies,
        Table::Conversations,
        Table::ConversationParticipants,
    ];

    /// SQL table name.
    pub fn name(&self) -> &'static str {
        match self {
            Table::Roles => "roles",
            Table::Photos => "photos",
            Table::Users => "users",
            Table::Incidents => "incidents",
            Table::Messages => "messages",
            Table::RecipientCopies => "recipient_copies",
            Table::Conversations => "conversations",
            Table::ConversationParticipants => "conversation_participants",
        }
    }

    /// Reverse of [`Table::name`]. Untracked tables yield `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.name() == name)
    }
}

/// Set of tables modified by one committed write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSet {
    tables: Vec<Table>,
}

impl ChangeSet {
    /// Tables in this change, sorted.
    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    /// Whether any of `watched` was modified.
    pub fn touches(&self, watched: &[Table]) -> bool {
        watched.iter().any(|t| self.tables.contains(t))
    }
}

/// Collects table names from the SQLite update hook and publishes them on commit.
///
/// Writers are serialized by the IMMEDIATE transaction lock, so the pending
/// set only ever holds tables of the transaction currently writing.
struct ChangeTracker {
    pending: Mutex<BTreeSet<Table>>,
    sender: broadcast::Sender<ChangeSet>,
}

impl ChangeTracker {
    fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            pending: Mutex::new(BTreeSet::new()),
            sender,
        }
    }

    fn record(&self, table: &str) {
        if let Some(table) = Table::from_name(table) {
            if let Ok(mut pending) = self.pending.lock() {
                pending.insert(table);
            }
        }
    }

    /// Take the tables recorded so far. Called while the writer still holds
    /// the SQLite write lock, so the set belongs to that transaction alone.
    fn take(&self) -> BTreeSet<Table> {
        match self.pending.lock() {
            Ok(mut pending) => std::mem::take(&mut *pending),
            Err(_) => BTreeSet::new(),
        }
    }

    fn publish(&self, tables: BTreeSet<Table>) {
        if tables.is_empty() {
            return;
        }
        let change = ChangeSet {
            tables: tables.into_iter().collect(),
        };
        match self.sender.send(change.clone()) {
            Ok(count) => debug!("change set {:?} delivered to {count} watcher(s)", change.tables),
            Err(_) => debug!("change set {:?} has no watchers", change.tables),
        }
    }
}

/// Database wrapper providing initialization, pooling, transactions and change notification.
#[derive(Clone)]
pub struct Database {
    pool: Arc<DbPool>,
    tracker: Arc<ChangeTracker>,
}

impl Database {
    /// Initialize the database at the given path with the provided configuration.
    ///
    /// This:
    /// 1. Creates the database file and parent directories if needed
    /// 2. Sets up connection pooling with pragmas and the change hook
    /// 3. Runs integrity checks if configured
    /// 4. Creates the schema tables and runs pending migrations (role seed)
    pub fn init(db_path: &Path, config: &DatabaseConfig) -> BrResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        info!("initializing database at {}", db_path.display());

        let tracker = Arc::new(ChangeTracker::new());
        let manager = SqliteConnectionManager::file(db_path);
        let pool = Pool::builder()
            .max_size(config.pool_size.max(1))
            .connection_customizer(Box::new(ConnectionCustomizer {
                wal_mode: config.wal_mode,
                tracker: tracker.clone(),
            }))
            .build(manager)
            .map_err(|e| BrError::Pool(e.to_string()))?;

        let db = Self {
            pool: Arc::new(pool),
            tracker,
        };

        if config.integrity_check_on_startup {
            db.run_integrity_check()?;
        }

        db.write(|conn| {
            schema::create_tables(conn)?;
            migrations::run_migrations(conn)
        })?;

        info!("database initialized successfully");
        Ok(db)
    }

    /// Get a connection from the pool.
    ///
    /// Writes made directly on this connection are only announced to
    /// watchers on the next committed [`Database::write`]; prefer `write`.
    pub fn conn(&self) -> BrResult<PooledConn> {
        self.pool.get().map_err(|e| BrError::Pool(e.to_string()))
    }

    /// Get a reference to the underlying pool.
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Run a read-only closure on a pooled connection.
    pub fn read<T, F>(&self, f: F) -> BrResult<T>
    where
        F: FnOnce(&Connection) -> BrResult<T>,
    {
        let conn = self.conn()?;
        f(&conn)
    }

    /// Execute a closure inside an IMMEDIATE transaction and announce the
    /// touched tables after commit.
    ///
    /// Either every statement of `f` lands or none does.
    pub fn write<T, F>(&self, f: F) -> BrResult<T>
    where
        F: FnOnce(&Connection) -> BrResult<T>,
    {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| BrError::Database(e.to_string()))?;

        let outcome = f(&tx);
        // Still inside the IMMEDIATE transaction: no other writer can record now.
        let touched = self.tracker.take();

        let result = match outcome {
            Ok(result) => result,
            Err(e) => {
                drop(tx);
                return Err(e);
            }
        };

        tx.commit().map_err(|e| BrError::Database(e.to_string()))?;
        self.tracker.publish(touched);

        Ok(result)
    }

    /// Subscribe to committed change sets.
    pub fn subscribe_changes(&self) -> broadcast::Receiver<ChangeSet> {
        self.tracker.sender.subscribe()
    }

    /// Run a SQLite integrity check.
    pub fn run_integrity_check(&self) -> BrResult<()> {
        let conn = self.conn()?;
        let result: String = conn
            .query_row("PRAGMA integrity_check", [], |row| row.get(0))
            .map_err(|e| BrError::Database(e.to_string()))?;

        if result != "ok" {
            error!("database integrity check failed: {result}");
            return Err(BrError::IntegrityCheck(result));
        }

        debug!("database integrity check passed");
        Ok(())
    }

    /// Get database statistics (row counts per table).
    pub fn stats(&self) -> BrResult<DatabaseStats> {
        let conn = self.conn()?;
        let count = |table: Table| -> BrResult<i64> {
            let sql = format!("SELECT COUNT(*) FROM {}", table.name());
            conn.query_row(&sql, [], |row| row.get(0))
                .map_err(|e| BrError::Database(e.to_string()))
        };

        Ok(DatabaseStats {
            roles: count(Table::Roles)?,
            photos: count(Table::Photos)?,
            users: count(Table::Users)?,
            incidents: count(Table::Incidents)?,
            messages: count(Table::Messages)?,
            recipient_copies: count(Table::RecipientCopies)?,
            conversations: count(Table::Conversations)?,
        })
    }
}

/// Database row count statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseStats {
    pub roles: i64,
    pub photos: i64,
    pub users: i64,
    pub incidents: i64,
    pub messages: i64,
    pub recipient_copies: i64,
    pub conversations: i64,
}

impl std::fmt::Display for DatabaseStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "roles={}, photos={}, users={}, incidents={}, messages={}, recipient_copies={}, conversations={}",
            self.roles, self.photos, self.users, self.incidents, self.messages,
            self.recipient_copies, self.conversations
        )
    }
}

/// r2d2 connection customizer that applies PRAGMA settings and installs the change hook.
struct ConnectionCustomizer {
    wal_mode: bool,
    tracker: Arc<ChangeTracker>,
}

impl std::fmt::Debug for ConnectionCustomizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionCustomizer")
            .field("wal_mode", &self.wal_mode)
            .finish()
    }
}

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for ConnectionCustomizer {
    fn on_acquire(&self, conn: &mut Connection) -> Result<(), rusqlite::Error> {
        if self.wal_mode {
            conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        }

        conn.execute_batch(
            "PRAGMA synchronous=NORMAL;
             PRAGMA temp_store=MEMORY;
             PRAGMA busy_timeout=5000;
             PRAGMA foreign_keys=ON;",
        )?;

        let tracker = self.tracker.clone();
        conn.update_hook(Some(move |_action: Action, _db: &str, table: &str, _rowid: i64| {
            tracker.record(table);
        }));

        Ok(())
    }
}

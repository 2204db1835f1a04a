use crate::core::error::Result;
use rusqlite::Connection;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

const BUSY_TIMEOUT_SECS: u64 = 5;

pub fn db_connect(db_path: &str) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure(&conn)?;
    Ok(conn)
}

fn configure(conn: &Connection) -> Result<()> {
    conn.busy_timeout(Duration::from_secs(BUSY_TIMEOUT_SECS))?;
    Ok(())
}

/// Shared handle to one SQLite connection.
///
/// Cloning is cheap and every clone talks to the same connection, so any
/// number of collections can batch writes into one transaction. Writes open a
/// transaction lazily; nothing is durable until [`Store::commit`].
#[derive(Debug, Clone)]
pub struct Store {
    conn: Rc<Connection>,
}

impl Store {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = db_connect(&path.as_ref().to_string_lossy())?;
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        configure(&conn)?;
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Rc::new(conn),
        }
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }

    /// Opens a transaction unless one is already active. Returns whether this
    /// call opened it.
    pub(crate) fn begin_write(&self) -> Result<bool> {
        if self.conn.is_autocommit() {
            self.conn.execute_batch("BEGIN")?;
            tracing::trace!("transaction opened");
            return Ok(true);
        }
        Ok(false)
    }

    /// Runs `f` as one all-or-nothing write inside the current transaction.
    ///
    /// On error every statement `f` executed is undone, while writes batched
    /// earlier in the same transaction are kept. A transaction opened only for
    /// `f` is rolled back entirely.
    pub(crate) fn write_atomically<R>(&self, f: impl FnOnce() -> Result<R>) -> Result<R> {
        let opened = self.begin_write()?;
        self.conn.execute_batch("SAVEPOINT goatfish_write")?;
        match f() {
            Ok(value) => {
                self.conn.execute_batch("RELEASE goatfish_write")?;
                Ok(value)
            }
            Err(e) => {
                let undo = if opened {
                    self.conn.execute_batch("ROLLBACK")
                } else {
                    self.conn
                        .execute_batch("ROLLBACK TO goatfish_write; RELEASE goatfish_write")
                };
                if let Err(undo_err) = undo {
                    tracing::warn!(error = %undo_err, "failed to undo partial write");
                }
                Err(e)
            }
        }
    }

    pub fn commit(&self) -> Result<()> {
        if self.in_transaction() {
            self.conn.execute_batch("COMMIT")?;
            tracing::debug!("transaction committed");
        }
        Ok(())
    }

    pub fn rollback(&self) -> Result<()> {
        if self.in_transaction() {
            self.conn.execute_batch("ROLLBACK")?;
            tracing::debug!("transaction rolled back");
        }
        Ok(())
    }

    /// Row count of an arbitrary table; used by diagnostics and tests.
    pub fn table_count(&self, table: &str) -> Result<i64> {
        crate::core::schemas::validate_ident(table)?;
        let count = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM \"{}\"", table), [], |row| {
                row.get(0)
            })?;
        Ok(count)
    }
}

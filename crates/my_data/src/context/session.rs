//! Transaction owner shared by both context kinds.
//!
//! # Invariants
//! - A transaction is open from `begin` until `commit`/`rollback`.
//! - Dropping an unfinished session rolls back.

use crate::error::DataResult;
use log::{debug, warn};
use rusqlite::Connection;

#[derive(Debug)]
pub(crate) struct Session {
    conn: Connection,
    finished: bool,
}

impl Session {
    pub(crate) fn begin(conn: Connection) -> DataResult<Self> {
        conn.execute_batch("BEGIN DEFERRED;")?;
        Ok(Self {
            conn,
            finished: false,
        })
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    pub(crate) fn commit(mut self) -> DataResult<()> {
        self.conn.execute_batch("COMMIT;")?;
        self.finished = true;
        debug!("event=session_end module=context status=ok outcome=commit");
        Ok(())
    }

    pub(crate) fn rollback(mut self) -> DataResult<()> {
        self.finished = true;
        self.conn.execute_batch("ROLLBACK;")?;
        debug!("event=session_end module=context status=ok outcome=rollback");
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        match self.conn.execute_batch("ROLLBACK;") {
            Ok(()) => debug!("event=session_end module=context status=ok outcome=drop_rollback"),
            Err(err) => warn!(
                "event=session_end module=context status=error outcome=drop_rollback error={err}"
            ),
        }
    }
}

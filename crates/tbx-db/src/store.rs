use rusqlite::Connection;
use tbx_core::error::TestboxError;
use tbx_core::store::Store;

use crate::directory_repo::{MachineRepo, UserRepo};
use crate::event_repo::EventRepo;
use crate::session_repo::SessionRepo;

pub struct DbStore {
    conn: Connection,
}

impl DbStore {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl Store for DbStore {
    type Sessions<'a>
        = SessionRepo<'a>
    where
        Self: 'a;
    type Users<'a>
        = UserRepo<'a>
    where
        Self: 'a;
    type Machines<'a>
        = MachineRepo<'a>
    where
        Self: 'a;
    type Events<'a>
        = EventRepo<'a>
    where
        Self: 'a;

    fn sessions(&self) -> Self::Sessions<'_> {
        SessionRepo::new(&self.conn)
    }

    fn users(&self) -> Self::Users<'_> {
        UserRepo::new(&self.conn)
    }

    fn machines(&self) -> Self::Machines<'_> {
        MachineRepo::new(&self.conn)
    }

    fn events(&self) -> Self::Events<'_> {
        EventRepo::new(&self.conn)
    }

    fn with_tx<F, T>(&self, f: F) -> Result<T, TestboxError>
    where
        F: FnOnce(&Self) -> Result<T, TestboxError>,
    {
        self.conn
            .execute_batch("BEGIN IMMEDIATE")
            .map_err(|err| TestboxError::Internal {
                message: err.to_string(),
            })?;
        let result = f(self);
        match result {
            Ok(value) => {
                self.conn
                    .execute_batch("COMMIT")
                    .map_err(|err| TestboxError::Internal {
                        message: err.to_string(),
                    })?;
                Ok(value)
            }
            Err(err) => {
                self.conn
                    .execute_batch("ROLLBACK")
                    .map_err(|rollback_err| TestboxError::Internal {
                        message: rollback_err.to_string(),
                    })?;
                Err(err)
            }
        }
    }
}

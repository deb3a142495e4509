use crate::util::{decode_enum, encode_enum, from_rfc3339, to_rfc3339};
use rusqlite::Connection;
use tbx_core::error::TestboxError;
use tbx_core::events::EventRepository;
use tbx_core::types::enums::EventSource;
use tbx_core::types::event::EventRecord;
use tbx_core::types::ids::UserId;
use ulid::Ulid;

pub struct EventRepo<'a> {
    pub conn: &'a Connection,
}

impl<'a> EventRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

fn internal(err: impl std::fmt::Display) -> TestboxError {
    TestboxError::Internal {
        message: err.to_string(),
    }
}

impl<'a> EventRepository for EventRepo<'a> {
    fn append(&self, mut event: EventRecord) -> Result<EventRecord, TestboxError> {
        if event.id.is_empty() {
            event.id = format!("evt_{}", Ulid::new());
        }
        let body = serde_json::to_string(&event.body).map_err(internal)?;
        let sql = "INSERT INTO events (id, at, correlation_id, source, actor_id, body) VALUES (?1, ?2, ?3, ?4, ?5, ?6)";
        let params = (
            event.id.as_str(),
            to_rfc3339(&event.at),
            event.correlation_id.clone(),
            encode_enum(&event.source).map_err(internal)?,
            event.actor_id.as_str(),
            body,
        );
        self.conn.execute(sql, params).map_err(internal)?;
        event.seq = self.conn.last_insert_rowid();
        Ok(event)
    }

    fn list(
        &self,
        after: Option<i64>,
        limit: Option<u32>,
    ) -> Result<Vec<EventRecord>, TestboxError> {
        let mut stmt = self
            .conn
            .prepare("SELECT seq, id, at, correlation_id, source, actor_id, body FROM events WHERE seq > ?1 ORDER BY seq ASC LIMIT ?2")
            .map_err(internal)?;
        // SQLite treats a negative LIMIT as unbounded.
        let limit = limit.map_or(-1_i64, i64::from);
        let mut rows = stmt
            .query((after.unwrap_or(0), limit))
            .map_err(internal)?;
        let mut events = Vec::new();
        while let Some(row) = rows.next().map_err(internal)? {
            let seq: i64 = row.get(0).map_err(internal)?;
            let id: String = row.get(1).map_err(internal)?;
            let at: String = row.get(2).map_err(internal)?;
            let correlation_id: Option<String> = row.get(3).map_err(internal)?;
            let source: String = row.get(4).map_err(internal)?;
            let actor_id: String = row.get(5).map_err(internal)?;
            let body: String = row.get(6).map_err(internal)?;

            let source: EventSource = decode_enum(&source).map_err(internal)?;
            events.push(EventRecord {
                id,
                seq,
                at: from_rfc3339(&at).map_err(internal)?,
                correlation_id,
                source,
                actor_id: UserId::new(actor_id).map_err(internal)?,
                body: serde_json::from_str(&body).map_err(internal)?,
            });
        }
        Ok(events)
    }
}

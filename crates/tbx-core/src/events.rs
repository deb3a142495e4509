use crate::error::TestboxError;
use crate::types::event::EventRecord;

pub trait EventRepository {
    fn append(&self, event: EventRecord) -> Result<EventRecord, TestboxError>;
    fn list(
        &self,
        after: Option<i64>,
        limit: Option<u32>,
    ) -> Result<Vec<EventRecord>, TestboxError>;
}

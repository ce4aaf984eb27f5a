/// All primary keys are application-generated UUIDs (v7, time-ordered).
pub type DbId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Generate a fresh, time-ordered entity id.
pub fn new_id() -> DbId {
    uuid::Uuid::now_v7()
}

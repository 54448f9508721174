use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use chrono::Utc;
use uuid::Uuid;

pub const TRANSACTION_PREFIX: &str = "TXN";
pub const SCHEDULE_PREFIX: &str = "SCH";

/// Generates transaction and schedule identifiers.
///
/// An id is `<prefix><start seconds><node><sequence>`: the start time and the random node are
/// drawn once when the generator is created, and the sequence is an atomic counter. Within one
/// generator ids never repeat; across restarts the start time and node keep them apart.
#[derive(Debug)]
pub struct IdGenerator {
    started_at: u64,
    node: u32,
    sequence: AtomicU64,
}

static SHARED: OnceLock<Arc<IdGenerator>> = OnceLock::new();

impl IdGenerator {
    pub fn new() -> Self {
        let random = Uuid::new_v4();
        let bytes = random.as_bytes();
        let node = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        Self::with_seed(Utc::now().timestamp().max(0) as u64, node)
    }

    pub fn with_seed(started_at: u64, node: u32) -> Self {
        Self {
            started_at,
            node,
            sequence: AtomicU64::new(0),
        }
    }

    /// The process-wide generator, created on first use.
    pub fn shared() -> Arc<IdGenerator> {
        SHARED.get_or_init(|| Arc::new(IdGenerator::new())).clone()
    }

    pub fn next_transaction_id(&self) -> String {
        self.next_id(TRANSACTION_PREFIX)
    }

    pub fn next_schedule_id(&self) -> String {
        self.next_id(SCHEDULE_PREFIX)
    }

    fn next_id(&self, prefix: &str) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!("{prefix}{:010}{:08X}{seq:06}", self.started_at, self.node)
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

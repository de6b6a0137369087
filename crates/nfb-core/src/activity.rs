use std::collections::{HashMap, VecDeque};

use chrono::Local;
use tokio::sync::Mutex;

use crate::domain::UserId;

pub const START_ISSUED: &str = "/start command issued";
pub const HELP_ISSUED: &str = "/help command issued";
pub const STOP_ISSUED: &str = "/stop command issued";
pub const SCHEDULE_ISSUED: &str = "/schedule command issued";
pub const CHECK_COMPLETED: &str = "Non-follower check completed";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActivityEntry {
    pub label: String,
    pub timestamp: String,
}

/// In-memory, per-user record of what each user asked the bot to do.
///
/// Each user keeps at most `capacity` entries; the oldest are dropped first.
/// Nothing survives a restart.
#[derive(Debug)]
pub struct ActivityLog {
    capacity: usize,
    entries: Mutex<HashMap<UserId, VecDeque<ActivityEntry>>>,
}

impl ActivityLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub async fn record(&self, user_id: UserId, label: &str) {
        let entry = ActivityEntry {
            label: label.to_string(),
            timestamp: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        };
        tracing::info!(user_id = user_id.0, label, "activity");

        let mut map = self.entries.lock().await;
        let log = map.entry(user_id).or_default();
        if log.len() >= self.capacity {
            log.pop_front();
        }
        log.push_back(entry);
    }

    /// Entries for `user_id`, oldest first.
    pub async fn entries(&self, user_id: UserId) -> Vec<ActivityEntry> {
        self.entries
            .lock()
            .await
            .get(&user_id)
            .map(|log| log.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn appends_in_order_per_user() {
        let log = ActivityLog::new(10);
        log.record(UserId(1), START_ISSUED).await;
        log.record(UserId(2), HELP_ISSUED).await;
        log.record(UserId(1), CHECK_COMPLETED).await;

        let labels: Vec<String> = log
            .entries(UserId(1))
            .await
            .into_iter()
            .map(|e| e.label)
            .collect();
        assert_eq!(labels, vec![START_ISSUED, CHECK_COMPLETED]);
        assert_eq!(log.entries(UserId(2)).await.len(), 1);
        assert!(log.entries(UserId(3)).await.is_empty());
    }

    #[tokio::test]
    async fn drops_oldest_past_capacity() {
        let log = ActivityLog::new(2);
        log.record(UserId(1), START_ISSUED).await;
        log.record(UserId(1), HELP_ISSUED).await;
        log.record(UserId(1), STOP_ISSUED).await;

        let entries = log.entries(UserId(1)).await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].label, HELP_ISSUED);
        assert_eq!(entries[1].label, STOP_ISSUED);
    }

    #[tokio::test]
    async fn timestamps_use_local_wall_clock_format() {
        let log = ActivityLog::new(1);
        log.record(UserId(1), START_ISSUED).await;
        let ts = &log.entries(UserId(1)).await[0].timestamp;
        // YYYY-MM-DD HH:MM:SS
        assert_eq!(ts.len(), 19);
        assert_eq!(&ts[4..5], "-");
        assert_eq!(&ts[10..11], " ");
    }
}

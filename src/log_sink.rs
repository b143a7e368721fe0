//! Durable event sink: every significant action is appended to a flat log
//! file and to the `logs` table, fire-and-forget. Grounded in
//! `original_source/logger.c`, which appends `"%Y-%m-%d %H:%M:%S - %s\n"`
//! lines to `data/logs.txt`.

use chrono::Local;
use log::warn;
use std::fs::OpenOptions;
use std::io::Write;

use crate::store::Store;

/// Records one event to both the durable flat file and the `logs` table.
/// Neither failure is propagated to the caller — logging must never break
/// the request it's describing.
pub async fn record(store: &Store, log_file: &str, user_id: Option<i64>, event_type: &str, description: &str) {
    if let Err(err) = store.add_log(user_id, event_type, description).await {
        warn!("failed to write log row: {}", err);
    }
    if let Err(err) = append_file(log_file, event_type, description) {
        warn!("failed to append to {}: {}", log_file, err);
    }
}

fn append_file(path: &str, event_type: &str, description: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    writeln!(file, "{} - {}: {}", timestamp, event_type, description)
}

#[cfg(all(test, feature = "sql"))]
mod tests {
    use super::*;
    use crate::store::Store;

    #[tokio::test]
    async fn record_writes_to_both_sinks() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("events.log");
        let store = Store::open_in_memory().await.unwrap();

        record(
            &store,
            log_path.to_str().unwrap(),
            None,
            "REGISTER",
            "user 'alice' registered",
        )
        .await;

        let contents = std::fs::read_to_string(&log_path).unwrap();
        assert!(contents.contains("REGISTER: user 'alice' registered"));
    }

    #[test]
    fn append_file_creates_parent_less_path_on_demand() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fresh.log");
        append_file(path.to_str().unwrap(), "LOGIN", "user 'bob' logged in").unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.ends_with("LOGIN: user 'bob' logged in\n"));
    }
}

//! Once-a-second auto-submit sweep (component 4.F), grounded in
//! `original_source/server.c::monitor_exam_thread`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::interval;

use crate::room::GlobalState;

pub async fn run(state: Arc<Mutex<GlobalState>>) {
    let mut ticker = interval(Duration::from_secs(1));
    loop {
        ticker.tick().await;
        let mut guard = state.lock().await;
        guard.sweep_expired().await;
    }
}

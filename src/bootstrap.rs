//! Startup sequencing (component 4.G), grounded in
//! `original_source/server.c::main`: open the store, seed the question
//! bank, optionally load an external SQL seed file, then rehydrate every
//! non-finished room into memory.

use log::info;

use crate::config::Config;
use crate::error::ServerError;
use crate::room::{GlobalState, Participant, RoomState};
use crate::seed;
use crate::store::Store;

pub async fn build(config: &Config) -> Result<GlobalState, ServerError> {
    let store = Store::open(&config.db_path).await?;

    seed::load_if_empty(&store).await?;

    if let Some(path) = &config.seed_file {
        match std::fs::read_to_string(path) {
            Ok(sql) => {
                store.exec_sql_file(&sql).await?;
                info!("loaded external seed file {}", path);
            }
            Err(err) => {
                info!("no external seed file loaded ({}: {})", path, err);
            }
        }
    }

    let mut state = GlobalState::new(store, config.admin_secret.clone(), config.logging.file.clone());
    rehydrate(&mut state).await?;
    Ok(state)
}

/// Reloads every non-finished room from the store. Per §3 Invariant 6,
/// every in-progress participant's timer is implicitly reset to "now"
/// here (each `Participant` is freshly constructed with `Instant::now()`)
/// and attempt history is always empty, since history is never persisted.
async fn rehydrate(state: &mut GlobalState) -> Result<(), ServerError> {
    let rooms = state.store.load_all_rooms().await?;
    for room_row in rooms {
        let questions = state.store.room_questions(room_row.id).await?;
        let participant_rows = state.store.room_participants(room_row.id).await?;

        let mut participants = Vec::with_capacity(participant_rows.len());
        for row in participant_rows {
            let mut participant = Participant::new(row.id, row.user_id, row.username, questions.len());
            if let Some(score) = row.score {
                participant.score = score;
                participant.answers = state.store.participant_answers(row.id, questions.len()).await?;
            }
            participants.push(participant);
        }

        state.insert_rehydrated(RoomState {
            id: room_row.id,
            name: room_row.name,
            owner_id: room_row.owner_id,
            owner_username: room_row.owner_username,
            duration_seconds: room_row.duration_seconds,
            questions,
            participants,
        });
    }
    info!("rehydrated {} room(s)", state.rooms().len());
    Ok(())
}

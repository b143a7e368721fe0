//! In-memory room registry (component 4.D), grounded in
//! `original_source/server.c`'s `Room`/`Participant` arrays and
//! `find_room`/`find_participant` helpers, and in the teacher's
//! `room/mod.rs` for the "struct per room holding mutable state" shape.

use std::time::Instant;

use log::info;

use crate::error::ServerError;
use crate::question_selector;
use crate::store::{LeaderboardRow, Question, Role, Store};

/// Bounded the same way `original_source/server.c`'s `rooms[MAX_ROOMS]` is.
const MAX_ROOMS: usize = 100;
/// Mirrors `original_source/server.c`'s `MAX_ATTEMPTS`.
const MAX_ATTEMPT_HISTORY: usize = 10;

pub struct Participant {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub answers: Vec<char>,
    /// -1 while the attempt is in progress.
    pub score: i64,
    pub history: Vec<i64>,
    pub start_time: Instant,
}

impl Participant {
    pub(crate) fn new(id: i64, user_id: i64, username: String, num_questions: usize) -> Self {
        Self {
            id,
            user_id,
            username,
            answers: vec!['.'; num_questions],
            score: -1,
            history: Vec::new(),
            start_time: Instant::now(),
        }
    }

    fn push_history(&mut self, score: i64) {
        if self.history.len() >= MAX_ATTEMPT_HISTORY {
            self.history.remove(0);
        }
        self.history.push(score);
    }
}

pub struct RoomState {
    pub id: i64,
    pub name: String,
    pub owner_id: i64,
    pub owner_username: String,
    pub duration_seconds: i64,
    pub questions: Vec<Question>,
    pub participants: Vec<Participant>,
}

impl RoomState {
    fn find_participant(&self, username: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.username == username)
    }

    fn find_participant_mut(&mut self, username: &str) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| p.username == username)
    }

    fn score_answers(&self, answers: &[char]) -> (i64, i64) {
        let mut score = 0i64;
        for (i, q) in self.questions.iter().enumerate() {
            if let Some(&letter) = answers.get(i) {
                if letter != '.' && letter.to_ascii_uppercase() == q.correct_option {
                    score += 1;
                }
            }
        }
        (score, self.questions.len() as i64)
    }
}

pub struct GlobalState {
    pub store: Store,
    pub admin_secret: String,
    pub log_file: String,
    rooms: Vec<RoomState>,
}

impl GlobalState {
    pub fn new(store: Store, admin_secret: String, log_file: String) -> Self {
        Self {
            store,
            admin_secret,
            log_file,
            rooms: Vec::new(),
        }
    }

    pub fn rooms(&self) -> &[RoomState] {
        &self.rooms
    }

    pub fn find_room(&self, name: &str) -> Option<&RoomState> {
        self.rooms.iter().find(|r| r.name == name)
    }

    pub fn find_room_mut(&mut self, name: &str) -> Option<&mut RoomState> {
        self.rooms.iter_mut().find(|r| r.name == name)
    }

    /// Called once at bootstrap to repopulate `rooms` from the store (§4.G).
    /// Participant timers are always reset to "now" (§3 Invariant 6).
    pub(crate) fn insert_rehydrated(&mut self, room: RoomState) {
        if self.rooms.len() < MAX_ROOMS {
            self.rooms.push(room);
        }
    }

    pub async fn create_room(
        &mut self,
        name: &str,
        owner_id: i64,
        owner_username: &str,
        num_questions: i64,
        duration_seconds: i64,
        topic_filter: &str,
        difficulty_filter: &str,
    ) -> Result<usize, ServerError> {
        if !(1..=50).contains(&num_questions) {
            return Err(ServerError::QuestionCountOutOfRange(num_questions));
        }
        if !(10..=86400).contains(&duration_seconds) {
            return Err(ServerError::DurationOutOfRange(duration_seconds));
        }
        if self.find_room(name).is_some() {
            return Err(ServerError::RoomAlreadyExists);
        }
        if self.rooms.len() >= MAX_ROOMS {
            return Err(ServerError::Internal(Box::new(std::io::Error::new(
                std::io::ErrorKind::Other,
                "room capacity reached",
            ))));
        }

        let questions = question_selector::select(&self.store, num_questions, topic_filter, difficulty_filter).await?;
        if questions.is_empty() {
            return Err(ServerError::NoMatchingQuestions);
        }

        let room_id = self.store.create_room(name, owner_id, duration_seconds).await?;
        for (order, q) in questions.iter().enumerate() {
            self.store.add_question_to_room(room_id, q.id, order as i64).await?;
        }

        let count = questions.len();
        self.rooms.push(RoomState {
            id: room_id,
            name: name.to_string(),
            owner_id,
            owner_username: owner_username.to_string(),
            duration_seconds,
            questions,
            participants: Vec::new(),
        });
        info!("admin {} created room {} with {} questions", owner_username, name, count);
        Ok(count)
    }

    /// Returns (numQuestions, remainingSeconds).
    pub async fn join_room(&mut self, room_name: &str, user_id: i64, username: &str) -> Result<(i64, i64), ServerError> {
        let room = self.find_room_mut(room_name).ok_or(ServerError::RoomNotFound)?;
        let num_questions = room.questions.len();

        if let Some(p) = room.find_participant_mut(username) {
            if p.score != -1 {
                p.push_history(p.score);
                p.score = -1;
                p.answers = vec!['.'; num_questions];
                p.start_time = Instant::now();
                self.store.reset_participant(p.id).await?;
            }
        } else {
            let participant_id = self.store.save_participant(room.id, user_id).await?;
            room.participants
                .push(Participant::new(participant_id, user_id, username.to_string(), num_questions));
        }

        let room = self.find_room(room_name).ok_or(ServerError::RoomNotFound)?;
        let participant = room.find_participant(username).ok_or(ServerError::RoomNotFound)?;
        let elapsed = participant.start_time.elapsed().as_secs() as i64;
        let remaining = (room.duration_seconds - elapsed).max(0);
        Ok((num_questions as i64, remaining))
    }

    /// Returns the question at `idx` plus the participant's current
    /// selection (space if unanswered or not joined/already submitted).
    pub fn get_question(&self, room_name: &str, idx: usize, username: &str) -> Result<(&Question, char), ServerError> {
        let room = self.find_room(room_name).ok_or(ServerError::RoomNotFound)?;
        let question = room.questions.get(idx).ok_or(ServerError::QuestionNotFound)?;
        let current = room
            .find_participant(username)
            .filter(|p| p.score == -1)
            .map(|p| *p.answers.get(idx).unwrap_or(&'.'))
            .map(|c| if c == '.' { ' ' } else { c })
            .unwrap_or(' ');
        Ok((question, current))
    }

    pub fn num_questions(&self, room_name: &str) -> Option<usize> {
        self.find_room(room_name).map(|r| r.questions.len())
    }

    /// In-room answer write. Per SPEC_FULL.md §4.E this is silently dropped
    /// (no response line at all, matching `original_source/server.c`'s
    /// ANSWER handler) when the room, participant, index, or submitted
    /// state disqualifies the write.
    pub fn answer_in_room(&mut self, room_name: &str, idx: usize, letter: char, username: &str) {
        if let Some(room) = self.find_room_mut(room_name) {
            if let Some(p) = room.find_participant_mut(username) {
                if p.score == -1 {
                    if let Some(slot) = p.answers.get_mut(idx) {
                        *slot = letter.to_ascii_uppercase();
                    }
                }
            }
        }
    }

    /// Scores the submitted answer string directly, matching the
    /// original's `SUBMIT name ans` handler: `ans` (not whatever
    /// `answer_in_room` had accumulated) is compared position-wise against
    /// each question's correct letter, and then overwrites the
    /// participant's stored answers. Returns the score, or an error if the
    /// participant isn't in the room or already submitted.
    pub async fn submit(&mut self, room_name: &str, username: &str, answer_string: &str) -> Result<i64, ServerError> {
        let room = self.find_room_mut(room_name).ok_or(ServerError::RoomNotFound)?;

        let already_submitted = room
            .find_participant(username)
            .map(|p| p.score != -1)
            .unwrap_or(true);
        if already_submitted {
            return Err(ServerError::AlreadySubmitted);
        }

        let num_questions = room.questions.len();
        let mut answers = vec!['.'; num_questions];
        for (slot, ch) in answers.iter_mut().zip(answer_string.chars()) {
            *slot = ch.to_ascii_uppercase();
        }
        let (score, total) = room.score_answers(&answers);

        let participant = room.find_participant_mut(username).unwrap();
        participant.score = score;
        participant.answers = answers.clone();
        let participant_id = participant.id;

        for (i, q) in room.questions.iter().enumerate() {
            let selected = answers[i];
            let is_correct = selected != '.' && selected == q.correct_option;
            self.store.save_answer(participant_id, q.id, selected, is_correct).await?;
        }
        self.store.save_result(participant_id, room.id, score, total, score).await?;

        info!("user {} submitted in room {}: {}/{}", username, room_name, score, total);
        Ok(score)
    }

    pub fn results(&self, room_name: &str) -> Result<Vec<(&str, &[i64], Option<i64>)>, ServerError> {
        let room = self.find_room(room_name).ok_or(ServerError::RoomNotFound)?;
        Ok(room
            .participants
            .iter()
            .map(|p| {
                let score = if p.score != -1 { Some(p.score) } else { None };
                (p.username.as_str(), p.history.as_slice(), score)
            })
            .collect())
    }

    pub fn preview(&self, room_name: &str, username: &str) -> Result<&[Question], ServerError> {
        let room = self.find_room(room_name).ok_or(ServerError::RoomNotFound)?;
        if room.owner_username != username {
            return Err(ServerError::NotRoomOwner);
        }
        Ok(&room.questions)
    }

    pub async fn delete_room(&mut self, room_name: &str, username: &str) -> Result<(), ServerError> {
        let room = self.find_room(room_name).ok_or(ServerError::RoomNotFound)?;
        if room.owner_username != username {
            return Err(ServerError::NotRoomOwner);
        }
        let room_id = room.id;
        self.store.delete_room(room_id).await?;
        self.rooms.retain(|r| r.name != room_name);
        info!("admin {} deleted room {}", username, room_name);
        Ok(())
    }

    pub async fn leaderboard(&self, room_name: &str) -> Result<Vec<LeaderboardRow>, ServerError> {
        let room = self.find_room(room_name).ok_or(ServerError::RoomNotFound)?;
        self.store.leaderboard(room.id, 10).await
    }

    /// Sweep every in-progress participant across every room and
    /// auto-submit anyone past their deadline plus the two-second grace
    /// period (component 4.F, grounded in
    /// `original_source/server.c::monitor_exam_thread`).
    pub async fn sweep_expired(&mut self) {
        let mut expired: Vec<(usize, usize)> = Vec::new();
        for (ri, room) in self.rooms.iter().enumerate() {
            for (pi, participant) in room.participants.iter().enumerate() {
                if participant.score == -1 {
                    let elapsed = participant.start_time.elapsed().as_secs() as i64;
                    if elapsed >= room.duration_seconds + 2 {
                        expired.push((ri, pi));
                    }
                }
            }
        }

        for (ri, pi) in expired {
            let room = &mut self.rooms[ri];
            let (score, total) = {
                let participant = &room.participants[pi];
                room.score_answers(&participant.answers)
            };
            let (participant_id, user_id, username, room_id, room_name, answers) = {
                let participant = &mut room.participants[pi];
                participant.score = score;
                (
                    participant.id,
                    participant.user_id,
                    participant.username.clone(),
                    room.id,
                    room.name.clone(),
                    participant.answers.clone(),
                )
            };

            for (i, q) in room.questions.iter().enumerate() {
                let selected = *answers.get(i).unwrap_or(&'.');
                let is_correct = selected != '.' && selected == q.correct_option;
                if let Err(err) = self.store.save_answer(participant_id, q.id, selected, is_correct).await {
                    log::warn!("failed to persist auto-submit answer: {}", err);
                }
            }
            if let Err(err) = self.store.save_result(participant_id, room_id, score, total, score).await {
                log::warn!("failed to persist auto-submit result: {}", err);
            }
            info!("user {} auto-submitted in room {}: {}/{}", username, room_name, score, total);
            crate::log_sink::record(
                &self.store,
                &self.log_file,
                Some(user_id),
                "AUTO_SUBMIT",
                &format!("user '{}' in room '{}': {}/{}", username, room_name, score, total),
            )
            .await;
        }
    }
}

#[cfg(all(test, feature = "sql"))]
mod tests {
    use super::*;
    use crate::store::Role;

    async fn state_with_room() -> (GlobalState, i64, i64) {
        let store = Store::open_in_memory().await.unwrap();
        let owner = store.add_user("teacher", "pw", Role::Admin).await.unwrap();
        let student = store.add_user("student", "pw", Role::Student).await.unwrap();
        store
            .add_question("1+1?", "1", "2", "3", "4", 'B', "math", "easy", None)
            .await
            .unwrap();
        let mut state = GlobalState::new(store, "secret".to_string(), "test.log".to_string());
        state
            .create_room("room-a", owner, "teacher", 1, 600, "math:1", "easy:1")
            .await
            .unwrap();
        (state, owner, student)
    }

    #[tokio::test]
    async fn join_then_answer_then_submit_scores_correctly() {
        let (mut state, _owner, _student) = state_with_room().await;
        let (num_questions, remaining) = state.join_room("room-a", 99, "student").await.unwrap();
        assert_eq!(num_questions, 1);
        assert!(remaining <= 600);

        state.answer_in_room("room-a", 0, 'A', "student");
        let score = state.submit("room-a", "student", "B").await.unwrap();
        assert_eq!(score, 1);

        let err = state.submit("room-a", "student", "B").await.unwrap_err();
        assert!(matches!(err, ServerError::AlreadySubmitted));
    }

    #[tokio::test]
    async fn rejoin_after_submit_resets_and_records_history() {
        let (mut state, _owner, _student) = state_with_room().await;
        state.join_room("room-a", 99, "student").await.unwrap();
        state.submit("room-a", "student", "A").await.unwrap();

        state.join_room("room-a", 99, "student").await.unwrap();
        let room = state.find_room("room-a").unwrap();
        let participant = room.participants.iter().find(|p| p.username == "student").unwrap();
        assert_eq!(participant.score, -1);
        assert_eq!(participant.history, vec![0]);
    }

    #[tokio::test]
    async fn zero_based_answer_indices_write_distinct_slots() {
        let store = Store::open_in_memory().await.unwrap();
        let owner = store.add_user("teacher", "pw", Role::Admin).await.unwrap();
        store.add_question("q1", "a", "b", "c", "d", 'A', "math", "easy", None).await.unwrap();
        store.add_question("q2", "a", "b", "c", "d", 'C', "math", "easy", None).await.unwrap();
        let mut state = GlobalState::new(store, "secret".to_string(), "test.log".to_string());
        state
            .create_room("room-a", owner, "teacher", 2, 600, "math:2", "easy:2")
            .await
            .unwrap();
        state.join_room("room-a", 99, "student").await.unwrap();

        state.answer_in_room("room-a", 0, 'A', "student");
        state.answer_in_room("room-a", 1, 'C', "student");

        let room = state.find_room("room-a").unwrap();
        let participant = room.participants.iter().find(|p| p.username == "student").unwrap();
        assert_eq!(participant.answers, vec!['A', 'C']);
    }

    #[tokio::test]
    async fn only_owner_can_delete_room() {
        let (mut state, _owner, _student) = state_with_room().await;
        let err = state.delete_room("room-a", "student").await.unwrap_err();
        assert!(matches!(err, ServerError::NotRoomOwner));
        state.delete_room("room-a", "teacher").await.unwrap();
        assert!(state.find_room("room-a").is_none());
    }

    #[tokio::test]
    async fn create_room_rejects_out_of_range_inputs() {
        let store = Store::open_in_memory().await.unwrap();
        let owner = store.add_user("teacher", "pw", Role::Admin).await.unwrap();
        let mut state = GlobalState::new(store, "secret".to_string(), "test.log".to_string());
        let err = state
            .create_room("room-a", owner, "teacher", 0, 600, "", "")
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::QuestionCountOutOfRange(0)));

        let err = state
            .create_room("room-b", owner, "teacher", 5, 5, "", "")
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::DurationOutOfRange(5)));
    }
}

use crate::error::ServerError;
use crate::store::models::{LeaderboardRow, ParticipantRow, Question, Role, RoomRow};

/// Built only when the `sql` feature is disabled. The server has no way to
/// function without a database, so every method here returns an internal
/// error rather than silently no-opping — matching the teacher's
/// `sql::stub::writeback`, which panics rather than pretend to succeed.
pub struct Store;

fn unavailable() -> ServerError {
    ServerError::Internal(Box::new(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "built without the \"sql\" feature; no store backend is available",
    )))
}

impl Store {
    pub async fn open(_db_path: &str) -> Result<Self, ServerError> {
        Err(unavailable())
    }

    pub async fn add_user(&self, _name: &str, _password: &str, _role: Role) -> Result<i64, ServerError> {
        Err(unavailable())
    }

    pub async fn validate_user(&self, _name: &str, _password: &str) -> Result<Option<i64>, ServerError> {
        Err(unavailable())
    }

    pub async fn get_role(&self, _name: &str) -> Result<Option<Role>, ServerError> {
        Err(unavailable())
    }

    pub async fn add_question(
        &self,
        _text: &str,
        _a: &str,
        _b: &str,
        _c: &str,
        _d: &str,
        _correct: char,
        _topic: &str,
        _difficulty: &str,
        _created_by: Option<i64>,
    ) -> Result<i64, ServerError> {
        Err(unavailable())
    }

    pub async fn delete_question(&self, _id: i64) -> Result<bool, ServerError> {
        Err(unavailable())
    }

    pub async fn question_by_id(&self, _id: i64) -> Result<Option<Question>, ServerError> {
        Err(unavailable())
    }

    pub async fn questions_by_topic(&self, _topic: &str) -> Result<Vec<Question>, ServerError> {
        Err(unavailable())
    }

    pub async fn questions_by_difficulty(&self, _difficulty: &str) -> Result<Vec<Question>, ServerError> {
        Err(unavailable())
    }

    pub async fn all_topics_with_counts(&self) -> Result<Vec<(i64, String, i64)>, ServerError> {
        Err(unavailable())
    }

    pub async fn all_difficulties_with_counts(&self) -> Result<Vec<(String, i64)>, ServerError> {
        Err(unavailable())
    }

    pub async fn count_difficulties_for_topics(&self, _topic_ids: &[i64]) -> Result<[i64; 3], ServerError> {
        Err(unavailable())
    }

    pub async fn random_filtered_questions(
        &self,
        _topic_ids: &[i64],
        _difficulty_id: Option<i64>,
        _limit: i64,
    ) -> Result<Vec<Question>, ServerError> {
        Err(unavailable())
    }

    pub async fn create_room(&self, _name: &str, _owner_id: i64, _duration_seconds: i64) -> Result<i64, ServerError> {
        Err(unavailable())
    }

    pub async fn add_question_to_room(&self, _room_id: i64, _question_id: i64, _order: i64) -> Result<(), ServerError> {
        Err(unavailable())
    }

    pub async fn room_questions(&self, _room_id: i64) -> Result<Vec<Question>, ServerError> {
        Err(unavailable())
    }

    pub async fn room_id_by_name(&self, _name: &str) -> Result<Option<i64>, ServerError> {
        Err(unavailable())
    }

    pub async fn delete_room(&self, _room_id: i64) -> Result<bool, ServerError> {
        Err(unavailable())
    }

    pub async fn load_all_rooms(&self) -> Result<Vec<RoomRow>, ServerError> {
        Err(unavailable())
    }

    pub async fn save_participant(&self, _room_id: i64, _user_id: i64) -> Result<i64, ServerError> {
        Err(unavailable())
    }

    pub async fn reset_participant(&self, _participant_id: i64) -> Result<(), ServerError> {
        Err(unavailable())
    }

    pub async fn save_answer(
        &self,
        _participant_id: i64,
        _question_id: i64,
        _selected: char,
        _is_correct: bool,
    ) -> Result<(), ServerError> {
        Err(unavailable())
    }

    pub async fn save_result(
        &self,
        _participant_id: i64,
        _room_id: i64,
        _score: i64,
        _total: i64,
        _correct: i64,
    ) -> Result<(), ServerError> {
        Err(unavailable())
    }

    pub async fn leaderboard(&self, _room_id: i64, _limit: i64) -> Result<Vec<LeaderboardRow>, ServerError> {
        Err(unavailable())
    }

    pub async fn participant_answers(&self, _participant_id: i64, _total_questions: usize) -> Result<Vec<char>, ServerError> {
        Err(unavailable())
    }

    pub async fn room_participants(&self, _room_id: i64) -> Result<Vec<ParticipantRow>, ServerError> {
        Err(unavailable())
    }

    pub async fn add_log(&self, _user_id: Option<i64>, _event_type: &str, _description: &str) -> Result<(), ServerError> {
        Err(unavailable())
    }

    pub async fn questions_is_empty(&self) -> Result<bool, ServerError> {
        Err(unavailable())
    }

    pub async fn exec_sql_file(&self, _sql: &str) -> Result<(), ServerError> {
        Err(unavailable())
    }
}

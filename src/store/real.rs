use sqlx::{Row, Sqlite, SqlitePool, Transaction};

use crate::error::ServerError;
use crate::store::models::{LeaderboardRow, ParticipantRow, Question, Role, RoomRow};

pub type Pool = SqlitePool;

/// Thin wrapper around a `sqlx::SqlitePool`. Every method here is one of the
/// contracts named in SPEC_FULL.md §4.A; callers already hold the global
/// registry lock (see `room::GlobalState`), so no additional locking happens
/// here beyond what sqlx's own pool/transaction machinery provides.
///
/// Note: unlike the teacher's `sql::real`, this does not use the
/// `sqlx::query!`/`query_as!` compile-time-checked macros — those require a
/// live database or an offline `.sqlx` cache produced by `cargo sqlx
/// prepare`, neither of which exists here since the toolchain is never run
/// in this exercise (see DESIGN.md, decision 8). The dynamic `sqlx::query`
/// builder is used instead.
pub struct Store {
    pool: Pool,
}

fn question_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Question, ServerError> {
    let correct: String = row.try_get("correct_option")?;
    Ok(Question {
        id: row.try_get("id")?,
        text: row.try_get("text")?,
        option_a: row.try_get("option_a")?,
        option_b: row.try_get("option_b")?,
        option_c: row.try_get("option_c")?,
        option_d: row.try_get("option_d")?,
        correct_option: correct.chars().next().unwrap_or('A'),
        topic_id: row.try_get("topic_id")?,
        topic_name: row.try_get("topic_name")?,
        difficulty_id: row.try_get("difficulty_id")?,
        difficulty_name: row.try_get("difficulty_name")?,
    })
}

const QUESTION_SELECT: &str = "SELECT q.id, q.text, q.option_a, q.option_b, q.option_c, q.option_d, \
     q.correct_option, q.topic_id, t.name AS topic_name, q.difficulty_id, d.name AS difficulty_name \
     FROM questions q \
     JOIN topics t ON t.id = q.topic_id \
     JOIN difficulties d ON d.id = q.difficulty_id";

impl Store {
    pub async fn open(db_path: &str) -> Result<Self, ServerError> {
        let url = format!("sqlite://{}?mode=rwc", db_path);
        let pool = SqlitePool::connect(&url)
            .await
            .map_err(|e| ServerError::Internal(Box::new(e)))?;
        sqlx::query("PRAGMA foreign_keys = ON;")
            .execute(&pool)
            .await?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| ServerError::Internal(Box::new(e)))?;
        Ok(Self { pool })
    }

    #[cfg(test)]
    pub async fn open_in_memory() -> Result<Self, ServerError> {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .map_err(|e| ServerError::Internal(Box::new(e)))?;
        sqlx::query("PRAGMA foreign_keys = ON;")
            .execute(&pool)
            .await?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| ServerError::Internal(Box::new(e)))?;
        Ok(Self { pool })
    }

    // ---- users ----

    pub async fn add_user(&self, name: &str, password: &str, role: Role) -> Result<i64, ServerError> {
        let result = sqlx::query("INSERT INTO users (username, password, role) VALUES (?, ?, ?)")
            .bind(name)
            .bind(password)
            .bind(role.as_str())
            .execute(&self.pool)
            .await;
        match result {
            Ok(r) => Ok(r.last_insert_rowid()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(ServerError::UserAlreadyExists)
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn validate_user(&self, name: &str, password: &str) -> Result<Option<i64>, ServerError> {
        let row = sqlx::query("SELECT id FROM users WHERE username = ? AND password = ?")
            .bind(name)
            .bind(password)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get("id")))
    }

    pub async fn get_role(&self, name: &str) -> Result<Option<Role>, ServerError> {
        let row = sqlx::query("SELECT role FROM users WHERE username = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row
            .and_then(|r| r.get::<String, _>("role").parse().ok()))
    }

    // ---- topics / difficulties / questions ----

    pub async fn topic_id(&self, name: &str) -> Result<Option<i64>, ServerError> {
        let row = sqlx::query("SELECT id FROM topics WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get("id")))
    }

    pub async fn difficulty_id(&self, name: &str) -> Result<Option<i64>, ServerError> {
        let row = sqlx::query("SELECT id FROM difficulties WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get("id")))
    }

    pub async fn add_question(
        &self,
        text: &str,
        a: &str,
        b: &str,
        c: &str,
        d: &str,
        correct: char,
        topic: &str,
        difficulty: &str,
        created_by: Option<i64>,
    ) -> Result<i64, ServerError> {
        let topic = topic.to_lowercase();
        let difficulty_id = self
            .difficulty_id(&difficulty.to_lowercase())
            .await?
            .ok_or_else(|| ServerError::UnknownDifficulty(difficulty.to_string()))?;

        let topic_id = match self.topic_id(&topic).await? {
            Some(id) => id,
            None => {
                let result = sqlx::query("INSERT INTO topics (name) VALUES (?)")
                    .bind(&topic)
                    .execute(&self.pool)
                    .await?;
                result.last_insert_rowid()
            }
        };

        let correct_str = correct.to_ascii_uppercase().to_string();
        let result = sqlx::query(
            "INSERT INTO questions \
             (text, option_a, option_b, option_c, option_d, correct_option, topic_id, difficulty_id, created_by) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(text)
        .bind(a)
        .bind(b)
        .bind(c)
        .bind(d)
        .bind(&correct_str)
        .bind(topic_id)
        .bind(difficulty_id)
        .bind(created_by)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn delete_question(&self, id: i64) -> Result<bool, ServerError> {
        let result = sqlx::query("DELETE FROM questions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn question_by_id(&self, id: i64) -> Result<Option<Question>, ServerError> {
        let sql = format!("{} WHERE q.id = ?", QUESTION_SELECT);
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(question_from_row).transpose()
    }

    pub async fn questions_by_topic(&self, topic: &str) -> Result<Vec<Question>, ServerError> {
        let sql = format!("{} WHERE t.name = ?", QUESTION_SELECT);
        let rows = sqlx::query(&sql)
            .bind(topic.to_lowercase())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(question_from_row).collect()
    }

    pub async fn questions_by_difficulty(&self, difficulty: &str) -> Result<Vec<Question>, ServerError> {
        let sql = format!("{} WHERE d.name = ?", QUESTION_SELECT);
        let rows = sqlx::query(&sql)
            .bind(difficulty.to_lowercase())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(question_from_row).collect()
    }

    pub async fn all_topics_with_counts(&self) -> Result<Vec<(i64, String, i64)>, ServerError> {
        let rows = sqlx::query(
            "SELECT t.id, t.name, COUNT(q.id) AS cnt FROM topics t \
             LEFT JOIN questions q ON q.topic_id = t.id \
             GROUP BY t.id ORDER BY t.id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|r| (r.get("id"), r.get("name"), r.get("cnt")))
            .collect())
    }

    pub async fn all_difficulties_with_counts(&self) -> Result<Vec<(String, i64)>, ServerError> {
        let rows = sqlx::query(
            "SELECT d.name, COUNT(q.id) AS cnt FROM difficulties d \
             LEFT JOIN questions q ON q.difficulty_id = d.id \
             GROUP BY d.id ORDER BY d.level",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(|r| (r.get("name"), r.get("cnt"))).collect())
    }

    pub async fn count_difficulties_for_topics(&self, topic_ids: &[i64]) -> Result<[i64; 3], ServerError> {
        if topic_ids.is_empty() {
            return Ok([0, 0, 0]);
        }
        let placeholders = topic_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!(
            "SELECT d.level, COUNT(q.id) AS cnt FROM questions q \
             JOIN difficulties d ON d.id = q.difficulty_id \
             WHERE q.topic_id IN ({}) GROUP BY d.level",
            placeholders
        );
        let mut query = sqlx::query(&sql);
        for id in topic_ids {
            query = query.bind(id);
        }
        let rows = query.fetch_all(&self.pool).await?;
        let mut counts = [0i64; 3];
        for row in rows {
            let level: i64 = row.get("level");
            let cnt: i64 = row.get("cnt");
            if (1..=3).contains(&level) {
                counts[(level - 1) as usize] = cnt;
            }
        }
        Ok(counts)
    }

    /// Uniform random sample of up to `limit` questions restricted to the
    /// given topic ids (and, if given, a single difficulty id).
    pub async fn random_filtered_questions(
        &self,
        topic_ids: &[i64],
        difficulty_id: Option<i64>,
        limit: i64,
    ) -> Result<Vec<Question>, ServerError> {
        if topic_ids.is_empty() || limit <= 0 {
            return Ok(Vec::new());
        }
        let placeholders = topic_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let mut sql = format!("{} WHERE q.topic_id IN ({})", QUESTION_SELECT, placeholders);
        if difficulty_id.is_some() {
            sql.push_str(" AND q.difficulty_id = ?");
        }
        sql.push_str(" ORDER BY RANDOM() LIMIT ?");

        let mut query = sqlx::query(&sql);
        for id in topic_ids {
            query = query.bind(id);
        }
        if let Some(d) = difficulty_id {
            query = query.bind(d);
        }
        query = query.bind(limit);

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(question_from_row).collect()
    }

    // ---- rooms ----

    pub async fn create_room(&self, name: &str, owner_id: i64, duration_seconds: i64) -> Result<i64, ServerError> {
        let result = sqlx::query(
            "INSERT INTO rooms (name, owner_id, duration_seconds, is_started) VALUES (?, ?, ?, 1)",
        )
        .bind(name)
        .bind(owner_id)
        .bind(duration_seconds)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn add_question_to_room(&self, room_id: i64, question_id: i64, order: i64) -> Result<(), ServerError> {
        sqlx::query("INSERT INTO room_questions (room_id, question_id, order_num) VALUES (?, ?, ?)")
            .bind(room_id)
            .bind(question_id)
            .bind(order)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn room_questions(&self, room_id: i64) -> Result<Vec<Question>, ServerError> {
        let sql = format!(
            "{} JOIN room_questions rq ON rq.question_id = q.id WHERE rq.room_id = ? ORDER BY rq.order_num",
            QUESTION_SELECT
        );
        let rows = sqlx::query(&sql).bind(room_id).fetch_all(&self.pool).await?;
        rows.iter().map(question_from_row).collect()
    }

    pub async fn room_id_by_name(&self, name: &str) -> Result<Option<i64>, ServerError> {
        let row = sqlx::query("SELECT id FROM rooms WHERE name = ? AND is_finished = 0")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get("id")))
    }

    pub async fn delete_room(&self, room_id: i64) -> Result<bool, ServerError> {
        let mut tx: Transaction<'_, Sqlite> = self.pool.begin().await?;
        sqlx::query("DELETE FROM room_questions WHERE room_id = ?")
            .bind(room_id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM rooms WHERE id = ?")
            .bind(room_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn load_all_rooms(&self) -> Result<Vec<RoomRow>, ServerError> {
        let rows = sqlx::query(
            "SELECT r.id, r.name, r.owner_id, u.username AS owner_username, r.duration_seconds \
             FROM rooms r JOIN users u ON u.id = r.owner_id WHERE r.is_finished = 0 ORDER BY r.id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|r| RoomRow {
                id: r.get("id"),
                name: r.get("name"),
                owner_id: r.get("owner_id"),
                owner_username: r.get("owner_username"),
                duration_seconds: r.get("duration_seconds"),
            })
            .collect())
    }

    // ---- participants / answers / results ----

    pub async fn save_participant(&self, room_id: i64, user_id: i64) -> Result<i64, ServerError> {
        let existing = sqlx::query("SELECT id FROM participants WHERE room_id = ? AND user_id = ?")
            .bind(room_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        if let Some(row) = existing {
            return Ok(row.get("id"));
        }
        let result = sqlx::query(
            "INSERT INTO participants (room_id, user_id, started_at) VALUES (?, ?, CURRENT_TIMESTAMP)",
        )
        .bind(room_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn reset_participant(&self, participant_id: i64) -> Result<(), ServerError> {
        sqlx::query(
            "UPDATE participants SET started_at = CURRENT_TIMESTAMP, submitted_at = NULL WHERE id = ?",
        )
        .bind(participant_id)
        .execute(&self.pool)
        .await?;
        sqlx::query("DELETE FROM answers WHERE participant_id = ?")
            .bind(participant_id)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM results WHERE participant_id = ?")
            .bind(participant_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn save_answer(
        &self,
        participant_id: i64,
        question_id: i64,
        selected: char,
        is_correct: bool,
    ) -> Result<(), ServerError> {
        sqlx::query(
            "INSERT INTO answers (participant_id, question_id, selected_option, is_correct) \
             VALUES (?, ?, ?, ?) \
             ON CONFLICT(participant_id, question_id) \
             DO UPDATE SET selected_option = excluded.selected_option, is_correct = excluded.is_correct",
        )
        .bind(participant_id)
        .bind(question_id)
        .bind(selected.to_string())
        .bind(is_correct as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn save_result(
        &self,
        participant_id: i64,
        room_id: i64,
        score: i64,
        total: i64,
        correct: i64,
    ) -> Result<(), ServerError> {
        sqlx::query(
            "INSERT INTO results (participant_id, room_id, score, total_questions, correct_answers) \
             VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT(participant_id, room_id) \
             DO UPDATE SET score = excluded.score, total_questions = excluded.total_questions, \
                           correct_answers = excluded.correct_answers, submitted_at = CURRENT_TIMESTAMP",
        )
        .bind(participant_id)
        .bind(room_id)
        .bind(score)
        .bind(total)
        .bind(correct)
        .execute(&self.pool)
        .await?;
        sqlx::query("UPDATE participants SET submitted_at = CURRENT_TIMESTAMP WHERE id = ?")
            .bind(participant_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn leaderboard(&self, room_id: i64, limit: i64) -> Result<Vec<LeaderboardRow>, ServerError> {
        let rows = sqlx::query(
            "SELECT u.username, res.score, res.total_questions FROM results res \
             JOIN participants p ON p.id = res.participant_id \
             JOIN users u ON u.id = p.user_id \
             WHERE res.room_id = ? ORDER BY res.score DESC, res.submitted_at ASC LIMIT ?",
        )
        .bind(room_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|r| LeaderboardRow {
                username: r.get("username"),
                score: r.get("score"),
                total_questions: r.get("total_questions"),
            })
            .collect())
    }

    pub async fn participant_answers(&self, participant_id: i64, total_questions: usize) -> Result<Vec<char>, ServerError> {
        let rows = sqlx::query(
            "SELECT q.id as question_id, a.selected_option FROM room_questions rq \
             JOIN questions q ON q.id = rq.question_id \
             LEFT JOIN answers a ON a.question_id = q.id AND a.participant_id = ? \
             WHERE rq.room_id = (SELECT room_id FROM participants WHERE id = ?) \
             ORDER BY rq.order_num",
        )
        .bind(participant_id)
        .bind(participant_id)
        .fetch_all(&self.pool)
        .await?;
        let mut answers: Vec<char> = rows
            .iter()
            .map(|r| {
                r.get::<Option<String>, _>("selected_option")
                    .and_then(|s| s.chars().next())
                    .unwrap_or('.')
            })
            .collect();
        answers.resize(total_questions, '.');
        Ok(answers)
    }

    pub async fn room_participants(&self, room_id: i64) -> Result<Vec<ParticipantRow>, ServerError> {
        let rows = sqlx::query(
            "SELECT p.id, p.user_id, u.username, res.score FROM participants p \
             JOIN users u ON u.id = p.user_id \
             LEFT JOIN results res ON res.participant_id = p.id AND res.room_id = p.room_id \
             WHERE p.room_id = ? ORDER BY p.id",
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|r| ParticipantRow {
                id: r.get("id"),
                user_id: r.get("user_id"),
                username: r.get("username"),
                score: r.get::<Option<i64>, _>("score"),
                history: Vec::new(),
            })
            .collect())
    }

    // ---- logs ----

    pub async fn add_log(&self, user_id: Option<i64>, event_type: &str, description: &str) -> Result<(), ServerError> {
        sqlx::query("INSERT INTO logs (user_id, event_type, description) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(event_type)
            .bind(description)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn questions_is_empty(&self) -> Result<bool, ServerError> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM questions")
            .fetch_one(&self.pool)
            .await?;
        let cnt: i64 = row.get("cnt");
        Ok(cnt == 0)
    }

    pub async fn exec_sql_file(&self, sql: &str) -> Result<(), ServerError> {
        sqlx::raw_sql(sql)
            .execute(&self.pool)
            .await
            .map_err(|e| ServerError::Internal(Box::new(e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded_store() -> Store {
        let store = Store::open_in_memory().await.unwrap();
        store
            .add_question("2+2?", "3", "4", "5", "6", 'B', "math", "easy", None)
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn register_and_login_round_trip() {
        let store = Store::open_in_memory().await.unwrap();
        let id = store.add_user("alice", "hunter2", Role::Student).await.unwrap();
        assert_eq!(store.validate_user("alice", "hunter2").await.unwrap(), Some(id));
        assert_eq!(store.validate_user("alice", "wrong").await.unwrap(), None);
        assert_eq!(store.get_role("alice").await.unwrap(), Some(Role::Student));
    }

    #[tokio::test]
    async fn duplicate_username_rejected() {
        let store = Store::open_in_memory().await.unwrap();
        store.add_user("bob", "pw", Role::Student).await.unwrap();
        let err = store.add_user("bob", "other", Role::Admin).await.unwrap_err();
        assert!(matches!(err, ServerError::UserAlreadyExists));
    }

    #[tokio::test]
    async fn add_question_creates_topic_on_demand() {
        let store = seeded_store().await;
        let topics = store.all_topics_with_counts().await.unwrap();
        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0].1, "math");
        assert_eq!(topics[0].2, 1);
    }

    #[tokio::test]
    async fn random_filtered_questions_respects_limit_and_filter() {
        let store = seeded_store().await;
        let topic_id = store.topic_id("math").await.unwrap().unwrap();
        let found = store.random_filtered_questions(&[topic_id], None, 5).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].text, "2+2?");

        let difficulty_id = store.difficulty_id("hard").await.unwrap().unwrap();
        let none = store
            .random_filtered_questions(&[topic_id], Some(difficulty_id), 5)
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn room_and_participant_lifecycle() {
        let store = seeded_store().await;
        let owner = store.add_user("teacher", "pw", Role::Admin).await.unwrap();
        let student = store.add_user("student", "pw", Role::Student).await.unwrap();
        let question = store.questions_by_topic("math").await.unwrap().remove(0);

        let room_id = store.create_room("room-a", owner, 600).await.unwrap();
        store.add_question_to_room(room_id, question.id, 0).await.unwrap();

        let participant_id = store.save_participant(room_id, student).await.unwrap();
        // Rejoining the same room returns the same participant row.
        assert_eq!(store.save_participant(room_id, student).await.unwrap(), participant_id);

        store.save_answer(participant_id, question.id, 'B', true).await.unwrap();
        store.save_result(participant_id, room_id, 1, 1, 1).await.unwrap();

        let leaderboard = store.leaderboard(room_id, 10).await.unwrap();
        assert_eq!(leaderboard.len(), 1);
        assert_eq!(leaderboard[0].username, "student");
        assert_eq!(leaderboard[0].score, 1);

        let answers = store.participant_answers(participant_id, 1).await.unwrap();
        assert_eq!(answers, vec!['B']);

        assert!(store.delete_room(room_id).await.unwrap());
        assert_eq!(store.room_id_by_name("room-a").await.unwrap(), None);
    }
}

use std::fmt;

/// A user's role. Stored in `users.role` as the lowercase strings below.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Student,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Student => "student",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "student" => Ok(Role::Student),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Question {
    pub id: i64,
    pub text: String,
    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub option_d: String,
    pub correct_option: char,
    pub topic_id: i64,
    pub topic_name: String,
    pub difficulty_id: i64,
    pub difficulty_name: String,
}

#[derive(Debug, Clone)]
pub struct RoomRow {
    pub id: i64,
    pub name: String,
    pub owner_id: i64,
    pub owner_username: String,
    pub duration_seconds: i64,
}

#[derive(Debug, Clone)]
pub struct ParticipantRow {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    /// None when the participant has not submitted yet.
    pub score: Option<i64>,
    pub history: Vec<i64>,
}

#[derive(Debug, Clone)]
pub struct LeaderboardRow {
    pub username: String,
    pub score: i64,
    pub total_questions: i64,
}

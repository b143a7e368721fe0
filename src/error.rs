use std::error::Error;
use std::fmt;

/// Every fallible operation in the server returns this. The session layer
/// maps each variant to the `FAIL <message>` text it sends on the wire;
/// nothing else should format ad hoc failure strings.
#[derive(Debug)]
#[non_exhaustive]
pub enum ServerError {
    Protocol(String),
    Unauthenticated,
    InvalidCredentials,
    InvalidAdminSecret,
    NotAdmin,
    NotRoomOwner,
    UserAlreadyExists,
    RoomAlreadyExists,
    RoomNotFound,
    QuestionNotFound,
    UnknownDifficulty(String),
    InvalidTopicFilter,
    NoMatchingQuestions,
    DurationOutOfRange(i64),
    QuestionCountOutOfRange(i64),
    AlreadySubmitted,
    RequestTooLarge,

    // Internal errors should never happen in normal operation.
    Internal(Box<dyn Error + Sync + Send>),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::Protocol(usage) => write!(f, "Usage: {}", usage),
            ServerError::Unauthenticated => write!(f, "Please login first"),
            ServerError::InvalidCredentials => write!(f, "Invalid credentials"),
            ServerError::InvalidAdminSecret => write!(f, "Invalid Admin Secret Code!"),
            ServerError::NotAdmin => write!(f, "Admin privileges required"),
            ServerError::NotRoomOwner => write!(f, "Not your room"),
            ServerError::UserAlreadyExists => write!(f, "User already exists"),
            ServerError::RoomAlreadyExists => write!(f, "Room already exists"),
            ServerError::RoomNotFound => write!(f, "Room not found"),
            ServerError::QuestionNotFound => write!(f, "No question found"),
            ServerError::UnknownDifficulty(name) => {
                write!(f, "Unknown difficulty '{}'", name)
            }
            ServerError::InvalidTopicFilter => write!(f, "Invalid topic filter"),
            ServerError::NoMatchingQuestions => write!(f, "No questions match your criteria"),
            ServerError::DurationOutOfRange(_) => write!(f, "Duration must be 10-86400 seconds"),
            ServerError::QuestionCountOutOfRange(_) => write!(f, "Number of questions must be 1-50"),
            ServerError::AlreadySubmitted => write!(f, "Not in room or submitted"),
            ServerError::RequestTooLarge => write!(f, "Request too large"),
            ServerError::Internal(_) => write!(f, "Server error"),
        }
    }
}

impl Error for ServerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ServerError::Internal(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

#[cfg(feature = "sql")]
impl From<sqlx::Error> for ServerError {
    fn from(err: sqlx::Error) -> Self {
        ServerError::Internal(Box::new(err))
    }
}

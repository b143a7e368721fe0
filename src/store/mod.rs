pub mod models;

#[cfg(feature = "sql")]
mod real;
#[cfg(not(feature = "sql"))]
mod stub;

#[cfg(feature = "sql")]
pub use real::Store;
#[cfg(not(feature = "sql"))]
pub use stub::Store;

pub use models::{LeaderboardRow, ParticipantRow, Question, Role, RoomRow};

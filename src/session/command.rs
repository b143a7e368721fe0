//! Line-protocol parsing and dispatch (component 4.E), grounded in
//! `original_source/server.c`'s per-connection command loop. Every wire
//! string below is transcribed from that file; where the corpus didn't
//! carry a literal implementation (`db_queries.c` is an empty stub — see
//! DESIGN.md), the format was designed in the spirit of the surrounding
//! commands and noted there.

use std::fmt::Write as _;

use crate::error::ServerError;
use crate::room::GlobalState;
use crate::store::Role;

use super::Session;

pub enum Command {
    Register {
        username: String,
        password: String,
        role: Role,
        code: String,
    },
    Login {
        username: String,
        password: String,
    },
    Create {
        name: String,
        num_questions: i64,
        duration_seconds: i64,
        topic_filter: String,
        difficulty_filter: String,
    },
    List,
    Join {
        room: String,
    },
    GetQuestion {
        room: String,
        idx: i64,
    },
    AnswerPractice {
        letter: char,
    },
    AnswerRoom {
        room: String,
        idx: i64,
        letter: char,
    },
    Submit {
        room: String,
        answers: String,
    },
    Results {
        room: String,
    },
    Preview {
        room: String,
    },
    DeleteRoom {
        room: String,
    },
    Leaderboard {
        room: String,
    },
    Practice {
        topic: String,
    },
    GetTopics,
    GetDifficulties,
    GetDifficultiesForTopics {
        topics: Vec<String>,
    },
    AddQuestion {
        text: String,
        a: String,
        b: String,
        c: String,
        d: String,
        correct: char,
        topic: String,
        difficulty: String,
    },
    SearchQuestions {
        filter: SearchFilter,
    },
    DeleteQuestion {
        id: i64,
    },
    Exit,
}

pub enum SearchFilter {
    Topic(String),
    Difficulty(String),
    Id(i64),
}

/// The ANSWER command is disambiguated purely by counting spaces in the
/// raw line: one space means practice mode (`ANSWER <letter>`), three or
/// more means room mode (`ANSWER <room> <idx> <letter>`). This is load
/// bearing — preserved byte-for-byte from the original dispatcher, which
/// counts spaces over the whole line (verb included). `parse` has already
/// split the verb off of `rest`, so the thresholds here are one lower:
/// zero spaces (practice) and two-or-more (room).
fn parse_answer(rest: &str) -> Result<Command, ServerError> {
    let space_count = rest.chars().filter(|c| *c == ' ').count();
    if space_count == 0 {
        let letter = rest
            .trim()
            .chars()
            .next()
            .ok_or_else(|| ServerError::Protocol("ANSWER <letter>".to_string()))?;
        Ok(Command::AnswerPractice {
            letter: letter.to_ascii_uppercase(),
        })
    } else if space_count >= 2 {
        let mut parts = rest.splitn(3, ' ');
        let room = parts
            .next()
            .ok_or_else(|| ServerError::Protocol("ANSWER <room> <idx> <letter>".to_string()))?
            .to_string();
        let idx: i64 = parts
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| ServerError::Protocol("ANSWER <room> <idx> <letter>".to_string()))?;
        let letter = parts
            .next()
            .and_then(|s| s.trim().chars().next())
            .ok_or_else(|| ServerError::Protocol("ANSWER <room> <idx> <letter>".to_string()))?;
        Ok(Command::AnswerRoom {
            room,
            idx,
            letter: letter.to_ascii_uppercase(),
        })
    } else {
        Err(ServerError::Protocol("ANSWER <letter> | ANSWER <room> <idx> <letter>".to_string()))
    }
}

pub fn parse(line: &str) -> Result<Command, ServerError> {
    let line = line.trim_end_matches(['\r', '\n']);
    let (word, rest) = match line.split_once(' ') {
        Some((w, r)) => (w, r),
        None => (line, ""),
    };

    match word.to_ascii_uppercase().as_str() {
        "REGISTER" => {
            let mut parts = rest.split_whitespace();
            let username = parts.next().ok_or_else(usage_register)?.to_string();
            let password = parts.next().ok_or_else(usage_register)?.to_string();
            let role = match parts.next() {
                Some(r) => r.parse().map_err(|_| usage_register())?,
                None => Role::Student,
            };
            let code = parts.next().unwrap_or("").to_string();
            Ok(Command::Register {
                username,
                password,
                role,
                code,
            })
        }
        "LOGIN" => {
            let mut parts = rest.split_whitespace();
            let username = parts.next().ok_or_else(usage_login)?.to_string();
            let password = parts.next().ok_or_else(usage_login)?.to_string();
            Ok(Command::Login { username, password })
        }
        "CREATE" => {
            let mut parts = rest.split_whitespace();
            let name = parts.next().ok_or_else(usage_create)?.to_string();
            let num_questions: i64 = parts.next().and_then(|s| s.parse().ok()).ok_or_else(usage_create)?;
            let duration_seconds: i64 = parts.next().and_then(|s| s.parse().ok()).ok_or_else(usage_create)?;
            let remainder: Vec<&str> = parts.collect();
            let (topic_filter, difficulty_filter) = split_create_filters(&remainder);
            Ok(Command::Create {
                name,
                num_questions,
                duration_seconds,
                topic_filter,
                difficulty_filter,
            })
        }
        "LIST" => Ok(Command::List),
        "JOIN" => Ok(Command::Join {
            room: rest.trim().to_string(),
        }),
        "GET_QUESTION" => {
            let mut parts = rest.split_whitespace();
            let room = parts
                .next()
                .ok_or_else(|| ServerError::Protocol("GET_QUESTION <room> <idx>".to_string()))?
                .to_string();
            let idx: i64 = parts
                .next()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| ServerError::Protocol("GET_QUESTION <room> <idx>".to_string()))?;
            Ok(Command::GetQuestion { room, idx })
        }
        "ANSWER" => parse_answer(rest),
        "SUBMIT" => {
            let mut parts = rest.split_whitespace();
            let room = parts
                .next()
                .ok_or_else(|| ServerError::Protocol("SUBMIT <room> <answerString>".to_string()))?
                .to_string();
            let answers = parts.next().unwrap_or("").to_string();
            Ok(Command::Submit { room, answers })
        }
        "RESULTS" => Ok(Command::Results {
            room: rest.trim().to_string(),
        }),
        "PREVIEW" => Ok(Command::Preview {
            room: rest.trim().to_string(),
        }),
        "DELETE" => Ok(Command::DeleteRoom {
            room: rest.trim().to_string(),
        }),
        "LEADERBOARD" => Ok(Command::Leaderboard {
            room: rest.trim().to_string(),
        }),
        "PRACTICE" => Ok(Command::Practice {
            topic: rest.trim().to_lowercase(),
        }),
        "GET_TOPICS" => Ok(Command::GetTopics),
        "GET_DIFFICULTIES" => Ok(Command::GetDifficulties),
        "GET_DIFFICULTIES_FOR_TOPICS" => Ok(Command::GetDifficultiesForTopics {
            topics: rest.split(',').map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty()).collect(),
        }),
        "ADD_QUESTION" => {
            let fields: Vec<&str> = rest.splitn(8, '|').collect();
            if fields.len() != 8 {
                return Err(usage_add_question());
            }
            let correct = fields[5].trim().chars().next().ok_or_else(usage_add_question)?;
            Ok(Command::AddQuestion {
                text: fields[0].trim().to_string(),
                a: fields[1].trim().to_string(),
                b: fields[2].trim().to_string(),
                c: fields[3].trim().to_string(),
                d: fields[4].trim().to_string(),
                correct: correct.to_ascii_uppercase(),
                topic: fields[6].trim().to_string(),
                difficulty: fields[7].trim().to_string(),
            })
        }
        "SEARCH_QUESTIONS" => {
            let mut parts = rest.splitn(2, ' ');
            let kind = parts.next().unwrap_or("").to_ascii_uppercase();
            let value = parts.next().unwrap_or("").trim();
            let filter = match kind.as_str() {
                "TOPIC" => SearchFilter::Topic(value.to_lowercase()),
                "DIFFICULTY" => SearchFilter::Difficulty(value.to_lowercase()),
                "ID" => SearchFilter::Id(value.parse().map_err(|_| usage_search())?),
                _ => return Err(usage_search()),
            };
            Ok(Command::SearchQuestions { filter })
        }
        "DELETE_QUESTION" => {
            let id: i64 = rest.trim().parse().map_err(|_| {
                ServerError::Protocol("DELETE_QUESTION <id>".to_string())
            })?;
            Ok(Command::DeleteQuestion { id })
        }
        "EXIT" => Ok(Command::Exit),
        other => Err(ServerError::Protocol(format!("unknown command '{}'", other))),
    }
}

fn usage_register() -> ServerError {
    ServerError::Protocol("REGISTER <username> <password> [role] [code]".to_string())
}
fn usage_login() -> ServerError {
    ServerError::Protocol("LOGIN <username> <password>".to_string())
}
fn usage_create() -> ServerError {
    ServerError::Protocol("CREATE <name> <numQ> <duration> [TOPICS ...] [DIFFICULTIES ...]".to_string())
}
fn usage_add_question() -> ServerError {
    ServerError::Protocol("ADD_QUESTION <text>|<A>|<B>|<C>|<D>|<correct>|<topic>|<difficulty>".to_string())
}
fn usage_search() -> ServerError {
    ServerError::Protocol("SEARCH_QUESTIONS TOPIC|DIFFICULTY|ID <value>".to_string())
}

/// `CREATE`'s trailing tokens hold an optional `TOPICS <filter>` and/or
/// `DIFFICULTIES <filter>` clause, in either order.
fn split_create_filters(tokens: &[&str]) -> (String, String) {
    let mut topic_filter = String::new();
    let mut difficulty_filter = String::new();
    let mut i = 0;
    while i < tokens.len() {
        match tokens[i].to_ascii_uppercase().as_str() {
            "TOPICS" => {
                i += 1;
                let mut buf = Vec::new();
                while i < tokens.len() && !matches!(tokens[i].to_ascii_uppercase().as_str(), "TOPICS" | "DIFFICULTIES") {
                    buf.push(tokens[i]);
                    i += 1;
                }
                topic_filter = buf.join(" ");
            }
            "DIFFICULTIES" => {
                i += 1;
                let mut buf = Vec::new();
                while i < tokens.len() && !matches!(tokens[i].to_ascii_uppercase().as_str(), "TOPICS" | "DIFFICULTIES") {
                    buf.push(tokens[i]);
                    i += 1;
                }
                difficulty_filter = buf.join(" ");
            }
            _ => i += 1,
        }
    }
    (topic_filter, difficulty_filter)
}

/// Runs one parsed command against the shared state, returning the exact
/// line(s) to write back to the client (already newline-terminated).
/// `LEADERBOARD` intentionally has no `SUCCESS` prefix, matching the
/// original's direct passthrough of `db_get_leaderboard`'s output.
pub async fn dispatch(cmd: Command, session: &mut Session, state: &mut GlobalState) -> String {
    match run(cmd, session, state).await {
        Ok(response) => response,
        Err(err) => format!("FAIL {}\n", err),
    }
}

async fn run(cmd: Command, session: &mut Session, state: &mut GlobalState) -> Result<String, ServerError> {
    match cmd {
        Command::Register {
            username,
            password,
            role,
            code,
        } => {
            crate::auth::register(&state.store, &state.admin_secret, &username, &password, role, &code).await?;
            crate::log_sink::record(&state.store, &state.log_file, None, "USER_REGISTERED", &username).await;
            Ok("SUCCESS Registered. Please login.\n".to_string())
        }
        Command::Login { username, password } => {
            let result = crate::auth::login(&state.store, &username, &password).await?;
            session.authenticated = true;
            session.user_id = result.user_id;
            session.username = username.clone();
            session.role = result.role;
            crate::log_sink::record(&state.store, &state.log_file, Some(result.user_id), "USER_LOGIN", &username).await;
            Ok(format!("SUCCESS {}\n", result.role))
        }
        Command::Exit => {
            session.authenticated = false;
            Ok("SUCCESS Goodbye\n".to_string())
        }
        other => {
            require_auth(session)?;
            run_authenticated(other, session, state).await
        }
    }
}

fn require_auth(session: &Session) -> Result<(), ServerError> {
    if session.authenticated {
        Ok(())
    } else {
        Err(ServerError::Unauthenticated)
    }
}

fn require_admin(session: &Session) -> Result<(), ServerError> {
    if session.role == Role::Admin {
        Ok(())
    } else {
        Err(ServerError::NotAdmin)
    }
}

async fn run_authenticated(cmd: Command, session: &mut Session, state: &mut GlobalState) -> Result<String, ServerError> {
    match cmd {
        Command::Create {
            name,
            num_questions,
            duration_seconds,
            topic_filter,
            difficulty_filter,
        } => {
            require_admin(session)?;
            state
                .create_room(
                    &name,
                    session.user_id,
                    &session.username,
                    num_questions,
                    duration_seconds,
                    &topic_filter,
                    &difficulty_filter,
                )
                .await?;
            crate::log_sink::record(&state.store, &state.log_file, Some(session.user_id), "ROOM_CREATED", &name).await;
            Ok("SUCCESS Room created\n".to_string())
        }
        Command::List => {
            let mut out = String::from("SUCCESS Rooms:\n");
            if state.rooms().is_empty() {
                out.push_str("No rooms.\n");
            } else {
                for room in state.rooms() {
                    let _ = writeln!(
                        out,
                        "- {} (Owner: {}, Q: {}, Time: {}s)",
                        room.name,
                        room.owner_username,
                        room.questions.len(),
                        room.duration_seconds
                    );
                }
            }
            Ok(out)
        }
        Command::Join { room } => {
            let (num_questions, remaining) = state.join_room(&room, session.user_id, &session.username).await?;
            Ok(format!("SUCCESS Joined {} {}\n", num_questions, remaining))
        }
        Command::GetQuestion { room, idx } => {
            let idx0: usize = idx.try_into().map_err(|_| ServerError::QuestionNotFound)?;
            let total = state.num_questions(&room).ok_or(ServerError::RoomNotFound)?;
            let (question, current) = state.get_question(&room, idx0, &session.username)?;
            Ok(format!(
                "SUCCESS [{}/{}] {}\nA) {}\nB) {}\nC) {}\nD) {}\n\n[Your Selection: {}]\n",
                idx + 1,
                total,
                question.text,
                question.option_a,
                question.option_b,
                question.option_c,
                question.option_d,
                current
            ))
        }
        Command::AnswerPractice { letter } => match session.practice_correct {
            Some(correct) if letter == correct => Ok("CORRECT\n".to_string()),
            Some(correct) => Ok(format!("WRONG|{}\n", correct)),
            None => Err(ServerError::Protocol("no active practice question".to_string())),
        },
        Command::AnswerRoom { room, idx, letter } => {
            // Negative idx is silently ignored, matching the original's
            // `qIdx >= 0 && qIdx < r->numQuestions` guard.
            if let Ok(idx0) = usize::try_from(idx) {
                state.answer_in_room(&room, idx0, letter, &session.username);
            }
            // No response line is sent for room-mode ANSWER, matching the
            // original dispatcher, which never calls send_msg here.
            Ok(String::new())
        }
        Command::Submit { room, answers } => {
            let score = state.submit(&room, &session.username, &answers).await?;
            let total = state.num_questions(&room).unwrap_or(0);
            crate::log_sink::record(&state.store, &state.log_file, Some(session.user_id), "SUBMIT", &room).await;
            Ok(format!("SUCCESS Score: {}/{}\n", score, total))
        }
        Command::Results { room } => {
            let rows = state.results(&room)?;
            let mut out = String::from("SUCCESS Results:\n");
            for (username, history, score) in rows {
                let mut history_str = String::new();
                for (i, h) in history.iter().enumerate() {
                    let total = state.num_questions(&room).unwrap_or(0);
                    let _ = write!(history_str, "Att{}:{}/{} ", i + 1, h, total);
                }
                let total = state.num_questions(&room).unwrap_or(0);
                match score {
                    Some(s) => {
                        let _ = writeln!(out, "- {} | {}Latest:{}/{}", username, history_str, s, total);
                    }
                    None => {
                        let _ = writeln!(out, "- {} | {}Doing...", username, history_str);
                    }
                }
            }
            Ok(out)
        }
        Command::Preview { room } => {
            let questions = state.preview(&room, &session.username)?;
            let total = questions.len();
            let mut out = String::from("SUCCESS Preview:\n");
            for (i, q) in questions.iter().enumerate() {
                let _ = write!(
                    out,
                    "[{}/{}] {}\nA) {}\nB) {}\nC) {}\nD) {}\nCorrect: {}\n\n",
                    i + 1,
                    total,
                    q.text,
                    q.option_a,
                    q.option_b,
                    q.option_c,
                    q.option_d,
                    q.correct_option
                );
            }
            Ok(out)
        }
        Command::DeleteRoom { room } => {
            state.delete_room(&room, &session.username).await?;
            crate::log_sink::record(&state.store, &state.log_file, Some(session.user_id), "ROOM_DELETED", &room).await;
            Ok("SUCCESS Room deleted\n".to_string())
        }
        Command::Leaderboard { room } => {
            if state.find_room(&room).is_none() {
                return Ok(format!("FAIL Room '{}' not found\n", room));
            }
            let rows = state.leaderboard(&room).await?;
            if rows.is_empty() {
                return Ok(format!("No results yet for room '{}'\n", room));
            }
            let mut out = String::new();
            for row in rows {
                let _ = writeln!(out, "{} {}/{}", row.username, row.score, row.total_questions);
            }
            Ok(out)
        }
        Command::Practice { topic } => {
            let topics = state.store.all_topics_with_counts().await?;
            let valid = topics.iter().any(|(_, name, count)| *name == topic && *count > 0);
            if topic.is_empty() || !valid {
                let names: Vec<String> = topics.into_iter().map(|(_, name, _)| name).collect();
                return Ok(format!("TOPICS {}\n", names.join("|")));
            }
            let questions = state.store.questions_by_topic(&topic).await?;
            let question = questions
                .first()
                .ok_or(ServerError::NoMatchingQuestions)?;
            session.practice_correct = Some(question.correct_option);
            Ok(format!(
                "PRACTICE_Q {}|{}|{}|{}|{}|{}|{}|{}\n",
                question.id,
                question.text,
                question.option_a,
                question.option_b,
                question.option_c,
                question.option_d,
                question.correct_option,
                question.topic_name
            ))
        }
        Command::GetTopics => {
            let topics = state.store.all_topics_with_counts().await?;
            let names: Vec<String> = topics.into_iter().map(|(_, name, _)| name).collect();
            Ok(format!("SUCCESS {}\n", names.join("|")))
        }
        Command::GetDifficulties => Ok("SUCCESS easy|medium|hard\n".to_string()),
        Command::GetDifficultiesForTopics { topics } => {
            let mut ids = Vec::new();
            for name in &topics {
                if let Some(id) = state.store.topic_id(name).await? {
                    ids.push(id);
                }
            }
            let counts = state.store.count_difficulties_for_topics(&ids).await?;
            Ok(format!(
                "SUCCESS easy:{}|medium:{}|hard:{}|\n",
                counts[0], counts[1], counts[2]
            ))
        }
        Command::AddQuestion {
            text,
            a,
            b,
            c,
            d,
            correct,
            topic,
            difficulty,
        } => {
            require_admin(session)?;
            let id = state
                .store
                .add_question(&text, &a, &b, &c, &d, correct, &topic, &difficulty, Some(session.user_id))
                .await?;
            Ok(format!("SUCCESS Question added with ID {}\n", id))
        }
        Command::SearchQuestions { filter } => {
            require_admin(session)?;
            let questions = match filter {
                SearchFilter::Topic(topic) => state.store.questions_by_topic(&topic).await?,
                SearchFilter::Difficulty(difficulty) => state.store.questions_by_difficulty(&difficulty).await?,
                SearchFilter::Id(id) => state.store.question_by_id(id).await?.into_iter().collect(),
            };
            if questions.is_empty() {
                return Ok("FAIL No questions found\n".to_string());
            }
            let mut out = String::from("SUCCESS Questions:\n");
            for q in questions {
                let _ = writeln!(
                    out,
                    "[{}] {} | {} | {}|{}|{}|{} | Correct: {}",
                    q.id, q.topic_name, q.difficulty_name, q.option_a, q.option_b, q.option_c, q.option_d, q.correct_option
                );
            }
            Ok(out)
        }
        Command::DeleteQuestion { id } => {
            require_admin(session)?;
            if state.store.delete_question(id).await? {
                Ok(format!("SUCCESS Question ID {} deleted\n", id))
            } else {
                Ok("FAIL Question not found\n".to_string())
            }
        }
        Command::Register { .. } | Command::Login { .. } | Command::Exit => unreachable!("handled in run()"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answer_with_one_space_is_practice_mode() {
        match parse("ANSWER B").unwrap() {
            Command::AnswerPractice { letter } => assert_eq!(letter, 'B'),
            _ => panic!("expected practice-mode answer"),
        }
    }

    #[test]
    fn answer_with_three_spaces_is_room_mode() {
        match parse("ANSWER room-a 2 C").unwrap() {
            Command::AnswerRoom { room, idx, letter } => {
                assert_eq!(room, "room-a");
                assert_eq!(idx, 2);
                assert_eq!(letter, 'C');
            }
            _ => panic!("expected room-mode answer"),
        }
    }

    #[test]
    fn answer_with_two_spaces_is_rejected() {
        assert!(parse("ANSWER room-a B").is_err());
    }

    #[test]
    fn create_parses_topics_and_difficulties_in_either_order() {
        match parse("CREATE quiz1 10 600 DIFFICULTIES easy:5 hard:5 TOPICS math").unwrap() {
            Command::Create {
                topic_filter,
                difficulty_filter,
                ..
            } => {
                assert_eq!(topic_filter, "math");
                assert_eq!(difficulty_filter, "easy:5 hard:5");
            }
            _ => panic!("expected CREATE"),
        }
    }

    #[test]
    fn submit_parses_room_name_and_answer_string_separately() {
        match parse("SUBMIT quiz1 AC").unwrap() {
            Command::Submit { room, answers } => {
                assert_eq!(room, "quiz1");
                assert_eq!(answers, "AC");
            }
            _ => panic!("expected SUBMIT"),
        }
    }

    #[test]
    fn get_question_displays_one_based_index_for_zero_based_wire_input() {
        match parse("GET_QUESTION quiz1 0").unwrap() {
            Command::GetQuestion { room, idx } => {
                assert_eq!(room, "quiz1");
                assert_eq!(idx, 0);
            }
            _ => panic!("expected GET_QUESTION"),
        }
    }

    #[test]
    fn register_defaults_to_student_role() {
        match parse("REGISTER alice hunter2").unwrap() {
            Command::Register { role, .. } => assert_eq!(role, Role::Student),
            _ => panic!("expected REGISTER"),
        }
    }

    #[test]
    fn unknown_command_is_rejected() {
        assert!(parse("FROBNICATE").is_err());
    }
}

//! Sample question bank, transcribed from
//! `original_source/db_init.c::db_load_sample_data` (5 topics x 6
//! questions: 3 easy, 2 medium, 1 hard each). Loaded once at bootstrap when
//! the `questions` table is empty. Unlike the original, which hardcodes
//! `created_by = 1` assuming an admin row already exists, these are seeded
//! with `created_by = NULL` (see DESIGN.md, decision 5).

use crate::error::ServerError;
use crate::store::Store;

struct Seed {
    text: &'static str,
    a: &'static str,
    b: &'static str,
    c: &'static str,
    d: &'static str,
    correct: char,
    topic: &'static str,
    difficulty: &'static str,
}

const QUESTIONS: &[Seed] = &[
    // cloud
    Seed { text: "What is cloud computing?", a: "On-premise servers", b: "Internet-based computing resources", c: "Local network storage", d: "Hard drive storage", correct: 'B', topic: "cloud", difficulty: "easy" },
    Seed { text: "Which is a cloud service provider?", a: "Oracle", b: "Amazon Web Services", c: "IBM", d: "All of above", correct: 'D', topic: "cloud", difficulty: "easy" },
    Seed { text: "What does IaaS stand for?", a: "Information as a Service", b: "Infrastructure as a Service", c: "Internet as a Service", d: "Integration as a Service", correct: 'B', topic: "cloud", difficulty: "easy" },
    Seed { text: "What are the three main cloud service models?", a: "IaaS, PaaS, SaaS", b: "IaaS, DaaS, FaaS", c: "PaaS, MaaS, NaaS", d: "SaaS, BaaS, CaaS", correct: 'A', topic: "cloud", difficulty: "medium" },
    Seed { text: "Which cloud deployment model offers the highest security?", a: "Public Cloud", b: "Private Cloud", c: "Hybrid Cloud", d: "Community Cloud", correct: 'B', topic: "cloud", difficulty: "medium" },
    Seed { text: "Explain the concept of multi-tenancy in cloud computing", a: "Multiple servers in one data center", b: "Multiple customers sharing same resources", c: "Multiple storage devices", d: "Multiple networks", correct: 'B', topic: "cloud", difficulty: "hard" },
    // database
    Seed { text: "What is a primary key?", a: "A key for primary office", b: "Unique identifier for a record", c: "Password for database", d: "Network key", correct: 'B', topic: "database", difficulty: "easy" },
    Seed { text: "Which language is used for database queries?", a: "HTML", b: "Python", c: "SQL", d: "JavaScript", correct: 'C', topic: "database", difficulty: "easy" },
    Seed { text: "What is ACID in databases?", a: "A chemical compound", b: "Atomicity, Consistency, Isolation, Durability", c: "A type of database", d: "Access Control ID", correct: 'B', topic: "database", difficulty: "easy" },
    Seed { text: "What is normalization?", a: "Making database larger", b: "Organizing data to reduce redundancy", c: "Encrypting data", d: "Backing up data", correct: 'B', topic: "database", difficulty: "medium" },
    Seed { text: "What does JOIN do?", a: "Merges two tables", b: "Combines rows from two tables", c: "Deletes duplicate rows", d: "Sorts table data", correct: 'B', topic: "database", difficulty: "medium" },
    Seed { text: "Describe the difference between INNER and OUTER JOIN", a: "INNER keeps matching rows, OUTER keeps all rows", b: "No difference", c: "OUTER is faster", d: "INNER is for deletion", correct: 'A', topic: "database", difficulty: "hard" },
    // networking
    Seed { text: "What is an IP address?", a: "Internet Protocol number", b: "Unique identifier for device on network", c: "Computer name", d: "WiFi password", correct: 'B', topic: "networking", difficulty: "easy" },
    Seed { text: "How many bits are in an IPv4 address?", a: "16 bits", b: "32 bits", c: "64 bits", d: "128 bits", correct: 'B', topic: "networking", difficulty: "easy" },
    Seed { text: "What is the purpose of a firewall?", a: "To clean computer", b: "To protect network from unauthorized access", c: "To speed up internet", d: "To store files", correct: 'B', topic: "networking", difficulty: "easy" },
    Seed { text: "What are the seven layers of OSI model?", a: "Physical, Data Link, Network, Transport, Session, Presentation, Application", b: "Server, Client, Router, Switch, Cable, Modem, Internet", c: "Only 3 layers", d: "Only 5 layers", correct: 'A', topic: "networking", difficulty: "medium" },
    Seed { text: "What is TCP/IP?", a: "A type of cable", b: "Protocols for internet communication", c: "A programming language", d: "A network device", correct: 'B', topic: "networking", difficulty: "medium" },
    Seed { text: "Explain what DNS does", a: "Translates domain names to IP addresses", b: "Encrypts network traffic", c: "Manages network bandwidth", d: "Controls firewall rules", correct: 'A', topic: "networking", difficulty: "hard" },
    // programming
    Seed { text: "What does OOP stand for?", a: "Object Oriented Programming", b: "Online Open Platform", c: "Offline Operations Protocol", d: "Object Output Processing", correct: 'A', topic: "programming", difficulty: "easy" },
    Seed { text: "Which is not a programming paradigm?", a: "Functional", b: "Procedural", c: "Algebraic", d: "Object-Oriented", correct: 'C', topic: "programming", difficulty: "easy" },
    Seed { text: "What is a variable?", a: "A mathematical equation", b: "Named storage location for data", c: "A function parameter", d: "A constant value", correct: 'B', topic: "programming", difficulty: "easy" },
    Seed { text: "What is the difference between while and do-while loop?", a: "No difference", b: "do-while runs at least once", c: "while is faster", d: "do-while is deprecated", correct: 'B', topic: "programming", difficulty: "medium" },
    Seed { text: "What is recursion?", a: "A programming error", b: "Function calling itself", c: "Loop structure", d: "Variable declaration", correct: 'B', topic: "programming", difficulty: "medium" },
    Seed { text: "Explain the concept of polymorphism", a: "Many forms through inheritance/interfaces", b: "Multiple variables", c: "Several loops", d: "Different data types", correct: 'A', topic: "programming", difficulty: "hard" },
    // security
    Seed { text: "What is encryption?", a: "Deleting sensitive data", b: "Converting data into secret code", c: "Backing up files", d: "Organizing files", correct: 'B', topic: "security", difficulty: "easy" },
    Seed { text: "What is a password attack called?", a: "Network attack", b: "Brute force attack", c: "Server attack", d: "Hardware attack", correct: 'B', topic: "security", difficulty: "easy" },
    Seed { text: "What does SSL stand for?", a: "Secure Socket Layer", b: "System Security License", c: "Server Side Logic", d: "Secure Storage Line", correct: 'A', topic: "security", difficulty: "easy" },
    Seed { text: "What is two-factor authentication?", a: "Using two passwords", b: "Combining two authentication methods", c: "Two logins required", d: "Two security questions", correct: 'B', topic: "security", difficulty: "medium" },
    Seed { text: "What is phishing?", a: "A fishing technique", b: "Fraudulent attempt to obtain sensitive info", c: "A type of malware", d: "A network protocol", correct: 'B', topic: "security", difficulty: "medium" },
    Seed { text: "Explain what zero-day vulnerability means", a: "No security issues", b: "Unknown exploit before public disclosure", c: "Old security flaw", d: "Malware type", correct: 'B', topic: "security", difficulty: "hard" },
];

/// Inserts the sample bank if (and only if) the `questions` table is
/// currently empty.
pub async fn load_if_empty(store: &Store) -> Result<(), ServerError> {
    if !store.questions_is_empty().await? {
        return Ok(());
    }
    for q in QUESTIONS {
        store
            .add_question(q.text, q.a, q.b, q.c, q.d, q.correct, q.topic, q.difficulty, None)
            .await?;
    }
    Ok(())
}

#[cfg(all(test, feature = "sql"))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn loads_all_sample_questions_once() {
        let store = Store::open_in_memory().await.unwrap();
        load_if_empty(&store).await.unwrap();

        let topics = store.all_topics_with_counts().await.unwrap();
        let total: i64 = topics.iter().map(|(_, _, count)| count).sum();
        assert_eq!(total, QUESTIONS.len() as i64);
        assert_eq!(topics.len(), 5);
    }

    #[tokio::test]
    async fn does_not_duplicate_when_bank_already_has_questions() {
        let store = Store::open_in_memory().await.unwrap();
        store
            .add_question("custom", "a", "b", "c", "d", 'A', "math", "easy", None)
            .await
            .unwrap();

        load_if_empty(&store).await.unwrap();

        let topics = store.all_topics_with_counts().await.unwrap();
        let total: i64 = topics.iter().map(|(_, _, count)| count).sum();
        assert_eq!(total, 1);
    }
}

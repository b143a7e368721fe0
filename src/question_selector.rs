//! Stratified question sampling by (topic, difficulty) count matrix.
//!
//! Grounded in `original_source/server.c`'s three CREATE code paths
//! (`topic_filter` + `diff_filter` both present, topic-only, no filters),
//! generalized into the single algorithm described in SPEC_FULL.md §4.B.

use crate::error::ServerError;
use crate::store::{Question, Store};

const DIFFICULTY_NAMES: [&str; 3] = ["easy", "medium", "hard"];

/// Parses a `"name:count name:count ..."` filter string. `#` and the empty
/// string both mean "no filter given".
fn parse_counts(filter: &str) -> Vec<(String, i64)> {
    let filter = filter.trim();
    if filter.is_empty() || filter == "#" {
        return Vec::new();
    }
    filter
        .split_whitespace()
        .filter_map(|tok| {
            let (name, count) = tok.split_once(':')?;
            let count: i64 = count.parse().ok()?;
            Some((name.to_lowercase(), count))
        })
        .collect()
}

/// Distributes `total` evenly across `names.len()` buckets, remainder to the
/// first bucket.
fn even_split(total: i64, n: usize) -> Vec<i64> {
    if n == 0 {
        return Vec::new();
    }
    let n = n as i64;
    let base = total / n;
    let remainder = total % n;
    (0..n)
        .map(|i| base + if i == 0 { remainder } else { 0 })
        .collect()
}

async fn resolve_topic_quotas(
    store: &Store,
    topic_filter: &str,
    total: i64,
) -> Result<Vec<(i64, String, i64)>, ServerError> {
    let requested = parse_counts(topic_filter);
    if requested.is_empty() {
        let all = store.all_topics_with_counts().await?;
        if all.is_empty() {
            return Ok(Vec::new());
        }
        let splits = even_split(total, all.len());
        return Ok(all
            .into_iter()
            .zip(splits)
            .map(|((id, name, _count), quota)| (id, name, quota))
            .collect());
    }

    let mut resolved = Vec::new();
    for (name, quota) in requested {
        if let Some(id) = store.topic_id(&name).await? {
            resolved.push((id, name, quota));
        }
    }
    Ok(resolved)
}

async fn resolve_difficulty_quotas(
    store: &Store,
    difficulty_filter: &str,
    topic_quota: i64,
) -> Result<Vec<(i64, i64)>, ServerError> {
    let requested = parse_counts(difficulty_filter);

    let named_counts: [i64; 3] = if requested.is_empty() {
        even_split(topic_quota, 3).try_into().unwrap()
    } else {
        let mut counts = [0i64; 3];
        for (name, count) in requested {
            if let Some(idx) = DIFFICULTY_NAMES.iter().position(|n| *n == name) {
                counts[idx] = count;
            }
        }
        counts
    };

    let mut resolved = Vec::new();
    for (idx, name) in DIFFICULTY_NAMES.iter().enumerate() {
        if named_counts[idx] <= 0 {
            continue;
        }
        if let Some(id) = store.difficulty_id(name).await? {
            resolved.push((id, named_counts[idx]));
        }
    }
    Ok(resolved)
}

/// Selects up to `total` questions matching the given topic/difficulty
/// filters. Returns as many as the bank actually has (§4.B, Open Question 4
/// — undersupply is tolerated, not an error); an empty result means the
/// caller should report "No questions match your criteria".
pub async fn select(
    store: &Store,
    total: i64,
    topic_filter: &str,
    difficulty_filter: &str,
) -> Result<Vec<Question>, ServerError> {
    let topics = resolve_topic_quotas(store, topic_filter, total).await?;
    if topics.is_empty() {
        return Ok(Vec::new());
    }

    let mut selected = Vec::new();
    for (topic_id, _name, topic_quota) in topics {
        if topic_quota <= 0 {
            continue;
        }
        let difficulties = resolve_difficulty_quotas(store, difficulty_filter, topic_quota).await?;
        for (difficulty_id, count) in difficulties {
            let mut found = store
                .random_filtered_questions(&[topic_id], Some(difficulty_id), count)
                .await?;
            selected.append(&mut found);
        }
    }
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_counts() {
        assert_eq!(
            parse_counts("database:5 cloud:3"),
            vec![("database".to_string(), 5), ("cloud".to_string(), 3)]
        );
        assert!(parse_counts("#").is_empty());
        assert!(parse_counts("").is_empty());
    }

    #[test]
    fn splits_remainder_to_first() {
        assert_eq!(even_split(10, 3), vec![4, 3, 3]);
        assert_eq!(even_split(9, 3), vec![3, 3, 3]);
        assert_eq!(even_split(0, 3), vec![0, 0, 0]);
    }

    #[cfg(feature = "sql")]
    #[tokio::test]
    async fn select_honors_explicit_topic_and_difficulty_filters() {
        let store = Store::open_in_memory().await.unwrap();
        store.add_question("q1", "a", "b", "c", "d", 'A', "math", "easy", None).await.unwrap();
        store.add_question("q2", "a", "b", "c", "d", 'A', "math", "hard", None).await.unwrap();
        store.add_question("q3", "a", "b", "c", "d", 'A', "geo", "easy", None).await.unwrap();

        let found = select(&store, 1, "math:1", "easy:1").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].topic_name, "math");
        assert_eq!(found[0].difficulty_name, "easy");
    }

    #[cfg(feature = "sql")]
    #[tokio::test]
    async fn select_with_no_filters_splits_evenly_across_all_topics() {
        let store = Store::open_in_memory().await.unwrap();
        store.add_question("q1", "a", "b", "c", "d", 'A', "math", "easy", None).await.unwrap();
        store.add_question("q2", "a", "b", "c", "d", 'A', "geo", "easy", None).await.unwrap();

        let found = select(&store, 2, "", "").await.unwrap();
        assert_eq!(found.len(), 2);
    }
}

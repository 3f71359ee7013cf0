//! Topic-filter matching.
//!
//! Filters follow MQTT rules: levels are separated by `/`, `+` matches
//! exactly one level and a trailing `#` matches the parent level and
//! everything below it. Topics starting with `$` are system topics and are
//! never matched by any filter.

/// Returns true when `topic` is delivered to a subscription on `filter`.
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    if topic.starts_with('$') || filter.is_empty() || topic.is_empty() {
        return false;
    }

    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return filter_levels.next().is_none(),
            (Some("+"), Some(_)) => {}
            (Some(f), Some(t)) if f == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

/// True when `filter` is syntactically usable: `#` only as the last level and
/// wildcards never mixed with other characters inside a level.
pub fn is_valid_filter(filter: &str) -> bool {
    if filter.is_empty() {
        return false;
    }
    let levels: Vec<&str> = filter.split('/').collect();
    levels.iter().enumerate().all(|(i, level)| match *level {
        "#" => i == levels.len() - 1,
        "+" => true,
        other => !other.contains('#') && !other.contains('+'),
    })
}

/// True when `topic` names a concrete topic: non-empty and free of
/// wildcard characters.
pub fn is_valid_topic_name(topic: &str) -> bool {
    !topic.is_empty() && !topic.contains(['+', '#'])
}

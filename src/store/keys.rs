use crate::store::StoreError;

/// Key segments are joined with `:`, so ids must not contain it.
fn segment(value: &str, field: &str) -> Result<String, StoreError> {
    if value.is_empty() {
        return Err(StoreError::Validation(format!("{field} must not be empty")));
    }
    if value.contains(':') {
        return Err(StoreError::Validation(format!(
            "{field} must not contain ':'"
        )));
    }
    Ok(value.to_string())
}

fn reverse_ts(timestamp_ms: i64) -> u64 {
    u64::MAX - timestamp_ms.max(0) as u64
}

fn forward_ts(timestamp_ms: i64) -> u64 {
    timestamp_ms.max(0) as u64
}

pub fn question_key(question_id: &str) -> Result<String, StoreError> {
    segment(question_id, "question_id")
}

pub fn question_topic_index_key(topic: &str, question_id: &str) -> Result<String, StoreError> {
    Ok(format!(
        "{}:{}",
        segment(topic, "topic")?,
        segment(question_id, "question_id")?
    ))
}

pub fn question_topic_prefix(topic: &str) -> Result<String, StoreError> {
    Ok(format!("{}:", segment(topic, "topic")?))
}

/// Attempts sort newest first under a student prefix.
pub fn attempt_key(
    student_id: &str,
    timestamp_ms: i64,
    attempt_id: &str,
) -> Result<String, StoreError> {
    Ok(format!(
        "{}:{:020}:{}",
        segment(student_id, "student_id")?,
        reverse_ts(timestamp_ms),
        segment(attempt_id, "attempt_id")?
    ))
}

pub fn attempt_prefix(student_id: &str) -> Result<String, StoreError> {
    Ok(format!("{}:", segment(student_id, "student_id")?))
}

pub fn attempt_id_key(attempt_id: &str) -> Result<String, StoreError> {
    segment(attempt_id, "attempt_id")
}

pub fn student_key(student_id: &str) -> Result<String, StoreError> {
    segment(student_id, "student_id")
}

/// XP events sort oldest first so a date window is a contiguous range.
pub fn xp_event_key(
    student_id: &str,
    timestamp_ms: i64,
    event_id: &str,
) -> Result<String, StoreError> {
    Ok(format!(
        "{}:{:020}:{}",
        segment(student_id, "student_id")?,
        forward_ts(timestamp_ms),
        segment(event_id, "event_id")?
    ))
}

pub fn xp_event_prefix(student_id: &str) -> Result<String, StoreError> {
    Ok(format!("{}:", segment(student_id, "student_id")?))
}

/// Lower bound (inclusive) of every XP event at or after `timestamp_ms`.
pub fn xp_event_bound(student_id: &str, timestamp_ms: i64) -> Result<String, StoreError> {
    Ok(format!(
        "{}:{:020}",
        segment(student_id, "student_id")?,
        forward_ts(timestamp_ms)
    ))
}

pub fn badge_key(badge_id: &str) -> Result<String, StoreError> {
    segment(badge_id, "badge_id")
}

pub fn student_badge_key(student_id: &str, badge_id: &str) -> Result<String, StoreError> {
    Ok(format!(
        "{}:{}",
        segment(student_id, "student_id")?,
        segment(badge_id, "badge_id")?
    ))
}

pub fn student_badge_prefix(student_id: &str) -> Result<String, StoreError> {
    Ok(format!("{}:", segment(student_id, "student_id")?))
}

pub fn issued_session_key(student_id: &str, session_id: &str) -> Result<String, StoreError> {
    Ok(format!(
        "{}:{}",
        segment(student_id, "student_id")?,
        segment(session_id, "session_id")?
    ))
}

pub fn lesson_key(lesson_id: &str) -> Result<String, StoreError> {
    segment(lesson_id, "lesson_id")
}

pub fn lesson_completion_key(student_id: &str, lesson_id: &str) -> Result<String, StoreError> {
    Ok(format!(
        "{}:{}",
        segment(student_id, "student_id")?,
        segment(lesson_id, "lesson_id")?
    ))
}

pub fn lesson_completion_prefix(student_id: &str) -> Result<String, StoreError> {
    Ok(format!("{}:", segment(student_id, "student_id")?))
}

pub fn homework_key(student_id: &str, homework_id: &str) -> Result<String, StoreError> {
    Ok(format!(
        "{}:{}",
        segment(student_id, "student_id")?,
        segment(homework_id, "homework_id")?
    ))
}

pub fn homework_prefix(student_id: &str) -> Result<String, StoreError> {
    Ok(format!("{}:", segment(student_id, "student_id")?))
}

/// Runs sort newest window first.
pub fn leaderboard_run_key(period_end_ms: i64, run_id: &str) -> Result<String, StoreError> {
    Ok(format!(
        "{:020}:{}",
        reverse_ts(period_end_ms),
        segment(run_id, "run_id")?
    ))
}

pub fn leaderboard_entry_key(run_id: &str, seq: usize) -> Result<String, StoreError> {
    Ok(format!("{}:{:06}", segment(run_id, "run_id")?, seq))
}

pub fn leaderboard_entry_prefix(run_id: &str) -> Result<String, StoreError> {
    Ok(format!("{}:", segment(run_id, "run_id")?))
}

pub fn leaderboard_student_key(student_id: &str, period_end_ms: i64) -> Result<String, StoreError> {
    Ok(format!(
        "{}:{:020}",
        segment(student_id, "student_id")?,
        reverse_ts(period_end_ms)
    ))
}

pub fn leaderboard_student_prefix(student_id: &str) -> Result<String, StoreError> {
    Ok(format!("{}:", segment(student_id, "student_id")?))
}

/// Parse the period end (ms) back out of a `leaderboard_by_student` key.
pub fn parse_leaderboard_student_end_ms(key: &[u8]) -> Option<i64> {
    let sep = key.iter().rposition(|b| *b == b':')?;
    let reverse = std::str::from_utf8(&key[sep + 1..]).ok()?.parse::<u64>().ok()?;
    i64::try_from(u64::MAX.checked_sub(reverse)?).ok()
}

pub fn daily_snapshot_key(date: &str) -> String {
    date.to_string()
}

pub fn engagement_flag_key(date: &str, student_id: &str) -> Result<String, StoreError> {
    Ok(format!("{}:{}", date, segment(student_id, "student_id")?))
}

pub fn engagement_flag_prefix(date: &str) -> String {
    format!("{date}:")
}

pub fn report_job_key(week_ending: &str, student_id: &str) -> Result<String, StoreError> {
    Ok(format!("{}:{}", week_ending, segment(student_id, "student_id")?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempt_key_orders_by_time_desc() {
        let k_new = attempt_key("s1", 2000, "a2").unwrap();
        let k_old = attempt_key("s1", 1000, "a1").unwrap();
        assert!(k_new < k_old);
    }

    #[test]
    fn xp_event_key_orders_by_time_asc() {
        let k_new = xp_event_key("s1", 2000, "e2").unwrap();
        let k_old = xp_event_key("s1", 1000, "e1").unwrap();
        assert!(k_old < k_new);
        assert!(xp_event_bound("s1", 1500).unwrap() < k_new);
        assert!(xp_event_bound("s1", 1500).unwrap() > k_old);
    }

    #[test]
    fn separator_in_id_is_rejected() {
        assert!(matches!(
            student_key("a:b"),
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(student_key(""), Err(StoreError::Validation(_))));
    }

    #[test]
    fn leaderboard_student_key_round_trips_end() {
        let key = leaderboard_student_key("s1", 1_700_000_000_000).unwrap();
        assert_eq!(
            parse_leaderboard_student_end_ms(key.as_bytes()),
            Some(1_700_000_000_000)
        );
    }
}

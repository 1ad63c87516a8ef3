use crate::db::models::MuteTarget;

/// Split records into (muted, unmuted), each most recently updated first
pub fn split_by_status(records: Vec<MuteTarget>) -> (Vec<MuteTarget>, Vec<MuteTarget>) {
    let (mut muted, mut unmuted): (Vec<_>, Vec<_>) =
        records.into_iter().partition(MuteTarget::is_muted);

    muted.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    unmuted.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

    (muted, unmuted)
}

/// One table row for a muted record
pub fn muted_row(record: &MuteTarget) -> String {
    let until = match record.unmuted_at {
        Some(t) => t.to_string(),
        None => "no limit".to_string(),
    };
    format!(
        "{:<32} muted since {}  until {}",
        truncate(&record.key, 32),
        record.updated_at,
        until
    )
}

/// One table row for an unmuted record
pub fn unmuted_row(record: &MuteTarget) -> String {
    format!(
        "{:<32} updated {}  created {}",
        truncate(&record.key, 32),
        record.updated_at,
        record.created_at
    )
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

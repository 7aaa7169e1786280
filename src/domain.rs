pub use crate::staralign::Notification;

const FRIEND_REQUEST_MARKER: &str = "friend_request";

pub fn is_friend_request(notification: &Notification) -> bool {
    notification
        .kind()
        .to_lowercase()
        .contains(FRIEND_REQUEST_MARKER)
}

pub fn friend_requests(notifications: &[Notification]) -> Vec<&Notification> {
    notifications
        .iter()
        .filter(|n| is_friend_request(n))
        .collect()
}

/// Cuts `text` to at most `max_chars` characters without splitting one.
pub fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

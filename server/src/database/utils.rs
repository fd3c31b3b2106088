use std::time::{SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in seconds
pub fn get_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Generate a random UUID v4 string (session ids, post ids)
pub fn generate_uuid_token() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Sanitize string for database (remove null bytes, trim)
pub fn sanitize_string(input: &str) -> String {
    input.replace('\0', "").trim().to_string()
}

/// Truncate string to max length (in characters)
pub fn truncate_string(input: &str, max_length: usize) -> String {
    input.chars().take(max_length).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp() {
        let ts = get_timestamp();
        assert!(ts > 1_600_000_000);
    }

    #[test]
    fn test_uuid_token() {
        let token1 = generate_uuid_token();
        let token2 = generate_uuid_token();
        assert_ne!(token1, token2);
        assert_eq!(token1.len(), 36);
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize_string("  test  "), "test");
        assert_eq!(sanitize_string("test\0null"), "testnull");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate_string("hello", 10), "hello");
        assert_eq!(truncate_string("hello world", 5), "hello");
        assert_eq!(truncate_string("héllo", 2), "hé");
    }
}

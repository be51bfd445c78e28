//! Secret types for values that must never reach logs.
//!
//! Re-exports [`secrecy`]. Connection strings such as `REDIS_URL` may embed
//! credentials (`redis://:password@host:6379`), so configuration stores them
//! as [`SecretString`] and only calls `expose_secret()` at the point of use.

pub use secrecy::{ExposeSecret, SecretString};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_string_is_redacted_in_debug() {
        let url = SecretString::from("redis://:hunter2@cache:6379");
        let debug_str = format!("{url:?}");

        assert!(debug_str.contains("REDACTED"));
        assert!(!debug_str.contains("hunter2"));
    }

    #[test]
    fn test_expose_secret_returns_connection_string() {
        let url = SecretString::from("redis://localhost:6379");
        assert_eq!(url.expose_secret(), "redis://localhost:6379");
    }
}

//! Handler and waiter predicates
//!
//! Predicates are shared `Arc`s so one predicate attached to several
//! registrations is evaluated once per dispatch.

use chatlink_core::Snowflake;
use serde_json::Value;
use std::sync::Arc;

/// A filter on a dispatched payload
pub type Predicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Wrap a closure as a [`Predicate`]
pub fn predicate<F>(f: F) -> Predicate
where
    F: Fn(&Value) -> bool + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Identifier stored at a JSON pointer, as a string or a number
#[must_use]
pub fn id_at(data: &Value, pointer: &str) -> Option<Snowflake> {
    match data.pointer(pointer)? {
        Value::String(s) => Snowflake::parse(s).ok(),
        Value::Number(n) => n.as_u64().map(Snowflake::new),
        _ => None,
    }
}

/// Author (or reacting user) is `user_id`
#[must_use]
pub fn from_user(user_id: Snowflake) -> Predicate {
    predicate(move |data| {
        id_at(data, "/author/id").or_else(|| id_at(data, "/user_id")) == Some(user_id)
    })
}

#[must_use]
pub fn in_channel(channel_id: Snowflake) -> Predicate {
    predicate(move |data| id_at(data, "/channel_id") == Some(channel_id))
}

#[must_use]
pub fn in_guild(guild_id: Snowflake) -> Predicate {
    predicate(move |data| id_at(data, "/guild_id") == Some(guild_id))
}

/// Message content starts with `prefix`
pub fn content_starts_with(prefix: impl Into<String>) -> Predicate {
    let prefix = prefix.into();
    predicate(move |data| {
        data.get("content")
            .and_then(Value::as_str)
            .is_some_and(|content| content.starts_with(&prefix))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_id_at() {
        let data = json!({"author": {"id": "42"}, "channel_id": 7, "guild_id": null});
        assert_eq!(id_at(&data, "/author/id"), Some(Snowflake::new(42)));
        assert_eq!(id_at(&data, "/channel_id"), Some(Snowflake::new(7)));
        assert_eq!(id_at(&data, "/guild_id"), None);
        assert_eq!(id_at(&data, "/missing"), None);
    }

    #[test]
    fn test_from_user() {
        let p = from_user(Snowflake::new(42));
        assert!(p(&json!({"author": {"id": "42"}})));
        assert!(p(&json!({"user_id": "42", "emoji": {"name": "x"}})));
        assert!(!p(&json!({"author": {"id": "43"}})));
    }

    #[test]
    fn test_location_predicates() {
        let data = json!({"channel_id": "1", "guild_id": "2"});
        assert!(in_channel(Snowflake::new(1))(&data));
        assert!(in_guild(Snowflake::new(2))(&data));
        assert!(!in_guild(Snowflake::new(3))(&data));
    }

    #[test]
    fn test_content_starts_with() {
        let p = content_starts_with("!ping");
        assert!(p(&json!({"content": "!ping now"})));
        assert!(!p(&json!({"content": "ping"})));
        assert!(!p(&json!({})));
    }
}

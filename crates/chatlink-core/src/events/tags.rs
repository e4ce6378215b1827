//! Synthetic event-name tags
//!
//! Message-shaped events from direct channels are re-tagged `DIRECT_`, and
//! events authored by bots or webhooks are re-tagged `BOT_`. The tags compose
//! as `BOT_DIRECT_<EVENT>`.

use super::EventType;
use bitflags::bitflags;
use serde_json::Value;

bitflags! {
    /// Tags prepended to a dispatched event name
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EventTags: u8 {
        /// Event happened outside a guild
        const DIRECT = 1 << 0;
        /// Event was produced by a bot account or a webhook
        const BOT    = 1 << 1;
    }
}

impl EventTags {
    /// Prefix for the tag combination (`""`, `"DIRECT_"`, `"BOT_"`, `"BOT_DIRECT_"`)
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        let direct = self.contains(Self::DIRECT);
        let bot = self.contains(Self::BOT);
        match (bot, direct) {
            (true, true) => "BOT_DIRECT_",
            (true, false) => "BOT_",
            (false, true) => "DIRECT_",
            (false, false) => "",
        }
    }

    /// Apply the tags to an event name
    #[must_use]
    pub fn apply(self, name: &str) -> String {
        format!("{}{name}", self.prefix())
    }

    /// Work out which tags a dispatched payload carries
    ///
    /// Only message-shaped events are tagged; everything else dispatches under
    /// its plain name.
    #[must_use]
    pub fn classify(event: EventType, data: &Value) -> Self {
        if !event.is_message_shaped() {
            return Self::empty();
        }

        let mut tags = Self::empty();
        if is_null_or_missing(data.get("guild_id")) {
            tags |= Self::DIRECT;
        }
        if is_from_bot(data) {
            tags |= Self::BOT;
        }
        tags
    }

    /// Names a payload with these tags answers to, most specific first
    ///
    /// `BOT | DIRECT` on `MESSAGE_CREATE` yields `BOT_DIRECT_MESSAGE_CREATE`,
    /// `DIRECT_MESSAGE_CREATE`, `BOT_MESSAGE_CREATE`, `MESSAGE_CREATE`.
    #[must_use]
    pub fn candidate_names(self, name: &str) -> Vec<String> {
        let mut names = Vec::with_capacity(4);
        for tags in [self, Self::DIRECT, Self::BOT, Self::empty()] {
            if self.contains(tags) {
                let candidate = tags.apply(name);
                if !names.contains(&candidate) {
                    names.push(candidate);
                }
            }
        }
        names
    }
}

fn is_null_or_missing(value: Option<&Value>) -> bool {
    value.map_or(true, Value::is_null)
}

fn is_from_bot(data: &Value) -> bool {
    let flag = |v: Option<&Value>| v.and_then(Value::as_bool).unwrap_or(false);

    flag(data.pointer("/author/bot"))
        || flag(data.pointer("/member/user/bot"))
        || !is_null_or_missing(data.get("webhook_id"))
}

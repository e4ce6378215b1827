//! Gateway intents bitflags
//!
//! Each bit subscribes the connection to a category of gateway events. The
//! combined mask is sent in the Identify payload.

use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

bitflags! {
    /// Gateway subscription intents
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Intents: u64 {
        /// Guild, role, channel, thread and stage lifecycle
        const GUILDS                        = 1 << 0;
        /// Member add/update/remove (privileged)
        const GUILD_MEMBERS                 = 1 << 1;
        /// Bans and audit log entries
        const GUILD_MODERATION              = 1 << 2;
        /// Emoji and sticker updates
        const GUILD_EMOJIS_AND_STICKERS     = 1 << 3;
        /// Integration updates
        const GUILD_INTEGRATIONS            = 1 << 4;
        /// Webhook updates
        const GUILD_WEBHOOKS                = 1 << 5;
        /// Invite create/delete
        const GUILD_INVITES                 = 1 << 6;
        /// Voice state updates
        const GUILD_VOICE_STATES            = 1 << 7;
        /// Presence updates (privileged)
        const GUILD_PRESENCES               = 1 << 8;
        /// Messages in guild channels
        const GUILD_MESSAGES                = 1 << 9;
        /// Reactions in guild channels
        const GUILD_MESSAGE_REACTIONS       = 1 << 10;
        /// Typing in guild channels
        const GUILD_MESSAGE_TYPING          = 1 << 11;
        /// Messages in direct channels
        const DIRECT_MESSAGES               = 1 << 12;
        /// Reactions in direct channels
        const DIRECT_MESSAGE_REACTIONS      = 1 << 13;
        /// Typing in direct channels
        const DIRECT_MESSAGE_TYPING         = 1 << 14;
        /// Message content fields (privileged)
        const MESSAGE_CONTENT               = 1 << 15;
        /// Scheduled events
        const GUILD_SCHEDULED_EVENTS        = 1 << 16;
        /// Auto moderation rule changes
        const AUTO_MODERATION_CONFIGURATION = 1 << 20;
        /// Auto moderation actions
        const AUTO_MODERATION_EXECUTION     = 1 << 21;

        /// Intents that must be enabled in the application settings
        const PRIVILEGED = Self::GUILD_MEMBERS.bits()
            | Self::GUILD_PRESENCES.bits()
            | Self::MESSAGE_CONTENT.bits();
    }
}

impl Intents {
    /// Every intent that does not require approval
    #[must_use]
    pub fn non_privileged() -> Self {
        Self::all().difference(Self::PRIVILEGED)
    }

    /// Check whether any privileged intent is requested
    #[inline]
    pub fn is_privileged(&self) -> bool {
        self.intersects(Self::PRIVILEGED)
    }

    /// Parse from string representation (decimal number)
    pub fn parse(s: &str) -> Result<Self, std::num::ParseIntError> {
        s.trim().parse::<u64>().map(Intents::from_bits_truncate)
    }
}

impl fmt::Display for Intents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits())
    }
}

// Identify expects a plain integer
impl Serialize for Intents {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(self.bits())
    }
}

impl<'de> Deserialize<'de> for Intents {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = u64::deserialize(deserializer)?;
        Ok(Intents::from_bits_truncate(bits))
    }
}

impl From<u64> for Intents {
    fn from(bits: u64) -> Self {
        Intents::from_bits_truncate(bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_positions() {
        assert_eq!(Intents::GUILDS.bits(), 1);
        assert_eq!(Intents::GUILD_MESSAGES.bits(), 512);
        assert_eq!(Intents::DIRECT_MESSAGES.bits(), 4096);
        assert_eq!(Intents::MESSAGE_CONTENT.bits(), 32768);
        assert_eq!(Intents::AUTO_MODERATION_EXECUTION.bits(), 1 << 21);
    }

    #[test]
    fn test_privileged() {
        assert!(Intents::GUILD_MEMBERS.is_privileged());
        assert!(!Intents::GUILD_MESSAGES.is_privileged());
        assert!(!Intents::non_privileged().is_privileged());
        assert!(Intents::non_privileged().contains(Intents::GUILDS | Intents::DIRECT_MESSAGES));
    }

    #[test]
    fn test_serialize_as_integer() {
        let intents = Intents::GUILDS | Intents::GUILD_MESSAGES;
        assert_eq!(serde_json::to_string(&intents).unwrap(), "513");

        let parsed: Intents = serde_json::from_str("513").unwrap();
        assert_eq!(parsed, intents);
    }

    #[test]
    fn test_default_is_empty() {
        assert!(Intents::default().is_empty());
        assert_eq!(Intents::default().to_string(), "0");
    }

    #[test]
    fn test_parse() {
        assert_eq!(Intents::parse(" 4608 ").unwrap(), Intents::GUILD_MESSAGES | Intents::DIRECT_MESSAGES);
        assert!(Intents::parse("abc").is_err());
    }
}

//! Gateway event types
//!
//! Defines the event names carried in the `t` field of dispatch messages and
//! the intents each one needs.

use super::EventTags;
use crate::value_objects::Intents;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Gateway event types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    // Connection events
    /// Sent after successful Identify
    Ready,
    /// Sent after successful Resume
    Resumed,

    // Guild events
    /// Guild available, joined, or created
    GuildCreate,
    /// Guild settings changed
    GuildUpdate,
    /// Left guild, kicked, or guild became unavailable
    GuildDelete,
    /// Audit log entry created
    GuildAuditLogEntryCreate,
    /// User banned
    GuildBanAdd,
    /// User unbanned
    GuildBanRemove,
    /// Guild emojis changed
    GuildEmojisUpdate,
    /// Guild stickers changed
    GuildStickersUpdate,
    /// Guild integrations changed
    GuildIntegrationsUpdate,
    /// Role created
    GuildRoleCreate,
    /// Role updated
    GuildRoleUpdate,
    /// Role deleted
    GuildRoleDelete,
    /// Response to a Request Guild Members command
    GuildMembersChunk,
    /// Scheduled event created
    GuildScheduledEventCreate,
    /// Scheduled event updated
    GuildScheduledEventUpdate,
    /// Scheduled event deleted
    GuildScheduledEventDelete,

    // Member events
    /// User joined guild
    GuildMemberAdd,
    /// Member updated (roles, nickname)
    GuildMemberUpdate,
    /// User left guild
    GuildMemberRemove,

    // Channel events
    /// Channel created
    ChannelCreate,
    /// Channel updated
    ChannelUpdate,
    /// Channel deleted
    ChannelDelete,
    /// Message pinned or unpinned
    ChannelPinsUpdate,
    /// Thread created
    ThreadCreate,
    /// Thread updated
    ThreadUpdate,
    /// Thread deleted
    ThreadDelete,
    /// Members added to or removed from a thread
    ThreadMembersUpdate,

    // Message events
    /// New message
    MessageCreate,
    /// Message edited
    MessageUpdate,
    /// Message deleted
    MessageDelete,
    /// Multiple messages deleted at once
    MessageDeleteBulk,

    // Reaction events
    /// Reaction added
    MessageReactionAdd,
    /// Reaction removed
    MessageReactionRemove,
    /// All reactions removed from a message
    MessageReactionRemoveAll,
    /// All reactions of one emoji removed from a message
    MessageReactionRemoveEmoji,

    // Presence events
    /// User status changed
    PresenceUpdate,
    /// User started typing
    TypingStart,

    // Misc events
    /// Invite created
    InviteCreate,
    /// Invite deleted
    InviteDelete,
    /// Current user updated
    UserUpdate,
    /// Someone joined, left, or moved a voice channel
    VoiceStateUpdate,
    /// Voice server assigned
    VoiceServerUpdate,
    /// Channel webhooks changed
    WebhooksUpdate,
    /// User used an interaction
    InteractionCreate,
    /// Auto moderation rule created
    AutoModerationRuleCreate,
    /// Auto moderation rule updated
    AutoModerationRuleUpdate,
    /// Auto moderation rule deleted
    AutoModerationRuleDelete,
    /// Auto moderation rule triggered
    AutoModerationActionExecution,
}

impl EventType {
    /// Every known event type
    pub const ALL: &'static [EventType] = &[
        Self::Ready,
        Self::Resumed,
        Self::GuildCreate,
        Self::GuildUpdate,
        Self::GuildDelete,
        Self::GuildAuditLogEntryCreate,
        Self::GuildBanAdd,
        Self::GuildBanRemove,
        Self::GuildEmojisUpdate,
        Self::GuildStickersUpdate,
        Self::GuildIntegrationsUpdate,
        Self::GuildRoleCreate,
        Self::GuildRoleUpdate,
        Self::GuildRoleDelete,
        Self::GuildMembersChunk,
        Self::GuildScheduledEventCreate,
        Self::GuildScheduledEventUpdate,
        Self::GuildScheduledEventDelete,
        Self::GuildMemberAdd,
        Self::GuildMemberUpdate,
        Self::GuildMemberRemove,
        Self::ChannelCreate,
        Self::ChannelUpdate,
        Self::ChannelDelete,
        Self::ChannelPinsUpdate,
        Self::ThreadCreate,
        Self::ThreadUpdate,
        Self::ThreadDelete,
        Self::ThreadMembersUpdate,
        Self::MessageCreate,
        Self::MessageUpdate,
        Self::MessageDelete,
        Self::MessageDeleteBulk,
        Self::MessageReactionAdd,
        Self::MessageReactionRemove,
        Self::MessageReactionRemoveAll,
        Self::MessageReactionRemoveEmoji,
        Self::PresenceUpdate,
        Self::TypingStart,
        Self::InviteCreate,
        Self::InviteDelete,
        Self::UserUpdate,
        Self::VoiceStateUpdate,
        Self::VoiceServerUpdate,
        Self::WebhooksUpdate,
        Self::InteractionCreate,
        Self::AutoModerationRuleCreate,
        Self::AutoModerationRuleUpdate,
        Self::AutoModerationRuleDelete,
        Self::AutoModerationActionExecution,
    ];

    /// Get the string representation of the event type
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "READY",
            Self::Resumed => "RESUMED",
            Self::GuildCreate => "GUILD_CREATE",
            Self::GuildUpdate => "GUILD_UPDATE",
            Self::GuildDelete => "GUILD_DELETE",
            Self::GuildAuditLogEntryCreate => "GUILD_AUDIT_LOG_ENTRY_CREATE",
            Self::GuildBanAdd => "GUILD_BAN_ADD",
            Self::GuildBanRemove => "GUILD_BAN_REMOVE",
            Self::GuildEmojisUpdate => "GUILD_EMOJIS_UPDATE",
            Self::GuildStickersUpdate => "GUILD_STICKERS_UPDATE",
            Self::GuildIntegrationsUpdate => "GUILD_INTEGRATIONS_UPDATE",
            Self::GuildRoleCreate => "GUILD_ROLE_CREATE",
            Self::GuildRoleUpdate => "GUILD_ROLE_UPDATE",
            Self::GuildRoleDelete => "GUILD_ROLE_DELETE",
            Self::GuildMembersChunk => "GUILD_MEMBERS_CHUNK",
            Self::GuildScheduledEventCreate => "GUILD_SCHEDULED_EVENT_CREATE",
            Self::GuildScheduledEventUpdate => "GUILD_SCHEDULED_EVENT_UPDATE",
            Self::GuildScheduledEventDelete => "GUILD_SCHEDULED_EVENT_DELETE",
            Self::GuildMemberAdd => "GUILD_MEMBER_ADD",
            Self::GuildMemberUpdate => "GUILD_MEMBER_UPDATE",
            Self::GuildMemberRemove => "GUILD_MEMBER_REMOVE",
            Self::ChannelCreate => "CHANNEL_CREATE",
            Self::ChannelUpdate => "CHANNEL_UPDATE",
            Self::ChannelDelete => "CHANNEL_DELETE",
            Self::ChannelPinsUpdate => "CHANNEL_PINS_UPDATE",
            Self::ThreadCreate => "THREAD_CREATE",
            Self::ThreadUpdate => "THREAD_UPDATE",
            Self::ThreadDelete => "THREAD_DELETE",
            Self::ThreadMembersUpdate => "THREAD_MEMBERS_UPDATE",
            Self::MessageCreate => "MESSAGE_CREATE",
            Self::MessageUpdate => "MESSAGE_UPDATE",
            Self::MessageDelete => "MESSAGE_DELETE",
            Self::MessageDeleteBulk => "MESSAGE_DELETE_BULK",
            Self::MessageReactionAdd => "MESSAGE_REACTION_ADD",
            Self::MessageReactionRemove => "MESSAGE_REACTION_REMOVE",
            Self::MessageReactionRemoveAll => "MESSAGE_REACTION_REMOVE_ALL",
            Self::MessageReactionRemoveEmoji => "MESSAGE_REACTION_REMOVE_EMOJI",
            Self::PresenceUpdate => "PRESENCE_UPDATE",
            Self::TypingStart => "TYPING_START",
            Self::InviteCreate => "INVITE_CREATE",
            Self::InviteDelete => "INVITE_DELETE",
            Self::UserUpdate => "USER_UPDATE",
            Self::VoiceStateUpdate => "VOICE_STATE_UPDATE",
            Self::VoiceServerUpdate => "VOICE_SERVER_UPDATE",
            Self::WebhooksUpdate => "WEBHOOKS_UPDATE",
            Self::InteractionCreate => "INTERACTION_CREATE",
            Self::AutoModerationRuleCreate => "AUTO_MODERATION_RULE_CREATE",
            Self::AutoModerationRuleUpdate => "AUTO_MODERATION_RULE_UPDATE",
            Self::AutoModerationRuleDelete => "AUTO_MODERATION_RULE_DELETE",
            Self::AutoModerationActionExecution => "AUTO_MODERATION_ACTION_EXECUTION",
        }
    }

    /// Parse an event type from its wire name
    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|event| event.as_str() == s)
    }

    /// Whether the event concerns a message in a channel that may be a
    /// direct channel (the payload then lacks `guild_id`)
    #[must_use]
    pub const fn is_message_shaped(self) -> bool {
        matches!(
            self,
            Self::MessageCreate
                | Self::MessageUpdate
                | Self::MessageDelete
                | Self::MessageDeleteBulk
                | Self::MessageReactionAdd
                | Self::MessageReactionRemove
                | Self::MessageReactionRemoveAll
                | Self::MessageReactionRemoveEmoji
                | Self::TypingStart
                | Self::ChannelPinsUpdate
        )
    }

    /// Intents the connection needs to receive this event
    ///
    /// Message-shaped events need both the guild and direct intent unless the
    /// registration is narrowed to direct channels with [`EventTags::DIRECT`].
    #[must_use]
    pub fn required_intents(self, tags: EventTags) -> Intents {
        let direct_only = tags.contains(EventTags::DIRECT);
        let (guild, direct) = match self {
            Self::MessageCreate
            | Self::MessageUpdate
            | Self::MessageDelete
            | Self::MessageDeleteBulk => (Intents::GUILD_MESSAGES, Intents::DIRECT_MESSAGES),
            Self::MessageReactionAdd
            | Self::MessageReactionRemove
            | Self::MessageReactionRemoveAll
            | Self::MessageReactionRemoveEmoji => (
                Intents::GUILD_MESSAGE_REACTIONS,
                Intents::DIRECT_MESSAGE_REACTIONS,
            ),
            Self::TypingStart => (Intents::GUILD_MESSAGE_TYPING, Intents::DIRECT_MESSAGE_TYPING),
            Self::ChannelPinsUpdate => (Intents::GUILDS, Intents::DIRECT_MESSAGES),
            other => return other.guild_intents(),
        };

        if direct_only {
            direct
        } else {
            guild | direct
        }
    }

    fn guild_intents(self) -> Intents {
        match self {
            Self::GuildCreate
            | Self::GuildUpdate
            | Self::GuildDelete
            | Self::GuildRoleCreate
            | Self::GuildRoleUpdate
            | Self::GuildRoleDelete
            | Self::ChannelCreate
            | Self::ChannelUpdate
            | Self::ChannelDelete
            | Self::ThreadCreate
            | Self::ThreadUpdate
            | Self::ThreadDelete => Intents::GUILDS,
            Self::GuildMemberAdd
            | Self::GuildMemberUpdate
            | Self::GuildMemberRemove
            | Self::ThreadMembersUpdate => Intents::GUILD_MEMBERS,
            Self::GuildAuditLogEntryCreate | Self::GuildBanAdd | Self::GuildBanRemove => {
                Intents::GUILD_MODERATION
            }
            Self::GuildEmojisUpdate | Self::GuildStickersUpdate => {
                Intents::GUILD_EMOJIS_AND_STICKERS
            }
            Self::GuildIntegrationsUpdate => Intents::GUILD_INTEGRATIONS,
            Self::WebhooksUpdate => Intents::GUILD_WEBHOOKS,
            Self::InviteCreate | Self::InviteDelete => Intents::GUILD_INVITES,
            Self::VoiceStateUpdate => Intents::GUILD_VOICE_STATES,
            Self::PresenceUpdate => Intents::GUILD_PRESENCES,
            Self::GuildScheduledEventCreate
            | Self::GuildScheduledEventUpdate
            | Self::GuildScheduledEventDelete => Intents::GUILD_SCHEDULED_EVENTS,
            Self::AutoModerationRuleCreate
            | Self::AutoModerationRuleUpdate
            | Self::AutoModerationRuleDelete => Intents::AUTO_MODERATION_CONFIGURATION,
            Self::AutoModerationActionExecution => Intents::AUTO_MODERATION_EXECUTION,
            _ => Intents::empty(),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<EventType> for String {
    fn from(event: EventType) -> Self {
        event.as_str().to_string()
    }
}

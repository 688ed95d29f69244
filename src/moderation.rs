//! Exemption checks, purge selection and the paced deletion loop.

use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serenity::all::{Message, MessageId, Role, RoleId, UserId};

use crate::error::{BotError, BotResult};
use crate::platform::MessageDeleter;

/// Role names (compared lower-cased) that exempt a member from moderation.
pub const EXEMPT_ROLE_NAMES: [&str; 2] = ["admin", "administrator"];

pub const DEFAULT_PURGE_AMOUNT: u8 = 50;
pub const MAX_FETCH_AMOUNT: u8 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildRole {
    pub id: RoleId,
    pub name: String,
}

impl From<&Role> for GuildRole {
    fn from(role: &Role) -> Self {
        Self {
            id: role.id,
            name: role.name.clone(),
        }
    }
}

/// A guild member as seen by moderation.
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: UserId,
    pub roles: Vec<GuildRole>,
    /// Platform-level administrator permission.
    pub administrator: bool,
}

impl Actor {
    pub fn holds(&self, role: RoleId) -> bool {
        self.roles.iter().any(|r| r.id == role)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMessage {
    pub id: MessageId,
    pub author_id: UserId,
    pub author_is_bot: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&Message> for ChannelMessage {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id,
            author_id: message.author.id,
            author_is_bot: message.author.bot,
            created_at: to_utc(message.timestamp.unix_timestamp()),
        }
    }
}

/// Out-of-range timestamps map to the epoch, which every age check treats as too old.
pub fn to_utc(unix_secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(unix_secs, 0).unwrap_or(DateTime::UNIX_EPOCH)
}

/// Whether `actor` is exempt from purge and auto-delete.
pub fn is_exempt(actor: &Actor) -> bool {
    actor.administrator
        || actor.roles.iter().any(|role| {
            let name = role.name.to_lowercase();
            EXEMPT_ROLE_NAMES.contains(&name.as_str())
        })
}

/// Whether moderation may remove `message`, given its resolved author.
///
/// Messages from bots never are. Authors that are not guild members are
/// treated as non-exempt.
pub fn is_deletable(message: &ChannelMessage, author: Option<&Actor>) -> bool {
    !message.author_is_bot && author.map_or(true, |actor| !is_exempt(actor))
}

pub fn select_for_deletion<F>(messages: Vec<ChannelMessage>, resolve_actor: F) -> Vec<ChannelMessage>
where
    F: Fn(&ChannelMessage) -> Option<Actor>,
{
    messages
        .into_iter()
        .filter(|message| {
            // Bot messages are dropped before their author is ever resolved.
            !message.author_is_bot && is_deletable(message, resolve_actor(message).as_ref())
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeletionPolicy {
    /// Discord refuses to delete messages at or beyond this age.
    pub max_age: Duration,
    /// Pause after each successful deletion.
    pub pacing: StdDuration,
}

impl Default for DeletionPolicy {
    fn default() -> Self {
        Self {
            max_age: Duration::days(14),
            pacing: StdDuration::from_millis(100),
        }
    }
}

impl DeletionPolicy {
    pub fn is_too_old(&self, message: &ChannelMessage, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(message.created_at) >= self.max_age
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeletionOutcome {
    pub deleted: usize,
    pub skipped: usize,
}

impl DeletionOutcome {
    pub fn summary(&self) -> String {
        let mut summary = format!("✅ Deleted {} messages from non-admin users.", self.deleted);
        if self.skipped > 0 {
            summary.push_str(&format!(
                "\n⚠️ Skipped {} messages (too old or couldn't delete).",
                self.skipped
            ));
        }
        summary
    }
}

/// Deletes `selected` in order, one call per message.
///
/// Per-message failures are logged and counted as skipped; they never stop
/// the loop.
pub async fn execute_deletions<D>(
    selected: &[ChannelMessage],
    policy: &DeletionPolicy,
    now: DateTime<Utc>,
    deleter: &D,
) -> DeletionOutcome
where
    D: MessageDeleter + ?Sized,
{
    let mut outcome = DeletionOutcome::default();

    for message in selected {
        if policy.is_too_old(message, now) {
            tracing::debug!(message = message.id.get(), "Skipping message past deletion age");
            outcome.skipped += 1;
            continue;
        }

        match deleter.delete_message(message).await {
            Ok(()) => {
                outcome.deleted += 1;
                tokio::time::sleep(policy.pacing).await;
            }
            Err(why) => {
                tracing::warn!(message = message.id.get(), "Error deleting message: {}", why);
                outcome.skipped += 1;
            }
        }
    }

    outcome
}

/// Selection followed by deletion, for one purge invocation.
pub async fn purge<F, D>(
    fetched: Vec<ChannelMessage>,
    requested: u8,
    resolve_actor: F,
    policy: &DeletionPolicy,
    now: DateTime<Utc>,
    deleter: &D,
) -> BotResult<DeletionOutcome>
where
    F: Fn(&ChannelMessage) -> Option<Actor>,
    D: MessageDeleter + ?Sized,
{
    let selected = select_for_deletion(fetched, resolve_actor);
    if selected.is_empty() {
        return Err(BotError::NoEligibleMessages { checked: requested });
    }

    Ok(execute_deletions(&selected, policy, now, deleter).await)
}

/// Clamps a user-supplied message count into 1..=100.
pub fn fetch_amount(requested: Option<i64>, default: u8) -> u8 {
    requested
        .map(|n| n.clamp(1, MAX_FETCH_AMOUNT as i64) as u8)
        .unwrap_or(default)
}

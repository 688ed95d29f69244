//! Capabilities the moderation core needs from Discord, and the serenity
//! implementations of them.
//!
//! The core only ever talks to these traits, so tests hand it recording
//! doubles instead of an HTTP client.

use std::collections::HashMap;

use serenity::{
    all::{ChannelId, GuildId, Http, Member, Message, PartialGuild, Permissions, RoleId, UserId},
    async_trait,
    http::HttpError,
};

use crate::error::BotResult;
use crate::moderation::{Actor, ChannelMessage, GuildRole};

/// Discord's JSON error code for "Unknown Member".
const UNKNOWN_MEMBER: isize = 10007;

#[async_trait]
pub trait MessageDeleter: Send + Sync {
    async fn delete_message(&self, message: &ChannelMessage) -> BotResult<()>;
}

#[async_trait]
pub trait RoleMutator: Send + Sync {
    async fn add_role(&self, user: UserId, role: RoleId) -> BotResult<()>;
    async fn remove_role(&self, user: UserId, role: RoleId) -> BotResult<()>;
}

/// Deletes messages one at a time from a single channel.
pub struct ChannelDeleter<'a> {
    pub http: &'a Http,
    pub channel_id: ChannelId,
}

#[async_trait]
impl MessageDeleter for ChannelDeleter<'_> {
    async fn delete_message(&self, message: &ChannelMessage) -> BotResult<()> {
        self.channel_id.delete_message(self.http, message.id).await?;
        Ok(())
    }
}

/// Adds and removes role memberships in one guild.
pub struct GuildRoleMutator<'a> {
    pub http: &'a Http,
    pub guild_id: GuildId,
}

#[async_trait]
impl RoleMutator for GuildRoleMutator<'_> {
    async fn add_role(&self, user: UserId, role: RoleId) -> BotResult<()> {
        self.http
            .add_member_role(self.guild_id, user, role, Some("Self-assigned via role button"))
            .await?;
        Ok(())
    }

    async fn remove_role(&self, user: UserId, role: RoleId) -> BotResult<()> {
        self.http
            .remove_member_role(self.guild_id, user, role, Some("Self-removed via role button"))
            .await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RoleInfo {
    pub role: GuildRole,
    pub permissions: Permissions,
}

/// The parts of a guild needed to turn members into [`Actor`]s.
#[derive(Debug, Clone)]
pub struct GuildView {
    pub id: GuildId,
    pub owner_id: UserId,
    pub roles: HashMap<RoleId, RoleInfo>,
}

impl GuildView {
    pub async fn fetch(http: &Http, guild_id: GuildId) -> BotResult<Self> {
        let guild = guild_id.to_partial_guild(http).await?;
        Ok(Self::from(&guild))
    }

    /// Every role of the guild, ordered by id so name lookups pick the same
    /// role on every call.
    pub fn guild_roles(&self) -> Vec<GuildRole> {
        let mut roles: Vec<GuildRole> = self.roles.values().map(|info| info.role.clone()).collect();
        roles.sort_unstable_by_key(|role| role.id);
        roles
    }

    /// Effective guild permissions of a member.
    ///
    /// The owner holds every permission; everyone else gets the union of
    /// their roles and `@everyone`.
    pub fn permissions_of(&self, user_id: UserId, member_roles: &[RoleId]) -> Permissions {
        if user_id == self.owner_id {
            return Permissions::all();
        }
        let everyone = RoleId::new(self.id.get());
        member_roles
            .iter()
            .chain(std::iter::once(&everyone))
            .filter_map(|id| self.roles.get(id))
            .fold(Permissions::empty(), |acc, info| acc | info.permissions)
    }

    /// Builds an actor from a member's role ids.
    ///
    /// `permissions` is the member's resolved permissions when the platform
    /// supplied them (interactions do); otherwise they are derived from the
    /// guild's roles.
    pub fn actor(
        &self,
        user_id: UserId,
        member_roles: &[RoleId],
        permissions: Option<Permissions>,
    ) -> Actor {
        let roles: Vec<GuildRole> = member_roles
            .iter()
            .filter_map(|id| self.roles.get(id))
            .map(|info| info.role.clone())
            .collect();

        let permissions =
            permissions.unwrap_or_else(|| self.permissions_of(user_id, member_roles));

        Actor {
            id: user_id,
            roles,
            administrator: permissions.contains(Permissions::ADMINISTRATOR),
        }
    }

    pub fn actor_from_member(&self, member: &Member) -> Actor {
        self.actor(member.user.id, &member.roles, member.permissions)
    }

    /// Looks a user up in the guild.
    ///
    /// `Ok(None)` means Discord reported the user is not a member. Any other
    /// failure is returned, since exemption cannot be decided without it.
    pub async fn resolve_actor(&self, http: &Http, user_id: UserId) -> BotResult<Option<Actor>> {
        match self.id.member(http, user_id).await {
            Ok(member) => Ok(Some(self.actor(user_id, &member.roles, None))),
            Err(why) if is_missing_member(&why) => {
                tracing::debug!(user = user_id.get(), "User is not a guild member: {}", why);
                Ok(None)
            }
            Err(why) => Err(why.into()),
        }
    }

    /// Resolves every distinct author of `messages` once.
    ///
    /// Bot authors are skipped; the filter drops their messages before it
    /// ever asks for an actor.
    pub async fn resolve_authors(
        &self,
        http: &Http,
        messages: &[ChannelMessage],
    ) -> BotResult<HashMap<UserId, Option<Actor>>> {
        let mut actors = HashMap::new();
        for message in messages.iter().filter(|m| !m.author_is_bot) {
            if actors.contains_key(&message.author_id) {
                continue;
            }
            let actor = self.resolve_actor(http, message.author_id).await?;
            actors.insert(message.author_id, actor);
        }
        Ok(actors)
    }
}

impl From<&PartialGuild> for GuildView {
    fn from(guild: &PartialGuild) -> Self {
        let roles = guild
            .roles
            .iter()
            .map(|(id, role)| {
                (
                    *id,
                    RoleInfo {
                        role: GuildRole::from(role),
                        permissions: role.permissions,
                    },
                )
            })
            .collect();

        Self {
            id: guild.id,
            owner_id: guild.owner_id,
            roles,
        }
    }
}

/// Whether an HTTP failure says the user is not in the guild.
fn is_unknown_member(status: u16, code: isize) -> bool {
    code == UNKNOWN_MEMBER || status == 404
}

fn is_missing_member(err: &serenity::Error) -> bool {
    match err {
        serenity::Error::Http(HttpError::UnsuccessfulRequest(response)) => {
            is_unknown_member(response.status_code.as_u16(), response.error.code)
        }
        _ => false,
    }
}

pub fn channel_messages(messages: &[Message]) -> Vec<ChannelMessage> {
    messages.iter().map(ChannelMessage::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::find_role;

    fn role(id: u64, name: &str, permissions: Permissions) -> (RoleId, RoleInfo) {
        (
            RoleId::new(id),
            RoleInfo {
                role: GuildRole {
                    id: RoleId::new(id),
                    name: name.to_string(),
                },
                permissions,
            },
        )
    }

    fn guild() -> GuildView {
        GuildView {
            id: GuildId::new(1),
            owner_id: UserId::new(99),
            roles: HashMap::from([
                role(1, "@everyone", Permissions::SEND_MESSAGES),
                role(10, "Admin", Permissions::empty()),
                role(11, "Staff", Permissions::ADMINISTRATOR),
                role(12, "members", Permissions::SEND_MESSAGES),
            ]),
        }
    }

    #[test]
    fn actor_carries_role_names() {
        let actor = guild().actor(UserId::new(5), &[RoleId::new(10), RoleId::new(12)], None);

        let mut names: Vec<_> = actor.roles.iter().map(|r| r.name.as_str()).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["Admin", "members"]);
        assert!(!actor.administrator);
    }

    #[test]
    fn unknown_role_ids_are_ignored() {
        let actor = guild().actor(UserId::new(5), &[RoleId::new(500)], None);
        assert!(actor.roles.is_empty());
    }

    #[test]
    fn administrator_comes_from_role_permissions() {
        let actor = guild().actor(UserId::new(5), &[RoleId::new(11)], None);
        assert!(actor.administrator);
    }

    #[test]
    fn owner_is_administrator() {
        let actor = guild().actor(UserId::new(99), &[], None);
        assert!(actor.administrator);
    }

    #[test]
    fn permissions_include_everyone_role() {
        let perms = guild().permissions_of(UserId::new(5), &[RoleId::new(10)]);
        assert!(perms.contains(Permissions::SEND_MESSAGES));
        assert!(!perms.contains(Permissions::MANAGE_MESSAGES));
    }

    #[test]
    fn case_duplicate_roles_resolve_to_the_same_role() {
        for _ in 0..50 {
            let view = GuildView {
                id: GuildId::new(1),
                owner_id: UserId::new(99),
                roles: HashMap::from([
                    role(8, "Lowball", Permissions::empty()),
                    role(4, "LOWBALL", Permissions::empty()),
                    role(6, "lowball", Permissions::empty()),
                    role(2, "Lowball", Permissions::empty()),
                ]),
            };
            let found = find_role(&view.guild_roles(), "lowball").ok().map(|r| r.id);
            assert_eq!(found, Some(RoleId::new(2)));
        }
    }

    #[test]
    fn guild_roles_are_ordered_by_id() {
        let ids: Vec<u64> = guild().guild_roles().iter().map(|r| r.id.get()).collect();
        assert_eq!(ids, vec![1, 10, 11, 12]);
    }

    #[test]
    fn only_unknown_member_errors_count_as_not_a_member() {
        assert!(is_unknown_member(404, UNKNOWN_MEMBER));
        assert!(is_unknown_member(404, 0));
        assert!(!is_unknown_member(503, 0));
        assert!(!is_unknown_member(429, 0));
        assert!(!is_unknown_member(403, 50013));
    }

    #[test]
    fn transport_failures_are_not_missing_members() {
        let err = serenity::Error::Other("connection reset");
        assert!(!is_missing_member(&err));
    }

    #[test]
    fn supplied_permissions_take_precedence() {
        let actor = guild().actor(
            UserId::new(5),
            &[RoleId::new(11)],
            Some(Permissions::SEND_MESSAGES),
        );
        assert!(!actor.administrator);

        let actor = guild().actor(UserId::new(5), &[], Some(Permissions::ADMINISTRATOR));
        assert!(actor.administrator);
    }
}

use crate::error::{BotError, BotResult};
use crate::logging::log_moderation_action;
use crate::moderation::{Actor, GuildRole};
use crate::platform::RoleMutator;

pub const ADD_ROLE_BUTTON_ID: &str = "add_lowball_role";
pub const REMOVE_ROLE_BUTTON_ID: &str = "remove_lowball_role";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleAction {
    Add,
    Remove,
}

impl RoleAction {
    pub fn from_custom_id(custom_id: &str) -> Option<Self> {
        match custom_id {
            ADD_ROLE_BUTTON_ID => Some(Self::Add),
            REMOVE_ROLE_BUTTON_ID => Some(Self::Remove),
            _ => None,
        }
    }

    pub fn custom_id(self) -> &'static str {
        match self {
            Self::Add => ADD_ROLE_BUTTON_ID,
            Self::Remove => REMOVE_ROLE_BUTTON_ID,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantOutcome {
    AlreadyHeld,
    Granted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevokeOutcome {
    NotHeld,
    Revoked,
}

/// Finds a guild role by case-insensitive name.
pub fn find_role<'a>(roles: &'a [GuildRole], name: &str) -> BotResult<&'a GuildRole> {
    let wanted = name.to_lowercase();
    roles
        .iter()
        .find(|role| role.name.to_lowercase() == wanted)
        .ok_or_else(|| {
            tracing::warn!(role = name, "Configured role does not exist in guild");
            BotError::RoleNotFound(name.to_string())
        })
}

pub async fn grant<M>(actor: &Actor, role: &GuildRole, roles: &M) -> BotResult<GrantOutcome>
where
    M: RoleMutator + ?Sized,
{
    if actor.holds(role.id) {
        return Ok(GrantOutcome::AlreadyHeld);
    }

    roles.add_role(actor.id, role.id).await?;
    log_moderation_action("role_grant", actor.id, None, Some(actor.id), &role.name);
    Ok(GrantOutcome::Granted)
}

pub async fn revoke<M>(actor: &Actor, role: &GuildRole, roles: &M) -> BotResult<RevokeOutcome>
where
    M: RoleMutator + ?Sized,
{
    if !actor.holds(role.id) {
        return Ok(RevokeOutcome::NotHeld);
    }

    roles.remove_role(actor.id, role.id).await?;
    log_moderation_action("role_revoke", actor.id, None, Some(actor.id), &role.name);
    Ok(RevokeOutcome::Revoked)
}

/// What the member who pressed a role button is told.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleButtonResult {
    AlreadyHeld(String),
    Granted(String),
    NotHeld(String),
    Revoked(String),
    RoleNotFound(String),
    InternalError,
}

impl RoleButtonResult {
    pub fn message(&self) -> String {
        match self {
            Self::AlreadyHeld(role) => format!("❌ You already have the {} role!", role),
            Self::Granted(role) => format!("✅ You have been given the {} role!", role),
            Self::NotHeld(role) => format!("❌ You don't have the {} role to remove!", role),
            Self::Revoked(role) => format!("✅ The {} role has been removed from you!", role),
            Self::RoleNotFound(role) => format!(
                "❌ Could not find the \"{}\" role. Please make sure it exists and the bot can see it.",
                role
            ),
            Self::InternalError => "❌ There was an error processing your request. Please make sure the bot has permission to manage roles.".to_string(),
        }
    }
}

/// Resolves the configured role and toggles it on `actor`.
///
/// `actor` must reflect the member's roles at the time of the press.
pub async fn on_role_button_press<M>(
    actor: &Actor,
    action: RoleAction,
    guild_roles: &[GuildRole],
    role_name: &str,
    roles: &M,
) -> RoleButtonResult
where
    M: RoleMutator + ?Sized,
{
    let role = match find_role(guild_roles, role_name) {
        Ok(role) => role,
        Err(_) => return RoleButtonResult::RoleNotFound(role_name.to_string()),
    };

    let result = match action {
        RoleAction::Add => grant(actor, role, roles).await.map(|outcome| match outcome {
            GrantOutcome::AlreadyHeld => RoleButtonResult::AlreadyHeld(role.name.clone()),
            GrantOutcome::Granted => RoleButtonResult::Granted(role.name.clone()),
        }),
        RoleAction::Remove => revoke(actor, role, roles).await.map(|outcome| match outcome {
            RevokeOutcome::NotHeld => RoleButtonResult::NotHeld(role.name.clone()),
            RevokeOutcome::Revoked => RoleButtonResult::Revoked(role.name.clone()),
        }),
    };

    result.unwrap_or_else(|why| {
        tracing::error!(user = actor.id.get(), ?action, "Error handling role button: {}", why);
        RoleButtonResult::InternalError
    })
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    };

    use serenity::{
        all::{RoleId, UserId},
        async_trait,
    };
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Call {
        Add(RoleId),
        Remove(RoleId),
    }

    /// Records mutations and keeps the member's role set in step with them.
    struct FakeMember {
        id: UserId,
        held: Mutex<Vec<GuildRole>>,
        calls: Mutex<Vec<Call>>,
        fail: bool,
    }

    impl FakeMember {
        fn new(held: Vec<GuildRole>) -> Self {
            Self {
                id: UserId::new(7),
                held: Mutex::new(held),
                calls: Mutex::default(),
                fail: false,
            }
        }

        fn actor(&self) -> Actor {
            Actor {
                id: self.id,
                roles: self.held.lock().unwrap().clone(),
                administrator: false,
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RoleMutator for FakeMember {
        async fn add_role(&self, _user: UserId, role: RoleId) -> BotResult<()> {
            self.calls.lock().unwrap().push(Call::Add(role));
            if self.fail {
                return Err(BotError::PermissionDenied("Missing Permissions".to_string()));
            }
            self.held.lock().unwrap().push(lowball());
            Ok(())
        }

        async fn remove_role(&self, _user: UserId, role: RoleId) -> BotResult<()> {
            self.calls.lock().unwrap().push(Call::Remove(role));
            self.held.lock().unwrap().retain(|r| r.id != role);
            Ok(())
        }
    }

    struct CountEvents(Arc<AtomicUsize>);

    impl<S: tracing::Subscriber> Layer<S> for CountEvents {
        fn on_event(
            &self,
            _event: &tracing::Event<'_>,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn lowball() -> GuildRole {
        GuildRole {
            id: RoleId::new(42),
            name: "Lowball".to_string(),
        }
    }

    fn guild_roles() -> Vec<GuildRole> {
        vec![
            GuildRole {
                id: RoleId::new(1),
                name: "@everyone".to_string(),
            },
            lowball(),
        ]
    }

    #[test]
    fn role_lookup_ignores_case() {
        let roles = guild_roles();
        assert_eq!(find_role(&roles, "lowball").unwrap().id, RoleId::new(42));
        assert_eq!(find_role(&roles, "LOWBALL").unwrap().id, RoleId::new(42));
        assert!(matches!(
            find_role(&roles, "highball"),
            Err(BotError::RoleNotFound(name)) if name == "highball"
        ));
    }

    #[test]
    fn button_ids_map_to_actions() {
        assert_eq!(RoleAction::from_custom_id("add_lowball_role"), Some(RoleAction::Add));
        assert_eq!(RoleAction::from_custom_id("remove_lowball_role"), Some(RoleAction::Remove));
        assert_eq!(RoleAction::from_custom_id("lowball_modal"), None);
        assert_eq!(RoleAction::Add.custom_id(), ADD_ROLE_BUTTON_ID);
    }

    #[tokio::test]
    async fn grant_twice_mutates_once() {
        let member = FakeMember::new(vec![]);

        let first = grant(&member.actor(), &lowball(), &member).await.unwrap();
        let second = grant(&member.actor(), &lowball(), &member).await.unwrap();

        assert_eq!(first, GrantOutcome::Granted);
        assert_eq!(second, GrantOutcome::AlreadyHeld);
        assert_eq!(member.calls(), vec![Call::Add(RoleId::new(42))]);
    }

    #[tokio::test]
    async fn revoke_twice_mutates_once() {
        let member = FakeMember::new(vec![lowball()]);

        let first = revoke(&member.actor(), &lowball(), &member).await.unwrap();
        let second = revoke(&member.actor(), &lowball(), &member).await.unwrap();

        assert_eq!(first, RevokeOutcome::Revoked);
        assert_eq!(second, RevokeOutcome::NotHeld);
        assert_eq!(member.calls(), vec![Call::Remove(RoleId::new(42))]);
    }

    #[tokio::test]
    async fn grant_for_holder_issues_no_mutation() {
        let member = FakeMember::new(vec![lowball()]);

        let result = on_role_button_press(
            &member.actor(),
            RoleAction::Add,
            &guild_roles(),
            "lowball",
            &member,
        )
        .await;

        assert_eq!(result, RoleButtonResult::AlreadyHeld("Lowball".to_string()));
        assert!(member.calls().is_empty());
    }

    #[tokio::test]
    async fn missing_role_is_reported_and_logged_once() {
        let events = Arc::new(AtomicUsize::new(0));
        let _guard = tracing_subscriber::registry()
            .with(CountEvents(Arc::clone(&events)))
            .set_default();
        let member = FakeMember::new(vec![]);
        let roles = vec![GuildRole {
            id: RoleId::new(1),
            name: "@everyone".to_string(),
        }];

        let result =
            on_role_button_press(&member.actor(), RoleAction::Add, &roles, "lowball", &member).await;

        assert_eq!(result, RoleButtonResult::RoleNotFound("lowball".to_string()));
        assert!(member.calls().is_empty());
        assert_eq!(events.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn mutation_failure_becomes_internal_error() {
        let mut member = FakeMember::new(vec![]);
        member.fail = true;

        let result = on_role_button_press(
            &member.actor(),
            RoleAction::Add,
            &guild_roles(),
            "lowball",
            &member,
        )
        .await;

        assert_eq!(result, RoleButtonResult::InternalError);
        assert_eq!(member.calls().len(), 1);
    }

    #[tokio::test]
    async fn remove_button_revokes_held_role() {
        let member = FakeMember::new(vec![lowball()]);

        let result = on_role_button_press(
            &member.actor(),
            RoleAction::Remove,
            &guild_roles(),
            "lowball",
            &member,
        )
        .await;

        assert_eq!(result, RoleButtonResult::Revoked("Lowball".to_string()));
        assert!(result.message().contains("has been removed"));
        assert!(member.actor().roles.is_empty());
    }
}

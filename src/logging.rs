use serenity::all::{ChannelId, UserId};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "lowball_bot=info,serenity=warn";

pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Records a moderation action on the `moderation` target.
///
/// Moderation actions are not persisted anywhere; this log line is the whole
/// audit trail.
pub fn log_moderation_action(
    action: &str,
    actor: UserId,
    channel: Option<ChannelId>,
    target: Option<UserId>,
    detail: &str,
) {
    tracing::info!(
        target: "moderation",
        action,
        actor = actor.get(),
        channel = channel.map(|id| id.get()),
        target_user = target.map(|id| id.get()),
        "{}",
        detail
    );
}

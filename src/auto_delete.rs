use serenity::all::{Context, Message};

use crate::{
    config::Config,
    logging::log_moderation_action,
    moderation::{is_deletable, ChannelMessage},
    platform::GuildView,
};

/// Removes messages from non-admins in the configured auto-delete channel.
pub async fn handle_message(ctx: &Context, message: &Message, config: &Config) {
    let Some(channel_id) = config.auto_delete_channel_id else {
        return;
    };
    if message.channel_id != channel_id || message.author.bot {
        return;
    }
    let Some(guild_id) = message.guild_id else {
        return;
    };

    let guild = match GuildView::fetch(&ctx.http, guild_id).await {
        Ok(guild) => guild,
        Err(why) => {
            tracing::error!(guild = guild_id.get(), "Error auto-deleting message: {}", why);
            return;
        }
    };

    let author = match message.member.as_ref() {
        Some(member) => Some(guild.actor(message.author.id, &member.roles, member.permissions)),
        None => match guild.resolve_actor(&ctx.http, message.author.id).await {
            Ok(author) => author,
            Err(why) => {
                tracing::error!(
                    user = message.author.id.get(),
                    "Cannot resolve author, keeping message: {}",
                    why
                );
                return;
            }
        },
    };

    if !is_deletable(&ChannelMessage::from(message), author.as_ref()) {
        return;
    }

    match message.delete(&ctx.http).await {
        Ok(()) => log_moderation_action(
            "auto_delete",
            message.author.id,
            Some(channel_id),
            Some(message.author.id),
            &format!("Auto-deleted message from {}", message.author.name),
        ),
        Err(why) => tracing::error!(
            message = message.id.get(),
            "Error auto-deleting message: {}",
            why
        ),
    }
}

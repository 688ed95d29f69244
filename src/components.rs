use serenity::all::*;

use crate::{
    config::Config,
    error::BotError,
    lowball::{Submission, MODAL_ID},
    platform::{GuildRoleMutator, GuildView},
    roles::{on_role_button_press, RoleAction, RoleButtonResult},
};

fn ephemeral(content: impl Into<String>) -> CreateInteractionResponse {
    CreateInteractionResponse::Message(
        CreateInteractionResponseMessage::new()
            .content(content)
            .ephemeral(true),
    )
}

pub async fn role_button(ctx: &Context, component: &ComponentInteraction, config: &Config) {
    let Some(action) = RoleAction::from_custom_id(&component.data.custom_id) else {
        return;
    };

    let content = match (component.guild_id, component.member.as_ref()) {
        (Some(guild_id), Some(member)) => match GuildView::fetch(&ctx.http, guild_id).await {
            Ok(guild) => {
                let actor = guild.actor_from_member(member);
                let mutator = GuildRoleMutator {
                    http: &ctx.http,
                    guild_id,
                };
                on_role_button_press(
                    &actor,
                    action,
                    &guild.guild_roles(),
                    &config.lowball_role_name,
                    &mutator,
                )
                .await
                .message()
            }
            Err(why) => {
                tracing::error!(guild = guild_id.get(), "Error handling role button: {}", why);
                RoleButtonResult::InternalError.message()
            }
        },
        _ => format!("❌ {}.", BotError::NotInGuild),
    };

    if let Err(why) = component.create_response(&ctx.http, ephemeral(content)).await {
        tracing::error!("Cannot respond to role button: {}", why);
    }
}

pub async fn lowball_modal(ctx: &Context, modal: &ModalInteraction, config: &Config) {
    if modal.data.custom_id != MODAL_ID {
        return;
    }

    let content = match (config.lowball_channel_id, Submission::from_components(&modal.data.components)) {
        (None, _) => {
            tracing::warn!("LOWBALL_CHANNEL_ID is not configured; dropping submission");
            "Error: Could not find the designated lowball channel. Please contact an administrator."
        }
        (Some(_), None) => "❌ Please fill in the car, the price and the marketplace link.",
        (Some(channel_id), Some(submission)) => {
            let post = submission.render(modal.user.id, config.lowball_ping_role_id);
            match channel_id.say(&ctx.http, post).await {
                Ok(_) => {
                    tracing::info!(
                        user = modal.user.id.get(),
                        car = %submission.car,
                        "Posted lowball submission"
                    );
                    "✅ Your lowball request has been posted successfully!"
                }
                Err(why) => {
                    tracing::error!(channel = channel_id.get(), "Error sending lowball message: {}", why);
                    "❌ There was an error posting your lowball request. Please try again or contact an administrator."
                }
            }
        }
    };

    if let Err(why) = modal.create_response(&ctx.http, ephemeral(content)).await {
        tracing::error!("Cannot respond to lowball modal: {}", why);
    }
}

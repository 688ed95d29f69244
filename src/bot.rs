use std::sync::Arc;

use serenity::{all::*, async_trait, model::gateway::Ready};

use crate::{auto_delete, commands, components, config::Config, health::BotStatus, lowball};

struct Handler {
    config: Arc<Config>,
    status: BotStatus,
}

impl Handler {
    async fn command(&self, ctx: &Context, command: &CommandInteraction) {
        let name = command.data.name.as_str();

        // A modal has to be the first response, so this one cannot be deferred.
        if name == "lowballmethod" {
            let response = CreateInteractionResponse::Modal(lowball::submission_modal());
            if let Err(why) = command.create_response(&ctx.http, response).await {
                tracing::error!("Cannot show lowball modal: {}", why);
            }
            return;
        }

        if let Err(why) = command
            .create_response(
                &ctx.http,
                CreateInteractionResponse::Defer(
                    CreateInteractionResponseMessage::new().ephemeral(true),
                ),
            )
            .await
        {
            tracing::error!("Cannot defer slash command response: {}", why);
            return;
        }

        let config = self.config.as_ref();
        let result = match name {
            "ping" => commands::ping(ctx, command).await,
            "help" => Ok(commands::help()),
            "clear" => commands::clear(ctx, command, config).await,
            "userinfo" => commands::userinfo(ctx, command).await,
            "say" => commands::say(ctx, command).await,
            "purge" => commands::purge(ctx, command, config).await,
            "setup-reaction-roles" => commands::setup_reaction_roles(ctx, command, config).await,
            _ => Ok("Not implemented".into()),
        };

        let reply = result.unwrap_or_else(|why| commands::error_reply(name, &why).into());

        if let Err(why) = command.edit_response(&ctx.http, reply.into_response()).await {
            tracing::error!("Cannot edit slash command response: {}", why);
        }
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::Command(command) => self.command(&ctx, &command).await,
            Interaction::Component(component) => {
                components::role_button(&ctx, &component, &self.config).await
            }
            Interaction::Modal(modal) => components::lowball_modal(&ctx, &modal, &self.config).await,
            _ => {}
        }
    }

    async fn message(&self, ctx: Context, message: Message) {
        auto_delete::handle_message(&ctx, &message, &self.config).await;
    }

    async fn ready(&self, ctx: Context, ready: Ready) {
        tracing::info!("Ready! Logged in as {}", ready.user.name);
        self.status.set_online(true);

        ctx.set_activity(Some(ActivityData::watching("the marketplace")));

        match Command::set_global_commands(&ctx.http, commands::definitions()).await {
            Ok(cmds) => tracing::info!("Successfully registered {} global commands", cmds.len()),
            Err(why) => tracing::error!("Failed to register global commands: {:?}", why),
        }
    }

    async fn resume(&self, _ctx: Context, _resumed: ResumedEvent) {
        self.status.set_online(true);
    }

    async fn shard_stage_update(&self, _ctx: Context, event: ShardStageUpdateEvent) {
        if event.new != ConnectionStage::Connected {
            self.status.set_online(false);
        }
    }
}

pub async fn run_bot(config: Arc<Config>, status: BotStatus) -> Result<(), serenity::Error> {
    let intents = GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::GUILDS;

    let token = config.token.clone();
    let mut client = Client::builder(token, intents)
        .event_handler(Handler { config, status })
        .await?;

    client.start().await
}

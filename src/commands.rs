use std::time::Instant;

use chrono::Utc;
use serenity::all::*;

use crate::{
    config::Config,
    error::{BotError, BotResult},
    logging::log_moderation_action,
    moderation::{self, fetch_amount, to_utc, DEFAULT_PURGE_AMOUNT},
    platform::{channel_messages, ChannelDeleter, GuildView},
    roles::{find_role, RoleAction},
};

const DEFAULT_SETUP_TITLE: &str = "Facebook Lowball Method";
const DEFAULT_SETUP_DESCRIPTION: &str = "Use the green button below to claim your role. Use the red one if you got the role but then decided to remove it or if you don't want to get pings from it.";

/// Name and help text of every registered command, in display order.
pub const HELP_ENTRIES: [(&str, &str); 8] = [
    ("/lowballmethod", "Submit a car for lowballing"),
    ("/ping", "Check if the bot is working"),
    ("/help", "Show this help message"),
    ("/clear [amount]", "Delete messages (1-100)"),
    ("/userinfo [user]", "Get info about a user"),
    ("/say [message]", "Make the bot say something"),
    ("/purge [amount]", "Delete messages from users without admin role"),
    ("/setup-reaction-roles", "Setup reaction roles for lowball role (Admin only)"),
];

/// Content for the edit of a deferred command response.
pub enum Reply {
    Text(String),
    Embed(CreateEmbed),
}

impl Reply {
    pub fn into_response(self) -> EditInteractionResponse {
        match self {
            Reply::Text(content) => EditInteractionResponse::new().content(content),
            Reply::Embed(embed) => EditInteractionResponse::new().embed(embed),
        }
    }
}

impl From<String> for Reply {
    fn from(content: String) -> Self {
        Reply::Text(content)
    }
}

impl From<&str> for Reply {
    fn from(content: &str) -> Self {
        Reply::Text(content.to_string())
    }
}

fn option_value<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a CommandDataOptionValue> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .map(|opt| &opt.value)
}

fn option_str<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a str> {
    option_value(command, name)
        .and_then(|value| value.as_str())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

async fn check_permissions(
    ctx: &Context,
    command: &CommandInteraction,
    required_permission: Permissions,
) -> BotResult<bool> {
    let guild_id = command.guild_id.ok_or(BotError::NotInGuild)?;
    let member = command.member.as_ref().ok_or(BotError::NotInGuild)?;

    let permissions = match member.permissions {
        Some(permissions) => permissions,
        None => {
            let guild = GuildView::fetch(&ctx.http, guild_id).await?;
            guild.permissions_of(command.user.id, &member.roles)
        }
    };

    tracing::debug!(
        user = command.user.id.get(),
        ?required_permission,
        "Checking permissions"
    );

    Ok(permissions.contains(Permissions::ADMINISTRATOR) || permissions.contains(required_permission))
}

async fn require(
    ctx: &Context,
    command: &CommandInteraction,
    required_permission: Permissions,
    denied: &str,
) -> BotResult<()> {
    if check_permissions(ctx, command, required_permission).await? {
        Ok(())
    } else {
        Err(BotError::PermissionDenied(denied.to_string()))
    }
}

pub async fn ping(ctx: &Context, _command: &CommandInteraction) -> BotResult<Reply> {
    let started = Instant::now();
    ctx.http.get_current_user().await?;
    let latency = started.elapsed().as_millis();

    Ok(format!("🏓 Pong! Bot is working fine. Ping: {}ms", latency).into())
}

pub fn help() -> Reply {
    let embed = CreateEmbed::new()
        .color(0x0099FF)
        .title("🤖 Bot Commands")
        .description("Here are all the commands you can use:")
        .fields(HELP_ENTRIES.iter().map(|(name, value)| (*name, *value, false)))
        .timestamp(Timestamp::now());

    Reply::Embed(embed)
}

pub async fn clear(ctx: &Context, command: &CommandInteraction, config: &Config) -> BotResult<Reply> {
    require(
        ctx,
        command,
        Permissions::MANAGE_MESSAGES,
        "❌ You need \"Manage Messages\" permission to use this command!",
    )
    .await?;

    let amount = fetch_amount(option_value(command, "amount").and_then(|v| v.as_i64()), 1);
    let channel_id = command.channel_id;
    let messages = channel_id
        .messages(&ctx.http, GetMessages::new().limit(amount))
        .await?;

    // Bulk deletion rejects the whole request if any message is too old.
    let now = Utc::now();
    let message_ids: Vec<MessageId> = channel_messages(&messages)
        .iter()
        .filter(|m| !config.deletion.is_too_old(m, now))
        .map(|m| m.id)
        .collect();

    match message_ids.as_slice() {
        [] => {}
        [single] => channel_id.delete_message(&ctx.http, *single).await?,
        ids => channel_id.delete_messages(&ctx.http, ids).await?,
    }

    log_moderation_action(
        "clear",
        command.user.id,
        Some(channel_id),
        None,
        &format!("deleted {} of {} requested", message_ids.len(), amount),
    );

    Ok(format!("✅ Deleted {} messages!", message_ids.len()).into())
}

pub async fn userinfo(ctx: &Context, command: &CommandInteraction) -> BotResult<Reply> {
    let requested = option_value(command, "user").and_then(|v| v.as_user_id());

    let (user, joined_at) = match requested {
        Some(user_id) if user_id != command.user.id => {
            let user = match command.data.resolved.users.get(&user_id) {
                Some(user) => user.clone(),
                None => user_id.to_user(&ctx.http).await?,
            };
            let joined_at = command
                .data
                .resolved
                .members
                .get(&user_id)
                .and_then(|member| member.joined_at);
            (user, joined_at)
        }
        _ => (
            command.user.clone(),
            command.member.as_ref().and_then(|member| member.joined_at),
        ),
    };

    let date = |timestamp: Timestamp| {
        to_utc(timestamp.unix_timestamp())
            .format("%a %b %d %Y")
            .to_string()
    };

    let embed = CreateEmbed::new()
        .color(0x0099FF)
        .title(format!("👤 {}'s Information", user.name))
        .thumbnail(user.face())
        .field("Username", user.name.clone(), true)
        .field("User ID", user.id.to_string(), true)
        .field("Account Created", date(user.id.created_at()), true)
        .field(
            "Joined Server",
            joined_at.map(date).unwrap_or_else(|| "Not in server".to_string()),
            true,
        )
        .timestamp(Timestamp::now());

    Ok(Reply::Embed(embed))
}

pub async fn say(ctx: &Context, command: &CommandInteraction) -> BotResult<Reply> {
    let Some(message) = option_str(command, "message") else {
        return Ok("❌ Please provide a message to send.".into());
    };

    command.channel_id.say(&ctx.http, message).await?;
    Ok("✅ Message sent!".into())
}

pub async fn purge(ctx: &Context, command: &CommandInteraction, config: &Config) -> BotResult<Reply> {
    require(
        ctx,
        command,
        Permissions::MANAGE_MESSAGES,
        "❌ You need \"Manage Messages\" permission to use this command!",
    )
    .await?;

    let guild_id = command.guild_id.ok_or(BotError::NotInGuild)?;
    let amount = fetch_amount(
        option_value(command, "amount").and_then(|v| v.as_i64()),
        DEFAULT_PURGE_AMOUNT,
    );

    let channel_id = command.channel_id;
    let messages = channel_id
        .messages(&ctx.http, GetMessages::new().limit(amount))
        .await?;
    let fetched = channel_messages(&messages);

    let guild = GuildView::fetch(&ctx.http, guild_id).await?;
    let actors = guild.resolve_authors(&ctx.http, &fetched).await?;
    let deleter = ChannelDeleter {
        http: &ctx.http,
        channel_id,
    };

    let outcome = moderation::purge(
        fetched,
        amount,
        |message| actors.get(&message.author_id).cloned().flatten(),
        &config.deletion,
        Utc::now(),
        &deleter,
    )
    .await?;

    log_moderation_action(
        "purge",
        command.user.id,
        Some(channel_id),
        None,
        &format!("deleted {}, skipped {}", outcome.deleted, outcome.skipped),
    );

    Ok(outcome.summary().into())
}

pub async fn setup_reaction_roles(
    ctx: &Context,
    command: &CommandInteraction,
    config: &Config,
) -> BotResult<Reply> {
    require(
        ctx,
        command,
        Permissions::ADMINISTRATOR,
        "❌ You need Administrator permission to use this command!",
    )
    .await?;

    let guild_id = command.guild_id.ok_or(BotError::NotInGuild)?;
    let guild = GuildView::fetch(&ctx.http, guild_id).await?;
    let guild_roles = guild.guild_roles();
    let role = find_role(&guild_roles, &config.lowball_role_name)?;

    let title = option_str(command, "title").unwrap_or(DEFAULT_SETUP_TITLE);
    let description = option_str(command, "description").unwrap_or(DEFAULT_SETUP_DESCRIPTION);

    let embed = CreateEmbed::new()
        .color(0x2F3136)
        .title(title)
        .description(format!(
            "{}\n\n<@&{}>\n\nUse the button below!",
            description, role.id
        ))
        .timestamp(Timestamp::now());

    let buttons = CreateActionRow::Buttons(vec![
        CreateButton::new(RoleAction::Add.custom_id())
            .label("Add the role!")
            .style(ButtonStyle::Success)
            .emoji('⭐'),
        CreateButton::new(RoleAction::Remove.custom_id())
            .label("Remove role / No more pings")
            .style(ButtonStyle::Danger)
            .emoji('❌'),
    ]);

    command
        .channel_id
        .send_message(
            &ctx.http,
            CreateMessage::new().embed(embed).components(vec![buttons]),
        )
        .await?;

    Ok("✅ Reaction roles message has been set up successfully!".into())
}

/// Turns a failed command into the text shown to the invoker.
///
/// Expected refusals are passed through; anything else is logged and replaced
/// with a generic message.
pub fn error_reply(command: &str, err: &BotError) -> String {
    match err {
        BotError::PermissionDenied(message) => message.clone(),
        BotError::NoEligibleMessages { .. } | BotError::NotInGuild => format!("❌ {}.", err),
        BotError::RoleNotFound(name) => {
            format!("❌ Could not find the \"{}\" role. Please make sure it exists first!", name)
        }
        _ => {
            tracing::error!(command, "Error in {} command: {}", command, err);
            match command {
                "purge" => "❌ There was an error purging messages. Make sure I have permission to delete messages in this channel.".to_string(),
                "clear" => "❌ I couldn't delete those messages. Make sure I have permission to manage messages here.".to_string(),
                "setup-reaction-roles" => "❌ There was an error setting up reaction roles. Please try again.".to_string(),
                _ => "❌ Something went wrong while running this command.".to_string(),
            }
        }
    }
}

pub fn definitions() -> Vec<CreateCommand> {
    let amount = |description: &str, required: bool| {
        CreateCommandOption::new(CommandOptionType::Integer, "amount", description)
            .required(required)
            .min_int_value(1)
            .max_int_value(100)
    };

    vec![
        CreateCommand::new("lowballmethod").description("Submit a car for lowballing"),
        CreateCommand::new("ping").description("Check if the bot is working"),
        CreateCommand::new("help").description("Show all available commands"),
        CreateCommand::new("clear")
            .description("Clear messages from this channel")
            .add_option(amount("Number of messages to delete (1-100)", true)),
        CreateCommand::new("userinfo")
            .description("Get information about a user")
            .add_option(CreateCommandOption::new(
                CommandOptionType::User,
                "user",
                "The user to get info about",
            )),
        CreateCommand::new("say")
            .description("Make the bot say something")
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::String,
                    "message",
                    "What you want the bot to say",
                )
                .required(true)
                .max_length(2000),
            ),
        CreateCommand::new("purge")
            .description("Delete all messages from users without admin role")
            .add_option(amount(
                "Number of messages to check (1-100, default: 50)",
                false,
            )),
        CreateCommand::new("setup-reaction-roles")
            .description("Setup reaction roles for the lowball role (Admin only)")
            .add_option(CreateCommandOption::new(
                CommandOptionType::String,
                "title",
                "Title for the reaction role message",
            ))
            .add_option(CreateCommandOption::new(
                CommandOptionType::String,
                "description",
                "Description for the reaction role message",
            )),
    ]
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;

    fn definition(name: &str) -> Value {
        definitions()
            .iter()
            .map(|command| serde_json::to_value(command).unwrap())
            .find(|value| value["name"] == name)
            .unwrap_or_else(|| panic!("command {name} not registered"))
    }

    #[test]
    fn every_help_entry_is_registered() {
        let names: Vec<Value> = definitions()
            .iter()
            .map(|command| serde_json::to_value(command).unwrap()["name"].clone())
            .collect();
        assert_eq!(names.len(), HELP_ENTRIES.len());

        for (entry, _) in HELP_ENTRIES {
            let name = entry.trim_start_matches('/').split(' ').next().unwrap();
            assert!(names.contains(&Value::from(name)), "{name} missing");
        }
    }

    #[test]
    fn purge_amount_is_optional_and_bounded() {
        let purge = definition("purge");
        let amount = &purge["options"][0];

        assert_eq!(amount["name"], "amount");
        assert_eq!(amount["required"], false);
        assert_eq!(amount["min_value"], 1);
        assert_eq!(amount["max_value"], 100);
    }

    #[test]
    fn clear_amount_is_required() {
        assert_eq!(definition("clear")["options"][0]["required"], true);
    }

    #[test]
    fn refusals_pass_through_unchanged() {
        let err = BotError::PermissionDenied("❌ nope".to_string());
        assert_eq!(error_reply("purge", &err), "❌ nope");

        let err = BotError::NoEligibleMessages { checked: 50 };
        assert_eq!(
            error_reply("purge", &err),
            "❌ No messages found from non-admin users in the last 50 messages."
        );

        let err = BotError::RoleNotFound("lowball".to_string());
        assert!(error_reply("setup-reaction-roles", &err).contains("\"lowball\" role"));
    }

    #[test]
    fn unexpected_failures_get_a_generic_reply() {
        let err = BotError::Io(std::io::Error::other("connection reset"));
        let reply = error_reply("purge", &err);

        assert!(reply.starts_with("❌ There was an error purging messages"));
        assert!(!reply.contains("connection reset"));
    }
}

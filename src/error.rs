use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    /// Required environment variable is not set.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Environment variable is set but could not be parsed.
    #[error("Invalid value for environment variable {name}: {value:?}")]
    InvalidEnvVar { name: &'static str, value: String },
}

#[derive(Error, Debug)]
pub enum BotError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The invoking member lacks the capability the command needs.
    #[error("{0}")]
    PermissionDenied(String),

    /// The configured role name does not resolve in the guild.
    #[error("Could not find the \"{0}\" role")]
    RoleNotFound(String),

    /// A purge found nothing it was allowed to delete.
    #[error("No messages found from non-admin users in the last {checked} messages")]
    NoEligibleMessages { checked: u8 },

    #[error("This can only be used inside a server")]
    NotInGuild,

    /// Any failure reported by the Discord client.
    ///
    /// Boxed because `serenity::Error` is large.
    #[error(transparent)]
    Discord(#[from] Box<serenity::Error>),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<serenity::Error> for BotError {
    fn from(err: serenity::Error) -> Self {
        BotError::Discord(Box::new(err))
    }
}

pub type BotResult<T> = Result<T, BotError>;

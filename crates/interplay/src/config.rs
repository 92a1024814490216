//! Runtime configuration for an [`InteractionState`](crate::InteractionState)

use serenity::builder::CreateAllowedMentions;
use url::Url;

/// The default versioned REST API base
pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

/// What to do with an interaction whose type is neither a command nor a
/// component
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum UnknownInteractionPolicy {
    /// Log it at debug level and emit nothing
    #[default]
    Ignore,
    /// Log it as a warning and emit nothing
    Reject,
    /// Attempt to build a slash command from it anyway
    TreatAsCommand,
}

/// Interaction handling configuration
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "clap", derive(clap::Args))]
pub struct Config {
    /// Base URL of the versioned REST API
    #[cfg_attr(
        feature = "clap",
        arg(long, env = "INTERPLAY_API_BASE", default_value = DEFAULT_API_BASE)
    )]
    pub api_base: Url,

    /// How to handle interactions of an unrecognized type
    #[cfg_attr(
        feature = "clap",
        arg(
            long,
            env = "INTERPLAY_UNKNOWN_INTERACTIONS",
            value_enum,
            default_value = "ignore"
        )
    )]
    pub unknown_interactions: UnknownInteractionPolicy,

    /// Let response messages without an explicit mention policy ping users
    /// and roles
    #[cfg_attr(feature = "clap", arg(long, env = "INTERPLAY_ALLOW_MENTIONS"))]
    pub allow_mentions: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            unknown_interactions: UnknownInteractionPolicy::default(),
            allow_mentions: false,
        }
    }
}

impl Config {
    /// The mention policy applied to response messages that do not set their
    /// own
    #[must_use]
    pub fn default_allowed_mentions(&self) -> Option<CreateAllowedMentions> {
        (!self.allow_mentions).then(CreateAllowedMentions::new)
    }
}

fn default_api_base() -> Url {
    DEFAULT_API_BASE
        .parse()
        .expect("Default API base should be a valid URL")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.api_base.as_str(), "https://discord.com/api/v10");
        assert_eq!(cfg.unknown_interactions, UnknownInteractionPolicy::Ignore);
        assert!(cfg.default_allowed_mentions().is_some());

        let cfg = Config {
            allow_mentions: true,
            ..cfg
        };
        assert!(cfg.default_allowed_mentions().is_none());
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};

/// Error returned when an option type code falls outside the closed set of
/// supported types
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Invalid slash option type {0}")]
pub struct InvalidOptionType(pub u8);

/// The type of a slash command option
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum SlashOptionType {
    /// A subcommand
    SubCommand = 1,
    /// A group of subcommands
    SubCommandGroup = 2,
    /// Free-form text
    String = 3,
    /// A whole number
    Integer = 4,
    /// `true` or `false`
    Boolean = 5,
    /// A user, resolved to a user or member object
    User = 6,
    /// A channel, resolved to a channel object
    Channel = 7,
    /// A guild role, resolved to a role object
    Role = 8,
}

impl SlashOptionType {
    /// Whether this option nests other options rather than carrying a value
    #[inline]
    #[must_use]
    pub fn is_subcommand(self) -> bool { matches!(self, Self::SubCommand | Self::SubCommandGroup) }

    /// The lowercase name of this type
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::SubCommand => "sub_command",
            Self::SubCommandGroup => "sub_command_group",
            Self::String => "string",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::User => "user",
            Self::Channel => "channel",
            Self::Role => "role",
        }
    }
}

impl TryFrom<u8> for SlashOptionType {
    type Error = InvalidOptionType;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            1 => Self::SubCommand,
            2 => Self::SubCommandGroup,
            3 => Self::String,
            4 => Self::Integer,
            5 => Self::Boolean,
            6 => Self::User,
            7 => Self::Channel,
            8 => Self::Role,
            v => return Err(InvalidOptionType(v)),
        })
    }
}

impl From<SlashOptionType> for u8 {
    fn from(value: SlashOptionType) -> Self { value as u8 }
}

impl fmt::Display for SlashOptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

/// The value of a predefined option choice
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChoiceValue {
    /// An integer value
    Int(i64),
    /// A string value
    String(String),
}

impl From<i64> for ChoiceValue {
    fn from(value: i64) -> Self { Self::Int(value) }
}

impl From<String> for ChoiceValue {
    fn from(value: String) -> Self { Self::String(value) }
}

impl From<&str> for ChoiceValue {
    fn from(value: &str) -> Self { Self::String(value.into()) }
}

impl fmt::Display for ChoiceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

/// A single predefined choice for an option
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlashOptionChoice {
    /// The name shown to the user
    pub name: String,
    /// The value submitted when this choice is picked
    pub value: ChoiceValue,
}

impl SlashOptionChoice {
    /// Construct a new choice
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<ChoiceValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A parameter or subcommand of a registered slash command
///
/// Options are replaced wholesale when a command is edited, so the builder
/// methods below are only meant for constructing a fresh description.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlashOption {
    #[serde(rename = "type")]
    kind: SlashOptionType,
    name: String,
    description: String,
    #[serde(default)]
    required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    choices: Vec<SlashOptionChoice>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    options: Vec<SlashOption>,
}

impl SlashOption {
    /// Construct a new optional parameter with no choices
    #[must_use]
    pub fn new(kind: SlashOptionType, name: impl Into<String>, desc: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            description: desc.into(),
            required: false,
            choices: vec![],
            options: vec![],
        }
    }

    /// Construct a new option from a raw type code
    ///
    /// # Errors
    /// This function returns an error if `kind` is not a valid option type.
    pub fn try_new(
        kind: u8,
        name: impl Into<String>,
        desc: impl Into<String>,
    ) -> Result<Self, InvalidOptionType> {
        Ok(Self::new(kind.try_into()?, name, desc))
    }

    /// Mark whether a value must be supplied for this option
    #[inline]
    #[must_use]
    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Append a predefined choice
    #[inline]
    #[must_use]
    pub fn choice(mut self, name: impl Into<String>, value: impl Into<ChoiceValue>) -> Self {
        self.choices.push(SlashOptionChoice::new(name, value));
        self
    }

    /// Append several predefined choices
    #[inline]
    #[must_use]
    pub fn choices(mut self, choices: impl IntoIterator<Item = SlashOptionChoice>) -> Self {
        self.choices.extend(choices);
        self
    }

    /// Append a nested option, for subcommands and groups
    #[inline]
    #[must_use]
    pub fn option(mut self, option: SlashOption) -> Self {
        self.options.push(option);
        self
    }

    /// The type of this option
    #[inline]
    #[must_use]
    pub fn kind(&self) -> SlashOptionType { self.kind }

    /// The name of this option
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str { &self.name }

    /// The description of this option
    #[inline]
    #[must_use]
    pub fn description(&self) -> &str { &self.description }

    /// Whether a value must be supplied for this option
    #[inline]
    #[must_use]
    pub fn is_required(&self) -> bool { self.required }

    /// The predefined choices for this option
    #[inline]
    #[must_use]
    pub fn get_choices(&self) -> &[SlashOptionChoice] { &self.choices }

    /// The nested options of this subcommand or group
    #[inline]
    #[must_use]
    pub fn get_options(&self) -> &[SlashOption] { &self.options }
}

impl fmt::Display for SlashOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.name) }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_type_codes() {
        assert_eq!(SlashOptionType::try_from(7), Ok(SlashOptionType::Channel));
        assert_eq!(SlashOptionType::try_from(0), Err(InvalidOptionType(0)));
        assert_eq!(SlashOptionType::try_from(9), Err(InvalidOptionType(9)));
        assert!(SlashOption::try_new(42, "x", "y").is_err());
    }

    #[test]
    fn test_serialize() {
        let opt = SlashOption::new(SlashOptionType::String, "color", "A color")
            .required(true)
            .choice("Red", "red")
            .choice("Blue", 2_i64);

        assert_eq!(
            serde_json::to_value(&opt).unwrap(),
            json!({
                "type": 3,
                "name": "color",
                "description": "A color",
                "required": true,
                "choices": [
                    { "name": "Red", "value": "red" },
                    { "name": "Blue", "value": 2 },
                ],
            })
        );

        let bare = SlashOption::new(SlashOptionType::Boolean, "b", "c");
        assert_eq!(
            serde_json::to_value(&bare).unwrap(),
            json!({ "type": 5, "name": "b", "description": "c", "required": false })
        );
    }

    #[test]
    fn test_reject_bad_type() {
        let res = serde_json::from_value::<SlashOption>(
            json!({ "type": 11, "name": "file", "description": "d" }),
        );
        assert!(res.is_err());
    }

    #[test]
    fn test_nested_defaults() {
        let opt: SlashOption = serde_json::from_value(json!({
            "type": 1,
            "name": "add",
            "description": "Add a thing",
            "options": [{ "type": 6, "name": "who", "description": "Someone" }],
        }))
        .unwrap();

        assert!(opt.kind().is_subcommand());
        assert!(!opt.is_required());
        assert_eq!(opt.get_options().len(), 1);
        assert_eq!(opt.get_options()[0].kind(), SlashOptionType::User);
    }
}

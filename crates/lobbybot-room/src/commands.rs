//! Chat command parsing.
//!
//! Commands are `!`-prefixed words followed by whitespace-separated
//! arguments. Names are case-insensitive. Privileged commands are only
//! recognised for the room owner; for anyone else they are unknown.

use crate::config::DifficultyRange;

/// Commands everyone may use, in `!help` order.
pub const USER_COMMANDS: &[&str] = &[
    "help",
    "diffs",
    "max-length",
    "source",
    "discord",
    "mods",
    "violation",
    "roll",
    "skip",
];

pub const SETDIFF_USAGE: &str = "Invalid arguments. Usage: !setdiff <min> <max>";
pub const SET_MAX_LENGTH_USAGE: &str = "Invalid arguments. Usage: !set-max-length <M:SS>";
pub const ROLL_USAGE: &str = "Invalid arguments. Usage: !roll [<min>] <max>";

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    Help,
    Diffs,
    MaxLength,
    Source,
    Discord,
    Mods,
    Violation,
    /// Inclusive bounds. `!roll` alone is 1–100.
    Roll { min: u64, max: u64 },
    Skip,

    // Owner only.
    Start,
    Host,
    /// Seconds.
    SetMaxLength(u32),
    SetDiff(DifficultyRange),

    /// A known command with bad arguments; carries the usage notice.
    Usage(&'static str),
    Unknown(String),
}

impl ChatCommand {
    /// Parses a chat message. Returns `None` if it isn't a command at all.
    ///
    /// ```
    /// use lobbybot_room::ChatCommand;
    ///
    /// assert_eq!(ChatCommand::parse("!SKIP", false), Some(ChatCommand::Skip));
    /// assert_eq!(ChatCommand::parse("hello", false), None);
    /// ```
    pub fn parse(content: &str, privileged: bool) -> Option<Self> {
        let rest = content.trim().strip_prefix('!')?;
        let mut words = rest.split_whitespace();
        let name = words.next()?.to_lowercase();
        let args: Vec<&str> = words.collect();

        let command = match name.as_str() {
            "help" => Self::Help,
            "diffs" => Self::Diffs,
            "max-length" => Self::MaxLength,
            "source" => Self::Source,
            "discord" => Self::Discord,
            "mods" => Self::Mods,
            "violation" => Self::Violation,
            "roll" => parse_roll(&args),
            "skip" => Self::Skip,
            "start" if privileged => Self::Start,
            "host" if privileged => Self::Host,
            "set-max-length" if privileged => parse_set_max_length(&args),
            "setdiff" if privileged => parse_setdiff(&args),
            _ => Self::Unknown(name),
        };
        Some(command)
    }
}

fn parse_roll(args: &[&str]) -> ChatCommand {
    let bounds = match args {
        [] => Some((1, 100)),
        [max] => max.parse().ok().map(|max| (1, max)),
        [min, max] => min.parse().ok().zip(max.parse().ok()),
        _ => None,
    };
    match bounds {
        Some((min, max)) if min <= max => ChatCommand::Roll { min, max },
        _ => ChatCommand::Usage(ROLL_USAGE),
    }
}

fn parse_set_max_length(args: &[&str]) -> ChatCommand {
    match args {
        [value] => parse_length(value)
            .map(ChatCommand::SetMaxLength)
            .unwrap_or(ChatCommand::Usage(SET_MAX_LENGTH_USAGE)),
        _ => ChatCommand::Usage(SET_MAX_LENGTH_USAGE),
    }
}

fn parse_setdiff(args: &[&str]) -> ChatCommand {
    let [min, max] = args else {
        return ChatCommand::Usage(SETDIFF_USAGE);
    };
    match (min.parse::<f64>(), max.parse::<f64>()) {
        (Ok(min), Ok(max)) if min.is_finite() && max.is_finite() && min <= max => {
            ChatCommand::SetDiff(DifficultyRange::new(min, max))
        }
        _ => ChatCommand::Usage(SETDIFF_USAGE),
    }
}

/// Parses `M:SS` into seconds. Seconds must be two digits below 60.
fn parse_length(value: &str) -> Option<u32> {
    let (minutes, seconds) = value.split_once(':')?;
    if seconds.len() != 2 {
        return None;
    }
    let minutes: u32 = minutes.parse().ok()?;
    let seconds: u32 = seconds.parse().ok()?;
    if seconds >= 60 {
        return None;
    }
    minutes.checked_mul(60)?.checked_add(seconds)
}

use std::collections::HashMap;

use geocoin_engine::{Cell, CellKey, Direction, LatLng, MAX_LATITUDE, MAX_LONGITUDE};
use thiserror::Error;
use tracing::warn;

use super::gameplay::Coin;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum GameCommand {
    Help,
    Step(Direction),
    Goto(LatLng),
    Geolocate,
    Look,
    Inventory,
    Collect { cache: Cell, coin: Coin },
    Deposit { cache: Cell },
    Home { coin: Coin },
    Status,
    Reset,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("error: {reason}. usage: {usage}")]
pub(crate) struct CommandParseError {
    reason: String,
    usage: String,
}

impl CommandParseError {
    fn new(reason: impl Into<String>, usage: &str) -> Self {
        Self {
            reason: reason.into(),
            usage: usage.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub(crate) enum CommandError {
    #[error("error: {0}. usage: help")]
    Tokenize(String),
    #[error("error: unknown command '{name}'. try: help")]
    Unknown { name: String },
    #[error(transparent)]
    Usage(#[from] CommandParseError),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub(crate) enum RegisterError {
    #[error("command name cannot be empty")]
    EmptyName,
    #[error("duplicate command registration: {name}")]
    Duplicate { name: String },
}

type ParseFn = fn(&[String]) -> Result<GameCommand, CommandParseError>;

struct CommandSpec {
    name: &'static str,
    aliases: &'static [&'static str],
    help: &'static str,
    arg_schema: &'static str,
    parse: ParseFn,
}

const BUILTINS: &[CommandSpec] = &[
    CommandSpec {
        name: "help",
        aliases: &[],
        help: "List commands",
        arg_schema: "",
        parse: parse_help_command,
    },
    CommandSpec {
        name: "north",
        aliases: &["n"],
        help: "Move one cell north",
        arg_schema: "",
        parse: parse_north_command,
    },
    CommandSpec {
        name: "south",
        aliases: &["s"],
        help: "Move one cell south",
        arg_schema: "",
        parse: parse_south_command,
    },
    CommandSpec {
        name: "east",
        aliases: &["e"],
        help: "Move one cell east",
        arg_schema: "",
        parse: parse_east_command,
    },
    CommandSpec {
        name: "west",
        aliases: &["w"],
        help: "Move one cell west",
        arg_schema: "",
        parse: parse_west_command,
    },
    CommandSpec {
        name: "goto",
        aliases: &[],
        help: "Jump to a position",
        arg_schema: "<lat:f64> <lng:f64>",
        parse: parse_goto_command,
    },
    CommandSpec {
        name: "geolocate",
        aliases: &[],
        help: "Move to the device position",
        arg_schema: "",
        parse: parse_geolocate_command,
    },
    CommandSpec {
        name: "look",
        aliases: &[],
        help: "List caches in view",
        arg_schema: "",
        parse: parse_look_command,
    },
    CommandSpec {
        name: "inventory",
        aliases: &["inv"],
        help: "List carried coins",
        arg_schema: "",
        parse: parse_inventory_command,
    },
    CommandSpec {
        name: "collect",
        aliases: &[],
        help: "Take a coin from a cache",
        arg_schema: "<cache:i,j> [home:i,j] <serial:u32>",
        parse: parse_collect_command,
    },
    CommandSpec {
        name: "deposit",
        aliases: &[],
        help: "Put every carried coin into a cache",
        arg_schema: "<cache:i,j>",
        parse: parse_deposit_command,
    },
    CommandSpec {
        name: "home",
        aliases: &[],
        help: "Show the home cache of a carried coin",
        arg_schema: "<home:i,j> <serial:u32>",
        parse: parse_home_command,
    },
    CommandSpec {
        name: "status",
        aliases: &[],
        help: "Show player and world state",
        arg_schema: "",
        parse: parse_status_command,
    },
    CommandSpec {
        name: "reset",
        aliases: &[],
        help: "Erase all progress (asks first)",
        arg_schema: "",
        parse: parse_reset_command,
    },
    CommandSpec {
        name: "quit",
        aliases: &["exit"],
        help: "Quit",
        arg_schema: "",
        parse: parse_quit_command,
    },
];

pub(crate) struct CommandRegistry {
    specs: Vec<&'static CommandSpec>,
    lookup_by_lower_name: HashMap<String, usize>,
}

impl CommandRegistry {
    pub(crate) fn with_game_builtins() -> Self {
        let mut registry = Self {
            specs: Vec::new(),
            lookup_by_lower_name: HashMap::new(),
        };
        for spec in BUILTINS {
            if let Err(error) = registry.register(spec) {
                warn!(command = spec.name, error = %error, "command_registration_skipped");
            }
        }
        registry
    }

    fn register(&mut self, spec: &'static CommandSpec) -> Result<(), RegisterError> {
        if spec.name.trim().is_empty() {
            return Err(RegisterError::EmptyName);
        }
        let names = std::iter::once(spec.name)
            .chain(spec.aliases.iter().copied())
            .map(str::to_ascii_lowercase)
            .collect::<Vec<_>>();
        if let Some(taken) = names
            .iter()
            .find(|name| self.lookup_by_lower_name.contains_key(*name))
        {
            return Err(RegisterError::Duplicate {
                name: taken.clone(),
            });
        }

        self.specs.push(spec);
        for name in names {
            self.lookup_by_lower_name.insert(name, self.specs.len() - 1);
        }
        Ok(())
    }

    fn lookup(&self, input_name: &str) -> Option<&'static CommandSpec> {
        let index = self
            .lookup_by_lower_name
            .get(&input_name.to_ascii_lowercase())?;
        self.specs.get(*index).copied()
    }

    /// Registration order.
    pub(crate) fn help_lines(&self) -> Vec<String> {
        self.specs
            .iter()
            .map(|spec| {
                let mut line = spec.name.to_string();
                if !spec.aliases.is_empty() {
                    line.push_str(&format!(" ({})", spec.aliases.join(", ")));
                }
                if !spec.arg_schema.is_empty() {
                    line.push(' ');
                    line.push_str(spec.arg_schema);
                }
                format!("{line} - {}", spec.help)
            })
            .collect()
    }

    /// Blank lines parse to `Ok(None)`.
    pub(crate) fn parse_line(&self, raw_line: &str) -> Result<Option<GameCommand>, CommandError> {
        let tokens = tokenize_line(raw_line.trim()).map_err(CommandError::Tokenize)?;
        let Some((name, args)) = tokens.split_first() else {
            return Ok(None);
        };
        let spec = self.lookup(name).ok_or_else(|| CommandError::Unknown {
            name: name.clone(),
        })?;
        Ok(Some((spec.parse)(args)?))
    }
}

fn tokenize_line(line: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_token = false;

    for ch in line.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                has_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_token {
                    tokens.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            _ => {
                current.push(ch);
                has_token = true;
            }
        }
    }

    if in_quotes {
        return Err("unterminated quoted string".to_string());
    }
    if has_token {
        tokens.push(current);
    }
    Ok(tokens)
}

fn parse_help_command(args: &[String]) -> Result<GameCommand, CommandParseError> {
    require_no_args(args, "help")?;
    Ok(GameCommand::Help)
}

fn parse_step(args: &[String], direction: Direction) -> Result<GameCommand, CommandParseError> {
    require_no_args(args, direction.as_token())?;
    Ok(GameCommand::Step(direction))
}

fn parse_north_command(args: &[String]) -> Result<GameCommand, CommandParseError> {
    parse_step(args, Direction::North)
}

fn parse_south_command(args: &[String]) -> Result<GameCommand, CommandParseError> {
    parse_step(args, Direction::South)
}

fn parse_east_command(args: &[String]) -> Result<GameCommand, CommandParseError> {
    parse_step(args, Direction::East)
}

fn parse_west_command(args: &[String]) -> Result<GameCommand, CommandParseError> {
    parse_step(args, Direction::West)
}

fn parse_goto_command(args: &[String]) -> Result<GameCommand, CommandParseError> {
    const USAGE: &str = "goto <lat> <lng>";
    let [lat, lng] = args else {
        return Err(CommandParseError::new(
            "expected exactly two arguments <lat> <lng>",
            USAGE,
        ));
    };
    let lat = parse_degrees(lat, "latitude", MAX_LATITUDE, USAGE)?;
    let lng = parse_degrees(lng, "longitude", MAX_LONGITUDE, USAGE)?;
    Ok(GameCommand::Goto(LatLng::new(lat, lng)))
}

fn parse_geolocate_command(args: &[String]) -> Result<GameCommand, CommandParseError> {
    require_no_args(args, "geolocate")?;
    Ok(GameCommand::Geolocate)
}

fn parse_look_command(args: &[String]) -> Result<GameCommand, CommandParseError> {
    require_no_args(args, "look")?;
    Ok(GameCommand::Look)
}

fn parse_inventory_command(args: &[String]) -> Result<GameCommand, CommandParseError> {
    require_no_args(args, "inventory")?;
    Ok(GameCommand::Inventory)
}

fn parse_collect_command(args: &[String]) -> Result<GameCommand, CommandParseError> {
    const USAGE: &str = "collect <i,j> [home_i,home_j] <serial>";
    let (cache, home, serial) = match args {
        [cache, serial] => (cache, cache, serial),
        [cache, home, serial] => (cache, home, serial),
        _ => {
            return Err(CommandParseError::new(
                "expected <i,j> <serial> or <i,j> <home_i,home_j> <serial>",
                USAGE,
            ));
        }
    };
    let cache = parse_cell(cache, USAGE)?;
    let coin = Coin {
        cell: parse_cell(home, USAGE)?,
        serial: parse_serial(serial, USAGE)?,
    };
    Ok(GameCommand::Collect { cache, coin })
}

fn parse_deposit_command(args: &[String]) -> Result<GameCommand, CommandParseError> {
    const USAGE: &str = "deposit <i,j>";
    let [cache] = args else {
        return Err(CommandParseError::new(
            "expected exactly one argument <i,j>",
            USAGE,
        ));
    };
    Ok(GameCommand::Deposit {
        cache: parse_cell(cache, USAGE)?,
    })
}

fn parse_home_command(args: &[String]) -> Result<GameCommand, CommandParseError> {
    const USAGE: &str = "home <i,j> <serial>";
    let [home, serial] = args else {
        return Err(CommandParseError::new(
            "expected exactly two arguments <i,j> <serial>",
            USAGE,
        ));
    };
    Ok(GameCommand::Home {
        coin: Coin {
            cell: parse_cell(home, USAGE)?,
            serial: parse_serial(serial, USAGE)?,
        },
    })
}

fn parse_status_command(args: &[String]) -> Result<GameCommand, CommandParseError> {
    require_no_args(args, "status")?;
    Ok(GameCommand::Status)
}

fn parse_reset_command(args: &[String]) -> Result<GameCommand, CommandParseError> {
    require_no_args(args, "reset")?;
    Ok(GameCommand::Reset)
}

fn parse_quit_command(args: &[String]) -> Result<GameCommand, CommandParseError> {
    require_no_args(args, "quit")?;
    Ok(GameCommand::Quit)
}

fn parse_cell(raw: &str, usage: &str) -> Result<Cell, CommandParseError> {
    CellKey::parse(raw)
        .map(|key| key.cell())
        .map_err(|error| CommandParseError::new(format!("invalid cell '{raw}' ({error})"), usage))
}

fn parse_serial(raw: &str, usage: &str) -> Result<u32, CommandParseError> {
    raw.parse::<u32>().map_err(|_| {
        CommandParseError::new(format!("invalid serial '{raw}' (expected u32)"), usage)
    })
}

fn parse_degrees(
    raw: &str,
    label: &str,
    limit: f64,
    usage: &str,
) -> Result<f64, CommandParseError> {
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() && value.abs() <= limit => Ok(value),
        _ => Err(CommandParseError::new(
            format!("invalid {label} '{raw}' (expected f64 within ±{limit})"),
            usage,
        )),
    }
}

fn require_no_args(args: &[String], usage: &str) -> Result<(), CommandParseError> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(CommandParseError::new("unexpected extra arguments", usage))
    }
}

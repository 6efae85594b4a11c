use std::fmt;
use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::sync::mpsc::{self, Sender};
use std::thread;

use geocoin_engine::{Cell, LatLng};
use tracing::{debug, error, info, warn};

use super::bootstrap::build_app;
use super::commands::{CommandRegistry, GameCommand};
use super::gameplay::{Coin, Game};
use super::geolocation::GeolocationSource;
use super::text_observer::{coin_list, TextObserver};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum AppEvent {
    Line(String),
    Location(LatLng),
    InputClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

pub(crate) fn run() -> ExitCode {
    let app = match build_app() {
        Ok(app) => app,
        Err(err) => {
            error!(error = %err, "startup_failed");
            return ExitCode::FAILURE;
        }
    };

    let (events, inbox) = mpsc::channel();
    if let Err(err) = spawn_stdin_reader(events.clone()) {
        error!(error = %err, "startup_failed");
        return ExitCode::FAILURE;
    }

    let game = Game::new(app.config, app.store)
        .with_observer(Box::new(TextObserver::new(io::stdout())));
    let mut session = Session::new(game, app.geolocation, events);
    let mut out = io::stdout();
    session.start(&mut out);

    for event in inbox {
        if session.handle(event, &mut out) == Flow::Quit {
            break;
        }
    }

    info!("shutdown");
    ExitCode::SUCCESS
}

fn spawn_stdin_reader(events: Sender<AppEvent>) -> io::Result<()> {
    thread::Builder::new()
        .name("stdin".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if events.send(AppEvent::Line(line)).is_err() {
                            return;
                        }
                    }
                    Err(error) => {
                        warn!(error = %error, "stdin_read_failed");
                        break;
                    }
                }
            }
            if events.send(AppEvent::InputClosed).is_err() {
                debug!("event_loop_gone");
            }
        })
        .map(|_| ())
}

/// Single-threaded dispatcher: every stdin line and geolocation answer is
/// applied to the game in arrival order.
struct Session {
    game: Game,
    commands: CommandRegistry,
    geolocation: Box<dyn GeolocationSource>,
    events: Sender<AppEvent>,
    awaiting_reset_confirmation: bool,
}

impl Session {
    fn new(game: Game, geolocation: Box<dyn GeolocationSource>, events: Sender<AppEvent>) -> Self {
        Self {
            game,
            commands: CommandRegistry::with_game_builtins(),
            geolocation,
            events,
            awaiting_reset_confirmation: false,
        }
    }

    fn start(&mut self, out: &mut dyn Write) {
        self.game.init();
        say(out, format_args!("type 'help' for commands"));
    }

    fn handle(&mut self, event: AppEvent, out: &mut dyn Write) -> Flow {
        match event {
            AppEvent::Line(line) => {
                if std::mem::take(&mut self.awaiting_reset_confirmation) {
                    self.confirm_reset(&line, out);
                    return Flow::Continue;
                }
                match self.commands.parse_line(&line) {
                    Ok(Some(command)) => self.execute(command, out),
                    Ok(None) => Flow::Continue,
                    Err(error) => {
                        say(out, format_args!("{error}"));
                        Flow::Continue
                    }
                }
            }
            AppEvent::Location(position) => {
                info!(position = %position, "geolocation_received");
                self.game.move_player(position);
                Flow::Continue
            }
            AppEvent::InputClosed => {
                info!("input_closed");
                Flow::Quit
            }
        }
    }

    fn execute(&mut self, command: GameCommand, out: &mut dyn Write) -> Flow {
        debug!(command = ?command, "command_received");
        match command {
            GameCommand::Help => {
                for line in self.commands.help_lines() {
                    say(out, format_args!("{line}"));
                }
            }
            GameCommand::Step(direction) => self.game.step(direction),
            GameCommand::Goto(position) => self.game.move_player(position),
            GameCommand::Geolocate => {
                say(out, format_args!("requesting position..."));
                self.geolocation.request(self.events.clone());
            }
            GameCommand::Look => self.look(out),
            GameCommand::Inventory => {
                let inventory = self.game.inventory();
                say(
                    out,
                    format_args!("inventory ({}): {}", inventory.len(), coin_list(inventory)),
                );
            }
            GameCommand::Collect { cache, coin } => self.collect(cache, coin, out),
            GameCommand::Deposit { cache } => {
                if !self.game.has_marker(cache) {
                    say(out, format_args!("no cache in view at {cache}"));
                } else if self.game.inventory().is_empty() {
                    say(out, format_args!("nothing to deposit"));
                } else {
                    let moved = self.game.deposit(cache);
                    say(out, format_args!("deposited {moved} coins into {cache}"));
                }
            }
            GameCommand::Home { coin } => {
                if self.game.inventory().contains(&coin) {
                    let cell = self.game.focus_coin_home(&coin);
                    let center = self.game.grid().center_of(cell);
                    say(
                        out,
                        format_args!("coin {coin} comes from cache {cell} at {center}"),
                    );
                } else {
                    say(out, format_args!("not carrying coin {coin}"));
                }
            }
            GameCommand::Status => self.status(out),
            GameCommand::Reset => {
                self.awaiting_reset_confirmation = true;
                say(out, format_args!("erase all progress? type 'yes' to confirm"));
            }
            GameCommand::Quit => return Flow::Quit,
        }
        Flow::Continue
    }

    fn look(&self, out: &mut dyn Write) {
        let markers = self.game.markers();
        if markers.is_empty() {
            say(out, format_args!("no caches in view"));
            return;
        }
        say(out, format_args!("caches in view ({}):", markers.len()));
        for marker in markers {
            let coins = self
                .game
                .cache(marker.cell)
                .map(|cache| coin_list(&cache.coins))
                .unwrap_or_else(|| "(unreadable)".to_string());
            say(out, format_args!("  {}: {coins}", marker.cell));
        }
    }

    fn collect(&mut self, cache: Cell, coin: Coin, out: &mut dyn Write) {
        if !self.game.has_marker(cache) {
            say(out, format_args!("no cache in view at {cache}"));
            return;
        }
        let holds_coin = self
            .game
            .cache(cache)
            .is_some_and(|content| content.contains(&coin));
        if holds_coin && self.game.collect(&coin, cache) {
            say(out, format_args!("collected {coin}"));
        } else {
            say(out, format_args!("cache {cache} has no coin {coin}"));
        }
    }

    fn status(&self, out: &mut dyn Write) {
        let config = self.game.config();
        say(
            out,
            format_args!(
                "at {} in cell {} after {} moves",
                self.game.location(),
                self.game.current_cell(),
                self.game.history().len().saturating_sub(1)
            ),
        );
        say(
            out,
            format_args!(
                "carrying {} coins; {} caches in view, {} known",
                self.game.inventory().len(),
                self.game.markers().len(),
                self.game.registry_len()
            ),
        );
        say(
            out,
            format_args!("{} coins in the world", self.game.coin_total()),
        );
        say(
            out,
            format_args!(
                "view radius {} cells, spawn chance {}",
                config.neighborhood_size, config.cache_spawn_probability
            ),
        );
    }

    fn confirm_reset(&mut self, answer: &str, out: &mut dyn Write) {
        let accepted = self
            .game
            .reset(|| answer.trim().eq_ignore_ascii_case("yes"));
        if accepted {
            say(out, format_args!("move to discover caches again"));
        } else {
            say(out, format_args!("reset cancelled"));
        }
    }
}

fn say(out: &mut dyn Write, args: fmt::Arguments<'_>) {
    if let Err(error) = writeln!(out, "{args}") {
        warn!(error = %error, "transcript_write_failed");
    }
}

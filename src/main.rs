mod clock;
mod pump;
mod stopwatch;
mod storage;
mod ui;

use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::mpsc::{self, Sender};
use std::thread;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::{cursor, execute, terminal};
use stopwatch_core::{format_time, StopwatchCore};

use crate::clock::{Clock, SystemClock};
use crate::pump::Pump;
use crate::stopwatch::Stopwatch;
use crate::storage::{FileStorage, SessionStorage};

#[derive(Debug, Parser)]
#[command(author, version, about, long_about)]
struct Arguments {
    #[arg(short = 'v', long = None, env = "STOPWATCH_VERBOSITY", action = clap::ArgAction::Count, global = true)]
    verbosity: u8,

    /// Where the session is saved between runs
    #[arg(short, long, env = "STOPWATCH_STATE_FILE", global = true)]
    state_file: Option<PathBuf>,

    /// Keep the session in memory only
    #[arg(long, env = "STOPWATCH_NO_PERSIST", global = true)]
    no_persist: bool,

    /// Redraw interval while running
    #[arg(short, long, env = "STOPWATCH_REFRESH_MS", default_value_t = 33,
          value_parser = clap::value_parser!(u64).range(1..))]
    refresh_ms: u64,

    /// Log here instead of stderr while the stopwatch owns the terminal
    #[arg(short, long, env = "STOPWATCH_LOG_FILE", global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the interactive stopwatch (default)
    Run,
    /// Print the saved session and exit
    Status,
    /// Clear the saved session
    Reset,
}

#[derive(Debug)]
enum AppOp {
    Redraw,
    Key(KeyEvent),
    Resize(u16, u16),
    Focus(bool),
    Pump,
    Quit,
}

fn main() {
    let arguments = Arguments::parse();
    if let Err(e) = init_logging(&arguments) {
        eprintln!("stopwatch: failed to configure logging: {:#}", e);
    }
    log::debug!("{:?}", arguments);

    let result = match arguments.command {
        None | Some(Command::Run) => run(&arguments),
        Some(Command::Status) => print_status(&arguments),
        Some(Command::Reset) => clear_saved(&arguments),
    };
    if let Err(e) = result {
        log::error!("{:#}", e);
        eprintln!("stopwatch: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(arguments: &Arguments) -> anyhow::Result<()> {
    let level = match arguments.verbosity {
        0 => log::LevelFilter::Error,
        1 => log::LevelFilter::Warn,
        2 => log::LevelFilter::Info,
        3 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level).parse_default_env();
    if let Some(path) = &arguments.log_file {
        let file = File::create(path).with_context(|| format!("can't create {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.try_init()?;
    Ok(())
}

fn open_storage(arguments: &Arguments) -> Option<Box<dyn SessionStorage>> {
    if arguments.no_persist {
        return None;
    }
    let storage = match &arguments.state_file {
        Some(path) => FileStorage::new(path),
        None => match FileStorage::in_data_dir() {
            Ok(storage) => storage,
            Err(e) => {
                log::warn!("Session will not be saved: {}", e);
                return None;
            }
        },
    };
    log::info!("Session slot is {}", storage.path().display());
    Some(Box::new(storage))
}

fn print_status(arguments: &Arguments) -> anyhow::Result<()> {
    let core = open_storage(arguments)
        .as_deref()
        .and_then(|storage| storage::load_session(storage))
        .map(StopwatchCore::from_record)
        .unwrap_or_default();
    let snapshot = core.snapshot(SystemClock.now_ms());

    let mut out = io::stdout().lock();
    writeln!(out, "{}  {}", format_time(snapshot.elapsed_ms), ui::status_label(snapshot.status))?;
    for row in ui::lap_rows(&snapshot) {
        writeln!(out, "{:<8} {:>11}  {:>11}", row.label, row.split, row.total)?;
    }
    Ok(())
}

fn clear_saved(arguments: &Arguments) -> anyhow::Result<()> {
    if let Some(storage) = open_storage(arguments) {
        storage.remove()?;
    }
    Ok(())
}

/// Raw mode and the alternate screen, restored on every exit path.
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> anyhow::Result<Self> {
        terminal::enable_raw_mode().context("can't enable raw mode")?;
        let guard = TerminalGuard;
        execute!(
            io::stdout(),
            terminal::EnterAlternateScreen,
            cursor::Hide,
            event::EnableFocusChange
        )?;
        Ok(guard)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        execute!(
            io::stdout(),
            event::DisableFocusChange,
            cursor::Show,
            terminal::LeaveAlternateScreen
        )
        .ok();
        if let Err(e) = terminal::disable_raw_mode() {
            log::error!("can't restore terminal: {}", e);
        }
    }
}

struct StopwatchApp {
    stopwatch: Stopwatch,
    screensize: (u16, u16),
    allow_redraw: bool,
}

impl StopwatchApp {
    fn redraw(&self) {
        if !self.allow_redraw {
            return;
        }
        let snapshot = self.stopwatch.snapshot();
        if let Err(e) = ui::draw_stopwatch(&mut io::stdout().lock(), &snapshot, self.screensize) {
            log::error!("redraw failed: {}", e);
        }
    }

    /// Returns false when the app should quit.
    fn handle_key(&mut self, key: KeyEvent) -> bool {
        if key.kind != KeyEventKind::Press {
            return true;
        }
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return false,
            KeyCode::Char('q') | KeyCode::Esc => return false,
            KeyCode::Char(' ') | KeyCode::Char('s') => self.stopwatch.toggle(),
            KeyCode::Char('l') => {
                self.stopwatch.lap();
            }
            KeyCode::Char('r') => self.stopwatch.reset(),
            KeyCode::Enter => self.stopwatch.lap_or_reset(),
            _ => return true,
        }
        self.redraw();
        true
    }

    fn handle_focus(&mut self, focused: bool) {
        self.allow_redraw = focused;
        self.stopwatch.set_visible(focused);
        if focused {
            self.redraw();
        }
    }
}

fn run(arguments: &Arguments) -> anyhow::Result<()> {
    let storage = open_storage(arguments);
    let (sender, receiver) = mpsc::channel();

    let pump_sender = sender.clone();
    let pump = Pump::spawn(Duration::from_millis(arguments.refresh_ms), move || {
        pump_sender.send(AppOp::Pump).is_ok()
    })
    .context("can't start refresh pump")?;

    // Declared before the app so the terminal is restored after the pump is joined.
    let _terminal = TerminalGuard::enter()?;
    let mut app = StopwatchApp {
        stopwatch: Stopwatch::open(Box::new(SystemClock), storage, Box::new(pump)),
        screensize: terminal::size().unwrap_or((80, 24)),
        allow_redraw: true,
    };

    let input_sender = sender.clone();
    thread::Builder::new()
        .name("input".into())
        .spawn(move || input_thread(input_sender))
        .context("can't start input thread")?;

    sender.send(AppOp::Redraw).ok();
    while let Ok(op) = receiver.recv() {
        match op {
            AppOp::Redraw | AppOp::Pump => app.redraw(),
            AppOp::Key(key) => {
                if !app.handle_key(key) {
                    break;
                }
            }
            AppOp::Resize(width, height) => {
                app.screensize = (width, height);
                app.redraw();
            }
            AppOp::Focus(focused) => app.handle_focus(focused),
            AppOp::Quit => break,
        }
    }
    log::info!("exiting with the stopwatch {}", ui::status_label(app.stopwatch.status()));
    Ok(())
}

fn input_thread(sender: Sender<AppOp>) {
    loop {
        let op = match event::read() {
            Ok(Event::Key(key)) => AppOp::Key(key),
            Ok(Event::Resize(width, height)) => AppOp::Resize(width, height),
            Ok(Event::FocusGained) => AppOp::Focus(true),
            Ok(Event::FocusLost) => AppOp::Focus(false),
            Ok(_) => continue,
            Err(e) => {
                log::error!("terminal input failed: {}", e);
                AppOp::Quit
            }
        };
        let quit = matches!(op, AppOp::Quit);
        if sender.send(op).is_err() || quit {
            break;
        }
    }
}

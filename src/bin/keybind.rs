// Keybind CLI
// Loads a shortcut file and replays scripted key sessions against it

use std::fs;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Parser;

use keybind_core::config::parse_combination;
use keybind_core::{
    Config, ContextRestore, ContextValue, EventKind, InProcessSource, KeyPressEvent, Modifiers,
    ShortcutManager, Target,
};

/// Keyboard shortcut matcher
#[derive(Parser, Debug)]
#[command(name = "keybind")]
#[command(version)]
#[command(about = "Match keyboard shortcuts, combinations and sequences", long_about = None)]
struct Args {
    /// TOML shortcut file (defaults to <config dir>/keybind/shortcuts.toml)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Session script to replay (reads stdin when omitted)
    #[arg(short, long, value_name = "SCRIPT")]
    script: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Validate config and exit
    #[arg(long)]
    check_config: bool,

    /// List configured shortcuts and exit
    #[arg(long)]
    list: bool,
}

/// One line of a session script
#[derive(Debug, Clone, PartialEq)]
enum Command {
    /// `press <combo> [on <target>] [keyup]`
    Press {
        key: String,
        modifiers: Modifiers,
        target: Option<String>,
        kind: EventKind,
    },
    /// `wait <ms>`: advance the session clock
    Wait(Duration),
    /// `enter <ctx>`
    Enter(String),
    /// `leave`
    Leave,
    /// `override <ctx|none>`
    Override(ContextValue),
    /// `restore`: undo the most recent override
    Restore,
}

fn parse_command(line: &str) -> Result<Option<Command>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let mut words = line.split_whitespace();
    let verb = words.next().unwrap_or_default();
    let rest: Vec<&str> = words.collect();

    let command = match (verb, rest.as_slice()) {
        ("press", [combo, tail @ ..]) => parse_press(combo, tail)?,
        ("wait", [ms]) => {
            let ms: u64 = ms.parse().with_context(|| format!("invalid wait '{}'", ms))?;
            Command::Wait(Duration::from_millis(ms))
        }
        ("enter", [context]) => Command::Enter(context.to_string()),
        ("leave", []) => Command::Leave,
        ("override", ["none"]) => Command::Override(ContextValue::NONE),
        ("override", [context]) => Command::Override(ContextValue::named(context)),
        ("restore", []) => Command::Restore,
        _ => bail!("unrecognized command '{}'", line),
    };
    Ok(Some(command))
}

fn parse_press(combo: &str, tail: &[&str]) -> Result<Command> {
    let trigger = parse_combination(combo).with_context(|| format!("invalid key '{}'", combo))?;
    let modifiers = Modifiers {
        ctrl: trigger.ctrl == Some(true),
        alt: trigger.alt == Some(true),
        shift: trigger.shift == Some(true),
        meta: trigger.meta == Some(true),
    };

    let (target, kind) = match tail {
        [] => (None, EventKind::KeyDown),
        ["keyup"] => (None, EventKind::KeyUp),
        ["on", target] => (Some(target.to_string()), EventKind::KeyDown),
        ["on", target, "keyup"] => (Some(target.to_string()), EventKind::KeyUp),
        _ => bail!("expected 'press <key> [on <target>] [keyup]'"),
    };

    Ok(Command::Press {
        key: trigger.key,
        modifiers,
        target,
        kind,
    })
}

/// Scripted session against a loaded shortcut file
struct Session {
    manager: ShortcutManager,
    default_target: Target,
    start: Instant,
    clock: Duration,
    overrides: Vec<ContextRestore>,
}

impl Session {
    fn new(config: &Config) -> Result<Self> {
        let manager = ShortcutManager::with_options(InProcessSource::new(), config.options.clone())
            .context("failed to start shortcut manager")?;
        let start = Instant::now();

        for stream in config.register_all(&manager) {
            let id = stream.id().to_string();
            stream.for_each(move |event| {
                let at = event.timestamp().saturating_duration_since(start);
                println!("{:>8}ms  {:<24} {}", at.as_millis(), id, describe(event));
            });
        }

        Ok(Self {
            manager,
            default_target: config.options.default_target.clone(),
            start,
            clock: Duration::ZERO,
            overrides: Vec::new(),
        })
    }

    fn run(&mut self, command: Command) {
        match command {
            Command::Press {
                key,
                modifiers,
                target,
                kind,
            } => {
                let target = target
                    .map(Target::from)
                    .unwrap_or_else(|| self.default_target.clone());
                let mut event = KeyPressEvent::new(key)
                    .with_modifiers(modifiers)
                    .on(target)
                    .of_kind(kind)
                    .at(self.start + self.clock);
                if self.manager.dispatch(&mut event) == 0 {
                    log::debug!("{} matched nothing", describe(&event));
                }
            }
            Command::Wait(duration) => self.clock += duration,
            Command::Enter(context) => self.manager.enter(context),
            Command::Leave => {
                if self.manager.leave().is_none() {
                    log::warn!("leave ignored: base context reached");
                }
            }
            Command::Override(context) => self.overrides.push(self.manager.set_context(context)),
            Command::Restore => match self.overrides.pop() {
                Some(handle) => {
                    if !handle.restore() {
                        log::warn!("restore ignored: override was replaced");
                    }
                }
                None => log::warn!("restore ignored: no override set"),
            },
        }
    }
}

fn describe(event: &KeyPressEvent) -> String {
    let mut parts: Vec<String> = Vec::new();
    let modifiers = event.modifiers();
    for (held, name) in [
        (modifiers.ctrl, "Ctrl"),
        (modifiers.alt, "Alt"),
        (modifiers.shift, "Shift"),
        (modifiers.meta, "Meta"),
    ] {
        if held {
            parts.push(name.to_string());
        }
    }
    parts.push(match event.key() {
        " " => "Space".to_string(),
        key => key.to_string(),
    });
    format!("{} ({}@{})", parts.join("+"), event.kind(), event.target())
}

fn load_config(args: &Args) -> Result<Config> {
    let path = match &args.config {
        Some(path) => path.clone(),
        None => Config::default_path().context("no config directory; pass --config")?,
    };
    let config = Config::from_toml_path(&path)
        .with_context(|| format!("failed to load {}", path.display()))?;
    log::info!("loaded {} shortcut(s) from {}", config.shortcuts.len(), path.display());
    Ok(config)
}

fn print_shortcuts(config: &Config) -> Result<()> {
    let manager = ShortcutManager::with_options(InProcessSource::new(), config.options.clone())?;
    config.register_all(&manager);
    for summary in manager.list() {
        println!(
            "{:<24} {:<12} {:<12} {}",
            summary.id,
            summary.kind.to_string(),
            summary.context.to_string(),
            summary.description.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let config = load_config(&args)?;

    if args.check_config {
        println!("Configuration is valid ({} shortcut(s))", config.shortcuts.len());
        return Ok(());
    }

    if args.list {
        return print_shortcuts(&config);
    }

    let lines: Vec<String> = match &args.script {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?
            .lines()
            .map(str::to_string)
            .collect(),
        None => io::stdin().lock().lines().collect::<io::Result<_>>()?,
    };

    let mut session = Session::new(&config)?;
    for (number, line) in lines.iter().enumerate() {
        let command =
            parse_command(line).with_context(|| format!("script line {}", number + 1))?;
        if let Some(command) = command {
            session.run(command);
        }
    }
    session.manager.shutdown();
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;

    #[test]
    fn test_args_parsing() {
        let args = Args::parse_from(["keybind", "--config", "/tmp/shortcuts.toml"]);

        assert_eq!(args.config, Some(PathBuf::from("/tmp/shortcuts.toml")));
        assert!(args.script.is_none());
        assert!(!args.verbose);
        assert!(!args.check_config);
        assert!(!args.list);
    }

    #[test]
    fn test_args_with_options() {
        let args = Args::parse_from(["keybind", "-c", "a.toml", "-s", "session.txt", "-v", "--list"]);
        assert_eq!(args.script, Some(PathBuf::from("session.txt")));
        assert!(args.verbose);
        assert!(args.list);
    }

    #[test]
    fn test_parse_press() {
        let command = parse_command("press ctrl+shift+s").unwrap().unwrap();
        assert_eq!(
            command,
            Command::Press {
                key: "s".to_string(),
                modifiers: Modifiers {
                    ctrl: true,
                    shift: true,
                    ..Modifiers::NONE
                },
                target: None,
                kind: EventKind::KeyDown,
            }
        );

        match parse_command("press esc on dialog keyup").unwrap().unwrap() {
            Command::Press { key, target, kind, .. } => {
                assert_eq!(key, "Escape");
                assert_eq!(target.as_deref(), Some("dialog"));
                assert_eq!(kind, EventKind::KeyUp);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_context_commands() {
        assert_eq!(parse_command("enter editor").unwrap(), Some(Command::Enter("editor".into())));
        assert_eq!(parse_command("leave").unwrap(), Some(Command::Leave));
        assert_eq!(
            parse_command("override none").unwrap(),
            Some(Command::Override(ContextValue::NONE))
        );
        assert_eq!(parse_command("restore").unwrap(), Some(Command::Restore));
        assert_eq!(
            parse_command("wait 250").unwrap(),
            Some(Command::Wait(Duration::from_millis(250)))
        );
    }

    #[test]
    fn test_parse_skips_comments_and_rejects_garbage() {
        assert_eq!(parse_command("   ").unwrap(), None);
        assert_eq!(parse_command("# comment").unwrap(), None);
        assert!(parse_command("jump").is_err());
        assert!(parse_command("wait soon").is_err());
        assert!(parse_command("press a under list").is_err());
    }

    #[test]
    fn test_session_replay() {
        let config = Config::from_toml(
            r#"
            [[shortcut]]
            id = "inbox"
            sequence = "g -> i"
            timeout_ms = 100
            "#,
        )
        .unwrap();
        let mut session = Session::new(&config).unwrap();
        let stream = session.manager.stream("inbox").unwrap();
        let hits = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&hits);
        stream.for_each(move |_| *sink.lock() += 1);

        for line in ["press g", "wait 150", "press i", "press g", "wait 50", "press i"] {
            session.run(parse_command(line).unwrap().unwrap());
        }
        assert_eq!(*hits.lock(), 1);
    }
}

use std::time::Duration;

use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info};

use crate::constants::timeouts::{format_duration, PRESET_DURATIONS};
use crate::db::models::MuteKind;
use crate::error::{Error, Result};
use crate::gateway::MuteGateway;
use crate::services::MuteLifecycle;
use crate::utils::duration::parse_duration;
use crate::utils::formatting::{muted_row, split_by_status, unmuted_row};

/// A parsed console request; every parameter is explicit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Mute {
        kind: MuteKind,
        key: String,
        duration: Option<Duration>,
    },
    Unmute { kind: MuteKind, key: String },
    Delete { kind: MuteKind, key: String },
    List { kind: MuteKind },
    Remote { kind: MuteKind },
    Help,
    Quit,
}

pub fn parse_command(line: &str) -> Result<Option<Command>> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let rest: Vec<&str> = words.collect();

    let command = match verb.to_ascii_lowercase().as_str() {
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        "list" | "ls" => Command::List { kind: kind_arg(&rest)? },
        "remote" => Command::Remote { kind: kind_arg(&rest)? },
        "mute" => {
            let kind = kind_arg(&rest)?;
            let args = &rest[1..];
            let (key_words, duration) = match args.iter().position(|w| *w == "--for") {
                Some(i) if i + 1 == args.len() => {
                    return Err(Error::invalid("--for needs a duration, e.g. '--for 2h' or '--for no limit'"));
                }
                Some(i) => (&args[..i], parse_duration(&args[i + 1..].join(" "))?),
                None => (args, None),
            };
            Command::Mute {
                kind,
                key: key_arg(key_words)?,
                duration,
            }
        }
        "unmute" => Command::Unmute {
            kind: kind_arg(&rest)?,
            key: key_arg(&rest[1..])?,
        },
        "delete" | "del" | "rm" => Command::Delete {
            kind: kind_arg(&rest)?,
            key: key_arg(&rest[1..])?,
        },
        other => return Err(Error::invalid(format!("unknown command '{}', try 'help'", other))),
    };

    Ok(Some(command))
}

fn kind_arg(args: &[&str]) -> Result<MuteKind> {
    args.first()
        .ok_or_else(|| Error::invalid("expected 'keyword' or 'account'"))?
        .parse()
}

fn key_arg(words: &[&str]) -> Result<String> {
    if words.is_empty() {
        return Err(Error::invalid("expected a keyword or account name"));
    }
    Ok(words.join(" "))
}

fn help_text() -> String {
    let presets = PRESET_DURATIONS
        .iter()
        .map(|d| format_duration(*d))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "Commands:\n\
         \x20 mute <keyword|account> <key...> [--for <duration>]\n\
         \x20 unmute <keyword|account> <key...>\n\
         \x20 delete <keyword|account> <key...>   (stops tracking, keeps the remote mute)\n\
         \x20 list <keyword|account>\n\
         \x20 remote <keyword|account>\n\
         \x20 help | quit\n\
         Durations: 90m, 2h, 3 days, 1 week later, 1mo, 1y, or 'no limit'. Presets: {}",
        presets
    )
}

/// Execute one command and render its result for the console
pub async fn execute<G: MuteGateway>(lifecycle: &MuteLifecycle<G>, command: Command) -> Result<String> {
    match command {
        Command::Mute { kind, key, duration } => {
            let saved = lifecycle.mute(kind, &key, duration).await?;
            Ok(match (duration, saved.unmuted_at) {
                (Some(d), Some(until)) => format!(
                    "Muted {} '{}' for {} (until {})",
                    kind,
                    key,
                    format_duration(d),
                    until
                ),
                _ => format!("Muted {} '{}' with no limit", kind, key),
            })
        }
        Command::Unmute { kind, key } => {
            let report = lifecycle.unmute(kind, &key).await;
            Ok(match (report.remote_applied, report.record_updated) {
                (true, true) => format!("Unmuted {} '{}'", kind, key),
                (false, true) => format!(
                    "Unmuted {} '{}' locally; the platform call failed (see log)",
                    kind, key
                ),
                (true, false) => format!(
                    "Unmuted {} '{}' on the platform; it is not tracked locally",
                    kind, key
                ),
                (false, false) => format!("Nothing changed for {} '{}' (see log)", kind, key),
            })
        }
        Command::Delete { kind, key } => {
            lifecycle.delete(kind, &key).await?;
            Ok(format!("Stopped tracking {} '{}'", kind, key))
        }
        Command::List { kind } => {
            let (muted, unmuted) = split_by_status(lifecycle.records(kind).await?);
            let mut out = format!("Muted {}s ({}):", kind, muted.len());
            for record in &muted {
                out.push_str("\n  ");
                out.push_str(&muted_row(record));
            }
            out.push_str(&format!("\nUnmuted {}s ({}):", kind, unmuted.len()));
            for record in &unmuted {
                out.push_str("\n  ");
                out.push_str(&unmuted_row(record));
            }
            Ok(out)
        }
        Command::Remote { kind } => {
            let keys = lifecycle.remote_mutes(kind).await?;
            Ok(format!(
                "{} {}s muted on the platform:\n  {}",
                keys.len(),
                kind,
                keys.join("\n  ")
            ))
        }
        Command::Help => Ok(help_text()),
        Command::Quit => Ok("Bye".to_string()),
    }
}

/// Read commands from stdin until EOF or `quit`
pub async fn run<G: MuteGateway>(lifecycle: MuteLifecycle<G>) -> Result<()> {
    let mut lines = BufReader::new(io::stdin()).lines();
    let mut stdout = io::stdout();

    stdout
        .write_all(format!("{}\n> ", help_text()).as_bytes())
        .await
        .map_err(|e| Error::custom(format!("stdout: {}", e)))?;
    stdout.flush().await.ok();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| Error::custom(format!("stdin: {}", e)))?
    {
        let reply = match parse_command(&line) {
            Ok(None) => String::new(),
            Ok(Some(Command::Quit)) => break,
            Ok(Some(command)) => match execute(&lifecycle, command).await {
                Ok(reply) => reply,
                Err(e) => {
                    error!("Command failed: {}", e);
                    format!("Error: {}", e)
                }
            },
            Err(e) => format!("Error: {}", e),
        };

        let prompt = if reply.is_empty() {
            "> ".to_string()
        } else {
            format!("{}\n> ", reply)
        };
        if stdout.write_all(prompt.as_bytes()).await.is_err() {
            break;
        }
        stdout.flush().await.ok();
    }

    info!("Console closed");
    Ok(())
}

//! gatelist administration CLI
//!
//! Thin inbound adapter over the engine: loads configuration, opens the
//! database, runs one command, renders the outcome.

use clap::{Parser, Subcommand};
use gatelist::config::{LogFormat, load_config};
use gatelist::db::Database;
use gatelist::engine::{EntryInfo, ListEngine, Outcome, Rejection, UserMessage};
use gatelist::error::AppError;
use gatelist::notify::TracingSink;
use gatelist::resolver::{HttpProfileResolver, HttpSecondaryResolver};
use gatelist::store::{ListKind, ListStore};
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Game-server allow/deny list administration
#[derive(Parser, Debug)]
#[command(name = "gatelist")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "GATELIST_CONFIG")]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error); overrides the
    /// configured logging.level
    #[arg(long, env = "GATELIST_LOG_LEVEL")]
    log_level: Option<String>,

    /// Actor recorded on mutations
    #[arg(long, env = "GATELIST_ACTOR", default_value = "console")]
    actor: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Add an identifier to a list
    Add {
        /// Target the deny list instead of the allow list
        #[arg(long)]
        deny: bool,

        /// Player name, IP address, or domain
        identifier: String,

        /// Optional reason (deny list only)
        #[arg(trailing_var_arg = true)]
        reason: Vec<String>,
    },
    /// Remove an identifier from a list
    Remove {
        #[arg(long)]
        deny: bool,

        identifier: String,
    },
    /// Show metadata for a single entry
    Info {
        #[arg(long)]
        deny: bool,

        identifier: String,
    },
    /// Add an IPv4 address to the MOTD deny shadow alone
    Motd { identifier: String },
    /// Enumerate all entries in a list
    List {
        #[arg(long)]
        deny: bool,
    },
}

fn list_kind(deny: bool) -> ListKind {
    if deny { ListKind::Deny } else { ListKind::Allow }
}

/// The CLI flag wins over the configured level
fn effective_level<'a>(cli: Option<&'a str>, config: &'a str) -> &'a str {
    cli.unwrap_or(config)
}

/// Reasons attach to deny-list entries only; an allow-list add carrying one
/// is refused rather than silently dropped
fn reason_without_deny(command: &Command) -> bool {
    matches!(
        command,
        Command::Add {
            deny: false,
            reason,
            ..
        } if !reason.is_empty()
    )
}

/// English rendering of a message key; a full message catalog is the host's
/// concern, the CLI covers its own keys
fn render(message: &UserMessage) -> String {
    let param = message.params.first().map(String::as_str).unwrap_or("");
    match message.key {
        "whitelist.added" => format!("{param} has been added to the allow list"),
        "blacklist.added" => format!("{param} has been added to the deny list"),
        "whitelist.removed" => format!("{param} has been removed from the allow list"),
        "blacklist.removed" => format!("{param} has been removed from the deny list"),
        "blacklist.motd.added" => format!("{param} no longer sees the server status"),
        other => format!("{other}: {param}"),
    }
}

fn render_rejection(rejection: &Rejection) -> String {
    let params = rejection.params();
    let param = params.first().map(String::as_str).unwrap_or("");
    match rejection {
        Rejection::InvalidIdentifier { .. } => {
            format!("'{param}' is not a valid player name, address, or domain")
        }
        Rejection::AlreadyListed { .. } => format!("{param} is already listed"),
        Rejection::NotListed { .. } => format!("{param} is not listed"),
        Rejection::ReasonTooLong { .. } => {
            format!("The reason is too long ({param} characters, maximum 1500)")
        }
        Rejection::InvalidDomain { .. } => format!("'{param}' does not resolve to any address"),
        Rejection::SecondaryUnavailable => {
            "Secondary-platform names need the secondary resolver configured".to_string()
        }
        Rejection::MotdRequiresIpv4 => "The MOTD deny list takes IPv4 addresses only".to_string(),
        Rejection::DomainDenyUnsupported { .. } => {
            format!("'{param}' cannot be denied; domains exist on the allow list only")
        }
    }
}

fn render_info(info: &EntryInfo) -> String {
    let mut out = format!(
        "{} entry {} (added by {} at {})",
        info.list, info.key, info.added_by, info.added_at
    );
    if let Some(name) = &info.display_name {
        out.push_str(&format!("\n  name: {name}"));
    }
    if let Some(reason) = &info.reason {
        out.push_str(&format!("\n  reason: {reason}"));
    }
    out
}

fn render_failure(err: &AppError) -> String {
    match err {
        // resolution results the actor can act on
        AppError::Resolve(gatelist::error::ResolveError::NotFound { name }) => {
            format!("No account exists for '{name}'")
        }
        AppError::Resolve(gatelist::error::ResolveError::RateLimited { retry_after }) => {
            format!("The lookup service is rate limiting us; retry in {retry_after}s")
        }
        // everything else is an infrastructure failure: logged in full,
        // reported generically
        _ => "The operation failed; see the server log for details".to_string(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    if reason_without_deny(&args.command) {
        eprintln!("A reason applies to deny-list entries only; rerun with --deny");
        std::process::exit(1);
    }

    // logging setup needs the config, so load failures go straight to stderr
    let config = load_config(args.config.as_deref())
        .inspect_err(|e| eprintln!("Failed to load configuration: {e}"))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(effective_level(
            args.log_level.as_deref(),
            &config.logging.level,
        ))
    });

    match config.logging.format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init(),
    }

    // Schema init failure here disables the whole subsystem
    let db = Arc::new(
        Database::connect(config.database.clone())
            .await
            .inspect_err(|e| error!(error = %e, "Failed to open the database"))?,
    );
    let store = ListStore::new(Arc::clone(&db));

    let resolver = Arc::new(
        HttpProfileResolver::new(&config.resolver)
            .inspect_err(|e| error!(error = %e, "Failed to build the profile resolver"))?,
    );

    let mut engine = ListEngine::new(store, resolver, Arc::new(TracingSink));

    if let Some(secondary) =
        HttpSecondaryResolver::from_config(&config.resolver.secondary, config.resolver.timeout_secs)
            .inspect_err(|e| error!(error = %e, "Failed to build the secondary resolver"))?
    {
        let prefix = config
            .resolver
            .secondary
            .prefix
            .clone()
            .unwrap_or_default();
        engine = engine.with_secondary(prefix, Arc::new(secondary));
    }

    let outcome = match &args.command {
        Command::Add {
            deny,
            identifier,
            reason,
        } => {
            let reason = if reason.is_empty() {
                None
            } else {
                Some(reason.join(" "))
            };
            engine
                .add(list_kind(*deny), &args.actor, identifier, reason.as_deref())
                .await
        }
        Command::Remove { deny, identifier } => {
            engine.remove(list_kind(*deny), &args.actor, identifier).await
        }
        Command::Info { deny, identifier } => engine.info(list_kind(*deny), identifier).await,
        Command::Motd { identifier } => engine.motd_add(&args.actor, identifier).await,
        Command::List { deny } => {
            let entries = engine.list_entries(list_kind(*deny)).await;
            match entries {
                Ok(entries) => {
                    for entry in entries {
                        println!("{entry}");
                    }
                    db.close().await;
                    return Ok(());
                }
                Err(e) => Err(e),
            }
        }
    };

    let exit = match outcome {
        Ok(Outcome::Committed(message)) => {
            println!("{}", render(&message));
            0
        }
        Ok(Outcome::Rejected(rejection)) => {
            println!("{}", render_rejection(&rejection));
            1
        }
        Ok(Outcome::Info(info)) => {
            println!("{}", render_info(&info));
            0
        }
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("{}", render_failure(&e));
            1
        }
    };

    // give fire-and-forget sink dispatch a moment to flush
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    db.close().await;
    std::process::exit(exit);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_level_overrides_config() {
        assert_eq!(effective_level(Some("debug"), "info"), "debug");
        assert_eq!(effective_level(None, "warn"), "warn");
    }

    #[test]
    fn test_allow_add_with_reason_is_refused() {
        let args = Args::try_parse_from(["gatelist", "add", "Stevie", "some", "reason"]).unwrap();
        assert!(reason_without_deny(&args.command));

        let args =
            Args::try_parse_from(["gatelist", "add", "--deny", "Stevie", "some", "reason"])
                .unwrap();
        assert!(!reason_without_deny(&args.command));

        let args = Args::try_parse_from(["gatelist", "add", "Stevie"]).unwrap();
        assert!(!reason_without_deny(&args.command));
    }
}

// # contacts - command-line host for the contacts engine
//
// This binary is a thin host around contacts-core:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Registering record stores and building the configured one
// 4. Checking the account, loading the list, and running one command
//
// No synchronization logic lives here. The only decisions the host makes are
// the ones the engine leaves to its caller: whether the store is available,
// and when to (re)fetch.
//
// ## Configuration
//
// - `CONTACTS_STORE_TYPE`: Record store type (memory, file, http). Default: file
// - `CONTACTS_STORE_PATH`: Store file path (file store). Default: contacts.json
// - `CONTACTS_STORE_URL`: Database URL (http store)
// - `CONTACTS_STORE_TOKEN`: API token (http store)
// - `CONTACTS_STORE_TIMEOUT_SECS`: Request timeout (http store). Default: 30
// - `CONTACTS_PAGE_SIZE`: Records per query page. Default: 100
// - `CONTACTS_ACCOUNT_POLL_SECS`: Account check interval for `watch`. Default: 30
// - `CONTACTS_LOG_LEVEL`: trace, debug, info, warn, error. Default: warn
//
// ## Commands
//
// ```bash
// contacts list
// contacts add Ada Lovelace 555-0100 ada@x.io
// contacts edit 0 Ada King 555-0199 ada@x.io
// contacts remove 0
// contacts watch
// ```

use anyhow::{Context, Result};
use contacts_core::config::{ContactsConfig, EngineConfig, StoreConfig};
use contacts_core::{
    Contact, ContactEngine, ContactError, ContactFields, EngineEvent, StoreRegistry,
};
use std::env;
use std::process::ExitCode;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// - 0: Success
/// - 1: Configuration or usage error
/// - 2: Runtime error (store unavailable, operation failed)
#[derive(Debug, Clone, Copy)]
enum ContactsExitCode {
    Success = 0,
    ConfigError = 1,
    RuntimeError = 2,
}

impl From<ContactsExitCode> for ExitCode {
    fn from(code: ContactsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// A command given on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    List,
    Add(ContactFields),
    Edit(usize, ContactFields),
    Remove(usize),
    Watch,
}

impl Command {
    /// Parse the arguments following the program name
    fn parse(args: &[String]) -> Result<Self> {
        let Some((name, rest)) = args.split_first() else {
            return Ok(Command::List);
        };

        match name.as_str() {
            "list" | "ls" => Ok(Command::List),
            "add" => Ok(Command::Add(parse_fields(rest)?)),
            "edit" => {
                let (position, fields) = rest
                    .split_first()
                    .context("edit needs a position: contacts edit <position> <first> <last> [phone] [email]")?;
                Ok(Command::Edit(parse_position(position)?, parse_fields(fields)?))
            }
            "remove" | "rm" => {
                let position = rest
                    .first()
                    .context("remove needs a position: contacts remove <position>")?;
                Ok(Command::Remove(parse_position(position)?))
            }
            "watch" => Ok(Command::Watch),
            other => anyhow::bail!(
                "Unknown command '{}'. Commands: list, add, edit, remove, watch",
                other
            ),
        }
    }
}

fn parse_position(arg: &str) -> Result<usize> {
    arg.parse()
        .with_context(|| format!("Position must be a non-negative number. Got: {}", arg))
}

fn parse_fields(args: &[String]) -> Result<ContactFields> {
    if args.len() < 2 || args.len() > 4 {
        anyhow::bail!("Expected <first> <last> [phone] [email], got {} argument(s)", args.len());
    }

    let field = |i: usize| args.get(i).cloned().unwrap_or_default();
    Ok(ContactFields::new(field(0), field(1), field(2), field(3)))
}

/// Application configuration
struct Config {
    store_type: String,
    store_path: String,
    store_url: Option<String>,
    store_token: Option<String>,
    store_timeout_secs: u64,
    page_size: usize,
    account_poll_secs: u64,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Ok(Self {
            store_type: env::var("CONTACTS_STORE_TYPE").unwrap_or_else(|_| "file".to_string()),
            store_path: env::var("CONTACTS_STORE_PATH")
                .unwrap_or_else(|_| "contacts.json".to_string()),
            store_url: env::var("CONTACTS_STORE_URL").ok(),
            store_token: env::var("CONTACTS_STORE_TOKEN").ok(),
            store_timeout_secs: parse_var("CONTACTS_STORE_TIMEOUT_SECS", 30)?,
            page_size: parse_var("CONTACTS_PAGE_SIZE", 100)?,
            account_poll_secs: parse_var("CONTACTS_ACCOUNT_POLL_SECS", 30)?,
            log_level: env::var("CONTACTS_LOG_LEVEL").unwrap_or_else(|_| "warn".to_string()),
        })
    }

    /// Validate the configuration and build the library configuration from it
    fn to_contacts_config(&self) -> Result<ContactsConfig> {
        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "CONTACTS_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        if !(1..=3600).contains(&self.account_poll_secs) {
            anyhow::bail!(
                "CONTACTS_ACCOUNT_POLL_SECS must be between 1 and 3600 seconds. Got: {}",
                self.account_poll_secs
            );
        }

        let store = match self.store_type.as_str() {
            "memory" => StoreConfig::Memory,
            "file" => StoreConfig::File {
                path: self.store_path.clone(),
            },
            "http" => StoreConfig::Http {
                url: self
                    .store_url
                    .clone()
                    .context("CONTACTS_STORE_URL is required when CONTACTS_STORE_TYPE=http")?,
                api_token: self
                    .store_token
                    .clone()
                    .context("CONTACTS_STORE_TOKEN is required when CONTACTS_STORE_TYPE=http")?,
                timeout_secs: self.store_timeout_secs,
            },
            other => anyhow::bail!(
                "CONTACTS_STORE_TYPE '{}' is not supported. Supported types: memory, file, http",
                other
            ),
        };

        let config = ContactsConfig {
            store,
            engine: EngineConfig::default().with_page_size(self.page_size),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Read a numeric environment variable, falling back to `default` when unset
fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be a number. Got: {}", name, value)),
        Err(_) => Ok(default),
    }
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();
    let command = match Command::parse(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("Usage error: {}", e);
            return ContactsExitCode::ConfigError.into();
        }
    };

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ContactsExitCode::ConfigError.into();
        }
    };

    let contacts_config = match config.to_contacts_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration validation error: {}", e);
            return ContactsExitCode::ConfigError.into();
        }
    };

    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return ContactsExitCode::ConfigError.into();
    }

    info!("Using {} record store", contacts_config.store.type_name());

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return ContactsExitCode::RuntimeError.into();
        }
    };

    let poll = Duration::from_secs(config.account_poll_secs);
    let result = rt.block_on(async {
        match run(contacts_config, command, poll).await {
            Ok(()) => ContactsExitCode::Success,
            Err(e) => {
                error!("{:#}", e);
                eprintln!("{:#}", e);
                ContactsExitCode::RuntimeError
            }
        }
    });

    result.into()
}

/// Build the registry with every store compiled into this binary
fn build_registry() -> Result<StoreRegistry> {
    let registry = StoreRegistry::with_builtin_stores();

    #[cfg(feature = "http")]
    contacts_store_http::register(&registry)?;

    debug!("Registered stores: {}", registry.list_stores().join(", "));
    Ok(registry)
}

/// Build the engine, bring the list up to date, and run `command`
async fn run(config: ContactsConfig, command: Command, poll: Duration) -> Result<()> {
    let registry = build_registry()?;
    let store = registry
        .create_store(&config.store)
        .await
        .context("Failed to create record store")?;

    let (engine, events) = ContactEngine::new(store, config.engine)?;

    if command == Command::Watch {
        return watch(engine, events, poll).await;
    }

    let available = engine
        .check_account()
        .await
        .context("Failed to check the record store account")?;
    if !available {
        anyhow::bail!("The record store account is not available. Sign in and try again.");
    }

    // The engine starts empty, so this always loads the list
    refresh_if_empty(&engine).await?;

    if let Err(err) = apply(&engine, command).await {
        match refetch_if_stale(&engine, &err).await {
            Ok(true) => print_contacts(&engine.contacts().await),
            Ok(false) => {}
            Err(e) => warn!("Re-fetch failed: {:#}", e),
        }
        return Err(err);
    }

    print_contacts(&engine.contacts().await);
    Ok(())
}

async fn apply(engine: &ContactEngine, command: Command) -> Result<()> {
    match command {
        Command::List | Command::Watch => {}
        Command::Add(fields) => engine.create(fields).await?,
        Command::Edit(position, fields) => {
            let existing = contact_at(engine, position).await?;
            engine.update(&existing, fields).await?;
        }
        Command::Remove(position) => engine.delete(position).await?,
    }
    Ok(())
}

/// Re-fetch when `err` says the local list no longer matches the store
///
/// Returns whether a fetch happened.
async fn refetch_if_stale(engine: &ContactEngine, err: &anyhow::Error) -> Result<bool> {
    let stale = err
        .downcast_ref::<ContactError>()
        .is_some_and(ContactError::needs_refetch);
    if !stale {
        return Ok(false);
    }

    warn!("Local list is out of step with the store, re-fetching: {}", err);
    engine.fetch().await?;
    Ok(true)
}

async fn contact_at(engine: &ContactEngine, position: usize) -> Result<Contact> {
    match engine.contact_at(position).await {
        Some(contact) => Ok(contact),
        None => anyhow::bail!(
            "No contact at position {} (the list has {})",
            position,
            engine.len().await
        ),
    }
}

/// Fetch when the store is available and nothing is loaded yet
async fn refresh_if_empty(engine: &ContactEngine) -> Result<()> {
    if engine.is_available() && engine.is_empty().await {
        engine.fetch().await?;
    }
    Ok(())
}

fn print_contacts(contacts: &[Contact]) {
    if contacts.is_empty() {
        println!("(no contacts)");
        return;
    }

    for (position, contact) in contacts.iter().enumerate() {
        println!(
            "{:>3}  {:<32} {:<16} {}",
            position,
            contact.display_name(),
            contact.phone(),
            contact.email()
        );
    }
}

/// Follow the account and the engine until a shutdown signal arrives
///
/// The account is checked every `poll`; whenever it becomes available with
/// an empty list, the list is fetched. Engine events are logged as they come.
async fn watch(
    engine: ContactEngine,
    mut events: mpsc::Receiver<EngineEvent>,
    poll: Duration,
) -> Result<()> {
    let mut changes = engine.availability_changes();
    let mut ticker = tokio::time::interval(poll);

    let shutdown = wait_for_shutdown();
    tokio::pin!(shutdown);

    info!("Watching record store (account check every {:?})", poll);

    loop {
        tokio::select! {
            signal = &mut shutdown => {
                let signal = signal?;
                info!("Received {}, stopping", signal);
                return Ok(());
            }
            _ = ticker.tick() => {
                if let Err(e) = engine.check_account().await {
                    warn!("Account check failed: {}", e);
                }
            }
            Some(available) = changes.next() => {
                if available {
                    println!("Record store available");
                    if let Err(e) = refresh_if_empty(&engine).await {
                        warn!("Initial fetch failed: {:#}", e);
                    } else {
                        print_contacts(&engine.contacts().await);
                    }
                } else {
                    println!("Record store unavailable");
                }
            }
            Some(event) = events.recv() => {
                debug!("Engine event: {:?}", event);
            }
        }
    }
}

/// Wait for a shutdown signal (SIGTERM, SIGINT)
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let name = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(name)
}

/// Wait for a shutdown signal (CTRL-C only)
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}

//! psafe: read-only Password Safe v3 command-line client
//!
//! Commands:
//!   info   - header summary and record count
//!   list   - one line per record (group, title, user)
//!   show   - details of one record, password masked unless --reveal
//!   totp   - current codes for records whose notes carry an otpauth URL

mod otp;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use psafe_core::{PsafeConfig, ReaderConfig};
use psafe_format::{Database, Entity, PsafeReader, Record};
use secrecy::SecretString;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::otp::TotpConfig;

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "psafe",
    version,
    about = "Password Safe v3 reader",
    long_about = "psafe: inspect Password Safe v3 (.psafe3) databases and print TOTP codes"
)]
struct Cli {
    /// Path to psafe.toml configuration file
    #[arg(long, short = 'c', env = "PSAFE_CONFIG", default_value = "psafe.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, env = "PSAFE_LOG")]
    log: Option<String>,

    /// Log format (json, text); overrides the config file
    #[arg(long, env = "PSAFE_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Master passphrase for the database. Prefer PSAFE_PASSWORD: a value
    /// given here is visible in the process list
    #[arg(long, env = "PSAFE_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the database header and record count
    Info {
        #[command(flatten)]
        db: DatabaseArg,
    },

    /// List records as group, title, user
    List {
        #[command(flatten)]
        db: DatabaseArg,
        /// Only records in this group or below it (e.g. Work or Work.Email)
        #[arg(long, short = 'g')]
        group: Option<String>,
    },

    /// Show one record by title
    Show {
        /// Record title (exact match)
        title: String,
        #[command(flatten)]
        db: DatabaseArg,
        /// Print the password and password history instead of masking them
        #[arg(long)]
        reveal: bool,
    },

    /// Print current TOTP codes from otpauth URLs stored in record notes
    Totp {
        #[command(flatten)]
        db: DatabaseArg,
    },
}

#[derive(Args, Debug)]
struct DatabaseArg {
    /// Database file (overrides config cli.default_database)
    #[arg(long, short = 'd', env = "PSAFE_DATABASE")]
    database: Option<PathBuf>,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = PsafeConfig::load(&cli.config)
        .with_context(|| format!("loading config: {}", cli.config.display()))?;

    let level = cli.log.clone().unwrap_or_else(|| config.log.level.clone());
    let format = match cli.log_format.clone() {
        Some(format) => format,
        None => LogFormat::from_str(&config.log.format, true)
            .map_err(|e| anyhow::anyhow!("invalid log.format in config: {e}"))?,
    };
    init_logging(&level, &format);
    debug!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "psafe starting"
    );

    let password = cli
        .password
        .clone()
        .map(SecretString::from)
        .context("no passphrase given; use --password or set PSAFE_PASSWORD")?;

    match &cli.command {
        Commands::Info { db } => {
            let path = resolve_database(&config, db)?;
            cmd_info(&config.reader, &path, &password)
        }
        Commands::List { db, group } => {
            let path = resolve_database(&config, db)?;
            cmd_list(&config.reader, &path, &password, group.as_deref())
        }
        Commands::Show { title, db, reveal } => {
            let path = resolve_database(&config, db)?;
            cmd_show(&config.reader, &path, &password, title, *reveal)
        }
        Commands::Totp { db } => {
            let path = resolve_database(&config, db)?;
            cmd_totp(&config, &path, &password)
        }
    }
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

/// CLI flag > config > error
fn resolve_database(config: &PsafeConfig, arg: &DatabaseArg) -> Result<PathBuf> {
    arg.database
        .clone()
        .or_else(|| config.cli.default_database.clone())
        .context("no database given; use --database or set cli.default_database in config")
}

fn open_source(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    Ok(BufReader::new(file))
}

fn load(config: &ReaderConfig, path: &Path, password: &SecretString) -> Result<Database> {
    Database::open(open_source(path)?, password, config)
        .with_context(|| format!("reading {}", path.display()))
}

// ── Commands ──────────────────────────────────────────────────────────────────

fn cmd_info(config: &ReaderConfig, path: &Path, password: &SecretString) -> Result<()> {
    let db = load(config, path, password)?;
    let header = &db.header;

    println!("file:        {}", path.display());
    println!("format:      {}.{:02}", header.major_version, header.minor_version);
    if let Some(ref name) = header.name {
        println!("name:        {name}");
    }
    if let Some(ref description) = header.description {
        println!("description: {description}");
    }
    if let Some(uuid) = header.uuid {
        println!("uuid:        {uuid}");
    }
    if let Some(saved) = header.last_update_time {
        println!("last saved:  {}", saved.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    match (&header.last_saved_by_user, &header.last_saved_on_host) {
        (Some(user), Some(host)) => println!("saved by:    {user}@{host}"),
        (Some(user), None) => println!("saved by:    {user}"),
        (None, Some(host)) => println!("saved on:    {host}"),
        (None, None) => {}
    }
    if let Some(ref app) = header.last_saved_by_application {
        println!("application: {app}");
    }
    println!("records:     {}", db.records.len());
    println!("hmac:        {:?}", db.hmac);
    Ok(())
}

fn cmd_list(
    config: &ReaderConfig,
    path: &Path,
    password: &SecretString,
    group: Option<&str>,
) -> Result<()> {
    let db = load(config, path, password)?;
    let records: Vec<&Record> = match group {
        Some(group) => db.in_group(group).collect(),
        None => db.records.iter().collect(),
    };

    for record in records {
        println!(
            "{:<24} {:<32} {}",
            record.group.as_deref().unwrap_or("-"),
            record.title.as_deref().unwrap_or("(untitled)"),
            record.user.as_deref().unwrap_or(""),
        );
    }
    Ok(())
}

fn cmd_show(
    config: &ReaderConfig,
    path: &Path,
    password: &SecretString,
    title: &str,
    reveal: bool,
) -> Result<()> {
    let db = load(config, path, password)?;
    let record = db
        .find_by_title(title)
        .with_context(|| format!("no record titled '{title}' in {}", path.display()))?;

    println!("title:    {title}");
    if let Some(ref group) = record.group {
        println!("group:    {group}");
    }
    if let Some(ref user) = record.user {
        println!("user:     {user}");
    }
    let current = record.current_password();
    if reveal {
        println!("password: {}", current.password.as_str());
    } else {
        println!("password: ********");
    }
    if let Some(expires) = current.expires {
        println!("expires:  {}", expires.format("%Y-%m-%d"));
    }
    if let Some(ref url) = record.url {
        println!("url:      {url}");
    }
    for (label, time) in [
        ("created", record.created),
        ("modified", record.modified),
        ("accessed", record.accessed),
        ("pw changed", record.password_modified),
    ] {
        if let Some(time) = time {
            println!("{:<9} {}", format!("{label}:"), time.format("%Y-%m-%d %H:%M:%S UTC"));
        }
    }
    if let Some(ref history) = record.password_history {
        println!(
            "history:  {} of max {}",
            history.entries.len(),
            history.max_entries
        );
        if reveal {
            for entry in &history.entries {
                let when = entry
                    .modified
                    .map(|t| t.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "-".into());
                println!("  {when}  {}", entry.password.as_str());
            }
        }
    }
    if let Some(ref notes) = record.notes {
        println!("notes:\n{notes}");
    }
    Ok(())
}

/// Streams the records instead of loading them all: only notes are kept.
fn cmd_totp(config: &PsafeConfig, path: &Path, password: &SecretString) -> Result<()> {
    let mut reader = PsafeReader::with_config(open_source(path)?, config.reader.clone());
    reader
        .set_passphrase(password)
        .with_context(|| format!("unlocking {}", path.display()))?;

    let marker = config.cli.totp_label.as_str();
    let mut urls = Vec::new();
    while reader
        .read()
        .with_context(|| format!("reading {}", path.display()))?
    {
        if let Entity::Record(record) = reader.entity() {
            let Some(notes) = record.notes.as_deref() else {
                continue;
            };
            if let Some(url) = otp::extract_url(notes, marker) {
                let title = record.title.clone().unwrap_or_default();
                urls.push((title, url.to_string()));
            }
        }
    }
    reader.close();

    let now = u64::try_from(chrono::Utc::now().timestamp()).context("system clock before 1970")?;
    for (title, url) in urls {
        match TotpConfig::from_url(&url).and_then(|totp| {
            let code = totp.generate_at(now)?;
            Ok((totp, code))
        }) {
            Ok((totp, code)) => {
                debug!(title = %title, remaining = totp.remaining(now), "generated code");
                println!("{}: {code}", totp.label);
            }
            Err(e) => warn!(title = %title, "skipping TOTP entry: {e}"),
        }
    }
    Ok(())
}

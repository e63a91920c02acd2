mod authorization;
mod bridge;
mod client;
mod config;
mod credentials;
mod dates;
mod history;
mod output;
mod prompt;
mod registry;
mod report;
mod session;
mod td;

use clap::{Args, Parser, Subcommand};
use std::fmt::Display;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing_subscriber::EnvFilter;

use crate::bridge::BridgeClient;
use crate::config::Config;
use crate::credentials::{ApiCredentials, Credentials, CredentialsStore};
use crate::dates::{format_utc, TimeWindow, DEFAULT_WINDOW_HOURS};
use crate::history::HistoryOptions;
use crate::output::{ChatListOutput, JsonFormat};
use crate::prompt::TerminalPrompter;
use crate::report::Report;
use crate::session::{Session, DEFAULT_SETTLE_DELAY, LOAD_CHATS_LIMIT};

#[derive(Parser)]
#[command(
    name = "tdfetch",
    version,
    about = "Fetch recent messages from Telegram groups through TDLib",
    after_help = "Examples:\n  tdfetch credentials save --api-id 123456 --api-hash 0123abcd --phone +15550100\n  tdfetch fetch --group \"Family\" --group \"Work\"\n  tdfetch fetch --since \"1d ago\" --all-pages\n  tdfetch fetch --hours 12 --json\n  tdfetch chats list --limit 20"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(long, global = true, help = "Output JSON instead of text")]
    json: bool,

    #[arg(long, global = true, help = "Print JSON on a single line")]
    compact: bool,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Fetch recent messages from one or more groups and print a report")]
    Fetch(FetchArgs),
    #[command(about = "Inspect the chat list")]
    Chats {
        #[command(subcommand)]
        command: ChatsCommand,
    },
    #[command(about = "Manage the saved API credentials")]
    Credentials {
        #[command(subcommand)]
        command: CredentialsCommand,
    },
}

#[derive(Args)]
struct FetchArgs {
    #[arg(long = "group", value_name = "NAME", help = "Group name or part of it (repeatable); prompts when omitted")]
    groups: Vec<String>,

    #[arg(long, conflicts_with = "since", help = "Fetch messages from the last N hours [default: 6]")]
    hours: Option<i64>,

    #[arg(long, value_name = "EXPR", help = "Fetch messages since a time (e.g. \"1d ago\", yesterday, 2024-01-15)")]
    since: Option<String>,

    #[arg(long, conflicts_with = "all_pages", help = "History pages of 100 messages to read per group [default: 1]")]
    max_pages: Option<usize>,

    #[arg(long, help = "Keep reading history pages until the start of the window")]
    all_pages: bool,

    #[command(flatten)]
    connect: ConnectArgs,
}

#[derive(Subcommand)]
enum ChatsCommand {
    #[command(about = "List the chats the client knows about")]
    List(ChatsListArgs),
}

#[derive(Args)]
struct ChatsListArgs {
    #[arg(long, help = "Maximum number of chats to print")]
    limit: Option<usize>,

    #[command(flatten)]
    connect: ConnectArgs,
}

#[derive(Subcommand)]
enum CredentialsCommand {
    #[command(about = "Save API id, API hash and phone number")]
    Save(CredentialsSaveArgs),
    #[command(about = "Show the credentials in use (masked)")]
    Show,
    #[command(about = "Delete the saved credentials file")]
    Clear,
}

#[derive(Args)]
struct CredentialsSaveArgs {
    #[arg(long, help = "API id from my.telegram.org")]
    api_id: i32,

    #[arg(long, help = "API hash from my.telegram.org")]
    api_hash: String,

    #[arg(long, help = "Phone number with country code")]
    phone: String,
}

#[derive(Args)]
struct ConnectArgs {
    #[arg(long, default_value_t = DEFAULT_SETTLE_DELAY.as_millis() as u64, help = "Milliseconds to wait after loading chats for late chat updates")]
    settle_ms: u64,

    #[arg(
        long,
        value_name = "SECS",
        help = "Give up when authorization takes longer than this (checked between prompts, not while one waits for input)"
    )]
    auth_timeout: Option<u64>,

    #[arg(long, value_name = "SECS", help = "Give up on a single TDLib request after this long")]
    request_timeout: Option<u64>,
}

impl ConnectArgs {
    fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    fn auth_timeout(&self) -> Option<Duration> {
        self.auth_timeout.map(Duration::from_secs)
    }

    fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout.map(Duration::from_secs)
    }
}

/// Progress lines go to stdout, or to stderr when stdout carries JSON.
#[derive(Clone, Copy)]
struct Progress {
    json: bool,
}

impl Progress {
    fn line(&self, message: impl Display) {
        if self.json {
            eprintln!("{message}");
        } else {
            println!("{message}");
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("{error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging();
    let config = Config::load();
    let store = CredentialsStore::new(config.secrets_path.clone());
    let json_format = output::resolve_json_format(cli.compact);

    match cli.command {
        Command::Fetch(args) => handle_fetch(args, &config, &store, cli.json, json_format).await?,
        Command::Chats { command } => match command {
            ChatsCommand::List(args) => {
                handle_chats_list(args, &config, &store, cli.json, json_format).await?;
            }
        },
        Command::Credentials { command } => match command {
            CredentialsCommand::Save(args) => {
                let credentials = Credentials {
                    api_id: Some(args.api_id),
                    api_hash: Some(args.api_hash),
                    phone: Some(args.phone),
                    updated_at: None,
                }
                .validate()?;
                store.store(&credentials)?;
                println!("Saved credentials to {}", store.path().display());
            }
            CredentialsCommand::Show => {
                let credentials = store.load()?.validate()?;
                print_credentials(&credentials, Progress { json: false });
            }
            CredentialsCommand::Clear => {
                store.clear()?;
                println!("Cleared saved credentials.");
            }
        },
    }
    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("TDFETCH_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

async fn handle_fetch(
    args: FetchArgs,
    config: &Config,
    store: &CredentialsStore,
    json: bool,
    json_format: JsonFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let progress = Progress { json };
    // Reject a bad --since before anything interactive happens.
    time_window(&args, Utc::now())?;

    let groups = resolve_group_names(args.groups.clone(), progress)?;
    let credentials = store.load()?.validate()?;
    print_credentials(&credentials, progress);

    let mut session = connect(config, &args.connect, progress).await?;
    let result = async {
        session
            .authorize(
                &TerminalPrompter,
                config.tdlib_parameters(&credentials),
                credentials.phone.clone(),
                args.connect.auth_timeout(),
            )
            .await?;
        progress.line("Successfully connected to Telegram!");
        session.load_chats(LOAD_CHATS_LIMIT, args.connect.settle()).await;

        let window = time_window(&args, Utc::now())?;
        progress.line(format!("\nFetching messages newer than: {} UTC", format_utc(window.since)));

        let options = HistoryOptions {
            max_pages: if args.all_pages { None } else { Some(args.max_pages.unwrap_or(1).max(1)) },
            request_timeout: args.connect.request_timeout(),
            ..HistoryOptions::default()
        };

        let fetch = history::fetch_groups(
            session.client(),
            session.registry(),
            &groups,
            window.since,
            &options,
            |line| progress.line(line),
        )
        .await;

        let report = Report::new(fetch.records, window, groups.len(), fetch.found);
        output::print_report(&report, json, json_format)?;
        Ok::<(), Box<dyn std::error::Error>>(())
    }
    .await;

    session.close();
    result
}

async fn handle_chats_list(
    args: ChatsListArgs,
    config: &Config,
    store: &CredentialsStore,
    json: bool,
    json_format: JsonFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let progress = Progress { json };
    let credentials = store.load()?.validate()?;

    let mut session = connect(config, &args.connect, progress).await?;
    let result = async {
        session
            .authorize(
                &TerminalPrompter,
                config.tdlib_parameters(&credentials),
                credentials.phone.clone(),
                args.connect.auth_timeout(),
            )
            .await?;
        session.load_chats(LOAD_CHATS_LIMIT, args.connect.settle()).await;

        if session.registry().is_empty() {
            progress.line("No chats loaded. Try a longer --settle-ms.");
        }
        let mut chats = session.registry().snapshot();
        if let Some(limit) = args.limit {
            chats.truncate(limit);
        }
        output::print_chat_list(&ChatListOutput { chats }, json, json_format)?;
        Ok::<(), Box<dyn std::error::Error>>(())
    }
    .await;

    session.close();
    result
}

async fn connect(
    config: &Config,
    args: &ConnectArgs,
    progress: Progress,
) -> Result<Session, Box<dyn std::error::Error>> {
    progress.line("\nConnecting to Telegram...");
    let (client, updates) = BridgeClient::connect(&config.bridge_url).await?;
    Ok(Session::start(Arc::new(client), updates).with_request_timeout(args.request_timeout()))
}

fn time_window(args: &FetchArgs, now: DateTime<Utc>) -> Result<TimeWindow, Box<dyn std::error::Error>> {
    match args.since.as_deref() {
        Some(expr) => Ok(TimeWindow::since_expression(expr, now)?),
        None => {
            let hours = args.hours.unwrap_or(DEFAULT_WINDOW_HOURS);
            if hours < 1 {
                return Err("--hours must be at least 1".into());
            }
            Ok(TimeWindow::last_hours(hours, now))
        }
    }
}

fn resolve_group_names(
    groups: Vec<String>,
    progress: Progress,
) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let groups: Vec<String> = if groups.is_empty() {
        let stdin = io::stdin();
        if progress.json {
            prompt::collect_group_names(stdin.lock(), &mut io::stderr())?
        } else {
            let mut stdout = io::stdout();
            let groups = prompt::collect_group_names(stdin.lock(), &mut stdout)?;
            stdout.flush()?;
            groups
        }
    } else {
        groups
            .into_iter()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect()
    };

    if groups.is_empty() {
        return Err("You must specify at least one group!".into());
    }
    Ok(groups)
}

fn print_credentials(credentials: &ApiCredentials, progress: Progress) {
    progress.line("=== Using Telegram API Credentials ===");
    progress.line(format!("API ID: {}", credentials.api_id));
    progress.line(format!("API Hash: {}", credentials.masked_api_hash()));
    progress.line(format!("Phone: {}", credentials.masked_phone()));
}

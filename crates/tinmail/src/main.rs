//! `tinmail` - terminal email client
//!
//! Lists, reads and sends mail over IMAP and SMTP using the accounts in
//! `tinmail/config.toml` under the platform config directory.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod commands;
mod render;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tinmail_core::MailboxFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "tinmail", version, about = "Read and send email from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to $TINMAIL_CONFIG, then the platform config dir)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Account to use, by email or index
    #[arg(short, long, global = true, value_name = "EMAIL|INDEX")]
    account: Option<String>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// List messages, newest first
    List {
        /// unseen, seen or all; defaults to `inbox_view` from the config
        #[arg(short, long)]
        filter: Option<MailboxFilter>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
        /// Re-list every `auto_refresh` seconds
        #[arg(short, long)]
        watch: bool,
    },
    /// Show one message body and its attachments
    Read {
        uid: u32,
        #[arg(long)]
        json: bool,
    },
    /// Compose and send a message
    Send {
        /// Comma-separated recipients
        #[arg(long)]
        to: String,
        /// Comma-separated Cc recipients
        #[arg(long, default_value = "")]
        cc: String,
        #[arg(short, long, default_value = "")]
        subject: String,
        /// Body text
        #[arg(short, long, conflicts_with_all = ["body_file", "edit"])]
        body: Option<String>,
        /// Read the body from a file
        #[arg(long, value_name = "PATH", conflicts_with = "edit")]
        body_file: Option<PathBuf>,
        /// Write the body in the configured editor
        #[arg(short, long)]
        edit: bool,
        /// File to attach; repeatable
        #[arg(long, value_name = "PATH")]
        attach: Vec<PathBuf>,
    },
    /// Copy a message's attachments into the download folder
    Download {
        uid: u32,
        /// Only this attachment (1-based)
        #[arg(short, long)]
        index: Option<usize>,
    },
    /// Open one attachment with the default application
    Open {
        uid: u32,
        /// Attachment number (1-based)
        index: usize,
    },
    /// Print the version
    Version,
}

fn setup_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    if matches!(cli.command, Commands::Version) {
        println!("tinmail v{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let ctx = commands::Context::load(cli.config.as_deref(), cli.account.as_deref())?;
    match cli.command {
        Commands::List {
            filter,
            json,
            watch,
        } => commands::list(&ctx, filter, json, watch).await,
        Commands::Read { uid, json } => commands::read(&ctx, uid, json).await,
        Commands::Send {
            to,
            cc,
            subject,
            body,
            body_file,
            edit,
            attach,
        } => {
            let body = commands::BodySource::from_args(body, body_file, edit);
            commands::send(&ctx, to, cc, subject, body, &attach).await
        }
        Commands::Download { uid, index } => commands::download(&ctx, uid, index).await,
        Commands::Open { uid, index } => commands::open(&ctx, uid, index).await,
        Commands::Version => Ok(()),
    }
}

mod categories;
mod history;
mod mutate;
mod recurrings;
mod render;
mod tags;
mod transactions;
mod undo;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use tally_client::{ClientMode, Config, ServiceClient};
use tally_engine::{Engine, JournalStore};

pub(crate) const EXIT_OK: u8 = 0;
pub(crate) const EXIT_FAILURE: u8 = 1;
pub(crate) const EXIT_PARTIAL: u8 = 2;
pub(crate) const EXIT_CONFLICT: u8 = 3;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// CLI argument surface.
///
/// Every write is validated locally, captured, diffed, and journaled so it
/// can be undone later; batches report one outcome per id.
#[derive(Parser)]
#[command(
    name = "tally",
    version,
    about = "Unofficial personal-finance CLI with undoable writes",
    long_about = None
)]
pub(crate) struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    pub output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Show what a write would change; no reads of remote state, no writes,
    /// no journal entries
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Skip confirmation prompts (required for writes in non-interactive runs)
    #[arg(long, global = true)]
    pub yes: bool,

    #[arg(long, global = true, env = "TALLY_BASE_URL")]
    pub base_url: Option<String>,

    #[arg(long, global = true, env = "TALLY_TOKEN")]
    pub token: Option<String>,

    #[arg(long, global = true, env = "TALLY_TOKEN_FILE")]
    pub token_file: Option<PathBuf>,

    /// Path to the undo journal (defaults to the config directory)
    #[arg(long, global = true, env = "TALLY_JOURNAL")]
    pub journal: Option<PathBuf>,

    #[arg(long, global = true, env = "TALLY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Serve reads and writes from a local fixtures directory
    #[arg(long, global = true, env = "TALLY_FIXTURES_DIR", hide = true)]
    pub fixtures_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// List and edit transactions
    Transactions {
        #[command(subcommand)]
        cmd: transactions::TransactionsCmd,
    },

    /// List and edit categories
    Categories {
        #[command(subcommand)]
        cmd: categories::CategoriesCmd,
    },

    /// List and edit tags
    Tags {
        #[command(subcommand)]
        cmd: tags::TagsCmd,
    },

    /// List and edit recurring rules
    Recurrings {
        #[command(subcommand)]
        cmd: recurrings::RecurringsCmd,
    },

    /// Undo the most recent journaled mutation, or a specific one
    Undo(undo::UndoArgs),

    /// Show the journal of applied mutations
    History(history::HistoryArgs),

    /// Print version info
    Version,
}

/// Everything a command needs for one invocation: resolved flags, the
/// service client, and the journal handle. Resources are passed explicitly,
/// nothing is process-global.
pub(crate) struct App {
    pub output: OutputFormat,
    pub quiet: bool,
    pub dry_run: bool,
    pub yes: bool,
    pub client: ServiceClient,
    pub journal: JournalStore,
}

impl App {
    fn from_cli(cli: &Cli) -> anyhow::Result<Self> {
        let config = Config::load(cli.config.as_deref())?;

        let journal_path = cli
            .journal
            .clone()
            .unwrap_or_else(|| config.journal_path.clone());
        let journal = JournalStore::open(journal_path)?;

        let mode = match &cli.fixtures_dir {
            Some(dir) => ClientMode::Fixtures(dir.clone()),
            None => {
                let token_file = cli
                    .token_file
                    .clone()
                    .unwrap_or_else(|| config.token_file.clone());
                let token = cli
                    .token
                    .clone()
                    .or_else(|| tally_client::load_token(&token_file).ok());
                ClientMode::Http {
                    base_url: cli
                        .base_url
                        .clone()
                        .unwrap_or_else(|| config.base_url.clone()),
                    token,
                }
            }
        };

        Ok(Self {
            output: cli.output,
            quiet: cli.quiet,
            dry_run: cli.dry_run,
            yes: cli.yes,
            client: ServiceClient::new(mode),
            journal,
        })
    }

    pub fn engine(&self) -> Engine<'_> {
        Engine::new(&self.client, &self.client, &self.journal)
    }

    pub fn interactive() -> bool {
        std::io::stdin().is_terminal()
    }
}

fn main() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();
    let code = match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            EXIT_FAILURE
        }
    };
    process::exit(code as i32);
}

fn run(cli: &Cli) -> anyhow::Result<u8> {
    if let Commands::Version = &cli.command {
        println!("tally {}", env!("CARGO_PKG_VERSION"));
        return Ok(EXIT_OK);
    }

    let app = App::from_cli(cli)?;
    match &cli.command {
        Commands::Transactions { cmd } => transactions::run(&app, cmd),
        Commands::Categories { cmd } => categories::run(&app, cmd),
        Commands::Tags { cmd } => tags::run(&app, cmd),
        Commands::Recurrings { cmd } => recurrings::run(&app, cmd),
        Commands::Undo(args) => undo::run(&app, args),
        Commands::History(args) => history::run(&app, args),
        Commands::Version => unreachable!("handled above"),
    }
}

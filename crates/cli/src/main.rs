//! Plenum - moderated resolution voting from the command line
//!
//! The moderator side creates sessions, steps through resolutions and closes
//! the vote; the participant side joins by code and casts ballots. Output is
//! JSON so the commands compose with other tooling.

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use directories::ProjectDirs;
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use plenum_core::{
    BallotService, Choice, Database, ReportService, ResolutionService, SessionService,
    SessionView, StatusFilter,
};

#[derive(Parser)]
#[command(name = "plenum")]
#[command(about = "Run moderated yes/no/abstain votes over an ordered list of resolutions")]
struct Cli {
    /// Database file (defaults to the platform data directory)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a voting session from an ordered list of resolution texts
    Create {
        /// Session title shown to participants
        #[arg(long)]
        title: String,
        /// Moderator id recorded as the session owner
        #[arg(long, default_value_t = 1)]
        moderator: i64,
        /// Resolution texts, in display order
        #[arg(required = true)]
        resolutions: Vec<String>,
    },
    /// Close a session; resolutions and votes freeze as they are
    Close {
        session_id: i64,
    },
    /// List sessions
    List {
        #[arg(long, value_enum, default_value = "all")]
        status: Filter,
    },
    /// Open voting on a resolution (any other active one is demoted)
    Activate {
        resolution_id: i64,
    },
    /// End voting on a resolution
    Deactivate {
        resolution_id: i64,
    },
    /// Join a session by code and show its visible resolutions
    Join {
        code: String,
        /// Identity token; a fresh one is minted when omitted
        #[arg(long)]
        voter: Option<String>,
    },
    /// Cast or revise a vote on a resolution
    Cast {
        resolution_id: i64,
        /// yes, no or abstain
        choice: String,
        /// Identity token from a previous join
        #[arg(long)]
        voter: String,
    },
    /// Show live progress or final results for a session
    Report {
        session_id: i64,
    },
}

#[derive(Copy, Clone, ValueEnum)]
enum Filter {
    Open,
    Closed,
    All,
}

impl From<Filter> for StatusFilter {
    fn from(filter: Filter) -> Self {
        match filter {
            Filter::Open => StatusFilter::Open,
            Filter::Closed => StatusFilter::Closed,
            Filter::All => StatusFilter::All,
        }
    }
}

/// Join output: the minted (or echoed) identity plus the session view
#[derive(Serialize)]
struct JoinOutput {
    voter_identity: String,
    session: SessionView,
}

fn main() -> anyhow::Result<()> {
    // Initialize logging; diagnostics go to stderr, data to stdout
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let db = open_database(cli.db)?;

    match run(&db, cli.command) {
        Ok(()) => Ok(()),
        // Store failures carry internals; log them and keep the caller-facing
        // message opaque
        Err(e) if e.is_internal() => {
            tracing::error!(error = %e, "operation failed");
            anyhow::bail!("internal error, the operation did not complete")
        }
        Err(e) => Err(e.into()),
    }
}

fn run(db: &Database, command: Commands) -> plenum_core::Result<()> {
    match command {
        Commands::Create {
            title,
            moderator,
            resolutions,
        } => {
            let session = SessionService::new(db).create(&title, moderator, &resolutions)?;
            print_json(&session);
        }
        Commands::Close { session_id } => {
            let session = SessionService::new(db).close(session_id)?;
            print_json(&session);
        }
        Commands::List { status } => {
            let sessions = SessionService::new(db).list(status.into())?;
            print_json(&sessions);
        }
        Commands::Activate { resolution_id } => {
            let resolution = ResolutionService::new(db).activate(resolution_id)?;
            print_json(&resolution);
        }
        Commands::Deactivate { resolution_id } => {
            let resolution = ResolutionService::new(db).deactivate(resolution_id)?;
            print_json(&resolution);
        }
        Commands::Join { code, voter } => {
            let voter_identity =
                voter.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            let session = SessionService::new(db).join_by_code(&code, &voter_identity)?;
            print_json(&JoinOutput {
                voter_identity,
                session,
            });
        }
        Commands::Cast {
            resolution_id,
            choice,
            voter,
        } => {
            let choice: Choice = choice.parse()?;
            let vote = BallotService::new(db).cast(resolution_id, &voter, choice)?;
            print_json(&vote);
        }
        Commands::Report { session_id } => {
            let report = ReportService::new(db).report(session_id)?;
            print_json(&report);
        }
    }
    Ok(())
}

fn open_database(path: Option<PathBuf>) -> anyhow::Result<Database> {
    let path = match path {
        Some(path) => path,
        None => {
            let dirs = ProjectDirs::from("org", "Plenum", "plenum")
                .context("no home directory for the default database path")?;
            let data_dir = dirs.data_dir();
            fs::create_dir_all(data_dir)?;
            data_dir.join("plenum.db")
        }
    };
    Database::open(&path).context("failed to open the database")
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).expect("output values serialize")
    );
}

use std::collections::BTreeMap;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use serde::Deserialize;
use tandem::{EntriesOptions, Oid, Operation, ReplicaId, WorkTree, WorkTreeConfig};
use tandem_base::{CommitSnapshot, MemoryProvider};

mod format;
mod telemetry;

use format::OutputFormat;

/// Inspect replicated work tree state offline
///
/// Replays an operation log over base commits described by a fixture file
/// and prints the resulting tree, a file's text, or the operations a reset
/// would emit.
///
/// FIXTURE FORMAT (JSON):
///
///   {"commits": {"<40-hex oid>": {"directories": ["src"],
///                                  "files": {"src/main.rs": "fn main() {}"}}}}
///
/// OPERATION LOG: one wire-encoded operation per line (JSON).
///
/// LOGGING: set TANDEM_LOG (e.g. "debug") and TANDEM_LOG_FORMAT=json.
#[derive(Parser)]
#[command(name = "tandem")]
#[command(version, about)]
#[command(propagate_version = true)]
struct Cli {
    /// Work tree configuration file (TOML)
    #[arg(long, global = true, env = "TANDEM_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the projected tree
    Entries {
        #[command(flatten)]
        session: SessionArgs,

        /// Include removed entries
        #[arg(long)]
        show_deleted: bool,

        /// Only expand these directories (repeatable; default expands all)
        #[arg(long = "descend-into", value_name = "PATH")]
        descend_into: Vec<PathBuf>,

        /// Output format: text or json
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the text of a file
    Text {
        #[command(flatten)]
        session: SessionArgs,

        /// File to print
        #[arg(long)]
        path: PathBuf,
    },

    /// Rebase onto another commit and print the emitted operations
    Reset {
        #[command(flatten)]
        session: SessionArgs,

        /// Commit to rebase onto
        #[arg(long)]
        to: Oid,
    },
}

#[derive(Args)]
struct SessionArgs {
    /// Fixture describing base commits (JSON)
    #[arg(long)]
    fixture: PathBuf,

    /// Base commit (used when there is no operation log)
    #[arg(long)]
    base: Option<Oid>,

    /// Operation log to replay (JSON lines)
    #[arg(long)]
    ops: Option<PathBuf>,

    /// Replica id to act as (default: random)
    #[arg(long)]
    replica: Option<u64>,
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Fixture {
    commits: BTreeMap<Oid, CommitFixture>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CommitFixture {
    #[serde(default)]
    directories: Vec<PathBuf>,
    #[serde(default)]
    files: BTreeMap<PathBuf, String>,
}

fn load_provider(path: &Path) -> Result<MemoryProvider> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("could not read fixture {}", path.display()))?;
    let fixture: Fixture = serde_json::from_str(&raw)
        .with_context(|| format!("invalid fixture {}", path.display()))?;
    let mut provider = MemoryProvider::new();
    for (oid, commit) in fixture.commits {
        let mut snapshot = CommitSnapshot::new();
        for dir in &commit.directories {
            snapshot.insert_dir(dir);
        }
        for (file, text) in commit.files {
            snapshot.insert_text(&file, text);
        }
        provider.insert_commit(oid, snapshot);
    }
    Ok(provider)
}

fn load_ops(path: &Path) -> Result<Vec<Operation>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("could not read operation log {}", path.display()))?;
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            Operation::from_wire(line)
                .with_context(|| format!("{}:{}: bad operation", path.display(), n + 1))
        })
        .collect()
}

async fn open_session(
    session: &SessionArgs,
    config: WorkTreeConfig,
) -> Result<WorkTree<MemoryProvider>> {
    let provider = load_provider(&session.fixture)?;
    let ops = match &session.ops {
        Some(path) => load_ops(path)?,
        None => Vec::new(),
    };
    if ops.is_empty() && session.base.is_none() {
        bail!("either --base or a non-empty --ops log is required");
    }
    let replica = session.replica.map_or_else(ReplicaId::random, ReplicaId::new);
    let (tree, _) = WorkTree::create(replica, session.base, ops, provider, config)
        .await
        .context("could not replay session")?;
    Ok(tree)
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => WorkTreeConfig::load(path)?,
        None => WorkTreeConfig::default(),
    };
    let mut stdout = std::io::stdout().lock();

    match cli.command {
        Commands::Entries {
            session,
            show_deleted,
            descend_into,
            format,
        } => {
            let tree = open_session(&session, config).await?;
            let mut options = EntriesOptions::all().show_deleted(show_deleted);
            if !descend_into.is_empty() {
                options = options.descend_into(descend_into);
            }
            let entries = tree.entries(&options);
            match format {
                OutputFormat::Text => write!(stdout, "{}", format::entries_text(&entries))?,
                OutputFormat::Json => writeln!(stdout, "{}", format.serialize(&entries)?)?,
            }
        }
        Commands::Text { session, path } => {
            let mut tree = open_session(&session, config).await?;
            let buffer = tree.open_text_file(&path).await?;
            write!(stdout, "{}", tree.text(buffer)?)?;
        }
        Commands::Reset { session, to } => {
            let mut tree = open_session(&session, config).await?;
            for envelope in tree.reset(Some(to)).await? {
                writeln!(stdout, "{}", envelope.operation.to_wire()?)?;
            }
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    telemetry::init();
    let cli = Cli::parse();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .context("could not start runtime")?;
    runtime.block_on(run(cli))
}

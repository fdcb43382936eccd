use std::{
    io::IsTerminal,
    path::{Path, PathBuf},
    process::Command,
};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use git_remote_ipld::{
    config::PushConfig,
    git::{CatFileSource, LooseObjectSource},
    ipld::IpfsCli,
    storage::{DagStore, FileLedger, Ledger, MemoryDagStore, MemoryLedger, ObjectSource},
    ContentAddress, ObjectId, Push,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

/// Push git objects into an IPLD DAG store
#[derive(Parser)]
#[command(name = "git-remote-ipld", version)]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Upload every object reachable from a revision.
    Push(PushArgs),

    /// Print the CID a git object is stored under.
    Address {
        /// 40-character hex object id.
        id: String,
    },
}

#[derive(Args)]
struct PushArgs {
    /// Repository to read from (default: `git rev-parse --git-dir`).
    #[arg(long)]
    git_dir: Option<PathBuf>,

    /// Hash locally instead of talking to ipfs; the ledger is left untouched.
    #[arg(long)]
    dry_run: bool,

    /// Print the run summary as JSON.
    #[arg(long)]
    json: bool,

    /// Read loose objects directly instead of through `git cat-file`.
    #[arg(long)]
    loose: bool,

    /// Config file (default: ~/.config/git-remote-ipld/config.yaml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Object id or any revision git can resolve.
    rev: String,
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        CliCommand::Push(args) => handle_push(args),
        CliCommand::Address { id } => {
            let id: ObjectId = id.parse()?;
            println!("{}", ContentAddress::for_object(&id));
            Ok(())
        }
    }
}

fn handle_push(args: PushArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => {
            let mut config = PushConfig::load_from_file(path)?;
            config.apply_overrides(|name| std::env::var(name).ok())?;
            config
        }
        None => PushConfig::load()?,
    };

    let git_dir = match args.git_dir {
        Some(dir) => dir,
        None => PathBuf::from(git_output(None, &["rev-parse", "--git-dir"])?),
    };
    let root = resolve_rev(&git_dir, &args.rev)?;
    tracing::debug!("Resolved {:?} to {} in {:?}", args.rev, root, git_dir);

    let source: Box<dyn ObjectSource + Send> = if args.loose {
        Box::new(LooseObjectSource::new(&git_dir))
    } else {
        Box::new(CatFileSource::open(&git_dir)?)
    };

    let (ledger, store): (Box<dyn Ledger + Send>, Box<dyn DagStore + Send>) = if args.dry_run {
        tracing::info!("Dry run: hashing locally, nothing is uploaded or recorded");
        (Box::new(MemoryLedger::new()), Box::new(MemoryDagStore::new()))
    } else {
        let ledger_path = config.ledger_path_for(&git_dir);
        let ledger = FileLedger::open(&ledger_path)
            .with_context(|| format!("Failed to open ledger at {:?}", ledger_path))?;
        let store = IpfsCli::new(
            config.ipfs_binary.clone(),
            config.ipfs_api.clone(),
            config.cli_flavor,
        );
        (Box::new(ledger), Box::new(store))
    };

    let mut push = Push::new(source, ledger, store);
    if config.progress && std::io::stderr().is_terminal() {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("  [{bar:40.cyan/blue}] {msg}")
                .context("Failed to create progress template")?
                .progress_chars("█▓░"),
        );
        push = push.with_progress(bar);
    }

    let summary = push.spawn(root).wait()?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialize summary")?
        );
    } else {
        println!("{}", summary.root_address);
    }
    Ok(())
}

/// Resolve `rev` to an object id, asking git unless it already is one
fn resolve_rev(git_dir: &Path, rev: &str) -> Result<ObjectId> {
    if rev.len() == 40 {
        if let Ok(id) = rev.parse() {
            return Ok(id);
        }
    }
    let revision = format!("{}^{{object}}", rev);
    let resolved = git_output(Some(git_dir), &["rev-parse", "--verify", &revision])?;
    resolved
        .parse()
        .with_context(|| format!("git rev-parse returned an invalid id for {:?}", rev))
}

/// Run git and return its trimmed stdout
fn git_output(git_dir: Option<&Path>, args: &[&str]) -> Result<String> {
    let mut cmd = Command::new("git");
    if let Some(dir) = git_dir {
        cmd.arg("--git-dir").arg(dir);
    }
    let output = cmd
        .args(args)
        .output()
        .with_context(|| format!("Failed to run git {}", args.join(" ")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("git {} failed: {}", args.join(" "), stderr.trim());
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

//! `vocabsync` - inspect and maintain the progress document on this machine.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vocabsync_client::{FileBackupSink, Resolution, SyncConfig, SyncEngine, SyncError};

#[derive(Debug, Parser)]
#[command(name = "vocabsync", version, about = "Progress sync for VocabSync")]
struct Cli {
    /// Directory holding the local progress document
    #[arg(long, env = "VOCABSYNC_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Base URL of the key-value service; omit to run without a remote tier
    #[arg(long, env = "VOCABSYNC_REMOTE_URL")]
    remote_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load progress and print a summary
    Status,
    /// Print a backup code
    Export,
    /// Restore progress from a backup code
    Import { code: String },
    /// Write local and remote tiers now
    Sync,
    /// Erase progress on every tier
    Reset {
        #[arg(long)]
        yes: bool,
    },
    /// Settle a conflict with newer remote progress
    Resolve {
        #[arg(value_enum)]
        keep: Keep,
    },
    /// Write a backup code to the backups directory if one is due
    Backup {
        #[arg(long, default_value_t = 24)]
        interval_hours: u64,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Keep {
    Local,
    Remote,
}

impl From<Keep> for Resolution {
    fn from(keep: Keep) -> Self {
        match keep {
            Keep::Local => Resolution::KeepLocal,
            Keep::Remote => Resolution::AdoptRemote,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vocabsync_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = SyncConfig::from_env()?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if let Some(url) = cli.remote_url {
        config.remote_url = Some(url.trim_end_matches('/').to_string());
    }

    let engine = SyncEngine::from_config(&config)?;
    let loaded = engine.load().await;

    match cli.command {
        Command::Status => {
            let doc = &loaded.aggregate;
            println!("source:       {:?}", loaded.source);
            println!("status:       {}", engine.status());
            println!("xp:           {}", doc.xp);
            println!("streak:       {}", doc.streak);
            println!("words:        {}", doc.word_progress.len());
            println!("coins:        {}", doc.wallet.coins);
            println!("premium:      {}", engine.is_entitlement_active());
            println!("last update:  {}", doc.last_local_update);
            match doc.last_cloud_sync {
                Some(ts) => println!("last sync:    {}", ts),
                None => println!("last sync:    never"),
            }
            println!("remote:       {}", if engine.remote_supported() { "on" } else { "off" });
            if let Some(conflict) = loaded.conflict {
                println!(
                    "conflict:     remote is {}s ahead, run `vocabsync resolve local|remote`",
                    conflict.lead() / 1000
                );
            }
            if loaded.critical {
                println!("critical:     local storage unavailable, writes are suspended");
            }
        }
        Command::Export => {
            println!("{}", engine.export_code().await?);
        }
        Command::Import { code } => {
            let doc = engine.import_code(&code).await?;
            println!("imported: {} xp, {} words", doc.xp, doc.word_progress.len());
        }
        Command::Sync => {
            let report = engine.force_save().await?;
            println!("local: {:?}, remote: {:?}", report.durable, report.remote);
        }
        Command::Reset { yes } => {
            if !yes {
                return Err("refusing to erase progress without --yes".into());
            }
            engine.reset().await?;
            println!("progress reset");
            return Ok(());
        }
        Command::Resolve { keep } => match engine.resolve_conflict(keep.into()).await {
            Ok(doc) => println!("resolved: {} xp", doc.xp),
            Err(SyncError::NoConflict) => println!("nothing to resolve"),
            Err(e) => return Err(e.into()),
        },
        Command::Backup { interval_hours } => {
            let sink = FileBackupSink::new(config.backup_dir());
            let interval = Duration::from_secs(interval_hours.saturating_mul(3600));
            if engine.maybe_auto_backup(&sink, interval).await? {
                println!("backup written to {}", config.backup_dir().display());
            } else {
                println!("no backup due");
            }
        }
    }

    // Debounced writes (rollover, backup stamp) must land before exit.
    engine.flush_pending().await;
    Ok(())
}

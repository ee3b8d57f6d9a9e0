use anyhow::Result;
use clap::Parser;
use imglookup::run::{self, RunSummary};
use imglookup_core::config::{self, AppConfig};
use imglookup_core::organize::{BaseDirs, OrganizeOptions};
use imglookup_core::pipeline::Lookup;
use imglookup_core::scanner;
use imglookup_core::similarity::is_replay_document;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(name = "imglookup")]
#[command(about = "Find the source of images and tag/rename them", long_about = None)]
struct Cli {
    /// Image file or directory to process
    path: Option<PathBuf>,

    /// Path to config TOML
    #[arg(short, long)]
    config: Option<String>,

    /// Only write the tag sidecar, keep original file names
    #[arg(short, long)]
    no_rename: bool,

    /// Store raw service responses as debug-<service>.json
    #[arg(short = 's', long)]
    store_json: bool,

    /// Copy organized images into this directory instead of renaming in place
    #[arg(short, long)]
    base_dir: Option<PathBuf>,

    /// Use a stored SauceNAO response instead of searching
    #[arg(long, value_name = "FILE")]
    saucenao: Option<PathBuf>,

    /// Use a stored e621 post instead of fetching tags
    #[arg(long, value_name = "FILE")]
    e621: Option<PathBuf>,

    /// Debug output
    #[arg(short, long)]
    verbose: bool,

    /// Output JSON summary
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn apply_overrides(&self, cfg: &mut AppConfig) {
        if self.no_rename {
            cfg.output.no_rename = true;
        }
        if self.store_json {
            cfg.output.store_raw = true;
        }
        if self.verbose {
            cfg.output.verbose = true;
        }
        if let Some(dir) = &self.base_dir {
            cfg.output.base_dir = Some(dir.clone());
        }
        if let Some(replay) = &self.saucenao {
            cfg.saucenao.replay = Some(replay.clone());
        }
        if let Some(replay) = &self.e621 {
            cfg.e621.replay = Some(replay.clone());
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut cfg = config::load(cli.config.as_deref())?;
    cli.apply_overrides(&mut cfg);

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if cfg.output.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        })
        .without_time()
        .init();

    let (root, inputs) = match (&cli.path, &cfg.saucenao.replay) {
        (Some(path), replay) => {
            if replay.is_some() {
                warn!("input path given, ignoring the configured saucenao replay");
            }
            (path.clone(), scanner::collect_images(path, &cfg.scan)?)
        }
        (None, Some(replay)) => (replay.clone(), vec![replay.clone()]),
        (None, None) => anyhow::bail!("nothing to do: pass an image path or --saucenao FILE"),
    };
    info!("{} image(s) to look up under {}", inputs.len(), root.display());

    let live_search = inputs.iter().any(|p| !is_replay_document(p));
    cfg.require_credentials(live_search)?;

    let opts = OrganizeOptions {
        base: BaseDirs::discover(&root, cfg.output.base_dir.clone()),
        no_rename: cfg.output.no_rename,
    };
    let lookup = Lookup::from_config(&cfg)?;

    let interrupted = Arc::new(AtomicBool::new(false));
    let abort = Arc::new(Notify::new());
    spawn_interrupt_listener(interrupted.clone(), abort.clone());

    match run::run_until_aborted(&lookup, &inputs, &opts, &interrupted, &abort).await? {
        Some(summary) => print_summary(&summary, cli.json),
        None => {
            warn!("aborted");
            std::process::exit(130);
        }
    }
}

/// First Ctrl-C stops after the current image, a second one abandons the
/// current lookup.
fn spawn_interrupt_listener(flag: Arc<AtomicBool>, abort: Arc<Notify>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("interrupt received, finishing the current image (press again to abort)");
        flag.store(true, Ordering::SeqCst);
        if tokio::signal::ctrl_c().await.is_ok() {
            abort.notify_one();
        }
    });
}

fn print_summary(summary: &RunSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
    } else {
        println!(
            "scanned {}, organized {}, skipped {}, failed {}{}",
            summary.scanned,
            summary.organized,
            summary.skipped,
            summary.failed,
            if summary.interrupted {
                " (interrupted)"
            } else {
                ""
            }
        );
    }
    Ok(())
}

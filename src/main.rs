//! `deck-capture` command line.

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use deck_capture::driver::Browser;
use deck_capture::transport::PendingServer;
use deck_capture::{
    CaptureConfig, CaptureOrchestrator, Collaborators, DownloadSink, FileSink, FileStore,
    Launcher, PdfEncoder, ProgressStore, RunOutcome, Tab,
};

// ============================================================================
// Arguments
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "deck-capture", version, about = "Capture a slide viewer into a PDF")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Capture the presentation open in the bridge tab.
    Capture(CaptureArgs),
    /// Print the saved session, if any.
    Status(StateArgs),
    /// Delete saved progress.
    Clear(StateArgs),
}

#[derive(Debug, Args)]
struct StateArgs {
    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory of saved progress.
    #[arg(long)]
    state_dir: Option<PathBuf>,

    /// Verbose logging.
    #[arg(long)]
    debug: bool,
}

#[derive(Debug, Args)]
struct CaptureArgs {
    #[command(flatten)]
    state: StateArgs,

    /// Start Firefox instead of waiting for a running bridge.
    #[arg(long)]
    launch: bool,

    /// Firefox executable (with --launch).
    #[arg(long)]
    firefox: Option<PathBuf>,

    /// Bridge extension directory or .xpi (with --launch).
    #[arg(long)]
    extension: Option<PathBuf>,

    /// Existing Firefox profile to reuse (with --launch).
    #[arg(long)]
    profile: Option<PathBuf>,

    /// Run the launched Firefox headless.
    #[arg(long, requires = "launch")]
    headless: bool,

    /// Port the running bridge connects to.
    #[arg(long, default_value_t = 9515, conflicts_with = "launch")]
    port: u16,

    /// Seconds to wait for the bridge to connect.
    #[arg(long, default_value_t = 300)]
    connect_timeout: u64,

    /// Directory the PDF is written to.
    #[arg(long, short, default_value = ".")]
    output: PathBuf,

    /// Deliver the PDF as a browser download instead of writing it.
    #[arg(long)]
    browser_download: bool,

    /// Reload the page first and resume once it is back.
    #[arg(long)]
    reload: bool,

    /// PDF image compression level, 0 (store) to 10.
    #[arg(long, default_value_t = 6, value_parser = clap::value_parser!(u8).range(0..=10))]
    compression: u8,
}

// ============================================================================
// Entry
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Capture(args) => capture(args).await,
        Command::Status(args) => status(args).await,
        Command::Clear(args) => clear(args).await,
    }
}

fn init_logging(debug: bool) {
    let default = if debug {
        "deck_capture=debug"
    } else {
        "deck_capture=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(args: &StateArgs) -> anyhow::Result<CaptureConfig> {
    let mut config = match &args.config {
        Some(path) => CaptureConfig::from_toml_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => CaptureConfig::default(),
    };
    if let Some(dir) = &args.state_dir {
        config.storage.state_dir = Some(dir.clone());
    }
    Ok(config)
}

fn open_progress(config: &CaptureConfig) -> anyhow::Result<ProgressStore> {
    let dir = config.storage.resolved_state_dir();
    let store = FileStore::open(&dir)
        .with_context(|| format!("opening state directory {}", dir.display()))?;
    Ok(ProgressStore::new(Arc::new(store), &config.storage))
}

// ============================================================================
// Commands
// ============================================================================

async fn status(args: StateArgs) -> anyhow::Result<()> {
    init_logging(args.debug);
    let config = load_config(&args)?;
    let progress = open_progress(&config)?;

    match progress.summary().await? {
        Some(summary) => println!("{}", serde_json::to_string_pretty(&summary)?),
        None => println!("No saved session"),
    }
    if let Some(url) = progress.peek_auto_start().await? {
        println!("Auto-start armed for {url}");
    }
    Ok(())
}

async fn clear(args: StateArgs) -> anyhow::Result<()> {
    init_logging(args.debug);
    let config = load_config(&args)?;
    open_progress(&config)?.clear().await?;
    println!("Saved progress cleared");
    Ok(())
}

async fn capture(args: CaptureArgs) -> anyhow::Result<()> {
    init_logging(args.state.debug);
    let config = load_config(&args.state)?;
    let connect_timeout = Duration::from_secs(args.connect_timeout);

    // Keeps a launched Firefox alive for the whole run.
    let mut launched: Option<Browser> = None;
    let tab = if args.launch {
        let (Some(firefox), Some(extension)) = (&args.firefox, &args.extension) else {
            bail!("--launch needs --firefox and --extension");
        };
        let mut builder = Launcher::builder()
            .binary(firefox)
            .extension(extension)
            .connect_timeout(connect_timeout);
        if let Some(profile) = &args.profile {
            builder = builder.profile(profile);
        }
        if args.headless {
            builder = builder.headless();
        }
        let browser = builder.build()?.launch().await.context("launching Firefox")?;
        let tab = browser.tab().clone();
        launched = Some(browser);
        tab
    } else {
        let server = PendingServer::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), args.port)
            .await
            .with_context(|| format!("binding port {}", args.port))?;
        info!(url = %server.ws_url(), "Waiting for bridge");
        let (connection, ready) = server
            .accept_within(connect_timeout)
            .await
            .context("waiting for bridge")?;
        Tab::with_timeouts(
            connection,
            ready,
            Duration::from_secs(30),
            config.timings.download_grace(),
        )
    };

    let tab = Arc::new(tab);
    let sink: Arc<dyn DownloadSink> = if args.browser_download {
        tab.clone() as Arc<dyn DownloadSink>
    } else {
        Arc::new(FileSink::new(&args.output))
    };
    let state_dir = config.storage.resolved_state_dir();
    let store = FileStore::open(&state_dir)
        .with_context(|| format!("opening state directory {}", state_dir.display()))?;

    let orchestrator = CaptureOrchestrator::new(
        Collaborators {
            page: tab.clone(),
            screenshots: tab.clone(),
            store: Arc::new(store),
            encoder: Arc::new(PdfEncoder::new().with_compression(args.compression)),
            sink,
        },
        config,
    );

    orchestrator.hub().on_event(Box::new(|event| {
        if let Ok(line) = serde_json::to_string(event) {
            println!("{line}");
        }
    }));

    let mut handle = if args.reload {
        let url = tab.get_url().await?;
        orchestrator.arm_auto_start(&url).await?;
        tab.reload().await?;
        match orchestrator.check_auto_start().await? {
            Some(handle) => handle,
            None => {
                let location = tab.get_url().await.unwrap_or_default();
                if let Some(browser) = launched {
                    browser.close().await;
                }
                bail!("auto-start declined after reload at {location}: viewer not ready");
            }
        }
    } else {
        orchestrator.start()
    };

    let outcome = tokio::select! {
        outcome = &mut handle => outcome?,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, pausing after the current page");
            orchestrator.stop();
            handle.await?
        }
    };

    if let Some(browser) = launched {
        browser.close().await;
    }

    match outcome {
        RunOutcome::Completed(delivery) => {
            match &delivery.path {
                Some(path) => println!("Saved {}", path.display()),
                None => println!("Downloaded {}", delivery.filename),
            }
            Ok(())
        }
        RunOutcome::Stopped => {
            println!("Paused; run again to resume");
            Ok(())
        }
        RunOutcome::AlreadyRunning => bail!("a capture is already running"),
        RunOutcome::Failed(failure) => bail!("page {}: {}", failure.page, failure.message),
    }
}

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use debrid_relay::config::{Config, LogConfig};
use debrid_relay::dispatch::story::ENTRY_STEP;
use debrid_relay::dispatch::{DispatchStory, Event, Story};
use debrid_relay::feed::FeedWatcher;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

const CLI_ORIGIN: &str = "cli";

#[derive(Parser)]
#[command(name = "debrid-relay")]
#[command(about = "Debrid links and hand them to a download agent")]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.config/debrid-relay/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a URI to the debrider and print the debrided URI
    #[command(alias = "de")]
    Debrid { uri: String },

    /// Send a URI to the downloader
    #[command(alias = "do")]
    Download { uri: String },

    /// Debrid a URI when possible, then download it
    #[command(alias = "dedo")]
    DebridDownload { uri: String },

    /// Watch the configured feeds and dispatch every new link
    #[command(alias = "fw")]
    FeedWatcher {
        /// Stop after this many scans (0 = run until Ctrl-C)
        #[arg(long, default_value_t = 0)]
        max_runs: u64,
    },

    /// Serve the link submission page
    #[command(alias = "ws")]
    Webserver,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::from(1);
        }
    };
    init_tracing(&config.log);

    let outcome = match cli.command {
        Commands::Debrid { uri } => {
            let story = DispatchStory::new(&config).enable_debrider();
            dispatch(&story, &uri).await.map(|event| println!("{}", event.value))
        }
        Commands::Download { uri } => {
            let story = DispatchStory::new(&config)
                .enable_downloader()
                .with_notifier(|event| {
                    tracing::info!(id = %event.value, "URI sent to downloader");
                    Ok(())
                });
            dispatch(&story, &uri).await.map(|_| ())
        }
        Commands::DebridDownload { uri } => {
            let story = DispatchStory::new(&config)
                .enable_debrider()
                .enable_downloader()
                .with_notifier(|event| {
                    tracing::info!(id = %event.value, "download started");
                    Ok(())
                });
            dispatch(&story, &uri).await.map(|_| ())
        }
        Commands::FeedWatcher { max_runs } => match watch_feeds(&config, max_runs).await {
            Ok(summary) => {
                println!("{}", summary);
                Ok(())
            }
            Err(e) => {
                eprintln!("Error: {:#}", e);
                return ExitCode::from(1);
            }
        },
        Commands::Webserver => {
            if let Err(e) = debrid_relay::webserver::run_server(&config).await {
                eprintln!("Error: {:#}", e);
                return ExitCode::from(1);
            }
            Ok(())
        }
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    let path = match path {
        Some(path) => path,
        None => Config::default_path()?,
    };
    Config::load(&path)
}

/// `RUST_LOG` takes precedence over the configured level.
fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("debrid_relay={}", log.level)));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if log.format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Play the story once for `uri` and return the final event.
async fn dispatch(story: &DispatchStory, uri: &str) -> Result<Event> {
    let mut scenario = story.scenario();
    scenario.set_initial_step(ENTRY_STEP)?;

    let mut event = Event::new(CLI_ORIGIN, uri);
    scenario.play(&mut event).await;

    if let Some(err) = scenario.run_error() {
        anyhow::bail!("{}", err);
    }
    Ok(event)
}

async fn watch_feeds(config: &Config, max_runs: u64) -> Result<String> {
    let scenario = DispatchStory::new(config)
        .enable_debrider()
        .enable_downloader()
        .with_notifier(|event| {
            tracing::info!(id = %event.value, "download started");
            Ok(())
        })
        .scenario();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Ctrl-C received, stopping the feed watcher");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot listen for Ctrl-C");
                // Dropping the sender would stop the watcher.
                std::future::pending::<()>().await;
            }
        }
    });

    let interval = Duration::from_secs(config.feed_watcher.watch_interval * 60);
    let mut watcher = FeedWatcher::new(interval)?
        .with_feeds(config.remote_feeds())
        .with_since(Utc::now())
        .with_scenario(scenario)
        .with_shutdown(shutdown_rx);

    Ok(watcher.run(max_runs).await?)
}

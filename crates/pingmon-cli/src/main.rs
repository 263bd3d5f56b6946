use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use pingmon_core::{
    AlertCoordinator, ChatNotifier, IcmpProbeClient, MonitorConfig, MonitorState, ProbeClient,
    ProjectFile, SubscriberFeed, TargetRegistry, Thresholds, TracingAlertSound, WebexNotifier,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod server;

#[derive(Debug, Parser)]
#[command(name = "pingmond")]
#[command(about = "Host reachability monitor with a live web dashboard feed")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(long, default_value_t = 1000)]
    interval_ms: u64,

    #[arg(long, default_value_t = 2000)]
    timeout_ms: u64,

    #[arg(long, default_value_t = 2000)]
    warning_ms: u64,

    #[arg(long, default_value_t = 0)]
    sound_warning_count: u32,

    #[arg(long, default_value_t = 5)]
    sound_timeout_count: u32,

    #[arg(long, default_value_t = 0)]
    chat_warning_count: u32,

    #[arg(long, default_value_t = 0)]
    chat_timeout_count: u32,

    #[arg(long)]
    bot_token: Option<String>,

    #[arg(long)]
    bot_room: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Monitor the project's targets and serve the dashboard feed
    Run {
        #[arg(long)]
        project: Option<PathBuf>,

        #[arg(long, default_value = "127.0.0.1:8880")]
        listen: SocketAddr,

        /// Subnets allowed to use the web interface, comma separated
        #[arg(long, default_value = "127.0.0.0/8")]
        allow: String,

        /// Play the looping audio cue while any target is alerting
        #[arg(long, default_value_t = false)]
        audio_alerts: bool,

        /// Extra checks as name=address pairs, applied after the project file
        #[arg(long = "target")]
        targets: Vec<String>,
    },
    /// Probe an address once and print the classified outcome
    Check {
        address: IpAddr,

        #[arg(long, value_enum, default_value = "human")]
        format: OutputFormat,
    },
    /// List chat rooms the configured bot can post to
    Rooms,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Human,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    let thresholds = Thresholds {
        warning_ms: cli.warning_ms,
        timeout_ms: cli.timeout_ms,
        sound_warning_count: cli.sound_warning_count,
        sound_timeout_count: cli.sound_timeout_count,
        chat_warning_count: cli.chat_warning_count,
        chat_timeout_count: cli.chat_timeout_count,
        ..Thresholds::default()
    };

    match cli.command {
        Command::Run {
            project,
            listen,
            allow,
            audio_alerts,
            targets,
        } => {
            let config = MonitorConfig {
                probe_interval: Duration::from_millis(cli.interval_ms),
                thresholds: Thresholds {
                    notification_enabled: audio_alerts,
                    ..thresholds
                },
                ..MonitorConfig::default()
            };
            run(config, project, listen, &allow, &targets, cli.bot_token, cli.bot_room).await
        }
        Command::Check { address, format } => check(address, thresholds, format).await,
        Command::Rooms => rooms(cli.bot_token).await,
    }
}

async fn run(
    config: MonitorConfig,
    project: Option<PathBuf>,
    listen: SocketAddr,
    allow: &str,
    targets: &[String],
    bot_token: Option<String>,
    bot_room: Option<String>,
) -> Result<()> {
    let allowed = server::parse_allow_list(allow)?;

    let probe: Arc<dyn ProbeClient> =
        Arc::new(IcmpProbeClient::new().context("unable to open icmp sockets")?);
    let feed = Arc::new(SubscriberFeed::new(config.feed_capacity));
    let registry = Arc::new(TargetRegistry::new(probe, &config, Arc::clone(&feed)));

    if let Some(path) = &project {
        match load_project(path) {
            Ok(file) => {
                registry.restore(&file).await;
                info!(path = %path.display(), targets = registry.len(), "project restored");
            }
            Err(err) => warn!(error = %err, "starting with an empty project"),
        }
    }

    for spec in targets {
        let (name, address) = parse_target(spec)?;
        if let Err(err) = registry.create(name, address, false) {
            warn!(%address, error = %err, "skipping --target entry");
        }
    }

    let coordinator = AlertCoordinator::new(
        Arc::clone(&registry),
        Arc::new(TracingAlertSound),
        chat_notifier(bot_token, bot_room),
        config.sweep_interval,
    );
    tokio::spawn(coordinator.run());

    let state = Arc::new(server::AppState {
        registry: Arc::clone(&registry),
        feed,
        allowed,
        project_path: project.clone(),
    });
    tokio::spawn(async move {
        if let Err(err) = server::serve(listen, state).await {
            error!(error = %err, "web server failed");
        }
    });

    tokio::signal::ctrl_c().await?;
    warn!("received ctrl-c, stopping");

    if let Some(path) = &project {
        match save_project(path, &registry.snapshot()) {
            Ok(()) => info!(path = %path.display(), "project saved"),
            Err(err) => warn!(error = %err, "unable to save project"),
        }
    }
    registry.clear_all().await;

    Ok(())
}

async fn check(address: IpAddr, thresholds: Thresholds, format: OutputFormat) -> Result<()> {
    let probe = IcmpProbeClient::new().context("unable to open icmp sockets")?;
    let result = probe
        .probe(address, Duration::from_millis(thresholds.timeout_ms))
        .await?;

    let mut state = MonitorState::new();
    let line = state.apply(address, &result, &thresholds);

    match format {
        OutputFormat::Human => {
            println!("{line}");
        }
        OutputFormat::Json => {
            let out = serde_json::json!({
                "address": address,
                "colour": state.colour(),
                "message": line,
                "result": result,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }

    Ok(())
}

async fn rooms(bot_token: Option<String>) -> Result<()> {
    let token = bot_token.context("--bot-token is required to list rooms")?;
    let bot = WebexNotifier::new(token, String::new());
    let rooms = bot.list_rooms().await.context("unable to query chat rooms")?;

    if rooms.is_empty() {
        println!("no group rooms are visible to this bot");
    }
    for room in rooms {
        println!("{}  {}", room.id, room.title);
    }

    Ok(())
}

fn chat_notifier(token: Option<String>, room: Option<String>) -> Option<Arc<dyn ChatNotifier>> {
    match (token, room) {
        (Some(token), Some(room)) => Some(Arc::new(WebexNotifier::new(token, room))),
        (None, None) => None,
        _ => {
            warn!("chat alerts need both --bot-token and --bot-room; disabled");
            None
        }
    }
}

fn parse_target(spec: &str) -> Result<(&str, IpAddr)> {
    let (name, address) = spec
        .split_once('=')
        .with_context(|| format!("expected name=address in --target '{spec}'"))?;
    let name = name.trim();
    anyhow::ensure!(!name.is_empty(), "empty name in --target '{spec}'");
    let address = address
        .trim()
        .parse()
        .with_context(|| format!("invalid address in --target '{spec}'"))?;
    Ok((name, address))
}

pub(crate) fn load_project(path: &Path) -> Result<ProjectFile> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("unable to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("unable to parse {}", path.display()))
}

pub(crate) fn save_project(path: &Path, project: &ProjectFile) -> Result<()> {
    let text = serde_json::to_string_pretty(project).context("unable to encode project")?;
    std::fs::write(path, text).with_context(|| format!("unable to write {}", path.display()))
}

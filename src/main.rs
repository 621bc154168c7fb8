use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use statuswatch::config::Config;
use statuswatch::consumers::WebhookConfig;
use statuswatch::metrics;
use statuswatch::monitor::{MonitorReport, StatusMonitor};
use statuswatch::providers::OpenAIProvider;

#[derive(Parser)]
#[command(
    name = "statuswatch",
    version,
    about = "Poll third-party status pages and fan new incidents out to consumers",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json); overrides the configured format
    #[arg(long, global = true)]
    log_format: Option<String>,

    /// TOML configuration file (defaults to STATUSWATCH_* environment variables)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll providers until interrupted with Ctrl-C
    Run {
        /// Maximum number of provider fetches in flight
        #[arg(long)]
        concurrency: Option<usize>,

        /// Bound each consumer queue to this many events
        #[arg(long)]
        queue_capacity: Option<usize>,

        /// Do not print events to stdout
        #[arg(long, default_value = "false")]
        no_console: bool,

        /// Forward events to this webhook URL (repeatable)
        #[arg(long = "webhook")]
        webhooks: Vec<String>,

        /// Override the OpenAI status feed location
        #[arg(long)]
        openai_feed_url: Option<String>,

        /// Print Prometheus metrics after shutdown
        #[arg(long, default_value = "false")]
        print_metrics: bool,
    },

    /// Validate configuration and print the effective settings
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }

    // Initialize tracing/logging
    setup_tracing(&config.logging.format, &config.logging.level, cli.verbose)?;

    match cli.command {
        Commands::Run {
            concurrency,
            queue_capacity,
            no_console,
            webhooks,
            openai_feed_url,
            print_metrics,
        } => {
            if let Some(limit) = concurrency {
                config.scheduler.concurrency_limit = limit;
            }
            if queue_capacity.is_some() {
                config.bus.queue_capacity = queue_capacity;
            }
            if no_console {
                config.consumers.console = false;
            }
            config
                .consumers
                .webhooks
                .extend(webhooks.into_iter().map(WebhookConfig::new));

            tracing::info!(
                concurrency_limit = config.scheduler.concurrency_limit,
                queue_capacity = ?config.bus.queue_capacity,
                webhooks = config.consumers.webhooks.len(),
                "Starting run command"
            );

            let report = run(config, openai_feed_url).await?;
            print_report(&report);

            if print_metrics {
                let text = metrics::encode_metrics()
                    .map_err(|e| anyhow::anyhow!("Failed to encode metrics: {e}"))?;
                println!("{text}");
            }
        }

        Commands::Check => {
            check(&config)?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path),
        None => Config::from_env().context("Failed to load configuration from environment"),
    }
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let default_directive = if verbose {
        "statuswatch=debug,info".to_string()
    } else {
        format!("statuswatch={level},warn")
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&default_directive))
        .with_context(|| format!("Invalid log filter: {default_directive}"))?;

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}

async fn run(config: Config, openai_feed_url: Option<String>) -> Result<MonitorReport> {
    config.validate().context("Invalid configuration")?;

    if let Err(e) = metrics::init_metrics() {
        tracing::warn!("Metrics initialization failed: {}", e);
    }

    // One connection pool shared by every provider
    let client = reqwest::Client::builder()
        .timeout(config.request_timeout())
        .user_agent(config.http.user_agent.clone())
        .gzip(true)
        .build()
        .context("Failed to build HTTP client")?;

    let mut monitor = StatusMonitor::new(config);

    let provider = match openai_feed_url {
        Some(url) => OpenAIProvider::with_feed_url(client, url),
        None => OpenAIProvider::new(client),
    };
    monitor.register_provider(provider)?;
    monitor
        .add_configured_consumers()
        .context("Failed to set up consumers")?;

    let report = monitor
        .run_until(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => tracing::info!("Ctrl-C received, shutting down"),
                Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl-C"),
            }
        })
        .await?;

    Ok(report)
}

fn check(config: &Config) -> Result<()> {
    config.validate().context("Invalid configuration")?;

    let rendered = toml::to_string_pretty(config).context("Failed to render configuration")?;
    println!("Configuration OK\n");
    println!("{rendered}");
    Ok(())
}

fn print_report(report: &MonitorReport) {
    println!("\nstatuswatch stopped");
    println!("  Events published: {}", report.events_published);
    println!("  Deliveries:       {}", report.deliveries);
    println!("  Unique events:    {}", report.unique_events);

    for worker in &report.workers {
        println!(
            "  [{}] cycles={} fetched={} published={} duplicates={} faults={}",
            worker.provider,
            worker.cycles,
            worker.events_fetched,
            worker.events_published,
            worker.duplicates,
            worker.fetch_faults
        );
    }

    for consumer in &report.consumers {
        println!(
            "  <{}> received={} processed={} failures={}",
            consumer.consumer, consumer.received, consumer.processed, consumer.failures
        );
    }
}

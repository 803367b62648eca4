use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use teloxide::Bot;
use tracing_subscriber::EnvFilter;

use wrenhive_channels::{TelegramBot, TelegramSender};
use wrenhive_core::handlers::default_registry;
use wrenhive_core::{Config, HandlerContext, Router};
use wrenhive_dispatch::{DispatchConfig, ReminderDispatcher};
use wrenhive_schema::OutboundSender;
use wrenhive_store::{AdminStore, SqliteStore};

#[derive(Parser)]
#[command(name = "wrenhive", version, about = "Admin chat bot and reminder dispatcher")]
struct Cli {
    #[arg(long, default_value = "wrenhive.yaml", help = "Path to the config file")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Run the bot and the periodic reminder dispatcher")]
    Start,
    #[command(about = "Run one dispatch cycle over the currently-due set")]
    Dispatch,
    #[command(about = "Validate the config file")]
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate => {
            Config::load(&cli.config)?;
            println!("config OK");
            Ok(())
        }
        Commands::Dispatch => {
            let config = Config::load(&cli.config)?;
            let store = open_store(&config).await?;
            let sender = telegram_sender(&config);
            let dispatcher = build_dispatcher(&config, store, sender);

            let report = dispatcher.run_cycle().await?;
            println!(
                "due={} recipients={} batches={} sent={} failed={} skipped={}",
                report.due, report.recipients, report.batches, report.sent, report.failed,
                report.skipped
            );
            Ok(())
        }
        Commands::Start => {
            let config = Config::load(&cli.config)?;
            let store = open_store(&config).await?;
            let sender = telegram_sender(&config);

            let router = Arc::new(Router::new(
                default_registry(),
                build_context(&config, store.clone(), sender.clone())?,
            ));
            let bot = TelegramBot::new(config.telegram.token.clone(), router);
            let dispatcher = build_dispatcher(&config, store, sender);
            let interval = Duration::from_secs(config.dispatch.interval_minutes * 60);

            tracing::info!(
                timezone = %config.timezone,
                interval_minutes = config.dispatch.interval_minutes,
                "starting wrenhive"
            );
            tokio::select! {
                result = bot.run() => result,
                _ = dispatcher.run(interval) => Ok(()),
            }
        }
    }
}

async fn open_store(config: &Config) -> Result<Arc<SqliteStore>> {
    let store = Arc::new(SqliteStore::open(&config.data_dir.join("wrenhive.db"))?);
    for admin in &config.admin.seed_admins {
        store.add_admin(admin, "seeded from config").await?;
    }
    Ok(store)
}

fn telegram_sender(config: &Config) -> Arc<dyn OutboundSender> {
    Arc::new(TelegramSender::new(Bot::new(&config.telegram.token)))
}

fn build_context(
    config: &Config,
    store: Arc<SqliteStore>,
    sender: Arc<dyn OutboundSender>,
) -> Result<HandlerContext> {
    Ok(HandlerContext {
        sender,
        reminders: store.clone(),
        parents: store.clone(),
        leads: store.clone(),
        admins: store,
        tz: config.tz()?,
        bootstrap_code: config.admin.bootstrap_code.clone(),
        max_attempts: config.dispatch.max_attempts,
        confirmation_sticker: config.confirmation_sticker.clone(),
    })
}

fn build_dispatcher(
    config: &Config,
    store: Arc<SqliteStore>,
    sender: Arc<dyn OutboundSender>,
) -> ReminderDispatcher {
    ReminderDispatcher::new(
        store,
        sender,
        DispatchConfig {
            lookahead_minutes: config.dispatch.lookahead_minutes,
            batch_size: config.dispatch.batch_size,
            cooldown: Duration::from_secs(config.dispatch.cooldown_secs),
        },
    )
}

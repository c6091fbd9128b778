use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use core_logic::setup_logger;
use dialoguer::{theme::ColorfulTheme, Password};
use dotenv::dotenv;
use layeredge_project::bot::{
    session, FanoutNotifier, Language, LogNotifier, Notifier, SessionContext, Storage,
    TelegramConfig, TelegramNotifier,
};
use layeredge_project::client::ClientSettings;
use layeredge_project::proxy_pool::PoolSettings;
use layeredge_project::{
    AccountRunner, HttpLivenessProbe, HttpSessionFactory, LayerEdgeConfig, ProxyPoolManager,
    ProxyScrapeSource,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to config.toml
    #[arg(short, long, default_value = "config/config.toml")]
    config: String,

    /// Show debug output on the console
    #[arg(short, long)]
    verbose: bool,

    /// Session language tag (en, fa); messages are rendered in English
    #[arg(long, default_value = "en")]
    lang: Language,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run every stored wallet through its proxy group
    Run,
    /// Fetch and probe fresh proxies for the stored wallets
    LoadProxies,
    /// Store a private key (prompted when omitted)
    AddKey { key: Option<String> },
    /// Generate a wallet, store it and run it once
    NewWallet,
    /// Show the last stored points
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();

    // Auto-detect config path if default is not found
    let config_path = if std::path::Path::new(&args.config).exists() {
        args.config.clone()
    } else if args.config == "config/config.toml"
        && std::path::Path::new("chains/layeredge/config/config.toml").exists()
    {
        "chains/layeredge/config/config.toml".to_string()
    } else {
        args.config.clone()
    };

    let mut config = LayerEdgeConfig::load_or_default(&config_path)?;
    config.apply_env_overrides();

    let _log_guard = setup_logger(&config.log_dir, args.verbose);

    let notifier = build_notifier(&config);
    let mut ctx = SessionContext::new(
        config.telegram.as_ref().map(|t| t.chat_id.clone()),
        notifier,
    );
    ctx.language = args.lang;
    let storage = Storage::from_settings(&config.storage);

    match args.command {
        Commands::Run => {
            config.validate().context("Invalid configuration")?;
            let runner = build_runner(&config);
            if let Some(report) = session::run(&ctx, &storage, &runner).await? {
                info!(
                    "Saved {} results to {}",
                    report.results.len(),
                    storage.results_path().display()
                );
            }
        }
        Commands::LoadProxies => {
            let source = ProxyScrapeSource::new(&config.proxy.source_url)?;
            let probe = HttpLivenessProbe::new(
                &config.proxy.liveness_url,
                Duration::from_secs(config.proxy.liveness_timeout_secs),
            );
            let pool = ProxyPoolManager::new(source, probe, PoolSettings::from(&config.proxy));
            if let Err(e) = session::load_proxies(&ctx, &storage, &pool).await {
                error!("Proxy refresh failed: {:#}", e);
            }
        }
        Commands::AddKey { key } => {
            let key = match key {
                Some(k) => k,
                None => Password::with_theme(&ColorfulTheme::default())
                    .with_prompt("Enter private key")
                    .allow_empty_password(true)
                    .interact()
                    .context("Failed to read private key")?,
            };
            session::add_private_key(&ctx, &storage, &key).await;
        }
        Commands::NewWallet => {
            config.validate().context("Invalid configuration")?;
            let runner = build_runner(&config);
            session::create_wallet_and_run(&ctx, &storage, &runner).await?;
        }
        Commands::Info => {
            session::show_info(&ctx, &storage).await;
        }
    }

    Ok(())
}

fn build_notifier(config: &LayerEdgeConfig) -> Arc<dyn Notifier> {
    let mut targets: Vec<Arc<dyn Notifier>> = vec![Arc::new(LogNotifier)];
    if let Some(telegram) = &config.telegram {
        info!("Forwarding progress to Telegram chat {}", telegram.chat_id);
        targets.push(Arc::new(TelegramNotifier::new(TelegramConfig::new(
            &telegram.bot_token,
            &telegram.chat_id,
        ))));
    }
    Arc::new(FanoutNotifier::new(targets))
}

fn build_runner(config: &LayerEdgeConfig) -> AccountRunner<HttpSessionFactory> {
    let factory = HttpSessionFactory::new(ClientSettings::from_config(config));
    AccountRunner::new(factory, config.step_delay())
}

// This is the entry point of the bucket summarizer bot.
//
// **Architecture Overview:**
// - `core/` = Business logic (platform-agnostic)
// - `infra/` = Implementations of core traits (Cloud Storage, Gemini, sessions)
// - `discord/` = Discord-specific adapters (the `/summarizer` commands)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Set up the Discord framework
// 4. Register commands

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with several mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "discord/discord_layer.rs"]
mod discord;
#[path = "infra/infra_layer.rs"]
mod infra;

use crate::core::session::SessionService;
use crate::core::summaries::SummaryService;
use crate::discord::commands::presence;
use crate::discord::{Data, Error};
use crate::infra::ai::gemini_client::DEFAULT_MODEL;
use crate::infra::ai::GeminiClient;
use crate::infra::session::InMemorySessionStore;
use crate::infra::storage::GcsClient;
use anyhow::Context as _;
use poise::serenity_prelude as serenity;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const DEFAULT_WORK_DIR: &str = "data/work";

/// Everything read from the environment at startup.
struct Settings {
    discord_token: String,
    gemini_model: String,
    default_api_key: Option<String>,
    work_dir: PathBuf,
    storage_emulator_host: Option<String>,
    dev_guild_id: Option<u64>,
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn load_settings() -> anyhow::Result<Settings> {
    let discord_token = non_empty_var("DISCORD_TOKEN").context(
        "Missing DISCORD_TOKEN environment variable! Create a .env file with your bot token.",
    )?;

    let dev_guild_id = non_empty_var("SUMMARIZER_GUILD_ID")
        .map(|v| v.parse::<u64>())
        .transpose()
        .context("SUMMARIZER_GUILD_ID must be a numeric guild id")?;

    Ok(Settings {
        discord_token,
        gemini_model: non_empty_var("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        default_api_key: non_empty_var("GEMINI_API_KEY"),
        work_dir: non_empty_var("SUMMARIZER_WORK_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_WORK_DIR)),
        storage_emulator_host: non_empty_var("STORAGE_EMULATOR_HOST"),
        dev_guild_id,
    })
}

/// Removes key files and download directories left behind by a previous run
/// that did not shut down cleanly.
fn clear_stale_work_files(work_dir: &Path) -> std::io::Result<usize> {
    let mut removed = 0;

    for entry in std::fs::read_dir(work_dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        let path = entry.path();

        if name.starts_with("download-") && path.is_dir() {
            std::fs::remove_dir_all(&path)?;
            removed += 1;
        } else if name.starts_with("credentials-") && name.ends_with(".json") {
            std::fs::remove_file(&path)?;
            removed += 1;
        }
    }

    Ok(removed)
}

/// Logs framework errors before handing them to poise's default handler.
async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    if let poise::FrameworkError::Command { error, ctx, .. } = &error {
        tracing::error!(
            command = %ctx.command().qualified_name,
            "Command failed: {}",
            error
        );
    }

    if let Err(e) = poise::builtins::on_error(error).await {
        tracing::error!("Error while handling error: {}", e);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt::init();

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    let settings = load_settings()?;

    std::fs::create_dir_all(&settings.work_dir).with_context(|| {
        format!(
            "Failed to create work directory {}",
            settings.work_dir.display()
        )
    })?;
    match clear_stale_work_files(&settings.work_dir) {
        Ok(0) => {}
        Ok(n) => tracing::info!("Removed {} stale file(s) from the work directory", n),
        Err(e) => tracing::warn!("Could not clean the work directory: {}", e),
    }

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // Create our services with their dependencies.
    // This is the "composition root" where we wire everything together.

    let session_service = Arc::new(SessionService::new(
        InMemorySessionStore::new(),
        settings.work_dir.clone(),
    ));

    let storage = match &settings.storage_emulator_host {
        Some(host) => {
            tracing::info!("Using Cloud Storage emulator at {}", host);
            GcsClient::for_emulator(format!("{}/storage/v1", host.trim_end_matches('/')))
        }
        None => GcsClient::new(),
    };

    let gemini = GeminiClient::new(settings.gemini_model.clone());
    tracing::info!(
        model = gemini.model(),
        default_key = settings.default_api_key.is_some(),
        "Gemini client ready"
    );

    let summary_service = Arc::new(SummaryService::new(
        storage,
        gemini,
        settings.work_dir.clone(),
        settings.default_api_key.clone(),
    ));

    // Create the data structure that will be shared across all commands
    let data = Data {
        sessions: Arc::clone(&session_service),
        summaries: Arc::clone(&summary_service),
    };

    // ========================================================================
    // DISCORD FRAMEWORK SETUP
    // ========================================================================

    let dev_guild_id = settings.dev_guild_id;

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![discord::commands::summarizer::summarizer()],
            on_error: |error| Box::pin(on_error(error)),
            ..Default::default()
        })
        .setup(move |ctx, _ready, framework| {
            Box::pin(async move {
                tracing::info!("Bot is starting up...");

                // Guild registration is instant, global registration can take a while
                // to propagate. Use SUMMARIZER_GUILD_ID while developing.
                match dev_guild_id {
                    Some(guild_id) => {
                        poise::builtins::register_in_guild(
                            ctx,
                            &framework.options().commands,
                            serenity::GuildId::new(guild_id),
                        )
                        .await?;
                        tracing::info!(guild_id, "Commands registered in guild");
                    }
                    None => {
                        poise::builtins::register_globally(ctx, &framework.options().commands)
                            .await?;
                        tracing::info!("Commands registered globally");
                    }
                }

                presence::on_ready(ctx);
                Ok(data)
            })
        })
        .build();

    // Slash commands need no privileged intents
    let intents = serenity::GatewayIntents::GUILDS;

    let mut client = serenity::ClientBuilder::new(&settings.discord_token, intents)
        .framework(framework)
        .await
        .context("Error creating client")?;

    client.start().await.context("Error running bot")?;
    Ok(())
}

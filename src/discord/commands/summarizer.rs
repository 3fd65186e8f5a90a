// Discord commands for the bucket summarizer.
//
// Every subcommand stands in for one widget of the summarizer form:
// API key, key-file upload, bucket name, "List Files", file selection,
// summary type, "Generate Summary". Handlers stay thin:
// 1. Extract primitive data from Discord types
// 2. Call the session or summary service
// 3. Show the result, or the failure inline as a warning/error

use crate::core::session::{SessionError, SessionState};
use crate::core::storage::storage_models::MAX_KEY_FILE_BYTES;
use crate::core::summaries::summary_models::build_prompt;
use crate::core::summaries::{SummaryError, SummaryStyle};
use crate::discord::{Context, Error};
use poise::serenity_prelude as serenity;

/// Discord rejects embed descriptions longer than 4096 characters.
const EMBED_TEXT_LIMIT: usize = 4000;
/// How many object names the listing reply shows before summarizing the rest.
const LISTING_PREVIEW: usize = 30;

const COLOR_OK: u32 = 0x4285F4; // Google blue
const COLOR_SUMMARY: u32 = 0x34A853; // Google green

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum StyleChoice {
    #[name = "lines"]
    Lines,
    #[name = "paragraphs"]
    Paragraphs,
    #[name = "custom"]
    Custom,
}

impl From<StyleChoice> for SummaryStyle {
    fn from(choice: StyleChoice) -> Self {
        match choice {
            StyleChoice::Lines => SummaryStyle::Lines,
            StyleChoice::Paragraphs => SummaryStyle::Paragraphs,
            StyleChoice::Custom => SummaryStyle::Custom,
        }
    }
}

/// Root `/summarizer` command. Subcommands walk through the form.
#[poise::command(
    slash_command,
    subcommands(
        "apikey",
        "credentials",
        "bucket",
        "list",
        "select",
        "style",
        "generate",
        "status",
        "reset"
    )
)]
pub async fn summarizer(ctx: Context<'_>) -> Result<(), Error> {
    ctx.say(
        "File Summarizer using Google Gemini:\n\
        `/summarizer apikey <key>` - Enter your Gemini API key\n\
        `/summarizer credentials <file>` - Upload your Google Cloud JSON key file\n\
        `/summarizer bucket <name>` - Enter the Cloud Storage bucket name\n\
        `/summarizer list` - List the files in the bucket\n\
        `/summarizer select <file>` - Pick a file from the bucket\n\
        `/summarizer style <type> [count] [prompt]` - Lines, paragraphs or a custom prompt\n\
        `/summarizer generate` - Generate the summary\n\
        `/summarizer status` - Show what you've entered so far\n\
        `/summarizer reset` - Forget your key, credentials and selections",
    )
    .await?;
    Ok(())
}

/// Enter your Google Gemini API key.
#[poise::command(slash_command)]
pub async fn apikey(
    ctx: Context<'_>,
    #[description = "Your Google Gemini API key"] key: String,
) -> Result<(), Error> {
    let user_id = ctx.author().id.get();

    match ctx.data().sessions.set_api_key(user_id, &key).await {
        Ok(()) => reply(ctx, "🔑 API key saved for this session.").await,
        Err(e) => session_problem(ctx, e).await,
    }
}

/// Upload your Google Cloud service-account JSON key file.
#[poise::command(slash_command)]
pub async fn credentials(
    ctx: Context<'_>,
    #[description = "Service-account key (.json)"] key_file: serenity::Attachment,
) -> Result<(), Error> {
    if !key_file.filename.to_lowercase().ends_with(".json") {
        return warn(ctx, "Please upload a `.json` key file.").await;
    }
    if key_file.size as usize > MAX_KEY_FILE_BYTES {
        return warn(ctx, "That file is too large to be a service-account key.").await;
    }

    ctx.defer_ephemeral().await?;
    let bytes = key_file.download().await?;
    let user_id = ctx.author().id.get();

    match ctx.data().sessions.set_credentials(user_id, &bytes).await {
        Ok(summary) => {
            let project = summary
                .project_id
                .map(|p| format!(" (project `{}`)", p))
                .unwrap_or_default();
            reply(
                ctx,
                &format!(
                    "✅ Credentials loaded for `{}`{}. Next: `/summarizer bucket <name>`.",
                    summary.client_email, project
                ),
            )
            .await
        }
        Err(e) => session_problem(ctx, e).await,
    }
}

/// Enter the Google Cloud Storage bucket name.
#[poise::command(slash_command)]
pub async fn bucket(
    ctx: Context<'_>,
    #[description = "Bucket name"] name: String,
) -> Result<(), Error> {
    let user_id = ctx.author().id.get();

    match ctx.data().sessions.set_bucket(user_id, &name).await {
        Ok(()) => {
            reply(
                ctx,
                &format!("🪣 Bucket set to `{}`. Use `/summarizer list`.", name.trim()),
            )
            .await
        }
        Err(e) => session_problem(ctx, e).await,
    }
}

/// List the files in the bucket.
#[poise::command(slash_command)]
pub async fn list(
    ctx: Context<'_>,
    #[description = "Bucket name (defaults to the one you entered)"] bucket: Option<String>,
) -> Result<(), Error> {
    let user_id = ctx.author().id.get();
    let sessions = &ctx.data().sessions;

    if let Some(name) = bucket {
        if let Err(e) = sessions.set_bucket(user_id, &name).await {
            return session_problem(ctx, e).await;
        }
    }

    let session = sessions.snapshot(user_id).await?;
    if session.bucket_name.trim().is_empty() {
        return warn(ctx, "Please enter a bucket name.").await;
    }

    ctx.defer_ephemeral().await?;

    match ctx.data().summaries.list_files(&session).await {
        Ok(names) => {
            let state = sessions.record_listing(user_id, names).await?;
            if state.file_names.is_empty() {
                return warn(ctx, "No files available in the bucket.").await;
            }

            let embed = serenity::CreateEmbed::new()
                .title(format!("📂 Files in {}", state.bucket_name))
                .description(format_listing(&state.file_names, LISTING_PREVIEW))
                .color(COLOR_OK)
                .footer(serenity::CreateEmbedFooter::new(format!(
                    "{} file(s) - pick one with /summarizer select",
                    state.file_names.len()
                )));

            ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
                .await?;
            Ok(())
        }
        Err(e) if e.is_incomplete_input() => warn(ctx, &e.to_string()).await,
        Err(e) => {
            tracing::warn!(user_id, "Listing failed: {}", e);
            fail(ctx, &format!("Error accessing bucket: {}", e)).await
        }
    }
}

/// Select a file from the bucket.
#[poise::command(slash_command)]
pub async fn select(
    ctx: Context<'_>,
    #[description = "File from the last listing"]
    #[autocomplete = "autocomplete_files"]
    file: String,
) -> Result<(), Error> {
    let user_id = ctx.author().id.get();

    match ctx.data().sessions.select_file(user_id, &file).await {
        Ok(()) => {
            reply(
                ctx,
                &format!(
                    "📄 Selected `{}`. Choose a style with `/summarizer style` or run `/summarizer generate`.",
                    file
                ),
            )
            .await
        }
        Err(SessionError::NothingListed) => {
            warn(ctx, "No files available to select. Run `/summarizer list` first.").await
        }
        Err(e) => session_problem(ctx, e).await,
    }
}

/// Choose the type of summary.
#[poise::command(slash_command)]
pub async fn style(
    ctx: Context<'_>,
    #[description = "Type of summary"] summary_type: StyleChoice,
    #[description = "Number of lines (1-20) or paragraphs (1-5)"]
    #[min = 1]
    #[max = 20]
    count: Option<u8>,
    #[description = "Your custom prompt (custom type only)"] prompt: Option<String>,
) -> Result<(), Error> {
    let user_id = ctx.author().id.get();
    let style: SummaryStyle = summary_type.into();

    let state = match ctx
        .data()
        .sessions
        .choose_style(user_id, style, count, prompt)
        .await
    {
        Ok(state) => state,
        Err(e) => return session_problem(ctx, e).await,
    };

    if style == SummaryStyle::Custom && state.custom_prompt.is_empty() {
        return warn(
            ctx,
            "Custom summary selected. Enter your custom prompt with `/summarizer style custom prompt:<text>`.",
        )
        .await;
    }

    let prompt = build_prompt(state.summary_type, state.summary_value, &state.custom_prompt);
    reply(ctx, &format!("📝 The model will be asked:\n> {}", prompt)).await
}

/// Generate a summary of the selected file.
#[poise::command(slash_command)]
pub async fn generate(ctx: Context<'_>) -> Result<(), Error> {
    let user_id = ctx.author().id.get();
    let session = ctx.data().sessions.snapshot(user_id).await?;

    // Missing inputs are answered right away, before the reply is deferred
    if let Err(e) = ctx.data().summaries.check_ready(&session) {
        return warn(ctx, &e.to_string()).await;
    }

    // The summary describes a private bucket, so it is only shown to its owner
    ctx.defer_ephemeral().await?;

    match ctx.data().summaries.generate_summary(&session).await {
        Ok(summary) => {
            let embed = serenity::CreateEmbed::new()
                .title("Summary Result:")
                .description(truncate_for_embed(&summary.text, EMBED_TEXT_LIMIT))
                .color(COLOR_SUMMARY)
                .footer(serenity::CreateEmbedFooter::new(format!(
                    "{} - full text attached as {}",
                    summary.object_name, summary.file_name
                )));
            let attachment =
                serenity::CreateAttachment::bytes(summary.text.into_bytes(), summary.file_name);

            ctx.send(
                poise::CreateReply::default()
                    .embed(embed)
                    .attachment(attachment)
                    .ephemeral(true),
            )
            .await?;
            Ok(())
        }
        Err(e) if e.is_incomplete_input() => warn(ctx, &e.to_string()).await,
        Err(e) => {
            report_generation_failure(user_id, &e);
            fail(
                ctx,
                &format!("An error occurred while generating the summary: {}", e),
            )
            .await
        }
    }
}

/// Show what you've entered so far.
#[poise::command(slash_command)]
pub async fn status(ctx: Context<'_>) -> Result<(), Error> {
    let user_id = ctx.author().id.get();
    let session = ctx.data().sessions.snapshot(user_id).await?;
    let has_default_key = ctx.data().summaries.has_default_api_key();

    let embed = status_embed(&session, has_default_key);
    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}

/// Forget your API key, credentials and selections.
#[poise::command(slash_command)]
pub async fn reset(ctx: Context<'_>) -> Result<(), Error> {
    let user_id = ctx.author().id.get();

    if ctx.data().sessions.reset(user_id).await? {
        reply(ctx, "🧹 Session cleared. Your key file was deleted.").await
    } else {
        reply(ctx, "Nothing to clear.").await
    }
}

/// Autocomplete for object names from the user's last listing.
async fn autocomplete_files<'a>(
    ctx: Context<'_>,
    partial: &'a str,
) -> impl Iterator<Item = String> + 'a {
    ctx.data()
        .sessions
        .matching_files(ctx.author().id.get(), partial)
        .await
        .unwrap_or_default()
        .into_iter()
}

// =============================================================================
// REPLY HELPERS
// =============================================================================

async fn reply(ctx: Context<'_>, message: &str) -> Result<(), Error> {
    ctx.send(
        poise::CreateReply::default()
            .content(message)
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

async fn warn(ctx: Context<'_>, message: &str) -> Result<(), Error> {
    reply(ctx, &format!("⚠️ {}", message)).await
}

async fn fail(ctx: Context<'_>, message: &str) -> Result<(), Error> {
    reply(ctx, &format!("❌ {}", message)).await
}

/// User-facing session problems become warnings; storage failures bubble up.
async fn session_problem(ctx: Context<'_>, err: SessionError) -> Result<(), Error> {
    match err {
        SessionError::Store(e) => Err(e.into()),
        other => warn(ctx, &other.to_string()).await,
    }
}

fn report_generation_failure(user_id: u64, err: &SummaryError) {
    match err {
        SummaryError::Storage(e) => tracing::warn!(user_id, "Download failed: {}", e),
        SummaryError::Provider(e) => tracing::warn!(user_id, "Gemini call failed: {}", e),
        other => tracing::error!(user_id, "Summary failed: {}", other),
    }
}

// =============================================================================
// FORMATTING
// =============================================================================

/// Cuts `text` to at most `max` characters, marking the cut with an ellipsis.
fn truncate_for_embed(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }

    let mut cut: String = text.chars().take(max.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

/// Bulleted list of the first `limit` names plus a count of the rest.
fn format_listing(names: &[String], limit: usize) -> String {
    let mut out = names
        .iter()
        .take(limit)
        .map(|name| format!("• `{}`", name))
        .collect::<Vec<_>>()
        .join("\n");

    if names.len() > limit {
        out.push_str(&format!("\n…and {} more", names.len() - limit));
    }

    truncate_for_embed(&out, EMBED_TEXT_LIMIT)
}

fn status_embed(session: &SessionState, has_default_key: bool) -> serenity::CreateEmbed {
    let api_key = match (&session.api_key, has_default_key) {
        (Some(_), _) => "✅ set".to_string(),
        (None, true) => "➖ using the server default".to_string(),
        (None, false) => "❌ not set".to_string(),
    };

    let credentials = match &session.credentials {
        Some(c) => format!(
            "✅ `{}` (uploaded <t:{}:R>)",
            c.client_email,
            c.uploaded_at.timestamp()
        ),
        None => "❌ not uploaded".to_string(),
    };

    let or_dash = |s: &str| {
        if s.is_empty() {
            "-".to_string()
        } else {
            format!("`{}`", s)
        }
    };

    let style = match session.summary_type {
        SummaryStyle::Custom => format!("custom: {}", or_dash(&session.custom_prompt)),
        other => format!("{} {}", session.summary_value, other),
    };

    let ready = session.can_generate(has_default_key.then_some("default"));

    serenity::CreateEmbed::new()
        .title("🗂️ Summarizer session")
        .color(COLOR_OK)
        .field("API key", api_key, true)
        .field("Credentials", credentials, false)
        .field("Bucket", or_dash(&session.bucket_name), true)
        .field(
            "Ready to list",
            if session.can_list() { "yes" } else { "no" },
            true,
        )
        .field(
            "Files listed",
            session.file_names.len().to_string(),
            true,
        )
        .field("Selected file", or_dash(&session.selected_file), false)
        .field("Summary type", style, false)
        .field(
            "Ready to generate",
            if ready { "yes" } else { "no" },
            true,
        )
}

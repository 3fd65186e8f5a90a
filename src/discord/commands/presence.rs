// This module handles bot presence and lifecycle events.
//
// Discord-layer glue only: we work with serenity types (Context,
// ActivityData, OnlineStatus) and keep the logic short.

use poise::serenity_prelude as serenity;

/// Called once the bot is ready so users can discover the entry command.
pub fn on_ready(ctx: &serenity::Context) {
    let activity = serenity::ActivityData::watching("buckets | /summarizer");
    ctx.set_presence(Some(activity), serenity::OnlineStatus::Online);
}

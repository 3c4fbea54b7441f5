//! Lookup command - resolve a song from the terminal.

use super::choose_secret;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::conversation::NOT_FOUND;
use crate::youtube::{MetadataFetcher, VideoResolver, YoutubeClient};

/// Print the details reply the bot would send for `query`.
pub async fn run_lookup(query: &str, api_key: Option<String>, settings: Settings) -> anyhow::Result<()> {
    preflight::check(Operation::Lookup, &settings)?;

    let api_key = choose_secret(api_key, || settings.youtube_api_key())?;
    let client = YoutubeClient::with_config(&settings.youtube, api_key)?;

    Output::info(&format!("Searching for \"{}\"...", query));

    let Some(video) = client.resolve(query).await? else {
        Output::warning(NOT_FOUND);
        return Ok(());
    };

    let metadata = client.fetch_metadata(&video.id).await?;

    println!();
    Output::reply(&metadata.describe(settings.bot.max_description_chars));
    println!();
    Output::kv("Video ID", &video.id);
    Output::kv("Link", &video.link);

    Ok(())
}

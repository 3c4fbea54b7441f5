//! Run command - start the Telegram bot.

use super::choose_secret;
use crate::audio::{LimitedExtractor, YtDlpExtractor};
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::conversation::Conversation;
use crate::session::SessionStore;
use crate::telegram::{self, TelegramClient};
use crate::youtube::YoutubeClient;
use std::sync::Arc;
use teloxide::Bot;
use tracing::info;

/// Start the bot and poll for updates until ctrl-c.
pub async fn run_bot(
    token: Option<String>,
    api_key: Option<String>,
    settings: Settings,
) -> anyhow::Result<()> {
    preflight::check(Operation::Run, &settings)?;

    let token = choose_secret(token, || settings.telegram_token())?;
    let api_key = choose_secret(api_key, || settings.youtube_api_key())?;

    let download_dir = settings.download_dir();
    std::fs::create_dir_all(&download_dir)?;

    let youtube = Arc::new(YoutubeClient::with_config(&settings.youtube, api_key)?);
    let extractor = Arc::new(LimitedExtractor::new(
        Arc::new(YtDlpExtractor::with_config(&settings.extractor)),
        settings.extractor.max_concurrent,
    ));

    let bot = Bot::new(token);
    let chat = Arc::new(TelegramClient::new(bot.clone()));

    let conversation = Conversation::new(
        youtube.clone(),
        youtube,
        extractor,
        chat,
        SessionStore::new(&download_dir, settings.session.capacity),
    )
    .with_max_description_chars(settings.bot.max_description_chars);

    Output::header("Shazbot");
    Output::kv("Downloads", &download_dir.display().to_string());
    Output::kv("Extractor", &settings.extractor.binary);
    Output::kv(
        "Parallel downloads",
        &settings.extractor.max_concurrent.max(1).to_string(),
    );
    println!();
    Output::info("Press Ctrl+C to stop the bot.");

    info!("Starting bot");
    telegram::run(bot, Arc::new(conversation)).await;
    info!("Bot stopped");

    Ok(())
}

//! Telegram front end.
//!
//! Maps Telegram updates onto [`Conversation`] events and implements
//! [`ChatClient`] on top of the Bot API.

use crate::conversation::{ChatClient, ChatId, Conversation};
use crate::error::{Result, ShazbotError};
use crate::session::UserId;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::InputFile;
use teloxide::utils::command::BotCommands;
use tracing::{debug, info, warn};

/// Commands understood by the bot.
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "snake_case", description = "These commands are supported:")]
pub enum Command {
    #[command(description = "say hello.")]
    Start,
    #[command(description = "say hello.")]
    Hello,
    #[command(description = "say hello.")]
    Hi,
    #[command(description = "show this text.")]
    Help,
    #[command(description = "get the last song you asked for.")]
    SendAudio,
}

/// [`ChatClient`] backed by a teloxide [`Bot`].
#[derive(Clone)]
pub struct TelegramClient {
    bot: Bot,
}

impl TelegramClient {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl ChatClient for TelegramClient {
    async fn send_text(&self, chat: ChatId, text: &str) -> Result<()> {
        self.bot
            .send_message(teloxide::types::ChatId(chat), text)
            .await
            .map_err(|e| ShazbotError::Chat(e.to_string()))?;
        Ok(())
    }

    async fn send_audio(&self, chat: ChatId, path: &Path, title: &str) -> Result<()> {
        let file = InputFile::file(path.to_path_buf()).file_name(display_file_name(title));

        self.bot
            .send_audio(teloxide::types::ChatId(chat), file)
            .title(title)
            .await
            .map_err(|e| ShazbotError::Chat(e.to_string()))?;
        Ok(())
    }
}

/// Attachment file name shown to the user, derived from the song title.
///
/// Only used for display; files on disk never carry the title.
pub fn display_file_name(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, ' ' | '-' | '_' | '(' | ')' | '\'' | ',') {
                c
            } else {
                '_'
            }
        })
        .take(64)
        .collect();

    let cleaned = cleaned.trim().trim_matches('_');
    if cleaned.is_empty() {
        "audio.mp3".to_string()
    } else {
        format!("{}.mp3", cleaned)
    }
}

fn sender(msg: &Message) -> Option<UserId> {
    msg.from.as_ref().map(|user| user.id.0)
}

fn log_failure<T>(what: &str, result: Result<T>) {
    if let Err(e) = result {
        warn!("{} failed: {}", what, e);
    }
}

async fn on_command(msg: Message, cmd: Command, conversation: Arc<Conversation>) -> ResponseResult<()> {
    let chat = msg.chat.id.0;
    debug!("Command {:?} in chat {}", cmd, chat);

    match cmd {
        Command::Start | Command::Hello | Command::Hi => {
            log_failure("Greeting", conversation.handle_start(chat).await);
        }
        Command::Help => {
            let commands = Command::descriptions().to_string();
            log_failure("Help", conversation.handle_help(chat, &commands).await);
        }
        Command::SendAudio => match sender(&msg) {
            Some(user) => {
                log_failure("send_audio", conversation.handle_send_audio(chat, user).await);
            }
            None => debug!("Ignoring /send_audio without a sender"),
        },
    }

    Ok(())
}

async fn on_text(msg: Message, conversation: Arc<Conversation>) -> ResponseResult<()> {
    let (Some(user), Some(text)) = (sender(&msg), msg.text()) else {
        return Ok(());
    };
    let chat = msg.chat.id.0;
    let text = text.to_string();

    // Downloads can take minutes; keep the chat responsive meanwhile
    tokio::spawn(async move {
        log_failure("Song request", conversation.handle_text(chat, user, &text).await);
    });

    Ok(())
}

async fn on_other(msg: Message, conversation: Arc<Conversation>) -> ResponseResult<()> {
    log_failure("Reply", conversation.handle_unsupported(msg.chat.id.0).await);
    Ok(())
}

/// Poll Telegram for updates until ctrl-c.
pub async fn run(bot: Bot, conversation: Arc<Conversation>) {
    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!("Could not register bot commands: {}", e);
    }

    let handler = Update::filter_message()
        .branch(dptree::entry().filter_command::<Command>().endpoint(on_command))
        .branch(dptree::filter(|msg: Message| msg.text().is_some()).endpoint(on_text))
        .branch(dptree::endpoint(on_other));

    info!("Listening for Telegram updates");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![conversation])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

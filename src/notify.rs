/// Message delivery.
///
/// The pipeline hands a finished report to a `Notifier`. `TelegramNotifier`
/// posts it to the Bot API `sendMessage` method with legacy Markdown parsing.

use crate::config::{TelegramConfig, TelegramCredentials};
use crate::model::NotifyError;
use std::time::Duration;

pub trait Notifier {
    fn notify(&self, text: &str) -> Result<(), NotifyError>;
}

/// Escape the characters that legacy Telegram Markdown treats as markup.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Wrap `text` in a bold entity.
///
/// Legacy Markdown does not honour escapes inside an entity, so the text is
/// embedded as-is and only a `*` that would close the span early is dropped.
pub fn markdown_bold(text: &str) -> String {
    let inner: String = text.chars().filter(|&c| c != '*').collect();
    format!("*{}*", inner)
}

pub struct TelegramNotifier {
    client: reqwest::blocking::Client,
    endpoint: String,
    chat_id: String,
    parse_mode: String,
    max_len: usize,
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig, credentials: &TelegramCredentials) -> Result<Self, NotifyError> {
        if credentials.bot_token.trim().is_empty() || credentials.chat_id.trim().is_empty() {
            return Err(NotifyError::MissingCredentials);
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| NotifyError::Transport(format!("cannot build HTTP client: {}", e)))?;
        Ok(TelegramNotifier {
            client,
            endpoint: send_message_url(&config.api_base, &credentials.bot_token),
            chat_id: credentials.chat_id.clone(),
            parse_mode: config.parse_mode.clone(),
            max_len: config.max_message_len,
        })
    }
}

fn send_message_url(api_base: &str, bot_token: &str) -> String {
    format!("{}/bot{}/sendMessage", api_base.trim_end_matches('/'), bot_token)
}

impl Notifier for TelegramNotifier {
    fn notify(&self, text: &str) -> Result<(), NotifyError> {
        let len = text.chars().count();
        if len > self.max_len {
            return Err(NotifyError::MessageTooLong { len, max: self.max_len });
        }

        let mut form = vec![("chat_id", self.chat_id.as_str()), ("text", text)];
        if !self.parse_mode.is_empty() {
            form.push(("parse_mode", self.parse_mode.as_str()));
        }

        let response = self
            .client
            .post(&self.endpoint)
            .form(&form)
            .send()
            // The token is part of the URL, keep it out of the error text.
            .map_err(|e| NotifyError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }
        Ok(())
    }
}

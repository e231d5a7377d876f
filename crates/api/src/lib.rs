//! HTTP clients for services the keeper reports to or reads from.
//!
//! - Rodeo API: strategy APY and TVL
//! - Telegram Bot API: alert delivery

mod apy;
mod telegram;

pub use apy::{ApyClient, ApyQuote};
pub use telegram::TelegramClient;

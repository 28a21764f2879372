//! Channel abstraction for message I/O.

pub mod channel;
pub mod telegram;
pub mod telegram_types;

pub use channel::*;
pub use telegram::TelegramChannel;
pub use telegram_types::Update;

//! Remodel Intake — Telegram survey bot that files renovation projects into a
//! Google Sheet.

pub mod channels;
pub mod config;
pub mod error;
pub mod retry;
pub mod sink;
pub mod survey;
pub mod webhook;

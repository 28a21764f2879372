//! Project intake survey.
//!
//! A user sends `/start`, answers eight questions one message at a time, and
//! the finished answers are appended as one spreadsheet row. `state` holds the
//! pure transition function; `manager` runs it against live sessions and
//! performs the I/O it asks for.

pub mod manager;
pub mod model;
pub mod notify;
pub mod questions;
pub mod session;
pub mod state;

pub use manager::{DispatchOutcome, SurveyManager};
pub use model::{Answers, Field, Record};
pub use session::{SessionStore, spawn_prune_task};
pub use state::{Input, Session, SurveyState};

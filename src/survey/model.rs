//! Project record and answer data models.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Value recorded for a question the user skipped.
pub const NOT_SPECIFIED: &str = "Not specified";

/// Substring a Drive folder link must contain to be accepted.
pub const DRIVE_LINK_MARKER: &str = "drive.google.com";

/// Column headers of the backing sheet, in row order.
pub const COLUMN_HEADERS: [&str; 9] = [
    "Date",
    "Client Name",
    "Room Type",
    "Location",
    "Goal",
    "Work Done",
    "Materials",
    "Features",
    "Drive Link",
];

/// A question-backed field of a project record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    ClientName,
    RoomType,
    Location,
    Goal,
    WorkDone,
    Materials,
    Features,
    DriveLink,
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::ClientName => "client_name",
            Self::RoomType => "room_type",
            Self::Location => "location",
            Self::Goal => "goal",
            Self::WorkDone => "work_done",
            Self::Materials => "materials",
            Self::Features => "features",
            Self::DriveLink => "drive_link",
        };
        write!(f, "{s}")
    }
}

/// Answers collected so far in a session.
pub type Answers = BTreeMap<Field, String>;

/// Lenient Drive folder link check: the marker must appear somewhere.
pub fn is_valid_drive_link(link: &str) -> bool {
    link.contains(DRIVE_LINK_MARKER)
}

/// Format a submission date the way the sheet has always stored it (`M/D/YYYY`).
pub fn format_submission_date(date: NaiveDate) -> String {
    date.format("%-m/%-d/%Y").to_string()
}

/// A completed project submission. Every field is populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub date: String,
    pub client_name: String,
    pub room_type: String,
    pub location: String,
    pub goal: String,
    pub work_done: String,
    pub materials: String,
    pub features: String,
    pub drive_link: String,
}

impl Record {
    /// Assemble a record from session answers. Missing answers become
    /// [`NOT_SPECIFIED`] so the record is always complete.
    pub fn from_answers(date: NaiveDate, answers: &Answers) -> Self {
        let get = |field: Field| {
            answers
                .get(&field)
                .cloned()
                .unwrap_or_else(|| NOT_SPECIFIED.to_string())
        };
        Self {
            date: format_submission_date(date),
            client_name: get(Field::ClientName),
            room_type: get(Field::RoomType),
            location: get(Field::Location),
            goal: get(Field::Goal),
            work_done: get(Field::WorkDone),
            materials: get(Field::Materials),
            features: get(Field::Features),
            drive_link: get(Field::DriveLink),
        }
    }

    /// Row cells, aligned with [`COLUMN_HEADERS`].
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.date.clone(),
            self.client_name.clone(),
            self.room_type.clone(),
            self.location.clone(),
            self.goal.clone(),
            self.work_done.clone(),
            self.materials.clone(),
            self.features.clone(),
            self.drive_link.clone(),
        ]
    }
}

//! Admin notification text.

use super::model::Record;

/// Human-readable summary of a submitted project.
pub fn format_notification(record: &Record) -> String {
    format!(
        "📢 New Project Submitted!\n\
         👤 Client: {}\n\
         🏗️ Room: {}\n\
         📍 Location: {}\n\
         🌟 Goal: {}\n\
         💪 Work done: {}\n\
         🧱 Materials: {}\n\
         ✨ Features: {}\n\
         📂 Drive: {}",
        record.client_name,
        record.room_type,
        record.location,
        record.goal,
        record.work_done,
        record.materials,
        record.features,
        record.drive_link,
    )
}

//! The fixed question sequence and the canned replies around it.

use super::model::Field;

/// Reserved reply that records the current field as "Not specified".
pub const SKIP_TOKEN: &str = "Skip this question ⏭️";

/// One step of the survey.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Question {
    pub field: Field,
    /// Markdown prompt text.
    pub text: &'static str,
    /// Whether the skip keyboard is offered.
    pub skippable: bool,
}

/// Questions in the order they are asked. The last one is the Drive link.
pub const QUESTIONS: [Question; 8] = [
    Question {
        field: Field::ClientName,
        text: "🙋‍♂️ What is the *client's name*? (Как зовут клиента?)",
        skippable: true,
    },
    Question {
        field: Field::RoomType,
        text: "🏗️ What *room* did you work on? (e.g. kitchen, bathroom, laundry room) \
               (Какую комнату ремонтировали?)",
        skippable: true,
    },
    Question {
        field: Field::Location,
        text: "📍 In which *city and state* was this project completed? \
               (В каком городе и штате выполнен проект?)",
        skippable: true,
    },
    Question {
        field: Field::Goal,
        text: "🌟 What was the *client's goal* for this space? (e.g. modernize layout, \
               fix poor lighting, update style, old renovation, etc.) \
               (Чего хотел добиться клиент в этом помещении?)",
        skippable: true,
    },
    Question {
        field: Field::WorkDone,
        text: "💪 What *work was done* during the remodel? (Что было сделано в проекте?)",
        skippable: true,
    },
    Question {
        field: Field::Materials,
        text: "🧱 What *materials* were used? (Include names, colors, manufacturers if \
               possible) (Какие материалы использовались? Название, цвет, производитель)",
        skippable: true,
    },
    Question {
        field: Field::Features,
        text: "✨ Were there any *interesting features* or smart solutions implemented? \
               (e.g. round lighting, hidden drawers, custom panels) \
               (Были ли интересные решения или особенности в проекте?)",
        skippable: true,
    },
    Question {
        field: Field::DriveLink,
        text: "📂 Please *paste the Google Drive folder link* (with subfolders: before / \
               after / 3D / drawings) (Вставьте ссылку на папку Google Drive с подпапками: \
               до / после / 3D / чертёж)",
        skippable: false,
    },
];

/// Index of the final (Drive link) question.
pub const LAST_STEP: usize = QUESTIONS.len() - 1;

/// Reply to anything but `/start` outside a survey.
pub const START_HINT: &str = "👋 Send /start to submit a new project.";

/// Prefix for the re-prompt when an update carried no text.
pub const TEXT_REQUIRED_HINT: &str = "✍️ Please answer with a text message.";

pub const CANCELLED: &str = "🛑 Survey cancelled. Send /start to begin again.";

pub const NOTHING_TO_CANCEL: &str = "Nothing to cancel. Send /start to submit a new project.";

pub const SUBMITTED: &str = "✅ Thank you! The project has been saved.";

/// Shown when the record could not be saved. The session keeps its answers.
pub const SUBMIT_FAILED: &str = "⚠️ Sorry, something went wrong while saving the project. \
                                 Please send the Google Drive link again to retry.";

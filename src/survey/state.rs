//! Survey state machine — a pure transition function over per-user sessions.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::channels::{OutgoingMessage, ReplyMarkup};

use super::model::{Answers, NOT_SPECIFIED, Record, is_valid_drive_link};
use super::questions::{
    CANCELLED, LAST_STEP, NOTHING_TO_CANCEL, QUESTIONS, SKIP_TOKEN, START_HINT, TEXT_REQUIRED_HINT,
};

/// Where a user is in the survey.
///
/// Progresses linearly: Idle → AwaitingField(0) → … → AwaitingField(7) →
/// Completed. `Completed` only lives between the transition and the submit;
/// the manager resets the session to `Idle` afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", tag = "state", content = "step")]
pub enum SurveyState {
    #[default]
    Idle,
    AwaitingField(usize),
    Completed,
}

impl std::fmt::Display for SurveyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::AwaitingField(i) => write!(f, "awaiting_field({i})"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

/// Per-user conversation state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub state: SurveyState,
    pub answers: Answers,
}

/// What the user sent, reduced to what the state machine cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Start,
    Cancel,
    Text(String),
    /// An update with no text (photo, sticker, …).
    NonText,
}

static COMMAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/([A-Za-z0-9_]+)(?:@[A-Za-z0-9_]+)?(?:\s|$)").expect("valid command regex")
});

impl Input {
    /// Classify a message text. Unknown commands are ordinary text.
    pub fn from_text(text: Option<&str>) -> Self {
        let Some(text) = text else {
            return Self::NonText;
        };
        let command = COMMAND
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str());
        match command {
            Some("start") => Self::Start,
            Some("cancel") => Self::Cancel,
            _ => Self::Text(text.to_string()),
        }
    }
}

/// Side effects requested by a transition, executed by the manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Send this reply to the user.
    Reply(OutgoingMessage),
    /// Persist the record. The manager answers the user with a confirmation
    /// or an apology depending on the outcome.
    Submit(Record),
}

/// Result of a state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub session: Session,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn new(session: Session) -> Self {
        Self {
            session,
            effects: vec![],
        }
    }

    fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    fn reply(session: Session, message: OutgoingMessage) -> Self {
        Self::new(session).with_effect(Effect::Reply(message))
    }

    /// The record to submit, if this transition completed the survey.
    pub fn submission(&self) -> Option<&Record> {
        self.effects.iter().find_map(|e| match e {
            Effect::Submit(record) => Some(record),
            Effect::Reply(_) => None,
        })
    }
}

/// The prompt for a step, with the keyboard that belongs to it.
pub fn prompt(step: usize) -> OutgoingMessage {
    let question = &QUESTIONS[step];
    let markup = if question.skippable {
        ReplyMarkup::keyboard([SKIP_TOKEN])
    } else {
        ReplyMarkup::RemoveKeyboard
    };
    OutgoingMessage::new(question.text).with_markup(markup)
}

/// Pure transition function: same inputs, same outputs, no I/O.
pub fn transition(session: &Session, input: Input, today: NaiveDate) -> Transition {
    match (session.state, input) {
        (_, Input::Start) => Transition::reply(
            Session {
                state: SurveyState::AwaitingField(0),
                answers: Answers::new(),
            },
            prompt(0),
        ),

        (SurveyState::AwaitingField(_), Input::Cancel) => Transition::reply(
            Session::default(),
            OutgoingMessage::new(CANCELLED).with_markup(ReplyMarkup::RemoveKeyboard),
        ),

        (SurveyState::Idle | SurveyState::Completed, Input::Cancel) => {
            Transition::reply(session.clone(), OutgoingMessage::new(NOTHING_TO_CANCEL))
        }

        (SurveyState::Idle | SurveyState::Completed, Input::Text(_) | Input::NonText) => {
            Transition::reply(session.clone(), OutgoingMessage::new(START_HINT))
        }

        (SurveyState::AwaitingField(step), Input::NonText) => {
            let reprompt = prompt(step);
            let text = format!("{TEXT_REQUIRED_HINT}\n\n{}", reprompt.text);
            Transition::reply(session.clone(), OutgoingMessage { text, ..reprompt })
        }

        (SurveyState::AwaitingField(step), Input::Text(text)) if step >= LAST_STEP => {
            if !is_valid_drive_link(&text) {
                return Transition::reply(session.clone(), prompt(LAST_STEP));
            }
            let mut answers = session.answers.clone();
            answers.insert(QUESTIONS[LAST_STEP].field, text);
            let record = Record::from_answers(today, &answers);
            Transition::new(Session {
                state: SurveyState::Completed,
                answers,
            })
            .with_effect(Effect::Submit(record))
        }

        (SurveyState::AwaitingField(step), Input::Text(text)) => {
            let value = if text == SKIP_TOKEN {
                NOT_SPECIFIED.to_string()
            } else {
                text
            };
            let mut answers = session.answers.clone();
            answers.insert(QUESTIONS[step].field, value);
            let next = step + 1;
            Transition::reply(
                Session {
                    state: SurveyState::AwaitingField(next),
                    answers,
                },
                prompt(next),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::survey::model::Field;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn text(s: &str) -> Input {
        Input::Text(s.to_string())
    }

    const ANSWERS: [&str; 8] = [
        "Jane Doe",
        "Kitchen",
        "Austin, TX",
        "Modernize",
        "Full remodel",
        "Quartz counters",
        "Hidden outlets",
        "https://drive.google.com/folders/abc",
    ];

    /// Feed inputs in order, collecting every transition.
    fn run(inputs: impl IntoIterator<Item = Input>) -> (Session, Vec<Transition>) {
        let mut session = Session::default();
        let mut transitions = Vec::new();
        for input in inputs {
            let t = transition(&session, input, today());
            session = t.session.clone();
            transitions.push(t);
        }
        (session, transitions)
    }

    #[test]
    fn start_asks_first_question() {
        let t = transition(&Session::default(), Input::Start, today());
        assert_eq!(t.session.state, SurveyState::AwaitingField(0));
        assert_eq!(t.effects, vec![Effect::Reply(prompt(0))]);
    }

    #[test]
    fn full_walk_produces_record_in_field_order() {
        let inputs = std::iter::once(Input::Start).chain(ANSWERS.iter().map(|a| text(a)));
        let (session, transitions) = run(inputs);

        assert_eq!(session.state, SurveyState::Completed);
        let submissions: Vec<&Record> =
            transitions.iter().filter_map(|t| t.submission()).collect();
        assert_eq!(submissions.len(), 1, "Completed must be reached exactly once");

        let record = submissions[0];
        assert_eq!(record.date, "10/19/2026");
        assert_eq!(&record.to_row()[1..], &ANSWERS.map(String::from)[..]);
    }

    #[test]
    fn each_answer_prompts_the_next_question() {
        let inputs = std::iter::once(Input::Start).chain(ANSWERS[..7].iter().map(|a| text(a)));
        let (session, transitions) = run(inputs);

        assert_eq!(session.state, SurveyState::AwaitingField(LAST_STEP));
        for (i, t) in transitions.iter().enumerate() {
            assert_eq!(t.effects, vec![Effect::Reply(prompt(i))]);
        }
    }

    #[test]
    fn skip_token_records_not_specified() {
        let mut answers = ANSWERS.map(String::from);
        answers[0] = SKIP_TOKEN.to_string();
        let inputs = std::iter::once(Input::Start).chain(answers.iter().map(|a| text(a)));
        let (_, transitions) = run(inputs);

        let record = transitions.iter().find_map(|t| t.submission()).unwrap();
        assert_eq!(record.client_name, NOT_SPECIFIED);
        assert_eq!(record.room_type, "Kitchen");
        assert_eq!(record.features, "Hidden outlets");
    }

    #[test]
    fn skip_token_must_match_exactly() {
        let session = Session {
            state: SurveyState::AwaitingField(0),
            answers: Answers::new(),
        };
        let t = transition(&session, text("skip this question"), today());
        assert_eq!(
            t.session.answers.get(&Field::ClientName).map(String::as_str),
            Some("skip this question")
        );
    }

    #[test]
    fn invalid_drive_link_reprompts_without_advancing() {
        let inputs = std::iter::once(Input::Start).chain(ANSWERS[..7].iter().map(|a| text(a)));
        let (before, _) = run(inputs);

        let mut session = before.clone();
        for attempt in ["not-a-link", SKIP_TOKEN, "https://dropbox.com/x"] {
            let t = transition(&session, text(attempt), today());
            assert_eq!(t.session, before);
            assert_eq!(t.effects, vec![Effect::Reply(prompt(LAST_STEP))]);
            session = t.session;
        }

        let t = transition(&session, text(ANSWERS[7]), today());
        assert_eq!(t.session.state, SurveyState::Completed);
        assert!(t.submission().is_some());
    }

    #[test]
    fn drive_prompt_removes_keyboard() {
        assert_eq!(prompt(LAST_STEP).markup, ReplyMarkup::RemoveKeyboard);
        assert_eq!(prompt(0).markup, ReplyMarkup::keyboard([SKIP_TOKEN]));
    }

    #[test]
    fn non_text_reprompts_with_hint() {
        let session = Session {
            state: SurveyState::AwaitingField(3),
            answers: Answers::new(),
        };
        let t = transition(&session, Input::NonText, today());
        assert_eq!(t.session, session);
        let [Effect::Reply(reply)] = t.effects.as_slice() else {
            panic!("expected one reply, got {:?}", t.effects);
        };
        assert!(reply.text.starts_with(TEXT_REQUIRED_HINT));
        assert!(reply.text.ends_with(QUESTIONS[3].text));
        assert_eq!(reply.markup, prompt(3).markup);
    }

    #[test]
    fn idle_text_gets_start_hint() {
        let t = transition(&Session::default(), text("hello"), today());
        assert_eq!(t.session, Session::default());
        assert_eq!(t.effects, vec![Effect::Reply(OutgoingMessage::new(START_HINT))]);
    }

    #[test]
    fn restart_clears_answers() {
        let inputs = [Input::Start, text("Jane"), text("Kitchen"), Input::Start];
        let (session, _) = run(inputs);
        assert_eq!(session.state, SurveyState::AwaitingField(0));
        assert!(session.answers.is_empty());
    }

    #[test]
    fn cancel_returns_to_idle() {
        let (session, transitions) = run([Input::Start, text("Jane"), Input::Cancel]);
        assert_eq!(session, Session::default());
        let last = transitions.last().unwrap();
        assert_eq!(
            last.effects,
            vec![Effect::Reply(
                OutgoingMessage::new(CANCELLED).with_markup(ReplyMarkup::RemoveKeyboard)
            )]
        );

        let t = transition(&session, Input::Cancel, today());
        assert_eq!(t.effects, vec![Effect::Reply(OutgoingMessage::new(NOTHING_TO_CANCEL))]);
    }

    #[test]
    fn every_transition_has_exactly_one_outbound_effect() {
        let inputs = [
            text("hi"),
            Input::Start,
            Input::NonText,
            text("Jane"),
            text(SKIP_TOKEN),
            Input::Cancel,
            Input::Cancel,
        ];
        let (_, transitions) = run(inputs);
        for t in transitions {
            assert_eq!(t.effects.len(), 1);
        }
    }

    #[test]
    fn input_classification() {
        assert_eq!(Input::from_text(Some("/start")), Input::Start);
        assert_eq!(Input::from_text(Some("/start@remodel_bot")), Input::Start);
        assert_eq!(Input::from_text(Some("/start payload")), Input::Start);
        assert_eq!(Input::from_text(Some("/cancel")), Input::Cancel);
        assert_eq!(Input::from_text(Some("/started")), text("/started"));
        assert_eq!(Input::from_text(Some("/help")), text("/help"));
        assert_eq!(Input::from_text(Some("start")), text("start"));
        assert_eq!(Input::from_text(None), Input::NonText);
    }

    #[test]
    fn state_serde_shape() {
        let json = serde_json::to_value(SurveyState::AwaitingField(2)).unwrap();
        assert_eq!(json, serde_json::json!({"state": "awaiting_field", "step": 2}));
        let idle = serde_json::to_value(SurveyState::Idle).unwrap();
        assert_eq!(idle, serde_json::json!({"state": "idle"}));
    }
}

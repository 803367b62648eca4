use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub mod sender;

pub use sender::{OutboundSender, SendOptions};

/// Originator of an inbound event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub chat_id: i64,
    pub from: UserRef,
    pub text: String,
    pub at: DateTime<Utc>,
    /// Platform-specific message ID for edits/replies
    #[serde(default)]
    pub message_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackPress {
    pub callback_id: String,
    pub from: UserRef,
    /// Chat the pressed control lives in, when the message is still reachable
    #[serde(default)]
    pub chat_id: Option<i64>,
    #[serde(default)]
    pub message_id: Option<String>,
    /// Free-text interaction token carried by the pressed control
    pub token: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InlineQuery {
    pub query_id: String,
    pub from: UserRef,
    pub query: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChosenInlineResult {
    pub result_id: String,
    pub from: UserRef,
    pub query: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingQuery {
    pub query_id: String,
    pub from: UserRef,
    pub invoice_payload: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreCheckoutQuery {
    pub query_id: String,
    pub from: UserRef,
    pub invoice_payload: String,
    pub total_amount: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollUpdate {
    pub poll_id: String,
    pub question: String,
    pub is_closed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollAnswer {
    pub poll_id: String,
    pub from: UserRef,
    pub option_ids: Vec<i32>,
}

/// One recognized chat-platform payload. Anything that does not match one of
/// these arms is rejected at the channel boundary and never routed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum InboundEvent {
    Message(ChatMessage),
    Callback(CallbackPress),
    InlineQuery(InlineQuery),
    ChosenInlineResult(ChosenInlineResult),
    ShippingQuery(ShippingQuery),
    PreCheckoutQuery(PreCheckoutQuery),
    Poll(PollUpdate),
    PollAnswer(PollAnswer),
}

impl InboundEvent {
    /// Originator identity, resolved across every union arm in one place so
    /// no caller depends on payload-kind ordering. `Poll` carries none.
    pub fn sender_id(&self) -> Option<i64> {
        match self {
            Self::Message(m) => Some(m.from.id),
            Self::Callback(c) => Some(c.from.id),
            Self::InlineQuery(q) => Some(q.from.id),
            Self::ChosenInlineResult(r) => Some(r.from.id),
            Self::ShippingQuery(q) => Some(q.from.id),
            Self::PreCheckoutQuery(q) => Some(q.from.id),
            Self::Poll(_) => None,
            Self::PollAnswer(a) => Some(a.from.id),
        }
    }

    /// Chat to reply into, for the arms that have one.
    pub fn chat_id(&self) -> Option<i64> {
        match self {
            Self::Message(m) => Some(m.chat_id),
            Self::Callback(c) => c.chat_id,
            _ => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Message(m) => Some(&m.text),
            _ => None,
        }
    }

    /// Interaction token, present only on callbacks.
    pub fn token(&self) -> Option<&str> {
        match self {
            Self::Callback(c) => Some(&c.token),
            _ => None,
        }
    }
}

// ─────────────────────────── Controls ───────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum ControlAction {
    /// Pressing the control posts this workflow token back
    Token { token: String },
    /// Deep link into an external UI
    Url { url: String },
    /// Present for grid stability, not actionable
    Inert,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Control {
    pub label: String,
    pub action: ControlAction,
}

impl Control {
    pub fn token(label: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: ControlAction::Token {
                token: token.into(),
            },
        }
    }

    pub fn url(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: ControlAction::Url { url: url.into() },
        }
    }

    /// Blank label, blank token: occupies its cell, does nothing.
    pub fn inert() -> Self {
        Self {
            label: String::new(),
            action: ControlAction::Inert,
        }
    }

    /// A non-actionable cell that still shows text (headers, titles).
    pub fn label_only(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: ControlAction::Inert,
        }
    }

    pub fn is_inert(&self) -> bool {
        matches!(self.action, ControlAction::Inert)
    }

    /// The carried token, `""` for anything that is not a token control.
    pub fn token_value(&self) -> &str {
        match &self.action {
            ControlAction::Token { token } => token,
            _ => "",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyboard {
    pub rows: Vec<Vec<Control>>,
}

impl Keyboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row(mut self, controls: Vec<Control>) -> Self {
        self.rows.push(controls);
        self
    }

    pub fn controls(&self) -> impl Iterator<Item = &Control> {
        self.rows.iter().flatten()
    }
}

// ─────────────────────────── Reminders ───────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reminder {
    pub id: Uuid,
    pub recipient_id: String,
    pub message: String,
    pub scheduled_at: DateTime<Utc>,
    pub is_active: bool,
    pub is_attended: bool,
    pub attempt_count: u32,
    pub max_attempts: u32,
    #[serde(default)]
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Creation payload; the store assigns id/created_at and zeroes the counters.
#[derive(Debug, Clone)]
pub struct NewReminder {
    pub recipient_id: String,
    pub message: String,
    pub scheduled_at: DateTime<Utc>,
    pub max_attempts: u32,
}

/// Raw reminder-scheduling input as received from a workflow, before
/// validation. Invalid input is rejected, never coerced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleRequest {
    pub user_id: String,
    pub message: String,
    pub date_time: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("user_id must be a positive numeric string, got `{0}`")]
    BadUserId(String),
    #[error("message must be 5..=500 characters, got {0}")]
    BadMessageLength(usize),
    #[error("date_time is not an ISO-8601 timestamp: `{0}`")]
    BadDateTime(String),
}

impl ScheduleRequest {
    /// Checks shape only: the timestamp must parse, not lie in the future.
    pub fn validate(&self) -> Result<NewReminder, ValidationError> {
        match self.user_id.parse::<u64>() {
            Ok(id) if id > 0 => {}
            _ => return Err(ValidationError::BadUserId(self.user_id.clone())),
        }

        let len = self.message.chars().count();
        if !(5..=500).contains(&len) {
            return Err(ValidationError::BadMessageLength(len));
        }

        let scheduled_at = DateTime::parse_from_rfc3339(&self.date_time)
            .map_err(|_| ValidationError::BadDateTime(self.date_time.clone()))?
            .with_timezone(&Utc);

        Ok(NewReminder {
            recipient_id: self.user_id.clone(),
            message: self.message.clone(),
            scheduled_at,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        })
    }
}

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

// ─────────────────────────── Records ───────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parent {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    /// Enrollment code, attached after intake
    #[serde(default)]
    pub code: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    New,
    Requested,
    Scheduled,
    Converted,
    Dropped,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Requested => "requested",
            Self::Scheduled => "scheduled",
            Self::Converted => "converted",
            Self::Dropped => "dropped",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "new" => Some(Self::New),
            "requested" => Some(Self::Requested),
            "scheduled" => Some(Self::Scheduled),
            "converted" => Some(Self::Converted),
            "dropped" => Some(Self::Dropped),
            _ => None,
        }
    }

    pub const ALL: [LeadStatus; 5] = [
        Self::New,
        Self::Requested,
        Self::Scheduled,
        Self::Converted,
        Self::Dropped,
    ];
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    pub parent_id: Uuid,
    pub status: LeadStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i64) -> UserRef {
        UserRef {
            id,
            username: None,
            display_name: None,
        }
    }

    fn message_event(from: i64, chat: i64, text: &str) -> InboundEvent {
        InboundEvent::Message(ChatMessage {
            chat_id: chat,
            from: user(from),
            text: text.into(),
            at: Utc::now(),
            message_id: None,
        })
    }

    #[test]
    fn sender_id_resolves_every_arm() {
        let cases: Vec<(InboundEvent, Option<i64>)> = vec![
            (message_event(1, 10, "hi"), Some(1)),
            (
                InboundEvent::Callback(CallbackPress {
                    callback_id: "cb".into(),
                    from: user(2),
                    chat_id: Some(10),
                    message_id: None,
                    token: "n_2025-03_++".into(),
                    at: Utc::now(),
                }),
                Some(2),
            ),
            (
                InboundEvent::InlineQuery(InlineQuery {
                    query_id: "q".into(),
                    from: user(3),
                    query: "".into(),
                }),
                Some(3),
            ),
            (
                InboundEvent::ChosenInlineResult(ChosenInlineResult {
                    result_id: "r".into(),
                    from: user(4),
                    query: "".into(),
                }),
                Some(4),
            ),
            (
                InboundEvent::ShippingQuery(ShippingQuery {
                    query_id: "s".into(),
                    from: user(5),
                    invoice_payload: "".into(),
                }),
                Some(5),
            ),
            (
                InboundEvent::PreCheckoutQuery(PreCheckoutQuery {
                    query_id: "p".into(),
                    from: user(6),
                    invoice_payload: "".into(),
                    total_amount: 0,
                }),
                Some(6),
            ),
            (
                InboundEvent::Poll(PollUpdate {
                    poll_id: "poll".into(),
                    question: "?".into(),
                    is_closed: false,
                }),
                None,
            ),
            (
                InboundEvent::PollAnswer(PollAnswer {
                    poll_id: "poll".into(),
                    from: user(8),
                    option_ids: vec![0],
                }),
                Some(8),
            ),
        ];

        for (event, expected) in cases {
            assert_eq!(event.sender_id(), expected, "{event:?}");
        }
    }

    #[test]
    fn token_accessor_only_on_callbacks() {
        assert_eq!(message_event(1, 10, "hi").token(), None);

        let event = InboundEvent::Callback(CallbackPress {
            callback_id: "cb".into(),
            from: user(1),
            chat_id: None,
            message_id: None,
            token: "pt_morning_2025-03-15".into(),
            at: Utc::now(),
        });
        assert_eq!(event.token(), Some("pt_morning_2025-03-15"));
        assert_eq!(event.chat_id(), None);
    }

    #[test]
    fn event_serde_roundtrip() {
        let event = message_event(1, 10, "hello");
        let json = serde_json::to_string(&event).unwrap();
        let de: InboundEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(de.text(), Some("hello"));
        assert_eq!(de.chat_id(), Some(10));
    }

    #[test]
    fn inert_control_is_blank() {
        let control = Control::inert();
        assert!(control.label.is_empty());
        assert!(control.token_value().is_empty());
        assert!(control.is_inert());
    }

    #[test]
    fn label_only_control_has_no_token() {
        let control = Control::label_only("Mon");
        assert_eq!(control.label, "Mon");
        assert!(control.is_inert());
        assert!(control.token_value().is_empty());
    }

    #[test]
    fn validate_accepts_well_formed_request() {
        let req = ScheduleRequest {
            user_id: "123".into(),
            message: "Call back".into(),
            date_time: "2025-01-01T10:00:00+05:30".into(),
        };
        let new = req.validate().unwrap();
        assert_eq!(new.recipient_id, "123");
        assert_eq!(new.message, "Call back");
        assert_eq!(new.scheduled_at.to_rfc3339(), "2025-01-01T04:30:00+00:00");
        assert_eq!(new.max_attempts, DEFAULT_MAX_ATTEMPTS);
    }

    #[test]
    fn validate_accepts_past_timestamps() {
        // Parseability only: a past instant is created, the dispatcher's
        // horizon decides whether it is ever delivered.
        let req = ScheduleRequest {
            user_id: "7".into(),
            message: "Old follow-up".into(),
            date_time: "2001-01-01T00:00:00Z".into(),
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_user_ids() {
        for bad in ["", "0", "-3", "abc", "12a"] {
            let req = ScheduleRequest {
                user_id: bad.into(),
                message: "Call back".into(),
                date_time: "2025-01-01T10:00:00Z".into(),
            };
            assert_eq!(
                req.validate().unwrap_err(),
                ValidationError::BadUserId(bad.into())
            );
        }
    }

    #[test]
    fn validate_rejects_message_length() {
        let req = ScheduleRequest {
            user_id: "1".into(),
            message: "hey".into(),
            date_time: "2025-01-01T10:00:00Z".into(),
        };
        assert_eq!(
            req.validate().unwrap_err(),
            ValidationError::BadMessageLength(3)
        );

        let req = ScheduleRequest {
            user_id: "1".into(),
            message: "x".repeat(501),
            date_time: "2025-01-01T10:00:00Z".into(),
        };
        assert_eq!(
            req.validate().unwrap_err(),
            ValidationError::BadMessageLength(501)
        );
    }

    #[test]
    fn validate_rejects_unparseable_timestamps() {
        let req = ScheduleRequest {
            user_id: "1".into(),
            message: "Call back".into(),
            date_time: "tomorrow at noon".into(),
        };
        assert_eq!(
            req.validate().unwrap_err(),
            ValidationError::BadDateTime("tomorrow at noon".into())
        );
    }

    #[test]
    fn lead_status_round_trips_as_str() {
        for status in LeadStatus::ALL {
            assert_eq!(LeadStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(LeadStatus::parse("unknown"), None);
    }
}

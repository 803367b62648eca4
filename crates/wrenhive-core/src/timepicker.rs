//! Period-of-day and specific-time picker for a date chosen in the calendar.
//!
//! Same statelessness as the calendar: each screen is a pure function of the
//! token and "now". A slot that is not strictly in the future is inert, no
//! matter which period menu it sits in.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use wrenhive_schema::{Control, Keyboard};
use wrenhive_token::Token;

use crate::calendar::{format_date, parse_date};

pub const PERIOD_PREFIX: &str = "pt";
pub const TIME_PREFIX: &str = "t";

/// Literal second field of a `t` token that returns to the calendar
pub const BACK: &str = "back";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Morning,
    Afternoon,
    Evening,
}

impl Period {
    pub const ALL: [Period; 3] = [Self::Morning, Self::Afternoon, Self::Evening];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Morning => "morning",
            Self::Afternoon => "afternoon",
            Self::Evening => "evening",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "morning" => Some(Self::Morning),
            "afternoon" => Some(Self::Afternoon),
            "evening" => Some(Self::Evening),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Morning => "Morning",
            Self::Afternoon => "Afternoon",
            Self::Evening => "Evening",
        }
    }

    /// Hourly slots of the half-day menu
    pub fn hours(&self) -> std::ops::RangeInclusive<u32> {
        match self {
            Self::Morning => 8..=11,
            Self::Afternoon => 12..=15,
            Self::Evening => 16..=21,
        }
    }
}

/// Default period for a freshly selected date.
pub fn default_period(date: NaiveDate, now: NaiveDateTime) -> Period {
    let today = now.date();
    if date < today {
        Period::Evening
    } else if date > today {
        Period::Morning
    } else {
        match now.hour() {
            h if h < 12 => Period::Morning,
            h if h < 16 => Period::Afternoon,
            _ => Period::Evening,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimePickerOutcome {
    /// Keep showing a period menu
    Menu(Keyboard),
    /// Return to the calendar at the month containing this date
    BackToCalendar { date: NaiveDate },
    /// Terminal: a concrete time was picked
    Selected { date: NaiveDate, time: NaiveTime },
}

/// Entry from the calendar: the default period's menu.
pub fn open(date: NaiveDate, now: NaiveDateTime, context: Option<&str>) -> Keyboard {
    period_keyboard(date, default_period(date, now), now, context)
}

pub fn advance(token: &Token, now: NaiveDateTime) -> TimePickerOutcome {
    let context = token.context();
    match token.prefix() {
        PERIOD_PREFIX => {
            let date = parse_date(token.field_at(2)).unwrap_or_else(|| now.date());
            let period =
                Period::parse(token.field_at(1)).unwrap_or_else(|| default_period(date, now));
            TimePickerOutcome::Menu(period_keyboard(date, period, now, context))
        }
        TIME_PREFIX if token.field_at(2) == BACK => {
            let date = parse_date(token.field_at(1)).unwrap_or_else(|| now.date());
            TimePickerOutcome::BackToCalendar { date }
        }
        TIME_PREFIX => {
            let time = NaiveTime::parse_from_str(token.field_at(1), "%H:%M").ok();
            let date = parse_date(token.field_at(2));
            match (date, time) {
                (Some(date), Some(time)) => TimePickerOutcome::Selected { date, time },
                _ => TimePickerOutcome::Menu(open(now.date(), now, context)),
            }
        }
        _ => TimePickerOutcome::Menu(open(now.date(), now, context)),
    }
}

/// Title row, period switcher row, slot rows, back row.
pub fn period_keyboard(
    date: NaiveDate,
    period: Period,
    now: NaiveDateTime,
    context: Option<&str>,
) -> Keyboard {
    let mut keyboard = Keyboard::new()
        .row(vec![Control::label_only(format!(
            "{} · {}",
            date.format("%d %b %Y"),
            period.label()
        ))])
        .row(
            Period::ALL
                .iter()
                .map(|p| period_control(date, *p, context))
                .collect(),
        );

    let slots: Vec<Control> = period
        .hours()
        .filter_map(|hour| NaiveTime::from_hms_opt(hour, 0, 0))
        .map(|time| slot_control(date, time, now, context))
        .collect();
    for chunk in slots.chunks(4) {
        keyboard.rows.push(chunk.to_vec());
    }

    keyboard.rows.push(vec![back_control(date, context)]);
    keyboard
}

fn period_control(date: NaiveDate, period: Period, context: Option<&str>) -> Control {
    let token = Token::new(PERIOD_PREFIX)
        .field(period.as_str())
        .field(format_date(date))
        .with_context(context);
    match token.encode() {
        Ok(encoded) => Control::token(period.label(), encoded),
        Err(_) => Control::inert(),
    }
}

fn slot_control(
    date: NaiveDate,
    time: NaiveTime,
    now: NaiveDateTime,
    context: Option<&str>,
) -> Control {
    // Strictly-future rule: a past date disables every slot, today disables
    // everything up to and including the current instant.
    if date.and_time(time) <= now {
        return Control::inert();
    }
    let label = time.format("%H:%M").to_string();
    let token = Token::new(TIME_PREFIX)
        .field(&label)
        .field(format_date(date))
        .with_context(context);
    match token.encode() {
        Ok(encoded) => Control::token(label, encoded),
        Err(_) => Control::inert(),
    }
}

fn back_control(date: NaiveDate, context: Option<&str>) -> Control {
    let token = Token::new(TIME_PREFIX)
        .field(format_date(date))
        .field(BACK)
        .with_context(context);
    match token.encode() {
        Ok(encoded) => Control::token("‹ Back", encoded),
        Err(_) => Control::inert(),
    }
}

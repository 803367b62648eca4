//! Month-grid date picker, rendered purely from a token and "now".
//!
//! The whole flow is stateless: every control carries a navigation token and
//! each invocation reconstructs the grid from that token plus today's date.
//! Days strictly before today render inert so the grid geometry stays stable
//! while the past is disabled.

use chrono::{Datelike, NaiveDate};

use wrenhive_schema::{Control, Keyboard};
use wrenhive_token::Token;

pub const PREFIX: &str = "n";

/// Third-field actions of a navigation token
pub const FORWARD: &str = "++";
pub const BACKWARD: &str = "--";
pub const SELECT: &str = "0";

const WEEKDAYS: [&str; 7] = ["Mo", "Tu", "We", "Th", "Fr", "Sa", "Su"];
const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalendarOutcome {
    /// Keep showing a month grid
    Month(Keyboard),
    /// A concrete date was picked; hand off to the time picker
    Selected(NaiveDate),
}

/// Initial render: the month containing today.
pub fn open(today: NaiveDate, context: Option<&str>) -> Keyboard {
    month_keyboard(today.year(), today.month(), today, context)
}

/// Advance the workflow from a navigation token. Malformed or stale date
/// fields fall back to the current month instead of failing.
pub fn advance(token: &Token, today: NaiveDate) -> CalendarOutcome {
    let context = token.context();
    match token.field_at(2) {
        SELECT => match parse_date(token.field_at(1)) {
            Some(date) => CalendarOutcome::Selected(date),
            None => CalendarOutcome::Month(open(today, context)),
        },
        FORWARD | BACKWARD => {
            let (year, month) =
                parse_month(token.field_at(1)).unwrap_or((today.year(), today.month()));
            let (year, month) = if token.field_at(2) == FORWARD {
                next_month(year, month)
            } else {
                prev_month(year, month)
            };
            CalendarOutcome::Month(month_keyboard(year, month, today, context))
        }
        _ => CalendarOutcome::Month(open(today, context)),
    }
}

/// Title row, week-header row, up to 6 week rows, navigation row.
pub fn month_keyboard(
    year: i32,
    month: u32,
    today: NaiveDate,
    context: Option<&str>,
) -> Keyboard {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .unwrap_or_else(|| today.with_day(1).unwrap_or(today));
    let (year, month) = (first.year(), first.month());

    let mut keyboard = Keyboard::new()
        .row(vec![Control::label_only(format!(
            "{} {year}",
            MONTHS[month as usize - 1]
        ))])
        .row(WEEKDAYS.iter().map(|d| Control::label_only(*d)).collect());

    let offset = first.weekday().num_days_from_monday() as usize;
    let mut row: Vec<Control> = Vec::with_capacity(7);
    row.extend((0..offset).map(|_| Control::inert()));

    for day in 1..=days_in_month(year, month) {
        let date = first.with_day(day).unwrap_or(first);
        row.push(day_control(date, today, context));
        if row.len() == 7 {
            keyboard.rows.push(std::mem::take(&mut row));
        }
    }
    if !row.is_empty() {
        row.resize(7, Control::inert());
        keyboard.rows.push(row);
    }

    keyboard.rows.push(nav_row(year, month, context));
    keyboard
}

fn day_control(date: NaiveDate, today: NaiveDate, context: Option<&str>) -> Control {
    if date < today {
        return Control::inert();
    }
    let token = Token::new(PREFIX)
        .field(format_date(date))
        .field(SELECT)
        .with_context(context);
    match token.encode() {
        Ok(encoded) => Control::token(date.day().to_string(), encoded),
        Err(_) => Control::inert(),
    }
}

fn nav_row(year: i32, month: u32, context: Option<&str>) -> Vec<Control> {
    let nav = |action: &str, label: &str| {
        let token = Token::new(PREFIX)
            .field(format_month(year, month))
            .field(action)
            .with_context(context);
        match token.encode() {
            Ok(encoded) => Control::token(label, encoded),
            Err(_) => Control::inert(),
        }
    };
    vec![nav(BACKWARD, "«"), nav(FORWARD, "»")]
}

pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub(crate) fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

fn format_month(year: i32, month: u32) -> String {
    format!("{year:04}-{month:02}")
}

fn parse_month(s: &str) -> Option<(i32, u32)> {
    let (year, month) = s.split_once('-')?;
    let year: i32 = year.parse().ok()?;
    let month: u32 = month.parse().ok()?;
    if (1..=12).contains(&month) {
        Some((year, month))
    } else {
        None
    }
}

fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month >= 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

fn prev_month(year: i32, month: u32) -> (i32, u32) {
    if month <= 1 {
        (year - 1, 12)
    } else {
        (year, month - 1)
    }
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next) = next_month(year, month);
    NaiveDate::from_ymd_opt(next_year, next, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(31)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wrenhive_schema::ControlAction;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn day_cells(keyboard: &Keyboard) -> Vec<&Control> {
        // Skip title + weekday header, drop the trailing nav row.
        let rows = &keyboard.rows[2..keyboard.rows.len() - 1];
        rows.iter().flatten().collect()
    }

    #[test]
    fn grid_geometry_is_stable() {
        let keyboard = month_keyboard(2025, 3, date(2025, 3, 15), None);
        // March 2025 starts on a Saturday and spans 6 week rows.
        assert_eq!(keyboard.rows.len(), 2 + 6 + 1);
        for row in &keyboard.rows[2..keyboard.rows.len() - 1] {
            assert_eq!(row.len(), 7);
        }
        assert_eq!(day_cells(&keyboard).len(), 6 * 7);
    }

    #[test]
    fn days_before_today_are_blank() {
        let today = date(2025, 3, 15);
        let keyboard = month_keyboard(2025, 3, today, None);

        let mut actionable = 0;
        for control in day_cells(&keyboard) {
            match &control.action {
                ControlAction::Token { token } => {
                    actionable += 1;
                    let decoded = Token::decode(token);
                    let day = parse_date(decoded.field_at(1)).unwrap();
                    assert!(day >= today, "{day} rendered actionable before today");
                }
                _ => {
                    assert!(control.label.is_empty());
                    assert!(control.token_value().is_empty());
                }
            }
        }
        // 15th..31st inclusive stay actionable.
        assert_eq!(actionable, 17);
    }

    #[test]
    fn earlier_month_is_fully_inert() {
        let keyboard = month_keyboard(2025, 2, date(2025, 3, 15), None);
        for control in day_cells(&keyboard) {
            assert!(control.is_inert());
        }
    }

    #[test]
    fn nav_tokens_name_the_rendered_month() {
        let keyboard = month_keyboard(2025, 3, date(2025, 3, 1), None);
        let nav = keyboard.rows.last().unwrap();
        assert_eq!(nav[0].token_value(), "n_2025-03_--");
        assert_eq!(nav[1].token_value(), "n_2025-03_++");
    }

    #[test]
    fn advance_forward_wraps_december() {
        let today = date(2025, 3, 1);
        let token = Token::decode("n_2025-12_++");
        let CalendarOutcome::Month(keyboard) = advance(&token, today) else {
            panic!("expected month render");
        };
        assert_eq!(
            keyboard.rows.last().unwrap()[1].token_value(),
            "n_2026-01_++"
        );
    }

    #[test]
    fn advance_backward_wraps_january() {
        let today = date(2025, 3, 1);
        let token = Token::decode("n_2025-01_--");
        let CalendarOutcome::Month(keyboard) = advance(&token, today) else {
            panic!("expected month render");
        };
        assert_eq!(
            keyboard.rows.last().unwrap()[0].token_value(),
            "n_2024-12_--"
        );
    }

    #[test]
    fn advance_select_hands_off_the_date() {
        let token = Token::decode("n_2025-03-20_0");
        let outcome = advance(&token, date(2025, 3, 15));
        assert_eq!(outcome, CalendarOutcome::Selected(date(2025, 3, 20)));
    }

    #[test]
    fn advance_with_stale_fields_falls_back_to_current_month() {
        let today = date(2025, 6, 10);
        for raw in ["n_garbage_++", "n", "n_2025-13_--", "n_banana_0"] {
            let token = Token::decode(raw);
            let CalendarOutcome::Month(keyboard) = advance(&token, today) else {
                panic!("expected month render for {raw}");
            };
            let nav = keyboard.rows.last().unwrap();
            assert!(
                nav[0].token_value().starts_with("n_2025-0"),
                "fallback month for {raw}: {}",
                nav[0].token_value()
            );
        }
    }

    #[test]
    fn context_is_propagated_onto_every_actionable_control() {
        let keyboard = month_keyboard(2025, 3, date(2025, 3, 15), Some("p-42"));
        let mut seen = 0;
        for control in keyboard.controls() {
            if let ControlAction::Token { token } = &control.action {
                assert_eq!(Token::decode(token).context(), Some("p-42"), "{token}");
                seen += 1;
            }
        }
        assert!(seen > 2);
    }
}

//! Derived metrics: deltas, progress, averages and status labels.
//!
//! Every function here is total. Missing or non-numeric cells become zero in
//! sums and `Change::Unknown` elsewhere; nothing in this module returns an error.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

use crate::data::Record;

pub const DEFAULT_SCALE_MAX: f64 = 5.0;
pub const PLACEHOLDER: &str = "-";

/// Leading-prefix float parse: `"12%"` is 12, `"3.5 days"` is 3.5, `"abc"` is None.
pub fn parse_numeric(text: Option<&str>) -> Option<f64> {
    let s = text?.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            end = frac_end;
        }
    }
    if digits == 0 {
        return None;
    }
    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && matches!(bytes[exp_end], b'+' | b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }
    s[..end].parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Leading-prefix integer parse, used for count columns.
pub fn parse_integer(text: Option<&str>) -> Option<i64> {
    let s = text?.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end == digits_start {
        return None;
    }
    s[..end].parse::<i64>().ok()
}

/// Signed movement from baseline to current.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Change {
    Unknown,
    Delta(f64),
}

impl Change {
    /// The delta at display precision (one decimal place).
    pub fn rounded(&self) -> Option<f64> {
        match self {
            Change::Unknown => None,
            Change::Delta(d) => {
                let r = (d * 10.0).round() / 10.0;
                // fold -0.0 into 0.0
                Some(if r == 0.0 { 0.0 } else { r })
            }
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Change::Delta(_))
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.rounded() {
            None => f.write_str(PLACEHOLDER),
            Some(r) if r >= 0.0 => write!(f, "+{:.1}", r),
            Some(r) => write!(f, "{:.1}", r),
        }
    }
}

impl Serialize for Change {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

pub fn change(baseline: Option<&str>, current: Option<&str>) -> Change {
    match (parse_numeric(baseline), parse_numeric(current)) {
        (Some(b), Some(c)) => Change::Delta(c - b),
        _ => Change::Unknown,
    }
}

/// Progress from `baseline` toward `scale_max`, clamped to 0..=100.
///
/// When the baseline already sits at the top of the scale the result is 100
/// if `current` held its ground and 0 otherwise.
pub fn progress_percent(baseline: Option<&str>, current: Option<&str>, scale_max: f64) -> u8 {
    let (b, c) = match (parse_numeric(baseline), parse_numeric(current)) {
        (Some(b), Some(c)) => (b, c),
        _ => return 0,
    };
    let span = scale_max - b;
    if span == 0.0 {
        return if c >= b { 100 } else { 0 };
    }
    let pct = (c - b) / span * 100.0;
    if pct.is_nan() {
        return 0;
    }
    pct.clamp(0.0, 100.0).round() as u8
}

fn mean_of<'a, I>(records: I, field: &str) -> Option<f64>
where
    I: IntoIterator<Item = &'a Record>,
{
    let (sum, n) = records.into_iter().fold((0.0, 0usize), |(sum, n), r| {
        (sum + parse_numeric(r.get(field)).unwrap_or(0.0), n + 1)
    });
    if n == 0 {
        None
    } else {
        Some(sum / n as f64)
    }
}

/// Mean of `field` across all records, one fraction digit. `"0.0"` when empty.
pub fn average_of<'a, I>(records: I, field: &str) -> String
where
    I: IntoIterator<Item = &'a Record>,
{
    format!("{:.1}", mean_of(records, field).unwrap_or(0.0))
}

/// Mean `completion` as a whole percent. 0 when empty.
pub fn average_completion<'a, I>(records: I) -> u32
where
    I: IntoIterator<Item = &'a Record>,
{
    mean_of(records, "completion")
        .map(|m| m.round().max(0.0) as u32)
        .unwrap_or(0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    Completed,
    InProgress,
    NotStarted,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Completed => "completed",
            Status::InProgress => "in-progress",
            Status::NotStarted => "not-started",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Priority {
    QuickWin,
    Strategic,
    Other,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::QuickWin => "quick-win",
            Priority::Strategic => "strategic",
            Priority::Other => "other",
        }
    }
}

/// Status from a delta, read at display precision.
pub fn classify_status(change: &Change) -> Status {
    match change.rounded() {
        Some(v) if v > 0.0 => Status::Completed,
        Some(v) if v < 0.0 => Status::NotStarted,
        _ => Status::InProgress,
    }
}

/// Status from an already-rendered change such as `"+1.5"` or `"-"`.
pub fn classify_status_text(change: &str) -> Status {
    match parse_numeric(Some(change)) {
        Some(v) => classify_status(&Change::Delta(v)),
        None => Status::InProgress,
    }
}

pub fn classify_free_text_status(text: Option<&str>) -> Status {
    let lower = text.unwrap_or("").to_lowercase();
    if lower.contains("complete") {
        Status::Completed
    } else if lower.contains("progress") {
        Status::InProgress
    } else {
        Status::NotStarted
    }
}

pub fn classify_priority(text: Option<&str>) -> Priority {
    let lower = text.unwrap_or("").to_lowercase();
    if lower.contains("quick") {
        Priority::QuickWin
    } else if lower.contains("strategic") {
        Priority::Strategic
    } else {
        Priority::Other
    }
}

/// Arrow shown next to a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Flat,
    Unknown,
}

impl Direction {
    pub fn of(change: &Change) -> Self {
        match change.rounded() {
            None => Direction::Unknown,
            Some(v) if v > 0.0 => Direction::Up,
            Some(v) if v < 0.0 => Direction::Down,
            Some(_) => Direction::Flat,
        }
    }

    pub fn arrow(&self) -> &'static str {
        match self {
            Direction::Up => "↑",
            Direction::Down => "↓",
            Direction::Flat => "→",
            Direction::Unknown => "",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_numeric_prefix_semantics() {
        assert_eq!(parse_numeric(Some("12%")), Some(12.0));
        assert_eq!(parse_numeric(Some(" 3.5 days")), Some(3.5));
        assert_eq!(parse_numeric(Some("-0.25")), Some(-0.25));
        assert_eq!(parse_numeric(Some(".5")), Some(0.5));
        assert_eq!(parse_numeric(Some("4.")), Some(4.0));
        assert_eq!(parse_numeric(Some("1e3x")), Some(1000.0));
        assert_eq!(parse_numeric(Some("2e")), Some(2.0));
        assert_eq!(parse_numeric(Some("abc")), None);
        assert_eq!(parse_numeric(Some("-")), None);
        assert_eq!(parse_numeric(Some("")), None);
        assert_eq!(parse_numeric(None), None);
    }

    #[test]
    fn test_parse_integer_truncates() {
        assert_eq!(parse_integer(Some("7 items")), Some(7));
        assert_eq!(parse_integer(Some("3.9")), Some(3));
        assert_eq!(parse_integer(Some("n/a")), None);
    }

    #[test]
    fn test_change_formatting() {
        assert_eq!(change(Some("10"), Some("12.5")).to_string(), "+2.5");
        assert_eq!(change(Some("12.5"), Some("10")).to_string(), "-2.5");
        assert_eq!(change(Some("3"), Some("3")).to_string(), "+0.0");
        assert_eq!(change(Some("3"), Some("2.96")).to_string(), "+0.0");
        assert_eq!(change(Some("15%"), Some("9%")).to_string(), "-6.0");
    }

    #[test]
    fn test_change_unknown_inputs() {
        assert_eq!(change(None, Some("5")), Change::Unknown);
        assert_eq!(change(Some("n/a"), Some("5")), Change::Unknown);
        assert_eq!(change(None, Some("5")).to_string(), "-");
        assert_eq!(classify_status_text("-"), Status::InProgress);
    }

    #[test]
    fn test_change_tracks_difference_and_status() {
        let samples = [(-3.0, 4.25), (0.0, 0.0), (7.5, 1.2), (2.0, 2.35), (100.0, 99.0)];
        for (b, c) in samples {
            let ch = change(Some(&b.to_string()), Some(&c.to_string()));
            let shown = parse_numeric(Some(&ch.to_string())).unwrap();
            assert!((shown - (c - b)).abs() <= 0.05 + 1e-9, "b={} c={}", b, c);
            let expected = if shown > 0.0 {
                Status::Completed
            } else if shown < 0.0 {
                Status::NotStarted
            } else {
                Status::InProgress
            };
            assert_eq!(classify_status(&ch), expected);
            assert_eq!(classify_status_text(&ch.to_string()), expected);
        }
    }

    #[test]
    fn test_progress_scenario() {
        assert_eq!(progress_percent(Some("1.0"), Some("3.0"), DEFAULT_SCALE_MAX), 50);
    }

    #[test]
    fn test_progress_clamps_and_handles_missing() {
        assert_eq!(progress_percent(Some("2"), Some("1"), 5.0), 0);
        assert_eq!(progress_percent(Some("2"), Some("9"), 5.0), 100);
        assert_eq!(progress_percent(None, Some("3"), 5.0), 0);
        assert_eq!(progress_percent(Some("x"), Some("3"), 5.0), 0);
        assert_eq!(progress_percent(Some("1"), Some("2"), 5.0), 25);
    }

    #[test]
    fn test_progress_at_top_of_scale() {
        assert_eq!(progress_percent(Some("5"), Some("5"), 5.0), 100);
        assert_eq!(progress_percent(Some("5"), Some("4.5"), 5.0), 0);
    }

    #[test]
    fn test_progress_is_monotonic() {
        let mut last = 0u8;
        for step in 0..=60 {
            let current = step as f64 * 0.1;
            let p = progress_percent(Some("1.2"), Some(&current.to_string()), 5.0);
            assert!(p >= last, "current={} p={} last={}", current, p, last);
            assert!(p <= 100);
            last = p;
        }
        assert_eq!(last, 100);
    }

    #[test]
    fn test_progress_saturates_on_huge_values() {
        assert_eq!(progress_percent(Some("0"), Some("10"), 5.0), 100);
        assert_eq!(progress_percent(Some("0"), Some("1e308"), 5.0), 100);
        assert_eq!(progress_percent(Some("0"), Some("-1e308"), 5.0), 0);
        assert_eq!(progress_percent(Some("-1e308"), Some("1e308"), 5.0), 100);
    }

    #[test]
    fn test_average_of() {
        let empty: Vec<Record> = Vec::new();
        assert_eq!(average_of(&empty, "week10"), "0.0");

        let rows = vec![
            Record::from_pairs(&[("week10", "3.0")]),
            Record::from_pairs(&[("week10", "n/a")]),
            Record::from_pairs(&[("week10", "4.5")]),
        ];
        assert_eq!(average_of(&rows, "week10"), "2.5");
    }

    #[test]
    fn test_average_completion_scenario() {
        let rows = vec![
            Record::from_pairs(&[("phase", "1"), ("completion", "50")]),
            Record::from_pairs(&[("phase", "1"), ("completion", "100")]),
        ];
        assert_eq!(average_completion(&rows), 75);
        let empty: Vec<Record> = Vec::new();
        assert_eq!(average_completion(&empty), 0);
    }

    #[test]
    fn test_free_text_status() {
        assert_eq!(classify_free_text_status(Some("Completed")), Status::Completed);
        assert_eq!(classify_free_text_status(Some("in PROGRESS")), Status::InProgress);
        assert_eq!(classify_free_text_status(Some("Blocked")), Status::NotStarted);
        assert_eq!(classify_free_text_status(None), Status::NotStarted);
    }

    #[test]
    fn test_priority() {
        assert_eq!(classify_priority(Some("Quick Win")), Priority::QuickWin);
        assert_eq!(classify_priority(Some("STRATEGIC bet")), Priority::Strategic);
        assert_eq!(classify_priority(Some("Nice to have")), Priority::Other);
        assert_eq!(classify_priority(None), Priority::Other);
    }

    #[test]
    fn test_direction() {
        assert_eq!(Direction::of(&Change::Delta(1.0)), Direction::Up);
        assert_eq!(Direction::of(&Change::Delta(-0.2)), Direction::Down);
        assert_eq!(Direction::of(&Change::Delta(0.01)), Direction::Flat);
        assert_eq!(Direction::of(&Change::Unknown), Direction::Unknown);
    }

    #[test]
    fn test_change_serializes_as_display() {
        let json = serde_json::to_string(&Change::Delta(-1.25)).unwrap();
        assert_eq!(json, "\"-1.3\"");
    }
}

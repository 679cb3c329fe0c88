use chrono::{Months, NaiveDate};
use std::collections::HashMap;
use std::fmt;

use crate::config::Period;

const AVERAGE_DAYS_PER_YEAR: f64 = 365.25;

#[derive(Debug)]
pub enum DateError {
    NotSorted {
        previous: NaiveDate,
        current: NaiveDate,
    },
    BadToken(String),
    BadYear(i32),
    NoTestedDates,
}

impl fmt::Display for DateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateError::NotSorted { previous, current } => write!(
                f,
                "dates should be sorted in ascending order ({} follows {})",
                current, previous
            ),
            DateError::BadToken(token) => {
                write!(f, "'{}' is not a valid YYYYMMDD date", token)
            }
            DateError::BadYear(year) => write!(f, "invalid measurement year: {}", year),
            DateError::NoTestedDates => write!(f, "no tested dates available in the input table"),
        }
    }
}

impl std::error::Error for DateError {}

/// How one dated source takes part in the fusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Processing {
    /// Inside the date window, sampled and attached as a column.
    Full,
    /// Outside the window but anchoring the first in-window rate-of-change.
    DifferentialBoundary,
    /// Outside the window, ignored.
    Skip,
}

#[derive(Debug, Clone)]
pub struct DatedEntry {
    /// Prefix + `YYYYMMDD`, used as the attached column name.
    pub date_tag: String,
    pub date: NaiveDate,
    /// Fractional months since the previous classified entry, 0 for the first.
    pub months: f64,
    pub processing: Processing,
}

/// Inclusive date selection window.
#[derive(Debug, Clone, Copy)]
pub struct DateWindow {
    pub min: NaiveDate,
    pub max: NaiveDate,
}

impl DateWindow {
    /// The whole representable range.
    pub fn all() -> Self {
        Self {
            min: NaiveDate::MIN,
            max: NaiveDate::MAX,
        }
    }

    /// One year back from the latest tested date.
    pub fn trailing_year(tested: &[NaiveDate]) -> Result<Self, DateError> {
        let max = tested.iter().max().copied().ok_or(DateError::NoTestedDates)?;
        let min = max
            .checked_sub_months(Months::new(12))
            .ok_or(DateError::NoTestedDates)?;
        Ok(Self { min, max })
    }

    /// Three months either side of January 1st of the measurement year.
    pub fn winter(year: i32) -> Result<Self, DateError> {
        let anchor = NaiveDate::from_ymd_opt(year, 1, 1).ok_or(DateError::BadYear(year))?;
        let min = anchor
            .checked_sub_months(Months::new(3))
            .ok_or(DateError::BadYear(year))?;
        let max = anchor
            .checked_add_months(Months::new(3))
            .ok_or(DateError::BadYear(year))?;
        Ok(Self { min, max })
    }

    pub fn for_period(
        period: Period,
        measurement_year: i32,
        tested: &[NaiveDate],
    ) -> Result<Self, DateError> {
        match period {
            Period::Year => Self::trailing_year(tested),
            Period::Winter => Self::winter(measurement_year),
            Period::All => Ok(Self::all()),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.min && date <= self.max
    }
}

/// First run of eight consecutive digits in `key`, if any.
pub fn find_date_token(key: &str) -> Option<&str> {
    let bytes = key.as_bytes();
    if bytes.len() < 8 {
        return None;
    }
    (0..=bytes.len() - 8)
        .find(|&i| bytes[i..i + 8].iter().all(u8::is_ascii_digit))
        .map(|i| &key[i..i + 8])
}

/// Whether `label` carries the marker immediately followed by a date token,
/// e.g. `D20140101` for marker `D`. Labels failing this test are plain
/// attributes even when they contain digits elsewhere.
pub fn is_dated_label(label: &str, marker: &str) -> bool {
    // Advance by whole characters; a one-byte step would split a
    // multi-byte marker and panic on the reslice
    let step = marker.chars().next().map_or(1, char::len_utf8);
    let mut rest = label;
    while let Some(at) = rest.find(marker) {
        let tail = &rest[at + marker.len()..];
        if tail.len() >= 8 && tail.as_bytes()[..8].iter().all(u8::is_ascii_digit) {
            return true;
        }
        rest = &rest[at + step..];
    }
    false
}

/// A compact numeric date such as `20140101` read from a table cell.
pub fn parse_compact_date(value: f64) -> Result<NaiveDate, DateError> {
    let token = format!("{:08}", value as i64);
    NaiveDate::parse_from_str(&token, "%Y%m%d").map_err(|_| DateError::BadToken(token))
}

/// Classifies an ordered stack of keys (file names or column labels) carrying
/// `YYYYMMDD` tokens against a date window.
///
/// Keys without a token are skipped entirely. Dates must be ascending; a
/// violation is an error, never a silent resort. Returns `Ok(None)` when no
/// token was found in the whole stack, which callers must treat as fatal
/// rather than as zero matches.
///
/// When `differential` is set, the entry immediately preceding the first
/// in-window entry is relabeled as the differential boundary so that a
/// rate-of-change can be anchored just before the window opens. This is done
/// in a second pass over the provisional states.
pub fn classify_stack(
    keys: &[String],
    window: &DateWindow,
    differential: bool,
    prefix: &str,
) -> Result<Option<HashMap<String, DatedEntry>>, DateError> {
    let mut entries: Vec<(String, DatedEntry)> = Vec::new();
    let mut prev_date: Option<NaiveDate> = None;

    for key in keys {
        let Some(token) = find_date_token(key) else {
            continue;
        };
        let date = NaiveDate::parse_from_str(token, "%Y%m%d")
            .map_err(|_| DateError::BadToken(token.to_string()))?;

        if let Some(previous) = prev_date
            && date < previous
        {
            return Err(DateError::NotSorted {
                previous,
                current: date,
            });
        }

        // Delta to the true previous entry in iteration order, whatever its
        // state ends up being.
        let months = match prev_date {
            None => 0.0,
            Some(previous) => {
                12.0 * (date - previous).num_days() as f64 / AVERAGE_DAYS_PER_YEAR
            }
        };

        let processing = if window.contains(date) {
            Processing::Full
        } else {
            Processing::Skip
        };

        entries.push((
            key.clone(),
            DatedEntry {
                date_tag: format!("{prefix}{token}"),
                date,
                months,
                processing,
            },
        ));
        prev_date = Some(date);
    }

    if entries.is_empty() {
        return Ok(None);
    }

    // Second pass: single look-back relabel of the entry just before the
    // first in-window one.
    if differential
        && let Some(first_full) = entries
            .iter()
            .position(|(_, e)| e.processing == Processing::Full)
        && first_full > 0
        && entries[first_full - 1].1.processing == Processing::Skip
    {
        entries[first_full - 1].1.processing = Processing::DifferentialBoundary;
    }

    Ok(Some(entries.into_iter().collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(min: (i32, u32, u32), max: (i32, u32, u32)) -> DateWindow {
        DateWindow {
            min: NaiveDate::from_ymd_opt(min.0, min.1, min.2).unwrap(),
            max: NaiveDate::from_ymd_opt(max.0, max.1, max.2).unwrap(),
        }
    }

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_states_follow_the_window() {
        let stack = keys(&["amp_20140101.tif", "amp_20140701.tif", "amp_20140801.tif"]);
        let dates = classify_stack(&stack, &window((2014, 6, 1), (2014, 9, 1)), false, "A")
            .unwrap()
            .unwrap();

        assert_eq!(dates["amp_20140101.tif"].processing, Processing::Skip);
        assert_eq!(dates["amp_20140701.tif"].processing, Processing::Full);
        assert_eq!(dates["amp_20140801.tif"].processing, Processing::Full);
        assert_eq!(dates["amp_20140701.tif"].date_tag, "A20140701");
    }

    #[test]
    fn test_months_delta_uses_the_true_previous_entry() {
        let stack = keys(&["amp_20140101.tif", "amp_20140701.tif", "amp_20140801.tif"]);
        let dates = classify_stack(&stack, &window((2014, 6, 1), (2014, 9, 1)), false, "A")
            .unwrap()
            .unwrap();

        // First processed entry is always 0, later entries measure back to
        // their immediate predecessor even when that one was skipped.
        assert_eq!(dates["amp_20140101.tif"].months, 0.0);
        assert!((dates["amp_20140701.tif"].months - 12.0 * 181.0 / 365.25).abs() < 1e-9);
        assert!((dates["amp_20140801.tif"].months - 12.0 * 31.0 / 365.25).abs() < 1e-9);
    }

    #[test]
    fn test_differential_relabels_the_window_predecessor() {
        let stack = keys(&["amp_20140101.tif", "amp_20140701.tif", "amp_20140801.tif"]);
        let dates = classify_stack(&stack, &window((2014, 6, 1), (2014, 9, 1)), true, "A")
            .unwrap()
            .unwrap();

        assert_eq!(
            dates["amp_20140101.tif"].processing,
            Processing::DifferentialBoundary
        );
        assert_eq!(dates["amp_20140701.tif"].processing, Processing::Full);
    }

    #[test]
    fn test_differential_promotes_at_most_one_entry() {
        let stack = keys(&[
            "amp_20131001.tif",
            "amp_20131101.tif",
            "amp_20140701.tif",
            "amp_20141201.tif",
        ]);
        let dates = classify_stack(&stack, &window((2014, 6, 1), (2014, 9, 1)), true, "A")
            .unwrap()
            .unwrap();

        let boundaries = dates
            .values()
            .filter(|e| e.processing == Processing::DifferentialBoundary)
            .count();
        assert_eq!(boundaries, 1);
        assert_eq!(
            dates["amp_20131101.tif"].processing,
            Processing::DifferentialBoundary
        );
        assert_eq!(dates["amp_20141201.tif"].processing, Processing::Skip);
    }

    #[test]
    fn test_classification_is_idempotent() {
        let stack = keys(&["amp_20140101.tif", "amp_20140701.tif", "amp_20140801.tif"]);
        let win = window((2014, 6, 1), (2014, 9, 1));

        let first = classify_stack(&stack, &win, true, "A").unwrap().unwrap();
        let second = classify_stack(&stack, &win, true, "A").unwrap().unwrap();

        for key in &stack {
            assert_eq!(first[key].processing, second[key].processing);
            assert_eq!(first[key].months, second[key].months);
        }
    }

    #[test]
    fn test_no_full_state_outside_the_window() {
        let stack = keys(&["a_20130101.tif", "a_20140701.tif", "a_20151231.tif"]);
        let win = window((2014, 6, 1), (2014, 9, 1));
        let dates = classify_stack(&stack, &win, false, "A").unwrap().unwrap();

        for entry in dates.values() {
            if entry.processing == Processing::Full {
                assert!(win.contains(entry.date));
            }
        }
    }

    #[test]
    fn test_unsorted_dates_are_fatal() {
        let stack = keys(&["amp_20140801.tif", "amp_20140101.tif"]);
        let result = classify_stack(&stack, &window((2014, 1, 1), (2014, 12, 31)), false, "A");

        assert!(matches!(result, Err(DateError::NotSorted { .. })));
    }

    #[test]
    fn test_stack_without_tokens_yields_no_classification() {
        let stack = keys(&["overview.tif", "notes.txt"]);
        let result = classify_stack(&stack, &DateWindow::all(), false, "A").unwrap();

        assert!(result.is_none());
    }

    #[test]
    fn test_tokenless_keys_are_skipped_silently() {
        let stack = keys(&["readme.txt", "amp_20140701.tif"]);
        let dates = classify_stack(&stack, &DateWindow::all(), false, "A")
            .unwrap()
            .unwrap();

        assert_eq!(dates.len(), 1);
        assert!(dates.contains_key("amp_20140701.tif"));
    }

    #[test]
    fn test_find_date_token() {
        assert_eq!(find_date_token("amp_20140101.tif"), Some("20140101"));
        assert_eq!(find_date_token("D20140101"), Some("20140101"));
        // First eight digits of a longer run
        assert_eq!(find_date_token("201401015"), Some("20140101"));
        assert_eq!(find_date_token("amp_2014.tif"), None);
    }

    #[test]
    fn test_is_dated_label() {
        assert!(is_dated_label("D20140101", "D"));
        assert!(!is_dated_label("VEL_20140101", "D"));
        assert!(!is_dated_label("SHP_X", "D"));
        // The marker must immediately precede the token
        assert!(!is_dated_label("D_20140101", "D"));
        assert!(is_dated_label("XD20140101", "D"));
    }

    #[test]
    fn test_is_dated_label_with_multibyte_marker() {
        assert!(is_dated_label("Δ20140101", "Δ"));
        // An earlier non-dated occurrence must not derail the scan
        assert!(is_dated_label("Δx_Δ20140101", "Δ"));
        assert!(!is_dated_label("Δx_Δ2014", "Δ"));
        assert!(!is_dated_label("ΔΔΔ", "Δ"));
    }

    #[test]
    fn test_winter_window() {
        let win = DateWindow::winter(2014).unwrap();
        assert_eq!(win.min, NaiveDate::from_ymd_opt(2013, 10, 1).unwrap());
        assert_eq!(win.max, NaiveDate::from_ymd_opt(2014, 4, 1).unwrap());
    }

    #[test]
    fn test_trailing_year_window() {
        let tested = vec![
            NaiveDate::from_ymd_opt(2014, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2014, 9, 15).unwrap(),
        ];
        let win = DateWindow::trailing_year(&tested).unwrap();
        assert_eq!(win.max, NaiveDate::from_ymd_opt(2014, 9, 15).unwrap());
        assert_eq!(win.min, NaiveDate::from_ymd_opt(2013, 9, 15).unwrap());

        assert!(matches!(
            DateWindow::trailing_year(&[]),
            Err(DateError::NoTestedDates)
        ));
    }

    #[test]
    fn test_parse_compact_date() {
        let date = parse_compact_date(20140101.0).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2014, 1, 1).unwrap());

        assert!(parse_compact_date(20141301.0).is_err());
    }
}

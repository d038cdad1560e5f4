//! Field extraction helpers shared by the entity mappers.
//!
//! Absent and `null` fields read as `None`. A present field of the wrong JSON
//! type is a [`MappingError::InvalidField`].

use fhir_ingest_core::{MappingError, reference_id};
use serde_json::Value;

pub(crate) fn text(
    entity: &'static str,
    obj: &Value,
    key: &str,
) -> Result<Option<String>, MappingError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(MappingError::invalid(entity, key, "a string")),
    }
}

/// Non-empty string field that must be present.
pub(crate) fn required_text(
    entity: &'static str,
    obj: &Value,
    key: &str,
) -> Result<String, MappingError> {
    text(entity, obj, key)?
        .filter(|s| !s.is_empty())
        .ok_or_else(|| MappingError::missing(entity, key))
}

pub(crate) fn boolean(
    entity: &'static str,
    obj: &Value,
    key: &str,
) -> Result<Option<bool>, MappingError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(_) => Err(MappingError::invalid(entity, key, "a boolean")),
    }
}

pub(crate) fn integer(
    entity: &'static str,
    obj: &Value,
    key: &str,
) -> Result<Option<i64>, MappingError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| MappingError::invalid(entity, key, "an integer")),
    }
}

pub(crate) fn number(
    entity: &'static str,
    obj: &Value,
    key: &str,
) -> Result<Option<f64>, MappingError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_f64()
            .map(Some)
            .ok_or_else(|| MappingError::invalid(entity, key, "a number")),
    }
}

pub(crate) fn object<'a>(
    entity: &'static str,
    obj: &'a Value,
    key: &str,
) -> Result<Option<&'a Value>, MappingError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v @ Value::Object(_)) => Ok(Some(v)),
        Some(_) => Err(MappingError::invalid(entity, key, "an object")),
    }
}

/// Array field; absent reads as empty.
pub(crate) fn array<'a>(
    entity: &'static str,
    obj: &'a Value,
    key: &str,
) -> Result<&'a [Value], MappingError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(Default::default()),
        Some(Value::Array(items)) => Ok(items.as_slice()),
        Some(_) => Err(MappingError::invalid(entity, key, "an array")),
    }
}

/// Joins an array of strings with `separator`; `None` when absent or empty.
pub(crate) fn joined(
    entity: &'static str,
    obj: &Value,
    key: &str,
    separator: &str,
) -> Result<Option<String>, MappingError> {
    let items = array(entity, obj, key)?;
    let mut parts = Vec::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        match item {
            Value::String(s) => parts.push(s.as_str()),
            Value::Null => {}
            _ => {
                return Err(MappingError::invalid(
                    entity,
                    format!("{key}[{idx}]"),
                    "a string",
                ));
            }
        }
    }
    Ok((!parts.is_empty()).then(|| parts.join(separator)))
}

/// First coding and text of a CodeableConcept.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Concept {
    pub code: Option<String>,
    pub system: Option<String>,
    pub display: Option<String>,
    pub text: Option<String>,
}

impl Concept {
    /// Coded value, falling back to the free text.
    pub fn code_or_text(&self) -> Option<String> {
        self.code.clone().or_else(|| self.text.clone())
    }

    pub fn display_or_text(&self) -> Option<String> {
        self.display.clone().or_else(|| self.text.clone())
    }
}

fn concept_from(entity: &'static str, value: &Value, path: &str) -> Result<Concept, MappingError> {
    if !value.is_object() {
        return Err(MappingError::invalid(entity, path, "an object"));
    }
    let mut concept = Concept {
        text: text(entity, value, "text")
            .map_err(|_| MappingError::invalid(entity, format!("{path}.text"), "a string"))?,
        ..Concept::default()
    };
    let codings = array(entity, value, "coding")
        .map_err(|_| MappingError::invalid(entity, format!("{path}.coding"), "an array"))?;
    if let Some(first) = codings.first() {
        concept.code = coding_text(entity, first, path, "code")?;
        concept.system = coding_text(entity, first, path, "system")?;
        concept.display = coding_text(entity, first, path, "display")?;
    }
    Ok(concept)
}

fn coding_text(
    entity: &'static str,
    coding: &Value,
    path: &str,
    key: &str,
) -> Result<Option<String>, MappingError> {
    if !coding.is_object() {
        return Err(MappingError::invalid(
            entity,
            format!("{path}.coding[0]"),
            "an object",
        ));
    }
    text(entity, coding, key)
        .map_err(|_| MappingError::invalid(entity, format!("{path}.coding[0].{key}"), "a string"))
}

/// CodeableConcept stored under `key`.
pub(crate) fn concept(
    entity: &'static str,
    obj: &Value,
    key: &str,
) -> Result<Option<Concept>, MappingError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => concept_from(entity, v, key).map(Some),
    }
}

/// First element of a CodeableConcept array stored under `key`.
pub(crate) fn first_concept(
    entity: &'static str,
    obj: &Value,
    key: &str,
) -> Result<Option<Concept>, MappingError> {
    match array(entity, obj, key)?.first() {
        Some(v) => concept_from(entity, v, &format!("{key}[0]")).map(Some),
        None => Ok(None),
    }
}

/// Bare id of the Reference stored under `key`.
pub(crate) fn reference(
    entity: &'static str,
    obj: &Value,
    key: &str,
) -> Result<Option<String>, MappingError> {
    let Some(reference) = object(entity, obj, key)? else {
        return Ok(None);
    };
    let raw = text(entity, reference, "reference")
        .map_err(|_| MappingError::invalid(entity, format!("{key}.reference"), "a string"))?;
    Ok(raw.and_then(|r| reference_id(&r)))
}

/// FHIR `date` field widened to a full calendar date.
pub(crate) fn date(
    entity: &'static str,
    obj: &Value,
    key: &str,
) -> Result<Option<String>, MappingError> {
    match text(entity, obj, key)? {
        Some(raw) => normalize_date(&raw)
            .map(Some)
            .ok_or_else(|| MappingError::invalid(entity, key, "a FHIR date")),
        None => Ok(None),
    }
}

/// FHIR `dateTime`/`instant` field widened to a full timestamp.
pub(crate) fn date_time(
    entity: &'static str,
    obj: &Value,
    key: &str,
) -> Result<Option<String>, MappingError> {
    match text(entity, obj, key)? {
        Some(raw) => normalize_date_time(&raw)
            .map(Some)
            .ok_or_else(|| MappingError::invalid(entity, key, "a FHIR dateTime")),
        None => Ok(None),
    }
}

/// Start and end of a Period stored under `key`.
pub(crate) fn period(
    entity: &'static str,
    obj: &Value,
    key: &str,
) -> Result<(Option<String>, Option<String>), MappingError> {
    let Some(period) = object(entity, obj, key)? else {
        return Ok((None, None));
    };
    let start = date_time(entity, period, "start")
        .map_err(|e| MappingError::invalid(entity, format!("{key}.start"), expected(&e)))?;
    let end = date_time(entity, period, "end")
        .map_err(|e| MappingError::invalid(entity, format!("{key}.end"), expected(&e)))?;
    Ok((start, end))
}

fn expected(err: &MappingError) -> &'static str {
    match err {
        MappingError::InvalidField { expected, .. } => *expected,
        MappingError::MissingField { .. } => "present",
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// `s` as a number when it is exactly `width` ASCII digits.
fn fixed_digits(s: &str, width: usize) -> Option<u32> {
    if s.len() == width && is_digits(s) {
        s.parse().ok()
    } else {
        None
    }
}

fn days_in_month(year: u32, month: u32) -> u32 {
    match month {
        2 if year % 4 == 0 && (year % 100 != 0 || year % 400 == 0) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

/// Widens `YYYY` and `YYYY-MM` to the first day of the period.
///
/// Out-of-range months and days are rejected.
pub(crate) fn normalize_date(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if !trimmed.is_ascii() {
        return None;
    }
    let parts: Vec<&str> = trimmed.split('-').collect();
    let year = fixed_digits(parts[0], 4).filter(|y| *y > 0)?;
    let month = match parts.get(1) {
        Some(m) => Some(fixed_digits(m, 2).filter(|m| (1..=12).contains(m))?),
        None => None,
    };
    let day = match (parts.get(2), month) {
        (Some(d), Some(month)) => {
            Some(fixed_digits(d, 2).filter(|d| (1..=days_in_month(year, month)).contains(d))?)
        }
        _ => None,
    };

    match (parts.len(), month, day) {
        (1, None, None) => Some(format!("{year:04}-01-01")),
        (2, Some(month), None) => Some(format!("{year:04}-{month:02}-01")),
        (3, Some(month), Some(day)) => Some(format!("{year:04}-{month:02}-{day:02}")),
        _ => None,
    }
}

/// `hh:mm`, `hh:mm:ss` or `hh:mm:ss.fff`.
fn is_clock(clock: &str) -> bool {
    let (hms, fraction) = match clock.split_once('.') {
        Some((hms, fraction)) => (hms, Some(fraction)),
        None => (clock, None),
    };
    if fraction.is_some_and(|f| !is_digits(f)) {
        return false;
    }
    let in_range = |s: &str, max: u32| fixed_digits(s, 2).is_some_and(|v| v <= max);
    match hms.split(':').collect::<Vec<_>>().as_slice() {
        &[h, m] => fraction.is_none() && in_range(h, 23) && in_range(m, 59),
        &[h, m, sec] => in_range(h, 23) && in_range(m, 59) && in_range(sec, 60),
        _ => false,
    }
}

/// `Z` or `+hh:mm` / `-hh:mm`.
fn is_zone(zone: &str) -> bool {
    if zone == "Z" {
        return true;
    }
    let Some(offset) = zone.strip_prefix(['+', '-']) else {
        return false;
    };
    match offset.split_once(':') {
        Some((h, m)) => {
            fixed_digits(h, 2).is_some_and(|h| h <= 14) && fixed_digits(m, 2).is_some_and(|m| m <= 59)
        }
        None => false,
    }
}

/// Time part of a dateTime: a clock followed by a mandatory zone.
fn is_time_of_day(time: &str) -> bool {
    match time.find(['Z', '+', '-']) {
        Some(pos) => {
            let (clock, zone) = time.split_at(pos);
            is_clock(clock) && is_zone(zone)
        }
        None => false,
    }
}

/// Widens partial dates to midnight UTC. Full timestamps pass through once
/// both the calendar date and the time of day are valid.
pub(crate) fn normalize_date_time(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if !trimmed.is_ascii() {
        return None;
    }
    if let Some((day, time)) = trimmed.split_once('T') {
        let valid = day.len() == 10 && normalize_date(day).is_some() && is_time_of_day(time);
        return valid.then(|| trimmed.to_string());
    }
    normalize_date(trimmed).map(|day| format!("{day}T00:00:00Z"))
}

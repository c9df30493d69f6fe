// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! OCR result normalization
//!
//! PaddleOCR has returned two different result layouts across versions:
//!
//! - legacy: a list of pages, each a list of `[box, [text, score]]` entries
//! - dictionary: a list of page objects with parallel `rec_texts`,
//!   `rec_polys` and `rec_scores` arrays
//!
//! Every page is classified by what it supports (index access or key lookup)
//! and flattened into one ordered list of [`DetectionRecord`]s. A dictionary
//! page that cannot be read falls back to a diagnostic dump of its keys.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use super::engine::RawResult;

/// Confidence assigned to salvaged diagnostic records
pub const SALVAGE_CONFIDENCE: f64 = 0.5;

/// Characters of a value kept in a salvaged record
const SALVAGE_VALUE_CHARS: usize = 100;

/// One recognized text region
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionRecord {
    text: String,
    confidence: f64,
    bounding_box: Vec<[i64; 2]>,
}

impl DetectionRecord {
    /// Build a record, or `None` when the text is blank
    ///
    /// Confidence is clamped to [0, 1] and rounded to 3 decimals.
    pub fn new(
        text: impl Into<String>,
        confidence: f64,
        bounding_box: Vec<[i64; 2]>,
    ) -> Option<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return None;
        }

        Some(Self {
            text,
            confidence: round_confidence(confidence),
            bounding_box,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn bounding_box(&self) -> &[[i64; 2]] {
        &self.bounding_box
    }
}

/// Clamp to [0, 1] and round to 3 decimal places (NaN becomes 0)
pub fn round_confidence(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    (value.clamp(0.0, 1.0) * 1000.0).round() / 1000.0
}

/// A page of the raw result, classified by capability
#[derive(Debug, Clone, Copy)]
pub enum RawPage<'a> {
    /// Index-addressable list of `[box, [text, score]]` entries
    Legacy(&'a [Value]),
    /// Key-addressable page with `rec_texts` / `rec_polys` / `rec_scores`
    Dict(&'a Map<String, Value>),
    /// Neither; skipped
    Unrecognized(&'a Value),
}

impl<'a> RawPage<'a> {
    /// Classify a page; `null` pages yield `None`
    pub fn classify(page: &'a Value) -> Option<Self> {
        match page {
            Value::Null => None,
            Value::Array(entries) => Some(RawPage::Legacy(entries)),
            Value::Object(fields) => Some(RawPage::Dict(fields)),
            other => Some(RawPage::Unrecognized(other)),
        }
    }
}

#[derive(Debug, Error)]
enum ShapeError {
    #[error("field '{0}' is not a sequence")]
    NotSequence(&'static str),

    #[error("score is not numeric: {0}")]
    BadScore(String),

    #[error("malformed bounding box: {0}")]
    BadBox(String),
}

/// Flatten a raw engine result into detection records
///
/// Never fails: unreadable entries are skipped and unreadable dictionary
/// pages degrade to salvaged diagnostic records.
pub fn normalize(raw: &RawResult) -> Vec<DetectionRecord> {
    let pages = match raw {
        Value::Null => return Vec::new(),
        Value::Array(pages) => pages,
        other => {
            warn!(
                "Unexpected OCR result type ({}), no pages to read",
                value_kind(other)
            );
            return Vec::new();
        }
    };

    let mut records = Vec::new();

    for (page_idx, page) in pages.iter().enumerate() {
        match RawPage::classify(page) {
            None => continue,
            Some(RawPage::Legacy(entries)) => {
                normalize_legacy_page(page_idx, entries, &mut records);
            }
            Some(RawPage::Dict(fields)) => {
                if let Err(e) = normalize_dict_page(fields, &mut records) {
                    warn!(
                        "Error processing dictionary result on page {}: {}; salvaging fields",
                        page_idx, e
                    );
                    salvage_page(fields, &mut records);
                }
            }
            Some(RawPage::Unrecognized(value)) => {
                debug!(
                    "Skipping page {} of unrecognized type {}",
                    page_idx,
                    value_kind(value)
                );
            }
        }
    }

    records
}

fn normalize_legacy_page(page_idx: usize, entries: &[Value], records: &mut Vec<DetectionRecord>) {
    for (line_idx, entry) in entries.iter().enumerate() {
        match legacy_record(entry) {
            Ok(Some(record)) => records.push(record),
            Ok(None) => {}
            Err(e) => warn!(
                "Skipping entry {} on page {}: {}",
                line_idx, page_idx, e
            ),
        }
    }
}

/// `[box, [text, score, ..]]` → record; other layouts are not text lines
fn legacy_record(entry: &Value) -> Result<Option<DetectionRecord>, ShapeError> {
    let (bbox, text_info) = match entry.as_array() {
        Some(pair) if pair.len() == 2 => (&pair[0], &pair[1]),
        _ => return Ok(None),
    };

    let text_info = match text_info.as_array() {
        Some(info) if info.len() >= 2 => info,
        _ => return Ok(None),
    };

    let text = coerce_text(&text_info[0]);
    if text.trim().is_empty() {
        return Ok(None);
    }

    let confidence = coerce_score(&text_info[1])?;
    let bounding_box = coerce_box(bbox)?;

    Ok(DetectionRecord::new(text, confidence, bounding_box))
}

fn normalize_dict_page(
    fields: &Map<String, Value>,
    records: &mut Vec<DetectionRecord>,
) -> Result<(), ShapeError> {
    let texts = sequence_field(fields, "rec_texts")?;
    let polys = sequence_field(fields, "rec_polys")?;
    let scores = sequence_field(fields, "rec_scores")?;

    let count = texts.len().min(polys.len()).min(scores.len());
    if count < texts.len() {
        debug!(
            "Dictionary page has {} texts but only {} polys / {} scores",
            texts.len(),
            polys.len(),
            scores.len()
        );
    }

    for i in 0..count {
        let text = coerce_text(&texts[i]);
        if text.trim().is_empty() {
            continue;
        }

        let confidence = coerce_score(&scores[i])?;
        let bounding_box = coerce_box(&polys[i])?;
        records.extend(DetectionRecord::new(text, confidence, bounding_box));
    }

    Ok(())
}

fn sequence_field<'a>(
    fields: &'a Map<String, Value>,
    key: &'static str,
) -> Result<&'a [Value], ShapeError> {
    match fields.get(key) {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(ShapeError::NotSequence(key)),
    }
}

/// Degraded output: one `"<key>: <value>"` record per public, non-empty field
fn salvage_page(fields: &Map<String, Value>, records: &mut Vec<DetectionRecord>) {
    let mut entries: Vec<(&String, &Value)> = fields.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    for (key, value) in entries {
        if key.starts_with('_') || !is_truthy(value) {
            continue;
        }

        let snippet: String = render_value(value)
            .chars()
            .take(SALVAGE_VALUE_CHARS)
            .collect();

        records.extend(DetectionRecord::new(
            format!("{}: {}", key, snippet),
            SALVAGE_CONFIDENCE,
            Vec::new(),
        ));
    }
}

fn coerce_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

fn coerce_score(value: &Value) -> Result<f64, ShapeError> {
    match value {
        Value::Null => Ok(0.0),
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| ShapeError::BadScore(n.to_string())),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| ShapeError::BadScore(s.clone())),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        other => Err(ShapeError::BadScore(other.to_string())),
    }
}

/// Points as `[[x, y], ..]` or flat `[x1, y1, x2, y2, ..]`, truncated to integers
fn coerce_box(value: &Value) -> Result<Vec<[i64; 2]>, ShapeError> {
    let items = match value {
        Value::Null => return Ok(Vec::new()),
        Value::Array(items) => items,
        other => return Err(ShapeError::BadBox(other.to_string())),
    };

    if items.iter().all(Value::is_number) {
        if items.len() % 2 != 0 {
            return Err(ShapeError::BadBox(format!(
                "odd number of flat coordinates ({})",
                items.len()
            )));
        }
        return items
            .chunks(2)
            .map(|pair| Ok([coerce_coord(&pair[0])?, coerce_coord(&pair[1])?]))
            .collect();
    }

    items
        .iter()
        .map(|point| match point.as_array() {
            Some(coords) if coords.len() >= 2 => {
                Ok([coerce_coord(&coords[0])?, coerce_coord(&coords[1])?])
            }
            _ => Err(ShapeError::BadBox(point.to_string())),
        })
        .collect()
}

fn coerce_coord(value: &Value) -> Result<i64, ShapeError> {
    if let Some(n) = value.as_i64() {
        return Ok(n);
    }
    match value.as_f64() {
        Some(f) if f.is_finite() => Ok(f.trunc() as i64),
        _ => Err(ShapeError::BadBox(value.to_string())),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

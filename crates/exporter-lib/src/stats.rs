//! Normalization of the database check's additional statistics
//!
//! Each value arrives as `<magnitude> [unit] - <tag>` (see
//! [`crate::parsers::database_stats`]). The tag decides how the statistic is
//! exported; MB and GB magnitudes are converted to bytes.

use crate::models::{StatKind, StatLine, Statistic};

const MIB: f64 = 1024.0 * 1024.0;
const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

const TAG_OK: &str = "OK";
const TAG_INFO: &str = "Info";

/// Normalize every parsed statistic line, skipping lines without tokens
pub fn normalize(lines: &[StatLine]) -> Vec<Statistic> {
    lines.iter().filter_map(normalize_line).collect()
}

/// Normalize a single `<name>: <value>` line
pub fn normalize_line(line: &StatLine) -> Option<Statistic> {
    let tokens: Vec<&str> = line.value.split_whitespace().collect();
    let (value, tag) = normalize_tokens(&tokens)?;
    let kind = classify(&value, &tag);

    Some(Statistic {
        name: line.name.clone(),
        value,
        tag,
        kind,
    })
}

/// Split tokens into a value and its classification tag
///
/// The last token is the tag, with any parentheses removed. A `-` separator
/// before it is dropped. A trailing `MB`/`GB` unit converts the leading
/// magnitude to bytes and is dropped as well.
pub fn normalize_tokens(tokens: &[&str]) -> Option<(String, String)> {
    let (tag, rest) = tokens.split_last()?;
    let tag = tag.trim_matches(&['(', ')'][..]).to_string();

    let mut rest: Vec<String> = rest.iter().map(|t| t.to_string()).collect();
    if rest.last().map(String::as_str) == Some("-") {
        rest.pop();
    }

    if rest.len() >= 2 {
        let multiplier = match rest[rest.len() - 1].as_str() {
            "MB" => Some(MIB),
            "GB" => Some(GIB),
            _ => None,
        };
        if let (Some(multiplier), Ok(magnitude)) = (multiplier, rest[0].parse::<f64>()) {
            rest[0] = format_number(magnitude * multiplier);
            rest.pop();
        }
    }

    Some((rest.join(" "), tag))
}

fn classify(value: &str, tag: &str) -> StatKind {
    match (tag, value.parse::<f64>()) {
        (TAG_OK, Ok(_)) => StatKind::Healthy,
        (TAG_INFO, Ok(number)) => StatKind::Numeric(number),
        (TAG_OK | TAG_INFO, Err(_)) => StatKind::Info(value.to_string()),
        _ => StatKind::Failed,
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

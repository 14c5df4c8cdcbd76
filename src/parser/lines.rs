//! Line syntax, one instruction per line:
//!
//! ```text
//! # comment
//! load https://example.com [nowait]
//! wait 2.5
//! save html|text [tag...]
//! ```
//!
//! Keywords are case-insensitive. Any bad line fails the whole parse, with
//! every offending line reported.

use crate::commands::{NAVIGATE, PAUSE, SAVE_MARKUP, SAVE_TEXT};
use crate::error::ScriptError;
use crate::record::{Record, Script};

pub fn parse(text: &str) -> Result<Script, ScriptError> {
    let mut commands = Vec::new();
    let mut errors = Vec::new();

    for (number, raw) in text.lines().enumerate() {
        // Comments are cut textually, before quotes are seen: a '#' inside a
        // quoted tag ends the line there.
        let line = raw.split('#').next().unwrap_or_default().trim();
        if line.is_empty() {
            continue;
        }

        match parse_line(line) {
            Ok(Some(record)) => commands.push(record),
            Ok(None) => {}
            Err(reason) => errors.push(format!("Line {}: {reason}", number + 1)),
        }
    }

    if !errors.is_empty() {
        return Err(ScriptError::Syntax(errors));
    }
    Ok(Script::new(commands))
}

/// `Ok(None)` when the line holds no tokens, e.g. only `""`.
fn parse_line(line: &str) -> Result<Option<Record>, String> {
    let parts = tokenize(line);
    let Some(keyword) = parts.first() else {
        return Ok(None);
    };

    let record = match keyword.to_lowercase().as_str() {
        "load" => parse_load(&parts)?,
        "wait" => parse_wait(&parts)?,
        "save" => parse_save(&parts)?,
        other => return Err(format!("Unknown command: {other}")),
    };
    Ok(Some(record))
}

/// Split on whitespace; `"..."` groups words into one token and the quotes
/// are dropped.
fn tokenize(line: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in line.chars() {
        if c == '"' {
            in_quotes = !in_quotes;
        } else if c.is_whitespace() && !in_quotes {
            if !current.is_empty() {
                parts.push(std::mem::take(&mut current));
            }
        } else {
            current.push(c);
        }
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

fn parse_load(parts: &[String]) -> Result<Record, String> {
    let url = parts.get(1).ok_or("LOAD requires a URL")?;
    let wait = !parts[2..].iter().any(|p| p.eq_ignore_ascii_case("nowait"));

    Ok(Record::new(NAVIGATE)
        .with("url", url.clone())
        .with("wait_for_load", wait))
}

fn parse_wait(parts: &[String]) -> Result<Record, String> {
    let raw = parts.get(1).ok_or("WAIT requires seconds")?;
    let seconds = raw
        .parse::<f64>()
        .ok()
        .filter(|s| s.is_finite())
        .ok_or_else(|| format!("WAIT seconds must be a number, got: {raw}"))?;
    if seconds < 0.0 {
        return Err("WAIT seconds must not be negative".to_string());
    }

    Ok(Record::new(PAUSE).with("seconds", seconds))
}

fn parse_save(parts: &[String]) -> Result<Record, String> {
    let save_type = parts
        .get(1)
        .ok_or("SAVE requires HTML or TEXT type")?
        .to_lowercase();
    let kind = match save_type.as_str() {
        "html" => SAVE_MARKUP,
        "text" => SAVE_TEXT,
        other => return Err(format!("SAVE type must be HTML or TEXT, got: {other}")),
    };

    let mut record = Record::new(kind);
    if parts.len() > 2 {
        let joined = parts[2..].join(" ");
        let tag = joined
            .strip_prefix('"')
            .and_then(|t| t.strip_suffix('"'))
            .unwrap_or(&joined);
        if !tag.is_empty() {
            record = record.with("tag", tag.to_string());
        }
    }
    Ok(record)
}

//! `coords:<x>,<y>` position reports sent from the receiver back to the
//! sender over the data channel.

use crate::errors::ReportError;
use crate::types::Position;

/// Marker a payload must start with to be treated as a report.
pub const REPORT_TAG: &str = "coords";

/// Full prefix, including the separator, stripped before parsing.
pub const REPORT_PREFIX: &str = "coords:";

/// Formats a detected position as a report payload.
pub fn encode(position: Position) -> String {
    format!("{REPORT_PREFIX}{},{}", position.x, position.y)
}

/// Whether `payload` claims to be a coordinate report.
pub fn is_report(payload: &str) -> bool {
    payload.starts_with(REPORT_TAG)
}

/// Parses a report payload back into a position.
///
/// The known prefix length is skipped without checking the separator byte,
/// so any payload tagged `coords` followed by one arbitrary character is
/// accepted.
pub fn parse(payload: &str) -> Result<Position, ReportError> {
    if !is_report(payload) {
        return Err(ReportError::NotAReport { payload: truncate(payload) });
    }
    let body = payload
        .get(REPORT_PREFIX.len()..)
        .ok_or_else(|| ReportError::NotAReport { payload: truncate(payload) })?;

    let fields: Vec<&str> = body.split(',').collect();
    if fields.len() != 2 {
        return Err(ReportError::FieldCount { found: fields.len() });
    }

    let x = parse_axis("x", fields[0])?;
    let y = parse_axis("y", fields[1])?;
    Ok(Position::new(x, y))
}

fn parse_axis(axis: &'static str, raw: &str) -> Result<i32, ReportError> {
    raw.trim()
        .parse::<i32>()
        .map_err(|_| ReportError::InvalidCoordinate { axis, value: truncate(raw) })
}

fn truncate(s: &str) -> String {
    s.chars().take(64).collect()
}

//! Parsing of `git log --pretty=format:%H|%an|%ae|%ad|%s --date=iso` output.

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, TimeZone, Utc};

use crate::domain::commit::{CommitStub, ParseWarning, Parsed};

const FIELD_COUNT: usize = 5;

/// Turns raw log output into commit stubs. Lines that do not split into
/// exactly five fields are skipped; the subject keeps any further `|`.
pub fn parse_log(output: &str) -> Vec<Parsed<CommitStub>> {
    output.lines().filter_map(parse_log_line).collect()
}

fn parse_log_line(line: &str) -> Option<Parsed<CommitStub>> {
    if line.trim().is_empty() {
        return None;
    }
    let fields = line.splitn(FIELD_COUNT, '|').collect::<Vec<_>>();
    let [hash, author, email, date, message] = fields.as_slice() else {
        return None;
    };

    let timestamp = parse_timestamp(date);
    let stub = CommitStub {
        hash: hash.trim().to_string(),
        author: author.to_string(),
        email: email.to_string(),
        timestamp: timestamp.value,
        timestamp_estimated: timestamp.is_defaulted(),
        message: message.to_string(),
    };
    Some(Parsed {
        value: stub,
        warning: timestamp.warning,
    })
}

/// Reads an ISO-8601 date after swapping the first space for `T`. When the
/// date cannot be read the current time is substituted.
pub fn parse_timestamp(raw: &str) -> Parsed<DateTime<FixedOffset>> {
    let iso = raw.trim().replacen(' ', "T", 1);

    let parsed = DateTime::parse_from_str(&iso, "%Y-%m-%dT%H:%M:%S %z")
        .or_else(|_| DateTime::parse_from_rfc3339(&iso))
        .or_else(|_| DateTime::parse_from_str(&iso, "%Y-%m-%dT%H:%M:%S%z"))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(&iso, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|naive| Utc.from_utc_datetime(&naive).fixed_offset())
        });

    match parsed {
        Some(timestamp) => Parsed::clean(timestamp),
        None => {
            tracing::debug!(raw, "unparsable commit date, using current time");
            Parsed::defaulted(
                Local::now().fixed_offset(),
                ParseWarning::UnparsableTimestamp(raw.to_string()),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_log_records() {
        let output = "\
abc123|Ada|ada@example.com|2024-03-01 09:15:00 +0800|feat: add parser
def456|Bob|bob@example.com|2024-03-02 10:00:00 +0000|fix: handle a|b in subject";
        let stubs = parse_log(output);
        assert_eq!(stubs.len(), 2);

        let first = &stubs[0].value;
        assert_eq!(first.hash, "abc123");
        assert_eq!(first.author, "Ada");
        assert_eq!(first.email, "ada@example.com");
        assert_eq!(first.message, "feat: add parser");
        assert_eq!(first.timestamp.to_rfc3339(), "2024-03-01T09:15:00+08:00");
        assert!(!first.timestamp_estimated);

        assert_eq!(stubs[1].value.message, "fix: handle a|b in subject");
    }

    #[test]
    fn skips_blank_and_malformed_lines() {
        let output = "\n\nnot a record\nabc|A|a@x|2024-01-01 00:00:00 +0000|chore: x\n";
        let stubs = parse_log(output);
        assert_eq!(stubs.len(), 1);
        assert_eq!(stubs[0].value.hash, "abc");
    }

    #[test]
    fn unparsable_date_is_flagged() {
        let stubs = parse_log("abc|A|a@x|yesterday-ish|feat: x");
        assert_eq!(stubs.len(), 1);
        assert!(stubs[0].is_defaulted());
        assert!(stubs[0].value.timestamp_estimated);
        assert_eq!(
            stubs[0].warning,
            Some(ParseWarning::UnparsableTimestamp("yesterday-ish".to_string()))
        );
    }

    #[test]
    fn accepts_strict_iso_dates() {
        let parsed = parse_timestamp("2024-05-06T07:08:09+02:00");
        assert!(!parsed.is_defaulted());
        assert_eq!(parsed.value.to_rfc3339(), "2024-05-06T07:08:09+02:00");

        let naive = parse_timestamp("2024-05-06 07:08:09");
        assert!(!naive.is_defaulted());
        assert_eq!(naive.value.to_rfc3339(), "2024-05-06T07:08:09+00:00");
    }
}

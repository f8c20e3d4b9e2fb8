use crate::metadata::{ResolvedTimestamp, TagReader, TimestampSource};
use chrono::{DateTime, Local, NaiveDate, TimeZone};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

// EXIF 2.2, p.36: blanks may stand in for unknown time digits.
static STRICT_TAG_FORMAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9]{4}:[0-9]{2}:[0-9]{2} [0-9 ]{2}:[0-9 ]{2}:[0-9 ]{2}$")
        .expect("strict tag pattern")
});
static COMPACT_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([0-9]{4})([0-9]{2})([0-9]{2}).*([0-9]{2})([0-9]{2})([0-9]{2})")
        .expect("compact name pattern")
});
static NUMERIC_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]+").expect("numeric pattern"));

type Step<R> = fn(&TimestampResolver<R>, &Path) -> Option<DateTime<Local>>;

#[derive(Debug, Clone, Default)]
pub struct TimestampResolver<R> {
    reader: R,
}

impl<R: TagReader> TimestampResolver<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    pub fn resolve(&self, path: &Path) -> ResolvedTimestamp {
        let steps: [(TimestampSource, Step<R>); 3] = [
            (TimestampSource::EmbeddedTag, Self::embedded_time),
            (TimestampSource::FilenameCompact, Self::compact_name_step),
            (TimestampSource::FilenameLoose, Self::loose_name_step),
        ];

        for (source, step) in steps {
            if let Some(time) = step(self, path) {
                debug!(path = %path.display(), ?source, %time, "timestamp resolved");
                return ResolvedTimestamp { source, time };
            }
        }

        let time = file_modified_time(path).unwrap_or_else(|| {
            warn!(path = %path.display(), "mtime unavailable, using current time");
            Local::now()
        });
        debug!(path = %path.display(), %time, "timestamp taken from mtime");
        ResolvedTimestamp {
            source: TimestampSource::FileModified,
            time,
        }
    }

    // Capture tag only, no filename or mtime fallback.
    pub fn resolve_embedded(&self, path: &Path) -> Option<ResolvedTimestamp> {
        self.embedded_time(path).map(|time| ResolvedTimestamp {
            source: TimestampSource::EmbeddedTag,
            time,
        })
    }

    fn compact_name_step(&self, path: &Path) -> Option<DateTime<Local>> {
        file_name_of(path).and_then(|name| compact_name_time(&name))
    }

    fn loose_name_step(&self, path: &Path) -> Option<DateTime<Local>> {
        file_name_of(path).and_then(|name| loose_name_time(&name))
    }

    fn embedded_time(&self, path: &Path) -> Option<DateTime<Local>> {
        let raw = self.reader.original_date_time(path)?;
        let parsed = parse_strict_tag(&raw);
        if parsed.is_none() {
            debug!(path = %path.display(), value = %raw, "ignoring malformed capture tag");
        }
        parsed
    }
}

/// Parses `YYYY:MM:DD HH:MM:SS`; blank time fields count as zero.
pub fn parse_strict_tag(raw: &str) -> Option<DateTime<Local>> {
    if !STRICT_TAG_FORMAT.is_match(raw) {
        return None;
    }
    let fields: Vec<&str> = [0..4, 5..7, 8..10, 11..13, 14..16, 17..19]
        .into_iter()
        .map(|range| match raw[range].trim() {
            "" => "0",
            digits => digits,
        })
        .collect();
    local_from_fields(&fields)
}

fn compact_name_time(name: &str) -> Option<DateTime<Local>> {
    let caps = COMPACT_NAME.captures(name)?;
    let fields: Vec<&str> = caps
        .iter()
        .skip(1)
        .map(|group| group.map_or("", |m| m.as_str()))
        .collect();
    local_from_fields(&fields)
}

fn loose_name_time(name: &str) -> Option<DateTime<Local>> {
    let fields: Vec<&str> = NUMERIC_RUN
        .find_iter(name)
        .take(6)
        .map(|m| m.as_str())
        .collect();
    local_from_fields(&fields)
}

fn local_from_fields(fields: &[&str]) -> Option<DateTime<Local>> {
    let [year, month, day, hour, minute, second] = fields else {
        return None;
    };
    let date = NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)?;
    let naive = date.and_hms_opt(hour.parse().ok()?, minute.parse().ok()?, second.parse().ok()?)?;
    Local.from_local_datetime(&naive).earliest()
}

fn file_name_of(path: &Path) -> Option<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
}

fn file_modified_time(path: &Path) -> Option<DateTime<Local>> {
    let time = fs::metadata(path).ok()?.modified().ok()?;
    Some(DateTime::from(time))
}

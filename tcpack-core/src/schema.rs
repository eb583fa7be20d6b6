//! Archive schema generations.
//!
//! Four encodings of test archives exist in the wild. Each one is modelled as
//! a variant of [`Schema`] carrying only what that generation can supply:
//!
//! | Gen | Name          | Metadata source                                      |
//! |-----|---------------|------------------------------------------------------|
//! | 4   | Current       | zip comment, 8 fields joined by `||`                 |
//! | 3   | LegacyComment | zip comment, 6 fields joined by `+-23412vdvdw+`      |
//! | 2   | FilenameDate  | archive file name `{name}_{dd-mm-yyyy}_{hh-mm-ss}`   |
//! | 1   | BarePair      | nothing; entries are `{id}` and `{id}.a`             |
//!
//! The literals below are frozen: archives already in circulation carry them.

use chrono::{DateTime, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path};

use crate::classify::Extensions;

/// Marker leading every current-generation comment.
pub const CURRENT_MARKER: &str = "Accepted! From Loli with love <3";
/// Field separator of the current-generation comment.
pub const CURRENT_SENTINEL: &str = "||";
pub const CURRENT_FIELD_COUNT: usize = 8;

/// Marker leading every legacy comment.
pub const LEGACY_MARKER: &str = "LOLICONVERTER";
pub const LEGACY_SENTINEL: &str = "+-23412vdvdw+";
pub const LEGACY_FIELD_COUNT: usize = 6;

/// Entry suffix marking an output in bare-pair archives.
pub const BARE_PAIR_OUTPUT_SUFFIX: &str = "a";

/// Prefix of the problem name synthesized for archives that carry none.
pub const UNKNOWN_PROBLEM_PREFIX: &str = "Unknown";

/// Version stamped into comments written by this engine.
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

const ARCHIVE_DATE_FORMAT: &str = "%d-%m-%Y";
const ARCHIVE_TIME_FORMAT: &str = "%H-%M-%S";

/// Schema generation, oldest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SchemaVersion {
    BarePair,
    FilenameDate,
    LegacyComment,
    Current,
}

impl SchemaVersion {
    pub fn generation(self) -> u8 {
        match self {
            SchemaVersion::BarePair => 1,
            SchemaVersion::FilenameDate => 2,
            SchemaVersion::LegacyComment => 3,
            SchemaVersion::Current => 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SchemaVersion::BarePair => "bare-pair (Codeforces/IOI)",
            SchemaVersion::FilenameDate => "filename-date (1.x)",
            SchemaVersion::LegacyComment => "legacy comment (2.x)",
            SchemaVersion::Current => "current comment (3.x+)",
        }
    }
}

/// Metadata carried by a current-generation comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentComment {
    pub engine_version: String,
    pub problem_name: String,
    pub test_count: usize,
    pub extensions: Extensions,
    pub input_count: usize,
    pub output_count: usize,
}

impl CurrentComment {
    pub fn render(&self) -> String {
        [
            CURRENT_MARKER.to_string(),
            self.engine_version.clone(),
            self.problem_name.clone(),
            self.test_count.to_string(),
            self.extensions.input.clone(),
            self.extensions.output.clone(),
            self.input_count.to_string(),
            self.output_count.to_string(),
        ]
        .join(CURRENT_SENTINEL)
    }

    /// Both the field count and the marker must match; numeric fields that
    /// do not parse disqualify the comment.
    pub fn parse(comment: &str) -> Option<Self> {
        let fields: Vec<&str> = comment.split(CURRENT_SENTINEL).collect();
        if fields.len() != CURRENT_FIELD_COUNT
            || fields[0] != CURRENT_MARKER
            || !is_single_component(fields[2])
        {
            return None;
        }
        Some(Self {
            engine_version: fields[1].to_string(),
            problem_name: fields[2].to_string(),
            test_count: fields[3].trim().parse().ok()?,
            extensions: Extensions::new(fields[4], fields[5]),
            input_count: fields[6].trim().parse().ok()?,
            output_count: fields[7].trim().parse().ok()?,
        })
    }
}

/// Metadata carried by a legacy comment: no per-role counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyComment {
    pub engine_version: String,
    pub problem_name: String,
    pub test_count: usize,
    pub extensions: Extensions,
}

impl LegacyComment {
    pub fn parse(comment: &str) -> Option<Self> {
        let fields: Vec<&str> = comment.split(LEGACY_SENTINEL).collect();
        if fields.len() != LEGACY_FIELD_COUNT
            || fields[0] != LEGACY_MARKER
            || !is_single_component(fields[2])
        {
            return None;
        }
        Some(Self {
            engine_version: fields[1].to_string(),
            problem_name: fields[2].to_string(),
            test_count: fields[3].trim().parse().ok()?,
            extensions: Extensions::new(fields[4], fields[5]),
        })
    }

    #[cfg(test)]
    pub(crate) fn render(&self) -> String {
        [
            LEGACY_MARKER.to_string(),
            self.engine_version.clone(),
            self.problem_name.clone(),
            self.test_count.to_string(),
            self.extensions.input.clone(),
            self.extensions.output.clone(),
        ]
        .join(LEGACY_SENTINEL)
    }
}

/// Problem name and timestamp recovered from a dated archive file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatedFileName {
    pub problem_name: String,
    /// `None` when the date and time tokens have the right shape but are not
    /// a calendar date.
    pub created: Option<NaiveDateTime>,
}

impl DatedFileName {
    /// Parse `{name}_{dd-mm-yyyy}_{hh-mm-ss}` (the archive extension, if any,
    /// is ignored). Exactly three underscore-separated tokens are required and
    /// only the lengths of the date and time tokens are checked.
    pub fn parse(file_name: &str) -> Option<Self> {
        let stem = match file_name.rsplit_once('.') {
            Some((stem, _)) => stem,
            None => file_name,
        };
        let tokens: Vec<&str> = stem.split('_').collect();
        if tokens.len() != 3
            || tokens[1].len() != 10
            || tokens[2].len() != 8
            || !is_single_component(tokens[0])
        {
            return None;
        }
        let created = NaiveDateTime::parse_from_str(
            &format!("{}_{}", tokens[1], tokens[2]),
            &format!("{}_{}", ARCHIVE_DATE_FORMAT, ARCHIVE_TIME_FORMAT),
        )
        .ok();
        Some(Self { problem_name: tokens[0].to_string(), created })
    }
}

/// A recognized schema generation and what it declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schema {
    Current(CurrentComment),
    LegacyComment(LegacyComment),
    FilenameDate(DatedFileName),
    BarePair,
}

impl Schema {
    pub fn version(&self) -> SchemaVersion {
        match self {
            Schema::Current(_) => SchemaVersion::Current,
            Schema::LegacyComment(_) => SchemaVersion::LegacyComment,
            Schema::FilenameDate(_) => SchemaVersion::FilenameDate,
            Schema::BarePair => SchemaVersion::BarePair,
        }
    }
}

/// True when `name` is exactly one plain path component: non-empty, no
/// separator of either platform, no root, not `.` or `..`.
pub fn is_single_component(name: &str) -> bool {
    if name.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// File name for a freshly written archive: `{problem}_{dd-mm-yyyy}_{hh-mm-ss}.zip`.
pub fn archive_file_name<Tz>(problem_name: &str, at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format!(
        "{}_{}_{}.zip",
        problem_name,
        at.format(ARCHIVE_DATE_FORMAT),
        at.format(ARCHIVE_TIME_FORMAT)
    )
}

/// Placeholder name for archives whose schema carries no problem name.
pub fn unknown_problem_name<Tz>(at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format!("{}{}", UNKNOWN_PROBLEM_PREFIX, at.format("%d%m%y%H%M%S"))
}

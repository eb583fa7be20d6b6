//! Archive format detection.
//!
//! Generations are tried newest first and the first structural match wins.
//! Once a generation is chosen the test table is built from the entry names
//! alone; declared counts are only compared against what was found.

use chrono::Local;
use log::{debug, info};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::path::{Path, PathBuf};
use zip::ZipArchive;

use crate::classify::{Extensions, Role};
use crate::error::{EngineError, Result};
use crate::progress::{advise, ProgressSink};
use crate::schema::{
    is_single_component, unknown_problem_name, CurrentComment, DatedFileName, LegacyComment,
    Schema, SchemaVersion, BARE_PAIR_OUTPUT_SUFFIX,
};

/// One file entry of the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub size: u64,
}

/// Input and output entry of one test, either of which may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestEntries {
    pub input: Option<ArchiveEntry>,
    pub output: Option<ArchiveEntry>,
}

impl TestEntries {
    pub fn get(&self, role: Role) -> Option<&ArchiveEntry> {
        match role {
            Role::Input => self.input.as_ref(),
            Role::Output => self.output.as_ref(),
        }
    }

    fn slot(&mut self, role: Role) -> &mut Option<ArchiveEntry> {
        match role {
            Role::Input => &mut self.input,
            Role::Output => &mut self.output,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArchiveMetadata {
    pub archive_path: PathBuf,
    /// Matched generation together with whatever it declared.
    pub schema: Schema,
    pub problem_name: String,
    pub extensions: Extensions,
    /// Distinct test ids actually present; overrides any declared count.
    pub valid_folder_count: usize,
    pub input_count: usize,
    pub output_count: usize,
    pub archive_size: u64,
}

impl ArchiveMetadata {
    pub fn schema_version(&self) -> SchemaVersion {
        self.schema.version()
    }

    pub fn engine_version(&self) -> Option<&str> {
        match &self.schema {
            Schema::Current(c) => Some(c.engine_version.as_str()),
            Schema::LegacyComment(c) => Some(c.engine_version.as_str()),
            Schema::FilenameDate(_) | Schema::BarePair => None,
        }
    }

    pub fn declared_test_count(&self) -> Option<usize> {
        match &self.schema {
            Schema::Current(c) => Some(c.test_count),
            Schema::LegacyComment(c) => Some(c.test_count),
            Schema::FilenameDate(_) | Schema::BarePair => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Detection {
    pub metadata: ArchiveMetadata,
    pub tests: BTreeMap<String, TestEntries>,
}

impl Detection {
    pub fn test_ids(&self) -> BTreeSet<&str> {
        self.tests.keys().map(String::as_str).collect()
    }
}

/// Everything a generation matcher may look at.
struct Candidate<'a> {
    comment: &'a str,
    file_name: &'a str,
    entries: &'a [ArchiveEntry],
}

type MatchFn = fn(&Candidate<'_>) -> Option<Schema>;

/// Newest generation first.
const GENERATIONS: [MatchFn; 4] = [match_current, match_legacy, match_filename_date, match_bare_pair];

fn match_current(candidate: &Candidate<'_>) -> Option<Schema> {
    CurrentComment::parse(candidate.comment).map(Schema::Current)
}

fn match_legacy(candidate: &Candidate<'_>) -> Option<Schema> {
    LegacyComment::parse(candidate.comment).map(Schema::LegacyComment)
}

fn match_filename_date(candidate: &Candidate<'_>) -> Option<Schema> {
    DatedFileName::parse(candidate.file_name).map(Schema::FilenameDate)
}

fn match_bare_pair(candidate: &Candidate<'_>) -> Option<Schema> {
    candidate
        .entries
        .iter()
        .all(|e| bare_pair_key(&e.name).is_some())
        .then_some(Schema::BarePair)
}

/// Test id and role of a bare-pair entry: `{id}` is an input, `{id}.a` an
/// output. Any other shape, or an id that is not a plain folder name,
/// returns `None`.
pub fn bare_pair_key(entry_name: &str) -> Option<(String, Role)> {
    let parts: Vec<&str> = entry_name.split('.').collect();
    let (id, role) = match parts.as_slice() {
        [id] => (*id, Role::Input),
        [id, suffix] if *suffix == BARE_PAIR_OUTPUT_SUFFIX => (*id, Role::Output),
        _ => return None,
    };
    is_single_component(id).then(|| (id.to_string(), role))
}

/// Test id and role of a canonical `{problem}.{test_id}.{ext}` entry.
///
/// The extension may be either the declared one or the fixed `inp`/`out`
/// suffix; input is checked first.
pub fn canonical_key(entry_name: &str, problem_name: &str, extensions: &Extensions) -> Option<(String, Role)> {
    let parts: Vec<&str> = entry_name.split('.').collect();
    let [name, test_id, ext] = parts.as_slice() else {
        return None;
    };
    if *name != problem_name || !is_single_component(test_id) {
        return None;
    }
    let ext = ext.to_lowercase();
    let role = [Role::Input, Role::Output]
        .into_iter()
        .find(|role| ext == extensions.for_role(*role) || ext == role.entry_suffix())?;
    Some((test_id.to_string(), role))
}

fn open_archive(path: &Path) -> Result<ZipArchive<File>> {
    if !path.is_file() {
        return Err(EngineError::SourceNotArchive(path.to_path_buf()));
    }
    let file = File::open(path)?;
    ZipArchive::new(file).map_err(|e| {
        debug!("{} failed to open as zip: {}", path.display(), e);
        EngineError::SourceNotArchive(path.to_path_buf())
    })
}

fn read_entries(archive: &mut ZipArchive<File>) -> Result<Vec<ArchiveEntry>> {
    let mut entries = Vec::with_capacity(archive.len());
    for idx in 0..archive.len() {
        let file = archive.by_index(idx)?;
        if file.is_dir() {
            continue;
        }
        entries.push(ArchiveEntry { name: file.name().to_string(), size: file.size() });
    }
    Ok(entries)
}

/// Identify the schema generation of `archive_path` and build its test table.
pub fn detect(archive_path: &Path, sink: &mut dyn ProgressSink) -> Result<Detection> {
    let mut archive = open_archive(archive_path)?;
    let comment = String::from_utf8_lossy(archive.comment()).into_owned();
    let entries = read_entries(&mut archive)?;
    let file_name = archive_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let candidate = Candidate { comment: &comment, file_name: &file_name, entries: &entries };
    let schema = GENERATIONS
        .iter()
        .find_map(|matches| matches(&candidate))
        .ok_or(EngineError::UnrecognizedFormat)?;
    info!("{} detected as {}", archive_path.display(), schema.version().label());

    let (problem_name, extensions) = match &schema {
        Schema::Current(c) => (c.problem_name.clone(), c.extensions.clone()),
        Schema::LegacyComment(c) => (c.problem_name.clone(), c.extensions.clone()),
        Schema::FilenameDate(d) => (d.problem_name.clone(), Extensions::default()),
        Schema::BarePair => (unknown_problem_name(&Local::now()), Extensions::default()),
    };

    sink.set_total(entries.len() as u64);
    let mut tests: BTreeMap<String, TestEntries> = BTreeMap::new();
    for (idx, entry) in entries.iter().enumerate() {
        let key = match schema {
            Schema::BarePair => bare_pair_key(&entry.name),
            _ => canonical_key(&entry.name, &problem_name, &extensions),
        };
        match key {
            Some((test_id, role)) => {
                let slot = tests.entry(test_id).or_default().slot(role);
                if slot.is_none() {
                    *slot = Some(entry.clone());
                } else {
                    debug!("ignoring duplicate entry {}", entry.name);
                }
            }
            None => debug!("skipping unrelated entry {}", entry.name),
        }
        sink.report_progress(idx as u64 + 1, entries.len() as u64);
    }

    if tests.is_empty() {
        return Err(EngineError::EmptyArchive);
    }

    let input_count = tests.values().filter(|t| t.input.is_some()).count();
    let output_count = tests.values().filter(|t| t.output.is_some()).count();
    let archive_size = std::fs::metadata(archive_path)?.len();

    let metadata = ArchiveMetadata {
        archive_path: archive_path.to_path_buf(),
        schema,
        problem_name,
        extensions,
        valid_folder_count: tests.len(),
        input_count,
        output_count,
        archive_size,
    };

    sink.log("===== OVERVIEW =====");
    sink.log(&format!("Archive: {}", archive_path.display()));
    sink.log(&format!("Format: {}", metadata.schema_version().label()));
    if let Some(version) = metadata.engine_version() {
        sink.log(&format!("Written by version: {}", version));
    }
    sink.log(&format!("Problem name: {}", metadata.problem_name));
    sink.log(&format!(
        "Extensions: .{} / .{}",
        metadata.extensions.input, metadata.extensions.output
    ));
    sink.log(&format!("Valid tests: {}", metadata.valid_folder_count));
    sink.log(&format!("Entries found: {} input, {} output", input_count, output_count));
    sink.log(&format!(
        "Size: {:.3} MB",
        (archive_size as f64 / 1024.0 / 1024.0 * 1000.0).round() / 1000.0
    ));

    check_declared_counts(&metadata, sink);
    if metadata.schema_version() == SchemaVersion::BarePair {
        advise(sink, "archive carries no problem name; supply an explicit output name");
    }

    Ok(Detection { metadata, tests })
}

fn check_declared_counts(metadata: &ArchiveMetadata, sink: &mut dyn ProgressSink) {
    if let Some(declared) = metadata.declared_test_count() {
        if declared != metadata.valid_folder_count {
            advise(
                sink,
                &format!(
                    "archive declares {} tests but {} were found",
                    declared, metadata.valid_folder_count
                ),
            );
        }
    }
    if let Schema::Current(c) = &metadata.schema {
        if c.input_count != metadata.input_count || c.output_count != metadata.output_count {
            advise(
                sink,
                &format!(
                    "archive declares {} inputs and {} outputs but {} and {} were found",
                    c.input_count, c.output_count, metadata.input_count, metadata.output_count
                ),
            );
        }
    }
    let (inputs, outputs, valid) = (metadata.input_count, metadata.output_count, metadata.valid_folder_count);
    if inputs != outputs || inputs != valid || outputs != valid {
        advise(sink, "input, output and test counts do not match");
    }
}

//! Directory scanner for the one-level test layout.
//!
//! Expected layout: `<root>/<test folder>/<problem>.<ext>`. Files directly in
//! `root` are ignored, as is anything nested deeper than one folder.

use log::debug;
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::classify::{classify, Extensions, Role};
use crate::error::{EngineError, Result};
use crate::progress::{advise, ProgressSink};
use crate::settings::Settings;

const MIB: u64 = 1024 * 1024;
/// Payloads below this are stored uncompressed.
pub const STORE_THRESHOLD: u64 = 3 * MIB;
/// Payloads at or above this get maximum compression and an advisory.
pub const LARGE_THRESHOLD: u64 = 40 * MIB;

/// Compression applied when writing archive entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionLevel {
    None,
    Medium,
    Maximum,
}

impl CompressionLevel {
    pub fn recommend(total_payload_bytes: u64) -> Self {
        if total_payload_bytes < STORE_THRESHOLD {
            CompressionLevel::None
        } else if total_payload_bytes < LARGE_THRESHOLD {
            CompressionLevel::Medium
        } else {
            CompressionLevel::Maximum
        }
    }

    /// Deflate level, or `None` when entries are stored.
    pub fn deflate_level(self) -> Option<i64> {
        match self {
            CompressionLevel::None => None,
            CompressionLevel::Medium => Some(5),
            CompressionLevel::Maximum => Some(8),
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" | "store" | "0" => Some(CompressionLevel::None),
            "medium" | "5" => Some(CompressionLevel::Medium),
            "maximum" | "max" | "8" => Some(CompressionLevel::Maximum),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CompressionLevel::None => "none",
            CompressionLevel::Medium => "medium",
            CompressionLevel::Maximum => "maximum",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub extensions: Extensions,
    /// Explicit name; takes precedence over the inferred one.
    pub problem_name: Option<String>,
    pub include_input: bool,
    pub include_output: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl ScanOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            extensions: settings.extensions(),
            problem_name: settings.problem_name.clone(),
            include_input: settings.include_input,
            include_output: settings.include_output,
        }
    }

    fn includes(&self, role: Role) -> bool {
        match role {
            Role::Input => self.include_input,
            Role::Output => self.include_output,
        }
    }
}

/// One classified test file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    pub path: PathBuf,
    pub test_id: String,
    pub role: Role,
    pub size: u64,
}

/// Immutable outcome of one scan.
#[derive(Debug, Clone)]
pub struct ScanResult {
    pub root: PathBuf,
    /// Classified files, in folder order with inputs and outputs interleaved
    /// as found.
    pub files: Vec<ScannedFile>,
    /// Subfolders that contributed at least one classified file.
    pub valid_folder_count: usize,
    /// Size of every file whose role is included.
    pub total_payload_bytes: u64,
    pub inferred_problem_name: String,
    /// Explicit name if one was given, otherwise the inferred one. Never empty.
    pub problem_name: String,
    pub extensions: Extensions,
    pub recommended_compression: CompressionLevel,
}

impl ScanResult {
    pub fn files_with_role(&self, role: Role) -> impl Iterator<Item = &ScannedFile> {
        self.files.iter().filter(move |f| f.role == role)
    }

    pub fn input_count(&self) -> usize {
        self.files_with_role(Role::Input).count()
    }

    pub fn output_count(&self) -> usize {
        self.files_with_role(Role::Output).count()
    }

    pub fn test_ids(&self) -> BTreeSet<&str> {
        self.files.iter().map(|f| f.test_id.as_str()).collect()
    }

    pub fn total_payload_mib(&self) -> f64 {
        to_mib(self.total_payload_bytes)
    }
}

/// Test id for a folder: its digits if it has any, otherwise the whole name.
pub fn test_id_from_folder(folder_name: &str) -> String {
    let digits: String = folder_name.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        folder_name.to_string()
    } else {
        digits
    }
}

/// Longest common prefix of all names, stripped of surrounding path
/// separators and a trailing '.', cut at the first '.'.
pub fn infer_problem_name<S: AsRef<str>>(file_names: &[S]) -> String {
    let mut iter = file_names.iter().map(AsRef::as_ref);
    let first = match iter.next() {
        Some(first) => first,
        None => return String::new(),
    };

    let mut prefix_len = first.len();
    for name in iter {
        prefix_len = first
            .char_indices()
            .zip(name.chars())
            .take_while(|((_, a), b)| a == b)
            .last()
            .map(|((i, c), _)| i + c.len_utf8())
            .unwrap_or(0)
            .min(prefix_len);
        if prefix_len == 0 {
            break;
        }
    }

    let prefix = first[..prefix_len]
        .trim_matches(|c| c == '/' || c == '\\')
        .trim_end_matches('.');
    prefix.split('.').next().unwrap_or_default().trim().to_string()
}

/// Walk `root` one folder level deep and classify every file found.
///
/// Folders whose test id would contain '.' are skipped with an advisory,
/// since `{problem}.{test}.{ext}` entry names could not be split back.
pub fn scan(root: &Path, opts: &ScanOptions, sink: &mut dyn ProgressSink) -> Result<ScanResult> {
    if !root.is_dir() {
        return Err(EngineError::InvalidRoot(root.to_path_buf()));
    }

    let mut folders = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_type().is_dir() {
            folders.push(entry.into_path());
        }
    }

    sink.set_total(folders.len() as u64);

    let mut files = Vec::new();
    let mut file_names = Vec::new();
    let mut valid_folder_count = 0usize;
    let mut total_payload_bytes = 0u64;

    for (idx, folder) in folders.iter().enumerate() {
        let folder_name = folder
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let test_id = test_id_from_folder(&folder_name);
        if test_id.contains('.') {
            advise(
                sink,
                &format!("skipping folder {}: a test id containing '.' cannot be archived", folder_name),
            );
            sink.report_progress(idx as u64 + 1, folders.len() as u64);
            continue;
        }
        let mut contributed = false;

        for entry in WalkDir::new(folder).min_depth(1).max_depth(1).sort_by_file_name() {
            let entry = entry.map_err(io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let role = classify(&name, &opts.extensions).role();
            file_names.push(name);

            let Some(role) = role else { continue };
            let size = fs::metadata(entry.path())?.len();
            if opts.includes(role) {
                total_payload_bytes += size;
            }
            files.push(ScannedFile {
                path: entry.into_path(),
                test_id: test_id.clone(),
                role,
                size,
            });
            contributed = true;
        }

        if contributed {
            valid_folder_count += 1;
        } else {
            debug!("skipping folder without test files: {}", folder.display());
        }
        sink.report_progress(idx as u64 + 1, folders.len() as u64);
    }

    if files.is_empty() {
        return Err(if file_names.is_empty() {
            EngineError::NoValidFolders
        } else {
            EngineError::NoClassifiedFiles
        });
    }

    let inferred_problem_name = infer_problem_name(&file_names);
    let problem_name = opts
        .problem_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(inferred_problem_name.as_str())
        .to_string();
    if problem_name.is_empty() {
        return Err(EngineError::EmptyProblemName);
    }

    let result = ScanResult {
        root: root.to_path_buf(),
        files,
        valid_folder_count,
        total_payload_bytes,
        inferred_problem_name,
        problem_name,
        extensions: opts.extensions.clone(),
        recommended_compression: CompressionLevel::recommend(total_payload_bytes),
    };

    sink.log("===== OVERVIEW =====");
    sink.log(&format!("Test folder: {}", root.display()));
    sink.log(&format!("Problem name: {}", result.problem_name));
    sink.log(&format!("Valid folders: {}", result.valid_folder_count));
    sink.log(&format!(
        "Files found: {} input, {} output",
        result.input_count(),
        result.output_count()
    ));
    sink.log(&format!("Total size: {:.3} MB", result.total_payload_mib()));

    let (inputs, outputs) = (result.input_count(), result.output_count());
    if inputs != outputs || inputs != valid_folder_count || outputs != valid_folder_count {
        advise(sink, "input, output and test folder counts do not match");
    }
    if result.recommended_compression == CompressionLevel::Maximum {
        advise(
            sink,
            "payload exceeds 40 MB; consider shrinking the test set. Maximum compression recommended.",
        );
    }

    Ok(result)
}

fn to_mib(bytes: u64) -> f64 {
    (bytes as f64 / MIB as f64 * 1000.0).round() / 1000.0
}

//! Archive encoder: scanned test folders → one zip with a current-generation
//! comment.
//!
//! Entry names are always `{problem}.{test_id}.{inp|out}`, whatever the
//! on-disk extensions were; the comment records the configured extensions so
//! a later decode can restore them.

use log::debug;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::classify::Role;
use crate::error::{EngineError, Result};
use crate::progress::{advise, ProgressSink};
use crate::scanner::{CompressionLevel, ScanResult};
use crate::schema::{is_single_component, CurrentComment, ENGINE_VERSION};

#[derive(Debug, Clone)]
pub struct EncodeOptions {
    pub problem_name: String,
    pub include_input: bool,
    pub include_output: bool,
    pub compression: CompressionLevel,
}

impl EncodeOptions {
    /// Options matching a scan: its problem name, both roles, and the
    /// recommended compression.
    pub fn for_scan(scan: &ScanResult) -> Self {
        Self {
            problem_name: scan.problem_name.clone(),
            include_input: true,
            include_output: true,
            compression: scan.recommended_compression,
        }
    }

    fn includes(&self, role: Role) -> bool {
        match role {
            Role::Input => self.include_input,
            Role::Output => self.include_output,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EncodeSummary {
    pub archive_path: PathBuf,
    pub input_count: usize,
    pub output_count: usize,
    pub payload_bytes: u64,
    pub archive_size: u64,
    pub comment: CurrentComment,
}

/// Canonical archive entry name.
pub fn entry_name(problem_name: &str, test_id: &str, role: Role) -> String {
    format!("{}.{}.{}", problem_name, test_id, role.entry_suffix())
}

fn file_options(compression: CompressionLevel) -> SimpleFileOptions {
    match compression.deflate_level() {
        Some(level) => SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(level)),
        None => SimpleFileOptions::default().compression_method(CompressionMethod::Stored),
    }
}

/// Write the selected roles of `scan` into a new archive at `archive_path`.
///
/// The parent directory is created if needed and an existing file at the
/// path is replaced.
pub fn encode(
    scan: &ScanResult,
    opts: &EncodeOptions,
    archive_path: &Path,
    sink: &mut dyn ProgressSink,
) -> Result<EncodeSummary> {
    let problem_name = opts.problem_name.trim();
    if problem_name.is_empty() {
        return Err(EngineError::EmptyProblemName);
    }
    if !is_single_component(problem_name) {
        return Err(EngineError::UnsafeName(problem_name.to_string()));
    }
    if problem_name.contains('.') {
        advise(
            sink,
            &format!("problem name '{}' contains '.'; entries will not decode back", problem_name),
        );
    }

    if let Some(parent) = archive_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let selected: Vec<_> = [Role::Input, Role::Output]
        .into_iter()
        .filter(|role| opts.includes(*role))
        .flat_map(|role| scan.files_with_role(role))
        .collect();
    let total: u64 = selected.iter().map(|f| f.size).sum();

    sink.log("===== EXECUTION =====");
    sink.log("Creating ZIP...");
    sink.set_total(total);

    let mut zip = ZipWriter::new(File::create(archive_path)?);
    let options = file_options(opts.compression);
    let mut written = HashSet::new();
    let mut input_count = 0usize;
    let mut output_count = 0usize;
    let mut done = 0u64;

    for file in selected {
        let name = entry_name(problem_name, &file.test_id, file.role);
        if file.test_id.contains('.') {
            advise(sink, &format!("test id '{}' contains '.'; {} will not decode back", file.test_id, name));
        }
        if !written.insert(name.clone()) {
            advise(
                sink,
                &format!("{} is produced by more than one folder; keeping the first, skipping {}", name, file.path.display()),
            );
            continue;
        }

        debug!("packing {} as {}", file.path.display(), name);
        zip.start_file(name, options)?;
        let mut src = File::open(&file.path)?;
        io::copy(&mut src, &mut zip)?;

        match file.role {
            Role::Input => input_count += 1,
            Role::Output => output_count += 1,
        }
        done += file.size;
        sink.report_progress(done, total);
    }

    let comment = CurrentComment {
        engine_version: ENGINE_VERSION.to_string(),
        problem_name: problem_name.to_string(),
        test_count: scan.valid_folder_count,
        extensions: scan.extensions.clone(),
        input_count,
        output_count,
    };
    zip.set_comment(comment.render());
    zip.finish()?;
    sink.report_progress(total, total);

    let valid = scan.valid_folder_count;
    if input_count != output_count || input_count != valid || output_count != valid {
        advise(sink, "input, output and test folder counts do not match");
    }

    let archive_size = fs::metadata(archive_path)?.len();
    sink.log(&format!("Packed {} tests into ZIP", valid));
    sink.log(&format!("ZIP saved to: {}", archive_path.display()));
    sink.log(&format!(
        "Size: {:.3} MB",
        (archive_size as f64 / 1024.0 / 1024.0 * 1000.0).round() / 1000.0
    ));

    Ok(EncodeSummary {
        archive_path: archive_path.to_path_buf(),
        input_count,
        output_count,
        payload_bytes: done,
        archive_size,
        comment,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Extensions;
    use crate::progress::NullSink;
    use crate::scanner::ScannedFile;
    use std::io::Read;
    use zip::ZipArchive;

    fn scan_fixture(dir: &Path, ids: &[&str]) -> io::Result<ScanResult> {
        let mut files = Vec::new();
        for id in ids {
            for (role, ext, body) in [(Role::Input, "inp", "in"), (Role::Output, "out", "out")] {
                let path = dir.join(id).join(format!("p.{}", ext));
                fs::create_dir_all(path.parent().unwrap())?;
                let content = format!("{}-{}", body, id);
                fs::write(&path, &content)?;
                files.push(ScannedFile {
                    path,
                    test_id: id.to_string(),
                    role,
                    size: content.len() as u64,
                });
            }
        }
        let total = files.iter().map(|f| f.size).sum();
        Ok(ScanResult {
            root: dir.to_path_buf(),
            files,
            valid_folder_count: ids.len(),
            total_payload_bytes: total,
            inferred_problem_name: "p".to_string(),
            problem_name: "p".to_string(),
            extensions: Extensions::default(),
            recommended_compression: CompressionLevel::None,
        })
    }

    #[test]
    fn test_entries_and_comment() -> anyhow::Result<()> {
        let dir = tempfile::TempDir::new()?;
        let scan = scan_fixture(&dir.path().join("tests"), &["1", "2"])?;
        let archive = dir.path().join("out").join("p.zip");

        let summary = encode(&scan, &EncodeOptions::for_scan(&scan), &archive, &mut NullSink)?;
        assert_eq!(summary.input_count, 2);
        assert_eq!(summary.output_count, 2);

        let mut zip = ZipArchive::new(File::open(&archive)?)?;
        let mut names: Vec<String> = zip.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(names, vec!["p.1.inp", "p.1.out", "p.2.inp", "p.2.out"]);

        let comment = String::from_utf8(zip.comment().to_vec())?;
        assert_eq!(comment, summary.comment.render());
        assert!(comment.ends_with("||p||2||inp||out||2||2"));

        let mut body = String::new();
        zip.by_name("p.2.out")?.read_to_string(&mut body)?;
        assert_eq!(body, "out-2");
        Ok(())
    }

    #[test]
    fn test_excluded_role_is_omitted() -> anyhow::Result<()> {
        let dir = tempfile::TempDir::new()?;
        let scan = scan_fixture(&dir.path().join("tests"), &["1", "2", "3"])?;
        let archive = dir.path().join("inputs.zip");
        let opts = EncodeOptions {
            include_output: false,
            compression: CompressionLevel::Medium,
            ..EncodeOptions::for_scan(&scan)
        };

        let summary = encode(&scan, &opts, &archive, &mut NullSink)?;
        assert_eq!((summary.input_count, summary.output_count), (3, 0));

        let zip = ZipArchive::new(File::open(&archive)?)?;
        assert_eq!(zip.len(), 3);
        assert!(zip.file_names().all(|n| n.ends_with(".inp")));
        let comment = String::from_utf8(zip.comment().to_vec())?;
        assert!(comment.ends_with("||3||0"));
        Ok(())
    }

    #[test]
    fn test_problem_name_override() -> anyhow::Result<()> {
        let dir = tempfile::TempDir::new()?;
        let scan = scan_fixture(&dir.path().join("tests"), &["7"])?;
        let archive = dir.path().join("renamed.zip");
        let opts = EncodeOptions { problem_name: "sum".to_string(), ..EncodeOptions::for_scan(&scan) };

        encode(&scan, &opts, &archive, &mut NullSink)?;
        let zip = ZipArchive::new(File::open(&archive)?)?;
        assert!(zip.file_names().all(|n| n.starts_with("sum.7.")));
        Ok(())
    }

    #[test]
    fn test_empty_problem_name_is_rejected() -> anyhow::Result<()> {
        let dir = tempfile::TempDir::new()?;
        let scan = scan_fixture(&dir.path().join("tests"), &["1"])?;
        let opts = EncodeOptions { problem_name: "   ".to_string(), ..EncodeOptions::for_scan(&scan) };

        let err = encode(&scan, &opts, &dir.path().join("x.zip"), &mut NullSink).unwrap_err();
        assert!(matches!(err, EngineError::EmptyProblemName));
        assert!(!dir.path().join("x.zip").exists());
        Ok(())
    }

    #[test]
    fn test_problem_name_must_be_a_plain_name() -> anyhow::Result<()> {
        let dir = tempfile::TempDir::new()?;
        let scan = scan_fixture(&dir.path().join("tests"), &["1"])?;
        let opts = EncodeOptions { problem_name: "a/b".to_string(), ..EncodeOptions::for_scan(&scan) };

        let err = encode(&scan, &opts, &dir.path().join("x.zip"), &mut NullSink).unwrap_err();
        assert!(matches!(err, EngineError::UnsafeName(_)));
        Ok(())
    }

    #[test]
    fn test_duplicate_test_ids_keep_first() -> anyhow::Result<()> {
        let dir = tempfile::TempDir::new()?;
        let mut scan = scan_fixture(&dir.path().join("tests"), &["1", "01"])?;
        for f in scan.files.iter_mut() {
            f.test_id = "1".to_string();
        }
        let archive = dir.path().join("dup.zip");

        let summary = encode(&scan, &EncodeOptions::for_scan(&scan), &archive, &mut NullSink)?;
        assert_eq!((summary.input_count, summary.output_count), (1, 1));

        let mut zip = ZipArchive::new(File::open(&archive)?)?;
        let mut body = String::new();
        zip.by_name("p.1.inp")?.read_to_string(&mut body)?;
        assert_eq!(body, "in-1");
        Ok(())
    }
}

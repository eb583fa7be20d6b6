//! Decode a detected archive back into per-test folders.
//!
//! Output layout is always the current one:
//! `<target>/<problem>/<test folder>/<problem>.<ext>`, whatever generation the
//! archive was written in.

use log::{debug, info};
use std::collections::{BTreeMap, HashSet};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use zip::ZipArchive;

use crate::classify::Role;
use crate::detector::Detection;
use crate::error::{EngineError, Result};
use crate::progress::{advise, ProgressSink};
use crate::schema::is_single_component;
use crate::settings::Settings;

const MIN_TEST_NUMBER_WIDTH: usize = 2;

#[derive(Debug, Clone)]
pub struct MaterializeOptions {
    /// Overrides the detected problem name.
    pub problem_name: Option<String>,
    pub include_input: bool,
    pub include_output: bool,
}

impl Default for MaterializeOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl MaterializeOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
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

#[derive(Debug, Clone)]
pub struct MaterializeSummary {
    pub problem_dir: PathBuf,
    pub test_count: usize,
    pub inputs_written: usize,
    pub outputs_written: usize,
    pub bytes_written: u64,
}

/// Folder name for a test id. Numeric ids become `test` plus the number
/// zero-padded to `width`; anything else is used verbatim.
pub fn test_folder_name(test_id: &str, width: usize) -> String {
    if !test_id.is_empty() && test_id.chars().all(|c| c.is_ascii_digit()) {
        let number = test_id.trim_start_matches('0');
        let number = if number.is_empty() { "0" } else { number };
        format!("test{:0>width$}", number, width = width)
    } else {
        test_id.to_string()
    }
}

/// Width that fits every numeric id once leading zeros are dropped.
fn test_number_width<'a>(test_ids: impl Iterator<Item = &'a str>) -> usize {
    test_ids
        .filter(|id| !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()))
        .map(|id| id.trim_start_matches('0').len().max(1))
        .max()
        .unwrap_or(0)
        .max(MIN_TEST_NUMBER_WIDTH)
}

/// Folder name for every test id, in id order. When two ids map onto the
/// same folder (`1` and `01`), the later one falls back to its raw id, then
/// to a numbered suffix.
fn assign_test_folders<'a>(
    test_ids: impl Iterator<Item = &'a str> + Clone,
    sink: &mut dyn ProgressSink,
) -> BTreeMap<&'a str, String> {
    let width = test_number_width(test_ids.clone());
    let mut used = HashSet::new();
    let mut folders = BTreeMap::new();

    for test_id in test_ids {
        let preferred = test_folder_name(test_id, width);
        let folder = if !used.contains(&preferred) {
            preferred
        } else {
            let mut candidate = test_id.to_string();
            let mut n = 2;
            while used.contains(&candidate) {
                candidate = format!("{}_{}", preferred, n);
                n += 1;
            }
            advise(
                sink,
                &format!("tests {} and another id share folder {}; using {}", test_id, preferred, candidate),
            );
            candidate
        };
        used.insert(folder.clone());
        folders.insert(test_id, folder);
    }
    folders
}

fn materialized_file_name(problem_name: &str, extension: &str) -> String {
    if extension.is_empty() {
        problem_name.to_string()
    } else {
        format!("{}.{}", problem_name, extension)
    }
}

/// Extract the selected roles of `detection` under `target_root`.
///
/// An existing `<target_root>/<problem>` folder is removed first. The problem
/// name and every test id must be plain folder names, so nothing is written
/// or removed outside that folder. Any entry that fails to extract aborts the
/// call; files already written stay.
pub fn materialize(
    archive_path: &Path,
    detection: &Detection,
    target_root: &Path,
    opts: &MaterializeOptions,
    sink: &mut dyn ProgressSink,
) -> Result<MaterializeSummary> {
    if !archive_path.is_file() {
        return Err(EngineError::SourceNotArchive(archive_path.to_path_buf()));
    }
    let mut archive = ZipArchive::new(File::open(archive_path)?)
        .map_err(|_| EngineError::SourceNotArchive(archive_path.to_path_buf()))?;

    let problem_name = opts
        .problem_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(detection.metadata.problem_name.as_str())
        .to_string();
    if problem_name.is_empty() {
        return Err(EngineError::EmptyProblemName);
    }
    if !is_single_component(&problem_name) {
        return Err(EngineError::UnsafeName(problem_name));
    }
    if let Some(bad) = detection.tests.keys().find(|id| !is_single_component(id)) {
        return Err(EngineError::UnsafeName(bad.clone()));
    }

    let problem_dir = target_root.join(&problem_name);
    if problem_dir.exists() {
        advise(sink, &format!("replacing existing folder {}", problem_dir.display()));
        fs::remove_dir_all(&problem_dir)?;
    }
    fs::create_dir_all(&problem_dir)?;

    let extensions = &detection.metadata.extensions;
    let folders = assign_test_folders(detection.tests.keys().map(String::as_str), sink);
    let roles: Vec<Role> = [Role::Input, Role::Output]
        .into_iter()
        .filter(|role| opts.includes(*role))
        .collect();
    let total: u64 = detection
        .tests
        .values()
        .flat_map(|t| roles.iter().filter_map(move |role| t.get(*role)))
        .map(|e| e.size)
        .sum();

    sink.log("===== EXECUTION =====");
    sink.log("Extracting tests...");
    sink.set_total(total);

    let mut inputs_written = 0usize;
    let mut outputs_written = 0usize;
    let mut done = 0u64;

    for (test_id, entries) in &detection.tests {
        let folder = folders.get(test_id.as_str()).map_or(test_id.as_str(), String::as_str);
        let test_dir = problem_dir.join(folder);
        fs::create_dir_all(&test_dir)
            .map_err(|e| EngineError::extraction(test_dir.display().to_string(), e))?;

        for &role in &roles {
            let Some(entry) = entries.get(role) else { continue };
            let target = test_dir.join(materialized_file_name(&problem_name, extensions.for_role(role)));
            debug!("extracting {} to {}", entry.name, target.display());

            let mut src = archive
                .by_name(&entry.name)
                .map_err(|e| EngineError::extraction(entry.name.as_str(), e))?;
            let mut dst = File::create(&target)
                .map_err(|e| EngineError::extraction(entry.name.as_str(), e))?;
            io::copy(&mut src, &mut dst).map_err(|e| EngineError::extraction(entry.name.as_str(), e))?;

            match role {
                Role::Input => inputs_written += 1,
                Role::Output => outputs_written += 1,
            }
            done += entry.size;
            sink.report_progress(done, total);
        }
    }
    sink.report_progress(total, total);

    info!("materialized {} tests into {}", detection.tests.len(), problem_dir.display());
    sink.log(&format!("Extracted {} tests", detection.tests.len()));
    sink.log(&format!("Saved to: {}", problem_dir.display()));

    Ok(MaterializeSummary {
        problem_dir,
        test_count: detection.tests.len(),
        inputs_written,
        outputs_written,
        bytes_written: done,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::detect;
    use crate::progress::NullSink;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn write_zip(path: &Path, comment: &str, entries: &[(&str, &str)]) -> anyhow::Result<()> {
        let mut zip = ZipWriter::new(File::create(path)?);
        for (name, body) in entries {
            zip.start_file(*name, SimpleFileOptions::default())?;
            zip.write_all(body.as_bytes())?;
        }
        zip.set_comment(comment);
        zip.finish()?;
        Ok(())
    }

    #[test]
    fn test_folder_names() {
        assert_eq!(test_folder_name("1", 2), "test01");
        assert_eq!(test_folder_name("01", 2), "test01");
        assert_eq!(test_folder_name("123", 3), "test123");
        assert_eq!(test_folder_name("0", 2), "test00");
        assert_eq!(test_folder_name("sample", 2), "sample");
        assert_eq!(test_number_width(["1", "2", "sample"].into_iter()), 2);
        assert_eq!(test_number_width(["9", "100"].into_iter()), 3);
        assert_eq!(test_number_width(["007"].into_iter()), 2);
    }

    #[test]
    fn test_custom_extensions_are_restored() -> anyhow::Result<()> {
        let dir = tempfile::TempDir::new()?;
        let archive = dir.path().join("a.zip");
        write_zip(
            &archive,
            "Accepted! From Loli with love <3||1.0||sum||1||in||ok||1||1",
            &[("sum.1.inp", "3 4"), ("sum.1.out", "7")],
        )?;

        let detection = detect(&archive, &mut NullSink)?;
        let target = dir.path().join("out");
        let summary = materialize(&archive, &detection, &target, &MaterializeOptions::default(), &mut NullSink)?;

        assert_eq!(summary.problem_dir, target.join("sum"));
        assert_eq!(fs::read_to_string(target.join("sum/test01/sum.in"))?, "3 4");
        assert_eq!(fs::read_to_string(target.join("sum/test01/sum.ok"))?, "7");
        Ok(())
    }

    #[test]
    fn test_role_selection_and_name_override() -> anyhow::Result<()> {
        let dir = tempfile::TempDir::new()?;
        let archive = dir.path().join("cf.zip");
        write_zip(&archive, "", &[("1", "in1"), ("1.a", "out1"), ("2", "in2"), ("2.a", "out2")])?;

        let detection = detect(&archive, &mut NullSink)?;
        let opts = MaterializeOptions {
            problem_name: Some("sum".to_string()),
            include_input: false,
            include_output: true,
        };
        let summary = materialize(&archive, &detection, dir.path(), &opts, &mut NullSink)?;

        assert_eq!((summary.inputs_written, summary.outputs_written), (0, 2));
        assert_eq!(fs::read_to_string(dir.path().join("sum/test02/sum.out"))?, "out2");
        assert!(!dir.path().join("sum/test02/sum.inp").exists());
        Ok(())
    }

    #[test]
    fn test_existing_problem_folder_is_replaced() -> anyhow::Result<()> {
        let dir = tempfile::TempDir::new()?;
        let archive = dir.path().join("a.zip");
        write_zip(
            &archive,
            "Accepted! From Loli with love <3||1.0||p||1||inp||out||1||1",
            &[("p.1.inp", "a"), ("p.1.out", "b")],
        )?;
        let stale = dir.path().join("p").join("test09").join("p.inp");
        fs::create_dir_all(stale.parent().unwrap())?;
        fs::write(&stale, "old")?;

        let detection = detect(&archive, &mut NullSink)?;
        materialize(&archive, &detection, dir.path(), &MaterializeOptions::default(), &mut NullSink)?;

        assert!(!stale.exists());
        assert_eq!(fs::read_to_string(dir.path().join("p/test01/p.inp"))?, "a");
        Ok(())
    }

    #[test]
    fn test_missing_entry_is_an_extraction_failure() -> anyhow::Result<()> {
        let dir = tempfile::TempDir::new()?;
        let archive = dir.path().join("a.zip");
        write_zip(
            &archive,
            "Accepted! From Loli with love <3||1.0||p||1||inp||out||1||1",
            &[("p.1.inp", "a")],
        )?;
        let mut detection = detect(&archive, &mut NullSink)?;
        if let Some(entries) = detection.tests.get_mut("1") {
            if let Some(input) = entries.input.as_mut() {
                input.name = "p.1.gone".to_string();
            }
        }

        let err = materialize(&archive, &detection, dir.path(), &MaterializeOptions::default(), &mut NullSink)
            .unwrap_err();
        assert!(matches!(err, EngineError::ExtractionFailed { ref entry, .. } if entry == "p.1.gone"));
        Ok(())
    }

    #[test]
    fn test_colliding_numeric_ids_keep_both_tests() -> anyhow::Result<()> {
        let dir = tempfile::TempDir::new()?;
        let archive = dir.path().join("a.zip");
        write_zip(
            &archive,
            "Accepted! From Loli with love <3||1.0||p||2||inp||out||2||0",
            &[("p.1.inp", "one"), ("p.01.inp", "zero-one")],
        )?;
        let detection = detect(&archive, &mut NullSink)?;
        assert_eq!(detection.tests.len(), 2);

        let target = dir.path().join("out");
        materialize(&archive, &detection, &target, &MaterializeOptions::default(), &mut NullSink)?;

        assert_eq!(fs::read_to_string(target.join("p/test01/p.inp"))?, "zero-one");
        assert_eq!(fs::read_to_string(target.join("p/1/p.inp"))?, "one");
        Ok(())
    }

    #[test]
    fn test_folder_assignment_never_reuses_a_name() {
        let ids = ["01", "1", "test01"];
        let folders = assign_test_folders(ids.iter().copied(), &mut NullSink);
        assert_eq!(folders["01"], "test01");
        assert_eq!(folders["1"], "1");
        assert_eq!(folders["test01"], "test01_2");
    }

    #[test]
    fn test_problem_name_cannot_leave_target() -> anyhow::Result<()> {
        let dir = tempfile::TempDir::new()?;
        let archive = dir.path().join("a.zip");
        write_zip(
            &archive,
            "Accepted! From Loli with love <3||1.0||p||1||inp||out||1||1",
            &[("p.1.inp", "a"), ("p.1.out", "b")],
        )?;
        let victim = dir.path().join("victim");
        fs::create_dir_all(&victim)?;
        fs::write(victim.join("keep.txt"), "precious")?;
        let target = dir.path().join("target");

        let mut detection = detect(&archive, &mut NullSink)?;
        detection.metadata.problem_name = victim.display().to_string();
        let err = materialize(&archive, &detection, &target, &MaterializeOptions::default(), &mut NullSink)
            .unwrap_err();
        assert!(matches!(err, EngineError::UnsafeName(_)));

        let detection = detect(&archive, &mut NullSink)?;
        let opts = MaterializeOptions { problem_name: Some("../victim".to_string()), ..MaterializeOptions::default() };
        let err = materialize(&archive, &detection, &target, &opts, &mut NullSink).unwrap_err();
        assert!(matches!(err, EngineError::UnsafeName(_)));

        assert_eq!(fs::read_to_string(victim.join("keep.txt"))?, "precious");
        assert!(!target.exists());
        Ok(())
    }

    #[test]
    fn test_test_ids_cannot_leave_target() -> anyhow::Result<()> {
        let dir = tempfile::TempDir::new()?;
        let archive = dir.path().join("cf.zip");
        write_zip(&archive, "", &[("1", "in1"), ("1.a", "out1")])?;
        let mut detection = detect(&archive, &mut NullSink)?;
        let outside = dir.path().join("outside");
        if let Some(entries) = detection.tests.remove("1") {
            detection.tests.insert(outside.display().to_string(), entries);
        }

        let opts = MaterializeOptions { problem_name: Some("p".to_string()), ..MaterializeOptions::default() };
        let err = materialize(&archive, &detection, &dir.path().join("target"), &opts, &mut NullSink)
            .unwrap_err();
        assert!(matches!(err, EngineError::UnsafeName(_)));
        assert!(!outside.exists());
        Ok(())
    }

    #[test]
    fn test_unwritable_test_folder_is_an_extraction_failure() -> anyhow::Result<()> {
        let dir = tempfile::TempDir::new()?;
        let archive = dir.path().join("a.zip");
        write_zip(
            &archive,
            "Accepted! From Loli with love <3||1.0||p||1||inp||out||1||1",
            &[("p.1.inp", "a")],
        )?;
        let mut detection = detect(&archive, &mut NullSink)?;
        // Longer than any file system allows for one name.
        let long_id = "x".repeat(300);
        if let Some(entries) = detection.tests.remove("1") {
            detection.tests.insert(long_id, entries);
        }

        let err = materialize(&archive, &detection, dir.path(), &MaterializeOptions::default(), &mut NullSink)
            .unwrap_err();
        assert!(matches!(err, EngineError::ExtractionFailed { .. }));
        Ok(())
    }

    #[test]
    fn test_source_must_be_an_archive() -> anyhow::Result<()> {
        let dir = tempfile::TempDir::new()?;
        let archive = dir.path().join("a.zip");
        write_zip(
            &archive,
            "Accepted! From Loli with love <3||1.0||p||1||inp||out||1||1",
            &[("p.1.inp", "a")],
        )?;
        let detection = detect(&archive, &mut NullSink)?;

        let text = dir.path().join("notes.zip");
        fs::write(&text, "plain text")?;
        let missing = dir.path().join("missing.zip");
        let target = dir.path().join("out");
        for source in [text.as_path(), dir.path(), missing.as_path()] {
            let err = materialize(source, &detection, &target, &MaterializeOptions::default(), &mut NullSink)
                .unwrap_err();
            assert!(matches!(err, EngineError::SourceNotArchive(_)));
        }
        assert!(!target.exists());
        Ok(())
    }
}

//! Command-line interface for tcpack

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tcpack_core::{CompressionLevel, Settings};

#[derive(Parser)]
#[command(name = "tcpack")]
#[command(about = "tcpack - Test-case archiver for judge problem folders", long_about = None)]
pub struct Cli {
    /// Settings file (JSON); command-line flags override its values
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: SettingsArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args)]
pub struct SettingsArgs {
    /// Input file extension (default: inp)
    #[arg(long, global = true)]
    pub input_ext: Option<String>,

    /// Output file extension (default: out)
    #[arg(long, global = true)]
    pub output_ext: Option<String>,

    /// Problem name to use instead of the inferred/declared one
    #[arg(long, global = true)]
    pub name: Option<String>,

    /// Leave input files out
    #[arg(long, global = true)]
    pub no_input: bool,

    /// Leave output files out
    #[arg(long, global = true)]
    pub no_output: bool,

    /// Directory archives and unpacked problems are written to
    #[arg(long, global = true)]
    pub output_dir: Option<PathBuf>,
}

impl SettingsArgs {
    pub fn apply(&self, mut settings: Settings) -> Settings {
        if let Some(ext) = &self.input_ext {
            settings.input_extension = ext.clone();
        }
        if let Some(ext) = &self.output_ext {
            settings.output_extension = ext.clone();
        }
        if let Some(name) = &self.name {
            settings.problem_name = Some(name.clone());
        }
        if self.no_input {
            settings.include_input = false;
        }
        if self.no_output {
            settings.include_output = false;
        }
        if let Some(dir) = &self.output_dir {
            settings.output_dir = dir.clone();
        }
        settings.normalized()
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show what a test folder or archive contains
    Check {
        /// Test folder or zip archive
        path: PathBuf,
    },

    /// Pack a test folder into a zip archive
    Pack {
        /// Folder holding one subfolder per test
        input: PathBuf,

        /// Archive file (default: <output-dir>/<problem>_<dd-mm-yyyy>_<hh-mm-ss>.zip)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Compression: none, medium or maximum (default: chosen from payload size)
        #[arg(long, value_parser = parse_level)]
        level: Option<CompressionLevel>,
    },

    /// Unpack an archive of any known generation into test folders
    Unpack {
        /// Zip archive
        archive: PathBuf,
    },
}

fn parse_level(s: &str) -> Result<CompressionLevel, String> {
    CompressionLevel::from_name(s).ok_or_else(|| format!("unknown compression level '{}'", s))
}

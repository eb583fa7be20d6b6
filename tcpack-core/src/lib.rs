pub mod classify;
pub mod detector;
pub mod encoder;
pub mod error;
pub mod materializer;
pub mod progress;
pub mod scanner;
pub mod schema;
pub mod settings;

pub use classify::{classify, Classification, Extensions, Role};
pub use detector::{detect, ArchiveEntry, ArchiveMetadata, Detection, TestEntries};
pub use encoder::{encode, EncodeOptions, EncodeSummary};
pub use error::{EngineError, ErrorKind, Result};
pub use materializer::{materialize, MaterializeOptions, MaterializeSummary};
pub use progress::{FnSink, NullSink, ProgressEvent, ProgressSink, ThrottledSink};
pub use scanner::{scan, CompressionLevel, ScanOptions, ScanResult, ScannedFile};
pub use schema::{archive_file_name, Schema, SchemaVersion};
pub use settings::Settings;

//! Test file classification by extension

use serde::{Deserialize, Serialize};

/// Role a file plays within a test case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    Input,
    Output,
}

impl Role {
    /// Suffix used for this role in canonical archive entry names
    pub fn entry_suffix(self) -> &'static str {
        match self {
            Role::Input => "inp",
            Role::Output => "out",
        }
    }
}

/// Outcome of classifying a single file name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Input,
    Output,
    Unclassified,
}

impl Classification {
    pub fn role(self) -> Option<Role> {
        match self {
            Classification::Input => Some(Role::Input),
            Classification::Output => Some(Role::Output),
            Classification::Unclassified => None,
        }
    }
}

/// Configured input/output extensions, normalized (trimmed, lowercase, no dot)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extensions {
    pub input: String,
    pub output: String,
}

impl Extensions {
    pub fn new(input: &str, output: &str) -> Self {
        Self {
            input: normalize_extension(input),
            output: normalize_extension(output),
        }
    }

    pub fn for_role(&self, role: Role) -> &str {
        match role {
            Role::Input => &self.input,
            Role::Output => &self.output,
        }
    }
}

impl Default for Extensions {
    fn default() -> Self {
        Self::new("inp", "out")
    }
}

pub fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}

/// Extension of a file name: the text after the last '.', lowercased.
/// `None` when the name has no '.' at all.
pub fn file_extension(file_name: &str) -> Option<String> {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
}

/// Classify a file name against the configured extensions.
///
/// A name without any extension matches whichever role is configured with
/// the empty extension. Input wins when both roles share an extension.
pub fn classify(file_name: &str, extensions: &Extensions) -> Classification {
    let ext = file_extension(file_name).unwrap_or_default();

    if ext == extensions.input {
        Classification::Input
    } else if ext == extensions.output {
        Classification::Output
    } else {
        Classification::Unclassified
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_default_extensions() {
        let exts = Extensions::default();
        assert_eq!(classify("sum.inp", &exts), Classification::Input);
        assert_eq!(classify("sum.out", &exts), Classification::Output);
        assert_eq!(classify("sum.ans", &exts), Classification::Unclassified);
    }

    #[test]
    fn test_classify_is_case_insensitive() {
        let exts = Extensions::new(" INP ", "Out");
        assert_eq!(classify("SUM.INP", &exts), Classification::Input);
        assert_eq!(classify("sum.oUt", &exts), Classification::Output);
    }

    #[test]
    fn test_extensionless_files() {
        let exts = Extensions::new("", "a");
        assert_eq!(classify("1", &exts), Classification::Input);
        assert_eq!(classify("1.a", &exts), Classification::Output);

        let exts = Extensions::default();
        assert_eq!(classify("1", &exts), Classification::Unclassified);
    }

    #[test]
    fn test_only_last_segment_counts() {
        let exts = Extensions::new("txt", "ans");
        assert_eq!(classify("data.inp.txt", &exts), Classification::Input);
        assert_eq!(classify("data.txt.bak", &exts), Classification::Unclassified);
    }

    #[test]
    fn test_leading_dot_in_configured_extension() {
        let exts = Extensions::new(".in", ".ok");
        assert_eq!(exts.input, "in");
        assert_eq!(classify("a.in", &exts), Classification::Input);
        assert_eq!(classify("a.ok", &exts), Classification::Output);
    }
}

//! Entries line test vectors.
//!
//! These vectors pin the exact layouts the `cvs` client reads and writes,
//! so other implementations can be checked against the same data.

use cvsync_codec::{decode_entry_line, entry_line};
use serde::{Deserialize, Serialize};

/// A test vector that can be shared across implementations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestVector {
    /// Unique identifier for this vector.
    pub id: String,
    /// Human-readable description.
    pub description: String,
    /// Entries line as read from disk.
    pub input: String,
    /// Line written back after decoding.
    pub expected: Option<String>,
    /// Expected error fragment (if this should fail).
    pub expected_error: Option<String>,
}

impl TestVector {
    fn ok(id: &str, description: &str, input: &str, expected: &str) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            input: input.into(),
            expected: Some(expected.into()),
            expected_error: None,
        }
    }

    fn err(id: &str, description: &str, input: &str, error: &str) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            input: input.into(),
            expected: None,
            expected_error: Some(error.into()),
        }
    }
}

/// Decodes a vector's input and re-encodes it.
///
/// Returns a description of the mismatch, if any.
pub fn check_vector(vector: &TestVector) -> Result<(), String> {
    let decoded = decode_entry_line(&vector.input);
    match (&vector.expected, &vector.expected_error, decoded) {
        (Some(expected), _, Ok(Some(record))) => {
            let actual = entry_line(&record).map_err(|e| format!("{}: {}", vector.id, e))?;
            if &actual == expected {
                Ok(())
            } else {
                Err(format!("{}: expected {:?}, got {:?}", vector.id, expected, actual))
            }
        }
        (_, Some(fragment), Err(e)) if e.to_string().contains(fragment.as_str()) => Ok(()),
        (_, _, outcome) => Err(format!("{}: unexpected outcome {:?}", vector.id, outcome)),
    }
}

/// File entry vectors.
pub fn file_entry_vectors() -> Vec<TestVector> {
    vec![
        TestVector::ok(
            "regular",
            "Checked-out file with a single-digit day",
            "/Makefile/1.12/Fri Oct  3 14:22:05 2003//",
            "/Makefile/1.12/Fri Oct  3 14:22:05 2003//",
        ),
        TestVector::ok(
            "added_initial",
            "Added file as written by cvs add",
            "/new.c/0/Initial new.c//",
            "/new.c/0/dummy timestamp//",
        ),
        TestVector::ok(
            "removed",
            "File scheduled for removal",
            "/old.c/-1.3/dummy timestamp//",
            "/old.c/-1.3///",
        ),
        TestVector::ok(
            "merged",
            "Clean merge result",
            "/m.c/1.5/Result of merge//",
            "/m.c/1.5/Result of merge//",
        ),
        TestVector::ok(
            "merged_conflict",
            "Merge result with conflicts",
            "/m.c/1.5/Result of merge+Fri Oct  3 14:22:05 2003//",
            "/m.c/1.5/Result of merge+Fri Oct  3 14:22:05 2003//",
        ),
        TestVector::ok(
            "binary",
            "Binary keyword mode",
            "/logo.gif/1.2/Mon Nov 17 09:00:00 2003/-kb/",
            "/logo.gif/1.2/Mon Nov 17 09:00:00 2003/-kb/",
        ),
        TestVector::ok(
            "branch_tag",
            "Sticky branch tag",
            "/a/1.1.2.1///Tdev",
            "/a/1.1.2.1///Tdev",
        ),
        TestVector::ok(
            "version_tag",
            "Version tags are written with the T prefix",
            "/a/1.1///NREL_1",
            "/a/1.1///TREL_1",
        ),
        TestVector::ok(
            "permissions",
            "Server-reported permissions",
            "/run.sh/1.1////u=rwx",
            "/run.sh/1.1////u=rwx",
        ),
    ]
}

/// Directory entry vectors.
pub fn directory_entry_vectors() -> Vec<TestVector> {
    vec![
        TestVector::ok("directory", "Subfolder entry", "D/src////", "D/src////"),
        TestVector::ok("directory_short", "Subfolder entry without fields", "D/lib", "D/lib////"),
        TestVector::err("directory_empty", "Subfolder entry without a name", "D/", "empty directory name"),
    ]
}

/// Malformed line vectors.
pub fn malformed_entry_vectors() -> Vec<TestVector> {
    vec![
        TestVector::err("no_slash", "Missing leading slash", "Makefile/1.1///", "expected leading '/'"),
        TestVector::err("too_few_fields", "Truncated line", "/a/1.1/", "too few fields"),
        TestVector::err("empty_name", "Empty name", "//1.1///", "empty name"),
        TestVector::err("empty_revision", "Empty revision", "/a//x//", "empty revision"),
        TestVector::err("bad_tag", "Unknown tag prefix", "/a/1.1///Xfoo", "unknown tag prefix"),
    ]
}

/// Generate all test vectors as JSON for cross-implementation use.
pub fn all_vectors_json() -> String {
    let vectors = AllTestVectors {
        files: file_entry_vectors(),
        directories: directory_entry_vectors(),
        malformed: malformed_entry_vectors(),
    };

    serde_json::to_string_pretty(&vectors).expect("Failed to serialize vectors")
}

#[derive(Debug, Serialize, Deserialize)]
struct AllTestVectors {
    files: Vec<TestVector>,
    directories: Vec<TestVector>,
    malformed: Vec<TestVector>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_vectors() {
        for vector in file_entry_vectors() {
            check_vector(&vector).unwrap();
        }
    }

    #[test]
    fn test_directory_vectors() {
        for vector in directory_entry_vectors() {
            check_vector(&vector).unwrap();
        }
    }

    #[test]
    fn test_malformed_vectors() {
        for vector in malformed_entry_vectors() {
            check_vector(&vector).unwrap();
        }
    }

    #[test]
    fn test_all_vectors_json() {
        let json = all_vectors_json();
        let parsed: AllTestVectors = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.files.len(), file_entry_vectors().len());
        assert!(json.contains("version_tag"));
    }
}

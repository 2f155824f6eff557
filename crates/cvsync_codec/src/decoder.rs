//! Record decoder.

use crate::encoder::{entry_line, TIMESTAMP_DUMMY, TIMESTAMP_MERGED, TIMESTAMP_MERGED_WITH_CONFLICT};
use crate::error::{CodecError, CodecResult};
use crate::record::{CvsTag, EntryType, FolderSyncInfo, ResourceSyncInfo, TagKind};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

/// Layout used to parse timestamps after whitespace normalization.
const PARSE_FORMAT: &str = "%a %b %d %H:%M:%S %Y";

/// Decode an Entries file into its records.
///
/// Blank lines and the bare `D` marker (no subdirectories) are skipped.
///
/// # Errors
///
/// Returns an error if the bytes are not UTF-8 or a line is malformed.
pub fn decode_entries(bytes: &[u8]) -> CodecResult<Vec<ResourceSyncInfo>> {
    let text = std::str::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)?;
    EntriesDecoder::new(text).collect()
}

/// Decode a folder binding.
///
/// Unknown keys are ignored so newer writers stay readable.
///
/// # Errors
///
/// Returns an error if the bytes are not UTF-8, `Root` or `Repository`
/// is missing, or the tag is malformed.
pub fn decode_folder_binding(bytes: &[u8]) -> CodecResult<FolderSyncInfo> {
    let text = std::str::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)?;

    let mut root = None;
    let mut repository = None;
    let mut tag = None;
    let mut is_static = false;

    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if line == "Static" {
            is_static = true;
            continue;
        }
        let Some((key, value)) = line.split_once(' ') else {
            continue;
        };
        match key {
            "Root" => root = Some(value.to_string()),
            "Repository" => repository = Some(value.to_string()),
            "Tag" => tag = Some(decode_tag(value, line)?),
            _ => {}
        }
    }

    Ok(FolderSyncInfo {
        root: root.ok_or(CodecError::MissingField { field: "Root" })?,
        repository: repository.ok_or(CodecError::MissingField {
            field: "Repository",
        })?,
        tag,
        is_static,
    })
}

/// Decode an ignore pattern list. Patterns are separated by whitespace.
///
/// # Errors
///
/// Returns an error if the bytes are not UTF-8.
pub fn decode_ignores(bytes: &[u8]) -> CodecResult<Vec<String>> {
    let text = std::str::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)?;
    Ok(text.split_whitespace().map(str::to_string).collect())
}

/// Parse an Entries timestamp.
///
/// Returns `None` for text that is not a timestamp (dummy markers, or
/// anything a foreign client wrote that cannot be read back).
#[must_use]
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    NaiveDateTime::parse_from_str(&normalized, PARSE_FORMAT)
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Decode a single Entries line.
///
/// Returns `Ok(None)` for lines that carry no record.
///
/// # Errors
///
/// Returns an error if the line is malformed.
pub fn decode_entry_line(line: &str) -> CodecResult<Option<ResourceSyncInfo>> {
    let line = line.trim_end_matches('\r');
    if line.is_empty() || line == "D" {
        return Ok(None);
    }

    if let Some(rest) = line.strip_prefix("D/") {
        let name = rest.split('/').next().unwrap_or("");
        if name.is_empty() {
            return Err(CodecError::malformed_entry(line, "empty directory name"));
        }
        return Ok(Some(ResourceSyncInfo::directory(name)));
    }

    let Some(rest) = line.strip_prefix('/') else {
        return Err(CodecError::malformed_entry(line, "expected leading '/'"));
    };

    let fields: Vec<&str> = rest.splitn(6, '/').collect();
    if fields.len() < 5 {
        return Err(CodecError::malformed_entry(line, "too few fields"));
    }
    let name = fields[0];
    if name.is_empty() {
        return Err(CodecError::malformed_entry(line, "empty name"));
    }

    let (revision, deleted) = match fields[1].strip_prefix('-') {
        Some(revision) => (revision, true),
        None => (fields[1], false),
    };
    if revision.is_empty() {
        return Err(CodecError::malformed_entry(line, "empty revision"));
    }

    let (timestamp, merge) = decode_timestamp_field(fields[2]);
    let entry_type = if deleted {
        EntryType::Deleted
    } else {
        merge.unwrap_or(EntryType::Regular)
    };

    let keyword_mode = non_empty(fields[3]);
    let tag = match fields[4] {
        "" => None,
        text => Some(decode_tag(text, line)?),
    };
    let permissions = fields.get(5).and_then(|p| non_empty(p));

    Ok(Some(
        ResourceSyncInfo::new(name, revision, timestamp)
            .with_entry_type(entry_type)
            .with_keyword_mode(keyword_mode)
            .with_permissions(permissions)
            .with_tag(tag),
    ))
}

/// The record as it reads back from an Entries file.
///
/// Entries lines keep whole seconds, share one prefix for branch and
/// version tags, and carry no timestamp for a clean merge.
///
/// # Errors
///
/// Returns an error if the record cannot be written as an Entries line.
pub fn canonical_record(record: &ResourceSyncInfo) -> CodecResult<ResourceSyncInfo> {
    let line = entry_line(record)?;
    decode_entry_line(&line)?
        .ok_or_else(|| CodecError::malformed_entry(line, "record encodes to no entry"))
}

fn decode_timestamp_field(field: &str) -> (Option<DateTime<Utc>>, Option<EntryType>) {
    if let Some(rest) = field.strip_prefix(TIMESTAMP_MERGED_WITH_CONFLICT) {
        return (
            parse_timestamp(rest),
            Some(EntryType::Merged {
                with_conflicts: true,
            }),
        );
    }
    match field {
        TIMESTAMP_MERGED => (
            None,
            Some(EntryType::Merged {
                with_conflicts: false,
            }),
        ),
        // Server-side merge markers
        "+=" => (
            None,
            Some(EntryType::Merged {
                with_conflicts: true,
            }),
        ),
        "+modified" => (
            None,
            Some(EntryType::Merged {
                with_conflicts: false,
            }),
        ),
        "" | TIMESTAMP_DUMMY => (None, None),
        text if text.starts_with("Initial ") => (None, None),
        text => (parse_timestamp(text), None),
    }
}

fn decode_tag(text: &str, line: &str) -> CodecResult<CvsTag> {
    let mut chars = text.chars();
    let prefix = chars.next();
    let name = chars.as_str();
    if name.is_empty() {
        return Err(CodecError::malformed_entry(line, "empty tag"));
    }
    let kind = match prefix {
        Some('T') => TagKind::Branch,
        Some('N') => TagKind::Version,
        Some('D') => TagKind::Date,
        _ => return Err(CodecError::malformed_entry(line, "unknown tag prefix")),
    };
    Ok(CvsTag {
        kind,
        name: name.to_string(),
    })
}

fn non_empty(text: &str) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// A streaming Entries decoder.
///
/// Yields one record per meaningful line.
pub struct EntriesDecoder<'a> {
    lines: std::str::Lines<'a>,
}

impl<'a> EntriesDecoder<'a> {
    /// Create a new decoder over Entries text.
    pub fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines(),
        }
    }
}

impl Iterator for EntriesDecoder<'_> {
    type Item = CodecResult<ResourceSyncInfo>;

    fn next(&mut self) -> Option<Self::Item> {
        for line in self.lines.by_ref() {
            match decode_entry_line(line) {
                Ok(Some(record)) => return Some(Ok(record)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
        None
    }
}

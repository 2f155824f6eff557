//! Record encoder.
//!
//! Produces the byte layouts CVS itself writes, so a checkout managed by
//! CVSync stays readable by the `cvs` command line client.

use crate::error::{CodecError, CodecResult};
use crate::record::{CvsTag, EntryType, FolderSyncInfo, ResourceSyncInfo, TagKind};
use chrono::{DateTime, Utc};

/// `strftime` layout of Entries timestamps (ctime style, space padded day).
pub const TIMESTAMP_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

pub(crate) const TIMESTAMP_DUMMY: &str = "dummy timestamp";
pub(crate) const TIMESTAMP_MERGED: &str = "Result of merge";
pub(crate) const TIMESTAMP_MERGED_WITH_CONFLICT: &str = "Result of merge+";

/// Encode all child records of one folder as an Entries file.
///
/// Records are written in the order given; each ends with a newline.
///
/// # Errors
///
/// Returns an error if a name cannot be represented in an Entries line.
pub fn encode_entries<'a, I>(records: I) -> CodecResult<Vec<u8>>
where
    I: IntoIterator<Item = &'a ResourceSyncInfo>,
{
    let mut encoder = EntriesEncoder::new();
    for record in records {
        encoder.encode(record)?;
    }
    Ok(encoder.into_bytes())
}

/// Encode a folder binding.
///
/// The layout is one `Key value` pair per line: `Root`, `Repository`,
/// an optional `Tag` and an optional bare `Static` marker.
///
/// # Errors
///
/// Returns an error if a field contains a line break.
pub fn encode_folder_binding(info: &FolderSyncInfo) -> CodecResult<Vec<u8>> {
    for (field, value) in [("root", &info.root), ("repository", &info.repository)] {
        if value.contains(['\n', '\r']) {
            return Err(CodecError::encoding_failed(format!(
                "{field} contains a line break"
            )));
        }
    }

    let mut out = String::new();
    out.push_str("Root ");
    out.push_str(&info.root);
    out.push('\n');
    out.push_str("Repository ");
    out.push_str(&info.repository);
    out.push('\n');
    if let Some(tag) = &info.tag {
        out.push_str("Tag ");
        out.push_str(&folder_tag(tag));
        out.push('\n');
    }
    if info.is_static {
        out.push_str("Static\n");
    }
    Ok(out.into_bytes())
}

/// Encode an ignore pattern list, one pattern per line.
#[must_use]
pub fn encode_ignores(patterns: &[String]) -> Vec<u8> {
    let mut out = String::new();
    for pattern in patterns {
        out.push_str(pattern);
        out.push('\n');
    }
    out.into_bytes()
}

/// Format a timestamp the way Entries lines store it.
#[must_use]
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// An Entries file encoder.
pub struct EntriesEncoder {
    buffer: Vec<u8>,
}

impl EntriesEncoder {
    /// Create a new encoder.
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Create a new encoder with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Encode one record as a line.
    pub fn encode(&mut self, record: &ResourceSyncInfo) -> CodecResult<()> {
        let line = entry_line(record)?;
        self.buffer.extend_from_slice(line.as_bytes());
        self.buffer.push(b'\n');
        Ok(())
    }

    /// Consume this encoder and return the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Get a reference to the encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }
}

impl Default for EntriesEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Format a single record as an Entries line, without the newline.
///
/// # Errors
///
/// Returns an error if the name is empty, if any field contains `/` or a
/// line break, or if the revision is empty or starts with `-`.
pub fn entry_line(record: &ResourceSyncInfo) -> CodecResult<String> {
    if record.name.is_empty() || record.name.contains(FIELD_BREAKS) {
        return Err(CodecError::InvalidName {
            name: record.name.clone(),
        });
    }

    if record.is_directory() {
        return Ok(format!("D/{}////", record.name));
    }

    if record.revision.is_empty()
        || record.revision.starts_with('-')
        || record.revision.contains(FIELD_BREAKS)
    {
        return Err(CodecError::invalid_field("revision", &record.revision));
    }
    check_field("keyword mode", record.keyword_mode.as_deref())?;
    check_field("permissions", record.permissions.as_deref())?;
    if let Some(tag) = &record.tag {
        if tag.name.is_empty() {
            return Err(CodecError::invalid_field("tag", ""));
        }
        check_field("tag", Some(&tag.name))?;
    }

    let revision = if record.entry_type == EntryType::Deleted {
        format!("-{}", record.revision)
    } else {
        record.revision.clone()
    };

    let timestamp = match (record.entry_type, &record.timestamp) {
        (EntryType::Merged { with_conflicts: true }, Some(ts)) => {
            format!("{TIMESTAMP_MERGED_WITH_CONFLICT}{}", format_timestamp(ts))
        }
        (EntryType::Merged { with_conflicts: true }, None) => {
            TIMESTAMP_MERGED_WITH_CONFLICT.to_string()
        }
        (EntryType::Merged { with_conflicts: false }, _) => TIMESTAMP_MERGED.to_string(),
        (_, Some(ts)) => format_timestamp(ts),
        (_, None) if record.is_added() => TIMESTAMP_DUMMY.to_string(),
        (_, None) => String::new(),
    };

    let options = record.keyword_mode.as_deref().unwrap_or("");
    let tag = record.tag.as_ref().map(entry_tag).unwrap_or_default();

    let mut line = format!("/{}/{}/{}/{}/{}", record.name, revision, timestamp, options, tag);
    if let Some(permissions) = &record.permissions {
        line.push('/');
        line.push_str(permissions);
    }
    Ok(line)
}

const FIELD_BREAKS: [char; 3] = ['/', '\n', '\r'];

fn check_field(field: &'static str, value: Option<&str>) -> CodecResult<()> {
    match value {
        Some(value) if value.contains(FIELD_BREAKS) => Err(CodecError::invalid_field(field, value)),
        _ => Ok(()),
    }
}

// Entries lines share one prefix for branch and version tags
fn entry_tag(tag: &CvsTag) -> String {
    match tag.kind {
        TagKind::Branch | TagKind::Version => format!("T{}", tag.name),
        TagKind::Date => format!("D{}", tag.name),
    }
}

fn folder_tag(tag: &CvsTag) -> String {
    match tag.kind {
        TagKind::Branch => format!("T{}", tag.name),
        TagKind::Version => format!("N{}", tag.name),
        TagKind::Date => format!("D{}", tag.name),
    }
}

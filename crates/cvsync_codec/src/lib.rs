//! # CVSync Codec
//!
//! Sync records and their byte formats.
//!
//! This crate defines the immutable record types the metadata store keeps
//! and encodes them in the formats CVS itself uses:
//! - `Entries`: one line per child, `/name/revision/timestamp/options/tag`
//! - Folder binding: `Root`, `Repository`, optional `Tag` and `Static`
//! - Ignore lists: whitespace separated patterns
//!
//! ## Usage
//!
//! ```
//! use cvsync_codec::{decode_entries, encode_entries, ResourceSyncInfo};
//!
//! let records = vec![ResourceSyncInfo::new("Makefile", "1.4", None)];
//! let bytes = encode_entries(&records).unwrap();
//!
//! let decoded = decode_entries(&bytes).unwrap();
//! assert_eq!(records, decoded);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;
mod record;

pub use decoder::{
    canonical_record, decode_entries, decode_entry_line, decode_folder_binding, decode_ignores, parse_timestamp,
    EntriesDecoder,
};
pub use encoder::{
    encode_entries, encode_folder_binding, encode_ignores, entry_line, format_timestamp,
    EntriesEncoder, TIMESTAMP_FORMAT,
};
pub use error::{CodecError, CodecResult};
pub use record::{
    CvsTag, EntryType, FolderSyncInfo, ResourceSyncInfo, TagKind, ADDED_REVISION,
};

/// Trait for records that have a byte form.
pub trait Encode {
    /// Encode this record to bytes.
    fn encode(&self) -> CodecResult<Vec<u8>>;
}

/// Trait for records that can be read back from bytes.
pub trait Decode: Sized {
    /// Decode this record from bytes.
    fn decode(bytes: &[u8]) -> CodecResult<Self>;
}

impl Encode for FolderSyncInfo {
    fn encode(&self) -> CodecResult<Vec<u8>> {
        encode_folder_binding(self)
    }
}

impl Decode for FolderSyncInfo {
    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        decode_folder_binding(bytes)
    }
}

impl Encode for ResourceSyncInfo {
    fn encode(&self) -> CodecResult<Vec<u8>> {
        entry_line(self).map(String::into_bytes)
    }
}

impl Decode for ResourceSyncInfo {
    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        let text = std::str::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)?;
        decode_entry_line(text)?
            .ok_or_else(|| CodecError::decoding_failed("line carries no record"))
    }
}

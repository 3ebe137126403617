//! # emx-dfb
//!
//! DFB V1 container format: packs a directory tree (or a single file) into one
//! human-readable text blob, and unpacks it again.
//!
//! ## Format
//!
//! ```text
//! DFB V1
//! SEPARATOR: ----DFB-SEP::5f0c...----
//!
//! ----DFB-SEP::5f0c...----
//! FILENAME: src/main.rs
//! ENCODING: utf-8
//!
//! fn main() {}
//! ----DFB-SEP::5f0c...----
//! FILENAME: logo.png
//! ENCODING: base64
//!
//! iVBORw0KGgo...
//! ```
//!
//! - Line 1 is exactly `DFB V1`.
//! - The control block runs to the first blank line and names the session
//!   separator. The separator is generated fresh for every document and is the
//!   only structural delimiter; there is no escaping.
//! - Each entry block is a separator line, `KEY: value` metadata lines, a blank
//!   line, then content up to the next separator or end of input.
//!
//! ## Encoding
//!
//! Content that is valid UTF-8 is stored verbatim (`ENCODING: utf-8`),
//! anything else as standard base64 (`ENCODING: base64`). Unknown `ENCODING`
//! values are read as UTF-8.
//!
//! ## Errors
//!
//! A bad header or a missing separator fails the whole decode
//! ([`FormatError`]). A missing or unsafe `FILENAME`, or a broken base64
//! payload, only drops that entry ([`EntryError`]); the rest of the document is
//! still decoded.
//!
//! ```
//! use emx_dfb::{Decoder, Encoder, FileEntry, Archive};
//!
//! let archive = Archive::from(vec![FileEntry::new("a.txt", "hello")]);
//! let text = Encoder::new().encode(&archive).unwrap();
//!
//! let decoded = Decoder::new().decode(&text).unwrap();
//! assert!(decoded.is_clean());
//! assert_eq!(decoded.archive, archive);
//! ```

pub mod archive;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod fs;

pub use archive::{guess_mime, normalize_path, validate_path, Archive, Encoding, FileEntry};
pub use decoder::{deserialize, Decoded, Decoder};
pub use encoder::{generate_separator, serialize, Encoder, EncoderConfig};
pub use error::{EncodeError, EntryError, FormatError, UnsafeReason};

//! DFB document encoder

use base64::Engine;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::archive::{
    guess_mime, validate_path, Archive, Encoding, FileEntry, HEADER, KEY_ENCODING, KEY_FILENAME,
    KEY_MIME, KEY_SIZE, SEPARATOR_PREFIX, SEPARATOR_TOKEN_PREFIX, SEPARATOR_TOKEN_SUFFIX,
};
use crate::error::EncodeError;

/// Optional metadata and layout for encoded documents
#[derive(Debug, Clone, Default)]
pub struct EncoderConfig {
    /// Emit `SIZE:` with the byte length of each entry
    pub include_size: bool,
    /// Emit `MIME:` from the entry, or guessed from its extension
    pub include_mime: bool,
    /// Wrap base64 payloads at this many characters (single line if `None`)
    pub base64_wrap: Option<usize>,
}

impl EncoderConfig {
    pub fn with_size(mut self, include: bool) -> Self {
        self.include_size = include;
        self
    }

    pub fn with_mime(mut self, include: bool) -> Self {
        self.include_mime = include;
        self
    }

    pub fn with_base64_wrap(mut self, width: Option<usize>) -> Self {
        self.base64_wrap = width.filter(|w| *w > 0);
        self
    }
}

/// Generate a fresh session separator token
pub fn generate_separator() -> String {
    format!(
        "{}{}{}",
        SEPARATOR_TOKEN_PREFIX,
        Uuid::new_v4(),
        SEPARATOR_TOKEN_SUFFIX
    )
}

/// Encodes file entries into a DFB V1 document.
///
/// Each encoder carries one session separator, generated when it is
/// created. Create a new encoder per document.
pub struct Encoder {
    separator: String,
    config: EncoderConfig,
}

impl Encoder {
    /// Create a new encoder with a fresh separator
    pub fn new() -> Self {
        Self {
            separator: generate_separator(),
            config: EncoderConfig::default(),
        }
    }

    /// Use a fixed separator token instead of a generated one
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    pub fn with_config(mut self, config: EncoderConfig) -> Self {
        self.config = config;
        self
    }

    /// The session separator this encoder writes
    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// Encode an archive to a string
    pub fn encode(&self, archive: &Archive) -> Result<String, EncodeError> {
        self.encode_entries(&archive.entries)
    }

    /// Encode entries to a string, preserving their order
    pub fn encode_entries(&self, entries: &[FileEntry]) -> Result<String, EncodeError> {
        check_separator(&self.separator)?;

        let mut lines: Vec<String> = vec![
            HEADER.to_string(),
            format!("{} {}", SEPARATOR_PREFIX, self.separator),
            String::new(),
        ];

        for entry in entries {
            self.encode_entry(&mut lines, entry)?;
        }

        debug!(
            entries = entries.len(),
            separator = %self.separator,
            "encoded DFB document"
        );

        Ok(lines.join("\n"))
    }

    /// Encode a single entry block
    fn encode_entry(&self, lines: &mut Vec<String>, entry: &FileEntry) -> Result<(), EncodeError> {
        validate_path(&entry.path).map_err(|reason| EncodeError::UnsafeFilename {
            name: entry.path.clone(),
            reason,
        })?;

        let content = match entry.encoding {
            Encoding::Text => std::str::from_utf8(&entry.content)
                .map_err(|_| EncodeError::NotUtf8 {
                    name: entry.path.clone(),
                })?
                .to_string(),
            Encoding::Base64 => self.encode_base64(&entry.content),
        };

        if entry.encoding == Encoding::Text && self.collides_with_separator(&content) {
            // No escaping exists in V1; the reader will split this entry.
            warn!(
                file = %entry.path,
                "content contains the session separator, document will not round-trip"
            );
        }

        lines.push(self.separator.clone());
        lines.push(format!("{}: {}", KEY_FILENAME, entry.path));
        lines.push(format!("{}: {}", KEY_ENCODING, entry.encoding.label()));

        if self.config.include_size {
            lines.push(format!("{}: {}", KEY_SIZE, entry.content.len()));
        }

        if self.config.include_mime {
            let mime = entry.mime.clone().or_else(|| guess_mime(&entry.path));
            if let Some(mime) = mime {
                check_value(entry, KEY_MIME, &mime)?;
                lines.push(format!("{}: {}", KEY_MIME, mime));
            }
        }

        for (key, value) in &entry.extra {
            check_key(entry, key)?;
            check_value(entry, key, value)?;
            lines.push(format!("{}: {}", key, value));
        }

        lines.push(String::new());
        lines.push(content);

        debug!(
            file = %entry.path,
            encoding = %entry.encoding,
            bytes = entry.content.len(),
            "encoded entry"
        );
        Ok(())
    }

    fn encode_base64(&self, data: &[u8]) -> String {
        let encoded = base64::engine::general_purpose::STANDARD.encode(data);
        match self.config.base64_wrap {
            Some(width) if width > 0 && encoded.len() > width => {
                let mut wrapped = String::with_capacity(encoded.len() + encoded.len() / width);
                let mut rest = encoded.as_str();
                while rest.len() > width {
                    // base64 output is ASCII, so any byte offset is a char boundary
                    let (line, tail) = rest.split_at(width);
                    wrapped.push_str(line);
                    wrapped.push('\n');
                    rest = tail;
                }
                wrapped.push_str(rest);
                wrapped
            }
            _ => encoded,
        }
    }

    fn collides_with_separator(&self, content: &str) -> bool {
        content
            .split('\n')
            .any(|line| line.trim_end() == self.separator)
    }

    /// Encode an archive directly to a writer
    pub fn encode_to_writer<W: std::io::Write>(
        &self,
        archive: &Archive,
        mut writer: W,
    ) -> anyhow::Result<()> {
        let encoded = self.encode(archive)?;
        writer.write_all(encoded.as_bytes())?;
        Ok(())
    }

    /// Encode an archive to a file
    pub fn encode_to_file(&self, archive: &Archive, path: &std::path::Path) -> anyhow::Result<()> {
        let encoded = self.encode(archive)?;
        std::fs::write(path, encoded)?;
        Ok(())
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

/// The reader trims the `SEPARATOR:` value and compares whole lines, so the
/// token must be non-empty, single-line and free of surrounding whitespace.
fn check_separator(separator: &str) -> Result<(), EncodeError> {
    if separator.is_empty() || separator.trim() != separator || separator.contains(['\n', '\r']) {
        return Err(EncodeError::InvalidSeparator {
            separator: separator.to_string(),
        });
    }
    Ok(())
}

fn check_key(entry: &FileEntry, key: &str) -> Result<(), EncodeError> {
    let reserved = [KEY_FILENAME, KEY_ENCODING, KEY_SIZE, KEY_MIME].contains(&key);
    if reserved || key.trim().is_empty() || key.contains(':') || key.contains(['\n', '\r']) {
        return Err(EncodeError::InvalidMetadata {
            name: entry.path.clone(),
            key: key.to_string(),
        });
    }
    Ok(())
}

fn check_value(entry: &FileEntry, key: &str, value: &str) -> Result<(), EncodeError> {
    if value.contains(['\n', '\r']) {
        return Err(EncodeError::InvalidMetadata {
            name: entry.path.clone(),
            key: key.to_string(),
        });
    }
    Ok(())
}

/// Serialize entries with a fresh separator and default options
pub fn serialize(entries: &[FileEntry]) -> Result<String, EncodeError> {
    Encoder::new().encode_entries(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEP: &str = "----DFB-SEP::test----";

    #[test]
    fn test_encode_simple_text() {
        let archive = Archive::from(vec![FileEntry::new("a.txt", "hello")]);

        let encoder = Encoder::new().with_separator(SEP);
        let result = encoder.encode(&archive).unwrap();

        assert_eq!(
            result,
            "DFB V1\nSEPARATOR: ----DFB-SEP::test----\n\n----DFB-SEP::test----\nFILENAME: a.txt\nENCODING: utf-8\n\nhello"
        );
    }

    #[test]
    fn test_encode_empty_archive() {
        let encoder = Encoder::new().with_separator(SEP);
        let result = encoder.encode(&Archive::new()).unwrap();

        assert_eq!(result, "DFB V1\nSEPARATOR: ----DFB-SEP::test----\n");
    }

    #[test]
    fn test_encode_binary() {
        let archive = Archive::from(vec![FileEntry::new("image.jpg", vec![0xFF, 0xD8, 0xFF])]);

        let encoder = Encoder::new().with_separator(SEP);
        let result = encoder.encode(&archive).unwrap();

        assert!(result.contains("FILENAME: image.jpg\nENCODING: base64\n\n/9j/"));
    }

    #[test]
    fn test_encode_multiple_files_in_order() {
        let archive = Archive::from(vec![
            FileEntry::new("file2.txt", "Content 2"),
            FileEntry::new("file1.txt", "Content 1"),
        ]);

        let result = Encoder::new().with_separator(SEP).encode(&archive).unwrap();

        let second = result.find("FILENAME: file2.txt").unwrap();
        let first = result.find("FILENAME: file1.txt").unwrap();
        assert!(second < first);
        assert_eq!(result.matches(SEP).count(), 3);
    }

    #[test]
    fn test_fresh_separator_per_encoder() {
        let a = Encoder::new();
        let b = Encoder::new();

        assert_ne!(a.separator(), b.separator());
        assert!(a.separator().starts_with(SEPARATOR_TOKEN_PREFIX));
        assert!(a.separator().ends_with(SEPARATOR_TOKEN_SUFFIX));
    }

    #[test]
    fn test_encode_with_size_and_mime() {
        let archive = Archive::from(vec![
            FileEntry::new("notes.txt", "12345"),
            FileEntry::new("blob", "x").with_mime("application/x-custom"),
        ]);
        let config = EncoderConfig::default().with_size(true).with_mime(true);

        let result = Encoder::new()
            .with_separator(SEP)
            .with_config(config)
            .encode(&archive)
            .unwrap();

        assert!(result.contains("FILENAME: notes.txt\nENCODING: utf-8\nSIZE: 5\nMIME: text/plain\n\n12345"));
        assert!(result.contains("SIZE: 1\nMIME: application/x-custom\n"));
    }

    #[test]
    fn test_encode_base64_wrapped() {
        let data: Vec<u8> = (0u8..=255).collect();
        let archive = Archive::from(vec![FileEntry::with_encoding("all.bin", data, Encoding::Base64)]);
        let config = EncoderConfig::default().with_base64_wrap(Some(76));

        let result = Encoder::new()
            .with_separator(SEP)
            .with_config(config)
            .encode(&archive)
            .unwrap();

        let payload = result.split("\n\n").last().unwrap();
        assert!(payload.lines().count() > 1);
        assert!(payload.lines().all(|l| l.len() <= 76));
    }

    #[test]
    fn test_encode_extra_metadata() {
        let archive = Archive::from(vec![FileEntry::new("a.txt", "x").with_extra("AUTHOR", "nz")]);

        let result = Encoder::new().with_separator(SEP).encode(&archive).unwrap();

        assert!(result.contains("ENCODING: utf-8\nAUTHOR: nz\n\nx"));
    }

    #[test]
    fn test_encode_rejects_unsafe_path() {
        let archive = Archive::from(vec![FileEntry::new("../escape.txt", "x")]);

        let err = Encoder::new().encode(&archive).unwrap_err();
        assert!(matches!(err, EncodeError::UnsafeFilename { .. }));
    }

    #[test]
    fn test_encode_rejects_whitespace_around_path() {
        let archive = Archive::from(vec![FileEntry::new(" notes.txt ", "x")]);

        let err = Encoder::new().encode(&archive).unwrap_err();
        assert_eq!(
            err,
            EncodeError::UnsafeFilename {
                name: " notes.txt ".into(),
                reason: crate::error::UnsafeReason::SurroundingWhitespace,
            }
        );
    }

    #[test]
    fn test_encode_rejects_unusable_separator() {
        let archive = Archive::from(vec![FileEntry::new("a.txt", "x")]);

        for separator in ["", " tok ", "tok ", "\ttok", "to\nk", "   "] {
            let err = Encoder::new()
                .with_separator(separator)
                .encode(&archive)
                .unwrap_err();
            assert_eq!(
                err,
                EncodeError::InvalidSeparator {
                    separator: separator.into()
                },
                "separator {separator:?}"
            );
        }
    }

    #[test]
    fn test_fixed_separator_round_trips() {
        let archive = Archive::from(vec![FileEntry::new("a.txt", "x")]);

        let document = Encoder::new().with_separator("@@").encode(&archive).unwrap();
        let decoded = crate::decoder::deserialize(&document).unwrap();

        assert_eq!(decoded.archive, archive);
    }

    #[test]
    fn test_encode_rejects_non_utf8_text() {
        let archive = Archive::from(vec![FileEntry::with_encoding("bad.txt", vec![0xFF, 0xFE], Encoding::Text)]);

        let err = Encoder::new().encode(&archive).unwrap_err();
        assert_eq!(err, EncodeError::NotUtf8 { name: "bad.txt".into() });
    }

    #[test]
    fn test_encode_rejects_reserved_extra_key() {
        let archive = Archive::from(vec![FileEntry::new("a.txt", "x").with_extra("FILENAME", "b.txt")]);

        let err = Encoder::new().encode(&archive).unwrap_err();
        assert!(matches!(err, EncodeError::InvalidMetadata { .. }));
    }

    #[test]
    fn test_encode_with_subdirectories() {
        let archive = Archive::from(vec![FileEntry::new("dir\\subdir\\file.txt", "Content")]);

        let result = Encoder::new().encode(&archive).unwrap();

        assert!(result.contains("FILENAME: dir/subdir/file.txt"));
    }

    #[test]
    fn test_serialize_free_function() {
        let doc = serialize(&[FileEntry::new("a.txt", "hello")]).unwrap();

        assert!(doc.starts_with("DFB V1\nSEPARATOR: ----DFB-SEP::"));
        assert!(doc.ends_with("FILENAME: a.txt\nENCODING: utf-8\n\nhello"));
    }
}

//! Archive data structures

use std::path::Path;

use crate::error::UnsafeReason;

// DFB format constants
pub const HEADER: &str = "DFB V1";
pub const SEPARATOR_PREFIX: &str = "SEPARATOR:";
pub const SEPARATOR_TOKEN_PREFIX: &str = "----DFB-SEP::";
pub const SEPARATOR_TOKEN_SUFFIX: &str = "----";

// Metadata keys
pub const KEY_FILENAME: &str = "FILENAME";
pub const KEY_ENCODING: &str = "ENCODING";
pub const KEY_SIZE: &str = "SIZE";
pub const KEY_MIME: &str = "MIME";

// ENCODING values
pub const ENCODING_UTF8: &str = "utf-8";
pub const ENCODING_BASE64: &str = "base64";

/// How an entry's bytes are represented inside a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    /// Raw UTF-8 text, stored verbatim
    #[default]
    Text,
    /// Arbitrary bytes, stored as standard base64
    Base64,
}

impl Encoding {
    /// Value written to the `ENCODING` metadata key
    pub fn label(self) -> &'static str {
        match self {
            Encoding::Text => ENCODING_UTF8,
            Encoding::Base64 => ENCODING_BASE64,
        }
    }

    /// Parse an `ENCODING` value (case-insensitive).
    ///
    /// Returns `None` for values this version does not know.
    pub fn from_label(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.eq_ignore_ascii_case(ENCODING_UTF8) {
            Some(Encoding::Text)
        } else if value.eq_ignore_ascii_case(ENCODING_BASE64) {
            Some(Encoding::Base64)
        } else {
            None
        }
    }

    /// Pick the encoding for raw bytes: text when they are valid UTF-8,
    /// base64 otherwise.
    pub fn detect(data: &[u8]) -> Self {
        if std::str::from_utf8(data).is_ok() {
            Encoding::Text
        } else {
            Encoding::Base64
        }
    }
}

impl std::fmt::Display for Encoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Represents a single file in an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Relative, forward-slash separated path
    pub path: String,
    /// Contents of the file
    pub content: Vec<u8>,
    /// How `content` is stored in the document
    pub encoding: Encoding,
    /// Byte length recorded in the `SIZE` key (informational)
    pub size: Option<u64>,
    /// Content-type hint from the `MIME` key (informational)
    pub mime: Option<String>,
    /// Unrecognized metadata, in document order
    pub extra: Vec<(String, String)>,
}

impl FileEntry {
    /// Create an entry, choosing the encoding from the content
    pub fn new(path: impl AsRef<str>, content: impl Into<Vec<u8>>) -> Self {
        let content = content.into();
        let encoding = Encoding::detect(&content);
        Self::with_encoding(path, content, encoding)
    }

    /// Create an entry with an explicit encoding
    pub fn with_encoding(
        path: impl AsRef<str>,
        content: impl Into<Vec<u8>>,
        encoding: Encoding,
    ) -> Self {
        Self {
            path: normalize_path(path.as_ref()),
            content: content.into(),
            encoding,
            size: None,
            mime: None,
            extra: Vec::new(),
        }
    }

    /// Attach a content-type hint
    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }

    /// Attach an opaque metadata pair
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.push((key.into(), value.into()));
        self
    }

    /// Content as text, if it is valid UTF-8
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.content).ok()
    }

    /// Look up an unrecognized metadata value by key
    pub fn extra_value(&self, key: &str) -> Option<&str> {
        self.extra
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Convert a source path to the document form: forward slashes, no
/// leading `./` segments.
pub fn normalize_path(path: &str) -> String {
    let mut normalized = path.replace('\\', "/");
    while let Some(rest) = normalized.strip_prefix("./") {
        normalized = rest.to_string();
    }
    normalized
}

/// Check that a filename is safe to hand to a filesystem writer.
///
/// Nested directories (`a/b/c.txt`) are allowed.
pub fn validate_path(name: &str) -> Result<(), UnsafeReason> {
    if name.is_empty() {
        return Err(UnsafeReason::Empty);
    }
    if name.starts_with('/') || name.starts_with('\\') {
        return Err(UnsafeReason::Absolute);
    }
    if name.contains("..") {
        return Err(UnsafeReason::ParentDirectory);
    }
    if name.contains(':') {
        return Err(UnsafeReason::Colon);
    }
    if name.contains('\n') || name.contains('\r') {
        return Err(UnsafeReason::LineBreak);
    }
    if name.trim() != name {
        return Err(UnsafeReason::SurroundingWhitespace);
    }
    Ok(())
}

/// Best-effort content-type hint from the file extension
pub fn guess_mime(path: &str) -> Option<String> {
    mime_guess::from_path(path)
        .first_raw()
        .map(str::to_string)
}

/// Represents a DFB archive: an ordered set of files
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Archive {
    /// Files in document order
    pub entries: Vec<FileEntry>,
}

impl Archive {
    /// Create a new empty archive
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, keeping insertion order
    pub fn add_entry(&mut self, entry: FileEntry) {
        self.entries.push(entry);
    }

    /// Add a file from a path, named by `archive_name` or the file's own name
    pub fn add_file_from_path(
        &mut self,
        path: &Path,
        archive_name: Option<String>,
    ) -> anyhow::Result<()> {
        let data = std::fs::read(path)?;

        let name = match archive_name {
            Some(name) => name,
            None => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| anyhow::anyhow!("Invalid filename: {}", path.display()))?,
        };

        self.add_entry(FileEntry::new(name, data));
        Ok(())
    }

    /// Find the first entry with the given path
    pub fn get(&self, path: &str) -> Option<&FileEntry> {
        self.entries.iter().find(|e| e.path == path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FileEntry> {
        self.entries.iter()
    }
}

impl From<Vec<FileEntry>> for Archive {
    fn from(entries: Vec<FileEntry>) -> Self {
        Self { entries }
    }
}

impl<'a> IntoIterator for &'a Archive {
    type Item = &'a FileEntry;
    type IntoIter = std::slice::Iter<'a, FileEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_text() {
        assert_eq!(Encoding::detect(b"Hello, world!"), Encoding::Text);
        assert_eq!(Encoding::detect("héllo wörld".as_bytes()), Encoding::Text);
        assert_eq!(Encoding::detect(b""), Encoding::Text);
    }

    #[test]
    fn test_detect_binary() {
        assert_eq!(Encoding::detect(&[0xFF, 0xD8, 0xFF, 0xE0]), Encoding::Base64);
    }

    #[test]
    fn test_encoding_label_case_insensitive() {
        assert_eq!(Encoding::from_label("BASE64"), Some(Encoding::Base64));
        assert_eq!(Encoding::from_label("Utf-8"), Some(Encoding::Text));
        assert_eq!(Encoding::from_label("latin-1"), None);
    }

    #[test]
    fn test_file_entry_new_detects_encoding() {
        let text = FileEntry::new("a.txt", "hello");
        assert_eq!(text.encoding, Encoding::Text);

        let bin = FileEntry::new("img.png", vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0xFF]);
        assert_eq!(bin.encoding, Encoding::Base64);
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("dir\\sub\\file.txt"), "dir/sub/file.txt");
        assert_eq!(normalize_path("./a/b.txt"), "a/b.txt");
        assert_eq!(normalize_path("plain.txt"), "plain.txt");
        assert_eq!(FileEntry::new("src\\main.rs", "fn main() {}").path, "src/main.rs");
    }

    #[test]
    fn test_validate_path_accepts_nested() {
        assert!(validate_path("a.txt").is_ok());
        assert!(validate_path("dir/subdir/file.txt").is_ok());
        assert!(validate_path(".hidden/config").is_ok());
    }

    #[test]
    fn test_validate_path_rejects_unsafe() {
        assert_eq!(validate_path(""), Err(UnsafeReason::Empty));
        assert_eq!(validate_path("/etc/passwd"), Err(UnsafeReason::Absolute));
        assert_eq!(validate_path("\\windows\\system32"), Err(UnsafeReason::Absolute));
        assert_eq!(validate_path("../x"), Err(UnsafeReason::ParentDirectory));
        assert_eq!(validate_path("a/../../b"), Err(UnsafeReason::ParentDirectory));
        assert_eq!(validate_path("C:\\x"), Err(UnsafeReason::Colon));
        assert_eq!(validate_path("file.txt:stream"), Err(UnsafeReason::Colon));
        assert_eq!(validate_path("a\nb"), Err(UnsafeReason::LineBreak));
        assert_eq!(validate_path(" notes.txt "), Err(UnsafeReason::SurroundingWhitespace));
        assert_eq!(validate_path("notes.txt\t"), Err(UnsafeReason::SurroundingWhitespace));
    }

    #[test]
    fn test_validate_path_allows_inner_spaces() {
        assert!(validate_path("My Documents/annual report.txt").is_ok());
    }

    #[test]
    fn test_guess_mime() {
        assert_eq!(guess_mime("notes.txt").as_deref(), Some("text/plain"));
        assert_eq!(guess_mime("img/photo.png").as_deref(), Some("image/png"));
        assert_eq!(guess_mime("no_extension"), None);
    }

    #[test]
    fn test_archive_add_and_get() {
        let mut archive = Archive::new();
        archive.add_entry(FileEntry::new("one.txt", "1"));
        archive.add_entry(FileEntry::new("two.txt", "2"));

        assert_eq!(archive.len(), 2);
        assert_eq!(archive.get("two.txt").map(|e| e.content.as_slice()), Some(&b"2"[..]));
        assert!(archive.get("three.txt").is_none());
        let names: Vec<_> = archive.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(names, ["one.txt", "two.txt"]);
    }

    #[test]
    fn test_add_file_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        std::fs::write(&path, [0u8, 159, 146, 150]).unwrap();

        let mut archive = Archive::new();
        archive.add_file_from_path(&path, None).unwrap();
        archive.add_file_from_path(&path, Some("renamed/data.bin".into())).unwrap();

        assert_eq!(archive.entries[0].path, "data.bin");
        assert_eq!(archive.entries[0].encoding, Encoding::Base64);
        assert_eq!(archive.entries[1].path, "renamed/data.bin");
    }
}

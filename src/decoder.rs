//! DFB document decoder

use base64::Engine;
use tracing::{debug, warn};

use crate::archive::{
    validate_path, Archive, Encoding, FileEntry, HEADER, KEY_ENCODING, KEY_FILENAME, KEY_MIME,
    KEY_SIZE, SEPARATOR_PREFIX,
};
use crate::error::{EntryError, FormatError};

const BYTE_ORDER_MARK: char = '\u{feff}';

/// Result of decoding a document: the entries that flushed cleanly and the
/// per-entry failures, both in document order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Decoded {
    pub archive: Archive,
    pub errors: Vec<EntryError>,
}

impl Decoded {
    /// True when every entry block decoded
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn entries(&self) -> &[FileEntry] {
        &self.archive.entries
    }
}

impl FromIterator<Result<FileEntry, EntryError>> for Decoded {
    fn from_iter<I: IntoIterator<Item = Result<FileEntry, EntryError>>>(iter: I) -> Self {
        let mut decoded = Decoded::default();
        for result in iter {
            match result {
                Ok(entry) => decoded.archive.add_entry(entry),
                Err(err) => decoded.errors.push(err),
            }
        }
        decoded
    }
}

/// Decodes DFB V1 documents
#[derive(Debug, Clone, Default)]
pub struct Decoder {}

impl Decoder {
    /// Create a new decoder
    pub fn new() -> Self {
        Self {}
    }

    /// Decode a document, collecting entries and per-entry errors.
    ///
    /// Fails only when the header or the separator is missing.
    pub fn decode(&self, input: &str) -> Result<Decoded, FormatError> {
        let decoded: Decoded = self.decode_entries(input)?.into_iter().collect();
        debug!(
            entries = decoded.archive.len(),
            errors = decoded.errors.len(),
            "decoded DFB document"
        );
        Ok(decoded)
    }

    /// Decode a document into one result per entry block, in document order
    pub fn decode_entries(
        &self,
        input: &str,
    ) -> Result<Vec<Result<FileEntry, EntryError>>, FormatError> {
        let mut parser = Parser::new();
        for line in input.split('\n') {
            parser.feed(line)?;
        }
        parser.finish()
    }

    /// Read a whole document from a reader and decode it
    pub fn decode_from_reader<R: std::io::Read>(&self, mut reader: R) -> anyhow::Result<Decoded> {
        let mut input = String::new();
        reader.read_to_string(&mut input)?;
        Ok(self.decode(&input)?)
    }
}

/// Deserialize a document with the default decoder
pub fn deserialize(input: &str) -> Result<Decoded, FormatError> {
    Decoder::new().decode(input)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    ExpectHeader,
    ExpectControlBlock,
    SeekFirstEntry,
    InMetadata,
    InContent,
    Done,
}

/// Metadata and content lines of the entry block being read
struct PendingEntry<'a> {
    index: usize,
    metadata: Vec<(&'a str, &'a str)>,
    content: Vec<&'a str>,
}

impl<'a> PendingEntry<'a> {
    fn new(index: usize) -> Self {
        Self {
            index,
            metadata: Vec::new(),
            content: Vec::new(),
        }
    }

    /// Last value for a key, mirroring "later lines win"
    fn value(&self, key: &str) -> Option<&'a str> {
        self.metadata
            .iter()
            .rev()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
    }

    fn is_blank(&self) -> bool {
        self.metadata.is_empty() && self.content.iter().all(|l| is_blank(l))
    }
}

struct Parser<'a> {
    state: ParseState,
    separator: Option<&'a str>,
    next_index: usize,
    current: Option<PendingEntry<'a>>,
    results: Vec<Result<FileEntry, EntryError>>,
}

impl<'a> Parser<'a> {
    fn new() -> Self {
        Self {
            state: ParseState::ExpectHeader,
            separator: None,
            next_index: 0,
            current: None,
            results: Vec::new(),
        }
    }

    fn feed(&mut self, line: &'a str) -> Result<(), FormatError> {
        match self.state {
            ParseState::ExpectHeader => self.handle_header(line),
            ParseState::ExpectControlBlock => self.handle_control(line),
            ParseState::SeekFirstEntry => {
                if self.is_separator(line) {
                    self.start_entry();
                } else if !is_blank(line) {
                    debug!(line, "ignoring line before first entry");
                }
                Ok(())
            }
            ParseState::InMetadata => {
                self.handle_metadata(line);
                Ok(())
            }
            ParseState::InContent => {
                self.handle_content(line);
                Ok(())
            }
            ParseState::Done => Ok(()),
        }
    }

    fn handle_header(&mut self, line: &str) -> Result<(), FormatError> {
        let header = line.strip_prefix(BYTE_ORDER_MARK).unwrap_or(line);
        if header.trim_end() != HEADER {
            return Err(FormatError::InvalidHeader {
                found: line.to_string(),
            });
        }
        self.state = ParseState::ExpectControlBlock;
        Ok(())
    }

    fn handle_control(&mut self, line: &'a str) -> Result<(), FormatError> {
        if is_blank(line) {
            if self.separator.is_none() {
                return Err(FormatError::MissingSeparator);
            }
            self.state = ParseState::SeekFirstEntry;
            return Ok(());
        }

        if let Some(rest) = line.strip_prefix(SEPARATOR_PREFIX) {
            let token = rest.trim();
            if self.separator.is_none() && !token.is_empty() {
                self.separator = Some(token);
            }
        } else {
            debug!(line, "ignoring control line");
        }
        Ok(())
    }

    fn handle_metadata(&mut self, line: &'a str) {
        if self.is_separator(line) {
            self.start_entry();
            return;
        }
        if is_blank(line) {
            self.state = ParseState::InContent;
            return;
        }

        match line.split_once(':') {
            Some((key, value)) => {
                if let Some(entry) = self.current.as_mut() {
                    entry.metadata.push((key.trim(), value.trim()));
                }
            }
            None => debug!(line, "ignoring metadata line without ':'"),
        }
    }

    fn handle_content(&mut self, line: &'a str) {
        if self.is_separator(line) {
            self.start_entry();
            return;
        }
        if let Some(entry) = self.current.as_mut() {
            entry.content.push(line);
        }
    }

    fn is_separator(&self, line: &str) -> bool {
        self.separator.is_some_and(|sep| line.trim_end() == sep)
    }

    /// Flush the current entry and open a new one
    fn start_entry(&mut self) {
        self.flush();
        self.current = Some(PendingEntry::new(self.next_index));
        self.next_index += 1;
        self.state = ParseState::InMetadata;
    }

    fn flush(&mut self) {
        let Some(pending) = self.current.take() else {
            return;
        };
        if pending.is_blank() {
            debug!(index = pending.index, "skipping empty entry block");
            return;
        }

        let result = resolve_entry(&pending);
        match &result {
            Ok(entry) => debug!(
                index = pending.index,
                file = %entry.path,
                encoding = %entry.encoding,
                bytes = entry.content.len(),
                "extracted entry"
            ),
            Err(err) => warn!(index = pending.index, "skipping entry: {}", err),
        }
        self.results.push(result);
    }

    /// Flush the last entry and stop; lines fed afterwards are ignored
    fn finish(&mut self) -> Result<Vec<Result<FileEntry, EntryError>>, FormatError> {
        match self.state {
            ParseState::ExpectHeader => {
                return Err(FormatError::InvalidHeader {
                    found: String::new(),
                })
            }
            ParseState::ExpectControlBlock if self.separator.is_none() => {
                return Err(FormatError::MissingSeparator)
            }
            ParseState::Done => return Ok(Vec::new()),
            _ => {}
        }

        // End of input acts as a final separator
        self.flush();
        self.state = ParseState::Done;
        Ok(std::mem::take(&mut self.results))
    }
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

/// Turn a pending entry block into a file entry
fn resolve_entry(pending: &PendingEntry<'_>) -> Result<FileEntry, EntryError> {
    let index = pending.index;

    let name = pending
        .value(KEY_FILENAME)
        .ok_or(EntryError::MissingFilename { index })?;

    validate_path(name).map_err(|reason| EntryError::UnsafeFilename {
        index,
        name: name.to_string(),
        reason,
    })?;

    let label = pending.value(KEY_ENCODING).unwrap_or(Encoding::Text.label());
    let encoding = Encoding::from_label(label).unwrap_or_else(|| {
        warn!(file = name, encoding = label, "unrecognized encoding, reading as utf-8");
        Encoding::Text
    });

    let content = match encoding {
        Encoding::Text => pending.content.join("\n").into_bytes(),
        Encoding::Base64 => {
            let payload: String = pending
                .content
                .concat()
                .chars()
                .filter(|c| !matches!(c, '\n' | '\r' | ' '))
                .collect();
            base64::engine::general_purpose::STANDARD
                .decode(payload.as_bytes())
                .map_err(|source| EntryError::Base64Decode {
                    index,
                    name: name.to_string(),
                    source,
                })?
        }
    };

    let size = pending.value(KEY_SIZE).and_then(|raw| match raw.parse::<u64>() {
        Ok(size) => {
            if size != content.len() as u64 {
                warn!(
                    file = name,
                    declared = size,
                    actual = content.len(),
                    "SIZE does not match content"
                );
            }
            Some(size)
        }
        Err(_) => {
            warn!(file = name, size = raw, "ignoring unparsable SIZE");
            None
        }
    });

    let extra = pending
        .metadata
        .iter()
        .filter(|(k, _)| ![KEY_FILENAME, KEY_ENCODING, KEY_SIZE, KEY_MIME].contains(k))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    Ok(FileEntry {
        path: name.to_string(),
        content,
        encoding,
        size,
        mime: pending.value(KEY_MIME).map(str::to_string),
        extra,
    })
}

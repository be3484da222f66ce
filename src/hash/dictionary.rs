// Dictionary reading module
// Lazy, best-effort iteration over newline-delimited wordlists

use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::error::VerifyError;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Where a dictionary's candidates come from
///
/// The engine treats sources as opaque: it opens paths itself but never
/// creates, moves or deduplicates wordlist files.
pub enum DictionarySource {
    Path(PathBuf),
    Stream {
        name: String,
        reader: Box<dyn Read + Send>,
    },
}

impl DictionarySource {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        DictionarySource::Path(path.into())
    }

    /// Wrap an already-open readable stream under a display name
    pub fn stream(name: impl Into<String>, reader: impl Read + Send + 'static) -> Self {
        DictionarySource::Stream {
            name: name.into(),
            reader: Box::new(reader),
        }
    }

    pub fn name(&self) -> String {
        match self {
            DictionarySource::Path(path) => path.display().to_string(),
            DictionarySource::Stream { name, .. } => name.clone(),
        }
    }
}

impl fmt::Debug for DictionarySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DictionarySource::Path(path) => f.debug_tuple("Path").field(path).finish(),
            DictionarySource::Stream { name, .. } => {
                f.debug_struct("Stream").field("name", name).finish_non_exhaustive()
            }
        }
    }
}

impl From<PathBuf> for DictionarySource {
    fn from(path: PathBuf) -> Self {
        DictionarySource::Path(path)
    }
}

impl From<&Path> for DictionarySource {
    fn from(path: &Path) -> Self {
        DictionarySource::Path(path.to_path_buf())
    }
}

/// Identifies a dictionary within a run: its position in the request and its display name
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize)]
pub struct DictionaryId {
    pub index: usize,
    pub name: String,
}

impl DictionaryId {
    pub fn new(index: usize, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
        }
    }
}

impl fmt::Display for DictionaryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Lazy sequence of candidates from one dictionary
///
/// Yields each line trimmed of surrounding whitespace, skipping blank lines.
/// Lines that are not valid UTF-8 are skipped and counted rather than failing
/// the whole source. The sequence is not restartable, and the consumer may stop
/// pulling at any point without the remainder being read.
pub struct DictionaryReader {
    id: DictionaryId,
    inner: Box<dyn BufRead + Send>,
    buf: Vec<u8>,
    lines_read: u64,
    skipped_lines: u64,
    total_lines: Option<u64>,
    finished: bool,
}

impl DictionaryReader {
    /// Open a source for reading
    ///
    /// When `count_lines` is set and the source is a file, the file is counted
    /// once up front so progress can report a total. Streams never have a total.
    pub fn open(
        id: DictionaryId,
        source: DictionarySource,
        count_lines: bool,
    ) -> Result<Self, VerifyError> {
        match source {
            DictionarySource::Path(path) => {
                let unreadable = |source: io::Error| VerifyError::DictionaryUnreadable {
                    dictionary: id.name.clone(),
                    source,
                };

                let file = File::open(&path).map_err(unreadable)?;
                // Directories open fine on unix and only fail on the first read
                if file.metadata().map_err(unreadable)?.is_dir() {
                    return Err(unreadable(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "is a directory",
                    )));
                }

                let total_lines = if count_lines {
                    Some(count_file_lines(&path).map_err(unreadable)?)
                } else {
                    None
                };

                let reader = BufReader::with_capacity(READ_BUFFER_SIZE, file);
                Ok(Self::new(id, Box::new(reader), total_lines))
            }
            DictionarySource::Stream { reader, .. } => {
                Ok(Self::new(id, Box::new(BufReader::new(reader)), None))
            }
        }
    }

    /// Build a reader directly over any byte stream
    pub fn from_reader(id: DictionaryId, reader: impl Read + Send + 'static) -> Self {
        Self::new(id, Box::new(BufReader::new(reader)), None)
    }

    fn new(id: DictionaryId, inner: Box<dyn BufRead + Send>, total_lines: Option<u64>) -> Self {
        Self {
            id,
            inner,
            buf: Vec::with_capacity(256),
            lines_read: 0,
            skipped_lines: 0,
            total_lines,
            finished: false,
        }
    }

    pub fn id(&self) -> &DictionaryId {
        &self.id
    }

    /// Raw lines consumed so far, including blank and undecodable ones
    pub fn lines_read(&self) -> u64 {
        self.lines_read
    }

    /// Lines skipped because they could not be decoded, plus mid-stream read failures
    pub fn skipped_lines(&self) -> u64 {
        self.skipped_lines
    }

    pub fn total_lines(&self) -> Option<u64> {
        self.total_lines
    }
}

/// One raw line pulled from a dictionary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// Trimmed, non-blank candidate
    Candidate(String),
    /// Blank or undecodable line; consumed but not a candidate
    Skipped,
}

impl DictionaryReader {
    /// Read exactly one raw line
    ///
    /// Returns `None` at the end of the source or after a failed read. Unlike
    /// the iterator, this hands control back for blank and undecodable lines
    /// too, so callers can act on every line consumed.
    pub fn next_line(&mut self) -> Option<Line> {
        if self.finished {
            return None;
        }

        loop {
            self.buf.clear();
            match self.inner.read_until(b'\n', &mut self.buf) {
                Ok(0) => {
                    self.finished = true;
                    return None;
                }
                Ok(_) => {
                    self.lines_read += 1;
                    return Some(self.decode());
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    // The stream position is unknown after a failed read, so stop here
                    self.skipped_lines += 1;
                    self.finished = true;
                    warn!(dictionary = %self.id, error = %e, "read failed, ending dictionary early");
                    return None;
                }
            }
        }
    }

    fn decode(&mut self) -> Line {
        match std::str::from_utf8(&self.buf) {
            Ok(line) => match line.trim() {
                "" => Line::Skipped,
                candidate => Line::Candidate(candidate.to_string()),
            },
            Err(_) => {
                self.skipped_lines += 1;
                let err = VerifyError::LineDecodeError {
                    dictionary: self.id.name.clone(),
                    line: self.lines_read,
                };
                debug!(dictionary = %self.id, line = self.lines_read, "skipping line: {}", err);
                Line::Skipped
            }
        }
    }
}

impl Iterator for DictionaryReader {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            match self.next_line()? {
                Line::Candidate(candidate) => return Some(candidate),
                Line::Skipped => continue,
            }
        }
    }
}

/// Count newline-delimited lines in a file; a trailing unterminated line counts too
pub fn count_file_lines(path: &Path) -> io::Result<u64> {
    let mut file = File::open(path)?;
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];
    let mut lines = 0u64;
    let mut last_byte = None;

    loop {
        let bytes_read = match file.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        lines += buffer[..bytes_read].iter().filter(|&&b| b == b'\n').count() as u64;
        last_byte = Some(buffer[bytes_read - 1]);
    }

    if matches!(last_byte, Some(b) if b != b'\n') {
        lines += 1;
    }

    Ok(lines)
}

/// List the `.txt` wordlists in a folder, sorted by file name
///
/// A missing folder yields an empty list.
pub fn available_wordlists(dir: &Path) -> Result<Vec<PathBuf>, VerifyError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(VerifyError::DictionaryUnreadable {
                dictionary: dir.display().to_string(),
                source: e,
            })
        }
    };

    let mut wordlists: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| path.extension().map_or(false, |ext| ext == "txt"))
        .collect();

    wordlists.sort();
    Ok(wordlists)
}

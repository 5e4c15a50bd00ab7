//! Self-describing snapshot blobs.
//!
//! Every blob starts with an ASCII magic tag (one word per character, then a
//! `0` word) followed by a version word. The reader checks both before any
//! payload word is interpreted and rejects versions newer than it knows.

use crate::codec::{WordReader, WordWriter};
use std::ops::{Deref, DerefMut};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic tag identifying one record family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Magic(&'static str);

impl Magic {
    pub const fn new(tag: &'static str) -> Self {
        Self(tag)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }

    /// Number of words the tag occupies, terminator included.
    pub fn word_len(&self) -> usize {
        self.0.chars().count() + 1
    }
}

/// Dialogue-history log.
pub const DIALOGUE_LOG_MAGIC: Magic = Magic::new("ADV");
/// Cached scene structs.
pub const SCENE_CACHE_MAGIC: Magic = Magic::new("SCN");
/// Glyph-sprite pool.
pub const GLYPH_SPRITE_MAGIC: Magic = Magic::new("CHR");
/// Parts engine.
pub const PARTS_MAGIC: Magic = Magic::new("PRT");

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur while writing or parsing a snapshot.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("invalid magic: expected {expected:?}")]
    InvalidMagic { expected: &'static str },
    #[error("snapshot from future version {found} (this build supports up to {supported})")]
    FutureVersion { found: u32, supported: u32 },
    #[error("invalid version word {0}")]
    InvalidVersion(i32),
    #[error("malformed or truncated stream at word {position}")]
    Malformed { position: usize },
    #[error("{count} unread words after the last record")]
    TrailingWords { count: usize },
    #[error("byte length {0} is not a whole number of words")]
    UnalignedBytes(usize),
    #[error("invalid record: {0}")]
    InvalidRecord(String),
    #[error("encoding failed: {0}")]
    Encode(#[from] crate::codec::EncodeError),
}

// ---------------------------------------------------------------------------
// Blob
// ---------------------------------------------------------------------------

/// A finished snapshot: an opaque, transportable word array.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Blob {
    words: Vec<i32>,
}

impl Blob {
    pub fn from_words(words: Vec<i32>) -> Self {
        Self { words }
    }

    pub fn words(&self) -> &[i32] {
        &self.words
    }

    pub fn into_words(self) -> Vec<i32> {
        self.words
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Host byte order, four bytes per word.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.words.iter().flat_map(|w| w.to_ne_bytes()).collect()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SnapshotError> {
        if bytes.len() % 4 != 0 {
            return Err(SnapshotError::UnalignedBytes(bytes.len()));
        }
        let words = bytes
            .chunks_exact(4)
            .map(|c| i32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok(Self { words })
    }
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Builds one snapshot. Derefs to [`WordWriter`] for the payload.
#[derive(Debug)]
pub struct SnapshotWriter {
    words: WordWriter,
}

impl SnapshotWriter {
    /// Start a snapshot: writes the magic tag, its terminator and `version`.
    pub fn begin(magic: Magic, version: u32) -> Self {
        let mut words = WordWriter::new();
        for c in magic.as_str().chars() {
            words.write_int(c as i32);
        }
        words.write_int(0);
        words.write_int(version as i32);
        Self { words }
    }

    pub fn finish(self) -> Blob {
        Blob::from_words(self.words.into_words())
    }
}

impl Deref for SnapshotWriter {
    type Target = WordWriter;

    fn deref(&self) -> &WordWriter {
        &self.words
    }
}

impl DerefMut for SnapshotWriter {
    fn deref_mut(&mut self) -> &mut WordWriter {
        &mut self.words
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Parses one snapshot. Derefs to [`WordReader`] for the payload.
#[derive(Debug)]
pub struct SnapshotReader<'a> {
    words: WordReader<'a>,
    version: u32,
}

impl<'a> SnapshotReader<'a> {
    /// Validate the magic tag and version. Fails without touching the
    /// payload if the tag differs or the version is newer than `max_version`.
    pub fn begin(blob: &'a Blob, magic: Magic, max_version: u32) -> Result<Self, SnapshotError> {
        if !has_magic(blob.words(), magic) {
            return Err(SnapshotError::InvalidMagic {
                expected: magic.as_str(),
            });
        }
        let mut words = WordReader::new(blob.words());
        for _ in 0..magic.word_len() {
            words.read_int();
        }
        let raw = words.read_int();
        if words.has_error() {
            return Err(SnapshotError::Malformed {
                position: words.position(),
            });
        }
        let version = u32::try_from(raw)
            .ok()
            .filter(|v| *v > 0)
            .ok_or(SnapshotError::InvalidVersion(raw))?;
        if version > max_version {
            return Err(SnapshotError::FutureVersion {
                found: version,
                supported: max_version,
            });
        }
        Ok(Self { words, version })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Record-boundary check: fails if any read so far hit a malformed or
    /// truncated stream.
    pub fn checkpoint(&self) -> Result<(), SnapshotError> {
        if self.words.has_error() {
            return Err(SnapshotError::Malformed {
                position: self.words.position(),
            });
        }
        Ok(())
    }

    /// Final check: no errors and every word consumed.
    pub fn finish(self) -> Result<(), SnapshotError> {
        self.checkpoint()?;
        match self.words.remaining() {
            0 => Ok(()),
            count => Err(SnapshotError::TrailingWords { count }),
        }
    }
}

impl<'a> Deref for SnapshotReader<'a> {
    type Target = WordReader<'a>;

    fn deref(&self) -> &WordReader<'a> {
        &self.words
    }
}

impl<'a> DerefMut for SnapshotReader<'a> {
    fn deref_mut(&mut self) -> &mut WordReader<'a> {
        &mut self.words
    }
}

fn has_magic(words: &[i32], magic: Magic) -> bool {
    let expected = magic
        .as_str()
        .chars()
        .map(|c| c as i32)
        .chain(std::iter::once(0));
    words.len() >= magic.word_len() && words.iter().copied().zip(expected).all(|(a, b)| a == b)
}

// ---------------------------------------------------------------------------
// Kind detection
// ---------------------------------------------------------------------------

/// Record family of a blob, detected from its magic alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotKind {
    DialogueLog,
    SceneCache,
    GlyphSprites,
    Parts,
    Unknown,
}

/// Detect which record family `blob` belongs to without parsing its payload.
pub fn detect_kind(blob: &Blob) -> SnapshotKind {
    let known = [
        (DIALOGUE_LOG_MAGIC, SnapshotKind::DialogueLog),
        (SCENE_CACHE_MAGIC, SnapshotKind::SceneCache),
        (GLYPH_SPRITE_MAGIC, SnapshotKind::GlyphSprites),
        (PARTS_MAGIC, SnapshotKind::Parts),
    ];
    known
        .into_iter()
        .find(|(magic, _)| has_magic(blob.words(), *magic))
        .map(|(_, kind)| kind)
        .unwrap_or(SnapshotKind::Unknown)
}

// ===========================================================================
// Tests
// ===========================================================================

//! Dialogue-history log: a ring of pages, each holding the text lines and
//! voice ids shown while that page was current.
//!
//! The log always has a current page. A freshly built or cleared log holds
//! exactly one blank page, so `page_count()` is never 0.

use crate::descriptor::{ArrayDescriptor, ElementKind, TypeRegistry};
use crate::heap::{HeapError, VmHeap};
use crate::history::{HistoryError, RingStore};
use crate::id::HeapRef;
use crate::snapshot::{Blob, DIALOGUE_LOG_MAGIC, SnapshotError, SnapshotReader, SnapshotWriter};
use crate::value::Value;

pub const DIALOGUE_LOG_CAPACITY: usize = 1000;
pub const DIALOGUE_LOG_VERSION: u32 = 1;

/// One page of the log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogPage {
    pub lines: Vec<String>,
    pub voices: Vec<i32>,
}

impl LogPage {
    pub fn is_blank(&self) -> bool {
        self.lines.is_empty() && self.voices.is_empty()
    }
}

#[derive(Debug)]
pub struct DialogueLog {
    pages: RingStore<LogPage>,
}

impl Default for DialogueLog {
    fn default() -> Self {
        Self::new(DIALOGUE_LOG_CAPACITY)
    }
}

impl DialogueLog {
    pub fn new(capacity: usize) -> Self {
        let mut pages = RingStore::new(capacity);
        pages.push(LogPage::default());
        Self { pages }
    }

    pub fn capacity(&self) -> usize {
        self.pages.capacity()
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn page(&self, page: usize) -> Result<&LogPage, HistoryError> {
        self.pages.get(page)
    }

    pub fn pages(&self) -> impl Iterator<Item = &LogPage> {
        self.pages.iter()
    }

    fn current(&mut self) -> &mut LogPage {
        if self.pages.is_empty() {
            return self.pages.push(LogPage::default());
        }
        match self.pages.latest_mut() {
            Some(page) => page,
            None => unreachable!("non-empty ring has a newest entry"),
        }
    }

    /// Append a text line to the current page.
    pub fn add_text(&mut self, text: &str) {
        self.current().lines.push(text.to_string());
    }

    /// Append a text line taken from a VM string object.
    pub fn add_text_object(&mut self, heap: &impl VmHeap, id: HeapRef) -> Result<(), HeapError> {
        let text = heap.string_object(id)?;
        self.add_text(text);
        Ok(())
    }

    pub fn add_voice(&mut self, voice: i32) {
        self.current().voices.push(voice);
    }

    /// Start a new current page, evicting the oldest page if the log is full.
    pub fn new_page(&mut self) {
        self.pages.push(LogPage::default());
    }

    pub fn text_count(&self, page: usize) -> Result<usize, HistoryError> {
        Ok(self.pages.get(page)?.lines.len())
    }

    pub fn text(&self, page: usize, line: usize) -> Result<&str, HistoryError> {
        let lines = &self.pages.get(page)?.lines;
        lines
            .get(line)
            .map(String::as_str)
            .ok_or(HistoryError::OutOfRange {
                index: line,
                count: lines.len(),
            })
    }

    pub fn voice_count(&self, page: usize) -> Result<usize, HistoryError> {
        Ok(self.pages.get(page)?.voices.len())
    }

    pub fn voice(&self, page: usize, index: usize) -> Result<i32, HistoryError> {
        let voices = &self.pages.get(page)?.voices;
        voices.get(index).copied().ok_or(HistoryError::OutOfRange {
            index,
            count: voices.len(),
        })
    }

    /// The last voice id played on `page`, if any.
    pub fn voice_last(&self, page: usize) -> Result<Option<i32>, HistoryError> {
        Ok(self.pages.get(page)?.voices.last().copied())
    }

    /// Drop every page and start over with one blank page. Returns `false`
    /// if the log already held nothing but a blank page.
    pub fn clear(&mut self) -> bool {
        if self.pages.len() == 1 && self.pages.latest().is_some_and(LogPage::is_blank) {
            return false;
        }
        self.pages.clear();
        self.pages.push(LogPage::default());
        true
    }

    pub fn save(&self) -> Result<Blob, SnapshotError> {
        let types = TypeRegistry::default();
        let mut w = SnapshotWriter::begin(DIALOGUE_LOG_MAGIC, DIALOGUE_LOG_VERSION);
        w.write_count(self.pages.len())?;
        for page in self.pages.iter() {
            let lines: Vec<Value> = page.lines.iter().cloned().map(Value::String).collect();
            let voices: Vec<Value> = page.voices.iter().copied().map(Value::Int).collect();
            w.write_array(Some(lines.as_slice()), &lines_desc(), &types)?;
            w.write_array(Some(voices.as_slice()), &voices_desc(), &types)?;
        }
        tracing::debug!(pages = self.pages.len(), "saved dialogue log");
        Ok(w.finish())
    }

    /// Replace the log with the pages in `blob`. On failure the log is left
    /// cleared.
    pub fn load(&mut self, blob: &Blob) -> Result<(), SnapshotError> {
        self.clear();
        match self.read_pages(blob) {
            Ok(pages) => {
                tracing::debug!(pages = pages.len(), "loaded dialogue log");
                self.pages = pages;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "rejected dialogue log snapshot");
                self.clear();
                Err(e)
            }
        }
    }

    fn read_pages(&self, blob: &Blob) -> Result<RingStore<LogPage>, SnapshotError> {
        let types = TypeRegistry::default();
        let mut r = SnapshotReader::begin(blob, DIALOGUE_LOG_MAGIC, DIALOGUE_LOG_VERSION)?;
        // Each page is at least two count words.
        let count = r.read_count(2);
        r.checkpoint()?;

        let mut pages = RingStore::new(self.pages.capacity());
        for _ in 0..count {
            let lines = r.read_array(&lines_desc(), &types);
            let voices = r.read_array(&voices_desc(), &types);
            r.checkpoint()?;
            pages.push(LogPage {
                lines: collect_strings(lines),
                voices: collect_ints(voices),
            });
        }
        r.finish()?;

        if pages.is_empty() {
            pages.push(LogPage::default());
        }
        Ok(pages)
    }
}

fn lines_desc() -> ArrayDescriptor {
    ArrayDescriptor::flat(ElementKind::String)
}

fn voices_desc() -> ArrayDescriptor {
    ArrayDescriptor::flat(ElementKind::Int)
}

fn collect_strings(items: Option<Vec<Value>>) -> Vec<String> {
    items
        .unwrap_or_default()
        .into_iter()
        .filter_map(|v| match v {
            Value::String(s) => Some(s),
            _ => None,
        })
        .collect()
}

fn collect_ints(items: Option<Vec<Value>>) -> Vec<i32> {
    items
        .unwrap_or_default()
        .iter()
        .filter_map(Value::as_int)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_log_holds_one_blank_page() {
        let log = DialogueLog::default();
        assert_eq!(log.page_count(), 1);
        assert_eq!(log.text_count(0), Ok(0));
        assert_eq!(log.voice_last(0), Ok(None));
    }

    #[test]
    fn text_and_voices_go_to_current_page() {
        let mut log = DialogueLog::default();
        log.add_text("Hello");
        log.new_page();
        log.add_text("World");
        log.add_voice(7);
        assert_eq!(log.page_count(), 2);
        assert_eq!(log.text(0, 0), Ok("Hello"));
        assert_eq!(log.text(1, 0), Ok("World"));
        assert_eq!(log.voice(1, 0), Ok(7));
        assert_eq!(log.voice_count(0), Ok(0));
    }

    #[test]
    fn bad_page_or_line_is_an_error() {
        let mut log = DialogueLog::default();
        log.add_text("only");
        assert_eq!(
            log.text(0, 1),
            Err(HistoryError::OutOfRange { index: 1, count: 1 })
        );
        assert_eq!(
            log.text_count(3),
            Err(HistoryError::OutOfRange { index: 3, count: 1 })
        );
    }

    #[test]
    fn overflow_evicts_oldest_page() {
        let mut log = DialogueLog::new(3);
        log.add_text("p0");
        for i in 1..=3 {
            log.new_page();
            log.add_text(&format!("p{i}"));
        }
        assert_eq!(log.page_count(), 3);
        assert_eq!(log.text(0, 0), Ok("p1"));
        assert_eq!(log.text(2, 0), Ok("p3"));
    }

    #[test]
    fn clear_is_idempotent() {
        let mut log = DialogueLog::default();
        log.add_text("x");
        assert!(log.clear());
        assert_eq!(log.page_count(), 1);
        assert!(!log.clear());
        assert_eq!(log.page_count(), 1);
    }

    #[test]
    fn save_load_round_trip() {
        let mut log = DialogueLog::default();
        log.add_text("Hello");
        log.add_text("World");
        log.add_voice(42);
        log.new_page();
        log.add_text("second");
        let blob = log.save().unwrap();

        let mut restored = DialogueLog::default();
        restored.load(&blob).unwrap();
        assert_eq!(restored.page_count(), 2);
        assert_eq!(restored.text_count(0), Ok(2));
        assert_eq!(restored.text(0, 1), Ok("World"));
        assert_eq!(restored.voice_last(0), Ok(Some(42)));
        assert_eq!(restored.text(1, 0), Ok("second"));
    }

    #[test]
    fn truncated_blob_leaves_log_cleared() {
        let mut log = DialogueLog::default();
        log.add_text("keep me?");
        let blob = log.save().unwrap();
        let mut words = blob.into_words();
        words.pop();

        let mut target = DialogueLog::default();
        target.add_text("old");
        let result = target.load(&Blob::from_words(words));
        assert!(matches!(result, Err(SnapshotError::Malformed { .. })));
        assert_eq!(target.page_count(), 1);
        assert_eq!(target.text_count(0), Ok(0));
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let blob = SnapshotWriter::begin(crate::snapshot::PARTS_MAGIC, 1).finish();
        let mut log = DialogueLog::default();
        assert!(matches!(
            log.load(&blob),
            Err(SnapshotError::InvalidMagic { .. })
        ));
    }
}

//! 🧺 Collectors: fixed-size batches, one buffer per record kind.
//!
//! The destination caps how many items a bulk write may carry, so documents
//! pile up here until a buffer hits capacity. Then the whole buffer leaves as
//! a [`Batch`] and a fresh empty one takes its place.
//!
//! Ancient proverb: "He who flushes at nineteen, pays for twenty round trips."

use std::mem;

use crate::classifier::ClassifiedDocument;
use crate::common::RecordKind;

/// 📦 Classified documents of a single kind, on their way to one bulk write.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub kind: RecordKind,
    pub documents: Vec<ClassifiedDocument>,
}

impl Batch {
    /// 📏 How many documents are riding in this batch. Never more than the capacity.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// 🧺 Two buffers, one capacity. Never hands out more than `capacity` documents at once.
#[derive(Debug)]
pub struct BatchAccumulator {
    capacity: usize,
    pages: Vec<ClassifiedDocument>,
    sections: Vec<ClassifiedDocument>,
}

impl BatchAccumulator {
    /// 🚀 A capacity of zero is rounded up to one. A batch of nothing is a philosophy, not a write.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            pages: Vec::with_capacity(capacity),
            sections: Vec::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// ➕ Buffer a document. Returns the full batch when this one filled it up.
    pub fn add(&mut self, document: ClassifiedDocument) -> Option<Batch> {
        let kind = document.kind;
        let capacity = self.capacity;
        let buffer = self.buffer_mut(kind);
        buffer.push(document);
        if buffer.len() < capacity {
            return None;
        }
        let documents = mem::replace(buffer, Vec::with_capacity(capacity));
        Some(Batch { kind, documents })
    }

    /// 🚰 End of enumeration: hand over whatever is left. Empty buffers stay home.
    pub fn drain(&mut self) -> Vec<Batch> {
        [RecordKind::Page, RecordKind::Section]
            .into_iter()
            .filter_map(|kind| {
                let buffer = self.buffer_mut(kind);
                if buffer.is_empty() {
                    return None;
                }
                Some(Batch {
                    kind,
                    documents: mem::take(buffer),
                })
            })
            .collect()
    }

    /// 🧮 Documents buffered for `kind` that have not left in a batch yet.
    pub fn pending(&self, kind: RecordKind) -> usize {
        match kind {
            RecordKind::Page => self.pages.len(),
            RecordKind::Section => self.sections.len(),
        }
    }

    fn buffer_mut(&mut self, kind: RecordKind) -> &mut Vec<ClassifiedDocument> {
        match kind {
            RecordKind::Page => &mut self.pages,
            RecordKind::Section => &mut self.sections,
        }
    }
}

//! In-memory accumulation of scraped rows between flushes

use crate::lead::RawLead;

/// Accumulates raw lead rows until a flush is due.
///
/// The byte size is a running estimate of the rows' serialized footprint,
/// kept incrementally so `should_flush` is O(1).
#[derive(Debug, Default)]
pub struct ChunkBuffer {
    leads: Vec<RawLead>,
    size_bytes: usize,
}

impl ChunkBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            leads: Vec::with_capacity(capacity),
            size_bytes: 0,
        }
    }

    pub fn add(&mut self, leads: impl IntoIterator<Item = RawLead>) {
        for lead in leads {
            // list separator
            self.size_bytes += lead.estimated_size() + 1;
            self.leads.push(lead);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.leads.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.leads.is_empty()
    }

    /// Estimated serialized size of the buffered rows.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    /// True once either threshold is reached.
    #[must_use]
    pub fn should_flush(&self, count_threshold: usize, byte_threshold: usize) -> bool {
        self.leads.len() >= count_threshold || self.size_bytes >= byte_threshold
    }

    /// Take every buffered row, leaving the buffer empty.
    pub fn drain(&mut self) -> Vec<RawLead> {
        self.size_bytes = 0;
        std::mem::take(&mut self.leads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lead(address: &str) -> RawLead {
        [("Property Address", address), ("City", "Fresno")]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_flush_on_count() {
        let mut buffer = ChunkBuffer::new();
        buffer.add(vec![lead("1 A St"), lead("2 B St"), lead("3 C St")]);
        assert!(!buffer.should_flush(4, usize::MAX));
        buffer.add(vec![lead("4 D St")]);
        assert!(buffer.should_flush(4, usize::MAX));
    }

    #[test]
    fn test_flush_on_bytes() {
        let mut buffer = ChunkBuffer::new();
        buffer.add(vec![lead("1 A St")]);
        let one = buffer.size_bytes();
        assert!(one > 0);
        assert!(!buffer.should_flush(100, one + 1));
        assert!(buffer.should_flush(100, one));
    }

    #[test]
    fn test_drain_resets() {
        let mut buffer = ChunkBuffer::new();
        buffer.add(vec![lead("1 A St"), lead("2 B St")]);
        let drained = buffer.drain();
        assert_eq!(drained.len(), 2);
        assert!(buffer.is_empty());
        assert_eq!(buffer.size_bytes(), 0);
        assert!(!buffer.should_flush(1, 1));
    }
}

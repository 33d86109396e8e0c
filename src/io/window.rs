use bytes::Bytes;

/// The most recently fetched contiguous chunk of the resource.
///
/// Holds at most one range. An empty window never hits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferWindow {
    start: u64,
    data: Bytes,
}

impl BufferWindow {
    pub fn new(start: u64, data: Bytes) -> Self {
        Self { start, data }
    }

    /// An empty window anchored at `start`.
    pub fn empty_at(start: u64) -> Self {
        Self {
            start,
            data: Bytes::new(),
        }
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    /// One past the last buffered offset.
    pub fn end(&self) -> u64 {
        self.start + self.data.len() as u64
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether `pos` falls inside `[start, end)`.
    pub fn contains(&self, pos: u64) -> bool {
        self.start <= pos && pos < self.end()
    }

    /// Up to `max` buffered bytes beginning at `pos`, or `None` on a miss.
    pub fn slice_from(&self, pos: u64, max: u64) -> Option<Bytes> {
        if !self.contains(pos) {
            return None;
        }
        let from = (pos - self.start) as usize;
        let available = self.data.len() - from;
        let take = available.min(usize::try_from(max).unwrap_or(usize::MAX));
        Some(self.data.slice(from..from + take))
    }
}

use std::fmt;

/// One byte window of a transfer, inclusive on both ends.
///
/// `total` is `None` until the remote side has told us the file size, and is
/// rendered as `-1` in the `Content-Range` header while unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferRange {
    pub start: u64,
    pub end: u64,
    pub total: Option<u64>,
}

impl TransferRange {
    pub fn new(start: u64, end: u64, total: Option<u64>) -> Self {
        Self { start, end, total }
    }

    /// Number of bytes the window covers.
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start) + 1
    }

    /// Value for the `Content-Range` request header.
    pub fn header_value(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TransferRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.total {
            Some(total) => write!(f, "{}-{}/{}", self.start, self.end, total),
            None => write!(f, "{}-{}/-1", self.start, self.end),
        }
    }
}

/// What the first download response told us about the remote file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sizing {
    /// Remote file has zero bytes; nothing more to fetch.
    Empty,
    /// File is smaller than one chunk; the window was shrunk to fit.
    Clamped,
    /// File is at least one chunk; the initial window stands.
    Ready,
}

/// Window arithmetic for downloads, where the size is learned from the server.
///
/// Iterating yields the windows to request, in order. The first window sizes
/// the transfer: once it has been yielded the iterator pauses (returns `None`)
/// until [`discover`](Self::discover) records the reported size. From then on
/// every `next()` moves past the window yielded before it, so the sequence ends
/// after the window ending at `total - 1`, or right away for an empty file.
#[derive(Debug, Clone)]
pub struct DownloadCursor {
    chunk_size: u64,
    start: u64,
    end: u64,
    total: Option<u64>,
    sizing_sent: bool,
    consumed: bool,
    done: bool,
}

impl DownloadCursor {
    pub fn new(chunk_size: u64) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            start: 0,
            end: chunk_size - 1,
            total: None,
            sizing_sent: false,
            consumed: false,
            done: false,
        }
    }

    /// Window most recently yielded, or the one about to be.
    pub fn window(&self) -> TransferRange {
        TransferRange::new(self.start, self.end, self.total)
    }

    /// `true` until the remote size is known.
    pub fn is_sizing(&self) -> bool {
        self.total.is_none() && !self.done
    }

    pub fn total(&self) -> Option<u64> {
        self.total
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Records the remote file size. Only the first call has any effect.
    pub fn discover(&mut self, total: u64) -> Sizing {
        if let Some(known) = self.total {
            return if known == 0 { Sizing::Empty } else { Sizing::Ready };
        }
        self.total = Some(total);

        if total == 0 {
            self.done = true;
            return Sizing::Empty;
        }

        if self.chunk_size > total {
            self.end = total - 1;
            return Sizing::Clamped;
        }

        Sizing::Ready
    }

    /// Moves past the current window once the size is known.
    fn advance(&mut self) {
        let Some(total) = self.total else { return };
        if self.done {
            return;
        }

        if self.end + 1 >= total {
            self.done = true;
            return;
        }

        self.start = self.start.saturating_add(self.chunk_size);
        self.end = if self.start.saturating_add(self.chunk_size) > total - 1 {
            total - 1
        } else {
            self.start + self.chunk_size - 1
        };
    }
}

impl Iterator for DownloadCursor {
    type Item = TransferRange;

    fn next(&mut self) -> Option<TransferRange> {
        if self.done {
            return None;
        }

        if self.total.is_none() {
            if self.sizing_sent {
                return None;
            }
            self.sizing_sent = true;
            return Some(self.window());
        }

        if self.consumed {
            self.advance();
            if self.done {
                return None;
            }
        }
        self.consumed = true;
        Some(self.window())
    }
}

/// Window arithmetic for uploads, where the size is known from the local file.
#[derive(Debug, Clone)]
pub struct UploadCursor {
    chunk_size: u64,
    start: u64,
    total: u64,
}

impl UploadCursor {
    pub fn new(total: u64, chunk_size: u64) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            start: 0,
            total,
        }
    }

    /// Range for a slice of `n` bytes just read from the source, or `None`
    /// once the source is exhausted (`n == 0`).
    ///
    /// A short read marks the final slice and is closed at `total`.
    pub fn next_range(&mut self, n: u64) -> Option<TransferRange> {
        if n == 0 {
            return None;
        }

        let end = if n < self.chunk_size {
            self.total
        } else {
            self.start + n
        };

        let range = TransferRange::new(self.start, end.saturating_sub(1), Some(self.total));
        self.start += n;
        Some(range)
    }

    /// Offset of the next slice.
    pub fn position(&self) -> u64 {
        self.start
    }

    /// Ranges produced by uploading an unchanging file of `total` bytes.
    pub fn plan(total: u64, chunk_size: u64) -> UploadPlan {
        UploadPlan {
            cursor: Self::new(total, chunk_size),
            remaining: total,
        }
    }
}

/// Iterator returned by [`UploadCursor::plan`].
#[derive(Debug, Clone)]
pub struct UploadPlan {
    cursor: UploadCursor,
    remaining: u64,
}

impl Iterator for UploadPlan {
    type Item = TransferRange;

    fn next(&mut self) -> Option<TransferRange> {
        let n = self.remaining.min(self.cursor.chunk_size);
        let range = self.cursor.next_range(n)?;
        self.remaining -= n;
        Some(range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHUNK: u64 = 512 * 1024;

    /// Drives a cursor the way the download engine does and returns every
    /// window whose payload would be written.
    fn written_windows(total: u64, chunk: u64) -> Vec<TransferRange> {
        let mut cursor = DownloadCursor::new(chunk);
        let mut written = Vec::new();
        while let Some(window) = cursor.next() {
            if cursor.is_sizing() {
                cursor.discover(total);
                continue;
            }
            written.push(window);
        }
        written
    }

    #[test]
    fn test_header_value() {
        assert_eq!(TransferRange::new(0, 524287, None).header_value(), "0-524287/-1");
        assert_eq!(
            TransferRange::new(1048576, 1299999, Some(1300000)).header_value(),
            "1048576-1299999/1300000"
        );
    }

    #[test]
    fn test_initial_download_window() {
        let cursor = DownloadCursor::new(CHUNK);
        assert_eq!(cursor.window(), TransferRange::new(0, CHUNK - 1, None));
        assert!(cursor.is_sizing());
    }

    #[test]
    fn test_download_coverage_without_gaps() {
        for total in [1, 999, CHUNK - 1, CHUNK, CHUNK + 1, 2 * CHUNK, 1_300_000, 5 * CHUNK + 7] {
            let windows = written_windows(total, CHUNK);
            assert_eq!(windows[0].start, 0, "total={total}");
            for pair in windows.windows(2) {
                assert_eq!(pair[1].start, pair[0].end + 1, "total={total}");
            }
            assert_eq!(windows.last().unwrap().end, total - 1, "total={total}");
            let covered: u64 = windows.iter().map(TransferRange::len).sum();
            assert_eq!(covered, total, "total={total}");
            assert!(windows.iter().all(|w| w.len() <= CHUNK));
            assert!(windows.iter().all(|w| w.total == Some(total)));
        }
    }

    #[test]
    fn test_download_small_file_clamps() {
        let mut cursor = DownloadCursor::new(CHUNK);
        assert_eq!(cursor.next(), Some(TransferRange::new(0, CHUNK - 1, None)));
        assert_eq!(cursor.discover(1000), Sizing::Clamped);
        assert_eq!(cursor.next(), Some(TransferRange::new(0, 999, Some(1000))));
        assert_eq!(cursor.next(), None);
        assert!(cursor.is_done());
    }

    #[test]
    fn test_sized_cursor_collects_without_duplicates() {
        let mut cursor = DownloadCursor::new(10);
        cursor.discover(25);
        let windows: Vec<String> = cursor.by_ref().take(4).map(|w| w.to_string()).collect();
        assert_eq!(windows, vec!["0-9/25", "10-19/25", "20-24/25"]);
        assert_eq!(cursor.next(), None);
    }

    #[test]
    fn test_for_loop_over_sized_cursor_ends() {
        let mut cursor = DownloadCursor::new(CHUNK);
        cursor.discover(1_300_000);
        let mut starts = Vec::new();
        for window in cursor {
            starts.push(window.start);
        }
        assert_eq!(starts, vec![0, CHUNK, 2 * CHUNK]);
    }

    #[test]
    fn test_sizing_window_is_yielded_once_until_sized() {
        let mut cursor = DownloadCursor::new(10);
        assert_eq!(cursor.next(), Some(TransferRange::new(0, 9, None)));
        assert_eq!(cursor.next(), None);
        assert!(cursor.is_sizing());

        assert_eq!(cursor.discover(15), Sizing::Ready);
        assert_eq!(cursor.next(), Some(TransferRange::new(0, 9, Some(15))));
        assert_eq!(cursor.next(), Some(TransferRange::new(10, 14, Some(15))));
        assert_eq!(cursor.next(), None);
    }

    #[test]
    fn test_huge_chunk_does_not_overflow() {
        let mut cursor = DownloadCursor::new(u64::MAX);
        cursor.discover(5);
        assert_eq!(cursor.collect::<Vec<_>>(), vec![TransferRange::new(0, 4, Some(5))]);
    }

    #[test]
    fn test_download_empty_file_ends_iteration() {
        let mut cursor = DownloadCursor::new(CHUNK);
        assert_eq!(cursor.discover(0), Sizing::Empty);
        assert!(cursor.is_done());
        assert_eq!(cursor.next(), None);
        assert!(written_windows(0, CHUNK).is_empty());
    }

    #[test]
    fn test_download_exact_chunk_is_single_window() {
        let windows = written_windows(CHUNK, CHUNK);
        assert_eq!(windows, vec![TransferRange::new(0, CHUNK - 1, Some(CHUNK))]);
    }

    #[test]
    fn test_download_one_byte_tail() {
        let windows = written_windows(2 * CHUNK + 1, CHUNK);
        assert_eq!(windows.len(), 3);
        assert_eq!(windows[2], TransferRange::new(2 * CHUNK, 2 * CHUNK, Some(2 * CHUNK + 1)));
    }

    #[test]
    fn test_discover_twice_keeps_first_size() {
        let mut cursor = DownloadCursor::new(10);
        assert_eq!(cursor.discover(25), Sizing::Ready);
        assert_eq!(cursor.discover(5), Sizing::Ready);
        assert_eq!(cursor.total(), Some(25));
        assert_eq!(cursor.window(), TransferRange::new(0, 9, Some(25)));
    }

    #[test]
    fn test_fresh_cursors_start_at_zero() {
        let mut first = DownloadCursor::new(10);
        first.discover(100);
        first.by_ref().take(3).for_each(drop);
        assert_eq!(first.window().start, 20);

        let mut second = DownloadCursor::new(10);
        assert_eq!(second.next().map(|w| w.start), Some(0));
    }

    #[test]
    fn test_upload_final_slice_arithmetic() {
        let ranges: Vec<_> = UploadCursor::plan(1_300_000, CHUNK).collect();
        assert_eq!(
            ranges,
            vec![
                TransferRange::new(0, 524287, Some(1_300_000)),
                TransferRange::new(524288, 1048575, Some(1_300_000)),
                TransferRange::new(1048576, 1299999, Some(1_300_000)),
            ]
        );
        assert_eq!(ranges[2].header_value(), "1048576-1299999/1300000");
    }

    #[test]
    fn test_upload_exact_multiple() {
        let ranges: Vec<_> = UploadCursor::plan(2 * CHUNK, CHUNK).collect();
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[1], TransferRange::new(CHUNK, 2 * CHUNK - 1, Some(2 * CHUNK)));
    }

    #[test]
    fn test_upload_empty_source_has_no_ranges() {
        assert_eq!(UploadCursor::plan(0, CHUNK).count(), 0);
        let mut cursor = UploadCursor::new(0, CHUNK);
        assert_eq!(cursor.next_range(0), None);
    }

    #[test]
    fn test_upload_cursor_tracks_position() {
        let mut cursor = UploadCursor::new(25, 10);
        assert_eq!(cursor.next_range(10), Some(TransferRange::new(0, 9, Some(25))));
        assert_eq!(cursor.next_range(10), Some(TransferRange::new(10, 19, Some(25))));
        assert_eq!(cursor.next_range(5), Some(TransferRange::new(20, 24, Some(25))));
        assert_eq!(cursor.position(), 25);
        assert_eq!(cursor.next_range(0), None);
    }
}

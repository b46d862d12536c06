//! Typewriter-style reveal of a complete answer.

use std::time::Duration;

/// Reveals text a few characters at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Revealer {
    chunk_chars: usize,
    tick: Duration,
}

impl Default for Revealer {
    fn default() -> Self {
        Self {
            chunk_chars: 2,
            tick: Duration::from_millis(20),
        }
    }
}

impl Revealer {
    /// A revealer that shows `chunk_chars` characters per `tick`.
    pub fn new(chunk_chars: usize, tick: Duration) -> Self {
        Self {
            chunk_chars: chunk_chars.max(1),
            tick,
        }
    }

    /// Characters revealed per tick.
    pub fn chunk_chars(&self) -> usize {
        self.chunk_chars
    }

    /// Delay between chunks.
    pub fn tick(&self) -> Duration {
        self.tick
    }

    /// Split `text` into chunks of at most `chunk_chars` characters.
    pub fn chunks<'a>(&self, text: &'a str) -> Chunks<'a> {
        Chunks {
            rest: text,
            size: self.chunk_chars,
        }
    }

    /// Feed `text` to `on_chunk` one chunk per tick.
    ///
    /// `on_chunk` returns false to skip the remaining ticks. Returns the number
    /// of bytes delivered.
    pub async fn reveal<F>(&self, text: &str, mut on_chunk: F) -> usize
    where
        F: FnMut(&str) -> bool,
    {
        let mut delivered = 0;
        for (idx, chunk) in self.chunks(text).enumerate() {
            if idx > 0 {
                tokio::time::sleep(self.tick).await;
            }
            delivered += chunk.len();
            if !on_chunk(chunk) {
                break;
            }
        }
        delivered
    }
}

/// Iterator over reveal chunks; every chunk ends on a `char` boundary.
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    rest: &'a str,
    size: usize,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        if self.rest.is_empty() {
            return None;
        }
        let end = self
            .rest
            .char_indices()
            .nth(self.size)
            .map(|(idx, _)| idx)
            .unwrap_or(self.rest.len());
        let (chunk, rest) = self.rest.split_at(end);
        self.rest = rest;
        Some(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn chunks_respect_char_boundaries() {
        let revealer = Revealer::default();
        let chunks: Vec<_> = revealer.chunks("문서를 요약").collect();
        assert_eq!(chunks, vec!["문서", "를 ", "요약"]);
    }

    #[test]
    fn chunk_size_is_at_least_one() {
        let revealer = Revealer::new(0, Duration::from_millis(5));
        assert_eq!(revealer.chunk_chars(), 1);
        assert_eq!(revealer.chunks("abc").count(), 3);
    }

    #[test]
    fn empty_text_has_no_chunks() {
        assert_eq!(Revealer::default().chunks("").count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn reveal_grows_monotonically_to_exact_text() {
        let text = "The document covers **three** topics.\n- one\n- two";
        let shown = RefCell::new(String::new());
        let lengths = RefCell::new(Vec::new());
        let start = tokio::time::Instant::now();
        let delivered = Revealer::default()
            .reveal(text, |chunk| {
                shown.borrow_mut().push_str(chunk);
                lengths.borrow_mut().push(shown.borrow().len());
                true
            })
            .await;
        assert_eq!(delivered, text.len());
        assert_eq!(*shown.borrow(), text);
        let lengths = lengths.into_inner();
        assert!(lengths.windows(2).all(|w| w[0] <= w[1]));
        let ticks = text.chars().count().div_ceil(2) - 1;
        assert_eq!(start.elapsed(), Duration::from_millis(20) * ticks as u32);
    }

    #[tokio::test(start_paused = true)]
    async fn interrupt_skips_remaining_ticks() {
        let calls = AtomicUsize::new(0);
        let delivered = Revealer::default()
            .reveal("abcdefgh", |_| calls.fetch_add(1, Ordering::Relaxed) + 1 < 2)
            .await;
        assert_eq!(calls.load(Ordering::Relaxed), 2);
        assert_eq!(delivered, 4);
    }
}

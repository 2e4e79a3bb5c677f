use crate::logging;

const DEFAULT_LOG_EVERY: usize = 500;

/// Iterator adapter that reports how many items a view has produced.
///
/// Logs a debug line every `log_every` items and one info line with the
/// total once the wrapped iterator is exhausted.
pub struct Progress<I> {
    inner: I,
    label: String,
    count: usize,
    log_every: usize,
    finished: bool,
}

pub fn with_progress<I: Iterator>(label: impl Into<String>, inner: I) -> Progress<I> {
    Progress {
        inner,
        label: label.into(),
        count: 0,
        log_every: DEFAULT_LOG_EVERY,
        finished: false,
    }
}

impl<I> Progress<I> {
    pub fn log_every(mut self, every: usize) -> Self {
        self.log_every = every.max(1);
        self
    }

    pub fn rows_seen(&self) -> usize {
        self.count
    }
}

impl<I: Iterator> Iterator for Progress<I> {
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        match self.inner.next() {
            Some(item) => {
                self.count += 1;
                if self.count % self.log_every == 0 {
                    logging::debug(format!("{}: {} rows", self.label, self.count));
                }
                Some(item)
            }
            None => {
                if !self.finished {
                    self.finished = true;
                    logging::info(format!("{}: done, {} rows", self.label, self.count));
                }
                None
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

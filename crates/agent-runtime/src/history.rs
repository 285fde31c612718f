//! Append-only record of executed (and failed) actions.

/// Ordered, append-only action history.
///
/// One short human-readable line per executed or failed action. Only the
/// most recent window is exposed to the decision step so prompt size stays
/// bounded; the full history is kept for the run report.
#[derive(Debug, Default, Clone)]
pub struct ActionHistory {
    entries: Vec<String>,
}

impl ActionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one entry. There is deliberately no mutation or removal API.
    pub fn push(&mut self, entry: impl Into<String>) {
        self.entries.push(entry.into());
    }

    /// The most recent `window` entries, oldest first.
    pub fn recent(&self, window: usize) -> &[String] {
        let start = self.entries.len().saturating_sub(window);
        &self.entries[start..]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<String> {
        self.entries
    }
}

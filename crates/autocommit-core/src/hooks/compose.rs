//! In-memory commit message accumulator for the post-commit chain.

/// Marker returned by [`MessageComposer::checkpoint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint(usize);

/// Collects the sections appended by post-commit plugins so the commit is
/// amended at most once, after the whole chain has run.
///
/// Sections are append-only: a plugin sees every earlier section but cannot
/// remove or replace them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageComposer {
    base: String,
    sections: Vec<String>,
}

impl MessageComposer {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            sections: Vec::new(),
        }
    }

    /// Append a section. Blank sections are ignored.
    pub fn append_section(&mut self, section: impl Into<String>) {
        let section = section.into();
        let trimmed = section.trim();
        if !trimmed.is_empty() {
            self.sections.push(trimmed.to_string());
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn sections(&self) -> &[String] {
        &self.sections
    }

    /// Whether any section was appended.
    pub fn changed(&self) -> bool {
        !self.sections.is_empty()
    }

    /// The full message: base, then each section separated by a blank line.
    pub fn current(&self) -> String {
        let mut message = self.base.trim_end().to_string();
        for section in &self.sections {
            message.push_str("\n\n");
            message.push_str(section);
        }
        message
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.sections.len())
    }

    /// Drop every section appended since `checkpoint`.
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        self.sections.truncate(checkpoint.0);
    }
}

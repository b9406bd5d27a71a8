//! Non-modal, dismissible user notices.

use crate::error::AtlasError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub id: u64,
    pub severity: Severity,
    pub message: String,
    /// Persistent notices survive [`NoticeBoard::clear_transient`].
    pub persistent: bool,
}

/// Notice queue shown as inline banners; nothing here ever blocks the map.
#[derive(Debug, Default)]
pub struct NoticeBoard {
    next_id: u64,
    notices: Vec<Notice>,
}

impl NoticeBoard {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, severity: Severity, message: String, persistent: bool) -> u64 {
        // identical messages collapse into the latest one
        self.notices
            .retain(|n| !(n.message == message && n.severity == severity));
        self.next_id += 1;
        self.notices.push(Notice {
            id: self.next_id,
            severity,
            message,
            persistent,
        });
        self.next_id
    }

    pub fn info(&mut self, message: impl Into<String>) -> u64 {
        self.push(Severity::Info, message.into(), false)
    }

    pub fn warn(&mut self, message: impl Into<String>) -> u64 {
        self.push(Severity::Warning, message.into(), false)
    }

    /// A warning that stays until the user dismisses it.
    pub fn warn_persistent(&mut self, message: impl Into<String>) -> u64 {
        self.push(Severity::Warning, message.into(), true)
    }

    /// Records an error: recoverable ones as warnings, the rest as errors.
    pub fn report(&mut self, err: &AtlasError) -> u64 {
        let severity = if err.is_recoverable() {
            Severity::Warning
        } else {
            Severity::Error
        };
        log::warn!("{err}");
        self.push(severity, err.to_string(), !err.is_recoverable())
    }

    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.notices.len();
        self.notices.retain(|n| n.id != id);
        before != self.notices.len()
    }

    /// Drops every non-persistent notice.
    pub fn clear_transient(&mut self) {
        self.notices.retain(|n| n.persistent);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notice> {
        self.notices.iter()
    }

    pub fn len(&self) -> usize {
        self.notices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notices.is_empty()
    }

    pub fn latest(&self) -> Option<&Notice> {
        self.notices.last()
    }
}

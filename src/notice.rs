use std::{
    collections::VecDeque,
    time::{
        Duration,
        Instant,
    },
};
use tracing::{
    error,
    info,
};

const MAX_NOTICES: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
    posted_at: Instant,
}

/// Short-lived toasts shown under the dice.
#[derive(Debug)]
pub struct NoticeBoard {
    ttl: Duration,
    entries: VecDeque<Notice>,
}

impl NoticeBoard {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: VecDeque::new(),
        }
    }

    pub fn info(&mut self, text: impl Into<String>, now: Instant) {
        let text = text.into();
        info!(notice = %text, "notice");
        self.push(NoticeLevel::Info, text, now);
    }

    pub fn error(&mut self, text: impl Into<String>, now: Instant) {
        let text = text.into();
        error!(notice = %text, "error notice");
        self.push(NoticeLevel::Error, text, now);
    }

    fn push(&mut self, level: NoticeLevel, text: String, now: Instant) {
        if let Some(last) = self.entries.back_mut()
            && last.level == level
            && last.text == text
        {
            last.posted_at = now;
            return;
        }
        self.entries.push_back(Notice {
            level,
            text,
            posted_at: now,
        });
        while self.entries.len() > MAX_NOTICES {
            self.entries.pop_front();
        }
    }

    /// Newest first, expired entries dropped.
    pub fn visible(&mut self, now: Instant) -> Vec<Notice> {
        let ttl = self.ttl;
        self.entries
            .retain(|notice| now.saturating_duration_since(notice.posted_at) < ttl);
        self.entries.iter().rev().cloned().collect()
    }
}

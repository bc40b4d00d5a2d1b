//! Flash notices: short messages shown once after a redirect.
//!
//! Notices are queued in the session cookie and drained by the client
//! context middleware on the next request.

use actix_session::Session;
use serde::{Deserialize, Serialize};

const FLASH_SESSION_KEY: &str = "_flash";

/// Notice severity. Maps onto the page's alert styles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Info,
    Warning,
    Danger,
}

impl Severity {
    /// CSS class suffix used by templates.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Success => "success",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Danger => "danger",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub severity: Severity,
    pub message: String,
}

/// Queues a notice for the next rendered page.
pub fn push(session: &Session, severity: Severity, message: impl Into<String>) {
    let mut queue = peek(session);
    queue.push(Flash {
        severity,
        message: message.into(),
    });
    if let Err(e) = session.insert(FLASH_SESSION_KEY, queue) {
        log::error!("flash::push: unable to store notice: {}", e);
    }
}

/// Returns queued notices without removing them.
pub fn peek(session: &Session) -> Vec<Flash> {
    session
        .get::<Vec<Flash>>(FLASH_SESSION_KEY)
        .unwrap_or_else(|e| {
            log::warn!("flash::peek: discarding unreadable notices: {}", e);
            None
        })
        .unwrap_or_default()
}

/// Removes and returns all queued notices.
pub fn take(session: &Session) -> Vec<Flash> {
    let queue = peek(session);
    if !queue.is_empty() {
        session.remove(FLASH_SESSION_KEY);
    }
    queue
}

pub fn success(session: &Session, message: impl Into<String>) {
    push(session, Severity::Success, message)
}

pub fn info(session: &Session, message: impl Into<String>) {
    push(session, Severity::Info, message)
}

pub fn warning(session: &Session, message: impl Into<String>) {
    push(session, Severity::Warning, message)
}

pub fn danger(session: &Session, message: impl Into<String>) {
    push(session, Severity::Danger, message)
}

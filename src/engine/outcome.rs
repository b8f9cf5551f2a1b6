//! User-facing outcomes of an engine operation
//!
//! Committed and rejected outcomes carry a localized message key plus
//! substitution parameters; rendering is the command layer's job. Rejections
//! are business-rule results, not errors — no write occurred, and the
//! message is the only observable effect.

use crate::notify::EventScope;
use crate::store::ListKind;

/// Message key plus substitution parameters for the localization layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserMessage {
    pub key: &'static str,
    pub params: Vec<String>,
}

impl UserMessage {
    pub(crate) fn added(list: ListKind, entry: &str) -> Self {
        Self {
            key: match list {
                ListKind::Allow => "whitelist.added",
                ListKind::Deny => "blacklist.added",
            },
            params: vec![entry.to_string()],
        }
    }

    pub(crate) fn removed(list: ListKind, entry: &str) -> Self {
        Self {
            key: match list {
                ListKind::Allow => "whitelist.removed",
                ListKind::Deny => "blacklist.removed",
            },
            params: vec![entry.to_string()],
        }
    }
}

/// A business-rule rejection; no write occurred
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Input matched no supported identifier grammar
    InvalidIdentifier { raw: String },
    /// A non-historical entry with this key already exists
    AlreadyListed { entry: String },
    /// No entry found, including under the historical marker
    NotListed { entry: String },
    /// Deny-list reason exceeds the 1500-character cap
    ReasonTooLong { len: usize },
    /// The domain did not forward-resolve
    InvalidDomain { domain: String },
    /// Secondary-platform identifier with no secondary resolver configured
    SecondaryUnavailable,
    /// The MOTD shadow table is keyed by IPv4 addresses
    MotdRequiresIpv4,
    /// Domains exist on the allow list only
    DomainDenyUnsupported { domain: String },
}

impl Rejection {
    /// Stable message key for the localization layer
    pub fn message_key(&self) -> &'static str {
        match self {
            Rejection::InvalidIdentifier { .. } => "invalid-argument",
            Rejection::AlreadyListed { .. } => "already-listed",
            Rejection::NotListed { .. } => "not-listed",
            Rejection::ReasonTooLong { .. } => "reason-too-long",
            Rejection::InvalidDomain { .. } => "invalid-domain",
            Rejection::SecondaryUnavailable => "secondary-unavailable",
            Rejection::MotdRequiresIpv4 => "motd.syntax",
            Rejection::DomainDenyUnsupported { .. } => "domain.unsupported",
        }
    }

    /// Substitution parameters accompanying the key
    pub fn params(&self) -> Vec<String> {
        match self {
            Rejection::InvalidIdentifier { raw } => vec![raw.clone()],
            Rejection::AlreadyListed { entry } | Rejection::NotListed { entry } => {
                vec![entry.clone()]
            }
            Rejection::ReasonTooLong { len } => vec![len.to_string()],
            Rejection::InvalidDomain { domain }
            | Rejection::DomainDenyUnsupported { domain } => vec![domain.clone()],
            Rejection::SecondaryUnavailable | Rejection::MotdRequiresIpv4 => Vec::new(),
        }
    }
}

/// Metadata surfaced by the read-only info operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub list: ListKind,
    pub scope: EventScope,
    /// Stable key: account id, address literal, or domain literal
    pub key: String,
    pub display_name: Option<String>,
    pub added_by: String,
    pub added_at: i64,
    pub reason: Option<String>,
}

/// Result of one engine operation, as seen by the actor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The mutation was written and an event emitted
    Committed(UserMessage),
    /// A business rule rejected the request; nothing was written
    Rejected(Rejection),
    /// Read-only metadata for an info request
    Info(EntryInfo),
}

impl Outcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, Outcome::Committed(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Outcome::Rejected(_))
    }
}

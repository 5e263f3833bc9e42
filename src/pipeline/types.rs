//! Shared types for the correction pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Rule ────────────────────────────────────────────────────────────

/// A static mapping from a trigger term to a corrective message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// The misspelling searched for, matched as a whole token.
    #[serde(alias = "search")]
    pub search_term: String,
    /// Correction sent to the author. May contain a reference URL.
    #[serde(alias = "message")]
    pub reply_message: String,
    /// ISO 639-1 code the candidate text must be classified as.
    #[serde(alias = "lang")]
    pub language: String,
}

impl Rule {
    pub fn new(search_term: &str, reply_message: &str, language: &str) -> Self {
        Self {
            search_term: search_term.into(),
            reply_message: reply_message.into(),
            language: language.into(),
        }
    }
}

// ── Search candidate ────────────────────────────────────────────────

/// Point location attached to a status.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub longitude: f64,
    pub latitude: f64,
}

/// One status returned by the search transport.
///
/// Lives for a single run; only the fields copied into an
/// [`EngagementRecord`] outlive it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchCandidate {
    /// Transport-native status ID.
    pub id: String,
    /// Author handle, without the leading `@`.
    pub author_handle: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    /// Human-readable place name, if the status is geotagged.
    pub place: Option<String>,
    pub coordinates: Option<Coordinates>,
}

/// A status the transport accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedStatus {
    pub id: String,
    pub text: String,
}

// ── Engagement action ───────────────────────────────────────────────

/// What the bot does with a matching candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementAction {
    /// Reply to the author with the rule's correction.
    Reply,
    /// Public, untargeted reminder built from the rule's message.
    FillerFromRule,
    /// Generic self-introduction post.
    FillerFriendly,
    /// Stay silent.
    Skip,
}

impl EngagementAction {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Reply => "reply",
            Self::FillerFromRule => "filler_from_rule",
            Self::FillerFriendly => "filler_friendly",
            Self::Skip => "skip",
        }
    }

    pub fn is_filler(&self) -> bool {
        matches!(self, Self::FillerFromRule | Self::FillerFriendly)
    }
}

// ── Engagement record ───────────────────────────────────────────────

/// Append-only audit entry written after each reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementRecord {
    pub id: Uuid,
    /// Status that was replied to.
    pub status_id: String,
    pub screen_name: String,
    /// When the original status was posted.
    pub posted_at: DateTime<Utc>,
    /// Text of the original status.
    pub text: String,
    /// When the bot replied.
    pub engaged_at: DateTime<Utc>,
    pub search_term: String,
    pub language: String,
    pub place: Option<String>,
    pub coordinates: Option<Coordinates>,
    /// Written while posting was disabled.
    pub dry_run: bool,
}

impl EngagementRecord {
    /// Build the record for replying to `candidate` under `rule`.
    pub fn new(
        candidate: &SearchCandidate,
        rule: &Rule,
        engaged_at: DateTime<Utc>,
        dry_run: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            status_id: candidate.id.clone(),
            screen_name: candidate.author_handle.clone(),
            posted_at: candidate.created_at,
            text: candidate.text.clone(),
            engaged_at,
            search_term: rule.search_term.clone(),
            language: rule.language.clone(),
            place: candidate.place.clone(),
            coordinates: candidate.coordinates,
            dry_run,
        }
    }
}

// ── Run report ──────────────────────────────────────────────────────

/// Summary of one controller invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Search term of the rule picked for this run.
    pub search_term: String,
    pub candidates_seen: usize,
    pub matched: usize,
    pub fillers_posted: usize,
    /// Handle that received the run's reply, if any.
    pub replied_to: Option<String>,
    /// Errors that were logged and swallowed.
    pub errors: usize,
}

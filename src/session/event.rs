//! Events that drive session transitions.
//!
//! Events represent things that happened: interaction components used,
//! store queries resolved, the comment timer fired. They are the inputs to
//! the pure transition function; anything impure (clock reads, permission
//! lookups) is resolved by the dispatcher or interpreter before the event
//! is built.

use super::state::ScoreField;
use crate::ids::{ChannelId, UserId};
use crate::ratings::RatingRecord;

/// The action chosen after picking a subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubjectAction {
    View,
    Rate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The rater picked a subject from the subject menu. Supersedes any
    /// flow already in progress.
    SubjectSelected {
        subject: UserId,
        rater: UserId,
        /// Whether the rater holds the rating permission, resolved from the
        /// interaction payload by the dispatcher.
        may_rate: bool,
    },

    /// The rater chose view or rate for the pending subject.
    ActionSelected {
        action: SubjectAction,
        rater: UserId,
        channel: ChannelId,
        may_rate: bool,
    },

    /// Store result: all ratings of the pending subject.
    RatingsFetched {
        subject: UserId,
        records: Vec<RatingRecord>,
    },

    /// Store failure while fetching ratings for the view branch.
    RatingsFetchFailed { error: String },

    /// Store result: the (subject, rater) pair's most recent rating
    /// timestamp, plus the clock reading and a fresh form sequence number.
    LastRatingFetched {
        last: Option<i64>,
        now: i64,
        form_seq: u64,
    },

    /// Store failure while fetching the cooldown timestamp.
    LastRatingFetchFailed { error: String },

    /// A score selector was used.
    ScoreEntered { field: ScoreField, value: u8 },

    /// The awaited plain-text comment arrived.
    CommentReceived { text: String, now: i64 },

    /// The 60-second comment timer fired for the form with this sequence
    /// number. Stale timers (superseded forms) are discarded by comparison.
    CommentTimedOut { form_seq: u64, now: i64 },

    /// Store result: the rating was written.
    RatingStored { id: i64 },

    /// Store failure on the final commit write.
    StoreFailed { error: String },
}

impl SessionEvent {
    /// Summary suitable for logging; omits bulky record payloads and
    /// comment text.
    pub fn log_summary(&self) -> String {
        match self {
            SessionEvent::SubjectSelected {
                subject, may_rate, ..
            } => {
                format!("SubjectSelected {{ subject: {subject}, may_rate: {may_rate} }}")
            }
            SessionEvent::ActionSelected { action, rater, .. } => {
                format!("ActionSelected {{ action: {action:?}, rater: {rater} }}")
            }
            SessionEvent::RatingsFetched { subject, records } => {
                format!(
                    "RatingsFetched {{ subject: {subject}, count: {} }}",
                    records.len()
                )
            }
            SessionEvent::RatingsFetchFailed { error } => {
                format!("RatingsFetchFailed {{ error: {error} }}")
            }
            SessionEvent::LastRatingFetched { last, form_seq, .. } => {
                format!("LastRatingFetched {{ last: {last:?}, form_seq: {form_seq} }}")
            }
            SessionEvent::LastRatingFetchFailed { error } => {
                format!("LastRatingFetchFailed {{ error: {error} }}")
            }
            SessionEvent::ScoreEntered { field, value } => {
                format!("ScoreEntered {{ field: {}, value: {value} }}", field.as_str())
            }
            SessionEvent::CommentReceived { text, .. } => {
                format!("CommentReceived {{ len: {} }}", text.len())
            }
            SessionEvent::CommentTimedOut { form_seq, .. } => {
                format!("CommentTimedOut {{ form_seq: {form_seq} }}")
            }
            SessionEvent::RatingStored { id } => format!("RatingStored {{ id: {id} }}"),
            SessionEvent::StoreFailed { error } => format!("StoreFailed {{ error: {error} }}"),
        }
    }
}

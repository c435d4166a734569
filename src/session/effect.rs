//! Effects (side effects as data).
//!
//! Effects describe what should happen as a result of a session transition.
//! They are pure data; the interpreter executes them against the gateway
//! and the rating store. This separation lets the transition logic be
//! tested without mocking HTTP.

use crate::ids::UserId;
use crate::ratings::{NewRating, RatingRecord};

/// All effects a session transition can produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Reply to the invoking user, visible only to them.
    Reply { content: ReplyContent },

    /// Fetch all ratings of `subject` from the store.
    FetchRatings { subject: UserId },

    /// Fetch the (subject, rater) pair's most recent rating timestamp for
    /// the cooldown check. The interpreter reads the clock and allocates a
    /// fresh form sequence number for the result event.
    FetchLastRating { subject: UserId, rater: UserId },

    /// Write the completed rating to the store.
    InsertRating { rating: NewRating },

    /// Arm the 60-second comment timer for the form with this sequence
    /// number.
    StartCommentTimer { form_seq: u64 },

    /// Log a message.
    Log { level: LogLevel, message: String },
}

/// Content of an ephemeral reply, rendered into a payload by the
/// presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyContent {
    /// The view/rate choice for a freshly selected subject.
    ChooseAction { subject: UserId, offer_rate: bool },
    /// An action event arrived without a prior subject selection.
    MissingPendingSelection,
    /// The rater tried to rate themself.
    SelfRating,
    /// The rater lacks the rating or removal permission.
    PermissionDenied,
    /// The cooldown window has not elapsed yet.
    CooldownActive { retry_after_minutes: i64 },
    /// The four score selectors.
    RatingForm { subject: UserId },
    /// All four scores captured; prompt for the comment.
    ScoresComplete { subject: UserId },
    /// The subject has no ratings to show.
    NoRatingsYet { subject: UserId },
    /// Averages plus every comment for the subject.
    RatingSummary {
        subject: UserId,
        records: Vec<RatingRecord>,
    },
    /// Commit confirmation.
    RatingRecorded { rating: NewRating, id: i64 },
    /// The persistence layer failed.
    StoreUnavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

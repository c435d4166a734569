//! Pure session transition function.
//!
//! Takes the current session state and an event, returns the new state and
//! a list of effects. No side effects; all I/O is described as effect data
//! and executed by the interpreter.

use super::effect::{Effect, LogLevel, ReplyContent};
use super::event::{SessionEvent, SubjectAction};
use super::state::{RatingForm, SessionState};
use crate::cooldown::{can_rate, CooldownDecision};

/// Placeholder comment used when the 60-second wait elapses.
pub const DEFAULT_COMMENT: &str = "No comment provided";

/// Maximum stored comment length, in characters.
pub const MAX_COMMENT_CHARS: usize = 200;

/// Result of a session transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionResult {
    /// The new state after the transition.
    pub state: SessionState,
    /// Effects to execute.
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: SessionState, effects: Vec<Effect>) -> Self {
        Self { state, effects }
    }
}

/// Normalize a submitted comment: trim, default if empty, cap the length.
fn resolve_comment(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return DEFAULT_COMMENT.to_string();
    }
    trimmed.chars().take(MAX_COMMENT_CHARS).collect()
}

/// Pure session transition function.
pub fn transition(state: SessionState, event: SessionEvent) -> TransitionResult {
    // A new subject selection supersedes whatever flow was in progress,
    // whole-state, in every state.
    if let SessionEvent::SubjectSelected {
        subject,
        rater,
        may_rate,
    } = &event
    {
        let offer_rate = *may_rate && subject != rater;
        return TransitionResult::new(
            SessionState::SubjectChosen {
                subject: subject.clone(),
            },
            vec![Effect::Reply {
                content: ReplyContent::ChooseAction {
                    subject: subject.clone(),
                    offer_rate,
                },
            }],
        );
    }

    match state {
        SessionState::Idle => handle_idle(event),
        SessionState::SubjectChosen { subject } => handle_subject_chosen(subject, event),
        SessionState::ViewPending { subject } => handle_view_pending(subject, event),
        SessionState::CooldownCheck {
            subject,
            rater,
            channel,
        } => handle_cooldown_check(subject, rater, channel, event),
        SessionState::Rating { form } => handle_rating(form, event),
        SessionState::AwaitingComment { form } => handle_awaiting_comment(form, event),
        SessionState::Committing { rating } => handle_committing(rating, event),
    }
}

fn handle_idle(event: SessionEvent) -> TransitionResult {
    match event {
        SessionEvent::ActionSelected { .. } => TransitionResult::new(
            SessionState::Idle,
            vec![Effect::Reply {
                content: ReplyContent::MissingPendingSelection,
            }],
        ),
        SessionEvent::CommentTimedOut { form_seq, .. } => TransitionResult::new(
            SessionState::Idle,
            vec![Effect::Log {
                level: LogLevel::Info,
                message: format!("Discarding stale comment timer (form_seq {form_seq})"),
            }],
        ),
        other => unhandled(SessionState::Idle, &other),
    }
}

fn handle_subject_chosen(
    subject: crate::ids::UserId,
    event: SessionEvent,
) -> TransitionResult {
    match event {
        SessionEvent::ActionSelected {
            action: SubjectAction::View,
            ..
        } => TransitionResult::new(
            SessionState::ViewPending {
                subject: subject.clone(),
            },
            vec![Effect::FetchRatings { subject }],
        ),
        SessionEvent::ActionSelected {
            action: SubjectAction::Rate,
            rater,
            channel,
            may_rate,
        } => {
            // The rate button is not offered in these cases, but component
            // events cannot be trusted to match what was offered.
            if rater == subject {
                return TransitionResult::new(
                    SessionState::SubjectChosen { subject },
                    vec![Effect::Reply {
                        content: ReplyContent::SelfRating,
                    }],
                );
            }
            if !may_rate {
                return TransitionResult::new(
                    SessionState::SubjectChosen { subject },
                    vec![Effect::Reply {
                        content: ReplyContent::PermissionDenied,
                    }],
                );
            }
            TransitionResult::new(
                SessionState::CooldownCheck {
                    subject: subject.clone(),
                    rater: rater.clone(),
                    channel,
                },
                vec![Effect::FetchLastRating { subject, rater }],
            )
        }
        SessionEvent::CommentTimedOut { form_seq, .. } => TransitionResult::new(
            SessionState::SubjectChosen { subject },
            vec![Effect::Log {
                level: LogLevel::Info,
                message: format!("Discarding stale comment timer (form_seq {form_seq})"),
            }],
        ),
        other => unhandled(SessionState::SubjectChosen { subject }, &other),
    }
}

fn handle_view_pending(subject: crate::ids::UserId, event: SessionEvent) -> TransitionResult {
    match event {
        SessionEvent::RatingsFetched { records, .. } => {
            // View is terminal: no session state survives it.
            let content = if records.is_empty() {
                ReplyContent::NoRatingsYet { subject }
            } else {
                ReplyContent::RatingSummary { subject, records }
            };
            TransitionResult::new(SessionState::Idle, vec![Effect::Reply { content }])
        }
        SessionEvent::RatingsFetchFailed { error } => TransitionResult::new(
            SessionState::Idle,
            vec![
                Effect::Reply {
                    content: ReplyContent::StoreUnavailable,
                },
                Effect::Log {
                    level: LogLevel::Error,
                    message: format!("Failed to fetch ratings for view: {error}"),
                },
            ],
        ),
        other => unhandled(SessionState::ViewPending { subject }, &other),
    }
}

fn handle_cooldown_check(
    subject: crate::ids::UserId,
    rater: crate::ids::UserId,
    channel: crate::ids::ChannelId,
    event: SessionEvent,
) -> TransitionResult {
    match event {
        SessionEvent::LastRatingFetched {
            last,
            now,
            form_seq,
        } => match can_rate(last, now) {
            CooldownDecision::Allowed => {
                let form = RatingForm::new(subject.clone(), rater, channel, form_seq);
                TransitionResult::new(
                    SessionState::Rating { form },
                    vec![Effect::Reply {
                        content: ReplyContent::RatingForm { subject },
                    }],
                )
            }
            CooldownDecision::Denied {
                retry_after_minutes,
            } => TransitionResult::new(
                SessionState::Idle,
                vec![Effect::Reply {
                    content: ReplyContent::CooldownActive {
                        retry_after_minutes,
                    },
                }],
            ),
        },
        SessionEvent::LastRatingFetchFailed { error } => TransitionResult::new(
            SessionState::Idle,
            vec![
                Effect::Reply {
                    content: ReplyContent::StoreUnavailable,
                },
                Effect::Log {
                    level: LogLevel::Error,
                    message: format!("Failed to fetch cooldown timestamp: {error}"),
                },
            ],
        ),
        other => unhandled(
            SessionState::CooldownCheck {
                subject,
                rater,
                channel,
            },
            &other,
        ),
    }
}

fn handle_rating(mut form: RatingForm, event: SessionEvent) -> TransitionResult {
    match event {
        SessionEvent::ScoreEntered { field, value } => {
            if !(1..=10).contains(&value) {
                return TransitionResult::new(
                    SessionState::Rating { form },
                    vec![Effect::Log {
                        level: LogLevel::Warn,
                        message: format!(
                            "Ignoring out-of-range score {value} for {}",
                            field.as_str()
                        ),
                    }],
                );
            }
            form.set(field, value);
            if form.is_complete() {
                let form_seq = form.form_seq;
                let subject = form.subject.clone();
                TransitionResult::new(
                    SessionState::AwaitingComment { form },
                    vec![
                        Effect::Reply {
                            content: ReplyContent::ScoresComplete { subject },
                        },
                        Effect::StartCommentTimer { form_seq },
                    ],
                )
            } else {
                TransitionResult::new(SessionState::Rating { form }, vec![])
            }
        }
        SessionEvent::CommentTimedOut { form_seq, .. } => TransitionResult::new(
            SessionState::Rating { form },
            vec![Effect::Log {
                level: LogLevel::Info,
                message: format!("Discarding stale comment timer (form_seq {form_seq})"),
            }],
        ),
        other => unhandled(SessionState::Rating { form }, &other),
    }
}

fn handle_awaiting_comment(mut form: RatingForm, event: SessionEvent) -> TransitionResult {
    match event {
        SessionEvent::CommentReceived { text, now } => {
            commit(form, resolve_comment(&text), now)
        }
        SessionEvent::CommentTimedOut { form_seq, now } => {
            if form_seq != form.form_seq {
                return TransitionResult::new(
                    SessionState::AwaitingComment { form },
                    vec![Effect::Log {
                        level: LogLevel::Info,
                        message: format!(
                            "Discarding stale comment timer (form_seq {form_seq})"
                        ),
                    }],
                );
            }
            commit(form, DEFAULT_COMMENT.to_string(), now)
        }
        // Late revisions are accepted into the form but never re-arm the
        // timer or trigger a second commit.
        SessionEvent::ScoreEntered { field, value } => {
            if (1..=10).contains(&value) {
                form.set(field, value);
            }
            TransitionResult::new(SessionState::AwaitingComment { form }, vec![])
        }
        other => unhandled(SessionState::AwaitingComment { form }, &other),
    }
}

/// The one edge that emits the durable write.
fn commit(form: RatingForm, comment: String, now: i64) -> TransitionResult {
    match form.into_rating(comment, now) {
        Some(rating) => TransitionResult::new(
            SessionState::Committing {
                rating: rating.clone(),
            },
            vec![Effect::InsertRating { rating }],
        ),
        None => TransitionResult::new(
            SessionState::Idle,
            vec![Effect::Log {
                level: LogLevel::Error,
                message: "Form reached commit with missing fields".to_string(),
            }],
        ),
    }
}

fn handle_committing(
    rating: crate::ratings::NewRating,
    event: SessionEvent,
) -> TransitionResult {
    match event {
        SessionEvent::RatingStored { id } => TransitionResult::new(
            SessionState::Idle,
            vec![Effect::Reply {
                content: ReplyContent::RatingRecorded { rating, id },
            }],
        ),
        SessionEvent::StoreFailed { error } => TransitionResult::new(
            // The form is cleared rather than retained: the failure is
            // reported once and the completed scores are logged as lost.
            SessionState::Idle,
            vec![
                Effect::Reply {
                    content: ReplyContent::StoreUnavailable,
                },
                Effect::Log {
                    level: LogLevel::Error,
                    message: format!(
                        "Rating by {} of {} lost on commit: {error}",
                        rating.rater, rating.subject
                    ),
                },
            ],
        ),
        SessionEvent::CommentTimedOut { form_seq, .. } => TransitionResult::new(
            SessionState::Committing { rating },
            vec![Effect::Log {
                level: LogLevel::Info,
                message: format!("Discarding stale comment timer (form_seq {form_seq})"),
            }],
        ),
        other => unhandled(SessionState::Committing { rating }, &other),
    }
}

/// Catch-all: keep the state, log the event.
fn unhandled(state: SessionState, event: &SessionEvent) -> TransitionResult {
    let message = format!(
        "Unhandled event {} in state {}",
        event.log_summary(),
        state.variant_name()
    );
    TransitionResult::new(
        state,
        vec![Effect::Log {
            level: LogLevel::Warn,
            message,
        }],
    )
}

//! Per-rater session state.
//!
//! A session tracks one rater's progress through the rate-or-view flow:
//! which subject they picked, which action, and the partially filled rating
//! form. Sessions are transient and never persisted.

use crate::ids::{ChannelId, UserId};
use crate::ratings::NewRating;

/// The four score fields of a rating form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScoreField {
    Shot,
    Assist,
    Defense,
    Goalkeeping,
}

impl ScoreField {
    pub const ALL: [ScoreField; 4] = [
        ScoreField::Shot,
        ScoreField::Assist,
        ScoreField::Defense,
        ScoreField::Goalkeeping,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreField::Shot => "shot",
            ScoreField::Assist => "assist",
            ScoreField::Defense => "defense",
            ScoreField::Goalkeeping => "goalkeeping",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ScoreField::Shot => "Shot",
            ScoreField::Assist => "Assist",
            ScoreField::Defense => "Defense",
            ScoreField::Goalkeeping => "Goalkeeping",
        }
    }
}

/// A rating form being filled in. Fields may arrive in any order and may be
/// revised; the form is complete exactly when all four are present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatingForm {
    pub subject: UserId,
    pub rater: UserId,
    /// Channel the flow runs in; the follow-up comment must arrive here.
    pub channel: ChannelId,
    pub shot: Option<u8>,
    pub assist: Option<u8>,
    pub defense: Option<u8>,
    pub goalkeeping: Option<u8>,
    /// Monotonic sequence number distinguishing this form's comment timer
    /// from timers armed for earlier, superseded forms.
    pub form_seq: u64,
}

impl RatingForm {
    pub fn new(subject: UserId, rater: UserId, channel: ChannelId, form_seq: u64) -> Self {
        Self {
            subject,
            rater,
            channel,
            shot: None,
            assist: None,
            defense: None,
            goalkeeping: None,
            form_seq,
        }
    }

    /// Set (or revise) one field.
    pub fn set(&mut self, field: ScoreField, value: u8) {
        match field {
            ScoreField::Shot => self.shot = Some(value),
            ScoreField::Assist => self.assist = Some(value),
            ScoreField::Defense => self.defense = Some(value),
            ScoreField::Goalkeeping => self.goalkeeping = Some(value),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.shot.is_some()
            && self.assist.is_some()
            && self.defense.is_some()
            && self.goalkeeping.is_some()
    }

    /// Resolve the form into a storable rating. `None` if any field is
    /// still missing.
    pub fn into_rating(self, comment: String, now: i64) -> Option<NewRating> {
        Some(NewRating {
            subject: self.subject,
            rater: self.rater,
            shot: self.shot?,
            assist: self.assist?,
            defense: self.defense?,
            goalkeeping: self.goalkeeping?,
            comment,
            timestamp: now,
        })
    }
}

/// Session states for one rater's flow.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No flow in progress.
    #[default]
    Idle,
    /// A subject was picked; waiting for the view/rate choice.
    SubjectChosen { subject: UserId },
    /// View requested; waiting for the store to return the subject's ratings.
    ViewPending { subject: UserId },
    /// Rate requested; waiting for the store to return the pair's most
    /// recent rating timestamp for the cooldown check.
    CooldownCheck {
        subject: UserId,
        rater: UserId,
        channel: ChannelId,
    },
    /// Filling in the four score fields.
    Rating { form: RatingForm },
    /// All four scores present; waiting for one plain-text comment or the
    /// 60-second timeout.
    AwaitingComment { form: RatingForm },
    /// Commit in flight; waiting for the store result.
    Committing { rating: NewRating },
}

impl SessionState {
    /// Short name for logging.
    pub fn variant_name(&self) -> &'static str {
        match self {
            SessionState::Idle => "Idle",
            SessionState::SubjectChosen { .. } => "SubjectChosen",
            SessionState::ViewPending { .. } => "ViewPending",
            SessionState::CooldownCheck { .. } => "CooldownCheck",
            SessionState::Rating { .. } => "Rating",
            SessionState::AwaitingComment { .. } => "AwaitingComment",
            SessionState::Committing { .. } => "Committing",
        }
    }

    /// The channel an awaited comment must arrive in, if this session is
    /// waiting for one.
    pub fn awaited_comment_channel(&self) -> Option<&ChannelId> {
        match self {
            SessionState::AwaitingComment { form } => Some(&form.channel),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> RatingForm {
        RatingForm::new(
            UserId::from("subject"),
            UserId::from("rater"),
            ChannelId::from("chan"),
            1,
        )
    }

    #[test]
    fn test_form_complete_only_with_all_four_fields() {
        let mut f = form();
        assert!(!f.is_complete());
        f.set(ScoreField::Shot, 7);
        f.set(ScoreField::Shot, 8);
        f.set(ScoreField::Shot, 9);
        assert!(!f.is_complete(), "revising one field is not completion");
        f.set(ScoreField::Assist, 5);
        f.set(ScoreField::Defense, 3);
        assert!(!f.is_complete());
        f.set(ScoreField::Goalkeeping, 1);
        assert!(f.is_complete());
    }

    #[test]
    fn test_into_rating_requires_completion() {
        let f = form();
        assert!(f.into_rating("x".to_string(), 0).is_none());

        let mut f = form();
        for field in ScoreField::ALL {
            f.set(field, 10);
        }
        let rating = f.into_rating("great".to_string(), 99).unwrap();
        assert_eq!(rating.shot, 10);
        assert_eq!(rating.comment, "great");
        assert_eq!(rating.timestamp, 99);
    }

    #[test]
    fn test_revision_overwrites_value() {
        let mut f = form();
        f.set(ScoreField::Defense, 2);
        f.set(ScoreField::Defense, 9);
        assert_eq!(f.defense, Some(9));
    }
}

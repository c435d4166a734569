//! Rating cooldown policy.
//!
//! A rater must wait [`COOLDOWN_SECS`] between ratings of the same subject,
//! counted from their most recent stored rating of that subject.

/// Seconds a rater must wait between ratings.
pub const COOLDOWN_SECS: i64 = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownDecision {
    Allowed,
    Denied { retry_after_minutes: i64 },
}

/// Decide whether a rater may rate again at `now`, given the timestamp of
/// their last stored rating (both in unix seconds).
///
/// The boundary is inclusive: exactly `COOLDOWN_SECS` elapsed is allowed.
/// Remaining time is reported in whole minutes, rounded up, so the user is
/// never told to wait zero minutes.
pub fn can_rate(last_rated_at: Option<i64>, now: i64) -> CooldownDecision {
    let last = match last_rated_at {
        Some(t) => t,
        None => return CooldownDecision::Allowed,
    };
    let elapsed = now.saturating_sub(last);
    if elapsed >= COOLDOWN_SECS {
        CooldownDecision::Allowed
    } else {
        let remaining = COOLDOWN_SECS - elapsed;
        CooldownDecision::Denied {
            retry_after_minutes: (remaining as u64).div_ceil(60) as i64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_never_rated_is_allowed() {
        assert_eq!(can_rate(None, 1_000), CooldownDecision::Allowed);
    }

    #[test]
    fn test_exactly_at_boundary_is_allowed() {
        assert_eq!(can_rate(Some(1_000), 1_600), CooldownDecision::Allowed);
    }

    #[test]
    fn test_one_second_short_is_denied() {
        assert_eq!(
            can_rate(Some(1_000), 1_599),
            CooldownDecision::Denied {
                retry_after_minutes: 1
            }
        );
    }

    #[test]
    fn test_sixty_seconds_elapsed_rounds_to_nine_minutes() {
        assert_eq!(
            can_rate(Some(1_000), 1_060),
            CooldownDecision::Denied {
                retry_after_minutes: 9
            }
        );
    }

    #[test]
    fn test_one_second_elapsed_rounds_to_ten_minutes() {
        assert_eq!(
            can_rate(Some(1_000), 1_001),
            CooldownDecision::Denied {
                retry_after_minutes: 10
            }
        );
    }

    #[test]
    fn test_partial_minute_rounds_up() {
        // 540 elapsed leaves 60 remaining, exactly one minute.
        assert_eq!(
            can_rate(Some(1_000), 1_540),
            CooldownDecision::Denied {
                retry_after_minutes: 1
            }
        );
        // 541 elapsed leaves 59 remaining, still one minute.
        assert_eq!(
            can_rate(Some(1_000), 1_541),
            CooldownDecision::Denied {
                retry_after_minutes: 1
            }
        );
    }

    #[test]
    fn test_clock_skew_does_not_underflow() {
        // Last rating apparently in the future: treat as just rated.
        assert_eq!(
            can_rate(Some(2_000), 1_000),
            CooldownDecision::Denied {
                retry_after_minutes: 10
            }
        );
    }
}

//! Holds the per-rater session states and drives events through the
//! transition function and the effect interpreter.

use crate::ids::{ChannelId, GuildId, UserId};
use crate::session::interpreter::{execute_effects, InterpreterContext};
use crate::session::state::SessionState;
use crate::session::transition::transition;
use crate::session::SessionEvent;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// Sessions are scoped to one rater within one community.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub guild: GuildId,
    pub rater: UserId,
}

#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<SessionKey, SessionState>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process one event, plus every result event the interpreter produces
    /// along the way, in order.
    pub async fn process_event(
        &self,
        key: &SessionKey,
        event: SessionEvent,
        ctx: &InterpreterContext,
    ) {
        let mut events_to_process = vec![event];
        while let Some(event) = events_to_process.pop() {
            info!(
                guild = %key.guild,
                rater = %key.rater,
                "Processing session event: {}",
                event.log_summary()
            );
            let result = {
                let mut sessions = self.sessions.lock().await;
                let state = sessions.remove(key).unwrap_or_default();
                let result = transition(state, event);
                sessions.insert(key.clone(), result.state.clone());
                result
            };
            let results = execute_effects(ctx, result.effects).await;
            // Preserve ordering given that we pop from the end.
            for e in results.into_iter().rev() {
                events_to_process.push(e);
            }
        }
    }

    /// Whether this rater is waiting for a comment in `channel`. The
    /// dispatcher uses this to decide which plain messages are comments.
    pub async fn is_awaiting_comment(&self, key: &SessionKey, channel: &ChannelId) -> bool {
        let sessions = self.sessions.lock().await;
        sessions
            .get(key)
            .and_then(SessionState::awaited_comment_channel)
            == Some(channel)
    }

    /// Drop every session in the community. Pending comment timers become
    /// inert: they target a form sequence no session holds any more.
    pub async fn clear_guild(&self, guild: &GuildId) {
        let mut sessions = self.sessions.lock().await;
        sessions.retain(|key, _| &key.guild != guild);
    }

    pub async fn state_of(&self, key: &SessionKey) -> SessionState {
        let sessions = self.sessions.lock().await;
        sessions.get(key).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Inbound;
    use crate::gateway::test_support::{GatewayCall, RecordingGateway};
    use crate::gateway::Component;
    use crate::ids::InteractionToken;
    use crate::ratings::InMemoryRatingStore;
    use crate::session::event::SubjectAction;
    use crate::session::state::ScoreField;
    use std::sync::atomic::AtomicU64;
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct Fixture {
        store: SessionStore,
        ratings: Arc<InMemoryRatingStore>,
        gateway: Arc<RecordingGateway>,
        ctx: InterpreterContext,
        inbound: mpsc::UnboundedReceiver<Inbound>,
        key: SessionKey,
    }

    fn fixture() -> Fixture {
        let ratings = Arc::new(InMemoryRatingStore::new());
        let gateway = Arc::new(RecordingGateway::new());
        let (tx, rx) = mpsc::unbounded_channel();
        let key = SessionKey {
            guild: GuildId::from("g"),
            rater: UserId::from("rater"),
        };
        let ctx = InterpreterContext {
            gateway: gateway.clone(),
            store: ratings.clone(),
            guild: key.guild.clone(),
            rater: key.rater.clone(),
            channel: ChannelId::from("chan"),
            token: Some(InteractionToken::from("tok")),
            inbound: tx,
            form_seqs: Arc::new(AtomicU64::new(0)),
            comment_wait: Duration::from_millis(10),
        };
        Fixture {
            store: SessionStore::new(),
            ratings,
            gateway,
            ctx,
            inbound: rx,
            key,
        }
    }

    async fn drive_to_awaiting_comment(f: &mut Fixture) {
        f.store
            .process_event(
                &f.key,
                SessionEvent::SubjectSelected {
                    subject: UserId::from("subject"),
                    rater: f.key.rater.clone(),
                    may_rate: true,
                },
                &f.ctx,
            )
            .await;
        f.store
            .process_event(
                &f.key,
                SessionEvent::ActionSelected {
                    action: SubjectAction::Rate,
                    rater: f.key.rater.clone(),
                    channel: ChannelId::from("chan"),
                    may_rate: true,
                },
                &f.ctx,
            )
            .await;
        for field in ScoreField::ALL {
            f.store
                .process_event(&f.key, SessionEvent::ScoreEntered { field, value: 8 }, &f.ctx)
                .await;
        }
        assert!(
            f.store
                .is_awaiting_comment(&f.key, &ChannelId::from("chan"))
                .await
        );
    }

    /// The rate branch runs the cooldown fetch as a result event and lands
    /// in the scoring state with a form reply.
    #[tokio::test]
    async fn test_rate_action_reaches_scoring_via_result_events() {
        let mut f = fixture();
        drive_to_awaiting_comment(&mut f).await;

        let form_prompts = f
            .gateway
            .calls()
            .iter()
            .filter(|call| match call {
                GatewayCall::ReplyEphemeral { message, .. } => message
                    .components
                    .iter()
                    .any(|c| matches!(c, Component::Select { custom_id, .. } if custom_id == "rate_shot")),
                _ => false,
            })
            .count();
        assert_eq!(form_prompts, 1);
    }

    #[tokio::test]
    async fn test_comment_commits_the_rating() {
        let mut f = fixture();
        drive_to_awaiting_comment(&mut f).await;

        f.store
            .process_event(
                &f.key,
                SessionEvent::CommentReceived {
                    text: "clinical finisher".to_string(),
                    now: 1_000,
                },
                &f.ctx,
            )
            .await;

        let stored = f.ratings.dump().await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].comment, "clinical finisher");
        assert_eq!(stored[0].shot, 8);
        assert_eq!(f.store.state_of(&f.key).await, SessionState::Idle);
    }

    #[tokio::test]
    async fn test_timer_fires_and_commits_default_comment() {
        let mut f = fixture();
        drive_to_awaiting_comment(&mut f).await;

        let timer = tokio::time::timeout(Duration::from_secs(1), f.inbound.recv())
            .await
            .expect("timer should fire")
            .expect("sender alive");
        let Inbound::CommentTimer { form_seq, .. } = timer else {
            panic!("expected a comment timer");
        };
        f.store
            .process_event(
                &f.key,
                SessionEvent::CommentTimedOut {
                    form_seq,
                    now: 2_000,
                },
                &f.ctx,
            )
            .await;

        let stored = f.ratings.dump().await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].comment, "No comment provided");
    }

    #[tokio::test]
    async fn test_second_rating_within_cooldown_is_denied() {
        let mut f = fixture();
        drive_to_awaiting_comment(&mut f).await;
        f.store
            .process_event(
                &f.key,
                SessionEvent::CommentReceived {
                    text: "good".to_string(),
                    now: crate::session::interpreter::unix_now(),
                },
                &f.ctx,
            )
            .await;

        // Start over immediately against the same subject.
        f.store
            .process_event(
                &f.key,
                SessionEvent::SubjectSelected {
                    subject: UserId::from("subject"),
                    rater: f.key.rater.clone(),
                    may_rate: true,
                },
                &f.ctx,
            )
            .await;
        f.store
            .process_event(
                &f.key,
                SessionEvent::ActionSelected {
                    action: SubjectAction::Rate,
                    rater: f.key.rater.clone(),
                    channel: ChannelId::from("chan"),
                    may_rate: true,
                },
                &f.ctx,
            )
            .await;

        assert_eq!(f.store.state_of(&f.key).await, SessionState::Idle);
        let denied = f.gateway.calls().iter().any(|call| match call {
            GatewayCall::ReplyEphemeral { message, .. } => message
                .content
                .as_deref()
                .is_some_and(|c| c.contains("Try again in 10 minute(s)")),
            _ => false,
        });
        assert!(denied);
        assert_eq!(f.ratings.dump().await.len(), 1);
    }

    #[tokio::test]
    async fn test_clear_guild_drops_sessions() {
        let mut f = fixture();
        drive_to_awaiting_comment(&mut f).await;
        f.store.clear_guild(&f.key.guild).await;
        assert!(
            !f.store
                .is_awaiting_comment(&f.key, &ChannelId::from("chan"))
                .await
        );
    }
}

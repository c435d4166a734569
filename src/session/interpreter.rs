//! Effect interpreter: executes session effects against the gateway and
//! the rating store, feeding store results back in as events.
//!
//! The interpreter is the only place the clock is read and form sequence
//! numbers are allocated, so the transition logic stays pure.

use crate::dispatch::Inbound;
use crate::gateway::ChatGateway;
use crate::ids::{ChannelId, GuildId, InteractionToken, UserId};
use crate::ratings::RatingStore;
use crate::render;
use crate::session::effect::{Effect, LogLevel};
use crate::session::event::SessionEvent;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Seconds since the Unix epoch.
pub fn unix_now() -> i64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(elapsed) => elapsed.as_secs() as i64,
        Err(_) => 0,
    }
}

/// Everything `execute_effects` needs to act on behalf of one rater's
/// interaction.
pub struct InterpreterContext {
    pub gateway: Arc<dyn ChatGateway>,
    pub store: Arc<dyn RatingStore>,
    pub guild: GuildId,
    pub rater: UserId,
    /// The channel the interaction happened in; used for non-ephemeral
    /// fallback replies and threaded through comment timers.
    pub channel: ChannelId,
    /// Present when responding to an interaction; absent for timer-driven
    /// re-entries, where replies fall back to a channel post.
    pub token: Option<InteractionToken>,
    /// Fired comment timers re-enter the worker queue through here.
    pub inbound: mpsc::UnboundedSender<Inbound>,
    /// Process-wide form sequence counter.
    pub form_seqs: Arc<AtomicU64>,
    /// How long to wait for a comment before committing without one.
    pub comment_wait: Duration,
}

async fn send_reply(ctx: &InterpreterContext, content: &crate::session::effect::ReplyContent) {
    let message = render::reply(content);
    let outcome = match &ctx.token {
        Some(token) => ctx.gateway.reply_ephemeral(token, message).await,
        None => ctx
            .gateway
            .post_message(&ctx.channel, message)
            .await
            .map(|_| ()),
    };
    if let Err(e) = outcome {
        warn!(rater = %ctx.rater, "failed to deliver reply: {e:#}");
    }
}

/// Execute each effect in order, collecting the result events the store
/// operations produce.
pub async fn execute_effects(ctx: &InterpreterContext, effects: Vec<Effect>) -> Vec<SessionEvent> {
    let mut results = Vec::new();
    for effect in effects {
        match effect {
            Effect::Reply { content } => send_reply(ctx, &content).await,
            Effect::FetchRatings { subject } => {
                let event = match ctx.store.all_for_subject(&subject).await {
                    Ok(records) => SessionEvent::RatingsFetched { subject, records },
                    Err(e) => SessionEvent::RatingsFetchFailed {
                        error: e.to_string(),
                    },
                };
                results.push(event);
            }
            Effect::FetchLastRating { subject, rater } => {
                let event = match ctx.store.latest_timestamp(&subject, &rater).await {
                    Ok(last) => SessionEvent::LastRatingFetched {
                        last,
                        now: unix_now(),
                        form_seq: ctx.form_seqs.fetch_add(1, Ordering::SeqCst),
                    },
                    Err(e) => SessionEvent::LastRatingFetchFailed {
                        error: e.to_string(),
                    },
                };
                results.push(event);
            }
            Effect::InsertRating { rating } => {
                let event = match ctx.store.insert(rating).await {
                    Ok(record) => SessionEvent::RatingStored { id: record.id },
                    Err(e) => SessionEvent::StoreFailed {
                        error: e.to_string(),
                    },
                };
                results.push(event);
            }
            Effect::StartCommentTimer { form_seq } => {
                let inbound = ctx.inbound.clone();
                let guild = ctx.guild.clone();
                let rater = ctx.rater.clone();
                let channel = ctx.channel.clone();
                let wait = ctx.comment_wait;
                tokio::spawn(async move {
                    tokio::time::sleep(wait).await;
                    // The receiver is gone only during shutdown.
                    let _ = inbound.send(Inbound::CommentTimer {
                        guild,
                        rater,
                        channel,
                        form_seq,
                    });
                });
            }
            Effect::Log { level, message } => match level {
                LogLevel::Info => info!("{message}"),
                LogLevel::Warn => warn!("{message}"),
                LogLevel::Error => error!("{message}"),
            },
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::test_support::{GatewayCall, RecordingGateway};
    use crate::ratings::InMemoryRatingStore;
    use crate::session::effect::ReplyContent;

    fn context(
        gateway: Arc<RecordingGateway>,
        store: Arc<InMemoryRatingStore>,
        token: Option<InteractionToken>,
    ) -> (InterpreterContext, mpsc::UnboundedReceiver<Inbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let ctx = InterpreterContext {
            gateway,
            store,
            guild: GuildId::from("g"),
            rater: UserId::from("rater"),
            channel: ChannelId::from("chan"),
            token,
            inbound: tx,
            form_seqs: Arc::new(AtomicU64::new(0)),
            comment_wait: Duration::from_millis(5),
        };
        (ctx, rx)
    }

    #[tokio::test]
    async fn test_reply_uses_token_when_present() {
        let gateway = Arc::new(RecordingGateway::new());
        let store = Arc::new(InMemoryRatingStore::new());
        let (ctx, _rx) = context(
            gateway.clone(),
            store,
            Some(InteractionToken::from("tok")),
        );

        let results = execute_effects(
            &ctx,
            vec![Effect::Reply {
                content: ReplyContent::SelfRating,
            }],
        )
        .await;

        assert!(results.is_empty());
        assert!(matches!(
            gateway.calls()[0],
            GatewayCall::ReplyEphemeral { .. }
        ));
    }

    #[tokio::test]
    async fn test_reply_falls_back_to_channel_post_without_token() {
        let gateway = Arc::new(RecordingGateway::new());
        let store = Arc::new(InMemoryRatingStore::new());
        let (ctx, _rx) = context(gateway.clone(), store, None);

        execute_effects(
            &ctx,
            vec![Effect::Reply {
                content: ReplyContent::StoreUnavailable,
            }],
        )
        .await;

        assert!(matches!(gateway.calls()[0], GatewayCall::PostMessage { .. }));
    }

    #[tokio::test]
    async fn test_fetch_last_rating_allocates_distinct_form_seqs() {
        let gateway = Arc::new(RecordingGateway::new());
        let store = Arc::new(InMemoryRatingStore::new());
        let (ctx, _rx) = context(gateway, store, None);

        let effect = Effect::FetchLastRating {
            subject: UserId::from("subject"),
            rater: UserId::from("rater"),
        };
        let first = execute_effects(&ctx, vec![effect.clone()]).await;
        let second = execute_effects(&ctx, vec![effect]).await;

        let seq = |events: &[SessionEvent]| match &events[0] {
            SessionEvent::LastRatingFetched { form_seq, .. } => *form_seq,
            other => panic!("unexpected event {other:?}"),
        };
        assert_ne!(seq(&first), seq(&second));
    }

    #[tokio::test]
    async fn test_comment_timer_reenters_the_queue() {
        let gateway = Arc::new(RecordingGateway::new());
        let store = Arc::new(InMemoryRatingStore::new());
        let (ctx, mut rx) = context(gateway, store, None);

        execute_effects(&ctx, vec![Effect::StartCommentTimer { form_seq: 7 }]).await;

        let inbound = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timer should fire")
            .expect("sender still alive");
        match inbound {
            Inbound::CommentTimer {
                guild,
                rater,
                form_seq,
                ..
            } => {
                assert_eq!(guild, GuildId::from("g"));
                assert_eq!(rater, UserId::from("rater"));
                assert_eq!(form_seq, 7);
            }
            other => panic!("unexpected inbound {other:?}"),
        }
    }
}

//! Turns platform events into roster mutations and session events.
//!
//! Every inbound event, including fired comment timers, flows through a
//! single worker via [`Inbound`], so session processing is serialized.

use crate::gateway::{ChatGateway, OutgoingMessage};
use crate::ids::{ChannelId, GuildId, InteractionToken, UserId};
use crate::ratings::RatingStore;
use crate::render;
use crate::roster::{Position, RosterError, RosterManager, StyleTier};
use crate::session::interpreter::{unix_now, InterpreterContext};
use crate::session::state::ScoreField;
use crate::session::{SessionEvent, SessionKey, SessionStore, SubjectAction};
use serde::Deserialize;
use std::fmt;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// The plain-text command that resets a community's roster.
pub const RESET_COMMAND: &str = "!amis";

/// Permission bit gating forced removal and rating eligibility.
const BROADCAST_MENTION_BIT: u64 = 1 << 17;

fn has_broadcast_mention(permissions: &str) -> bool {
    permissions
        .parse::<u64>()
        .map(|bits| bits & BROADCAST_MENTION_BIT != 0)
        .unwrap_or(false)
}

/// Whether the member may clear another player's position.
pub fn may_remove_players(permissions: &str) -> bool {
    has_broadcast_mention(permissions)
}

/// Whether the member may rate other players. Reads the same bit as
/// [`may_remove_players`]; the two are kept as distinct checks.
pub fn may_rate_others(permissions: &str) -> bool {
    has_broadcast_mention(permissions)
}

/// A platform event delivered by the ingestion endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlatformEvent {
    MessageCreate(MessageEvent),
    InteractionCreate(InteractionEvent),
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageEvent {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub author_id: UserId,
    pub content: String,
    #[serde(default)]
    pub author_is_bot: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InteractionEvent {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub user_id: UserId,
    pub token: InteractionToken,
    pub custom_id: String,
    /// Selected values for select components; empty for buttons.
    #[serde(default)]
    pub values: Vec<String>,
    /// The invoker's permission bitfield, as a decimal string.
    #[serde(default)]
    pub permissions: String,
}

/// Everything the worker consumes: platform events plus internally
/// generated comment timers.
#[derive(Debug)]
pub enum Inbound {
    Platform(PlatformEvent),
    CommentTimer {
        guild: GuildId,
        rater: UserId,
        channel: ChannelId,
        form_seq: u64,
    },
}

/// Which component an interaction came from, parsed from its `custom_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionKind {
    PositionSelect,
    StyleSelect,
    CharacterSelect(StyleTier),
    LeavePosition,
    RemovePlayer,
    RemoveSelect,
    MainRateOrView,
    ChooseSubject,
    ChooseView,
    ChooseRate,
    Score(ScoreField),
}

impl InteractionKind {
    pub fn custom_id(&self) -> String {
        match self {
            InteractionKind::PositionSelect => "position_select".to_string(),
            InteractionKind::StyleSelect => "style_select".to_string(),
            InteractionKind::CharacterSelect(tier) => format!("character_select:{}", tier.key()),
            InteractionKind::LeavePosition => "leave_position".to_string(),
            InteractionKind::RemovePlayer => "remove_player".to_string(),
            InteractionKind::RemoveSelect => "remove_select".to_string(),
            InteractionKind::MainRateOrView => "main_rate_or_view".to_string(),
            InteractionKind::ChooseSubject => "choose_subject".to_string(),
            InteractionKind::ChooseView => "choose_action:view".to_string(),
            InteractionKind::ChooseRate => "choose_action:rate".to_string(),
            InteractionKind::Score(field) => format!("rate_{}", field.as_str()),
        }
    }

    pub fn parse(custom_id: &str) -> Option<InteractionKind> {
        if let Some(key) = custom_id.strip_prefix("character_select:") {
            return StyleTier::parse(key).map(InteractionKind::CharacterSelect);
        }
        if let Some(field) = custom_id.strip_prefix("rate_") {
            return ScoreField::ALL
                .iter()
                .copied()
                .find(|f| f.as_str() == field)
                .map(InteractionKind::Score);
        }
        match custom_id {
            "position_select" => Some(InteractionKind::PositionSelect),
            "style_select" => Some(InteractionKind::StyleSelect),
            "leave_position" => Some(InteractionKind::LeavePosition),
            "remove_player" => Some(InteractionKind::RemovePlayer),
            "remove_select" => Some(InteractionKind::RemoveSelect),
            "main_rate_or_view" => Some(InteractionKind::MainRateOrView),
            "choose_subject" => Some(InteractionKind::ChooseSubject),
            "choose_action:view" => Some(InteractionKind::ChooseView),
            "choose_action:rate" => Some(InteractionKind::ChooseRate),
            _ => None,
        }
    }
}

/// A flow-level refusal, reported to the user as an ephemeral reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    PermissionDenied,
    PositionOccupied { position: Position, holder: UserId },
    PositionAlreadyEmpty { position: Position },
    NoSubjectsAvailable,
}

impl From<RosterError> for FlowError {
    fn from(e: RosterError) -> Self {
        match e {
            RosterError::PositionOccupied { position, holder } => {
                FlowError::PositionOccupied { position, holder }
            }
            RosterError::PositionAlreadyEmpty { position } => {
                FlowError::PositionAlreadyEmpty { position }
            }
        }
    }
}

impl fmt::Display for FlowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowError::PermissionDenied => {
                write!(f, "You do not have permission to do that.")
            }
            FlowError::PositionOccupied { position, holder } => {
                write!(f, "{position} is already taken by {}.", holder.mention())
            }
            FlowError::PositionAlreadyEmpty { position } => {
                write!(f, "{position} is already empty.")
            }
            FlowError::NoSubjectsAvailable => {
                write!(f, "There are no players on the roster yet.")
            }
        }
    }
}

impl std::error::Error for FlowError {}

/// Routes inbound events to the roster and the session machinery.
pub struct Dispatcher {
    gateway: Arc<dyn ChatGateway>,
    ratings: Arc<dyn RatingStore>,
    roster: RosterManager,
    sessions: SessionStore,
    inbound_tx: mpsc::UnboundedSender<Inbound>,
    form_seqs: Arc<AtomicU64>,
    comment_wait: Duration,
}

impl Dispatcher {
    pub fn new(
        gateway: Arc<dyn ChatGateway>,
        ratings: Arc<dyn RatingStore>,
        inbound_tx: mpsc::UnboundedSender<Inbound>,
        comment_wait: Duration,
    ) -> Self {
        Self {
            gateway,
            ratings,
            roster: RosterManager::new(),
            sessions: SessionStore::new(),
            inbound_tx,
            form_seqs: Arc::new(AtomicU64::new(0)),
            comment_wait,
        }
    }

    pub async fn handle(&self, inbound: Inbound) {
        match inbound {
            Inbound::Platform(PlatformEvent::MessageCreate(message)) => {
                self.handle_message(message).await
            }
            Inbound::Platform(PlatformEvent::InteractionCreate(interaction)) => {
                self.handle_interaction(interaction).await
            }
            Inbound::CommentTimer {
                guild,
                rater,
                channel,
                form_seq,
            } => {
                let key = SessionKey {
                    guild: guild.clone(),
                    rater: rater.clone(),
                };
                let ctx = self.context(guild, rater, channel, None);
                self.sessions
                    .process_event(
                        &key,
                        SessionEvent::CommentTimedOut {
                            form_seq,
                            now: unix_now(),
                        },
                        &ctx,
                    )
                    .await;
            }
        }
    }

    fn context(
        &self,
        guild: GuildId,
        rater: UserId,
        channel: ChannelId,
        token: Option<InteractionToken>,
    ) -> InterpreterContext {
        InterpreterContext {
            gateway: self.gateway.clone(),
            store: self.ratings.clone(),
            guild,
            rater,
            channel,
            token,
            inbound: self.inbound_tx.clone(),
            form_seqs: self.form_seqs.clone(),
            comment_wait: self.comment_wait,
        }
    }

    async fn handle_message(&self, message: MessageEvent) {
        if message.author_is_bot {
            return;
        }
        if message.content.trim() == RESET_COMMAND {
            self.reset_roster(&message.guild_id, &message.channel_id)
                .await;
            return;
        }
        let key = SessionKey {
            guild: message.guild_id.clone(),
            rater: message.author_id.clone(),
        };
        if !self
            .sessions
            .is_awaiting_comment(&key, &message.channel_id)
            .await
        {
            return;
        }
        let ctx = self.context(
            message.guild_id,
            message.author_id,
            message.channel_id,
            None,
        );
        self.sessions
            .process_event(
                &key,
                SessionEvent::CommentReceived {
                    text: message.content,
                    now: unix_now(),
                },
                &ctx,
            )
            .await;
    }

    /// Wipe the roster and all sessions, then post a fresh roster message
    /// and track it for in-place refreshes.
    async fn reset_roster(&self, guild: &GuildId, channel: &ChannelId) {
        info!(%guild, "resetting roster");
        self.roster.reset(guild).await;
        self.sessions.clear_guild(guild).await;
        let roster = self.roster.snapshot(guild).await;
        match self
            .gateway
            .post_message(channel, render::roster_message(&roster))
            .await
        {
            Ok(message_id) => {
                self.roster
                    .set_roster_message(guild, channel.clone(), message_id)
                    .await;
            }
            Err(e) => warn!(%guild, "failed to post roster message: {e:#}"),
        }
    }

    /// Re-render the tracked roster message after a roster mutation.
    async fn refresh_roster_message(&self, guild: &GuildId) {
        let Some((channel, message)) = self.roster.roster_message(guild).await else {
            return;
        };
        let roster = self.roster.snapshot(guild).await;
        if let Err(e) = self
            .gateway
            .edit_message(&channel, &message, render::roster_message(&roster))
            .await
        {
            warn!(%guild, "failed to refresh roster message: {e:#}");
        }
    }

    async fn reply(&self, token: &InteractionToken, message: OutgoingMessage) {
        if let Err(e) = self.gateway.reply_ephemeral(token, message).await {
            warn!("failed to deliver ephemeral reply: {e:#}");
        }
    }

    async fn handle_interaction(&self, interaction: InteractionEvent) {
        let Some(kind) = InteractionKind::parse(&interaction.custom_id) else {
            warn!(custom_id = %interaction.custom_id, "unrecognized interaction");
            return;
        };
        if let Err(e) = self.route_interaction(kind, &interaction).await {
            self.reply(&interaction.token, OutgoingMessage::text(e.to_string()))
                .await;
        }
    }

    fn selected<'a>(interaction: &'a InteractionEvent) -> Option<&'a str> {
        interaction.values.first().map(String::as_str)
    }

    async fn route_interaction(
        &self,
        kind: InteractionKind,
        interaction: &InteractionEvent,
    ) -> Result<(), FlowError> {
        let guild = &interaction.guild_id;
        let user = &interaction.user_id;
        let token = &interaction.token;
        match kind {
            InteractionKind::PositionSelect => {
                let Some(position) = Self::selected(interaction).and_then(Position::parse)
                else {
                    warn!("position select without a valid value");
                    return Ok(());
                };
                self.roster.claim(guild, user, position).await?;
                self.refresh_roster_message(guild).await;
                self.reply(
                    token,
                    OutgoingMessage::text(format!(
                        "You now hold {position}. Pick a play style from the roster message."
                    )),
                )
                .await;
            }
            InteractionKind::StyleSelect => {
                let Some(tier) = Self::selected(interaction).and_then(StyleTier::parse) else {
                    warn!("style select without a valid value");
                    return Ok(());
                };
                let roster = self.roster.snapshot(guild).await;
                if roster.position_of(user).is_none() {
                    self.reply(token, OutgoingMessage::text("Claim a position first."))
                        .await;
                    return Ok(());
                }
                self.roster.set_style(guild, user, tier).await;
                self.refresh_roster_message(guild).await;
                self.reply(token, render::character_menu(tier)).await;
            }
            InteractionKind::CharacterSelect(tier) => {
                let Some(character) = Self::selected(interaction) else {
                    warn!("character select without a value");
                    return Ok(());
                };
                if !tier.characters().contains(&character) {
                    warn!(%tier, character, "character not in tier");
                    return Ok(());
                }
                self.roster.set_name(guild, user, character).await;
                self.refresh_roster_message(guild).await;
                self.reply(
                    token,
                    OutgoingMessage::text(format!("Locked in {character}.")),
                )
                .await;
            }
            InteractionKind::LeavePosition => {
                let left = self.roster.leave(guild, user).await;
                let text = if left {
                    self.refresh_roster_message(guild).await;
                    "You left the roster."
                } else {
                    "You do not hold a position."
                };
                self.reply(token, OutgoingMessage::text(text)).await;
            }
            InteractionKind::RemovePlayer => {
                if !may_remove_players(&interaction.permissions) {
                    return Err(FlowError::PermissionDenied);
                }
                let roster = self.roster.snapshot(guild).await;
                if roster.members().is_empty() {
                    return Err(FlowError::NoSubjectsAvailable);
                }
                self.reply(token, render::remove_menu(&roster)).await;
            }
            InteractionKind::RemoveSelect => {
                if !may_remove_players(&interaction.permissions) {
                    return Err(FlowError::PermissionDenied);
                }
                let Some(position) = Self::selected(interaction).and_then(Position::parse)
                else {
                    warn!("remove select without a valid value");
                    return Ok(());
                };
                let removed = self.roster.remove(guild, position).await?;
                self.refresh_roster_message(guild).await;
                self.reply(
                    token,
                    OutgoingMessage::text(format!(
                        "Removed {} from {position}.",
                        removed.mention()
                    )),
                )
                .await;
            }
            InteractionKind::MainRateOrView => {
                let roster = self.roster.snapshot(guild).await;
                if roster.members().is_empty() {
                    return Err(FlowError::NoSubjectsAvailable);
                }
                self.reply(token, render::subject_menu(&roster, user)).await;
            }
            InteractionKind::ChooseSubject => {
                let Some(subject) = Self::selected(interaction) else {
                    warn!("subject select without a value");
                    return Ok(());
                };
                self.process_session_event(
                    interaction,
                    SessionEvent::SubjectSelected {
                        subject: UserId::from(subject),
                        rater: user.clone(),
                        may_rate: may_rate_others(&interaction.permissions),
                    },
                )
                .await;
            }
            InteractionKind::ChooseView | InteractionKind::ChooseRate => {
                let action = if kind == InteractionKind::ChooseView {
                    SubjectAction::View
                } else {
                    SubjectAction::Rate
                };
                self.process_session_event(
                    interaction,
                    SessionEvent::ActionSelected {
                        action,
                        rater: user.clone(),
                        channel: interaction.channel_id.clone(),
                        may_rate: may_rate_others(&interaction.permissions),
                    },
                )
                .await;
            }
            InteractionKind::Score(field) => {
                let Some(value) = Self::selected(interaction).and_then(|v| v.parse::<u8>().ok())
                else {
                    warn!("score select without a numeric value");
                    return Ok(());
                };
                self.process_session_event(
                    interaction,
                    SessionEvent::ScoreEntered { field, value },
                )
                .await;
            }
        }
        Ok(())
    }

    async fn process_session_event(&self, interaction: &InteractionEvent, event: SessionEvent) {
        let key = SessionKey {
            guild: interaction.guild_id.clone(),
            rater: interaction.user_id.clone(),
        };
        let ctx = self.context(
            interaction.guild_id.clone(),
            interaction.user_id.clone(),
            interaction.channel_id.clone(),
            Some(interaction.token.clone()),
        );
        self.sessions.process_event(&key, event, &ctx).await;
    }
}

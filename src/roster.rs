//! Per-community team roster: five positions, each held by at most one
//! player, with an optional play style and display name per occupant.

use crate::ids::{ChannelId, GuildId, MessageId, UserId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

/// The five roster positions, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Position {
    Cf,
    Lw,
    Rw,
    Cm,
    Gk,
}

impl Position {
    pub const ALL: [Position; 5] = [
        Position::Cf,
        Position::Lw,
        Position::Rw,
        Position::Cm,
        Position::Gk,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Position::Cf => "CF",
            Position::Lw => "LW",
            Position::Rw => "RW",
            Position::Cm => "CM",
            Position::Gk => "GK",
        }
    }

    pub fn parse(s: &str) -> Option<Position> {
        match s.to_ascii_uppercase().as_str() {
            "CF" => Some(Position::Cf),
            "LW" => Some(Position::Lw),
            "RW" => Some(Position::Rw),
            "CM" => Some(Position::Cm),
            "GK" => Some(Position::Gk),
            _ => None,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Play style rarity tiers, lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StyleTier {
    Rare,
    Epic,
    Legendary,
    Mythic,
    WorldClass,
    Generational,
    Master,
}

impl StyleTier {
    pub const ALL: [StyleTier; 7] = [
        StyleTier::Rare,
        StyleTier::Epic,
        StyleTier::Legendary,
        StyleTier::Mythic,
        StyleTier::WorldClass,
        StyleTier::Generational,
        StyleTier::Master,
    ];

    /// Lowercase key used in interaction component identifiers.
    pub fn key(&self) -> &'static str {
        match self {
            StyleTier::Rare => "rare",
            StyleTier::Epic => "epic",
            StyleTier::Legendary => "legendary",
            StyleTier::Mythic => "mythic",
            StyleTier::WorldClass => "world_class",
            StyleTier::Generational => "generational",
            StyleTier::Master => "master",
        }
    }

    /// Uppercase label shown to users, e.g. `WORLD_CLASS`.
    pub fn label(&self) -> String {
        self.key().to_ascii_uppercase()
    }

    pub fn parse(s: &str) -> Option<StyleTier> {
        match s.to_ascii_lowercase().as_str() {
            "rare" => Some(StyleTier::Rare),
            "epic" => Some(StyleTier::Epic),
            "legendary" => Some(StyleTier::Legendary),
            "mythic" => Some(StyleTier::Mythic),
            "world_class" => Some(StyleTier::WorldClass),
            "generational" => Some(StyleTier::Generational),
            "master" => Some(StyleTier::Master),
            _ => None,
        }
    }

    /// The selectable characters within this tier.
    pub fn characters(&self) -> &'static [&'static str] {
        match self {
            StyleTier::Rare => &["Isagi", "Igaguri", "Hiori", "Chigiri"],
            StyleTier::Epic => &["Kurona", "Gagamaru", "Bachira"],
            StyleTier::Legendary => &["Otoya", "Nagi", "Karasu"],
            StyleTier::Mythic => &[
                "Shidou", "Yukimiya", "NEL Bachira", "King", "NEL Reo", "Aiku",
                "Kunigami",
            ],
            StyleTier::WorldClass => &["Charles", "NEL Isagi", "NEL Nagi", "NEL Rin"],
            StyleTier::Generational => &["Sae", "Bunny", "Kaiser", "Don Lorenzo"],
            StyleTier::Master => &["Lavinho", "Loki"],
        }
    }
}

impl fmt::Display for StyleTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterError {
    /// The position is already held by another player.
    PositionOccupied { position: Position, holder: UserId },
    /// An empty position cannot be vacated.
    PositionAlreadyEmpty { position: Position },
}

impl fmt::Display for RosterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RosterError::PositionOccupied { position, .. } => {
                write!(f, "position {position} is already taken")
            }
            RosterError::PositionAlreadyEmpty { position } => {
                write!(f, "position {position} is already empty")
            }
        }
    }
}

impl std::error::Error for RosterError {}

/// The roster state for a single community.
#[derive(Debug, Clone, Default)]
pub struct GuildRoster {
    positions: HashMap<Position, UserId>,
    styles: HashMap<UserId, StyleTier>,
    names: HashMap<UserId, String>,
    /// The interactive roster message currently being edited in place.
    roster_message: Option<(ChannelId, MessageId)>,
}

impl GuildRoster {
    pub fn holder(&self, position: Position) -> Option<&UserId> {
        self.positions.get(&position)
    }

    pub fn style_of(&self, user: &UserId) -> Option<StyleTier> {
        self.styles.get(user).copied()
    }

    pub fn name_of(&self, user: &UserId) -> Option<&str> {
        self.names.get(user).map(String::as_str)
    }

    /// Members currently holding a position, in position order.
    pub fn members(&self) -> Vec<(Position, UserId)> {
        Position::ALL
            .iter()
            .filter_map(|p| self.positions.get(p).map(|u| (*p, u.clone())))
            .collect()
    }

    pub fn position_of(&self, user: &UserId) -> Option<Position> {
        Position::ALL
            .iter()
            .copied()
            .find(|p| self.positions.get(p) == Some(user))
    }
}

/// In-memory roster state for all communities, guarded by a single lock so
/// that each roster mutation is atomic.
#[derive(Debug, Clone, Default)]
pub struct RosterManager {
    inner: Arc<RwLock<HashMap<GuildId, GuildRoster>>>,
}

impl RosterManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wipe the community's roster entirely, including styles and names.
    pub async fn reset(&self, guild: &GuildId) {
        let mut map = self.inner.write().await;
        map.insert(guild.clone(), GuildRoster::default());
    }

    /// Claim `position` for `user`, vacating any position they already hold.
    ///
    /// A user re-claiming their own current position is a no-op success.
    /// Moving to a new position clears their stored style and name.
    pub async fn claim(
        &self,
        guild: &GuildId,
        user: &UserId,
        position: Position,
    ) -> Result<(), RosterError> {
        let mut map = self.inner.write().await;
        let roster = map.entry(guild.clone()).or_default();
        match roster.positions.get(&position) {
            Some(holder) if holder == user => return Ok(()),
            Some(holder) => {
                return Err(RosterError::PositionOccupied {
                    position,
                    holder: holder.clone(),
                })
            }
            None => {}
        }
        if let Some(previous) = roster.position_of(user) {
            roster.positions.remove(&previous);
        }
        roster.positions.insert(position, user.clone());
        roster.styles.remove(user);
        roster.names.remove(user);
        Ok(())
    }

    pub async fn set_style(&self, guild: &GuildId, user: &UserId, tier: StyleTier) {
        let mut map = self.inner.write().await;
        let roster = map.entry(guild.clone()).or_default();
        roster.styles.insert(user.clone(), tier);
    }

    /// Store a display name, capitalizing its first letter.
    pub async fn set_name(&self, guild: &GuildId, user: &UserId, name: &str) {
        let trimmed = name.trim();
        let mut chars = trimmed.chars();
        let capitalized = match chars.next() {
            Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            None => return,
        };
        let mut map = self.inner.write().await;
        let roster = map.entry(guild.clone()).or_default();
        roster.names.insert(user.clone(), capitalized);
    }

    /// Remove the user from whatever position they hold. Returns whether they
    /// held one. Their style and name are cleared either way.
    pub async fn leave(&self, guild: &GuildId, user: &UserId) -> bool {
        let mut map = self.inner.write().await;
        let roster = map.entry(guild.clone()).or_default();
        roster.styles.remove(user);
        roster.names.remove(user);
        match roster.position_of(user) {
            Some(position) => {
                roster.positions.remove(&position);
                true
            }
            None => false,
        }
    }

    /// Vacate `position`, returning the user who held it.
    pub async fn remove(
        &self,
        guild: &GuildId,
        position: Position,
    ) -> Result<UserId, RosterError> {
        let mut map = self.inner.write().await;
        let roster = map.entry(guild.clone()).or_default();
        match roster.positions.remove(&position) {
            Some(user) => {
                roster.styles.remove(&user);
                roster.names.remove(&user);
                Ok(user)
            }
            None => Err(RosterError::PositionAlreadyEmpty { position }),
        }
    }

    /// A point-in-time copy of the community's roster.
    pub async fn snapshot(&self, guild: &GuildId) -> GuildRoster {
        let map = self.inner.read().await;
        map.get(guild).cloned().unwrap_or_default()
    }

    pub async fn set_roster_message(
        &self,
        guild: &GuildId,
        channel: ChannelId,
        message: MessageId,
    ) {
        let mut map = self.inner.write().await;
        let roster = map.entry(guild.clone()).or_default();
        roster.roster_message = Some((channel, message));
    }

    pub async fn roster_message(&self, guild: &GuildId) -> Option<(ChannelId, MessageId)> {
        let map = self.inner.read().await;
        map.get(guild).and_then(|r| r.roster_message.clone())
    }
}

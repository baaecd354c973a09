//! Out-of-band event records and per-hit damage records.

use serde::Serialize;

use crate::{ActorId, ChannelId, FVector, WorldSeconds};

/// Framing metadata shared by every decoded event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EventInfo {
    pub id: String,
    pub group: String,
    pub metadata: String,
    /// Milliseconds since recording start.
    pub start_time: u32,
    pub end_time: u32,
    pub size_in_bytes: i32,
}

/// Who took part in an elimination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PlayerIdentity {
    Bot,
    /// Display name or account id carried inline as text.
    Named(String),
    /// Raw identifier bytes, hex-encoded.
    Guid(String),
}

impl PlayerIdentity {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Bot => "Bot",
            Self::Named(name) => name,
            Self::Guid(guid) => guid,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerElimination {
    pub info: EventInfo,
    pub eliminated: PlayerIdentity,
    pub eliminator: PlayerIdentity,
    pub gun_type: u8,
    pub knocked: bool,
}

impl PlayerElimination {
    /// Event start time rendered as `MM:SS`.
    pub fn time(&self) -> String {
        format_timestamp(self.info.start_time)
    }

    pub fn is_self_elimination(&self) -> bool {
        self.eliminated == self.eliminator
    }
}

/// End-of-match statistics for the recording player.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MatchStats {
    pub info: EventInfo,
    pub unknown: u32,
    pub accuracy: f32,
    pub assists: u32,
    pub eliminations: u32,
    pub weapon_damage: u32,
    pub other_damage: u32,
    pub revives: u32,
    pub damage_taken: u32,
    pub damage_to_structures: u32,
    pub materials_gathered: u32,
    pub materials_used: u32,
    pub total_traveled: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TeamStats {
    pub info: EventInfo,
    pub unknown: u32,
    pub position: u32,
    pub total_players: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EncryptionKey {
    pub info: EventInfo,
    /// Upper-case hex rendering of the raw key bytes.
    pub key: String,
}

/// One successfully decoded event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum EventRecord {
    Elimination(PlayerElimination),
    Stats(MatchStats),
    TeamStats(TeamStats),
    EncryptionKey(EncryptionKey),
}

impl EventRecord {
    pub fn info(&self) -> &EventInfo {
        match self {
            Self::Elimination(e) => &e.info,
            Self::Stats(s) => &s.info,
            Self::TeamStats(t) => &t.info,
            Self::EncryptionKey(k) => &k.info,
        }
    }
}

/// One batched damage cue from a pawn whose owner was resolved.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DamageEvent {
    pub world_time: Option<WorldSeconds>,
    /// State channel of the dealing player.
    pub player_channel: ChannelId,
    pub player_id: Option<i32>,
    pub hit_actor: Option<ActorId>,
    pub location: Option<FVector>,
    pub magnitude: Option<f32>,
    pub is_fatal: bool,
    pub is_critical: bool,
    pub is_shield: bool,
    pub is_shield_destroyed: bool,
}

/// Render a millisecond offset as `MM:SS`. Minutes wrap at the hour.
pub fn format_timestamp(ms: u32) -> String {
    let secs = ms / 1000;
    format!("{:02}:{:02}", (secs / 60) % 60, secs % 60)
}

//! Stormline Session Model
//!
//! Plain data shared by every layer of the workspace: transport identifiers,
//! decoded field values, and the assembled session record that is the only
//! output artifact of a parse.
//!
//! # Constraints
//!
//! This crate MUST NOT perform I/O or decoding. Every output type derives
//! `Serialize` so that an external exporter can render it; formatting is not
//! done here.

#![deny(unsafe_code)]

mod events;
mod player;
mod world;

use std::collections::BTreeMap;

use serde::Serialize;

pub use events::{
    DamageEvent, EncryptionKey, EventInfo, EventRecord, MatchStats, PlayerElimination,
    PlayerIdentity, TeamStats, format_timestamp,
};
pub use player::{InventoryItem, InventoryRecord, KillFeedEntry, PlayerRecord, TeamRecord, WeaponRecord};
pub use world::{
    BattleBusFlightPath, BuildMaterial, BuildPiece, GameData, Llama, MapData, Milestone,
    RebootVan, SafeZone, SupplyDrop,
};

// ============================================================================
// Identifiers
// ============================================================================

/// Transport channel index. Ephemeral: channels are opened and closed by the
/// replication framework and indices are reused over a session.
pub type ChannelId = u32;

/// Replicated actor identity (network GUID value). Independent of channel
/// lifetime.
pub type ActorId = u32;

/// Replicated world time in seconds, as carried by game-state updates.
pub type WorldSeconds = f32;

// ============================================================================
// Vector
// ============================================================================

/// Three-component vector as replicated on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct FVector {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl FVector {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

// ============================================================================
// Decoded Field Values
// ============================================================================

/// A single decoded property value delivered by the replication framework.
///
/// Values the assembler does not interpret (cosmetics) are stored as-is.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Float(f32),
    Text(String),
    Vector(FVector),
    Actor(ActorId),
    List(Vec<FieldValue>),
    /// Nested struct property, fields in arrival order.
    Struct(Vec<(String, FieldValue)>),
}

impl FieldValue {
    /// Short type name used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Vector(_) => "vector",
            Self::Actor(_) => "actor",
            Self::List(_) => "list",
            Self::Struct(_) => "struct",
        }
    }
}

/// Opaque cosmetic passthrough data, keyed by the field name it arrived under.
pub type Cosmetics = BTreeMap<String, FieldValue>;

// ============================================================================
// Session Record
// ============================================================================

/// The fully assembled record for one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionRecord {
    /// Branch string from the replay header.
    pub branch: String,
    pub major: Option<u32>,
    pub minor: Option<u32>,
    pub game: GameData,
    pub map: MapData,
    /// Players in materialization order.
    pub players: Vec<PlayerRecord>,
    /// Teams ordered by team index.
    pub teams: Vec<TeamRecord>,
    pub kill_feed: Vec<KillFeedEntry>,
    pub damage: Vec<DamageEvent>,
    pub eliminations: Vec<PlayerElimination>,
    pub stats: Option<MatchStats>,
    pub team_stats: Option<TeamStats>,
}

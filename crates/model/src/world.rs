//! Match-wide state: game settings, map entities and safe zones.

use serde::Serialize;

use crate::{ChannelId, FVector, WorldSeconds};

// ============================================================================
// Milestones
// ============================================================================

/// A boolean flag that only ever goes false to true, remembering when.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Milestone {
    pub reached: bool,
    /// World time of the first true transition, if known at that moment.
    pub at: Option<WorldSeconds>,
}

impl Milestone {
    /// Flip the flag. Returns `true` only on the first transition; later
    /// calls leave the recorded time untouched.
    pub fn mark(&mut self, now: Option<WorldSeconds>) -> bool {
        if self.reached {
            return false;
        }
        self.reached = true;
        self.at = now;
        true
    }
}

// ============================================================================
// World Entities
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SupplyDrop {
    pub channel: ChannelId,
    pub location: Option<FVector>,
    pub landing_location: Option<FVector>,
    pub looted: Milestone,
    pub balloon_popped: Milestone,
    pub spawned_pickups: Milestone,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Llama {
    pub channel: ChannelId,
    pub location: Option<FVector>,
    pub final_destination: Option<FVector>,
    pub looted: Milestone,
    pub spawned_pickups: Milestone,
}

/// Reboot van, keyed by its spawn-machine handle rather than its channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RebootVan {
    pub handle: i32,
    pub location: Option<FVector>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SafeZone {
    pub last_center: Option<FVector>,
    pub next_center: Option<FVector>,
    pub last_radius: Option<f32>,
    pub next_radius: Option<f32>,
    pub shrink_start_time: Option<f32>,
    pub shrink_finish_time: Option<f32>,
}

/// One team's battle bus route.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BattleBusFlightPath {
    pub flight_start_location: Option<FVector>,
    pub flight_start_rotation: Option<FVector>,
    pub flight_speed: Option<f32>,
    pub time_till_flight_end: Option<f32>,
    pub time_till_drop_start: Option<f32>,
    pub time_till_drop_end: Option<f32>,
    /// Default bus skin of the game state that carried the routes.
    pub skin: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BuildMaterial {
    Wood,
    Stone,
    Metal,
}

/// A player-placed wall. Only collected by the most verbose parse mode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildPiece {
    pub channel: ChannelId,
    pub material: BuildMaterial,
    pub location: Option<FVector>,
    pub health: Option<f32>,
    pub max_health: Option<f32>,
    pub team_index: Option<i32>,
    pub destroyed: bool,
}

// ============================================================================
// Aggregates
// ============================================================================

/// Match settings. First write wins except where noted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GameData {
    pub game_session_id: Option<String>,
    pub utc_time_started_match: Option<i64>,
    pub map_info: Option<String>,
    pub current_playlist: Option<String>,
    /// Appended in arrival order.
    pub active_gameplay_modifiers: Vec<String>,
    pub additional_playlist_levels: Option<Vec<String>>,
    pub is_large_team_game: Option<bool>,
    pub tournament_round: Option<i32>,
    pub max_players: Option<i32>,
    /// Falls back to the number of active teams.
    pub team_size: Option<i32>,
    /// Highest bot count seen over the session.
    pub total_bots: Option<i32>,
    pub total_player_structures: Option<i32>,
    pub aircraft_start_time: Option<f32>,
    pub safe_zones_start_time: Option<f32>,
    pub winning_team: Option<i32>,
    pub winning_player_ids: Option<Vec<i32>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MapData {
    pub safe_zones: Vec<SafeZone>,
    pub supply_drops: Vec<SupplyDrop>,
    pub llamas: Vec<Llama>,
    pub reboot_vans: Vec<RebootVan>,
    pub build_pieces: Vec<BuildPiece>,
    pub battle_bus_flight_paths: Option<Vec<BattleBusFlightPath>>,
    pub grid_count_x: Option<i32>,
    pub grid_count_y: Option<i32>,
    pub world_grid_start: Option<FVector>,
    pub world_grid_end: Option<FVector>,
    pub world_grid_spacing: Option<FVector>,
    pub world_grid_total_size: Option<FVector>,
}

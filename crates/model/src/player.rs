//! Player, team, kill-feed and equipment records.

use serde::Serialize;

use crate::{ActorId, ChannelId, Cosmetics, FVector, WorldSeconds};

/// Assembled state for one player, keyed by the player's state channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlayerRecord {
    /// State channel this record was materialized on.
    pub channel: ChannelId,
    pub id: Option<i32>,
    pub epic_id: Option<String>,
    pub bot_id: Option<String>,
    pub is_bot: Option<bool>,
    pub streamer_mode_name: Option<String>,
    pub level: Option<i32>,
    pub platform: Option<String>,
    pub is_game_session_owner: Option<bool>,
    pub has_finished_loading: Option<bool>,
    pub has_started_playing: Option<bool>,
    pub has_thanked_bus_driver: Option<bool>,
    pub is_using_streamer_mode: Option<bool>,
    pub is_using_anonymous_mode: Option<bool>,
    pub has_ever_skydived_from_bus: Option<bool>,
    pub has_ever_skydived_from_bus_and_landed: Option<bool>,
    pub disconnected: Option<bool>,
    /// Only the recording client replicates a non-zero ping.
    pub is_replay_owner: bool,
    pub is_party_leader: bool,
    pub team_index: Option<i32>,
    pub placement: Option<i32>,
    pub kills: Option<i32>,
    pub team_kills: Option<i32>,
    /// Monotonically non-decreasing.
    pub reboot_counter: u32,
    pub death_cause: Option<i32>,
    pub death_circumstance: Option<i32>,
    pub death_location: Option<FVector>,
    pub death_tags: Option<Vec<String>>,
    pub death_time: Option<WorldSeconds>,
    /// Actor of the weapon currently held by the player's pawn.
    pub current_weapon: Option<ActorId>,
    pub inventory_id: Option<ChannelId>,
    pub health: Option<f32>,
    pub shield: Option<f32>,
    pub cosmetics: Cosmetics,
}

impl PlayerRecord {
    pub fn new(channel: ChannelId) -> Self {
        Self {
            channel,
            ..Default::default()
        }
    }

    /// Bots are named by their bot id, humans by their account id.
    pub fn player_name(&self) -> Option<&str> {
        if self.is_bot == Some(true) {
            self.bot_id.as_deref()
        } else {
            self.epic_id.as_deref()
        }
    }
}

/// Team aggregate derived from player records.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TeamRecord {
    pub team_index: i32,
    pub player_ids: Vec<i32>,
    /// Parallel to `player_ids`.
    pub player_names: Vec<String>,
    pub placement: Option<i32>,
    pub team_kills: Option<i32>,
    pub party_owner_id: Option<i32>,
}

/// One knock, elimination or revive transition.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KillFeedEntry {
    pub world_time: Option<WorldSeconds>,
    pub player_id: Option<i32>,
    pub player_name: Option<String>,
    pub player_is_bot: bool,
    pub finisher_or_downer: Option<i32>,
    pub finisher_or_downer_name: Option<String>,
    pub finisher_or_downer_is_bot: bool,
    pub is_downed: bool,
    pub is_revived: bool,
    pub distance: Option<f32>,
    pub death_cause: Option<i32>,
    pub death_circumstance: Option<i32>,
    pub death_location: Option<FVector>,
    pub death_tags: Option<Vec<String>>,
}

/// Weapon aggregate, keyed by the weapon actor's channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WeaponRecord {
    pub channel: ChannelId,
    pub weapon_name: Option<String>,
    pub weapon_level: Option<i32>,
    pub ammo_count: Option<i32>,
    pub is_equipping: Option<bool>,
    pub is_reloading: Option<bool>,
    pub last_fire_time: Option<f32>,
    /// Item guid parts.
    pub a: Option<u32>,
    pub b: Option<u32>,
    pub c: Option<u32>,
    pub d: Option<u32>,
}

/// Inventory aggregate, keyed by the inventory actor's channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InventoryRecord {
    pub channel: ChannelId,
    pub replay_pawn: Option<ActorId>,
    pub player_id: Option<i32>,
    pub player_name: Option<String>,
    pub items: Vec<InventoryItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InventoryItem {
    pub count: Option<i32>,
    pub item_definition: Option<String>,
    pub order_index: Option<i32>,
    pub durability: Option<f32>,
    pub level: Option<i32>,
    pub loaded_ammo: Option<i32>,
    pub a: Option<u32>,
    pub b: Option<u32>,
    pub c: Option<u32>,
    pub d: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_name_prefers_bot_id_for_bots() {
        let mut player = PlayerRecord::new(3);
        player.epic_id = Some("epic".to_string());
        player.bot_id = Some("bot".to_string());
        assert_eq!(player.player_name(), Some("epic"));

        player.is_bot = Some(true);
        assert_eq!(player.player_name(), Some("bot"));
    }
}

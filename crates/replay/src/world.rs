//! Match-wide merges: game settings, map entities, safe zones and builds.

use std::hash::Hash;

use hashbrown::HashMap;
use stormline_model::{
    BattleBusFlightPath, BuildMaterial, BuildPiece, ChannelId, Llama, RebootVan, SafeZone, SupplyDrop,
};
use tracing::debug;

use crate::merge::{replace_if_present, set_once};
use crate::{
    BuildPieceUpdate, GameStateUpdate, GameplayModifierUpdate, LlamaUpdate, PlaylistInfoUpdate,
    PoiManagerUpdate, RebootVanUpdate, ReplayAssembler, SafeZoneUpdate, SupplyDropUpdate,
};

/// Record for `key` in `items`, appending a fresh one on first sight.
fn entry_for<'v, K, T>(
    index: &mut HashMap<K, usize>,
    items: &'v mut Vec<T>,
    key: K,
    create: impl FnOnce() -> T,
) -> &'v mut T
where
    K: Eq + Hash,
{
    let slot = *index.entry(key).or_insert_with(|| {
        items.push(create());
        items.len() - 1
    });
    &mut items[slot]
}

impl ReplayAssembler {
    // ------------------------------------------------------------------------
    // Game
    // ------------------------------------------------------------------------

    pub fn update_game_state(&mut self, update: GameStateUpdate) {
        if let Some(now) = update.world_time {
            self.world_time = Some(now);
        }

        let game = &mut self.game;
        set_once(&mut game.game_session_id, update.game_session_id);
        set_once(&mut game.utc_time_started_match, update.utc_time_started_match);
        set_once(&mut game.map_info, update.map_info);
        set_once(&mut game.is_large_team_game, update.is_large_team_game);
        set_once(&mut game.tournament_round, update.tournament_round);
        set_once(&mut game.max_players, update.team_count);
        set_once(&mut game.team_size, update.team_size);
        set_once(&mut game.total_player_structures, update.total_player_structures);
        set_once(&mut game.aircraft_start_time, update.aircraft_start_time);
        set_once(&mut game.safe_zones_start_time, update.safe_zones_start_time);
        set_once(&mut game.winning_team, update.winning_team);
        set_once(&mut game.winning_player_ids, update.winning_player_list);
        set_once(&mut game.additional_playlist_levels, update.additional_playlist_levels);
        set_once(
            &mut game.team_size,
            update
                .active_team_nums
                .and_then(|teams| i32::try_from(teams.len()).ok()),
        );

        let skin = update.default_battle_bus;
        let paths = update.team_flight_paths.map(|paths| {
            paths
                .into_iter()
                .map(|path| BattleBusFlightPath {
                    flight_start_location: path.flight_start_location,
                    flight_start_rotation: path.flight_start_rotation,
                    flight_speed: path.flight_speed,
                    time_till_flight_end: path.time_till_flight_end,
                    time_till_drop_start: path.time_till_drop_start,
                    time_till_drop_end: path.time_till_drop_end,
                    skin: skin.clone(),
                })
                .collect()
        });
        set_once(&mut self.map.battle_bus_flight_paths, paths);

        if let Some(bots) = update.player_bots_left
            && game.total_bots.is_none_or(|seen| bots > seen)
        {
            game.total_bots = Some(bots);
        }
    }

    pub fn update_playlist_info(&mut self, update: PlaylistInfoUpdate) {
        set_once(&mut self.game.current_playlist, update.playlist_name);
    }

    pub fn add_gameplay_modifier(&mut self, update: GameplayModifierUpdate) {
        if let Some(modifier) = update.modifier_def {
            self.game.active_gameplay_modifiers.push(modifier);
        }
    }

    // ------------------------------------------------------------------------
    // Map
    // ------------------------------------------------------------------------

    pub fn update_poi_manager(&mut self, update: PoiManagerUpdate) {
        let map = &mut self.map;
        set_once(&mut map.grid_count_x, update.grid_count_x);
        set_once(&mut map.grid_count_y, update.grid_count_y);
        set_once(&mut map.world_grid_start, update.world_grid_start);
        set_once(&mut map.world_grid_end, update.world_grid_end);
        set_once(&mut map.world_grid_spacing, update.world_grid_spacing);
        set_once(&mut map.world_grid_total_size, update.world_grid_total_size);
    }

    /// Zones without any shrink time are placeholders and are not kept.
    pub fn add_safe_zone(&mut self, update: SafeZoneUpdate) {
        let shrinks = update.shrink_start_time.is_some_and(|t| t > 0.0)
            || update.shrink_finish_time.is_some_and(|t| t > 0.0);
        if !shrinks {
            return;
        }
        self.map.safe_zones.push(SafeZone {
            last_center: update.last_center,
            next_center: update.next_center,
            last_radius: update.last_radius,
            next_radius: update.next_radius,
            shrink_start_time: update.shrink_start_time,
            shrink_finish_time: update.shrink_finish_time,
        });
    }

    pub fn update_supply_drop(&mut self, channel: ChannelId, update: SupplyDropUpdate) {
        let now = self.world_time;
        let drop = entry_for(&mut self.drops, &mut self.map.supply_drops, channel, || {
            SupplyDrop {
                channel,
                ..Default::default()
            }
        });

        set_once(&mut drop.location, update.location);
        replace_if_present(&mut drop.landing_location, update.landing_location);
        if update.opened == Some(true) && drop.looted.mark(now) {
            debug!(channel, "supply drop looted");
        }
        if update.balloon_popped == Some(true) {
            drop.balloon_popped.mark(now);
        }
        if update.has_spawned_pickups == Some(true) {
            drop.spawned_pickups.mark(now);
        }
    }

    pub fn update_llama(&mut self, channel: ChannelId, update: LlamaUpdate) {
        let now = self.world_time;
        let llama = entry_for(&mut self.llamas, &mut self.map.llamas, channel, || Llama {
            channel,
            ..Default::default()
        });

        set_once(&mut llama.location, update.location);
        set_once(&mut llama.final_destination, update.final_destination);
        if update.looted == Some(true) && llama.looted.mark(now) {
            debug!(channel, "llama looted");
        }
        if update.has_spawned_pickups == Some(true) {
            llama.spawned_pickups.mark(now);
        }
    }

    /// Vans are keyed by their spawn-machine handle; the channel is ignored.
    pub fn update_reboot_van(&mut self, _channel: ChannelId, update: RebootVanUpdate) {
        let Some(handle) = update.handle else {
            return;
        };
        let van = entry_for(&mut self.vans, &mut self.map.reboot_vans, handle, || RebootVan {
            handle,
            location: None,
        });
        set_once(&mut van.location, update.location);
    }

    pub fn update_build_piece(
        &mut self,
        channel: ChannelId,
        material: BuildMaterial,
        update: BuildPieceUpdate,
    ) {
        let piece = entry_for(&mut self.builds, &mut self.map.build_pieces, channel, || {
            BuildPiece {
                channel,
                material,
                location: None,
                health: None,
                max_health: None,
                team_index: None,
                destroyed: false,
            }
        });

        set_once(&mut piece.location, update.location);
        set_once(&mut piece.max_health, update.max_health);
        set_once(&mut piece.team_index, update.team_index);
        replace_if_present(&mut piece.health, update.health);
        if update.destroyed == Some(true) {
            piece.destroyed = true;
        }
    }
}

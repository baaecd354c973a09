//! Stormline Replay Assembly
//!
//! Reconstructs one session's entity graph from the replication framework's
//! channel notifications and field groups, delivered in arrival order.
//!
//! # Architecture
//!
//! - `GroupKind` / `decode_group`: typed view of one field group
//! - `ReplayAssembler`: owns every map and record for exactly one session
//! - `aggregate_teams`: derived pass over assembled players
//!
//! # Ordering
//!
//! Delivery is causally unordered: a pawn can be updated before its owning
//! player state exists, and channel ids are reused. Unresolvable pawn updates
//! are queued and replayed once the owner materializes; they are never
//! dropped.

#![deny(unsafe_code)]

mod groups;
mod merge;
mod teams;
mod world;

use hashbrown::{HashMap, HashSet};
use stormline_model::{
    ActorId, ChannelId, DamageEvent, GameData, InventoryItem, InventoryRecord, KillFeedEntry,
    MapData, PlayerRecord, SessionRecord, TeamRecord, WeaponRecord, WorldSeconds,
};
use tracing::debug;

pub use groups::{
    BATCHED_DAMAGE_PATH, BatchedDamageUpdate, BuildPieceUpdate, FieldError, FieldReader,
    FlightPathUpdate,
    GAME_STATE_PATH, GAMEPLAY_MODIFIER_PATH, GameStateUpdate, GameplayModifierUpdate, GroupKind,
    GroupUpdate, HEALTH_SET_PATH, HealthSetUpdate, INVENTORY_PATH, InventoryUpdate, LLAMA_PATH,
    LlamaUpdate, METAL_WALL_PATH, PLAYER_PAWN_PATH, PLAYER_STATE_PATH, PLAYLIST_INFO_PATH,
    POI_MANAGER_PATH, PawnUpdate, PlayerStateUpdate, PlaylistInfoUpdate, PoiManagerUpdate,
    REBOOT_VAN_PATH, RebootVanUpdate, SAFE_ZONE_PATH, STONE_WALL_PATH, SUPPLY_DROP_PATH,
    SafeZoneUpdate, SupplyDropUpdate, WEAPON_PATH_PREFIX, WOOD_WALL_PATH, WeaponUpdate,
    decode_group,
};
pub use merge::{replace_if_present, set_once};
pub use teams::aggregate_teams;

// ============================================================================
// Replay Assembler
// ============================================================================

/// Assembly state for one session.
#[derive(Debug, Default)]
pub struct ReplayAssembler {
    actor_to_channel: HashMap<ActorId, ChannelId>,
    channel_to_actor: HashMap<ChannelId, ActorId>,
    pawn_to_state: HashMap<ChannelId, ChannelId>,
    /// Pawn updates waiting for their owner, keyed by the owner's actor id.
    pending_pawns: HashMap<ActorId, Vec<(ChannelId, PawnUpdate)>>,
    /// Pawn updates that named no owner yet, keyed by pawn channel.
    unowned_pawns: HashMap<ChannelId, Vec<PawnUpdate>>,
    spectators: HashSet<ChannelId>,
    players: HashMap<ChannelId, PlayerRecord>,
    player_order: Vec<ChannelId>,
    weapons: HashMap<ChannelId, WeaponRecord>,
    inventories: HashMap<ChannelId, InventoryRecord>,
    kill_feed: Vec<KillFeedEntry>,
    damage: Vec<DamageEvent>,
    // Indices into the `map` vectors.
    drops: HashMap<ChannelId, usize>,
    llamas: HashMap<ChannelId, usize>,
    vans: HashMap<i32, usize>,
    builds: HashMap<ChannelId, usize>,
    game: GameData,
    map: MapData,
    world_time: Option<WorldSeconds>,
}

impl ReplayAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------------
    // Channel lifecycle
    // ------------------------------------------------------------------------

    /// Bind `channel` to `actor`, evicting whichever stale partner either side
    /// had so the mapping stays one-to-one.
    pub fn on_channel_opened(&mut self, channel: ChannelId, actor: ActorId) {
        if let Some(old_actor) = self.channel_to_actor.insert(channel, actor)
            && old_actor != actor
            && self.actor_to_channel.get(&old_actor) == Some(&channel)
        {
            self.actor_to_channel.remove(&old_actor);
        }
        if let Some(old_channel) = self.actor_to_channel.insert(actor, channel)
            && old_channel != channel
            && self.channel_to_actor.get(&old_channel) == Some(&actor)
        {
            self.channel_to_actor.remove(&old_channel);
        }
    }

    /// Only channel-scoped state is evicted: equipment and owner-less pawn
    /// updates. Identity maps and players survive the close.
    pub fn on_channel_closed(&mut self, channel: ChannelId, actor: ActorId) {
        let weapon = self.weapons.remove(&channel).is_some();
        let inventory = self.inventories.remove(&channel).is_some();
        let held_pawns = self.unowned_pawns.remove(&channel).map_or(0, |held| held.len());
        if weapon || inventory || held_pawns > 0 {
            debug!(channel, actor, weapon, inventory, held_pawns, "evicted channel state");
        }
    }

    pub fn channel_for_actor(&self, actor: ActorId) -> Option<ChannelId> {
        self.actor_to_channel.get(&actor).copied()
    }

    pub fn actor_for_channel(&self, channel: ChannelId) -> Option<ActorId> {
        self.channel_to_actor.get(&channel).copied()
    }

    // ------------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------------

    /// Merge one decoded field group received on `channel`.
    pub fn apply(&mut self, channel: ChannelId, update: GroupUpdate) {
        match update {
            GroupUpdate::PlayerState(u) => self.update_player_state(channel, u),
            GroupUpdate::PlayerPawn(u) => self.update_pawn(channel, u),
            GroupUpdate::Inventory(u) => self.update_inventory(channel, u),
            GroupUpdate::Weapon(u) => self.update_weapon(channel, u),
            GroupUpdate::SupplyDrop(u) => self.update_supply_drop(channel, u),
            GroupUpdate::Llama(u) => self.update_llama(channel, u),
            GroupUpdate::RebootVan(u) => self.update_reboot_van(channel, u),
            GroupUpdate::PoiManager(u) => self.update_poi_manager(u),
            GroupUpdate::GameState(u) => self.update_game_state(u),
            GroupUpdate::PlaylistInfo(u) => self.update_playlist_info(u),
            GroupUpdate::GameplayModifier(u) => self.add_gameplay_modifier(u),
            GroupUpdate::SafeZone(u) => self.add_safe_zone(u),
            GroupUpdate::HealthSet(u) => self.update_health(channel, u),
            GroupUpdate::BatchedDamage(u) => self.add_batched_damage(channel, u),
            GroupUpdate::BuildPiece(material, u) => self.update_build_piece(channel, material, u),
        }
    }

    // ------------------------------------------------------------------------
    // Players
    // ------------------------------------------------------------------------

    pub fn update_player_state(&mut self, channel: ChannelId, update: PlayerStateUpdate) {
        if self.spectators.contains(&channel) {
            return;
        }
        if update.only_spectator == Some(true) {
            self.spectators.insert(channel);
            if self.players.contains_key(&channel) {
                debug!(channel, "spectator flag arrived after the record was created");
            }
            return;
        }

        let is_new = !self.players.contains_key(&channel);
        if is_new {
            self.players.insert(channel, PlayerRecord::new(channel));
            self.player_order.push(channel);
        }
        let world_time = self.world_time;
        if let Some(player) = self.players.get_mut(&channel) {
            merge_player_state(player, &update, world_time);
        }

        if update.is_kill_feed_transition() {
            self.record_kill_feed(channel, &update);
        }

        if is_new {
            self.flush_pending_pawns(channel);
        }
    }

    fn record_kill_feed(&mut self, channel: ChannelId, update: &PlayerStateUpdate) {
        let Some(player) = self.players.get(&channel) else {
            return;
        };
        let finisher = update
            .finisher_or_downer
            .and_then(|actor| self.actor_to_channel.get(&actor))
            .and_then(|finisher_channel| self.players.get(finisher_channel));

        let entry = KillFeedEntry {
            world_time: self.world_time,
            player_id: player.id,
            player_name: player.player_name().map(str::to_string),
            player_is_bot: player.is_bot == Some(true),
            finisher_or_downer: finisher.and_then(|f| f.id),
            finisher_or_downer_name: finisher.and_then(|f| f.player_name()).map(str::to_string),
            finisher_or_downer_is_bot: finisher.is_some_and(|f| f.is_bot == Some(true)),
            is_downed: update.dbno == Some(true),
            is_revived: update.reboot_counter.is_some_and(|counter| counter > 0),
            distance: update.distance,
            death_cause: update.death_cause,
            death_circumstance: update.death_circumstance,
            death_location: update.death_location,
            death_tags: update.death_tags.clone(),
        };
        self.kill_feed.push(entry);
    }

    // ------------------------------------------------------------------------
    // Pawns
    // ------------------------------------------------------------------------

    /// Apply a pawn update to its owner, or hold it until the owner exists.
    pub fn update_pawn(&mut self, channel: ChannelId, update: PawnUpdate) {
        if let Some(&state_channel) = self.pawn_to_state.get(&channel) {
            self.apply_pawn(state_channel, &update);
            return;
        }

        let Some(owner) = update.player_state else {
            debug!(channel, "pawn update without owner held");
            self.unowned_pawns.entry(channel).or_default().push(update);
            return;
        };

        let backlog = self.unowned_pawns.remove(&channel).unwrap_or_default();
        let resolved = self
            .actor_to_channel
            .get(&owner)
            .copied()
            .filter(|state_channel| self.players.contains_key(state_channel));

        match resolved {
            Some(state_channel) => {
                self.pawn_to_state.insert(channel, state_channel);
                for held in &backlog {
                    self.apply_pawn(state_channel, held);
                }
                self.apply_pawn(state_channel, &update);
            }
            None => {
                debug!(channel, owner, "pawn owner unresolved, queueing");
                let queue = self.pending_pawns.entry(owner).or_default();
                queue.extend(backlog.into_iter().map(|held| (channel, held)));
                queue.push((channel, update));
            }
        }
    }

    fn flush_pending_pawns(&mut self, state_channel: ChannelId) {
        let Some(&actor) = self.channel_to_actor.get(&state_channel) else {
            return;
        };
        let Some(queued) = self.pending_pawns.remove(&actor) else {
            return;
        };
        debug!(state_channel, actor, count = queued.len(), "flushing queued pawn updates");

        let mut pawn_channels = Vec::new();
        for (pawn_channel, update) in queued {
            self.pawn_to_state.insert(pawn_channel, state_channel);
            self.apply_pawn(state_channel, &update);
            if !pawn_channels.contains(&pawn_channel) {
                pawn_channels.push(pawn_channel);
            }
        }

        // Owner-less updates that arrived after the queued ones.
        for pawn_channel in pawn_channels {
            for held in self.unowned_pawns.remove(&pawn_channel).unwrap_or_default() {
                self.apply_pawn(state_channel, &held);
            }
        }
    }

    fn apply_pawn(&mut self, state_channel: ChannelId, update: &PawnUpdate) {
        let Some(player) = self.players.get_mut(&state_channel) else {
            return;
        };
        for (name, value) in &update.cosmetics {
            player
                .cosmetics
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }
        replace_if_present(&mut player.current_weapon, update.current_weapon);
    }

    /// Player record owning the pawn on `pawn_channel`, if resolved.
    fn player_for_pawn_mut(&mut self, pawn_channel: ChannelId) -> Option<&mut PlayerRecord> {
        let state_channel = self.pawn_to_state.get(&pawn_channel)?;
        self.players.get_mut(state_channel)
    }

    /// Health set attributes replicate on the pawn's channel.
    pub fn update_health(&mut self, pawn_channel: ChannelId, update: HealthSetUpdate) {
        let Some(player) = self.player_for_pawn_mut(pawn_channel) else {
            debug!(pawn_channel, "health update for unresolved pawn");
            return;
        };
        replace_if_present(&mut player.health, update.health);
        replace_if_present(&mut player.shield, update.shield);
    }

    pub fn add_batched_damage(&mut self, pawn_channel: ChannelId, update: BatchedDamageUpdate) {
        let world_time = self.world_time;
        let Some(player) = self.player_for_pawn_mut(pawn_channel) else {
            debug!(pawn_channel, "damage cue from unresolved pawn");
            return;
        };
        let event = DamageEvent {
            world_time,
            player_channel: player.channel,
            player_id: player.id,
            hit_actor: update.hit_actor,
            location: update.location,
            magnitude: update.magnitude,
            is_fatal: update.is_fatal == Some(true),
            is_critical: update.is_critical == Some(true),
            is_shield: update.is_shield == Some(true),
            is_shield_destroyed: update.is_shield_destroyed == Some(true),
        };
        self.damage.push(event);
    }

    // ------------------------------------------------------------------------
    // Equipment
    // ------------------------------------------------------------------------

    pub fn update_weapon(&mut self, channel: ChannelId, update: WeaponUpdate) {
        let weapon = self.weapons.entry(channel).or_insert_with(|| WeaponRecord {
            channel,
            ..Default::default()
        });

        set_once(&mut weapon.weapon_name, update.weapon_name);
        set_once(&mut weapon.weapon_level, update.weapon_level);
        set_once(&mut weapon.a, update.a);
        set_once(&mut weapon.b, update.b);
        set_once(&mut weapon.c, update.c);
        set_once(&mut weapon.d, update.d);

        replace_if_present(&mut weapon.ammo_count, update.ammo_count);
        replace_if_present(&mut weapon.is_equipping, update.is_equipping);
        replace_if_present(&mut weapon.is_reloading, update.is_reloading);
        replace_if_present(&mut weapon.last_fire_time, update.last_fire_time);
    }

    /// Inventories are only tracked once they name their replay pawn.
    pub fn update_inventory(&mut self, channel: ChannelId, update: InventoryUpdate) {
        if !self.inventories.contains_key(&channel) {
            let Some(replay_pawn) = update.replay_pawn else {
                debug!(channel, "inventory update before its replay pawn");
                return;
            };
            self.inventories.insert(
                channel,
                InventoryRecord {
                    channel,
                    replay_pawn: Some(replay_pawn),
                    ..Default::default()
                },
            );
        }
        let Some(inventory) = self.inventories.get_mut(&channel) else {
            return;
        };
        if let Some(pawn) = update.replay_pawn.filter(|&pawn| pawn > 0) {
            inventory.replay_pawn = Some(pawn);
        }

        let unlinked = inventory.player_id.is_none() && inventory.player_name.is_none();
        let owner = inventory
            .replay_pawn
            .filter(|_| unlinked)
            .and_then(|pawn| self.actor_to_channel.get(&pawn))
            .and_then(|pawn_channel| self.pawn_to_state.get(pawn_channel))
            .and_then(|state_channel| self.players.get_mut(state_channel));
        if let Some(player) = owner {
            player.inventory_id = Some(channel);
            inventory.player_id = player.id;
            inventory.player_name = player.player_name().map(str::to_string);
        }

        if update.a.is_none() {
            return;
        }
        inventory.items.push(InventoryItem {
            count: update.count,
            item_definition: update.item_definition,
            order_index: update.order_index,
            durability: update.durability,
            level: update.level,
            loaded_ammo: update.loaded_ammo,
            a: update.a,
            b: update.b,
            c: update.c,
            d: update.d,
        });
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn player(&self, channel: ChannelId) -> Option<&PlayerRecord> {
        self.players.get(&channel)
    }

    /// Players in materialization order.
    pub fn players(&self) -> impl Iterator<Item = &PlayerRecord> {
        self.player_order
            .iter()
            .filter_map(|channel| self.players.get(channel))
    }

    pub fn weapon(&self, channel: ChannelId) -> Option<&WeaponRecord> {
        self.weapons.get(&channel)
    }

    pub fn inventory(&self, channel: ChannelId) -> Option<&InventoryRecord> {
        self.inventories.get(&channel)
    }

    pub fn kill_feed(&self) -> &[KillFeedEntry] {
        &self.kill_feed
    }

    pub fn damage(&self) -> &[DamageEvent] {
        &self.damage
    }

    pub fn game(&self) -> &GameData {
        &self.game
    }

    pub fn map(&self) -> &MapData {
        &self.map
    }

    pub fn world_time(&self) -> Option<WorldSeconds> {
        self.world_time
    }

    /// Pawn updates still waiting for an owner, queued or owner-less.
    pub fn pending_pawn_updates(&self) -> usize {
        self.pending_pawns.values().map(Vec::len).sum::<usize>()
            + self.unowned_pawns.values().map(Vec::len).sum::<usize>()
    }

    pub fn teams(&self) -> Vec<TeamRecord> {
        aggregate_teams(self.players())
    }

    /// Consume the assembler into a session record.
    ///
    /// Header and event fields are left at their defaults for the caller to
    /// fill. Pawn updates still pending are discarded here.
    pub fn finalize(mut self) -> SessionRecord {
        let pending = self.pending_pawn_updates();
        if pending > 0 {
            debug!(pending, "pawn updates never resolved");
        }

        let teams = self.teams();
        let players = self
            .player_order
            .iter()
            .filter_map(|channel| self.players.remove(channel))
            .collect();

        SessionRecord {
            game: self.game,
            map: self.map,
            players,
            teams,
            kill_feed: self.kill_feed,
            damage: self.damage,
            ..Default::default()
        }
    }
}

fn merge_player_state(
    player: &mut PlayerRecord,
    update: &PlayerStateUpdate,
    world_time: Option<WorldSeconds>,
) {
    set_once(&mut player.id, update.player_id);
    set_once(&mut player.epic_id, update.unique_id.clone());
    set_once(&mut player.bot_id, update.bot_unique_id.clone());
    set_once(&mut player.is_bot, update.is_bot);
    set_once(&mut player.is_game_session_owner, update.is_game_session_owner);
    set_once(&mut player.streamer_mode_name, update.streamer_mode_name.clone());
    set_once(&mut player.level, update.level);
    set_once(&mut player.platform, update.platform.clone());
    set_once(&mut player.has_finished_loading, update.has_finished_loading);
    set_once(&mut player.has_started_playing, update.has_started_playing);
    set_once(&mut player.has_thanked_bus_driver, update.thanked_bus_driver);
    set_once(&mut player.is_using_anonymous_mode, update.using_anonymous_mode);
    set_once(&mut player.is_using_streamer_mode, update.using_streamer_mode);
    set_once(&mut player.has_ever_skydived_from_bus, update.has_ever_skydived_from_bus);
    set_once(
        &mut player.has_ever_skydived_from_bus_and_landed,
        update.has_ever_skydived_from_bus_and_landed,
    );
    set_once(&mut player.disconnected, update.is_disconnected);

    if let Some(counter) = update.reboot_counter
        && counter > player.reboot_counter
    {
        player.reboot_counter = counter;
    }
    // Only the recording client sees a replicated ping.
    if update.ping.is_some_and(|ping| ping > 0) {
        player.is_replay_owner = true;
    }
    if let Some(team) = update.team_index.filter(|&team| team > 0) {
        player.team_index = Some(team);
    }
    if let Some(leader) = update.is_party_leader {
        player.is_party_leader = leader;
    }

    replace_if_present(&mut player.placement, update.place);
    replace_if_present(&mut player.kills, update.kill_score);
    replace_if_present(&mut player.team_kills, update.team_kill_score);

    set_once(&mut player.death_cause, update.death_cause);
    set_once(&mut player.death_location, update.death_location);
    set_once(&mut player.death_circumstance, update.death_circumstance);
    set_once(&mut player.death_tags, update.death_tags.clone());
    if update.death_tags.is_some() {
        player.death_time = world_time;
    }

    for (name, value) in &update.cosmetics {
        player
            .cosmetics
            .entry(name.clone())
            .or_insert_with(|| value.clone());
    }
}

// ============================================================================
// Tests
// ============================================================================

//! Field-group kinds and their typed decoders.
//!
//! Every replicated type path the assembler understands resolves to exactly one
//! [`GroupKind`]. Each kind has one update struct whose fields are all
//! optional: a bundle only carries the properties that changed.

use stormline_model::{ActorId, BuildMaterial, FVector, FieldValue};
use stormline_wire::NetFieldGroup;
use thiserror::Error;

// ============================================================================
// Type Paths
// ============================================================================

pub const PLAYER_STATE_PATH: &str = "/Game/Athena/Athena_PlayerState.Athena_PlayerState_C";
pub const PLAYER_PAWN_PATH: &str = "/Game/Athena/PlayerPawn_Athena.PlayerPawn_Athena_C";
pub const GAME_STATE_PATH: &str = "/Game/Athena/Athena_GameState.Athena_GameState_C";
pub const INVENTORY_PATH: &str = "/Script/FortniteGame.FortInventory";
pub const GAMEPLAY_MODIFIER_PATH: &str = "/Script/FortniteGame.ActiveGameplayModifier";
pub const SAFE_ZONE_PATH: &str = "/Game/Athena/SafeZone/SafeZoneIndicator.SafeZoneIndicator_C";
pub const LLAMA_PATH: &str =
    "/Game/Athena/SupplyDrops/Llama/AthenaSupplyDrop_Llama.AthenaSupplyDrop_Llama_C";
pub const SUPPLY_DROP_PATH: &str = "/Game/Athena/SupplyDrops/AthenaSupplyDrop.AthenaSupplyDrop_C";
pub const REBOOT_VAN_PATH: &str = "/Script/FortniteGame.SpawnMachineRepData";
pub const POI_MANAGER_PATH: &str = "/Script/FortniteGame.FortPoiManager";
pub const HEALTH_SET_PATH: &str = "/Script/FortniteGame.FortRegenHealthSet";
pub const BATCHED_DAMAGE_PATH: &str =
    "/Script/FortniteGame.FortPawn:NetMulticast_Athena_BatchedDamageCues";
pub const PLAYLIST_INFO_PATH: &str =
    "/Script/FortniteGame.FortGameStateAthena:CurrentPlaylistInfo";
pub const WEAPON_PATH_PREFIX: &str = "/Game/Weapons/";
pub const WOOD_WALL_PATH: &str =
    "/Game/Building/ActorBlueprints/Player/Wood/L1/PBWA_W1_Solid.PBWA_W1_Solid_C";
pub const STONE_WALL_PATH: &str =
    "/Game/Building/ActorBlueprints/Player/Stone/L1/PBWA_S1_Solid.PBWA_S1_Solid_C";
pub const METAL_WALL_PATH: &str =
    "/Game/Building/ActorBlueprints/Player/Metal/L1/PBWA_M1_Solid.PBWA_M1_Solid_C";

/// Pawn properties passed through untouched into the owner's cosmetics.
const PAWN_COSMETIC_FIELDS: &[&str] = &[
    "Character",
    "BannerColorId",
    "BannerIconId",
    "bIsDefaultCharacter",
    "Backpack",
    "PetSkin",
    "Glider",
    "LoadingScreen",
    "MusicPack",
    "Pickaxe",
    "SkyDiveContrail",
    "Dances",
    "ItemWraps",
];

const PLAYER_STATE_COSMETIC_FIELDS: &[&str] = &[
    "Parts",
    "VariantRequiredCharacterParts",
    "HeroType",
    "CharacterGender",
    "CharacterBodyType",
];

// ============================================================================
// Group Kind
// ============================================================================

/// The closed set of field-group kinds the assembler merges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupKind {
    PlayerState,
    PlayerPawn,
    Inventory,
    Weapon,
    SupplyDrop,
    Llama,
    RebootVan,
    PoiManager,
    GameState,
    PlaylistInfo,
    GameplayModifier,
    SafeZone,
    HealthSet,
    BatchedDamage,
    BuildPiece(BuildMaterial),
}

impl GroupKind {
    /// Resolve a replicated type path. `None` for paths no kind claims.
    pub fn from_path(path: &str) -> Option<Self> {
        let kind = match path {
            PLAYER_STATE_PATH => Self::PlayerState,
            PLAYER_PAWN_PATH => Self::PlayerPawn,
            GAME_STATE_PATH => Self::GameState,
            INVENTORY_PATH => Self::Inventory,
            GAMEPLAY_MODIFIER_PATH => Self::GameplayModifier,
            SAFE_ZONE_PATH => Self::SafeZone,
            LLAMA_PATH => Self::Llama,
            SUPPLY_DROP_PATH => Self::SupplyDrop,
            REBOOT_VAN_PATH => Self::RebootVan,
            POI_MANAGER_PATH => Self::PoiManager,
            HEALTH_SET_PATH => Self::HealthSet,
            BATCHED_DAMAGE_PATH => Self::BatchedDamage,
            PLAYLIST_INFO_PATH => Self::PlaylistInfo,
            WOOD_WALL_PATH => Self::BuildPiece(BuildMaterial::Wood),
            STONE_WALL_PATH => Self::BuildPiece(BuildMaterial::Stone),
            METAL_WALL_PATH => Self::BuildPiece(BuildMaterial::Metal),
            _ if path.starts_with(WEAPON_PATH_PREFIX) => Self::Weapon,
            _ => return None,
        };
        Some(kind)
    }
}

// ============================================================================
// Field Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("field {field} of {group} should be {expected}, got {found}")]
    TypeMismatch {
        group: String,
        field: String,
        expected: &'static str,
        found: &'static str,
    },
}

// ============================================================================
// Field Reader
// ============================================================================

/// Typed accessors over one [`NetFieldGroup`].
///
/// A field of the wrong type reads as absent and the mismatch is kept for
/// [`finish`](Self::finish).
pub struct FieldReader<'g> {
    group: &'g NetFieldGroup,
    errors: Vec<FieldError>,
}

impl<'g> FieldReader<'g> {
    pub fn new(group: &'g NetFieldGroup) -> Self {
        Self {
            group,
            errors: Vec::new(),
        }
    }

    /// Mismatches seen so far, in read order.
    pub fn finish(self) -> Vec<FieldError> {
        self.errors
    }

    fn field(&self, name: &str) -> Option<&'g FieldValue> {
        self.group.get(name)
    }

    fn mismatch<T>(&mut self, field: &str, expected: &'static str, found: &FieldValue) -> Option<T> {
        self.errors.push(FieldError::TypeMismatch {
            group: self.group.path.clone(),
            field: field.to_string(),
            expected,
            found: found.kind_name(),
        });
        None
    }

    pub fn raw(&self, name: &str) -> Option<FieldValue> {
        self.group.get(name).cloned()
    }

    pub fn bool(&mut self, name: &str) -> Option<bool> {
        match self.field(name)? {
            FieldValue::Bool(value) => Some(*value),
            other => self.mismatch(name, "bool", other),
        }
    }

    pub fn int(&mut self, name: &str) -> Option<i64> {
        match self.field(name)? {
            FieldValue::Int(value) => Some(*value),
            other => self.mismatch(name, "int", other),
        }
    }

    pub fn i32(&mut self, name: &str) -> Option<i32> {
        match self.field(name)? {
            FieldValue::Int(value) => match i32::try_from(*value) {
                Ok(value) => Some(value),
                Err(_) => self.mismatch(name, "i32", &FieldValue::Int(*value)),
            },
            other => self.mismatch(name, "i32", other),
        }
    }

    pub fn u32(&mut self, name: &str) -> Option<u32> {
        match self.field(name)? {
            FieldValue::Int(value) => match u32::try_from(*value) {
                Ok(value) => Some(value),
                Err(_) => self.mismatch(name, "u32", &FieldValue::Int(*value)),
            },
            other => self.mismatch(name, "u32", other),
        }
    }

    pub fn float(&mut self, name: &str) -> Option<f32> {
        match self.field(name)? {
            FieldValue::Float(value) => Some(*value),
            other => self.mismatch(name, "float", other),
        }
    }

    pub fn text(&mut self, name: &str) -> Option<String> {
        match self.field(name)? {
            FieldValue::Text(value) => Some(value.clone()),
            other => self.mismatch(name, "text", other),
        }
    }

    pub fn vector(&mut self, name: &str) -> Option<FVector> {
        match self.field(name)? {
            FieldValue::Vector(value) => Some(*value),
            other => self.mismatch(name, "vector", other),
        }
    }

    pub fn actor(&mut self, name: &str) -> Option<ActorId> {
        match self.field(name)? {
            FieldValue::Actor(value) => Some(*value),
            other => self.mismatch(name, "actor", other),
        }
    }

    pub fn text_list(&mut self, name: &str) -> Option<Vec<String>> {
        let value = self.field(name)?;
        let FieldValue::List(items) = value else {
            return self.mismatch(name, "text list", value);
        };
        let mut texts = Vec::with_capacity(items.len());
        for item in items {
            match item {
                FieldValue::Text(text) => texts.push(text.clone()),
                other => return self.mismatch(name, "text list", other),
            }
        }
        Some(texts)
    }

    pub fn i32_list(&mut self, name: &str) -> Option<Vec<i32>> {
        let value = self.field(name)?;
        let FieldValue::List(items) = value else {
            return self.mismatch(name, "int list", value);
        };
        let mut ints = Vec::with_capacity(items.len());
        for item in items {
            match item {
                FieldValue::Int(int) => match i32::try_from(*int) {
                    Ok(int) => ints.push(int),
                    Err(_) => return self.mismatch(name, "int list", item),
                },
                other => return self.mismatch(name, "int list", other),
            }
        }
        Some(ints)
    }

    /// A list of nested structs, each exposed as its own group so it can be
    /// read with another `FieldReader`.
    pub fn structs(&mut self, name: &str) -> Option<Vec<NetFieldGroup>> {
        let value = self.field(name)?;
        let FieldValue::List(items) = value else {
            return self.mismatch(name, "struct list", value);
        };
        let mut groups = Vec::with_capacity(items.len());
        for item in items {
            match item {
                FieldValue::Struct(fields) => groups.push(NetFieldGroup {
                    path: format!("{}.{name}", self.group.path),
                    fields: fields.clone(),
                }),
                other => return self.mismatch(name, "struct list", other),
            }
        }
        Some(groups)
    }

    /// Decode every struct in list `name` with `decode`, keeping nested
    /// mismatches alongside this reader's own.
    pub fn decode_structs<T>(
        &mut self,
        name: &str,
        decode: impl Fn(&mut FieldReader<'_>) -> T,
    ) -> Option<Vec<T>> {
        let groups = self.structs(name)?;
        let mut decoded = Vec::with_capacity(groups.len());
        for group in &groups {
            let mut nested = FieldReader::new(group);
            decoded.push(decode(&mut nested));
            self.errors.extend(nested.finish());
        }
        Some(decoded)
    }

    /// Every present field among `names`, untyped.
    pub fn passthrough(&self, names: &[&str]) -> Vec<(String, FieldValue)> {
        names
            .iter()
            .filter_map(|name| self.raw(name).map(|value| (name.to_string(), value)))
            .collect()
    }
}

// ============================================================================
// Typed Updates
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerStateUpdate {
    pub only_spectator: Option<bool>,
    pub player_id: Option<i32>,
    pub unique_id: Option<String>,
    pub bot_unique_id: Option<String>,
    pub is_bot: Option<bool>,
    pub is_game_session_owner: Option<bool>,
    pub streamer_mode_name: Option<String>,
    pub level: Option<i32>,
    pub platform: Option<String>,
    pub has_finished_loading: Option<bool>,
    pub has_started_playing: Option<bool>,
    pub thanked_bus_driver: Option<bool>,
    pub using_anonymous_mode: Option<bool>,
    pub using_streamer_mode: Option<bool>,
    pub has_ever_skydived_from_bus: Option<bool>,
    pub has_ever_skydived_from_bus_and_landed: Option<bool>,
    pub is_party_leader: Option<bool>,
    pub is_disconnected: Option<bool>,
    pub reboot_counter: Option<u32>,
    pub dbno: Option<bool>,
    pub death_cause: Option<i32>,
    pub finisher_or_downer: Option<ActorId>,
    pub distance: Option<f32>,
    pub death_location: Option<FVector>,
    pub death_circumstance: Option<i32>,
    pub death_tags: Option<Vec<String>>,
    pub ping: Option<i32>,
    pub team_index: Option<i32>,
    pub place: Option<i32>,
    pub team_kill_score: Option<i32>,
    pub kill_score: Option<i32>,
    pub cosmetics: Vec<(String, FieldValue)>,
}

impl PlayerStateUpdate {
    pub fn decode(fields: &mut FieldReader<'_>) -> Self {
        Self {
            only_spectator: fields.bool("bOnlySpectator"),
            player_id: fields.i32("PlayerID"),
            unique_id: fields.text("UniqueId"),
            bot_unique_id: fields.text("BotUniqueId"),
            is_bot: fields.bool("bIsABot"),
            is_game_session_owner: fields.bool("bIsGameSessionOwner"),
            streamer_mode_name: fields.text("StreamerModeName"),
            level: fields.i32("Level"),
            platform: fields.text("Platform"),
            has_finished_loading: fields.bool("bHasFinishedLoading"),
            has_started_playing: fields.bool("bHasStartedPlaying"),
            thanked_bus_driver: fields.bool("bThankedBusDriver"),
            using_anonymous_mode: fields.bool("bUsingAnonymousMode"),
            using_streamer_mode: fields.bool("bUsingStreamerMode"),
            has_ever_skydived_from_bus: fields.bool("bHasEverSkydivedFromBus"),
            has_ever_skydived_from_bus_and_landed: fields
                .bool("bHasEverSkydivedFromBusAndLanded"),
            is_party_leader: fields.bool("bIsPartyLeader"),
            is_disconnected: fields.bool("bIsDisconnected"),
            reboot_counter: fields.u32("RebootCounter"),
            dbno: fields.bool("bDBNO"),
            death_cause: fields.i32("DeathCause"),
            finisher_or_downer: fields.actor("FinisherOrDowner"),
            distance: fields.float("Distance"),
            death_location: fields.vector("DeathLocation"),
            death_circumstance: fields.i32("DeathCircumstance"),
            death_tags: fields.text_list("DeathTags"),
            ping: fields.i32("Ping"),
            team_index: fields.i32("TeamIndex"),
            place: fields.i32("Place"),
            team_kill_score: fields.i32("TeamKillScore"),
            kill_score: fields.i32("KillScore"),
            cosmetics: fields.passthrough(PLAYER_STATE_COSMETIC_FIELDS),
        }
    }

    /// Whether this update marks a knock, elimination or revive.
    pub fn is_kill_feed_transition(&self) -> bool {
        self.reboot_counter.is_some_and(|counter| counter > 0)
            || self.dbno.is_some()
            || self.death_cause.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PawnUpdate {
    /// Actor id of the owning player state, when the bundle declares it.
    pub player_state: Option<ActorId>,
    pub current_weapon: Option<ActorId>,
    pub cosmetics: Vec<(String, FieldValue)>,
}

impl PawnUpdate {
    pub fn decode(fields: &mut FieldReader<'_>) -> Self {
        Self {
            player_state: fields.actor("PlayerState"),
            current_weapon: fields.actor("CurrentWeapon"),
            cosmetics: fields.passthrough(PAWN_COSMETIC_FIELDS),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InventoryUpdate {
    pub replay_pawn: Option<ActorId>,
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

impl InventoryUpdate {
    pub fn decode(fields: &mut FieldReader<'_>) -> Self {
        Self {
            replay_pawn: fields.actor("ReplayPawn"),
            count: fields.i32("Count"),
            item_definition: fields.text("ItemDefinition"),
            order_index: fields.i32("OrderIndex"),
            durability: fields.float("Durability"),
            level: fields.i32("Level"),
            loaded_ammo: fields.i32("LoadedAmmo"),
            a: fields.u32("A"),
            b: fields.u32("B"),
            c: fields.u32("C"),
            d: fields.u32("D"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeaponUpdate {
    pub weapon_name: Option<String>,
    pub weapon_level: Option<i32>,
    pub ammo_count: Option<i32>,
    pub is_equipping: Option<bool>,
    pub is_reloading: Option<bool>,
    pub last_fire_time: Option<f32>,
    pub a: Option<u32>,
    pub b: Option<u32>,
    pub c: Option<u32>,
    pub d: Option<u32>,
}

impl WeaponUpdate {
    pub fn decode(fields: &mut FieldReader<'_>) -> Self {
        Self {
            weapon_name: fields.text("WeaponData"),
            weapon_level: fields.i32("WeaponLevel"),
            ammo_count: fields.i32("AmmoCount"),
            is_equipping: fields.bool("bIsEquippingWeapon"),
            is_reloading: fields.bool("bIsReloadingWeapon"),
            last_fire_time: fields.float("LastFireTimeVerified"),
            a: fields.u32("A"),
            b: fields.u32("B"),
            c: fields.u32("C"),
            d: fields.u32("D"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SupplyDropUpdate {
    pub location: Option<FVector>,
    pub landing_location: Option<FVector>,
    pub opened: Option<bool>,
    pub balloon_popped: Option<bool>,
    pub has_spawned_pickups: Option<bool>,
}

impl SupplyDropUpdate {
    pub fn decode(fields: &mut FieldReader<'_>) -> Self {
        Self {
            location: fields.vector("Location"),
            landing_location: fields.vector("LandingLocation"),
            opened: fields.bool("Opened"),
            balloon_popped: fields.bool("BalloonPopped"),
            has_spawned_pickups: fields.bool("bHasSpawnedPickups"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LlamaUpdate {
    pub location: Option<FVector>,
    pub final_destination: Option<FVector>,
    pub looted: Option<bool>,
    pub has_spawned_pickups: Option<bool>,
}

impl LlamaUpdate {
    pub fn decode(fields: &mut FieldReader<'_>) -> Self {
        Self {
            location: fields.vector("Location"),
            final_destination: fields.vector("FinalDestination"),
            looted: fields.bool("Looted"),
            has_spawned_pickups: fields.bool("bHasSpawnedPickups"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RebootVanUpdate {
    pub handle: Option<i32>,
    pub location: Option<FVector>,
}

impl RebootVanUpdate {
    pub fn decode(fields: &mut FieldReader<'_>) -> Self {
        Self {
            handle: fields.i32("SpawnMachineRepDataHandle"),
            location: fields.vector("Location"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoiManagerUpdate {
    pub grid_count_x: Option<i32>,
    pub grid_count_y: Option<i32>,
    pub world_grid_start: Option<FVector>,
    pub world_grid_end: Option<FVector>,
    pub world_grid_spacing: Option<FVector>,
    pub world_grid_total_size: Option<FVector>,
}

impl PoiManagerUpdate {
    pub fn decode(fields: &mut FieldReader<'_>) -> Self {
        Self {
            grid_count_x: fields.i32("GridCountX"),
            grid_count_y: fields.i32("GridCountY"),
            world_grid_start: fields.vector("WorldGridStart"),
            world_grid_end: fields.vector("WorldGridEnd"),
            world_grid_spacing: fields.vector("WorldGridSpacing"),
            world_grid_total_size: fields.vector("WorldGridTotalSize"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GameStateUpdate {
    pub game_session_id: Option<String>,
    pub utc_time_started_match: Option<i64>,
    pub map_info: Option<String>,
    pub is_large_team_game: Option<bool>,
    pub tournament_round: Option<i32>,
    pub team_count: Option<i32>,
    pub team_size: Option<i32>,
    pub player_bots_left: Option<i32>,
    pub total_player_structures: Option<i32>,
    pub aircraft_start_time: Option<f32>,
    pub safe_zones_start_time: Option<f32>,
    pub world_time: Option<f32>,
    pub winning_team: Option<i32>,
    pub winning_player_list: Option<Vec<i32>>,
    pub active_team_nums: Option<Vec<i32>>,
    pub additional_playlist_levels: Option<Vec<String>>,
    pub team_flight_paths: Option<Vec<FlightPathUpdate>>,
    pub default_battle_bus: Option<String>,
}

impl GameStateUpdate {
    pub fn decode(fields: &mut FieldReader<'_>) -> Self {
        Self {
            game_session_id: fields.text("GameSessionId"),
            utc_time_started_match: fields.int("UtcTimeStartedMatch"),
            map_info: fields.text("MapInfo"),
            is_large_team_game: fields.bool("bIsLargeTeamGame"),
            tournament_round: fields.i32("EventTournamentRound"),
            team_count: fields.i32("TeamCount"),
            team_size: fields.i32("TeamSize"),
            player_bots_left: fields.i32("PlayerBotsLeft"),
            total_player_structures: fields.i32("TotalPlayerStructures"),
            aircraft_start_time: fields.float("AircraftStartTime"),
            safe_zones_start_time: fields.float("SafeZonesStartTime"),
            world_time: fields.float("ReplicatedWorldTimeSeconds"),
            winning_team: fields.i32("WinningTeam"),
            winning_player_list: fields.i32_list("WinningPlayerList"),
            active_team_nums: fields.i32_list("ActiveTeamNums"),
            additional_playlist_levels: fields
                .decode_structs("AdditionalPlaylistLevelsStreamed", |level| level.text("Name"))
                .map(|names| names.into_iter().flatten().collect()),
            team_flight_paths: fields.decode_structs("TeamFlightPaths", FlightPathUpdate::decode),
            default_battle_bus: fields.text("DefaultBattleBus"),
        }
    }
}

/// One element of the game state's team flight paths.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlightPathUpdate {
    pub flight_start_location: Option<FVector>,
    pub flight_start_rotation: Option<FVector>,
    pub flight_speed: Option<f32>,
    pub time_till_flight_end: Option<f32>,
    pub time_till_drop_start: Option<f32>,
    pub time_till_drop_end: Option<f32>,
}

impl FlightPathUpdate {
    pub fn decode(fields: &mut FieldReader<'_>) -> Self {
        Self {
            flight_start_location: fields.vector("FlightStartLocation"),
            flight_start_rotation: fields.vector("FlightStartRotation"),
            flight_speed: fields.float("FlightSpeed"),
            time_till_flight_end: fields.float("TimeTillFlightEnd"),
            time_till_drop_start: fields.float("TimeTillDropStart"),
            time_till_drop_end: fields.float("TimeTillDropEnd"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaylistInfoUpdate {
    pub playlist_name: Option<String>,
}

impl PlaylistInfoUpdate {
    pub fn decode(fields: &mut FieldReader<'_>) -> Self {
        Self {
            playlist_name: fields.text("PlaylistName"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GameplayModifierUpdate {
    pub modifier_def: Option<String>,
}

impl GameplayModifierUpdate {
    pub fn decode(fields: &mut FieldReader<'_>) -> Self {
        Self {
            modifier_def: fields.text("ModifierDef"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SafeZoneUpdate {
    pub last_center: Option<FVector>,
    pub next_center: Option<FVector>,
    pub last_radius: Option<f32>,
    pub next_radius: Option<f32>,
    pub shrink_start_time: Option<f32>,
    pub shrink_finish_time: Option<f32>,
}

impl SafeZoneUpdate {
    pub fn decode(fields: &mut FieldReader<'_>) -> Self {
        Self {
            last_center: fields.vector("LastCenter"),
            next_center: fields.vector("NextCenter"),
            last_radius: fields.float("Radius"),
            next_radius: fields.float("NextRadius"),
            shrink_start_time: fields.float("SafeZoneStartShrinkTime"),
            shrink_finish_time: fields.float("SafeZoneFinishShrinkTime"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HealthSetUpdate {
    pub health: Option<f32>,
    pub shield: Option<f32>,
}

impl HealthSetUpdate {
    pub fn decode(fields: &mut FieldReader<'_>) -> Self {
        Self {
            health: fields.float("Health"),
            shield: fields.float("Shield"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchedDamageUpdate {
    pub hit_actor: Option<ActorId>,
    pub location: Option<FVector>,
    pub magnitude: Option<f32>,
    pub is_fatal: Option<bool>,
    pub is_critical: Option<bool>,
    pub is_shield: Option<bool>,
    pub is_shield_destroyed: Option<bool>,
}

impl BatchedDamageUpdate {
    pub fn decode(fields: &mut FieldReader<'_>) -> Self {
        Self {
            hit_actor: fields.actor("HitActor"),
            location: fields.vector("Location"),
            magnitude: fields.float("Magnitude"),
            is_fatal: fields.bool("bIsFatal"),
            is_critical: fields.bool("bIsCritical"),
            is_shield: fields.bool("bIsShield"),
            is_shield_destroyed: fields.bool("bIsShieldDestroyed"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildPieceUpdate {
    pub location: Option<FVector>,
    pub health: Option<f32>,
    pub max_health: Option<f32>,
    pub team_index: Option<i32>,
    pub destroyed: Option<bool>,
}

impl BuildPieceUpdate {
    pub fn decode(fields: &mut FieldReader<'_>) -> Self {
        Self {
            location: fields.vector("Location"),
            health: fields.float("Health"),
            max_health: fields.float("MaxHealth"),
            team_index: fields.i32("TeamIndex"),
            destroyed: fields.bool("bDestroyed"),
        }
    }
}

/// A decoded bundle, ready to merge.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupUpdate {
    PlayerState(PlayerStateUpdate),
    PlayerPawn(PawnUpdate),
    Inventory(InventoryUpdate),
    Weapon(WeaponUpdate),
    SupplyDrop(SupplyDropUpdate),
    Llama(LlamaUpdate),
    RebootVan(RebootVanUpdate),
    PoiManager(PoiManagerUpdate),
    GameState(GameStateUpdate),
    PlaylistInfo(PlaylistInfoUpdate),
    GameplayModifier(GameplayModifierUpdate),
    SafeZone(SafeZoneUpdate),
    HealthSet(HealthSetUpdate),
    BatchedDamage(BatchedDamageUpdate),
    BuildPiece(BuildMaterial, BuildPieceUpdate),
}

/// Decode `group` as `kind`.
///
/// # Returns
/// The update with every mismatched field left absent, plus the mismatches.
pub fn decode_group(kind: GroupKind, group: &NetFieldGroup) -> (GroupUpdate, Vec<FieldError>) {
    let mut fields = FieldReader::new(group);
    let update = match kind {
        GroupKind::PlayerState => GroupUpdate::PlayerState(PlayerStateUpdate::decode(&mut fields)),
        GroupKind::PlayerPawn => GroupUpdate::PlayerPawn(PawnUpdate::decode(&mut fields)),
        GroupKind::Inventory => GroupUpdate::Inventory(InventoryUpdate::decode(&mut fields)),
        GroupKind::Weapon => GroupUpdate::Weapon(WeaponUpdate::decode(&mut fields)),
        GroupKind::SupplyDrop => GroupUpdate::SupplyDrop(SupplyDropUpdate::decode(&mut fields)),
        GroupKind::Llama => GroupUpdate::Llama(LlamaUpdate::decode(&mut fields)),
        GroupKind::RebootVan => GroupUpdate::RebootVan(RebootVanUpdate::decode(&mut fields)),
        GroupKind::PoiManager => GroupUpdate::PoiManager(PoiManagerUpdate::decode(&mut fields)),
        GroupKind::GameState => GroupUpdate::GameState(GameStateUpdate::decode(&mut fields)),
        GroupKind::PlaylistInfo => {
            GroupUpdate::PlaylistInfo(PlaylistInfoUpdate::decode(&mut fields))
        }
        GroupKind::GameplayModifier => {
            GroupUpdate::GameplayModifier(GameplayModifierUpdate::decode(&mut fields))
        }
        GroupKind::SafeZone => GroupUpdate::SafeZone(SafeZoneUpdate::decode(&mut fields)),
        GroupKind::HealthSet => GroupUpdate::HealthSet(HealthSetUpdate::decode(&mut fields)),
        GroupKind::BatchedDamage => {
            GroupUpdate::BatchedDamage(BatchedDamageUpdate::decode(&mut fields))
        }
        GroupKind::BuildPiece(material) => {
            GroupUpdate::BuildPiece(material, BuildPieceUpdate::decode(&mut fields))
        }
    };
    (update, fields.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path_resolves_every_kind() {
        assert_eq!(GroupKind::from_path(PLAYER_STATE_PATH), Some(GroupKind::PlayerState));
        assert_eq!(GroupKind::from_path(BATCHED_DAMAGE_PATH), Some(GroupKind::BatchedDamage));
        assert_eq!(
            GroupKind::from_path(STONE_WALL_PATH),
            Some(GroupKind::BuildPiece(BuildMaterial::Stone))
        );
        assert_eq!(
            GroupKind::from_path("/Game/Weapons/FORT_Rifles/B_Rifle_Generic.B_Rifle_Generic_C"),
            Some(GroupKind::Weapon)
        );
        assert_eq!(GroupKind::from_path("/Script/Engine.Actor"), None);
    }

    #[test]
    fn test_type_mismatch_reads_as_absent() {
        let group = NetFieldGroup::new(PLAYER_STATE_PATH)
            .with("KillScore", FieldValue::Text("three".into()))
            .with("TeamIndex", FieldValue::Int(4));

        let (update, errors) = decode_group(GroupKind::PlayerState, &group);

        let GroupUpdate::PlayerState(update) = update else {
            panic!("expected player state");
        };
        assert_eq!(update.kill_score, None);
        assert_eq!(update.team_index, Some(4));
        assert_eq!(
            errors,
            vec![FieldError::TypeMismatch {
                group: PLAYER_STATE_PATH.to_string(),
                field: "KillScore".to_string(),
                expected: "i32",
                found: "text",
            }]
        );
    }

    #[test]
    fn test_out_of_range_int_is_a_mismatch() {
        let group = NetFieldGroup::new(INVENTORY_PATH).with("A", FieldValue::Int(-1));
        let (update, errors) = decode_group(GroupKind::Inventory, &group);

        assert_eq!(update, GroupUpdate::Inventory(InventoryUpdate::default()));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_lists_decode_elementwise() {
        let group = NetFieldGroup::new(GAME_STATE_PATH)
            .with(
                "WinningPlayerList",
                FieldValue::List(vec![FieldValue::Int(3), FieldValue::Int(9)]),
            )
            .with(
                "GameSessionId",
                FieldValue::List(vec![FieldValue::Text("nope".into())]),
            );
        let mut fields = FieldReader::new(&group);

        assert_eq!(fields.i32_list("WinningPlayerList"), Some(vec![3, 9]));
        assert_eq!(fields.text("GameSessionId"), None);
        assert_eq!(fields.finish().len(), 1);
    }

    #[test]
    fn test_nested_struct_lists_decode_with_their_own_mismatches() {
        let path = |speed: FieldValue| {
            FieldValue::Struct(vec![
                ("FlightStartLocation".into(), FieldValue::Vector(FVector::new(1.0, 2.0, 3.0))),
                ("FlightSpeed".into(), speed),
            ])
        };
        let group = NetFieldGroup::new(GAME_STATE_PATH)
            .with(
                "TeamFlightPaths",
                FieldValue::List(vec![path(FieldValue::Float(900.0)), path(FieldValue::Int(1))]),
            )
            .with(
                "AdditionalPlaylistLevelsStreamed",
                FieldValue::List(vec![FieldValue::Struct(vec![(
                    "Name".into(),
                    FieldValue::Text("/Game/Athena/Maps/Extra".into()),
                )])]),
            );

        let (update, errors) = decode_group(GroupKind::GameState, &group);

        let GroupUpdate::GameState(state) = update else {
            panic!("expected game state");
        };
        let paths = state.team_flight_paths.unwrap();
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0].flight_speed, Some(900.0));
        assert_eq!(paths[1].flight_speed, None);
        assert_eq!(paths[1].flight_start_location, Some(FVector::new(1.0, 2.0, 3.0)));
        assert_eq!(
            state.additional_playlist_levels,
            Some(vec!["/Game/Athena/Maps/Extra".to_string()])
        );
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            &errors[0],
            FieldError::TypeMismatch { group, field, .. }
                if group.ends_with(".TeamFlightPaths") && field == "FlightSpeed"
        ));
    }

    #[test]
    fn test_cosmetics_pass_through_untyped() {
        let group = NetFieldGroup::new(PLAYER_PAWN_PATH)
            .with("PlayerState", FieldValue::Actor(77))
            .with("Glider", FieldValue::Text("Glider_Default".into()))
            .with("Dances", FieldValue::List(vec![FieldValue::Text("EID_Floss".into())]));
        let (update, errors) = decode_group(GroupKind::PlayerPawn, &group);

        assert!(errors.is_empty());
        let GroupUpdate::PlayerPawn(pawn) = update else {
            panic!("expected pawn");
        };
        assert_eq!(pawn.player_state, Some(77));
        assert_eq!(
            pawn.cosmetics.iter().map(|(name, _)| name.as_str()).collect::<Vec<_>>(),
            vec!["Glider", "Dances"]
        );
    }

    #[test]
    fn test_kill_feed_transition_rules() {
        let mut update = PlayerStateUpdate::default();
        assert!(!update.is_kill_feed_transition());

        update.reboot_counter = Some(0);
        assert!(!update.is_kill_feed_transition());

        update.dbno = Some(false);
        assert!(update.is_kill_feed_transition());
    }
}

//! Stormline Replay Session
//!
//! Drives one replay session end to end: derives the protocol era from the
//! header, routes field groups into the assembler and decodes out-of-band
//! events, decrypting them when the session is encrypted.
//!
//! # Error policy
//!
//! - Malformed event or field-group input fails only the current call.
//! - Unknown events and mistyped fields are logged, and only fatal in strict
//!   (`ParseMode::Debug`) sessions.
//! - A decryption failure poisons the session: every later event returns it.

#![deny(unsafe_code)]

pub mod config;
pub mod crypto;
pub mod events;
pub mod version;

use std::borrow::Cow;

use hashbrown::HashMap;
use stormline_model::{
    ActorId, ChannelId, EventRecord, MatchStats, PlayerElimination, SessionRecord, TeamRecord,
    TeamStats,
};
use stormline_replay::{FieldError, GroupKind, ReplayAssembler, decode_group};
use stormline_wire::{NetFieldGroup, WireError};
use thiserror::Error;
use tracing::{debug, info, warn};

pub use config::{ParseMode, SessionConfig};
pub use events::{EventDecoder, EventFrame, EventKind};
pub use version::{BranchVersion, ProtocolEra, parse_branch};

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error("malformed input: {0}")]
    MalformedInput(#[from] WireError),

    #[error("unknown event (group {group:?}, metadata {metadata:?})")]
    UnknownEvent { group: String, metadata: String },

    #[error("no elimination layout for protocol era {era:?}")]
    VersionGapUnsupported { era: ProtocolEra },

    #[error("decryption failed: {0}")]
    DecryptionFailure(String),

    #[error("malformed field: {0}")]
    MalformedField(#[from] FieldError),

    #[error("event {id} declares {declared} bytes but carries {available}")]
    EventTruncated {
        id: String,
        declared: i32,
        available: usize,
    },
}

pub type Result<T> = std::result::Result<T, SessionError>;

// ============================================================================
// Header
// ============================================================================

/// Container header fields the session depends on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayHeader {
    /// Build branch, e.g. `++Fortnite+Release-9.10`.
    pub branch: String,
    pub engine_network_version: u32,
    pub encrypted: bool,
    pub encryption_key: Option<Vec<u8>>,
}

// ============================================================================
// Session
// ============================================================================

/// One replay session: header-derived settings, assembler and decoded events.
pub struct ReplaySession {
    config: SessionConfig,
    branch: String,
    version: Option<BranchVersion>,
    decoder: EventDecoder,
    encrypted: bool,
    encryption_key: Option<Vec<u8>>,
    /// Set by the first decryption failure.
    poisoned: Option<SessionError>,
    /// Type path resolution, including paths no kind claims.
    group_kinds: HashMap<String, Option<GroupKind>>,
    assembler: ReplayAssembler,
    eliminations: Vec<PlayerElimination>,
    stats: Option<MatchStats>,
    team_stats: Option<TeamStats>,
}

impl ReplaySession {
    pub fn new(header: ReplayHeader, config: SessionConfig) -> Self {
        let version = parse_branch(&header.branch);
        let era = ProtocolEra::derive(version, header.engine_network_version);
        if era == ProtocolEra::Unsupported {
            warn!(
                branch = %header.branch,
                engine_network_version = header.engine_network_version,
                "no elimination layout for this build"
            );
        }
        info!(
            branch = %header.branch,
            era = ?era,
            encrypted = header.encrypted,
            parse_mode = ?config.parse_mode,
            "replay session opened"
        );

        Self {
            config,
            branch: header.branch,
            version,
            decoder: EventDecoder::new(era),
            encrypted: header.encrypted,
            encryption_key: header.encryption_key,
            poisoned: None,
            group_kinds: HashMap::new(),
            assembler: ReplayAssembler::new(),
            eliminations: Vec::new(),
            stats: None,
            team_stats: None,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn era(&self) -> ProtocolEra {
        self.decoder.era()
    }

    pub fn version(&self) -> Option<BranchVersion> {
        self.version
    }

    pub fn encryption_key(&self) -> Option<&[u8]> {
        self.encryption_key.as_deref()
    }

    pub fn assembler(&self) -> &ReplayAssembler {
        &self.assembler
    }

    pub fn eliminations(&self) -> &[PlayerElimination] {
        &self.eliminations
    }

    pub fn stats(&self) -> Option<&MatchStats> {
        self.stats.as_ref()
    }

    pub fn team_stats(&self) -> Option<&TeamStats> {
        self.team_stats.as_ref()
    }

    // ------------------------------------------------------------------------
    // Replication hooks
    // ------------------------------------------------------------------------

    pub fn on_channel_opened(&mut self, channel: ChannelId, actor: ActorId) {
        self.assembler.on_channel_opened(channel, actor);
    }

    pub fn on_channel_closed(&mut self, channel: ChannelId, actor: ActorId) {
        self.assembler.on_channel_closed(channel, actor);
    }

    /// Resolve a type path once and remember the answer.
    pub fn register_group_path(&mut self, path: &str) -> Option<GroupKind> {
        if let Some(kind) = self.group_kinds.get(path) {
            return *kind;
        }
        let kind = GroupKind::from_path(path);
        debug!(path, kind = ?kind, "registered group path");
        self.group_kinds.insert(path.to_string(), kind);
        kind
    }

    /// Merge one field group received on `channel`.
    ///
    /// Groups whose path resolves to no kind, or whose kind the parse mode
    /// excludes, are skipped.
    ///
    /// # Errors
    /// `MalformedField` for the first mistyped field, strict sessions only.
    /// The group is not applied in that case.
    pub fn on_field_group(&mut self, channel: ChannelId, group: &NetFieldGroup) -> Result<()> {
        let Some(kind) = self.register_group_path(&group.path) else {
            return Ok(());
        };
        if !self.config.parse_mode.allows(kind) {
            return Ok(());
        }
        debug!(channel, kind = ?kind, fields = group.fields.len(), "field group");

        let (update, errors) = decode_group(kind, group);
        if self.config.is_strict()
            && let Some(error) = errors.first()
        {
            return Err(error.clone().into());
        }
        // Lenient: mistyped fields were read as absent.
        for error in &errors {
            warn!(channel, %error, "ignoring mistyped field");
        }

        self.assembler.apply(channel, update);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------------

    /// Decode one framed event and keep its record.
    ///
    /// In an encrypted session without a key, the encryption key event is read
    /// unencrypted and its key is adopted for every later event.
    ///
    /// # Errors
    /// - `DecryptionFailure`: the range could not be decrypted, or an earlier
    ///   one could not be
    /// - `UnknownEvent`: unmatched tags in a strict session
    /// - `EventTruncated`: the payload is shorter than its declared size
    /// - `VersionGapUnsupported`, `MalformedInput`: from the decoder
    ///
    /// Only `DecryptionFailure` sticks. Every other error, in any parse mode,
    /// drops just this event: nothing is recorded for it and the session keeps
    /// accepting events. Callers that want to skip a bad event log the error
    /// and carry on.
    pub fn on_event(&mut self, frame: &EventFrame) -> Result<()> {
        if let Some(error) = &self.poisoned {
            return Err(error.clone());
        }

        let Some(kind) = EventKind::classify(&frame.group, &frame.metadata) else {
            info!(id = %frame.id, group = %frame.group, metadata = %frame.metadata, "unknown event");
            if self.config.is_strict() {
                return Err(SessionError::UnknownEvent {
                    group: frame.group.clone(),
                    metadata: frame.metadata.clone(),
                });
            }
            return Ok(());
        };

        let declared = usize::try_from(frame.size_in_bytes)
            .ok()
            .filter(|&declared| declared <= frame.payload.len())
            .ok_or_else(|| SessionError::EventTruncated {
                id: frame.id.clone(),
                declared: frame.size_in_bytes,
                available: frame.payload.len(),
            })?;
        let range = &frame.payload[..declared];

        // The key event is how a keyless encrypted session learns its key, so
        // it is read as plaintext until a key is known.
        let bootstrapping_key = kind == EventKind::EncryptionKey && self.encryption_key.is_none();
        let plaintext = if self.encrypted && !bootstrapping_key {
            let decrypted = match self.encryption_key.as_deref() {
                Some(key) => crypto::decrypt(key, range),
                None => Err(SessionError::DecryptionFailure(
                    "encrypted session has no key".to_string(),
                )),
            };
            match decrypted {
                Ok(bytes) => Cow::Owned(bytes),
                Err(error) => return Err(self.poison(error)),
            }
        } else {
            Cow::Borrowed(range)
        };

        let record = self
            .decoder
            .decode(kind, frame.info(), &plaintext)
            .inspect_err(|error| warn!(id = %frame.id, kind = ?kind, %error, "event not decoded"))?;
        let info = record.info();
        debug!(id = %info.id, kind = ?kind, start_time = info.start_time, "event decoded");

        match record {
            EventRecord::Elimination(elimination) => self.eliminations.push(elimination),
            EventRecord::Stats(stats) => self.stats = Some(stats),
            EventRecord::TeamStats(team_stats) => self.team_stats = Some(team_stats),
            EventRecord::EncryptionKey(key) => {
                if self.encryption_key.is_none()
                    && let Ok(bytes) = hex::decode(&key.key)
                {
                    debug!(id = %frame.id, "adopted session key from event");
                    self.encryption_key = Some(bytes);
                }
            }
        }
        Ok(())
    }

    fn poison(&mut self, error: SessionError) -> SessionError {
        warn!(%error, "session poisoned");
        self.poisoned = Some(error.clone());
        error
    }

    // ------------------------------------------------------------------------
    // Output
    // ------------------------------------------------------------------------

    pub fn teams(&self) -> Vec<TeamRecord> {
        self.assembler.teams()
    }

    /// Consume the session into its record.
    pub fn finalize(self) -> SessionRecord {
        let record = self.assembler.finalize();
        info!(
            players = record.players.len(),
            teams = record.teams.len(),
            eliminations = self.eliminations.len(),
            "replay session finalized"
        );

        SessionRecord {
            branch: self.branch,
            major: self.version.map(|v| v.major),
            minor: self.version.map(|v| v.minor),
            eliminations: self.eliminations,
            stats: self.stats,
            team_stats: self.team_stats,
            ..record
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

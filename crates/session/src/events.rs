//! Out-of-band event decoding.
//!
//! Events are framed outside the replicated stream and dispatched purely on
//! their group/metadata tags. Payload layouts are byte-aligned little-endian.

use stormline_model::{
    EncryptionKey, EventInfo, EventRecord, MatchStats, PlayerElimination, PlayerIdentity,
    TeamStats,
};
use stormline_wire::BitReader;

use crate::version::ProtocolEra;
use crate::{Result, SessionError};

pub const PLAYER_ELIMINATION_GROUP: &str = "playerElim";
pub const MATCH_STATS_METADATA: &str = "AthenaMatchStats";
pub const TEAM_STATS_METADATA: &str = "AthenaMatchTeamStats";
pub const ENCRYPTION_KEY_METADATA: &str = "PlayerStateEncryptionKey";

const ENCRYPTION_KEY_LEN: usize = 32;

// Tagged identity markers.
const IDENTITY_BOT: u8 = 0x03;
const IDENTITY_NAMED: u8 = 0x10;

// ============================================================================
// Framing
// ============================================================================

/// One framed event as handed over by the container reader.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFrame {
    pub id: String,
    pub group: String,
    pub metadata: String,
    pub start_time: u32,
    pub end_time: u32,
    /// Declared length of the (possibly encrypted) payload range.
    pub size_in_bytes: i32,
    pub payload: Vec<u8>,
}

impl EventFrame {
    pub fn info(&self) -> EventInfo {
        EventInfo {
            id: self.id.clone(),
            group: self.group.clone(),
            metadata: self.metadata.clone(),
            start_time: self.start_time,
            end_time: self.end_time,
            size_in_bytes: self.size_in_bytes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Elimination,
    MatchStats,
    TeamStats,
    EncryptionKey,
}

impl EventKind {
    /// Exact tag match. The group tag is checked before the metadata tag.
    pub fn classify(group: &str, metadata: &str) -> Option<Self> {
        if group == PLAYER_ELIMINATION_GROUP {
            return Some(Self::Elimination);
        }
        match metadata {
            MATCH_STATS_METADATA => Some(Self::MatchStats),
            TEAM_STATS_METADATA => Some(Self::TeamStats),
            ENCRYPTION_KEY_METADATA => Some(Self::EncryptionKey),
            _ => None,
        }
    }
}

// ============================================================================
// Decoder
// ============================================================================

/// Decodes plaintext event payloads for one protocol era.
#[derive(Debug, Clone, Copy)]
pub struct EventDecoder {
    era: ProtocolEra,
}

impl EventDecoder {
    pub fn new(era: ProtocolEra) -> Self {
        Self { era }
    }

    pub fn era(&self) -> ProtocolEra {
        self.era
    }

    /// Decode one plaintext payload.
    ///
    /// # Errors
    /// `VersionGapUnsupported` for an elimination in an era without a known
    /// layout; `MalformedInput` when the payload runs short.
    pub fn decode(&self, kind: EventKind, info: EventInfo, plaintext: &[u8]) -> Result<EventRecord> {
        let mut reader = BitReader::new(plaintext);
        let record = match kind {
            EventKind::Elimination => EventRecord::Elimination(self.elimination(info, &mut reader)?),
            EventKind::MatchStats => EventRecord::Stats(match_stats(info, &mut reader)?),
            EventKind::TeamStats => EventRecord::TeamStats(team_stats(info, &mut reader)?),
            EventKind::EncryptionKey => {
                let key = reader.read_bytes(ENCRYPTION_KEY_LEN)?;
                EventRecord::EncryptionKey(EncryptionKey {
                    info,
                    key: hex::encode_upper(key),
                })
            }
        };
        Ok(record)
    }

    fn elimination(&self, info: EventInfo, reader: &mut BitReader<'_>) -> Result<PlayerElimination> {
        let Some(skip) = self.era.elimination_skip() else {
            return Err(SessionError::VersionGapUnsupported { era: self.era });
        };
        reader.skip_bytes(skip)?;

        let (eliminated, eliminator) = if self.era == ProtocolEra::TaggedIdentity {
            (read_tagged_identity(reader)?, read_tagged_identity(reader)?)
        } else {
            (
                PlayerIdentity::Named(reader.read_fstring()?),
                PlayerIdentity::Named(reader.read_fstring()?),
            )
        };

        Ok(PlayerElimination {
            info,
            eliminated,
            eliminator,
            gun_type: reader.read_byte()?,
            knocked: reader.read_u32_as_bool()?,
        })
    }
}

fn read_tagged_identity(reader: &mut BitReader<'_>) -> Result<PlayerIdentity> {
    let identity = match reader.read_byte()? {
        IDENTITY_BOT => PlayerIdentity::Bot,
        IDENTITY_NAMED => PlayerIdentity::Named(reader.read_fstring()?),
        _ => {
            let size = reader.read_byte()?;
            PlayerIdentity::Guid(hex::encode_upper(reader.read_bytes(usize::from(size))?))
        }
    };
    Ok(identity)
}

fn match_stats(info: EventInfo, reader: &mut BitReader<'_>) -> Result<MatchStats> {
    Ok(MatchStats {
        info,
        unknown: reader.read_u32()?,
        accuracy: reader.read_f32()?,
        assists: reader.read_u32()?,
        eliminations: reader.read_u32()?,
        weapon_damage: reader.read_u32()?,
        other_damage: reader.read_u32()?,
        revives: reader.read_u32()?,
        damage_taken: reader.read_u32()?,
        damage_to_structures: reader.read_u32()?,
        materials_gathered: reader.read_u32()?,
        materials_used: reader.read_u32()?,
        total_traveled: reader.read_u32()?,
    })
}

fn team_stats(info: EventInfo, reader: &mut BitReader<'_>) -> Result<TeamStats> {
    Ok(TeamStats {
        info,
        unknown: reader.read_u32()?,
        position: reader.read_u32()?,
        total_players: reader.read_u32()?,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use stormline_wire::WireError;

    use super::*;

    pub(crate) fn fstring(text: &str) -> Vec<u8> {
        let len = i32::try_from(text.len() + 1).unwrap();
        let mut bytes = len.to_le_bytes().to_vec();
        bytes.extend_from_slice(text.as_bytes());
        bytes.push(0);
        bytes
    }

    /// 85 skipped bytes, a named eliminated player, a guid eliminator.
    pub(crate) fn tagged_elimination() -> Vec<u8> {
        let mut payload = vec![0u8; 85];
        payload.push(IDENTITY_NAMED);
        payload.extend(fstring("Alpha"));
        payload.extend([0x11, 0x04, 0xDE, 0xAD, 0xBE, 0xEF]);
        payload.push(7);
        payload.extend(1u32.to_le_bytes());
        payload
    }

    pub(crate) fn match_stats_payload() -> Vec<u8> {
        let mut payload = 0u32.to_le_bytes().to_vec();
        payload.extend(0.25f32.to_le_bytes());
        for value in 1u32..=10 {
            payload.extend(value.to_le_bytes());
        }
        payload
    }

    #[test]
    fn test_classify_by_group_then_metadata() {
        assert_eq!(EventKind::classify("playerElim", "anything"), Some(EventKind::Elimination));
        assert_eq!(
            EventKind::classify("AthenaMatchStats", "AthenaMatchTeamStats"),
            Some(EventKind::TeamStats)
        );
        assert_eq!(EventKind::classify("", "AthenaMatchStats"), Some(EventKind::MatchStats));
        assert_eq!(EventKind::classify("AthenaReplayBrowserEvents", "ZoneUpdate"), None);
    }

    #[test]
    fn test_tagged_identity_elimination() {
        let decoder = EventDecoder::new(ProtocolEra::TaggedIdentity);
        let record = decoder
            .decode(EventKind::Elimination, EventInfo::default(), &tagged_elimination())
            .unwrap();

        let EventRecord::Elimination(elim) = record else {
            panic!("expected elimination");
        };
        assert_eq!(elim.eliminated, PlayerIdentity::Named("Alpha".into()));
        assert_eq!(elim.eliminator, PlayerIdentity::Guid("DEADBEEF".into()));
        assert_eq!(elim.gun_type, 7);
        assert!(elim.knocked);
    }

    #[test]
    fn test_tagged_bot_identity() {
        let mut payload = vec![0u8; 85];
        payload.extend([IDENTITY_BOT, IDENTITY_BOT, 2]);
        payload.extend(0u32.to_le_bytes());

        let record = EventDecoder::new(ProtocolEra::TaggedIdentity)
            .decode(EventKind::Elimination, EventInfo::default(), &payload)
            .unwrap();
        let EventRecord::Elimination(elim) = record else {
            panic!("expected elimination");
        };
        assert_eq!(elim.eliminated, PlayerIdentity::Bot);
        assert!(elim.is_self_elimination());
        assert!(!elim.knocked);
    }

    #[test]
    fn test_legacy_elimination_reads_string_pair() {
        let mut payload = vec![0u8; 12];
        payload.extend(fstring("Alpha"));
        payload.extend(fstring("Bravo"));
        payload.push(3);
        payload.extend(2u32.to_le_bytes());

        let record = EventDecoder::new(ProtocolEra::Legacy)
            .decode(EventKind::Elimination, EventInfo::default(), &payload)
            .unwrap();
        let EventRecord::Elimination(elim) = record else {
            panic!("expected elimination");
        };
        assert_eq!(elim.eliminated.as_str(), "Alpha");
        assert_eq!(elim.eliminator.as_str(), "Bravo");
        assert_eq!(elim.gun_type, 3);
        // Only exactly 1 counts as knocked.
        assert!(!elim.knocked);
    }

    #[test]
    fn test_season4_skip_width() {
        let mut payload = vec![0u8; 40];
        payload.extend(fstring("Alpha"));
        payload.extend(fstring("Alpha"));
        payload.push(0);
        payload.extend(1u32.to_le_bytes());

        let record = EventDecoder::new(ProtocolEra::Season4)
            .decode(EventKind::Elimination, EventInfo::default(), &payload)
            .unwrap();
        assert!(matches!(record, EventRecord::Elimination(e) if e.knocked));
    }

    #[test]
    fn test_unsupported_era_is_a_version_gap() {
        let result = EventDecoder::new(ProtocolEra::Unsupported).decode(
            EventKind::Elimination,
            EventInfo::default(),
            &tagged_elimination(),
        );
        assert_eq!(
            result,
            Err(SessionError::VersionGapUnsupported {
                era: ProtocolEra::Unsupported
            })
        );
    }

    #[test]
    fn test_match_stats_layout() {
        let record = EventDecoder::new(ProtocolEra::Legacy)
            .decode(EventKind::MatchStats, EventInfo::default(), &match_stats_payload())
            .unwrap();
        let EventRecord::Stats(stats) = record else {
            panic!("expected stats");
        };
        assert_eq!(stats.accuracy, 0.25);
        assert_eq!(stats.assists, 1);
        assert_eq!(stats.eliminations, 2);
        assert_eq!(stats.damage_taken, 6);
        assert_eq!(stats.total_traveled, 10);
    }

    #[test]
    fn test_team_stats_layout() {
        let payload: Vec<u8> = [0u32, 4, 100].iter().flat_map(|v| v.to_le_bytes()).collect();
        let record = EventDecoder::new(ProtocolEra::Legacy)
            .decode(EventKind::TeamStats, EventInfo::default(), &payload)
            .unwrap();
        assert_eq!(
            record,
            EventRecord::TeamStats(TeamStats {
                info: EventInfo::default(),
                unknown: 0,
                position: 4,
                total_players: 100,
            })
        );
    }

    #[test]
    fn test_encryption_key_is_upper_hex() {
        let record = EventDecoder::new(ProtocolEra::Legacy)
            .decode(EventKind::EncryptionKey, EventInfo::default(), &[0xab; 32])
            .unwrap();
        let EventRecord::EncryptionKey(key) = record else {
            panic!("expected key");
        };
        assert_eq!(key.key, "AB".repeat(32));
    }

    #[test]
    fn test_short_payload_is_malformed() {
        let result = EventDecoder::new(ProtocolEra::Legacy).decode(
            EventKind::TeamStats,
            EventInfo::default(),
            &[0u8; 6],
        );
        assert!(matches!(
            result,
            Err(SessionError::MalformedInput(WireError::OutOfRange { .. }))
        ));
    }
}

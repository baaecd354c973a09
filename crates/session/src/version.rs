//! Branch parsing and protocol era selection.

use regex::Regex;

/// First engine network version that replicates fast-array delta structs.
/// Elimination payloads switch to tagged identities from here on.
pub const HISTORY_FAST_ARRAY_DELTA_STRUCT: u32 = 11;

const BRANCH_PATTERN: &str = r"Release-(?<major>\d+)\.(?<minor>\d*)";

/// Release version embedded in a branch string such as `++Fortnite+Release-4.1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchVersion {
    pub major: u32,
    pub minor: u32,
}

/// Parse the `Release-{major}.{minor}` suffix. An empty minor reads as 0.
pub fn parse_branch(branch: &str) -> Option<BranchVersion> {
    let pattern = Regex::new(BRANCH_PATTERN).ok()?;
    let captures = pattern.captures(branch)?;
    let major = captures.name("major")?.as_str().parse().ok()?;
    let minor = match captures.name("minor").map(|m| m.as_str()) {
        None | Some("") => 0,
        Some(minor) => minor.parse().ok()?,
    };
    Some(BranchVersion { major, minor })
}

/// Elimination payload layout family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolEra {
    Legacy,
    Season4,
    PreTaggedIdentity,
    TaggedIdentity,
    Unsupported,
}

impl ProtocolEra {
    pub fn derive(version: Option<BranchVersion>, engine_network_version: u32) -> Self {
        let Some(BranchVersion { major, minor }) = version else {
            return Self::Unsupported;
        };
        let has_history = engine_network_version >= HISTORY_FAST_ARRAY_DELTA_STRUCT;

        if has_history && major >= 9 {
            Self::TaggedIdentity
        } else if major >= 9 {
            Self::Unsupported
        } else if major <= 4 && minor < 2 {
            Self::Legacy
        } else if major == 4 && minor <= 2 {
            Self::Season4
        } else {
            Self::PreTaggedIdentity
        }
    }

    /// Bytes preceding the identity pair in an elimination payload.
    pub fn elimination_skip(self) -> Option<usize> {
        match self {
            Self::Legacy => Some(12),
            Self::Season4 => Some(40),
            Self::PreTaggedIdentity => Some(45),
            Self::TaggedIdentity => Some(85),
            Self::Unsupported => None,
        }
    }
}

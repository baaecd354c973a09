//! Session configuration.

use stormline_replay::GroupKind;

/// How much of the replicated state a session collects.
///
/// Modes are ordered: each one processes everything the previous one does.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum ParseMode {
    #[default]
    Minimal,
    Normal,
    Full,
    /// Everything, with malformed or unknown input treated as fatal.
    Debug,
}

impl ParseMode {
    pub fn is_strict(self) -> bool {
        self == Self::Debug
    }

    /// Whether groups of `kind` are merged in this mode.
    pub fn allows(self, kind: GroupKind) -> bool {
        self >= required_mode(kind)
    }
}

/// Least verbose mode that still merges `kind`.
pub fn required_mode(kind: GroupKind) -> ParseMode {
    match kind {
        GroupKind::BuildPiece(_) => ParseMode::Debug,
        GroupKind::HealthSet | GroupKind::BatchedDamage => ParseMode::Full,
        _ => ParseMode::Minimal,
    }
}

/// Session configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionConfig {
    pub parse_mode: ParseMode,
}

impl SessionConfig {
    pub fn new(parse_mode: ParseMode) -> Self {
        Self { parse_mode }
    }

    pub fn is_strict(&self) -> bool {
        self.parse_mode.is_strict()
    }
}

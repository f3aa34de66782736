pub mod brain;
pub mod format;
pub mod pricing;
pub mod range;
pub mod state;
pub mod views;
pub mod wire;

pub use brain::BrainState;
pub use range::TimeRange;
pub use state::{ApplyOutcome, ArenaState, LogEntry, LogKind};
pub use wire::{decode_server_msg, AgentEvent, EventKind, ServerMsg, StateSnapshot, WireError};

pub const ORCHESTRATOR: &str = "orchestrator";

/// Static presentation data for a pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentProfile {
    pub key: &'static str,
    pub display: &'static str,
    pub monogram: &'static str,
    pub crest: &'static str,
    pub color: (u8, u8, u8),
}

/// Pipeline order used by the roster.
pub static AGENT_PROFILES: [AgentProfile; 8] = [
    AgentProfile {
        key: "orchestrator",
        display: "IGRIS",
        monogram: "IG",
        crest: "\u{2B21}",
        color: (0xFF, 0x17, 0x44),
    },
    AgentProfile {
        key: "architect",
        display: "ARCHITECT",
        monogram: "AR",
        crest: "\u{2316}",
        color: (0x44, 0x8A, 0xFF),
    },
    AgentProfile {
        key: "forger",
        display: "FORGER",
        monogram: "FO",
        crest: "\u{2699}",
        color: (0xFF, 0x6D, 0x00),
    },
    AgentProfile {
        key: "sentinel",
        display: "SENTINEL",
        monogram: "SE",
        crest: "\u{25C8}",
        color: (0x00, 0xE6, 0x76),
    },
    AgentProfile {
        key: "warden",
        display: "WARDEN",
        monogram: "WA",
        crest: "\u{25C9}",
        color: (0x7C, 0x4D, 0xFF),
    },
    AgentProfile {
        key: "mender",
        display: "MENDER",
        monogram: "ME",
        crest: "\u{2726}",
        color: (0x00, 0xBF, 0xA5),
    },
    AgentProfile {
        key: "seeker",
        display: "SEEKER",
        monogram: "SK",
        crest: "\u{2295}",
        color: (0xFF, 0xD6, 0x00),
    },
    AgentProfile {
        key: "sage",
        display: "SAGE",
        monogram: "SA",
        crest: "\u{262F}",
        color: (0xE0, 0x40, 0xFB),
    },
];

pub fn agent_profile(key: &str) -> Option<&'static AgentProfile> {
    AGENT_PROFILES.iter().find(|profile| profile.key == key)
}

/// Display name for an agent key, falling back to the upper-cased key.
pub fn agent_display_name(key: Option<&str>) -> String {
    match key {
        Some(key) if !key.is_empty() => agent_profile(key)
            .map(|profile| profile.display.to_string())
            .unwrap_or_else(|| key.to_uppercase()),
        _ => "UNKNOWN".to_string(),
    }
}

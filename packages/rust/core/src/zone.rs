//! Front / main / back matter tracking.

use bindery_shared::{MatterZone, StructuralRole};

/// A one-way move between matter zones, emitted before the fragment that
/// triggers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneTransition {
    EnterMain,
    EnterBack,
}

impl ZoneTransition {
    pub fn target(&self) -> MatterZone {
        match self {
            Self::EnterMain => MatterZone::Main,
            Self::EnterBack => MatterZone::Back,
        }
    }
}

/// Accumulator threaded through the fragment sequence.
///
/// Starts in the front matter. The first divisional part enters the main
/// matter; the first back-matter role enters the back matter. Later triggers
/// are no-ops and the zone never moves backwards.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZoneTracker {
    zone: MatterZone,
}

impl ZoneTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> MatterZone {
        self.zone
    }

    /// Feed the next fragment's role. Returns the transition it triggers, if any.
    pub fn observe(&mut self, role: StructuralRole) -> Option<ZoneTransition> {
        let next = self.zone.advance(role);
        if next == self.zone {
            return None;
        }
        self.zone = next;
        match next {
            MatterZone::Main => Some(ZoneTransition::EnterMain),
            MatterZone::Back => Some(ZoneTransition::EnterBack),
            MatterZone::Front => None,
        }
    }
}

//! Logical line catalog shared by firmware and host targets.
//!
//! The handshake engine refers to lines by role rather than by pin so the
//! same protocol logic can run against STM32 GPIO, the host emulator, or a
//! test double. Everything here is `no_std` friendly and mirrors how the
//! DRV8243 is wired on the board.

/// Identifier for the logical lines exposed by the controller.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LineId {
    /// nSLEEP: sleep/wake control, also carries the ACK pulse.
    Wake,
    /// nFAULT: open-drain fault/ready indicator, pulled high externally.
    ReadyFault,
    /// PH: static direction select for the H-bridge.
    Direction,
}

impl LineId {
    /// Deterministic index for lookups into [`ALL_LINES`].
    #[must_use]
    pub const fn as_index(self) -> usize {
        match self {
            LineId::Wake => 0,
            LineId::ReadyFault => 1,
            LineId::Direction => 2,
        }
    }

    /// Attempts to construct a [`LineId`] from a raw index.
    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(LineId::Wake),
            1 => Some(LineId::ReadyFault),
            2 => Some(LineId::Direction),
            _ => None,
        }
    }

    /// Short label used in logs and diagnostics output.
    #[must_use]
    pub const fn label(self) -> &'static str {
        line_by_id(self).label
    }
}

/// Electrical configuration expected for a line.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LineDirection {
    PushPullOutput,
    InputPullUp,
}

/// Level a line rests at when no sequence is in flight.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LineIdleLevel {
    High,
    Low,
}

/// Metadata describing one logical line.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LineSpec {
    pub id: LineId,
    /// Label used in logs.
    pub label: &'static str,
    /// Signal name from the DRV8243 datasheet.
    pub signal: &'static str,
    pub direction: LineDirection,
    pub idle: LineIdleLevel,
    /// Whether the protocol is meaningful without this line wired.
    pub required: bool,
}

impl LineSpec {
    const fn new(
        id: LineId,
        label: &'static str,
        signal: &'static str,
        direction: LineDirection,
        idle: LineIdleLevel,
        required: bool,
    ) -> Self {
        Self {
            id,
            label,
            signal,
            direction,
            idle,
            required,
        }
    }
}

/// Compile-time catalog of every logical line.
pub const ALL_LINES: [LineSpec; 3] = [
    LineSpec::new(
        LineId::Wake,
        "nSLEEP",
        "nSLEEP",
        LineDirection::PushPullOutput,
        LineIdleLevel::High,
        true,
    ),
    LineSpec::new(
        LineId::ReadyFault,
        "nFAULT",
        "nFAULT",
        LineDirection::InputPullUp,
        LineIdleLevel::High,
        false,
    ),
    LineSpec::new(
        LineId::Direction,
        "PH",
        "PH/IN2",
        LineDirection::PushPullOutput,
        LineIdleLevel::High,
        false,
    ),
];

/// Retrieve line metadata by identifier.
#[must_use]
pub const fn line_by_id(id: LineId) -> LineSpec {
    ALL_LINES[id.as_index()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_indices_round_trip() {
        for spec in &ALL_LINES {
            let index = spec.id.as_index();
            assert_eq!(LineId::from_index(index), Some(spec.id));
            assert_eq!(line_by_id(spec.id).label, spec.label);
        }
        assert_eq!(LineId::from_index(ALL_LINES.len()), None);
    }

    #[test]
    fn only_the_wake_line_is_required() {
        assert!(line_by_id(LineId::Wake).required);
        assert!(!line_by_id(LineId::ReadyFault).required);
        assert!(!line_by_id(LineId::Direction).required);
    }

    #[test]
    fn fault_line_is_an_open_drain_input() {
        let fault = line_by_id(LineId::ReadyFault);
        assert_eq!(fault.direction, LineDirection::InputPullUp);
        assert_eq!(fault.idle, LineIdleLevel::High);
    }

    #[test]
    fn direction_line_rests_forward() {
        let direction = line_by_id(LineId::Direction);
        assert_eq!(direction.direction, LineDirection::PushPullOutput);
        assert_eq!(direction.idle, LineIdleLevel::High);
    }
}

//! CiA-402 enable sequence.
//!
//! Drives the drive from "ready to switch on" to "operation enabled" one
//! masked status code at a time:
//!
//! | State              | Command | Advances when status & 0x006F == |
//! |--------------------|---------|----------------------------------|
//! | Idle               | 0x0006  | 0x0021                           |
//! | RequestingSwitchOn | 0x0007  | 0x0023                           |
//! | Aligning           | 0x000F  | 0x0027                           |
//! | Running            | (generator)                                |
//!
//! While aligning, the target is latched from the actual position every
//! cycle so motion starts without a step. The sequence only moves forward;
//! [`EnableState::reset`] is the single way back.

use csp_common::cia402::{ControlWord, DriveStateCode, StatusWord};
use tracing::debug;

/// Enable sequence position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum EnableState {
    /// Commanding shutdown, waiting for ready-to-switch-on.
    #[default]
    Idle = 0,
    /// Commanding switch on, waiting for switched-on.
    RequestingSwitchOn = 1,
    /// Latching target from actual, commanding enable operation.
    Aligning = 2,
    /// Operation enabled; the setpoint generator owns the outputs.
    Running = 3,
}

/// What the axis must write for this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnableStep {
    /// Write the control word only.
    Command(ControlWord),
    /// Write `target` then enable operation (0x000F).
    /// `entered_running` is set on the cycle the drive confirmed 0x0027.
    Align { target: i32, entered_running: bool },
    /// Hand the cycle to the setpoint generator.
    Generate,
}

impl EnableState {
    /// Status code that moves this state forward.
    const fn awaited(self) -> Option<DriveStateCode> {
        match self {
            Self::Idle => Some(DriveStateCode::ReadyToSwitchOn),
            Self::RequestingSwitchOn => Some(DriveStateCode::SwitchedOn),
            Self::Aligning => Some(DriveStateCode::OperationEnabled),
            Self::Running => None,
        }
    }

    const fn next(self) -> Self {
        match self {
            Self::Idle => Self::RequestingSwitchOn,
            Self::RequestingSwitchOn => Self::Aligning,
            Self::Aligning | Self::Running => Self::Running,
        }
    }

    #[inline]
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }

    /// Force back to `Idle` (switch-on-disabled or fault recovery).
    pub fn reset(&mut self) {
        if *self != Self::Idle {
            debug!("Enable sequence {:?} -> Idle (reset)", self);
        }
        *self = Self::Idle;
    }

    /// Advance on the current status and return the output action.
    pub fn step(&mut self, status: StatusWord, actual_position: i32) -> EnableStep {
        let current = *self;
        let reached = current
            .awaited()
            .is_some_and(|code| status.state_code() == code.code());
        if reached {
            *self = current.next();
            debug!(
                "Enable sequence {:?} -> {:?} (status={:#06x})",
                current,
                *self,
                status.bits()
            );
        }

        match current {
            Self::Idle => EnableStep::Command(ControlWord::CMD_SHUTDOWN),
            Self::RequestingSwitchOn => EnableStep::Command(ControlWord::CMD_SWITCH_ON),
            Self::Aligning => EnableStep::Align {
                target: actual_position,
                entered_running: reached,
            },
            Self::Running => EnableStep::Generate,
        }
    }
}

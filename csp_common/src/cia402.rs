//! CiA-402 status and control words.
//!
//! Both words use the `bitflags` crate. Unknown bits are always retained
//! (`from_bits_retain`) so that a raw word read from the process image
//! round-trips bit-exact.
//!
//! | Masked status (0x006F) | Drive state            |
//! |------------------------|------------------------|
//! | 0x0021                 | Ready to switch on     |
//! | 0x0023                 | Switched on            |
//! | 0x0027                 | Operation enabled      |

use bitflags::bitflags;

/// Status word bits that encode the coarse drive state.
pub const STATE_MASK: u16 = 0x006F;

bitflags! {
    /// Status word (0x6041:0).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StatusWord: u16 {
        const READY_TO_SWITCH_ON  = 0x0001;
        const SWITCHED_ON         = 0x0002;
        const OPERATION_ENABLED   = 0x0004;
        /// Drive fault present.
        const FAULT               = 0x0008;
        const VOLTAGE_ENABLED     = 0x0010;
        /// Active low: cleared while a quick stop is in progress.
        const QUICK_STOP          = 0x0020;
        /// Drive refuses to be switched on until shut down first.
        const SWITCH_ON_DISABLED  = 0x0040;
        const WARNING             = 0x0080;
        const REMOTE              = 0x0200;
        const TARGET_REACHED      = 0x0400;
        const INTERNAL_LIMIT      = 0x0800;
        /// CSP: drive follows the target position.
        const TARGET_FOLLOWING    = 0x1000;
        const FOLLOWING_ERROR     = 0x2000;
    }
}

impl StatusWord {
    /// Wrap a raw word, keeping every bit.
    #[inline]
    pub const fn from_raw(raw: u16) -> Self {
        Self::from_bits_retain(raw)
    }

    /// All-zero word: the link or the slave's process data is down.
    #[inline]
    pub const fn is_link_down(&self) -> bool {
        self.bits() == 0
    }

    #[inline]
    pub const fn has_fault(&self) -> bool {
        self.contains(Self::FAULT)
    }

    #[inline]
    pub const fn switch_on_disabled(&self) -> bool {
        self.contains(Self::SWITCH_ON_DISABLED)
    }

    /// Status restricted to the state bits.
    #[inline]
    pub const fn state_code(&self) -> u16 {
        self.bits() & STATE_MASK
    }

    /// Coarse drive state, if the masked code is one the enable sequence waits for.
    #[inline]
    pub const fn drive_state(&self) -> Option<DriveStateCode> {
        DriveStateCode::from_code(self.state_code())
    }
}

/// Masked status codes recognised by the enable sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum DriveStateCode {
    ReadyToSwitchOn = 0x0021,
    SwitchedOn = 0x0023,
    OperationEnabled = 0x0027,
}

impl DriveStateCode {
    /// Convert from a masked status code. Returns `None` for other states.
    #[inline]
    pub const fn from_code(code: u16) -> Option<Self> {
        match code {
            0x0021 => Some(Self::ReadyToSwitchOn),
            0x0023 => Some(Self::SwitchedOn),
            0x0027 => Some(Self::OperationEnabled),
            _ => None,
        }
    }

    #[inline]
    pub const fn code(self) -> u16 {
        self as u16
    }
}

bitflags! {
    /// Control word (0x6040:0).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ControlWord: u16 {
        const SWITCH_ON         = 0x0001;
        const ENABLE_VOLTAGE    = 0x0002;
        /// Active low.
        const QUICK_STOP        = 0x0004;
        const ENABLE_OPERATION  = 0x0008;
        /// CSP new-setpoint toggle.
        const NEW_SETPOINT      = 0x0010;
        /// Rising edge acknowledges a fault.
        const FAULT_RESET       = 0x0080;
        const HALT              = 0x0100;
    }
}

impl ControlWord {
    /// "Shutdown": voltage enabled, no quick stop, drive de-energized.
    pub const CMD_SHUTDOWN: Self = Self::from_bits_retain(0x0006);
    /// "Switch on".
    pub const CMD_SWITCH_ON: Self = Self::from_bits_retain(0x0007);
    /// "Enable operation".
    pub const CMD_ENABLE_OPERATION: Self = Self::from_bits_retain(0x000F);
    /// Fault reset pulse.
    pub const CMD_FAULT_RESET: Self = Self::from_bits_retain(0x0080);

    /// Wrap a raw word, keeping every bit.
    #[inline]
    pub const fn from_raw(raw: u16) -> Self {
        Self::from_bits_retain(raw)
    }

    /// "Enable operation" with the new-setpoint bit taken from `edge`.
    #[inline]
    pub const fn enable_operation_with_edge(edge: bool) -> Self {
        if edge {
            Self::CMD_ENABLE_OPERATION.union(Self::NEW_SETPOINT)
        } else {
            Self::CMD_ENABLE_OPERATION
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

//! Simulated CiA-402 servo drive.
//!
//! The `SimulatedDrive` models what a CSP servo does with the process data
//! it receives every cycle:
//! - Power state machine driven by the control word
//! - Position follower with a proportional gain and a velocity clamp
//! - Following-error trip against the window written to 0x6065:0
//! - Fault injection and fault reset on a rising edge of control word bit 7
//! - A small object dictionary for the startup SDO program

use std::collections::BTreeMap;
use std::time::Duration;

use csp_common::bus::BusError;
use csp_common::cia402::{ControlWord, StatusWord};
use csp_common::consts::{
    MODE_CSP, OD_FOLLOWING_ERROR_WINDOW, OD_INTERPOLATION_PERIOD, OD_MODES_OF_OPERATION,
    OD_SYNC_WATCHDOG,
};
use csp_common::image::{DriveInputs, DriveOutputs};
use tracing::{debug, info, warn};

/// Error code reported in 0x603F after a following-error trip.
pub const ERROR_FOLLOWING: u16 = 0x8611;

/// SDO abort: object does not exist in the object dictionary.
pub const ABORT_NO_OBJECT: u32 = 0x0602_0000;

/// SDO abort: value range of parameter exceeded.
pub const ABORT_VALUE_RANGE: u32 = 0x0609_0030;

/// CiA-402 power states of the simulated drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    SwitchOnDisabled,
    ReadyToSwitchOn,
    SwitchedOn,
    OperationEnabled,
    Fault,
}

impl PowerState {
    /// State bits as they appear in the status word.
    const fn status_bits(self) -> u16 {
        match self {
            Self::SwitchOnDisabled => 0x0040,
            Self::ReadyToSwitchOn => 0x0021,
            Self::SwitchedOn => 0x0023,
            Self::OperationEnabled => 0x0027,
            Self::Fault => 0x0008,
        }
    }
}

/// Simulation parameters.
#[derive(Debug, Clone)]
pub struct SimDriveConfig {
    /// Proportional follow gain per cycle [% of remaining error].
    pub follow_gain_percent: u8,
    /// Velocity clamp [counts/s].
    pub max_velocity: i64,
    /// Mode of operation at power-up (0x6060).
    pub initial_mode: u8,
    /// Starting encoder position [counts].
    pub initial_position: i32,
}

impl Default for SimDriveConfig {
    fn default() -> Self {
        Self {
            follow_gain_percent: 50,
            max_velocity: 2_000_000,
            initial_mode: MODE_CSP,
            initial_position: 0,
        }
    }
}

/// Software model of one CSP servo drive.
#[derive(Debug, Clone)]
pub struct SimulatedDrive {
    config: SimDriveConfig,
    state: PowerState,
    actual_position: i32,
    target_position: i32,
    following_error: i32,
    error_code: u16,
    /// Last control word seen (fault reset edge detection).
    last_control: ControlWord,
    /// Number of new-setpoint toggles received while enabled.
    setpoint_edges: u64,
    /// Injected fault waiting for the next cycle.
    pending_fault: Option<u16>,
    /// Fault reset edges are ignored while set (persistent fault).
    reset_inhibit: bool,
    /// Object dictionary entries written over SDO.
    objects: BTreeMap<(u16, u8), u32>,
}

impl SimulatedDrive {
    /// Create a drive in `SwitchOnDisabled`.
    pub fn new(config: SimDriveConfig) -> Self {
        let mut objects = BTreeMap::new();
        objects.insert(OD_MODES_OF_OPERATION, config.initial_mode as u32);
        Self {
            actual_position: config.initial_position,
            target_position: config.initial_position,
            config,
            state: PowerState::SwitchOnDisabled,
            following_error: 0,
            error_code: 0,
            last_control: ControlWord::empty(),
            setpoint_edges: 0,
            pending_fault: None,
            reset_inhibit: false,
            objects,
        }
    }

    #[inline]
    pub fn state(&self) -> PowerState {
        self.state
    }

    #[inline]
    pub fn actual_position(&self) -> i32 {
        self.actual_position
    }

    #[inline]
    pub fn error_code(&self) -> u16 {
        self.error_code
    }

    #[inline]
    pub fn setpoint_edges(&self) -> u64 {
        self.setpoint_edges
    }

    /// Move the encoder without commanding motion (external disturbance).
    pub fn set_actual_position(&mut self, position: i32) {
        self.actual_position = position;
    }

    /// Value last written to an object, if any.
    pub fn object(&self, index: u16, sub: u8) -> Option<u32> {
        self.objects.get(&(index, sub)).copied()
    }

    /// Trip into `Fault` on the next cycle with the given error code.
    pub fn inject_fault(&mut self, error_code: u16) {
        self.pending_fault = Some(error_code);
    }

    /// Make a fault persistent: reset requests are ignored until cleared.
    pub fn set_reset_inhibit(&mut self, inhibit: bool) {
        self.reset_inhibit = inhibit;
    }

    /// Current process inputs as the drive would publish them.
    pub fn inputs(&self) -> DriveInputs {
        let mut status = self.state.status_bits() | StatusWord::REMOTE.bits();
        if self.state != PowerState::SwitchOnDisabled && self.state != PowerState::Fault {
            status |= StatusWord::VOLTAGE_ENABLED.bits();
        }
        if self.state == PowerState::OperationEnabled {
            status |= StatusWord::TARGET_FOLLOWING.bits();
        }
        DriveInputs {
            status_word: status,
            actual_position: self.actual_position,
            tracking_error: self.following_error,
            error_code: self.error_code,
        }
    }

    /// SDO download handler.
    pub fn sdo_write(&mut self, index: u16, sub: u8, value: u32) -> Result<(), BusError> {
        let key = (index, sub);
        let accepted = match key {
            k if k == OD_MODES_OF_OPERATION => value <= u8::MAX as u32,
            k if k == OD_INTERPOLATION_PERIOD => value > 0,
            k if k == OD_FOLLOWING_ERROR_WINDOW => true,
            k if k == OD_SYNC_WATCHDOG => true,
            _ => {
                return Err(BusError::SdoAbort {
                    index,
                    sub,
                    code: ABORT_NO_OBJECT,
                });
            }
        };
        if !accepted {
            return Err(BusError::SdoAbort {
                index,
                sub,
                code: ABORT_VALUE_RANGE,
            });
        }
        debug!("Sim drive SDO {:#06x}:{} = {}", index, sub, value);
        self.objects.insert(key, value);
        Ok(())
    }

    /// Execute one drive cycle with the outputs received from the master.
    pub fn cycle(&mut self, outputs: &DriveOutputs, dt: Duration) {
        let cw = ControlWord::from_raw(outputs.control_word);

        if let Some(code) = self.pending_fault.take() {
            self.enter_fault(code);
        }

        self.apply_control_word(cw);

        if self.state == PowerState::OperationEnabled {
            if (cw ^ self.last_control).contains(ControlWord::NEW_SETPOINT) {
                self.setpoint_edges += 1;
            }
            self.target_position = outputs.target_position;
            if self.object(OD_MODES_OF_OPERATION.0, OD_MODES_OF_OPERATION.1)
                == Some(MODE_CSP as u32)
            {
                self.follow(dt);
            }
            self.check_following_error();
        } else {
            // Not under closed-loop control: target tracks actual.
            self.target_position = self.actual_position;
            self.following_error = 0;
        }

        self.last_control = cw;
    }

    fn apply_control_word(&mut self, cw: ControlWord) {
        use PowerState::*;

        let raw = cw.bits();
        let shutdown = raw & 0x0087 == 0x0006;
        let switch_on = raw & 0x008F == 0x0007;
        let enable_op = raw & 0x008F == 0x000F;
        let disable_voltage = raw & 0x0082 == 0x0000;
        let fault_reset_edge = cw.contains(ControlWord::FAULT_RESET)
            && !self.last_control.contains(ControlWord::FAULT_RESET)
            && !self.reset_inhibit;

        let next = match self.state {
            Fault if fault_reset_edge => SwitchOnDisabled,
            Fault => Fault,
            SwitchOnDisabled if shutdown => ReadyToSwitchOn,
            ReadyToSwitchOn if switch_on => SwitchedOn,
            ReadyToSwitchOn if enable_op => OperationEnabled,
            ReadyToSwitchOn if disable_voltage => SwitchOnDisabled,
            SwitchedOn if enable_op => OperationEnabled,
            SwitchedOn if shutdown => ReadyToSwitchOn,
            SwitchedOn if disable_voltage => SwitchOnDisabled,
            OperationEnabled if switch_on => SwitchedOn,
            OperationEnabled if shutdown => ReadyToSwitchOn,
            OperationEnabled if disable_voltage => SwitchOnDisabled,
            s => s,
        };

        if next != self.state {
            debug!("Sim drive {:?} -> {:?} (cw={:#06x})", self.state, next, raw);
            if self.state == Fault {
                info!("Sim drive fault {:#06x} reset", self.error_code);
                self.error_code = 0;
            }
            self.state = next;
        }
    }

    fn follow(&mut self, dt: Duration) {
        let error = self.target_position as i64 - self.actual_position as i64;
        let mut step = error * self.config.follow_gain_percent as i64 / 100;
        if step == 0 && error != 0 {
            step = error.signum();
        }
        let max_step = (self.config.max_velocity as i128 * dt.as_micros() as i128 / 1_000_000)
            .clamp(1, i64::MAX as i128) as i64;
        let step = step.clamp(-max_step, max_step);
        self.actual_position = (self.actual_position as i64 + step)
            .clamp(i32::MIN as i64, i32::MAX as i64) as i32;
        self.following_error = (self.target_position as i64 - self.actual_position as i64)
            .clamp(i32::MIN as i64, i32::MAX as i64) as i32;
    }

    fn check_following_error(&mut self) {
        let Some(window) = self.object(OD_FOLLOWING_ERROR_WINDOW.0, OD_FOLLOWING_ERROR_WINDOW.1)
        else {
            return;
        };
        if (self.following_error as i64).unsigned_abs() > window as u64 {
            warn!(
                "Sim drive following error {} exceeds window {}",
                self.following_error, window
            );
            self.enter_fault(ERROR_FOLLOWING);
        }
    }

    fn enter_fault(&mut self, code: u16) {
        if self.state != PowerState::Fault {
            warn!("Sim drive entering fault {:#06x}", code);
        }
        self.state = PowerState::Fault;
        self.error_code = code;
    }
}

impl Default for SimulatedDrive {
    fn default() -> Self {
        Self::new(SimDriveConfig::default())
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

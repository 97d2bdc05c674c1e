//! CSP axis: the cyclic entry point.
//!
//! A [`CspAxis`] owns every piece of per-drive state. The caller creates
//! it, binds it once with [`CspAxis::init`], and then calls
//! [`CspAxis::run`] once per period with the master's process image and
//! the time elapsed since the previous call.
//!
//! Per cycle:
//! 1. Supervisor gates on link, fault, cooldowns and switch-on-disabled.
//! 2. The enable sequence advances (or holds) the drive.
//! 3. Once running, the generator writes target + control word each period
//!    and the tracking monitor checks the reported error.
//!
//! `run` never fails. An unmapped axis does nothing.

use std::time::Duration;

use csp_common::bus::{
    BusError, FieldbusMaster, ImageBinding, PdoLayout, ProcessImage, SlaveIdentity,
};
use csp_common::cia402::ControlWord;
use csp_common::config::DriveConfig;
use csp_common::consts::{
    INPUTS_BITS, MODE_CSP, OD_FOLLOWING_ERROR_WINDOW, OD_INTERPOLATION_PERIOD,
    OD_MODES_OF_OPERATION, OD_SYNC_WATCHDOG, OUTPUTS_BITS,
};
use tracing::{debug, info, warn};

use crate::control::{Direction, SetpointGenerator, TrackingMonitor};
use crate::state::{EnableState, EnableStep, Gate, Supervisor};
use crate::timing::Pacer;

/// Outcome of [`CspAxis::init`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStatus {
    /// Process image bound; the axis will act on `run`.
    Ready,
    /// Mapping failed; `run` is a no-op.
    Unmapped,
}

/// Read-only view of the axis for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisDiagnostics {
    pub mapped: bool,
    pub enable_state: EnableState,
    pub target: i32,
    pub direction: Direction,
    pub edge: bool,
    pub tracking_warning: bool,
    pub fault_active: bool,
    /// Last 0x603F value reported while the link was up.
    pub last_error_code: u16,
}

/// One CSP servo axis.
#[derive(Debug, Clone)]
pub struct CspAxis {
    config: DriveConfig,
    binding: Option<ImageBinding>,
    enable: EnableState,
    supervisor: Supervisor,
    generator: SetpointGenerator,
    monitor: TrackingMonitor,
    pacer: Pacer,
    last_error_code: u16,
    /// Set once a binding/image mismatch has been reported.
    image_fault_logged: bool,
}

impl CspAxis {
    /// Create an unbound axis with safe defaults (Idle, centred target).
    pub fn new(config: DriveConfig) -> Self {
        Self {
            binding: None,
            enable: EnableState::default(),
            supervisor: Supervisor::new(&config.recovery),
            generator: SetpointGenerator::new(&config.motion),
            monitor: TrackingMonitor::new(&config.monitor),
            pacer: Pacer::new(),
            last_error_code: 0,
            image_fault_logged: false,
            config,
        }
    }

    #[inline]
    pub fn config(&self) -> &DriveConfig {
        &self.config
    }

    #[inline]
    pub fn binding(&self) -> Option<ImageBinding> {
        self.binding
    }

    #[inline]
    pub fn enable_state(&self) -> EnableState {
        self.enable
    }

    pub fn diagnostics(&self) -> AxisDiagnostics {
        AxisDiagnostics {
            mapped: self.binding.is_some(),
            enable_state: self.enable,
            target: self.generator.target(),
            direction: self.generator.direction(),
            edge: self.generator.edge(),
            tracking_warning: self.monitor.latched(),
            fault_active: self.supervisor.fault_active(),
            last_error_code: self.last_error_code,
        }
    }

    /// Bind the axis to `slave` and run the startup SDO program.
    ///
    /// Width and identity mismatches are reported and tolerated; only a
    /// failed mapping leaves the axis unbound.
    pub fn init<B: FieldbusMaster + ?Sized>(
        &mut self,
        bus: &mut B,
        slave: &SlaveIdentity,
        layout: &PdoLayout,
    ) -> InitStatus {
        info!(
            "Initializing CSP axis on slave {} via '{}' master",
            slave.position,
            bus.name()
        );
        self.binding = None;

        if layout.input_bits != INPUTS_BITS || layout.output_bits != OUTPUTS_BITS {
            warn!(
                "PDO size mismatch: inputs {} bits (expected {}), outputs {} bits (expected {}); using fixed layout",
                layout.input_bits, INPUTS_BITS, layout.output_bits, OUTPUTS_BITS
            );
        }

        let expected = &self.config.drive;
        if slave.vendor_id != expected.vendor_id || slave.product_id != expected.product_id {
            warn!(
                "Unexpected drive identity vendor={:#010x} product={:#010x} (expected {:#010x}/{:#010x})",
                slave.vendor_id, slave.product_id, expected.vendor_id, expected.product_id
            );
        }

        let binding = match bus.map_process_image(slave, layout) {
            Ok(binding) => binding,
            Err(e) => {
                warn!("Process image mapping failed: {e}; axis stays inert");
                return InitStatus::Unmapped;
            }
        };
        if let Err(e) = binding.split(bus.process_image_mut()) {
            warn!("Mapped regions exceed the process image: {e}; axis stays inert");
            return InitStatus::Unmapped;
        }
        debug!(
            "Slave {} bound at input byte {}, output byte {}",
            slave.position, binding.input_offset, binding.output_offset
        );

        self.run_sdo_program(bus, slave.position);
        self.binding = Some(binding);
        self.image_fault_logged = false;
        info!("CSP axis ready on slave {}", slave.position);
        InitStatus::Ready
    }

    fn run_sdo_program<B: FieldbusMaster + ?Sized>(&self, bus: &mut B, position: u16) {
        let sdo = &self.config.sdo;
        if sdo.write_mode_of_operation {
            let (index, sub) = OD_MODES_OF_OPERATION;
            report_sdo(
                bus.sdo_write_u8(position, index, sub, MODE_CSP),
                index,
                sub,
                MODE_CSP as u32,
            );
        }
        if sdo.write_interpolation_period {
            let (index, sub) = OD_INTERPOLATION_PERIOD;
            let period_us = self.config.motion.cycle_period_ms.saturating_mul(1000);
            report_sdo(
                bus.sdo_write_u32(position, index, sub, period_us),
                index,
                sub,
                period_us,
            );
        }
        if sdo.write_tracking_window {
            let (index, sub) = OD_FOLLOWING_ERROR_WINDOW;
            let window = self.config.monitor.tracking_window_counts.unsigned_abs();
            report_sdo(
                bus.sdo_write_u32(position, index, sub, window),
                index,
                sub,
                window,
            );
        }
        if sdo.write_sync_watchdog {
            let (index, sub) = OD_SYNC_WATCHDOG;
            let value = sdo.sync_watchdog_value;
            report_sdo(
                bus.sdo_write_u32(position, index, sub, value),
                index,
                sub,
                value,
            );
        }
    }

    /// Execute one cycle against the process image.
    pub fn run(&mut self, image: &mut ProcessImage, elapsed: Duration) {
        let Some(binding) = self.binding else {
            return;
        };
        let (inputs, mut outputs) = match binding.split(image) {
            Ok(regions) => regions,
            Err(e) => {
                if !self.image_fault_logged {
                    warn!("Process image no longer covers the axis: {e}");
                    self.image_fault_logged = true;
                }
                return;
            }
        };

        self.pacer.advance(elapsed);
        let status = inputs.status_word();
        if !status.is_link_down() {
            self.last_error_code = inputs.error_code();
        }

        match self
            .supervisor
            .evaluate(status, inputs.error_code(), &mut self.pacer)
        {
            Gate::Proceed => {}
            Gate::Suspend => return,
            Gate::Hold(cw) => {
                outputs.set_control_word(cw);
                return;
            }
            Gate::Recover(cw) => {
                self.enable.reset();
                outputs.set_control_word(cw);
                return;
            }
            Gate::Disable => {
                self.enable.reset();
                outputs.set_control_word(ControlWord::CMD_SHUTDOWN);
                return;
            }
        }

        match self.enable.step(status, inputs.actual_position()) {
            EnableStep::Command(cw) => outputs.set_control_word(cw),
            EnableStep::Align {
                target,
                entered_running,
            } => {
                let target = self.generator.align(target);
                outputs.set_target_position(target);
                outputs.set_control_word(ControlWord::CMD_ENABLE_OPERATION);
                if entered_running {
                    self.generator.start();
                    self.pacer.mark();
                    info!("Operation enabled (CSP) at {} counts", target);
                }
            }
            EnableStep::Generate => {
                if let Some(tick) = self.generator.advance(&mut self.pacer) {
                    outputs.set_target_position(tick.target);
                    outputs.set_control_word(tick.control_word);
                    self.monitor.evaluate(inputs.tracking_error());
                }
            }
        }
    }
}

fn report_sdo(result: Result<(), BusError>, index: u16, sub: u8, value: u32) {
    match result {
        Ok(()) => debug!("SDO {:#06x}:{} = {}", index, sub, value),
        Err(e) => warn!("SDO {:#06x}:{} = {} failed: {e}", index, sub, value),
    }
}

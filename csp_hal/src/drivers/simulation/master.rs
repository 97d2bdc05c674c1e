//! In-process field-bus master backed by simulated drives.

use std::time::Duration;

use csp_common::bus::{
    BusError, FieldbusMaster, ImageBinding, PdoLayout, ProcessImage, SlaveIdentity,
};
use csp_common::consts::{INPUTS_LEN, OMRON_VENDOR_ID, OUTPUTS_LEN, R88D_1SN_PRODUCT_ID};
use csp_common::image::DriveOutputs;
use tracing::{debug, info, warn};

use super::drive::{SimDriveConfig, SimulatedDrive};

/// One slave on the simulated bus.
#[derive(Debug)]
struct SimSlave {
    identity: SlaveIdentity,
    drive: SimulatedDrive,
    link_up: bool,
}

/// Simulation master.
///
/// Slaves are packed back to back: slave `n` owns input bytes
/// `n * INPUTS_LEN..` and output bytes `n * OUTPUTS_LEN..`. Inputs stay
/// zero until the first `exchange()`, like a bus that has not reached OP.
#[derive(Debug)]
pub struct SimulationMaster {
    slaves: Vec<SimSlave>,
    image: ProcessImage,
    cycle_time: Duration,
    cycle_count: u64,
}

impl SimulationMaster {
    /// Empty bus exchanging every `cycle_time`.
    pub fn new(cycle_time: Duration) -> Self {
        Self {
            slaves: Vec::new(),
            image: ProcessImage::default(),
            cycle_time,
            cycle_count: 0,
        }
    }

    /// Bus with one drive reporting the R88D-1SN identity.
    pub fn single_drive(cycle_time: Duration, config: SimDriveConfig) -> Self {
        let mut master = Self::new(cycle_time);
        master.add_drive(OMRON_VENDOR_ID, R88D_1SN_PRODUCT_ID, config);
        master
    }

    /// Append a drive and return its bus position.
    pub fn add_drive(&mut self, vendor_id: u32, product_id: u32, config: SimDriveConfig) -> u16 {
        let position = self.slaves.len() as u16;
        self.slaves.push(SimSlave {
            identity: SlaveIdentity {
                position,
                vendor_id,
                product_id,
            },
            drive: SimulatedDrive::new(config),
            link_up: true,
        });
        self.image
            .inputs
            .resize(self.slaves.len() * INPUTS_LEN, 0);
        self.image
            .outputs
            .resize(self.slaves.len() * OUTPUTS_LEN, 0);
        info!(
            "Sim bus: slave {} vendor={:#010x} product={:#010x}",
            position, vendor_id, product_id
        );
        position
    }

    /// Identities of all slaves, in bus order.
    pub fn slaves(&self) -> Vec<SlaveIdentity> {
        self.slaves.iter().map(|s| s.identity).collect()
    }

    /// Layout the bus configuration reports for `position`.
    pub fn pdo_layout(&self, position: u16) -> Option<PdoLayout> {
        self.slaves.get(position as usize).map(|_| {
            PdoLayout::fixed(
                position as usize * INPUTS_LEN * 8,
                position as usize * OUTPUTS_LEN * 8,
            )
        })
    }

    pub fn drive(&self, position: u16) -> Option<&SimulatedDrive> {
        self.slaves.get(position as usize).map(|s| &s.drive)
    }

    pub fn drive_mut(&mut self, position: u16) -> Option<&mut SimulatedDrive> {
        self.slaves.get_mut(position as usize).map(|s| &mut s.drive)
    }

    /// Trip the drive at `position` on the next exchange.
    pub fn inject_fault(&mut self, position: u16, error_code: u16) -> Result<(), BusError> {
        self.slave_mut(position)?.drive.inject_fault(error_code);
        Ok(())
    }

    /// Drop or restore the link to one slave. A dropped slave reads as all zeros.
    pub fn set_link(&mut self, position: u16, up: bool) -> Result<(), BusError> {
        let slave = self.slave_mut(position)?;
        if slave.link_up != up {
            info!("Sim bus: slave {} link {}", position, if up { "up" } else { "down" });
        }
        slave.link_up = up;
        Ok(())
    }

    #[inline]
    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    #[inline]
    pub fn cycle_time(&self) -> Duration {
        self.cycle_time
    }

    fn slave_mut(&mut self, position: u16) -> Result<&mut SimSlave, BusError> {
        self.slaves
            .get_mut(position as usize)
            .ok_or(BusError::SlaveNotFound(position))
    }
}

impl FieldbusMaster for SimulationMaster {
    fn name(&self) -> &'static str {
        "simulation"
    }

    fn map_process_image(
        &mut self,
        slave: &SlaveIdentity,
        layout: &PdoLayout,
    ) -> Result<ImageBinding, BusError> {
        let expected = self
            .pdo_layout(slave.position)
            .ok_or(BusError::SlaveNotFound(slave.position))?;
        let binding =
            ImageBinding::from_bit_offsets(layout.input_offset_bits, layout.output_offset_bits)?;
        if layout.input_offset_bits != expected.input_offset_bits
            || layout.output_offset_bits != expected.output_offset_bits
        {
            return Err(BusError::MappingFailed(format!(
                "slave {} is at input bit {} / output bit {}, requested {} / {}",
                slave.position,
                expected.input_offset_bits,
                expected.output_offset_bits,
                layout.input_offset_bits,
                layout.output_offset_bits
            )));
        }
        debug!(
            "Sim bus: slave {} mapped at in={} out={}",
            slave.position, binding.input_offset, binding.output_offset
        );
        Ok(binding)
    }

    fn sdo_write_u8(
        &mut self,
        slave: u16,
        index: u16,
        sub: u8,
        value: u8,
    ) -> Result<(), BusError> {
        self.slave_mut(slave)?
            .drive
            .sdo_write(index, sub, value as u32)
    }

    fn sdo_write_u32(
        &mut self,
        slave: u16,
        index: u16,
        sub: u8,
        value: u32,
    ) -> Result<(), BusError> {
        self.slave_mut(slave)?.drive.sdo_write(index, sub, value)
    }

    fn exchange(&mut self) -> Result<(), BusError> {
        let dt = self.cycle_time;
        for (n, slave) in self.slaves.iter_mut().enumerate() {
            let in_off = n * INPUTS_LEN;
            let out_off = n * OUTPUTS_LEN;
            let outputs = DriveOutputs::decode(self.image.outputs.get(out_off..).unwrap_or(&[]))
                .map_err(|e| BusError::Transport(e.to_string()))?;
            slave.drive.cycle(&outputs, dt);

            let region = self
                .image
                .inputs
                .get_mut(in_off..in_off + INPUTS_LEN)
                .ok_or_else(|| BusError::Transport(format!("input image too short for slave {n}")))?;
            if slave.link_up {
                slave
                    .drive
                    .inputs()
                    .encode(region)
                    .map_err(|e| BusError::Transport(e.to_string()))?;
            } else {
                region.fill(0);
            }
        }
        self.cycle_count += 1;
        if self.slaves.is_empty() && self.cycle_count == 1 {
            warn!("Sim bus: exchanging with no slaves");
        }
        Ok(())
    }

    fn process_image_mut(&mut self) -> &mut ProcessImage {
        &mut self.image
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

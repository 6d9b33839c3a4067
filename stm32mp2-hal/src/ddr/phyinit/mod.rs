//! # DDR PHY initialization
//!
//! The PHY is brought up in the following steps:
//!
//! - C: static configuration derived from the user input, see [initphyconfig].
//! - D to H: training firmware load, execution and result readback, see [firmware]. Skipped
//!   on a standby exit, the trained values are restored from the retention RAM instead.
//! - I: PHY initialization engine image and sequencer settings, see [pie].
//! - J: the CSR bus is handed back to the hardware.
//!
//! All CSR writes of the steps C and I go through [Phy::write] and are recorded in the
//! [retention::RetentionList] while tracking is enabled.
use stm32mp2::ddrphy::{
    self, csr,
    regs::UcclkHclkEnables,
};

use super::{
    DramType, Error,
    config::{UserInputAdvanced, UserInputBasic, UserInputModeRegisters, UserInputSwizzle},
};
use crate::{bus::RegisterBus, timeout::Clock};

pub mod calcmb;
pub mod drvstren;
pub mod firmware;
pub mod initphyconfig;
pub mod mailbox;
pub mod messageblock;
pub mod pie;
pub mod retention;

pub use pie::PieInstruction;

use firmware::FwLoader;
use messageblock::MessageBlock;
use retention::{RegInstr, RetentionList};

/// PHY user input, filled from the descriptor tables during init.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PhyInput {
    pub uib: UserInputBasic,
    pub uia: UserInputAdvanced,
    pub uim: UserInputModeRegisters,
    pub uis: UserInputSwizzle,
}

/// Training firmware images for the configured DRAM type.
#[derive(Debug, Clone, Copy)]
pub struct FirmwareImages<'a> {
    pub imem: &'a [u8],
    pub dmem: &'a [u8],
    pub pie: &'a [PieInstruction],
}

/// Whether data byte `dbyte` of the PHY is connected to the memory.
///
/// LPDDR4 uses data bytes 0 and 1 for channel A on DFI0 and data bytes 2 and 3 for channel B
/// on DFI1.
pub fn dbyte_active(dram_type: DramType, uib: &UserInputBasic, dbyte: u32) -> bool {
    match dram_type {
        DramType::Ddr3 | DramType::Ddr4 => dbyte < uib.num_active_dbyte_dfi0,
        DramType::Lpddr4 if dbyte < 2 => dbyte < uib.num_active_dbyte_dfi0,
        DramType::Lpddr4 => dbyte - 2 < uib.num_active_dbyte_dfi1,
    }
}

/// CSR access handle used by all PHY initialization steps.
pub struct Phy<'a, B, C> {
    pub(crate) bus: &'a mut B,
    pub(crate) clock: &'a mut C,
    pub(crate) retention: &'a mut RetentionList,
}

impl<'a, B: RegisterBus, C: Clock> Phy<'a, B, C> {
    pub fn new(bus: &'a mut B, clock: &'a mut C, retention: &'a mut RetentionList) -> Self {
        Self {
            bus,
            clock,
            retention,
        }
    }

    /// Writes a CSR and records it for retention.
    pub fn write(&mut self, csr: u32, value: u16) -> Result<(), Error> {
        self.retention.track(csr)?;
        self.bus.write_phy_csr(csr, value);
        Ok(())
    }

    /// Writes a CSR which must not be restored after standby.
    #[inline]
    pub fn write_untracked(&mut self, csr: u32, value: u16) {
        self.bus.write_phy_csr(csr, value);
    }

    /// Records a CSR written by the training firmware.
    #[inline]
    pub fn track(&mut self, csr: u32) -> Result<(), Error> {
        self.retention.track(csr)
    }

    #[inline]
    pub fn read(&mut self, csr: u32) -> u16 {
        self.bus.read_phy_csr(csr)
    }

    /// Gives the APB access to the PHY CSRs (`true`) or hands them back to the PHY
    /// microcontroller and the hardware (`false`).
    pub fn set_csr_access(&mut self, apb: bool) {
        self.write_untracked(ddrphy::TAPBONLY | csr::MICROCONTMUXSEL, (!apb) as u16);
    }

    fn set_uc_clocks(&mut self, ucclk: bool) {
        self.write_untracked(
            ddrphy::TDRTUB | csr::UCCLKHCLKENABLES,
            UcclkHclkEnables::new_with_raw_value(0)
                .with_hclk_en(true)
                .with_ucclk_en(ucclk)
                .raw_value(),
        );
    }

    /// Saves every tracked CSR into the retention area at `base`.
    pub fn save_retention(&mut self, base: usize) -> Result<(), Error> {
        self.set_csr_access(true);
        self.set_uc_clocks(true);
        let result = self
            .retention
            .reg_interface(&mut *self.bus, RegInstr::SaveRegs, base);
        self.set_uc_clocks(false);
        self.set_csr_access(false);
        result
    }
}

/// Runs the PHY initialization steps C to J.
///
/// Without `skip_training`, the training firmware runs and `dram_type` selects the image
/// sizes. With `skip_training`, default delays are programmed instead and are expected to be
/// overwritten by [restore_sequence]. With `save`, the tracked CSRs are saved to the
/// retention area at `retention_base` afterwards.
#[allow(clippy::too_many_arguments)]
pub fn sequence<B: RegisterBus, C: Clock>(
    phy: &mut Phy<'_, B, C>,
    dram_type: DramType,
    input: &PhyInput,
    overrides: &MessageBlock,
    fw: &FirmwareImages<'_>,
    skip_training: bool,
    save: bool,
    retention_base: usize,
) -> Result<(), Error> {
    let mb = calcmb::calc_message_block(dram_type, &input.uib, &input.uia, &input.uim, overrides)?;
    mb.for_each_set(dram_type, |name, value| {
        log::trace!("DDR: message block {} = {:#06x}", name, value)
    });

    phy.retention.clear();
    phy.retention.start_tracking();
    initphyconfig::init_phy_config(phy, dram_type, input, &mb)?;

    if skip_training {
        log::debug!("DDR: PHY training skipped");
    } else {
        phy.retention.stop_tracking();
        let mut loader = FwLoader::new();
        loader.load_imem(phy, dram_type, fw.imem)?;
        loader.load_dmem(phy, dram_type, &input.uib, &mb, fw.dmem)?;
        loader.exec_fw(phy)?;
        let result = loader.read_msg_block(phy)?;
        log::info!(
            "DDR: {} training done, firmware revision {:#06x}",
            dram_type.name(),
            result.pmu_revision
        );
        phy.retention.start_tracking();
    }

    pie::load_pie(phy, dram_type, input, fw.pie)?;
    if skip_training {
        pie::prog_skip_train(phy, dram_type, input, &mb)?;
    }
    pie::track_training_results(phy, dram_type, &input.uib)?;
    pie::finish(phy, &input.uia)?;
    phy.retention.stop_tracking();

    if save {
        phy.save_retention(retention_base)?;
    }
    Ok(())
}

/// Writes back the CSRs saved in the retention area at `retention_base`.
pub fn restore_sequence<B: RegisterBus, C: Clock>(
    phy: &mut Phy<'_, B, C>,
    retention_base: usize,
) -> Result<(), Error> {
    phy.set_csr_access(true);
    phy.set_uc_clocks(true);
    phy.retention
        .reg_interface(&mut *phy.bus, RegInstr::RestoreRegs, retention_base)?;
    phy.write_untracked(ddrphy::TMASTER | csr::CALZAP, 0x1);
    phy.set_uc_clocks(false);
    phy.set_csr_access(false);
    Ok(())
}

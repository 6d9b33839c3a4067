//! PHY initialization engine (step I) and the skip-train programming.
use arbitrary_int::u4;
use stm32mp2::ddrphy::{self, csr, regs::CalRate};

use super::{Phy, PhyInput, dbyte_active, messageblock::MessageBlock};
use crate::{
    bus::RegisterBus,
    ddr::{
        DramType, Error,
        config::{UserInputAdvanced, UserInputBasic},
    },
    timeout::Clock,
};

/// One CSR write of the PHY initialization engine image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PieInstruction {
    pub address: u32,
    pub value: u16,
}

/// Sequencer delays in ns: PHY DLL lock, DRAM reset recovery, ZQ calibration and command
/// spacing.
const SEQ0B_DELAYS_NS: [u32; 4] = [500, 1000, 10_000, 25];

/// Sequencer disable flags, copied as-is.
const SEQ0B_DISABLE_FLAGS: [u16; 8] = [
    0x0000, 0x0173, 0x0060, 0x6110, 0x2152, 0xdfbd, 0xffff, 0x6152,
];

/// Trained value defaults used when the training firmware does not run.
const SKIP_TRAIN_MRL: u16 = 0x10;
const SKIP_TRAIN_TXDQS_DLY: u16 = 0x0100;
const SKIP_TRAIN_RXEN_DLY: u16 = 0x0200;
const SKIP_TRAIN_RXCLK_DLY: u16 = 0x0010;
const SKIP_TRAIN_TXDQ_DLY: u16 = 0x0080;

/// Sequencer delay registers in units of 4 DFI clocks, for `frequency` in MHz.
pub fn seq0b_delays(frequency: u32) -> [u16; 4] {
    SEQ0B_DELAYS_NS.map(|ns| (ns * frequency).div_ceil(4000) as u16)
}

/// Loads the engine image and programs the sequencer.
pub fn load_pie<B: RegisterBus, C: Clock>(
    phy: &mut Phy<'_, B, C>,
    dram_type: DramType,
    input: &PhyInput,
    image: &[PieInstruction],
) -> Result<(), Error> {
    phy.set_csr_access(true);
    for instr in image {
        phy.write(instr.address, instr.value)?;
    }
    log::debug!("DDR: {} PIE instructions loaded", image.len());

    for (i, delay) in seq0b_delays(input.uib.frequency).into_iter().enumerate() {
        phy.write(ddrphy::TINITENG | (csr::SEQ0BDLY0 + i as u32), delay)?;
    }
    for (i, flag) in SEQ0B_DISABLE_FLAGS.into_iter().enumerate() {
        phy.write(ddrphy::TINITENG | (csr::SEQ0BDISABLEFLAG0 + i as u32), flag)?;
    }

    if dram_type == DramType::Lpddr4 && input.uia.phy_mstr_train_interval != 0 {
        let setup = ((input.uia.phy_mstr_max_req_to_ack & 0x7) << 4)
            | (input.uia.phy_mstr_train_interval & 0xf);
        phy.write(ddrphy::TMASTER | csr::PPTTRAINSETUP, setup as u16)?;
    }
    Ok(())
}

/// Programs the values the training would have produced. On a standby exit they are
/// overwritten by the retention restore.
pub fn prog_skip_train<B: RegisterBus, C: Clock>(
    phy: &mut Phy<'_, B, C>,
    dram_type: DramType,
    input: &PhyInput,
    mb: &MessageBlock,
) -> Result<(), Error> {
    let vref = mb.phy_vref.unwrap_or(0) as u16;
    for dbyte in 0..input.uib.num_dbyte.min(ddrphy::NUM_DBYTE) {
        if !dbyte_active(dram_type, &input.uib, dbyte) {
            continue;
        }
        phy.write(ddrphy::dbyte(dbyte) | csr::DFIMRL, SKIP_TRAIN_MRL)?;
        for nibble in 0..ddrphy::NUM_NIBBLES_PER_DBYTE {
            let base = ddrphy::dbyte_lane(dbyte, nibble);
            phy.write(base | csr::TXDQSDLYTG0, SKIP_TRAIN_TXDQS_DLY)?;
            phy.write(base | csr::RXENDLYTG0, SKIP_TRAIN_RXEN_DLY)?;
            phy.write(base | csr::RXCLKDLYTG0, SKIP_TRAIN_RXCLK_DLY)?;
        }
        for lane in 0..ddrphy::NUM_LANES_PER_DBYTE {
            let base = ddrphy::dbyte_lane(dbyte, lane);
            phy.write(base | csr::TXDQDLYTG0, SKIP_TRAIN_TXDQ_DLY)?;
            phy.write(base | csr::VREFDAC0, vref)?;
        }
    }
    phy.write(ddrphy::TMASTER | csr::HWTMRL, SKIP_TRAIN_MRL)
}

/// Records the CSRs which are written by the training firmware.
pub fn track_training_results<B: RegisterBus, C: Clock>(
    phy: &mut Phy<'_, B, C>,
    dram_type: DramType,
    uib: &UserInputBasic,
) -> Result<(), Error> {
    for dbyte in 0..uib.num_dbyte.min(ddrphy::NUM_DBYTE) {
        if !dbyte_active(dram_type, uib, dbyte) {
            continue;
        }
        phy.track(ddrphy::dbyte(dbyte) | csr::DFIMRL)?;
        for nibble in 0..ddrphy::NUM_NIBBLES_PER_DBYTE {
            let base = ddrphy::dbyte_lane(dbyte, nibble);
            phy.track(base | csr::RXENDLYTG0)?;
            phy.track(base | csr::RXCLKDLYTG0)?;
            phy.track(base | csr::TXDQSDLYTG0)?;
        }
        for lane in 0..ddrphy::NUM_LANES_PER_DBYTE {
            let base = ddrphy::dbyte_lane(dbyte, lane);
            phy.track(base | csr::VREFDAC0)?;
            phy.track(base | csr::TXDQDLYTG0)?;
            phy.track(base | csr::RXPBDLYTG0)?;
        }
    }
    phy.track(ddrphy::TMASTER | csr::HWTMRL)
}

/// Step J: starts the periodic impedance calibration, gates the microcontroller clock and
/// hands the CSRs back to the hardware.
pub fn finish<B: RegisterBus, C: Clock>(
    phy: &mut Phy<'_, B, C>,
    uia: &UserInputAdvanced,
) -> Result<(), Error> {
    phy.write_untracked(ddrphy::TMASTER | csr::CALZAP, 0x1);
    let cal_rate = CalRate::new_with_raw_value(0)
        .with_cal_run(true)
        .with_cal_once(uia.cal_once != 0)
        .with_cal_interval(u4::new((uia.cal_interval & 0xf) as u8));
    phy.write(ddrphy::TMASTER | csr::CALRATE, cal_rate.raw_value())?;
    phy.set_uc_clocks(false);
    phy.set_csr_access(false);
    Ok(())
}

//! Derivation of the message block from the PHY user input.
use super::messageblock::MessageBlock;
use crate::ddr::{
    Error,
    config::{DramType, UserInputAdvanced, UserInputBasic, UserInputModeRegisters},
};

/// Training steps: DevInit, WrLvl, RxEn, RdDQS1D, WrDQ1D, RdDeskew, MxRdLat.
const SEQUENCE_CTRL_DDR3: u16 = 0x031f;
/// Like DDR3, with DDR4 read and write VREF training.
const SEQUENCE_CTRL_DDR4: u16 = 0x831f;
/// Like DDR3, without read deskew, with LPDDR4 CA training.
const SEQUENCE_CTRL_LPDDR4: u16 = 0x121f;

/// Firmware message verbosity: stage completion messages only.
const HDT_CTRL_STAGES: u8 = 0xc8;

/// Resistor value which is encoded as 0 in the message block.
const DEFAULT_CAL_RES_OHM: u32 = 240;

/// Receiver VREF seed, in steps of VDDQ/128.
const fn default_phy_vref(dram_type: DramType) -> u8 {
    match dram_type {
        DramType::Ddr3 => 0x40,
        DramType::Ddr4 => 0x56,
        DramType::Lpddr4 => 0x14,
    }
}

const fn rank_mask(num_rank: u32) -> u8 {
    ((1u32 << num_rank) - 1) as u8
}

/// Builds the message block of p-state 0.
///
/// Fields present in `overrides` are taken as they are, every other field is derived from the
/// user input.
pub fn calc_message_block(
    dram_type: DramType,
    uib: &UserInputBasic,
    uia: &UserInputAdvanced,
    uim: &UserInputModeRegisters,
    overrides: &MessageBlock,
) -> Result<MessageBlock, Error> {
    if uib.num_pstates > 1 {
        return Err(Error::TooManyPStates(uib.num_pstates));
    }
    let mut mb = MessageBlock::EMPTY;
    mb.apply_overrides(overrides);

    mb.pstate.get_or_insert(0);
    mb.pll_bypass_en.get_or_insert(uib.pll_bypass as u8);
    mb.dram_freq.get_or_insert((uib.frequency * 2) as u16);
    mb.dfi_freq_ratio.get_or_insert(1 << uib.dfi_freq_ratio);
    mb.bpznres_val.get_or_insert(if uia.ext_cal_res_val == DEFAULT_CAL_RES_OHM {
        0
    } else {
        uia.ext_cal_res_val as u8
    });
    mb.phy_odt_impedance.get_or_insert(uia.odt_impedance as u8);
    mb.phy_drv_impedance.get_or_insert(uia.tx_impedance as u8);
    mb.phy_vref.get_or_insert(default_phy_vref(dram_type));
    mb.phy_cfg.get_or_insert(uia.is_2t_timing as u8);
    mb.hdt_ctrl.get_or_insert(HDT_CTRL_STAGES);

    match dram_type {
        DramType::Ddr3 | DramType::Ddr4 => {
            let (type_code, sequence_ctrl) = if dram_type == DramType::Ddr3 {
                (0x03, SEQUENCE_CTRL_DDR3)
            } else {
                (0x02, SEQUENCE_CTRL_DDR4)
            };
            mb.dram_type.get_or_insert(type_code);
            mb.sequence_ctrl.get_or_insert(sequence_ctrl);
            mb.disabled_dbyte.get_or_insert(0);
            mb.enabled_dqs
                .get_or_insert((uib.num_active_dbyte_dfi0 * 8) as u8);
            let cs = rank_mask(uib.num_rank_dfi0);
            mb.cs_present.get_or_insert(cs);
            mb.cs_present_d0.get_or_insert(cs);
            mb.cs_present_d1.get_or_insert(0);
            mb.addr_mirror.get_or_insert(0);
            mb.mr0.get_or_insert(uim.mr0 as u16);
            mb.mr1.get_or_insert(uim.mr1 as u16);
            mb.mr2.get_or_insert(uim.mr2 as u16);
            mb.mr3.get_or_insert(uim.mr3 as u16);
            mb.mr4.get_or_insert(uim.mr4 as u16);
            mb.mr5.get_or_insert(uim.mr5 as u16);
            mb.mr6.get_or_insert(uim.mr6 as u16);
        }
        DramType::Lpddr4 => {
            mb.lp4_misc.get_or_insert(0);
            mb.sequence_ctrl.get_or_insert(SEQUENCE_CTRL_LPDDR4);
            mb.enabled_dqs_cha
                .get_or_insert((uib.num_active_dbyte_dfi0 * 8) as u8);
            mb.cs_present_cha.get_or_insert(if uib.num_active_dbyte_dfi0 != 0 {
                rank_mask(uib.num_rank_dfi0)
            } else {
                0
            });
            mb.enabled_dqs_chb
                .get_or_insert((uib.num_active_dbyte_dfi1 * 8) as u8);
            mb.cs_present_chb.get_or_insert(if uib.num_active_dbyte_dfi1 != 0 {
                rank_mask(uib.num_rank_dfi1)
            } else {
                0
            });
            // LPDDR4 mode registers are a single byte.
            mb.mr1.get_or_insert((uim.mr1 & 0xff) as u16);
            mb.mr2.get_or_insert((uim.mr2 & 0xff) as u16);
            mb.mr3.get_or_insert((uim.mr3 & 0xff) as u16);
            mb.mr4.get_or_insert((uim.mr4 & 0xff) as u16);
            mb.mr11.get_or_insert(uim.mr11 as u8);
            mb.mr12.get_or_insert(uim.mr12 as u8);
            mb.mr13.get_or_insert(uim.mr13 as u8);
            mb.mr14.get_or_insert(uim.mr14 as u8);
            mb.mr16.get_or_insert(uim.mr16 as u8);
            mb.mr17.get_or_insert(uim.mr17 as u8);
            mb.mr22.get_or_insert(uim.mr22 as u8);
            mb.mr24.get_or_insert(uim.mr24 as u8);
        }
    }
    Ok(mb)
}

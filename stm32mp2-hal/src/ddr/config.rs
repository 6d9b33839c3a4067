//! Static DDR configuration.
//!
//! One [DdrConfig] exists per board and memory variant. The controller groups are raw register
//! values which are copied as-is, the PHY groups are the user input of the PHY initialization.
use crate::{clocks::pll::DdrPllConfig, time::KiloHertz};

use super::phyinit::messageblock::MessageBlock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DramType {
    Ddr3,
    Ddr4,
    Lpddr4,
}

impl DramType {
    pub const fn name(&self) -> &'static str {
        match self {
            DramType::Ddr3 => "DDR3",
            DramType::Ddr4 => "DDR4",
            DramType::Lpddr4 => "LPDDR4",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DdrInfo {
    pub name: &'static str,
    pub speed: KiloHertz,
    /// Memory size in bytes.
    pub size: u64,
}

/// Controller registers which are programmed once before the PHY initialization.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DdrcReg {
    pub mstr: u32,
    pub mrctrl0: u32,
    pub mrctrl1: u32,
    pub mrctrl2: u32,
    pub derateen: u32,
    pub derateint: u32,
    pub deratectl: u32,
    pub pwrctl: u32,
    pub pwrtmg: u32,
    pub hwlpctl: u32,
    pub rfshctl0: u32,
    pub rfshctl1: u32,
    pub rfshctl3: u32,
    pub crcparctl0: u32,
    pub crcparctl1: u32,
    pub init0: u32,
    pub init1: u32,
    pub init2: u32,
    pub init3: u32,
    pub init4: u32,
    pub init5: u32,
    pub init6: u32,
    pub init7: u32,
    pub dimmctl: u32,
    pub rankctl: u32,
    pub rankctl1: u32,
    pub zqctl0: u32,
    pub zqctl1: u32,
    pub zqctl2: u32,
    pub dfitmg0: u32,
    pub dfitmg1: u32,
    pub dfilpcfg0: u32,
    pub dfilpcfg1: u32,
    pub dfiupd0: u32,
    pub dfiupd1: u32,
    pub dfiupd2: u32,
    pub dfimisc: u32,
    pub dfitmg2: u32,
    pub dbictl: u32,
    pub dfiphymstr: u32,
    pub odtmap: u32,
    pub dbg0: u32,
    pub dbg1: u32,
    pub dbgcmd: u32,
    pub swctlstatic: u32,
    pub poisoncfg: u32,
    pub pccfg: u32,
}

/// DRAM timing registers.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DdrcTiming {
    pub rfshtmg: u32,
    pub rfshtmg1: u32,
    pub dramtmg0: u32,
    pub dramtmg1: u32,
    pub dramtmg2: u32,
    pub dramtmg3: u32,
    pub dramtmg4: u32,
    pub dramtmg5: u32,
    pub dramtmg6: u32,
    pub dramtmg7: u32,
    pub dramtmg8: u32,
    pub dramtmg9: u32,
    pub dramtmg10: u32,
    pub dramtmg11: u32,
    pub dramtmg12: u32,
    pub dramtmg13: u32,
    pub dramtmg14: u32,
    pub dramtmg15: u32,
    pub odtcfg: u32,
}

/// Address map registers.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DdrcMap {
    pub addrmap0: u32,
    pub addrmap1: u32,
    pub addrmap2: u32,
    pub addrmap3: u32,
    pub addrmap4: u32,
    pub addrmap5: u32,
    pub addrmap6: u32,
    pub addrmap8: u32,
    pub addrmap9: u32,
    pub addrmap10: u32,
    pub addrmap11: u32,
}

/// Scheduler and port QoS registers. These values are opaque and passed through unchanged. The
/// port enables are not part of this group, they are driven by the init sequence.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DdrcPerf {
    pub sched: u32,
    pub sched1: u32,
    pub perfhpr1: u32,
    pub perflpr1: u32,
    pub perfwr1: u32,
    pub sched3: u32,
    pub sched4: u32,
    pub pcfgr_0: u32,
    pub pcfgw_0: u32,
    pub pcfgqos0_0: u32,
    pub pcfgqos1_0: u32,
    pub pcfgwqos0_0: u32,
    pub pcfgwqos1_0: u32,
    pub pcfgr_1: u32,
    pub pcfgw_1: u32,
    pub pcfgqos0_1: u32,
    pub pcfgqos1_1: u32,
    pub pcfgwqos0_1: u32,
    pub pcfgwqos1_1: u32,
}

/// Basic PHY user input: topology and operating point.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UserInputBasic {
    /// 0: unbuffered/discrete devices, 1: registered DIMM.
    pub dimm_type: u32,
    pub lp4x_mode: u32,
    pub num_dbyte: u32,
    pub num_active_dbyte_dfi0: u32,
    pub num_active_dbyte_dfi1: u32,
    pub num_anib: u32,
    pub num_rank_dfi0: u32,
    pub num_rank_dfi1: u32,
    /// Width of a single DRAM device, 4, 8 or 16.
    pub dram_data_width: u32,
    pub num_pstates: u32,
    /// DDR clock frequency in MHz (half the data rate).
    pub frequency: u32,
    pub pll_bypass: u32,
    /// 1 for a 1:2 DFI frequency ratio, 2 for 1:4.
    pub dfi_freq_ratio: u32,
    pub dfi1_exists: u32,
    pub read_dbi_enable: u32,
    pub dfi_mode: u32,
}

/// Advanced PHY user input: electrical settings and feature enables.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UserInputAdvanced {
    pub d4_rx_preamble_length: u32,
    pub d4_tx_preamble_length: u32,
    /// External calibration resistor value in Ohm.
    pub ext_cal_res_val: u32,
    pub is_2t_timing: u32,
    /// Receiver ODT in Ohm, 0 disables the termination.
    pub odt_impedance: u32,
    /// Data driver impedance in Ohm.
    pub tx_impedance: u32,
    /// Address/command driver impedance in Ohm.
    pub atx_impedance: u32,
    pub mem_alert_en: u32,
    pub mem_alert_pu_imp: u32,
    pub mem_alert_vref_level: u32,
    pub mem_alert_sync_bypass: u32,
    pub dis_dyn_adr_tri: u32,
    pub phy_mstr_train_interval: u32,
    pub phy_mstr_max_req_to_ack: u32,
    pub wdqs_ext: u32,
    pub cal_interval: u32,
    pub cal_once: u32,
    pub dram_byte_swap: u32,
    pub tx_slew_rise_dq: u32,
    pub tx_slew_fall_dq: u32,
    pub tx_slew_rise_ac: u32,
    pub tx_slew_fall_ac: u32,
    pub disable_unused_addr_lns: u32,
    pub en_tdqs2dq_tracking: u32,
    pub en_rx_dqs_tracking: u32,
}

/// DRAM mode registers, as they are written by the training firmware.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UserInputModeRegisters {
    pub mr0: u32,
    pub mr1: u32,
    pub mr2: u32,
    pub mr3: u32,
    pub mr4: u32,
    pub mr5: u32,
    pub mr6: u32,
    pub mr11: u32,
    pub mr12: u32,
    pub mr13: u32,
    pub mr14: u32,
    pub mr16: u32,
    pub mr17: u32,
    pub mr22: u32,
    pub mr24: u32,
}

/// Number of swizzle CSRs: the hardware training address/command swizzle followed by the
/// DQ lane swizzle of every data byte.
pub const NB_HWT_SWIZZLE: usize = 12;
pub const NB_DQ_SWIZZLE: usize = 32;
pub const NB_SWIZZLE: usize = NB_HWT_SWIZZLE + NB_DQ_SWIZZLE;

/// PHY swizzle settings, written directly to the PHY CSRs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserInputSwizzle {
    pub swizzle: [u16; NB_SWIZZLE],
}

impl UserInputSwizzle {
    /// Straight routing: every lane maps to itself.
    pub const fn identity() -> Self {
        let mut swizzle = [0; NB_SWIZZLE];
        let mut i = 0;
        while i < NB_SWIZZLE {
            swizzle[i] = if i < NB_HWT_SWIZZLE {
                i as u16
            } else {
                ((i - NB_HWT_SWIZZLE) % 8) as u16
            };
            i += 1;
        }
        Self { swizzle }
    }
}

impl Default for UserInputSwizzle {
    fn default() -> Self {
        Self::identity()
    }
}

/// Complete configuration of one board and memory variant.
#[derive(Debug, Clone)]
pub struct DdrConfig {
    pub info: DdrInfo,
    pub dram_type: DramType,
    pub reg: DdrcReg,
    pub timing: DdrcTiming,
    pub map: DdrcMap,
    pub perf: DdrcPerf,
    pub uib: UserInputBasic,
    pub uia: UserInputAdvanced,
    pub uim: UserInputModeRegisters,
    pub uis: UserInputSwizzle,
    /// Message block fields which must not be derived from the user input.
    pub mb_overrides: MessageBlock,
    /// PLL2 settings. If absent, PLL2 is expected to be configured already.
    pub pll: Option<DdrPllConfig>,
}

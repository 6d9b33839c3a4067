//! Register and parameter descriptor tables.
//!
//! Every register group of [DdrConfig](super::DdrConfig) is described by a static table of
//! [RegDesc] entries. An entry names the register, tells where the value goes and gives typed
//! accessors into the parameter struct. The tables drive the register programming during init
//! and the name based lookup of the interactive console.
use stm32mp2::{
    ddrc::offset,
    ddrphy::{self, csr},
};

use super::{
    Error,
    config::{
        DdrConfig, DdrcMap, DdrcPerf, DdrcReg, DdrcTiming, NB_HWT_SWIZZLE, UserInputAdvanced,
        UserInputBasic, UserInputModeRegisters, UserInputSwizzle,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegGroup {
    Reg,
    Timing,
    Map,
    Perf,
    PhyUib,
    PhyUia,
    PhyUim,
    PhyUis,
}

impl RegGroup {
    pub const ALL: [RegGroup; 8] = [
        RegGroup::Reg,
        RegGroup::Timing,
        RegGroup::Map,
        RegGroup::Perf,
        RegGroup::PhyUib,
        RegGroup::PhyUia,
        RegGroup::PhyUim,
        RegGroup::PhyUis,
    ];

    pub const fn name(&self) -> &'static str {
        match self {
            RegGroup::Reg => "static",
            RegGroup::Timing => "timing",
            RegGroup::Map => "map",
            RegGroup::Perf => "perf",
            RegGroup::PhyUib => "uib",
            RegGroup::PhyUia => "uia",
            RegGroup::PhyUim => "uim",
            RegGroup::PhyUis => "uis",
        }
    }

    /// Prefix used for the `#define` names of the board configuration header.
    pub const fn define_prefix(&self) -> &'static str {
        match self {
            RegGroup::PhyUib => "UIB_",
            RegGroup::PhyUia => "UIA_",
            RegGroup::PhyUim => "UIM_",
            RegGroup::PhyUis => "UIS_",
            _ => "",
        }
    }

    #[inline]
    pub const fn is_phy(&self) -> bool {
        matches!(
            self,
            RegGroup::PhyUib | RegGroup::PhyUia | RegGroup::PhyUim | RegGroup::PhyUis
        )
    }
}

/// Whether a controller register may only be written inside a `SWCTL.sw_done` window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuasiDynamic {
    No,
    Yes,
}

/// Destination of a descriptor value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegTarget {
    /// 32-bit controller register at the given byte offset.
    Ddrc(usize),
    /// 16-bit PHY CSR at the given PHY address.
    PhyCsr(u32),
    /// Driver internal parameter, consumed by the PHY initialization.
    Param,
}

/// Typed accessors into the parameter struct `T`.
#[derive(Debug, Clone, Copy)]
pub struct ParamAccess<T: 'static> {
    pub get: fn(&T) -> u32,
    pub set: fn(&mut T, u32),
}

#[derive(Debug, Clone, Copy)]
pub struct RegDesc<T: 'static> {
    pub name: &'static str,
    pub target: RegTarget,
    pub qd: QuasiDynamic,
    /// Absent for an entry which has no backing parameter field, which is a table bug.
    pub access: Option<ParamAccess<T>>,
}

macro_rules! ddrc_table {
    ($params:ty { $($field:ident: $qd:ident),* $(,)? }) => {
        &[$(
            paste::paste! {
                RegDesc::<$params> {
                    name: stringify!($field),
                    target: RegTarget::Ddrc(offset::[<$field:upper>]),
                    qd: QuasiDynamic::$qd,
                    access: Some(ParamAccess {
                        get: |p: &$params| p.$field,
                        set: |p: &mut $params, v: u32| p.$field = v,
                    }),
                }
            }
        ),*]
    };
}

macro_rules! param_table {
    ($params:ty { $($field:ident),* $(,)? }) => {
        &[$(
            RegDesc::<$params> {
                name: stringify!($field),
                target: RegTarget::Param,
                qd: QuasiDynamic::No,
                access: Some(ParamAccess {
                    get: |p: &$params| p.$field,
                    set: |p: &mut $params, v: u32| p.$field = v,
                }),
            }
        ),*]
    };
}

macro_rules! swizzle_table {
    ($($idx:literal),* $(,)?) => {
        &[$(
            RegDesc::<UserInputSwizzle> {
                name: concat!("swizzle_", $idx),
                target: RegTarget::PhyCsr(swizzle_csr($idx)),
                qd: QuasiDynamic::No,
                access: Some(ParamAccess {
                    get: |p: &UserInputSwizzle| p.swizzle[$idx] as u32,
                    set: |p: &mut UserInputSwizzle, v: u32| p.swizzle[$idx] = v as u16,
                }),
            }
        ),*]
    };
}

/// PHY CSR address of swizzle entry `idx`. The first entries are the hardware training swizzle
/// of the master block, followed by the 8 `DqNLnSel` CSRs of each data byte.
pub const fn swizzle_csr(idx: usize) -> u32 {
    if idx < NB_HWT_SWIZZLE {
        ddrphy::TMASTER | (csr::HWTSWIZZLEHWTADDRESS0 + idx as u32)
    } else {
        let dq = (idx - NB_HWT_SWIZZLE) as u32;
        ddrphy::dbyte(dq / 8) | (csr::DQ0LNSEL + dq % 8)
    }
}

pub static DDRC_REG: &[RegDesc<DdrcReg>] = ddrc_table!(DdrcReg {
    mstr: Yes,
    mrctrl0: No,
    mrctrl1: No,
    mrctrl2: No,
    derateen: Yes,
    derateint: Yes,
    deratectl: No,
    pwrctl: No,
    pwrtmg: Yes,
    hwlpctl: Yes,
    rfshctl0: Yes,
    rfshctl1: Yes,
    rfshctl3: Yes,
    crcparctl0: No,
    crcparctl1: No,
    init0: Yes,
    init1: Yes,
    init2: Yes,
    init3: Yes,
    init4: Yes,
    init5: Yes,
    init6: Yes,
    init7: Yes,
    dimmctl: Yes,
    rankctl: Yes,
    rankctl1: Yes,
    zqctl0: Yes,
    zqctl1: No,
    zqctl2: No,
    dfitmg0: Yes,
    dfitmg1: Yes,
    dfilpcfg0: No,
    dfilpcfg1: No,
    dfiupd0: Yes,
    dfiupd1: No,
    dfiupd2: No,
    dfimisc: Yes,
    dfitmg2: Yes,
    dbictl: Yes,
    dfiphymstr: No,
    odtmap: No,
    dbg0: No,
    dbg1: No,
    dbgcmd: No,
    swctlstatic: No,
    poisoncfg: No,
    pccfg: No,
});

pub static DDRC_TIMING: &[RegDesc<DdrcTiming>] = ddrc_table!(DdrcTiming {
    rfshtmg: Yes,
    rfshtmg1: Yes,
    dramtmg0: Yes,
    dramtmg1: Yes,
    dramtmg2: Yes,
    dramtmg3: Yes,
    dramtmg4: Yes,
    dramtmg5: Yes,
    dramtmg6: Yes,
    dramtmg7: Yes,
    dramtmg8: Yes,
    dramtmg9: Yes,
    dramtmg10: Yes,
    dramtmg11: Yes,
    dramtmg12: Yes,
    dramtmg13: Yes,
    dramtmg14: Yes,
    dramtmg15: Yes,
    odtcfg: Yes,
});

pub static DDRC_MAP: &[RegDesc<DdrcMap>] = ddrc_table!(DdrcMap {
    addrmap0: No,
    addrmap1: No,
    addrmap2: No,
    addrmap3: No,
    addrmap4: No,
    addrmap5: No,
    addrmap6: No,
    addrmap8: No,
    addrmap9: No,
    addrmap10: No,
    addrmap11: No,
});

pub static DDRC_PERF: &[RegDesc<DdrcPerf>] = ddrc_table!(DdrcPerf {
    sched: Yes,
    sched1: No,
    perfhpr1: Yes,
    perflpr1: Yes,
    perfwr1: Yes,
    sched3: No,
    sched4: No,
    pcfgr_0: No,
    pcfgw_0: No,
    pcfgqos0_0: No,
    pcfgqos1_0: No,
    pcfgwqos0_0: No,
    pcfgwqos1_0: No,
    pcfgr_1: No,
    pcfgw_1: No,
    pcfgqos0_1: No,
    pcfgqos1_1: No,
    pcfgwqos0_1: No,
    pcfgwqos1_1: No,
});

pub static PHY_UIB: &[RegDesc<UserInputBasic>] = param_table!(UserInputBasic {
    dimm_type,
    lp4x_mode,
    num_dbyte,
    num_active_dbyte_dfi0,
    num_active_dbyte_dfi1,
    num_anib,
    num_rank_dfi0,
    num_rank_dfi1,
    dram_data_width,
    num_pstates,
    frequency,
    pll_bypass,
    dfi_freq_ratio,
    dfi1_exists,
    read_dbi_enable,
    dfi_mode,
});

pub static PHY_UIA: &[RegDesc<UserInputAdvanced>] = param_table!(UserInputAdvanced {
    d4_rx_preamble_length,
    d4_tx_preamble_length,
    ext_cal_res_val,
    is_2t_timing,
    odt_impedance,
    tx_impedance,
    atx_impedance,
    mem_alert_en,
    mem_alert_pu_imp,
    mem_alert_vref_level,
    mem_alert_sync_bypass,
    dis_dyn_adr_tri,
    phy_mstr_train_interval,
    phy_mstr_max_req_to_ack,
    wdqs_ext,
    cal_interval,
    cal_once,
    dram_byte_swap,
    tx_slew_rise_dq,
    tx_slew_fall_dq,
    tx_slew_rise_ac,
    tx_slew_fall_ac,
    disable_unused_addr_lns,
    en_tdqs2dq_tracking,
    en_rx_dqs_tracking,
});

pub static PHY_UIM: &[RegDesc<UserInputModeRegisters>] = param_table!(UserInputModeRegisters {
    mr0, mr1, mr2, mr3, mr4, mr5, mr6, mr11, mr12, mr13, mr14, mr16, mr17, mr22, mr24,
});

pub static PHY_UIS: &[RegDesc<UserInputSwizzle>] = swizzle_table!(
    0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24,
    25, 26, 27, 28, 29, 30, 31, 32, 33, 34, 35, 36, 37, 38, 39, 40, 41, 42, 43,
);

/// Evaluates `$body` with `$table` bound to the descriptor table of `$group`.
macro_rules! with_table {
    ($group:expr, $table:ident => $body:expr) => {
        match $group {
            $crate::ddr::regs::RegGroup::Reg => {
                let $table = $crate::ddr::regs::DDRC_REG;
                $body
            }
            $crate::ddr::regs::RegGroup::Timing => {
                let $table = $crate::ddr::regs::DDRC_TIMING;
                $body
            }
            $crate::ddr::regs::RegGroup::Map => {
                let $table = $crate::ddr::regs::DDRC_MAP;
                $body
            }
            $crate::ddr::regs::RegGroup::Perf => {
                let $table = $crate::ddr::regs::DDRC_PERF;
                $body
            }
            $crate::ddr::regs::RegGroup::PhyUib => {
                let $table = $crate::ddr::regs::PHY_UIB;
                $body
            }
            $crate::ddr::regs::RegGroup::PhyUia => {
                let $table = $crate::ddr::regs::PHY_UIA;
                $body
            }
            $crate::ddr::regs::RegGroup::PhyUim => {
                let $table = $crate::ddr::regs::PHY_UIM;
                $body
            }
            $crate::ddr::regs::RegGroup::PhyUis => {
                let $table = $crate::ddr::regs::PHY_UIS;
                $body
            }
        }
    };
}
pub(crate) use with_table;

/// Like [with_table], also binding `$params` to the matching group of a [DdrConfig]. The
/// borrow kind is given in brackets.
macro_rules! with_params {
    ($group:expr, [$($borrow:tt)+] $cfg:ident, $table:ident, $params:ident => $body:expr) => {
        match $group {
            RegGroup::Reg => {
                let ($table, $params) = (DDRC_REG, $($borrow)+ $cfg.reg);
                $body
            }
            RegGroup::Timing => {
                let ($table, $params) = (DDRC_TIMING, $($borrow)+ $cfg.timing);
                $body
            }
            RegGroup::Map => {
                let ($table, $params) = (DDRC_MAP, $($borrow)+ $cfg.map);
                $body
            }
            RegGroup::Perf => {
                let ($table, $params) = (DDRC_PERF, $($borrow)+ $cfg.perf);
                $body
            }
            RegGroup::PhyUib => {
                let ($table, $params) = (PHY_UIB, $($borrow)+ $cfg.uib);
                $body
            }
            RegGroup::PhyUia => {
                let ($table, $params) = (PHY_UIA, $($borrow)+ $cfg.uia);
                $body
            }
            RegGroup::PhyUim => {
                let ($table, $params) = (PHY_UIM, $($borrow)+ $cfg.uim);
                $body
            }
            RegGroup::PhyUis => {
                let ($table, $params) = (PHY_UIS, $($borrow)+ $cfg.uis);
                $body
            }
        }
    };
}

/// Reference to one descriptor, independent of its parameter type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegRef {
    pub group: RegGroup,
    pub index: usize,
}

impl RegRef {
    pub fn name(&self) -> &'static str {
        with_table!(self.group, table => table[self.index].name)
    }

    pub fn target(&self) -> RegTarget {
        with_table!(self.group, table => table[self.index].target)
    }

    pub fn qd(&self) -> QuasiDynamic {
        with_table!(self.group, table => table[self.index].qd)
    }

    /// Configured value of the entry.
    pub fn get(&self, cfg: &DdrConfig) -> Result<u32, Error> {
        with_params!(self.group, [&] cfg, table, params => {
            let desc = &table[self.index];
            let access = desc.access.ok_or(Error::InvalidDescriptor(desc.name))?;
            Ok((access.get)(params))
        })
    }

    /// Changes the configured value of the entry. The hardware is not touched.
    pub fn set(&self, cfg: &mut DdrConfig, value: u32) -> Result<(), Error> {
        with_params!(self.group, [&mut] cfg, table, params => {
            let desc = &table[self.index];
            let access = desc.access.ok_or(Error::InvalidDescriptor(desc.name))?;
            (access.set)(params, value);
            Ok(())
        })
    }
}

pub fn table_len(group: RegGroup) -> usize {
    with_table!(group, table => table.len())
}

/// Looks up a register or parameter by name, ignoring case.
pub fn find_reg(name: &str) -> Option<RegRef> {
    RegGroup::ALL.into_iter().find_map(|group| {
        with_table!(group, table => table
            .iter()
            .position(|desc| desc.name.eq_ignore_ascii_case(name))
            .map(|index| RegRef { group, index }))
    })
}

/// Copies every parameter of a table from `src` to `dst`.
pub fn copy_params<T>(table: &[RegDesc<T>], src: &T, dst: &mut T) -> Result<(), &'static str> {
    for desc in table {
        let access = desc.access.as_ref().ok_or(desc.name)?;
        (access.set)(dst, (access.get)(src));
    }
    Ok(())
}

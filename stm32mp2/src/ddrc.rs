//! uMCTL2 DDR controller (DDRC)
//!
//! Only the registers which are read back or modified bit-wise by the DDR driver are modelled as
//! bitfields. The remaining registers are plain 32-bit configuration words which are copied from
//! board specific tables, so only their offsets are provided in [offset].
use crate::impl_register;

pub const DDRC_BASE_ADDR: usize = 0x4804_0000;

/// Byte offsets of the controller registers relative to [DDRC_BASE_ADDR].
pub mod offset {
    pub const MSTR: usize = 0x000;
    pub const STAT: usize = 0x004;
    pub const MRCTRL0: usize = 0x010;
    pub const MRCTRL1: usize = 0x014;
    pub const MRSTAT: usize = 0x018;
    pub const MRCTRL2: usize = 0x01c;
    pub const DERATEEN: usize = 0x020;
    pub const DERATEINT: usize = 0x024;
    pub const DERATECTL: usize = 0x02c;
    pub const PWRCTL: usize = 0x030;
    pub const PWRTMG: usize = 0x034;
    pub const HWLPCTL: usize = 0x038;
    pub const RFSHCTL0: usize = 0x050;
    pub const RFSHCTL1: usize = 0x054;
    pub const RFSHCTL3: usize = 0x060;
    pub const RFSHTMG: usize = 0x064;
    pub const RFSHTMG1: usize = 0x068;
    pub const CRCPARCTL0: usize = 0x0c0;
    pub const CRCPARCTL1: usize = 0x0c4;
    pub const CRCPARSTAT: usize = 0x0cc;
    pub const INIT0: usize = 0x0d0;
    pub const INIT1: usize = 0x0d4;
    pub const INIT2: usize = 0x0d8;
    pub const INIT3: usize = 0x0dc;
    pub const INIT4: usize = 0x0e0;
    pub const INIT5: usize = 0x0e4;
    pub const INIT6: usize = 0x0e8;
    pub const INIT7: usize = 0x0ec;
    pub const DIMMCTL: usize = 0x0f0;
    pub const RANKCTL: usize = 0x0f4;
    pub const RANKCTL1: usize = 0x0f8;
    pub const DRAMTMG0: usize = 0x100;
    pub const DRAMTMG1: usize = 0x104;
    pub const DRAMTMG2: usize = 0x108;
    pub const DRAMTMG3: usize = 0x10c;
    pub const DRAMTMG4: usize = 0x110;
    pub const DRAMTMG5: usize = 0x114;
    pub const DRAMTMG6: usize = 0x118;
    pub const DRAMTMG7: usize = 0x11c;
    pub const DRAMTMG8: usize = 0x120;
    pub const DRAMTMG9: usize = 0x124;
    pub const DRAMTMG10: usize = 0x128;
    pub const DRAMTMG11: usize = 0x12c;
    pub const DRAMTMG12: usize = 0x130;
    pub const DRAMTMG13: usize = 0x134;
    pub const DRAMTMG14: usize = 0x138;
    pub const DRAMTMG15: usize = 0x13c;
    pub const ZQCTL0: usize = 0x180;
    pub const ZQCTL1: usize = 0x184;
    pub const ZQCTL2: usize = 0x188;
    pub const ZQSTAT: usize = 0x18c;
    pub const DFITMG0: usize = 0x190;
    pub const DFITMG1: usize = 0x194;
    pub const DFILPCFG0: usize = 0x198;
    pub const DFILPCFG1: usize = 0x19c;
    pub const DFIUPD0: usize = 0x1a0;
    pub const DFIUPD1: usize = 0x1a4;
    pub const DFIUPD2: usize = 0x1a8;
    pub const DFIMISC: usize = 0x1b0;
    pub const DFITMG2: usize = 0x1b4;
    pub const DFISTAT: usize = 0x1bc;
    pub const DBICTL: usize = 0x1c0;
    pub const DFIPHYMSTR: usize = 0x1c4;
    pub const ADDRMAP0: usize = 0x200;
    pub const ADDRMAP1: usize = 0x204;
    pub const ADDRMAP2: usize = 0x208;
    pub const ADDRMAP3: usize = 0x20c;
    pub const ADDRMAP4: usize = 0x210;
    pub const ADDRMAP5: usize = 0x214;
    pub const ADDRMAP6: usize = 0x218;
    pub const ADDRMAP8: usize = 0x220;
    pub const ADDRMAP9: usize = 0x224;
    pub const ADDRMAP10: usize = 0x228;
    pub const ADDRMAP11: usize = 0x22c;
    pub const ODTCFG: usize = 0x240;
    pub const ODTMAP: usize = 0x244;
    pub const SCHED: usize = 0x250;
    pub const SCHED1: usize = 0x254;
    pub const PERFHPR1: usize = 0x25c;
    pub const PERFLPR1: usize = 0x264;
    pub const PERFWR1: usize = 0x26c;
    pub const SCHED3: usize = 0x270;
    pub const SCHED4: usize = 0x274;
    pub const DBG0: usize = 0x300;
    pub const DBG1: usize = 0x304;
    pub const DBGCAM: usize = 0x308;
    pub const DBGCMD: usize = 0x30c;
    pub const DBGSTAT: usize = 0x310;
    pub const SWCTL: usize = 0x320;
    pub const SWSTAT: usize = 0x324;
    pub const SWCTLSTATIC: usize = 0x328;
    pub const POISONCFG: usize = 0x36c;
    pub const POISONSTAT: usize = 0x370;
    pub const PSTAT: usize = 0x3fc;
    pub const PCCFG: usize = 0x400;
    pub const PCFGR_0: usize = 0x404;
    pub const PCFGW_0: usize = 0x408;
    pub const PCTRL_0: usize = 0x490;
    pub const PCFGQOS0_0: usize = 0x494;
    pub const PCFGQOS1_0: usize = 0x498;
    pub const PCFGWQOS0_0: usize = 0x49c;
    pub const PCFGWQOS1_0: usize = 0x4a0;
    pub const PCFGR_1: usize = 0x4b4;
    pub const PCFGW_1: usize = 0x4b8;
    pub const PCTRL_1: usize = 0x540;
    pub const PCFGQOS0_1: usize = 0x544;
    pub const PCFGQOS1_1: usize = 0x548;
    pub const PCFGWQOS0_1: usize = 0x54c;
    pub const PCFGWQOS1_1: usize = 0x550;
}

pub mod regs {
    use arbitrary_int::{u2, u3, u4, u5, u7, u12};

    #[bitbybit::bitenum(u2, exhaustive = true)]
    #[derive(Debug, PartialEq, Eq)]
    pub enum DataBusWidth {
        Full = 0b00,
        Half = 0b01,
        Quarter = 0b10,
        Reserved = 0b11,
    }

    /// Master register. Selects the DRAM type and the basic topology.
    #[bitbybit::bitfield(u32, default = 0x0, debug)]
    pub struct Mstr {
        #[bits(30..=31, rw)]
        device_config: u2,
        #[bits(24..=25, rw)]
        active_ranks: u2,
        #[bits(16..=19, rw)]
        burst_rdwr: u4,
        #[bit(15, rw)]
        dll_off_mode: bool,
        #[bits(12..=13, rw)]
        data_bus_width: DataBusWidth,
        #[bit(9, rw)]
        en_2t_timing_mode: bool,
        #[bit(5, rw)]
        lpddr4: bool,
        #[bit(4, rw)]
        ddr4: bool,
        #[bit(0, rw)]
        ddr3: bool,
    }

    #[bitbybit::bitenum(u3, exhaustive = true)]
    #[derive(Debug, PartialEq, Eq)]
    pub enum OperatingMode {
        Init = 0,
        Normal = 1,
        Powerdown = 2,
        SelfRefresh = 3,
        Mpsm = 4,
        Reserved5 = 5,
        Reserved6 = 6,
        Reserved7 = 7,
    }

    #[bitbybit::bitenum(u2, exhaustive = true)]
    #[derive(Debug, PartialEq, Eq)]
    pub enum SelfRefreshType {
        NotInSelfRefresh = 0b00,
        /// Entered under PHY master request.
        PhyMaster = 0b01,
        /// Entered by software through `PWRCTL.selfref_sw` or by the hardware low-power
        /// interface.
        NonAutomatic = 0b10,
        /// Entered automatically after the idle period programmed in `PWRTMG`.
        Automatic = 0b11,
    }

    #[bitbybit::bitfield(u32, default = 0x0, debug)]
    pub struct Stat {
        #[bits(12..=14, r)]
        selfref_state: u3,
        #[bits(4..=5, r)]
        selfref_type: SelfRefreshType,
        #[bits(0..=2, r)]
        operating_mode: OperatingMode,
    }

    /// Low power control register.
    #[bitbybit::bitfield(u32, default = 0x0, debug)]
    pub struct Pwrctl {
        #[bit(8, rw)]
        lpddr4_sr_allowed: bool,
        #[bit(7, rw)]
        dis_cam_drain_selfref: bool,
        #[bit(6, rw)]
        stay_in_selfref: bool,
        #[bit(5, rw)]
        selfref_sw: bool,
        #[bit(4, rw)]
        mpsm_en: bool,
        #[bit(3, rw)]
        en_dfi_dram_clk_disable: bool,
        #[bit(2, rw)]
        deeppowerdown_en: bool,
        #[bit(1, rw)]
        powerdown_en: bool,
        #[bit(0, rw)]
        selfref_en: bool,
    }

    #[bitbybit::bitfield(u32, default = 0x0, debug)]
    pub struct Pwrtmg {
        #[bits(16..=23, rw)]
        selfref_to_x32: u8,
        #[bits(8..=15, rw)]
        t_dpd_x4096: u8,
        #[bits(0..=4, rw)]
        powerdown_to_x32: u5,
    }

    /// Hardware low power control register.
    #[bitbybit::bitfield(u32, default = 0x0, debug)]
    pub struct Hwlpctl {
        /// Idle period before the hardware low-power interface may request self-refresh, in
        /// multiples of 32 controller clock cycles.
        #[bits(16..=27, rw)]
        hw_lp_idle_x32: u12,
        #[bit(1, rw)]
        hw_lp_exit_idle_en: bool,
        #[bit(0, rw)]
        hw_lp_en: bool,
    }

    #[bitbybit::bitfield(u32, default = 0x0, debug)]
    pub struct Rfshctl3 {
        #[bits(4..=6, rw)]
        refresh_mode: u3,
        /// Toggled to make the controller pick up updated refresh settings.
        #[bit(1, rw)]
        refresh_update_level: bool,
        #[bit(0, rw)]
        dis_auto_refresh: bool,
    }

    #[bitbybit::bitfield(u32, default = 0x0, debug)]
    pub struct Dfilpcfg0 {
        #[bits(24..=28, rw)]
        dfi_tlp_resp: u5,
        #[bits(12..=15, rw)]
        dfi_lp_wakeup_sr: u4,
        #[bit(8, rw)]
        dfi_lp_en_sr: bool,
        #[bits(4..=7, rw)]
        dfi_lp_wakeup_pd: u4,
        #[bit(0, rw)]
        dfi_lp_en_pd: bool,
    }

    #[bitbybit::bitfield(u32, default = 0x0, debug)]
    pub struct Dfimisc {
        #[bits(8..=12, rw)]
        dfi_frequency: u5,
        #[bit(6, rw)]
        dis_dyn_adr_tri: bool,
        #[bit(5, rw)]
        dfi_init_start: bool,
        #[bit(4, rw)]
        ctl_idle_en: bool,
        #[bit(1, rw)]
        phy_dbi_mode: bool,
        #[bit(0, rw)]
        dfi_init_complete_en: bool,
    }

    #[bitbybit::bitfield(u32, default = 0x0, debug)]
    pub struct Dfistat {
        #[bit(1, r)]
        dfi_lp_ack: bool,
        #[bit(0, r)]
        dfi_init_complete: bool,
    }

    #[bitbybit::bitfield(u32, default = 0x0, debug)]
    pub struct Dbg1 {
        /// Stops the host interface from accepting new commands.
        #[bit(1, rw)]
        dis_hif: bool,
        #[bit(0, rw)]
        dis_dq: bool,
    }

    #[bitbybit::bitfield(u32, default = 0x0, debug)]
    pub struct Dbgcam {
        #[bit(29, r)]
        wr_data_pipeline_empty: bool,
        #[bit(28, r)]
        rd_data_pipeline_empty: bool,
        #[bit(26, r)]
        dbg_wr_q_empty: bool,
        #[bit(25, r)]
        dbg_rd_q_empty: bool,
        #[bits(8..=14, r)]
        dbg_lpr_q_depth: u7,
        #[bits(0..=6, r)]
        dbg_hpr_q_depth: u7,
    }

    impl Dbgcam {
        /// Bits which are all set once the command and data queues have drained.
        pub const EMPTY_MASK: u32 = (1 << 29) | (1 << 28) | (1 << 26) | (1 << 25);

        #[inline]
        pub fn queues_empty(&self) -> bool {
            self.raw_value() & Self::EMPTY_MASK == Self::EMPTY_MASK
        }
    }

    /// Software register programming control. Quasi-dynamic registers may only be written while
    /// `sw_done` is cleared.
    #[bitbybit::bitfield(u32, default = 0x1, debug)]
    pub struct Swctl {
        #[bit(0, rw)]
        sw_done: bool,
    }

    #[bitbybit::bitfield(u32, default = 0x0, debug)]
    pub struct Swstat {
        #[bit(0, r)]
        sw_done_ack: bool,
    }

    /// Port status. All bits cleared means all AXI ports are idle.
    #[bitbybit::bitfield(u32, default = 0x0, debug)]
    pub struct Pstat {
        #[bit(17, r)]
        wr_port_busy_1: bool,
        #[bit(16, r)]
        wr_port_busy_0: bool,
        #[bit(1, r)]
        rd_port_busy_1: bool,
        #[bit(0, r)]
        rd_port_busy_0: bool,
    }

    impl Pstat {
        #[inline]
        pub fn idle(&self) -> bool {
            self.raw_value() == 0
        }
    }

    /// Port control, one instance per AXI port.
    #[bitbybit::bitfield(u32, default = 0x0, debug)]
    pub struct Pctrl {
        #[bit(0, rw)]
        port_en: bool,
    }

    /// Second instance of [Pctrl], used for AXI port 1.
    #[bitbybit::bitfield(u32, default = 0x0, debug)]
    pub struct Pctrl1 {
        #[bit(0, rw)]
        port_en: bool,
    }
}

use offset::*;
use regs::*;

impl_register!(Mstr, DDRC_BASE_ADDR, MSTR);
impl_register!(Stat, DDRC_BASE_ADDR, STAT);
impl_register!(Pwrctl, DDRC_BASE_ADDR, PWRCTL);
impl_register!(Pwrtmg, DDRC_BASE_ADDR, PWRTMG);
impl_register!(Hwlpctl, DDRC_BASE_ADDR, HWLPCTL);
impl_register!(Rfshctl3, DDRC_BASE_ADDR, RFSHCTL3);
impl_register!(Dfilpcfg0, DDRC_BASE_ADDR, DFILPCFG0);
impl_register!(Dfimisc, DDRC_BASE_ADDR, DFIMISC);
impl_register!(Dfistat, DDRC_BASE_ADDR, DFISTAT);
impl_register!(Dbg1, DDRC_BASE_ADDR, DBG1);
impl_register!(Dbgcam, DDRC_BASE_ADDR, DBGCAM);
impl_register!(Swctl, DDRC_BASE_ADDR, SWCTL);
impl_register!(Swstat, DDRC_BASE_ADDR, SWSTAT);
impl_register!(Pstat, DDRC_BASE_ADDR, PSTAT);
impl_register!(Pctrl, DDRC_BASE_ADDR, PCTRL_0);
impl_register!(Pctrl1, DDRC_BASE_ADDR, PCTRL_1);

static_assertions::const_assert_eq!(PCTRL_1 - PCTRL_0, 0xb0);
static_assertions::const_assert!(PCFGWQOS1_1 < 0x1000);

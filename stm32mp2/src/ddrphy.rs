//! DWC DDR PHY (DDRPHYC)
//!
//! The PHY exposes 16-bit control and status registers (CSRs). A CSR is identified by its PHY
//! internal address, which is composed of a block type, a block instance and the CSR offset
//! inside the block. The CPU sees each CSR as a 32-bit slot, so the physical address is
//! `DDRPHYC_BASE_ADDR + 4 * csr_address`, see [csr_to_phys].
use arbitrary_int::{u2, u3, u4, u5, u6, u7};

pub const DDRPHYC_BASE_ADDR: usize = 0x48C0_0000;

/// Byte size of the CPU window onto the PHY register space.
pub const DDRPHYC_SIZE: usize = 0x40_0000;

/// Block types, bits 16 to 19 of a CSR address.
pub const TANIB: u32 = 0x0_0000;
pub const TDBYTE: u32 = 0x1_0000;
pub const TMASTER: u32 = 0x2_0000;
pub const TACSM: u32 = 0x4_0000;
pub const TUCTL_MEM: u32 = 0x5_0000;
pub const TPPGC: u32 = 0x7_0000;
pub const TINITENG: u32 = 0x9_0000;
pub const TDRTUB: u32 = 0xC_0000;
pub const TAPBONLY: u32 = 0xD_0000;

/// Start of the training firmware instruction memory.
pub const IMEM_ST_ADDR: u32 = 0x5_0000;
/// Start of the training firmware data memory. The message block lives at its beginning.
pub const DMEM_ST_ADDR: u32 = 0x5_8000;

pub const NUM_ANIB: u32 = 12;
pub const NUM_DBYTE: u32 = 4;
pub const NUM_LANES_PER_DBYTE: u32 = 9;
pub const NUM_NIBBLES_PER_DBYTE: u32 = 2;

/// CSR base address of address/command block instance `n`.
#[inline]
pub const fn anib(n: u32) -> u32 {
    TANIB | (n << 12)
}

/// CSR base address of data byte block instance `n`.
#[inline]
pub const fn dbyte(n: u32) -> u32 {
    TDBYTE | (n << 12)
}

/// CSR base address of data byte block `n`, lane (or nibble) `lane`.
#[inline]
pub const fn dbyte_lane(n: u32, lane: u32) -> u32 {
    dbyte(n) | (lane << 8)
}

/// Converts a PHY CSR address to the physical address of its 32-bit slot.
#[inline]
pub const fn csr_to_phys(csr: u32) -> usize {
    DDRPHYC_BASE_ADDR + 4 * csr as usize
}

/// Converts a physical address inside the PHY window back to its CSR address.
#[inline]
pub const fn phys_to_csr(addr: usize) -> u32 {
    ((addr - DDRPHYC_BASE_ADDR) / 4) as u32
}

/// CSR offsets inside their block.
pub mod csr {
    // Master block.
    pub const CALUCLKINFO: u32 = 0x08;
    pub const PPTTRAINSETUP: u32 = 0x10;
    pub const TRISTATEMODECA: u32 = 0x19;
    pub const HWTMRL: u32 = 0x20;
    pub const DQSPREAMBLECONTROL: u32 = 0x24;
    pub const MASTERX4CONFIG: u32 = 0x25;
    pub const DMIPINPRESENT: u32 = 0x2d;
    pub const ARDPTRINITVAL: u32 = 0x2e;
    pub const HWTCAMODE: u32 = 0x34;
    pub const DBYTEDLLMODECNTRL: u32 = 0x3a;
    pub const HWTLPCSENA: u32 = 0x3e;
    pub const HWTLPCSENB: u32 = 0x3f;
    pub const PROCODTTIMECTL: u32 = 0x56;
    pub const ANIBDISABLE: u32 = 0x5b;
    pub const DFIMODE: u32 = 0x69;
    pub const DFICAMODE: u32 = 0x75;
    pub const DLLGAINCTL: u32 = 0x7c;
    pub const DLLLOCKPARAM: u32 = 0x7d;
    pub const CALDRVSTR0: u32 = 0x82;
    pub const CALRATE: u32 = 0x88;
    pub const CALZAP: u32 = 0x89;
    pub const VREFINGLOBAL: u32 = 0xb2;
    pub const PLLCTRL2: u32 = 0xc5;
    pub const PLLCTRL1: u32 = 0xc7;
    pub const PLLTESTMODE: u32 = 0xca;
    pub const PLLCTRL4: u32 = 0xcc;
    pub const DFIFREQXLAT0: u32 = 0xf0;
    pub const DFIFREQRATIO: u32 = 0xfa;
    pub const HWTSWIZZLEHWTADDRESS0: u32 = 0x100;

    // Data byte block.
    pub const DFIMRL: u32 = 0x20;
    pub const VREFDAC0: u32 = 0x40;
    pub const DQDQSRCVCNTRL: u32 = 0x43;
    pub const TXIMPEDANCECTRL1: u32 = 0x49;
    pub const TXODTDRVSTREN: u32 = 0x4d;
    pub const TXSLEWRATE: u32 = 0x5f;
    pub const DQDQSRCVCNTRL1: u32 = 0x62;
    pub const RXPBDLYTG0: u32 = 0x68;
    pub const RXENDLYTG0: u32 = 0x80;
    pub const RXCLKDLYTG0: u32 = 0x8c;
    pub const DQ0LNSEL: u32 = 0xa0;
    pub const PPTCTLSTATIC: u32 = 0xaa;
    pub const TXDQDLYTG0: u32 = 0xc0;
    pub const TXDQSDLYTG0: u32 = 0xd0;
    pub const DBYTEMISCMODE: u32 = 0xda;

    // Address/command block.
    pub const AFORCETRICONT: u32 = 0x28;
    pub const ATXIMPEDANCE: u32 = 0x43;
    pub const ATXSLEWRATE: u32 = 0x55;

    // Initialization engine.
    pub const PRESEQUENCEREG0B0S0: u32 = 0x00;
    pub const SEQ0BDLY0: u32 = 0x0b;
    pub const SEQ0BDISABLEFLAG0: u32 = 0x20;
    pub const PHYINLP3: u32 = 0x0e;

    // Drtub.
    pub const UCCLKHCLKENABLES: u32 = 0x80;

    // APB only.
    pub const MICROCONTMUXSEL: u32 = 0x00;
    pub const UCTSHADOWREGS: u32 = 0x04;
    pub const DCTWRITEPROT: u32 = 0x31;
    pub const UCTWRITEONLYSHADOW: u32 = 0x32;
    pub const UCTDATWRITEONLYSHADOW: u32 = 0x34;
    pub const MICRORESET: u32 = 0x99;
}

pub mod regs {
    use super::{u2, u3, u4, u5, u6, u7};

    /// Data driver slew rate, per data byte nibble.
    #[bitbybit::bitfield(u16, default = 0x0, debug)]
    pub struct TxSlewRate {
        #[bits(8..=10, rw)]
        tx_pre_drv_mode: u3,
        #[bits(4..=7, rw)]
        tx_pre_n: u4,
        #[bits(0..=3, rw)]
        tx_pre_p: u4,
    }

    /// Address/command driver slew rate, per ANIB.
    #[bitbybit::bitfield(u16, default = 0x0, debug)]
    pub struct ATxSlewRate {
        #[bits(7..=9, rw)]
        atx_pre_drv_mode: u3,
        #[bits(4..=6, rw)]
        atx_pre_n: u3,
        #[bits(0..=3, rw)]
        atx_pre_p: u4,
    }

    /// Data termination strength, per data byte nibble.
    #[bitbybit::bitfield(u16, default = 0x0, debug)]
    pub struct TxOdtDrvStren {
        #[bits(6..=11, rw)]
        odt_stren_n: u6,
        #[bits(0..=5, rw)]
        odt_stren_p: u6,
    }

    /// Data driver strength, per data byte nibble.
    #[bitbybit::bitfield(u16, default = 0x0, debug)]
    pub struct TxImpedanceCtrl1 {
        #[bits(6..=11, rw)]
        drv_stren_fsdq_n: u6,
        #[bits(0..=5, rw)]
        drv_stren_fsdq_p: u6,
    }

    /// Address/command driver strength, per ANIB.
    #[bitbybit::bitfield(u16, default = 0x0, debug)]
    #[derive(PartialEq, Eq)]
    pub struct ATxImpedance {
        #[bits(5..=9, rw)]
        adrv_stren_n: u5,
        #[bits(0..=4, rw)]
        adrv_stren_p: u5,
    }

    /// Global receiver VREF.
    #[bitbybit::bitfield(u16, default = 0x0, debug)]
    pub struct VrefInGlobal {
        #[bits(3..=9, rw)]
        global_vref_in_dac: u7,
        #[bits(0..=2, rw)]
        global_vref_in_sel: u3,
    }

    /// Impedance calibration control.
    #[bitbybit::bitfield(u16, default = 0x0, debug)]
    pub struct CalRate {
        #[bit(5, rw)]
        cal_once: bool,
        #[bit(4, rw)]
        cal_run: bool,
        #[bits(0..=3, rw)]
        cal_interval: u4,
    }

    /// Microcontroller reset control (`TAPBONLY` block).
    #[bitbybit::bitfield(u16, default = 0x0, debug)]
    pub struct MicroReset {
        #[bit(3, rw)]
        reset_to_micro: bool,
        #[bit(0, rw)]
        stall_to_micro: bool,
    }

    /// Status flags of the mailbox towards the host.
    #[bitbybit::bitfield(u16, default = 0x1, debug)]
    pub struct UctShadowRegs {
        /// Cleared by the firmware when a new mail is available. Set again once the host
        /// acknowledged the mail.
        #[bit(0, r)]
        uct_write_prot_shadow: bool,
    }

    /// Clock gating of the DRTUB and microcontroller clocks.
    #[bitbybit::bitfield(u16, default = 0x0, debug)]
    pub struct UcclkHclkEnables {
        #[bit(2, rw)]
        ucclk_full: bool,
        #[bit(1, rw)]
        hclk_en: bool,
        #[bit(0, rw)]
        ucclk_en: bool,
    }

    /// PHY low-power status as seen by the initialization engine.
    #[bitbybit::bitfield(u16, default = 0x0, debug)]
    pub struct PhyInLp3 {
        #[bits(0..=1, r)]
        phy_in_lp3: u2,
    }
}

//! Reset and clock control (RCC), DDR related registers
//!
//! Covers the DDR subsystem clock enables and resets as well as PLL2, which provides the DDR PHY
//! reference clock.
use crate::impl_register;

pub const RCC_BASE_ADDR: usize = 0x4420_0000;

pub mod offset {
    pub const PLL2CFGR1: usize = 0x0294;
    pub const PLL2CFGR2: usize = 0x0298;
    pub const PLL2CFGR3: usize = 0x029c;
    pub const PLL2CFGR4: usize = 0x02a0;
    pub const PLL2CFGR5: usize = 0x02a4;
    pub const PLL2CFGR6: usize = 0x02a8;
    pub const PLL2CFGR7: usize = 0x02ac;
    pub const DDRCPCFGR: usize = 0x07a4;
    pub const DDRCAPBCFGR: usize = 0x07a8;
    pub const DDRPHYCAPBCFGR: usize = 0x07ac;
    pub const DDRPHYCCFGR: usize = 0x07b0;
    pub const DDRCFGR: usize = 0x07b4;
    pub const DDRITFCFGR: usize = 0x07b8;
}

pub mod regs {
    use arbitrary_int::{u3, u6, u12, u24};

    /// Layout shared by the DDR peripheral configuration registers which only have a reset, an
    /// enable and a low-power enable bit.
    macro_rules! ddr_periph_cfg {
        ($(#[$meta:meta])* $name:ident) => {
            $(#[$meta])*
            #[bitbybit::bitfield(u32, default = 0x0, debug)]
            pub struct $name {
                #[bit(2, rw)]
                lp_en: bool,
                #[bit(1, rw)]
                en: bool,
                #[bit(0, rw)]
                rst: bool,
            }
        };
    }

    ddr_periph_cfg!(
        /// DDR controller port clock and reset.
        Ddrcpcfgr
    );
    ddr_periph_cfg!(
        /// DDR controller APB clock and reset.
        Ddrcapbcfgr
    );
    ddr_periph_cfg!(
        /// DDR PHY APB clock and reset.
        Ddrphycapbcfgr
    );
    ddr_periph_cfg!(
        /// DDR PHY reference clock enable.
        Ddrphyccfgr
    );
    ddr_periph_cfg!(
        /// DDR subsystem configuration block clock and reset.
        Ddrcfgr
    );

    #[bitbybit::bitenum(u3, exhaustive = true)]
    #[derive(Debug, PartialEq, Eq)]
    pub enum DdrClockMode {
        Normal = 0b000,
        /// Clock gated by the DDR controller hardware low-power interface.
        AutoSelfRefresh = 0b001,
        /// Clock gated by hardware when the system enters a low-power state.
        HardwareSelfRefresh = 0b010,
        Reserved3 = 0b011,
        Reserved4 = 0b100,
        Reserved5 = 0b101,
        Reserved6 = 0b110,
        Reserved7 = 0b111,
    }

    /// DDR interface configuration.
    #[bitbybit::bitfield(u32, default = 0x0, debug)]
    pub struct Ddritfcfgr {
        #[bits(20..=22, rw)]
        ddrckmod: DdrClockMode,
        /// Keeps the PHY DLL in low-power while the DDR is in self-refresh.
        #[bit(16, rw)]
        ddrphydlp: bool,
        #[bit(2, rw)]
        ddrcklpen: bool,
        #[bit(1, rw)]
        ddrcken: bool,
        #[bit(0, rw)]
        ddrrst: bool,
    }

    #[bitbybit::bitfield(u32, default = 0x0, debug)]
    pub struct Pll2cfgr1 {
        #[bit(24, r)]
        pllrdy: bool,
        #[bit(8, rw)]
        pllen: bool,
    }

    #[bitbybit::bitfield(u32, default = 0x0, debug)]
    pub struct Pll2cfgr2 {
        #[bits(16..=27, rw)]
        fbdiv: u12,
        #[bits(0..=5, rw)]
        frefdiv: u6,
    }

    #[bitbybit::bitfield(u32, default = 0x0, debug)]
    pub struct Pll2cfgr3 {
        #[bit(26, rw)]
        sscgdis: bool,
        #[bit(25, rw)]
        dacen: bool,
        #[bit(24, rw)]
        downspread: bool,
        #[bits(0..=23, rw)]
        fracin: u24,
    }

    #[bitbybit::bitfield(u32, default = 0x0, debug)]
    pub struct Pll2cfgr4 {
        #[bit(10, rw)]
        bypass: bool,
        #[bit(9, rw)]
        foutpostdiven: bool,
        #[bit(8, rw)]
        dsmen: bool,
    }

    #[bitbybit::bitfield(u32, default = 0x0, debug)]
    pub struct Pll2cfgr6 {
        #[bits(0..=2, rw)]
        postdiv1: u3,
    }

    #[bitbybit::bitfield(u32, default = 0x0, debug)]
    pub struct Pll2cfgr7 {
        #[bits(0..=2, rw)]
        postdiv2: u3,
    }
}

use offset::*;
use regs::*;

impl_register!(Ddrcpcfgr, RCC_BASE_ADDR, DDRCPCFGR);
impl_register!(Ddrcapbcfgr, RCC_BASE_ADDR, DDRCAPBCFGR);
impl_register!(Ddrphycapbcfgr, RCC_BASE_ADDR, DDRPHYCAPBCFGR);
impl_register!(Ddrphyccfgr, RCC_BASE_ADDR, DDRPHYCCFGR);
impl_register!(Ddrcfgr, RCC_BASE_ADDR, DDRCFGR);
impl_register!(Ddritfcfgr, RCC_BASE_ADDR, DDRITFCFGR);
impl_register!(Pll2cfgr1, RCC_BASE_ADDR, PLL2CFGR1);
impl_register!(Pll2cfgr2, RCC_BASE_ADDR, PLL2CFGR2);
impl_register!(Pll2cfgr3, RCC_BASE_ADDR, PLL2CFGR3);
impl_register!(Pll2cfgr4, RCC_BASE_ADDR, PLL2CFGR4);
impl_register!(Pll2cfgr6, RCC_BASE_ADDR, PLL2CFGR6);
impl_register!(Pll2cfgr7, RCC_BASE_ADDR, PLL2CFGR7);

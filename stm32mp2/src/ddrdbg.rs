//! DDR debug and low-power configuration block (DDRDBG)
use crate::impl_register;

pub const DDRDBG_BASE_ADDR: usize = 0x4823_0000;

pub const LP_DISABLE_OFFSET: usize = 0x0;
pub const BYPASS_PCLKEN_OFFSET: usize = 0x4;

/// Masks low-power requests towards the DDR controller.
#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct LpDisable {
    /// Ignore the hardware low-power request of the DDR PHY configuration port.
    #[bit(8, rw)]
    ddrc_lp_disable: bool,
    /// Ignore the hardware low-power request of the CPU subsystem.
    #[bit(4, rw)]
    cpu_lp_disable: bool,
}

/// Forces the DDR PHY APB clock on.
#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct BypassPclken {
    #[bit(0, rw)]
    bypass_pclken: bool,
}

impl_register!(LpDisable, DDRDBG_BASE_ADDR, LP_DISABLE_OFFSET);
impl_register!(BypassPclken, DDRDBG_BASE_ADDR, BYPASS_PCLKEN_OFFSET);

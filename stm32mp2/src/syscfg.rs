//! System configuration controller (SYSCFG), DDR related registers
use crate::impl_register;

pub const SYSCFG_BASE_ADDR: usize = 0x4423_0000;

pub const DDRCAUTOSRDLYR_OFFSET: usize = 0x2c;

/// Idle delay before the DDR clock is gated in automatic self-refresh mode.
#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct DdrcAutoSrDelay {
    #[bits(0..=15, rw)]
    auto_sr_delay: u16,
}

impl_register!(DdrcAutoSrDelay, SYSCFG_BASE_ADDR, DDRCAUTOSRDLYR_OFFSET);

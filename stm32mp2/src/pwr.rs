//! Power control (PWR), DDR retention registers
use crate::impl_register;

pub const PWR_BASE_ADDR: usize = 0x4421_0000;

pub const CR11_OFFSET: usize = 0x28;

/// Control register 11, DDR retention.
#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct Cr11 {
    /// Freezes the DDR IO pads so that CKE stays low while the DDR subsystem is powered down.
    #[bit(4, rw)]
    ddr_io_ret_en: bool,
    /// DDR retention disabled. Set by hardware when the retention supply was lost, in which
    /// case the DDR content cannot be trusted after a standby exit.
    #[bit(0, rw)]
    ddrretdis: bool,
}

impl_register!(Cr11, PWR_BASE_ADDR, CR11_OFFSET);

//! # Rust peripheral access crate for the DDR subsystem of the STM32MP2 SoC family
//!
//! This crate covers the blocks which take part in the DDR bring-up: the uMCTL2 DDR controller
//! (DDRC), the DWC DDR PHY (DDRPHYC), the DDR debug block (DDRDBG) and the DDR related parts
//! of the RCC, PWR and SYSCFG blocks.
//!
//! Registers are modelled with [bitbybit] bitfields. Every register type which has a fixed
//! location implements [Register], which allows generic access code in the HAL to resolve the
//! physical address at compile time.
#![no_std]

pub mod ddrc;
pub mod ddrdbg;
pub mod ddrphy;
pub mod pwr;
pub mod rcc;
pub mod syscfg;

/// Base address of the DDR address space as seen by the CPU.
pub const DDR_BASE_ADDR: usize = 0x8000_0000;
/// Largest DDR density which can be mapped by the controller.
pub const DDR_MAX_SIZE: u64 = 0x1_0000_0000;

/// Backup SRAM which stays powered while the DDR is kept in self-refresh during standby.
pub const RETRAM_BASE_ADDR: usize = 0x0E08_0000;
pub const RETRAM_SIZE: usize = 0x2_0000;

/// A 32-bit register at a fixed physical address.
pub trait Register: Copy {
    /// Physical address of the register.
    const ADDR: usize;

    fn from_raw(raw: u32) -> Self;
    fn to_raw(self) -> u32;
}

/// Implements [Register] for a [bitbybit] bitfield type located at `$base + $offset`.
#[macro_export]
macro_rules! impl_register {
    ($ty:ty, $base:expr, $offset:expr) => {
        impl $crate::Register for $ty {
            const ADDR: usize = $base + $offset;

            #[inline(always)]
            fn from_raw(raw: u32) -> Self {
                Self::new_with_raw_value(raw)
            }

            #[inline(always)]
            fn to_raw(self) -> u32 {
                self.raw_value()
            }
        }
    };
}

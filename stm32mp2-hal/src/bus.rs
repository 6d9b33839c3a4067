//! # Register bus abstraction
//!
//! The DDR driver never dereferences register pointers directly. All accesses go through
//! [RegisterBus], which is implemented by [Mmio] for the real hardware. This keeps the unsafe
//! volatile accesses in a single place and allows to run the complete init sequence against a
//! simulated register file.
use stm32mp2::{Register, ddrphy};

pub trait RegisterBus {
    fn read32(&mut self, addr: usize) -> u32;
    fn write32(&mut self, addr: usize, value: u32);
    fn read16(&mut self, addr: usize) -> u16;
    fn write16(&mut self, addr: usize, value: u16);

    /// Reads a register with a fixed location.
    #[inline]
    fn read<R: Register>(&mut self) -> R
    where
        Self: Sized,
    {
        R::from_raw(self.read32(R::ADDR))
    }

    #[inline]
    fn write<R: Register>(&mut self, reg: R)
    where
        Self: Sized,
    {
        self.write32(R::ADDR, reg.to_raw())
    }

    /// Read-modify-write of a register with a fixed location.
    #[inline]
    fn modify<R: Register>(&mut self, f: impl FnOnce(R) -> R)
    where
        Self: Sized,
    {
        let reg = self.read::<R>();
        self.write(f(reg));
    }

    #[inline]
    fn set_bits32(&mut self, addr: usize, mask: u32) {
        let val = self.read32(addr);
        self.write32(addr, val | mask);
    }

    #[inline]
    fn clear_bits32(&mut self, addr: usize, mask: u32) {
        let val = self.read32(addr);
        self.write32(addr, val & !mask);
    }

    #[inline]
    fn clear_set_bits32(&mut self, addr: usize, clear: u32, set: u32) {
        let val = self.read32(addr);
        self.write32(addr, (val & !clear) | set);
    }

    /// Reads a 16-bit PHY CSR by its PHY internal address.
    #[inline]
    fn read_phy_csr(&mut self, csr: u32) -> u16 {
        self.read16(ddrphy::csr_to_phys(csr))
    }

    /// Writes a 16-bit PHY CSR by its PHY internal address.
    #[inline]
    fn write_phy_csr(&mut self, csr: u32, value: u16) {
        self.write16(ddrphy::csr_to_phys(csr), value)
    }
}

impl<B: RegisterBus + ?Sized> RegisterBus for &mut B {
    #[inline]
    fn read32(&mut self, addr: usize) -> u32 {
        (**self).read32(addr)
    }

    #[inline]
    fn write32(&mut self, addr: usize, value: u32) {
        (**self).write32(addr, value)
    }

    #[inline]
    fn read16(&mut self, addr: usize) -> u16 {
        (**self).read16(addr)
    }

    #[inline]
    fn write16(&mut self, addr: usize, value: u16) {
        (**self).write16(addr, value)
    }
}

/// Volatile accesses to the physical address space.
///
/// The DDR subsystem registers are expected to be identity mapped or accessed with the MMU off,
/// which is the case during early boot.
#[derive(Debug)]
pub struct Mmio {
    _private: (),
}

impl Mmio {
    /// Creates the bus handle.
    ///
    /// # Safety
    ///
    /// Only one handle should be used at a time. The user must ensure that no other code accesses
    /// the DDR subsystem registers, the retention RAM or the DDR address space while the driver
    /// owns this handle.
    pub const unsafe fn steal() -> Self {
        Self { _private: () }
    }
}

impl RegisterBus for Mmio {
    #[inline]
    fn read32(&mut self, addr: usize) -> u32 {
        // Safety: See safety notes of [Mmio::steal].
        unsafe { core::ptr::read_volatile(addr as *const u32) }
    }

    #[inline]
    fn write32(&mut self, addr: usize, value: u32) {
        // Safety: See safety notes of [Mmio::steal].
        unsafe { core::ptr::write_volatile(addr as *mut u32, value) }
    }

    #[inline]
    fn read16(&mut self, addr: usize) -> u16 {
        // Safety: See safety notes of [Mmio::steal].
        unsafe { core::ptr::read_volatile(addr as *const u16) }
    }

    #[inline]
    fn write16(&mut self, addr: usize, value: u16) {
        // Safety: See safety notes of [Mmio::steal].
        unsafe { core::ptr::write_volatile(addr as *mut u16, value) }
    }
}

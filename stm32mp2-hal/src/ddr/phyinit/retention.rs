//! PHY register retention.
//!
//! While tracking is enabled, every PHY CSR written through [super::Phy] is recorded. After
//! training, the values of all recorded CSRs are saved into the retention RAM, which stays
//! powered during standby. On a standby exit, the list is reloaded and the values are written
//! back instead of running the training firmware again.
use heapless::Vec;
use stm32mp2::{RETRAM_BASE_ADDR, RETRAM_SIZE};

use crate::{bus::RegisterBus, ddr::Error};

pub const MAX_NUM_RET_REGS: usize = 1024;

/// Bytes used by a single persisted entry: 32-bit address, 16-bit value and padding.
const ENTRY_SIZE: usize = 8;

/// Bytes used by the persisted register list.
pub const RETENTION_AREA_SIZE: usize = 4 + MAX_NUM_RET_REGS * ENTRY_SIZE;

/// Default location of the persisted list: the top of the retention RAM.
pub const DEFAULT_RETENTION_AREA_BASE: usize =
    RETRAM_BASE_ADDR + RETRAM_SIZE - RETENTION_AREA_SIZE;

static_assertions::const_assert!(RETENTION_AREA_SIZE <= RETRAM_SIZE);
static_assertions::const_assert!(DEFAULT_RETENTION_AREA_BASE % 4 == 0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegAddrVal {
    pub address: u32,
    pub value: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegInstr {
    SaveRegs,
    RestoreRegs,
}

/// Tracked PHY CSRs with their saved values.
#[derive(Debug, Default)]
pub struct RetentionList {
    regs: Vec<RegAddrVal, MAX_NUM_RET_REGS>,
    tracking: bool,
}

impl RetentionList {
    pub const fn new() -> Self {
        Self {
            regs: Vec::new(),
            tracking: false,
        }
    }

    #[inline]
    pub fn start_tracking(&mut self) {
        self.tracking = true;
    }

    #[inline]
    pub fn stop_tracking(&mut self) {
        self.tracking = false;
    }

    #[inline]
    pub fn is_tracking(&self) -> bool {
        self.tracking
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.regs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.regs.is_empty()
    }

    pub fn clear(&mut self) {
        self.regs.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegAddrVal> {
        self.regs.iter()
    }

    /// Records `address` if tracking is enabled. Addresses are only recorded once.
    pub fn track(&mut self, address: u32) -> Result<(), Error> {
        if !self.tracking || self.regs.iter().any(|reg| reg.address == address) {
            return Ok(());
        }
        self.regs
            .push(RegAddrVal { address, value: 0 })
            .map_err(|_| {
                log::error!("DDR: more than {} retention registers", MAX_NUM_RET_REGS);
                Error::RetentionOverflow
            })
    }

    /// Reads the current value of every tracked CSR.
    pub fn save_regs<B: RegisterBus>(&mut self, bus: &mut B) {
        for reg in self.regs.iter_mut() {
            reg.value = bus.read_phy_csr(reg.address);
        }
    }

    /// Writes the saved value of every tracked CSR.
    pub fn restore_regs<B: RegisterBus>(&self, bus: &mut B) {
        for reg in self.regs.iter() {
            bus.write_phy_csr(reg.address, reg.value);
        }
    }

    /// Stores the list in the retention area at `base`.
    pub fn persist<B: RegisterBus>(&self, bus: &mut B, base: usize) {
        bus.write32(base, self.regs.len() as u32);
        for (i, reg) in self.regs.iter().enumerate() {
            let entry = base + 4 + i * ENTRY_SIZE;
            bus.write32(entry, reg.address);
            bus.write32(entry + 4, reg.value as u32);
        }
    }

    /// Replaces the list with the one stored in the retention area at `base`.
    pub fn load<B: RegisterBus>(&mut self, bus: &mut B, base: usize) -> Result<(), Error> {
        let count = bus.read32(base) as usize;
        if count > MAX_NUM_RET_REGS {
            log::error!("DDR: corrupted retention area, {} registers", count);
            return Err(Error::RetentionArea);
        }
        self.regs.clear();
        for i in 0..count {
            let entry = base + 4 + i * ENTRY_SIZE;
            let reg = RegAddrVal {
                address: bus.read32(entry),
                value: bus.read32(entry + 4) as u16,
            };
            self.regs.push(reg).map_err(|_| Error::RetentionOverflow)?;
        }
        Ok(())
    }

    /// Saves the tracked CSRs into the retention area, or restores them from it.
    pub fn reg_interface<B: RegisterBus>(
        &mut self,
        bus: &mut B,
        instr: RegInstr,
        base: usize,
    ) -> Result<(), Error> {
        match instr {
            RegInstr::SaveRegs => {
                self.save_regs(bus);
                self.persist(bus, base);
                log::debug!("DDR: saved {} PHY registers", self.regs.len());
            }
            RegInstr::RestoreRegs => {
                self.load(bus, base)?;
                self.restore_regs(bus);
                log::debug!("DDR: restored {} PHY registers", self.regs.len());
            }
        }
        Ok(())
    }
}

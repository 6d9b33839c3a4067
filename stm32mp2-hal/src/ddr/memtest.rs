//! Post-init memory tests.
//!
//! The data bus and address bus tests overwrite the memory they touch. After a standby exit
//! only [test_rw_access] may be used, it restores the word it tested.
use crate::bus::RegisterBus;

pub const DDR_PATTERN: u32 = 0xAAAA_AAAA;
pub const DDR_ANTIPATTERN: u32 = 0x5555_5555;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MemTestError {
    #[error("memory address is not aligned to 4 bytes")]
    AddrNotAligned,
    #[error("data bus error at {addr:#x}: expected {expected:#010x}, found {found:#010x}")]
    DataBus {
        addr: usize,
        expected: u32,
        found: u32,
    },
    #[error("address bus error at {addr:#x}: expected {expected:#010x}, found {found:#010x}")]
    AddrBus {
        addr: usize,
        expected: u32,
        found: u32,
    },
    #[error("read/write error at {addr:#x}: expected {expected:#010x}, found {found:#010x}")]
    ReadWrite {
        addr: usize,
        expected: u32,
        found: u32,
    },
}

/// Walking ones on a single word, checks that every data line can be driven independently.
pub fn test_data_bus<B: RegisterBus>(bus: &mut B, base_addr: usize) -> Result<(), MemTestError> {
    if !base_addr.is_multiple_of(4) {
        return Err(MemTestError::AddrNotAligned);
    }
    for bit in 0..32 {
        let pattern = 1u32 << bit;
        bus.write32(base_addr, pattern);
        let found = bus.read32(base_addr);
        if found != pattern {
            return Err(MemTestError::DataBus {
                addr: base_addr,
                expected: pattern,
                found,
            });
        }
    }
    Ok(())
}

/// Checks for stuck or shorted address lines by writing to every power-of-two offset below
/// `size`.
pub fn test_addr_bus<B: RegisterBus>(
    bus: &mut B,
    base_addr: usize,
    size: u64,
) -> Result<(), MemTestError> {
    if !base_addr.is_multiple_of(4) {
        return Err(MemTestError::AddrNotAligned);
    }
    let offsets = || {
        core::iter::successors(Some(4u64), |offset| Some(offset << 1))
            .take_while(move |offset| *offset < size)
            .map(move |offset| base_addr + offset as usize)
    };

    for addr in offsets() {
        bus.write32(addr, DDR_PATTERN);
    }

    // Stuck high address lines.
    bus.write32(base_addr, DDR_ANTIPATTERN);
    for addr in offsets() {
        let found = bus.read32(addr);
        if found != DDR_PATTERN {
            return Err(MemTestError::AddrBus {
                addr,
                expected: DDR_PATTERN,
                found,
            });
        }
    }
    bus.write32(base_addr, DDR_PATTERN);

    // Stuck low or shorted address lines.
    for test_addr in offsets() {
        bus.write32(test_addr, DDR_ANTIPATTERN);
        let found = bus.read32(base_addr);
        if found != DDR_PATTERN {
            return Err(MemTestError::AddrBus {
                addr: test_addr,
                expected: DDR_PATTERN,
                found,
            });
        }
        for addr in offsets().filter(|addr| *addr != test_addr) {
            let found = bus.read32(addr);
            if found != DDR_PATTERN {
                return Err(MemTestError::AddrBus {
                    addr: test_addr,
                    expected: DDR_PATTERN,
                    found,
                });
            }
        }
        bus.write32(test_addr, DDR_PATTERN);
    }
    Ok(())
}

/// Finds the size of the memory by looking for the first power-of-two offset which aliases
/// onto the base address. The result is at most `max_size`.
pub fn check_size<B: RegisterBus>(bus: &mut B, base_addr: usize, max_size: u64) -> u64 {
    let mut offset = 4u64;
    bus.write32(base_addr, DDR_PATTERN);
    while offset < max_size {
        bus.write32(base_addr + offset as usize, DDR_ANTIPATTERN);
        if bus.read32(base_addr) != DDR_PATTERN {
            break;
        }
        offset <<= 1;
    }
    offset
}

/// Writes the complement of a word, reads it back and restores the original content.
pub fn test_rw_access<B: RegisterBus>(bus: &mut B, base_addr: usize) -> Result<(), MemTestError> {
    if !base_addr.is_multiple_of(4) {
        return Err(MemTestError::AddrNotAligned);
    }
    let saved = bus.read32(base_addr);
    let pattern = !saved;
    bus.write32(base_addr, pattern);
    let found = bus.read32(base_addr);
    bus.write32(base_addr, saved);
    if found != pattern {
        return Err(MemTestError::ReadWrite {
            addr: base_addr,
            expected: pattern,
            found,
        });
    }
    Ok(())
}

//! PLL2 configuration. PLL2 provides the reference clock of the DDR PHY, which runs at the DDR
//! clock frequency (half the data rate).
use arbitrary_int::{u3, u6, u12, u24};
use stm32mp2::rcc::regs::{Pll2cfgr1, Pll2cfgr2, Pll2cfgr3, Pll2cfgr4, Pll2cfgr6, Pll2cfgr7};

use crate::{
    bus::RegisterBus,
    time::Hertz,
    timeout::{Clock, PLL_LOCK_TIMEOUT, WaitEvent, wait_for},
};

pub const FREFDIV_MAX: u32 = 63;
pub const FBDIV_MIN: u32 = 16;
pub const FBDIV_MAX: u32 = 640;
pub const POSTDIV_MAX: u32 = 7;
pub const VCO_MIN_HZ: u64 = 800_000_000;
pub const VCO_MAX_HZ: u64 = 3_200_000_000;
/// Highest frequency allowed at the phase frequency detector.
pub const PFD_MAX_HZ: u64 = 50_000_000;

const FRAC_BITS: u32 = 24;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PllError {
    #[error("invalid input")]
    InvalidInput,
    #[error("pll reference divider {0} is out of range (1..={FREFDIV_MAX})")]
    RefDivOutOfRange(u32),
    #[error("pll feedback divider {0} is out of range ({FBDIV_MIN}..={FBDIV_MAX})")]
    FbDivOutOfRange(u32),
    #[error("pll post divider {0} is out of range (1..={POSTDIV_MAX})")]
    PostDivOutOfRange(u32),
    #[error("no vco frequency in range for target clock {0} Hz")]
    NoVcoFrequency(u32),
    #[error("pll did not lock")]
    LockTimeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DdrPllConfig {
    frefdiv: u6,
    fbdiv: u12,
    fracin: u24,
    postdiv1: u3,
    postdiv2: u3,
}

impl DdrPllConfig {
    /// Create a new PLL configuration with raw divider values, checking their ranges.
    pub const fn new(
        frefdiv: u32,
        fbdiv: u32,
        fracin: u32,
        postdiv1: u32,
        postdiv2: u32,
    ) -> Result<Self, PllError> {
        if frefdiv == 0 || frefdiv > FREFDIV_MAX {
            return Err(PllError::RefDivOutOfRange(frefdiv));
        }
        if fbdiv < FBDIV_MIN || fbdiv > FBDIV_MAX {
            return Err(PllError::FbDivOutOfRange(fbdiv));
        }
        if postdiv1 == 0 || postdiv1 > POSTDIV_MAX {
            return Err(PllError::PostDivOutOfRange(postdiv1));
        }
        if postdiv2 == 0 || postdiv2 > POSTDIV_MAX {
            return Err(PllError::PostDivOutOfRange(postdiv2));
        }
        if fracin >= (1 << FRAC_BITS) {
            return Err(PllError::InvalidInput);
        }
        Ok(Self {
            frefdiv: u6::new(frefdiv as u8),
            fbdiv: u12::new(fbdiv as u16),
            fracin: u24::new(fracin),
            postdiv1: u3::new(postdiv1 as u8),
            postdiv2: u3::new(postdiv2 as u8),
        })
    }

    /// Derives a configuration which produces `target_clk` from `ref_clk`.
    ///
    /// The smallest post divider product which brings the VCO into its range is chosen. The
    /// feedback divider uses the fractional part when the target is not an integer multiple of
    /// the reference.
    pub fn new_from_target_clock(ref_clk: Hertz, target_clk: Hertz) -> Result<Self, PllError> {
        let ref_hz = ref_clk.raw() as u64;
        let target_hz = target_clk.raw() as u64;
        if ref_hz == 0 || target_hz == 0 {
            return Err(PllError::InvalidInput);
        }
        let frefdiv = ref_hz.div_ceil(PFD_MAX_HZ);
        let pfd_hz = ref_hz / frefdiv;

        let mut best: Option<(u64, u64, u64)> = None;
        for postdiv1 in 1..=POSTDIV_MAX as u64 {
            for postdiv2 in 1..=postdiv1 {
                let vco = target_hz * postdiv1 * postdiv2;
                if !(VCO_MIN_HZ..=VCO_MAX_HZ).contains(&vco) {
                    continue;
                }
                let product = postdiv1 * postdiv2;
                if best.is_none_or(|(p1, p2, _)| p1 * p2 > product) {
                    best = Some((postdiv1, postdiv2, vco));
                }
            }
        }
        let (postdiv1, postdiv2, vco) = best.ok_or(PllError::NoVcoFrequency(target_clk.raw()))?;
        let fbdiv = vco / pfd_hz;
        let fracin = ((vco % pfd_hz) << FRAC_BITS) / pfd_hz;
        Self::new(
            frefdiv as u32,
            fbdiv as u32,
            fracin as u32,
            postdiv1 as u32,
            postdiv2 as u32,
        )
    }

    /// Output frequency for the given reference clock, rounded down to the next Hertz.
    pub fn output_freq(&self, ref_clk: Hertz) -> Hertz {
        let pfd = ref_clk.raw() as u64 / self.frefdiv.value() as u64;
        let vco = pfd * self.fbdiv.value() as u64
            + ((pfd * self.fracin.value() as u64) >> FRAC_BITS);
        let postdiv = self.postdiv1.value() as u64 * self.postdiv2.value() as u64;
        Hertz::from_raw((vco / postdiv) as u32)
    }

    #[inline]
    pub const fn is_fractional(&self) -> bool {
        self.fracin.value() != 0
    }
}

/// Programs PLL2 and waits for it to lock.
///
/// The PLL is disabled while the dividers are changed, so the DDR PHY must not be running from
/// it at that point.
pub fn configure_ddr_pll<B: RegisterBus, C: Clock>(
    bus: &mut B,
    clock: &mut C,
    cfg: &DdrPllConfig,
) -> Result<(), PllError> {
    bus.modify::<Pll2cfgr1>(|val| val.with_pllen(false));

    bus.write(
        Pll2cfgr2::new_with_raw_value(0)
            .with_frefdiv(cfg.frefdiv)
            .with_fbdiv(cfg.fbdiv),
    );
    bus.write(
        Pll2cfgr3::new_with_raw_value(0)
            .with_fracin(cfg.fracin)
            .with_sscgdis(true),
    );
    bus.write(
        Pll2cfgr4::new_with_raw_value(0)
            .with_dsmen(cfg.is_fractional())
            .with_foutpostdiven(true),
    );
    bus.write(Pll2cfgr6::new_with_raw_value(0).with_postdiv1(cfg.postdiv1));
    bus.write(Pll2cfgr7::new_with_raw_value(0).with_postdiv2(cfg.postdiv2));

    bus.modify::<Pll2cfgr1>(|val| val.with_pllen(true));
    wait_for(clock, PLL_LOCK_TIMEOUT, WaitEvent::PllLock, || {
        bus.read::<Pll2cfgr1>().pllrdy()
    })
    .map_err(|_| PllError::LockTimeout)?;
    log::debug!("DDR: PLL2 locked");
    Ok(())
}

//! # DDR subsystem driver
//!
//! [DdrController] owns the register bus, the time base and all driver state. It brings the
//! DDR up either from a cold boot or after a standby during which the DDR was kept in
//! self-refresh, and it drives the self-refresh transitions afterwards.
//!
//! ## Cold boot
//!
//! 1. Board specific power and pin setup through [DdrPlatform::msp_init].
//! 2. Reset of the DDR subsystem, PLL2 and low-power configuration.
//! 3. Controller registers, then release of the controller core and PHY resets.
//! 4. PHY initialization including the training firmware, see [phyinit]. The PHY state is
//!    saved to the retention area afterwards.
//! 5. DFI initialization, refresh and AXI ports enabled.
//! 6. Memory tests.
//!
//! ## Standby exit
//!
//! The DDR is still in self-refresh. The controller is programmed with `PWRCTL.selfref_sw`
//! set, the PHY skips the training and gets its trained state back from the retention area,
//! then the DDR leaves self-refresh. If the retention supply was lost during standby, a cold
//! boot is done instead.
use embedded_hal::delay::DelayNs;
use stm32mp2::{
    DDR_BASE_ADDR, DDR_MAX_SIZE, RETRAM_BASE_ADDR, RETRAM_SIZE,
    ddrc::regs::{Pwrctl, Rfshctl3},
    pwr::Cr11,
};

use crate::{
    bus::RegisterBus,
    clocks::pll::{PllError, configure_ddr_pll},
    timeout::{Clock, ClockDelay, TimeoutError},
};

pub mod config;
pub mod ctl;
#[cfg(feature = "interactive")]
pub mod interactive;
pub mod memtest;
pub mod phyinit;
pub mod regs;
pub mod reset;
pub mod sr;

pub use config::{DdrConfig, DdrInfo, DramType};
pub use ctl::DdrCtl;
pub use phyinit::{FirmwareImages, PieInstruction};
pub use sr::SrMode;

use config::DdrcReg;
use ctl::SrTransition;
use memtest::MemTestError;
use phyinit::{
    Phy, PhyInput,
    drvstren::DrvType,
    messageblock::MessageBlockError,
    retention::{
        DEFAULT_RETENTION_AREA_BASE, MAX_NUM_RET_REGS, RETENTION_AREA_SIZE, RetentionList,
    },
};
use regs::{DDRC_MAP, DDRC_PERF, DDRC_REG, DDRC_TIMING, PHY_UIA, PHY_UIB, PHY_UIM, PHY_UIS};
use sr::{AutoSelfRefresh, HwSelfRefresh, SelfRefreshStrategy, SwSelfRefresh, decode_sr_mode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Timeout(#[from] TimeoutError),
    #[error("descriptor {0} has no parameter accessor")]
    InvalidDescriptor(&'static str),
    #[error("impedance of {ohm} Ohm not supported for {target:?}")]
    UnsupportedImpedance { ohm: u32, target: DrvType },
    #[error("message block: {0}")]
    MessageBlock(#[from] MessageBlockError),
    #[error("{0} p-states configured, only one is supported")]
    TooManyPStates(u32),
    #[error("more than {} PHY registers to retain", MAX_NUM_RET_REGS)]
    RetentionOverflow,
    #[error("firmware image has {found} bytes, expected {expected}")]
    FirmwareSize { expected: usize, found: usize },
    #[error("PHY training failed")]
    TrainingFailed,
    #[error("operation called out of order")]
    Sequence,
    #[error("memory test: {0}")]
    MemTest(#[from] MemTestError),
    #[error("DDR size {found:#x} does not match the configured {expected:#x}")]
    SizeMismatch { expected: u64, found: u64 },
    #[error("PLL2: {0}")]
    Pll(#[from] PllError),
    #[error("invalid retention area")]
    RetentionArea,
    #[error("board specific DDR setup failed")]
    Platform,
    #[error("invalid self-refresh mode")]
    InvalidSrMode,
    #[cfg(feature = "interactive")]
    #[error("console I/O error")]
    Console,
}

/// In and out parameters of [DdrController::init].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct InitParams {
    /// In: the system leaves standby. The DDR is expected to be in self-refresh.
    pub wakeup_from_standby: bool,
    /// Out: the DDR content was preserved across standby.
    pub self_refresh: bool,
    /// In: checksum of the DDR content recorded before standby. Passed through for the
    /// caller, the driver does not interpret it.
    pub zdata: u32,
    /// Out: the backup registers describing the standby state must be cleared.
    pub clear_bkp: bool,
}

/// Board hooks called during the init.
pub trait DdrPlatform {
    /// Enables the DDR supplies and anything else the board needs before the DDR subsystem
    /// is reset.
    fn msp_init(
        &mut self,
        _dram_type: DramType,
        _delay: &mut impl DelayNs,
    ) -> Result<(), Error> {
        Ok(())
    }

    /// Whether this core is the trusted domain owner of the DDR. Only then the memory tests
    /// run.
    fn is_tdcid(&self) -> bool {
        true
    }
}

/// Board without any DDR specific setup.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultPlatform;

impl DdrPlatform for DefaultPlatform {}

pub struct DdrController<'fw, B, C, P = DefaultPlatform> {
    ctl: DdrCtl<B, C>,
    platform: P,
    cfg: DdrConfig,
    fw: FirmwareImages<'fw>,
    phy_input: PhyInput,
    retention: RetentionList,
    retention_base: usize,
    sr_mode: SrMode,
    initialized: bool,
}

impl<'fw, B: RegisterBus, C: Clock, P: DdrPlatform> DdrController<'fw, B, C, P> {
    pub fn new(bus: B, clock: C, cfg: DdrConfig, fw: FirmwareImages<'fw>, platform: P) -> Self {
        Self {
            ctl: DdrCtl::new(bus, clock),
            platform,
            cfg,
            fw,
            phy_input: PhyInput::default(),
            retention: RetentionList::new(),
            retention_base: DEFAULT_RETENTION_AREA_BASE,
            sr_mode: SrMode::Invalid,
            initialized: false,
        }
    }

    #[inline]
    pub fn config(&self) -> &DdrConfig {
        &self.cfg
    }

    #[inline]
    pub fn ctl(&mut self) -> &mut DdrCtl<B, C> {
        &mut self.ctl
    }

    #[inline]
    pub fn platform(&mut self) -> &mut P {
        &mut self.platform
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn release(self) -> (B, C, P) {
        let (bus, clock) = self.ctl.release();
        (bus, clock, self.platform)
    }

    /// Moves the PHY retention area. Only possible before [Self::init]. The whole area must
    /// lie inside the retention RAM.
    pub fn set_retention_area_base(&mut self, base: usize) -> Result<(), Error> {
        if self.initialized {
            log::error!("DDR: retention area can not be moved after init");
            return Err(Error::Sequence);
        }
        let fits = base >= RETRAM_BASE_ADDR
            && base
                .checked_add(RETENTION_AREA_SIZE)
                .is_some_and(|end| end <= RETRAM_BASE_ADDR + RETRAM_SIZE);
        if !base.is_multiple_of(4) || !fits {
            return Err(Error::RetentionArea);
        }
        self.retention_base = base;
        Ok(())
    }

    /// Brings the DDR up.
    ///
    /// On a standby exit (`params.wakeup_from_standby`), `params.self_refresh` tells whether
    /// the DDR content survived and `params.clear_bkp` whether the caller has to invalidate
    /// its standby state.
    pub fn init(&mut self, params: &mut InitParams) -> Result<(), Error> {
        let dram_type = self.cfg.dram_type;
        log::info!(
            "DDR: {} {}, {} kHz, {} MiB",
            dram_type.name(),
            self.cfg.info.name,
            self.cfg.info.speed.raw(),
            self.cfg.info.size >> 20
        );
        let sr_mode = decode_sr_mode(Pwrctl::new_with_raw_value(self.cfg.reg.pwrctl));
        if sr_mode == SrMode::Invalid {
            return Err(Error::InvalidSrMode);
        }
        self.platform
            .msp_init(dram_type, &mut ClockDelay::new(&mut self.ctl.clock))?;

        params.self_refresh = false;
        params.clear_bkp = false;
        if params.wakeup_from_standby {
            if reset::retention_lost(&mut self.ctl.bus) {
                log::warn!("DDR: retention lost during standby, doing a cold boot");
                params.clear_bkp = true;
            } else {
                params.self_refresh = true;
            }
        }

        if params.self_refresh {
            self.standby_exit()?;
        } else {
            self.cold_boot()?;
        }
        self.run_memtests(params.self_refresh)?;

        self.sr_mode = sr::read_sr_mode(&mut self.ctl.bus);
        self.set_sr_mode(sr_mode)?;
        self.initialized = true;
        log::info!("DDR: ready, self-refresh mode {:?}", self.sr_mode);
        Ok(())
    }

    fn cold_boot(&mut self) -> Result<(), Error> {
        let dram_type = self.cfg.dram_type;
        reset::ddr_reset(&mut self.ctl.bus, &mut self.ctl.clock);
        self.configure_pll()?;
        reset::sysconf(&mut self.ctl.bus, dram_type);

        let reg = self.cfg.reg;
        self.program_controller(&reg)?;
        reset::core_reset_release(&mut self.ctl.bus, &mut self.ctl.clock);
        self.ctl.disable_refresh()?;

        self.load_phy_input()?;
        let mut phy = Phy::new(&mut self.ctl.bus, &mut self.ctl.clock, &mut self.retention);
        phyinit::sequence(
            &mut phy,
            dram_type,
            &self.phy_input,
            &self.cfg.mb_overrides,
            &self.fw,
            false,
            true,
            self.retention_base,
        )?;

        self.ctl.activate_controller(false)?;
        self.ctl.restore_refresh(
            Rfshctl3::new_with_raw_value(self.cfg.reg.rfshctl3),
            Pwrctl::new_with_raw_value(self.cfg.reg.pwrctl),
        )?;
        self.ctl.enable_axi_port();
        Ok(())
    }

    fn standby_exit(&mut self) -> Result<(), Error> {
        let dram_type = self.cfg.dram_type;
        reset::standby_reset(&mut self.ctl.bus, &mut self.ctl.clock);
        reset::set_io_retention(&mut self.ctl.bus, false);
        self.configure_pll()?;
        reset::sysconf(&mut self.ctl.bus, dram_type);

        // The controller has to start in self-refresh, like the DDR.
        let mut reg = self.cfg.reg;
        reg.pwrctl = Pwrctl::new_with_raw_value(reg.pwrctl)
            .with_selfref_sw(true)
            .raw_value();
        self.program_controller(&reg)?;
        reset::standby_reset_release(&mut self.ctl.bus, &mut self.ctl.clock);

        self.load_phy_input()?;
        let mut phy = Phy::new(&mut self.ctl.bus, &mut self.ctl.clock, &mut self.retention);
        phyinit::sequence(
            &mut phy,
            dram_type,
            &self.phy_input,
            &self.cfg.mb_overrides,
            &self.fw,
            true,
            false,
            self.retention_base,
        )?;
        phyinit::restore_sequence(&mut phy, self.retention_base)?;

        sr::wait_phy_lp3(&mut self.ctl, SrTransition::Exit)?;
        self.ctl.activate_controller(false)?;
        self.ctl
            .bus
            .modify::<Pwrctl>(|val| val.with_selfref_sw(false));
        self.ctl.sr_loop(SrTransition::Exit)?;
        self.ctl.set_dfi_lp_sr(true);
        self.ctl.enable_axi_port();
        log::info!("DDR: left self-refresh after standby");
        Ok(())
    }

    fn configure_pll(&mut self) -> Result<(), Error> {
        if let Some(pll) = &self.cfg.pll {
            configure_ddr_pll(&mut self.ctl.bus, &mut self.ctl.clock, pll)?;
        }
        Ok(())
    }

    fn program_controller(&mut self, reg: &DdrcReg) -> Result<(), Error> {
        self.ctl.set_reg(DDRC_REG, reg)?;
        self.ctl.set_reg(DDRC_TIMING, &self.cfg.timing)?;
        self.ctl.set_reg(DDRC_MAP, &self.cfg.map)?;
        self.ctl.set_reg(DDRC_PERF, &self.cfg.perf)
    }

    /// Fills the PHY user input from the configuration and writes the swizzle CSRs.
    fn load_phy_input(&mut self) -> Result<(), Error> {
        let mut input = PhyInput::default();
        regs::copy_params(PHY_UIB, &self.cfg.uib, &mut input.uib)
            .map_err(Error::InvalidDescriptor)?;
        regs::copy_params(PHY_UIA, &self.cfg.uia, &mut input.uia)
            .map_err(Error::InvalidDescriptor)?;
        regs::copy_params(PHY_UIM, &self.cfg.uim, &mut input.uim)
            .map_err(Error::InvalidDescriptor)?;
        regs::copy_params(PHY_UIS, &self.cfg.uis, &mut input.uis)
            .map_err(Error::InvalidDescriptor)?;
        self.ctl.set_reg(PHY_UIS, &input.uis)?;
        self.phy_input = input;
        Ok(())
    }

    fn run_memtests(&mut self, standby_exit: bool) -> Result<(), Error> {
        if !self.platform.is_tdcid() {
            log::warn!("DDR: not the trusted domain owner, memory tests skipped");
            return Ok(());
        }
        let bus = &mut self.ctl.bus;
        if standby_exit {
            // The content must survive, so only a single word is touched and restored.
            memtest::test_rw_access(bus, DDR_BASE_ADDR)?;
            return Ok(());
        }
        memtest::test_data_bus(bus, DDR_BASE_ADDR)?;
        memtest::test_addr_bus(bus, DDR_BASE_ADDR, self.cfg.info.size)?;
        let size = memtest::check_size(bus, DDR_BASE_ADDR, DDR_MAX_SIZE);
        if size != self.cfg.info.size {
            log::error!(
                "DDR: found {:#x} bytes, expected {:#x}",
                size,
                self.cfg.info.size
            );
            return Err(Error::SizeMismatch {
                expected: self.cfg.info.size,
                found: size,
            });
        }
        log::debug!("DDR: memory tests passed");
        Ok(())
    }

    fn with_strategy<R>(
        &mut self,
        mode: SrMode,
        f: impl FnOnce(&dyn SelfRefreshStrategy<B, C>, &mut DdrCtl<B, C>) -> Result<R, Error>,
    ) -> Result<R, Error> {
        let sw = SwSelfRefresh {
            dram_type: self.cfg.dram_type,
        };
        let auto = AutoSelfRefresh::default();
        let strategy: &dyn SelfRefreshStrategy<B, C> = match mode {
            SrMode::Sw => &sw,
            SrMode::Auto => &auto,
            SrMode::Hw => &HwSelfRefresh,
            SrMode::Invalid => return Err(Error::InvalidSrMode),
        };
        f(strategy, &mut self.ctl)
    }

    /// Puts the DDR into self-refresh with the active mode. Returns the zone data word, which
    /// is always 0.
    pub fn sr_entry(&mut self) -> Result<u32, Error> {
        self.with_strategy(self.sr_mode, |strategy, ctl| strategy.entry(ctl, false))?;
        Ok(0)
    }

    /// Puts the DDR into software self-refresh before the DDR subsystem is powered down. The
    /// IO pads are frozen and the retention is marked valid.
    pub fn standby_sr_entry(&mut self) -> Result<(), Error> {
        let sw = SwSelfRefresh {
            dram_type: self.cfg.dram_type,
        };
        sw.entry(&mut self.ctl, true)?;
        self.ctl.bus.modify::<Cr11>(|val| val.with_ddrretdis(false));
        Ok(())
    }

    pub fn sr_exit(&mut self) -> Result<(), Error> {
        self.with_strategy(self.sr_mode, |strategy, ctl| strategy.exit(ctl))
    }

    /// Switches the self-refresh mode. Setting the active mode again does nothing.
    pub fn set_sr_mode(&mut self, mode: SrMode) -> Result<(), Error> {
        if mode == self.sr_mode {
            return Ok(());
        }
        self.with_strategy(mode, |strategy, ctl| strategy.set(ctl))?;
        log::debug!("DDR: self-refresh mode {:?} -> {:?}", self.sr_mode, mode);
        self.sr_mode = mode;
        Ok(())
    }

    /// Mode currently programmed in the hardware.
    pub fn read_sr_mode(&mut self) -> SrMode {
        sr::read_sr_mode(&mut self.ctl.bus)
    }
}

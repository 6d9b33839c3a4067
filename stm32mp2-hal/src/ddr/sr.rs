//! Self-refresh strategies.
//!
//! The DDR can be put into self-refresh in three ways:
//!
//! - [SwSelfRefresh]: explicitly requested by software with `PWRCTL.selfref_sw`. This is the
//!   only mode which moves the PHY into its LP3 state and which can be used for standby.
//! - [AutoSelfRefresh]: the controller enters self-refresh after an idle period counted by
//!   SYSCFG.
//! - [HwSelfRefresh]: the hardware low-power interface of the controller requests self-refresh
//!   when the system bus is idle.
//!
//! The active mode is encoded in `PWRCTL.en_dfi_dram_clk_disable` and `PWRCTL.selfref_en`, see
//! [read_sr_mode].
use arbitrary_int::u12;
use stm32mp2::{
    ddrc::regs::{Hwlpctl, Pwrctl},
    ddrphy::{self, regs::PhyInLp3},
    pwr::Cr11,
    rcc::regs::{DdrClockMode, Ddritfcfgr},
    syscfg::DdrcAutoSrDelay,
};

use super::{
    DramType, Error,
    ctl::{DdrCtl, SrTransition},
};
use crate::{
    bus::RegisterBus,
    timeout::{Clock, DDR_TIMEOUT_1S, WaitEvent, wait_for},
};

/// Idle period before the controller requests a self-refresh in hardware mode, in multiples of
/// 32 DFI cycles.
const HW_LP_IDLE_X32: u12 = u12::new(0x3);

/// Default idle delay of the automatic mode, in DDR controller clock cycles.
pub const DEFAULT_AUTO_SR_DELAY: u16 = 0x0800;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SrMode {
    Sw,
    Auto,
    Hw,
    Invalid,
}

/// Decodes the active self-refresh mode from `PWRCTL`.
pub fn decode_sr_mode(pwrctl: Pwrctl) -> SrMode {
    match (pwrctl.en_dfi_dram_clk_disable(), pwrctl.selfref_en()) {
        (false, false) => SrMode::Sw,
        (true, false) => SrMode::Hw,
        (true, true) => SrMode::Auto,
        (false, true) => SrMode::Invalid,
    }
}

pub fn read_sr_mode<B: RegisterBus>(bus: &mut B) -> SrMode {
    decode_sr_mode(bus.read::<Pwrctl>())
}

pub trait SelfRefreshStrategy<B: RegisterBus, C: Clock> {
    fn mode(&self) -> SrMode;

    /// Configures the hardware for this mode.
    fn set(&self, ctl: &mut DdrCtl<B, C>) -> Result<(), Error>;

    /// Puts the DDR into self-refresh. `standby` prepares the DDR for a power-down of the
    /// controller and PHY.
    fn entry(&self, ctl: &mut DdrCtl<B, C>, standby: bool) -> Result<(), Error>;

    fn exit(&self, ctl: &mut DdrCtl<B, C>) -> Result<(), Error>;
}

/// Waits until the PHY reports that it entered or left its LP3 low-power state.
pub fn wait_phy_lp3<B: RegisterBus, C: Clock>(
    ctl: &mut DdrCtl<B, C>,
    transition: SrTransition,
) -> Result<(), Error> {
    let (event, in_lp3) = match transition {
        SrTransition::Entry => (WaitEvent::PhyLp3Entry, true),
        SrTransition::Exit => (WaitEvent::PhyLp3Exit, false),
    };
    let bus = &mut ctl.bus;
    wait_for(&mut ctl.clock, DDR_TIMEOUT_1S, event, || {
        let lp3 = PhyInLp3::new_with_raw_value(
            bus.read_phy_csr(ddrphy::TINITENG | ddrphy::csr::PHYINLP3),
        );
        (lp3.phy_in_lp3().value() != 0) == in_lp3
    })?;
    Ok(())
}

pub struct SwSelfRefresh {
    pub dram_type: DramType,
}

impl<B: RegisterBus, C: Clock> SelfRefreshStrategy<B, C> for SwSelfRefresh {
    fn mode(&self) -> SrMode {
        SrMode::Sw
    }

    fn set(&self, ctl: &mut DdrCtl<B, C>) -> Result<(), Error> {
        ctl.bus
            .modify::<Ddritfcfgr>(|val| val.with_ddrckmod(DdrClockMode::Normal));
        ctl.set_qd1_qd3_update_conditions()?;
        ctl.bus.modify::<Hwlpctl>(|val| {
            val.with_hw_lp_en(false).with_hw_lp_exit_idle_en(false)
        });
        ctl.bus.modify::<Pwrctl>(|val| {
            val.with_en_dfi_dram_clk_disable(false)
                .with_selfref_en(false)
        });
        ctl.unset_qd1_qd3_update_conditions()
    }

    fn entry(&self, ctl: &mut DdrCtl<B, C>, standby: bool) -> Result<(), Error> {
        ctl.disable_axi_port()?;

        if self.dram_type == DramType::Lpddr4 && standby {
            ctl.set_phy_master(false)?;
        }
        ctl.set_dfi_lp_sr(false);

        ctl.bus.modify::<Pwrctl>(|val| val.with_selfref_sw(true));
        ctl.sr_loop(SrTransition::Entry)?;

        ctl.activate_controller(true)?;
        wait_phy_lp3(ctl, SrTransition::Entry)?;

        if standby {
            ctl.bus.modify::<Cr11>(|val| val.with_ddr_io_ret_en(true));
        }
        log::debug!("DDR: entered software self-refresh");
        Ok(())
    }

    fn exit(&self, ctl: &mut DdrCtl<B, C>) -> Result<(), Error> {
        ctl.activate_controller(false)?;
        wait_phy_lp3(ctl, SrTransition::Exit)?;

        ctl.bus.modify::<Pwrctl>(|val| val.with_selfref_sw(false));
        ctl.sr_loop(SrTransition::Exit)?;

        ctl.set_dfi_lp_sr(true);
        // LPDDR4 always runs with PHY master requests enabled, entry only drops them for
        // standby. Setting the bit again is harmless.
        if self.dram_type == DramType::Lpddr4 {
            ctl.set_phy_master(true)?;
        }
        ctl.enable_axi_port();
        log::debug!("DDR: left software self-refresh");
        Ok(())
    }
}

pub struct AutoSelfRefresh {
    /// Idle delay in DDR controller clock cycles.
    pub delay: u16,
}

impl Default for AutoSelfRefresh {
    fn default() -> Self {
        Self {
            delay: DEFAULT_AUTO_SR_DELAY,
        }
    }
}

impl<B: RegisterBus, C: Clock> SelfRefreshStrategy<B, C> for AutoSelfRefresh {
    fn mode(&self) -> SrMode {
        SrMode::Auto
    }

    fn set(&self, ctl: &mut DdrCtl<B, C>) -> Result<(), Error> {
        ctl.bus.modify::<Ddritfcfgr>(|val| {
            val.with_ddrckmod(DdrClockMode::AutoSelfRefresh)
        });
        ctl.bus
            .write(DdrcAutoSrDelay::new_with_raw_value(0).with_auto_sr_delay(self.delay));
        ctl.set_qd1_qd3_update_conditions()?;
        ctl.bus.modify::<Hwlpctl>(|val| {
            val.with_hw_lp_en(false).with_hw_lp_exit_idle_en(false)
        });
        ctl.bus.modify::<Pwrctl>(|val| {
            val.with_en_dfi_dram_clk_disable(true)
                .with_selfref_en(true)
        });
        ctl.unset_qd1_qd3_update_conditions()
    }

    fn entry(&self, ctl: &mut DdrCtl<B, C>, _standby: bool) -> Result<(), Error> {
        ctl.sr_loop(SrTransition::Entry)
    }

    fn exit(&self, ctl: &mut DdrCtl<B, C>) -> Result<(), Error> {
        ctl.sr_loop(SrTransition::Exit)
    }
}

pub struct HwSelfRefresh;

impl<B: RegisterBus, C: Clock> SelfRefreshStrategy<B, C> for HwSelfRefresh {
    fn mode(&self) -> SrMode {
        SrMode::Hw
    }

    fn set(&self, ctl: &mut DdrCtl<B, C>) -> Result<(), Error> {
        ctl.bus.modify::<Ddritfcfgr>(|val| {
            val.with_ddrckmod(DdrClockMode::HardwareSelfRefresh)
        });
        ctl.set_qd1_qd3_update_conditions()?;
        ctl.bus.modify::<Hwlpctl>(|val| {
            val.with_hw_lp_en(true)
                .with_hw_lp_exit_idle_en(true)
                .with_hw_lp_idle_x32(HW_LP_IDLE_X32)
        });
        ctl.bus.modify::<Pwrctl>(|val| {
            val.with_en_dfi_dram_clk_disable(true)
                .with_selfref_en(false)
        });
        ctl.unset_qd1_qd3_update_conditions()
    }

    fn entry(&self, ctl: &mut DdrCtl<B, C>, _standby: bool) -> Result<(), Error> {
        ctl.sr_loop(SrTransition::Entry)
    }

    fn exit(&self, ctl: &mut DdrCtl<B, C>) -> Result<(), Error> {
        ctl.sr_loop(SrTransition::Exit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        testutil::{SimBus, SimClock},
        timeout::TimeoutError,
    };
    use stm32mp2::ddrc::regs::{Dfilpcfg0, OperatingMode, Pctrl, Stat};

    fn ctl() -> DdrCtl<SimBus, SimClock> {
        DdrCtl::new(SimBus::new(), SimClock::default())
    }

    #[test]
    fn mode_decode() {
        let pwrctl = Pwrctl::new_with_raw_value(0);
        assert_eq!(decode_sr_mode(pwrctl), SrMode::Sw);
        assert_eq!(
            decode_sr_mode(pwrctl.with_en_dfi_dram_clk_disable(true)),
            SrMode::Hw
        );
        assert_eq!(
            decode_sr_mode(pwrctl.with_en_dfi_dram_clk_disable(true).with_selfref_en(true)),
            SrMode::Auto
        );
        assert_eq!(
            decode_sr_mode(pwrctl.with_selfref_en(true)),
            SrMode::Invalid
        );
    }

    #[test]
    fn set_round_trips_through_pwrctl() {
        let mut ctl = ctl();
        let strategies: [&dyn SelfRefreshStrategy<SimBus, SimClock>; 3] = [
            &HwSelfRefresh,
            &AutoSelfRefresh::default(),
            &SwSelfRefresh {
                dram_type: DramType::Ddr3,
            },
        ];
        for strategy in strategies {
            strategy.set(&mut ctl).unwrap();
            assert_eq!(read_sr_mode(&mut ctl.bus), strategy.mode());
        }
    }

    #[test]
    fn hw_mode_programs_low_power_interface() {
        let mut ctl = ctl();
        ctl.enable_axi_port();
        SelfRefreshStrategy::<SimBus, SimClock>::set(&HwSelfRefresh, &mut ctl).unwrap();
        let hwlpctl = ctl.bus.read::<Hwlpctl>();
        assert!(hwlpctl.hw_lp_en());
        assert!(hwlpctl.hw_lp_exit_idle_en());
        assert_eq!(hwlpctl.hw_lp_idle_x32(), HW_LP_IDLE_X32);
        assert_eq!(
            ctl.bus.read::<Ddritfcfgr>().ddrckmod(),
            DdrClockMode::HardwareSelfRefresh
        );
        // The update window was closed and the ports are back.
        assert!(ctl.axi_port_enabled());
        assert!(!ctl.bus.read::<stm32mp2::ddrc::regs::Dbg1>().dis_hif());
    }

    #[test]
    fn auto_mode_programs_delay() {
        let mut ctl = ctl();
        let auto = AutoSelfRefresh { delay: 0x123 };
        SelfRefreshStrategy::<SimBus, SimClock>::set(&auto, &mut ctl).unwrap();
        assert_eq!(ctl.bus.read::<DdrcAutoSrDelay>().auto_sr_delay(), 0x123);
        assert_eq!(
            ctl.bus.read::<Ddritfcfgr>().ddrckmod(),
            DdrClockMode::AutoSelfRefresh
        );
    }

    #[test]
    fn sw_entry_exit() {
        let mut ctl = ctl();
        ctl.enable_axi_port();
        ctl.set_dfi_lp_sr(true);
        let sw = SwSelfRefresh {
            dram_type: DramType::Ddr3,
        };
        sw.entry(&mut ctl, false).unwrap();
        assert_eq!(
            ctl.bus.read::<Stat>().operating_mode(),
            OperatingMode::SelfRefresh
        );
        assert!(!ctl.bus.read::<Pctrl>().port_en());
        assert!(!ctl.bus.read::<Dfilpcfg0>().dfi_lp_en_sr());
        assert!(!ctl.bus.read::<Cr11>().ddr_io_ret_en());

        sw.exit(&mut ctl).unwrap();
        assert_eq!(ctl.bus.read::<Stat>().operating_mode(), OperatingMode::Normal);
        assert!(ctl.bus.read::<Pctrl>().port_en());
        assert!(ctl.bus.read::<Dfilpcfg0>().dfi_lp_en_sr());
    }

    #[test]
    fn sw_standby_entry_lpddr4() {
        let mut ctl = ctl();
        let dfiphymstr =
            stm32mp2::ddrc::DDRC_BASE_ADDR + stm32mp2::ddrc::offset::DFIPHYMSTR;
        ctl.bus.write32(dfiphymstr, 0x1);
        let sw = SwSelfRefresh {
            dram_type: DramType::Lpddr4,
        };
        sw.entry(&mut ctl, true).unwrap();
        assert_eq!(ctl.bus.read32(dfiphymstr) & 0x1, 0);
        assert!(ctl.bus.read::<Cr11>().ddr_io_ret_en());
    }

    #[test]
    fn lpddr4_exit_enables_phy_master() {
        let mut ctl = ctl();
        let dfiphymstr =
            stm32mp2::ddrc::DDRC_BASE_ADDR + stm32mp2::ddrc::offset::DFIPHYMSTR;
        let sw = SwSelfRefresh {
            dram_type: DramType::Lpddr4,
        };
        sw.entry(&mut ctl, false).unwrap();
        assert_eq!(ctl.bus.read32(dfiphymstr) & 0x1, 0);
        sw.exit(&mut ctl).unwrap();
        assert_eq!(ctl.bus.read32(dfiphymstr) & 0x1, 1);
    }

    #[test]
    fn phy_lp3_timeout() {
        let mut ctl = ctl();
        ctl.bus.phy_never_enters_lp3 = true;
        let sw = SwSelfRefresh {
            dram_type: DramType::Ddr4,
        };
        assert_eq!(
            sw.entry(&mut ctl, false),
            Err(Error::Timeout(TimeoutError(WaitEvent::PhyLp3Entry)))
        );
    }
}

//! DDR controller sequencing: quasi-dynamic register updates, AXI port and host interface
//! control, DFI initialization and refresh handling.
//!
//! Quasi-dynamic registers may only be changed while the controller is parked. The
//! `set_*_update_conditions` functions park the controller and open the `SWCTL.sw_done` window,
//! the matching `unset_*` functions close the window and restore whatever was disabled. The
//! restore information is kept in two flags, so the windows must not be nested.
use arbitrary_int::u5;
use stm32mp2::ddrc::{
    DDRC_BASE_ADDR,
    regs::{
        Dbg1, Dbgcam, Dfilpcfg0, Dfimisc, Dfistat, OperatingMode, Pctrl, Pctrl1, Pstat, Pwrctl,
        Rfshctl3, SelfRefreshType, Stat, Swctl, Swstat,
    },
};

use super::{
    Error,
    regs::{QuasiDynamic, RegDesc, RegTarget},
};
use crate::{
    bus::RegisterBus,
    timeout::{Clock, DDR_TIMEOUT_1S, WaitEvent, wait_for},
};

/// `DFIMISC.dfi_frequency` value used while the DDR is in self-refresh. It selects the PHY
/// low-power state LP3.
const DFI_FREQUENCY_SR: u5 = u5::new(0x1f);

/// `DFIPHYMSTR.dfi_phymstr_en`, PHY initiated retraining (drift compensation).
const DFIPHYMSTR_EN: u32 = 1 << 0;

/// Direction of a self-refresh transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SrTransition {
    Entry,
    Exit,
}

/// Register bus and time base of the DDR subsystem together with the controller update state.
pub struct DdrCtl<B, C> {
    pub(crate) bus: B,
    pub(crate) clock: C,
    axi_port_reenable_request: bool,
    host_interface_reenable_request: bool,
}

impl<B: RegisterBus, C: Clock> DdrCtl<B, C> {
    pub fn new(bus: B, clock: C) -> Self {
        Self {
            bus,
            clock,
            axi_port_reenable_request: false,
            host_interface_reenable_request: false,
        }
    }

    #[inline]
    pub fn bus(&mut self) -> &mut B {
        &mut self.bus
    }

    #[inline]
    pub fn clock(&mut self) -> &mut C {
        &mut self.clock
    }

    pub fn release(self) -> (B, C) {
        (self.bus, self.clock)
    }

    /// Opens the quasi-dynamic programming window.
    pub fn start_sw_done(&mut self) {
        self.bus.modify::<Swctl>(|val| val.with_sw_done(false));
    }

    /// Closes the quasi-dynamic programming window and waits until the controller took over
    /// the new values.
    pub fn wait_sw_done_ack(&mut self) -> Result<(), Error> {
        self.bus.modify::<Swctl>(|val| val.with_sw_done(true));
        wait_for(&mut self.clock, DDR_TIMEOUT_1S, WaitEvent::SwDoneAck, || {
            self.bus.read::<Swstat>().sw_done_ack()
        })?;
        Ok(())
    }

    /// Writes a controller register, wrapped in a `sw_done` window for quasi-dynamic ones.
    pub fn write_reg(&mut self, offset: usize, value: u32, qd: QuasiDynamic) -> Result<(), Error> {
        if qd == QuasiDynamic::Yes {
            self.start_sw_done();
        }
        self.bus.write32(DDRC_BASE_ADDR + offset, value);
        if qd == QuasiDynamic::Yes {
            self.wait_sw_done_ack()?;
        }
        Ok(())
    }

    /// Programs every register of a descriptor table with the values of `params`.
    ///
    /// Only tables which target the controller or PHY CSRs can be applied to the hardware.
    pub fn set_reg<T>(&mut self, table: &[RegDesc<T>], params: &T) -> Result<(), Error> {
        for desc in table {
            let access = desc
                .access
                .as_ref()
                .ok_or(Error::InvalidDescriptor(desc.name))?;
            let value = (access.get)(params);
            match desc.target {
                RegTarget::Ddrc(offset) => self.write_reg(offset, value, desc.qd)?,
                RegTarget::PhyCsr(csr) => self.bus.write_phy_csr(csr, value as u16),
                RegTarget::Param => return Err(Error::InvalidDescriptor(desc.name)),
            }
            log::trace!("DDR: {} = {:#010x}", desc.name, value);
        }
        Ok(())
    }

    /// Reads the live value behind a descriptor target. Parameters have no hardware location.
    pub fn read_reg(&mut self, target: RegTarget) -> Option<u32> {
        match target {
            RegTarget::Ddrc(offset) => Some(self.bus.read32(DDRC_BASE_ADDR + offset)),
            RegTarget::PhyCsr(csr) => Some(self.bus.read_phy_csr(csr) as u32),
            RegTarget::Param => None,
        }
    }

    pub fn axi_port_enabled(&mut self) -> bool {
        self.bus.read::<Pctrl>().port_en() || self.bus.read::<Pctrl1>().port_en()
    }

    /// Disables both AXI ports and waits until all outstanding transactions completed.
    pub fn disable_axi_port(&mut self) -> Result<(), Error> {
        self.bus.modify::<Pctrl>(|val| val.with_port_en(false));
        self.bus.modify::<Pctrl1>(|val| val.with_port_en(false));
        wait_for(&mut self.clock, DDR_TIMEOUT_1S, WaitEvent::AxiPortIdle, || {
            self.bus.read::<Pstat>().idle()
        })?;
        Ok(())
    }

    pub fn enable_axi_port(&mut self) {
        self.bus.modify::<Pctrl>(|val| val.with_port_en(true));
        self.bus.modify::<Pctrl1>(|val| val.with_port_en(true));
    }

    /// Stops the host interface and waits until the command queues and data pipelines drained.
    pub fn disable_host_interface(&mut self) -> Result<(), Error> {
        self.bus.modify::<Dbg1>(|val| val.with_dis_hif(true));
        // The empty flags lag the queue state by a cycle, so they have to be seen twice.
        let mut empty_reads = 0;
        wait_for(
            &mut self.clock,
            DDR_TIMEOUT_1S,
            WaitEvent::HostInterfaceIdle,
            || {
                if self.bus.read::<Dbgcam>().queues_empty() {
                    empty_reads += 1;
                } else {
                    empty_reads = 0;
                }
                empty_reads >= 2
            },
        )?;
        Ok(())
    }

    pub fn enable_host_interface(&mut self) {
        self.bus.modify::<Dbg1>(|val| val.with_dis_hif(false));
    }

    pub fn set_qd3_update_conditions(&mut self) -> Result<(), Error> {
        if self.axi_port_enabled() {
            self.disable_axi_port()?;
            self.axi_port_reenable_request = true;
        }
        self.start_sw_done();
        Ok(())
    }

    pub fn unset_qd3_update_conditions(&mut self) -> Result<(), Error> {
        self.wait_sw_done_ack()?;
        if self.axi_port_reenable_request {
            self.enable_axi_port();
            self.axi_port_reenable_request = false;
        }
        Ok(())
    }

    pub fn set_qd1_qd3_update_conditions(&mut self) -> Result<(), Error> {
        if self.axi_port_enabled() {
            self.disable_axi_port()?;
            self.axi_port_reenable_request = true;
        }
        if !self.bus.read::<Dbg1>().dis_hif() {
            self.disable_host_interface()?;
            self.host_interface_reenable_request = true;
        }
        self.start_sw_done();
        Ok(())
    }

    pub fn unset_qd1_qd3_update_conditions(&mut self) -> Result<(), Error> {
        self.wait_sw_done_ack()?;
        if self.host_interface_reenable_request {
            self.enable_host_interface();
            self.host_interface_reenable_request = false;
        }
        if self.axi_port_reenable_request {
            self.enable_axi_port();
            self.axi_port_reenable_request = false;
        }
        Ok(())
    }

    /// Runs the DFI initialization handshake with the PHY.
    ///
    /// With `sr_entry`, the PHY is sent to its deepest low-power state and the controller stops
    /// waiting for `dfi_init_complete`. Otherwise the PHY returns to mission mode.
    pub fn activate_controller(&mut self, sr_entry: bool) -> Result<(), Error> {
        self.start_sw_done();
        self.bus.modify::<Dfimisc>(|val| {
            val.with_dfi_frequency(if sr_entry {
                DFI_FREQUENCY_SR
            } else {
                u5::new(0)
            })
            .with_dfi_init_start(true)
        });
        self.wait_sw_done_ack()?;

        wait_for(
            &mut self.clock,
            DDR_TIMEOUT_1S,
            WaitEvent::DfiInitComplete,
            || self.bus.read::<Dfistat>().dfi_init_complete(),
        )?;

        self.start_sw_done();
        self.bus.modify::<Dfimisc>(|val| {
            val.with_dfi_init_start(false)
                .with_dfi_init_complete_en(!sr_entry)
        });
        self.wait_sw_done_ack()
    }

    /// Toggles `RFSHCTL3.refresh_update_level` and waits until the new level is visible.
    pub fn refresh_update(&mut self) -> Result<(), Error> {
        let level = !self.bus.read::<Rfshctl3>().refresh_update_level();
        self.bus
            .modify::<Rfshctl3>(|val| val.with_refresh_update_level(level));
        wait_for(&mut self.clock, DDR_TIMEOUT_1S, WaitEvent::RefreshUpdate, || {
            self.bus.read::<Rfshctl3>().refresh_update_level() == level
        })?;
        Ok(())
    }

    /// Stops auto-refresh, power-down and self-refresh for the PHY initialization. Runs in a
    /// QD3 update window.
    pub fn disable_refresh(&mut self) -> Result<(), Error> {
        self.set_qd3_update_conditions()?;
        self.bus
            .modify::<Rfshctl3>(|val| val.with_dis_auto_refresh(true));
        self.refresh_update()?;
        self.bus.modify::<Pwrctl>(|val| {
            val.with_powerdown_en(false).with_selfref_en(false)
        });
        self.bus
            .modify::<Dfimisc>(|val| val.with_dfi_init_complete_en(false));
        self.unset_qd3_update_conditions()
    }

    /// Restores the refresh and power settings of the configuration after
    /// [Self::disable_refresh].
    pub fn restore_refresh(&mut self, rfshctl3: Rfshctl3, pwrctl: Pwrctl) -> Result<(), Error> {
        self.set_qd3_update_conditions()?;
        if !rfshctl3.dis_auto_refresh() {
            self.bus
                .modify::<Rfshctl3>(|val| val.with_dis_auto_refresh(false));
            self.refresh_update()?;
        }
        if pwrctl.powerdown_en() {
            self.bus.modify::<Pwrctl>(|val| val.with_powerdown_en(true));
        }
        if pwrctl.selfref_en() {
            self.bus.modify::<Pwrctl>(|val| val.with_selfref_en(true));
        }
        self.bus
            .modify::<Dfimisc>(|val| val.with_dfi_init_complete_en(true));
        self.unset_qd3_update_conditions()
    }

    /// Waits until the controller reports the requested self-refresh transition.
    pub fn sr_loop(&mut self, transition: SrTransition) -> Result<(), Error> {
        let event = match transition {
            SrTransition::Entry => WaitEvent::SelfRefreshEntry,
            SrTransition::Exit => WaitEvent::SelfRefreshExit,
        };
        wait_for(&mut self.clock, DDR_TIMEOUT_1S, event, || {
            let stat = self.bus.read::<Stat>();
            match transition {
                SrTransition::Entry => {
                    stat.operating_mode() == OperatingMode::SelfRefresh
                        && stat.selfref_type() != SelfRefreshType::NotInSelfRefresh
                }
                SrTransition::Exit => {
                    stat.operating_mode() == OperatingMode::Normal
                        && stat.selfref_type() == SelfRefreshType::NotInSelfRefresh
                }
            }
        })?;
        Ok(())
    }

    /// Enables or disables the DFI low-power interface for self-refresh.
    pub fn set_dfi_lp_sr(&mut self, enable: bool) {
        self.bus
            .modify::<Dfilpcfg0>(|val| val.with_dfi_lp_en_sr(enable));
    }

    /// Enables or disables the PHY initiated retraining, used for LPDDR4 drift compensation.
    pub fn set_phy_master(&mut self, enable: bool) -> Result<(), Error> {
        let addr = DDRC_BASE_ADDR + stm32mp2::ddrc::offset::DFIPHYMSTR;
        self.set_qd3_update_conditions()?;
        if enable {
            self.bus.set_bits32(addr, DFIPHYMSTR_EN);
        } else {
            self.bus.clear_bits32(addr, DFIPHYMSTR_EN);
        }
        self.unset_qd3_update_conditions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ddr::regs::{DDRC_MAP, DDRC_REG, DDRC_TIMING, PHY_UIB, PHY_UIS},
        testutil::{SimBus, SimClock, sample_ddr3_config},
        timeout::TimeoutError,
    };
    use stm32mp2::ddrc::offset;

    fn ctl() -> DdrCtl<SimBus, SimClock> {
        DdrCtl::new(SimBus::new(), SimClock::default())
    }

    #[test]
    fn set_reg_read_back() {
        let cfg = sample_ddr3_config();
        let mut ctl = ctl();
        ctl.set_reg(DDRC_REG, &cfg.reg).unwrap();
        for desc in DDRC_REG {
            let RegTarget::Ddrc(offset) = desc.target else {
                panic!("unexpected target");
            };
            let expected = (desc.access.unwrap().get)(&cfg.reg);
            assert_eq!(ctl.bus.read32(DDRC_BASE_ADDR + offset), expected, "{}", desc.name);
        }
        let qd_count = DDRC_REG
            .iter()
            .filter(|desc| desc.qd == QuasiDynamic::Yes)
            .count();
        assert_eq!(ctl.bus.sw_done_handshakes, qd_count);
    }

    #[test]
    fn qd_handshake_once_per_register() {
        let cfg = sample_ddr3_config();
        let mut ctl = ctl();
        ctl.set_reg(DDRC_TIMING, &cfg.timing).unwrap();
        assert_eq!(ctl.bus.sw_done_handshakes, DDRC_TIMING.len());
        ctl.bus.sw_done_handshakes = 0;
        ctl.set_reg(DDRC_MAP, &cfg.map).unwrap();
        assert_eq!(ctl.bus.sw_done_handshakes, 0);
        assert_eq!(
            ctl.bus.read32(DDRC_BASE_ADDR + offset::ADDRMAP11),
            cfg.map.addrmap11
        );
        // Every handshake closed its window again.
        assert!(ctl.bus.read::<Swctl>().sw_done());
    }

    #[test]
    fn swizzle_written_to_phy() {
        let cfg = sample_ddr3_config();
        let mut ctl = ctl();
        ctl.set_reg(PHY_UIS, &cfg.uis).unwrap();
        for (i, desc) in PHY_UIS.iter().enumerate() {
            let RegTarget::PhyCsr(csr) = desc.target else {
                panic!("unexpected target");
            };
            assert_eq!(ctl.bus.read_phy_csr(csr), cfg.uis.swizzle[i]);
        }
    }

    #[test]
    fn live_readback() {
        let cfg = sample_ddr3_config();
        let mut ctl = ctl();
        ctl.set_reg(DDRC_TIMING, &cfg.timing).unwrap();
        assert_eq!(
            ctl.read_reg(RegTarget::Ddrc(offset::DRAMTMG0)),
            Some(cfg.timing.dramtmg0)
        );
        assert_eq!(ctl.read_reg(RegTarget::Param), None);
    }

    #[test]
    fn param_table_rejected() {
        let cfg = sample_ddr3_config();
        let mut ctl = ctl();
        assert_eq!(
            ctl.set_reg(PHY_UIB, &cfg.uib),
            Err(Error::InvalidDescriptor("dimm_type"))
        );
    }

    #[test]
    fn invalid_descriptor_aborts() {
        let table = [RegDesc::<u32> {
            name: "bogus",
            target: RegTarget::Ddrc(offset::SCHED),
            qd: QuasiDynamic::No,
            access: None,
        }];
        let mut ctl = ctl();
        assert_eq!(
            ctl.set_reg(&table, &0),
            Err(Error::InvalidDescriptor("bogus"))
        );
        assert_eq!(ctl.bus.read32(DDRC_BASE_ADDR + offset::SCHED), 0);
    }

    #[test]
    fn sw_done_timeout() {
        let mut ctl = ctl();
        ctl.bus.sw_done_never_acks = true;
        assert_eq!(
            ctl.write_reg(offset::MSTR, 0x1, QuasiDynamic::Yes),
            Err(Error::Timeout(TimeoutError(WaitEvent::SwDoneAck)))
        );
    }

    #[test]
    fn qd3_window_restores_ports() {
        let mut ctl = ctl();
        ctl.enable_axi_port();
        ctl.set_qd3_update_conditions().unwrap();
        assert!(!ctl.axi_port_enabled());
        assert!(!ctl.bus.read::<Swctl>().sw_done());
        ctl.unset_qd3_update_conditions().unwrap();
        assert!(ctl.axi_port_enabled());

        // Ports which were disabled before stay disabled.
        ctl.disable_axi_port().unwrap();
        ctl.set_qd3_update_conditions().unwrap();
        ctl.unset_qd3_update_conditions().unwrap();
        assert!(!ctl.axi_port_enabled());
    }

    #[test]
    fn qd1_qd3_window() {
        let mut ctl = ctl();
        ctl.enable_axi_port();
        ctl.set_qd1_qd3_update_conditions().unwrap();
        assert!(ctl.bus.read::<Dbg1>().dis_hif());
        assert!(ctl.bus.dbgcam_reads >= 2);
        ctl.unset_qd1_qd3_update_conditions().unwrap();
        assert!(!ctl.bus.read::<Dbg1>().dis_hif());
        assert!(ctl.axi_port_enabled());
    }

    #[test]
    fn axi_port_busy_timeout() {
        let mut ctl = ctl();
        ctl.bus.pstat_busy = true;
        ctl.enable_axi_port();
        assert_eq!(
            ctl.set_qd3_update_conditions(),
            Err(Error::Timeout(TimeoutError(WaitEvent::AxiPortIdle)))
        );
    }

    #[test]
    fn activate() {
        let mut ctl = ctl();
        ctl.activate_controller(false).unwrap();
        let dfimisc = ctl.bus.read::<Dfimisc>();
        assert!(dfimisc.dfi_init_complete_en());
        assert!(!dfimisc.dfi_init_start());
        assert_eq!(dfimisc.dfi_frequency().value(), 0);

        ctl.activate_controller(true).unwrap();
        let dfimisc = ctl.bus.read::<Dfimisc>();
        assert!(!dfimisc.dfi_init_complete_en());
        assert_eq!(dfimisc.dfi_frequency(), DFI_FREQUENCY_SR);
    }

    #[test]
    fn refresh_disable_restore() {
        let cfg = sample_ddr3_config();
        let mut ctl = ctl();
        ctl.set_reg(DDRC_REG, &cfg.reg).unwrap();
        ctl.disable_refresh().unwrap();
        assert!(ctl.bus.read::<Rfshctl3>().dis_auto_refresh());
        let pwrctl = ctl.bus.read::<Pwrctl>();
        assert!(!pwrctl.powerdown_en() && !pwrctl.selfref_en());
        assert!(!ctl.bus.read::<Dfimisc>().dfi_init_complete_en());

        ctl.restore_refresh(
            Rfshctl3::new_with_raw_value(cfg.reg.rfshctl3),
            Pwrctl::new_with_raw_value(cfg.reg.pwrctl),
        )
        .unwrap();
        assert!(!ctl.bus.read::<Rfshctl3>().dis_auto_refresh());
        assert_eq!(ctl.bus.read32(DDRC_BASE_ADDR + offset::PWRCTL), cfg.reg.pwrctl);
        assert!(ctl.bus.read::<Dfimisc>().dfi_init_complete_en());
    }

    #[test]
    fn refresh_window_parks_axi_ports() {
        let mut ctl = ctl();
        ctl.enable_axi_port();
        ctl.disable_refresh().unwrap();
        assert!(ctl.axi_port_enabled());

        ctl.bus.pstat_busy = true;
        assert_eq!(
            ctl.disable_refresh(),
            Err(Error::Timeout(TimeoutError(WaitEvent::AxiPortIdle)))
        );
        assert!(!ctl.axi_port_enabled());
    }

    #[test]
    fn self_refresh_loop() {
        let mut ctl = ctl();
        ctl.bus.modify::<Pwrctl>(|val| val.with_selfref_sw(true));
        ctl.sr_loop(SrTransition::Entry).unwrap();
        assert_eq!(
            ctl.sr_loop(SrTransition::Exit),
            Err(Error::Timeout(TimeoutError(WaitEvent::SelfRefreshExit)))
        );
        ctl.bus.modify::<Pwrctl>(|val| val.with_selfref_sw(false));
        ctl.sr_loop(SrTransition::Exit).unwrap();
    }
}

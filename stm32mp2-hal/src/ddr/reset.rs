//! Clock, reset and system configuration of the DDR subsystem.
use stm32mp2::{
    ddrdbg::{BypassPclken, LpDisable},
    pwr::Cr11,
    rcc::regs::{
        DdrClockMode, Ddrcapbcfgr, Ddrcfgr, Ddrcpcfgr, Ddritfcfgr, Ddrphycapbcfgr, Ddrphyccfgr,
    },
};

use super::DramType;
use crate::{bus::RegisterBus, timeout::Clock};

const DELAY_US: u32 = crate::timeout::DDR_DELAY_1US.ticks() as u32;

/// Enables the APB clocks of the controller, the PHY and the configuration block with their
/// resets asserted, then releases the APB resets. Controller core and PHY stay in reset.
fn enable_apb<B: RegisterBus, C: Clock>(bus: &mut B, clock: &mut C) {
    clock.delay_us(DELAY_US);
    bus.write(
        Ddrcpcfgr::new_with_raw_value(0)
            .with_en(true)
            .with_lp_en(true)
            .with_rst(true),
    );
    bus.write(Ddritfcfgr::new_with_raw_value(0).with_ddrrst(true));
    bus.write(
        Ddrphycapbcfgr::new_with_raw_value(0)
            .with_en(true)
            .with_lp_en(true)
            .with_rst(true),
    );
    bus.write(
        Ddrcapbcfgr::new_with_raw_value(0)
            .with_en(true)
            .with_lp_en(true)
            .with_rst(true),
    );
    bus.write(
        Ddrcfgr::new_with_raw_value(0)
            .with_en(true)
            .with_lp_en(true)
            .with_rst(true),
    );
    clock.delay_us(DELAY_US);

    bus.modify::<Ddrphycapbcfgr>(|val| val.with_rst(false));
    bus.modify::<Ddrcapbcfgr>(|val| val.with_rst(false));
    bus.modify::<Ddrcfgr>(|val| val.with_rst(false));
    bus.modify::<Ddritfcfgr>(|val| {
        val.with_ddrcken(true)
            .with_ddrcklpen(true)
            .with_ddrckmod(DdrClockMode::Normal)
    });
    clock.delay_us(DELAY_US);
}

/// Puts the whole DDR subsystem into reset and enables its register interfaces.
pub fn ddr_reset<B: RegisterBus, C: Clock>(bus: &mut B, clock: &mut C) {
    bus.write(Ddrphyccfgr::new_with_raw_value(0));
    enable_apb(bus, clock);
}

/// Like [ddr_reset], but the PHY reference clock is enabled right away. The PHY kept its
/// configuration in retention.
pub fn standby_reset<B: RegisterBus, C: Clock>(bus: &mut B, clock: &mut C) {
    enable_apb(bus, clock);
    bus.write(Ddrphyccfgr::new_with_raw_value(0).with_en(true));
    clock.delay_us(DELAY_US);
}

/// Releases the controller core and the PHY from reset after the controller registers were
/// programmed.
pub fn core_reset_release<B: RegisterBus, C: Clock>(bus: &mut B, clock: &mut C) {
    bus.write(Ddrphyccfgr::new_with_raw_value(0).with_en(true));
    clock.delay_us(DELAY_US);
    bus.modify::<Ddritfcfgr>(|val| val.with_ddrrst(false));
    bus.modify::<Ddrcpcfgr>(|val| val.with_rst(false));
    clock.delay_us(DELAY_US);
}

pub fn standby_reset_release<B: RegisterBus, C: Clock>(bus: &mut B, clock: &mut C) {
    bus.modify::<Ddritfcfgr>(|val| val.with_ddrrst(false));
    bus.modify::<Ddrcpcfgr>(|val| val.with_rst(false));
    clock.delay_us(DELAY_US);
}

/// Low-power configuration of the DDR subsystem.
pub fn sysconf<B: RegisterBus>(bus: &mut B, dram_type: DramType) {
    bus.write(LpDisable::new_with_raw_value(0));
    bus.write(BypassPclken::new_with_raw_value(0));
    bus.modify::<Ddritfcfgr>(|val| val.with_ddrphydlp(dram_type == DramType::Lpddr4));
}

/// Freezes or releases the DDR IO pads.
pub fn set_io_retention<B: RegisterBus>(bus: &mut B, enable: bool) {
    bus.modify::<Cr11>(|val| val.with_ddr_io_ret_en(enable));
}

/// True if the retention supply was lost during standby, in which case the DDR content is gone.
pub fn retention_lost<B: RegisterBus>(bus: &mut B) -> bool {
    bus.read::<Cr11>().ddrretdis()
}

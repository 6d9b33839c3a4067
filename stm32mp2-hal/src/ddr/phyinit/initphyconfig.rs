//! Static PHY configuration (step C).
//!
//! Every value is derived from the PHY user input and the message block. The numeric
//! constants and frequency bands are PHY calibration data and are used as they are.
use arbitrary_int::{u3, u4, u5, u6, u7};
use stm32mp2::ddrphy::{
    self, csr,
    regs::{
        ATxImpedance, ATxSlewRate, CalRate, TxImpedanceCtrl1, TxOdtDrvStren, TxSlewRate,
        VrefInGlobal,
    },
};

use super::{
    Phy, PhyInput, dbyte_active,
    drvstren::{DrvType, map_drive_strength},
    messageblock::MessageBlock,
};
use crate::{
    bus::RegisterBus,
    ddr::{
        DramType, Error,
        config::{NB_SWIZZLE, UserInputAdvanced, UserInputBasic},
        regs::swizzle_csr,
    },
    timeout::Clock,
};

const PLL_CTRL1: u16 = 0x21;
const PLL_TEST_MODE: u16 = 0x24;
const PLL_CTRL4: u16 = 0x17f;
const DLL_GAIN_CTL: u16 = 0x61;
const DLL_LOCK_PARAM: u16 = 0x212;
const DBYTE_DLL_MODE_CNTRL: u16 = 0x2;

const TX_PRE_DRV_MODE: u8 = 0x3;
const ATX_PRE_DRV_MODE: u8 = 0x3;
/// The clock ANIBs use a separate pre-driver setting.
const ATX_PRE_DRV_MODE_CK: u8 = 0x1;
const CK_ANIBS: [u32; 2] = [4, 5];

const DQ_DQS_RCV_CNTRL_DDR34: u16 = 0x5b1;
const DQ_DQS_RCV_CNTRL_LPDDR4: u16 = 0x581;

/// Receiver power-down of an unused data byte.
const DBYTE_MISC_MODE_DISABLED: u16 = 0x4;
const DQ_DQS_RCV_CNTRL1_DISABLED: u16 = 0x7ff;

const DFI_FREQ_XLAT: u16 = 0x5555;
const DFI_FREQ_XLAT_LAST: u16 = 0xf000;

const HWT_CA_MODE_LPDDR4: u16 = 0x1c;
/// Tri-state of the address lanes of an unused ANIB.
const AFORCE_TRI_CONT_ALL: u16 = 0xf;
/// LPDDR4 channel B address/command ANIBs.
const LPDDR4_CHB_ANIBS: core::ops::Range<u32> = 6..12;

/// `PllCtrl2` for the DDR clock `frequency` in MHz.
pub fn pll_ctrl2(frequency: u32) -> u16 {
    match frequency / 2 {
        0..235 => 0x7,
        235..313 => 0x6,
        313..469 => 0xb,
        469..625 => 0xa,
        625..938 => 0x19,
        938..1067 => 0x18,
        _ => 0x19,
    }
}

/// `ARdPtrInitVal`, the address FIFO read pointer initial value.
pub fn ard_ptr_init_val(frequency: u32, pll_bypass: bool) -> u16 {
    let val = if frequency >= 933 { 2 } else { 1 };
    val + pll_bypass as u16
}

/// `VrefInGlobal` for the receiver VREF `phy_vref`, in steps of VDDQ/128.
///
/// The primary DAC range is used when it can represent the value, the secondary range with
/// its 34.5 % offset otherwise.
pub fn vref_in_global(phy_vref: u8) -> VrefInGlobal {
    // VREF in 1/1000 %.
    let pct = phy_vref as u32 * 100_000 / 128;
    let mut dac = (pct + 250) / 500 + 1;
    let mut sel = 0x4;
    if dac > 127 {
        sel = 0x0;
        dac = (pct.saturating_sub(34_500) + 250) / 500;
        dac = dac.clamp(1, 127);
    }
    VrefInGlobal::new_with_raw_value(0)
        .with_global_vref_in_dac(u7::new(dac as u8))
        .with_global_vref_in_sel(u3::new(sel))
}

/// `ProcOdtTimeCtl`, the receiver termination timing.
pub fn proc_odt_time_ctl(
    dram_type: DramType,
    uib: &UserInputBasic,
    uia: &UserInputAdvanced,
) -> u16 {
    let preamble_2tck = dram_type == DramType::Ddr4 && uia.d4_rx_preamble_length == 1;
    if uia.wdqs_ext != 0 {
        0x3
    } else if uib.frequency <= 933 {
        0xa
    } else if uib.frequency <= 1200 {
        if preamble_2tck { 0x2 } else { 0x3 }
    } else if preamble_2tck {
        0x3
    } else {
        0x7
    }
}

/// Legs of the data termination which are enabled for the DRAM type.
pub fn tx_odt_drv_stren(
    dram_type: DramType,
    odt_impedance: u32,
) -> Result<TxOdtDrvStren, Error> {
    let p = map_drive_strength(odt_impedance, DrvType::OdtStrenP)?;
    let n = map_drive_strength(odt_impedance, DrvType::OdtStrenN)?;
    let (p, n) = match dram_type {
        DramType::Ddr3 => (p, n),
        // Terminated to VDDQ.
        DramType::Ddr4 => (p, 0),
        // Terminated to VSSQ.
        DramType::Lpddr4 => (0, n),
    };
    Ok(TxOdtDrvStren::new_with_raw_value(0)
        .with_odt_stren_p(u6::new(p))
        .with_odt_stren_n(u6::new(n)))
}

pub fn tx_impedance_ctrl1(tx_impedance: u32) -> Result<TxImpedanceCtrl1, Error> {
    Ok(TxImpedanceCtrl1::new_with_raw_value(0)
        .with_drv_stren_fsdq_p(u6::new(map_drive_strength(
            tx_impedance,
            DrvType::DrvStrenFsDqP,
        )?))
        .with_drv_stren_fsdq_n(u6::new(map_drive_strength(
            tx_impedance,
            DrvType::DrvStrenFsDqN,
        )?)))
}

pub fn atx_impedance(atx_impedance: u32) -> Result<ATxImpedance, Error> {
    Ok(ATxImpedance::new_with_raw_value(0)
        .with_adrv_stren_p(u5::new(map_drive_strength(
            atx_impedance,
            DrvType::ADrvStrenP,
        )?))
        .with_adrv_stren_n(u5::new(map_drive_strength(
            atx_impedance,
            DrvType::ADrvStrenN,
        )?)))
}

const fn dfi_ca_mode(dram_type: DramType) -> u16 {
    match dram_type {
        DramType::Ddr3 => 0x0,
        DramType::Ddr4 => 0x2,
        DramType::Lpddr4 => 0x4,
    }
}

/// `CalDrvStr0` for the external calibration resistor.
fn cal_drv_str0(ext_cal_res_val: u32) -> u16 {
    let code = match ext_cal_res_val {
        120 => 0x1,
        40 => 0x2,
        _ => 0x0,
    };
    (code << 4) | code
}

const fn rank_mask(num_rank: u32) -> u16 {
    ((1u32 << num_rank) - 1) as u16
}

/// Programs the static PHY configuration.
pub fn init_phy_config<B: RegisterBus, C: Clock>(
    phy: &mut Phy<'_, B, C>,
    dram_type: DramType,
    input: &PhyInput,
    mb: &MessageBlock,
) -> Result<(), Error> {
    let uib = &input.uib;
    let uia = &input.uia;
    let num_dbyte = uib.num_dbyte.min(ddrphy::NUM_DBYTE);
    let num_anib = uib.num_anib.min(ddrphy::NUM_ANIB);

    phy.set_csr_access(true);
    log::debug!(
        "DDR: PHY config for {} at {} MHz",
        dram_type.name(),
        uib.frequency
    );

    let tx_slew = TxSlewRate::new_with_raw_value(0)
        .with_tx_pre_drv_mode(u3::new(TX_PRE_DRV_MODE))
        .with_tx_pre_p(u4::new((uia.tx_slew_rise_dq & 0xf) as u8))
        .with_tx_pre_n(u4::new((uia.tx_slew_fall_dq & 0xf) as u8));
    let odt = tx_odt_drv_stren(dram_type, uia.odt_impedance)?;
    let drv = tx_impedance_ctrl1(uia.tx_impedance)?;
    let rcv_cntrl = match dram_type {
        DramType::Ddr3 | DramType::Ddr4 => DQ_DQS_RCV_CNTRL_DDR34,
        DramType::Lpddr4 => DQ_DQS_RCV_CNTRL_LPDDR4,
    };
    for dbyte in 0..num_dbyte {
        for nibble in 0..ddrphy::NUM_NIBBLES_PER_DBYTE {
            let base = ddrphy::dbyte_lane(dbyte, nibble);
            phy.write(base | csr::TXSLEWRATE, tx_slew.raw_value())?;
            phy.write(base | csr::TXODTDRVSTREN, odt.raw_value())?;
            phy.write(base | csr::TXIMPEDANCECTRL1, drv.raw_value())?;
            phy.write(base | csr::DQDQSRCVCNTRL, rcv_cntrl)?;
        }
    }

    let atx = atx_impedance(uia.atx_impedance)?;
    for anib in 0..num_anib {
        let mode = if CK_ANIBS.contains(&anib) {
            ATX_PRE_DRV_MODE_CK
        } else {
            ATX_PRE_DRV_MODE
        };
        let slew = ATxSlewRate::new_with_raw_value(0)
            .with_atx_pre_drv_mode(u3::new(mode))
            .with_atx_pre_p(u4::new((uia.tx_slew_rise_ac & 0xf) as u8))
            .with_atx_pre_n(u3::new((uia.tx_slew_fall_ac & 0x7) as u8));
        phy.write(ddrphy::anib(anib) | csr::ATXSLEWRATE, slew.raw_value())?;
        phy.write(ddrphy::anib(anib) | csr::ATXIMPEDANCE, atx.raw_value())?;
    }

    let master = |offset: u32| ddrphy::TMASTER | offset;
    phy.write(master(csr::PLLCTRL2), pll_ctrl2(uib.frequency))?;
    phy.write(master(csr::PLLCTRL1), PLL_CTRL1)?;
    phy.write(master(csr::PLLTESTMODE), PLL_TEST_MODE)?;
    phy.write(master(csr::PLLCTRL4), PLL_CTRL4)?;
    phy.write(
        master(csr::ARDPTRINITVAL),
        ard_ptr_init_val(uib.frequency, uib.pll_bypass != 0),
    )?;
    if dram_type != DramType::Ddr3 {
        phy.write(master(csr::DBYTEDLLMODECNTRL), DBYTE_DLL_MODE_CNTRL)?;
    }
    phy.write(master(csr::DLLGAINCTL), DLL_GAIN_CTL)?;
    phy.write(master(csr::DLLLOCKPARAM), DLL_LOCK_PARAM)?;
    phy.write(master(csr::PROCODTTIMECTL), proc_odt_time_ctl(dram_type, uib, uia))?;

    phy.write(master(csr::DFIMODE), uib.dfi_mode as u16)?;
    phy.write(master(csr::DFICAMODE), dfi_ca_mode(dram_type))?;
    phy.write(master(csr::CALDRVSTR0), cal_drv_str0(uia.ext_cal_res_val))?;
    phy.write(
        master(csr::CALUCLKINFO),
        uib.frequency.div_ceil(2).max(24) as u16,
    )?;
    let cal_rate = CalRate::new_with_raw_value(0)
        .with_cal_once(uia.cal_once != 0)
        .with_cal_interval(u4::new((uia.cal_interval & 0xf) as u8));
    phy.write(master(csr::CALRATE), cal_rate.raw_value())?;
    phy.write(
        master(csr::VREFINGLOBAL),
        vref_in_global(mb.phy_vref.unwrap_or(0)).raw_value(),
    )?;

    phy.write(master(csr::DFIFREQRATIO), uib.dfi_freq_ratio as u16)?;
    for i in 0..8 {
        let xlat = if i == 7 { DFI_FREQ_XLAT_LAST } else { DFI_FREQ_XLAT };
        phy.write(master(csr::DFIFREQXLAT0 + i), xlat)?;
    }
    phy.write(
        master(csr::TRISTATEMODECA),
        ((uia.dis_dyn_adr_tri & 1) | ((uia.is_2t_timing & 1) << 1)) as u16,
    )?;

    match dram_type {
        DramType::Ddr3 => phy.write(master(csr::DQSPREAMBLECONTROL), 0x0)?,
        DramType::Ddr4 => {
            let preamble =
                (uia.d4_rx_preamble_length & 1) | ((uia.d4_tx_preamble_length & 1) << 8);
            phy.write(master(csr::DQSPREAMBLECONTROL), preamble as u16)?;
            let x4 = if uib.dram_data_width == 4 { 0xf } else { 0x0 };
            phy.write(master(csr::MASTERX4CONFIG), x4)?;
        }
        DramType::Lpddr4 => {
            phy.write(master(csr::DQSPREAMBLECONTROL), 0x1)?;
            phy.write(master(csr::DMIPINPRESENT), (uib.read_dbi_enable & 1) as u16)?;
            let cs_a = if uib.num_active_dbyte_dfi0 != 0 {
                rank_mask(uib.num_rank_dfi0)
            } else {
                0
            };
            let cs_b = if uib.num_active_dbyte_dfi1 != 0 {
                rank_mask(uib.num_rank_dfi1)
            } else {
                0
            };
            phy.write(master(csr::HWTLPCSENA), cs_a)?;
            phy.write(master(csr::HWTLPCSENB), cs_b)?;
            phy.write(master(csr::HWTCAMODE), HWT_CA_MODE_LPDDR4)?;
            for dbyte in 0..num_dbyte {
                let swap = ((uia.dram_byte_swap >> dbyte) & 1) as u16;
                let static_ctl = (uia.en_tdqs2dq_tracking & 1) as u16 | (swap << 8);
                phy.write(ddrphy::dbyte(dbyte) | csr::PPTCTLSTATIC, static_ctl)?;
            }
            if uib.num_active_dbyte_dfi1 == 0 {
                for anib in LPDDR4_CHB_ANIBS.take_while(|anib| *anib < num_anib) {
                    phy.write(ddrphy::anib(anib) | csr::AFORCETRICONT, AFORCE_TRI_CONT_ALL)?;
                }
                if uia.disable_unused_addr_lns != 0 {
                    let mask = LPDDR4_CHB_ANIBS.fold(0u16, |mask, anib| mask | (1 << anib));
                    phy.write(master(csr::ANIBDISABLE), mask)?;
                }
            }
        }
    }

    for dbyte in 0..num_dbyte {
        if dbyte_active(dram_type, uib, dbyte) {
            continue;
        }
        log::debug!("DDR: data byte {} disabled", dbyte);
        phy.write(ddrphy::dbyte(dbyte) | csr::DBYTEMISCMODE, DBYTE_MISC_MODE_DISABLED)?;
        phy.write(ddrphy::dbyte(dbyte) | csr::DQDQSRCVCNTRL1, DQ_DQS_RCV_CNTRL1_DISABLED)?;
    }

    for idx in 0..NB_SWIZZLE {
        phy.write(swizzle_csr(idx), input.uis.swizzle[idx])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ddr::phyinit::retention::RetentionList,
        testutil::{SimBus, SimClock, sample_ddr3_config},
    };

    #[test]
    fn pll_bands() {
        assert_eq!(pll_ctrl2(400), 0x7);
        assert_eq!(pll_ctrl2(469), 0x7);
        assert_eq!(pll_ctrl2(470), 0x6);
        assert_eq!(pll_ctrl2(533), 0x6);
        assert_eq!(pll_ctrl2(800), 0xb);
        assert_eq!(pll_ctrl2(1066), 0xa);
        assert_eq!(pll_ctrl2(1300), 0x19);
        assert_eq!(pll_ctrl2(1876), 0x18);
        assert_eq!(pll_ctrl2(2134), 0x19);
    }

    #[test]
    fn read_pointer() {
        assert_eq!(ard_ptr_init_val(533, false), 1);
        assert_eq!(ard_ptr_init_val(932, true), 2);
        assert_eq!(ard_ptr_init_val(933, false), 2);
        assert_eq!(ard_ptr_init_val(1200, true), 3);
    }

    #[test]
    fn vref_range_and_select() {
        for phy_vref in 0..=127u8 {
            let vref = vref_in_global(phy_vref);
            let dac = vref.global_vref_in_dac().value();
            assert!((1..=127).contains(&dac), "vref {phy_vref}: dac {dac}");

            let pct = phy_vref as u32 * 100_000 / 128;
            let primary = (pct + 250) / 500 + 1;
            let sel = vref.global_vref_in_sel().value();
            if primary > 127 {
                assert_eq!(sel, 0x0);
            } else {
                assert_eq!(sel, 0x4);
                assert_eq!(dac as u32, primary);
            }
        }
        assert_eq!(vref_in_global(0x40).raw_value(), (101 << 3) | 0x4);
    }

    #[test]
    fn vref_monotonic_per_range() {
        let mut previous = (0x4, 0);
        for phy_vref in 0..=127u8 {
            let vref = vref_in_global(phy_vref);
            let current = (
                vref.global_vref_in_sel().value(),
                vref.global_vref_in_dac().value(),
            );
            if current.0 == previous.0 {
                assert!(current.1 >= previous.1);
            }
            previous = current;
        }
    }

    #[test]
    fn odt_timing() {
        let uib = |frequency| UserInputBasic {
            frequency,
            ..Default::default()
        };
        let mut uia = UserInputAdvanced::default();
        assert_eq!(proc_odt_time_ctl(DramType::Ddr3, &uib(533), &uia), 0xa);
        assert_eq!(proc_odt_time_ctl(DramType::Ddr4, &uib(1200), &uia), 0x3);
        assert_eq!(proc_odt_time_ctl(DramType::Ddr4, &uib(1600), &uia), 0x7);
        uia.d4_rx_preamble_length = 1;
        assert_eq!(proc_odt_time_ctl(DramType::Ddr4, &uib(1200), &uia), 0x2);
        assert_eq!(proc_odt_time_ctl(DramType::Ddr4, &uib(1600), &uia), 0x3);
        assert_eq!(proc_odt_time_ctl(DramType::Lpddr4, &uib(1600), &uia), 0x7);
        uia.wdqs_ext = 1;
        assert_eq!(proc_odt_time_ctl(DramType::Lpddr4, &uib(533), &uia), 0x3);
    }

    #[test]
    fn termination_legs() {
        let ddr3 = tx_odt_drv_stren(DramType::Ddr3, 60).unwrap();
        assert_eq!(ddr3.odt_stren_p().value(), 0x18);
        assert_eq!(ddr3.odt_stren_n().value(), 0x18);
        let ddr4 = tx_odt_drv_stren(DramType::Ddr4, 60).unwrap();
        assert_eq!(ddr4.odt_stren_n().value(), 0);
        let lpddr4 = tx_odt_drv_stren(DramType::Lpddr4, 60).unwrap();
        assert_eq!(lpddr4.odt_stren_p().value(), 0);
        assert_eq!(lpddr4.odt_stren_n().value(), 0x18);
    }

    #[test]
    fn unsupported_address_impedance() {
        assert_eq!(
            atx_impedance(50),
            Err(Error::UnsupportedImpedance {
                ohm: 50,
                target: DrvType::ADrvStrenP
            })
        );
        assert_eq!(atx_impedance(40).unwrap().raw_value(), (0x3 << 5) | 0x3);
    }

    #[test]
    fn ddr3_programming() {
        let cfg = sample_ddr3_config();
        let input = PhyInput {
            uib: UserInputBasic {
                num_active_dbyte_dfi0: 2,
                ..cfg.uib
            },
            uia: cfg.uia,
            uim: cfg.uim,
            uis: cfg.uis,
        };
        let mb = MessageBlock {
            phy_vref: Some(0x40),
            ..MessageBlock::EMPTY
        };
        let mut bus = SimBus::new();
        let mut clock = SimClock::default();
        let mut retention = RetentionList::new();
        retention.start_tracking();
        let mut phy = Phy::new(&mut bus, &mut clock, &mut retention);
        init_phy_config(&mut phy, DramType::Ddr3, &input, &mb).unwrap();

        assert_eq!(phy.read(ddrphy::TMASTER | csr::PLLCTRL2), pll_ctrl2(cfg.uib.frequency));
        assert_eq!(phy.read(ddrphy::TMASTER | csr::PLLCTRL4), PLL_CTRL4);
        assert_eq!(phy.read(ddrphy::TMASTER | (csr::DFIFREQXLAT0 + 7)), 0xf000);
        assert_eq!(
            phy.read(ddrphy::TMASTER | csr::VREFINGLOBAL),
            vref_in_global(0x40).raw_value()
        );
        // DDR3 does not use the DLL mode control.
        assert_eq!(phy.read(ddrphy::TMASTER | csr::DBYTEDLLMODECNTRL), 0);
        // Data bytes 2 and 3 are powered down.
        assert_eq!(phy.read(ddrphy::dbyte(1) | csr::DBYTEMISCMODE), 0);
        assert_eq!(phy.read(ddrphy::dbyte(2) | csr::DBYTEMISCMODE), 0x4);
        assert_eq!(phy.read(ddrphy::dbyte(3) | csr::DQDQSRCVCNTRL1), 0x7ff);
        assert_eq!(
            phy.read(ddrphy::anib(4) | csr::ATXSLEWRATE) >> 7,
            ATX_PRE_DRV_MODE_CK as u16
        );
        assert_eq!(
            phy.read(ddrphy::anib(0) | csr::ATXSLEWRATE) >> 7,
            ATX_PRE_DRV_MODE as u16
        );
        assert_eq!(phy.read(swizzle_csr(NB_SWIZZLE - 1)), cfg.uis.swizzle[NB_SWIZZLE - 1]);
        assert!(phy.retention.len() > 100);
        // CSR access stays with the APB for the next steps.
        assert_eq!(phy.read(ddrphy::TAPBONLY | csr::MICROCONTMUXSEL), 0);
    }

    #[test]
    fn lpddr4_single_channel() {
        let cfg = sample_ddr3_config();
        let input = PhyInput {
            uib: UserInputBasic {
                num_active_dbyte_dfi0: 2,
                num_active_dbyte_dfi1: 0,
                num_rank_dfi0: 1,
                num_anib: 12,
                ..cfg.uib
            },
            uia: UserInputAdvanced {
                disable_unused_addr_lns: 1,
                ..cfg.uia
            },
            uim: cfg.uim,
            uis: cfg.uis,
        };
        let mut bus = SimBus::new();
        let mut clock = SimClock::default();
        let mut retention = RetentionList::new();
        let mut phy = Phy::new(&mut bus, &mut clock, &mut retention);
        init_phy_config(&mut phy, DramType::Lpddr4, &input, &MessageBlock::EMPTY).unwrap();

        assert_eq!(phy.read(ddrphy::TMASTER | csr::HWTLPCSENA), 0x1);
        assert_eq!(phy.read(ddrphy::TMASTER | csr::HWTLPCSENB), 0x0);
        assert_eq!(phy.read(ddrphy::anib(5) | csr::AFORCETRICONT), 0);
        assert_eq!(phy.read(ddrphy::anib(6) | csr::AFORCETRICONT), 0xf);
        assert_eq!(phy.read(ddrphy::anib(11) | csr::AFORCETRICONT), 0xf);
        assert_eq!(phy.read(ddrphy::TMASTER | csr::ANIBDISABLE), 0xfc0);
        assert_eq!(phy.read(ddrphy::TMASTER | csr::DFICAMODE), 0x4);
        assert_eq!(phy.read(ddrphy::dbyte(2) | csr::DBYTEMISCMODE), 0x4);
        assert_eq!(phy.read(ddrphy::dbyte(1) | csr::DBYTEMISCMODE), 0);
    }
}

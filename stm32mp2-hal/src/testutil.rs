//! Simulated DDR subsystem used by the unit tests.
//!
//! [SimBus] stores every register write and models the handful of status bits the driver
//! polls: the `sw_done` handshake, DFI initialization, self-refresh status, the PHY LP3 state,
//! the PLL lock and the training firmware mailbox. The DDR itself is a sparse word store which
//! aliases at `ddr_size`.
use std::{collections::BTreeMap, collections::VecDeque, vec, vec::Vec};

use stm32mp2::{
    DDR_BASE_ADDR, DDR_MAX_SIZE,
    ddrc::{
        self, DDRC_BASE_ADDR,
        regs::{Dbgcam, Dfimisc, Hwlpctl, OperatingMode, Pwrctl, SelfRefreshType},
    },
    ddrphy::{self, DDRPHYC_BASE_ADDR, DDRPHYC_SIZE, csr},
    rcc::{self, regs::Pll2cfgr1},
};

use crate::{
    ddr::{
        config::{
            DdrConfig, DdrInfo, DdrcMap, DdrcPerf, DdrcReg, DdrcTiming, DramType,
            UserInputAdvanced, UserInputBasic, UserInputModeRegisters, UserInputSwizzle,
        },
        phyinit::{
            firmware::imem_size,
            mailbox::MajorMessage,
            messageblock::{MB_SIZE_LPDDR4, MessageBlock},
        },
    },
    time::{Instant, KiloHertz},
    timeout::Clock,
};

/// Read latency the simulated training firmware leaves in `DFIMRL` and `HWTMRL`.
pub const TRAINED_MRL: u16 = 0x1a;

/// One mail sent by the simulated training firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mail(pub u32);

impl Mail {
    pub fn major(msg: MajorMessage) -> Self {
        Self(msg as u16 as u32)
    }

    pub fn wide(value: u32) -> Self {
        Self(value)
    }

    pub fn raw(value: u16) -> Self {
        Self(value as u32)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MailPhase {
    Idle,
    Available,
    Acked,
}

pub struct SimBus {
    regs: BTreeMap<usize, u32>,
    phy: BTreeMap<u32, u16>,
    ddr: BTreeMap<u64, u32>,
    mails: VecDeque<Mail>,
    scripted: bool,
    mail_phase: MailPhase,
    dfi_init_complete: bool,

    /// Size at which the simulated DDR wraps around.
    pub ddr_size: u64,
    /// Data lines which always read back as 0.
    pub ddr_stuck_low: u32,
    pub ddr_writes: usize,
    pub pstat_busy: bool,
    pub sw_done_never_acks: bool,
    pub phy_never_enters_lp3: bool,
    pub pll_never_locks: bool,
    /// No traffic on the system bus. Lets the automatic and hardware modes enter
    /// self-refresh.
    pub traffic_idle: bool,
    pub sw_done_handshakes: usize,
    pub dbgcam_reads: usize,
    pub fw_runs: usize,
    pub mail_acks: usize,
}

impl Default for SimBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SimBus {
    pub fn new() -> Self {
        let mut regs = BTreeMap::new();
        regs.insert(DDRC_BASE_ADDR + ddrc::offset::SWCTL, 0x1);
        Self {
            regs,
            phy: BTreeMap::new(),
            ddr: BTreeMap::new(),
            mails: VecDeque::new(),
            scripted: false,
            mail_phase: MailPhase::Idle,
            dfi_init_complete: false,
            ddr_size: 0x2000_0000,
            ddr_stuck_low: 0,
            ddr_writes: 0,
            pstat_busy: false,
            sw_done_never_acks: false,
            phy_never_enters_lp3: false,
            pll_never_locks: false,
            traffic_idle: false,
            sw_done_handshakes: 0,
            dbgcam_reads: 0,
            fw_runs: 0,
            mail_acks: 0,
        }
    }

    /// Mails sent by the firmware on its next start. Without a script the firmware reports
    /// success right away.
    pub fn script_mailbox(&mut self, script: &[Mail]) {
        self.mails = script.iter().copied().collect();
        self.scripted = true;
    }

    /// Starts the training firmware: the trained results land in the PHY and the first mail
    /// is posted.
    pub fn start_firmware(&mut self) {
        self.fw_runs += 1;
        if !self.scripted {
            self.mails = VecDeque::from([Mail::major(MajorMessage::TrainingSuccess)]);
        }
        self.scripted = false;
        for dbyte in 0..ddrphy::NUM_DBYTE {
            self.phy.insert(ddrphy::dbyte(dbyte) | csr::DFIMRL, TRAINED_MRL);
        }
        self.phy.insert(ddrphy::TMASTER | csr::HWTMRL, TRAINED_MRL);
        self.mail_phase = self.next_mail_phase();
    }

    pub fn mailbox_drained(&self) -> bool {
        self.mails.is_empty()
    }

    /// PHY power loss: every CSR returns to its reset value.
    pub fn reset_phy(&mut self) {
        self.phy.clear();
        self.mails.clear();
        self.mail_phase = MailPhase::Idle;
    }

    fn next_mail_phase(&self) -> MailPhase {
        if self.mails.is_empty() {
            MailPhase::Idle
        } else {
            MailPhase::Available
        }
    }

    fn reg(&self, addr: usize) -> u32 {
        self.regs.get(&addr).copied().unwrap_or(0)
    }

    fn ddr_offset(&self, addr: usize) -> Option<u64> {
        let offset = (addr as u64).wrapping_sub(DDR_BASE_ADDR as u64);
        (offset < DDR_MAX_SIZE).then(|| offset % self.ddr_size)
    }

    fn phy_csr(addr: usize) -> Option<u32> {
        (DDRPHYC_BASE_ADDR..DDRPHYC_BASE_ADDR + DDRPHYC_SIZE)
            .contains(&addr)
            .then(|| ddrphy::phys_to_csr(addr))
    }

    fn stat(&self) -> u32 {
        let pwrctl = Pwrctl::new_with_raw_value(self.reg(DDRC_BASE_ADDR + ddrc::offset::PWRCTL));
        let hwlpctl =
            Hwlpctl::new_with_raw_value(self.reg(DDRC_BASE_ADDR + ddrc::offset::HWLPCTL));
        let selfref = if pwrctl.selfref_sw() {
            Some(SelfRefreshType::NonAutomatic)
        } else if self.traffic_idle && pwrctl.selfref_en() {
            Some(SelfRefreshType::Automatic)
        } else if self.traffic_idle && hwlpctl.hw_lp_en() {
            Some(SelfRefreshType::NonAutomatic)
        } else {
            None
        };
        match selfref {
            Some(kind) => (OperatingMode::SelfRefresh as u32) | ((kind as u32) << 4),
            None => OperatingMode::Normal as u32,
        }
    }

    fn phy_in_lp3(&self) -> bool {
        let dfimisc =
            Dfimisc::new_with_raw_value(self.reg(DDRC_BASE_ADDR + ddrc::offset::DFIMISC));
        dfimisc.dfi_frequency().value() == 0x1f && !self.phy_never_enters_lp3
    }

    fn read_phy(&mut self, csr_addr: u32) -> u16 {
        match csr_addr {
            a if a == ddrphy::TAPBONLY | csr::UCTSHADOWREGS => {
                (self.mail_phase != MailPhase::Available) as u16
            }
            a if a == ddrphy::TAPBONLY | csr::UCTWRITEONLYSHADOW => {
                self.mails.front().map_or(0, |mail| mail.0 as u16)
            }
            a if a == ddrphy::TAPBONLY | csr::UCTDATWRITEONLYSHADOW => {
                self.mails.front().map_or(0, |mail| (mail.0 >> 16) as u16)
            }
            a if a == ddrphy::TINITENG | csr::PHYINLP3 => self.phy_in_lp3() as u16,
            a => self.phy.get(&a).copied().unwrap_or(0),
        }
    }

    fn write_phy(&mut self, csr_addr: u32, value: u16) {
        if csr_addr == ddrphy::TAPBONLY | csr::DCTWRITEPROT {
            match (self.mail_phase, value) {
                (MailPhase::Available, 0) => {
                    self.mails.pop_front();
                    self.mail_acks += 1;
                    self.mail_phase = MailPhase::Acked;
                }
                (MailPhase::Acked, 1) => self.mail_phase = self.next_mail_phase(),
                _ => (),
            }
        }
        let previous = self.phy.insert(csr_addr, value);
        if csr_addr == ddrphy::TAPBONLY | csr::MICRORESET && value == 0 && previous != Some(0) {
            self.start_firmware();
        }
    }
}

impl crate::bus::RegisterBus for SimBus {
    fn read32(&mut self, addr: usize) -> u32 {
        if let Some(offset) = self.ddr_offset(addr) {
            return self.ddr.get(&offset).copied().unwrap_or(0) & !self.ddr_stuck_low;
        }
        if let Some(csr_addr) = Self::phy_csr(addr) {
            return self.read_phy(csr_addr) as u32;
        }
        match addr.wrapping_sub(DDRC_BASE_ADDR) {
            ddrc::offset::STAT => self.stat(),
            ddrc::offset::SWSTAT => {
                (self.reg(DDRC_BASE_ADDR + ddrc::offset::SWCTL) & 0x1 == 1
                    && !self.sw_done_never_acks) as u32
            }
            ddrc::offset::PSTAT => self.pstat_busy as u32,
            ddrc::offset::DBGCAM => {
                self.dbgcam_reads += 1;
                Dbgcam::EMPTY_MASK
            }
            ddrc::offset::DFISTAT => self.dfi_init_complete as u32,
            _ if addr == rcc::RCC_BASE_ADDR + rcc::offset::PLL2CFGR1 => {
                let cfgr1 = Pll2cfgr1::new_with_raw_value(self.reg(addr));
                let locked = cfgr1.pllen() && !self.pll_never_locks;
                (cfgr1.raw_value() & !(1 << 24)) | ((locked as u32) << 24)
            }
            _ => self.reg(addr),
        }
    }

    fn write32(&mut self, addr: usize, value: u32) {
        if let Some(offset) = self.ddr_offset(addr) {
            self.ddr.insert(offset, value);
            self.ddr_writes += 1;
            return;
        }
        if let Some(csr_addr) = Self::phy_csr(addr) {
            self.write_phy(csr_addr, value as u16);
            return;
        }
        match addr.wrapping_sub(DDRC_BASE_ADDR) {
            ddrc::offset::SWCTL => {
                if self.reg(addr) & 0x1 == 0 && value & 0x1 == 1 {
                    self.sw_done_handshakes += 1;
                }
            }
            ddrc::offset::DFIMISC => {
                if Dfimisc::new_with_raw_value(value).dfi_init_start() {
                    self.dfi_init_complete = true;
                }
            }
            _ => (),
        }
        self.regs.insert(addr, value);
    }

    fn read16(&mut self, addr: usize) -> u16 {
        self.read32(addr) as u16
    }

    fn write16(&mut self, addr: usize, value: u16) {
        match Self::phy_csr(addr) {
            Some(csr_addr) => self.write_phy(csr_addr, value),
            None => self.write32(addr, value as u32),
        }
    }
}

/// Clock which advances by a fixed step on every read, so polling loops terminate.
#[derive(Debug, Default)]
pub struct SimClock {
    now_us: u64,
}

const POLL_STEP_US: u64 = 10;

impl Clock for SimClock {
    fn now(&mut self) -> Instant {
        self.now_us += POLL_STEP_US;
        Instant::from_ticks(self.now_us)
    }

    fn delay_us(&mut self, us: u32) {
        self.now_us += us as u64;
    }
}

/// DDR3-1066, one rank of 16-bit devices on a 32-bit bus, 512 MiB.
pub fn sample_ddr3_config() -> DdrConfig {
    DdrConfig {
        info: DdrInfo {
            name: "DDR3-1066 32bits 533MHz",
            speed: KiloHertz::from_raw(533_000),
            size: 0x2000_0000,
        },
        dram_type: DramType::Ddr3,
        reg: DdrcReg {
            mstr: 0x0104_0001,
            mrctrl0: 0x0000_0010,
            pwrctl: 0x0000_0000,
            pwrtmg: 0x0040_0010,
            hwlpctl: 0x0000_0000,
            rfshctl0: 0x0021_0000,
            rfshctl1: 0x0000_0000,
            rfshctl3: 0x0000_0000,
            crcparctl0: 0x0000_0000,
            init0: 0xc002_0002,
            init1: 0x0001_0002,
            init3: 0x1d70_0004,
            init4: 0x0018_0000,
            init5: 0x0010_0004,
            dimmctl: 0x0000_0000,
            rankctl: 0x0000_066f,
            zqctl0: 0x0080_0040,
            zqctl1: 0x0200_0070,
            dfitmg0: 0x0385_8203,
            dfitmg1: 0x0001_0303,
            dfilpcfg0: 0x0700_0100,
            dfiupd0: 0xc030_0003,
            dfiupd1: 0x0000_0000,
            dfimisc: 0x0000_0041,
            dfitmg2: 0x0000_0003,
            dbictl: 0x0000_0000,
            dfiphymstr: 0x0000_0000,
            odtmap: 0x0000_0001,
            dbg0: 0x0000_0000,
            dbg1: 0x0000_0000,
            dbgcmd: 0x0000_0000,
            swctlstatic: 0x0000_0000,
            poisoncfg: 0x0000_0000,
            pccfg: 0x0000_0010,
            ..Default::default()
        },
        timing: DdrcTiming {
            rfshtmg: 0x0040_8022,
            rfshtmg1: 0x0004_0000,
            dramtmg0: 0x0913_0f12,
            dramtmg1: 0x0003_0417,
            dramtmg2: 0x0000_050c,
            dramtmg3: 0x0000_400c,
            dramtmg4: 0x0404_0408,
            dramtmg5: 0x0504_0303,
            dramtmg6: 0x0202_0006,
            dramtmg7: 0x0000_0504,
            dramtmg8: 0x0000_0d05,
            dramtmg9: 0x0000_0000,
            dramtmg10: 0x0000_0000,
            dramtmg11: 0x0000_0000,
            dramtmg12: 0x0000_0000,
            dramtmg13: 0x0000_0000,
            dramtmg14: 0x0000_0000,
            dramtmg15: 0x0000_0000,
            odtcfg: 0x0600_0600,
        },
        map: DdrcMap {
            addrmap0: 0x0000_0000,
            addrmap1: 0x0008_0808,
            addrmap2: 0x0000_0000,
            addrmap3: 0x0000_0000,
            addrmap4: 0x0000_1f1f,
            addrmap5: 0x0707_0707,
            addrmap6: 0x0f0f_0707,
            addrmap8: 0x0000_0000,
            addrmap9: 0x0000_0000,
            addrmap10: 0x0000_0000,
            addrmap11: 0x0000_0000,
        },
        perf: DdrcPerf {
            sched: 0x0000_0c01,
            sched1: 0x0000_0000,
            perfhpr1: 0x0100_0001,
            perflpr1: 0x0400_0200,
            perfwr1: 0x0400_0200,
            sched3: 0x0404_0404,
            sched4: 0x0000_0000,
            pcfgr_0: 0x0001_0000,
            pcfgw_0: 0x0000_0000,
            pcfgqos0_0: 0x0210_0000,
            pcfgqos1_0: 0x0080_0040,
            pcfgwqos0_0: 0x0110_0001,
            pcfgwqos1_0: 0x0100_0200,
            pcfgr_1: 0x0001_0000,
            pcfgw_1: 0x0000_0000,
            pcfgqos0_1: 0x0210_0000,
            pcfgqos1_1: 0x0080_0040,
            pcfgwqos0_1: 0x0110_0001,
            pcfgwqos1_1: 0x0100_0200,
        },
        uib: UserInputBasic {
            dimm_type: 0,
            lp4x_mode: 0,
            num_dbyte: 4,
            num_active_dbyte_dfi0: 4,
            num_active_dbyte_dfi1: 0,
            num_anib: 12,
            num_rank_dfi0: 1,
            num_rank_dfi1: 0,
            dram_data_width: 16,
            num_pstates: 1,
            frequency: 533,
            pll_bypass: 0,
            dfi_freq_ratio: 1,
            dfi1_exists: 0,
            read_dbi_enable: 0,
            dfi_mode: 1,
        },
        uia: UserInputAdvanced {
            ext_cal_res_val: 240,
            odt_impedance: 60,
            tx_impedance: 40,
            atx_impedance: 40,
            cal_interval: 9,
            cal_once: 0,
            ..Default::default()
        },
        uim: UserInputModeRegisters {
            mr0: 0x1d70,
            mr1: 0x0004,
            mr2: 0x0018,
            ..Default::default()
        },
        uis: UserInputSwizzle::identity(),
        mb_overrides: MessageBlock::EMPTY,
        pll: None,
    }
}

/// Blank training images with the exact sizes expected for `dram_type`.
pub fn sample_firmware(dram_type: DramType) -> (Vec<u8>, Vec<u8>) {
    (vec![0; imem_size(dram_type)], vec![0; MB_SIZE_LPDDR4 + 64])
}

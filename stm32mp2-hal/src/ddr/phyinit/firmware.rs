//! Loading and execution of the PHY training firmware (steps D to H).
use stm32mp2::ddrphy::{self, csr, regs::MicroReset};

use super::{
    Phy,
    mailbox::Mailbox,
    messageblock::{CS_TEST_FAIL_OFFSET, MB_SIZE_LPDDR4, MessageBlock, PMU_REVISION_OFFSET},
};
use crate::{
    bus::RegisterBus,
    ddr::{
        Error,
        config::{DramType, UserInputBasic},
    },
    timeout::Clock,
};

/// Exact size of the training firmware instruction image, per DRAM type.
pub const fn imem_size(dram_type: DramType) -> usize {
    match dram_type {
        DramType::Ddr3 => 21_544,
        DramType::Ddr4 => 29_988,
        DramType::Lpddr4 => 34_384,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FwState {
    Idle,
    ImemLoaded,
    DmemLoaded,
    FwRunning,
    FwDone,
    FwFailed,
}

/// Results read from the message block after training.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainingResult {
    pub pmu_revision: u16,
    pub cs_test_fail: u8,
}

/// Writes a byte image into consecutive 16-bit CSRs starting at `start`. An odd trailing byte
/// is padded with zero.
fn write_image<B: RegisterBus, C: Clock>(phy: &mut Phy<'_, B, C>, start: u32, image: &[u8]) {
    for (i, chunk) in image.chunks(2).enumerate() {
        let word = u16::from_le_bytes([chunk[0], chunk.get(1).copied().unwrap_or(0)]);
        phy.write_untracked(start + i as u32, word);
    }
}

/// Enforces the order of the firmware steps.
#[derive(Debug)]
pub struct FwLoader {
    state: FwState,
}

impl Default for FwLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl FwLoader {
    pub const fn new() -> Self {
        Self {
            state: FwState::Idle,
        }
    }

    #[inline]
    pub fn state(&self) -> FwState {
        self.state
    }

    fn expect(&self, state: FwState) -> Result<(), Error> {
        if self.state != state {
            log::error!("DDR: firmware step in state {:?}, expected {:?}", self.state, state);
            return Err(Error::Sequence);
        }
        Ok(())
    }

    /// Step D: copies the instruction image into the PHY instruction memory.
    pub fn load_imem<B: RegisterBus, C: Clock>(
        &mut self,
        phy: &mut Phy<'_, B, C>,
        dram_type: DramType,
        imem: &[u8],
    ) -> Result<(), Error> {
        self.expect(FwState::Idle)?;
        let expected = imem_size(dram_type);
        if imem.len() != expected {
            return Err(Error::FirmwareSize {
                expected,
                found: imem.len(),
            });
        }
        phy.set_csr_access(true);
        write_image(phy, ddrphy::IMEM_ST_ADDR, imem);
        phy.set_csr_access(false);
        self.state = FwState::ImemLoaded;
        Ok(())
    }

    /// Steps E and F: validates the message block and copies it, followed by the data image,
    /// into the PHY data memory.
    ///
    /// The first bytes of `dmem` are the message block placeholder and are skipped.
    pub fn load_dmem<B: RegisterBus, C: Clock>(
        &mut self,
        phy: &mut Phy<'_, B, C>,
        dram_type: DramType,
        uib: &UserInputBasic,
        mb: &MessageBlock,
        dmem: &[u8],
    ) -> Result<(), Error> {
        self.expect(FwState::ImemLoaded)?;
        mb.validate(dram_type, uib)?;

        let mut buf = [0u8; MB_SIZE_LPDDR4];
        let mb_size = mb.serialize(dram_type, &mut buf)?;

        phy.set_csr_access(true);
        write_image(phy, ddrphy::DMEM_ST_ADDR, &buf[..mb_size]);
        if let Some(tail) = dmem.get(mb_size..) {
            write_image(phy, ddrphy::DMEM_ST_ADDR + (mb_size / 2) as u32, tail);
        }
        phy.set_csr_access(false);
        self.state = FwState::DmemLoaded;
        Ok(())
    }

    /// Step G: runs the firmware and processes its mails until the training finished.
    pub fn exec_fw<B: RegisterBus, C: Clock>(
        &mut self,
        phy: &mut Phy<'_, B, C>,
    ) -> Result<(), Error> {
        self.expect(FwState::DmemLoaded)?;
        self.state = FwState::FwRunning;

        let micro_reset = ddrphy::TAPBONLY | csr::MICRORESET;
        phy.write_untracked(
            micro_reset,
            MicroReset::new_with_raw_value(0)
                .with_reset_to_micro(true)
                .with_stall_to_micro(true)
                .raw_value(),
        );
        phy.write_untracked(
            micro_reset,
            MicroReset::new_with_raw_value(0)
                .with_stall_to_micro(true)
                .raw_value(),
        );
        phy.write_untracked(micro_reset, MicroReset::new_with_raw_value(0).raw_value());

        let result = Mailbox::new().run(phy);

        // Halt the microcontroller again, also after a failure.
        phy.write_untracked(
            micro_reset,
            MicroReset::new_with_raw_value(0)
                .with_stall_to_micro(true)
                .raw_value(),
        );
        self.state = if result.is_ok() {
            FwState::FwDone
        } else {
            FwState::FwFailed
        };
        result
    }

    /// Step H: reads the training results from the message block.
    pub fn read_msg_block<B: RegisterBus, C: Clock>(
        &mut self,
        phy: &mut Phy<'_, B, C>,
    ) -> Result<TrainingResult, Error> {
        self.expect(FwState::FwDone)?;
        phy.set_csr_access(true);
        let pmu_revision = phy.read(ddrphy::DMEM_ST_ADDR + (PMU_REVISION_OFFSET / 2) as u32);
        let word = phy.read(ddrphy::DMEM_ST_ADDR + (CS_TEST_FAIL_OFFSET / 2) as u32);
        phy.set_csr_access(false);

        let cs_test_fail = word.to_le_bytes()[CS_TEST_FAIL_OFFSET % 2];
        log::debug!("DDR: training firmware revision {:#06x}", pmu_revision);
        if cs_test_fail != 0 {
            log::error!("DDR: training failed on chip selects {:#04x}", cs_test_fail);
            self.state = FwState::FwFailed;
            return Err(Error::TrainingFailed);
        }
        Ok(TrainingResult {
            pmu_revision,
            cs_test_fail,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ddr::phyinit::{
            mailbox::MajorMessage,
            messageblock::{MB_SIZE_DDR34, MessageBlockError},
            retention::RetentionList,
        },
        testutil::{Mail, SimBus, SimClock, sample_ddr3_config},
    };
    use std::vec;

    fn mb() -> MessageBlock {
        MessageBlock {
            enabled_dqs: Some(32),
            pmu_revision: Some(0x1234),
            ..MessageBlock::EMPTY
        }
    }

    #[test]
    fn full_sequence() {
        let cfg = sample_ddr3_config();
        let mut bus = SimBus::new();
        let mut clock = SimClock::default();
        let mut retention = RetentionList::new();
        let mut phy = Phy::new(&mut bus, &mut clock, &mut retention);
        let imem = vec![0x5au8; imem_size(DramType::Ddr3)];
        let dmem = vec![0xa5u8; MB_SIZE_LPDDR4 + 6];

        let mut loader = FwLoader::new();
        loader.load_imem(&mut phy, DramType::Ddr3, &imem).unwrap();
        loader
            .load_dmem(&mut phy, DramType::Ddr3, &cfg.uib, &mb(), &dmem)
            .unwrap();
        loader.exec_fw(&mut phy).unwrap();
        assert_eq!(loader.state(), FwState::FwDone);
        let result = loader.read_msg_block(&mut phy).unwrap();
        assert_eq!(result.pmu_revision, 0x1234);
        drop(phy);

        assert_eq!(bus.fw_runs, 1);
        assert_eq!(bus.read_phy_csr(ddrphy::IMEM_ST_ADDR), 0x5a5a);
        // The message block is followed by the data image.
        let tail = ddrphy::DMEM_ST_ADDR + (MB_SIZE_DDR34 / 2) as u32;
        assert_eq!(bus.read_phy_csr(tail), 0xa5a5);
        assert_eq!(bus.read_phy_csr(ddrphy::DMEM_ST_ADDR + 7), 32 << 8);
        // The microcontroller is stalled again.
        assert_eq!(bus.read_phy_csr(ddrphy::TAPBONLY | csr::MICRORESET), 0x1);
    }

    #[test]
    fn out_of_order() {
        let cfg = sample_ddr3_config();
        let mut bus = SimBus::new();
        let mut clock = SimClock::default();
        let mut retention = RetentionList::new();
        let mut phy = Phy::new(&mut bus, &mut clock, &mut retention);
        let mut loader = FwLoader::new();
        assert_eq!(loader.exec_fw(&mut phy), Err(Error::Sequence));
        assert_eq!(
            loader.load_dmem(&mut phy, DramType::Ddr3, &cfg.uib, &mb(), &[]),
            Err(Error::Sequence)
        );
        let imem = vec![0u8; imem_size(DramType::Ddr3)];
        loader.load_imem(&mut phy, DramType::Ddr3, &imem).unwrap();
        assert_eq!(
            loader.load_imem(&mut phy, DramType::Ddr3, &imem),
            Err(Error::Sequence)
        );
    }

    #[test]
    fn imem_size_is_exact() {
        let mut bus = SimBus::new();
        let mut clock = SimClock::default();
        let mut retention = RetentionList::new();
        let mut phy = Phy::new(&mut bus, &mut clock, &mut retention);
        for dram_type in [DramType::Ddr3, DramType::Ddr4, DramType::Lpddr4] {
            let imem = vec![0u8; imem_size(dram_type) - 2];
            assert_eq!(
                FwLoader::new().load_imem(&mut phy, dram_type, &imem),
                Err(Error::FirmwareSize {
                    expected: imem_size(dram_type),
                    found: imem_size(dram_type) - 2
                })
            );
        }
        assert_eq!(imem_size(DramType::Ddr4), 29_988);
        assert_eq!(imem_size(DramType::Lpddr4), 34_384);
    }

    #[test]
    fn invalid_message_block_rejected() {
        let cfg = sample_ddr3_config();
        let mut bus = SimBus::new();
        let mut clock = SimClock::default();
        let mut retention = RetentionList::new();
        let mut phy = Phy::new(&mut bus, &mut clock, &mut retention);
        let imem = vec![0u8; imem_size(DramType::Ddr3)];
        let max = (cfg.uib.num_active_dbyte_dfi0 * 8) as u16;
        for enabled_dqs in [0u8, max as u8 + 1] {
            let mut loader = FwLoader::new();
            loader.load_imem(&mut phy, DramType::Ddr3, &imem).unwrap();
            let mb = MessageBlock {
                enabled_dqs: Some(enabled_dqs),
                ..MessageBlock::EMPTY
            };
            assert_eq!(
                loader.load_dmem(&mut phy, DramType::Ddr3, &cfg.uib, &mb, &[]),
                Err(Error::MessageBlock(MessageBlockError::EnabledDqs {
                    value: enabled_dqs as u16,
                    max
                }))
            );
            assert_eq!(loader.state(), FwState::ImemLoaded);
        }
    }

    #[test]
    fn training_failure() {
        let cfg = sample_ddr3_config();
        let mut bus = SimBus::new();
        bus.script_mailbox(&[Mail::major(MajorMessage::TrainingFailed)]);
        let mut clock = SimClock::default();
        let mut retention = RetentionList::new();
        let mut phy = Phy::new(&mut bus, &mut clock, &mut retention);
        let imem = vec![0u8; imem_size(DramType::Ddr3)];
        let mut loader = FwLoader::new();
        loader.load_imem(&mut phy, DramType::Ddr3, &imem).unwrap();
        loader
            .load_dmem(&mut phy, DramType::Ddr3, &cfg.uib, &mb(), &[])
            .unwrap();
        assert_eq!(loader.exec_fw(&mut phy), Err(Error::TrainingFailed));
        assert_eq!(loader.state(), FwState::FwFailed);
        assert_eq!(loader.read_msg_block(&mut phy), Err(Error::Sequence));
    }

    #[test]
    fn chip_select_failure() {
        let cfg = sample_ddr3_config();
        let mut bus = SimBus::new();
        let mut clock = SimClock::default();
        let mut retention = RetentionList::new();
        let mut phy = Phy::new(&mut bus, &mut clock, &mut retention);
        let imem = vec![0u8; imem_size(DramType::Ddr3)];
        let mut loader = FwLoader::new();
        loader.load_imem(&mut phy, DramType::Ddr3, &imem).unwrap();
        let mb = MessageBlock {
            cs_test_fail: Some(0x1),
            ..mb()
        };
        loader
            .load_dmem(&mut phy, DramType::Ddr3, &cfg.uib, &mb, &[])
            .unwrap();
        loader.exec_fw(&mut phy).unwrap();
        assert_eq!(loader.read_msg_block(&mut phy), Err(Error::TrainingFailed));
    }
}

//! Mailbox between the PHY training firmware and the host.
//!
//! Every mail is exchanged with a four phase handshake:
//!
//! 1. The firmware clears `UctShadowRegs.uct_write_prot_shadow` when a mail is available.
//! 2. The host reads the mail from `UctWriteOnlyShadow`, and for 32-bit mails the upper half
//!    from `UctDatWriteOnlyShadow`.
//! 3. The host acknowledges by writing 0 to `DctWriteProt`. The firmware sets the shadow flag
//!    again.
//! 4. The host writes 1 to `DctWriteProt` to complete the exchange.
use num_enum::TryFromPrimitive;
use stm32mp2::ddrphy::{self, csr, regs::UctShadowRegs};

use super::Phy;
use crate::{
    bus::RegisterBus,
    ddr::Error,
    timeout::{Clock, DDR_TIMEOUT_1S, WaitEvent, wait_for},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u16)]
pub enum MajorMessage {
    EndOfInitialization = 0x00,
    EndOfFineWriteLeveling = 0x01,
    EndOfReadEnableTraining = 0x02,
    EndOfReadDelayCenterOptimization = 0x03,
    EndOfWriteDelayCenterOptimization = 0x04,
    EndOf2dReadDelayVoltageCenterOptimization = 0x05,
    EndOf2dWriteDelayVoltageCenterOptimization = 0x06,
    TrainingSuccess = 0x07,
    StartStreaming = 0x08,
    EndOfMaxReadLatencyTraining = 0x09,
    EndOfReadDqDeskewTraining = 0x0a,
    EndOfLrdimmSpecificTraining = 0x0c,
    EndOfCaTraining = 0x0d,
    EndOfMprReadDelayCenterOptimization = 0xfd,
    EndOfWriteLevelingCoarseDelay = 0xfe,
    TrainingFailed = 0xff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailWidth {
    Bits16,
    Bits32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxState {
    Idle,
    WaitingForMessage,
    /// A message stream is being drained. `remaining` counts the argument mails which still
    /// have to be read, `None` if the stream header was not read yet.
    Streaming {
        remaining: Option<u32>,
    },
    Done,
    Failed,
}

/// Reads one mail from the firmware.
pub fn get_mail<B: RegisterBus, C: Clock>(
    phy: &mut Phy<'_, B, C>,
    width: MailWidth,
) -> Result<u32, Error> {
    let bus = &mut *phy.bus;
    let shadow = |bus: &mut B| {
        UctShadowRegs::new_with_raw_value(
            bus.read_phy_csr(ddrphy::TAPBONLY | csr::UCTSHADOWREGS),
        )
        .uct_write_prot_shadow()
    };

    wait_for(&mut *phy.clock, DDR_TIMEOUT_1S, WaitEvent::MailboxMessage, || {
        !shadow(bus)
    })?;

    let mut mail = bus.read_phy_csr(ddrphy::TAPBONLY | csr::UCTWRITEONLYSHADOW) as u32;
    if width == MailWidth::Bits32 {
        mail |= (bus.read_phy_csr(ddrphy::TAPBONLY | csr::UCTDATWRITEONLYSHADOW) as u32) << 16;
    }

    bus.write_phy_csr(ddrphy::TAPBONLY | csr::DCTWRITEPROT, 0);
    wait_for(&mut *phy.clock, DDR_TIMEOUT_1S, WaitEvent::MailboxAck, || shadow(bus))?;
    bus.write_phy_csr(ddrphy::TAPBONLY | csr::DCTWRITEPROT, 1);
    Ok(mail)
}

/// Host side of the mailbox protocol.
#[derive(Debug)]
pub struct Mailbox {
    state: MailboxState,
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Mailbox {
    pub const fn new() -> Self {
        Self {
            state: MailboxState::Idle,
        }
    }

    #[inline]
    pub fn state(&self) -> MailboxState {
        self.state
    }

    /// Processes a single mail and returns the new state.
    pub fn step<B: RegisterBus, C: Clock>(
        &mut self,
        phy: &mut Phy<'_, B, C>,
    ) -> Result<MailboxState, Error> {
        self.state = match self.state {
            MailboxState::Idle | MailboxState::WaitingForMessage => {
                let mail = get_mail(phy, MailWidth::Bits16)? as u16;
                match MajorMessage::try_from(mail) {
                    Ok(MajorMessage::TrainingSuccess) => {
                        log::info!("DDR: training firmware finished");
                        MailboxState::Done
                    }
                    Ok(MajorMessage::TrainingFailed) => {
                        log::error!("DDR: training failed");
                        MailboxState::Failed
                    }
                    Ok(MajorMessage::StartStreaming) => {
                        MailboxState::Streaming { remaining: None }
                    }
                    Ok(msg) => {
                        log::debug!("DDR: firmware message {:?}", msg);
                        MailboxState::WaitingForMessage
                    }
                    Err(_) => {
                        log::warn!("DDR: unknown firmware message {:#x}", mail);
                        MailboxState::WaitingForMessage
                    }
                }
            }
            MailboxState::Streaming { remaining: None } => {
                let header = get_mail(phy, MailWidth::Bits32)?;
                let nargs = header & 0xffff;
                log::trace!("DDR: stream string {:#x}, {} args", header >> 16, nargs);
                if nargs == 0 {
                    MailboxState::WaitingForMessage
                } else {
                    MailboxState::Streaming {
                        remaining: Some(nargs),
                    }
                }
            }
            MailboxState::Streaming {
                remaining: Some(remaining),
            } => {
                let arg = get_mail(phy, MailWidth::Bits32)?;
                log::trace!("DDR: stream arg {:#x}", arg);
                if remaining <= 1 {
                    MailboxState::WaitingForMessage
                } else {
                    MailboxState::Streaming {
                        remaining: Some(remaining - 1),
                    }
                }
            }
            state @ (MailboxState::Done | MailboxState::Failed) => state,
        };
        Ok(self.state)
    }

    /// Processes mails until the firmware reports the end of the training.
    pub fn run<B: RegisterBus, C: Clock>(&mut self, phy: &mut Phy<'_, B, C>) -> Result<(), Error> {
        loop {
            match self.step(phy)? {
                MailboxState::Done => return Ok(()),
                MailboxState::Failed => return Err(Error::TrainingFailed),
                _ => (),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ddr::phyinit::retention::RetentionList,
        testutil::{Mail, SimBus, SimClock},
        timeout::TimeoutError,
    };

    fn run_script(bus: &mut SimBus, script: &[Mail]) -> (Mailbox, Result<(), Error>) {
        bus.script_mailbox(script);
        bus.start_firmware();
        let mut clock = SimClock::default();
        let mut retention = RetentionList::new();
        let mut phy = Phy::new(bus, &mut clock, &mut retention);
        let mut mailbox = Mailbox::new();
        let result = mailbox.run(&mut phy);
        (mailbox, result)
    }

    #[test]
    fn success() {
        let mut bus = SimBus::new();
        let (mailbox, result) = run_script(
            &mut bus,
            &[
                Mail::major(MajorMessage::EndOfInitialization),
                Mail::major(MajorMessage::EndOfFineWriteLeveling),
                Mail::major(MajorMessage::TrainingSuccess),
            ],
        );
        result.unwrap();
        assert_eq!(mailbox.state(), MailboxState::Done);
        assert!(bus.mailbox_drained());
    }

    #[test]
    fn streaming_is_drained() {
        let mut bus = SimBus::new();
        let (_, result) = run_script(
            &mut bus,
            &[
                Mail::major(MajorMessage::StartStreaming),
                Mail::wide(0x0042_0002),
                Mail::wide(0xdead_beef),
                Mail::wide(0x0000_0001),
                Mail::major(MajorMessage::StartStreaming),
                Mail::wide(0x0043_0000),
                Mail::major(MajorMessage::TrainingSuccess),
            ],
        );
        result.unwrap();
        assert!(bus.mailbox_drained());
        assert_eq!(bus.mail_acks, 7);
    }

    #[test]
    fn stream_arguments_are_not_messages() {
        let mut bus = SimBus::new();
        let (_, result) = run_script(
            &mut bus,
            &[
                Mail::major(MajorMessage::StartStreaming),
                Mail::wide(0x0010_0001),
                // Same value as the failure message.
                Mail::wide(0x0000_00ff),
                Mail::major(MajorMessage::TrainingSuccess),
            ],
        );
        result.unwrap();
    }

    #[test]
    fn failure() {
        let mut bus = SimBus::new();
        let (mailbox, result) = run_script(
            &mut bus,
            &[
                Mail::major(MajorMessage::EndOfInitialization),
                Mail::major(MajorMessage::TrainingFailed),
            ],
        );
        assert_eq!(result, Err(Error::TrainingFailed));
        assert_eq!(mailbox.state(), MailboxState::Failed);
    }

    #[test]
    fn silent_firmware_times_out() {
        let mut bus = SimBus::new();
        let (mailbox, result) =
            run_script(&mut bus, &[Mail::major(MajorMessage::EndOfInitialization)]);
        assert_eq!(
            result,
            Err(Error::Timeout(TimeoutError(WaitEvent::MailboxMessage)))
        );
        assert_eq!(mailbox.state(), MailboxState::WaitingForMessage);
    }

    #[test]
    fn unknown_messages_are_skipped() {
        let mut bus = SimBus::new();
        let (_, result) = run_script(
            &mut bus,
            &[Mail::raw(0x55), Mail::major(MajorMessage::TrainingSuccess)],
        );
        result.unwrap();
    }
}

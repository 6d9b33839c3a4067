//! Message block of the PHY training firmware.
//!
//! The message block is the parameter structure which is placed at the start of the PHY data
//! memory before the training firmware runs. Its byte layout depends on the DRAM type. Every
//! field is optional: fields set by the board configuration are kept as they are, all other
//! fields are derived from the PHY user input, see [super::calcmb].
use crate::ddr::config::{DramType, UserInputBasic};

/// Size of the DDR3 and DDR4 message block in bytes.
pub const MB_SIZE_DDR34: usize = 0x272;
/// Size of the LPDDR4 message block in bytes.
pub const MB_SIZE_LPDDR4: usize = 0x338;

/// Output fields written by the training firmware, identical for all DRAM types.
pub const PMU_REVISION_OFFSET: usize = 0x02;
pub const CS_TEST_FAIL_OFFSET: usize = 0x14;

/// LPDDR4 mode register bytes of channel A, duplicated for channel B.
const LP4_MR_CHA: core::ops::Range<usize> = 0x34..0x40;
const LP4_MR_CHB: usize = 0x4e;

pub const fn mb_size(dram_type: DramType) -> usize {
    match dram_type {
        DramType::Ddr3 | DramType::Ddr4 => MB_SIZE_DDR34,
        DramType::Lpddr4 => MB_SIZE_LPDDR4,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MessageBlockError {
    #[error("enabled DQs {value} not in range 1..={max}")]
    EnabledDqs { value: u16, max: u16 },
    #[error("enabled DQs {value} of channel {channel} not valid, expected a multiple of 16 up to {max}")]
    EnabledDqsChannel { channel: char, value: u16, max: u16 },
    #[error("no LPDDR4 channel enabled")]
    NoChannelEnabled,
    #[error("value {value:#x} of field {field} does not fit")]
    ValueOutOfRange { field: &'static str, value: u16 },
    #[error("buffer of {0} bytes too small for message block")]
    BufferTooSmall(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Width {
    Byte,
    Half,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
    offset: usize,
    width: Width,
}

const fn b(offset: usize) -> Option<Slot> {
    Some(Slot {
        offset,
        width: Width::Byte,
    })
}

const fn h(offset: usize) -> Option<Slot> {
    Some(Slot {
        offset,
        width: Width::Half,
    })
}

const NA: Option<Slot> = None;

macro_rules! message_block {
    ($(
        $(#[$meta:meta])*
        $name:ident: $ty:ty => $ddr34:expr, $lpddr4:expr;
    )*) => {
        #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
        pub struct MessageBlock {
            $(
                $(#[$meta])*
                pub $name: Option<$ty>,
            )*
        }

        impl MessageBlock {
            pub const EMPTY: Self = Self {
                $($name: None,)*
            };

            /// Takes over every field which is set in `overrides`.
            pub fn apply_overrides(&mut self, overrides: &Self) {
                $(
                    if overrides.$name.is_some() {
                        self.$name = overrides.$name;
                    }
                )*
            }

            fn for_each_field(
                &self,
                dram_type: DramType,
                mut f: impl FnMut(&'static str, Option<Slot>, Option<u16>),
            ) {
                $(
                    let slot = match dram_type {
                        DramType::Ddr3 | DramType::Ddr4 => $ddr34,
                        DramType::Lpddr4 => $lpddr4,
                    };
                    f(stringify!($name), slot, self.$name.map(u16::from));
                )*
            }
        }
    };
}

message_block! {
    msg_misc: u8 => b(0x01), b(0x01);
    /// Firmware revision, written by the firmware.
    pmu_revision: u16 => h(0x02), h(0x02);
    pstate: u8 => b(0x04), b(0x04);
    pll_bypass_en: u8 => b(0x05), b(0x05);
    /// Data rate in MT/s.
    dram_freq: u16 => h(0x06), h(0x06);
    dfi_freq_ratio: u8 => b(0x08), b(0x08);
    bpznres_val: u8 => b(0x09), b(0x09);
    phy_odt_impedance: u8 => b(0x0a), b(0x0a);
    phy_drv_impedance: u8 => b(0x0b), b(0x0b);
    phy_vref: u8 => b(0x0c), b(0x0c);
    dram_type: u8 => b(0x0d), NA;
    lp4_misc: u8 => NA, b(0x0d);
    disabled_dbyte: u8 => b(0x0e), NA;
    enabled_dqs: u8 => b(0x0f), NA;
    cs_present: u8 => b(0x10), NA;
    cs_present_d0: u8 => b(0x11), NA;
    cs_present_d1: u8 => b(0x12), NA;
    addr_mirror: u8 => b(0x13), NA;
    /// Bit mask of the chip selects which failed training, written by the firmware.
    cs_test_fail: u8 => b(0x14), b(0x14);
    phy_cfg: u8 => b(0x15), b(0x15);
    /// Training steps to run.
    sequence_ctrl: u16 => h(0x16), h(0x16);
    /// Verbosity of the firmware message stream.
    hdt_ctrl: u8 => b(0x18), b(0x18);
    enabled_dqs_cha: u8 => NA, b(0x32);
    cs_present_cha: u8 => NA, b(0x33);
    mr0: u16 => h(0x34), NA;
    mr1: u16 => h(0x36), b(0x34);
    mr2: u16 => h(0x38), b(0x35);
    mr3: u16 => h(0x3a), b(0x36);
    mr4: u16 => h(0x3c), b(0x37);
    mr5: u16 => h(0x3e), NA;
    mr6: u16 => h(0x40), NA;
    mr11: u8 => NA, b(0x38);
    mr12: u8 => NA, b(0x39);
    mr13: u8 => NA, b(0x3a);
    mr14: u8 => NA, b(0x3b);
    mr16: u8 => NA, b(0x3c);
    mr17: u8 => NA, b(0x3d);
    mr22: u8 => NA, b(0x3e);
    mr24: u8 => NA, b(0x3f);
    enabled_dqs_chb: u8 => NA, b(0x4c);
    cs_present_chb: u8 => NA, b(0x4d);
}

impl MessageBlock {
    /// Checks the message block against the PHY topology.
    pub fn validate(
        &self,
        dram_type: DramType,
        uib: &UserInputBasic,
    ) -> Result<(), MessageBlockError> {
        match dram_type {
            DramType::Ddr3 | DramType::Ddr4 => {
                let value = self.enabled_dqs.unwrap_or(0) as u16;
                let max = (uib.num_active_dbyte_dfi0 * 8) as u16;
                if value == 0 || value > max {
                    return Err(MessageBlockError::EnabledDqs { value, max });
                }
            }
            DramType::Lpddr4 => {
                let cha = self.enabled_dqs_cha.unwrap_or(0) as u16;
                let chb = self.enabled_dqs_chb.unwrap_or(0) as u16;
                check_channel('A', cha, (uib.num_active_dbyte_dfi0 * 8) as u16)?;
                check_channel('B', chb, (uib.num_active_dbyte_dfi1 * 8) as u16)?;
                if cha == 0 && chb == 0 {
                    return Err(MessageBlockError::NoChannelEnabled);
                }
            }
        }
        Ok(())
    }

    /// Serializes the message block into `buf` and returns the number of bytes used. Fields
    /// which are not set are written as zero.
    pub fn serialize(
        &self,
        dram_type: DramType,
        buf: &mut [u8],
    ) -> Result<usize, MessageBlockError> {
        let size = mb_size(dram_type);
        let len = buf.len();
        let buf = buf
            .get_mut(..size)
            .ok_or(MessageBlockError::BufferTooSmall(len))?;
        buf.fill(0);

        let mut result = Ok(());
        self.for_each_field(dram_type, |field, slot, value| {
            let (Some(slot), Some(value)) = (slot, value) else {
                return;
            };
            match slot.width {
                Width::Byte => match u8::try_from(value) {
                    Ok(byte) => buf[slot.offset] = byte,
                    Err(_) => result = Err(MessageBlockError::ValueOutOfRange { field, value }),
                },
                Width::Half => {
                    buf[slot.offset..slot.offset + 2].copy_from_slice(&value.to_le_bytes())
                }
            }
        });
        result?;

        if dram_type == DramType::Lpddr4 {
            buf.copy_within(LP4_MR_CHA, LP4_MR_CHB);
        }
        Ok(size)
    }

    /// Iterates over the fields which are set, used for diagnostics.
    pub fn for_each_set(&self, dram_type: DramType, mut f: impl FnMut(&'static str, u16)) {
        self.for_each_field(dram_type, |field, slot, value| {
            if let (Some(_), Some(value)) = (slot, value) {
                f(field, value);
            }
        });
    }
}

fn check_channel(channel: char, value: u16, max: u16) -> Result<(), MessageBlockError> {
    let valid = if max == 0 {
        value == 0
    } else {
        value != 0 && value <= max && value.is_multiple_of(16)
    };
    if !valid {
        return Err(MessageBlockError::EnabledDqsChannel {
            channel,
            value,
            max,
        });
    }
    Ok(())
}

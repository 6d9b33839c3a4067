//! Impedance to drive strength code mapping of the PHY drivers and receivers.
use crate::ddr::Error;

/// Driver or termination leg which is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrvType {
    /// Data driver, pull-up.
    DrvStrenFsDqP,
    /// Data driver, pull-down.
    DrvStrenFsDqN,
    /// Data termination, pull-up.
    OdtStrenP,
    /// Data termination, pull-down.
    OdtStrenN,
    /// Address/command driver, pull-up.
    ADrvStrenP,
    /// Address/command driver, pull-down.
    ADrvStrenN,
}

/// Upper impedance bounds (exclusive) and codes of the data driver and termination legs.
const DQ_TABLE: [(u32, u8); 17] = [
    (29, 0x3f),
    (31, 0x3e),
    (33, 0x3b),
    (35, 0x3a),
    (38, 0x39),
    (41, 0x38),
    (45, 0x1b),
    (50, 0x1a),
    (56, 0x19),
    (64, 0x18),
    (74, 0x0b),
    (88, 0x0a),
    (108, 0x09),
    (140, 0x08),
    (200, 0x03),
    (360, 0x02),
    (481, 0x01),
];

/// Supported impedances of the address/command drivers.
const ADRV_TABLE: [(u32, u8); 6] = [
    (120, 0x00),
    (60, 0x01),
    (40, 0x03),
    (30, 0x07),
    (24, 0x0f),
    (20, 0x1f),
];

/// Returns the CSR code for the impedance `ohm` of the `target` leg.
///
/// For data legs, 0 Ohm selects high impedance and values above the table range disable the
/// leg as well. Address/command drivers only support a fixed set of impedances.
pub fn map_drive_strength(ohm: u32, target: DrvType) -> Result<u8, Error> {
    match target {
        DrvType::DrvStrenFsDqP
        | DrvType::DrvStrenFsDqN
        | DrvType::OdtStrenP
        | DrvType::OdtStrenN => {
            if ohm == 0 {
                return Ok(0x00);
            }
            Ok(DQ_TABLE
                .iter()
                .find(|(limit, _)| ohm < *limit)
                .map_or(0x00, |(_, code)| *code))
        }
        DrvType::ADrvStrenP | DrvType::ADrvStrenN => ADRV_TABLE
            .iter()
            .find(|(value, _)| *value == ohm)
            .map(|(_, code)| *code)
            .ok_or(Error::UnsupportedImpedance { ohm, target }),
    }
}

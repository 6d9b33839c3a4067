//! # Time units

pub type Hertz = fugit::HertzU32;

/// DDR clock frequencies are given in kHz by the board configurations.
pub type KiloHertz = fugit::KilohertzU32;

/// Microseconds with a 64-bit tick count, used for timeout budgets.
pub type Microseconds = fugit::MicrosDurationU64;

/// Absolute time with microsecond resolution.
pub type Instant = fugit::TimerInstantU64<1_000_000>;

//! # Clock configuration
//!
//! Only the DDR PLL is handled here. The rest of the clock tree is set up before the DDR
//! driver runs.
pub mod pll;

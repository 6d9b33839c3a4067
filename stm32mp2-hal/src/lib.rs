//! # DDR subsystem HAL for the STM32MP2 SoC family
//!
//! This crate brings the external DRAM online: it programs the uMCTL2 DDR controller, drives the
//! DWC DDR PHY through its configuration, training firmware and PHY init engine stages, and
//! handles self-refresh entry and exit including the retention save/restore of the PHY state
//! across standby.
//!
//! All register accesses go through the [bus::RegisterBus] abstraction and all waits through the
//! [timeout::Clock] abstraction, so the complete sequence can run against a simulated register
//! file on a host.
//!
//! The entry point is [ddr::DdrController].
#![no_std]
#![cfg_attr(docsrs, feature(doc_cfg))]

#[cfg(test)]
extern crate std;

pub mod bus;
pub mod clocks;
pub mod ddr;
pub mod log;
pub mod time;
pub mod timeout;

#[cfg(test)]
pub(crate) mod testutil;

pub use stm32mp2 as pac;

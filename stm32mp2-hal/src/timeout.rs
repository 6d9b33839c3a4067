//! # Time base and timeout handling
//!
//! Every wait in the DDR bring-up is a busy-poll loop bounded by a budget. The time base is
//! injected through the [Clock] trait so that the sequences can be driven by a simulated clock
//! on a host.
use crate::time::{Instant, Microseconds};

/// Budget for every controller and PHY handshake.
pub const DDR_TIMEOUT_1S: Microseconds = Microseconds::from_ticks(1_000_000);
/// Settle time after reset and clock changes.
pub const DDR_DELAY_1US: Microseconds = Microseconds::from_ticks(1);
pub const DDR_DELAY_10US: Microseconds = Microseconds::from_ticks(10);
/// Budget for the PLL2 lock.
pub const PLL_LOCK_TIMEOUT: Microseconds = Microseconds::from_ticks(200_000);

/// Events the driver waits for. Carried by [TimeoutError] to identify the failed handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitEvent {
    SwDoneAck,
    AxiPortIdle,
    HostInterfaceIdle,
    DfiInitComplete,
    RefreshUpdate,
    SelfRefreshEntry,
    SelfRefreshExit,
    PhyLp3Entry,
    PhyLp3Exit,
    MailboxMessage,
    MailboxAck,
    PllLock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("timeout waiting for {0:?}")]
pub struct TimeoutError(pub WaitEvent);

/// Point in time after which a wait is considered failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline(Instant);

impl Deadline {
    #[inline]
    pub const fn instant(&self) -> Instant {
        self.0
    }
}

/// Monotonic time base with microsecond resolution.
pub trait Clock {
    fn now(&mut self) -> Instant;

    #[inline]
    fn deadline_from(&mut self, budget: Microseconds) -> Deadline {
        Deadline(self.now() + budget)
    }

    #[inline]
    fn expired(&mut self, deadline: Deadline) -> bool {
        self.now() >= deadline.0
    }

    /// Busy-waits for the given amount of microseconds.
    fn delay_us(&mut self, us: u32) {
        let deadline = self.deadline_from(Microseconds::from_ticks(us as u64));
        while !self.expired(deadline) {
            core::hint::spin_loop();
        }
    }
}

impl<C: Clock + ?Sized> Clock for &mut C {
    #[inline]
    fn now(&mut self) -> Instant {
        (**self).now()
    }

    #[inline]
    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }
}

/// Polls `done` until it returns true or the budget is used up.
///
/// The condition is always checked once more after the deadline expired, so a condition which
/// became true while the caller was preempted does not produce a spurious timeout.
pub fn wait_for<C: Clock + ?Sized>(
    clock: &mut C,
    budget: Microseconds,
    event: WaitEvent,
    mut done: impl FnMut() -> bool,
) -> Result<(), TimeoutError> {
    let deadline = clock.deadline_from(budget);
    loop {
        let expired = clock.expired(deadline);
        if done() {
            return Ok(());
        }
        if expired {
            log::error!("DDR: timeout waiting for {:?}", event);
            return Err(TimeoutError(event));
        }
        core::hint::spin_loop();
    }
}

/// [embedded_hal::delay::DelayNs] provider on top of a [Clock].
pub struct ClockDelay<'clk, C: Clock + ?Sized>(&'clk mut C);

impl<'clk, C: Clock + ?Sized> ClockDelay<'clk, C> {
    pub fn new(clock: &'clk mut C) -> Self {
        Self(clock)
    }
}

impl<C: Clock + ?Sized> embedded_hal::delay::DelayNs for ClockDelay<'_, C> {
    fn delay_ns(&mut self, ns: u32) {
        self.0.delay_us(ns.div_ceil(1000));
    }

    fn delay_us(&mut self, us: u32) {
        self.0.delay_us(us);
    }
}

/// ARMv8-A generic timer, read through `CNTPCT_EL0`.
#[cfg(target_arch = "aarch64")]
pub struct GenericTimer {
    freq_hz: u64,
}

#[cfg(target_arch = "aarch64")]
impl GenericTimer {
    /// Uses the counter frequency published by the firmware in `CNTFRQ_EL0`.
    pub fn new() -> Self {
        let freq: u64;
        // Safety: Reading the counter frequency has no side effects.
        unsafe { core::arch::asm!("mrs {}, cntfrq_el0", out(reg) freq) };
        Self { freq_hz: freq }
    }

    pub const fn new_with_freq(freq_hz: u64) -> Self {
        Self { freq_hz }
    }
}

#[cfg(target_arch = "aarch64")]
impl Default for GenericTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_arch = "aarch64")]
impl Clock for GenericTimer {
    fn now(&mut self) -> Instant {
        let cnt: u64;
        // Safety: Reading the physical counter has no side effects.
        unsafe { core::arch::asm!("isb", "mrs {}, cntpct_el0", out(reg) cnt) };
        let us = (cnt as u128 * 1_000_000) / self.freq_hz.max(1) as u128;
        Instant::from_ticks(us as u64)
    }
}

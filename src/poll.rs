//! Bounded busy-wait polling.
//!
//! Every hardware handshake in this crate (SDRAM controller ready flag, bank
//! status, oscillator and PLL stabilization) is a spin on a status bit. They
//! all go through [`wait_until`] so that each wait has an explicit budget and
//! a stuck peripheral surfaces as an error instead of a hang.

/// Default number of polls granted to a single wait.
pub const DEFAULT_BUDGET: u32 = 0xFFFF;

/// The condition did not hold within the budget.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timeout;

/// Poll `ready` until it returns `true`, at most `budget` times.
///
/// A budget of zero never evaluates the condition and always times out.
pub fn wait_until(budget: u32, mut ready: impl FnMut() -> bool) -> Result<(), Timeout> {
    for _ in 0..budget {
        if ready() {
            return Ok(());
        }
        core::hint::spin_loop();
    }
    Err(Timeout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn succeeds_once_condition_holds() {
        let mut polls = 0;
        let result = wait_until(10, || {
            polls += 1;
            polls == 4
        });
        assert_eq!(result, Ok(()));
        assert_eq!(polls, 4);
    }

    #[test]
    fn stops_at_budget() {
        let mut polls = 0;
        let result = wait_until(DEFAULT_BUDGET, || {
            polls += 1;
            false
        });
        assert_eq!(result, Err(Timeout));
        assert_eq!(polls, DEFAULT_BUDGET);
    }

    #[test]
    fn zero_budget_times_out() {
        assert_eq!(wait_until(0, || true), Err(Timeout));
    }
}

//! GPIO capability consumed by the shift-register driver.
//!
//! The engine never talks to a specific GPIO library directly. It asks a
//! [`PinBank`] for output pins and drives them through `embedded-hal`'s
//! [`OutputPin`] trait, so the same driver runs against sysfs GPIO on the Pi
//! and against a recording fake in tests.
//!
//! ## Rust concepts
//! - Traits with associated types (`type Pin`)
//! - Trait bounds (`OutputPin + Send + 'static`) so pins can move to a thread
//! - `#[cfg(feature = ...)]` to keep hardware-only code out of test builds

use crate::MatrixError;
use embedded_hal::digital::OutputPin;

/// Something that can hand out GPIO lines configured as outputs.
pub trait PinBank {
    type Pin: OutputPin + Send + 'static;

    /// Claim `pin` and configure it as an output driven low.
    fn claim_output(&mut self, pin: u8) -> Result<Self::Pin, MatrixError>;

    /// Release every pin claimed from this bank.
    fn release(&mut self);
}

// ── Indicator ──────────────────────────────────────────────────────

/// A single power/ready lamp, independent of the register chain.
pub struct Indicator<P> {
    pin: P,
    number: u8,
}

impl<P: OutputPin> Indicator<P> {
    pub fn claim<B>(bank: &mut B, number: u8) -> Result<Self, MatrixError>
    where
        B: PinBank<Pin = P>,
    {
        let pin = bank.claim_output(number)?;
        Ok(Self { pin, number })
    }

    pub fn set(&mut self, on: bool) {
        let result = if on {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        if let Err(e) = result {
            tracing::warn!("Failed to drive indicator gpio {}: {:?}", self.number, e);
        }
    }
}

// ── Hardware backend ───────────────────────────────────────────────

#[cfg(feature = "hardware")]
pub use sysfs::SysfsBank;

#[cfg(feature = "hardware")]
mod sysfs {
    use super::PinBank;
    use crate::MatrixError;
    use embedded_hal::digital::PinState;
    use linux_embedded_hal::SysfsPin;

    /// Pins exported through `/sys/class/gpio`, numbered by BCM line.
    #[derive(Default)]
    pub struct SysfsBank {
        claimed: Vec<u8>,
    }

    impl SysfsBank {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl PinBank for SysfsBank {
        type Pin = SysfsPin;

        fn claim_output(&mut self, pin: u8) -> Result<SysfsPin, MatrixError> {
            let line = SysfsPin::new(u64::from(pin));
            line.export()
                .map_err(|e| MatrixError::Configuration(format!("export gpio {pin}: {e}")))?;
            let line = line
                .into_output_pin(PinState::Low)
                .map_err(|e| MatrixError::Configuration(format!("gpio {pin} as output: {e}")))?;

            self.claimed.push(pin);
            tracing::debug!("Claimed gpio {} as output", pin);
            Ok(line)
        }

        fn release(&mut self) {
            for pin in self.claimed.drain(..) {
                if let Err(e) = SysfsPin::new(u64::from(pin)).unexport() {
                    tracing::warn!("Failed to release gpio {}: {}", pin, e);
                }
            }
        }
    }
}

// ── Recording backend for tests ────────────────────────────────────


#[cfg(test)]
mod tests {
    use super::testing::RecordingBank;
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn indicator_follows_set() {
        let mut bank = RecordingBank::new();
        let mut lamp = Indicator::claim(&mut bank, 24).unwrap();
        lamp.set(true);
        assert_eq!(bank.log.level(24), Some(true));
        lamp.set(false);
        assert_eq!(bank.log.events(), vec![(24, true), (24, false)]);
    }

    #[test]
    fn indicator_claim_propagates_configuration_error() {
        let mut bank = RecordingBank::refusing(24);
        assert!(matches!(
            Indicator::claim(&mut bank, 24),
            Err(MatrixError::Configuration(_))
        ));
    }

    #[test]
    fn bounded_log_keeps_latest_writes() {
        let mut bank = RecordingBank::bounded(2);
        let mut lamp = Indicator::claim(&mut bank, 5).unwrap();
        lamp.set(true);
        lamp.set(false);
        lamp.set(true);
        assert_eq!(bank.log.events(), vec![(5, false), (5, true)]);
    }

    #[test]
    fn indicator_write_failure_is_not_fatal() {
        let mut bank = RecordingBank::breaking(24);
        let mut lamp = Indicator::claim(&mut bank, 24).unwrap();
        lamp.set(true);
        lamp.set(false);
        assert!(bank.log.events().is_empty());
    }
}

//! Serial-in/parallel-out shift-register chain driver.
//!
//! Three lines drive the chain: serial data, shift clock and register clock
//! (the latch). A transfer pulls the latch low, clocks every bit in starting
//! from the *last* logical element, then raises the latch so the parallel
//! outputs change all at once. After a transfer the first logical element
//! sits nearest the output stage.
//!
//! ## Rust concepts
//! - Generic struct over a trait (`ShiftRegister<P: OutputPin>`)
//! - Slices (`&[bool]`) for borrowed input, `Vec<bool>` for owned state
//! - `.iter().rev()` to walk a slice backwards without copying it

use crate::gpio::PinBank;
use crate::{ChainPins, MatrixError};
use embedded_hal::digital::OutputPin;

/// A daisy-chained bank of shift registers of a fixed total length.
pub struct ShiftRegister<P> {
    length: usize,
    data: P,
    latch: P,
    clock: P,
    values: Vec<bool>,
}

impl<P: OutputPin> ShiftRegister<P> {
    /// Declare the chain length and claim the three control lines.
    pub fn configure<B>(length: usize, pins: ChainPins, bank: &mut B) -> Result<Self, MatrixError>
    where
        B: PinBank<Pin = P>,
    {
        if length == 0 {
            return Err(MatrixError::Configuration(
                "shift register chain must be at least one bit long".to_string(),
            ));
        }

        let data = bank.claim_output(pins.data)?;
        let latch = bank.claim_output(pins.latch)?;
        let clock = bank.claim_output(pins.clock)?;

        tracing::info!(
            "Initialized shift register chain of {} bits (data={}, latch={}, clock={})",
            length,
            pins.data,
            pins.latch,
            pins.clock
        );

        Ok(Self {
            length,
            data,
            latch,
            clock,
            values: vec![false; length],
        })
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// The last vector committed with [`set`](Self::set).
    pub fn values(&self) -> &[bool] {
        &self.values
    }

    /// Shift `values` into the chain and latch them onto the outputs.
    ///
    /// A vector of the wrong length is rejected before any line is touched.
    pub fn set(&mut self, values: &[bool]) -> Result<(), MatrixError> {
        if values.len() != self.length {
            tracing::warn!(
                "Invalid register length: expected {}, got {}",
                self.length,
                values.len()
            );
            return Err(MatrixError::length_mismatch(self.length, values.len()));
        }

        self.values.clear();
        self.values.extend_from_slice(values);

        // Hold the outputs while bits are moving through the chain.
        write(&mut self.latch, false)?;

        for &bit in values.iter().rev() {
            write(&mut self.clock, false)?;
            write(&mut self.data, bit)?;
            write(&mut self.clock, true)?;
        }

        write(&mut self.latch, true)
    }

    /// Rotate the current contents one position towards index 0.
    pub fn shift_left(&mut self) -> Result<(), MatrixError> {
        let mut rotated = self.values.clone();
        rotated.rotate_left(1);
        self.set(&rotated)
    }

    /// Rotate the current contents one position away from index 0.
    pub fn shift_right(&mut self) -> Result<(), MatrixError> {
        let mut rotated = self.values.clone();
        rotated.rotate_right(1);
        self.set(&rotated)
    }

    pub fn all_on(&mut self) -> Result<(), MatrixError> {
        self.set(&vec![true; self.length])
    }

    pub fn all_off(&mut self) -> Result<(), MatrixError> {
        self.set(&vec![false; self.length])
    }
}

fn write<P: OutputPin>(pin: &mut P, high: bool) -> Result<(), MatrixError> {
    let result = if high { pin.set_high() } else { pin.set_low() };
    result.map_err(|e| MatrixError::Pin(format!("{e:?}")))
}

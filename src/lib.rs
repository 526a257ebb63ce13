//! Refresh engine for a multiplexed LED matrix behind a shift-register chain.
//!
//! This module holds what every part of the crate shares:
//! - Panel and pin configuration
//! - Signal handling for clean shutdown
//! - The shutdown sequence that always runs once the process is done
//!
//! The engine itself lives in [`display`], the wire protocol in
//! [`shift_register`], and the HTTP control surface in [`server`].

pub mod display;
pub mod error;
pub mod frame;
pub mod gpio;
pub mod grid;
pub mod pattern;
pub mod server;
pub mod shift_register;

pub use display::{DisplayState, LedMatrix};
pub use error::MatrixError;
pub use frame::Frame;
pub use grid::Grid;

use gpio::{Indicator, PinBank};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

// ── Panel configuration ────────────────────────────────────────────

/// Dimensions of the LED panel.
///
/// # Rust concept: derive macros
/// `Clone, Copy` make this cheaply copyable (it's just two usizes).
/// `PartialEq, Eq` let us compare panels when validating a grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct PanelConfig {
    pub rows: usize,
    pub cols: usize,
}

impl PanelConfig {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }

    /// Bits in the register chain: one select bit per row plus one bit per column.
    pub fn register_length(&self) -> usize {
        self.rows + self.cols
    }

    pub fn pixel_count(&self) -> usize {
        self.rows * self.cols
    }
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self { rows: 8, cols: 8 }
    }
}

// ── Pin configuration ──────────────────────────────────────────────

/// The three control lines of the shift-register chain (BCM numbering).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChainPins {
    /// Serial data input of the first register.
    pub data: u8,
    /// Register clock: rising edge commits shifted bits to the outputs.
    pub latch: u8,
    /// Shift clock: rising edge shifts the data line in.
    pub clock: u8,
}

impl Default for ChainPins {
    fn default() -> Self {
        Self {
            data: 26,
            latch: 19,
            clock: 13,
        }
    }
}

/// Everything needed to start a [`LedMatrix`].
#[derive(Clone, Debug, PartialEq)]
pub struct DisplayConfig {
    pub panel: PanelConfig,
    /// Time between one-column shifts. Zero disables the animation.
    pub shift_period: Duration,
    pub pins: ChainPins,
    /// Power/ready indicator, driven high while the display runs.
    pub indicator_pin: u8,
    /// How long `stop` waits for the refresh loop to exit.
    pub stop_timeout: Duration,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            panel: PanelConfig::default(),
            shift_period: Duration::ZERO,
            pins: ChainPins::default(),
            indicator_pin: 24,
            stop_timeout: Duration::from_secs(2),
        }
    }
}

impl DisplayConfig {
    /// Reject panels with no rows or columns and pin assignments that reuse
    /// a line.
    pub fn validate(&self) -> Result<(), MatrixError> {
        if self.panel.rows == 0 || self.panel.cols == 0 {
            return Err(MatrixError::Configuration(format!(
                "panel must have at least one row and column, got {}x{}",
                self.panel.rows, self.panel.cols
            )));
        }

        let pins = [
            self.pins.data,
            self.pins.latch,
            self.pins.clock,
            self.indicator_pin,
        ];
        for (i, pin) in pins.iter().enumerate() {
            if pins[i + 1..].contains(pin) {
                return Err(MatrixError::Configuration(format!(
                    "gpio {pin} is assigned to more than one line"
                )));
            }
        }

        Ok(())
    }
}

// ── Signal handling ────────────────────────────────────────────────

/// Set up a Ctrl+C / SIGTERM handler that sets `running` to false.
///
/// # Rust concept: Arc and AtomicBool
/// The flag is shared between the main thread and the signal handler.
/// `Arc` gives both shared ownership; `AtomicBool` makes the write visible
/// without a mutex.
pub fn setup_signal_handler() -> Result<Arc<AtomicBool>, ctrlc::Error> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    Ok(running)
}

/// Check if the main loop should keep running.
pub fn is_running(running: &AtomicBool) -> bool {
    running.load(Ordering::SeqCst)
}

// ── Shutdown ───────────────────────────────────────────────────────

/// Await `work`, then stop the matrix, switch the indicator off and give
/// the pins back, whether `work` succeeded or not.
///
/// # Rust concept: futures as values
/// `work` is any future (the HTTP server, or just waiting for Ctrl+C).
/// Its result is held until cleanup is done, so an early `?` inside it can
/// never skip releasing the GPIO lines.
pub async fn run_then_shut_down<B, T, E>(
    work: impl Future<Output = Result<T, E>>,
    matrix: &LedMatrix,
    indicator: &mut Indicator<B::Pin>,
    bank: &mut B,
) -> Result<T, E>
where
    B: PinBank,
{
    let result = work.await;

    tracing::info!("Display interrupted");
    if let Err(e) = matrix.stop() {
        tracing::warn!("{}", e);
    }
    indicator.set(false);
    bank.release();

    result
}

// ── Tests ──────────────────────────────────────────────────────────

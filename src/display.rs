//! The display engine: owns the pixel grid and keeps the panel refreshed.
//!
//! Two background threads share one [`Scene`] handle:
//! - **Refresh thread** (always): takes a snapshot of the scene once per
//!   sweep and latches each row's register vector, with no sleeps.
//! - **Shift thread** (only with a non-zero shift period): every period,
//!   rotates the grid one column right and installs the result.
//!
//! `draw` builds a new `Scene` off to the side and publishes it with a
//! single pointer swap, so a sweep never mixes rows from two draws.
//!
//! ## Rust concepts
//! - `Arc<RwLock<Arc<T>>>`: the lock guards only the pointer, readers clone
//!   the inner `Arc` and drop the lock immediately
//! - `std::thread::spawn` with `move` closures that own their data
//! - `mpsc::Receiver::recv_timeout` as an interruptible sleep
//! - `JoinHandle::is_finished` for a join with a deadline

use crate::gpio::PinBank;
use crate::shift_register::ShiftRegister;
use crate::{DisplayConfig, Frame, Grid, MatrixError, PanelConfig};
use embedded_hal::digital::OutputPin;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Only the first few refresh failures are logged; the loop runs far too
/// fast to log every one.
const MAX_LOGGED_FAILURES: u64 = 5;

const JOIN_POLL: Duration = Duration::from_millis(1);

// ── State ────────────────────────────────────────────────────────────

/// Lifecycle of the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DisplayState {
    /// Constructed, no thread running yet.
    Idle,
    /// Refresh loop active (and the shift loop, if configured).
    Running,
    /// Terminal. The loops were asked to exit.
    Stopped,
}

/// The installed grid together with the frame derived from it.
#[derive(Debug)]
pub struct Scene {
    pub grid: Grid,
    pub frame: Frame,
}

impl Scene {
    fn new(grid: Grid) -> Self {
        let frame = Frame::encode(&grid);
        Self { grid, frame }
    }
}

/// Snapshot of what the engine is doing, for logs and the HTTP API.
#[derive(Clone, Debug, Serialize, utoipa::ToSchema)]
pub struct DisplayStatus {
    pub state: DisplayState,
    pub panel: PanelConfig,
    /// Milliseconds between column shifts, 0 when the animation is off.
    pub shift_period_ms: u64,
    /// The installed pattern as rows of 0/1.
    #[schema(value_type = Vec<Vec<u8>>)]
    pub grid: Grid,
    /// Completed refresh sweeps.
    pub sweeps: u64,
    /// Patterns installed, including those produced by shifting.
    pub draws: u64,
    pub shifts: u64,
    pub version: String,
}

/// State shared between the caller and the background threads.
struct Shared {
    panel: PanelConfig,
    scene: RwLock<Arc<Scene>>,
    running: AtomicBool,
    sweeps: AtomicU64,
    draws: AtomicU64,
    shifts: AtomicU64,
}

impl Shared {
    fn snapshot(&self) -> Arc<Scene> {
        self.scene
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn check(&self, grid: &Grid) -> Result<(), MatrixError> {
        let expected = (self.panel.rows, self.panel.cols);
        if grid.dimensions() != expected {
            tracing::warn!(
                "Ignoring pattern of {}x{}, matrix is {}x{}",
                grid.rows(),
                grid.cols(),
                expected.0,
                expected.1
            );
            return Err(MatrixError::grid_mismatch(expected, grid.dimensions()));
        }
        Ok(())
    }

    fn draw(&self, grid: Grid) -> Result<(), MatrixError> {
        self.check(&grid)?;
        let scene = Arc::new(Scene::new(grid));

        *self.scene.write().unwrap_or_else(PoisonError::into_inner) = scene;
        self.draws.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("Drawing new pattern on matrix");
        Ok(())
    }

    fn shift(&self) {
        // Read and replace under one write lock so a draw landing in between
        // is shifted rather than lost.
        let mut scene = self.scene.write().unwrap_or_else(PoisonError::into_inner);
        let next = Scene::new(scene.grid.shifted_right());
        *scene = Arc::new(next);
        drop(scene);

        self.draws.fetch_add(1, Ordering::Relaxed);
        self.shifts.fetch_add(1, Ordering::Relaxed);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

// ── Engine ───────────────────────────────────────────────────────────

/// A running LED matrix. Cheap to share behind an `Arc`: every method
/// takes `&self`.
pub struct LedMatrix {
    shared: Arc<Shared>,
    state: Mutex<DisplayState>,
    shift_period: Duration,
    stop_timeout: Duration,
    refresh: Mutex<Option<JoinHandle<()>>>,
    animation: Mutex<Option<(JoinHandle<()>, Sender<()>)>>,
}

impl LedMatrix {
    /// Configure the register chain and start refreshing a blank panel.
    ///
    /// Fails only if the configuration is invalid or a chain pin cannot be
    /// claimed; nothing is spawned in that case.
    pub fn start<B>(config: &DisplayConfig, bank: &mut B) -> Result<Self, MatrixError>
    where
        B: PinBank,
    {
        config.validate()?;
        let panel = config.panel;
        let blank = Grid::blank(panel.rows, panel.cols)?;
        let register = ShiftRegister::configure(panel.register_length(), config.pins, bank)?;

        let shared = Arc::new(Shared {
            panel,
            scene: RwLock::new(Arc::new(Scene::new(blank))),
            running: AtomicBool::new(true),
            sweeps: AtomicU64::new(0),
            draws: AtomicU64::new(0),
            shifts: AtomicU64::new(0),
        });

        let matrix = Self {
            shared,
            state: Mutex::new(DisplayState::Idle),
            shift_period: config.shift_period,
            stop_timeout: config.stop_timeout,
            refresh: Mutex::new(None),
            animation: Mutex::new(None),
        };
        matrix.spawn(register)?;
        Ok(matrix)
    }

    fn spawn<P>(&self, register: ShiftRegister<P>) -> Result<(), MatrixError>
    where
        P: OutputPin + Send + 'static,
    {
        let shared = self.shared.clone();
        let refresh = thread::Builder::new()
            .name("matrix-refresh".to_string())
            .spawn(move || refresh_loop(shared, register))
            .map_err(|e| MatrixError::Configuration(format!("spawn refresh thread: {e}")))?;
        *lock(&self.refresh) = Some(refresh);

        if !self.shift_period.is_zero() {
            let shared = self.shared.clone();
            let period = self.shift_period;
            let (wake_tx, wake_rx) = mpsc::channel::<()>();
            let animation = thread::Builder::new()
                .name("matrix-shift".to_string())
                .spawn(move || {
                    while shared.is_running() {
                        match wake_rx.recv_timeout(period) {
                            Err(RecvTimeoutError::Timeout) => shared.shift(),
                            // Sender dropped or poked: time to stop.
                            _ => break,
                        }
                    }
                    tracing::debug!("Shift loop stopped");
                })
                .map_err(|e| MatrixError::Configuration(format!("spawn shift thread: {e}")))?;
            *lock(&self.animation) = Some((animation, wake_tx));
        }

        *lock(&self.state) = DisplayState::Running;
        tracing::info!(
            "Matrix {}x{} running (shift period: {:?})",
            self.shared.panel.rows,
            self.shared.panel.cols,
            self.shift_period
        );
        Ok(())
    }

    /// Install a new pattern.
    ///
    /// A grid whose size differs from the panel is logged and ignored: the
    /// previous pattern stays on display and the mismatch is returned.
    pub fn draw(&self, grid: Grid) -> Result<(), MatrixError> {
        self.shared.draw(grid)
    }

    /// Rotate every row of the installed pattern one column to the right.
    pub fn shift(&self) {
        self.shared.shift();
    }

    /// Ask both loops to exit and wait for them, up to the stop timeout.
    ///
    /// Calling `stop` again after the engine stopped is a no-op.
    pub fn stop(&self) -> Result<(), MatrixError> {
        {
            let mut state = lock(&self.state);
            if *state == DisplayState::Stopped {
                return Ok(());
            }
            *state = DisplayState::Stopped;
        }

        self.shared.running.store(false, Ordering::Release);
        let deadline = Instant::now() + self.stop_timeout;

        if let Some((handle, wake)) = lock(&self.animation).take() {
            drop(wake);
            if !join_until(handle, deadline) {
                tracing::warn!("Shift thread still busy at shutdown");
            }
        }

        if let Some(handle) = lock(&self.refresh).take() {
            if !join_until(handle, deadline) {
                tracing::warn!(
                    "Refresh loop did not stop within {:?}, continuing shutdown",
                    self.stop_timeout
                );
                return Err(MatrixError::ShutdownTimeout(self.stop_timeout));
            }
        }

        tracing::info!(
            "Matrix stopped after {} sweeps",
            self.shared.sweeps.load(Ordering::Relaxed)
        );
        Ok(())
    }

    pub fn state(&self) -> DisplayState {
        *lock(&self.state)
    }

    pub fn panel(&self) -> PanelConfig {
        self.shared.panel
    }

    /// Whether the shift thread was started.
    pub fn is_animated(&self) -> bool {
        !self.shift_period.is_zero()
    }

    /// The currently installed grid and frame.
    pub fn scene(&self) -> Arc<Scene> {
        self.shared.snapshot()
    }

    pub fn grid(&self) -> Grid {
        self.scene().grid.clone()
    }

    pub fn frame(&self) -> Frame {
        self.scene().frame.clone()
    }

    pub fn sweeps(&self) -> u64 {
        self.shared.sweeps.load(Ordering::Relaxed)
    }

    pub fn status(&self) -> DisplayStatus {
        DisplayStatus {
            state: self.state(),
            panel: self.shared.panel,
            shift_period_ms: u64::try_from(self.shift_period.as_millis()).unwrap_or(u64::MAX),
            grid: self.grid(),
            sweeps: self.sweeps(),
            draws: self.shared.draws.load(Ordering::Relaxed),
            shifts: self.shared.shifts.load(Ordering::Relaxed),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl Drop for LedMatrix {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            tracing::warn!("{}", e);
        }
    }
}

// ── Loops ────────────────────────────────────────────────────────────

/// Latch every row of the current scene, over and over, until stopped.
fn refresh_loop<P: OutputPin>(shared: Arc<Shared>, mut register: ShiftRegister<P>) {
    let mut failures: u64 = 0;

    while shared.is_running() {
        // One snapshot per sweep: a draw during the sweep shows up next sweep.
        let scene = shared.snapshot();
        for row in scene.frame.iter() {
            if let Err(e) = register.set(row) {
                failures += 1;
                if failures <= MAX_LOGGED_FAILURES {
                    tracing::error!("Refresh failed: {}", e);
                }
            }
        }
        shared.sweeps.fetch_add(1, Ordering::Relaxed);
    }

    if failures > 0 {
        tracing::warn!("Refresh loop saw {} failed rows", failures);
    }
}

fn join_until(handle: JoinHandle<()>, deadline: Instant) -> bool {
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(JOIN_POLL);
    }
    if handle.join().is_err() {
        tracing::error!("Matrix thread panicked");
    }
    true
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Tests ────────────────────────────────────────────────────────────

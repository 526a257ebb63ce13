//! Shift-register LED matrix driver
//!
//! Keeps a multiplexed LED matrix refreshed through its shift-register chain,
//! shows an initial pattern and optionally scrolls it one column at a time.
//! With `--port`, an HTTP API accepts new patterns while the display runs.
//!
//! ## Architecture
//! - **Refresh thread** (std::thread): latches one row after another, forever
//! - **Shift thread** (std::thread): rotates the pattern every `--shift-period`
//! - **Main task** (tokio): optional HTTP server, waits for Ctrl+C
//!
//! ## Usage
//! ```sh
//! sudo ./target/release/shift-matrix --rows 8 --cols 8 --shift-period 0.5
//! ```

#[cfg(not(feature = "hardware"))]
fn main() {
    eprintln!("This binary requires the 'hardware' feature (sysfs GPIO).");
    eprintln!("Build with: cargo build --release");
    eprintln!("Tests can run without it: cargo test --no-default-features");
    std::process::exit(1);
}

#[cfg(feature = "hardware")]
fn main() {
    if let Err(e) = hardware_main() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

#[cfg(feature = "hardware")]
#[tokio::main(flavor = "current_thread")]
async fn hardware_main() -> Result<(), Box<dyn std::error::Error>> {
    use clap::Parser;
    use shift_matrix::gpio::{Indicator, PinBank, SysfsBank};
    use shift_matrix::pattern::{demo_pattern, load_pattern};
    use shift_matrix::server::{self, AppState};
    use shift_matrix::{
        ChainPins, DisplayConfig, LedMatrix, PanelConfig, is_running, run_then_shut_down,
        setup_signal_handler,
    };
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;
    use tracing_subscriber::EnvFilter;

    /// Shift-register LED matrix driver
    #[derive(Parser)]
    #[command(name = "shift-matrix")]
    #[command(about = "Refresh a shift-register LED matrix and draw patterns on it")]
    #[command(version)]
    struct Args {
        /// Number of rows on the LED panel
        #[arg(long, default_value = "8")]
        rows: usize,

        /// Number of columns on the LED panel
        #[arg(long, default_value = "8")]
        cols: usize,

        /// Seconds between one-column shifts (0 disables the animation)
        #[arg(long, default_value = "0")]
        shift_period: f64,

        /// BCM gpio of the serial data line
        #[arg(long, default_value = "26")]
        data_pin: u8,

        /// BCM gpio of the register clock (latch) line
        #[arg(long, default_value = "19")]
        latch_pin: u8,

        /// BCM gpio of the shift clock line
        #[arg(long, default_value = "13")]
        clock_pin: u8,

        /// BCM gpio of the power/ready indicator
        #[arg(long, default_value = "24")]
        indicator_pin: u8,

        /// Milliseconds to wait for the refresh loop on shutdown
        #[arg(long, default_value = "2000")]
        stop_timeout_ms: u64,

        /// Initial pattern (JSON grid or image); the built-in "H" if omitted
        #[arg(long)]
        pattern: Option<PathBuf>,

        /// Serve the HTTP API on this port
        #[arg(long)]
        port: Option<u16>,

        /// Directory of pattern files offered over HTTP
        #[arg(long, default_value = "patterns")]
        patterns_dir: PathBuf,
    }

    async fn wait_for_shutdown(running: Arc<AtomicBool>) {
        while is_running(&running) {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(false)
        .with_ansi(false) // Disable ANSI color codes for systemd/journald
        .compact()
        .init();

    let args = Args::parse();
    let config = DisplayConfig {
        panel: PanelConfig::new(args.rows, args.cols),
        shift_period: Duration::try_from_secs_f64(args.shift_period)
            .map_err(|e| format!("invalid --shift-period {}: {e}", args.shift_period))?,
        pins: ChainPins {
            data: args.data_pin,
            latch: args.latch_pin,
            clock: args.clock_pin,
        },
        indicator_pin: args.indicator_pin,
        stop_timeout: Duration::from_millis(args.stop_timeout_ms),
    };
    let panel = config.panel;

    tracing::info!("Shift matrix v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Panel: {}x{}", panel.rows, panel.cols);
    tracing::info!(
        "Pins: data={} latch={} clock={} indicator={}",
        config.pins.data,
        config.pins.latch,
        config.pins.clock,
        config.indicator_pin
    );

    let running = setup_signal_handler()?;
    let mut bank = SysfsBank::new();

    // Any failure to claim a pin aborts startup, after giving back the ones
    // already claimed.
    let started = LedMatrix::start(&config, &mut bank)
        .and_then(|matrix| Ok((matrix, Indicator::claim(&mut bank, config.indicator_pin)?)));
    let (matrix, mut indicator) = match started {
        Ok(pair) => pair,
        Err(e) => {
            tracing::error!("Failed to start matrix: {}", e);
            bank.release();
            return Err(e.into());
        }
    };
    let matrix = Arc::new(matrix);

    let initial = match &args.pattern {
        Some(path) => load_pattern(path, panel).or_else(|e| {
            tracing::error!("Failed to load pattern {}: {}", path.display(), e);
            demo_pattern(panel)
        }),
        None => demo_pattern(panel),
    };
    if let Err(e) = initial.and_then(|grid| matrix.draw(grid)) {
        tracing::error!("Initial pattern rejected: {}", e);
    }

    indicator.set(true);
    tracing::info!("Display started");

    // A server that fails to bind or dies still goes through the shutdown
    // sequence before its error is returned.
    let work = async {
        match args.port {
            Some(port) => {
                let state = AppState {
                    matrix: matrix.clone(),
                    patterns_dir: args.patterns_dir.clone(),
                };
                let app = server::create_router(state);

                let addr = format!("0.0.0.0:{port}");
                tracing::info!("Listening on http://{}", addr);
                tracing::info!("API Documentation: http://localhost:{}/docs", port);

                let listener = tokio::net::TcpListener::bind(&addr).await?;
                axum::serve(listener, app)
                    .with_graceful_shutdown(wait_for_shutdown(running.clone()))
                    .await?;
            }
            None => wait_for_shutdown(running.clone()).await,
        }
        Ok::<(), Box<dyn std::error::Error>>(())
    };

    run_then_shut_down(work, &matrix, &mut indicator, &mut bank).await
}

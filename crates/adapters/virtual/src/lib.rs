//! # dusthub-adapter-virtual
//!
//! Simulated boards for running the controller without hardware, and for
//! end-to-end tests.
//!
//! ## Provided boards
//!
//! | Kind | Capabilities | Behaviour |
//! |------|--------------|-----------|
//! | `ads1115` / `ads1015` | analog-in | Per-pin sample rings filled by [`spawn_sampler`] from a [`Signal`] |
//! | `mcp23017` / `native_gpio` | digital-io | Levels default high, set with [`VirtualBoard::set_level`], writes recorded |
//! | `pca9685` | pwm-out | Duty and frequency writes recorded |
//!
//! Reads and writes can be made to fail with [`VirtualBoard::fail_reads`]
//! and [`VirtualBoard::fail_writes`].
//!
//! ## Dependency rule
//!
//! Depends on `dusthub-app` (port traits) and `dusthub-domain` only.

mod board;
mod signal;

use std::sync::Arc;

use tokio::task::JoinHandle;

use dusthub_app::ports::Board as _;
use dusthub_app::shutdown::ShutdownListener;

pub use board::VirtualBoard;
pub use signal::Signal;

/// Spawn the background loop filling a board's analog rings.
///
/// One sweep appends a sample to every analog pin, then the loop sleeps one
/// sample period. The loop ends as soon as shutdown is requested.
pub fn spawn_sampler(board: Arc<VirtualBoard>, mut shutdown: ShutdownListener) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = board.sample_period();
        tracing::debug!(board = %board.id(), ?period, "sampler started");
        loop {
            board.sample_once();
            tokio::select! {
                () = shutdown.wait() => break,
                () = tokio::time::sleep(period) => {}
            }
        }
        tracing::debug!(board = %board.id(), "sampler stopped");
    })
}

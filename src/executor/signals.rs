//! Ctrl-C wiring for cooperative batch cancellation.
//!
//! The first SIGINT sets the token so the running batch stops after its
//! current target. A second SIGINT while the token is set exits immediately.

use super::task::CancelToken;
use crate::core::errors::Result;
#[cfg(unix)]
use crate::core::errors::UadError;

/// Exit status used when a second interrupt forces termination.
pub const FORCED_EXIT_STATUS: i32 = 130;

/// Route SIGINT to `token`. Returns `false` where signals are unsupported.
#[cfg(unix)]
pub fn install_interrupt_handler(token: &CancelToken) -> Result<bool> {
    use signal_hook::consts::SIGINT;
    use signal_hook::flag;

    let to_error = |err: std::io::Error| UadError::Runtime {
        details: format!("failed to register SIGINT handler: {err}"),
    };
    // Order matters: the shutdown check must run before the flag is set,
    // otherwise the first interrupt would already terminate.
    flag::register_conditional_shutdown(SIGINT, FORCED_EXIT_STATUS, token.flag())
        .map_err(to_error)?;
    flag::register(SIGINT, token.flag()).map_err(to_error)?;
    Ok(true)
}

#[cfg(not(unix))]
pub fn install_interrupt_handler(_token: &CancelToken) -> Result<bool> {
    Ok(false)
}

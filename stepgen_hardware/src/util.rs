use std::time::{Duration, Instant};

use crate::error::{HwError, Result};

/// Poll `read` until it returns `want` or `timeout` expires. Read errors are
/// returned as-is. Sleeps `poll_interval` between reads.
pub fn wait_for_level(
    mut read: impl FnMut() -> Result<bool>,
    want: bool,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<()> {
    let deadline = Instant::now() + timeout;
    while read()? != want {
        if Instant::now() >= deadline {
            return Err(HwError::FeedbackTimeout);
        }
        std::thread::sleep(poll_interval);
    }
    Ok(())
}

//! Maps `Box<dyn Error>` from the pin/port trait boundary to `StepgenError`.
//!
//! With the `hardware-errors` feature, `stepgen_hardware::HwError` is
//! downcast for an exact mapping; otherwise the message text decides.

use crate::error::StepgenError;

pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> StepgenError {
    #[cfg(feature = "hardware-errors")]
    {
        use stepgen_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::FeedbackTimeout => StepgenError::Timeout,
                other => StepgenError::HardwareFault(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        StepgenError::Timeout
    } else {
        StepgenError::Hardware(s)
    }
}

/// Same as [`map_hw_error`] for the boxed form the traits return.
pub fn map_boxed(e: &stepgen_traits::BoxError) -> StepgenError {
    map_hw_error(e.as_ref())
}

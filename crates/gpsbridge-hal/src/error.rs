use crate::capability::CapabilityName;

/// Failures surfaced to positioning callers.
///
/// Transport failures deliberately surface the same way a local vendor
/// failure would: the caller sees an error result, not a different API.
#[derive(Debug, thiserror::Error)]
pub enum HalError {
    /// The vendor implementation returned a non-zero status.
    #[error("vendor returned status {0}")]
    Vendor(i32),

    /// The vendor does not offer the requested capability.
    #[error("capability not available: {0}")]
    Unavailable(CapabilityName),

    /// The operation failed before reaching the vendor (link down, encode
    /// failure, malformed reply).
    #[error("link failure: {0}")]
    Link(String),
}

pub type HalResult<T> = std::result::Result<T, HalError>;

/// Interpret a wire status as a result, client side.
pub fn status_to_result(status: i32) -> HalResult<()> {
    if status == 0 {
        Ok(())
    } else {
        Err(HalError::Vendor(status))
    }
}

/// Collapse a vendor result into a wire status, server side.
pub fn result_to_status(result: HalResult<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(HalError::Vendor(status)) if status != 0 => status,
        Err(_) => -1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_roundtrip() {
        assert!(status_to_result(0).is_ok());
        assert!(matches!(status_to_result(-3), Err(HalError::Vendor(-3))));

        assert_eq!(result_to_status(Ok(())), 0);
        assert_eq!(result_to_status(Err(HalError::Vendor(-3))), -3);
        assert_eq!(
            result_to_status(Err(HalError::Unavailable(CapabilityName::Ril))),
            -1
        );
        assert_eq!(result_to_status(Err(HalError::Link("eof".into()))), -1);
    }
}

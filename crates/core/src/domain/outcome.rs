// Delivery Outcome (classification of one POST attempt)

/// Result of a single delivery attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// 2xx response
    Success { status_code: u16, body: String },
    /// Non-2xx response. `body` is None when the body could not be read,
    /// in which case `reason` carries the read error.
    HttpFailure {
        status_code: u16,
        body: Option<String>,
        reason: String,
    },
    /// Transport-level failure (DNS, connect, timeout, cancelled request)
    NetworkFailure { reason: String },
}

impl DeliveryOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DeliveryOutcome::Success { .. })
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            DeliveryOutcome::Success { status_code, .. }
            | DeliveryOutcome::HttpFailure { status_code, .. } => Some(*status_code),
            DeliveryOutcome::NetworkFailure { .. } => None,
        }
    }
}

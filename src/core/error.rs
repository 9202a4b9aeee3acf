use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Out-of-range or contradictory input, rejected before any computation.
    #[error("invalid parameter `{field}`: {reason}")]
    InvalidParameter { field: &'static str, reason: String },

    /// Internal invariant failure. Validation is expected to make this unreachable.
    #[error("numeric degeneracy: {0}")]
    NumericDegeneracy(&'static str),

    #[error("computation cancelled")]
    Cancelled,
}

impl EngineError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        EngineError::InvalidParameter {
            field,
            reason: reason.into(),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

pub(crate) fn ensure_finite(field: &'static str, value: f64) -> EngineResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(EngineError::invalid(field, "must be a finite number"))
    }
}

pub(crate) fn ensure_non_negative_amount(field: &'static str, value: f64) -> EngineResult<()> {
    ensure_finite(field, value)?;
    if value < 0.0 {
        return Err(EngineError::invalid(field, "must be >= 0"));
    }
    Ok(())
}

use thiserror::Error;

/// Rejected user input. The display text is the message shown to the user;
/// whatever state the input was meant to change is left untouched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("instrument height must be a number >= 0 (got '{0}')")]
    InstrumentHeight(String),

    #[error("invalid scale values: min and max must be numbers with min < max")]
    ScaleBounds { min: f64, max: f64 },

    #[error("latitude must be between -90 and 90")]
    Latitude,

    #[error("longitude must be between -180 and 180")]
    Longitude,

    #[error("thickness must be a number >= 0")]
    Thickness,
}

/// Failure of a synchronizer operation that writes to the views.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("a view update is already in progress")]
    Busy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::InstrumentHeight("-1".to_string());
        assert_eq!(
            err.to_string(),
            "instrument height must be a number >= 0 (got '-1')"
        );

        let err = ValidationError::ScaleBounds { min: 5.0, max: 5.0 };
        assert_eq!(
            err.to_string(),
            "invalid scale values: min and max must be numbers with min < max"
        );

        assert_eq!(
            ValidationError::Latitude.to_string(),
            "latitude must be between -90 and 90"
        );
    }

    #[test]
    fn test_sync_error_is_transparent_over_validation() {
        let err = SyncError::from(ValidationError::Longitude);
        assert_eq!(err.to_string(), "longitude must be between -180 and 180");
        assert_eq!(SyncError::Busy.to_string(), "a view update is already in progress");
    }
}

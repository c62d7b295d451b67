use docdrop_core::{LogLevel, PlmError};

/// Whole-drop failures. Per-file upload and commit failures are not errors;
/// they are reported inside the resolved outcome.
#[derive(Debug, thiserror::Error)]
pub enum DropError {
    #[error("Failed to read preference {name}: {source}")]
    Preference {
        name: String,
        #[source]
        source: PlmError,
    },

    #[error("Failed to create {object_type} '{document_name}': {source}")]
    CreateFailed {
        object_type: String,
        document_name: String,
        /// First partial-error code reported by the service, if any.
        code: Option<i64>,
        #[source]
        source: PlmError,
    },

    #[error("Failed to paste created document into {target}: {source}")]
    Paste {
        target: String,
        #[source]
        source: PlmError,
    },

    #[error("Upload coordinator stopped before producing an outcome")]
    CoordinatorGone,
}

impl DropError {
    pub fn error_code(&self) -> &'static str {
        match self {
            DropError::Preference { .. } => "PREFERENCE_ERROR",
            DropError::CreateFailed { .. } => "CREATE_FAILED",
            DropError::Paste { .. } => "PASTE_FAILED",
            DropError::CoordinatorGone => "COORDINATOR_GONE",
        }
    }
}

/// Log a remote failure at the level its kind calls for.
pub(crate) fn log_plm_error(error: &PlmError, message: &str) {
    let error_code = error.error_code();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_code, "{}", message);
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_code, "{}", message);
        }
        LogLevel::Error => {
            tracing::error!(error = %error, error_code, "{}", message);
        }
    }
}

//! Domain error types.

/// Top-level error type for mlstock.
#[derive(Debug, thiserror::Error)]
pub enum MlstockError {
    #[error("configuration error: {reason}")]
    Configuration { reason: String },

    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("file [{path}] does not exist")]
    MissingArtifact { path: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data parse error: {reason}")]
    DataParse { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl MlstockError {
    pub fn configuration(reason: impl Into<String>) -> Self {
        MlstockError::Configuration {
            reason: reason.into(),
        }
    }

    pub fn invalid_input(reason: impl Into<String>) -> Self {
        MlstockError::InvalidInput {
            reason: reason.into(),
        }
    }
}

impl From<&MlstockError> for std::process::ExitCode {
    fn from(err: &MlstockError) -> Self {
        let code: u8 = match err {
            MlstockError::Io(_) => 1,
            MlstockError::Configuration { .. }
            | MlstockError::ConfigParse { .. }
            | MlstockError::ConfigMissing { .. }
            | MlstockError::ConfigInvalid { .. } => 2,
            MlstockError::InvalidInput { .. } | MlstockError::DataParse { .. } => 3,
            MlstockError::MissingArtifact { .. } => 4,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::ExitCode;

    #[test]
    fn missing_artifact_names_the_path() {
        let err = MlstockError::MissingArtifact {
            path: "data/features.csv".into(),
        };
        assert_eq!(err.to_string(), "file [data/features.csv] does not exist");
    }

    #[test]
    fn exit_codes_group_by_category() {
        let cfg = MlstockError::configuration("cohort_size must be positive");
        let cfg_invalid = MlstockError::ConfigInvalid {
            section: "backtest".into(),
            key: "cohort_size".into(),
            reason: "not a number".into(),
        };
        assert_eq!(ExitCode::from(&cfg), ExitCode::from(2));
        assert_eq!(ExitCode::from(&cfg_invalid), ExitCode::from(2));

        let input = MlstockError::invalid_input("null stock_id");
        assert_eq!(ExitCode::from(&input), ExitCode::from(3));

        let missing = MlstockError::MissingArtifact { path: "x".into() };
        assert_eq!(ExitCode::from(&missing), ExitCode::from(4));

        let io = MlstockError::from(std::io::Error::other("boom"));
        assert_eq!(ExitCode::from(&io), ExitCode::from(1));
    }
}

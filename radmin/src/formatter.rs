use colored::*;
use radmin_core::{
    DynamicCallError,
    client::{PrepareError, rpc::CallError},
    transport::{ConfigError, ConnectionError},
};

/// A wrapper struct for a formatted, colored string.
///
/// Implements `Display` so it can be printed directly.
pub struct FormattedString(pub String);

impl std::fmt::Display for FormattedString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f)?;
        writeln!(f, "{}", self.0)?;
        Ok(())
    }
}

impl From<ConfigError> for FormattedString {
    fn from(err: ConfigError) -> Self {
        FormattedString(format!(
            "{}\n\n'{}'",
            "Invalid Configuration:".red().bold(),
            err
        ))
    }
}

impl From<PrepareError> for FormattedString {
    fn from(err: PrepareError) -> Self {
        let title = match err {
            PrepareError::Dispatch(_) => "Unknown Function:",
            PrepareError::Argument(_) => "Invalid Arguments:",
        };
        FormattedString(format!("{}\n\n'{}'", title.red().bold(), err))
    }
}

impl From<ConnectionError> for FormattedString {
    fn from(err: ConnectionError) -> Self {
        FormattedString(format!("{}\n\n'{}'", "Connection Error:".red().bold(), err))
    }
}

impl From<CallError> for FormattedString {
    fn from(err: CallError) -> Self {
        FormattedString(format!("{}\n\n'{}'", "Call Failed:".red().bold(), err))
    }
}

impl From<DynamicCallError> for FormattedString {
    fn from(err: DynamicCallError) -> Self {
        match err {
            DynamicCallError::Prepare(err) => err.into(),
            DynamicCallError::Connection(err) => err.into(),
            DynamicCallError::Call(err) => err.into(),
        }
    }
}

impl From<serde_json::Error> for FormattedString {
    fn from(err: serde_json::Error) -> Self {
        FormattedString(format!(
            "{}\n\n'{}'",
            "Failed to render the response:".red().bold(),
            err
        ))
    }
}

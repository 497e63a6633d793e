//! Model references of the form `provider/model-name`.

use crate::error::Error;

/// A parsed `provider/model-name` reference.
///
/// The model part may itself contain slashes (e.g. vendor-scoped model ids),
/// so only the first slash splits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRef {
    pub provider: String,
    pub model: String,
}

impl ModelRef {
    /// Parse a reference, failing with a caller-class error on malformed input.
    pub fn parse(reference: &str) -> Result<Self, Error> {
        let malformed = || Error::InvalidModelRef {
            reference: reference.to_string(),
        };

        let (provider, model) = reference.split_once('/').ok_or_else(malformed)?;
        if provider.trim().is_empty() || model.trim().is_empty() {
            return Err(malformed());
        }

        Ok(Self {
            provider: provider.to_string(),
            model: model.to_string(),
        })
    }
}

impl std::fmt::Display for ModelRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.provider, self.model)
    }
}

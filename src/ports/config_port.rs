//! Configuration access port trait.

use crate::domain::error::AlphaginiError;

/// Key/value configuration grouped into sections.
///
/// Implementors only supply raw strings; the typed getters parse them and
/// report malformed values instead of silently falling back to a default.
pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;

    /// Trimmed value, with blank values treated as absent.
    fn get_value(&self, section: &str, key: &str) -> Option<String> {
        self.get_string(section, key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn get_int(&self, section: &str, key: &str) -> Result<Option<i64>, AlphaginiError> {
        self.get_value(section, key)
            .map(|v| {
                v.parse::<i64>().map_err(|_| AlphaginiError::ConfigInvalid {
                    section: section.to_string(),
                    key: key.to_string(),
                    reason: format!("'{v}' is not an integer"),
                })
            })
            .transpose()
    }

    fn get_double(&self, section: &str, key: &str) -> Result<Option<f64>, AlphaginiError> {
        self.get_value(section, key)
            .map(|v| match v.parse::<f64>() {
                Ok(n) if n.is_finite() => Ok(n),
                _ => Err(AlphaginiError::ConfigInvalid {
                    section: section.to_string(),
                    key: key.to_string(),
                    reason: format!("'{v}' is not a number"),
                }),
            })
            .transpose()
    }
}

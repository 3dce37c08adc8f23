use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Options shared by the spreadsheet and text backends.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Whether the first record is a header row.
    pub has_header_record: bool,
    /// Escape fields that a spreadsheet would otherwise interpret as formulas.
    pub sanitize_for_injection: bool,
    /// Leading characters that trigger escaping.
    pub injection_characters: Vec<char>,
    /// Character prepended to fields that start with an injection character.
    pub injection_escape_character: char,
    /// Remove control characters that are not allowed in worksheet XML.
    pub strip_control_characters: bool,
    /// Recalculate formula cells before reading them.
    pub calculate_formulas: bool,
    /// Worksheet used by writers when no sheet name is given.
    pub default_sheet_name: String,
    /// Field delimiter for CSV text.
    pub delimiter: u8,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            has_header_record: true,
            sanitize_for_injection: false,
            injection_characters: vec!['=', '@', '+', '-', '\t', '\r'],
            injection_escape_character: '\'',
            strip_control_characters: true,
            calculate_formulas: true,
            default_sheet_name: "Export".to_string(),
            delimiter: b',',
        }
    }
}

impl Configuration {
    pub fn validate(&self) -> Result<()> {
        if self
            .injection_characters
            .contains(&self.injection_escape_character)
        {
            return Err(Error::InvalidConfiguration(format!(
                "injection escape character {:?} is itself an injection character",
                self.injection_escape_character
            )));
        }
        if self.default_sheet_name.trim().is_empty() {
            return Err(Error::InvalidConfiguration(
                "default sheet name is empty".to_string(),
            ));
        }
        Ok(())
    }
}

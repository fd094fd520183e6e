use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ContextError;
use crate::pdf::FontSource;

/// The name of the column identifying the entities when none is configured.
pub const DEFAULT_KEY_COLUMN: &str = "نام";
/// The directory the documents are written to when none is configured, relative to the working directory.
pub const DEFAULT_OUTPUT_DIRECTORY: &str = "output_pdfs";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ConversionConfiguration {
    pub key_column: String,
    pub output_directory: PathBuf,
    pub font_file_path: Option<PathBuf>,
    pub enable_shaping: bool,
}

impl Default for ConversionConfiguration {
    fn default() -> Self {
        ConversionConfiguration {
            key_column: DEFAULT_KEY_COLUMN.to_string(),
            output_directory: PathBuf::from(DEFAULT_OUTPUT_DIRECTORY),
            font_file_path: None,
            enable_shaping: true,
        }
    }
}

impl ConversionConfiguration {
    pub fn from_path(configuration_file_path: &Path) -> Result<Self, ContextError> {
        let configuration_file_contents = std::fs::read_to_string(configuration_file_path)
            .map_err(|error| {
                ContextError::with_error(
                    format!("Failed to read the configuration file {:?}", configuration_file_path),
                    &error,
                )
            })?;
        let configuration: ConversionConfiguration =
            serde_json::from_str(&configuration_file_contents).map_err(|error| {
                ContextError::with_error("Failed to parse the configuration file", &error)
            })?;

        Ok(configuration)
    }

    pub fn font_source(&self) -> Option<FontSource> {
        self.font_file_path.clone().map(FontSource::File)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_take_their_default() {
        let configuration: ConversionConfiguration =
            serde_json::from_str(r#"{ "keyColumn": "name", "enableShaping": false }"#).unwrap();

        assert_eq!(configuration.key_column, "name");
        assert!(!configuration.enable_shaping);
        assert_eq!(configuration.output_directory, PathBuf::from("output_pdfs"));
        assert_eq!(configuration.font_source(), None);
    }

    #[test]
    fn configuration_is_read_from_a_file() {
        let directory = tempfile::tempdir().unwrap();
        let configuration_path = directory.path().join("configuration.json");
        std::fs::write(
            &configuration_path,
            r#"{ "outputDirectory": "reports", "fontFilePath": "fonts/Vazir.ttf" }"#,
        )
        .unwrap();

        let configuration = ConversionConfiguration::from_path(&configuration_path).unwrap();

        assert_eq!(configuration.key_column, DEFAULT_KEY_COLUMN);
        assert_eq!(configuration.output_directory, PathBuf::from("reports"));
        assert_eq!(
            configuration.font_source(),
            Some(FontSource::File("fonts/Vazir.ttf".into()))
        );
    }

    #[test]
    fn malformed_configuration_is_an_error() {
        let directory = tempfile::tempdir().unwrap();
        let configuration_path = directory.path().join("configuration.json");
        std::fs::write(&configuration_path, "{ keyColumn: ").unwrap();

        let error = ConversionConfiguration::from_path(&configuration_path).unwrap_err();

        assert_eq!(error.context, "Failed to parse the configuration file");
        assert!(ConversionConfiguration::from_path(&directory.path().join("absent.json")).is_err());
    }
}

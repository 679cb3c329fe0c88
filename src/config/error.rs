use std::fmt;

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Json(serde_json::Error),
    NoAdditionalSource,
    Epsg(u32),
    EmptyKeywords,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "I/O error: {}", e),
            ConfigError::Json(e) => write!(f, "Failed to parse JSON: {}", e),
            ConfigError::NoAdditionalSource => write!(
                f,
                "at least one additional source (amplitude, displacement or scatterer) \
                 should be chosen for data extraction"
            ),
            ConfigError::Epsg(code) => write!(f, "invalid EPSG code: {}", code),
            ConfigError::EmptyKeywords => {
                write!(f, "scatterer source requires at least one merge keyword")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> ConfigError {
        ConfigError::Io(err)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> ConfigError {
        ConfigError::Json(err)
    }
}

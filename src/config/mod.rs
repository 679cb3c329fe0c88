use serde::Deserialize;
use serde::Deserializer;
use serde::de::Error;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

pub mod error;
pub use error::ConfigError;

pub mod period;
pub use period::Period;

/// A stack of dated SAR amplitude rasters selected by a glob pattern.
#[derive(Debug, Deserialize, Clone)]
pub struct AmplitudeSource {
    pub pattern: String,
    /// Prepended to the date tag of every attached column.
    #[serde(default = "default_amplitude_prefix")]
    pub prefix: String,
}

/// A point layer carrying per-date displacement attributes.
#[derive(Debug, Deserialize, Clone)]
pub struct DisplacementSource {
    pub path: String,
    /// Marker identifying the dated attribute labels (e.g. `D20140101`).
    #[serde(default = "default_displacement_prefix")]
    pub prefix: String,
}

/// Keyword-tagged velocity rasters merged per family by element-wise maximum.
#[derive(Debug, Deserialize, Clone)]
pub struct ScattererSource {
    pub pattern: String,
    /// Evaluated in order, first match wins: longer keywords must come first
    /// so that e.g. `VEL_STDEV` files are not absorbed by `VEL`.
    #[serde(default = "default_scatterer_keywords")]
    pub keywords: Vec<String>,
}

fn default_amplitude_prefix() -> String {
    "A".to_string()
}

fn default_displacement_prefix() -> String {
    "D".to_string()
}

fn default_scatterer_keywords() -> Vec<String> {
    vec!["VEL_STDEV".to_string(), "VEL".to_string()]
}

#[derive(Debug, Clone)]
pub struct FusionConfig {
    table: String,
    lon_column: String,
    lat_column: String,
    date_column: String,
    year_column: String,
    epsg: u32,
    period: Period,
    no_data: f64,
    correlation_fields: Vec<String>,
    amplitude: Option<AmplitudeSource>,
    displacement: Option<DisplacementSource>,
    scatterer: Option<ScattererSource>,
    keep_bad: bool,
    differential: bool,
    prepend: String,
    output_dir: String,
}

// Deserializes a FusionConfig, ensuring the EPSG code is plausible, at least
// one additional data source is selected and scatterer keywords are present.
impl<'de> Deserialize<'de> for FusionConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct ConfigHelper {
            table: String,
            #[serde(default = "default_lon_column")]
            lon_column: String,
            #[serde(default = "default_lat_column")]
            lat_column: String,
            #[serde(default = "default_date_column")]
            date_column: String,
            #[serde(default = "default_year_column")]
            year_column: String,
            #[serde(default = "default_epsg")]
            epsg: u32,
            #[serde(default = "default_period")]
            period: Period,
            #[serde(default = "default_no_data")]
            no_data: f64,
            #[serde(default)]
            correlation_fields: Vec<String>,
            amplitude: Option<AmplitudeSource>,
            displacement: Option<DisplacementSource>,
            scatterer: Option<ScattererSource>,
            #[serde(default)]
            keep_bad: bool,
            #[serde(default)]
            differential: bool,
            #[serde(default)]
            prepend: String,
            #[serde(default = "default_output_dir")]
            output_dir: String,
        }

        fn default_lon_column() -> String {
            "Start GPS Longitude".to_string()
        }
        fn default_lat_column() -> String {
            "Start GPS Latitude".to_string()
        }
        fn default_date_column() -> String {
            "Date Tested".to_string()
        }
        fn default_year_column() -> String {
            "Year".to_string()
        }
        fn default_epsg() -> u32 {
            4326
        }
        fn default_period() -> Period {
            Period::Winter
        }
        fn default_no_data() -> f64 {
            -9999.0
        }
        fn default_output_dir() -> String {
            ".".to_string()
        }

        let helper = ConfigHelper::deserialize(deserializer)?;

        if helper.epsg == 0 {
            return Err(D::Error::custom(ConfigError::Epsg(helper.epsg)));
        }

        if helper.amplitude.is_none()
            && helper.displacement.is_none()
            && helper.scatterer.is_none()
        {
            return Err(D::Error::custom(ConfigError::NoAdditionalSource));
        }

        if let Some(scatterer) = &helper.scatterer
            && scatterer.keywords.is_empty()
        {
            return Err(D::Error::custom(ConfigError::EmptyKeywords));
        }

        Ok(FusionConfig {
            table: helper.table,
            lon_column: helper.lon_column,
            lat_column: helper.lat_column,
            date_column: helper.date_column,
            year_column: helper.year_column,
            epsg: helper.epsg,
            period: helper.period,
            no_data: helper.no_data,
            correlation_fields: helper.correlation_fields,
            amplitude: helper.amplitude,
            displacement: helper.displacement,
            scatterer: helper.scatterer,
            keep_bad: helper.keep_bad,
            differential: helper.differential,
            prepend: helper.prepend,
            output_dir: helper.output_dir,
        })
    }
}

impl FusionConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<FusionConfig, ConfigError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);

        let config: FusionConfig = serde_json::from_reader(reader).map_err(ConfigError::from)?;

        Ok(config)
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn lon_column(&self) -> &str {
        &self.lon_column
    }

    pub fn lat_column(&self) -> &str {
        &self.lat_column
    }

    pub fn date_column(&self) -> &str {
        &self.date_column
    }

    pub fn year_column(&self) -> &str {
        &self.year_column
    }

    pub fn epsg(&self) -> u32 {
        self.epsg
    }

    pub fn period(&self) -> Period {
        self.period
    }

    pub fn no_data(&self) -> f64 {
        self.no_data
    }

    pub fn correlation_fields(&self) -> &[String] {
        &self.correlation_fields
    }

    /// The correlation fields as they appear in the input table: an entry
    /// named `<field> Class` is backed by the continuous `<field>` column and
    /// only becomes a bucketed class at output time.
    pub fn correlation_base_fields(&self) -> Vec<String> {
        self.correlation_fields
            .iter()
            .map(|field| match field.strip_suffix(" Class") {
                Some(base) => base.to_string(),
                None => field.clone(),
            })
            .collect()
    }

    pub fn amplitude(&self) -> Option<&AmplitudeSource> {
        self.amplitude.as_ref()
    }

    pub fn displacement(&self) -> Option<&DisplacementSource> {
        self.displacement.as_ref()
    }

    pub fn scatterer(&self) -> Option<&ScattererSource> {
        self.scatterer.as_ref()
    }

    pub fn keep_bad(&self) -> bool {
        self.keep_bad
    }

    pub fn set_keep_bad(&mut self, keep_bad: bool) {
        self.keep_bad = keep_bad;
    }

    pub fn differential(&self) -> bool {
        self.differential
    }

    pub fn set_differential(&mut self, differential: bool) {
        self.differential = differential;
    }

    pub fn prepend(&self) -> &str {
        &self.prepend
    }

    pub fn output_dir(&self) -> &str {
        &self.output_dir
    }
}

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use chrono::NaiveDate;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::error::CardLiveError;
use crate::loader::DEFAULT_ARCHIVE_PREFIX;
use crate::taxonomy::DEFAULT_MIN_RANK;

pub const DEFAULT_CONFIG_FILE: &str = "cardlive.json";
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 600;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub cardlive_home: Option<String>,
    #[serde(default)]
    pub data_dir: Option<String>,
    #[serde(default)]
    pub refresh_interval_secs: Option<u64>,
    #[serde(default)]
    pub region_correction_cutoff: Option<NaiveDate>,
    #[serde(default)]
    pub region_codes_csv: Option<String>,
    #[serde(default)]
    pub region_fallbacks: Option<bool>,
    #[serde(default)]
    pub taxonomy_dir: Option<String>,
    #[serde(default)]
    pub taxonomy_min_rank: Option<String>,
    #[serde(default)]
    pub archive_prefix: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub cardlive_home: Utf8PathBuf,
    pub data_dir: Utf8PathBuf,
    pub refresh_interval: Duration,
    pub region_correction_cutoff: NaiveDate,
    pub region_codes_csv: Option<Utf8PathBuf>,
    pub region_fallbacks: bool,
    pub taxonomy_dir: Option<Utf8PathBuf>,
    pub taxonomy_min_rank: String,
    pub archive_prefix: String,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Reads `path`, or `cardlive.json` in the working directory when present.
    /// Without either, every setting takes its default.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, CardLiveError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| CardLiveError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| CardLiveError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, CardLiveError> {
        let cardlive_home = match &config.cardlive_home {
            Some(home) => Utf8PathBuf::from(home),
            None => default_home()?,
        };
        Self::resolve_with_home(config, cardlive_home)
    }

    pub fn resolve_with_home(
        config: Config,
        cardlive_home: Utf8PathBuf,
    ) -> Result<ResolvedConfig, CardLiveError> {
        let data_dir = config
            .data_dir
            .map(Utf8PathBuf::from)
            .unwrap_or_else(|| cardlive_home.join("data").join("card_live"));

        let refresh_interval_secs = config
            .refresh_interval_secs
            .unwrap_or(DEFAULT_REFRESH_INTERVAL_SECS);
        if refresh_interval_secs == 0 {
            return Err(CardLiveError::ConfigParse(
                "refresh_interval_secs must be greater than zero".to_string(),
            ));
        }

        let taxonomy_dir = match config.taxonomy_dir {
            Some(dir) => Some(Utf8PathBuf::from(dir)),
            None => {
                let dir = cardlive_home.join("db").join("taxdump");
                dir.as_std_path().is_dir().then_some(dir)
            }
        };

        Ok(ResolvedConfig {
            data_dir,
            refresh_interval: Duration::from_secs(refresh_interval_secs),
            region_correction_cutoff: config
                .region_correction_cutoff
                .unwrap_or_else(default_region_correction_cutoff),
            region_codes_csv: config.region_codes_csv.map(Utf8PathBuf::from),
            region_fallbacks: config.region_fallbacks.unwrap_or(true),
            taxonomy_dir,
            taxonomy_min_rank: config
                .taxonomy_min_rank
                .unwrap_or_else(|| DEFAULT_MIN_RANK.to_string()),
            archive_prefix: config
                .archive_prefix
                .unwrap_or_else(|| DEFAULT_ARCHIVE_PREFIX.to_string()),
            cardlive_home,
        })
    }
}

/// Region code 10 was the form's preselected value before this date.
pub fn default_region_correction_cutoff() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 7, 20).unwrap_or(NaiveDate::MIN)
}

fn default_home() -> Result<Utf8PathBuf, CardLiveError> {
    BaseDirs::new()
        .and_then(|dirs| Utf8PathBuf::from_path_buf(dirs.home_dir().join("cardlive")).ok())
        .ok_or_else(|| CardLiveError::Filesystem("unable to resolve home directory".to_string()))
}

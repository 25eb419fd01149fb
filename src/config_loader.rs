use crate::config::{ConfigError, ScenarioConfig};
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::info;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Load and parse configuration from a YAML file
pub fn load_config(config_path: &Path) -> Result<ScenarioConfig> {
    info!("Loading configuration from: {:?}", config_path);

    let file = File::open(config_path)
        .wrap_err_with(|| format!("Failed to open configuration file {}", config_path.display()))?;

    let config: ScenarioConfig = serde_yaml::from_reader(file)
        .wrap_err_with(|| format!("Failed to parse configuration file {}", config_path.display()))?;

    config.validate()?;

    Ok(config)
}

/// Command-line values that take precedence over the configuration file
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub n_csma: Option<u32>,
    pub n_wifi: Option<u32>,
    pub verbose: Option<bool>,
    pub tracing: Option<bool>,
    pub output_dir: Option<PathBuf>,
    pub seed: Option<u64>,
}

/// Apply CLI overrides to a scenario configuration and re-validate it
pub fn apply_cli_overrides(config: &mut ScenarioConfig, overrides: &CliOverrides) -> Result<(), ConfigError> {
    if let Some(n_csma) = overrides.n_csma {
        config.nodes.n_csma = n_csma;
    }
    if let Some(n_wifi) = overrides.n_wifi {
        config.nodes.n_wifi = n_wifi;
    }
    if let Some(verbose) = overrides.verbose {
        config.general.verbose = verbose;
    }
    if let Some(tracing) = overrides.tracing {
        config.general.tracing = tracing;
    }
    if let Some(output_dir) = &overrides.output_dir {
        config.general.output_dir = output_dir.clone();
    }
    if let Some(seed) = overrides.seed {
        config.general.seed = seed;
    }

    config.validate()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_empty_file_gives_defaults() {
        let file = write_config("{}\n");
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.nodes.n_wifi, 1);
        assert_eq!(config.nodes.n_csma, 0);
        assert_eq!(config.general.stop_time, Duration::from_secs(10));
        assert_eq!(config.traffic.port, 20);
    }

    #[test]
    fn test_load_scenario_file() {
        let file = write_config(
            r#"
general:
  stop_time: 5s
  tracing: false
nodes:
  n_wifi: 4
  n_csma: 2
point_to_point:
  data_rate: 100Mbps
  delay: 2ms
traffic:
  max_bytes: 100000
  source:
    start: 1500ms
    stop: 5s
"#,
        );
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.general.stop_time, Duration::from_secs(5));
        assert!(!config.general.tracing);
        assert_eq!(config.nodes.n_wifi, 4);
        assert_eq!(config.point_to_point.data_rate.bps(), 100_000_000);
        assert_eq!(config.point_to_point.delay, Duration::from_millis(2));
        assert_eq!(config.traffic.source.start, Duration::from_millis(1500));
        // Untouched sections keep their defaults
        assert_eq!(config.csma.data_rate.bps(), 10_000_000_000);
    }

    #[test]
    fn test_invalid_file_rejected() {
        let file = write_config("nodes:\n  n_wifi: 300\n");
        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err.downcast_ref::<ConfigError>(), Some(ConfigError::TooManyNodes { .. })));
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = ScenarioConfig::default();
        let overrides = CliOverrides {
            n_wifi: Some(3),
            tracing: Some(false),
            seed: Some(7),
            ..Default::default()
        };
        apply_cli_overrides(&mut config, &overrides).unwrap();
        assert_eq!(config.nodes.n_wifi, 3);
        assert!(!config.general.tracing);
        assert!(config.general.verbose);
        assert_eq!(config.general.seed, 7);

        let too_many = CliOverrides { n_csma: Some(251), ..Default::default() };
        assert!(matches!(
            apply_cli_overrides(&mut config, &too_many),
            Err(ConfigError::TooManyNodes { .. })
        ));
    }
}

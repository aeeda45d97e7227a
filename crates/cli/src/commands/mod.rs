//! Command implementations.

mod info;
mod run;
mod validate;

pub use info::run_info;
pub use run::run_server;
pub use validate::run_validate;

use config_loader::ConfigLoader;
use contracts::{SamplerConfig, ServerSettings};
use tracing::{info, warn};

use crate::cli::ConfigArgs;
use crate::error::{CliError, Result};

/// Read the optional config file, apply flag overrides and resolve
fn load_settings(args: &ConfigArgs) -> Result<ServerSettings> {
    let mut config = match &args.config {
        Some(path) => {
            if !path.exists() {
                return Err(CliError::config_not_found(path.display().to_string()));
            }
            info!(config = %path.display(), "Loading configuration");
            ConfigLoader::read_config(path)?
        }
        None => SamplerConfig::default(),
    };

    args.apply(&mut config)?;
    let settings = ConfigLoader::resolve(&config)?;

    for warning in &settings.warnings {
        warn!(%warning, "Configuration warning");
    }
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::SplitMode;
    use std::io::Write;
    use std::path::PathBuf;

    #[test]
    fn test_load_settings_file_and_overrides() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[input]
filename = "run042.tsa"

[split]
per_system = true

[[channels.endpoints]]
name = "ts-request"
address = "127.0.0.1:5555"
"#
        )
        .unwrap();

        let args = ConfigArgs {
            config: Some(file.path().to_path_buf()),
            high_water_mark: Some(4),
            ..Default::default()
        };
        let settings = load_settings(&args).unwrap();

        assert_eq!(settings.mode, SplitMode::PerSystem);
        assert_eq!(settings.high_water_mark, 4);
        assert_eq!(settings.channels.request.address, "127.0.0.1:5555");
    }

    #[test]
    fn test_load_settings_missing_file() {
        let args = ConfigArgs {
            config: Some(PathBuf::from("/nonexistent/sampler.toml")),
            ..Default::default()
        };
        assert!(matches!(
            load_settings(&args),
            Err(CliError::ConfigNotFound { .. })
        ));
    }

    #[test]
    fn test_load_settings_flags_only() {
        let args = ConfigArgs {
            host: Some("daq01".to_string()),
            port: Some(5556),
            endpoints: vec!["ts-request=0.0.0.0:5555".to_string()],
            ..Default::default()
        };
        let settings = load_settings(&args).unwrap();
        assert_eq!(settings.input.describe(), "subscriber daq01:5556");
    }

    #[test]
    fn test_load_settings_invalid() {
        // no input at all
        let args = ConfigArgs {
            endpoints: vec!["ts-request=0.0.0.0:5555".to_string()],
            ..Default::default()
        };
        assert!(matches!(load_settings(&args), Err(CliError::Config(_))));
    }
}

//! 配置解析模块
//!
//! TOML 为主，JSON 可选；按扩展名选择格式。

use std::path::Path;

use contracts::{ContractError, SamplerConfig};

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// 从文件扩展名推断格式（不区分大小写）
    pub fn from_extension(ext: &str) -> Option<Self> {
        if ext.eq_ignore_ascii_case("toml") {
            Some(Self::Toml)
        } else if ext.eq_ignore_ascii_case("json") {
            Some(Self::Json)
        } else {
            None
        }
    }

    /// 从文件路径推断格式
    pub fn from_path(path: &Path) -> Result<Self, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse(format!(
                "cannot determine config format of {}",
                path.display()
            ))
        })?;
        Self::from_extension(ext)
            .ok_or_else(|| ContractError::config_parse(format!("unsupported config format: .{ext}")))
    }

    fn label(self) -> &'static str {
        match self {
            Self::Toml => "TOML",
            Self::Json => "JSON",
        }
    }
}

/// 根据格式解析配置
pub fn parse(content: &str, format: ConfigFormat) -> Result<SamplerConfig, ContractError> {
    let fail = |e: &dyn std::fmt::Display| format!("{} parse error: {e}", format.label());
    match format {
        ConfigFormat::Toml => toml::from_str(content)
            .map_err(|e| ContractError::config_parse_from(fail(&e), e)),
        ConfigFormat::Json => serde_json::from_str(content)
            .map_err(|e| ContractError::config_parse_from(fail(&e), e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::ChannelKind;

    #[test]
    fn test_parse_toml_minimal() {
        let content = r#"
[input]
filename = "/data/run042.tsa"

[split]
per_block = true
blocks = ["sts:0x10", "tof:0x60"]

[[channels.endpoints]]
name = "ts-request"
address = "127.0.0.1:5555"

[[channels.endpoints]]
name = "commands"
kind = "log"
"#;
        let result = parse(content, ConfigFormat::Toml);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(config.input.filename, "/data/run042.tsa");
        assert_eq!(config.split.blocks.len(), 2);
        assert_eq!(config.channels.endpoints.len(), 2);
        assert_eq!(config.channels.endpoints[0].kind, ChannelKind::Tcp);
        assert_eq!(config.channels.endpoints[1].kind, ChannelKind::Log);
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{
            "input": { "host": "flesnode01", "port": 5556 },
            "buffer": { "high_water_mark": 4, "max_timeslices": 1000 },
            "monitoring": { "publish_every": 10, "histogram_suffix": "_node1" }
        }"#;
        let result = parse(content, ConfigFormat::Json);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(config.input.port, 5556);
        assert_eq!(config.buffer.high_water_mark, 4);
        assert_eq!(config.monitoring.max_interval_s, 10.0);
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let content = "invalid toml [[[";
        let result = parse(content, ConfigFormat::Toml);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
        assert!(err.to_string().contains("TOML parse error"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(ConfigFormat::from_extension("TOML"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
        assert_eq!(
            ConfigFormat::from_path(Path::new("/etc/sampler.json")).unwrap(),
            ConfigFormat::Json
        );
        assert!(ConfigFormat::from_path(Path::new("sampler")).is_err());
        assert!(ConfigFormat::from_path(Path::new("sampler.yaml")).is_err());
    }
}

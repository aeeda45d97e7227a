//! 配置校验模块
//!
//! 校验规则：
//! - 数值范围 (high_water_mark >= 1, 时间间隔 >= 0)
//! - 输入组合唯一 (file | file+dir | host+port | host string)
//! - block 定义 `name:systemId` 合法, 每个 system 最多属于一个 block
//! - split 模式优先级 no_split > per_block > per_system
//! - 每个使用中的 channel 名称都绑定了 endpoint

use std::collections::BTreeSet;
use std::time::Duration;

use ::validator::Validate;
use contracts::{
    Block, ChannelBinding, ChannelKind, ChannelSettings, ChannelsConfig, ContractError,
    InputConfig, InputSpec, MonitoringSettings, SamplerConfig, ServerSettings, SplitConfig,
    SplitMode, SystemId, SYSTEMS,
};

/// 校验并解析 SamplerConfig
///
/// 返回第一个遇到的错误，或解析后的 ServerSettings。
pub fn validate(config: &SamplerConfig) -> Result<ServerSettings, ContractError> {
    validate_ranges(config)?;

    let input = resolve_input(&config.input)?;
    let blocks = parse_blocks(&config.split.blocks)?;
    let mut warnings = Vec::new();
    let mode = resolve_mode(&config.split, &mut warnings);

    if mode == SplitMode::PerBlock && blocks.is_empty() {
        return Err(ContractError::config_validation(
            "split.blocks",
            "per-block mode requires at least one block definition",
        ));
    }
    if mode != SplitMode::PerBlock && !blocks.is_empty() {
        warnings.push(format!(
            "{} block definition(s) ignored in {} mode",
            blocks.len(),
            mode.as_str()
        ));
    }

    let channels = resolve_channels(&config.channels)?;

    let high_water_mark = usize::try_from(config.buffer.high_water_mark).map_err(|_| {
        ContractError::config_validation("buffer.high_water_mark", "value too large")
    })?;
    let max_timeslices = match config.buffer.max_timeslices {
        0 => None,
        n => Some(n),
    };

    let monitoring = MonitoringSettings {
        publish_every: config.monitoring.publish_every,
        min_interval: seconds("monitoring.min_interval_s", config.monitoring.min_interval_s)?,
        max_interval: seconds("monitoring.max_interval_s", config.monitoring.max_interval_s)?,
        histogram_suffix: config.monitoring.histogram_suffix.clone(),
    };

    Ok(ServerSettings {
        input,
        high_water_mark,
        max_timeslices,
        mode,
        blocks,
        channels,
        monitoring,
        stop_grace: Duration::from_millis(config.shutdown.stop_grace_ms),
        eof_grace: Duration::from_millis(config.shutdown.eof_grace_ms),
        warnings,
    })
}

/// 数值范围校验 (validator derive)
fn validate_ranges(config: &SamplerConfig) -> Result<(), ContractError> {
    config.validate().map_err(|e| {
        let mut fields: Vec<String> = e.errors().keys().map(|k| k.to_string()).collect();
        fields.sort();
        ContractError::config_validation(fields.join(","), e.to_string())
    })
}

fn seconds(field: &str, value: f64) -> Result<Duration, ContractError> {
    Duration::try_from_secs_f64(value)
        .map_err(|e| ContractError::config_validation(field, format!("invalid interval {value}: {e}")))
}

/// 输入组合校验
fn resolve_input(input: &InputConfig) -> Result<InputSpec, ContractError> {
    let has_file = !input.filename.is_empty();
    let has_dir = !input.dirname.is_empty();
    let has_host = !input.host.is_empty();

    match (has_file, has_dir, has_host) {
        (false, false, false) => Err(ContractError::config_validation(
            "input",
            "no input given, set a filename, a filename + dirname or a host",
        )),
        (true, _, true) | (_, true, true) => Err(ContractError::config_validation(
            "input",
            "file input and host input are mutually exclusive",
        )),
        (false, true, false) => Err(ContractError::config_validation(
            "input.dirname",
            "dirname requires a filename pattern",
        )),
        (true, _, false) if input.port != 0 => Err(ContractError::config_validation(
            "input.port",
            "port is only valid with a host, not with a file input",
        )),
        (true, false, false) => Ok(InputSpec::File {
            path: input.filename.clone(),
        }),
        (true, true, false) => Ok(InputSpec::FileSet {
            dir: input.dirname.clone(),
            pattern: input.filename.clone(),
        }),
        (false, false, true) if input.port != 0 => Ok(InputSpec::Endpoint {
            host: input.host.clone(),
            port: input.port,
        }),
        (false, false, true) => Ok(InputSpec::HostString {
            hosts: input.host.clone(),
        }),
    }
}

/// 解析单个 `name:systemId` 定义
fn parse_block_pair(pair: &str) -> Result<(String, SystemId), ContractError> {
    let field = format!("split.blocks[{pair}]");

    let sep = pair.find(':').ok_or_else(|| {
        ContractError::config_validation(&field, "missing ':' separator in block definition")
    })?;
    if sep == 0 || sep + 1 == pair.len() {
        return Err(ContractError::config_validation(
            &field,
            "block name and system id must both be non-empty",
        ));
    }

    let name = pair[..sep].trim();
    let value = &pair[sep + 1..];
    let id = SystemId::parse(value).ok_or_else(|| {
        ContractError::config_validation(&field, format!("cannot parse system id '{value}'"))
    })?;
    if id.position().is_none() {
        return Err(ContractError::config_validation(
            &field,
            format!("unknown system id {id}"),
        ));
    }

    Ok((name.to_string(), id))
}

/// 解析 block 列表
///
/// Blocks keep the order of first appearance; each system id may be claimed
/// once.
fn parse_blocks(pairs: &[String]) -> Result<Vec<Block>, ContractError> {
    let mut claimed: [Option<String>; SYSTEMS.len()] = Default::default();
    let mut blocks: Vec<Block> = Vec::new();

    for pair in pairs {
        let (name, id) = parse_block_pair(pair)?;
        let Some(pos) = id.position() else {
            continue;
        };

        if let Some(owner) = &claimed[pos] {
            return Err(ContractError::config_validation(
                format!("split.blocks[{pair}]"),
                format!("system {id} already claimed by block '{owner}'"),
            ));
        }
        claimed[pos] = Some(name.clone());

        match blocks.iter_mut().find(|b| b.name == name) {
            Some(block) => {
                block.systems.insert(id.0);
            }
            None => blocks.push(Block {
                name,
                systems: BTreeSet::from([id.0]),
            }),
        }
    }

    Ok(blocks)
}

/// split 模式优先级
fn resolve_mode(split: &SplitConfig, warnings: &mut Vec<String>) -> SplitMode {
    let enabled = [split.no_split, split.per_block, split.per_system]
        .iter()
        .filter(|&&f| f)
        .count();

    let mode = if split.no_split {
        SplitMode::NoSplit
    } else if split.per_block {
        SplitMode::PerBlock
    } else if split.per_system {
        SplitMode::PerSystem
    } else {
        SplitMode::NoSplit
    };

    if enabled > 1 {
        warnings.push(format!(
            "several split modes enabled, using {} (precedence: no_split > per_block > per_system)",
            mode.as_str()
        ));
    }
    mode
}

/// channel 绑定校验
fn resolve_channels(channels: &ChannelsConfig) -> Result<ChannelSettings, ContractError> {
    if channels.request.is_empty() {
        return Err(ContractError::config_validation(
            "channels.request",
            "request channel name cannot be empty",
        ));
    }

    let request = bind(channels, &channels.request)?;
    if request.kind != ChannelKind::Tcp {
        return Err(ContractError::config_validation(
            "channels.request",
            "request channel must use the tcp transport",
        ));
    }

    Ok(ChannelSettings {
        request,
        missed_indices: bind_optional(channels, &channels.missed_indices)?,
        commands: bind_optional(channels, &channels.commands)?,
        metrics: bind_optional(channels, &channels.metrics)?,
    })
}

fn bind_optional(
    channels: &ChannelsConfig,
    name: &str,
) -> Result<Option<ChannelBinding>, ContractError> {
    if name.is_empty() {
        Ok(None)
    } else {
        bind(channels, name).map(Some)
    }
}

fn bind(channels: &ChannelsConfig, name: &str) -> Result<ChannelBinding, ContractError> {
    let endpoint = channels
        .endpoints
        .iter()
        .find(|e| e.name == name)
        .ok_or_else(|| {
            ContractError::config_validation(
                format!("channels.endpoints[name={name}]"),
                "channel has no endpoint definition",
            )
        })?;

    if endpoint.kind == ChannelKind::Tcp && endpoint.address.is_empty() {
        return Err(ContractError::config_validation(
            format!("channels.endpoints[name={name}].address"),
            "tcp endpoint address cannot be empty",
        ));
    }

    Ok(ChannelBinding {
        name: endpoint.name.clone(),
        kind: endpoint.kind,
        address: endpoint.address.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::ChannelEndpoint;

    fn minimal_config() -> SamplerConfig {
        let mut config = SamplerConfig::default();
        config.input.filename = "run.tsa".into();
        config.channels.endpoints.push(ChannelEndpoint {
            name: "ts-request".into(),
            kind: ChannelKind::Tcp,
            address: "127.0.0.1:5555".into(),
        });
        config
    }

    #[test]
    fn test_valid_config() {
        let settings = validate(&minimal_config()).unwrap();
        assert_eq!(settings.input, InputSpec::File { path: "run.tsa".into() });
        assert_eq!(settings.mode, SplitMode::NoSplit);
        assert_eq!(settings.high_water_mark, 1);
        assert_eq!(settings.max_timeslices, None);
        assert!(settings.channels.commands.is_none());
        assert!(settings.warnings.is_empty());
    }

    #[test]
    fn test_input_combinations() {
        let mut input = InputConfig::default();
        assert!(resolve_input(&input).is_err());

        input.filename = "*.tsa".into();
        input.dirname = "/data".into();
        assert!(matches!(
            resolve_input(&input).unwrap(),
            InputSpec::FileSet { .. }
        ));

        input.host = "node".into();
        assert!(resolve_input(&input).is_err());

        input.filename.clear();
        input.dirname.clear();
        assert!(matches!(
            resolve_input(&input).unwrap(),
            InputSpec::HostString { .. }
        ));

        input.port = 5556;
        assert_eq!(
            resolve_input(&input).unwrap(),
            InputSpec::Endpoint { host: "node".into(), port: 5556 }
        );

        input.host.clear();
        input.dirname = "/data".into();
        assert!(resolve_input(&input).is_err());

        input.filename = "run.tsa".into();
        input.dirname.clear();
        let err = resolve_input(&input).unwrap_err();
        assert!(err.to_string().contains("input.port"));

        input.dirname = "/data".into();
        assert!(resolve_input(&input).is_err());

        input.port = 0;
        assert!(matches!(
            resolve_input(&input).unwrap(),
            InputSpec::FileSet { .. }
        ));
    }

    #[test]
    fn test_block_pair_parsing() {
        assert_eq!(
            parse_block_pair("tof:0x60").unwrap(),
            ("tof".to_string(), SystemId(0x60))
        );
        assert_eq!(
            parse_block_pair("sts:16").unwrap(),
            ("sts".to_string(), SystemId(0x10))
        );
        assert!(parse_block_pair("sts").is_err());
        assert!(parse_block_pair(":0x10").is_err());
        assert!(parse_block_pair("sts:").is_err());
        assert!(parse_block_pair("sts:0x11").unwrap_err().to_string().contains("unknown"));
    }

    #[test]
    fn test_blocks_group_by_name_in_order() {
        let pairs = vec![
            "tracking:0x10".to_string(),
            "pid:0x60".to_string(),
            "tracking:0x20".to_string(),
        ];
        let blocks = parse_blocks(&pairs).unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].name, "tracking");
        assert_eq!(blocks[0].systems, BTreeSet::from([0x10, 0x20]));
        assert_eq!(blocks[1].name, "pid");
    }

    #[test]
    fn test_block_claim_exclusivity() {
        let mut config = minimal_config();
        config.split.per_block = true;
        config.split.blocks = vec!["blockA:0x10".into(), "blockB:0x10".into()];
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("already claimed by block 'blockA'"), "got: {err}");
    }

    #[test]
    fn test_mode_precedence() {
        let mut config = minimal_config();
        config.split.no_split = true;
        config.split.per_block = true;
        config.split.blocks = vec!["sts:0x10".into()];
        let settings = validate(&config).unwrap();
        assert_eq!(settings.mode, SplitMode::NoSplit);
        assert_eq!(settings.warnings.len(), 2);

        let mut config = minimal_config();
        config.split.per_system = true;
        config.split.per_block = true;
        config.split.blocks = vec!["sts:0x10".into()];
        let settings = validate(&config).unwrap();
        assert_eq!(settings.mode, SplitMode::PerBlock);
        assert_eq!(settings.target_count(), 1);
    }

    #[test]
    fn test_per_block_without_blocks() {
        let mut config = minimal_config();
        config.split.per_block = true;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_high_water_mark() {
        let mut config = minimal_config();
        config.buffer.high_water_mark = 0;
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("buffer"), "got: {err}");
    }

    #[test]
    fn test_channel_without_endpoint() {
        let mut config = minimal_config();
        config.channels.commands = "commands".into();
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("no endpoint"), "got: {err}");

        config.channels.endpoints.push(ChannelEndpoint {
            name: "commands".into(),
            kind: ChannelKind::Log,
            address: String::new(),
        });
        let settings = validate(&config).unwrap();
        assert_eq!(settings.channels.commands.unwrap().kind, ChannelKind::Log);
    }

    #[test]
    fn test_request_channel_must_be_tcp() {
        let mut config = minimal_config();
        config.channels.endpoints[0].kind = ChannelKind::Log;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_monitoring_enabled_needs_metrics_channel() {
        let mut config = minimal_config();
        assert!(!validate(&config).unwrap().monitoring_enabled());

        config.channels.metrics = "histos".into();
        config.channels.endpoints.push(ChannelEndpoint {
            name: "histos".into(),
            kind: ChannelKind::Log,
            address: String::new(),
        });
        assert!(validate(&config).unwrap().monitoring_enabled());

        config.monitoring.publish_every = 0;
        assert!(!validate(&config).unwrap().monitoring_enabled());
    }
}

//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{ChannelBinding, InputSpec, ServerSettings, SplitMode, SystemId, SYSTEMS};
use observability::SamplerHistograms;
use serde::Serialize;
use tracing::info;

use super::load_settings;
use crate::cli::InfoArgs;

/// Settings info for JSON output
#[derive(Serialize)]
struct SettingsInfo {
    input: InputSpec,
    mode: String,
    high_water_mark: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_timeslices: Option<u64>,
    targets: Vec<TargetInfo>,
    channels: Vec<ChannelInfo>,
    monitoring: MonitoringInfo,
    stop_grace_ms: u128,
    eof_grace_ms: u128,
}

/// One split target, in request order
#[derive(Serialize)]
struct TargetInfo {
    position: usize,
    name: String,
    systems: Vec<String>,
}

#[derive(Serialize)]
struct ChannelInfo {
    role: &'static str,
    name: String,
    kind: String,
    address: String,
}

#[derive(Serialize)]
struct MonitoringInfo {
    enabled: bool,
    publish_every: u32,
    min_interval_s: f64,
    max_interval_s: f64,
    histogram_suffix: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    layout: Option<HistogramLayout>,
}

/// Names and folders announced with the first publish
#[derive(Serialize)]
struct HistogramLayout {
    histograms: Vec<(String, String)>,
    canvas_folder: String,
    canvases: Vec<String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!("Loading configuration info");

    let settings = load_settings(&args.config).context("Failed to load configuration")?;
    let info = build_settings_info(&settings, args.histograms);

    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize settings info")?;
        println!("{}", json);
    } else {
        print_settings_info(&info);
    }

    Ok(())
}

fn describe_system(id: SystemId) -> String {
    match id.name() {
        Some(name) => format!("{name} ({id})"),
        None => id.to_string(),
    }
}

fn build_targets(settings: &ServerSettings) -> Vec<TargetInfo> {
    match settings.mode {
        SplitMode::NoSplit => Vec::new(),
        SplitMode::PerSystem => SYSTEMS
            .iter()
            .enumerate()
            .map(|(position, system)| TargetInfo {
                position,
                name: system.name.to_string(),
                systems: vec![describe_system(system.id)],
            })
            .collect(),
        SplitMode::PerBlock => settings
            .blocks
            .iter()
            .enumerate()
            .map(|(position, block)| TargetInfo {
                position,
                name: block.name.clone(),
                systems: block
                    .systems
                    .iter()
                    .map(|&id| describe_system(SystemId(id)))
                    .collect(),
            })
            .collect(),
    }
}

fn channel_info(role: &'static str, binding: &ChannelBinding) -> ChannelInfo {
    ChannelInfo {
        role,
        name: binding.name.clone(),
        kind: format!("{:?}", binding.kind).to_lowercase(),
        address: binding.address.clone(),
    }
}

fn build_settings_info(settings: &ServerSettings, with_layout: bool) -> SettingsInfo {
    let channels = &settings.channels;
    let mut channel_infos = vec![channel_info("request", &channels.request)];
    for (role, binding) in [
        ("missed_indices", &channels.missed_indices),
        ("commands", &channels.commands),
        ("metrics", &channels.metrics),
    ] {
        if let Some(binding) = binding {
            channel_infos.push(channel_info(role, binding));
        }
    }

    let monitoring = &settings.monitoring;
    let layout = with_layout.then(|| {
        let histograms = SamplerHistograms::new(monitoring.histogram_suffix.as_str());
        HistogramLayout {
            histograms: histograms.descriptors(),
            canvas_folder: histograms.canvas_folder(),
            canvases: histograms
                .canvases()
                .into_iter()
                .map(|(name, _)| name)
                .collect(),
        }
    });

    SettingsInfo {
        input: settings.input.clone(),
        mode: settings.mode.as_str().to_string(),
        high_water_mark: settings.high_water_mark,
        max_timeslices: settings.max_timeslices,
        targets: build_targets(settings),
        channels: channel_infos,
        monitoring: MonitoringInfo {
            enabled: settings.monitoring_enabled(),
            publish_every: monitoring.publish_every,
            min_interval_s: monitoring.min_interval.as_secs_f64(),
            max_interval_s: monitoring.max_interval.as_secs_f64(),
            histogram_suffix: monitoring.histogram_suffix.clone(),
            layout,
        },
        stop_grace_ms: settings.stop_grace.as_millis(),
        eof_grace_ms: settings.eof_grace.as_millis(),
    }
}

fn tree_prefix(i: usize, len: usize) -> &'static str {
    if i + 1 == len {
        "└─"
    } else {
        "├─"
    }
}

fn print_settings_info(info: &SettingsInfo) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                 TS Sampler Configuration                     ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("📥 Input");
    println!("   ├─ Source: {}", info.input.describe());
    println!("   ├─ High water mark: {}", info.high_water_mark);
    match info.max_timeslices {
        Some(max) => println!("   └─ Max timeslices: {max}"),
        None => println!("   └─ Max timeslices: unbounded"),
    }

    println!("\n✂️  Split mode: {}", info.mode);
    for (i, target) in info.targets.iter().enumerate() {
        println!(
            "   {} [{}] {}: {}",
            tree_prefix(i, info.targets.len()),
            target.position,
            target.name,
            target.systems.join(", ")
        );
    }

    println!("\n📡 Channels ({})", info.channels.len());
    for (i, channel) in info.channels.iter().enumerate() {
        println!(
            "   {} {}: {} ({} {})",
            tree_prefix(i, info.channels.len()),
            channel.role,
            channel.name,
            channel.kind,
            channel.address
        );
    }

    let monitoring = &info.monitoring;
    println!(
        "\n📈 Monitoring: {}",
        if monitoring.enabled { "on" } else { "off" }
    );
    println!("   ├─ Publish every: {} messages", monitoring.publish_every);
    println!(
        "   ├─ Interval: {:.1}s .. {:.1}s",
        monitoring.min_interval_s, monitoring.max_interval_s
    );
    println!("   └─ Suffix: {:?}", monitoring.histogram_suffix);

    if let Some(ref layout) = monitoring.layout {
        println!("\n📊 Histograms");
        for (name, folder) in &layout.histograms {
            println!("   ├─ {folder}/{name}");
        }
        for (i, canvas) in layout.canvases.iter().enumerate() {
            println!(
                "   {} {}/{}",
                tree_prefix(i, layout.canvases.len()),
                layout.canvas_folder,
                canvas
            );
        }
    }

    println!("\n⏱  Grace delays");
    println!("   ├─ STOP: {} ms", info.stop_grace_ms);
    println!("   └─ EOF: {} ms", info.eof_grace_ms);

    println!();
}

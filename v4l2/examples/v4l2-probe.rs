// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Lists memory-to-memory codec devices and the formats of both queues.
//!
//! ```text
//! cargo run --example v4l2-probe -- --enumerator path --json
//! cargo run --example v4l2-probe -- /dev/video11
//! ```

mod common;

use clap::Parser;
use serde::Serialize;
use v4l2::{DeviceDescriptor, DeviceFormats, EnumeratorKind, collect_devices, open_iterator};

#[derive(Parser, Debug)]
#[command(name = "v4l2-probe")]
#[command(version)]
#[command(about = "List V4L2 memory-to-memory devices and their formats", long_about = None)]
struct Cli {
    /// Enumeration strategy: "udev" or "path". Defaults to $GST_V4L2_DEVICE_ENUMERATOR.
    #[arg(long, short)]
    enumerator: Option<EnumeratorKind>,

    /// Print one JSON document instead of text.
    #[arg(long, short, action)]
    json: bool,

    /// Probe these nodes instead of enumerating.
    devices: Vec<String>,
}

#[derive(Serialize)]
struct Report {
    #[serde(flatten)]
    device: DeviceDescriptor,
    #[serde(skip_serializing_if = "Option::is_none")]
    formats: Option<DeviceFormats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    common::setup_logging();
    let cli = Cli::parse();

    let devices = if cli.devices.is_empty() {
        let kind = cli.enumerator.unwrap_or_else(EnumeratorKind::from_env);
        let mut iter = open_iterator(kind)?;
        collect_devices(iter.as_mut())
    } else {
        cli.devices.into_iter().map(DeviceDescriptor::new).collect()
    };

    let reports: Vec<Report> = devices
        .into_iter()
        .map(|device| match v4l2::probe_device(&device.device_path) {
            Ok(formats) => Report {
                device,
                formats: Some(formats),
                error: None,
            },
            Err(err) => Report {
                device,
                formats: None,
                error: Some(err.to_string()),
            },
        })
        .collect();

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    for report in &reports {
        let name = report.device.device_name.as_deref().unwrap_or("-");
        println!("{} ({})", report.device.device_path, name);
        match (&report.formats, &report.error) {
            (Some(formats), _) => {
                println!("  sink:   {}", join(&formats.sink));
                println!("  source: {}", join(&formats.source));
            }
            (None, Some(error)) => println!("  {error}"),
            (None, None) => {}
        }
    }

    Ok(())
}

fn join(formats: &[v4l2::Fourcc]) -> String {
    formats
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

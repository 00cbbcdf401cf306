use std::io::IsTerminal;
use std::time::Duration;

use anyhow::{Context, Result};
use renderer::{ShaderOrigin, ShaderPicker, ViewerConfig};
use tracing_subscriber::EnvFilter;
use viewconfig::ViewerFile;

use crate::cli::Cli;
use crate::paths::AppPaths;
use crate::picker::StdinPicker;

pub fn run(args: Cli) -> Result<()> {
    initialise_tracing();

    let file = load_config_file(&args)?;
    let config = resolve_viewer_config(&args, file.as_ref());
    match &config.shader {
        ShaderOrigin::File(path) => tracing::info!(shader = %path.display(), "starting sdfview"),
        ShaderOrigin::Embedded => tracing::info!("starting sdfview with the built-in scene"),
    }
    tracing::debug!(?config, "resolved viewer configuration");

    let picker = std::io::stdin()
        .is_terminal()
        .then(|| Box::new(StdinPicker) as Box<dyn ShaderPicker>);
    if picker.is_none() {
        tracing::debug!("stdin is not a terminal; shader picker disabled");
    }

    renderer::run(config, picker)
}

fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// An explicit `--config` must exist; the default location is optional.
fn load_config_file(args: &Cli) -> Result<Option<ViewerFile>> {
    if let Some(path) = args.config.as_ref() {
        let file = ViewerFile::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?;
        return Ok(Some(file));
    }

    let paths = AppPaths::discover()?;
    let path = paths.config_file();
    let file = ViewerFile::load_if_present(&path)
        .with_context(|| format!("failed to load config {}", path.display()))?;
    if file.is_some() {
        tracing::debug!(path = %path.display(), "loaded configuration file");
    }
    Ok(file)
}

/// Layers defaults, then the config file, then command-line flags.
fn resolve_viewer_config(args: &Cli, file: Option<&ViewerFile>) -> ViewerConfig {
    let mut config = ViewerConfig::default();

    if let Some(file) = file {
        if let Some(size) = file.surface_size() {
            config.surface_size = size;
        }
        if let Some(title) = file.window.title.as_ref() {
            config.title = title.clone();
        }
        if let Some(speed) = file.camera.fly_speed {
            config.camera.fly_speed = speed;
        }
        if let Some(sensitivity) = file.camera.mouse_sensitivity {
            config.camera.mouse_sensitivity = sensitivity;
        }
        if let Some(factor) = file.camera.wheel_speed_factor {
            config.camera.wheel_speed_factor = factor;
        }
        if let Some(interval) = file.timing.poll_interval {
            config.poll_interval = interval;
        }
        if let Some(interval) = file.timing.query_interval {
            config.query_interval = interval;
        }
        if let Some(path) = file.shader.path.as_ref() {
            config.shader = ShaderOrigin::File(path.clone());
        }
    }

    if let Some(size) = args.size {
        config.surface_size = size;
    }
    if let Some(speed) = args.fly_speed {
        config.camera.fly_speed = speed;
    }
    if let Some(ms) = args.poll_ms {
        config.poll_interval = Duration::from_millis(ms);
    }
    if let Some(ms) = args.query_ms {
        config.query_interval = Duration::from_millis(ms);
    }
    if let Some(path) = args.shader.as_ref() {
        config.shader = ShaderOrigin::File(path.clone());
    }

    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use renderer::{DEFAULT_POLL_INTERVAL, DEFAULT_QUERY_INTERVAL};
    use std::path::PathBuf;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("sdfview").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_without_file_or_flags() {
        let config = resolve_viewer_config(&cli(&[]), None);
        assert_eq!(config.shader, ShaderOrigin::Embedded);
        assert_eq!(config.surface_size, (640, 480));
        assert_eq!(config.poll_interval, DEFAULT_POLL_INTERVAL);
        assert_eq!(config.query_interval, DEFAULT_QUERY_INTERVAL);
        assert_eq!(config.camera.fly_speed, 2.0);
    }

    #[test]
    fn flags_override_config_file() {
        let file = ViewerFile::from_toml_str(
            r#"
version = 1
[window]
width = 1024
height = 768
title = "lab"
[camera]
fly_speed = 8.0
[timing]
poll_interval = "2s"
[shader]
path = "from-file.frag"
"#,
        )
        .unwrap();

        let config = resolve_viewer_config(
            &cli(&["from-cli.frag", "--fly-speed", "3", "--query-ms", "250"]),
            Some(&file),
        );

        assert_eq!(config.surface_size, (1024, 768));
        assert_eq!(config.title, "lab");
        assert_eq!(config.camera.fly_speed, 3.0);
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.query_interval, Duration::from_millis(250));
        assert_eq!(
            config.shader,
            ShaderOrigin::File(PathBuf::from("from-cli.frag"))
        );
    }

    #[test]
    fn file_shader_is_used_when_no_positional_given() {
        let file = ViewerFile::from_toml_str("version = 1\n[shader]\npath = \"a.frag\"\n").unwrap();
        let config = resolve_viewer_config(&cli(&["--size", "100x50"]), Some(&file));
        assert_eq!(config.shader, ShaderOrigin::File(PathBuf::from("a.frag")));
        assert_eq!(config.surface_size, (100, 50));
    }
}

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "sdfview",
    author,
    version,
    about = "Interactive signed-distance-field viewer with live shader reload"
)]
pub struct Cli {
    /// Fragment shader defining `vec3 render(vec3 rayPos, vec3 rayDir, float time)`.
    /// Without one the built-in scene is shown.
    #[arg(value_name = "SHADER")]
    pub shader: Option<PathBuf>,

    /// Initial window size (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_surface_size)]
    pub size: Option<(u32, u32)>,

    /// How often the shader file is checked for changes, in milliseconds.
    #[arg(long, value_name = "MILLISECONDS", value_parser = clap::value_parser!(u64).range(1..))]
    pub poll_ms: Option<u64>,

    /// How often the GPU frame time is measured, in milliseconds.
    #[arg(long, value_name = "MILLISECONDS", value_parser = clap::value_parser!(u64).range(1..))]
    pub query_ms: Option<u64>,

    /// Initial camera speed in world units per second.
    #[arg(long, value_name = "SPEED", value_parser = parse_fly_speed)]
    pub fly_speed: Option<f32>,

    /// Configuration file; defaults to `sdfview.toml` in the config directory.
    #[arg(long, value_name = "PATH", env = "SDFVIEW_CONFIG")]
    pub config: Option<PathBuf>,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_surface_size(spec: &str) -> Result<(u32, u32), String> {
    let (width, height) = spec
        .trim()
        .split_once(['x', 'X', '×'])
        .ok_or_else(|| "expected WxH format, e.g. 1280x720".to_string())?;

    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| format!("invalid width '{}' in size specification", width.trim()))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| format!("invalid height '{}' in size specification", height.trim()))?;

    if width == 0 || height == 0 {
        return Err("window dimensions must be greater than zero".to_string());
    }

    Ok((width, height))
}

pub fn parse_fly_speed(value: &str) -> Result<f32, String> {
    let speed: f32 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid fly speed '{value}'"))?;
    if !speed.is_finite() || speed <= 0.0 {
        return Err("fly speed must be greater than zero".to_string());
    }
    Ok(speed)
}

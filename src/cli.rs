use crate::config::load_config;
use crate::ir::{CanvasSize, Diagram};
use crate::render::{render_svg, write_output_svg};
use crate::route_dump::write_route_dump;
use crate::routing::Router;
use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "ortho-route", version, about = "Orthogonal connector router for device diagrams")]
pub struct Args {
    /// Input diagram (.json) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file. Defaults to stdout for JSON and SVG if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "json")]
    pub output_format: OutputFormat,

    /// Config JSON5 file (routing, preview and theme overrides)
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Canvas width, overriding the diagram's
    #[arg(short = 'w', long = "width")]
    pub width: Option<f32>,

    /// Canvas height, overriding the diagram's
    #[arg(short = 'H', long = "height")]
    pub height: Option<f32>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Svg,
    Png,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    init_tracing();
    let config = load_config(args.config.as_deref())?;

    let input = read_input(args.input.as_deref())?;
    let mut diagram = Diagram::from_json_str(&input)?;
    diagram.canvas = apply_canvas_overrides(diagram.canvas, args.width, args.height);

    let mut router = Router::new(config.routing.clone());
    let routes = router.route(&diagram.devices, &diagram.connections, diagram.canvas);

    match args.output_format {
        OutputFormat::Json => {
            write_route_dump(args.output.as_deref(), &diagram, &routes)?;
        }
        OutputFormat::Svg => {
            let svg = render_svg(&diagram, &routes, &config.theme, &config.preview);
            write_output_svg(&svg, args.output.as_deref())?;
        }
        OutputFormat::Png => {
            let output = ensure_output(&args.output, "png")?;
            let svg = render_svg(&diagram, &routes, &config.theme, &config.preview);
            write_png(&svg, &output, &config.theme)?;
        }
    }
    Ok(())
}

#[cfg(feature = "png")]
fn write_png(svg: &str, output: &Path, theme: &crate::theme::Theme) -> Result<()> {
    crate::render::write_output_png(svg, output, theme)
}

#[cfg(not(feature = "png"))]
fn write_png(_svg: &str, _output: &Path, _theme: &crate::theme::Theme) -> Result<()> {
    Err(anyhow::anyhow!(
        "PNG output requires the `png` feature"
    ))
}

#[cfg(feature = "tracing")]
fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    // A subscriber may already be installed when embedded; keep that one.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

#[cfg(not(feature = "tracing"))]
fn init_tracing() {}

fn apply_canvas_overrides(
    canvas: CanvasSize,
    width: Option<f32>,
    height: Option<f32>,
) -> CanvasSize {
    CanvasSize {
        width: width.unwrap_or(canvas.width),
        height: height.unwrap_or(canvas.height),
    }
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path {
        if path != Path::new("-") {
            return Ok(std::fs::read_to_string(path)?);
        }
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn ensure_output(output: &Option<PathBuf>, ext: &str) -> Result<PathBuf> {
    if let Some(path) = output {
        return Ok(path.clone());
    }
    Err(anyhow::anyhow!(
        "Output path required for {} output",
        ext
    ))
}

use crate::theme::Theme;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Smallest usable grid cell, in canvas units.
const MIN_CELL_SIZE: f32 = 1.0;
/// Fallback iteration cap when the configured one is zero.
const MIN_ITERATIONS: usize = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoutingConfig {
    pub grid_cell_size: f32,
    pub device_clearance: f32,
    pub port_clearance: f32,
    pub port_extension: f32,
    pub crossing_penalty: f32,
    pub grid_move_cost: f32,
    pub turn_penalty: f32,
    pub min_path_spacing: f32,
    pub path_repulsion_factor: f32,
    pub path_density_penalty: f32,
    pub density_radius: f32,
    pub distribution_factor: f32,
    pub max_pathfinding_iterations: usize,
    pub simplify_path: bool,
    pub remove_zigzags: bool,
    pub enable_caching: bool,
    pub device_snap_to_grid: bool,
    pub port_extension_obstacles: bool,
    pub group_shared_corridors: bool,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            grid_cell_size: 10.0,
            device_clearance: 10.0,
            port_clearance: 15.0,
            port_extension: 70.0,
            crossing_penalty: 5.0,
            grid_move_cost: 1.0,
            turn_penalty: 8.0,
            min_path_spacing: 20.0,
            path_repulsion_factor: 4.0,
            path_density_penalty: 2.0,
            density_radius: 30.0,
            distribution_factor: 0.5,
            max_pathfinding_iterations: 10_000,
            simplify_path: true,
            remove_zigzags: true,
            enable_caching: false,
            device_snap_to_grid: true,
            port_extension_obstacles: true,
            group_shared_corridors: true,
        }
    }
}

fn finite_at_least(value: f32, min: f32, fallback: f32) -> f32 {
    if value.is_finite() { value.max(min) } else { fallback }
}

impl RoutingConfig {
    /// Copy with every value clamped into a usable range. Diagrams are edited
    /// interactively upstream, so bad values are repaired rather than rejected.
    pub fn sanitized(&self) -> Self {
        let defaults = Self::default();
        Self {
            grid_cell_size: finite_at_least(
                self.grid_cell_size,
                MIN_CELL_SIZE,
                defaults.grid_cell_size,
            ),
            device_clearance: finite_at_least(
                self.device_clearance,
                0.0,
                defaults.device_clearance,
            ),
            port_clearance: finite_at_least(self.port_clearance, 0.0, defaults.port_clearance),
            port_extension: finite_at_least(self.port_extension, 0.0, defaults.port_extension),
            crossing_penalty: finite_at_least(
                self.crossing_penalty,
                0.0,
                defaults.crossing_penalty,
            ),
            grid_move_cost: finite_at_least(self.grid_move_cost, 0.001, defaults.grid_move_cost),
            turn_penalty: finite_at_least(self.turn_penalty, 0.0, defaults.turn_penalty),
            min_path_spacing: finite_at_least(
                self.min_path_spacing,
                0.0,
                defaults.min_path_spacing,
            ),
            path_repulsion_factor: finite_at_least(
                self.path_repulsion_factor,
                0.0,
                defaults.path_repulsion_factor,
            ),
            path_density_penalty: finite_at_least(
                self.path_density_penalty,
                0.0,
                defaults.path_density_penalty,
            ),
            density_radius: finite_at_least(self.density_radius, 0.0, defaults.density_radius),
            distribution_factor: finite_at_least(
                self.distribution_factor,
                0.0,
                defaults.distribution_factor,
            ),
            max_pathfinding_iterations: self.max_pathfinding_iterations.max(MIN_ITERATIONS),
            ..self.clone()
        }
    }

    /// Minimum spacing between parallel paths, in whole cells (at least one).
    pub fn spacing_cells(&self) -> i32 {
        ((self.min_path_spacing / self.grid_cell_size).round() as i32).max(1)
    }

    /// Lead-out length in whole cells.
    pub fn extension_cells(&self) -> i32 {
        ((self.port_extension / self.grid_cell_size).round() as i32).max(0)
    }

    /// Density influence radius in cells.
    pub fn density_radius_cells(&self) -> f32 {
        (self.density_radius / self.grid_cell_size).max(1.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewConfig {
    pub padding: f32,
    pub port_radius: f32,
    pub path_width: f32,
    pub failed_path_width: f32,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            padding: 0.0,
            port_radius: 3.0,
            path_width: 1.6,
            failed_path_width: 2.4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub theme: Theme,
    pub routing: RoutingConfig,
    pub preview: PreviewConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            theme: Theme::modern(),
            routing: RoutingConfig::default(),
            preview: PreviewConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RoutingConfigFile {
    grid_cell_size: Option<f32>,
    device_clearance: Option<f32>,
    port_clearance: Option<f32>,
    port_extension: Option<f32>,
    crossing_penalty: Option<f32>,
    grid_move_cost: Option<f32>,
    turn_penalty: Option<f32>,
    min_path_spacing: Option<f32>,
    path_repulsion_factor: Option<f32>,
    path_density_penalty: Option<f32>,
    density_radius: Option<f32>,
    distribution_factor: Option<f32>,
    max_pathfinding_iterations: Option<usize>,
    simplify_path: Option<bool>,
    remove_zigzags: Option<bool>,
    enable_caching: Option<bool>,
    device_snap_to_grid: Option<bool>,
    port_extension_obstacles: Option<bool>,
    group_shared_corridors: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct PreviewConfigFile {
    padding: Option<f32>,
    port_radius: Option<f32>,
    path_width: Option<f32>,
    failed_path_width: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    theme: Option<String>,
    routing: Option<RoutingConfigFile>,
    preview: Option<PreviewConfigFile>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let Some(path) = path else {
        return Ok(config);
    };

    let contents = std::fs::read_to_string(path)?;
    let parsed: ConfigFile = json5::from_str(&contents)?;

    if let Some(theme_name) = parsed.theme.as_deref() {
        if theme_name == "modern" {
            config.theme = Theme::modern();
        } else if theme_name == "classic" || theme_name == "default" {
            config.theme = Theme::classic();
        }
    }

    if let Some(routing) = parsed.routing {
        apply_routing_overrides(&mut config.routing, routing);
    }

    if let Some(preview) = parsed.preview {
        if let Some(v) = preview.padding {
            config.preview.padding = v;
        }
        if let Some(v) = preview.port_radius {
            config.preview.port_radius = v;
        }
        if let Some(v) = preview.path_width {
            config.preview.path_width = v;
        }
        if let Some(v) = preview.failed_path_width {
            config.preview.failed_path_width = v;
        }
    }

    Ok(config)
}

fn apply_routing_overrides(routing: &mut RoutingConfig, file: RoutingConfigFile) {
    if let Some(v) = file.grid_cell_size {
        routing.grid_cell_size = v;
    }
    if let Some(v) = file.device_clearance {
        routing.device_clearance = v;
    }
    if let Some(v) = file.port_clearance {
        routing.port_clearance = v;
    }
    if let Some(v) = file.port_extension {
        routing.port_extension = v;
    }
    if let Some(v) = file.crossing_penalty {
        routing.crossing_penalty = v;
    }
    if let Some(v) = file.grid_move_cost {
        routing.grid_move_cost = v;
    }
    if let Some(v) = file.turn_penalty {
        routing.turn_penalty = v;
    }
    if let Some(v) = file.min_path_spacing {
        routing.min_path_spacing = v;
    }
    if let Some(v) = file.path_repulsion_factor {
        routing.path_repulsion_factor = v;
    }
    if let Some(v) = file.path_density_penalty {
        routing.path_density_penalty = v;
    }
    if let Some(v) = file.density_radius {
        routing.density_radius = v;
    }
    if let Some(v) = file.distribution_factor {
        routing.distribution_factor = v;
    }
    if let Some(v) = file.max_pathfinding_iterations {
        routing.max_pathfinding_iterations = v;
    }
    if let Some(v) = file.simplify_path {
        routing.simplify_path = v;
    }
    if let Some(v) = file.remove_zigzags {
        routing.remove_zigzags = v;
    }
    if let Some(v) = file.enable_caching {
        routing.enable_caching = v;
    }
    if let Some(v) = file.device_snap_to_grid {
        routing.device_snap_to_grid = v;
    }
    if let Some(v) = file.port_extension_obstacles {
        routing.port_extension_obstacles = v;
    }
    if let Some(v) = file.group_shared_corridors {
        routing.group_shared_corridors = v;
    }
}

use crate::config::RoutingConfig;
use crate::ir::Device;

use super::geometry::expand_path;
use super::grid::{GridPoint, GridRect};

/// Scalar field of recent path traffic plus the device outlines used to pull
/// new paths toward the middle of open lanes.
#[derive(Debug, Clone)]
pub struct PathDensityTracker {
    width: i32,
    height: i32,
    density: Vec<f32>,
    traversals: Vec<u32>,
    boundaries: Vec<GridRect>,
    radius: f32,
    density_weight: f32,
    distribution_factor: f32,
}

impl PathDensityTracker {
    pub fn new(width: i32, height: i32, config: &RoutingConfig) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let cells = (width as usize) * (height as usize);
        Self {
            width,
            height,
            density: vec![0.0; cells],
            traversals: vec![0; cells],
            boundaries: Vec::new(),
            radius: config.density_radius_cells(),
            density_weight: config.path_density_penalty,
            distribution_factor: config.distribution_factor,
        }
    }

    fn index(&self, point: GridPoint) -> Option<usize> {
        if point.x < 0 || point.y < 0 || point.x >= self.width || point.y >= self.height {
            return None;
        }
        Some((point.y as usize) * (self.width as usize) + point.x as usize)
    }

    /// Devices entirely off the grid bound no lane and are ignored.
    pub fn register_device(&mut self, device: &Device, cell_size: f32) {
        let boundary = GridRect::covering(
            device.x,
            device.y,
            device.x + device.width.max(0.0),
            device.y + device.height.max(0.0),
            cell_size,
        );
        if boundary.intersects_grid(self.width, self.height) {
            self.boundaries.push(boundary);
        }
    }

    /// Adds a committed path: each visited cell counts one traversal and
    /// spreads `1 - d/r` of density to every cell within the radius.
    pub fn record_path(&mut self, path: &[GridPoint]) {
        let reach = self.radius.ceil() as i32;
        for cell in expand_path(path) {
            let Some(idx) = self.index(cell) else {
                continue;
            };
            self.traversals[idx] = self.traversals[idx].saturating_add(1);
            for dy in -reach..=reach {
                for dx in -reach..=reach {
                    let neighbor = GridPoint::new(cell.x + dx, cell.y + dy);
                    let Some(n_idx) = self.index(neighbor) else {
                        continue;
                    };
                    let distance = cell.euclidean_distance(neighbor);
                    if distance < self.radius {
                        self.density[n_idx] += 1.0 - distance / self.radius;
                    }
                }
            }
        }
    }

    pub fn density_at(&self, point: GridPoint) -> f32 {
        self.index(point).map(|idx| self.density[idx]).unwrap_or(0.0)
    }

    pub fn traversals_at(&self, point: GridPoint) -> u32 {
        self.index(point).map(|idx| self.traversals[idx]).unwrap_or(0)
    }

    pub fn density_cost(&self, point: GridPoint) -> f32 {
        self.density_at(point) * self.density_weight + self.distribution_penalty(point)
    }

    /// Distance from the midpoint between the nearest device walls left and
    /// right of the cell, on the cell's row. Zero unless both walls exist.
    pub fn distribution_penalty(&self, point: GridPoint) -> f32 {
        let mut left_wall: Option<i32> = None;
        let mut right_wall: Option<i32> = None;
        for boundary in &self.boundaries {
            if !boundary.spans_row(point.y) {
                continue;
            }
            if boundary.max_x < point.x {
                left_wall = Some(left_wall.map_or(boundary.max_x, |w| w.max(boundary.max_x)));
            } else if boundary.min_x > point.x {
                right_wall = Some(right_wall.map_or(boundary.min_x, |w| w.min(boundary.min_x)));
            }
        }
        match (left_wall, right_wall) {
            (Some(left), Some(right)) => {
                let mid = (left + right) as f32 / 2.0;
                (point.x as f32 - mid).abs() * self.distribution_factor
            }
            _ => 0.0,
        }
    }

    /// Centre of the devices lying inside the box spanned by the endpoints.
    pub fn device_pathway_center(&self, source: GridPoint, target: GridPoint) -> Option<GridPoint> {
        let min_x = source.x.min(target.x);
        let max_x = source.x.max(target.x);
        let min_y = source.y.min(target.y);
        let max_y = source.y.max(target.y);
        let mut union: Option<GridRect> = None;
        for boundary in &self.boundaries {
            let inside = boundary.max_x >= min_x
                && boundary.min_x <= max_x
                && boundary.max_y >= min_y
                && boundary.min_y <= max_y;
            if !inside {
                continue;
            }
            union = Some(match union {
                Some(acc) => GridRect {
                    min_x: acc.min_x.min(boundary.min_x),
                    min_y: acc.min_y.min(boundary.min_y),
                    max_x: acc.max_x.max(boundary.max_x),
                    max_y: acc.max_y.max(boundary.max_y),
                },
                None => *boundary,
            });
        }
        union.map(|rect| {
            GridPoint::new((rect.min_x + rect.max_x) / 2, (rect.min_y + rect.max_y) / 2)
        })
    }
}

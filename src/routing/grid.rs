use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::ConnectionIndex;

// ── Grid bounds ─────────────────────────────────────────────────────
/// Largest cell count a routing grid may hold. Bigger canvases get a
/// coarser effective cell size instead.
pub const MAX_GRID_CELLS: usize = 1 << 20;
/// Cell coordinates are clamped to this magnitude before integer math, so
/// far off-canvas geometry can neither overflow nor wrap around.
const CELL_COORD_LIMIT: f32 = 16_777_216.0;

/// Canvas coordinate over cell size as a bounded cell index.
fn cell_coord(value: f32) -> i32 {
    if value.is_nan() {
        return 0;
    }
    value.clamp(-CELL_COORD_LIMIT, CELL_COORD_LIMIT) as i32
}

/// Integer cell coordinate. `y` grows downward, like canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPoint {
    pub x: i32,
    pub y: i32,
}

impl GridPoint {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn manhattan_distance(self, other: GridPoint) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    pub fn euclidean_distance(self, other: GridPoint) -> f32 {
        let dx = (self.x - other.x) as f32;
        let dy = (self.y - other.y) as f32;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn step(self, direction: GridDirection) -> GridPoint {
        let (dx, dy) = direction.delta();
        GridPoint::new(self.x + dx, self.y + dy)
    }

    pub fn offset(self, direction: GridDirection, amount: i32) -> GridPoint {
        let (dx, dy) = direction.delta();
        GridPoint::new(self.x + dx * amount, self.y + dy * amount)
    }

    pub fn is_aligned_with(self, other: GridPoint) -> bool {
        self.x == other.x || self.y == other.y
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GridDirection {
    North,
    South,
    East,
    West,
}

impl GridDirection {
    pub const ALL: [GridDirection; 4] = [
        GridDirection::North,
        GridDirection::South,
        GridDirection::East,
        GridDirection::West,
    ];

    /// Direction of travel from `from` to `to`. The dominant axis wins for
    /// diagonal pairs; identical points have no direction.
    pub fn between(from: GridPoint, to: GridPoint) -> Option<Self> {
        let dx = to.x - from.x;
        let dy = to.y - from.y;
        if dx == 0 && dy == 0 {
            return None;
        }
        if dx.abs() >= dy.abs() {
            Some(if dx > 0 {
                GridDirection::East
            } else {
                GridDirection::West
            })
        } else {
            Some(if dy > 0 {
                GridDirection::South
            } else {
                GridDirection::North
            })
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            GridDirection::North => GridDirection::South,
            GridDirection::South => GridDirection::North,
            GridDirection::East => GridDirection::West,
            GridDirection::West => GridDirection::East,
        }
    }

    pub fn is_horizontal(self) -> bool {
        matches!(self, GridDirection::East | GridDirection::West)
    }

    pub fn is_perpendicular_to(self, other: GridDirection) -> bool {
        self.is_horizontal() != other.is_horizontal()
    }

    pub fn delta(self) -> (i32, i32) {
        match self {
            GridDirection::North => (0, -1),
            GridDirection::South => (0, 1),
            GridDirection::East => (1, 0),
            GridDirection::West => (-1, 0),
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            GridDirection::North => 0,
            GridDirection::South => 1,
            GridDirection::East => 2,
            GridDirection::West => 3,
        }
    }
}

/// Inclusive rectangle of cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridRect {
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
}

impl GridRect {
    pub fn contains(&self, point: GridPoint) -> bool {
        point.x >= self.min_x
            && point.x <= self.max_x
            && point.y >= self.min_y
            && point.y <= self.max_y
    }

    /// Whether any cell of the rectangle lies on a `width` x `height` grid.
    pub fn intersects_grid(&self, width: i32, height: i32) -> bool {
        self.max_x >= 0 && self.max_y >= 0 && self.min_x < width && self.min_y < height
    }

    pub fn spans_row(&self, y: i32) -> bool {
        y >= self.min_y && y <= self.max_y
    }

    fn overlaps_rows(&self, min_y: i32, max_y: i32) -> bool {
        self.min_y <= max_y && self.max_y >= min_y
    }

    fn overlaps_columns(&self, min_x: i32, max_x: i32) -> bool {
        self.min_x <= max_x && self.max_x >= min_x
    }

    /// Cells whose footprint intersects the continuous rectangle. A rectangle
    /// edge that falls exactly on a cell boundary does not claim the cell
    /// beyond it.
    pub fn covering(x0: f32, y0: f32, x1: f32, y1: f32, cell: f32) -> Self {
        let min_x = cell_coord((x0 / cell).floor());
        let min_y = cell_coord((y0 / cell).floor());
        let max_x = (cell_coord((x1 / cell).ceil()) - 1).max(min_x);
        let max_y = (cell_coord((y1 / cell).ceil()) - 1).max(min_y);
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }
}

/// Free vertical lane between two device columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Corridor {
    pub top: GridPoint,
    pub bottom: GridPoint,
    /// First free column right of the left device.
    pub left: i32,
    /// Last free column left of the right device.
    pub right: i32,
}

impl Corridor {
    pub fn center_x(&self) -> i32 {
        self.top.x
    }

    pub fn contains(&self, point: GridPoint) -> bool {
        point.x >= self.left
            && point.x <= self.right
            && point.y >= self.top.y
            && point.y <= self.bottom.y
    }
}

type LaneOwners = SmallVec<[ConnectionIndex; 2]>;

#[derive(Debug, Clone, Default)]
struct CellOccupancy {
    lanes: [LaneOwners; 4],
}

#[derive(Debug, Clone)]
pub struct RoutingGrid {
    width: i32,
    height: i32,
    cell_size: f32,
    blocked: Vec<bool>,
    port_blocked: Vec<bool>,
    occupancy: HashMap<usize, CellOccupancy>,
    device_regions: Vec<GridRect>,
}

/// Cell counts for a canvas, never smaller than 1x1 and never more than
/// [`MAX_GRID_CELLS`] along one axis.
pub fn grid_dimensions(canvas_width: f32, canvas_height: f32, cell_size: f32) -> (i32, i32) {
    let cell = if cell_size.is_finite() && cell_size > 0.0 {
        cell_size
    } else {
        1.0
    };
    let cells = |extent: f32| -> i32 {
        if extent.is_finite() && extent > 0.0 {
            cell_coord((extent / cell).ceil()).clamp(1, MAX_GRID_CELLS as i32)
        } else {
            1
        }
    };
    (cells(canvas_width), cells(canvas_height))
}

/// Smallest cell size, at least `cell_size`, whose grid over the canvas
/// stays within [`MAX_GRID_CELLS`].
pub fn fit_cell_size(canvas_width: f32, canvas_height: f32, cell_size: f32) -> f32 {
    let total = |cell: f32| {
        let (width, height) = grid_dimensions(canvas_width, canvas_height, cell);
        (width as usize).saturating_mul(height as usize)
    };
    let mut cell = cell_size;
    let cells = total(cell);
    if cells <= MAX_GRID_CELLS {
        return cell;
    }
    cell *= (cells as f32 / MAX_GRID_CELLS as f32).sqrt();
    for _ in 0..64 {
        if total(cell) <= MAX_GRID_CELLS {
            break;
        }
        cell *= 1.125;
    }
    cell
}

impl RoutingGrid {
    pub fn new(width: i32, height: i32, cell_size: f32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let cell_size = if cell_size.is_finite() && cell_size > 0.0 {
            cell_size
        } else {
            1.0
        };
        let cells = (width as usize) * (height as usize);
        Self {
            width,
            height,
            cell_size,
            blocked: vec![false; cells],
            port_blocked: vec![false; cells],
            occupancy: HashMap::new(),
            device_regions: Vec::new(),
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    pub fn device_regions(&self) -> &[GridRect] {
        &self.device_regions
    }

    pub fn contains(&self, point: GridPoint) -> bool {
        point.x >= 0 && point.y >= 0 && point.x < self.width && point.y < self.height
    }

    pub(crate) fn index(&self, point: GridPoint) -> usize {
        (point.y as usize) * (self.width as usize) + point.x as usize
    }

    pub fn to_grid_point(&self, x: f32, y: f32) -> GridPoint {
        GridPoint::new(
            cell_coord((x / self.cell_size).floor()),
            cell_coord((y / self.cell_size).floor()),
        )
    }

    /// Centre of the cell, which is where routed coordinates snap to.
    pub fn to_virtual_point(&self, point: GridPoint) -> (f32, f32) {
        (
            (point.x as f32 + 0.5) * self.cell_size,
            (point.y as f32 + 0.5) * self.cell_size,
        )
    }

    pub fn clamp_point(&self, point: GridPoint) -> GridPoint {
        GridPoint::new(
            point.x.clamp(0, self.width - 1),
            point.y.clamp(0, self.height - 1),
        )
    }

    /// Cells covered by a device rectangle grown by `clearance` on all sides.
    pub fn expanded_region(&self, x: f32, y: f32, w: f32, h: f32, clearance: f32) -> GridRect {
        GridRect::covering(
            x - clearance,
            y - clearance,
            x + w + clearance,
            y + h + clearance,
            self.cell_size,
        )
    }

    pub fn mark_device_obstacle(&mut self, x: f32, y: f32, w: f32, h: f32, clearance: f32) {
        let expanded = self.expanded_region(x, y, w, h, clearance);
        if !expanded.intersects_grid(self.width, self.height) {
            return;
        }
        for iy in expanded.min_y.max(0)..=expanded.max_y.min(self.height - 1) {
            for ix in expanded.min_x.max(0)..=expanded.max_x.min(self.width - 1) {
                let idx = self.index(GridPoint::new(ix, iy));
                self.blocked[idx] = true;
            }
        }
        self.device_regions
            .push(GridRect::covering(x, y, x + w.max(0.0), y + h.max(0.0), self.cell_size));
    }

    /// Blocks the disc of cells whose centres lie within `clearance` of the
    /// point, plus the cell holding the point itself.
    pub fn mark_port_obstacle(&mut self, x: f32, y: f32, clearance: f32) {
        let center = self.to_grid_point(x, y);
        if self.contains(center) {
            let idx = self.index(center);
            self.port_blocked[idx] = true;
        }
        let reach = cell_coord((clearance / self.cell_size).ceil()).saturating_add(1);
        let disc = GridRect {
            min_x: center.x.saturating_sub(reach),
            min_y: center.y.saturating_sub(reach),
            max_x: center.x.saturating_add(reach),
            max_y: center.y.saturating_add(reach),
        };
        if !disc.intersects_grid(self.width, self.height) {
            return;
        }
        for iy in disc.min_y.max(0)..=disc.max_y.min(self.height - 1) {
            for ix in disc.min_x.max(0)..=disc.max_x.min(self.width - 1) {
                let cell = GridPoint::new(ix, iy);
                let (cx, cy) = self.to_virtual_point(cell);
                let dist = ((cx - x).powi(2) + (cy - y).powi(2)).sqrt();
                if dist <= clearance {
                    let idx = self.index(cell);
                    self.port_blocked[idx] = true;
                }
            }
        }
    }

    /// Blocks a port's lead-out lane for every connection but its own.
    pub fn mark_extension_obstacle(&mut self, lane: &[GridPoint]) {
        for &cell in lane {
            if self.contains(cell) {
                let idx = self.index(cell);
                self.port_blocked[idx] = true;
            }
        }
    }

    pub fn clear_port_obstacles(&mut self) {
        self.port_blocked.fill(false);
    }

    pub fn is_blocked(&self, point: GridPoint) -> bool {
        if !self.contains(point) {
            return true;
        }
        let idx = self.index(point);
        self.blocked[idx] || self.port_blocked[idx]
    }

    /// Blocked by a device footprint, ignoring port obstacles.
    pub fn is_device_blocked(&self, point: GridPoint) -> bool {
        !self.contains(point) || self.blocked[self.index(point)]
    }

    /// Occupancy half of [`RoutingGrid::can_occupy`]: nobody else has claimed
    /// this direction through the cell.
    pub fn is_lane_free(
        &self,
        point: GridPoint,
        connection: ConnectionIndex,
        direction: GridDirection,
    ) -> bool {
        if !self.contains(point) {
            return false;
        }
        match self.occupancy.get(&self.index(point)) {
            Some(cell) => cell.lanes[direction.index()]
                .iter()
                .all(|owner| *owner == connection),
            None => true,
        }
    }

    pub fn can_occupy(
        &self,
        point: GridPoint,
        connection: ConnectionIndex,
        direction: GridDirection,
    ) -> bool {
        !self.is_blocked(point) && self.is_lane_free(point, connection, direction)
    }

    /// Records every unit step of `path`: the travel direction at the origin
    /// cell and its opposite at the destination cell.
    pub fn occupy_path(&mut self, connection: ConnectionIndex, path: &[GridPoint]) {
        for pair in path.windows(2) {
            let (from, to) = (pair[0], pair[1]);
            if !from.is_aligned_with(to) {
                continue;
            }
            let Some(direction) = GridDirection::between(from, to) else {
                continue;
            };
            let mut cur = from;
            while cur != to {
                let next = cur.step(direction);
                self.claim(cur, connection, direction);
                self.claim(next, connection, direction.opposite());
                cur = next;
            }
        }
    }

    fn claim(&mut self, point: GridPoint, connection: ConnectionIndex, direction: GridDirection) {
        if !self.contains(point) {
            return;
        }
        let idx = self.index(point);
        let lane = &mut self.occupancy.entry(idx).or_default().lanes[direction.index()];
        if !lane.contains(&connection) {
            lane.push(connection);
        }
    }

    /// Owners of a direction through a cell, for diagnostics and tests.
    pub fn lane_owners(&self, point: GridPoint, direction: GridDirection) -> Vec<ConnectionIndex> {
        if !self.contains(point) {
            return Vec::new();
        }
        self.occupancy
            .get(&self.index(point))
            .map(|cell| cell.lanes[direction.index()].to_vec())
            .unwrap_or_default()
    }

    /// Vertical free lane between the two innermost facing device edges
    /// around `source`/`target`, if there is one.
    pub fn find_device_corridor(&self, source: GridPoint, target: GridPoint) -> Option<Corridor> {
        let min_x = source.x.min(target.x) - 1;
        let max_x = source.x.max(target.x) + 1;
        let min_y = source.y.min(target.y);
        let max_y = source.y.max(target.y);
        let relevant: Vec<&GridRect> = self
            .device_regions
            .iter()
            .filter(|region| {
                region.overlaps_rows(min_y, max_y) && region.overlaps_columns(min_x, max_x)
            })
            .collect();
        if relevant.len() < 2 {
            return None;
        }
        let leftmost_right_edge = relevant.iter().map(|region| region.max_x).min()?;
        let rightmost_left_edge = relevant.iter().map(|region| region.min_x).max()?;
        if leftmost_right_edge >= rightmost_left_edge - 1 {
            return None;
        }
        let left = leftmost_right_edge + 1;
        let right = rightmost_left_edge - 1;
        let center_x = (left + right) / 2;
        let top = relevant
            .iter()
            .map(|region| region.min_y)
            .min()
            .unwrap_or(min_y)
            .min(min_y);
        let bottom = relevant
            .iter()
            .map(|region| region.max_y)
            .max()
            .unwrap_or(max_y)
            .max(max_y);
        Some(Corridor {
            top: self.clamp_point(GridPoint::new(center_x, top)),
            bottom: self.clamp_point(GridPoint::new(center_x, bottom)),
            left,
            right,
        })
    }
}

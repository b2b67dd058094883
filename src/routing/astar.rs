use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::config::RoutingConfig;
use crate::log::debug;

use super::cleanup::{CleanupContext, PathGuard, remove_zigzags};
use super::density::PathDensityTracker;
use super::geometry::{
    count_crossings, dedup_points, expand_path, merge_collinear, segment_direction,
    segments_intersect,
};
use super::grid::{Corridor, GridDirection, GridPoint, RoutingGrid};
use super::{ConnectionIndex, ExistingPaths};

// ── A* cost scaling ─────────────────────────────────────────────────
/// Integer cost multiplier so the open set can order on u32 costs.
const ASTAR_COST_SCALE: f32 = 1000.0;

// ── Conflict costs ──────────────────────────────────────────────────
/// Crossing multiplier when the other segment is parallel, not perpendicular.
const PARALLEL_CROSSING_FACTOR: f32 = 2.0;
/// Extra crossing multiplier when the other segment runs the same way.
const SAME_DIRECTION_CROSSING_FACTOR: f32 = 10.0;
/// Repulsion boost for committed cells on the candidate's row or column.
const ALIGNED_REPULSION_FACTOR: f32 = 2.5;

// ── Search state ────────────────────────────────────────────────────
/// Direction slot of a state that has not moved yet.
const NO_DIRECTION: u8 = 4;
const DIRECTION_SLOTS: usize = 5;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct SearchState {
    x: i32,
    y: i32,
    dir: u8,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct SearchEntry {
    est: u32,
    cost: u32,
    state: SearchState,
}

impl Ord for SearchEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .est
            .cmp(&self.est)
            .then_with(|| other.cost.cmp(&self.cost))
            .then_with(|| self.state.y.cmp(&other.state.y))
            .then_with(|| self.state.x.cmp(&other.state.x))
            .then_with(|| self.state.dir.cmp(&other.state.dir))
    }
}

impl PartialOrd for SearchEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathResult {
    pub waypoints: Vec<GridPoint>,
    pub success: bool,
    /// Search cost in config units; infinite when no path was found.
    pub total_cost: f32,
    /// Segment intersections with other committed paths.
    pub crossings: usize,
}

impl PathResult {
    fn failed() -> Self {
        Self {
            waypoints: Vec::new(),
            success: false,
            total_cost: f32::INFINITY,
            crossings: 0,
        }
    }
}

/// Per-query view of the committed paths: repulsion field plus the segments
/// used for crossing costs.
struct ConflictField {
    repulsion: Vec<f32>,
    segments: Vec<Vec<(GridPoint, GridPoint, GridDirection)>>,
}

pub struct Pathfinder<'a> {
    grid: &'a RoutingGrid,
    config: &'a RoutingConfig,
    density: Option<&'a PathDensityTracker>,
    corridor: Option<Corridor>,
    start_direction: Option<GridDirection>,
    end_direction: Option<GridDirection>,
}

impl<'a> Pathfinder<'a> {
    pub fn new(grid: &'a RoutingGrid, config: &'a RoutingConfig) -> Self {
        Self {
            grid,
            config,
            density: None,
            corridor: None,
            start_direction: None,
            end_direction: None,
        }
    }

    pub fn with_density(mut self, density: &'a PathDensityTracker) -> Self {
        self.density = Some(density);
        self
    }

    pub fn with_corridor(mut self, corridor: Option<Corridor>) -> Self {
        self.corridor = corridor;
        self
    }

    /// Heading at the start cell; leaving it any other way counts as a turn.
    pub fn with_start_direction(mut self, direction: Option<GridDirection>) -> Self {
        self.start_direction = direction;
        self
    }

    /// Heading required when entering the goal cell.
    pub fn with_end_direction(mut self, direction: Option<GridDirection>) -> Self {
        self.end_direction = direction;
        self
    }

    pub fn find_path(
        &self,
        start: GridPoint,
        end: GridPoint,
        connection: ConnectionIndex,
        existing: &ExistingPaths,
        hints: &[GridPoint],
    ) -> PathResult {
        if start == end {
            return PathResult {
                waypoints: vec![start],
                success: true,
                total_cost: 0.0,
                crossings: 0,
            };
        }
        let field = self.conflict_field(connection, existing);
        let routed = if hints.is_empty() {
            None
        } else {
            self.search_via_hints(&field, start, end, connection, hints)
        };
        let Some((cells, total_cost)) = routed.or_else(|| {
            self.search(
                &field,
                start,
                end,
                connection,
                self.start_direction,
                self.end_direction,
            )
        }) else {
            return PathResult::failed();
        };
        let waypoints = self.finish_path(&cells, connection, existing);
        let crossings = count_crossings(
            &waypoints,
            existing
                .iter()
                .filter(|(id, _)| **id != connection)
                .map(|(_, path)| path.as_slice()),
        );
        PathResult {
            waypoints,
            success: true,
            total_cost,
            crossings,
        }
    }

    fn conflict_field(
        &self,
        connection: ConnectionIndex,
        existing: &ExistingPaths,
    ) -> ConflictField {
        let grid = self.grid;
        let mut repulsion = vec![0.0f32; (grid.width() as usize) * (grid.height() as usize)];
        let mut segments = Vec::new();
        let spacing = self.config.spacing_cells() as f32;
        let reach = spacing.ceil() as i32;
        let factor = self.config.path_repulsion_factor;
        for (id, path) in existing {
            if *id == connection {
                continue;
            }
            segments.push(
                path.windows(2)
                    .filter_map(|pair| {
                        let direction = segment_direction(pair[0], pair[1])?;
                        Some((pair[0], pair[1], direction))
                    })
                    .collect(),
            );
            if factor <= 0.0 {
                continue;
            }
            for cell in expand_path(path) {
                for dy in -reach..=reach {
                    for dx in -reach..=reach {
                        let near = GridPoint::new(cell.x + dx, cell.y + dy);
                        if !grid.contains(near) {
                            continue;
                        }
                        let distance = cell.euclidean_distance(near);
                        if distance >= spacing {
                            continue;
                        }
                        let mut weight = factor * (spacing - distance);
                        if near.x == cell.x || near.y == cell.y {
                            weight *= ALIGNED_REPULSION_FACTOR;
                        }
                        repulsion[grid.index(near)] += weight;
                    }
                }
            }
        }
        ConflictField {
            repulsion,
            segments,
        }
    }

    /// Worst intersection against each committed path, summed over paths.
    fn crossing_cost(
        &self,
        field: &ConflictField,
        from: GridPoint,
        to: GridPoint,
        direction: GridDirection,
    ) -> f32 {
        let penalty = self.config.crossing_penalty;
        field
            .segments
            .iter()
            .map(|path| {
                path.iter()
                    .filter(|(a, b, _)| segments_intersect(from, to, *a, *b))
                    .map(|(_, _, other)| {
                        if other.is_perpendicular_to(direction) {
                            penalty
                        } else if *other == direction {
                            penalty * (PARALLEL_CROSSING_FACTOR + SAME_DIRECTION_CROSSING_FACTOR)
                        } else {
                            penalty * PARALLEL_CROSSING_FACTOR
                        }
                    })
                    .fold(0.0, f32::max)
            })
            .sum()
    }

    fn step_cost(
        &self,
        field: &ConflictField,
        from: GridPoint,
        to: GridPoint,
        direction: GridDirection,
        incoming: Option<GridDirection>,
    ) -> f32 {
        let config = self.config;
        let mut cost = config.grid_move_cost + self.crossing_cost(field, from, to, direction);
        if incoming.is_some_and(|heading| heading != direction) {
            cost += config.turn_penalty;
        }
        cost += field.repulsion[self.grid.index(to)];
        if let Some(density) = self.density {
            cost += density.density_cost(to);
        }
        if let Some(corridor) = self.corridor {
            if corridor.contains(to) {
                cost += config.distribution_factor * (to.x - corridor.center_x()).abs() as f32;
            }
        }
        cost
    }

    /// Chains searches through the hints. Any failing leg abandons the chain.
    fn search_via_hints(
        &self,
        field: &ConflictField,
        start: GridPoint,
        end: GridPoint,
        connection: ConnectionIndex,
        hints: &[GridPoint],
    ) -> Option<(Vec<GridPoint>, f32)> {
        if hints.iter().any(|hint| self.grid.is_blocked(*hint)) {
            return None;
        }
        let mut cells = vec![start];
        let mut total = 0.0;
        let mut heading = self.start_direction;
        let legs = hints.len() + 1;
        for (leg, target) in hints.iter().copied().chain(std::iter::once(end)).enumerate() {
            let from = *cells.last()?;
            if from == target {
                continue;
            }
            let arrival = if leg + 1 == legs {
                self.end_direction
            } else {
                None
            };
            let (leg_cells, leg_cost) =
                self.search(field, from, target, connection, heading, arrival)?;
            heading = leg_cells
                .windows(2)
                .last()
                .and_then(|pair| GridDirection::between(pair[0], pair[1]));
            cells.extend(leg_cells.into_iter().skip(1));
            total += leg_cost;
        }
        Some((cells, total))
    }

    fn search(
        &self,
        field: &ConflictField,
        start: GridPoint,
        goal: GridPoint,
        connection: ConnectionIndex,
        heading: Option<GridDirection>,
        arrival: Option<GridDirection>,
    ) -> Option<(Vec<GridPoint>, f32)> {
        let grid = self.grid;
        if !grid.contains(start) || !grid.contains(goal) {
            return None;
        }
        let scale = |cost: f32| (cost * ASTAR_COST_SCALE).round() as u32;
        let move_cost = scale(self.config.grid_move_cost);
        let heuristic =
            |point: GridPoint| (point.manhattan_distance(goal) as u32).saturating_mul(move_cost);
        let state_index = |state: SearchState| {
            grid.index(GridPoint::new(state.x, state.y)) * DIRECTION_SLOTS + state.dir as usize
        };

        let states = (grid.width() as usize) * (grid.height() as usize) * DIRECTION_SLOTS;
        let mut best_cost = vec![u32::MAX; states];
        let mut prev: Vec<Option<SearchState>> = vec![None; states];
        let mut heap = BinaryHeap::new();

        let origin = SearchState {
            x: start.x,
            y: start.y,
            dir: heading.map_or(NO_DIRECTION, |direction| direction.index() as u8),
        };
        best_cost[state_index(origin)] = 0;
        heap.push(SearchEntry {
            est: heuristic(start),
            cost: 0,
            state: origin,
        });

        let max_iterations = self.config.max_pathfinding_iterations.max(1);
        let mut iterations = 0usize;
        let mut end_state: Option<(SearchState, u32)> = None;

        while let Some(entry) = heap.pop() {
            iterations += 1;
            if iterations > max_iterations {
                debug!(
                    connection,
                    max_iterations, "pathfinding iteration cap reached"
                );
                break;
            }
            let SearchEntry { cost, state, .. } = entry;
            if cost != best_cost[state_index(state)] {
                continue;
            }
            let here = GridPoint::new(state.x, state.y);
            if here == goal {
                end_state = Some((state, cost));
                break;
            }
            let incoming = GridDirection::ALL.get(state.dir as usize).copied();
            for direction in GridDirection::ALL {
                if incoming == Some(direction.opposite()) {
                    continue;
                }
                let next = here.step(direction);
                if !grid.contains(next) || (next != goal && grid.is_blocked(next)) {
                    continue;
                }
                if !grid.is_lane_free(here, connection, direction)
                    || !grid.is_lane_free(next, connection, direction.opposite())
                {
                    continue;
                }
                let mut step = self.step_cost(field, here, next, direction, incoming);
                if next == goal && arrival.is_some_and(|required| required != direction) {
                    step += self.config.turn_penalty;
                }
                let next_cost = cost.saturating_add(scale(step));
                let next_state = SearchState {
                    x: next.x,
                    y: next.y,
                    dir: direction.index() as u8,
                };
                let next_idx = state_index(next_state);
                if next_cost >= best_cost[next_idx] {
                    continue;
                }
                best_cost[next_idx] = next_cost;
                prev[next_idx] = Some(state);
                heap.push(SearchEntry {
                    est: next_cost.saturating_add(heuristic(next)),
                    cost: next_cost,
                    state: next_state,
                });
            }
        }

        let (end_state, cost) = end_state?;
        let mut cells: Vec<GridPoint> = Vec::new();
        let mut cur = Some(end_state);
        while let Some(state) = cur {
            cells.push(GridPoint::new(state.x, state.y));
            cur = prev[state_index(state)];
        }
        cells.reverse();
        Some((cells, cost as f32 / ASTAR_COST_SCALE))
    }

    fn finish_path(
        &self,
        cells: &[GridPoint],
        connection: ConnectionIndex,
        existing: &ExistingPaths,
    ) -> Vec<GridPoint> {
        let mut path = dedup_points(cells);
        if self.config.simplify_path {
            path = merge_collinear(&path);
        }
        if self.config.remove_zigzags && path.len() >= 4 {
            let start = path[0];
            let end = path[path.len() - 1];
            let ctx = CleanupContext {
                guard: PathGuard::new(self.grid, connection).with_endpoints(start, end),
                existing,
                spacing: self.config.spacing_cells(),
                corridor_center: self.corridor.map(|corridor| corridor.center_x()),
                entry: self.start_direction,
                exit: self.end_direction,
                remove_zigzags: true,
                simplify: self.config.simplify_path,
            };
            path = remove_zigzags(&path, &ctx);
        }
        path
    }
}

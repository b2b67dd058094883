//! Orthogonal connector routing between device ports.
//!
//! A run builds a [`RoutingGrid`] and a [`PathDensityTracker`] from the
//! devices, resolves every port and its lead-out lane, orders the
//! connections, then for each one searches with [`Pathfinder`], cleans the
//! result and commits it so later connections route around it.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::config::RoutingConfig;
use crate::ir::{CanvasSize, Connection, Device};
use crate::log::{debug, warn};

pub mod astar;
pub mod cache;
pub mod cleanup;
pub mod density;
pub(crate) mod geometry;
pub mod grid;
pub mod ports;

pub use astar::{PathResult, Pathfinder};
pub use cache::{CacheKey, RouteCache};
pub use cleanup::{CleanupContext, PathGuard, clean_path};
pub use density::PathDensityTracker;
pub use grid::{
    Corridor, GridDirection, GridPoint, GridRect, MAX_GRID_CELLS, RoutingGrid, fit_cell_size,
    grid_dimensions,
};
pub use ports::{PortKey, ResolvedPort};

use geometry::{compress_virtual, count_crossings, dedup_points, merge_collinear};
use ports::{device_footprint, resolve_ports};

/// Dense per-run connection index: the connection's position in the input.
pub type ConnectionIndex = usize;

/// Committed grid paths, keyed by connection.
pub type ExistingPaths = BTreeMap<ConnectionIndex, Vec<GridPoint>>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutedConnection {
    pub connection_id: String,
    /// Grid cells, port cell to port cell.
    pub waypoints: Vec<GridPoint>,
    /// Continuous points to draw, port to port.
    pub virtual_waypoints: Vec<(f32, f32)>,
    pub success: bool,
    pub crossings: usize,
}

impl RoutedConnection {
    fn failed(
        connection: &Connection,
        waypoints: Vec<GridPoint>,
        virtual_waypoints: Vec<(f32, f32)>,
    ) -> Self {
        Self {
            connection_id: connection.id.clone(),
            waypoints,
            virtual_waypoints,
            success: false,
            crossings: 0,
        }
    }
}

/// Routes every connection and returns one result per input connection, in
/// input order.
pub fn route_connections(
    devices: &[Device],
    connections: &[Connection],
    canvas: CanvasSize,
    config: &RoutingConfig,
) -> Vec<RoutedConnection> {
    let mut config = config.sanitized();
    let cell_size = fit_cell_size(canvas.width, canvas.height, config.grid_cell_size);
    if cell_size != config.grid_cell_size {
        debug!(
            requested = config.grid_cell_size,
            cell_size, "canvas too large for the grid, coarsening cells"
        );
        config.grid_cell_size = cell_size;
    }
    let mut session = RoutingSession::new(devices, canvas, &config);
    session.route_all(connections)
}

/// Owns a routing configuration and the single-entry result cache.
#[derive(Debug, Clone, Default)]
pub struct Router {
    config: RoutingConfig,
    cache: RouteCache,
}

impl Router {
    pub fn new(config: RoutingConfig) -> Self {
        Self {
            config,
            cache: RouteCache::default(),
        }
    }

    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: RoutingConfig) {
        self.config = config;
        self.cache.invalidate();
    }

    pub fn route(
        &mut self,
        devices: &[Device],
        connections: &[Connection],
        canvas: CanvasSize,
    ) -> Vec<RoutedConnection> {
        if !self.config.enable_caching {
            return route_connections(devices, connections, canvas, &self.config);
        }
        let key = CacheKey::new(devices, connections, canvas, &self.config);
        if let Some(cached) = self.cache.get(&key) {
            debug!(connections = connections.len(), "routing cache hit");
            return cached.to_vec();
        }
        let routed = route_connections(devices, connections, canvas, &self.config);
        self.cache.store(key, routed.clone());
        routed
    }

    /// Must be called whenever a device or connection changes in a way the
    /// caller does not pass back through [`Router::route`].
    pub fn invalidate_cache(&mut self) {
        self.cache.invalidate();
    }
}

#[derive(Debug, Clone, Copy)]
struct Endpoints {
    index: ConnectionIndex,
    source: PortKey,
    target: PortKey,
    distance: f32,
}

impl Endpoints {
    /// Connections between the same unordered device pair share a group.
    fn group_key(&self) -> (usize, usize) {
        let (a, b) = (self.source.0, self.target.0);
        (a.min(b), a.max(b))
    }
}

#[derive(Debug, Clone, Copy)]
struct PlannedRoute {
    endpoints: Endpoints,
    corridor: Option<Corridor>,
    hint: Option<GridPoint>,
}

/// Offsets 0, +s, -s, +2s, -2s, ... for successive members of a group.
fn alternating_offset(slot: usize, spacing: i32) -> i32 {
    let magnitude = ((slot + 1) / 2) as i32 * spacing;
    if slot % 2 == 1 { magnitude } else { -magnitude }
}

struct RoutingSession<'a> {
    config: &'a RoutingConfig,
    devices: &'a [Device],
    device_lookup: HashMap<&'a str, usize>,
    grid: RoutingGrid,
    density: PathDensityTracker,
    ports: BTreeMap<PortKey, ResolvedPort>,
    existing: ExistingPaths,
}

impl<'a> RoutingSession<'a> {
    fn new(devices: &'a [Device], canvas: CanvasSize, config: &'a RoutingConfig) -> Self {
        let (width, height) = grid_dimensions(canvas.width, canvas.height, config.grid_cell_size);
        let mut grid = RoutingGrid::new(width, height, config.grid_cell_size);
        let mut density = PathDensityTracker::new(width, height, config);
        let mut device_lookup = HashMap::new();
        for (index, device) in devices.iter().enumerate() {
            let (x, y, w, h) = device_footprint(device, config);
            grid.mark_device_obstacle(x, y, w, h, config.device_clearance);
            density.register_device(device, grid.cell_size());
            device_lookup.entry(device.id.as_str()).or_insert(index);
        }
        let ports = resolve_ports(devices, &grid, config);
        debug!(
            width,
            height,
            devices = devices.len(),
            ports = ports.len(),
            "routing grid ready"
        );
        Self {
            config,
            devices,
            device_lookup,
            grid,
            density,
            ports,
            existing: ExistingPaths::new(),
        }
    }

    fn port_key(&self, device_id: &str, port_id: &str) -> Option<PortKey> {
        let device_index = *self.device_lookup.get(device_id)?;
        let port_index = self.devices[device_index]
            .ports
            .iter()
            .position(|port| port.id == port_id)?;
        Some((device_index, port_index))
    }

    fn resolved(&self, device_id: &str, port_id: &str) -> Option<&ResolvedPort> {
        self.ports.get(&self.port_key(device_id, port_id)?)
    }

    fn route_all(&mut self, connections: &[Connection]) -> Vec<RoutedConnection> {
        let mut results: Vec<Option<RoutedConnection>> = vec![None; connections.len()];
        let mut routable = Vec::new();
        for (index, connection) in connections.iter().enumerate() {
            if !connection.routing_points.is_empty() {
                results[index] = Some(self.pass_through(connection));
                continue;
            }
            let source = self.port_key(&connection.source_device, &connection.source_port);
            let target = self.port_key(&connection.target_device, &connection.target_port);
            match (source, target) {
                (Some(source), Some(target)) => {
                    let distance = match (self.ports.get(&source), self.ports.get(&target)) {
                        (Some(a), Some(b)) => {
                            (a.position.0 - b.position.0).hypot(a.position.1 - b.position.1)
                        }
                        _ => f32::INFINITY,
                    };
                    routable.push(Endpoints {
                        index,
                        source,
                        target,
                        distance,
                    });
                }
                _ => {
                    warn!(
                        connection = %connection.id,
                        "connection references an unknown device or port"
                    );
                    results[index] = Some(self.unresolved(connection));
                }
            }
        }

        for planned in self.plan(&routable) {
            let index = planned.endpoints.index;
            results[index] = Some(self.route_one(&connections[index], &planned));
        }
        results.into_iter().flatten().collect()
    }

    /// Shortest connections first. With corridor grouping, whole device-pair
    /// groups are routed together and members get alternating hints.
    fn plan(&self, routable: &[Endpoints]) -> Vec<PlannedRoute> {
        let mut ordered = routable.to_vec();
        ordered.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.index.cmp(&b.index)));
        if !self.config.group_shared_corridors {
            return ordered
                .into_iter()
                .map(|endpoints| PlannedRoute {
                    endpoints,
                    corridor: self.corridor_for(&endpoints),
                    hint: None,
                })
                .collect();
        }

        let mut groups: Vec<((usize, usize), Vec<Endpoints>)> = Vec::new();
        for endpoints in ordered {
            let key = endpoints.group_key();
            match groups.iter_mut().find(|(group, _)| *group == key) {
                Some((_, members)) => members.push(endpoints),
                None => groups.push((key, vec![endpoints])),
            }
        }

        let spacing = self.config.spacing_cells();
        let mut plan = Vec::with_capacity(routable.len());
        for (_, members) in groups {
            let shared = members.len() >= 2;
            for (slot, endpoints) in members.into_iter().enumerate() {
                let corridor = self.corridor_for(&endpoints);
                let hint = if shared {
                    self.distribution_hint(&endpoints, corridor, alternating_offset(slot, spacing))
                } else {
                    None
                };
                plan.push(PlannedRoute {
                    endpoints,
                    corridor,
                    hint,
                });
            }
        }
        plan
    }

    fn corridor_for(&self, endpoints: &Endpoints) -> Option<Corridor> {
        let source = self.ports.get(&endpoints.source)?;
        let target = self.ports.get(&endpoints.target)?;
        self.grid.find_device_corridor(source.cell, target.cell)
    }

    /// Corridor centre shifted by `offset`, halfway between the lead-outs.
    fn distribution_hint(
        &self,
        endpoints: &Endpoints,
        corridor: Option<Corridor>,
        offset: i32,
    ) -> Option<GridPoint> {
        let source = self.ports.get(&endpoints.source)?;
        let target = self.ports.get(&endpoints.target)?;
        let center_x = match corridor {
            Some(corridor) => corridor.center_x(),
            None => self.density.device_pathway_center(source.cell, target.cell)?.x,
        };
        let mid_y = (source.lead_out().y + target.lead_out().y) / 2;
        Some(self.grid.clamp_point(GridPoint::new(center_x + offset, mid_y)))
    }

    /// Blocks every port other than this connection's two, plus the lead-out
    /// lanes of those sitting on the grid.
    fn prepare_port_obstacles(&mut self, source: PortKey, target: PortKey) {
        self.grid.clear_port_obstacles();
        for (key, port) in &self.ports {
            if *key == source || *key == target {
                continue;
            }
            let (x, y) = port.position;
            self.grid.mark_port_obstacle(x, y, self.config.port_clearance);
            let raw = self.grid.to_grid_point(x, y);
            let on_grid = self.grid.clamp_point(raw).manhattan_distance(raw) <= 1;
            if on_grid && self.config.port_extension_obstacles {
                self.grid.mark_extension_obstacle(std::slice::from_ref(&port.cell));
                self.grid.mark_extension_obstacle(&port.lane);
            }
        }
    }

    fn route_one(&mut self, connection: &Connection, planned: &PlannedRoute) -> RoutedConnection {
        let endpoints = planned.endpoints;
        let (Some(source), Some(target)) = (
            self.ports.get(&endpoints.source).cloned(),
            self.ports.get(&endpoints.target).cloned(),
        ) else {
            return self.unresolved(connection);
        };
        self.prepare_port_obstacles(endpoints.source, endpoints.target);

        let start = source.lead_out();
        let end = target.lead_out();
        let entry = source.facing();
        let exit = target.facing().opposite();
        let hints: Vec<GridPoint> = planned.hint.into_iter().collect();
        let result = Pathfinder::new(&self.grid, self.config)
            .with_density(&self.density)
            .with_corridor(planned.corridor)
            .with_start_direction(Some(entry))
            .with_end_direction(Some(exit))
            .find_path(start, end, endpoints.index, &self.existing, &hints);
        if !result.success {
            debug!(connection = %connection.id, "no path found, falling back to a straight line");
            return RoutedConnection::failed(
                connection,
                vec![source.cell, target.cell],
                vec![source.position, target.position],
            );
        }

        let ctx = CleanupContext {
            guard: PathGuard::new(&self.grid, endpoints.index).with_endpoints(start, end),
            existing: &self.existing,
            spacing: self.config.spacing_cells(),
            corridor_center: planned.corridor.map(|corridor| corridor.center_x()),
            entry: Some(entry),
            exit: Some(exit),
            remove_zigzags: self.config.remove_zigzags,
            simplify: self.config.simplify_path,
        };
        let interior = clean_path(&result.waypoints, &ctx);

        let mut full = Vec::with_capacity(interior.len() + 2);
        full.push(source.cell);
        full.extend(interior);
        full.push(target.cell);
        let full = if self.config.simplify_path {
            merge_collinear(&full)
        } else {
            dedup_points(&full)
        };
        let crossings = count_crossings(&full, self.existing.values().map(Vec::as_slice));

        let mut points = Vec::with_capacity(full.len() + 2);
        points.push(source.snapped_position(&self.grid));
        points.extend(full.iter().map(|cell| self.grid.to_virtual_point(*cell)));
        points.push(target.snapped_position(&self.grid));
        let virtual_waypoints = compress_virtual(&points);

        self.grid.occupy_path(endpoints.index, &full);
        self.density.record_path(&full);
        self.existing.insert(endpoints.index, full.clone());
        debug!(
            connection = %connection.id,
            waypoints = full.len(),
            crossings,
            cost = result.total_cost,
            "connection routed"
        );

        RoutedConnection {
            connection_id: connection.id.clone(),
            waypoints: full,
            virtual_waypoints,
            success: true,
            crossings,
        }
    }

    /// Manual routing points are drawn as given, between the raw ports.
    fn pass_through(&self, connection: &Connection) -> RoutedConnection {
        let source = self.resolved(&connection.source_device, &connection.source_port);
        let target = self.resolved(&connection.target_device, &connection.target_port);
        let (Some(source), Some(target)) = (source, target) else {
            warn!(
                connection = %connection.id,
                "manual route references an unknown device or port"
            );
            return self.unresolved(connection);
        };
        let mut virtual_waypoints = Vec::with_capacity(connection.routing_points.len() + 2);
        virtual_waypoints.push(source.position);
        virtual_waypoints.extend(connection.routing_points.iter().copied());
        virtual_waypoints.push(target.position);
        let waypoints = virtual_waypoints
            .iter()
            .map(|(x, y)| self.grid.clamp_point(self.grid.to_grid_point(*x, *y)))
            .collect();
        debug!(connection = %connection.id, "manual route passed through");
        RoutedConnection {
            connection_id: connection.id.clone(),
            waypoints,
            virtual_waypoints,
            success: true,
            crossings: 0,
        }
    }

    /// Failed result carrying whichever endpoints did resolve.
    fn unresolved(&self, connection: &Connection) -> RoutedConnection {
        let ends = [
            self.resolved(&connection.source_device, &connection.source_port),
            self.resolved(&connection.target_device, &connection.target_port),
        ];
        let resolved: Vec<&ResolvedPort> = ends.into_iter().flatten().collect();
        RoutedConnection::failed(
            connection,
            resolved.iter().map(|port| port.cell).collect(),
            resolved.iter().map(|port| port.position).collect(),
        )
    }
}

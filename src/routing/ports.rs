use std::collections::{BTreeMap, HashSet};

use crate::config::RoutingConfig;
use crate::ir::{Device, PortSide};

use super::grid::{GridDirection, GridPoint, GridRect, RoutingGrid};

/// `(device index, port index)` into the device list of a routing run.
pub type PortKey = (usize, usize);

pub fn side_direction(side: PortSide) -> GridDirection {
    match side {
        PortSide::Top => GridDirection::North,
        PortSide::Bottom => GridDirection::South,
        PortSide::Left => GridDirection::West,
        PortSide::Right => GridDirection::East,
    }
}

/// Device rectangle used for obstacles: the raw rectangle, or with
/// `device_snap_to_grid` the smallest whole-cell rectangle around it.
pub fn device_footprint(device: &Device, config: &RoutingConfig) -> (f32, f32, f32, f32) {
    let width = device.width.max(0.0);
    let height = device.height.max(0.0);
    if !config.device_snap_to_grid {
        return (device.x, device.y, width, height);
    }
    let cell = config.grid_cell_size;
    let x0 = (device.x / cell).floor() * cell;
    let y0 = (device.y / cell).floor() * cell;
    let x1 = ((device.x + width) / cell).ceil() * cell;
    let y1 = ((device.y + height) / cell).ceil() * cell;
    (x0, y0, x1 - x0, y1 - y0)
}

/// A port placed on the grid together with its fixed lead-out lane.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPort {
    pub device: usize,
    /// Raw continuous position on the device outline.
    pub position: (f32, f32),
    pub side: PortSide,
    /// First cell outside the device body.
    pub cell: GridPoint,
    /// Cells walked outward from `cell`, nearest first.
    pub lane: Vec<GridPoint>,
}

impl ResolvedPort {
    pub fn facing(&self) -> GridDirection {
        side_direction(self.side)
    }

    /// Where free routing starts or ends.
    pub fn lead_out(&self) -> GridPoint {
        self.lane.last().copied().unwrap_or(self.cell)
    }

    /// Port position moved along its side onto the port cell's centre line,
    /// so the segment into the port cell is axis-aligned.
    pub fn snapped_position(&self, grid: &RoutingGrid) -> (f32, f32) {
        let (cx, cy) = grid.to_virtual_point(self.cell);
        if self.side.is_horizontal_exit() {
            (self.position.0, cy)
        } else {
            (cx, self.position.1)
        }
    }
}

/// Resolves every port of every device, in device then port order. Lanes
/// are pairwise disjoint: a lane stops before a cell an earlier port already
/// holds and before any cell blocked by another device's clearance zone.
/// Device obstacles must already be marked on `grid`.
pub fn resolve_ports(
    devices: &[Device],
    grid: &RoutingGrid,
    config: &RoutingConfig,
) -> BTreeMap<PortKey, ResolvedPort> {
    let extension = config.extension_cells();
    let mut claimed: HashSet<GridPoint> = HashSet::new();
    let mut ports = BTreeMap::new();
    for (device_index, device) in devices.iter().enumerate() {
        let (x, y, w, h) = device_footprint(device, config);
        let body = GridRect::covering(x, y, x + w, y + h, grid.cell_size());
        let zone = grid.expanded_region(x, y, w, h, config.device_clearance);
        for (port_index, port) in device.ports.iter().enumerate() {
            let position = device.port_position(port);
            let facing = side_direction(port.side);
            let cell = port_cell(grid, &body, position, facing);
            claimed.insert(cell);
            let lane = lead_out_lane(grid, cell, facing, extension, &zone, &claimed);
            claimed.extend(lane.iter().copied());
            ports.insert(
                (device_index, port_index),
                ResolvedPort {
                    device: device_index,
                    position,
                    side: port.side,
                    cell,
                    lane,
                },
            );
        }
    }
    ports
}

/// Cell holding the port, pushed outward while it still lies in the body.
fn port_cell(
    grid: &RoutingGrid,
    body: &GridRect,
    position: (f32, f32),
    facing: GridDirection,
) -> GridPoint {
    let mut cell = grid.clamp_point(grid.to_grid_point(position.0, position.1));
    let limit = (body.max_x - body.min_x).max(body.max_y - body.min_y) + 1;
    for _ in 0..=limit {
        if !body.contains(cell) {
            break;
        }
        let next = grid.clamp_point(cell.step(facing));
        if next == cell {
            break;
        }
        cell = next;
    }
    cell
}

fn lead_out_lane(
    grid: &RoutingGrid,
    cell: GridPoint,
    facing: GridDirection,
    extension: i32,
    own_zone: &GridRect,
    claimed: &HashSet<GridPoint>,
) -> Vec<GridPoint> {
    let mut lane = Vec::with_capacity(extension.max(0) as usize);
    let mut cur = cell;
    for _ in 0..extension {
        let next = cur.step(facing);
        if !grid.contains(next) || claimed.contains(&next) {
            break;
        }
        if grid.is_device_blocked(next) && !own_zone.contains(next) {
            break;
        }
        lane.push(next);
        cur = next;
    }
    lane
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::PortOffset;

    fn grid_with(devices: &[Device], config: &RoutingConfig) -> RoutingGrid {
        let mut grid = RoutingGrid::new(80, 40, config.grid_cell_size);
        for device in devices {
            let (x, y, w, h) = device_footprint(device, config);
            grid.mark_device_obstacle(x, y, w, h, config.device_clearance);
        }
        grid
    }

    #[test]
    fn ports_step_out_of_the_body_and_extend() {
        let config = RoutingConfig::default();
        let devices = vec![
            Device::new("a", 100.0, 100.0, 100.0, 100.0).with_port(
                "out",
                PortSide::Right,
                PortOffset::Fraction(0.2),
            ),
            Device::new("b", 500.0, 200.0, 100.0, 100.0).with_port(
                "in",
                PortSide::Left,
                PortOffset::Fraction(0.2),
            ),
        ];
        let grid = grid_with(&devices, &config);
        let ports = resolve_ports(&devices, &grid, &config);

        let out = &ports[&(0, 0)];
        assert_eq!(out.cell, GridPoint::new(20, 12));
        assert_eq!(out.lane.len(), 7);
        assert_eq!(out.lead_out(), GridPoint::new(27, 12));
        assert_eq!(out.snapped_position(&grid), (200.0, 125.0));

        let input = &ports[&(1, 0)];
        assert_eq!(input.cell, GridPoint::new(49, 22));
        assert_eq!(input.lead_out(), GridPoint::new(42, 22));
        assert_eq!(input.facing(), GridDirection::West);
        assert_eq!(input.snapped_position(&grid), (500.0, 225.0));
    }

    #[test]
    fn lane_stops_before_foreign_device() {
        let config = RoutingConfig::default();
        let devices = vec![
            Device::new("a", 100.0, 100.0, 100.0, 100.0).with_port(
                "out",
                PortSide::Right,
                PortOffset::Fraction(0.2),
            ),
            Device::new("c", 240.0, 100.0, 20.0, 40.0),
        ];
        let grid = grid_with(&devices, &config);
        let ports = resolve_ports(&devices, &grid, &config);
        let out = &ports[&(0, 0)];
        assert_eq!(out.lane, vec![GridPoint::new(21, 12), GridPoint::new(22, 12)]);
        assert_eq!(out.lead_out(), GridPoint::new(22, 12));
    }

    #[test]
    fn lanes_never_share_cells() {
        let config = RoutingConfig::default();
        let devices = vec![
            Device::new("a", 100.0, 100.0, 100.0, 100.0)
                .with_port("p1", PortSide::Right, PortOffset::Absolute(50.0))
                .with_port("p2", PortSide::Right, PortOffset::Absolute(52.0)),
        ];
        let grid = grid_with(&devices, &config);
        let ports = resolve_ports(&devices, &grid, &config);
        assert_eq!(ports[&(0, 0)].lane.len(), 7);
        assert!(ports[&(0, 1)].lane.is_empty());
        assert_eq!(ports[&(0, 1)].lead_out(), ports[&(0, 1)].cell);
    }

    #[test]
    fn snapping_grows_footprint_to_whole_cells() {
        let config = RoutingConfig::default();
        let device = Device::new("d", 103.0, 98.0, 45.0, 50.0);
        assert_eq!(device_footprint(&device, &config), (100.0, 90.0, 50.0, 60.0));
        let raw = RoutingConfig {
            device_snap_to_grid: false,
            ..RoutingConfig::default()
        };
        assert_eq!(device_footprint(&device, &raw), (103.0, 98.0, 45.0, 50.0));
    }
}

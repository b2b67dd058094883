use std::collections::HashMap;

use ortho_router::routing::{
    CleanupContext, ExistingPaths, GridPoint, PathGuard, RoutingGrid, clean_path,
};
use ortho_router::{
    CanvasSize, Connection, Device, Diagram, PortOffset, PortSide, RoutedConnection, Router,
    RoutingConfig, route_connections,
};

fn canvas() -> CanvasSize {
    CanvasSize::new(800.0, 400.0)
}

/// Device `a` at (100,100) with right-side ports and device `b` with
/// left-side ports at the same fractions, `b` placed at `b_y`.
fn facing_pair(fractions: &[f32], b_y: f32) -> Vec<Device> {
    let mut a = Device::new("a", 100.0, 100.0, 100.0, 100.0);
    let mut b = Device::new("b", 500.0, b_y, 100.0, 100.0);
    for (idx, fraction) in fractions.iter().enumerate() {
        a = a.with_port(&format!("o{idx}"), PortSide::Right, PortOffset::Fraction(*fraction));
        b = b.with_port(&format!("i{idx}"), PortSide::Left, PortOffset::Fraction(*fraction));
    }
    vec![a, b]
}

fn pair_links(count: usize) -> Vec<Connection> {
    (0..count)
        .map(|idx| {
            Connection::new(
                &format!("c{idx}"),
                ("a", format!("o{idx}").as_str()),
                ("b", format!("i{idx}").as_str()),
            )
        })
        .collect()
}

fn assert_orthogonal(route: &RoutedConnection) {
    for pair in route.virtual_waypoints.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        assert!(
            (a.0 - b.0).abs() < 1e-3 || (a.1 - b.1).abs() < 1e-3,
            "{}: diagonal segment {a:?} -> {b:?}",
            route.connection_id
        );
    }
    for pair in route.waypoints.windows(2) {
        assert!(
            pair[0].x == pair[1].x || pair[0].y == pair[1].y,
            "{}: diagonal grid segment",
            route.connection_id
        );
    }
}

/// Every unit move claims its direction at the origin cell and the opposite
/// direction at the destination cell.
fn directional_claims(path: &[GridPoint]) -> Vec<(i32, i32, i32, i32)> {
    let mut claims = Vec::new();
    for pair in path.windows(2) {
        let (mut cur, end) = (pair[0], pair[1]);
        let dx = (end.x - cur.x).signum();
        let dy = (end.y - cur.y).signum();
        while cur != end {
            let next = GridPoint::new(cur.x + dx, cur.y + dy);
            claims.push((cur.x, cur.y, dx, dy));
            claims.push((next.x, next.y, -dx, -dy));
            cur = next;
        }
    }
    claims
}

fn assert_no_shared_lanes(routes: &[RoutedConnection]) {
    let mut owners: HashMap<(i32, i32, i32, i32), &str> = HashMap::new();
    for route in routes.iter().filter(|route| route.success) {
        let mut claims = directional_claims(&route.waypoints);
        claims.sort_unstable();
        claims.dedup();
        for claim in claims {
            if let Some(owner) = owners.insert(claim, &route.connection_id) {
                panic!(
                    "{} and {} both run through cell ({}, {}) heading ({}, {})",
                    owner, route.connection_id, claim.0, claim.1, claim.2, claim.3
                );
            }
        }
    }
}

/// Interior corners must stay out of every device's clearance zone.
fn assert_avoids_devices(routes: &[RoutedConnection], devices: &[Device], config: &RoutingConfig) {
    let clearance = config.device_clearance;
    for route in routes.iter().filter(|route| route.success) {
        let corners = &route.virtual_waypoints[1..route.virtual_waypoints.len() - 1];
        for &(x, y) in corners {
            for device in devices {
                let inside = x > device.x - clearance
                    && x < device.x + device.width + clearance
                    && y > device.y - clearance
                    && y < device.y + device.height + clearance;
                let on_own_port = device
                    .ports
                    .iter()
                    .any(|port| device.port_position(port) == (x, y));
                assert!(
                    !inside || on_own_port,
                    "{} turns at ({x}, {y}) inside {}",
                    route.connection_id,
                    device.id
                );
            }
        }
    }
}

fn segment_enters_rect(a: (f32, f32), b: (f32, f32), rect: (f32, f32, f32, f32)) -> bool {
    let (x0, y0, x1, y1) = rect;
    let (lo_x, hi_x) = (a.0.min(b.0), a.0.max(b.0));
    let (lo_y, hi_y) = (a.1.min(b.1), a.1.max(b.1));
    lo_x < x1 && hi_x > x0 && lo_y < y1 && hi_y > y0
}

fn vertical_columns(path: &[GridPoint]) -> Vec<i32> {
    path.windows(2)
        .filter(|pair| pair[0].x == pair[1].x && pair[0].y != pair[1].y)
        .map(|pair| pair[0].x)
        .collect()
}

#[test]
fn aligned_ports_route_straight() {
    let devices = vec![
        Device::new("a", 100.0, 100.0, 100.0, 100.0)
            .with_port("o0", PortSide::Right, PortOffset::Fraction(0.5)),
        Device::new("b", 500.0, 100.0, 100.0, 100.0)
            .with_port("i0", PortSide::Left, PortOffset::Fraction(0.5)),
    ];
    let routes = route_connections(&devices, &pair_links(1), canvas(), &RoutingConfig::default());

    assert_eq!(routes.len(), 1);
    let route = &routes[0];
    assert!(route.success);
    assert_eq!(route.crossings, 0);
    assert_eq!(route.waypoints, vec![GridPoint::new(20, 15), GridPoint::new(49, 15)]);
    assert_eq!(route.virtual_waypoints, vec![(200.0, 155.0), (500.0, 155.0)]);
}

#[test]
fn parallel_links_spread_around_the_corridor() {
    let devices = facing_pair(&[0.2, 0.5, 0.8], 200.0);
    let connections = pair_links(3);
    let config = RoutingConfig::default();
    let routes = route_connections(&devices, &connections, canvas(), &config);

    assert_eq!(routes.len(), 3);
    for route in &routes {
        assert!(route.success, "{} failed", route.connection_id);
        assert_orthogonal(route);
    }
    assert_ne!(routes[0].waypoints, routes[1].waypoints);
    assert_ne!(routes[1].waypoints, routes[2].waypoints);
    assert_ne!(routes[0].waypoints, routes[2].waypoints);
    assert_no_shared_lanes(&routes);
    assert_avoids_devices(&routes, &devices, &config);

    // The free gap between the devices spans columns 20..=49.
    let center = 34;
    let columns: Vec<i32> = routes
        .iter()
        .flat_map(|route| vertical_columns(&route.waypoints))
        .collect();
    assert!(columns.iter().any(|x| *x < center), "columns {columns:?}");
    assert!(columns.iter().any(|x| *x > center), "columns {columns:?}");
}

#[test]
fn detours_around_a_blocking_device() {
    let devices = vec![
        Device::new("a", 100.0, 100.0, 100.0, 100.0)
            .with_port("o0", PortSide::Right, PortOffset::Fraction(0.5)),
        Device::new("b", 500.0, 100.0, 100.0, 100.0)
            .with_port("i0", PortSide::Left, PortOffset::Fraction(0.5)),
        Device::new("wall", 300.0, 120.0, 60.0, 60.0),
    ];
    let config = RoutingConfig::default();
    let routes = route_connections(&devices, &pair_links(1), canvas(), &config);

    let route = &routes[0];
    assert!(route.success);
    assert!(route.waypoints.len() > 2);
    assert_orthogonal(route);
    let zone = (290.0, 110.0, 370.0, 190.0);
    for pair in route.virtual_waypoints.windows(2) {
        assert!(
            !segment_enters_rect(pair[0], pair[1], zone),
            "segment {:?} -> {:?} cuts through the wall",
            pair[0],
            pair[1]
        );
    }
    assert_avoids_devices(&routes, &devices, &config);
}

#[test]
fn exhausted_search_falls_back_to_raw_ports() {
    let devices = vec![
        Device::new("a", 100.0, 100.0, 100.0, 100.0)
            .with_port("o0", PortSide::Right, PortOffset::Fraction(0.5)),
        Device::new("b", 500.0, 100.0, 100.0, 100.0)
            .with_port("i0", PortSide::Left, PortOffset::Fraction(0.5)),
    ];
    let config = RoutingConfig {
        max_pathfinding_iterations: 5,
        ..RoutingConfig::default()
    };
    let routes = route_connections(&devices, &pair_links(1), canvas(), &config);

    let route = &routes[0];
    assert!(!route.success);
    assert_eq!(route.virtual_waypoints, vec![(200.0, 150.0), (500.0, 150.0)]);
    assert_eq!(route.waypoints, vec![GridPoint::new(20, 15), GridPoint::new(49, 15)]);
}

#[test]
fn manual_points_pass_through_untouched() {
    let devices = facing_pair(&[0.5], 200.0);
    let connections = vec![
        Connection::new("manual", ("a", "o0"), ("b", "i0"))
            .with_routing_points(vec![(300.0, 150.0), (300.0, 250.0)]),
    ];
    let routes = route_connections(&devices, &connections, canvas(), &RoutingConfig::default());

    let route = &routes[0];
    assert!(route.success);
    assert_eq!(
        route.virtual_waypoints,
        vec![(200.0, 150.0), (300.0, 150.0), (300.0, 250.0), (500.0, 250.0)]
    );
    assert_eq!(route.waypoints.len(), 4);
    assert_eq!(route.waypoints[1], GridPoint::new(30, 15));
}

#[test]
fn unknown_endpoints_fail_without_points() {
    let devices = facing_pair(&[0.5], 200.0);
    let connections = vec![Connection::new("ghost", ("x", "o0"), ("y", "i0"))];
    let routes = route_connections(&devices, &connections, canvas(), &RoutingConfig::default());
    assert_eq!(routes.len(), 1);
    assert!(!routes[0].success);
    assert!(routes[0].virtual_waypoints.is_empty());
    assert!(routes[0].waypoints.is_empty());
}

#[test]
fn results_keep_input_order() {
    let devices = facing_pair(&[0.2, 0.5, 0.8], 200.0);
    let mut connections = pair_links(3);
    connections.reverse();
    let routes = route_connections(&devices, &connections, canvas(), &RoutingConfig::default());
    let ids: Vec<&str> = routes.iter().map(|route| route.connection_id.as_str()).collect();
    assert_eq!(ids, vec!["c2", "c1", "c0"]);
}

#[test]
fn routing_is_deterministic() {
    let devices = facing_pair(&[0.2, 0.5, 0.8], 200.0);
    let connections = pair_links(3);
    let config = RoutingConfig::default();
    let first = route_connections(&devices, &connections, canvas(), &config);
    let second = route_connections(&devices, &connections, canvas(), &config);
    assert_eq!(first, second);
}

#[test]
fn shortest_first_keeps_lanes_disjoint() {
    let devices = facing_pair(&[0.2, 0.5, 0.8], 200.0);
    let config = RoutingConfig {
        group_shared_corridors: false,
        ..RoutingConfig::default()
    };
    let routes = route_connections(&devices, &pair_links(3), canvas(), &config);
    assert!(routes.iter().all(|route| route.success));
    routes.iter().for_each(assert_orthogonal);
    assert_no_shared_lanes(&routes);
    assert_avoids_devices(&routes, &devices, &config);
}

#[test]
fn empty_input_routes_nothing() {
    let routes = route_connections(&[], &[], canvas(), &RoutingConfig::default());
    assert!(routes.is_empty());
}

#[test]
fn router_cache_tracks_device_moves() {
    let connections = pair_links(1);
    let mut router = Router::new(RoutingConfig {
        enable_caching: true,
        ..RoutingConfig::default()
    });
    let low = router.route(&facing_pair(&[0.5], 200.0), &connections, canvas());
    let again = router.route(&facing_pair(&[0.5], 200.0), &connections, canvas());
    assert_eq!(low, again);

    let level = router.route(&facing_pair(&[0.5], 100.0), &connections, canvas());
    assert_ne!(low[0].waypoints, level[0].waypoints);
    assert_eq!(level[0].waypoints, vec![GridPoint::new(20, 15), GridPoint::new(49, 15)]);

    router.invalidate_cache();
    let fresh = router.route(&facing_pair(&[0.5], 100.0), &connections, canvas());
    assert_eq!(level, fresh);
}

#[test]
fn diagram_json_routes_end_to_end() {
    let input = r#"{
        "canvas": {"width": 800, "height": 400},
        "devices": [
            {"id": "a", "x": 100, "y": 100, "width": 100, "height": 100,
             "ports": [{"id": "o0", "side": "right"}]},
            {"id": "b", "x": 500, "y": 100, "width": 100, "height": 100,
             "ports": [{"id": "i0", "side": "left", "offset": {"absolute": 50}}]}
        ],
        "connections": [
            {"id": "c0", "sourceDevice": "a", "sourcePort": "o0",
             "targetDevice": "b", "targetPort": "i0"}
        ]
    }"#;
    let diagram = Diagram::from_json_str(input).expect("diagram should parse");
    let routes = route_connections(
        &diagram.devices,
        &diagram.connections,
        diagram.canvas,
        &RoutingConfig::default(),
    );
    assert!(routes[0].success);
    assert_eq!(routes[0].virtual_waypoints, vec![(200.0, 155.0), (500.0, 155.0)]);

    let json = serde_json::to_value(&routes[0]).unwrap();
    assert_eq!(json["connectionId"], "c0");
    assert_eq!(json["waypoints"][0]["x"], 20);
}

#[test]
fn cleanup_reaches_a_fixed_point() {
    let grid = RoutingGrid::new(30, 30, 10.0);
    let existing = ExistingPaths::new();
    let ctx = CleanupContext {
        guard: PathGuard::new(&grid, 0),
        existing: &existing,
        spacing: 2,
        corridor_center: None,
        entry: None,
        exit: None,
        remove_zigzags: true,
        simplify: true,
    };
    let raw = vec![
        GridPoint::new(2, 2),
        GridPoint::new(8, 2),
        GridPoint::new(8, 5),
        GridPoint::new(14, 5),
        GridPoint::new(14, 3),
        GridPoint::new(20, 3),
        GridPoint::new(20, 12),
    ];
    let once = clean_path(&raw, &ctx);
    let twice = clean_path(&once, &ctx);
    assert_eq!(once, twice);
    assert_eq!(once.first(), raw.first());
    assert_eq!(once.last(), raw.last());
    assert!(once.len() <= raw.len());
}

/// Every cell a grid path visits, corners and interior steps alike.
fn path_cells(path: &[GridPoint]) -> Vec<GridPoint> {
    let mut cells: Vec<GridPoint> = path.first().copied().into_iter().collect();
    for pair in path.windows(2) {
        let (mut cur, end) = (pair[0], pair[1]);
        let dx = (end.x - cur.x).signum();
        let dy = (end.y - cur.y).signum();
        while cur != end {
            cur = GridPoint::new(cur.x + dx, cur.y + dy);
            cells.push(cur);
        }
    }
    cells
}

/// `a` and `b` face each other on row 15 with a small device `c` above the
/// row whose bottom port sits at (350, 140), cell (35, 14).
fn lane_crossing_setup() -> Vec<Device> {
    vec![
        Device::new("a", 100.0, 100.0, 100.0, 100.0)
            .with_port("o0", PortSide::Right, PortOffset::Fraction(0.5)),
        Device::new("b", 500.0, 100.0, 100.0, 100.0)
            .with_port("i0", PortSide::Left, PortOffset::Fraction(0.5)),
        Device::new("c", 330.0, 100.0, 40.0, 40.0)
            .with_port("p", PortSide::Bottom, PortOffset::Fraction(0.5)),
    ]
}

#[test]
fn other_ports_block_their_disc_and_lead_out_lane() {
    let devices = lane_crossing_setup();
    let config = RoutingConfig {
        port_clearance: 25.0,
        ..RoutingConfig::default()
    };
    let routes = route_connections(&devices, &pair_links(1), canvas(), &config);

    let route = &routes[0];
    assert!(route.success);
    assert_orthogonal(route);
    let disc: Vec<GridPoint> = (33..=36).map(|x| GridPoint::new(x, 15)).collect();
    for cell in path_cells(&route.waypoints) {
        assert!(!disc.contains(&cell), "path enters the port disc at {cell:?}");
        assert!(
            !(cell.x == 35 && (15..=21).contains(&cell.y)),
            "path enters the lead-out lane at {cell:?}"
        );
    }
}

#[test]
fn lead_out_lanes_stay_open_when_extension_obstacles_are_off() {
    let devices = lane_crossing_setup();
    let config = RoutingConfig {
        port_clearance: 25.0,
        port_extension_obstacles: false,
        ..RoutingConfig::default()
    };
    let routes = route_connections(&devices, &pair_links(1), canvas(), &config);

    let route = &routes[0];
    assert!(route.success);
    let cells = path_cells(&route.waypoints);
    for x in 33..=36 {
        assert!(!cells.contains(&GridPoint::new(x, 15)), "path enters the port disc");
    }
    assert!(
        cells.iter().any(|cell| cell.x == 35 && (16..=21).contains(&cell.y)),
        "detour should cut through the open lane below the port"
    );
}

#[test]
fn far_off_canvas_devices_do_not_disturb_routing() {
    let mut devices = facing_pair(&[0.5], 100.0);
    devices.push(Device::new("far", -1e12, 150.0, 10.0, 10.0));
    devices.push(
        Device::new("remote", 1e11, 140.0, 20.0, 20.0)
            .with_port("w", PortSide::Left, PortOffset::Fraction(0.5)),
    );
    let routes = route_connections(&devices, &pair_links(1), canvas(), &RoutingConfig::default());

    let route = &routes[0];
    assert!(route.success);
    assert_eq!(route.waypoints, vec![GridPoint::new(20, 15), GridPoint::new(49, 15)]);
}

#[test]
fn huge_canvas_routes_on_a_coarser_grid() {
    let devices = facing_pair(&[0.5], 100.0);
    let routes = route_connections(
        &devices,
        &pair_links(1),
        CanvasSize::new(1e6, 1e6),
        &RoutingConfig::default(),
    );

    assert_eq!(routes.len(), 1);
    let route = &routes[0];
    assert_eq!(route.connection_id, "c0");
    assert!(route.virtual_waypoints.len() >= 2);
}

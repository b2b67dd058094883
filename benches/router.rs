use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use ortho_router::config::RoutingConfig;
use ortho_router::ir::{CanvasSize, Connection, Device, PortOffset, PortSide};
use ortho_router::render::render_svg;
use ortho_router::routing::{Router, route_connections};
use ortho_router::{Diagram, PreviewConfig};
use ortho_router::theme::Theme;
use std::hint::black_box;

/// A `cols` x `rows` rack of devices, each wired to its right and lower
/// neighbour through `ports` parallel links.
fn rack_diagram(cols: usize, rows: usize, ports: usize) -> Diagram {
    let pitch = 220.0;
    let size = 100.0;
    let mut devices = Vec::new();
    for row in 0..rows {
        for col in 0..cols {
            let mut device = Device::new(
                &format!("d{row}_{col}"),
                60.0 + col as f32 * pitch,
                60.0 + row as f32 * pitch,
                size,
                size,
            );
            for p in 0..ports {
                let fraction = (p + 1) as f32 / (ports + 1) as f32;
                device = device
                    .with_port(&format!("r{p}"), PortSide::Right, PortOffset::Fraction(fraction))
                    .with_port(&format!("l{p}"), PortSide::Left, PortOffset::Fraction(fraction))
                    .with_port(&format!("b{p}"), PortSide::Bottom, PortOffset::Fraction(fraction))
                    .with_port(&format!("t{p}"), PortSide::Top, PortOffset::Fraction(fraction));
            }
            devices.push(device);
        }
    }

    let mut connections = Vec::new();
    for row in 0..rows {
        for col in 0..cols {
            let from = format!("d{row}_{col}");
            for p in 0..ports {
                if col + 1 < cols {
                    let to = format!("d{row}_{}", col + 1);
                    connections.push(Connection::new(
                        &format!("{from}-h{p}"),
                        (from.as_str(), format!("r{p}").as_str()),
                        (to.as_str(), format!("l{p}").as_str()),
                    ));
                }
                if row + 1 < rows {
                    let to = format!("d{}_{col}", row + 1);
                    connections.push(Connection::new(
                        &format!("{from}-v{p}"),
                        (from.as_str(), format!("b{p}").as_str()),
                        (to.as_str(), format!("t{p}").as_str()),
                    ));
                }
            }
        }
    }

    Diagram {
        canvas: CanvasSize::new(
            120.0 + cols as f32 * pitch,
            120.0 + rows as f32 * pitch,
        ),
        devices,
        connections,
    }
}

fn bench_route_connections(c: &mut Criterion) {
    let mut group = c.benchmark_group("route_connections");
    let config = RoutingConfig::default();
    for (cols, rows, ports) in [(2usize, 1usize, 3usize), (3, 3, 1), (4, 3, 2)] {
        let name = format!("rack_{cols}x{rows}_{ports}");
        let diagram = rack_diagram(cols, rows, ports);
        group.bench_with_input(BenchmarkId::from_parameter(name), &diagram, |b, diagram| {
            b.iter(|| {
                let routes = route_connections(
                    black_box(&diagram.devices),
                    black_box(&diagram.connections),
                    diagram.canvas,
                    &config,
                );
                black_box(routes.len());
            });
        });
    }
    group.finish();
}

fn bench_strategies(c: &mut Criterion) {
    let mut group = c.benchmark_group("route_strategies");
    let grouped = RoutingConfig::default();
    let shortest = RoutingConfig {
        group_shared_corridors: false,
        ..RoutingConfig::default()
    };
    let diagram = rack_diagram(3, 2, 3);
    for (label, config) in [("grouped", &grouped), ("shortest_first", &shortest)] {
        group.bench_with_input(BenchmarkId::new(label, "rack_3x2_3"), &diagram, |b, diagram| {
            b.iter(|| {
                let routes = route_connections(
                    black_box(&diagram.devices),
                    black_box(&diagram.connections),
                    diagram.canvas,
                    config,
                );
                black_box(routes.len());
            });
        });
    }
    group.finish();
}

fn bench_cached_router(c: &mut Criterion) {
    let diagram = rack_diagram(3, 3, 1);
    let mut router = Router::new(RoutingConfig {
        enable_caching: true,
        ..RoutingConfig::default()
    });
    c.bench_function("router_cache_hit", |b| {
        b.iter(|| {
            let routes = router.route(&diagram.devices, &diagram.connections, diagram.canvas);
            black_box(routes.len());
        });
    });
}

fn bench_render(c: &mut Criterion) {
    let diagram = rack_diagram(4, 3, 2);
    let routes = route_connections(
        &diagram.devices,
        &diagram.connections,
        diagram.canvas,
        &RoutingConfig::default(),
    );
    let theme = Theme::modern();
    let preview = PreviewConfig::default();
    c.bench_function("render_svg_rack_4x3_2", |b| {
        b.iter(|| {
            let svg = render_svg(black_box(&diagram), black_box(&routes), &theme, &preview);
            black_box(svg.len());
        });
    });
}

criterion_group!(
    benches,
    bench_route_connections,
    bench_strategies,
    bench_cached_router,
    bench_render
);
criterion_main!(benches);

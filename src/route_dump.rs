use crate::ir::Diagram;
use crate::routing::RoutedConnection;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteDump {
    pub width: f32,
    pub height: f32,
    pub routed: usize,
    pub failed: usize,
    pub crossings: usize,
    pub connections: Vec<ConnectionDump>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDump {
    pub id: String,
    pub success: bool,
    pub crossings: usize,
    pub points: Vec<[f32; 2]>,
    pub cells: Vec<[i32; 2]>,
}

impl RouteDump {
    pub fn from_routes(diagram: &Diagram, routes: &[RoutedConnection]) -> Self {
        let connections: Vec<ConnectionDump> = routes
            .iter()
            .map(|route| ConnectionDump {
                id: route.connection_id.clone(),
                success: route.success,
                crossings: route.crossings,
                points: route.virtual_waypoints.iter().map(|(x, y)| [*x, *y]).collect(),
                cells: route.waypoints.iter().map(|cell| [cell.x, cell.y]).collect(),
            })
            .collect();
        let routed = routes.iter().filter(|route| route.success).count();

        RouteDump {
            width: diagram.canvas.width,
            height: diagram.canvas.height,
            routed,
            failed: routes.len() - routed,
            crossings: routes.iter().map(|route| route.crossings).sum(),
            connections,
        }
    }
}

pub fn write_route_dump(
    output: Option<&Path>,
    diagram: &Diagram,
    routes: &[RoutedConnection],
) -> anyhow::Result<()> {
    let dump = RouteDump::from_routes(diagram, routes);
    match output {
        Some(path) => {
            let writer = BufWriter::new(File::create(path)?);
            serde_json::to_writer_pretty(writer, &dump)?;
        }
        None => {
            let stdout = std::io::stdout();
            let mut writer = stdout.lock();
            serde_json::to_writer_pretty(&mut writer, &dump)?;
            writeln!(writer)?;
        }
    }
    Ok(())
}

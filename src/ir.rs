use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortSide {
    Top,
    Bottom,
    Left,
    Right,
}

impl PortSide {
    pub fn is_horizontal_exit(self) -> bool {
        matches!(self, PortSide::Left | PortSide::Right)
    }
}

/// Where a port sits along its side. Both forms resolve to a continuous
/// offset from the side's start (top edge for left/right, left edge for
/// top/bottom) before the router uses them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PortOffset {
    Absolute(f32),
    Fraction(f32),
}

impl Default for PortOffset {
    fn default() -> Self {
        PortOffset::Fraction(0.5)
    }
}

impl PortOffset {
    pub fn resolve(self, side_length: f32) -> f32 {
        let side_length = side_length.max(0.0);
        let offset = match self {
            PortOffset::Absolute(value) => value,
            PortOffset::Fraction(value) => value.clamp(0.0, 1.0) * side_length,
        };
        if offset.is_finite() {
            offset.clamp(0.0, side_length)
        } else {
            side_length / 2.0
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Port {
    pub id: String,
    pub side: PortSide,
    #[serde(default)]
    pub offset: PortOffset,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub ports: Vec<Port>,
}

impl Device {
    pub fn new(id: &str, x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            id: id.to_string(),
            x,
            y,
            width,
            height,
            ports: Vec::new(),
        }
    }

    pub fn with_port(mut self, id: &str, side: PortSide, offset: PortOffset) -> Self {
        self.ports.push(Port {
            id: id.to_string(),
            side,
            offset,
        });
        self
    }

    pub fn port(&self, id: &str) -> Option<&Port> {
        self.ports.iter().find(|port| port.id == id)
    }

    /// Continuous position of `port` on this device's outline.
    pub fn port_position(&self, port: &Port) -> (f32, f32) {
        match port.side {
            PortSide::Left => (self.x, self.y + port.offset.resolve(self.height)),
            PortSide::Right => (
                self.x + self.width,
                self.y + port.offset.resolve(self.height),
            ),
            PortSide::Top => (self.x + port.offset.resolve(self.width), self.y),
            PortSide::Bottom => (
                self.x + port.offset.resolve(self.width),
                self.y + self.height,
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub id: String,
    pub source_device: String,
    pub source_port: String,
    pub target_device: String,
    pub target_port: String,
    /// Manually authored waypoints. When non-empty the router passes them
    /// through untouched instead of searching.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routing_points: Vec<(f32, f32)>,
}

impl Connection {
    pub fn new(id: &str, source: (&str, &str), target: (&str, &str)) -> Self {
        Self {
            id: id.to_string(),
            source_device: source.0.to_string(),
            source_port: source.1.to_string(),
            target_device: target.0.to_string(),
            target_port: target.1.to_string(),
            routing_points: Vec::new(),
        }
    }

    pub fn with_routing_points(mut self, points: Vec<(f32, f32)>) -> Self {
        self.routing_points = points;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanvasSize {
    pub width: f32,
    pub height: f32,
}

impl CanvasSize {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Everything a routing run consumes, in the shape the CLI and the wasm
/// wrapper read from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagram {
    pub canvas: CanvasSize,
    #[serde(default)]
    pub devices: Vec<Device>,
    #[serde(default)]
    pub connections: Vec<Connection>,
}

#[derive(Debug, Error)]
pub enum DiagramError {
    #[error("failed to read diagram: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid diagram JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("duplicate device id `{0}`")]
    DuplicateDevice(String),
    #[error("duplicate connection id `{0}`")]
    DuplicateConnection(String),
}

impl Diagram {
    pub fn from_json_str(input: &str) -> Result<Self, DiagramError> {
        let diagram: Diagram = serde_json::from_str(input)?;
        diagram.validate()?;
        Ok(diagram)
    }

    /// Rejects id collisions; geometry problems are left to the router, which
    /// clamps rather than fails.
    pub fn validate(&self) -> Result<(), DiagramError> {
        let mut seen = HashSet::new();
        for device in &self.devices {
            if !seen.insert(device.id.as_str()) {
                return Err(DiagramError::DuplicateDevice(device.id.clone()));
            }
        }
        let mut seen = HashSet::new();
        for connection in &self.connections {
            if !seen.insert(connection.id.as_str()) {
                return Err(DiagramError::DuplicateConnection(connection.id.clone()));
            }
        }
        Ok(())
    }
}

pub fn load_diagram(path: &Path) -> Result<Diagram, DiagramError> {
    let contents = std::fs::read_to_string(path)?;
    Diagram::from_json_str(&contents)
}

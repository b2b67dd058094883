//! Orthogonal connector routing between device ports on a diagram canvas.
//!
//! [`route_connections`] is the one-shot entry point; [`Router`] keeps a
//! configuration and an optional result cache across runs.

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod ir;
pub mod log;
pub mod render;
pub mod route_dump;
pub mod routing;
pub mod theme;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{Config, PreviewConfig, RoutingConfig, load_config};
pub use ir::{CanvasSize, Connection, Device, Diagram, DiagramError, Port, PortOffset, PortSide};
pub use route_dump::RouteDump;
pub use routing::{GridPoint, RoutedConnection, Router, route_connections};

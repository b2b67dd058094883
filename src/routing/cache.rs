use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::config::RoutingConfig;
use crate::ir::{CanvasSize, Connection, Device};

use super::RoutedConnection;

/// Identity of a routing run. Canvas size and connection count alone would
/// miss device moves, so the key also carries a fingerprint of the full
/// input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    canvas_width: u32,
    canvas_height: u32,
    connection_count: usize,
    fingerprint: u64,
}

impl CacheKey {
    pub fn new(
        devices: &[Device],
        connections: &[Connection],
        canvas: CanvasSize,
        config: &RoutingConfig,
    ) -> Self {
        let mut hasher = DefaultHasher::new();
        serde_json::to_vec(devices).unwrap_or_default().hash(&mut hasher);
        serde_json::to_vec(connections).unwrap_or_default().hash(&mut hasher);
        serde_json::to_vec(config).unwrap_or_default().hash(&mut hasher);
        Self {
            canvas_width: canvas.width.to_bits(),
            canvas_height: canvas.height.to_bits(),
            connection_count: connections.len(),
            fingerprint: hasher.finish(),
        }
    }
}

/// Holds the most recent routing result only.
#[derive(Debug, Clone, Default)]
pub struct RouteCache {
    entry: Option<(CacheKey, Vec<RoutedConnection>)>,
}

impl RouteCache {
    pub fn get(&self, key: &CacheKey) -> Option<&[RoutedConnection]> {
        match &self.entry {
            Some((cached, routes)) if cached == key => Some(routes.as_slice()),
            _ => None,
        }
    }

    pub fn store(&mut self, key: CacheKey, routes: Vec<RoutedConnection>) {
        self.entry = Some((key, routes));
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }

    pub fn is_empty(&self) -> bool {
        self.entry.is_none()
    }
}

use ortho_router::{Diagram, RouteDump, RoutingConfig, route_connections};
use serde::Deserialize;
use wasm_bindgen::prelude::*;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RouteOptions {
    routing: Option<RoutingConfig>,
    canvas_width: Option<f32>,
    canvas_height: Option<f32>,
}

fn route_to_json(diagram_json: &str, options: RouteOptions) -> Result<String, String> {
    let mut diagram = Diagram::from_json_str(diagram_json).map_err(|error| error.to_string())?;
    if let Some(width) = options.canvas_width {
        diagram.canvas.width = width;
    }
    if let Some(height) = options.canvas_height {
        diagram.canvas.height = height;
    }
    let config = options.routing.unwrap_or_default();
    let routes = route_connections(
        &diagram.devices,
        &diagram.connections,
        diagram.canvas,
        &config,
    );
    serde_json::to_string(&RouteDump::from_routes(&diagram, &routes))
        .map_err(|error| error.to_string())
}

#[wasm_bindgen]
pub fn route_diagram_json(
    diagram_json: &str,
    options_json: Option<String>,
) -> Result<String, JsValue> {
    let options = if let Some(raw_options) = options_json {
        serde_json::from_str::<RouteOptions>(&raw_options)
            .map_err(|error| JsValue::from_str(&error.to_string()))?
    } else {
        RouteOptions::default()
    };
    route_to_json(diagram_json, options).map_err(|error| JsValue::from_str(&error))
}

#[cfg(test)]
mod tests {
    use crate::{RouteOptions, route_to_json};

    #[test]
    fn routes_a_simple_pair() {
        let diagram = r#"{
            "canvas": {"width": 800, "height": 400},
            "devices": [
                {"id": "a", "x": 100, "y": 100, "width": 100, "height": 100,
                 "ports": [{"id": "out", "side": "right"}]},
                {"id": "b", "x": 500, "y": 100, "width": 100, "height": 100,
                 "ports": [{"id": "in", "side": "left"}]}
            ],
            "connections": [
                {"id": "c1", "sourceDevice": "a", "sourcePort": "out",
                 "targetDevice": "b", "targetPort": "in"}
            ]
        }"#;

        let json = route_to_json(diagram, RouteOptions::default()).expect("diagram should route");
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["routed"], 1);
        assert_eq!(value["connections"][0]["id"], "c1");
    }

    #[test]
    fn rejects_duplicate_devices() {
        let diagram = r#"{"canvas": {"width": 10, "height": 10},
            "devices": [{"id": "a", "x": 0, "y": 0, "width": 1, "height": 1},
                        {"id": "a", "x": 5, "y": 0, "width": 1, "height": 1}]}"#;
        assert!(route_to_json(diagram, RouteOptions::default()).is_err());
    }
}

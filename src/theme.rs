use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Theme {
    pub font_family: String,
    pub font_size: f32,
    pub device_fill: String,
    pub device_border: String,
    pub label_color: String,
    pub port_color: String,
    pub path_color: String,
    pub failed_path_color: String,
    pub background: String,
}

impl Theme {
    pub fn classic() -> Self {
        Self {
            font_family: "\"trebuchet ms\", verdana, arial, sans-serif".to_string(),
            font_size: 12.0,
            device_fill: "#ECECFF".to_string(),
            device_border: "#9370DB".to_string(),
            label_color: "#333333".to_string(),
            port_color: "#9370DB".to_string(),
            path_color: "#333333".to_string(),
            failed_path_color: "#D9534F".to_string(),
            background: "#FFFFFF".to_string(),
        }
    }

    pub fn modern() -> Self {
        Self {
            font_family: "Inter, Segoe UI, system-ui, -apple-system, sans-serif".to_string(),
            font_size: 11.0,
            device_fill: "#F8FAFF".to_string(),
            device_border: "#C7D2E5".to_string(),
            label_color: "#1C2430".to_string(),
            port_color: "#7A8AA6".to_string(),
            path_color: "#3A6FD8".to_string(),
            failed_path_color: "#E5484D".to_string(),
            background: "#FBFCFE".to_string(),
        }
    }
}

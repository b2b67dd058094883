use crate::config::PreviewConfig;
use crate::ir::Diagram;
use crate::routing::RoutedConnection;
use crate::theme::Theme;
use anyhow::Result;
use std::path::Path;

/// SVG preview of the devices, their ports and the routed connections.
/// Failed connections are drawn dashed and thicker so they stand out.
pub fn render_svg(
    diagram: &Diagram,
    routes: &[RoutedConnection],
    theme: &Theme,
    preview: &PreviewConfig,
) -> String {
    let mut svg = String::new();
    let pad = preview.padding.max(0.0);
    let width = diagram.canvas.width.max(1.0) + pad * 2.0;
    let height = diagram.canvas.height.max(1.0) + pad * 2.0;

    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" viewBox=\"{:.2} {:.2} {width} {height}\">",
        -pad, -pad
    ));
    svg.push_str(&format!(
        "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"100%\" height=\"100%\" fill=\"{}\"/>",
        -pad, -pad, theme.background
    ));

    for device in &diagram.devices {
        svg.push_str(&format!(
            "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" rx=\"4\" ry=\"4\" fill=\"{}\" stroke=\"{}\" stroke-width=\"1.2\"/>",
            device.x,
            device.y,
            device.width.max(0.0),
            device.height.max(0.0),
            theme.device_fill,
            theme.device_border
        ));
        svg.push_str(&format!(
            "<text x=\"{:.2}\" y=\"{:.2}\" text-anchor=\"middle\" dominant-baseline=\"central\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\">{}</text>",
            device.x + device.width / 2.0,
            device.y + device.height / 2.0,
            theme.font_family,
            theme.font_size,
            theme.label_color,
            escape_xml(&device.id)
        ));
    }

    for route in routes {
        if route.virtual_waypoints.len() < 2 {
            continue;
        }
        let d = points_to_path(&route.virtual_waypoints);
        if route.success {
            svg.push_str(&format!(
                "<path d=\"{}\" fill=\"none\" stroke=\"{}\" stroke-width=\"{}\" stroke-linejoin=\"round\"/>",
                d, theme.path_color, preview.path_width
            ));
        } else {
            svg.push_str(&format!(
                "<path d=\"{}\" fill=\"none\" stroke=\"{}\" stroke-width=\"{}\" stroke-dasharray=\"6 4\"/>",
                d, theme.failed_path_color, preview.failed_path_width
            ));
        }
    }

    // Ports last so they sit on top of path ends.
    for device in &diagram.devices {
        for port in &device.ports {
            let (x, y) = device.port_position(port);
            svg.push_str(&format!(
                "<circle cx=\"{x:.2}\" cy=\"{y:.2}\" r=\"{}\" fill=\"{}\"/>",
                preview.port_radius, theme.port_color
            ));
        }
    }

    svg.push_str("</svg>");
    svg
}

fn points_to_path(points: &[(f32, f32)]) -> String {
    let mut d = String::new();
    for (idx, (x, y)) in points.iter().enumerate() {
        let cmd = if idx == 0 { 'M' } else { 'L' };
        d.push_str(&format!("{cmd} {x:.2} {y:.2} "));
    }
    d.trim_end().to_string()
}

pub fn write_output_svg(svg: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, svg)?;
        }
        None => {
            print!("{}", svg);
        }
    }
    Ok(())
}

#[cfg(feature = "png")]
pub fn write_output_png(svg: &str, output: &Path, theme: &Theme) -> Result<()> {
    let mut opt = usvg::Options::default();
    opt.font_family = theme.font_family.clone();

    let tree = usvg::Tree::from_str(svg, &opt)?;
    let size = tree.size().to_int_size();
    let mut pixmap = resvg::tiny_skia::Pixmap::new(size.width(), size.height())
        .ok_or_else(|| anyhow::anyhow!("Failed to allocate pixmap"))?;

    let mut pixmap_mut = pixmap.as_mut();
    resvg::render(&tree, resvg::tiny_skia::Transform::default(), &mut pixmap_mut);
    pixmap.save_png(output)?;
    Ok(())
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

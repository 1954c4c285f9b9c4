//! Primary map export.

use std::fmt::Write as _;

use crate::classify::{MarkerClass, Placement};

const ICON_BASE: &str = "http://maps.google.com/mapfiles/kml/";
const VERSION_STYLE: &str = "ver";
const VERSION_ICON: &str = "pushpin/wht-pushpin.png";
/// Version pin sits in open water, outside any planning area.
const VERSION_POSITION: (f64, f64) = (-95.62, 27.84);

/// Render the KML document: shared styles, the version pin, then one
/// placemark per placement.
pub fn render(placements: &[Placement], version_label: &str) -> String {
    let mut out = String::with_capacity(1024 + placements.len() * 1536);
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str("<kml xmlns=\"http://www.opengis.net/kml/2.2\">\n<Document>\n");

    push_style(&mut out, VERSION_STYLE, VERSION_ICON, Some("ff000000"));
    for marker in MarkerClass::ALL {
        push_style(&mut out, marker.style_id(), marker.icon(), None);
    }

    push_placemark(
        &mut out,
        version_label,
        "Current version of T-38 PlanAid",
        VERSION_STYLE,
        VERSION_POSITION,
    );
    for p in placements {
        push_placemark(
            &mut out,
            &p.name,
            &p.description,
            p.marker.style_id(),
            (p.longitude, p.latitude),
        );
    }

    out.push_str("</Document>\n</kml>\n");
    out
}

fn push_style(out: &mut String, id: &str, icon: &str, color: Option<&str>) {
    let _ = writeln!(out, "<Style id=\"{id}\">\n<IconStyle>");
    if let Some(color) = color {
        let _ = writeln!(out, "<color>{color}</color>");
    }
    let _ = writeln!(
        out,
        "<Icon><href>{ICON_BASE}{icon}</href></Icon>\n</IconStyle>\n</Style>"
    );
}

fn push_placemark(out: &mut String, name: &str, description: &str, style: &str, at: (f64, f64)) {
    let _ = writeln!(
        out,
        "<Placemark>\n<name>{}</name>\n<description>{}</description>\n<styleUrl>#{style}</styleUrl>\n\
<Point><coordinates>{},{},0</coordinates></Point>\n</Placemark>",
        escape_xml(name),
        escape_xml(description),
        at.0,
        at.1
    );
}

pub(crate) fn escape_xml(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

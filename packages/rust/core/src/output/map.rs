//! Interactive HTML view.
//!
//! The page embeds the placements as JSON and draws them with Leaflet, so it
//! opens directly from disk in any browser.

use serde::Serialize;

use planaid_shared::{PlanAidError, Result};

use crate::classify::{MarkerClass, Placement};

use super::kml::escape_xml;

const TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{{TITLE}}</title>
<meta name="viewport" content="width=device-width, initial-scale=1">
<link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css">
<script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
<style>
html, body, #map { height: 100%; margin: 0; }
.legend { background: #fff; padding: 6px 10px; font: 12px sans-serif; line-height: 18px; }
.legend i { display: inline-block; width: 12px; height: 12px; margin-right: 6px; border-radius: 6px; }
.requests { max-width: 280px; }
</style>
</head>
<body>
<div id="map"></div>
<script>
const placements = {{PLACEMENTS}};
const legend = {{LEGEND}};
const changeRequests = {{REQUESTS}};
const map = L.map('map').setView([39.5, -98.35], 4);
L.tileLayer('https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png', {
  maxZoom: 18,
  attribution: '&copy; OpenStreetMap contributors'
}).addTo(map);
for (const p of placements) {
  L.circleMarker([p.latitude, p.longitude], {
    radius: 7, color: '#222', weight: 1, fillColor: p.color, fillOpacity: 0.9
  }).bindTooltip(p.name).bindPopup(p.description, { maxWidth: 360 }).addTo(map);
}
const box = L.control({ position: 'bottomright' });
box.onAdd = function () {
  const div = L.DomUtil.create('div', 'legend');
  div.innerHTML = '<b>{{TITLE}}</b><br>' + legend
    .map(l => '<i style="background:' + l.color + '"></i>' + l.label + ' (' + l.count + ')')
    .join('<br>');
  if (changeRequests.length > 0) {
    div.innerHTML += '<div class="requests"><br><b>Change requests</b><br>' + changeRequests.join('<br>') + '</div>';
  }
  return div;
};
box.addTo(map);
</script>
</body>
</html>
"#;

#[derive(Serialize)]
struct MapPoint<'a> {
    name: &'a str,
    latitude: f64,
    longitude: f64,
    color: &'static str,
    marker: MarkerClass,
    description: &'a str,
}

#[derive(Serialize)]
struct LegendEntry {
    label: String,
    color: &'static str,
    count: usize,
}

/// Render the HTML map for the same placements the KML export uses.
pub fn render(placements: &[Placement], title: &str, change_requests: &[String]) -> Result<String> {
    let points: Vec<MapPoint<'_>> = placements
        .iter()
        .map(|p| MapPoint {
            name: &p.name,
            latitude: p.latitude,
            longitude: p.longitude,
            color: p.marker.css_color(),
            marker: p.marker,
            description: &p.description,
        })
        .collect();
    let legend: Vec<LegendEntry> = MarkerClass::ALL
        .iter()
        .map(|&marker| LegendEntry {
            label: marker.to_string(),
            color: marker.css_color(),
            count: placements.iter().filter(|p| p.marker == marker).count(),
        })
        .collect();

    Ok(TEMPLATE
        .replace("{{TITLE}}", &escape_xml(title))
        .replace("{{PLACEMENTS}}", &script_json(&points)?)
        .replace("{{LEGEND}}", &script_json(&legend)?)
        .replace("{{REQUESTS}}", &script_json(change_requests)?))
}

/// JSON safe to inline in a `<script>` element.
fn script_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let json = serde_json::to_string(value)
        .map_err(|e| PlanAidError::validation(format!("map JSON serialization failed: {e}")))?;
    Ok(json.replace("</", "<\\/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Eligibility;

    fn placement(marker: MarkerClass) -> Placement {
        Placement {
            icao: "KXYZ".into(),
            name: "KXYZ 7200".into(),
            latitude: 35.25,
            longitude: -97.5,
            longest: 7200,
            eligibility: Eligibility::KnownGood,
            marker,
            description: "KXYZ <br/>ok</script>".into(),
            comment: String::new(),
        }
    }

    #[test]
    fn embeds_placements_and_legend() {
        let html = render(
            &[placement(MarkerClass::Prohibited)],
            "T38 Apts 01 May 2025",
            &["Please add KABC".to_string()],
        )
        .expect("render");

        assert!(html.contains("<title>T38 Apts 01 May 2025</title>"));
        assert!(html.contains("\"name\":\"KXYZ 7200\""));
        assert!(html.contains("\"marker\":\"prohibited\""));
        assert!(html.contains("{\"label\":\"prohibited\",\"color\":\"#8b0000\",\"count\":1}"));
        assert!(html.contains("[\"Please add KABC\"]"));
        assert!(!html.contains("{{"));
    }

    #[test]
    fn script_close_tag_is_neutralised() {
        let html = render(&[placement(MarkerClass::KnownGood)], "t", &[]).expect("render");
        assert!(html.contains("ok<\\/script>"));
        assert_eq!(html.matches("</script>").count(), 2);
    }
}

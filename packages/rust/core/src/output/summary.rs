//! Tab-separated quick-reference list.

use crate::classify::Placement;

/// `ICAO\tPinColor\tRunwayLength\tComments`, one line per placement.
pub fn render(placements: &[Placement]) -> String {
    let mut out = String::from("ICAO\tPinColor\tRunwayLength\tComments\n");
    for p in placements {
        // Tabs inside a comment would shift the columns.
        let comment = p.comment.replace(['\t', '\n', '\r'], " ");
        out.push_str(&format!(
            "{}\t{}\t{}\t{}\n",
            p.icao,
            p.marker.pin_color(),
            p.longest,
            comment
        ));
    }
    out
}

//! Fog-of-war rendering of the local track window.

use crate::track::{Cell, Pos, Track};

/// Render the `(2R+1)x(2R+1)` window centred on `center` as
/// space-separated raw cell values, one line per row.
///
/// Cells farther than `radius` (Euclidean) from the centre are masked as
/// [`Cell::NotVisible`]; cells inside the disc but outside the track read
/// as [`Cell::Wall`].
pub(crate) fn local_view(track: &Track, center: Pos, radius: u32) -> String {
    let r = i64::from(radius);
    let mut lines = Vec::new();
    for wr in -r..=r {
        let mut cells = Vec::new();
        for wc in -r..=r {
            let value = if wr * wr + wc * wc > r * r {
                Cell::NotVisible.value()
            } else {
                let row = i64::from(center.row) + wr;
                let col = i64::from(center.col) + wc;
                track.get(row, col).map_or(Cell::Wall.value(), Cell::value)
            };
            cells.push(value.to_string());
        }
        lines.push(cells.join(" "));
    }
    lines.join("\n")
}

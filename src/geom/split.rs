use geo::line_intersection::{line_intersection, LineIntersection};
use geo::{Coord, Line, LineString, MultiPolygon};

/// Split a line at its crossings with the polygon boundary.
///
/// Pieces come back in order along the input line. Collinear overlaps with a
/// boundary edge are left uncut.
pub fn split_line(line: &LineString<f64>, polygon: &MultiPolygon<f64>) -> Vec<LineString<f64>> {
    let boundary: Vec<Line<f64>> = polygon
        .0
        .iter()
        .flat_map(|poly| std::iter::once(poly.exterior()).chain(poly.interiors().iter()))
        .flat_map(|ring| ring.lines())
        .collect();

    let mut pieces = Vec::new();
    let mut current: Vec<Coord<f64>> = Vec::new();

    for segment in line.lines() {
        if current.is_empty() {
            current.push(segment.start);
        }

        let mut cuts: Vec<Coord<f64>> = boundary
            .iter()
            .filter_map(|edge| match line_intersection(segment, *edge) {
                Some(LineIntersection::SinglePoint { intersection, .. }) => Some(intersection),
                _ => None,
            })
            .collect();
        cuts.sort_by(|a, b| {
            let da = (a.x - segment.start.x).powi(2) + (a.y - segment.start.y).powi(2);
            let db = (b.x - segment.start.x).powi(2) + (b.y - segment.start.y).powi(2);
            da.total_cmp(&db)
        });
        cuts.dedup();

        for cut in cuts {
            if current.last() == Some(&cut) {
                continue;
            }
            current.push(cut);
            if current.len() >= 2 {
                pieces.push(LineString::from(current.clone()));
            }
            current = vec![cut];
        }
        if current.last() != Some(&segment.end) {
            current.push(segment.end);
        }
    }
    if current.len() >= 2 {
        pieces.push(LineString::from(current));
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn square(min: f64, max: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![polygon![
            (x: min, y: min),
            (x: max, y: min),
            (x: max, y: max),
            (x: min, y: max),
        ]])
    }

    #[test]
    fn crossing_line_cuts_at_the_boundary() {
        let poly = square(0.0, 10.0);
        let line = LineString::from(vec![(-5.0, 5.0), (5.0, 5.0)]);
        let pieces = split_line(&line, &poly);

        assert_eq!(pieces.len(), 2);
        assert_eq!(pieces[0].0, vec![Coord { x: -5.0, y: 5.0 }, Coord { x: 0.0, y: 5.0 }]);
        assert_eq!(pieces[1].0, vec![Coord { x: 0.0, y: 5.0 }, Coord { x: 5.0, y: 5.0 }]);
    }

    #[test]
    fn through_line_produces_three_pieces() {
        let poly = square(0.0, 10.0);
        let line = LineString::from(vec![(-5.0, 5.0), (15.0, 5.0)]);
        let pieces = split_line(&line, &poly);

        assert_eq!(pieces.len(), 3);
        assert_eq!(pieces[1].0.first(), Some(&Coord { x: 0.0, y: 5.0 }));
        assert_eq!(pieces[1].0.last(), Some(&Coord { x: 10.0, y: 5.0 }));
    }

    #[test]
    fn disjoint_line_stays_whole() {
        let poly = square(0.0, 10.0);
        let line = LineString::from(vec![(20.0, 20.0), (30.0, 25.0)]);
        let pieces = split_line(&line, &poly);

        assert_eq!(pieces.len(), 1);
        assert_eq!(pieces[0], line);
    }

    #[test]
    fn cut_at_an_existing_vertex_keeps_order() {
        let poly = square(0.0, 10.0);
        let line = LineString::from(vec![(-4.0, 5.0), (0.0, 5.0), (6.0, 5.0)]);
        let pieces = split_line(&line, &poly);

        assert_eq!(pieces.len(), 2);
        assert_eq!(pieces[0].0.last(), Some(&Coord { x: 0.0, y: 5.0 }));
        assert_eq!(pieces[1].0, vec![Coord { x: 0.0, y: 5.0 }, Coord { x: 6.0, y: 5.0 }]);
    }
}

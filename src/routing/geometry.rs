use super::grid::{GridDirection, GridPoint};

/// Direction of an axis-aligned, non-degenerate segment.
pub(crate) fn segment_direction(a: GridPoint, b: GridPoint) -> Option<GridDirection> {
    if a == b || !a.is_aligned_with(b) {
        return None;
    }
    GridDirection::between(a, b)
}

pub(crate) fn is_straight_line(a: GridPoint, b: GridPoint) -> bool {
    a != b && a.is_aligned_with(b)
}

pub(crate) fn dedup_points(path: &[GridPoint]) -> Vec<GridPoint> {
    let mut out: Vec<GridPoint> = Vec::with_capacity(path.len());
    for &point in path {
        if out.last() != Some(&point) {
            out.push(point);
        }
    }
    out
}

/// Drops interior points whose incoming and outgoing segments run the same
/// way. Reversals are kept; they are a separate cleanup concern.
pub(crate) fn merge_collinear(path: &[GridPoint]) -> Vec<GridPoint> {
    let path = dedup_points(path);
    if path.len() <= 2 {
        return path;
    }
    let mut out: Vec<GridPoint> = Vec::with_capacity(path.len());
    out.push(path[0]);
    for idx in 1..path.len() - 1 {
        let prev = out[out.len() - 1];
        let curr = path[idx];
        let next = path[idx + 1];
        let incoming = segment_direction(prev, curr);
        if incoming.is_some() && incoming == segment_direction(curr, next) {
            continue;
        }
        out.push(curr);
    }
    out.push(path[path.len() - 1]);
    out
}

/// Every cell visited by an orthogonal waypoint path, in travel order.
pub(crate) fn expand_path(path: &[GridPoint]) -> Vec<GridPoint> {
    let mut cells: Vec<GridPoint> = Vec::new();
    if let Some(&first) = path.first() {
        cells.push(first);
    }
    for pair in path.windows(2) {
        let Some(direction) = segment_direction(pair[0], pair[1]) else {
            if pair[0] != pair[1] {
                cells.push(pair[1]);
            }
            continue;
        };
        let mut cur = pair[0];
        while cur != pair[1] {
            cur = cur.step(direction);
            cells.push(cur);
        }
    }
    cells
}

/// Direction changes along the path, counting a reversal as two turns.
/// `entry` is the travel direction arriving at the first point and `exit`
/// the one leaving the last point.
pub(crate) fn count_turns(
    path: &[GridPoint],
    entry: Option<GridDirection>,
    exit: Option<GridDirection>,
) -> usize {
    let mut directions: Vec<GridDirection> = Vec::with_capacity(path.len() + 1);
    directions.extend(entry);
    for pair in path.windows(2) {
        match segment_direction(pair[0], pair[1]) {
            Some(direction) => directions.push(direction),
            None if pair[0] != pair[1] => return usize::MAX / 2,
            None => {}
        }
    }
    directions.extend(exit);
    directions
        .windows(2)
        .map(|pair| {
            if pair[0] == pair[1] {
                0
            } else if pair[0] == pair[1].opposite() {
                2
            } else {
                1
            }
        })
        .sum()
}

pub(crate) fn segments_intersect(a: GridPoint, b: GridPoint, c: GridPoint, d: GridPoint) -> bool {
    fn orient(a: GridPoint, b: GridPoint, c: GridPoint) -> i64 {
        (b.x - a.x) as i64 * (c.y - a.y) as i64 - (b.y - a.y) as i64 * (c.x - a.x) as i64
    }
    fn on_segment(a: GridPoint, b: GridPoint, c: GridPoint) -> bool {
        c.x >= a.x.min(b.x) && c.x <= a.x.max(b.x) && c.y >= a.y.min(b.y) && c.y <= a.y.max(b.y)
    }
    let o1 = orient(a, b, c);
    let o2 = orient(a, b, d);
    let o3 = orient(c, d, a);
    let o4 = orient(c, d, b);
    if o1.signum() * o2.signum() < 0 && o3.signum() * o4.signum() < 0 {
        return true;
    }
    (o1 == 0 && on_segment(a, b, c))
        || (o2 == 0 && on_segment(a, b, d))
        || (o3 == 0 && on_segment(c, d, a))
        || (o4 == 0 && on_segment(c, d, b))
}

/// Segment pairs between `path` and the other paths that intersect, skipping
/// pairs that merely share an endpoint.
pub(crate) fn count_crossings<'a>(
    path: &[GridPoint],
    others: impl IntoIterator<Item = &'a [GridPoint]>,
) -> usize {
    if path.len() < 2 {
        return 0;
    }
    let mut crossings = 0usize;
    for other in others {
        for theirs in other.windows(2) {
            let (b1, b2) = (theirs[0], theirs[1]);
            for ours in path.windows(2) {
                let (a1, a2) = (ours[0], ours[1]);
                if a1 == b1 || a1 == b2 || a2 == b1 || a2 == b2 {
                    continue;
                }
                if segments_intersect(a1, a2, b1, b2) {
                    crossings += 1;
                }
            }
        }
    }
    crossings
}

/// Continuous-space counterpart of [`merge_collinear`] used on the rendered
/// waypoint list.
pub(crate) fn compress_virtual(points: &[(f32, f32)]) -> Vec<(f32, f32)> {
    const EPS: f32 = 1e-4;
    let same = |a: (f32, f32), b: (f32, f32)| (a.0 - b.0).abs() <= EPS && (a.1 - b.1).abs() <= EPS;
    let mut deduped: Vec<(f32, f32)> = Vec::with_capacity(points.len());
    for &point in points {
        if deduped.last().is_none_or(|last| !same(*last, point)) {
            deduped.push(point);
        }
    }
    if deduped.len() <= 2 {
        return deduped;
    }
    let mut out: Vec<(f32, f32)> = Vec::with_capacity(deduped.len());
    out.push(deduped[0]);
    for idx in 1..deduped.len() - 1 {
        let prev = out[out.len() - 1];
        let curr = deduped[idx];
        let next = deduped[idx + 1];
        let dx1 = curr.0 - prev.0;
        let dy1 = curr.1 - prev.1;
        let dx2 = next.0 - curr.0;
        let dy2 = next.1 - curr.1;
        let horizontal = dy1.abs() <= EPS && dy2.abs() <= EPS && dx1 * dx2 > 0.0;
        let vertical = dx1.abs() <= EPS && dx2.abs() <= EPS && dy1 * dy2 > 0.0;
        if horizontal || vertical {
            continue;
        }
        out.push(curr);
    }
    out.push(deduped[deduped.len() - 1]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: i32, y: i32) -> GridPoint {
        GridPoint::new(x, y)
    }

    #[test]
    fn merges_same_direction_runs_only() {
        let path = [p(0, 0), p(1, 0), p(2, 0), p(2, 0), p(2, 3), p(2, 1)];
        assert_eq!(merge_collinear(&path), vec![p(0, 0), p(2, 0), p(2, 3), p(2, 1)]);
    }

    #[test]
    fn expands_waypoints_into_cells() {
        let cells = expand_path(&[p(0, 0), p(2, 0), p(2, 2)]);
        assert_eq!(cells, vec![p(0, 0), p(1, 0), p(2, 0), p(2, 1), p(2, 2)]);
    }

    #[test]
    fn turn_count_includes_boundary_directions() {
        let path = [p(0, 0), p(3, 0), p(3, 3), p(6, 3)];
        assert_eq!(count_turns(&path, None, None), 2);
        assert_eq!(count_turns(&path, Some(GridDirection::South), Some(GridDirection::South)), 4);
        let spike = [p(0, 0), p(3, 0), p(1, 0)];
        assert_eq!(count_turns(&spike, None, None), 2);
    }

    #[test]
    fn intersections_and_crossings() {
        assert!(segments_intersect(p(0, 2), p(4, 2), p(2, 0), p(2, 4)));
        assert!(!segments_intersect(p(0, 2), p(4, 2), p(5, 0), p(5, 4)));
        assert!(segments_intersect(p(0, 0), p(4, 0), p(2, 0), p(6, 0)));
        let ours = [p(0, 2), p(4, 2)];
        let vertical = [p(2, 0), p(2, 4)];
        let touching = [p(4, 2), p(4, 6)];
        assert_eq!(count_crossings(&ours, [&vertical[..], &touching[..]]), 1);
    }

    #[test]
    fn compresses_virtual_points() {
        let points = [(0.0, 5.0), (5.0, 5.0), (50.0, 5.0), (50.0, 5.0), (50.0, 40.0)];
        assert_eq!(compress_virtual(&points), vec![(0.0, 5.0), (50.0, 5.0), (50.0, 40.0)]);
    }
}

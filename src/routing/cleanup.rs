//! Orthogonal post-processing of routed paths.
//!
//! Every stage is a function from a waypoint list to a waypoint list. Stages
//! that simplify only accept rewrites that strictly lower the turn count
//! (reversals count twice); stages that move segments never add turns and
//! must strictly shrink the overlap or spacing shortfall against committed
//! paths. Rewrites that touch blocked or foreign-occupied cells are dropped,
//! so a stage that finds nothing better returns its input unchanged.

use std::collections::HashSet;
use std::ops::RangeInclusive;

use crate::log::debug;

use super::geometry::{
    count_turns, dedup_points, is_straight_line, merge_collinear, segment_direction,
};
use super::grid::{GridDirection, GridPoint, RoutingGrid};
use super::{ConnectionIndex, ExistingPaths};

// ── Iteration caps ──────────────────────────────────────────────────
/// Full pipeline passes before settling for a non-fixed-point result.
const MAX_CLEANUP_PASSES: usize = 6;
/// Interior reversal sweeps per pass.
const MAX_REVERSAL_SWEEPS: usize = 10;
/// Turn minimisation rounds per pass.
const MAX_TURN_ROUNDS: usize = 5;
/// Segment moves per spacing or overlap sweep.
const MAX_SEGMENT_MOVES: usize = 32;

// ── Local search ────────────────────────────────────────────────────
/// Furthest step along the lead-out direction tried when steering out of a
/// reversal at a path end.
const REVERSAL_DETOUR_CELLS: i32 = 3;
/// Window sizes, in segments, that turn minimisation tries to collapse.
const DETOUR_SPANS: RangeInclusive<usize> = 4..=6;

/// Hard constraints a rewritten path must still satisfy.
#[derive(Debug, Clone, Copy)]
pub struct PathGuard<'a> {
    grid: &'a RoutingGrid,
    connection: ConnectionIndex,
    endpoints: Option<(GridPoint, GridPoint)>,
}

impl<'a> PathGuard<'a> {
    pub fn new(grid: &'a RoutingGrid, connection: ConnectionIndex) -> Self {
        Self {
            grid,
            connection,
            endpoints: None,
        }
    }

    /// Path endpoints are allowed to sit on blocked cells.
    pub fn with_endpoints(mut self, start: GridPoint, end: GridPoint) -> Self {
        self.endpoints = Some((start, end));
        self
    }

    fn cell_open(&self, point: GridPoint) -> bool {
        match self.endpoints {
            Some((start, end)) if point == start || point == end => self.grid.contains(point),
            _ => !self.grid.is_blocked(point),
        }
    }

    /// Whether the straight run from `from` to `to` avoids obstacles and
    /// lanes claimed by other connections.
    pub fn segment_free(&self, from: GridPoint, to: GridPoint) -> bool {
        if from == to {
            return self.cell_open(from);
        }
        let Some(direction) = segment_direction(from, to) else {
            return false;
        };
        if !self.cell_open(from) {
            return false;
        }
        let mut cur = from;
        while cur != to {
            let next = cur.step(direction);
            if !self.cell_open(next)
                || !self.grid.is_lane_free(cur, self.connection, direction)
                || !self.grid.is_lane_free(next, self.connection, direction.opposite())
            {
                return false;
            }
            cur = next;
        }
        true
    }
}

/// Everything the cleanup stages need to know about one path.
#[derive(Debug, Clone, Copy)]
pub struct CleanupContext<'a> {
    pub guard: PathGuard<'a>,
    pub existing: &'a ExistingPaths,
    /// Minimum spacing to other paths, in cells.
    pub spacing: i32,
    /// Centre column of the corridor the path runs through, if any.
    pub corridor_center: Option<i32>,
    /// Travel direction arriving at the first waypoint.
    pub entry: Option<GridDirection>,
    /// Travel direction leaving the last waypoint.
    pub exit: Option<GridDirection>,
    pub remove_zigzags: bool,
    pub simplify: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MoveGoal {
    Spacing,
    Overlap,
}

fn segment_key(a: GridPoint, b: GridPoint) -> (GridPoint, GridPoint) {
    if a <= b { (a, b) } else { (b, a) }
}

impl<'a> CleanupContext<'a> {
    fn others(&self) -> impl Iterator<Item = &'a [GridPoint]> {
        let own = self.guard.connection;
        self.existing
            .iter()
            .filter(move |(id, _)| **id != own)
            .map(|(_, path)| path.as_slice())
    }

    fn turns(&self, path: &[GridPoint]) -> usize {
        count_turns(path, self.entry, self.exit)
    }

    /// Same endpoints, strictly orthogonal, and every new segment passes the
    /// guard. Segments already present in `original` are taken as-is.
    fn is_valid(&self, original: &[GridPoint], candidate: &[GridPoint]) -> bool {
        if candidate.is_empty()
            || candidate.first() != original.first()
            || candidate.last() != original.last()
        {
            return false;
        }
        let known: HashSet<(GridPoint, GridPoint)> = original
            .windows(2)
            .map(|pair| segment_key(pair[0], pair[1]))
            .collect();
        candidate.windows(2).all(|pair| {
            pair[0].is_aligned_with(pair[1])
                && (known.contains(&segment_key(pair[0], pair[1]))
                    || self.guard.segment_free(pair[0], pair[1]))
        })
    }

    fn simpler(
        &self,
        original: &[GridPoint],
        candidate: Vec<GridPoint>,
        entry: Option<GridDirection>,
        exit: Option<GridDirection>,
    ) -> Option<Vec<GridPoint>> {
        let candidate = merge_collinear(&candidate);
        if candidate == original || !self.is_valid(original, &candidate) {
            return None;
        }
        (count_turns(&candidate, entry, exit) < count_turns(original, entry, exit))
            .then_some(candidate)
    }

    fn moved(
        &self,
        original: &[GridPoint],
        candidate: Vec<GridPoint>,
        goal: MoveGoal,
    ) -> Option<Vec<GridPoint>> {
        let candidate = merge_collinear(&candidate);
        if candidate == original || !self.is_valid(original, &candidate) {
            return None;
        }
        if self.turns(&candidate) > self.turns(original) {
            return None;
        }
        let overlap_before = self.overlap_length(original);
        let overlap_after = self.overlap_length(&candidate);
        let better = match goal {
            MoveGoal::Overlap => overlap_after < overlap_before,
            MoveGoal::Spacing => {
                overlap_after <= overlap_before
                    && self.spacing_shortfall(&candidate) < self.spacing_shortfall(original)
            }
        };
        better.then_some(candidate)
    }

    /// Signed perpendicular offset and shared length for every committed
    /// segment parallel to `from`-`to` whose span overlaps it.
    fn parallel_offsets(&self, from: GridPoint, to: GridPoint) -> Vec<(i32, i32)> {
        let mut offsets = Vec::new();
        if from == to || !from.is_aligned_with(to) {
            return offsets;
        }
        let horizontal = from.y == to.y;
        let span = |a: GridPoint, b: GridPoint| {
            if horizontal {
                (a.x.min(b.x), a.x.max(b.x), a.y)
            } else {
                (a.y.min(b.y), a.y.max(b.y), a.x)
            }
        };
        let (lo, hi, line) = span(from, to);
        for other in self.others() {
            for pair in other.windows(2) {
                let (a, b) = (pair[0], pair[1]);
                if a == b || !a.is_aligned_with(b) || (a.y == b.y) != horizontal {
                    continue;
                }
                let (other_lo, other_hi, other_line) = span(a, b);
                let shared = hi.min(other_hi) - lo.max(other_lo);
                if shared > 0 {
                    offsets.push((line - other_line, shared));
                }
            }
        }
        offsets
    }

    fn spacing_shortfall(&self, path: &[GridPoint]) -> i32 {
        path.windows(2)
            .flat_map(|pair| self.parallel_offsets(pair[0], pair[1]))
            .filter(|(offset, _)| offset.abs() < self.spacing)
            .map(|(offset, _)| self.spacing - offset.abs())
            .sum()
    }

    fn overlap_length(&self, path: &[GridPoint]) -> i32 {
        path.windows(2)
            .flat_map(|pair| self.parallel_offsets(pair[0], pair[1]))
            .filter(|(offset, _)| *offset == 0)
            .map(|(_, shared)| shared)
            .sum()
    }

    /// Side a segment should move to when nothing else decides: away from
    /// the corridor centre for vertical runs, otherwise positive.
    fn lean(&self, from: GridPoint, to: GridPoint) -> i32 {
        match self.corridor_center {
            Some(center) if from.x == to.x => {
                if from.x >= center {
                    1
                } else {
                    -1
                }
            }
            _ => 1,
        }
    }
}

/// Runs the full pipeline until the path stops changing.
pub fn clean_path(path: &[GridPoint], ctx: &CleanupContext<'_>) -> Vec<GridPoint> {
    let mut current = orthogonalize(&dedup_points(path), &ctx.guard);
    for _ in 0..MAX_CLEANUP_PASSES {
        let next = cleanup_pass(&current, ctx);
        if next == current {
            return current;
        }
        current = next;
    }
    debug!(
        connection = ctx.guard.connection,
        "cleanup pass cap reached before a fixed point"
    );
    current
}

fn cleanup_pass(path: &[GridPoint], ctx: &CleanupContext<'_>) -> Vec<GridPoint> {
    let guard = &ctx.guard;
    let mut current = path.to_vec();
    if ctx.remove_zigzags {
        current = orthogonalize(&remove_zigzags(&current, ctx), guard);
    }
    current = orthogonalize(&remove_boundary_reversals(&current, ctx), guard);
    current = orthogonalize(&remove_interior_reversals(&current, ctx), guard);
    if ctx.simplify {
        current = orthogonalize(&minimize_turns(&current, ctx), guard);
    }
    current = orthogonalize(&enforce_spacing(&current, ctx), guard);
    orthogonalize(&prevent_overlaps(&current, ctx), guard)
}

/// Splits every diagonal hop into an L. A corner whose legs are free wins;
/// otherwise the corner with the shorter first leg, horizontal on ties.
pub(crate) fn orthogonalize(path: &[GridPoint], guard: &PathGuard<'_>) -> Vec<GridPoint> {
    let mut out: Vec<GridPoint> = Vec::with_capacity(path.len() + 2);
    for &point in path {
        if let Some(&last) = out.last() {
            if !last.is_aligned_with(point) {
                out.push(choose_corner(last, point, guard));
            }
        }
        out.push(point);
    }
    dedup_points(&out)
}

fn choose_corner(from: GridPoint, to: GridPoint, guard: &PathGuard<'_>) -> GridPoint {
    let horizontal_first = GridPoint::new(to.x, from.y);
    let vertical_first = GridPoint::new(from.x, to.y);
    let free =
        |corner: GridPoint| guard.segment_free(from, corner) && guard.segment_free(corner, to);
    match (free(horizontal_first), free(vertical_first)) {
        (true, false) => horizontal_first,
        (false, true) => vertical_first,
        _ => {
            if (to.y - from.y).abs() < (to.x - from.x).abs() {
                vertical_first
            } else {
                horizontal_first
            }
        }
    }
}

fn splice(
    path: &[GridPoint],
    keep_through: usize,
    via: &[GridPoint],
    resume_at: usize,
) -> Vec<GridPoint> {
    let mut out = path[..=keep_through].to_vec();
    out.extend_from_slice(via);
    out.extend_from_slice(&path[resume_at..]);
    out
}

/// Orthogonal links from `from` to `to`: direct when aligned, otherwise via
/// either corner, the one continuing along `lead_horizontal` first.
fn corner_links(from: GridPoint, to: GridPoint, lead_horizontal: bool) -> Vec<Vec<GridPoint>> {
    if from.is_aligned_with(to) {
        return vec![Vec::new()];
    }
    let horizontal_first = GridPoint::new(to.x, from.y);
    let vertical_first = GridPoint::new(from.x, to.y);
    if lead_horizontal {
        vec![vec![horizontal_first], vec![vertical_first]]
    } else {
        vec![vec![vertical_first], vec![horizontal_first]]
    }
}

/// Collapses stair-steps (`d`, perpendicular, `d`) into a single corner.
pub(crate) fn remove_zigzags(path: &[GridPoint], ctx: &CleanupContext<'_>) -> Vec<GridPoint> {
    let mut current = path.to_vec();
    let mut index = 0;
    while index + 3 < current.len() {
        if let Some(next) = collapse_zigzag(&current, index, ctx) {
            current = next;
            index = index.saturating_sub(2);
            continue;
        }
        index += 1;
    }
    current
}

fn collapse_zigzag(
    path: &[GridPoint],
    index: usize,
    ctx: &CleanupContext<'_>,
) -> Option<Vec<GridPoint>> {
    let first = segment_direction(path[index], path[index + 1])?;
    let middle = segment_direction(path[index + 1], path[index + 2])?;
    let last = segment_direction(path[index + 2], path[index + 3])?;
    if first != last || !first.is_perpendicular_to(middle) {
        return None;
    }
    corner_links(path[index], path[index + 3], first.is_horizontal())
        .into_iter()
        .find_map(|link| {
            ctx.simpler(path, splice(path, index, &link, index + 3), ctx.entry, ctx.exit)
        })
}

/// Removes a first or last hop that doubles back against the lead-out.
pub(crate) fn remove_boundary_reversals(
    path: &[GridPoint],
    ctx: &CleanupContext<'_>,
) -> Vec<GridPoint> {
    let front = fix_leading_reversal(path, ctx, ctx.entry, ctx.exit);
    let reversed: Vec<GridPoint> = front.iter().rev().copied().collect();
    let mut back = fix_leading_reversal(
        &reversed,
        ctx,
        ctx.exit.map(GridDirection::opposite),
        ctx.entry.map(GridDirection::opposite),
    );
    back.reverse();
    back
}

fn fix_leading_reversal(
    path: &[GridPoint],
    ctx: &CleanupContext<'_>,
    entry: Option<GridDirection>,
    exit: Option<GridDirection>,
) -> Vec<GridPoint> {
    let Some(entry) = entry else {
        return path.to_vec();
    };
    if path.len() < 3 || segment_direction(path[0], path[1]) != Some(entry.opposite()) {
        return path.to_vec();
    }
    let origin = path[0];
    let heads: Vec<Option<GridPoint>> = std::iter::once(None)
        .chain((1..=REVERSAL_DETOUR_CELLS).map(|step| Some(origin.offset(entry, step))))
        .collect();
    for resume in 2..path.len() {
        for head in &heads {
            let link_from = head.unwrap_or(origin);
            for link in corner_links(link_from, path[resume], entry.is_horizontal()) {
                let mut candidate = vec![origin];
                candidate.extend(*head);
                candidate.extend(link);
                candidate.extend_from_slice(&path[resume..]);
                if let Some(fixed) = ctx.simpler(path, candidate, Some(entry), exit) {
                    return fixed;
                }
            }
        }
    }
    path.to_vec()
}

/// Drops spike points where a segment is immediately retraced.
pub(crate) fn remove_interior_reversals(
    path: &[GridPoint],
    ctx: &CleanupContext<'_>,
) -> Vec<GridPoint> {
    let mut current = path.to_vec();
    for _ in 0..MAX_REVERSAL_SWEEPS {
        let Some(next) = drop_first_spike(&current, ctx) else {
            return current;
        };
        current = next;
    }
    debug!(
        connection = ctx.guard.connection,
        "interior reversal sweep cap reached"
    );
    current
}

fn drop_first_spike(path: &[GridPoint], ctx: &CleanupContext<'_>) -> Option<Vec<GridPoint>> {
    (1..path.len().saturating_sub(1)).find_map(|index| {
        let incoming = segment_direction(path[index - 1], path[index])?;
        let outgoing = segment_direction(path[index], path[index + 1])?;
        if incoming != outgoing.opposite() {
            return None;
        }
        let mut candidate = path.to_vec();
        candidate.remove(index);
        ctx.simpler(path, candidate, ctx.entry, ctx.exit)
    })
}

pub(crate) fn minimize_turns(path: &[GridPoint], ctx: &CleanupContext<'_>) -> Vec<GridPoint> {
    let mut current = merge_collinear(path);
    for _ in 0..MAX_TURN_ROUNDS {
        let mut next = remove_unnecessary_corners(&current, ctx);
        next = collapse_detours(&next, ctx);
        next = shortcut_aligned(&next, ctx);
        next = merge_collinear(&next);
        if next == current {
            return current;
        }
        current = next;
    }
    debug!(
        connection = ctx.guard.connection,
        "turn minimisation round cap reached"
    );
    current
}

/// U-shaped detours whose ends already share a row or column.
fn remove_unnecessary_corners(path: &[GridPoint], ctx: &CleanupContext<'_>) -> Vec<GridPoint> {
    let mut current = path.to_vec();
    let mut index = 0;
    while index + 3 < current.len() {
        if let Some(next) = straighten_corner_pair(&current, index, ctx) {
            current = next;
            index = index.saturating_sub(1);
            continue;
        }
        index += 1;
    }
    current
}

fn straighten_corner_pair(
    path: &[GridPoint],
    index: usize,
    ctx: &CleanupContext<'_>,
) -> Option<Vec<GridPoint>> {
    let first = segment_direction(path[index], path[index + 1])?;
    let middle = segment_direction(path[index + 1], path[index + 2])?;
    let last = segment_direction(path[index + 2], path[index + 3])?;
    if !first.is_perpendicular_to(middle) || !last.is_perpendicular_to(middle) {
        return None;
    }
    if !is_straight_line(path[index], path[index + 3]) {
        return None;
    }
    ctx.simpler(path, splice(path, index, &[], index + 3), ctx.entry, ctx.exit)
}

/// Windows that start and end in the same direction with at least two
/// changes in between, replaced by at most one corner.
fn collapse_detours(path: &[GridPoint], ctx: &CleanupContext<'_>) -> Vec<GridPoint> {
    let mut current = path.to_vec();
    let mut index = 0;
    while index < current.len() {
        match collapse_detour_at(&current, index, ctx) {
            Some(next) => current = next,
            None => index += 1,
        }
    }
    current
}

fn collapse_detour_at(
    path: &[GridPoint],
    index: usize,
    ctx: &CleanupContext<'_>,
) -> Option<Vec<GridPoint>> {
    let lead = segment_direction(path[index], *path.get(index + 1)?)?;
    for span in DETOUR_SPANS {
        let end = index + span;
        if end >= path.len() {
            break;
        }
        if segment_direction(path[end - 1], path[end]) != Some(lead) {
            continue;
        }
        if count_turns(&path[index..=end], None, None) < 2 {
            continue;
        }
        for link in corner_links(path[index], path[end], lead.is_horizontal()) {
            let spliced = splice(path, index, &link, end);
            if let Some(next) = ctx.simpler(path, spliced, ctx.entry, ctx.exit) {
                return Some(next);
            }
        }
    }
    None
}

/// Greedily joins each waypoint to the furthest later waypoint it is
/// aligned with.
fn shortcut_aligned(path: &[GridPoint], ctx: &CleanupContext<'_>) -> Vec<GridPoint> {
    let mut current = path.to_vec();
    let mut index = 0;
    while index + 2 < current.len() {
        let shortcut = (index + 2..current.len())
            .rev()
            .filter(|&target| is_straight_line(current[index], current[target]))
            .find_map(|target| {
                ctx.simpler(&current, splice(&current, index, &[], target), ctx.entry, ctx.exit)
            });
        match shortcut {
            Some(next) => current = next,
            None => index += 1,
        }
    }
    current
}

fn shift_segment(path: &[GridPoint], index: usize, delta: i32) -> Vec<GridPoint> {
    let mut out = path.to_vec();
    let horizontal = path[index].y == path[index + 1].y;
    for point in &mut out[index..=index + 1] {
        if horizontal {
            point.y += delta;
        } else {
            point.x += delta;
        }
    }
    out
}

/// Pushes interior segments apart from parallel committed segments that are
/// closer than the minimum spacing.
pub(crate) fn enforce_spacing(path: &[GridPoint], ctx: &CleanupContext<'_>) -> Vec<GridPoint> {
    let mut current = path.to_vec();
    if ctx.spacing <= 0 {
        return current;
    }
    for _ in 0..MAX_SEGMENT_MOVES {
        match spacing_move(&current, ctx) {
            Some(next) => current = next,
            None => break,
        }
    }
    current
}

fn spacing_move(path: &[GridPoint], ctx: &CleanupContext<'_>) -> Option<Vec<GridPoint>> {
    if path.len() < 4 {
        return None;
    }
    for index in 1..path.len() - 2 {
        let (from, to) = (path[index], path[index + 1]);
        let Some(closest) = ctx
            .parallel_offsets(from, to)
            .into_iter()
            .map(|(offset, _)| offset)
            .filter(|offset| offset.abs() < ctx.spacing)
            .min_by_key(|offset| (offset.abs(), *offset))
        else {
            continue;
        };
        let away = if closest == 0 {
            ctx.lean(from, to)
        } else {
            closest.signum()
        };
        let deltas = [
            away * (ctx.spacing - closest.abs()),
            -away * (ctx.spacing + closest.abs()),
        ];
        for delta in deltas {
            let shifted = shift_segment(path, index, delta);
            if let Some(next) = ctx.moved(path, shifted, MoveGoal::Spacing) {
                return Some(next);
            }
        }
    }
    None
}

/// Moves interior segments that run exactly on top of a committed segment
/// one spacing to either side.
pub(crate) fn prevent_overlaps(path: &[GridPoint], ctx: &CleanupContext<'_>) -> Vec<GridPoint> {
    let mut current = path.to_vec();
    for _ in 0..MAX_SEGMENT_MOVES {
        match overlap_move(&current, ctx) {
            Some(next) => current = next,
            None => break,
        }
    }
    current
}

fn overlap_move(path: &[GridPoint], ctx: &CleanupContext<'_>) -> Option<Vec<GridPoint>> {
    if path.len() < 4 {
        return None;
    }
    let spacing = ctx.spacing.max(1);
    for index in 1..path.len() - 2 {
        let (from, to) = (path[index], path[index + 1]);
        let overlapping = ctx
            .parallel_offsets(from, to)
            .iter()
            .any(|(offset, _)| *offset == 0);
        if !overlapping {
            continue;
        }
        let away = ctx.lean(from, to);
        for delta in [away * spacing, -away * spacing] {
            let shifted = shift_segment(path, index, delta);
            if let Some(next) = ctx.moved(path, shifted, MoveGoal::Overlap) {
                return Some(next);
            }
        }
    }
    None
}

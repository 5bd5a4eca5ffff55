//! Viewport navigation over the infinite tile tree.
//!
//! The viewport is an `offset` (tile pixels) and a `scale` (screen pixels per
//! tile pixel) relative to the *current grid*, plus a stack of grid positions
//! leading from the root down to it. [`Navigator::settle`] re-roots the view
//! whenever the scale leaves `[1, tile_size]` or the visible corner leaves the
//! current grid, so floating point values stay in a comfortable range at any
//! depth. [`Navigator::plan`] then resolves the (at most four) neighbouring
//! grids that cover the screen.

use std::ops::Range;

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::error::CoreError;
use crate::identity::NodeId;
use crate::tree::{TileImage, TileTree, WaitKey};

/// Integer pixel position within a grid, one per descended level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridPos {
    pub x: u32,
    pub y: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Offset {
    pub x: f64,
    pub y: f64,
}

/// Serializable description of a view, used for export metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewSnapshot {
    pub offset: Offset,
    pub scale: f64,
    pub depth: usize,
    pub stack: Vec<GridPos>,
}

/// One grid to draw: a node and where its top-left corner lands on screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    pub node: NodeId,
    /// `(i, j)` in `{0, 1}²` relative to the current grid.
    pub neighbour: (u32, u32),
    /// Screen x of the grid origin.
    pub x: f64,
    /// Screen y of the grid origin.
    pub y: f64,
    /// Screen side length of the whole grid.
    pub size: f64,
    /// Screen pixels per tile pixel.
    pub scale: f64,
    tile_size: u32,
}

impl Region {
    /// Ranges of tile pixels of this grid that intersect the screen.
    pub fn pixel_window(&self) -> (Range<u32>, Range<u32>) {
        let axis = |origin: f64| {
            let side = self.tile_size as f64;
            // The end follows the unclamped start: a grid whose origin is on
            // screen only shows as many pixels as fit before the edge.
            let raw = (-origin / self.scale).floor();
            let end = (raw + (side / self.scale).ceil() + 1.0).min(side);
            let start = raw.max(0.0);
            start as u32..end.max(start) as u32
        };
        (axis(self.x), axis(self.y))
    }
}

/// Everything needed to draw one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub scale: f64,
    pub depth: usize,
    pub regions: Vec<Region>,
    /// Neighbours that would lie beyond the root image.
    pub outside_root: usize,
    /// Neighbours skipped because a tile on their path failed to load.
    pub unavailable: usize,
}

/// Result of [`Navigator::plan`].
#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    Ready(Frame),
    /// An ancestor is still loading; a render wait has been registered on it.
    Blocked { node: NodeId },
}

const NEIGHBOURS: [(u32, u32); 4] = [(0, 0), (1, 0), (0, 1), (1, 1)];

/// How far inside the grid a corner is placed when rounding pushed it out.
const CORNER_MARGIN: f64 = 1e-9;

#[derive(Debug, Clone)]
pub struct Navigator {
    offset: Offset,
    scale: f64,
    stack: Vec<GridPos>,
    tile_size: u32,
}

impl Navigator {
    /// A view of the whole root at scale 1.
    pub fn new(tile_size: u32) -> crate::Result<Self> {
        Self::at(tile_size, Offset::default(), 1.0, Vec::new())
    }

    /// A view at an explicit position. Not settled until the next
    /// [`settle`](Self::settle) or [`plan`](Self::plan).
    pub fn at(tile_size: u32, offset: Offset, scale: f64, stack: Vec<GridPos>) -> crate::Result<Self> {
        if tile_size == 0 {
            return Err(CoreError::InvalidTileSize(tile_size));
        }
        if let Some(bad) = stack.iter().find(|p| p.x >= tile_size || p.y >= tile_size) {
            return Err(CoreError::InvalidViewport {
                reason: format!("stack entry {bad:?} outside a {tile_size}-pixel grid"),
            });
        }
        let nav = Self {
            offset,
            scale,
            stack,
            tile_size,
        };
        nav.check()?;
        Ok(nav)
    }

    pub fn offset(&self) -> Offset {
        self.offset
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn stack(&self) -> &[GridPos] {
        &self.stack
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        ViewSnapshot {
            offset: self.offset,
            scale: self.scale,
            depth: self.stack.len(),
            stack: self.stack.clone(),
        }
    }

    /// Back to the whole root at scale 1.
    pub fn reset(&mut self) {
        self.offset = Offset::default();
        self.scale = 1.0;
        self.stack.clear();
    }

    /// Move by a screen-space delta.
    pub fn pan(&mut self, dx: f64, dy: f64) {
        if !(dx.is_finite() && dy.is_finite()) {
            return;
        }
        self.offset.x += dx / self.scale;
        self.offset.y += dy / self.scale;
    }

    /// Multiply the scale by `factor`, keeping the tile point under the
    /// screen position `(origin_x, origin_y)` fixed.
    pub fn zoom_at(&mut self, origin_x: f64, origin_y: f64, factor: f64) {
        if !(factor.is_finite() && factor > 0.0 && origin_x.is_finite() && origin_y.is_finite()) {
            return;
        }
        let c = self.half();
        let old = self.scale;
        let new = old * factor;
        if !(new.is_finite() && new > 0.0) {
            return;
        }
        self.offset.x += (origin_x - c) * (1.0 / new - 1.0 / old);
        self.offset.y += (origin_y - c) * (1.0 / new - 1.0 / old);
        self.scale = new;
    }

    fn half(&self) -> f64 {
        self.tile_size as f64 / 2.0
    }

    fn check(&self) -> crate::Result<()> {
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(CoreError::InvalidViewport {
                reason: format!("scale must be finite and positive, got {}", self.scale),
            });
        }
        if !(self.offset.x.is_finite() && self.offset.y.is_finite()) {
            return Err(CoreError::InvalidViewport {
                reason: format!("offset must be finite, got {:?}", self.offset),
            });
        }
        Ok(())
    }

    /// Upper bound on the number of settle steps for the current state.
    ///
    /// Each stack entry can be popped once and pushed back once, and the scale
    /// can produce one descent per factor of `tile_size`.
    fn step_budget(&self) -> usize {
        let side = self.tile_size as f64;
        let descents = if self.scale > 1.0 && side > 1.0 {
            (self.scale.ln() / side.ln()).ceil().min(u32::MAX as f64) as usize
        } else {
            0
        };
        self.stack
            .len()
            .saturating_mul(2)
            .saturating_add(descents)
            .saturating_add(4)
    }

    /// Clamp the root view so the root image always fills the screen.
    fn clamp_root(&mut self) {
        let c = self.half();
        self.scale = self.scale.max(1.0);
        let max_offset = c - c / self.scale;
        self.offset.x = self.offset.x.clamp(-max_offset, max_offset);
        self.offset.y = self.offset.y.clamp(-max_offset, max_offset);
    }

    /// Fractional tile pixel under the screen's top-left corner.
    fn corner(&self) -> (f64, f64) {
        let c = self.half();
        let inset = c - c / self.scale;
        (inset - self.offset.x, inset - self.offset.y)
    }

    /// Pull a corner that rounding left just outside the current grid back
    /// inside it. Only needed right after a descent.
    fn pull_corner_inside(&mut self) {
        let side = self.tile_size as f64;
        let inset = self.half() - self.half() / self.scale;
        let (cx, cy) = self.corner();
        let inner = CORNER_MARGIN..side - CORNER_MARGIN;
        for (corner, offset) in [(cx, &mut self.offset.x), (cy, &mut self.offset.y)] {
            if !(0.0..side).contains(&corner) {
                *offset = inset - corner.clamp(inner.start, inner.end);
            }
        }
    }

    /// Ascend and descend until the scale is within `[1, tile_size]` and the
    /// visible top-left pixel lies in the current grid. Returns the number of
    /// steps taken.
    pub fn settle(&mut self) -> crate::Result<usize> {
        self.check()?;
        let side = self.tile_size as f64;
        let c = self.half();
        let budget = self.step_budget();

        for step in 0..=budget {
            if self.stack.is_empty() {
                self.clamp_root();
            }
            let (cx, cy) = self.corner();
            let (x_start, y_start) = (cx.floor(), cy.floor());
            let inside = (0.0..side).contains(&x_start) && (0.0..side).contains(&y_start);
            let x1 = (self.offset.x - c) * self.scale;
            let y1 = (self.offset.y - c) * self.scale;

            if !self.stack.is_empty() && (!inside || self.scale < 1.0) {
                let Some(pos) = self.stack.pop() else { break };
                self.scale *= side;
                self.offset.x = x1 / self.scale + c - pos.x as f64;
                self.offset.y = y1 / self.scale + c - pos.y as f64;
                trace!(depth = self.stack.len(), scale = self.scale, "ascended");
            } else if self.scale > side {
                let pos = GridPos {
                    x: x_start.clamp(0.0, side - 1.0) as u32,
                    y: y_start.clamp(0.0, side - 1.0) as u32,
                };
                self.stack.push(pos);
                self.scale /= side;
                self.offset.x = (x1 + pos.x as f64 * self.scale * side) / self.scale + c;
                self.offset.y = (y1 + pos.y as f64 * self.scale * side) / self.scale + c;
                self.pull_corner_inside();
                trace!(depth = self.stack.len(), scale = self.scale, x = pos.x, y = pos.y, "descended");
            } else {
                return Ok(step);
            }
        }
        Err(CoreError::Unsettled { steps: budget })
    }

    /// Settle, then resolve the grids covering the screen.
    ///
    /// Walking the stack materializes the ancestor chain on demand. If any
    /// tile on that path is not ready yet, a [`WaitKey::RENDER`] wait is left
    /// on it and [`Plan::Blocked`] is returned.
    pub fn plan<I: TileImage>(&mut self, tree: &mut TileTree<I>) -> crate::Result<Plan> {
        self.settle()?;
        let side = self.tile_size;
        let c = self.half();
        let size = side as f64 * self.scale;
        let x1 = (self.offset.x - c) * self.scale;
        let y1 = (self.offset.y - c) * self.scale;
        let n = self.stack.len();

        let mut frame = Frame {
            scale: self.scale,
            depth: n,
            regions: Vec::with_capacity(NEIGHBOURS.len()),
            outside_root: 0,
            unavailable: 0,
        };
        let region = |node, (i, j): (u32, u32)| Region {
            node,
            neighbour: (i, j),
            x: x1 + i as f64 * size + c,
            y: y1 + j as f64 * size + c,
            size,
            scale: self.scale,
            tile_size: side,
        };

        if n == 0 {
            frame.regions.push(region(tree.root(), (0, 0)));
            return Ok(Plan::Ready(frame));
        }

        // chain[k] is the node at level k; the current grid is level n.
        let mut chain = Vec::with_capacity(n);
        chain.push(tree.root());
        for pos in &self.stack[..n - 1] {
            let Some(&node) = chain.last() else { break };
            if tree.await_ready(node, WaitKey::RENDER) {
                return Ok(Plan::Blocked { node });
            }
            chain.push(tree.child_at(node, pos.x, pos.y)?);
        }

        'neighbours: for (i, j) in NEIGHBOURS {
            let out = region(tree.root(), (i, j));
            if out.x >= side as f64 || out.y >= side as f64 {
                continue;
            }

            // Walk up while the shifted coordinate overflows its grid,
            // recording which levels receive a carry.
            let mut x_in = vec![false; n];
            let mut y_in = vec![false; n];
            x_in[n - 1] = true;
            y_in[n - 1] = true;
            let mut idx = n - 1;
            let mut x = self.stack[idx].x + i;
            let mut y = self.stack[idx].y + j;
            let mut cx = x >= side;
            let mut cy = y >= side;
            while idx > 0 && (cx || cy) {
                idx -= 1;
                x_in[idx] = cx;
                y_in[idx] = cy;
                x = self.stack[idx].x + if cx { i } else { 0 };
                y = self.stack[idx].y + if cy { j } else { 0 };
                cx = x >= side;
                cy = y >= side;
            }
            if cx || cy {
                warn!(i, j, depth = n, "neighbour lies outside the root tile");
                frame.outside_root += 1;
                continue;
            }

            // Walk back down, wrapping the carried coordinates.
            let mut node = chain[idx];
            loop {
                if tree.await_ready(node, WaitKey::RENDER) {
                    return Ok(Plan::Blocked { node });
                }
                node = match tree.child_at(node, x, y) {
                    Ok(child) => child,
                    Err(err @ CoreError::TileUnavailable { .. }) => {
                        warn!(i, j, error = %err, "skipping neighbour");
                        frame.unavailable += 1;
                        continue 'neighbours;
                    }
                    Err(err) => return Err(err),
                };
                idx += 1;
                if idx == n {
                    break;
                }
                x = (self.stack[idx].x + if x_in[idx] { i } else { 0 }) % side;
                y = (self.stack[idx].y + if y_in[idx] { j } else { 0 }) % side;
            }
            frame.regions.push(Region { node, ..out });
        }
        Ok(Plan::Ready(frame))
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::endpoints::Endpoints;
    use crate::tree::tests::{spec, Plane};
    use crate::tree::ROOT_ID;

    const S: u32 = 600;

    fn pos(x: u32, y: u32) -> GridPos {
        GridPos { x, y }
    }

    /// A tree where every tile is the root source, so every node is ready
    /// as soon as it is created.
    fn self_similar(size: u32) -> TileTree<Plane> {
        let mut tree = TileTree::new(ROOT_ID, size, Endpoints::default(), 5).unwrap();
        let root = tree.root();
        let path = tree.source_path(root);
        tree.image_loaded(&path, Ok(Plane::uniform(size, 0)));
        tree.spec_loaded(ROOT_ID, Ok(spec(&[ROOT_ID], &[ROOT_ID])));
        tree
    }

    fn frame(plan: Plan) -> Frame {
        match plan {
            Plan::Ready(frame) => frame,
            Plan::Blocked { node } => panic!("unexpectedly blocked on {node}"),
        }
    }

    #[test]
    fn zooming_past_the_tile_size_descends_one_level() {
        let mut nav = Navigator::at(S, Offset::default(), S as f64 + 1.0, Vec::new()).unwrap();
        nav.settle().unwrap();
        assert_eq!(nav.depth(), 1);
        assert!((nav.scale() - (S as f64 + 1.0) / S as f64).abs() < 1e-12);
        assert_eq!(nav.stack(), [pos(299, 299)]);
    }

    #[test]
    fn shrinking_below_one_ascends_and_clamps() {
        let mut nav = Navigator::at(S, Offset::default(), 0.5, vec![pos(10, 20)]).unwrap();
        let steps = nav.settle().unwrap();
        assert_eq!(steps, 1);
        assert_eq!(nav.depth(), 0);
        assert_eq!(nav.scale(), 300.0);
        assert_eq!(nav.offset(), Offset { x: 289.5, y: 279.5 });
    }

    #[test]
    fn root_view_is_clamped() {
        let mut nav = Navigator::at(S, Offset { x: 1000.0, y: -1000.0 }, 2.0, Vec::new()).unwrap();
        nav.settle().unwrap();
        assert_eq!(nav.offset(), Offset { x: 150.0, y: -150.0 });

        let mut nav = Navigator::at(S, Offset::default(), 0.25, Vec::new()).unwrap();
        nav.settle().unwrap();
        assert_eq!(nav.scale(), 1.0);
    }

    #[test]
    fn settling_terminates_and_is_idempotent() {
        let mut rng = StdRng::seed_from_u64(0x7u64);
        for _ in 0..500 {
            let depth = rng.gen_range(0..8);
            let stack = (0..depth).map(|_| pos(rng.gen_range(0..S), rng.gen_range(0..S))).collect();
            let scale = 10f64.powf(rng.gen_range(-6.0..12.0));
            let offset = Offset {
                x: rng.gen_range(-5000.0..5000.0),
                y: rng.gen_range(-5000.0..5000.0),
            };
            let mut nav = Navigator::at(S, offset, scale, stack).unwrap();
            let budget = nav.step_budget();
            let steps = nav.settle().unwrap();
            assert!(steps <= budget);
            assert_eq!(nav.settle().unwrap(), 0, "no ping-pong after settling");

            let side = S as f64;
            assert!(nav.scale() <= side);
            if nav.depth() > 0 {
                assert!(nav.scale() >= 1.0);
                let (cx, cy) = nav.corner();
                assert!((0.0..side).contains(&cx.floor()));
                assert!((0.0..side).contains(&cy.floor()));
            }
        }
    }

    #[test]
    fn huge_zoom_at_the_root_corner_settles_fully() {
        let mut nav = Navigator::new(8).unwrap();
        nav.zoom_at(0.0, 0.0, 1.01e6);
        nav.settle().unwrap();
        assert_eq!(nav.depth(), 6);
        assert_eq!(nav.stack(), [pos(0, 0); 6]);
        assert!(nav.scale() >= 1.0 && nav.scale() <= 8.0, "scale {}", nav.scale());
        assert!((nav.scale() - 1.01e6 / 8f64.powi(6)).abs() < 1e-6);
        assert_eq!(nav.settle().unwrap(), 0);

        for (x, y) in [(8.0, 8.0), (0.0, 8.0), (8.0, 0.0)] {
            let mut nav = Navigator::new(8).unwrap();
            nav.zoom_at(x, y, 3.7e9);
            nav.settle().unwrap();
            assert!(nav.scale() <= 8.0, "corner ({x}, {y}) left scale {}", nav.scale());
            assert_eq!(nav.settle().unwrap(), 0, "corner ({x}, {y})");
        }
    }

    #[test]
    fn invalid_viewports_are_rejected() {
        assert!(matches!(
            Navigator::at(S, Offset::default(), f64::NAN, Vec::new()),
            Err(CoreError::InvalidViewport { .. })
        ));
        assert!(matches!(
            Navigator::at(S, Offset::default(), 0.0, Vec::new()),
            Err(CoreError::InvalidViewport { .. })
        ));
        let mut nav = Navigator::new(S).unwrap();
        nav.zoom_at(0.0, 0.0, f64::INFINITY);
        nav.pan(f64::NAN, 1.0);
        assert_eq!(nav.scale(), 1.0);
        assert_eq!(nav.offset(), Offset::default());
    }

    #[test]
    fn zoom_keeps_the_point_under_the_cursor() {
        let mut nav = Navigator::at(S, Offset { x: 12.0, y: -7.0 }, 3.0, vec![pos(1, 1)]).unwrap();
        let c = S as f64 / 2.0;
        let tile_point = |nav: &Navigator, mx: f64| (mx - c) / nav.scale() - nav.offset().x + c;
        let before = tile_point(&nav, 450.0);
        nav.zoom_at(450.0, 100.0, 1.7);
        assert!((tile_point(&nav, 450.0) - before).abs() < 1e-9);
        assert!((nav.scale() - 5.1).abs() < 1e-12);
    }

    #[test]
    fn pan_moves_by_screen_pixels() {
        let mut nav = Navigator::at(S, Offset::default(), 4.0, vec![pos(0, 0)]).unwrap();
        nav.pan(8.0, -2.0);
        assert_eq!(nav.offset(), Offset { x: 2.0, y: -0.5 });
    }

    #[test]
    fn fresh_view_is_the_root_alone() {
        let mut tree: TileTree<Plane> = TileTree::new(ROOT_ID, S, Endpoints::default(), 1).unwrap();
        let mut nav = Navigator::new(S).unwrap();
        let frame = frame(nav.plan(&mut tree).unwrap());
        assert_eq!(frame.regions.len(), 1);
        let region = frame.regions[0];
        assert_eq!(region.node, tree.root());
        assert_eq!((region.x, region.y, region.size), (0.0, 0.0, S as f64));
        assert_eq!(region.pixel_window(), (0..S, 0..S));
    }

    #[test]
    fn unready_ancestors_block_the_plan() {
        let mut tree: TileTree<Plane> = TileTree::new(ROOT_ID, 4, Endpoints::default(), 1).unwrap();
        let mut nav = Navigator::at(4, Offset::default(), 2.0, vec![pos(1, 1), pos(2, 2)]).unwrap();
        let root = tree.root();
        assert_eq!(nav.plan(&mut tree).unwrap(), Plan::Blocked { node: root });
        assert_eq!(tree.waiting(root), [WaitKey::RENDER]);
        assert_eq!(nav.plan(&mut tree).unwrap(), Plan::Blocked { node: root });
        assert_eq!(tree.waiting(root), [WaitKey::RENDER], "one render wait per node");
    }

    #[test]
    fn right_neighbour_carries_through_two_levels() {
        let mut tree = self_similar(4);
        let stack = vec![pos(1, 0), pos(3, 1), pos(3, 2)];
        // Scale 1.5 with the grid origin at screen x = -2.5: the right
        // neighbour starts at 3.5, inside the 4-pixel screen.
        let mut nav = Navigator::at(4, Offset { x: -1.0, y: 0.0 }, 1.5, stack).unwrap();
        let frame = frame(nav.plan(&mut tree).unwrap());
        assert_eq!(nav.depth(), 3, "view was already settled");

        let root = tree.root();
        let descend = |tree: &mut TileTree<Plane>, path: &[(u32, u32)]| {
            path.iter()
                .fold(root, |node, &(x, y)| tree.child_at(node, x, y).unwrap())
        };
        let current = descend(&mut tree, &[(1, 0), (3, 1), (3, 2)]);
        let right = descend(&mut tree, &[(2, 0), (0, 1), (0, 2)]);

        let nodes: Vec<_> = frame.regions.iter().map(|r| (r.neighbour, r.node)).collect();
        assert_eq!(nodes, vec![((0, 0), current), ((1, 0), right)]);
        assert_eq!(frame.outside_root, 0);
        assert!((frame.regions[1].x - 3.5).abs() < 1e-12);
        assert_eq!(frame.regions[0].pixel_window().0, 1..4);
        assert_eq!(frame.regions[1].pixel_window().0, 0..1, "one column fits on screen");
    }

    #[test]
    fn neighbour_windows_stop_at_the_screen_edge() {
        let region = Region {
            node: NodeId(0),
            neighbour: (1, 0),
            x: 300.0,
            y: 0.0,
            size: S as f64 * 5.0,
            scale: 5.0,
            tile_size: S,
        };
        let (xs, ys) = region.pixel_window();
        assert_eq!(xs, 0..61);
        assert_eq!(ys, 0..121);
    }

    #[test]
    fn all_four_neighbours_carry_in_both_axes() {
        let mut tree = self_similar(4);
        let stack = vec![pos(1, 1), pos(3, 3), pos(3, 3)];
        let mut nav = Navigator::at(4, Offset { x: -1.0, y: -1.0 }, 1.5, stack).unwrap();
        let frame = frame(nav.plan(&mut tree).unwrap());
        assert_eq!(nav.depth(), 3);

        let root = tree.root();
        let mut descend = |path: &[(u32, u32)]| {
            path.iter()
                .fold(root, |node, &(x, y)| tree.child_at(node, x, y).unwrap())
        };
        let expected = vec![
            ((0, 0), descend(&[(1, 1), (3, 3), (3, 3)])),
            ((1, 0), descend(&[(2, 1), (0, 3), (0, 3)])),
            ((0, 1), descend(&[(1, 2), (3, 0), (3, 0)])),
            ((1, 1), descend(&[(2, 2), (0, 0), (0, 0)])),
        ];
        let nodes: Vec<_> = frame.regions.iter().map(|r| (r.neighbour, r.node)).collect();
        assert_eq!(nodes, expected);
        assert_eq!(frame.outside_root, 0);
        assert_eq!(frame.unavailable, 0);
    }

    #[test]
    fn carry_waits_on_an_unready_cousin() {
        let mut tree: TileTree<Plane> = TileTree::new(ROOT_ID, 4, Endpoints::default(), 5).unwrap();
        let root = tree.root();
        let path = tree.source_path(root);
        // Left half dark (the root again), right half light (still loading).
        let red = (0..16).map(|i| if i % 4 < 2 { 0 } else { 255 }).collect();
        tree.image_loaded(&path, Ok(Plane { width: 4, height: 4, red }));
        tree.spec_loaded(ROOT_ID, Ok(spec(&[ROOT_ID], &["other"])));

        let mut nav = Navigator::at(4, Offset { x: -1.0, y: 0.0 }, 1.5, vec![pos(1, 0), pos(3, 0)]).unwrap();
        let plan = nav.plan(&mut tree).unwrap();

        let cousin = tree.child_at(root, 2, 0).unwrap();
        assert_eq!(tree.source_id(cousin), "other");
        assert_eq!(plan, Plan::Blocked { node: cousin });
        assert_eq!(tree.waiting(cousin), [WaitKey::RENDER]);
        assert!(tree.waiting(root).is_empty());
    }

    #[test]
    fn neighbours_beyond_the_root_are_counted_and_skipped() {
        let mut tree = self_similar(4);
        let mut nav = Navigator::at(4, Offset { x: -1.0, y: 0.0 }, 1.5, vec![pos(3, 0)]).unwrap();
        let frame = frame(nav.plan(&mut tree).unwrap());
        assert_eq!(frame.regions.len(), 1);
        assert_eq!(frame.outside_root, 1);
    }
}

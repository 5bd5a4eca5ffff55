use std::collections::HashMap;

use turtledown_core::{
    Endpoints, FetchRequest, Inertia, Navigator, Plan, TileImage, TileSpec, TileTree, WaitKey,
    ROOT_ID,
};

const SIZE: u32 = 8;

/// Flat greyscale image; the left half is dark, the right half light.
struct HalfAndHalf;

impl TileImage for HalfAndHalf {
    fn red_channel(&self, width: u32, height: u32) -> Option<Vec<u8>> {
        Some(
            (0..width * height)
                .map(|i| if i % width < width / 2 { 0 } else { 255 })
                .collect(),
        )
    }
}

/// Answers every outstanding fetch from a fixed catalogue of specs.
struct FakeHost {
    specs: HashMap<&'static str, TileSpec>,
    images_served: usize,
}

impl FakeHost {
    fn new() -> Self {
        let mut specs = HashMap::new();
        let spec = |black: &[&str], white: &[&str]| TileSpec {
            black: black.iter().map(|s| s.to_string()).collect(),
            white: white.iter().map(|s| s.to_string()).collect(),
        };
        specs.insert(ROOT_ID, spec(&["shell", "turtles"], &["sky"]));
        specs.insert("shell", spec(&["turtles"], &["sky"]));
        specs.insert("sky", spec(&["shell"], &["sky", "turtles"]));
        Self {
            specs,
            images_served: 0,
        }
    }

    /// Serve until the tree has nothing left in flight.
    fn serve(&mut self, tree: &mut TileTree<HalfAndHalf>) -> Vec<turtledown_core::Resume> {
        let mut resumes = Vec::new();
        loop {
            let requests = tree.drain_requests();
            if requests.is_empty() {
                return resumes;
            }
            for request in requests {
                match request {
                    FetchRequest::Image { path } => {
                        self.images_served += 1;
                        resumes.extend(tree.image_loaded(&path, Ok(HalfAndHalf)).resumes);
                    }
                    FetchRequest::Spec { id, url } => {
                        assert!(url.ends_with(&*id));
                        let spec = self.specs[&*id].clone();
                        resumes.extend(tree.spec_loaded(&id, Ok(spec)));
                    }
                }
            }
        }
    }
}

fn new_tree() -> TileTree<HalfAndHalf> {
    TileTree::new(ROOT_ID, SIZE, Endpoints::for_transport(true), 2024).unwrap()
}

fn plan_until_ready(
    nav: &mut Navigator,
    tree: &mut TileTree<HalfAndHalf>,
    host: &mut FakeHost,
) -> turtledown_core::Frame {
    for _ in 0..64 {
        match nav.plan(tree).unwrap() {
            Plan::Ready(frame) => return frame,
            Plan::Blocked { node } => {
                let resumes = host.serve(tree);
                assert!(
                    resumes.iter().any(|r| r.node == node && r.key == WaitKey::RENDER),
                    "the blocking node must resume"
                );
            }
        }
    }
    panic!("plan never became ready");
}

#[test]
fn deep_zoom_builds_the_tree_lazily() {
    let mut tree = new_tree();
    let mut host = FakeHost::new();
    let mut nav = Navigator::new(SIZE).unwrap();

    for level in 1..=6 {
        nav.zoom_at(3.0, 5.0, SIZE as f64);
        let frame = plan_until_ready(&mut nav, &mut tree, &mut host);
        assert!(!frame.regions.is_empty());
        assert!(nav.depth() >= level - 1);
        assert!((1.0..=SIZE as f64).contains(&nav.scale()));
    }
    assert!(nav.depth() >= 5);

    // Only nodes on (or next to) the descended path exist.
    assert!(tree.node_count() < (SIZE * SIZE) as usize);
    // Three sources, each fetched once however many nodes use it.
    assert_eq!(host.images_served, 3);
}

#[test]
fn zooming_back_out_returns_to_the_root() {
    let mut tree = new_tree();
    let mut host = FakeHost::new();
    let mut nav = Navigator::new(SIZE).unwrap();
    for _ in 0..4 {
        nav.zoom_at(6.0, 2.0, SIZE as f64);
        plan_until_ready(&mut nav, &mut tree, &mut host);
    }
    assert!(nav.depth() > 0);

    for _ in 0..8 {
        nav.zoom_at(6.0, 2.0, 1.0 / SIZE as f64);
        plan_until_ready(&mut nav, &mut tree, &mut host);
    }
    assert_eq!(nav.depth(), 0);
    assert_eq!(nav.scale(), 1.0);
}

#[test]
fn revisiting_a_position_reuses_the_same_nodes() {
    let mut tree = new_tree();
    let mut host = FakeHost::new();
    let mut nav = Navigator::new(SIZE).unwrap();
    nav.zoom_at(1.0, 1.0, (SIZE * SIZE) as f64);
    let first = plan_until_ready(&mut nav, &mut tree, &mut host);
    let count = tree.node_count();

    nav.pan(-40.0, 0.0);
    plan_until_ready(&mut nav, &mut tree, &mut host);
    nav.pan(40.0, 0.0);
    let again = plan_until_ready(&mut nav, &mut tree, &mut host);

    assert_eq!(first.regions[0].node, again.regions[0].node);
    assert!(tree.node_count() >= count);
}

#[test]
fn inertia_drives_the_navigator_to_rest() {
    let mut tree = new_tree();
    let mut host = FakeHost::new();
    let mut nav = Navigator::new(SIZE).unwrap();
    let mut inertia = Inertia::new(4.0, 4.0);
    inertia.double_activate();
    inertia.double_activate();

    let mut ticks = 0;
    while inertia.tick(1.0 / 60.0, &mut nav) {
        plan_until_ready(&mut nav, &mut tree, &mut host);
        ticks += 1;
        assert!(ticks < 500);
    }
    assert!(nav.scale() > 1.0 || nav.depth() > 0, "double activation zooms in");
}

//! The lazily materialized tile tree.
//!
//! Every [`TileNode`] stands for one instance of a tiled image. Its pixels are
//! mapped, on first query, to randomly chosen child sources; a child node is
//! only created when the viewport descends into that pixel. All nodes live in
//! a single arena owned by [`TileTree`], which also owns the two resource
//! caches and the outbox of fetches for the host to perform.

use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, trace, warn};

use crate::cache::{FetchError, Lookup, ResourceCache};
use crate::endpoints::Endpoints;
use crate::error::CoreError;
use crate::grid::DenseGrid;
use crate::identity::{Cell, NodeId, SourceId, SourceTable};
use crate::metadata::{Shade, TileSpec};

/// Identifier of the root tile.
pub const ROOT_ID: &str = "turtles";

/// Side length of every tile, in tile pixels.
pub const DEFAULT_TILE_SIZE: u32 = 600;

/// Name under which a caller waits for a node to become ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WaitKey(pub &'static str);

impl WaitKey {
    /// The render pass waiting on an unready tile.
    pub const RENDER: WaitKey = WaitKey("render");
}

/// A wait that fired because its node became ready (or failed).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resume {
    pub node: NodeId,
    pub key: WaitKey,
}

/// Handle of a deferred draw, issued by the draw scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DrawToken(pub u64);

/// Who is waiting on an image fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageWaiter {
    Tile(NodeId),
    Draw(DrawToken),
}

/// A fetch the host must perform and report back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchRequest {
    /// Report with [`TileTree::image_loaded`].
    Image { path: Arc<str> },
    /// Report with [`TileTree::spec_loaded`].
    Spec { id: Arc<str>, url: String },
}

/// What an image completion unblocked.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Completion {
    pub resumes: Vec<Resume>,
    pub draws: Vec<DrawToken>,
}

/// A decoded tile image, as far as the tree is concerned.
pub trait TileImage {
    /// Red channel of the top-left `width x height` region in `x + y * width`
    /// order, or `None` if the image is smaller than that.
    fn red_channel(&self, width: u32, height: u32) -> Option<Vec<u8>>;
}

/// One materialized tile.
#[derive(Debug)]
pub struct TileNode<I> {
    source: SourceId,
    width: u32,
    height: u32,
    parent: Option<NodeId>,
    seed: u64,
    image: Option<Arc<I>>,
    spec: Option<Arc<TileSpec>>,
    failure: Option<FetchError>,
    grid: Option<DenseGrid<Cell>>,
    waiting: Vec<WaitKey>,
}

impl<I> TileNode<I> {
    pub fn source(&self) -> SourceId {
        self.source
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn is_ready(&self) -> bool {
        self.image.is_some() && self.spec.is_some()
    }

    pub fn failure(&self) -> Option<&FetchError> {
        self.failure.as_ref()
    }

    /// Whether the pixel grid has been generated.
    pub fn is_generated(&self) -> bool {
        self.grid.is_some()
    }

    fn settled(&self) -> bool {
        self.is_ready() || self.failure.is_some()
    }
}

/// Seed of the child stored at `slot` of a parent seeded with `parent`.
///
/// A splitmix64 finalizer over the parent seed and the slot, so that sibling
/// seeds are uncorrelated and independent of exploration order.
pub fn child_seed(parent: u64, slot: usize) -> u64 {
    let mut z = parent ^ (slot as u64).wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Arena of tile nodes plus the caches feeding them.
pub struct TileTree<I> {
    endpoints: Endpoints,
    tile_size: u32,
    sources: SourceTable,
    /// Image path per source, indexed by [`SourceId`].
    paths: Vec<Arc<str>>,
    nodes: Vec<TileNode<I>>,
    images: ResourceCache<Arc<str>, I, ImageWaiter>,
    specs: ResourceCache<SourceId, TileSpec, NodeId>,
    outbox: Vec<FetchRequest>,
    root: NodeId,
}

impl<I> TileTree<I> {
    /// Create a tree whose root is `root_id`, immediately requesting its
    /// image and metadata.
    pub fn new(root_id: &str, tile_size: u32, endpoints: Endpoints, seed: u64) -> crate::Result<Self> {
        if tile_size == 0 {
            return Err(CoreError::InvalidTileSize(tile_size));
        }
        let mut tree = Self {
            endpoints,
            tile_size,
            sources: SourceTable::new(),
            paths: Vec::new(),
            nodes: Vec::new(),
            images: ResourceCache::new(),
            specs: ResourceCache::new(),
            outbox: Vec::new(),
            root: NodeId(0),
        };
        let source = tree.intern(root_id);
        tree.root = tree.spawn_node(source, None, seed);
        debug!(root = root_id, tile_size, seed, "tile tree created");
        Ok(tree)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, id: NodeId) -> &TileNode<I> {
        &self.nodes[id.index()]
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn seed(&self, id: NodeId) -> u64 {
        self.node(id).seed
    }

    /// Opaque identifier of the node's source.
    pub fn source_id(&self, id: NodeId) -> &str {
        self.sources.name(self.node(id).source)
    }

    /// The node's own image path.
    pub fn source_path(&self, id: NodeId) -> Arc<str> {
        Arc::clone(&self.paths[self.node(id).source.index()])
    }

    pub fn is_ready(&self, id: NodeId) -> bool {
        self.node(id).is_ready()
    }

    pub fn is_failed(&self, id: NodeId) -> bool {
        self.node(id).failure.is_some()
    }

    /// Keys currently registered on `id`.
    pub fn waiting(&self, id: NodeId) -> &[WaitKey] {
        &self.node(id).waiting
    }

    /// Whether `id` is still loading. Registers `key` if so; a key already
    /// registered is not duplicated. Failed nodes are not waited on.
    pub fn await_ready(&mut self, id: NodeId, key: WaitKey) -> bool {
        let node = &mut self.nodes[id.index()];
        if node.settled() {
            return false;
        }
        if !node.waiting.contains(&key) {
            node.waiting.push(key);
        }
        true
    }

    /// Take every pending fetch for the host to perform.
    pub fn drain_requests(&mut self) -> Vec<FetchRequest> {
        std::mem::take(&mut self.outbox)
    }

    /// Fetches issued but not yet reported back.
    pub fn pending_fetches(&self) -> usize {
        self.images.pending_count() + self.specs.pending_count()
    }

    pub fn fetches_issued(&self) -> usize {
        self.images.fetches_issued() + self.specs.fetches_issued()
    }

    /// Look up an image by path, registering `waiter` if it is still loading.
    pub fn image(&mut self, path: &Arc<str>, waiter: Option<ImageWaiter>) -> Lookup<I> {
        let outbox = &mut self.outbox;
        self.images.get(path, waiter, |path| {
            outbox.push(FetchRequest::Image {
                path: Arc::clone(path),
            })
        })
    }

    /// Current state of an image without registering anything.
    pub fn peek_image(&self, path: &str) -> Option<Lookup<I>> {
        self.images.peek(path)
    }

    /// Report the outcome of an image fetch.
    pub fn image_loaded(&mut self, path: &str, result: Result<I, FetchError>) -> Completion {
        if let Err(err) = &result {
            warn!(path, error = %err, "image fetch failed");
        }
        let waiters = self.images.complete(path, result);
        let mut completion = Completion::default();
        if waiters.is_empty() {
            return completion;
        }
        let outcome = self.images.peek(path);
        for waiter in waiters {
            match waiter {
                ImageWaiter::Draw(token) => completion.draws.push(token),
                ImageWaiter::Tile(id) => {
                    let node = &mut self.nodes[id.index()];
                    match &outcome {
                        Some(Lookup::Ready(image)) => node.image = Some(Arc::clone(image)),
                        Some(Lookup::Failed(err)) => node.failure = Some(err.clone()),
                        _ => {}
                    }
                    completion.resumes.extend(self.fire_if_settled(id));
                }
            }
        }
        completion
    }

    /// Report the outcome of a metadata fetch for source `id`.
    ///
    /// A successful spec triggers a prefetch of every image it references.
    pub fn spec_loaded(&mut self, id: &str, result: Result<TileSpec, FetchError>) -> Vec<Resume> {
        let Some(source) = self.sources.get(id) else {
            debug!(id, "ignoring metadata for an unknown source");
            return Vec::new();
        };
        if !matches!(self.specs.peek(&source), Some(Lookup::Pending)) {
            debug!(id, "ignoring duplicate metadata");
            return Vec::new();
        }
        let result = result.and_then(|spec| match spec.validate(id) {
            Ok(()) => Ok(spec),
            Err(err) => Err(FetchError::new(err.to_string())),
        });
        if let Err(err) = &result {
            warn!(id, error = %err, "metadata fetch failed");
        }

        let waiters = self.specs.complete(&source, result);
        let outcome = self.specs.peek(&source);

        if let Some(Lookup::Ready(spec)) = &outcome {
            let mut prefetched = 0usize;
            for candidate in spec.referenced_ids() {
                let source = self.intern(candidate);
                let path = Arc::clone(&self.paths[source.index()]);
                let before = self.images.fetches_issued();
                self.image(&path, None);
                prefetched += self.images.fetches_issued() - before;
            }
            trace!(id, prefetched, "prefetched candidate images");
        }

        let mut resumes = Vec::new();
        for node_id in waiters {
            let node = &mut self.nodes[node_id.index()];
            match &outcome {
                Some(Lookup::Ready(spec)) => node.spec = Some(Arc::clone(spec)),
                Some(Lookup::Failed(err)) => node.failure = Some(err.clone()),
                _ => {}
            }
            resumes.extend(self.fire_if_settled(node_id));
        }
        resumes
    }

    fn fire_if_settled(&mut self, id: NodeId) -> Vec<Resume> {
        let node = &mut self.nodes[id.index()];
        if !node.settled() {
            return Vec::new();
        }
        node.waiting
            .drain(..)
            .map(|key| Resume { node: id, key })
            .collect()
    }

    fn intern(&mut self, name: &str) -> SourceId {
        let source = self.sources.intern(name);
        if source.index() == self.paths.len() {
            self.paths.push(Arc::from(self.endpoints.image_path(name)));
        }
        source
    }

    fn spawn_node(&mut self, source: SourceId, parent: Option<NodeId>, seed: u64) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        let size = self.tile_size;
        self.nodes.push(TileNode {
            source,
            width: size,
            height: size,
            parent,
            seed,
            image: None,
            spec: None,
            failure: None,
            grid: None,
            waiting: Vec::new(),
        });

        let path = Arc::clone(&self.paths[source.index()]);
        let image = self.image(&path, Some(ImageWaiter::Tile(id)));

        let name: Arc<str> = Arc::from(self.sources.name(source));
        let url = self.endpoints.metadata_url(&name);
        let outbox = &mut self.outbox;
        let spec = self.specs.get(&source, Some(id), |_| {
            outbox.push(FetchRequest::Spec { id: name, url })
        });

        let node = &mut self.nodes[id.index()];
        match image {
            Lookup::Ready(image) => node.image = Some(image),
            Lookup::Failed(err) => node.failure = Some(err),
            Lookup::Pending => {}
        }
        match spec {
            Lookup::Ready(spec) => node.spec = Some(spec),
            Lookup::Failed(err) => node.failure = Some(err),
            Lookup::Pending => {}
        }
        trace!(node = %id, ?parent, ready = node.is_ready(), "spawned tile");
        id
    }
}

impl<I: TileImage> TileTree<I> {
    /// Map every pixel of `id` to a child source. Idempotent.
    fn generate(&mut self, id: NodeId) -> crate::Result<()> {
        let node = &self.nodes[id.index()];
        if node.grid.is_some() {
            return Ok(());
        }
        if let Some(err) = &node.failure {
            return Err(self.unavailable(id, err.message()));
        }
        let (Some(image), Some(spec)) = (node.image.clone(), node.spec.clone()) else {
            return Err(CoreError::NotReady(id));
        };
        let (width, height, seed) = (node.width, node.height, node.seed);

        let Some(red) = image.red_channel(width, height) else {
            return Err(self.fail(id, "image is smaller than the tile"));
        };

        let black: Vec<SourceId> = spec.black.iter().map(|c| self.intern(c)).collect();
        let white: Vec<SourceId> = spec.white.iter().map(|c| self.intern(c)).collect();
        let Some(&fill) = black.first().or(white.first()) else {
            return Err(self.fail(id, "metadata names no candidates"));
        };

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut grid = DenseGrid::new(&[width as usize, height as usize], Cell::Unvisited(fill));
        for (slot, &value) in red.iter().enumerate() {
            let (candidates, shade) = match Shade::from_red(value) {
                Shade::Black => (&black, "black"),
                Shade::White => (&white, "white"),
            };
            let Some(&choice) = candidates.choose(&mut rng) else {
                let reason = format!("no {shade} candidates for a {shade} pixel");
                return Err(self.fail(id, &reason));
            };
            grid.set_linear(slot, Cell::Unvisited(choice));
        }

        self.nodes[id.index()].grid = Some(grid);
        debug!(node = %id, source = self.source_id(id), "generated pixel grid");
        Ok(())
    }

    /// Content of the cell at `(x, y)` of `id`.
    pub fn cell(&mut self, id: NodeId, x: u32, y: u32) -> crate::Result<Cell> {
        self.generate(id)?;
        let grid = self.grid(id)?;
        Ok(grid.get(&[x as usize, y as usize]))
    }

    /// Image path of whatever occupies pixel `(x, y)` of `id`.
    pub fn pixel_source_path(&mut self, id: NodeId, x: u32, y: u32) -> crate::Result<Arc<str>> {
        let source = match self.cell(id, x, y)? {
            Cell::Unvisited(source) => source,
            Cell::Visited(child) => self.node(child).source,
        };
        Ok(Arc::clone(&self.paths[source.index()]))
    }

    /// The child node at pixel `(x, y)` of `id`, materializing it on first
    /// access.
    pub fn child_at(&mut self, id: NodeId, x: u32, y: u32) -> crate::Result<NodeId> {
        self.generate(id)?;
        let grid = self.grid(id)?;
        let slot = grid.index(&[x as usize, y as usize]);
        let cell = grid.get_linear(slot);
        match cell {
            Cell::Visited(child) => Ok(child),
            Cell::Unvisited(source) => {
                let seed = child_seed(self.node(id).seed, slot);
                let child = self.spawn_node(source, Some(id), seed);
                if let Some(grid) = self.nodes[id.index()].grid.as_mut() {
                    grid.set_linear(slot, Cell::Visited(child));
                }
                Ok(child)
            }
        }
    }

    fn grid(&self, id: NodeId) -> crate::Result<&DenseGrid<Cell>> {
        self.node(id).grid.as_ref().ok_or(CoreError::NotReady(id))
    }

    /// Mark `id` failed so later passes skip it, and describe why.
    fn fail(&mut self, id: NodeId, reason: &str) -> CoreError {
        warn!(node = %id, source = self.source_id(id), reason, "tile unavailable");
        self.nodes[id.index()].failure = Some(FetchError::new(reason));
        self.unavailable(id, reason)
    }

    fn unavailable(&self, id: NodeId, reason: &str) -> CoreError {
        CoreError::TileUnavailable {
            node: id,
            source_id: self.source_id(id).to_string(),
            reason: reason.to_string(),
        }
    }
}

//! Poll-based asset handles and loaders
//!
//! Meshes, textures and shaders are shared through reference-counted
//! [`Asset`] handles. A handle is returned immediately by the loader and
//! becomes loaded later, when the loader is pumped with
//! [`AssetLoader::process`]. Consumers never block on a handle; they re-check
//! [`Asset::is_loaded`] each frame.

use super::culling::Aabb;
use crate::foundation::math::Vec3;
use std::cell::{Ref, RefCell};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique id of an asset handle
pub type AssetId = u64;

static NEXT_ASSET_ID: AtomicU64 = AtomicU64::new(1);

/// Load state of an asset
#[derive(Debug, Clone, PartialEq)]
pub enum AssetState<T> {
    /// Requested, not resolved yet
    Loading,
    /// Ready to use
    Loaded(T),
    /// Could not be loaded
    Failed(String),
}

/// A named, shareable asset whose data may arrive later
pub struct Asset<T> {
    name: String,
    id: AssetId,
    state: RefCell<AssetState<T>>,
}

impl<T> Asset<T> {
    fn with_state(name: impl Into<String>, state: AssetState<T>) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            id: NEXT_ASSET_ID.fetch_add(1, Ordering::Relaxed),
            state: RefCell::new(state),
        })
    }

    /// Handle that is already loaded
    pub fn loaded(name: impl Into<String>, data: T) -> Rc<Self> {
        Self::with_state(name, AssetState::Loaded(data))
    }

    /// Handle waiting for its data
    pub fn pending(name: impl Into<String>) -> Rc<Self> {
        Self::with_state(name, AssetState::Loading)
    }

    /// Name or path the asset was created from
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Process-unique id
    pub const fn id(&self) -> AssetId {
        self.id
    }

    /// Whether the data is available
    pub fn is_loaded(&self) -> bool {
        matches!(*self.state.borrow(), AssetState::Loaded(_))
    }

    /// Whether loading gave up
    pub fn is_failed(&self) -> bool {
        matches!(*self.state.borrow(), AssetState::Failed(_))
    }

    /// Borrow the data if loaded
    pub fn data(&self) -> Option<Ref<'_, T>> {
        Ref::filter_map(self.state.borrow(), |state| match state {
            AssetState::Loaded(data) => Some(data),
            _ => None,
        })
        .ok()
    }

    /// Provide the data
    pub fn complete(&self, data: T) {
        *self.state.borrow_mut() = AssetState::Loaded(data);
    }

    /// Mark the asset as failed
    pub fn fail(&self, reason: impl Into<String>) {
        *self.state.borrow_mut() = AssetState::Failed(reason.into());
    }
}

impl<T> fmt::Debug for Asset<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Asset")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

/// Geometry summary the render core needs from a mesh
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    /// Number of independently drawable submeshes
    pub submesh_count: usize,
    /// Local-space bounds
    pub aabb: Aabb,
}

/// Texture description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureData {
    /// Width in texels
    pub width: u32,
    /// Height in texels
    pub height: u32,
    /// Whether a mip chain exists
    pub mipmapped: bool,
}

/// Shader program description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderData {
    /// Program name
    pub name: String,
}

/// Shared mesh handle
pub type MeshPtr = Rc<Asset<MeshData>>;
/// Shared texture handle
pub type TexturePtr = Rc<Asset<TextureData>>;
/// Shared shader handle
pub type ShaderPtr = Rc<Asset<ShaderData>>;

/// A queued load
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetRequest {
    /// Texture at `path`
    Texture {
        /// Source path
        path: String,
        /// Whether to build mipmaps
        mipmaps: bool,
    },
    /// Mesh at `path`
    Mesh {
        /// Source path
        path: String,
    },
    /// Shader at `path`
    Shader {
        /// Source path
        path: String,
    },
}

/// Result of resolving a request
#[derive(Debug, Clone, PartialEq)]
pub enum AssetPayload {
    /// Texture data
    Texture(TextureData),
    /// Mesh data
    Mesh(MeshData),
    /// Shader data
    Shader(ShaderData),
}

/// Turns requests into data. Errors are reported as strings and mark the
/// asset failed.
pub type AssetResolver = Box<dyn FnMut(&AssetRequest) -> Result<AssetPayload, String>>;

/// Source of shared asset handles
pub trait AssetLoader {
    /// Request a texture; repeated paths return the same handle
    fn load_texture(&mut self, path: &str, mipmaps: bool) -> TexturePtr;

    /// Request a mesh; repeated paths return the same handle
    fn load_mesh(&mut self, path: &str) -> MeshPtr;

    /// Request a shader; repeated paths return the same handle
    fn load_shader(&mut self, path: &str) -> ShaderPtr;

    /// Resolve outstanding requests, returning how many finished
    fn process(&mut self) -> usize;

    /// Number of unresolved requests
    fn pending(&self) -> usize;

    /// Drain every outstanding request
    fn wait_for_all(&mut self) {
        while self.pending() > 0 {
            if self.process() == 0 {
                break;
            }
        }
    }
}

enum PendingLoad {
    Texture(TexturePtr, bool),
    Mesh(MeshPtr),
    Shader(ShaderPtr),
}

/// Loader that resolves requests on the next [`process`](AssetLoader::process)
///
/// Resolution is delegated to a pluggable [`AssetResolver`]; the default one
/// produces placeholder data (1x1 textures, single-submesh unit cubes) so the
/// render core can run headless.
pub struct DeferredAssetLoader {
    textures: HashMap<String, TexturePtr>,
    meshes: HashMap<String, MeshPtr>,
    shaders: HashMap<String, ShaderPtr>,
    queue: VecDeque<PendingLoad>,
    resolver: AssetResolver,
}

impl Default for DeferredAssetLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DeferredAssetLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredAssetLoader")
            .field("textures", &self.textures.len())
            .field("meshes", &self.meshes.len())
            .field("shaders", &self.shaders.len())
            .field("pending", &self.queue.len())
            .finish_non_exhaustive()
    }
}

impl DeferredAssetLoader {
    /// Loader with the placeholder resolver
    pub fn new() -> Self {
        Self::with_resolver(Box::new(placeholder_payload))
    }

    /// Loader with a custom resolver
    pub fn with_resolver(resolver: AssetResolver) -> Self {
        Self {
            textures: HashMap::new(),
            meshes: HashMap::new(),
            shaders: HashMap::new(),
            queue: VecDeque::new(),
            resolver,
        }
    }

    fn resolve(&mut self, load: PendingLoad) {
        match load {
            PendingLoad::Texture(texture, mipmaps) => {
                let request = AssetRequest::Texture {
                    path: texture.name().to_owned(),
                    mipmaps,
                };
                match (self.resolver)(&request) {
                    Ok(AssetPayload::Texture(data)) => texture.complete(data),
                    other => fail(&*texture, other),
                }
            }
            PendingLoad::Mesh(mesh) => {
                let request = AssetRequest::Mesh {
                    path: mesh.name().to_owned(),
                };
                match (self.resolver)(&request) {
                    Ok(AssetPayload::Mesh(data)) => mesh.complete(data),
                    other => fail(&*mesh, other),
                }
            }
            PendingLoad::Shader(shader) => {
                let request = AssetRequest::Shader {
                    path: shader.name().to_owned(),
                };
                match (self.resolver)(&request) {
                    Ok(AssetPayload::Shader(data)) => shader.complete(data),
                    other => fail(&*shader, other),
                }
            }
        }
    }
}

fn fail<T>(asset: &Asset<T>, result: Result<AssetPayload, String>) {
    let reason = match result {
        Ok(_) => "resolver returned the wrong asset kind".to_owned(),
        Err(reason) => reason,
    };
    log::warn!("Failed to load {}: {reason}", asset.name());
    asset.fail(reason);
}

fn placeholder_payload(request: &AssetRequest) -> Result<AssetPayload, String> {
    Ok(match request {
        AssetRequest::Texture { mipmaps, .. } => AssetPayload::Texture(TextureData {
            width: 1,
            height: 1,
            mipmapped: *mipmaps,
        }),
        AssetRequest::Mesh { .. } => AssetPayload::Mesh(MeshData {
            submesh_count: 1,
            aabb: Aabb::new(Vec3::repeat(-0.5), Vec3::repeat(0.5)),
        }),
        AssetRequest::Shader { path } => AssetPayload::Shader(ShaderData { name: path.clone() }),
    })
}

impl AssetLoader for DeferredAssetLoader {
    fn load_texture(&mut self, path: &str, mipmaps: bool) -> TexturePtr {
        if let Some(texture) = self.textures.get(path) {
            return Rc::clone(texture);
        }
        let texture = Asset::pending(path);
        self.textures.insert(path.to_owned(), Rc::clone(&texture));
        self.queue.push_back(PendingLoad::Texture(Rc::clone(&texture), mipmaps));
        texture
    }

    fn load_mesh(&mut self, path: &str) -> MeshPtr {
        if let Some(mesh) = self.meshes.get(path) {
            return Rc::clone(mesh);
        }
        let mesh = Asset::pending(path);
        self.meshes.insert(path.to_owned(), Rc::clone(&mesh));
        self.queue.push_back(PendingLoad::Mesh(Rc::clone(&mesh)));
        mesh
    }

    fn load_shader(&mut self, path: &str) -> ShaderPtr {
        if let Some(shader) = self.shaders.get(path) {
            return Rc::clone(shader);
        }
        let shader = Asset::pending(path);
        self.shaders.insert(path.to_owned(), Rc::clone(&shader));
        self.queue.push_back(PendingLoad::Shader(Rc::clone(&shader)));
        shader
    }

    fn process(&mut self) -> usize {
        let count = self.queue.len();
        for _ in 0..count {
            if let Some(load) = self.queue.pop_front() {
                self.resolve(load);
            }
        }
        if count > 0 {
            log::debug!("Resolved {count} asset requests");
        }
        count
    }

    fn pending(&self) -> usize {
        self.queue.len()
    }
}

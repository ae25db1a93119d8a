//! Materials: a shader plus the uniforms and textures bound with it

use super::assets::{ShaderPtr, TexturePtr};
use super::state::BlendState;
use crate::dfatal;
use crate::foundation::math::Vec4;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Name of the uniform that carries an object's tint
pub const COLOR_UNIFORM: &str = "color";

/// Alpha below `1 - ALPHA_EPSILON` moves an object into the blended layer
pub const ALPHA_EPSILON: f32 = 1e-4;

/// Element type of a float uniform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UniformType {
    /// `float`
    Float1,
    /// `vec2`
    Float2,
    /// `vec3`
    Float3,
    /// `vec4`
    Float4,
    /// `mat4`
    Float4x4,
}

impl UniformType {
    /// Type with `dimension` floats per element, if supported
    pub const fn from_dimension(dimension: usize) -> Option<Self> {
        match dimension {
            1 => Some(Self::Float1),
            2 => Some(Self::Float2),
            3 => Some(Self::Float3),
            4 => Some(Self::Float4),
            16 => Some(Self::Float4x4),
            _ => None,
        }
    }

    /// Floats per element
    pub const fn dimension(self) -> usize {
        match self {
            Self::Float1 => 1,
            Self::Float2 => 2,
            Self::Float3 => 3,
            Self::Float4 => 4,
            Self::Float4x4 => 16,
        }
    }

    /// Bytes per element
    pub const fn size_in_bytes(self) -> usize {
        self.dimension() * std::mem::size_of::<f32>()
    }
}

/// A typed array of floats bound to a shader by name
#[derive(Debug, Clone, PartialEq)]
pub struct Uniform {
    ty: UniformType,
    count: usize,
    values: Vec<f32>,
}

impl Uniform {
    /// `count` elements of `ty`; `None` if `values` has the wrong length
    pub fn new(ty: UniformType, count: usize, values: &[f32]) -> Option<Self> {
        (values.len() == ty.dimension() * count).then(|| Self {
            ty,
            count,
            values: values.to_vec(),
        })
    }

    /// Element type
    pub const fn ty(&self) -> UniformType {
        self.ty
    }

    /// Number of elements
    pub const fn count(&self) -> usize {
        self.count
    }

    /// Values as floats
    pub fn as_floats(&self) -> &[f32] {
        &self.values
    }

    /// Values as raw bytes, for upload
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.values)
    }
}

/// Shader, uniforms and textures used to draw one submesh
#[derive(Debug, Clone, Default)]
pub struct Material {
    shader: Option<ShaderPtr>,
    uniforms: BTreeMap<String, Uniform>,
    textures: BTreeMap<u32, TexturePtr>,
    hidden: bool,
    blend_state: Option<BlendState>,
}

/// Material shared between render components
pub type MaterialPtr = Rc<RefCell<Material>>;

impl Material {
    /// Material drawn with `shader`
    pub fn new(shader: Option<ShaderPtr>) -> Self {
        Self {
            shader,
            ..Self::default()
        }
    }

    /// Wrap into a shareable handle
    pub fn into_ptr(self) -> MaterialPtr {
        Rc::new(RefCell::new(self))
    }

    /// Shader program, if any
    pub const fn shader(&self) -> Option<&ShaderPtr> {
        self.shader.as_ref()
    }

    /// Replace the shader
    pub fn set_shader(&mut self, shader: Option<ShaderPtr>) {
        self.shader = shader;
    }

    /// Set `count` elements of `dimension` floats.
    ///
    /// Unsupported dimensions and data whose length is not
    /// `dimension * count` are contract violations and leave the material
    /// untouched. Returns whether the uniform was stored.
    pub fn set_uniform(&mut self, name: &str, data: &[f32], dimension: usize, count: usize) -> bool {
        let Some(ty) = UniformType::from_dimension(dimension) else {
            dfatal!("Unsupported uniform dimension {dimension}");
            return false;
        };
        let Some(uniform) = Uniform::new(ty, count, data) else {
            dfatal!(
                "Uniform {name} expects {} values, got {}",
                dimension * count,
                data.len()
            );
            return false;
        };
        self.uniforms.insert(name.to_owned(), uniform);
        true
    }

    /// Set a uniform from raw bytes, which must hold exactly `count` elements
    pub fn set_uniform_bytes(&mut self, name: &str, ty: UniformType, bytes: &[u8], count: usize) -> bool {
        let expected = ty.size_in_bytes() * count;
        if bytes.len() != expected {
            dfatal!("Uniform {name} expects {expected} bytes, got {}", bytes.len());
            return false;
        }
        let values: Vec<f32> = bytes
            .chunks_exact(std::mem::size_of::<f32>())
            .map(bytemuck::pod_read_unaligned)
            .collect();
        self.uniforms.insert(name.to_owned(), Uniform { ty, count, values });
        true
    }

    /// Uniform by name
    pub fn uniform(&self, name: &str) -> Option<&Uniform> {
        self.uniforms.get(name)
    }

    /// All uniforms in name order
    pub fn uniforms(&self) -> impl Iterator<Item = (&str, &Uniform)> {
        self.uniforms.iter().map(|(name, uniform)| (name.as_str(), uniform))
    }

    /// Copy a uniform into `out`. Fails if it is missing or shorter than `out`.
    pub fn copy_uniform(&self, name: &str, out: &mut [f32]) -> bool {
        match self.uniforms.get(name) {
            Some(uniform) if uniform.values.len() >= out.len() => {
                out.copy_from_slice(&uniform.values[..out.len()]);
                true
            }
            _ => false,
        }
    }

    /// Tint from the `color` uniform
    pub fn color(&self) -> Option<Vec4> {
        let mut color = [0.0; 4];
        self.copy_uniform(COLOR_UNIFORM, &mut color).then(|| Vec4::from(color))
    }

    /// Bind a texture to a sampler unit
    pub fn set_texture(&mut self, unit: u32, texture: TexturePtr) {
        self.textures.insert(unit, texture);
    }

    /// Texture at a sampler unit
    pub fn texture(&self, unit: u32) -> Option<&TexturePtr> {
        self.textures.get(&unit)
    }

    /// Bound textures in unit order
    pub fn textures(&self) -> impl Iterator<Item = (u32, &TexturePtr)> {
        self.textures.iter().map(|(unit, texture)| (*unit, texture))
    }

    /// Whether every bound texture has loaded
    pub fn textures_loaded(&self) -> bool {
        self.textures.values().all(|texture| texture.is_loaded())
    }

    /// Whether the material is skipped when drawing
    pub const fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// Hide or show the material
    pub fn set_hidden(&mut self, hidden: bool) {
        self.hidden = hidden;
    }

    /// Per-material blend override
    pub const fn blend_state(&self) -> Option<&BlendState> {
        self.blend_state.as_ref()
    }

    /// Set or clear the blend override
    pub fn set_blend_state(&mut self, blend_state: Option<BlendState>) {
        self.blend_state = blend_state;
    }

    /// Whether objects with this material must be drawn blended
    pub fn requires_blending(&self) -> bool {
        if self.blend_state.is_some_and(|blend| blend.enabled) {
            return true;
        }
        self.color().is_some_and(|color| color.w < 1.0 - ALPHA_EPSILON)
    }
}

/// Serialized uniform value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniformDef {
    /// Uniform name
    pub name: String,
    /// Floats per element
    pub dimension: usize,
    /// Number of elements
    #[serde(default = "one")]
    pub count: usize,
    /// Flattened values
    pub values: Vec<f32>,
}

const fn one() -> usize {
    1
}

/// Serialized material description
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialInfo {
    /// Shader path
    pub shader: Option<String>,
    /// Texture paths, bound to units in order
    pub textures: Vec<String>,
    /// Uniform values
    pub uniforms: Vec<UniformDef>,
    /// Blend override
    pub blend_state: Option<BlendState>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::assets::{Asset, TextureData};

    #[test]
    fn test_uniform_roundtrips_as_bytes() {
        let mut material = Material::default();
        assert!(material.set_uniform("tint", &[0.5, 0.25, 1.0, 1.0], 4, 1));
        let uniform = material.uniform("tint").unwrap();
        assert_eq!(uniform.ty(), UniformType::Float4);
        assert_eq!(uniform.as_bytes().len(), 16);

        let bytes = uniform.as_bytes().to_vec();
        assert!(material.set_uniform_bytes("copy", UniformType::Float4, &bytes, 1));
        assert_eq!(material.uniform("copy").unwrap().as_floats(), &[0.5, 0.25, 1.0, 1.0]);
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "expects 8 bytes"))]
    fn test_mismatched_byte_length() {
        let mut material = Material::default();
        assert!(!material.set_uniform_bytes("uv_offset", UniformType::Float2, &[0; 12], 1));
        assert!(material.uniform("uv_offset").is_none());
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "Unsupported uniform dimension"))]
    fn test_unsupported_dimension() {
        let mut material = Material::default();
        assert!(!material.set_uniform("normal_matrix", &[0.0; 9], 9, 1));
    }

    #[test]
    fn test_alpha_requires_blending() {
        let mut material = Material::default();
        assert!(!material.requires_blending());

        material.set_uniform(COLOR_UNIFORM, &[1.0, 1.0, 1.0, 1.0], 4, 1);
        assert!(!material.requires_blending());

        material.set_uniform(COLOR_UNIFORM, &[1.0, 1.0, 1.0, 0.5], 4, 1);
        assert!(material.requires_blending());
        assert_eq!(material.color(), Some(Vec4::new(1.0, 1.0, 1.0, 0.5)));

        material.set_uniform(COLOR_UNIFORM, &[1.0, 1.0, 1.0, 1.0], 4, 1);
        material.set_blend_state(Some(BlendState::additive()));
        assert!(material.requires_blending());
    }

    #[test]
    fn test_texture_readiness() {
        let mut material = Material::default();
        assert!(material.textures_loaded());
        let texture = Asset::<TextureData>::pending("grid");
        material.set_texture(0, Rc::clone(&texture));
        assert!(!material.textures_loaded());
        texture.complete(TextureData {
            width: 2,
            height: 2,
            mipmapped: false,
        });
        assert!(material.textures_loaded());
    }

    #[test]
    fn test_material_info_from_ron() {
        let info: MaterialInfo = ron::from_str(
            r#"(shader: Some("shaders/texture.fplshader"), textures: ["a.png"], uniforms: [(name: "color", dimension: 4, values: [1.0, 0.0, 0.0, 1.0])])"#,
        )
        .unwrap();
        assert_eq!(info.textures, vec!["a.png".to_owned()]);
        assert_eq!(info.uniforms[0].count, 1);
    }
}

//! Data-driven render component description

use super::material::UniformDef;
use super::state::StencilMode;
use serde::{Deserialize, Serialize};

/// Describes a render component to create for an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderDef {
    /// Pass name
    pub pass: String,
    /// Mesh path
    pub mesh: Option<String>,
    /// Shader path
    pub shader: Option<String>,
    /// Texture paths, bound to units in order
    pub textures: Vec<String>,
    /// Whether textures get mipmaps
    pub create_mips: bool,
    /// Tint, also stored as the default color
    pub color: Option<[f32; 4]>,
    /// Extra uniforms
    pub uniforms: Vec<UniformDef>,
    /// Start hidden
    pub hidden: bool,
    /// Sort order offset, default sibling order when absent
    pub sort_order_offset: Option<i32>,
    /// Stencil behaviour
    pub stencil_mode: StencilMode,
    /// Stencil reference value
    pub stencil_value: i32,
    /// Group name
    pub group: Option<String>,
}

impl Default for RenderDef {
    fn default() -> Self {
        Self {
            pass: "Main".to_owned(),
            mesh: None,
            shader: None,
            textures: Vec::new(),
            create_mips: false,
            color: None,
            uniforms: Vec::new(),
            hidden: false,
            sort_order_offset: None,
            stencil_mode: StencilMode::Disabled,
            stencil_value: 0,
            group: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let def: RenderDef = ron::from_str(r#"(mesh: Some("meshes/button.fplmesh"), color: Some((1.0, 0.5, 0.5, 1.0)))"#).unwrap();
        assert_eq!(def.pass, "Main");
        assert_eq!(def.color, Some([1.0, 0.5, 0.5, 1.0]));
        assert!(def.textures.is_empty());
        assert_eq!(def.stencil_mode, StencilMode::Disabled);
    }
}

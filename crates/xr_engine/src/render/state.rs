//! Fixed-function render state descriptors
//!
//! These are plain data handed to the [`GraphicsDevice`](super::device::GraphicsDevice);
//! the engine never interprets them beyond the blend-layer override below.

use serde::{Deserialize, Serialize};

/// Source or destination blend factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BlendFactor {
    /// 0
    Zero,
    /// 1
    #[default]
    One,
    /// Source color
    SrcColor,
    /// 1 - source color
    OneMinusSrcColor,
    /// Source alpha
    SrcAlpha,
    /// 1 - source alpha
    OneMinusSrcAlpha,
    /// Destination color
    DstColor,
    /// 1 - destination color
    OneMinusDstColor,
    /// Destination alpha
    DstAlpha,
    /// 1 - destination alpha
    OneMinusDstAlpha,
}

/// Blending configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct BlendState {
    /// Whether blending is on
    pub enabled: bool,
    /// Source factor for alpha
    pub src_alpha: BlendFactor,
    /// Source factor for color
    pub src_color: BlendFactor,
    /// Destination factor for alpha
    pub dst_alpha: BlendFactor,
    /// Destination factor for color
    pub dst_color: BlendFactor,
}

impl Default for BlendState {
    fn default() -> Self {
        Self::disabled()
    }
}

impl BlendState {
    /// Blending off
    pub const fn disabled() -> Self {
        Self {
            enabled: false,
            src_alpha: BlendFactor::One,
            src_color: BlendFactor::One,
            dst_alpha: BlendFactor::Zero,
            dst_color: BlendFactor::Zero,
        }
    }

    /// Premultiplied alpha: `src + dst * (1 - src_alpha)`
    pub const fn premultiplied_alpha() -> Self {
        Self {
            enabled: true,
            src_alpha: BlendFactor::One,
            src_color: BlendFactor::One,
            dst_alpha: BlendFactor::OneMinusSrcAlpha,
            dst_color: BlendFactor::OneMinusSrcAlpha,
        }
    }

    /// Additive: `src + dst`
    pub const fn additive() -> Self {
        Self {
            enabled: true,
            src_alpha: BlendFactor::One,
            src_color: BlendFactor::One,
            dst_alpha: BlendFactor::One,
            dst_color: BlendFactor::One,
        }
    }
}

/// Comparison used by depth and stencil tests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CompareFunction {
    /// Never passes
    Never,
    /// Passes if incoming < stored
    #[default]
    Less,
    /// Passes if equal
    Equal,
    /// Passes if incoming <= stored
    LessEqual,
    /// Passes if incoming > stored
    Greater,
    /// Passes if not equal
    NotEqual,
    /// Passes if incoming >= stored
    GreaterEqual,
    /// Always passes
    Always,
}

/// Depth buffer configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DepthState {
    /// Whether fragments are depth tested
    pub test_enabled: bool,
    /// Whether fragments write depth
    pub write_enabled: bool,
    /// Depth comparison
    pub function: CompareFunction,
}

/// Faces removed by culling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CullFace {
    /// Front faces
    Front,
    /// Back faces
    #[default]
    Back,
    /// Everything
    FrontAndBack,
}

/// Winding order of front faces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FrontFace {
    /// Clockwise
    Clockwise,
    /// Counter-clockwise
    #[default]
    CounterClockwise,
}

impl FrontFace {
    /// The opposite winding
    pub const fn flipped(self) -> Self {
        match self {
            Self::Clockwise => Self::CounterClockwise,
            Self::CounterClockwise => Self::Clockwise,
        }
    }
}

/// Face culling configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CullState {
    /// Whether culling is on
    pub enabled: bool,
    /// Faces to remove
    pub face: CullFace,
    /// Front face winding
    pub front: FrontFace,
}

/// Stencil buffer operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StencilAction {
    /// Keep the stored value
    #[default]
    Keep,
    /// Set to zero
    Zero,
    /// Replace with the reference value
    Replace,
    /// Increment, clamping
    Increment,
    /// Decrement, clamping
    Decrement,
    /// Bitwise invert
    Invert,
    /// Increment, wrapping
    IncrementWrap,
    /// Decrement, wrapping
    DecrementWrap,
}

/// Stencil buffer configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct StencilState {
    /// Whether stencil testing is on
    pub enabled: bool,
    /// Stencil comparison
    pub function: CompareFunction,
    /// Reference value
    pub reference: i32,
    /// Comparison mask
    pub mask: u32,
    /// Action when the stencil test fails
    pub stencil_fail: StencilAction,
    /// Action when the depth test fails
    pub depth_fail: StencilAction,
    /// Action when both tests pass
    pub pass: StencilAction,
}

impl Default for StencilState {
    fn default() -> Self {
        Self {
            enabled: false,
            function: CompareFunction::Always,
            reference: 0,
            mask: u32::MAX,
            stencil_fail: StencilAction::Keep,
            depth_fail: StencilAction::Keep,
            pass: StencilAction::Keep,
        }
    }
}

/// Per-component stencil behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StencilMode {
    /// No stencil interaction
    #[default]
    Disabled,
    /// Draw only where the stencil buffer equals the value
    Test,
    /// Write the value into the stencil buffer
    Write,
}

impl StencilMode {
    /// Stencil state realizing this mode with `value` as reference
    pub fn to_state(self, value: i32) -> StencilState {
        match self {
            Self::Disabled => StencilState::default(),
            Self::Test => StencilState {
                enabled: true,
                function: CompareFunction::Equal,
                reference: value,
                ..StencilState::default()
            },
            Self::Write => StencilState {
                enabled: true,
                function: CompareFunction::Always,
                reference: value,
                pass: StencilAction::Replace,
                ..StencilState::default()
            },
        }
    }
}

/// Complete fixed-function state for a draw
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderState {
    /// Blending
    pub blend: BlendState,
    /// Depth testing
    pub depth: DepthState,
    /// Face culling
    pub cull: CullState,
    /// Stencil testing
    pub stencil: StencilState,
}

impl RenderState {
    /// State used for a pass's blended layer.
    ///
    /// A pass that already declares blending keeps its state unmodified.
    /// Otherwise the state switches to premultiplied-alpha blending with depth
    /// writes off.
    pub fn blend_layer_state(&self) -> Self {
        if self.blend.enabled {
            return *self;
        }
        let mut state = *self;
        state.blend = BlendState::premultiplied_alpha();
        state.depth.write_enabled = false;
        state
    }
}

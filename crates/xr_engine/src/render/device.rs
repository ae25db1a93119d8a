//! The GPU seam
//!
//! [`GraphicsDevice`] is everything the render core asks of the graphics API.
//! It only receives state descriptors and draw commands; how they are
//! executed is up to the implementation. [`RecordingDevice`] keeps the
//! commands in memory for headless runs and tests.

use super::assets::{MeshPtr, ShaderPtr, TexturePtr};
use super::material::Uniform;
use super::pass::ClearParams;
use super::state::{FrontFace, RenderState, StencilState};
use crate::camera::RenderTargetId;
use crate::foundation::math::{Mat4, Vec2i};
use std::any::Any;

/// Executes render state changes and draws
pub trait GraphicsDevice {
    /// Start of a frame's rendering
    fn begin_frame(&mut self) {}

    /// End of a frame's rendering
    fn end_frame(&mut self) {}

    /// Clear the buffers selected by `params`
    fn clear(&mut self, params: &ClearParams);

    /// Draw into an offscreen target, or the default framebuffer for `None`
    fn set_render_target(&mut self, target: Option<RenderTargetId>);

    /// Apply fixed-function state
    fn set_render_state(&mut self, state: &RenderState);

    /// Restrict drawing to a pixel rectangle
    fn set_viewport(&mut self, position: Vec2i, size: Vec2i);

    /// Apply stencil state
    fn set_stencil(&mut self, state: &StencilState);

    /// Winding of front faces
    fn set_front_face(&mut self, face: FrontFace);

    /// Make a shader current
    fn bind_shader(&mut self, shader: &ShaderPtr);

    /// Bind a texture to a sampler unit
    fn bind_texture(&mut self, unit: u32, texture: &TexturePtr);

    /// Upload a uniform to the current shader
    fn bind_uniform(&mut self, name: &str, uniform: &Uniform);

    /// Draw a mesh, or one of its submeshes, once per matrix in
    /// `clip_from_model` (one per view when multiview is used)
    fn draw(&mut self, mesh: &MeshPtr, clip_from_model: &[Mat4], submesh: Option<usize>);

    /// Whether one draw can target both stereo views
    fn supports_multiview(&self) -> bool {
        false
    }

    /// Downcast support for callers that know the concrete device
    fn as_any(&self) -> &dyn Any;

    /// Mutable downcast support
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// One recorded draw
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    /// Mesh name
    pub mesh: String,
    /// Shader bound at draw time
    pub shader: Option<String>,
    /// One matrix per view
    pub clip_from_model: Vec<Mat4>,
    /// Submesh drawn, `None` for the whole mesh
    pub submesh: Option<usize>,
}

/// A command received by a [`RecordingDevice`]
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCommand {
    /// `begin_frame`
    BeginFrame,
    /// `end_frame`
    EndFrame,
    /// `clear`
    Clear(ClearParams),
    /// `set_render_target`
    SetRenderTarget(Option<RenderTargetId>),
    /// `set_render_state`
    SetRenderState(RenderState),
    /// `set_viewport`
    SetViewport {
        /// Corner
        position: Vec2i,
        /// Size
        size: Vec2i,
    },
    /// `set_stencil`
    SetStencil(StencilState),
    /// `set_front_face`
    SetFrontFace(FrontFace),
    /// `bind_shader`, by name
    BindShader(String),
    /// `bind_texture`, by name
    BindTexture {
        /// Sampler unit
        unit: u32,
        /// Texture name
        texture: String,
    },
    /// `bind_uniform`
    BindUniform {
        /// Uniform name
        name: String,
        /// Values
        values: Vec<f32>,
    },
    /// `draw`
    Draw(DrawCall),
}

/// Headless device that records every command
#[derive(Debug, Default)]
pub struct RecordingDevice {
    commands: Vec<DeviceCommand>,
    multiview: bool,
    current_shader: Option<String>,
}

impl RecordingDevice {
    /// Device without multiview support
    pub fn new() -> Self {
        Self::default()
    }

    /// Device that reports multiview support
    pub fn with_multiview() -> Self {
        Self {
            multiview: true,
            ..Self::default()
        }
    }

    /// Everything recorded so far
    pub fn commands(&self) -> &[DeviceCommand] {
        &self.commands
    }

    /// Recorded draws in order
    pub fn draws(&self) -> impl Iterator<Item = &DrawCall> {
        self.commands.iter().filter_map(|command| match command {
            DeviceCommand::Draw(draw) => Some(draw),
            _ => None,
        })
    }

    /// Forget recorded commands
    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }
}

impl GraphicsDevice for RecordingDevice {
    fn begin_frame(&mut self) {
        self.commands.push(DeviceCommand::BeginFrame);
    }

    fn end_frame(&mut self) {
        self.commands.push(DeviceCommand::EndFrame);
    }

    fn clear(&mut self, params: &ClearParams) {
        self.commands.push(DeviceCommand::Clear(*params));
    }

    fn set_render_target(&mut self, target: Option<RenderTargetId>) {
        self.commands.push(DeviceCommand::SetRenderTarget(target));
    }

    fn set_render_state(&mut self, state: &RenderState) {
        self.commands.push(DeviceCommand::SetRenderState(*state));
    }

    fn set_viewport(&mut self, position: Vec2i, size: Vec2i) {
        self.commands.push(DeviceCommand::SetViewport { position, size });
    }

    fn set_stencil(&mut self, state: &StencilState) {
        self.commands.push(DeviceCommand::SetStencil(*state));
    }

    fn set_front_face(&mut self, face: FrontFace) {
        self.commands.push(DeviceCommand::SetFrontFace(face));
    }

    fn bind_shader(&mut self, shader: &ShaderPtr) {
        self.current_shader = Some(shader.name().to_owned());
        self.commands.push(DeviceCommand::BindShader(shader.name().to_owned()));
    }

    fn bind_texture(&mut self, unit: u32, texture: &TexturePtr) {
        self.commands.push(DeviceCommand::BindTexture {
            unit,
            texture: texture.name().to_owned(),
        });
    }

    fn bind_uniform(&mut self, name: &str, uniform: &Uniform) {
        self.commands.push(DeviceCommand::BindUniform {
            name: name.to_owned(),
            values: uniform.as_floats().to_vec(),
        });
    }

    fn draw(&mut self, mesh: &MeshPtr, clip_from_model: &[Mat4], submesh: Option<usize>) {
        self.commands.push(DeviceCommand::Draw(DrawCall {
            mesh: mesh.name().to_owned(),
            shader: self.current_shader.clone(),
            clip_from_model: clip_from_model.to_vec(),
            submesh,
        }));
    }

    fn supports_multiview(&self) -> bool {
        self.multiview
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

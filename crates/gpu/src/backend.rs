//! The GL seam.
//!
//! Everything above this crate talks to GL through [`GlBackend`]. The method
//! names and argument order follow the WebGL / `glow` API so the real
//! implementation is a thin forwarding layer, and enum arguments use the
//! `glow` constants (`glow::BLEND`, `glow::TEXTURE_2D`, ...).

use std::fmt::Debug;
use std::hash::Hash;

/// Captured state of one vertex attribute slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexAttrib<Buf> {
    pub enabled: bool,
    pub buffer: Option<Buf>,
    pub size: i32,
    pub data_type: u32,
    pub normalized: bool,
    pub stride: i32,
    pub offset: i32,
}

impl<Buf> Default for VertexAttrib<Buf> {
    fn default() -> Self {
        Self {
            enabled: false,
            buffer: None,
            size: 4,
            data_type: glow::FLOAT,
            normalized: false,
            stride: 0,
            offset: 0,
        }
    }
}

/// Queries and binds for the GL objects a render pass may rebind, through one
/// family of object handles.
///
/// Objects the host created are only reachable through the handles of the
/// underlying context, so a backend reads and restores these bindings through
/// whichever handles can name them. A state snapshot is built on top in
/// [`crate::state::ObjectBindings`].
pub trait ObjectBinder {
    type Program: Clone + PartialEq + Debug;
    type Texture: Clone + PartialEq + Debug;
    type Buffer: Clone + PartialEq + Debug;
    type VertexArray: Clone + PartialEq + Debug;

    fn program_binding(&self) -> Option<Self::Program>;
    fn set_program_binding(&self, program: Option<&Self::Program>);
    /// `unit` is `TEXTURE0 + n`.
    fn set_active_unit(&self, unit: u32);
    /// Texture bound to `TEXTURE_2D` on the active unit.
    fn texture_2d_binding(&self) -> Option<Self::Texture>;
    fn set_texture_2d_binding(&self, texture: Option<&Self::Texture>);
    /// Always `None` on contexts without vertex array objects.
    fn vertex_array_binding(&self) -> Option<Self::VertexArray>;
    fn set_vertex_array_binding(&self, vertex_array: Option<&Self::VertexArray>);
    /// `target` is `ARRAY_BUFFER` or `ELEMENT_ARRAY_BUFFER`.
    fn buffer_binding(&self, target: u32) -> Option<Self::Buffer>;
    fn set_buffer_binding(&self, target: u32, buffer: Option<&Self::Buffer>);
    /// Pointer state of attribute `index` in the bound vertex array.
    fn vertex_attrib(&self, index: u32) -> VertexAttrib<Self::Buffer>;

    /// Point attribute `index` at the bound `ARRAY_BUFFER` with `attrib`'s
    /// layout.
    fn set_vertex_attrib_pointer(&self, index: u32, attrib: &VertexAttrib<Self::Buffer>);
    fn set_vertex_attrib_enabled(&self, index: u32, enabled: bool);

    /// Re-apply a captured attribute slot. Leaves `ARRAY_BUFFER` bound to the
    /// attribute's buffer, so callers restore the array binding afterwards.
    fn set_vertex_attrib(&self, index: u32, attrib: &VertexAttrib<Self::Buffer>) {
        if let Some(buffer) = &attrib.buffer {
            self.set_buffer_binding(glow::ARRAY_BUFFER, Some(buffer));
            self.set_vertex_attrib_pointer(index, attrib);
        }
        self.set_vertex_attrib_enabled(index, attrib.enabled);
    }
}

/// Safe view of a GL / WebGL context.
///
/// Implementations are single-threaded and take `&self`; GL itself is a
/// global state machine so interior mutability is the natural fit.
pub trait GlBackend: 'static {
    type Texture: Copy + Eq + Hash + Debug + 'static;
    type Program: Copy + Eq + Debug + 'static;
    type Shader: Copy + Debug + 'static;
    type Buffer: Copy + Eq + Debug + 'static;
    type UniformLocation: Clone + Debug + 'static;
    /// Object bindings as read by [`GlBackend::capture_bindings`].
    type Bindings: Clone + PartialEq + Debug + 'static;

    // Global state queries

    fn is_enabled(&self, cap: u32) -> bool;
    fn get_parameter_i32(&self, pname: u32) -> i32;
    fn get_parameter_i32_slice(&self, pname: u32, out: &mut [i32]);
    fn get_parameter_f32_slice(&self, pname: u32, out: &mut [f32]);

    /// Read the program, the `TEXTURE_2D` binding on the first `units` texture
    /// units, the vertex array, buffer bindings and the first `attribs`
    /// attribute slots. Leaves the active texture unit changed.
    fn capture_bindings(&self, units: u32, attribs: u32) -> Self::Bindings;
    /// Rebind everything [`GlBackend::capture_bindings`] read. Leaves the
    /// active texture unit changed.
    fn restore_bindings(&self, bindings: &Self::Bindings);

    // Global state setters

    fn enable(&self, cap: u32);
    fn disable(&self, cap: u32);
    fn blend_func_separate(&self, src_rgb: u32, dst_rgb: u32, src_alpha: u32, dst_alpha: u32);
    fn blend_equation_separate(&self, mode_rgb: u32, mode_alpha: u32);
    fn blend_color(&self, r: f32, g: f32, b: f32, a: f32);
    fn scissor(&self, x: i32, y: i32, width: i32, height: i32);
    fn viewport(&self, x: i32, y: i32, width: i32, height: i32);
    fn clear_color(&self, r: f32, g: f32, b: f32, a: f32);
    fn clear(&self, mask: u32);
    fn pixel_store_i32(&self, pname: u32, value: i32);
    fn active_texture(&self, unit: u32);

    // Textures

    fn create_texture(&self) -> Result<Self::Texture, String>;
    fn delete_texture(&self, texture: Self::Texture);
    fn bind_texture(&self, target: u32, texture: Option<Self::Texture>);
    #[allow(clippy::too_many_arguments)]
    fn tex_image_2d(
        &self,
        target: u32,
        level: i32,
        internal_format: i32,
        width: i32,
        height: i32,
        border: i32,
        format: u32,
        ty: u32,
        pixels: Option<&[u8]>,
    );
    fn tex_parameter_i32(&self, target: u32, pname: u32, value: i32);
    fn generate_mipmap(&self, target: u32);

    // Shaders and programs

    fn create_shader(&self, shader_type: u32) -> Result<Self::Shader, String>;
    fn shader_source(&self, shader: Self::Shader, source: &str);
    fn compile_shader(&self, shader: Self::Shader);
    fn get_shader_compile_status(&self, shader: Self::Shader) -> bool;
    fn get_shader_info_log(&self, shader: Self::Shader) -> String;
    fn delete_shader(&self, shader: Self::Shader);
    fn create_program(&self) -> Result<Self::Program, String>;
    fn attach_shader(&self, program: Self::Program, shader: Self::Shader);
    fn detach_shader(&self, program: Self::Program, shader: Self::Shader);
    fn link_program(&self, program: Self::Program);
    fn get_program_link_status(&self, program: Self::Program) -> bool;
    fn get_program_info_log(&self, program: Self::Program) -> String;
    fn delete_program(&self, program: Self::Program);
    fn use_program(&self, program: Option<Self::Program>);
    fn get_attrib_location(&self, program: Self::Program, name: &str) -> Option<u32>;
    fn get_uniform_location(&self, program: Self::Program, name: &str) -> Option<Self::UniformLocation>;

    // Uniforms

    fn uniform_1_i32(&self, location: Option<&Self::UniformLocation>, x: i32);
    fn uniform_1_f32(&self, location: Option<&Self::UniformLocation>, x: f32);
    fn uniform_2_f32(&self, location: Option<&Self::UniformLocation>, x: f32, y: f32);
    fn uniform_4_f32(&self, location: Option<&Self::UniformLocation>, x: f32, y: f32, z: f32, w: f32);
    fn uniform_matrix_3_f32_slice(&self, location: Option<&Self::UniformLocation>, transpose: bool, v: &[f32]);

    // Buffers and vertex input

    fn create_buffer(&self) -> Result<Self::Buffer, String>;
    fn delete_buffer(&self, buffer: Self::Buffer);
    fn bind_buffer(&self, target: u32, buffer: Option<Self::Buffer>);
    fn buffer_data_u8_slice(&self, target: u32, data: &[u8], usage: u32);
    fn enable_vertex_attrib_array(&self, index: u32);
    fn disable_vertex_attrib_array(&self, index: u32);
    fn vertex_attrib_pointer_f32(
        &self,
        index: u32,
        size: i32,
        data_type: u32,
        normalized: bool,
        stride: i32,
        offset: i32,
    );
    fn draw_arrays(&self, mode: u32, first: i32, count: i32);
}

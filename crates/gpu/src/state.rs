//! Snapshot and restore of GL global state.
//!
//! [`GlState::capture`] and [`GlState::restore`] walk the same field list in
//! the same groups; a field added to one must be added to the other.

use crate::backend::{GlBackend, ObjectBinder, VertexAttrib};

/// Capabilities toggled with `enable`/`disable` that the snapshot covers.
pub const CAPABILITIES: [u32; 9] = [
    glow::BLEND,
    glow::SCISSOR_TEST,
    glow::DEPTH_TEST,
    glow::STENCIL_TEST,
    glow::CULL_FACE,
    glow::DITHER,
    glow::POLYGON_OFFSET_FILL,
    glow::SAMPLE_COVERAGE,
    glow::SAMPLE_ALPHA_TO_COVERAGE,
];

/// Upper bound on texture units walked, whatever the driver reports.
const MAX_UNITS: i32 = 64;
/// Upper bound on vertex attributes walked.
const MAX_ATTRIBS: i32 = 32;

/// Blend function and equation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlendState {
    pub src_rgb: u32,
    pub dst_rgb: u32,
    pub src_alpha: u32,
    pub dst_alpha: u32,
    pub equation_rgb: u32,
    pub equation_alpha: u32,
}

/// Every piece of GL global state a render pass may disturb. Object bindings
/// are kept in whatever form the backend can name host objects with.
#[derive(Debug, Clone, PartialEq)]
pub struct GlState<Bindings> {
    pub capabilities: [bool; CAPABILITIES.len()],
    pub blend: BlendState,
    pub blend_color: [f32; 4],
    pub scissor_box: [i32; 4],
    pub viewport: [i32; 4],
    pub clear_color: [f32; 4],
    pub unpack_alignment: i32,
    pub active_texture: u32,
    pub bindings: Bindings,
}

/// The snapshot type for a given backend.
pub type GlStateFor<B> = GlState<<B as GlBackend>::Bindings>;

impl<Bindings> GlState<Bindings> {
    /// Read the current state. Temporarily switches the active texture unit
    /// to walk the bindings and switches it back before returning.
    pub fn capture<B>(gl: &B) -> Self
    where
        B: GlBackend<Bindings = Bindings>,
    {
        let mut capabilities = [false; CAPABILITIES.len()];
        for (slot, cap) in capabilities.iter_mut().zip(CAPABILITIES) {
            *slot = gl.is_enabled(cap);
        }

        let blend = BlendState {
            src_rgb: gl.get_parameter_i32(glow::BLEND_SRC_RGB) as u32,
            dst_rgb: gl.get_parameter_i32(glow::BLEND_DST_RGB) as u32,
            src_alpha: gl.get_parameter_i32(glow::BLEND_SRC_ALPHA) as u32,
            dst_alpha: gl.get_parameter_i32(glow::BLEND_DST_ALPHA) as u32,
            equation_rgb: gl.get_parameter_i32(glow::BLEND_EQUATION_RGB) as u32,
            equation_alpha: gl.get_parameter_i32(glow::BLEND_EQUATION_ALPHA) as u32,
        };
        let mut blend_color = [0.0; 4];
        gl.get_parameter_f32_slice(glow::BLEND_COLOR, &mut blend_color);

        let mut scissor_box = [0; 4];
        gl.get_parameter_i32_slice(glow::SCISSOR_BOX, &mut scissor_box);
        let mut viewport = [0; 4];
        gl.get_parameter_i32_slice(glow::VIEWPORT, &mut viewport);
        let mut clear_color = [0.0; 4];
        gl.get_parameter_f32_slice(glow::COLOR_CLEAR_VALUE, &mut clear_color);
        let unpack_alignment = gl.get_parameter_i32(glow::UNPACK_ALIGNMENT);

        let active_texture = gl.get_parameter_i32(glow::ACTIVE_TEXTURE) as u32;
        let units = gl.get_parameter_i32(glow::MAX_COMBINED_TEXTURE_IMAGE_UNITS).clamp(0, MAX_UNITS);
        let attribs = gl.get_parameter_i32(glow::MAX_VERTEX_ATTRIBS).clamp(0, MAX_ATTRIBS);
        let bindings = gl.capture_bindings(units as u32, attribs as u32);
        gl.active_texture(active_texture);

        Self {
            capabilities,
            blend,
            blend_color,
            scissor_box,
            viewport,
            clear_color,
            unpack_alignment,
            active_texture,
            bindings,
        }
    }

    /// Write every captured field back.
    pub fn restore<B>(&self, gl: &B)
    where
        B: GlBackend<Bindings = Bindings>,
    {
        for (enabled, cap) in self.capabilities.iter().zip(CAPABILITIES) {
            if *enabled {
                gl.enable(cap);
            } else {
                gl.disable(cap);
            }
        }

        let b = &self.blend;
        gl.blend_func_separate(b.src_rgb, b.dst_rgb, b.src_alpha, b.dst_alpha);
        gl.blend_equation_separate(b.equation_rgb, b.equation_alpha);
        let [r, g, bl, a] = self.blend_color;
        gl.blend_color(r, g, bl, a);

        let [x, y, w, h] = self.scissor_box;
        gl.scissor(x, y, w, h);
        let [x, y, w, h] = self.viewport;
        gl.viewport(x, y, w, h);
        let [r, g, bl, a] = self.clear_color;
        gl.clear_color(r, g, bl, a);
        gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, self.unpack_alignment);

        gl.restore_bindings(&self.bindings);
        gl.active_texture(self.active_texture);
    }

    pub fn is_enabled(&self, cap: u32) -> Option<bool> {
        CAPABILITIES
            .iter()
            .position(|c| *c == cap)
            .map(|i| self.capabilities[i])
    }
}

/// Object bindings read through an [`ObjectBinder`].
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectBindings<P, T, Buf, V> {
    pub program: Option<P>,
    /// `TEXTURE_2D` binding per unit, index 0 is `TEXTURE0`.
    pub textures: Vec<Option<T>>,
    pub vertex_array: Option<V>,
    pub array_buffer: Option<Buf>,
    /// Part of the vertex array state, read after `vertex_array`.
    pub element_array_buffer: Option<Buf>,
    /// Attribute slots of `vertex_array`.
    pub attribs: Vec<VertexAttrib<Buf>>,
}

impl<P, T, Buf, V> ObjectBindings<P, T, Buf, V>
where
    P: Clone + PartialEq + std::fmt::Debug,
    T: Clone + PartialEq + std::fmt::Debug,
    Buf: Clone + PartialEq + std::fmt::Debug,
    V: Clone + PartialEq + std::fmt::Debug,
{
    pub fn capture<O>(gl: &O, units: u32, attribs: u32) -> Self
    where
        O: ObjectBinder<Program = P, Texture = T, Buffer = Buf, VertexArray = V>,
    {
        let program = gl.program_binding();
        let textures = (0..units)
            .map(|unit| {
                gl.set_active_unit(glow::TEXTURE0 + unit);
                gl.texture_2d_binding()
            })
            .collect();
        let vertex_array = gl.vertex_array_binding();
        // pointer state of disabled attributes is not observable by draws
        let attribs = (0..attribs)
            .map(|i| {
                let attrib = gl.vertex_attrib(i);
                if attrib.enabled {
                    attrib
                } else {
                    VertexAttrib::default()
                }
            })
            .collect();

        Self {
            program,
            textures,
            vertex_array,
            array_buffer: gl.buffer_binding(glow::ARRAY_BUFFER),
            element_array_buffer: gl.buffer_binding(glow::ELEMENT_ARRAY_BUFFER),
            attribs,
        }
    }

    pub fn restore<O>(&self, gl: &O)
    where
        O: ObjectBinder<Program = P, Texture = T, Buffer = Buf, VertexArray = V>,
    {
        gl.set_program_binding(self.program.as_ref());

        for (unit, texture) in self.textures.iter().enumerate() {
            gl.set_active_unit(glow::TEXTURE0 + unit as u32);
            gl.set_texture_2d_binding(texture.as_ref());
        }

        // attributes and the element binding belong to the vertex array, and
        // attribute pointers rebind ARRAY_BUFFER, so that one goes last
        gl.set_vertex_array_binding(self.vertex_array.as_ref());
        for (index, attrib) in self.attribs.iter().enumerate() {
            gl.set_vertex_attrib(index as u32, attrib);
        }
        gl.set_buffer_binding(glow::ELEMENT_ARRAY_BUFFER, self.element_array_buffer.as_ref());
        gl.set_buffer_binding(glow::ARRAY_BUFFER, self.array_buffer.as_ref());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessGl;

    fn disturb(gl: &HeadlessGl) {
        gl.disable(glow::BLEND);
        gl.enable(glow::SCISSOR_TEST);
        gl.enable(glow::DEPTH_TEST);
        gl.disable(glow::DITHER);
        gl.blend_func_separate(glow::SRC_ALPHA, glow::ONE_MINUS_SRC_ALPHA, glow::ONE, glow::ONE_MINUS_SRC_ALPHA);
        gl.blend_equation_separate(glow::FUNC_SUBTRACT, glow::FUNC_ADD);
        gl.blend_color(0.1, 0.2, 0.3, 0.4);
        gl.scissor(5, 5, 10, 10);
        gl.viewport(0, 0, 32, 32);
        gl.clear_color(1.0, 0.0, 0.0, 1.0);
        gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
        let program = gl.create_program().unwrap();
        gl.use_program(Some(program));
        let tex = gl.create_texture().unwrap();
        gl.active_texture(glow::TEXTURE2);
        gl.bind_texture(glow::TEXTURE_2D, Some(tex));
        let buf = gl.create_buffer().unwrap();
        gl.bind_buffer(glow::ARRAY_BUFFER, Some(buf));
        gl.vertex_attrib_pointer_f32(3, 2, glow::FLOAT, false, 16, 8);
        gl.enable_vertex_attrib_array(3);
        gl.bind_buffer(glow::ARRAY_BUFFER, None);
    }

    #[test]
    fn test_restore_is_exact() {
        let gl = HeadlessGl::new(100, 50);
        let host_program = gl.create_program().unwrap();
        gl.use_program(Some(host_program));
        gl.enable(glow::BLEND);
        gl.scissor(1, 2, 3, 4);
        let host_buffer = gl.create_buffer().unwrap();
        gl.bind_buffer(glow::ARRAY_BUFFER, Some(host_buffer));
        gl.vertex_attrib_pointer_f32(0, 3, glow::FLOAT, false, 12, 0);
        gl.enable_vertex_attrib_array(0);
        gl.active_texture(glow::TEXTURE1);

        let before = GlState::capture(&gl);
        disturb(&gl);
        assert_ne!(GlState::capture(&gl), before);

        before.restore(&gl);
        let after = GlState::capture(&gl);
        assert_eq!(after, before);
        assert!(gl.is_enabled(glow::BLEND));
        assert_eq!(gl.program_binding(), Some(host_program));
        assert_eq!(gl.buffer_binding(glow::ARRAY_BUFFER), Some(host_buffer));
        assert_eq!(gl.get_parameter_i32(glow::ACTIVE_TEXTURE), glow::TEXTURE1 as i32);
    }

    #[test]
    fn test_capture_keeps_active_unit() {
        let gl = HeadlessGl::default();
        gl.active_texture(glow::TEXTURE5);
        let state = GlState::capture(&gl);
        assert_eq!(state.active_texture, glow::TEXTURE5);
        assert_eq!(gl.get_parameter_i32(glow::ACTIVE_TEXTURE), glow::TEXTURE5 as i32);
        assert_eq!(state.bindings.textures.len(), 8);
        assert_eq!(state.is_enabled(glow::DITHER), Some(true));
    }

    #[test]
    fn test_restore_host_vertex_array_and_offsets() {
        let gl = HeadlessGl::default();
        let positions = gl.create_buffer().unwrap();
        let indices = gl.create_buffer().unwrap();
        let host_vao = gl.create_vertex_array();
        gl.bind_vertex_array(Some(host_vao));
        gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(indices));
        gl.bind_buffer(glow::ARRAY_BUFFER, Some(positions));
        gl.vertex_attrib_pointer_f32(0, 3, glow::FLOAT, false, 32, 0);
        gl.vertex_attrib_pointer_f32(1, 2, glow::FLOAT, false, 32, 12);
        gl.vertex_attrib_pointer_f32(2, 3, glow::FLOAT, true, 32, 20);
        for i in 0..3 {
            gl.enable_vertex_attrib_array(i);
        }
        gl.bind_buffer(glow::ARRAY_BUFFER, None);

        let before = GlState::capture(&gl);
        assert_eq!(before.bindings.vertex_array, Some(host_vao));
        assert_eq!(before.bindings.attribs[2].offset, 20);

        // a pass drawing with the host's vertex array still bound
        let quad = gl.create_buffer().unwrap();
        gl.bind_buffer(glow::ARRAY_BUFFER, Some(quad));
        gl.vertex_attrib_pointer_f32(0, 2, glow::FLOAT, false, 16, 0);
        gl.vertex_attrib_pointer_f32(1, 2, glow::FLOAT, false, 16, 8);
        gl.disable_vertex_attrib_array(2);
        gl.bind_vertex_array(None);

        before.restore(&gl);
        assert_eq!(GlState::capture(&gl), before);
        assert_eq!(gl.vertex_array_binding(), Some(host_vao));
        assert_eq!(gl.buffer_binding(glow::ELEMENT_ARRAY_BUFFER), Some(indices));
        assert_eq!(gl.buffer_binding(glow::ARRAY_BUFFER), None);
        let uv = gl.vertex_attrib(1);
        assert_eq!((uv.buffer, uv.size, uv.stride, uv.offset), (Some(positions), 2, 32, 12));
        let normal = gl.vertex_attrib(2);
        assert!(normal.enabled && normal.normalized);
        assert_eq!(normal.offset, 20);
    }
}

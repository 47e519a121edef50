//! The shared quad pipeline.
//!
//! One program draws everything: textured quads for bitmaps and text, flat
//! colored triangles for graphics. Vertices are `[x, y, u, v]` in the node's
//! local pixel space; the node matrix is a uniform.

use crate::backend::GlBackend;
use crate::error::GpuError;
use crate::shaders;
use bytemuck::{Pod, Zeroable};
use common::{Color, Matrix, Point, Rect};
use tracing::debug;

/// Interleaved vertex layout.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 2],
    pub tex_coord: [f32; 2],
}

impl QuadVertex {
    pub const STRIDE: i32 = std::mem::size_of::<QuadVertex>() as i32;

    #[inline]
    pub fn new(x: f32, y: f32, u: f32, v: f32) -> Self {
        Self { position: [x, y], tex_coord: [u, v] }
    }
}

/// What a draw is filled with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fill<T> {
    Color(Color),
    Texture(T),
}

/// Compiled program plus its vertex buffer and uniform locations.
pub struct QuadPipeline<B: GlBackend> {
    program: B::Program,
    buffer: B::Buffer,
    a_position: u32,
    a_tex_coord: u32,
    u_matrix: Option<B::UniformLocation>,
    u_resolution: Option<B::UniformLocation>,
    u_texture: Option<B::UniformLocation>,
    u_use_texture: Option<B::UniformLocation>,
    u_color: Option<B::UniformLocation>,
    u_alpha: Option<B::UniformLocation>,
}

impl<B: GlBackend> QuadPipeline<B> {
    /// Compile and link the program. Any failure is fatal and leaves no GL
    /// objects behind.
    pub fn new(gl: &B) -> Result<Self, GpuError> {
        let vs = compile_shader(gl, glow::VERTEX_SHADER, shaders::QUAD_VERTEX_SHADER)?;
        let fs = match compile_shader(gl, glow::FRAGMENT_SHADER, shaders::QUAD_FRAGMENT_SHADER) {
            Ok(fs) => fs,
            Err(e) => {
                gl.delete_shader(vs);
                return Err(e);
            }
        };
        let program = link_program(gl, vs, fs);
        gl.delete_shader(vs);
        gl.delete_shader(fs);
        let program = program?;

        let attrib = |name: &'static str| {
            gl.get_attrib_location(program, name)
                .ok_or(GpuError::MissingAttribute(name))
        };
        let (a_position, a_tex_coord) = match (attrib(shaders::ATTR_POSITION), attrib(shaders::ATTR_TEXCOORD)) {
            (Ok(p), Ok(t)) => (p, t),
            (Err(e), _) | (_, Err(e)) => {
                gl.delete_program(program);
                return Err(e);
            }
        };

        let buffer = match gl.create_buffer() {
            Ok(b) => b,
            Err(e) => {
                gl.delete_program(program);
                return Err(GpuError::Resource(e));
            }
        };

        debug!("quad pipeline ready");
        Ok(Self {
            program,
            buffer,
            a_position,
            a_tex_coord,
            u_matrix: gl.get_uniform_location(program, shaders::UNIFORM_MATRIX),
            u_resolution: gl.get_uniform_location(program, shaders::UNIFORM_RESOLUTION),
            u_texture: gl.get_uniform_location(program, shaders::UNIFORM_TEXTURE),
            u_use_texture: gl.get_uniform_location(program, shaders::UNIFORM_USE_TEXTURE),
            u_color: gl.get_uniform_location(program, shaders::UNIFORM_COLOR),
            u_alpha: gl.get_uniform_location(program, shaders::UNIFORM_ALPHA),
        })
    }

    pub fn program(&self) -> B::Program {
        self.program
    }

    /// Bind program, buffer and vertex layout for a pass over a
    /// `width` x `height` drawing buffer.
    pub fn begin(&self, gl: &B, width: f32, height: f32) {
        gl.use_program(Some(self.program));
        gl.uniform_2_f32(self.u_resolution.as_ref(), width.max(1.0), height.max(1.0));
        gl.uniform_1_i32(self.u_texture.as_ref(), 0);
        gl.active_texture(glow::TEXTURE0);

        gl.bind_buffer(glow::ARRAY_BUFFER, Some(self.buffer));
        gl.enable_vertex_attrib_array(self.a_position);
        gl.vertex_attrib_pointer_f32(self.a_position, 2, glow::FLOAT, false, QuadVertex::STRIDE, 0);
        gl.enable_vertex_attrib_array(self.a_tex_coord);
        gl.vertex_attrib_pointer_f32(self.a_tex_coord, 2, glow::FLOAT, false, QuadVertex::STRIDE, 8);
    }

    /// Draw `rect` (local space) with full texture coordinates.
    pub fn draw_quad(&self, gl: &B, matrix: &Matrix, rect: Rect, fill: Fill<B::Texture>, alpha: f32) {
        let (x0, y0, x1, y1) = (rect.x, rect.y, rect.right(), rect.bottom());
        let vertices = [
            QuadVertex::new(x0, y0, 0.0, 0.0),
            QuadVertex::new(x1, y0, 1.0, 0.0),
            QuadVertex::new(x0, y1, 0.0, 1.0),
            QuadVertex::new(x0, y1, 0.0, 1.0),
            QuadVertex::new(x1, y0, 1.0, 0.0),
            QuadVertex::new(x1, y1, 1.0, 1.0),
        ];
        self.draw(gl, matrix, &vertices, glow::TRIANGLES, fill, alpha);
    }

    /// Draw untextured geometry. `mode` is a GL primitive such as
    /// `TRIANGLES` or `TRIANGLE_FAN`.
    pub fn draw_shape(&self, gl: &B, matrix: &Matrix, points: &[Point], mode: u32, color: Color, alpha: f32) {
        let vertices: Vec<QuadVertex> = points.iter().map(|p| QuadVertex::new(p.x, p.y, 0.0, 0.0)).collect();
        self.draw(gl, matrix, &vertices, mode, Fill::Color(color), alpha);
    }

    /// Upload `vertices` and issue one draw call.
    pub fn draw(&self, gl: &B, matrix: &Matrix, vertices: &[QuadVertex], mode: u32, fill: Fill<B::Texture>, alpha: f32) {
        if vertices.is_empty() {
            return;
        }
        gl.uniform_matrix_3_f32_slice(self.u_matrix.as_ref(), false, &matrix.to_mat3());
        gl.uniform_1_f32(self.u_alpha.as_ref(), alpha);
        match fill {
            Fill::Color(color) => {
                let [r, g, b, a] = color.to_f32_array();
                gl.uniform_1_i32(self.u_use_texture.as_ref(), 0);
                gl.uniform_4_f32(self.u_color.as_ref(), r, g, b, a);
            }
            Fill::Texture(texture) => {
                gl.bind_texture(glow::TEXTURE_2D, Some(texture));
                gl.uniform_1_i32(self.u_use_texture.as_ref(), 1);
                gl.uniform_4_f32(self.u_color.as_ref(), 1.0, 1.0, 1.0, 1.0);
            }
        }
        gl.buffer_data_u8_slice(glow::ARRAY_BUFFER, bytemuck::cast_slice(vertices), glow::STREAM_DRAW);
        gl.draw_arrays(mode, 0, vertices.len() as i32);
    }

    pub fn destroy(self, gl: &B) {
        gl.delete_buffer(self.buffer);
        gl.delete_program(self.program);
    }
}

fn compile_shader<B: GlBackend>(gl: &B, shader_type: u32, source: &str) -> Result<B::Shader, GpuError> {
    let shader = gl.create_shader(shader_type).map_err(GpuError::Resource)?;
    gl.shader_source(shader, source);
    gl.compile_shader(shader);
    if !gl.get_shader_compile_status(shader) {
        let log = gl.get_shader_info_log(shader);
        gl.delete_shader(shader);
        return Err(GpuError::ShaderCompile(log));
    }
    Ok(shader)
}

fn link_program<B: GlBackend>(gl: &B, vs: B::Shader, fs: B::Shader) -> Result<B::Program, GpuError> {
    let program = gl.create_program().map_err(GpuError::Resource)?;
    gl.attach_shader(program, vs);
    gl.attach_shader(program, fs);
    gl.link_program(program);
    let linked = gl.get_program_link_status(program);
    gl.detach_shader(program, vs);
    gl.detach_shader(program, fs);
    if !linked {
        let log = gl.get_program_info_log(program);
        gl.delete_program(program);
        return Err(GpuError::ProgramLink(log));
    }
    Ok(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessGl;

    #[test]
    fn test_compile_failure_is_fatal() {
        let gl = HeadlessGl::default();
        gl.fail_shader_compilation(true);
        let err = QuadPipeline::new(&gl).err().unwrap();
        assert!(matches!(err, GpuError::ShaderCompile(_)));
        assert_eq!(gl.live_programs(), 0);
    }

    #[test]
    fn test_quad_draw_sets_uniforms() {
        let gl = HeadlessGl::new(200, 100);
        let pipeline = QuadPipeline::new(&gl).unwrap();
        pipeline.begin(&gl, 200.0, 100.0);

        let m = Matrix::from_translation(10.0, 20.0);
        pipeline.draw_quad(&gl, &m, Rect::new(0.0, 0.0, 4.0, 2.0), Fill::Color(Color::rgb(255, 0, 0)), 0.5);

        let draws = gl.take_draw_calls();
        assert_eq!(draws.len(), 1);
        let d = &draws[0];
        assert_eq!(d.count, 6);
        assert_eq!(d.program, Some(pipeline.program()));
        assert_eq!(d.uniform("u_alpha"), Some(&[0.5][..]));
        assert_eq!(d.uniform("u_color"), Some(&[1.0, 0.0, 0.0, 1.0][..]));
        assert_eq!(d.uniform("u_useTexture"), Some(&[0.0][..]));
        assert_eq!(d.uniform("u_resolution"), Some(&[200.0, 100.0][..]));
        assert_eq!(d.uniform("u_matrix").unwrap()[6..8], [10.0, 20.0]);
        // second vertex is the top-right corner
        assert_eq!(d.vertices[4..8], [4.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_textured_draw_binds_texture() {
        let gl = HeadlessGl::default();
        let pipeline = QuadPipeline::new(&gl).unwrap();
        let tex = gl.create_texture().unwrap();
        pipeline.begin(&gl, 10.0, 10.0);
        pipeline.draw_quad(&gl, &Matrix::IDENTITY, Rect::new(0.0, 0.0, 1.0, 1.0), Fill::Texture(tex), 1.0);

        let draws = gl.take_draw_calls();
        assert_eq!(draws[0].texture, Some(tex));
        assert_eq!(draws[0].uniform("u_useTexture"), Some(&[1.0][..]));
    }

    #[test]
    fn test_destroy_releases_objects() {
        let gl = HeadlessGl::default();
        let pipeline = QuadPipeline::new(&gl).unwrap();
        assert_eq!(gl.live_programs(), 1);
        pipeline.destroy(&gl);
        assert_eq!(gl.live_programs(), 0);
        assert_eq!(gl.live_buffers(), 0);
    }
}

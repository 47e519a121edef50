//! [`GlBackend`] over a real GL / WebGL context via `glow`.
//!
//! State snapshots read object bindings natively through `glow` handles. On
//! the web, `glow` can only name objects it created itself, so bindings are
//! read and restored through the raw `web_sys` context instead and objects
//! the host created survive a patch render.

use crate::backend::{GlBackend, ObjectBinder, VertexAttrib};
use crate::state::ObjectBindings;
use glow::HasContext;
#[cfg(target_arch = "wasm32")]
use wasm_bindgen::{JsCast, JsValue};

/// `glGetVertexAttribPointerv`, which `glow` does not wrap.
#[cfg(not(target_arch = "wasm32"))]
type GetVertexAttribPointerv = unsafe extern "system" fn(u32, u32, *mut *mut std::ffi::c_void);

/// Snapshot type of [`GlowBackend`].
#[cfg(not(target_arch = "wasm32"))]
pub type GlowBindings = ObjectBindings<glow::Program, glow::Texture, glow::Buffer, glow::VertexArray>;

/// Snapshot type of [`GlowBackend`].
#[cfg(target_arch = "wasm32")]
pub type GlowBindings = ObjectBindings<
    web_sys::WebGlProgram,
    web_sys::WebGlTexture,
    web_sys::WebGlBuffer,
    web_sys::WebGlVertexArrayObject,
>;

/// A `glow` context behind the safe backend interface.
///
/// Every method forwards to exactly one GL call. The context is assumed to be
/// current on the calling thread for the lifetime of the backend.
pub struct GlowBackend {
    gl: glow::Context,
    /// Resolved by [`GlowBackend::from_loader_function`]. Without it attribute
    /// offsets read as 0.
    #[cfg(not(target_arch = "wasm32"))]
    attrib_pointer: Option<GetVertexAttribPointerv>,
    #[cfg(target_arch = "wasm32")]
    raw: RawContext,
}

impl GlowBackend {
    /// Wrap an existing context. Prefer
    /// [`GlowBackend::from_loader_function`] so state snapshots can read
    /// vertex attribute offsets.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn new(gl: glow::Context) -> Self {
        Self { gl, attrib_pointer: None }
    }

    /// Load the context and `glGetVertexAttribPointerv` through `loader`.
    ///
    /// # Safety
    ///
    /// Same contract as [`glow::Context::from_loader_function`]: the context
    /// the loader resolves against must be current.
    #[cfg(not(target_arch = "wasm32"))]
    pub unsafe fn from_loader_function<F>(mut loader: F) -> Self
    where
        F: FnMut(&str) -> *const std::ffi::c_void,
    {
        let gl = glow::Context::from_loader_function(&mut loader);
        let pointer = loader("glGetVertexAttribPointerv");
        let attrib_pointer = (!pointer.is_null())
            .then(|| std::mem::transmute::<*const std::ffi::c_void, GetVertexAttribPointerv>(pointer));
        Self { gl, attrib_pointer }
    }

    #[cfg(target_arch = "wasm32")]
    pub fn from_webgl2(context: web_sys::WebGl2RenderingContext) -> Self {
        Self {
            gl: glow::Context::from_webgl2_context(context.clone()),
            raw: RawContext::WebGl2(context),
        }
    }

    #[cfg(target_arch = "wasm32")]
    pub fn from_webgl1(context: web_sys::WebGlRenderingContext) -> Self {
        Self {
            gl: glow::Context::from_webgl1_context(context.clone()),
            raw: RawContext::WebGl1(context),
        }
    }

    pub fn context(&self) -> &glow::Context {
        &self.gl
    }

    /// GL 3.0 and GLES 3.0 have vertex array objects in core.
    #[cfg(not(target_arch = "wasm32"))]
    fn has_vertex_arrays(&self) -> bool {
        self.gl.version().major >= 3
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl ObjectBinder for GlowBackend {
    type Program = glow::Program;
    type Texture = glow::Texture;
    type Buffer = glow::Buffer;
    type VertexArray = glow::VertexArray;

    fn program_binding(&self) -> Option<glow::Program> {
        unsafe { self.gl.get_parameter_program(glow::CURRENT_PROGRAM) }
    }

    fn set_program_binding(&self, program: Option<&glow::Program>) {
        unsafe { self.gl.use_program(program.copied()) }
    }

    fn set_active_unit(&self, unit: u32) {
        unsafe { self.gl.active_texture(unit) }
    }

    fn texture_2d_binding(&self) -> Option<glow::Texture> {
        unsafe { self.gl.get_parameter_texture(glow::TEXTURE_BINDING_2D) }
    }

    fn set_texture_2d_binding(&self, texture: Option<&glow::Texture>) {
        unsafe { self.gl.bind_texture(glow::TEXTURE_2D, texture.copied()) }
    }

    fn vertex_array_binding(&self) -> Option<glow::VertexArray> {
        if !self.has_vertex_arrays() {
            return None;
        }
        unsafe { self.gl.get_parameter_vertex_array(glow::VERTEX_ARRAY_BINDING) }
    }

    fn set_vertex_array_binding(&self, vertex_array: Option<&glow::VertexArray>) {
        if self.has_vertex_arrays() {
            unsafe { self.gl.bind_vertex_array(vertex_array.copied()) }
        }
    }

    fn buffer_binding(&self, target: u32) -> Option<glow::Buffer> {
        unsafe { self.gl.get_parameter_buffer(binding_pname(target)) }
    }

    fn set_buffer_binding(&self, target: u32, buffer: Option<&glow::Buffer>) {
        unsafe { self.gl.bind_buffer(target, buffer.copied()) }
    }

    fn vertex_attrib(&self, index: u32) -> VertexAttrib<glow::Buffer> {
        let get = |pname: u32| {
            let mut v = [0.0f32; 4];
            unsafe { self.gl.get_vertex_attrib_parameter_f32_slice(index, pname, &mut v) };
            v[0]
        };
        let buffer = std::num::NonZeroU32::new(get(glow::VERTEX_ATTRIB_ARRAY_BUFFER_BINDING) as u32)
            .map(glow::NativeBuffer);
        let offset = self.attrib_pointer.map_or(0, |get_pointer| {
            let mut pointer = std::ptr::null_mut();
            unsafe { get_pointer(index, glow::VERTEX_ATTRIB_ARRAY_POINTER, &mut pointer) };
            pointer as usize as i32
        });
        VertexAttrib {
            enabled: get(glow::VERTEX_ATTRIB_ARRAY_ENABLED) != 0.0,
            buffer,
            size: get(glow::VERTEX_ATTRIB_ARRAY_SIZE) as i32,
            data_type: get(glow::VERTEX_ATTRIB_ARRAY_TYPE) as u32,
            normalized: get(glow::VERTEX_ATTRIB_ARRAY_NORMALIZED) != 0.0,
            stride: get(glow::VERTEX_ATTRIB_ARRAY_STRIDE) as i32,
            offset,
        }
    }

    fn set_vertex_attrib_pointer(&self, index: u32, a: &VertexAttrib<glow::Buffer>) {
        unsafe {
            self.gl
                .vertex_attrib_pointer_f32(index, a.size, a.data_type, a.normalized, a.stride, a.offset)
        }
    }

    fn set_vertex_attrib_enabled(&self, index: u32, enabled: bool) {
        if enabled {
            unsafe { self.gl.enable_vertex_attrib_array(index) }
        } else {
            unsafe { self.gl.disable_vertex_attrib_array(index) }
        }
    }
}

fn binding_pname(target: u32) -> u32 {
    match target {
        glow::ELEMENT_ARRAY_BUFFER => glow::ELEMENT_ARRAY_BUFFER_BINDING,
        _ => glow::ARRAY_BUFFER_BINDING,
    }
}

/// The `web_sys` context `glow` wraps, kept to reach host-created objects.
#[cfg(target_arch = "wasm32")]
enum RawContext {
    WebGl2(web_sys::WebGl2RenderingContext),
    WebGl1(web_sys::WebGlRenderingContext),
}

/// Run `$body` with `$gl` bound to whichever context `$raw` holds. Both
/// expose the WebGL 1 entry points under the same names.
#[cfg(target_arch = "wasm32")]
macro_rules! with_raw {
    ($raw:expr, $gl:ident => $body:expr) => {
        match $raw {
            RawContext::WebGl2($gl) => $body,
            RawContext::WebGl1($gl) => $body,
        }
    };
}

#[cfg(target_arch = "wasm32")]
fn js_object<T: JsCast>(value: Result<JsValue, JsValue>) -> Option<T> {
    value.ok().and_then(|v| v.dyn_into::<T>().ok())
}

#[cfg(target_arch = "wasm32")]
impl ObjectBinder for RawContext {
    type Program = web_sys::WebGlProgram;
    type Texture = web_sys::WebGlTexture;
    type Buffer = web_sys::WebGlBuffer;
    type VertexArray = web_sys::WebGlVertexArrayObject;

    fn program_binding(&self) -> Option<Self::Program> {
        js_object(with_raw!(self, gl => gl.get_parameter(glow::CURRENT_PROGRAM)))
    }

    fn set_program_binding(&self, program: Option<&Self::Program>) {
        with_raw!(self, gl => gl.use_program(program))
    }

    fn set_active_unit(&self, unit: u32) {
        with_raw!(self, gl => gl.active_texture(unit))
    }

    fn texture_2d_binding(&self) -> Option<Self::Texture> {
        js_object(with_raw!(self, gl => gl.get_parameter(glow::TEXTURE_BINDING_2D)))
    }

    fn set_texture_2d_binding(&self, texture: Option<&Self::Texture>) {
        with_raw!(self, gl => gl.bind_texture(glow::TEXTURE_2D, texture))
    }

    fn vertex_array_binding(&self) -> Option<Self::VertexArray> {
        match self {
            RawContext::WebGl2(gl) => js_object(gl.get_parameter(glow::VERTEX_ARRAY_BINDING)),
            RawContext::WebGl1(_) => None,
        }
    }

    fn set_vertex_array_binding(&self, vertex_array: Option<&Self::VertexArray>) {
        if let RawContext::WebGl2(gl) = self {
            gl.bind_vertex_array(vertex_array);
        }
    }

    fn buffer_binding(&self, target: u32) -> Option<Self::Buffer> {
        js_object(with_raw!(self, gl => gl.get_parameter(binding_pname(target))))
    }

    fn set_buffer_binding(&self, target: u32, buffer: Option<&Self::Buffer>) {
        with_raw!(self, gl => gl.bind_buffer(target, buffer))
    }

    fn vertex_attrib(&self, index: u32) -> VertexAttrib<Self::Buffer> {
        let get = |pname: u32| with_raw!(self, gl => gl.get_vertex_attrib(index, pname));
        let number = |pname: u32| get(pname).ok().and_then(|v| v.as_f64()).unwrap_or(0.0);
        let flag = |pname: u32| get(pname).ok().and_then(|v| v.as_bool()).unwrap_or(false);
        VertexAttrib {
            enabled: flag(glow::VERTEX_ATTRIB_ARRAY_ENABLED),
            buffer: js_object(get(glow::VERTEX_ATTRIB_ARRAY_BUFFER_BINDING)),
            size: number(glow::VERTEX_ATTRIB_ARRAY_SIZE) as i32,
            data_type: number(glow::VERTEX_ATTRIB_ARRAY_TYPE) as u32,
            normalized: flag(glow::VERTEX_ATTRIB_ARRAY_NORMALIZED),
            stride: number(glow::VERTEX_ATTRIB_ARRAY_STRIDE) as i32,
            offset: with_raw!(self, gl => gl.get_vertex_attrib_offset(index, glow::VERTEX_ATTRIB_ARRAY_POINTER)) as i32,
        }
    }

    fn set_vertex_attrib_pointer(&self, index: u32, a: &VertexAttrib<Self::Buffer>) {
        with_raw!(self, gl => gl.vertex_attrib_pointer_with_i32(index, a.size, a.data_type, a.normalized, a.stride, a.offset))
    }

    fn set_vertex_attrib_enabled(&self, index: u32, enabled: bool) {
        if enabled {
            with_raw!(self, gl => gl.enable_vertex_attrib_array(index))
        } else {
            with_raw!(self, gl => gl.disable_vertex_attrib_array(index))
        }
    }
}

impl GlBackend for GlowBackend {
    type Texture = glow::Texture;
    type Program = glow::Program;
    type Shader = glow::Shader;
    type Buffer = glow::Buffer;
    type UniformLocation = glow::UniformLocation;
    type Bindings = GlowBindings;

    fn is_enabled(&self, cap: u32) -> bool {
        unsafe { self.gl.is_enabled(cap) }
    }

    fn get_parameter_i32(&self, pname: u32) -> i32 {
        unsafe { self.gl.get_parameter_i32(pname) }
    }

    fn get_parameter_i32_slice(&self, pname: u32, out: &mut [i32]) {
        unsafe { self.gl.get_parameter_i32_slice(pname, out) }
    }

    fn get_parameter_f32_slice(&self, pname: u32, out: &mut [f32]) {
        unsafe { self.gl.get_parameter_f32_slice(pname, out) }
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn capture_bindings(&self, units: u32, attribs: u32) -> GlowBindings {
        ObjectBindings::capture(self, units, attribs)
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn restore_bindings(&self, bindings: &GlowBindings) {
        bindings.restore(self)
    }

    #[cfg(target_arch = "wasm32")]
    fn capture_bindings(&self, units: u32, attribs: u32) -> GlowBindings {
        ObjectBindings::capture(&self.raw, units, attribs)
    }

    #[cfg(target_arch = "wasm32")]
    fn restore_bindings(&self, bindings: &GlowBindings) {
        bindings.restore(&self.raw)
    }

    fn enable(&self, cap: u32) {
        unsafe { self.gl.enable(cap) }
    }

    fn disable(&self, cap: u32) {
        unsafe { self.gl.disable(cap) }
    }

    fn blend_func_separate(&self, src_rgb: u32, dst_rgb: u32, src_alpha: u32, dst_alpha: u32) {
        unsafe { self.gl.blend_func_separate(src_rgb, dst_rgb, src_alpha, dst_alpha) }
    }

    fn blend_equation_separate(&self, mode_rgb: u32, mode_alpha: u32) {
        unsafe { self.gl.blend_equation_separate(mode_rgb, mode_alpha) }
    }

    fn blend_color(&self, r: f32, g: f32, b: f32, a: f32) {
        unsafe { self.gl.blend_color(r, g, b, a) }
    }

    fn scissor(&self, x: i32, y: i32, width: i32, height: i32) {
        unsafe { self.gl.scissor(x, y, width, height) }
    }

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        unsafe { self.gl.viewport(x, y, width, height) }
    }

    fn clear_color(&self, r: f32, g: f32, b: f32, a: f32) {
        unsafe { self.gl.clear_color(r, g, b, a) }
    }

    fn clear(&self, mask: u32) {
        unsafe { self.gl.clear(mask) }
    }

    fn pixel_store_i32(&self, pname: u32, value: i32) {
        unsafe { self.gl.pixel_store_i32(pname, value) }
    }

    fn active_texture(&self, unit: u32) {
        unsafe { self.gl.active_texture(unit) }
    }

    fn create_texture(&self) -> Result<Self::Texture, String> {
        unsafe { self.gl.create_texture() }
    }

    fn delete_texture(&self, texture: Self::Texture) {
        unsafe { self.gl.delete_texture(texture) }
    }

    fn bind_texture(&self, target: u32, texture: Option<Self::Texture>) {
        unsafe { self.gl.bind_texture(target, texture) }
    }

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
    ) {
        unsafe {
            self.gl.tex_image_2d(
                target,
                level,
                internal_format,
                width,
                height,
                border,
                format,
                ty,
                glow::PixelUnpackData::Slice(pixels),
            )
        }
    }

    fn tex_parameter_i32(&self, target: u32, pname: u32, value: i32) {
        unsafe { self.gl.tex_parameter_i32(target, pname, value) }
    }

    fn generate_mipmap(&self, target: u32) {
        unsafe { self.gl.generate_mipmap(target) }
    }

    fn create_shader(&self, shader_type: u32) -> Result<Self::Shader, String> {
        unsafe { self.gl.create_shader(shader_type) }
    }

    fn shader_source(&self, shader: Self::Shader, source: &str) {
        unsafe { self.gl.shader_source(shader, source) }
    }

    fn compile_shader(&self, shader: Self::Shader) {
        unsafe { self.gl.compile_shader(shader) }
    }

    fn get_shader_compile_status(&self, shader: Self::Shader) -> bool {
        unsafe { self.gl.get_shader_compile_status(shader) }
    }

    fn get_shader_info_log(&self, shader: Self::Shader) -> String {
        unsafe { self.gl.get_shader_info_log(shader) }
    }

    fn delete_shader(&self, shader: Self::Shader) {
        unsafe { self.gl.delete_shader(shader) }
    }

    fn create_program(&self) -> Result<Self::Program, String> {
        unsafe { self.gl.create_program() }
    }

    fn attach_shader(&self, program: Self::Program, shader: Self::Shader) {
        unsafe { self.gl.attach_shader(program, shader) }
    }

    fn detach_shader(&self, program: Self::Program, shader: Self::Shader) {
        unsafe { self.gl.detach_shader(program, shader) }
    }

    fn link_program(&self, program: Self::Program) {
        unsafe { self.gl.link_program(program) }
    }

    fn get_program_link_status(&self, program: Self::Program) -> bool {
        unsafe { self.gl.get_program_link_status(program) }
    }

    fn get_program_info_log(&self, program: Self::Program) -> String {
        unsafe { self.gl.get_program_info_log(program) }
    }

    fn delete_program(&self, program: Self::Program) {
        unsafe { self.gl.delete_program(program) }
    }

    fn use_program(&self, program: Option<Self::Program>) {
        unsafe { self.gl.use_program(program) }
    }

    fn get_attrib_location(&self, program: Self::Program, name: &str) -> Option<u32> {
        unsafe { self.gl.get_attrib_location(program, name) }
    }

    fn get_uniform_location(&self, program: Self::Program, name: &str) -> Option<Self::UniformLocation> {
        unsafe { self.gl.get_uniform_location(program, name) }
    }

    fn uniform_1_i32(&self, location: Option<&Self::UniformLocation>, x: i32) {
        unsafe { self.gl.uniform_1_i32(location, x) }
    }

    fn uniform_1_f32(&self, location: Option<&Self::UniformLocation>, x: f32) {
        unsafe { self.gl.uniform_1_f32(location, x) }
    }

    fn uniform_2_f32(&self, location: Option<&Self::UniformLocation>, x: f32, y: f32) {
        unsafe { self.gl.uniform_2_f32(location, x, y) }
    }

    fn uniform_4_f32(&self, location: Option<&Self::UniformLocation>, x: f32, y: f32, z: f32, w: f32) {
        unsafe { self.gl.uniform_4_f32(location, x, y, z, w) }
    }

    fn uniform_matrix_3_f32_slice(&self, location: Option<&Self::UniformLocation>, transpose: bool, v: &[f32]) {
        unsafe { self.gl.uniform_matrix_3_f32_slice(location, transpose, v) }
    }

    fn create_buffer(&self) -> Result<Self::Buffer, String> {
        unsafe { self.gl.create_buffer() }
    }

    fn delete_buffer(&self, buffer: Self::Buffer) {
        unsafe { self.gl.delete_buffer(buffer) }
    }

    fn bind_buffer(&self, target: u32, buffer: Option<Self::Buffer>) {
        unsafe { self.gl.bind_buffer(target, buffer) }
    }

    fn buffer_data_u8_slice(&self, target: u32, data: &[u8], usage: u32) {
        unsafe { self.gl.buffer_data_u8_slice(target, data, usage) }
    }

    fn enable_vertex_attrib_array(&self, index: u32) {
        unsafe { self.gl.enable_vertex_attrib_array(index) }
    }

    fn disable_vertex_attrib_array(&self, index: u32) {
        unsafe { self.gl.disable_vertex_attrib_array(index) }
    }

    fn vertex_attrib_pointer_f32(
        &self,
        index: u32,
        size: i32,
        data_type: u32,
        normalized: bool,
        stride: i32,
        offset: i32,
    ) {
        unsafe {
            self.gl
                .vertex_attrib_pointer_f32(index, size, data_type, normalized, stride, offset)
        }
    }

    fn draw_arrays(&self, mode: u32, first: i32, count: i32) {
        unsafe { self.gl.draw_arrays(mode, first, count) }
    }
}

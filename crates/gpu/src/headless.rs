//! Headless GL backend.
//!
//! Tracks every piece of global state the engine reads or writes, the
//! resources it creates, and a log of draw calls, without touching a GPU.
//! Used by the tests and by the demo binary.

use crate::backend::{GlBackend, ObjectBinder, VertexAttrib};
use crate::state::ObjectBindings;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

const MAX_TEXTURE_UNITS: usize = 8;
const MAX_VERTEX_ATTRIBS: usize = 16;

macro_rules! handle {
    ($name:ident) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);
    };
}

handle!(HeadlessTexture);
handle!(HeadlessProgram);
handle!(HeadlessShader);
handle!(HeadlessBuffer);
handle!(HeadlessUniform);
handle!(HeadlessVertexArray);

/// Snapshot type of [`HeadlessGl`].
pub type HeadlessBindings = ObjectBindings<HeadlessProgram, HeadlessTexture, HeadlessBuffer, HeadlessVertexArray>;

/// Uploaded texture storage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextureRecord {
    pub width: i32,
    pub height: i32,
    pub mipmapped: bool,
    pub params: HashMap<u32, i32>,
    pub uploads: usize,
}

/// One recorded `draw_arrays` call.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub mode: u32,
    pub first: i32,
    pub count: i32,
    pub program: Option<HeadlessProgram>,
    /// Texture bound on unit 0.
    pub texture: Option<HeadlessTexture>,
    /// Scissor box when the scissor test was enabled.
    pub scissor: Option<[i32; 4]>,
    pub blend: bool,
    pub uniforms: HashMap<String, Vec<f32>>,
    /// Copy of the bound array buffer contents as f32.
    pub vertices: Vec<f32>,
}

impl DrawCall {
    pub fn uniform(&self, name: &str) -> Option<&[f32]> {
        self.uniforms.get(name).map(Vec::as_slice)
    }
}

/// Resource counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeadlessStats {
    pub textures_created: usize,
    pub textures_deleted: usize,
    pub texture_uploads: usize,
    pub programs_created: usize,
    pub programs_deleted: usize,
    pub buffers_created: usize,
    pub buffers_deleted: usize,
    pub clears: usize,
}

#[derive(Debug)]
struct ShaderRecord {
    source: String,
    compiled: bool,
}

/// State owned by a vertex array object. Unbound means the default one.
#[derive(Debug, Clone)]
struct VertexArrayState {
    element_buffer: Option<HeadlessBuffer>,
    attribs: [VertexAttrib<HeadlessBuffer>; MAX_VERTEX_ATTRIBS],
}

impl Default for VertexArrayState {
    fn default() -> Self {
        Self { element_buffer: None, attribs: [VertexAttrib::default(); MAX_VERTEX_ATTRIBS] }
    }
}

#[derive(Debug)]
struct HeadlessState {
    next_id: u32,
    enabled: HashSet<u32>,
    params_i32: HashMap<u32, i32>,
    blend_color: [f32; 4],
    clear_color: [f32; 4],
    scissor: [i32; 4],
    viewport: [i32; 4],
    program: Option<HeadlessProgram>,
    active_unit: usize,
    units: [Option<HeadlessTexture>; MAX_TEXTURE_UNITS],
    array_buffer: Option<HeadlessBuffer>,
    vertex_array: Option<HeadlessVertexArray>,
    default_vertex_array: VertexArrayState,
    vertex_arrays: HashMap<HeadlessVertexArray, VertexArrayState>,
    textures: HashMap<HeadlessTexture, TextureRecord>,
    shaders: HashMap<HeadlessShader, ShaderRecord>,
    programs: HashMap<HeadlessProgram, (Vec<HeadlessShader>, bool)>,
    buffers: HashMap<HeadlessBuffer, Vec<u8>>,
    attrib_names: Vec<String>,
    uniform_names: Vec<String>,
    uniform_values: HashMap<u32, Vec<f32>>,
    draws: Vec<DrawCall>,
    stats: HeadlessStats,
    fail_shader_compile: bool,
}

impl HeadlessState {
    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn vao(&self) -> &VertexArrayState {
        self.vertex_array
            .and_then(|v| self.vertex_arrays.get(&v))
            .unwrap_or(&self.default_vertex_array)
    }

    fn vao_mut(&mut self) -> &mut VertexArrayState {
        let Self { vertex_array, vertex_arrays, default_vertex_array, .. } = self;
        match vertex_array.and_then(|v| vertex_arrays.get_mut(&v)) {
            Some(vao) => vao,
            None => default_vertex_array,
        }
    }
}

/// State-tracking GL double.
#[derive(Debug)]
pub struct HeadlessGl {
    state: RefCell<HeadlessState>,
}

impl Default for HeadlessGl {
    fn default() -> Self {
        Self::new(300, 150)
    }
}

impl HeadlessGl {
    /// Fresh context with GL's initial state and a `width` x `height` default
    /// framebuffer.
    pub fn new(width: i32, height: i32) -> Self {
        let mut params_i32 = HashMap::new();
        params_i32.insert(glow::BLEND_SRC_RGB, glow::ONE as i32);
        params_i32.insert(glow::BLEND_SRC_ALPHA, glow::ONE as i32);
        params_i32.insert(glow::BLEND_DST_RGB, glow::ZERO as i32);
        params_i32.insert(glow::BLEND_DST_ALPHA, glow::ZERO as i32);
        params_i32.insert(glow::BLEND_EQUATION_RGB, glow::FUNC_ADD as i32);
        params_i32.insert(glow::BLEND_EQUATION_ALPHA, glow::FUNC_ADD as i32);
        params_i32.insert(glow::UNPACK_ALIGNMENT, 4);

        let mut enabled = HashSet::new();
        enabled.insert(glow::DITHER);

        Self {
            state: RefCell::new(HeadlessState {
                next_id: 0,
                enabled,
                params_i32,
                blend_color: [0.0; 4],
                clear_color: [0.0; 4],
                scissor: [0, 0, width, height],
                viewport: [0, 0, width, height],
                program: None,
                active_unit: 0,
                units: [None; MAX_TEXTURE_UNITS],
                array_buffer: None,
                vertex_array: None,
                default_vertex_array: VertexArrayState::default(),
                vertex_arrays: HashMap::new(),
                textures: HashMap::new(),
                shaders: HashMap::new(),
                programs: HashMap::new(),
                buffers: HashMap::new(),
                attrib_names: Vec::new(),
                uniform_names: Vec::new(),
                uniform_values: HashMap::new(),
                draws: Vec::new(),
                stats: HeadlessStats::default(),
                fail_shader_compile: false,
            }),
        }
    }

    /// Make every subsequent `compile_shader` fail.
    pub fn fail_shader_compilation(&self, fail: bool) {
        self.state.borrow_mut().fail_shader_compile = fail;
    }

    pub fn draw_calls(&self) -> Vec<DrawCall> {
        self.state.borrow().draws.clone()
    }

    pub fn take_draw_calls(&self) -> Vec<DrawCall> {
        std::mem::take(&mut self.state.borrow_mut().draws)
    }

    pub fn stats(&self) -> HeadlessStats {
        self.state.borrow().stats
    }

    pub fn live_textures(&self) -> usize {
        self.state.borrow().textures.len()
    }

    pub fn texture_record(&self, texture: HeadlessTexture) -> Option<TextureRecord> {
        self.state.borrow().textures.get(&texture).cloned()
    }

    pub fn live_programs(&self) -> usize {
        self.state.borrow().programs.len()
    }

    pub fn live_buffers(&self) -> usize {
        self.state.borrow().buffers.len()
    }

    // Vertex array objects are only touched by hosts, never by the engine.

    pub fn create_vertex_array(&self) -> HeadlessVertexArray {
        let mut s = self.state.borrow_mut();
        let vertex_array = HeadlessVertexArray(s.next());
        s.vertex_arrays.insert(vertex_array, VertexArrayState::default());
        vertex_array
    }

    pub fn bind_vertex_array(&self, vertex_array: Option<HeadlessVertexArray>) {
        self.state.borrow_mut().vertex_array = vertex_array;
    }

    pub fn delete_vertex_array(&self, vertex_array: HeadlessVertexArray) {
        let mut s = self.state.borrow_mut();
        s.vertex_arrays.remove(&vertex_array);
        if s.vertex_array == Some(vertex_array) {
            s.vertex_array = None;
        }
    }
}

impl ObjectBinder for HeadlessGl {
    type Program = HeadlessProgram;
    type Texture = HeadlessTexture;
    type Buffer = HeadlessBuffer;
    type VertexArray = HeadlessVertexArray;

    fn program_binding(&self) -> Option<HeadlessProgram> {
        self.state.borrow().program
    }

    fn set_program_binding(&self, program: Option<&HeadlessProgram>) {
        self.use_program(program.copied());
    }

    fn set_active_unit(&self, unit: u32) {
        self.active_texture(unit);
    }

    fn texture_2d_binding(&self) -> Option<HeadlessTexture> {
        let s = self.state.borrow();
        s.units[s.active_unit]
    }

    fn set_texture_2d_binding(&self, texture: Option<&HeadlessTexture>) {
        self.bind_texture(glow::TEXTURE_2D, texture.copied());
    }

    fn vertex_array_binding(&self) -> Option<HeadlessVertexArray> {
        self.state.borrow().vertex_array
    }

    fn set_vertex_array_binding(&self, vertex_array: Option<&HeadlessVertexArray>) {
        self.bind_vertex_array(vertex_array.copied());
    }

    fn buffer_binding(&self, target: u32) -> Option<HeadlessBuffer> {
        let s = self.state.borrow();
        match target {
            glow::ELEMENT_ARRAY_BUFFER => s.vao().element_buffer,
            _ => s.array_buffer,
        }
    }

    fn set_buffer_binding(&self, target: u32, buffer: Option<&HeadlessBuffer>) {
        self.bind_buffer(target, buffer.copied());
    }

    fn vertex_attrib(&self, index: u32) -> VertexAttrib<HeadlessBuffer> {
        self.state
            .borrow()
            .vao()
            .attribs
            .get(index as usize)
            .copied()
            .unwrap_or_default()
    }

    fn set_vertex_attrib_pointer(&self, index: u32, attrib: &VertexAttrib<HeadlessBuffer>) {
        self.vertex_attrib_pointer_f32(
            index,
            attrib.size,
            attrib.data_type,
            attrib.normalized,
            attrib.stride,
            attrib.offset,
        );
    }

    fn set_vertex_attrib_enabled(&self, index: u32, enabled: bool) {
        if enabled {
            self.enable_vertex_attrib_array(index);
        } else {
            self.disable_vertex_attrib_array(index);
        }
    }
}

impl GlBackend for HeadlessGl {
    type Texture = HeadlessTexture;
    type Program = HeadlessProgram;
    type Shader = HeadlessShader;
    type Buffer = HeadlessBuffer;
    type UniformLocation = HeadlessUniform;
    type Bindings = HeadlessBindings;

    fn is_enabled(&self, cap: u32) -> bool {
        self.state.borrow().enabled.contains(&cap)
    }

    fn get_parameter_i32(&self, pname: u32) -> i32 {
        let s = self.state.borrow();
        match pname {
            glow::ACTIVE_TEXTURE => (glow::TEXTURE0 as usize + s.active_unit) as i32,
            glow::MAX_COMBINED_TEXTURE_IMAGE_UNITS => MAX_TEXTURE_UNITS as i32,
            glow::MAX_VERTEX_ATTRIBS => MAX_VERTEX_ATTRIBS as i32,
            glow::MAX_TEXTURE_SIZE => 4096,
            _ => s.params_i32.get(&pname).copied().unwrap_or(0),
        }
    }

    fn get_parameter_i32_slice(&self, pname: u32, out: &mut [i32]) {
        let s = self.state.borrow();
        let src = match pname {
            glow::SCISSOR_BOX => s.scissor,
            glow::VIEWPORT => s.viewport,
            _ => [0; 4],
        };
        for (o, v) in out.iter_mut().zip(src) {
            *o = v;
        }
    }

    fn get_parameter_f32_slice(&self, pname: u32, out: &mut [f32]) {
        let s = self.state.borrow();
        let src = match pname {
            glow::BLEND_COLOR => s.blend_color,
            glow::COLOR_CLEAR_VALUE => s.clear_color,
            _ => [0.0; 4],
        };
        for (o, v) in out.iter_mut().zip(src) {
            *o = v;
        }
    }

    fn capture_bindings(&self, units: u32, attribs: u32) -> HeadlessBindings {
        ObjectBindings::capture(self, units, attribs)
    }

    fn restore_bindings(&self, bindings: &HeadlessBindings) {
        bindings.restore(self)
    }

    fn enable(&self, cap: u32) {
        self.state.borrow_mut().enabled.insert(cap);
    }

    fn disable(&self, cap: u32) {
        self.state.borrow_mut().enabled.remove(&cap);
    }

    fn blend_func_separate(&self, src_rgb: u32, dst_rgb: u32, src_alpha: u32, dst_alpha: u32) {
        let mut s = self.state.borrow_mut();
        s.params_i32.insert(glow::BLEND_SRC_RGB, src_rgb as i32);
        s.params_i32.insert(glow::BLEND_DST_RGB, dst_rgb as i32);
        s.params_i32.insert(glow::BLEND_SRC_ALPHA, src_alpha as i32);
        s.params_i32.insert(glow::BLEND_DST_ALPHA, dst_alpha as i32);
    }

    fn blend_equation_separate(&self, mode_rgb: u32, mode_alpha: u32) {
        let mut s = self.state.borrow_mut();
        s.params_i32.insert(glow::BLEND_EQUATION_RGB, mode_rgb as i32);
        s.params_i32.insert(glow::BLEND_EQUATION_ALPHA, mode_alpha as i32);
    }

    fn blend_color(&self, r: f32, g: f32, b: f32, a: f32) {
        self.state.borrow_mut().blend_color = [r, g, b, a];
    }

    fn scissor(&self, x: i32, y: i32, width: i32, height: i32) {
        self.state.borrow_mut().scissor = [x, y, width, height];
    }

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        self.state.borrow_mut().viewport = [x, y, width, height];
    }

    fn clear_color(&self, r: f32, g: f32, b: f32, a: f32) {
        self.state.borrow_mut().clear_color = [r, g, b, a];
    }

    fn clear(&self, _mask: u32) {
        self.state.borrow_mut().stats.clears += 1;
    }

    fn pixel_store_i32(&self, pname: u32, value: i32) {
        self.state.borrow_mut().params_i32.insert(pname, value);
    }

    fn active_texture(&self, unit: u32) {
        let index = unit.saturating_sub(glow::TEXTURE0) as usize;
        if index < MAX_TEXTURE_UNITS {
            self.state.borrow_mut().active_unit = index;
        }
    }

    fn create_texture(&self) -> Result<Self::Texture, String> {
        let mut s = self.state.borrow_mut();
        let texture = HeadlessTexture(s.next());
        s.textures.insert(texture, TextureRecord::default());
        s.stats.textures_created += 1;
        Ok(texture)
    }

    fn delete_texture(&self, texture: Self::Texture) {
        let mut s = self.state.borrow_mut();
        if s.textures.remove(&texture).is_some() {
            s.stats.textures_deleted += 1;
        }
        for unit in s.units.iter_mut() {
            if *unit == Some(texture) {
                *unit = None;
            }
        }
    }

    fn bind_texture(&self, _target: u32, texture: Option<Self::Texture>) {
        let mut s = self.state.borrow_mut();
        let unit = s.active_unit;
        s.units[unit] = texture;
    }

    fn tex_image_2d(
        &self,
        _target: u32,
        level: i32,
        _internal_format: i32,
        width: i32,
        height: i32,
        _border: i32,
        _format: u32,
        _ty: u32,
        pixels: Option<&[u8]>,
    ) {
        let mut s = self.state.borrow_mut();
        let Some(texture) = s.units[s.active_unit] else {
            return;
        };
        if level == 0 {
            if let Some(record) = s.textures.get_mut(&texture) {
                record.width = width;
                record.height = height;
                record.uploads += 1;
            }
        }
        if pixels.is_some() {
            s.stats.texture_uploads += 1;
        }
    }

    fn tex_parameter_i32(&self, _target: u32, pname: u32, value: i32) {
        let mut s = self.state.borrow_mut();
        if let Some(texture) = s.units[s.active_unit] {
            if let Some(record) = s.textures.get_mut(&texture) {
                record.params.insert(pname, value);
            }
        }
    }

    fn generate_mipmap(&self, _target: u32) {
        let mut s = self.state.borrow_mut();
        if let Some(texture) = s.units[s.active_unit] {
            if let Some(record) = s.textures.get_mut(&texture) {
                record.mipmapped = true;
            }
        }
    }

    fn create_shader(&self, _shader_type: u32) -> Result<Self::Shader, String> {
        let mut s = self.state.borrow_mut();
        let shader = HeadlessShader(s.next());
        s.shaders.insert(shader, ShaderRecord { source: String::new(), compiled: false });
        Ok(shader)
    }

    fn shader_source(&self, shader: Self::Shader, source: &str) {
        if let Some(record) = self.state.borrow_mut().shaders.get_mut(&shader) {
            record.source = source.to_string();
        }
    }

    fn compile_shader(&self, shader: Self::Shader) {
        let mut s = self.state.borrow_mut();
        let fail = s.fail_shader_compile;
        if let Some(record) = s.shaders.get_mut(&shader) {
            record.compiled = !fail && record.source.contains("void main");
        }
    }

    fn get_shader_compile_status(&self, shader: Self::Shader) -> bool {
        self.state
            .borrow()
            .shaders
            .get(&shader)
            .map(|r| r.compiled)
            .unwrap_or(false)
    }

    fn get_shader_info_log(&self, shader: Self::Shader) -> String {
        if self.get_shader_compile_status(shader) {
            String::new()
        } else {
            "ERROR: 0:1: headless compile failure".to_string()
        }
    }

    fn delete_shader(&self, shader: Self::Shader) {
        self.state.borrow_mut().shaders.remove(&shader);
    }

    fn create_program(&self) -> Result<Self::Program, String> {
        let mut s = self.state.borrow_mut();
        let program = HeadlessProgram(s.next());
        s.programs.insert(program, (Vec::new(), false));
        s.stats.programs_created += 1;
        Ok(program)
    }

    fn attach_shader(&self, program: Self::Program, shader: Self::Shader) {
        if let Some((shaders, _)) = self.state.borrow_mut().programs.get_mut(&program) {
            shaders.push(shader);
        }
    }

    fn detach_shader(&self, program: Self::Program, shader: Self::Shader) {
        if let Some((shaders, _)) = self.state.borrow_mut().programs.get_mut(&program) {
            shaders.retain(|s| *s != shader);
        }
    }

    fn link_program(&self, program: Self::Program) {
        let mut s = self.state.borrow_mut();
        let Some((shaders, _)) = s.programs.get(&program) else {
            return;
        };
        let ok = shaders.len() >= 2
            && shaders
                .iter()
                .all(|sh| s.shaders.get(sh).map(|r| r.compiled).unwrap_or(false));
        if let Some(entry) = s.programs.get_mut(&program) {
            entry.1 = ok;
        }
    }

    fn get_program_link_status(&self, program: Self::Program) -> bool {
        self.state
            .borrow()
            .programs
            .get(&program)
            .map(|p| p.1)
            .unwrap_or(false)
    }

    fn get_program_info_log(&self, program: Self::Program) -> String {
        if self.get_program_link_status(program) {
            String::new()
        } else {
            "headless link failure".to_string()
        }
    }

    fn delete_program(&self, program: Self::Program) {
        let mut s = self.state.borrow_mut();
        if s.programs.remove(&program).is_some() {
            s.stats.programs_deleted += 1;
        }
        if s.program == Some(program) {
            s.program = None;
        }
    }

    fn use_program(&self, program: Option<Self::Program>) {
        self.state.borrow_mut().program = program;
    }

    fn get_attrib_location(&self, _program: Self::Program, name: &str) -> Option<u32> {
        let mut s = self.state.borrow_mut();
        let index = match s.attrib_names.iter().position(|n| n == name) {
            Some(i) => i,
            None => {
                s.attrib_names.push(name.to_string());
                s.attrib_names.len() - 1
            }
        };
        (index < MAX_VERTEX_ATTRIBS).then_some(index as u32)
    }

    fn get_uniform_location(&self, _program: Self::Program, name: &str) -> Option<Self::UniformLocation> {
        let mut s = self.state.borrow_mut();
        let index = match s.uniform_names.iter().position(|n| n == name) {
            Some(i) => i,
            None => {
                s.uniform_names.push(name.to_string());
                s.uniform_names.len() - 1
            }
        };
        Some(HeadlessUniform(index as u32))
    }

    fn uniform_1_i32(&self, location: Option<&Self::UniformLocation>, x: i32) {
        if let Some(loc) = location {
            self.state.borrow_mut().uniform_values.insert(loc.0, vec![x as f32]);
        }
    }

    fn uniform_1_f32(&self, location: Option<&Self::UniformLocation>, x: f32) {
        if let Some(loc) = location {
            self.state.borrow_mut().uniform_values.insert(loc.0, vec![x]);
        }
    }

    fn uniform_2_f32(&self, location: Option<&Self::UniformLocation>, x: f32, y: f32) {
        if let Some(loc) = location {
            self.state.borrow_mut().uniform_values.insert(loc.0, vec![x, y]);
        }
    }

    fn uniform_4_f32(&self, location: Option<&Self::UniformLocation>, x: f32, y: f32, z: f32, w: f32) {
        if let Some(loc) = location {
            self.state.borrow_mut().uniform_values.insert(loc.0, vec![x, y, z, w]);
        }
    }

    fn uniform_matrix_3_f32_slice(&self, location: Option<&Self::UniformLocation>, _transpose: bool, v: &[f32]) {
        if let Some(loc) = location {
            self.state.borrow_mut().uniform_values.insert(loc.0, v.to_vec());
        }
    }

    fn create_buffer(&self) -> Result<Self::Buffer, String> {
        let mut s = self.state.borrow_mut();
        let buffer = HeadlessBuffer(s.next());
        s.buffers.insert(buffer, Vec::new());
        s.stats.buffers_created += 1;
        Ok(buffer)
    }

    fn delete_buffer(&self, buffer: Self::Buffer) {
        let mut s = self.state.borrow_mut();
        if s.buffers.remove(&buffer).is_some() {
            s.stats.buffers_deleted += 1;
        }
        if s.array_buffer == Some(buffer) {
            s.array_buffer = None;
        }
        let vao = s.vao_mut();
        if vao.element_buffer == Some(buffer) {
            vao.element_buffer = None;
        }
    }

    fn bind_buffer(&self, target: u32, buffer: Option<Self::Buffer>) {
        let mut s = self.state.borrow_mut();
        match target {
            glow::ELEMENT_ARRAY_BUFFER => s.vao_mut().element_buffer = buffer,
            _ => s.array_buffer = buffer,
        }
    }

    fn buffer_data_u8_slice(&self, target: u32, data: &[u8], _usage: u32) {
        let mut s = self.state.borrow_mut();
        let bound = match target {
            glow::ELEMENT_ARRAY_BUFFER => s.vao().element_buffer,
            _ => s.array_buffer,
        };
        if let Some(buffer) = bound {
            s.buffers.insert(buffer, data.to_vec());
        }
    }

    fn enable_vertex_attrib_array(&self, index: u32) {
        if let Some(a) = self.state.borrow_mut().vao_mut().attribs.get_mut(index as usize) {
            a.enabled = true;
        }
    }

    fn disable_vertex_attrib_array(&self, index: u32) {
        if let Some(a) = self.state.borrow_mut().vao_mut().attribs.get_mut(index as usize) {
            a.enabled = false;
        }
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
        let mut s = self.state.borrow_mut();
        let buffer = s.array_buffer;
        if let Some(a) = s.vao_mut().attribs.get_mut(index as usize) {
            a.buffer = buffer;
            a.size = size;
            a.data_type = data_type;
            a.normalized = normalized;
            a.stride = stride;
            a.offset = offset;
        }
    }

    fn draw_arrays(&self, mode: u32, first: i32, count: i32) {
        let mut s = self.state.borrow_mut();
        let uniforms = s
            .uniform_values
            .iter()
            .filter_map(|(id, v)| s.uniform_names.get(*id as usize).map(|n| (n.clone(), v.clone())))
            .collect();
        let vertices = s
            .array_buffer
            .and_then(|b| s.buffers.get(&b))
            .map(|bytes| {
                bytes
                    .chunks_exact(4)
                    .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
                    .collect()
            })
            .unwrap_or_default();
        let call = DrawCall {
            mode,
            first,
            count,
            program: s.program,
            texture: s.units[0],
            scissor: s.enabled.contains(&glow::SCISSOR_TEST).then_some(s.scissor),
            blend: s.enabled.contains(&glow::BLEND),
            uniforms,
            vertices,
        };
        s.draws.push(call);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let gl = HeadlessGl::new(640, 480);
        assert!(!gl.is_enabled(glow::BLEND));
        assert!(gl.is_enabled(glow::DITHER));
        let mut vp = [0; 4];
        gl.get_parameter_i32_slice(glow::VIEWPORT, &mut vp);
        assert_eq!(vp, [0, 0, 640, 480]);
        assert_eq!(gl.get_parameter_i32(glow::ACTIVE_TEXTURE), glow::TEXTURE0 as i32);
    }

    #[test]
    fn test_texture_units_are_independent() {
        let gl = HeadlessGl::default();
        let a = gl.create_texture().unwrap();
        let b = gl.create_texture().unwrap();
        gl.active_texture(glow::TEXTURE0);
        gl.bind_texture(glow::TEXTURE_2D, Some(a));
        gl.active_texture(glow::TEXTURE3);
        gl.bind_texture(glow::TEXTURE_2D, Some(b));

        assert_eq!(gl.texture_2d_binding(), Some(b));
        gl.active_texture(glow::TEXTURE0);
        assert_eq!(gl.texture_2d_binding(), Some(a));
    }

    #[test]
    fn test_attribs_belong_to_vertex_array() {
        let gl = HeadlessGl::default();
        let buffer = gl.create_buffer().unwrap();
        gl.bind_buffer(glow::ARRAY_BUFFER, Some(buffer));
        gl.vertex_attrib_pointer_f32(1, 2, glow::FLOAT, false, 16, 8);
        gl.enable_vertex_attrib_array(1);

        let vao = gl.create_vertex_array();
        gl.bind_vertex_array(Some(vao));
        assert!(!gl.vertex_attrib(1).enabled);
        gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(buffer));

        gl.bind_vertex_array(None);
        let attrib = gl.vertex_attrib(1);
        assert!(attrib.enabled);
        assert_eq!((attrib.buffer, attrib.offset), (Some(buffer), 8));
        assert_eq!(gl.buffer_binding(glow::ELEMENT_ARRAY_BUFFER), None);
        assert_eq!(gl.buffer_binding(glow::ARRAY_BUFFER), Some(buffer));
    }

    #[test]
    fn test_failed_compile_blocks_link() {
        let gl = HeadlessGl::default();
        gl.fail_shader_compilation(true);
        let vs = gl.create_shader(glow::VERTEX_SHADER).unwrap();
        gl.shader_source(vs, "void main() {}");
        gl.compile_shader(vs);
        assert!(!gl.get_shader_compile_status(vs));
        assert!(!gl.get_shader_info_log(vs).is_empty());
    }

    #[test]
    fn test_draw_records_uniforms_and_scissor() {
        let gl = HeadlessGl::default();
        let program = gl.create_program().unwrap();
        gl.use_program(Some(program));
        let alpha = gl.get_uniform_location(program, "u_alpha");
        gl.uniform_1_f32(alpha.as_ref(), 0.25);
        gl.enable(glow::SCISSOR_TEST);
        gl.scissor(1, 2, 3, 4);
        gl.draw_arrays(glow::TRIANGLES, 0, 6);

        let draws = gl.take_draw_calls();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].uniform("u_alpha"), Some(&[0.25][..]));
        assert_eq!(draws[0].scissor, Some([1, 2, 3, 4]));
        assert!(gl.draw_calls().is_empty());
    }
}

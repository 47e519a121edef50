//! GLSL ES 1.00 sources for the shared quad pipeline.
//!
//! The vertex stage takes pixel-space positions, applies the node matrix and
//! converts to clip space with y pointing down. The fragment stage samples a
//! texture or emits a flat color, scaled by the node's accumulated alpha.

/// Vertex shader.
pub const QUAD_VERTEX_SHADER: &str = r#"
attribute vec2 a_position;
attribute vec2 a_texCoord;

uniform mat3 u_matrix;
uniform vec2 u_resolution;

varying vec2 v_texCoord;

void main() {
    vec2 position = (u_matrix * vec3(a_position, 1.0)).xy;
    vec2 clip = (position / u_resolution) * 2.0 - 1.0;
    gl_Position = vec4(clip * vec2(1.0, -1.0), 0.0, 1.0);
    v_texCoord = a_texCoord;
}
"#;

/// Fragment shader.
pub const QUAD_FRAGMENT_SHADER: &str = r#"
precision mediump float;

uniform sampler2D u_texture;
uniform bool u_useTexture;
uniform vec4 u_color;
uniform float u_alpha;

varying vec2 v_texCoord;

void main() {
    vec4 base = u_useTexture ? texture2D(u_texture, v_texCoord) : u_color;
    gl_FragColor = vec4(base.rgb, base.a * u_alpha);
}
"#;

pub const ATTR_POSITION: &str = "a_position";
pub const ATTR_TEXCOORD: &str = "a_texCoord";
pub const UNIFORM_MATRIX: &str = "u_matrix";
pub const UNIFORM_RESOLUTION: &str = "u_resolution";
pub const UNIFORM_TEXTURE: &str = "u_texture";
pub const UNIFORM_USE_TEXTURE: &str = "u_useTexture";
pub const UNIFORM_COLOR: &str = "u_color";
pub const UNIFORM_ALPHA: &str = "u_alpha";

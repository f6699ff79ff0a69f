/// Pick pass shader: every primitive flat-shaded with its 24-bit ID
/// color. No blending, anti-aliasing or texturing; the target is read
/// back and decoded into the hit map.
pub const PICK: &str = r#"
struct Uniforms {
    view_proj: mat4x4<f32>,
    model: mat4x4<f32>,
};

struct PickParams {
    id_color: vec4<f32>,
};

@group(0) @binding(0)
var<uniform> uniforms: Uniforms;
@group(1) @binding(0)
var<uniform> params: PickParams;

struct VertexInput {
    @location(0) position: vec3<f32>,
};

@vertex
fn vs_main(in: VertexInput) -> @builtin(position) vec4<f32> {
    return uniforms.view_proj * uniforms.model * vec4<f32>(in.position, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return params.id_color;
}
"#;

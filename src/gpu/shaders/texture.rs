/// 2-D texture shader: clim intensity scaling, colormap LUT lookup and
/// gaussian anti-aliasing.
///
/// `params.aa` selects the kernel half-width (0..=3); tap weights arrive
/// precomputed in `params.weights` (center-out, 4 floats). Color images
/// (`params.channels` > 1) skip the LUT and scale channels directly.
pub const TEXTURE2D: &str = r#"
struct Uniforms {
    view_proj: mat4x4<f32>,
    model: mat4x4<f32>,
};

struct TexParams {
    clim: vec2<f32>,
    texel: vec2<f32>,
    weights: vec4<f32>,
    aa: u32,
    channels: u32,
    _pad: vec2<f32>,
};

@group(0) @binding(0)
var<uniform> uniforms: Uniforms;
@group(1) @binding(0)
var<uniform> params: TexParams;
@group(1) @binding(1)
var data_sampler: sampler;
@group(1) @binding(2)
var data_texture: texture_2d<f32>;
@group(1) @binding(3)
var lut_sampler: sampler;
@group(1) @binding(4)
var lut_texture: texture_2d<f32>;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) color: vec4<f32>,
    @location(2) normal: vec3<f32>,
    @location(3) tex_coords: vec2<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) tex_coords: vec2<f32>,
};

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = uniforms.view_proj * uniforms.model * vec4<f32>(in.position, 1.0);
    out.tex_coords = in.tex_coords;
    return out;
}

fn tap_weight(offset: i32) -> f32 {
    let a = abs(offset);
    if (a == 0) { return params.weights.x; }
    if (a == 1) { return params.weights.y; }
    if (a == 2) { return params.weights.z; }
    return params.weights.w;
}

fn sample_filtered(uv: vec2<f32>) -> vec4<f32> {
    if (params.aa == 0u) {
        return textureSample(data_texture, data_sampler, uv);
    }
    let half_width = i32(params.aa);
    var acc = vec4<f32>(0.0, 0.0, 0.0, 0.0);
    for (var dy = -3; dy <= 3; dy = dy + 1) {
        for (var dx = -3; dx <= 3; dx = dx + 1) {
            if (abs(dx) > half_width || abs(dy) > half_width) {
                continue;
            }
            let w = tap_weight(dx) * tap_weight(dy);
            let offset = vec2<f32>(f32(dx), f32(dy)) * params.texel;
            acc = acc + w * textureSample(data_texture, data_sampler, uv + offset);
        }
    }
    return acc;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let raw = sample_filtered(in.tex_coords);
    let span = max(params.clim.y - params.clim.x, 1e-12);
    if (params.channels == 1u) {
        let t = clamp((raw.r - params.clim.x) / span, 0.0, 1.0);
        return textureSample(lut_texture, lut_sampler, vec2<f32>(t, 0.5));
    }
    let scaled = clamp((raw.rgb - vec3<f32>(params.clim.x)) / span, vec3<f32>(0.0), vec3<f32>(1.0));
    var alpha = 1.0;
    if (params.channels == 4u) {
        alpha = raw.a;
    }
    return vec4<f32>(scaled, alpha);
}
"#;

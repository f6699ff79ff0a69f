/// Marker sprites: each point is expanded to a screen-aligned quad on
/// the CPU; the fragment stage cuts the glyph shape out of the quad.
///
/// `tex_coords` carries the quad corner in [-1, 1]^2 and `normal.z` the
/// sprite size in pixels; `shape` selects the glyph.
pub const MARKER: &str = r#"
struct Uniforms {
    view_proj: mat4x4<f32>,
    model: mat4x4<f32>,
};

struct MarkerStyle {
    face_color: vec4<f32>,
    edge_color: vec4<f32>,
    viewport: vec2<f32>,
    edge_width_px: f32,
    shape: u32,
};

@group(0) @binding(0)
var<uniform> uniforms: Uniforms;
@group(1) @binding(0)
var<uniform> style: MarkerStyle;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) color: vec4<f32>,
    @location(2) normal: vec3<f32>,
    @location(3) tex_coords: vec2<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) corner: vec2<f32>,
};

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let center = uniforms.view_proj * uniforms.model * vec4<f32>(in.position, 1.0);
    let size_px = in.normal.z;
    // Offset the corner in NDC, keeping the sprite screen-aligned.
    let offset = in.tex_coords * size_px / style.viewport * center.w;
    out.clip_position = vec4<f32>(center.xy + offset, center.zw);
    out.corner = in.tex_coords;
    return out;
}

// Signed distance to the glyph outline, in corner units.
fn glyph_distance(p: vec2<f32>, shape: u32) -> f32 {
    switch (shape) {
        // circle
        case 0u: {
            return length(p) - 0.9;
        }
        // square
        case 1u: {
            let d = abs(p) - vec2<f32>(0.75, 0.75);
            return max(d.x, d.y);
        }
        // diamond
        case 2u: {
            return abs(p.x) + abs(p.y) - 0.9;
        }
        // plus
        case 3u: {
            let horizontal = max(abs(p.y) - 0.22, abs(p.x) - 0.9);
            let vertical = max(abs(p.x) - 0.22, abs(p.y) - 0.9);
            return min(horizontal, vertical);
        }
        // cross (rotated plus)
        case 4u: {
            let q = vec2<f32>(abs(p.x + p.y), abs(p.x - p.y)) * 0.7071;
            let a = max(q.y - 0.22, q.x - 0.9);
            let b = max(q.x - 0.22, q.y - 0.9);
            return min(a, b);
        }
        // triangle up
        case 5u: {
            let k = 1.7321;
            return max(abs(p.x) * k * 0.5 + p.y * 0.5, -p.y) - 0.55;
        }
        // point (small disc)
        case 6u: {
            return length(p) - 0.35;
        }
        default: {
            return length(p) - 0.9;
        }
    }
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let d = glyph_distance(in.corner, style.shape);
    if (d > 0.0) {
        discard;
    }
    let edge = style.edge_width_px * 0.08;
    if (d > -edge) {
        return style.edge_color;
    }
    return style.face_color;
}
"#;

/// Mesh shader: Phong lighting over the axes' light set with selectable
/// shading mode.
///
/// `params.shading`: 0 plain (unlit), 1 flat/smooth (lit; flat arrives as
/// duplicated vertices with face normals), 2 toon (diffuse quantized to
/// three bands). `params.color_source`: 0 vertex colors, 1 colormap from
/// the value in `tex_coords.x`, 2 sampled texture, 3 solid face color.
pub const MESH: &str = r#"
struct Uniforms {
    view_proj: mat4x4<f32>,
    model: mat4x4<f32>,
    normal_matrix: mat4x4<f32>,
};

struct Light {
    ambient: vec4<f32>,
    diffuse: vec4<f32>,
    specular: vec4<f32>,
    position: vec4<f32>,
};

struct MeshParams {
    face_color: vec4<f32>,
    camera_pos: vec4<f32>,
    clim: vec2<f32>,
    shininess: f32,
    shading: u32,
    color_source: u32,
    light_count: u32,
    _pad: vec2<f32>,
};

@group(0) @binding(0)
var<uniform> uniforms: Uniforms;
@group(1) @binding(0)
var<uniform> params: MeshParams;
@group(1) @binding(1)
var<storage, read> lights: array<Light>;
@group(2) @binding(0)
var value_sampler: sampler;
@group(2) @binding(1)
var value_texture: texture_2d<f32>;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) color: vec4<f32>,
    @location(2) normal: vec3<f32>,
    @location(3) tex_coords: vec2<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec4<f32>,
    @location(1) world_pos: vec3<f32>,
    @location(2) normal: vec3<f32>,
    @location(3) tex_coords: vec2<f32>,
};

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let world = uniforms.model * vec4<f32>(in.position, 1.0);
    out.clip_position = uniforms.view_proj * world;
    out.world_pos = world.xyz;
    out.normal = (uniforms.normal_matrix * vec4<f32>(in.normal, 0.0)).xyz;
    out.color = in.color;
    out.tex_coords = in.tex_coords;
    return out;
}

fn base_color(in: VertexOutput) -> vec4<f32> {
    switch (params.color_source) {
        case 0u: {
            return in.color;
        }
        case 1u: {
            // Value in tex_coords.x scaled by clim, LUT in the texture.
            let span = max(params.clim.y - params.clim.x, 1e-12);
            let t = clamp((in.tex_coords.x - params.clim.x) / span, 0.0, 1.0);
            return textureSample(value_texture, value_sampler, vec2<f32>(t, 0.5));
        }
        case 2u: {
            return textureSample(value_texture, value_sampler, in.tex_coords);
        }
        default: {
            return params.face_color;
        }
    }
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let albedo = base_color(in);
    if (params.shading == 0u) {
        return albedo;
    }

    var n = normalize(in.normal);
    // Double-sided: flip toward the viewer.
    let view_dir = normalize(params.camera_pos.xyz - in.world_pos);
    if (dot(n, view_dir) < 0.0) {
        n = -n;
    }

    var rgb = vec3<f32>(0.0, 0.0, 0.0);
    for (var i = 0u; i < params.light_count; i = i + 1u) {
        let light = lights[i];
        var light_dir: vec3<f32>;
        if (light.position.w == 0.0) {
            light_dir = normalize(light.position.xyz);
        } else {
            light_dir = normalize(light.position.xyz - in.world_pos);
        }
        var diffuse = max(dot(n, light_dir), 0.0);
        if (params.shading == 2u) {
            // Toon: three bands.
            diffuse = floor(diffuse * 3.0) / 3.0;
        }
        let half_dir = normalize(light_dir + view_dir);
        let spec = pow(max(dot(n, half_dir), 0.0), params.shininess);
        rgb = rgb
            + light.ambient.rgb * albedo.rgb
            + light.diffuse.rgb * diffuse * albedo.rgb
            + light.specular.rgb * spec;
    }
    return vec4<f32>(rgb, albedo.a);
}
"#;

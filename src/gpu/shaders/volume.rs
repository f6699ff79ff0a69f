//! Volume ray-casting shader template.
//!
//! The geometry pass rasterizes the back faces of the volume's bounding
//! box. Each fragment reconstructs the ray from the camera through the
//! fragment, clips it against the unit texture cube, and marches a fixed
//! number of steps. The `{{ACCUMULATE}}` and `{{RESOLVE}}` markers are
//! replaced with the per-style snippets below.

use crate::objects::volume::RenderStyle;

const TEMPLATE: &str = r#"
struct Uniforms {
    view_proj: mat4x4<f32>,
    model: mat4x4<f32>,
};

struct Light {
    ambient: vec4<f32>,
    diffuse: vec4<f32>,
    specular: vec4<f32>,
    position: vec4<f32>,
};

struct VolumeParams {
    // World-to-texture mapping of the bounding box.
    box_min: vec4<f32>,
    box_inv_size: vec4<f32>,
    camera_pos: vec4<f32>,
    clim: vec2<f32>,
    iso_threshold: f32,
    step_count: u32,
    light_count: u32,
    _pad0: u32,
    _pad1: vec2<f32>,
};

@group(0) @binding(0)
var<uniform> uniforms: Uniforms;
@group(1) @binding(0)
var<uniform> params: VolumeParams;
@group(1) @binding(1)
var vol_sampler: sampler;
@group(1) @binding(2)
var vol_texture: texture_3d<f32>;
@group(1) @binding(3)
var lut_sampler: sampler;
@group(1) @binding(4)
var lut_texture: texture_2d<f32>;
@group(1) @binding(5)
var<storage, read> lights: array<Light>;

struct VertexInput {
    @location(0) position: vec3<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_pos: vec3<f32>,
};

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let world = uniforms.model * vec4<f32>(in.position, 1.0);
    out.clip_position = uniforms.view_proj * world;
    out.world_pos = world.xyz;
    return out;
}

fn to_tex(world: vec3<f32>) -> vec3<f32> {
    return (world - params.box_min.xyz) * params.box_inv_size.xyz;
}

// Entry/exit distances of a ray against the unit cube.
fn cube_clip(origin: vec3<f32>, dir: vec3<f32>) -> vec2<f32> {
    let inv = 1.0 / dir;
    let t0 = (vec3<f32>(0.0, 0.0, 0.0) - origin) * inv;
    let t1 = (vec3<f32>(1.0, 1.0, 1.0) - origin) * inv;
    let tmin = min(t0, t1);
    let tmax = max(t0, t1);
    let enter = max(max(tmin.x, tmin.y), max(tmin.z, 0.0));
    let exit = min(tmax.x, min(tmax.y, tmax.z));
    return vec2<f32>(enter, exit);
}

fn sample_volume(p: vec3<f32>) -> f32 {
    return textureSampleLevel(vol_texture, vol_sampler, p, 0.0).r;
}

fn scaled_sample(p: vec3<f32>) -> f32 {
    let span = max(params.clim.y - params.clim.x, 1e-12);
    return clamp((sample_volume(p) - params.clim.x) / span, 0.0, 1.0);
}

fn lut_color(t: f32) -> vec4<f32> {
    return textureSampleLevel(lut_texture, lut_sampler, vec2<f32>(t, 0.5), 0.0);
}

// Central-difference gradient in texture space.
fn gradient(p: vec3<f32>, h: f32) -> vec3<f32> {
    return vec3<f32>(
        sample_volume(p + vec3<f32>(h, 0.0, 0.0)) - sample_volume(p - vec3<f32>(h, 0.0, 0.0)),
        sample_volume(p + vec3<f32>(0.0, h, 0.0)) - sample_volume(p - vec3<f32>(0.0, h, 0.0)),
        sample_volume(p + vec3<f32>(0.0, 0.0, h)) - sample_volume(p - vec3<f32>(0.0, 0.0, h)),
    ) / (2.0 * h);
}

fn shade(albedo: vec3<f32>, normal: vec3<f32>, view_dir: vec3<f32>) -> vec3<f32> {
    var n = normal;
    if (dot(n, view_dir) < 0.0) {
        n = -n;
    }
    var rgb = vec3<f32>(0.0, 0.0, 0.0);
    for (var i = 0u; i < params.light_count; i = i + 1u) {
        let light = lights[i];
        // Positional lights act directionally inside the volume.
        let light_dir = normalize(light.position.xyz);
        let diffuse = max(dot(n, light_dir), 0.0);
        let half_dir = normalize(light_dir + view_dir);
        let spec = pow(max(dot(n, half_dir), 0.0), 32.0);
        rgb = rgb + light.ambient.rgb * albedo
            + light.diffuse.rgb * diffuse * albedo
            + light.specular.rgb * spec;
    }
    return rgb;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let origin = to_tex(params.camera_pos.xyz);
    let back = to_tex(in.world_pos);
    let dir = normalize(back - origin);
    let clip = cube_clip(origin, dir);
    if (clip.y <= clip.x) {
        discard;
    }
    let step_len = (clip.y - clip.x) / f32(params.step_count);
    let view_dir = -dir;
    let grad_h = step_len;

{{ACCUMULATE}}

{{RESOLVE}}
}
"#;

/// MIP: keep the maximum scaled sample along the ray.
const ACCUM_MIP: &str = r#"
    var best = 0.0;
    for (var i = 0u; i < params.step_count; i = i + 1u) {
        let p = origin + dir * (clip.x + step_len * (f32(i) + 0.5));
        best = max(best, scaled_sample(p));
    }
"#;

const RESOLVE_MIP: &str = r#"
    if (best <= 0.0) {
        discard;
    }
    return lut_color(best);
"#;

/// Iso-surface: stop at the first sample above the threshold and shade
/// from the local gradient.
const ACCUM_ISO: &str = r#"
    var hit = -1.0;
    for (var i = 0u; i < params.step_count; i = i + 1u) {
        let t = clip.x + step_len * (f32(i) + 0.5);
        let p = origin + dir * t;
        if (sample_volume(p) >= params.iso_threshold) {
            hit = t;
            break;
        }
    }
"#;

const RESOLVE_ISO: &str = r#"
    if (hit < 0.0) {
        discard;
    }
    let p = origin + dir * hit;
    let albedo = lut_color(scaled_sample(p)).rgb;
    let normal = normalize(-gradient(p, grad_h));
    return vec4<f32>(shade(albedo, normal, view_dir), 1.0);
"#;

/// Ray: front-to-back alpha compositing with opacity from the colormap
/// alpha channel.
const ACCUM_RAY: &str = r#"
    var acc = vec4<f32>(0.0, 0.0, 0.0, 0.0);
    for (var i = 0u; i < params.step_count; i = i + 1u) {
        let p = origin + dir * (clip.x + step_len * (f32(i) + 0.5));
        let c = lut_color(scaled_sample(p));
        let a = c.a * step_len * 64.0;
        acc = acc + vec4<f32>(c.rgb * a, a) * (1.0 - acc.a);
        if (acc.a >= 0.98) {
            break;
        }
    }
"#;

const RESOLVE_RAY: &str = r#"
    if (acc.a <= 0.0) {
        discard;
    }
    return vec4<f32>(acc.rgb / max(acc.a, 1e-4), acc.a);
"#;

/// Edge-enhanced ray: per-sample opacity modulated by gradient magnitude.
const ACCUM_EDGERAY: &str = r#"
    var acc = vec4<f32>(0.0, 0.0, 0.0, 0.0);
    for (var i = 0u; i < params.step_count; i = i + 1u) {
        let p = origin + dir * (clip.x + step_len * (f32(i) + 0.5));
        let c = lut_color(scaled_sample(p));
        let edge = clamp(length(gradient(p, grad_h)), 0.0, 1.0);
        let a = c.a * edge * step_len * 64.0;
        acc = acc + vec4<f32>(c.rgb * a, a) * (1.0 - acc.a);
        if (acc.a >= 0.98) {
            break;
        }
    }
"#;

/// Lit ray: per-sample diffuse + specular from the axes lights.
const ACCUM_LITRAY: &str = r#"
    var acc = vec4<f32>(0.0, 0.0, 0.0, 0.0);
    for (var i = 0u; i < params.step_count; i = i + 1u) {
        let p = origin + dir * (clip.x + step_len * (f32(i) + 0.5));
        let c = lut_color(scaled_sample(p));
        let g = gradient(p, grad_h);
        var rgb = c.rgb;
        if (length(g) > 1e-4) {
            rgb = shade(c.rgb, normalize(-g), view_dir);
        }
        let a = c.a * step_len * 64.0;
        acc = acc + vec4<f32>(rgb * a, a) * (1.0 - acc.a);
        if (acc.a >= 0.98) {
            break;
        }
    }
"#;

/// Expand the template for one render style.
pub fn source_for(style: RenderStyle) -> String {
    let (accumulate, resolve) = match style {
        RenderStyle::Mip => (ACCUM_MIP, RESOLVE_MIP),
        RenderStyle::Iso => (ACCUM_ISO, RESOLVE_ISO),
        RenderStyle::Ray => (ACCUM_RAY, RESOLVE_RAY),
        RenderStyle::EdgeRay => (ACCUM_EDGERAY, RESOLVE_RAY),
        RenderStyle::LitRay => (ACCUM_LITRAY, RESOLVE_RAY),
    };
    TEMPLATE
        .replace("{{ACCUMULATE}}", accumulate)
        .replace("{{RESOLVE}}", resolve)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_style_expands_fully() {
        for style in [
            RenderStyle::Mip,
            RenderStyle::Iso,
            RenderStyle::Ray,
            RenderStyle::EdgeRay,
            RenderStyle::LitRay,
        ] {
            let src = source_for(style);
            assert!(!src.contains("{{"), "unexpanded marker for {style:?}");
            assert!(src.contains("fs_main"));
        }
    }

    #[test]
    fn mip_keeps_max_and_iso_thresholds() {
        assert!(source_for(RenderStyle::Mip).contains("max(best"));
        assert!(source_for(RenderStyle::Iso).contains("iso_threshold"));
        assert!(source_for(RenderStyle::EdgeRay).contains("gradient"));
    }
}

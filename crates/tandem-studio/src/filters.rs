use tandem_engine::WgpuBackend;
use tandem_engine::filter::{SharedFilter, ShaderFilter, shared};

const GRAYSCALE: &str = r#"
fn apply_filter(color: vec4<f32>, uv: vec2<f32>) -> vec4<f32> {
    let luma = dot(color.rgb, vec3<f32>(0.2126, 0.7152, 0.0722));
    return vec4<f32>(vec3<f32>(luma), color.a);
}
"#;

/// Rec. 709 luma output filter.
pub fn grayscale() -> SharedFilter<WgpuBackend> {
    shared(ShaderFilter::new("grayscale", GRAYSCALE))
}

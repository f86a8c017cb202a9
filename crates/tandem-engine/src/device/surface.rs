use crate::geometry::Size;

use super::SurfaceErrorAction;

/// Picks the presentation format, preferring an sRGB 8-bit format when asked.
pub(crate) fn choose_surface_format(
    caps: &wgpu::SurfaceCapabilities,
    prefer_srgb: bool,
) -> Option<wgpu::TextureFormat> {
    const SRGB: [wgpu::TextureFormat; 2] = [
        wgpu::TextureFormat::Bgra8UnormSrgb,
        wgpu::TextureFormat::Rgba8UnormSrgb,
    ];

    let srgb = prefer_srgb
        .then(|| SRGB.into_iter().find(|f| caps.formats.contains(f)))
        .flatten();
    srgb.or_else(|| caps.formats.first().copied())
}

pub(crate) fn choose_alpha_mode(
    caps: &wgpu::SurfaceCapabilities,
    requested: Option<wgpu::CompositeAlphaMode>,
) -> wgpu::CompositeAlphaMode {
    requested
        .filter(|m| caps.alpha_modes.contains(m))
        .or_else(|| caps.alpha_modes.first().copied())
        .unwrap_or(wgpu::CompositeAlphaMode::Auto)
}

pub(crate) fn surface_usage(caps: &wgpu::SurfaceCapabilities, readable: bool) -> wgpu::TextureUsages {
    let mut usage = wgpu::TextureUsages::RENDER_ATTACHMENT;
    if readable {
        if caps.usages.contains(wgpu::TextureUsages::COPY_SRC) {
            usage |= wgpu::TextureUsages::COPY_SRC;
        } else {
            log::warn!("surface does not support COPY_SRC; frame hooks cannot read it back");
        }
    }
    usage
}

/// Reconfigures the surface for `new_size`.
///
/// wgpu rejects 0x0 configurations; the size is recorded and configuration is
/// deferred until a non-empty size arrives.
pub(crate) fn apply_resize(
    surface: &wgpu::Surface,
    device: &wgpu::Device,
    config: &mut wgpu::SurfaceConfiguration,
    size: &mut Size,
    new_size: Size,
) {
    *size = new_size;
    if new_size.is_empty() {
        return;
    }

    config.width = new_size.width;
    config.height = new_size.height;
    surface.configure(device, config);
}

pub(crate) fn map_surface_error(
    surface: &wgpu::Surface,
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
    size: Size,
    err: wgpu::SurfaceError,
) -> SurfaceErrorAction {
    match err {
        wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => {
            if !size.is_empty() {
                surface.configure(device, config);
            }
            SurfaceErrorAction::Reconfigured
        }
        wgpu::SurfaceError::OutOfMemory => SurfaceErrorAction::Fatal,
        wgpu::SurfaceError::Timeout => SurfaceErrorAction::SkipFrame,
        wgpu::SurfaceError::Other => SurfaceErrorAction::SkipFrame,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(formats: Vec<wgpu::TextureFormat>, usages: wgpu::TextureUsages) -> wgpu::SurfaceCapabilities {
        wgpu::SurfaceCapabilities {
            formats,
            present_modes: vec![wgpu::PresentMode::Fifo],
            alpha_modes: vec![wgpu::CompositeAlphaMode::Opaque],
            usages,
        }
    }

    // ── format ──

    #[test]
    fn srgb_preferred_when_offered() {
        let c = caps(
            vec![wgpu::TextureFormat::Bgra8Unorm, wgpu::TextureFormat::Rgba8UnormSrgb],
            wgpu::TextureUsages::RENDER_ATTACHMENT,
        );
        assert_eq!(choose_surface_format(&c, true), Some(wgpu::TextureFormat::Rgba8UnormSrgb));
        assert_eq!(choose_surface_format(&c, false), Some(wgpu::TextureFormat::Bgra8Unorm));
    }

    #[test]
    fn no_formats_means_no_surface() {
        let c = caps(Vec::new(), wgpu::TextureUsages::RENDER_ATTACHMENT);
        assert_eq!(choose_surface_format(&c, true), None);
    }

    // ── alpha / usage ──

    #[test]
    fn unsupported_alpha_falls_back_to_first() {
        let c = caps(vec![wgpu::TextureFormat::Bgra8Unorm], wgpu::TextureUsages::RENDER_ATTACHMENT);
        assert_eq!(
            choose_alpha_mode(&c, Some(wgpu::CompositeAlphaMode::PreMultiplied)),
            wgpu::CompositeAlphaMode::Opaque
        );
    }

    #[test]
    fn readback_usage_only_when_supported() {
        let plain = caps(vec![wgpu::TextureFormat::Bgra8Unorm], wgpu::TextureUsages::RENDER_ATTACHMENT);
        assert_eq!(surface_usage(&plain, true), wgpu::TextureUsages::RENDER_ATTACHMENT);

        let copyable = caps(
            vec![wgpu::TextureFormat::Bgra8Unorm],
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        );
        assert!(surface_usage(&copyable, true).contains(wgpu::TextureUsages::COPY_SRC));
        assert!(!surface_usage(&copyable, false).contains(wgpu::TextureUsages::COPY_SRC));
    }
}

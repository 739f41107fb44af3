use winit::dpi::PhysicalSize;

use super::SurfaceErrorAction;

/// Picks the surface format.
///
/// Quads blend premultiplied colors as given, so a non-sRGB format is
/// preferred unless the caller asks otherwise.
pub(super) fn choose_surface_format(
    caps: &wgpu::SurfaceCapabilities,
    prefer_srgb: bool,
) -> Option<wgpu::TextureFormat> {
    if caps.formats.is_empty() {
        return None;
    }

    let preferred = if prefer_srgb {
        [wgpu::TextureFormat::Bgra8UnormSrgb, wgpu::TextureFormat::Rgba8UnormSrgb]
    } else {
        [wgpu::TextureFormat::Bgra8Unorm, wgpu::TextureFormat::Rgba8Unorm]
    };
    for f in preferred {
        if caps.formats.contains(&f) {
            return Some(f);
        }
    }

    Some(caps.formats[0])
}

pub(super) fn choose_alpha_mode(
    caps: &wgpu::SurfaceCapabilities,
    requested: Option<wgpu::CompositeAlphaMode>,
) -> wgpu::CompositeAlphaMode {
    requested
        .filter(|m| caps.alpha_modes.contains(m))
        .or_else(|| caps.alpha_modes.first().copied())
        .unwrap_or(wgpu::CompositeAlphaMode::Auto)
}

/// Records the new size and reconfigures, except for 0×0 which wgpu rejects.
pub(super) fn apply_resize(
    surface: &wgpu::Surface,
    device: &wgpu::Device,
    config: &mut wgpu::SurfaceConfiguration,
    size: &mut PhysicalSize<u32>,
    new_size: PhysicalSize<u32>,
) {
    *size = new_size;
    if new_size.width == 0 || new_size.height == 0 {
        return;
    }

    config.width = new_size.width;
    config.height = new_size.height;
    surface.configure(device, config);
}

pub(super) fn map_surface_error(
    surface: &wgpu::Surface,
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
    size: PhysicalSize<u32>,
    err: wgpu::SurfaceError,
) -> SurfaceErrorAction {
    match err {
        wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => {
            if size.width > 0 && size.height > 0 {
                surface.configure(device, config);
            }
            SurfaceErrorAction::Reconfigured
        }
        wgpu::SurfaceError::OutOfMemory => SurfaceErrorAction::Fatal,
        wgpu::SurfaceError::Timeout | wgpu::SurfaceError::Other => SurfaceErrorAction::SkipFrame,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wgpu::{CompositeAlphaMode, SurfaceCapabilities, TextureFormat};

    fn caps(formats: Vec<TextureFormat>, alpha_modes: Vec<CompositeAlphaMode>) -> SurfaceCapabilities {
        SurfaceCapabilities { formats, alpha_modes, ..Default::default() }
    }

    // ── format ────────────────────────────────────────────────────────────

    #[test]
    fn linear_format_preferred_by_default() {
        let c = caps(vec![TextureFormat::Bgra8UnormSrgb, TextureFormat::Bgra8Unorm], vec![]);
        assert_eq!(choose_surface_format(&c, false), Some(TextureFormat::Bgra8Unorm));
        assert_eq!(choose_surface_format(&c, true), Some(TextureFormat::Bgra8UnormSrgb));
    }

    #[test]
    fn falls_back_to_first_format() {
        let c = caps(vec![TextureFormat::Rgb10a2Unorm], vec![]);
        assert_eq!(choose_surface_format(&c, false), Some(TextureFormat::Rgb10a2Unorm));
        assert_eq!(choose_surface_format(&caps(vec![], vec![]), false), None);
    }

    // ── alpha ─────────────────────────────────────────────────────────────

    #[test]
    fn unsupported_alpha_request_is_replaced() {
        let c = caps(vec![], vec![CompositeAlphaMode::Opaque]);
        assert_eq!(
            choose_alpha_mode(&c, Some(CompositeAlphaMode::PreMultiplied)),
            CompositeAlphaMode::Opaque
        );
        assert_eq!(choose_alpha_mode(&caps(vec![], vec![]), None), CompositeAlphaMode::Auto);
    }
}

//! Pipelines and shared layouts for the quad programs.

use std::collections::HashMap;
use std::num::NonZeroU64;

use crate::render::RenderError;
use crate::render::program::{ProgramKind, UNIFORM_SLOT};
use crate::render::quad_list::QuadVertex;

// ── blend ─────────────────────────────────────────────────────────────────

pub(super) fn premul_alpha_blend() -> wgpu::BlendState {
    wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
        alpha: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
    }
}

fn shader_source(kind: ProgramKind) -> &'static str {
    match kind {
        ProgramKind::Default => include_str!("shaders/default.wgsl"),
        ProgramKind::Tilt => include_str!("shaders/tilt.wgsl"),
        ProgramKind::Radial => include_str!("shaders/radial.wgsl"),
    }
}

// ── pipelines ─────────────────────────────────────────────────────────────

/// Everything that only depends on the device and the color format.
pub(super) struct Pipelines {
    pub uniform_layout: wgpu::BindGroupLayout,
    pub texture_layout: wgpu::BindGroupLayout,
    pub sampler: wgpu::Sampler,
    programs: HashMap<ProgramKind, wgpu::RenderPipeline>,
}

impl Pipelines {
    /// Builds every program. A program that fails to compile is logged and
    /// served by the default pipeline; only a failing default is fatal.
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Result<Self, RenderError> {
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("lumen uniforms bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(UNIFORM_SLOT as u64),
                },
                count: None,
            }],
        });

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("lumen texture bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("lumen quad sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("lumen quad pipeline layout"),
            bind_group_layouts: &[&uniform_layout, &texture_layout],
            immediate_size: 0,
        });

        let programs = build_programs(|kind| build_pipeline(device, &layout, format, kind))?;

        Ok(Self { uniform_layout, texture_layout, sampler, programs })
    }

    pub fn get(&self, kind: ProgramKind) -> Option<&wgpu::RenderPipeline> {
        resolve(&self.programs, kind)
    }
}

/// Builds every program kind. A non-default kind that fails is logged and
/// left out, so it resolves to the default one; a failing default is fatal.
fn build_programs<P>(
    mut build: impl FnMut(ProgramKind) -> Result<P, RenderError>,
) -> Result<HashMap<ProgramKind, P>, RenderError> {
    let mut programs = HashMap::new();
    for kind in ProgramKind::ALL {
        match build(kind) {
            Ok(program) => {
                programs.insert(kind, program);
            }
            Err(err) if kind != ProgramKind::Default => {
                log::error!("{err}; drawing {kind:?} operations with the default program");
            }
            Err(err) => return Err(err),
        }
    }
    Ok(programs)
}

fn resolve<P>(programs: &HashMap<ProgramKind, P>, kind: ProgramKind) -> Option<&P> {
    programs.get(&kind).or_else(|| programs.get(&ProgramKind::Default))
}

fn build_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    format: wgpu::TextureFormat,
    kind: ProgramKind,
) -> Result<wgpu::RenderPipeline, RenderError> {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("lumen quad shader"),
        source: wgpu::ShaderSource::Wgsl(shader_source(kind).into()),
    });

    let info = pollster::block_on(shader.get_compilation_info());
    let errors: Vec<String> = info
        .messages
        .iter()
        .filter(|m| matches!(m.message_type, wgpu::CompilationMessageType::Error))
        .map(|m| m.message.clone())
        .collect();
    if !errors.is_empty() {
        return Err(RenderError::ProgramCompile { kind, message: errors.join("; ") });
    }

    Ok(device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("lumen quad pipeline"),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &[QuadVertex::layout()],
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(premul_alpha_blend()),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            // Tilted quads may face away.
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failing(kind: ProgramKind) -> RenderError {
        RenderError::ProgramCompile { kind, message: "bad shader".into() }
    }

    // ── fallback ──────────────────────────────────────────────────────────

    #[test]
    fn all_programs_build() {
        let programs = build_programs(|kind| Ok(kind)).unwrap();
        for kind in ProgramKind::ALL {
            assert_eq!(resolve(&programs, kind), Some(&kind));
        }
    }

    #[test]
    fn failed_program_resolves_to_default() {
        let programs = build_programs(|kind| match kind {
            ProgramKind::Tilt => Err(failing(kind)),
            _ => Ok(kind),
        })
        .unwrap();
        assert!(!programs.contains_key(&ProgramKind::Tilt));
        assert_eq!(resolve(&programs, ProgramKind::Tilt), Some(&ProgramKind::Default));
        assert_eq!(resolve(&programs, ProgramKind::Radial), Some(&ProgramKind::Radial));
    }

    #[test]
    fn failed_default_is_fatal() {
        let result = build_programs(|kind| match kind {
            ProgramKind::Default => Err(failing(kind)),
            _ => Ok(kind),
        });
        assert_eq!(result.unwrap_err(), failing(ProgramKind::Default));
    }

    #[test]
    fn every_kind_has_a_shader() {
        for kind in ProgramKind::ALL {
            let src = shader_source(kind);
            assert!(src.contains("fn vs_main") && src.contains("fn fs_main"), "{kind:?}");
        }
    }
}

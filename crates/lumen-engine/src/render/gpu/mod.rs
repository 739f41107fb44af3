//! wgpu implementation of [`RenderDevice`].
//!
//! One render pass is open at a time; every target bind ends the current pass
//! and begins a new one on the requested view. Uniform blocks for the frame
//! are collected into 256-byte slots and written in one go before submit,
//! each draw selecting its slot through a dynamic offset.
//!
//! wgpu framebuffers have a top-left origin everywhere, so scissor rects are
//! never flipped and offscreen targets use the same projection as the main
//! one.

mod pipeline;

use std::collections::HashMap;
use std::num::NonZeroU64;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::paint::Color;
use crate::scene::ElementId;

use super::RenderError;
use super::device::{DeviceCaps, FrameSetup, RenderDevice};
use super::index::IndexPlan;
use super::program::{ProgramKind, UNIFORM_SLOT, Uniforms};
use super::quad_list::QUAD_STRIDE;
use super::scissor::ScissorRect;
use super::target::{TargetId, TargetInfo};
use super::texture::{Bitmap, TextureId, TextureSource};

use pipeline::Pipelines;

struct GpuTexture {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
}

struct GpuTarget {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    bind_group: wgpu::BindGroup,
    size: (u32, u32),
}

/// Buffers sized by the index plan.
struct Buffers {
    plan: IndexPlan,
    vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
    uniforms: wgpu::Buffer,
    uniform_group: wgpu::BindGroup,
    uniform_slots: usize,
}

/// State of the frame being recorded.
struct Frame {
    encoder: wgpu::CommandEncoder,
    pass: Option<wgpu::RenderPass<'static>>,
    viewport: (u32, u32),
    program: Option<ProgramKind>,
    uniform_offset: Option<u32>,
    next_slot: usize,
    texture: Option<TextureSource>,
    /// Current scissor clips everything away.
    scissor_empty: bool,
}

pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    format: wgpu::TextureFormat,

    generation: u64,
    lost: Arc<AtomicBool>,

    pipelines: Option<Pipelines>,
    buffers: Option<Buffers>,
    white: Option<GpuTexture>,

    textures: HashMap<TextureId, GpuTexture>,
    /// Offscreen storage, keyed by owner so it survives across frames.
    targets: HashMap<ElementId, GpuTarget>,
    frame_targets: HashMap<TargetId, ElementId>,

    main_view: Option<wgpu::TextureView>,
    frame: Option<Frame>,
    staging: Vec<u8>,

    warned_uniform_overflow: bool,
}

impl WgpuDevice {
    /// `format` is the color format of the main target; offscreen targets
    /// use it too so one pipeline per program serves every pass.
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, format: wgpu::TextureFormat) -> Self {
        let lost = watch_device_lost(&device);
        Self {
            device,
            queue,
            format,
            generation: 0,
            lost,
            pipelines: None,
            buffers: None,
            white: None,
            textures: HashMap::new(),
            targets: HashMap::new(),
            frame_targets: HashMap::new(),
            main_view: None,
            frame: None,
            staging: Vec::new(),
            warned_uniform_overflow: false,
        }
    }

    /// Swaps in a new device after loss. Every resource is dropped; the
    /// executor notices the generation change and re-initializes.
    pub fn replace_device(&mut self, device: wgpu::Device, queue: wgpu::Queue) {
        log::info!("render device replaced (generation {})", self.generation + 1);
        self.release_all();
        self.lost = watch_device_lost(&device);
        self.device = device;
        self.queue = queue;
        self.generation += 1;
    }

    /// Sets the main target view for the next frame.
    pub fn attach_frame(&mut self, view: wgpu::TextureView) {
        self.main_view = Some(view);
    }

    /// Drops an attached view that no frame consumed.
    pub fn detach_frame(&mut self) {
        self.main_view = None;
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    fn release_all(&mut self) {
        self.frame = None;
        self.main_view = None;
        if let Some(buffers) = self.buffers.take() {
            buffers.vertices.destroy();
            buffers.indices.destroy();
            buffers.uniforms.destroy();
        }
        for (_, target) in self.targets.drain() {
            target.texture.destroy();
        }
        for (_, texture) in self.textures.drain() {
            texture.texture.destroy();
        }
        if let Some(white) = self.white.take() {
            white.texture.destroy();
        }
        self.frame_targets.clear();
        self.pipelines = None;
    }

    fn create_buffers(&self, plan: IndexPlan, uniform_slots: usize, layout: &wgpu::BindGroupLayout) -> Buffers {
        use wgpu::util::DeviceExt;

        let vertices = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("lumen quad vbo"),
            size: (plan.max_quads * QUAD_STRIDE) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let indices = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("lumen quad ibo"),
            contents: &plan.build_bytes(),
            usage: wgpu::BufferUsages::INDEX,
        });
        let (uniforms, uniform_group) = self.create_uniform_ring(uniform_slots, layout);
        Buffers { plan, vertices, indices, uniforms, uniform_group, uniform_slots }
    }

    fn create_uniform_ring(&self, slots: usize, layout: &wgpu::BindGroupLayout) -> (wgpu::Buffer, wgpu::BindGroup) {
        let uniforms = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("lumen uniform ring"),
            size: (slots * UNIFORM_SLOT) as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("lumen uniform bind group"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &uniforms,
                    offset: 0,
                    size: NonZeroU64::new(UNIFORM_SLOT as u64),
                }),
            }],
        });
        (uniforms, group)
    }

    fn create_texture(&self, label: &str, size: (u32, u32), format: wgpu::TextureFormat, usage: wgpu::TextureUsages) -> wgpu::Texture {
        self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d { width: size.0, height: size.1, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        })
    }

    fn texture_group(&self, view: &wgpu::TextureView) -> Option<wgpu::BindGroup> {
        let pipelines = self.pipelines.as_ref()?;
        Some(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("lumen texture bind group"),
            layout: &pipelines.texture_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(view) },
                wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::Sampler(&pipelines.sampler) },
            ],
        }))
    }

    fn upload_bitmap(&self, label: &str, bitmap: &Bitmap) -> Option<GpuTexture> {
        let texture = self.create_texture(
            label,
            (bitmap.width, bitmap.height),
            wgpu::TextureFormat::Rgba8Unorm,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        );
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &bitmap.pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bitmap.width * 4),
                rows_per_image: Some(bitmap.height),
            },
            wgpu::Extent3d { width: bitmap.width, height: bitmap.height, depth_or_array_layers: 1 },
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = self.texture_group(&view)?;
        Some(GpuTexture { texture, bind_group })
    }

    /// Re-applies pipeline, buffers and bindings after a new pass began.
    fn restore_pass_state(&mut self) {
        let Some(frame) = self.frame.as_mut() else { return };
        let Some(pass) = frame.pass.as_mut() else { return };
        let Some(buffers) = self.buffers.as_ref() else { return };

        pass.set_viewport(0.0, 0.0, frame.viewport.0 as f32, frame.viewport.1 as f32, 0.0, 1.0);
        pass.set_vertex_buffer(0, buffers.vertices.slice(..));
        pass.set_index_buffer(buffers.indices.slice(..), buffers.plan.format.to_wgpu());
        if let Some(pipeline) = frame.program.and_then(|k| self.pipelines.as_ref()?.get(k)) {
            pass.set_pipeline(pipeline);
        }
        if let Some(offset) = frame.uniform_offset {
            pass.set_bind_group(0, &buffers.uniform_group, &[offset]);
        }
        let texture = frame.texture.and_then(|t| {
            texture_group_for(&self.white, &self.textures, &self.frame_targets, &self.targets, t)
        });
        if let Some(group) = texture {
            pass.set_bind_group(1, group, &[]);
        }
    }
}

fn texture_group_for<'a>(
    white: &'a Option<GpuTexture>,
    textures: &'a HashMap<TextureId, GpuTexture>,
    frame_targets: &HashMap<TargetId, ElementId>,
    targets: &'a HashMap<ElementId, GpuTarget>,
    source: TextureSource,
) -> Option<&'a wgpu::BindGroup> {
    match source {
        TextureSource::White => white.as_ref().map(|t| &t.bind_group),
        TextureSource::Image(id) => textures.get(&id).map(|t| &t.bind_group),
        TextureSource::Target(id) => {
            let owner = frame_targets.get(&id)?;
            targets.get(owner).map(|t| &t.bind_group)
        }
    }
}

fn watch_device_lost(device: &wgpu::Device) -> Arc<AtomicBool> {
    let lost = Arc::new(AtomicBool::new(false));
    let flag = lost.clone();
    device.set_device_lost_callback(move |reason, message| {
        log::error!("wgpu device lost ({reason:?}): {message}");
        flag.store(true, Ordering::Release);
    });
    lost
}

impl RenderDevice for WgpuDevice {
    fn caps(&self) -> DeviceCaps {
        DeviceCaps { u32_indices: true, main_target_bottom_left: false }
    }

    fn generation(&self) -> u64 {
        self.generation
    }

    fn is_lost(&self) -> bool {
        self.lost.load(Ordering::Acquire)
    }

    fn init(&mut self, plan: IndexPlan) -> Result<(), RenderError> {
        if self.is_lost() {
            return Err(RenderError::DeviceLost);
        }

        if self.pipelines.is_none() {
            self.pipelines = Some(Pipelines::new(&self.device, self.format)?);
            self.white = self.upload_bitmap("lumen white texture", &Bitmap::solid(1, 1, [255; 4]));
        }

        if self.buffers.as_ref().is_some_and(|b| b.plan == plan) {
            return Ok(());
        }
        let Some(pipelines) = self.pipelines.as_ref() else {
            return Err(RenderError::DeviceLost);
        };
        let slots = self.buffers.as_ref().map_or(64, |b| b.uniform_slots);
        let buffers = self.create_buffers(plan, slots, &pipelines.uniform_layout);
        if let Some(old) = self.buffers.replace(buffers) {
            old.vertices.destroy();
            old.indices.destroy();
            old.uniforms.destroy();
        }
        log::debug!("quad buffers ready: {} quads, {:?} indices", plan.max_quads, plan.format);
        Ok(())
    }

    fn begin_frame(&mut self, frame: FrameSetup) -> Result<(), RenderError> {
        if self.is_lost() {
            return Err(RenderError::DeviceLost);
        }
        let Some(pipelines) = self.pipelines.as_ref() else {
            return Err(RenderError::DeviceLost);
        };
        let Some(buffers) = self.buffers.as_ref() else {
            return Err(RenderError::DeviceLost);
        };

        let slots = frame.operations.max(1);
        if slots > buffers.uniform_slots {
            let slots = slots.next_power_of_two();
            let (uniforms, group) = self.create_uniform_ring(slots, &pipelines.uniform_layout);
            if let Some(buffers) = self.buffers.as_mut() {
                buffers.uniforms.destroy();
                buffers.uniforms = uniforms;
                buffers.uniform_group = group;
                buffers.uniform_slots = slots;
            }
        }

        self.staging.clear();
        self.frame_targets.clear();
        let encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("lumen frame encoder"),
        });
        self.frame = Some(Frame {
            encoder,
            pass: None,
            viewport: frame.surface,
            program: None,
            uniform_offset: None,
            next_slot: 0,
            texture: None,
            scissor_empty: false,
        });
        Ok(())
    }

    fn upload_quads(&mut self, bytes: &[u8]) {
        let Some(buffers) = self.buffers.as_ref() else { return };
        let len = bytes.len().min(buffers.vertices.size() as usize);
        if len > 0 {
            self.queue.write_buffer(&buffers.vertices, 0, &bytes[..len]);
        }
    }

    fn prepare_target(&mut self, target: &TargetInfo, size: (u32, u32)) -> Result<(), RenderError> {
        if self.targets.get(&target.owner).is_some_and(|t| t.size == size) {
            self.frame_targets.insert(target.id, target.owner);
            return Ok(());
        }

        let max = self.device.limits().max_texture_dimension_2d;
        if size.0 > max || size.1 > max {
            self.targets.remove(&target.owner);
            return Err(RenderError::TargetAllocation { width: size.0, height: size.1 });
        }

        let texture = self.create_texture(
            "lumen offscreen target",
            size,
            self.format,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let Some(bind_group) = self.texture_group(&view) else {
            return Err(RenderError::TargetAllocation { width: size.0, height: size.1 });
        };
        log::debug!("allocated {}x{} target for {:?}", size.0, size.1, target.owner);
        if let Some(old) = self.targets.insert(target.owner, GpuTarget { texture, view, bind_group, size }) {
            old.texture.destroy();
        }
        self.frame_targets.insert(target.id, target.owner);
        Ok(())
    }

    fn bind_target(&mut self, target: Option<TargetId>, viewport: (u32, u32), clear: Option<Color>) {
        let Some(frame) = self.frame.as_mut() else { return };
        frame.pass = None;
        frame.viewport = viewport;
        frame.scissor_empty = false;

        let view = match target {
            None => self.main_view.as_ref(),
            Some(id) => self
                .frame_targets
                .get(&id)
                .and_then(|owner| self.targets.get(owner))
                .map(|t| &t.view),
        };
        let Some(view) = view else {
            log::warn!("no view for target {target:?}; its draws are dropped");
            return;
        };

        let load = match clear {
            Some(color) => wgpu::LoadOp::Clear(color.to_wgpu()),
            None => wgpu::LoadOp::Load,
        };
        let pass = frame
            .encoder
            .begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("lumen quad pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations { load, store: wgpu::StoreOp::Store },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            })
            .forget_lifetime();
        frame.pass = Some(pass);
        self.restore_pass_state();
    }

    fn set_scissor(&mut self, rect: Option<ScissorRect>) {
        let Some(frame) = self.frame.as_mut() else { return };
        let (x, y, w, h) = match rect {
            Some(rect) => rect.clamp_to(frame.viewport),
            None => (0, 0, frame.viewport.0, frame.viewport.1),
        };
        frame.scissor_empty = w == 0 || h == 0;
        if let (Some(pass), false) = (frame.pass.as_mut(), frame.scissor_empty) {
            pass.set_scissor_rect(x, y, w, h);
        }
    }

    fn use_program(&mut self, kind: ProgramKind) {
        let Some(frame) = self.frame.as_mut() else { return };
        frame.program = Some(kind);
        let pipeline = self.pipelines.as_ref().and_then(|p| p.get(kind));
        if let (Some(pass), Some(pipeline)) = (frame.pass.as_mut(), pipeline) {
            pass.set_pipeline(pipeline);
        }
    }

    fn stop_program(&mut self, kind: ProgramKind) {
        if let Some(frame) = self.frame.as_mut() {
            if frame.program == Some(kind) {
                frame.program = None;
            }
        }
    }

    fn set_uniforms(&mut self, uniforms: &Uniforms) {
        let Some(frame) = self.frame.as_mut() else { return };
        let Some(buffers) = self.buffers.as_ref() else { return };

        let mut slot = frame.next_slot;
        if slot >= buffers.uniform_slots {
            if !self.warned_uniform_overflow {
                log::warn!("uniform ring full ({} slots); reusing the last slot", buffers.uniform_slots);
                self.warned_uniform_overflow = true;
            }
            slot = buffers.uniform_slots - 1;
        }
        frame.next_slot = slot + 1;

        let start = slot * UNIFORM_SLOT;
        if self.staging.len() < start + UNIFORM_SLOT {
            self.staging.resize(start + UNIFORM_SLOT, 0);
        }
        let bytes = uniforms.as_bytes();
        self.staging[start..start + bytes.len()].copy_from_slice(bytes);

        let offset = start as u32;
        frame.uniform_offset = Some(offset);
        if let Some(pass) = frame.pass.as_mut() {
            pass.set_bind_group(0, &buffers.uniform_group, &[offset]);
        }
    }

    fn bind_texture(&mut self, texture: TextureSource) -> Result<(), RenderError> {
        let group =
            texture_group_for(&self.white, &self.textures, &self.frame_targets, &self.targets, texture);
        let Some(group) = group else {
            return Err(match texture {
                TextureSource::Image(id) => RenderError::UnknownTexture(id),
                _ => RenderError::TargetAllocation { width: 0, height: 0 },
            });
        };
        let Some(frame) = self.frame.as_mut() else { return Ok(()) };
        if let Some(pass) = frame.pass.as_mut() {
            pass.set_bind_group(1, group, &[]);
        }
        frame.texture = Some(texture);
        Ok(())
    }

    fn draw_quads(&mut self, first: u32, count: u32) {
        let Some(frame) = self.frame.as_mut() else { return };
        if frame.scissor_empty || frame.program.is_none() || count == 0 {
            return;
        }
        if let Some(pass) = frame.pass.as_mut() {
            pass.draw_indexed(IndexPlan::index_range(first, count), 0, 0..1);
        }
    }

    fn end_frame(&mut self) -> Result<(), RenderError> {
        let Some(mut frame) = self.frame.take() else { return Ok(()) };
        // The pass borrows the encoder until dropped.
        drop(frame.pass.take());

        if let Some(buffers) = self.buffers.as_ref() {
            if !self.staging.is_empty() {
                self.queue.write_buffer(&buffers.uniforms, 0, &self.staging);
            }
        }
        self.queue.submit(std::iter::once(frame.encoder.finish()));
        self.main_view = None;

        // Owners that no longer render to texture give their storage back.
        let live: Vec<ElementId> = self.frame_targets.values().copied().collect();
        self.targets.retain(|owner, target| {
            let keep = live.contains(owner);
            if !keep {
                target.texture.destroy();
            }
            keep
        });

        if self.is_lost() { Err(RenderError::DeviceLost) } else { Ok(()) }
    }

    fn upload_texture(&mut self, id: TextureId, bitmap: &Bitmap) -> Result<(), RenderError> {
        let max = self.device.limits().max_texture_dimension_2d;
        if bitmap.width > max || bitmap.height > max {
            return Err(RenderError::TargetAllocation { width: bitmap.width, height: bitmap.height });
        }
        let Some(texture) = self.upload_bitmap("lumen image texture", bitmap) else {
            return Err(RenderError::DeviceLost);
        };
        if let Some(old) = self.textures.insert(id, texture) {
            old.texture.destroy();
        }
        Ok(())
    }

    fn release_texture(&mut self, id: TextureId) {
        if let Some(texture) = self.textures.remove(&id) {
            texture.texture.destroy();
        }
    }

    fn destroy(&mut self) {
        self.release_all();
    }
}

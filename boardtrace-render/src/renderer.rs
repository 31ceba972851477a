//! Progressive rendering: the render state machine, block workers, and antialiasing.

use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use boardtrace_base::euclid::{Vector2D, point2, vec2};
use boardtrace_base::math::{FreeCoordinate, Rgb};
use boardtrace_base::raycast::Ray;
use boardtrace_base::rng::WorkerRng;
use boardtrace_base::time::{Deadline, Duration, Instant, TimeStats};
use imgref::ImgVec;

use crate::blocks::BufferPoint;
use crate::camera::{ImagePixel, ImageSize, WindowPoint, area_usize};
use crate::packet::{PACKET_DIM, PacketHits, RAYS_PER_PACKET, RayPacket, no_hits};
use crate::postprocess::{self, GBuffer, GPixel, PostShader, Ssao};
use crate::preview::PreviewTracer;
use crate::shade::{Sampler, ShadeStats, Shader};
use crate::{
    Accelerator as _, BlockLayout, Camera, Flaws, HitInfo, RenderError, RenderOptions, Scene,
};

/// How long a caller should wait after the last edit before switching from the fast
/// preview back to full rendering. Not used by the renderer itself.
pub const WAIT_FOR_EDITING_TIMEOUT: Duration = Duration::from_millis(200);

const TIMESLICE: Duration = Duration::from_millis(400);
const LARGE_TIMESLICE: Duration = Duration::from_millis(750);
/// Images with more blocks than this get [`LARGE_TIMESLICE`].
const LARGE_BLOCK_COUNT: usize = 40_000;

/// Random displacement of the directions of the diagonal antialiasing packet.
const DIAGONAL_JITTER: FreeCoordinate = 0.0005;
/// Placement of the position-jittered antialiasing packets within each pixel.
const JITTER_OFFSET: FreeCoordinate = 0.125;
/// Random displacement of the position-jittered packets, in pixels.
const POSITION_JITTER: FreeCoordinate = 0.05;
/// Number of samples per pixel when antialiasing.
const AA_SAMPLES: f32 = 5.0;

// -------------------------------------------------------------------------------------------------

/// Stage of a progressive rendering.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum RenderState {
    /// Blocks are being traced.
    Tracing,
    /// Every block is traced; the post shader is next.
    PostProcessShade,
    /// The post shader has run; blurring and writing final pixels is next.
    PostProcessBlurAndFinish,
    /// The image is complete. Rendering does nothing until something changes.
    Finish,
    /// There is no usable progress; the next render restarts.
    Invalid,
}

impl RenderState {
    /// The state following this one once its work is done.
    #[must_use]
    pub fn next(self, post_processing: bool) -> Self {
        match (self, post_processing) {
            (Self::Tracing, true) => Self::PostProcessShade,
            (Self::PostProcessShade, true) => Self::PostProcessBlurAndFinish,
            (Self::Tracing | Self::PostProcessShade, false)
            | (Self::PostProcessBlurAndFinish | Self::Finish, _) => Self::Finish,
            (Self::Invalid, _) => Self::Tracing,
        }
    }
}

/// A flag which tells block workers to stop taking new blocks.
#[derive(Debug, Default)]
pub struct StopFlag(AtomicBool);

impl StopFlag {
    /// Creates a flag which is not set.
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    /// Sets the flag.
    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Returns whether the flag has been set.
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Receives human-readable progress messages, such as `"Rendering: 40 %"`.
pub trait StatusReporter {
    /// Displays or records `status`.
    fn report(&mut self, status: &str);
}

impl<F: FnMut(&str)> StatusReporter for F {
    fn report(&mut self, status: &str) {
        self(status);
    }
}

/// A complete image produced by [`Raytracer::render_to_completion()`].
#[derive(Clone, Debug)]
#[expect(clippy::exhaustive_structs)]
pub struct Rendering {
    /// Width and height of the image.
    pub size: ImageSize,
    /// Image data, RGBA, 8 bits per component, in the sRGB color space.
    pub data: Vec<[u8; 4]>,
    /// Deficiencies of the rendering.
    pub flaws: Flaws,
}

impl From<Rendering> for ImgVec<[u8; 4]> {
    fn from(value: Rendering) -> Self {
        imgref::Img::new(
            value.data,
            value.size.width as usize,
            value.size.height as usize,
        )
    }
}

// -------------------------------------------------------------------------------------------------

/// Renders a [`Scene`] progressively into a caller-owned RGBA8 buffer.
///
/// Each call to [`Raytracer::render()`] continues where the previous one stopped, until
/// the image is finished; after that, calls do nothing until the camera, scene, or
/// options change. The buffer must stay the same between calls, since unfinished passes
/// leave earlier progress in it.
///
/// The buffer has [`Raytracer::buffer_size()`] pixels, which may differ slightly from the
/// camera's viewport; see [`BlockLayout`].
pub struct Raytracer {
    scene: Arc<Scene>,
    camera: Camera,
    options: RenderOptions,
    post_shader: Box<dyn PostShader>,

    layout: BlockLayout,
    state: RenderState,
    /// Set by anything that makes the current progress obsolete.
    restart_requested: bool,
    /// Whether each block of `layout` has been traced in this pass.
    processed: Vec<AtomicBool>,
    completed: usize,
    gbuffer: GBuffer,
    shade_buffer: ImgVec<Rgb>,

    /// Number of the current pass, used to seed sample jitter.
    pass: u64,
    pass_start: Instant,
    timeslices: TimeStats,
    stats: ShadeStats,
}

impl Raytracer {
    /// Creates a renderer for `scene` as seen by `camera`, with the [`Ssao`] post shader.
    pub fn new(scene: Arc<Scene>, camera: Camera, options: RenderOptions) -> Self {
        let options = options.repair();
        let layout = BlockLayout::new(camera.viewport(), options.block_order);
        let mut new_self = Self {
            scene,
            camera,
            options,
            post_shader: Box::new(Ssao::default()),
            layout,
            state: RenderState::Invalid,
            restart_requested: true,
            processed: Vec::new(),
            completed: 0,
            gbuffer: ImgVec::new(Vec::new(), 0, 0),
            shade_buffer: ImgVec::new(Vec::new(), 0, 0),
            pass: 0,
            pass_start: Instant::now(),
            timeslices: TimeStats::default(),
            stats: ShadeStats::default(),
        };
        new_self.allocate();
        new_self
    }

    /// The scene being rendered.
    pub fn scene(&self) -> &Arc<Scene> {
        &self.scene
    }

    /// Replaces the scene and restarts the image.
    pub fn reload(&mut self, scene: Arc<Scene>) {
        self.scene = scene;
        self.restart_requested = true;
    }

    /// The camera.
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Mutable access to the camera. Any modification restarts the image.
    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    /// Changes the camera's viewport, and therefore the buffer size.
    pub fn resize(&mut self, size: ImageSize) {
        self.camera.set_viewport(size);
        self.sync_layout();
    }

    /// The current options.
    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Replaces the options, after [repairing](RenderOptions::repair) them, and
    /// restarts the image.
    pub fn set_options(&mut self, options: RenderOptions) {
        let options = options.repair();
        if options.block_order != self.options.block_order {
            self.layout = BlockLayout::new(self.camera.viewport(), options.block_order);
            self.allocate();
        }
        self.options = options;
        self.restart_requested = true;
    }

    /// Replaces the shader used for post-processing, and restarts the image.
    pub fn set_post_shader(&mut self, shader: Box<dyn PostShader>) {
        self.post_shader = shader;
        self.restart_requested = true;
    }

    /// The current stage of rendering.
    pub fn state(&self) -> RenderState {
        self.state
    }

    /// Statistics of the secondary rays traced in the current pass.
    pub fn stats(&self) -> ShadeStats {
        self.stats
    }

    /// Size of the buffer that [`Raytracer::render()`] draws into, for the camera's
    /// current viewport.
    pub fn buffer_size(&self) -> ImageSize {
        if self.layout.window_size() == self.camera.viewport() {
            self.layout.buffer_size()
        } else {
            BlockLayout::new(self.camera.viewport(), self.options.block_order).buffer_size()
        }
    }

    /// Recomputes the block layout if the viewport has changed.
    fn sync_layout(&mut self) {
        if self.layout.window_size() != self.camera.viewport() {
            self.layout = BlockLayout::new(self.camera.viewport(), self.options.block_order);
            self.allocate();
            self.restart_requested = true;
        }
    }

    /// Sizes per-block and per-pixel storage for the current layout.
    fn allocate(&mut self) {
        let size = self.layout.buffer_size();
        let (width, height) = (size.width as usize, size.height as usize);
        self.processed = (0..self.layout.block_count())
            .map(|_| AtomicBool::new(false))
            .collect();
        self.gbuffer = ImgVec::new(vec![GPixel::default(); width * height], width, height);
        self.shade_buffer = ImgVec::new(vec![Rgb::ZERO; width * height], width, height);
    }

    fn restart(&mut self) {
        if self.state == RenderState::Invalid && !self.restart_requested {
            log::warn!("render state was invalid without a restart being requested");
        }
        self.sync_layout();
        for flag in &self.processed {
            flag.store(false, Ordering::Relaxed);
        }
        self.completed = 0;
        self.gbuffer.buf_mut().fill(GPixel::default());
        self.pass += 1;
        self.pass_start = Instant::now();
        self.timeslices = TimeStats::default();
        self.stats = ShadeStats::default();
        self.state = RenderState::Tracing;
        self.restart_requested = false;
        log::debug!(
            "starting render pass {} of {} blocks",
            self.pass,
            self.layout.block_count()
        );
    }

    fn check_output(&self, output: &[[u8; 4]]) -> Result<(), RenderError> {
        let viewport = self.camera.viewport();
        if viewport.width == 0 || viewport.height == 0 {
            return Err(RenderError::EmptyViewport);
        }
        let expected = area_usize(self.layout.buffer_size());
        if output.len() != expected {
            return Err(RenderError::BufferSize {
                expected,
                actual: output.len(),
            });
        }
        Ok(())
    }

    fn flaws(&self) -> Flaws {
        if self.state == RenderState::Finish {
            Flaws::empty()
        } else if self.options.post_processing {
            Flaws::UNFINISHED | Flaws::NO_POST_PROCESSING
        } else {
            Flaws::UNFINISHED
        }
    }

    // ---------------------------------------------------------------------------------------------

    /// Continues rendering into `output` for up to one timeslice.
    ///
    /// The timeslice is [`RenderOptions::timeslice`], or if that is [`None`], 400 ms, or
    /// 750 ms for images of more than 40 000 blocks.
    ///
    /// Returns the flaws of the image now in `output`.
    pub fn render(
        &mut self,
        output: &mut [[u8; 4]],
        status: &mut dyn StatusReporter,
    ) -> Result<Flaws, RenderError> {
        self.sync_layout();
        let timeslice = self.options.timeslice.unwrap_or(
            if self.layout.block_count() > LARGE_BLOCK_COUNT {
                LARGE_TIMESLICE
            } else {
                TIMESLICE
            },
        );
        self.render_with_deadline(output, status, Deadline::after(Instant::now(), timeslice))
    }

    /// As [`Raytracer::render()`], but stopping at `deadline`.
    ///
    /// Each stage which is started is run to completion, except that tracing stops
    /// after every worker has finished a block past the deadline.
    /// [`Deadline::Whenever`] renders the whole image.
    pub fn render_with_deadline(
        &mut self,
        output: &mut [[u8; 4]],
        status: &mut dyn StatusReporter,
        deadline: Deadline,
    ) -> Result<Flaws, RenderError> {
        self.sync_layout();
        self.check_output(output)?;

        if self.camera.take_changed() {
            self.restart_requested = true;
        }
        if self.restart_requested || self.state == RenderState::Invalid {
            self.restart();
        }

        loop {
            match self.state {
                RenderState::Tracing => self.trace_blocks(output, status, deadline),
                RenderState::PostProcessShade => {
                    if self.options.post_processing {
                        let start = Instant::now();
                        postprocess::shade_pass(
                            &*self.post_shader,
                            self.gbuffer.as_ref(),
                            &mut self.shade_buffer,
                        );
                        log::trace!("post shader took {:?}", start.elapsed());
                    } else {
                        log::debug!("post-processing stage reached while disabled");
                    }
                    self.state = self.state.next(self.options.post_processing);
                }
                RenderState::PostProcessBlurAndFinish => {
                    let start = Instant::now();
                    postprocess::blur_and_finish(
                        &*self.post_shader,
                        self.gbuffer.as_ref(),
                        self.shade_buffer.as_ref(),
                        output,
                    );
                    log::trace!("blur took {:?}", start.elapsed());
                    self.state = self.state.next(self.options.post_processing);
                    self.report_finished(status);
                }
                RenderState::Finish => break,
                RenderState::Invalid => self.restart(),
            }
            if deadline.is_past(Instant::now()) {
                break;
            }
        }

        Ok(self.flaws())
    }

    /// Renders the whole image into a new buffer.
    pub fn render_to_completion(&mut self) -> Result<Rendering, RenderError> {
        self.sync_layout();
        let size = self.layout.buffer_size();
        let mut data = vec![[0; 4]; area_usize(size)];
        // Start over, since there is no earlier progress in this buffer.
        self.restart_requested = true;
        let flaws = self.render_with_deadline(&mut data, &mut |_: &str| {}, Deadline::Whenever)?;
        Ok(Rendering { size, data, flaws })
    }

    /// Renders a cheap approximation of the image, for use while the camera is moving.
    ///
    /// The next call to [`Raytracer::render()`] starts the full image over.
    pub fn render_preview(&mut self, output: &mut [[u8; 4]]) -> Result<Flaws, RenderError> {
        self.sync_layout();
        self.check_output(output)?;
        let start = Instant::now();

        let shader = Shader::new(&self.scene, &self.options, &self.camera).with_preview(true);
        let tracer = PreviewTracer::new(&shader, &self.camera, self.layout.offset());
        let pass = self.pass;
        let preview_blocks = self.layout.preview_blocks();
        let traced = map_blocks(preview_blocks.len(), |index| {
            let mut sampler = Sampler::new(WorkerRng::for_block(pass, index));
            tracer.trace_block(preview_blocks[index], &mut sampler)
        });
        let buffer_size = self.layout.buffer_size();
        for block in &traced {
            block.write_to(output, buffer_size);
        }
        log::trace!(
            "preview of {} blocks took {:?}",
            traced.len(),
            start.elapsed()
        );

        self.state = RenderState::Invalid;
        self.restart_requested = true;

        let mut flaws = Flaws::UNFINISHED | Flaws::PREVIEW;
        if self.options.antialiasing {
            flaws |= Flaws::NO_ANTIALIASING;
        }
        if self.options.post_processing {
            flaws |= Flaws::NO_POST_PROCESSING;
        }
        Ok(flaws)
    }

    /// Renders a preview if `moving`, otherwise continues the full image.
    pub fn redraw(
        &mut self,
        moving: bool,
        output: &mut [[u8; 4]],
        status: &mut dyn StatusReporter,
    ) -> Result<Flaws, RenderError> {
        if moving {
            self.render_preview(output)
        } else {
            self.render(output, status)
        }
    }

    fn report_finished(&mut self, status: &mut dyn StatusReporter) {
        let elapsed = self.pass_start.elapsed();
        log::debug!(
            "render pass {} finished in {:.3} s; timeslices {}; {} secondary rays, depth {}",
            self.pass,
            elapsed.as_secs_f32(),
            self.timeslices,
            self.stats.rays_cast,
            self.stats.max_depth,
        );
        status.report(&format!("Rendering time {:.3} s", elapsed.as_secs_f32()));
    }

    /// Traces unprocessed blocks until all are done or `deadline` passes.
    fn trace_blocks(
        &mut self,
        output: &mut [[u8; 4]],
        status: &mut dyn StatusReporter,
        deadline: Deadline,
    ) {
        let start = Instant::now();
        let already_completed = self.completed;
        let (completed, stats) = {
            let shader = Shader::new(&self.scene, &self.options, &self.camera);
            let tracer = BlockTracer {
                shader: &shader,
                camera: &self.camera,
                options: &self.options,
                offset: self.layout.offset(),
            };
            let blocks = self.layout.blocks();
            let processed = &self.processed[..];
            let pass = self.pass;

            let cursor = AtomicUsize::new(0);
            let completed = AtomicUsize::new(already_completed);
            let stop = StopFlag::new();
            let frame = Mutex::new(Frame {
                output,
                gbuffer: self.gbuffer.buf_mut(),
                width: self.layout.buffer_size().width as usize,
                post_processing: self.options.post_processing,
            });
            let total_stats = Mutex::new(ShadeStats::default());

            let worker = || {
                let mut stats = ShadeStats::default();
                while !stop.is_stopped() {
                    let index = cursor.fetch_add(1, Ordering::Relaxed);
                    let Some(&origin) = blocks.get(index) else {
                        break;
                    };
                    if processed[index].load(Ordering::Relaxed) {
                        continue;
                    }
                    let mut sampler = Sampler::new(WorkerRng::for_block(pass, index));
                    let block = tracer.trace_block(origin, &mut sampler);
                    frame
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .write(origin, &block);
                    processed[index].store(true, Ordering::Relaxed);
                    completed.fetch_add(1, Ordering::Relaxed);
                    stats += sampler.stats;
                    if deadline.is_past(Instant::now()) {
                        stop.stop();
                    }
                }
                *total_stats.lock().unwrap_or_else(PoisonError::into_inner) += stats;
            };
            run_workers(blocks.len().saturating_sub(already_completed), &worker);

            (
                completed.into_inner(),
                total_stats
                    .into_inner()
                    .unwrap_or_else(PoisonError::into_inner),
            )
        };
        self.completed = completed;
        self.stats += stats;
        let elapsed = start.elapsed();
        self.timeslices += TimeStats::one(elapsed);

        let total = self.layout.block_count();
        log::trace!(
            "traced {}/{} blocks in {:?}",
            self.completed,
            total,
            elapsed
        );
        if self.completed >= total {
            self.state = self.state.next(self.options.post_processing);
            if self.state == RenderState::Finish {
                self.report_finished(status);
            }
        } else {
            status.report(&format!("Rendering: {} %", self.completed * 100 / total));
        }
    }
}

impl fmt::Debug for Raytracer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            scene,
            camera,
            options,
            post_shader,
            layout,
            state,
            restart_requested,
            processed: _,
            completed,
            gbuffer: _,
            shade_buffer: _,
            pass,
            pass_start: _,
            timeslices,
            stats,
        } = self;
        f.debug_struct("Raytracer")
            .field("scene", scene)
            .field("camera", camera)
            .field("options", options)
            .field("post_shader", post_shader)
            .field("layout", layout)
            .field("state", state)
            .field("restart_requested", restart_requested)
            .field("completed", completed)
            .field("pass", pass)
            .field("timeslices", timeslices)
            .field("stats", stats)
            .finish_non_exhaustive()
    }
}

// -------------------------------------------------------------------------------------------------

/// Runs `worker` on several threads until it returns, or once without `auto-threads`.
#[cfg(feature = "auto-threads")]
fn run_workers(max_useful: usize, worker: &(dyn Fn() + Sync)) {
    let count = rayon::current_num_threads().max(2).min(max_useful);
    rayon::scope(|s| {
        for _ in 0..count {
            s.spawn(|_| worker());
        }
    });
}

/// Runs `worker` on several threads until it returns, or once without `auto-threads`.
#[cfg(not(feature = "auto-threads"))]
fn run_workers(max_useful: usize, worker: &(dyn Fn() + Sync)) {
    if max_useful > 0 {
        worker();
    }
}

/// Computes `f(i)` for each `i` in `0..count`, in parallel if possible.
#[cfg(feature = "auto-threads")]
fn map_blocks<T, F>(count: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize) -> T + Send + Sync,
{
    use rayon::iter::{IntoParallelIterator as _, ParallelIterator as _};
    (0..count).into_par_iter().map(f).collect()
}

/// Computes `f(i)` for each `i` in `0..count`, in parallel if possible.
#[cfg(not(feature = "auto-threads"))]
fn map_blocks<T, F>(count: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize) -> T + Send + Sync,
{
    (0..count).map(f).collect()
}

/// The shared image data that traced blocks are copied into.
struct Frame<'a> {
    output: &'a mut [[u8; 4]],
    gbuffer: &'a mut [GPixel],
    width: usize,
    post_processing: bool,
}

impl Frame<'_> {
    fn write(&mut self, origin: BufferPoint, block: &[GPixel; RAYS_PER_PACKET]) {
        let dim = PACKET_DIM as usize;
        for (y, row) in block.chunks_exact(dim).enumerate() {
            let start = (origin.y as usize + y) * self.width + origin.x as usize;
            self.gbuffer[start..start + dim].copy_from_slice(row);
            for (out, pixel) in self.output[start..start + dim].iter_mut().zip(row) {
                let color = pixel.color.clamp01().with_alpha_one();
                // Until post-processing replaces them, pixels are only a progress display.
                *out = if self.post_processing {
                    color.to_linear8()
                } else {
                    color.to_srgb8()
                };
            }
        }
    }
}

/// Traces full-quality blocks.
struct BlockTracer<'a> {
    shader: &'a Shader<'a>,
    camera: &'a Camera,
    options: &'a RenderOptions,
    offset: Vector2D<i32, ImagePixel>,
}

impl BlockTracer<'_> {
    /// Traces the block whose upper left corner is at `origin`.
    fn trace_block(&self, origin: BufferPoint, sampler: &mut Sampler) -> [GPixel; RAYS_PER_PACKET] {
        let window_pos: WindowPoint = point2(
            (i64::from(origin.x) + i64::from(self.offset.x)) as FreeCoordinate,
            (i64::from(origin.y) + i64::from(self.offset.y)) as FreeCoordinate,
        );
        let accelerator = self.shader.scene().accelerator();
        let bg_of = |i: usize| self.shader.background_at(window_pos.y + (i as u32 / PACKET_DIM) as f32);

        let primary = RayPacket::new(self.camera, window_pos);
        let mut primary_hits = no_hits();
        accelerator.intersect_packet(&primary, &mut primary_hits);

        let mut pixels = [GPixel::default(); RAYS_PER_PACKET];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            let mut hit = primary_hits[i];
            let bg = bg_of(i);
            let color = self
                .shader
                .shade_hit(sampler, bg, &primary.rays()[i], &mut hit, false, 0, true);
            *pixel = if hit.is_hit() {
                GPixel::surface(color, hit.normal, hit.point, hit.t_hit, hit.shadow_factor)
            } else {
                GPixel::background(color)
            };
        }

        if !self.options.antialiasing {
            return pixels;
        }

        let diagonal = RayPacket::with_direction_jitter(
            self.camera,
            window_pos + vec2(0.5, 0.5),
            DIAGONAL_JITTER,
            &mut sampler.rng,
        );
        let mut diagonal_hits = no_hits();
        accelerator.intersect_packet(&diagonal, &mut diagonal_hits);
        let mut sums: [Rgb; RAYS_PER_PACKET] = core::array::from_fn(|i| pixels[i].color);
        for (i, sum) in sums.iter_mut().enumerate() {
            let mut hit = diagonal_hits[i];
            *sum += self
                .shader
                .shade_hit(sampler, bg_of(i), &diagonal.rays()[i], &mut hit, false, 0, true);
        }

        let d = JITTER_OFFSET;
        for offset in [vec2(0.5 - d, d), vec2(d, 0.5 - d), vec2(0.25 - d, 0.25 - d)] {
            let packet = RayPacket::with_position_jitter(
                self.camera,
                window_pos,
                offset,
                POSITION_JITTER,
                &mut sampler.rng,
            );
            for (i, sum) in sums.iter_mut().enumerate() {
                let ray = &packet.rays()[i];
                let mut hit = self.jittered_hit(ray, &primary_hits, &diagonal_hits, i);
                *sum += self
                    .shader
                    .shade_hit(sampler, bg_of(i), ray, &mut hit, false, 0, true);
            }
        }

        for (pixel, sum) in pixels.iter_mut().zip(sums) {
            pixel.color = sum / AA_SAMPLES;
        }
        pixels
    }

    /// Finds the hit of a jittered ray near ray `i` of the primary packet, trying first
    /// what the primary and diagonal rays hit.
    fn jittered_hit(
        &self,
        ray: &Ray,
        primary_hits: &PacketHits,
        diagonal_hits: &PacketHits,
        i: usize,
    ) -> HitInfo {
        let accelerator = self.shader.scene().accelerator();
        let primary = &primary_hits[i];
        let mut hit = HitInfo::NONE;
        match (primary.object, primary.node) {
            (Some(object), _) if diagonal_hits[i].object == Some(object) => {
                if self.shader.scene().object(object).shape.intersect(ray, &mut hit) {
                    hit.object = Some(object);
                    hit.node = primary.node;
                    return hit;
                }
            }
            (_, Some(node)) => {
                if accelerator.intersect_from_node(ray, &mut hit, node) {
                    return hit;
                }
            }
            _ => {}
        }
        accelerator.intersect(ray, &mut hit);
        hit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Projection;
    use crate::object::LayerItem;
    use crate::postprocess::IdentityShader;
    use crate::shapes::{FilledCircle, Shape2};
    use crate::{Background, Material, Scene};
    use boardtrace_base::euclid::{point3, size2, vec3};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    /// Looks straight down at the board origin, 2 pixels per board unit.
    fn top_camera(size: ImageSize) -> Camera {
        let mut camera = Camera::new(
            Projection::Orthographic {
                view_height: size.height as f32 / 2.0,
            },
            size,
        );
        camera.look_at(point3(0., 0., 10.), point3(0., 0., 0.), vec3(0., 1., 0.));
        camera
    }

    fn circle() -> FilledCircle {
        FilledCircle::new(point2(0., 0.), 5.0)
    }

    fn circle_scene() -> Arc<Scene> {
        let mut builder = Scene::builder();
        let matte = builder.add_material(Material::default());
        builder.add_object(
            LayerItem::new(circle(), 0.0, 1.0),
            matte,
            Rgb::new(1.0, 0.0, 0.0),
        );
        builder.background(Background {
            top: Rgb::new(0.0, 0.2, 0.4),
            bottom: Rgb::new(0.2, 0.6, 1.0),
        });
        Arc::new(builder.build().unwrap())
    }

    fn fast_options() -> RenderOptions {
        let mut options = RenderOptions::default();
        options.antialiasing = false;
        options.post_processing = false;
        options
    }

    #[test]
    fn state_transitions() {
        use RenderState::*;
        assert_eq!(Tracing.next(true), PostProcessShade);
        assert_eq!(Tracing.next(false), Finish);
        assert_eq!(PostProcessShade.next(true), PostProcessBlurAndFinish);
        assert_eq!(PostProcessShade.next(false), Finish);
        assert_eq!(PostProcessBlurAndFinish.next(true), Finish);
        assert_eq!(Finish.next(true), Finish);
        assert_eq!(Invalid.next(false), Tracing);
    }

    /// A circle seen from above covers exactly the pixels whose rays pass through it.
    #[test]
    fn circle_silhouette() {
        let window = size2(64, 48);
        let mut raytracer = Raytracer::new(circle_scene(), top_camera(window), fast_options());
        let rendering = raytracer.render_to_completion().unwrap();
        assert_eq!(rendering.flaws, Flaws::empty());
        assert_eq!(raytracer.state(), RenderState::Finish);

        let size = rendering.size;
        let offset = raytracer.layout.offset();
        let camera = raytracer.camera().clone();
        let background = raytracer.scene().background();
        let shape = Shape2::from(circle());
        let mut surface_color = None;
        let mut inside_count = 0;
        for y in 0..size.height {
            for x in 0..size.width {
                let window_point = point2(
                    (x as i32 + offset.x) as f32 + 0.5,
                    (y as i32 + offset.y) as f32 + 0.5,
                );
                let origin = camera.make_ray(window_point).origin();
                let distance = (origin.x * origin.x + origin.y * origin.y).sqrt();
                if (distance - 5.0).abs() < 0.05 {
                    continue;
                }
                let pixel = rendering.data[(y * size.width + x) as usize];
                if shape.contains(point2(origin.x, origin.y)) {
                    inside_count += 1;
                    let expected = *surface_color.get_or_insert(pixel);
                    assert_eq!(pixel, expected, "at {x}, {y}");
                    assert!(pixel[0] > pixel[2] + 50, "{pixel:?}");
                } else {
                    let row = (y as i32 + offset.y) as f32;
                    let expected = background
                        .at_row(row, window.height)
                        .clamp01()
                        .with_alpha_one()
                        .to_srgb8();
                    assert_eq!(pixel, expected, "at {x}, {y}");
                }
            }
        }
        // Area of the circle is about 78.5 square units, or 314 pixels.
        assert!((280..=330).contains(&inside_count), "{inside_count}");
    }

    /// Post-processing which does nothing gives the same image as no post-processing.
    #[test]
    fn identity_post_processing_is_no_op() {
        let window = size2(48, 40);
        let options = fast_options();
        let mut plain = Raytracer::new(circle_scene(), top_camera(window), options.clone());
        let mut plain_output = vec![[0; 4]; area_usize(plain.buffer_size())];
        let flaws = plain
            .render_with_deadline(&mut plain_output, &mut |_: &str| {}, Deadline::Whenever)
            .unwrap();
        assert_eq!(flaws, Flaws::empty());
        assert_eq!(plain.state(), RenderState::Finish);

        let mut options = options;
        options.post_processing = true;
        let mut processed = Raytracer::new(circle_scene(), top_camera(window), options);
        processed.set_post_shader(Box::new(IdentityShader));
        let rendering = processed.render_to_completion().unwrap();
        assert_eq!(rendering.flaws, Flaws::empty());
        assert_eq!(rendering.data, plain_output);
    }

    /// Rendering in many short steps gives the same image as rendering all at once, and
    /// rendering a finished image changes nothing.
    #[rstest]
    fn progressive_rendering_is_idempotent(#[values(false, true)] antialiasing: bool) {
        let window = size2(200, 200);
        let mut options = RenderOptions::default();
        options.antialiasing = antialiasing;

        let mut all_at_once = Raytracer::new(circle_scene(), top_camera(window), options.clone());
        let expected = all_at_once.render_to_completion().unwrap().data;

        let mut stepwise = Raytracer::new(circle_scene(), top_camera(window), options);
        let mut output = vec![[0; 4]; area_usize(stepwise.buffer_size())];
        let mut statuses = Vec::new();
        let mut steps = 0;
        while stepwise.state() != RenderState::Finish {
            stepwise
                .render_with_deadline(
                    &mut output,
                    &mut |s: &str| statuses.push(s.to_owned()),
                    Deadline::Asap,
                )
                .unwrap();
            steps += 1;
            assert!(steps < 1000);
        }
        assert!(steps > 1);
        assert_eq!(output, expected);
        assert!(statuses.iter().any(|s| s.starts_with("Rendering: ")), "{statuses:?}");
        assert!(
            statuses.last().unwrap().starts_with("Rendering time "),
            "{statuses:?}"
        );

        let flaws = stepwise
            .render_with_deadline(&mut output, &mut |_: &str| {}, Deadline::Asap)
            .unwrap();
        assert_eq!(flaws, Flaws::empty());
        assert_eq!(output, expected);
    }

    #[test]
    fn camera_change_restarts() {
        let window = size2(32, 32);
        let mut raytracer = Raytracer::new(circle_scene(), top_camera(window), fast_options());
        raytracer.render_to_completion().unwrap();
        let first_pass = raytracer.pass;
        raytracer
            .camera_mut()
            .look_at(point3(1., 0., 10.), point3(1., 0., 0.), vec3(0., 1., 0.));
        let mut output = vec![[0; 4]; area_usize(raytracer.buffer_size())];
        raytracer
            .render_with_deadline(&mut output, &mut |_: &str| {}, Deadline::Whenever)
            .unwrap();
        assert_eq!(raytracer.pass, first_pass + 1);
        assert_eq!(raytracer.state(), RenderState::Finish);
    }

    #[test]
    fn invalid_state_recovers() {
        let mut raytracer =
            Raytracer::new(circle_scene(), top_camera(size2(32, 32)), fast_options());
        let expected = raytracer.render_to_completion().unwrap().data;
        let mut output = vec![[0; 4]; expected.len()];
        raytracer.state = RenderState::Invalid;
        raytracer
            .render_with_deadline(&mut output, &mut |_: &str| {}, Deadline::Whenever)
            .unwrap();
        assert_eq!(raytracer.state(), RenderState::Finish);
        assert_eq!(output, expected);
    }

    #[test]
    fn wrong_buffer_size() {
        let mut raytracer =
            Raytracer::new(circle_scene(), top_camera(size2(64, 48)), fast_options());
        let expected = area_usize(raytracer.buffer_size());
        let mut output = vec![[0; 4]; 10];
        assert_eq!(
            raytracer.render(&mut output, &mut |_: &str| {}),
            Err(RenderError::BufferSize {
                expected,
                actual: 10
            })
        );
    }

    #[test]
    fn empty_viewport() {
        let mut raytracer =
            Raytracer::new(circle_scene(), top_camera(size2(0, 10)), fast_options());
        let mut output = vec![[0; 4]; area_usize(raytracer.buffer_size())];
        assert_eq!(
            raytracer.render_preview(&mut output),
            Err(RenderError::EmptyViewport)
        );
    }

    #[test]
    fn resize_changes_buffer() {
        let mut raytracer =
            Raytracer::new(circle_scene(), top_camera(size2(64, 48)), fast_options());
        raytracer.render_to_completion().unwrap();
        raytracer.resize(size2(20, 13));
        assert_eq!(raytracer.buffer_size(), size2(24, 16));
        let rendering = raytracer.render_to_completion().unwrap();
        assert_eq!(rendering.size, size2(24, 16));
        assert_eq!(rendering.data.len(), 24 * 16);
    }

    #[test]
    fn preview_then_restart() {
        let window = size2(96, 80);
        let mut raytracer =
            Raytracer::new(circle_scene(), top_camera(window), RenderOptions::default());
        let mut output = vec![[0; 4]; area_usize(raytracer.buffer_size())];
        let flaws = raytracer.redraw(true, &mut output, &mut |_: &str| {}).unwrap();
        assert_eq!(
            flaws,
            Flaws::UNFINISHED
                | Flaws::PREVIEW
                | Flaws::NO_ANTIALIASING
                | Flaws::NO_POST_PROCESSING
        );
        assert_eq!(raytracer.state(), RenderState::Invalid);
        // The center of the circle was drawn.
        let size = raytracer.buffer_size();
        let center = output[(size.height / 2 * size.width + size.width / 2) as usize];
        assert!(center[0] > center[2] + 50, "{center:?}");

        let pass = raytracer.pass;
        raytracer
            .render_with_deadline(&mut output, &mut |_: &str| {}, Deadline::Asap)
            .unwrap();
        assert_eq!(raytracer.pass, pass + 1);
        assert_ne!(raytracer.state(), RenderState::Invalid);
    }
}

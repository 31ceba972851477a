//! Fast preview: tracing a sparse grid of samples and interpolating between them.

use boardtrace_base::euclid::{Vector2D, point2};
use boardtrace_base::math::{FreeCoordinate, Rgb};
use boardtrace_base::raycast::Ray;

use crate::blocks::{BufferPoint, PREVIEW_STRIDE};
use crate::camera::{ImagePixel, ImageSize, WindowPoint};
use crate::packet::{PACKET_DIM, RayPacket, no_hits, packet_index};
use crate::shade::{Sampler, Shader};
use crate::{Accelerator as _, Camera, HitInfo, NodeId};

/// Distance in pixels between traced samples.
const SAMPLE_SPACING: usize = 4;
/// Cells per preview block along each axis.
const CELLS: usize = PACKET_DIM as usize - 1;
/// Width and height of the area written by one preview block.
const SPAN: usize = PREVIEW_STRIDE as usize;

/// A traced sample, and the accelerator node its ray hit.
#[derive(Clone, Copy, Debug)]
struct Sample {
    color: Rgb,
    node: Option<NodeId>,
}

/// The interpolated pixels of one preview block, ready to be copied into the buffer.
#[derive(Clone, Debug)]
pub(crate) struct PreviewBlock {
    origin: BufferPoint,
    /// `SPAN` rows of `SPAN` pixels.
    pixels: Vec<Rgb>,
    /// Rays traced in addition to the grid samples.
    pub(crate) extra_rays: u32,
}

impl PreviewBlock {
    /// Copies the pixels into `output`, a buffer of `buffer_size`, clipping at its edges.
    pub(crate) fn write_to(&self, output: &mut [[u8; 4]], buffer_size: ImageSize) {
        let width = buffer_size.width as usize;
        let height = buffer_size.height as usize;
        let x0 = self.origin.x as usize;
        let y0 = self.origin.y as usize;
        if x0 >= width {
            return;
        }
        let columns = SPAN.min(width - x0);
        for (row, y) in self.pixels.chunks_exact(SPAN).zip(y0..height) {
            let start = y * width + x0;
            for (out, color) in output[start..start + columns].iter_mut().zip(row) {
                *out = color.clamp01().with_alpha_one().to_srgb8();
            }
        }
    }
}

/// Traces preview blocks for one camera position.
pub(crate) struct PreviewTracer<'a> {
    shader: &'a Shader<'a>,
    camera: &'a Camera,
    /// Window position minus buffer position.
    offset: Vector2D<i32, ImagePixel>,
}

impl<'a> PreviewTracer<'a> {
    pub(crate) fn new(
        shader: &'a Shader<'a>,
        camera: &'a Camera,
        offset: Vector2D<i32, ImagePixel>,
    ) -> Self {
        Self {
            shader,
            camera,
            offset,
        }
    }

    fn window_point(&self, x: usize, y: usize) -> WindowPoint {
        point2(
            (x as i64 + i64::from(self.offset.x)) as FreeCoordinate,
            (y as i64 + i64::from(self.offset.y)) as FreeCoordinate,
        )
    }

    /// Traces the samples of the preview block at `origin` and fills in the rest.
    pub(crate) fn trace_block(&self, origin: BufferPoint, sampler: &mut Sampler) -> PreviewBlock {
        let x0 = origin.x as usize;
        let y0 = origin.y as usize;

        let packet = RayPacket::with_stride(
            self.camera,
            self.window_point(x0, y0),
            SAMPLE_SPACING as FreeCoordinate,
        );
        let mut hits = no_hits();
        self.shader
            .scene()
            .accelerator()
            .intersect_packet(&packet, &mut hits);
        let samples: Vec<Sample> = (0..PACKET_DIM)
            .flat_map(|j| (0..PACKET_DIM).map(move |i| (i, j)))
            .map(|(i, j)| {
                let index = packet_index(i, j);
                let window_y = self.window_point(0, y0 + j as usize * SAMPLE_SPACING).y;
                let color = self.shade(sampler, packet.ray(i, j), &mut hits[index], window_y);
                Sample {
                    color,
                    node: hits[index].node,
                }
            })
            .collect();
        let sample = |i: usize, j: usize| samples[j * PACKET_DIM as usize + i];

        let mut block = PreviewBlock {
            origin,
            pixels: vec![Rgb::ZERO; SPAN * SPAN],
            extra_rays: 0,
        };
        // Bottom edge midpoints of the previous row of cells.
        let mut row_cache: [Option<Rgb>; CELLS] = [None; CELLS];
        for j in 0..CELLS {
            // Right edge midpoint of the previous cell in this row.
            let mut left_cache: Option<Rgb> = None;
            for i in 0..CELLS {
                let c00 = sample(i, j);
                let c10 = sample(i + 1, j);
                let c01 = sample(i, j + 1);
                let c11 = sample(i + 1, j + 1);
                // Cell-relative pixel position of lattice point `(u, v)`.
                let px = |u: usize| x0 + i * SAMPLE_SPACING + u;
                let py = |v: usize| y0 + j * SAMPLE_SPACING + v;

                let top = match row_cache[i] {
                    Some(color) => color,
                    None => self.midpoint(sampler, &mut block, c00, c10, px(2), py(0)),
                };
                let left = match left_cache {
                    Some(color) => color,
                    None => self.midpoint(sampler, &mut block, c00, c01, px(0), py(2)),
                };
                let right = self.midpoint(sampler, &mut block, c10, c11, px(4), py(2));
                let bottom = self.midpoint(sampler, &mut block, c01, c11, px(2), py(4));
                left_cache = Some(right);
                row_cache[i] = Some(bottom);

                let center = match c00.node {
                    Some(node) if [c10, c01, c11].iter().all(|c| c.node == Some(node)) => {
                        block.extra_rays += 1;
                        self.trace_hinted(sampler, node, px(2), py(2))
                    }
                    _ => Rgb::mean2(Rgb::mean2(top, bottom), Rgb::mean2(left, right)),
                };

                // Lattice of the cell with samples at even coordinates.
                let mut lattice = [[Rgb::ZERO; 5]; 5];
                lattice[0][0] = c00.color;
                lattice[0][2] = top;
                lattice[0][4] = c10.color;
                lattice[2][0] = left;
                lattice[2][2] = center;
                lattice[2][4] = right;
                lattice[4][0] = c01.color;
                lattice[4][2] = bottom;
                lattice[4][4] = c11.color;
                for v in 0..SAMPLE_SPACING {
                    for u in 0..SAMPLE_SPACING {
                        let color = match (u % 2, v % 2) {
                            (0, 0) => lattice[v][u],
                            (1, 0) => Rgb::mean2(lattice[v][u - 1], lattice[v][u + 1]),
                            (0, _) => Rgb::mean2(lattice[v - 1][u], lattice[v + 1][u]),
                            _ => Rgb::mean3(
                                lattice[v - 1][u - 1],
                                lattice[v + 1][u + 1],
                                Rgb::mean2(lattice[v - 1][u + 1], lattice[v + 1][u - 1]),
                            ),
                        };
                        let local_x = i * SAMPLE_SPACING + u;
                        let local_y = j * SAMPLE_SPACING + v;
                        block.pixels[local_y * SPAN + local_x] = color;
                    }
                }
            }
        }
        block
    }

    /// Color halfway between two samples at pixel `(x, y)`: traced when both samples hit
    /// the same node, otherwise blended.
    fn midpoint(
        &self,
        sampler: &mut Sampler,
        block: &mut PreviewBlock,
        a: Sample,
        b: Sample,
        x: usize,
        y: usize,
    ) -> Rgb {
        match a.node {
            Some(node) if b.node == Some(node) => {
                block.extra_rays += 1;
                self.trace_hinted(sampler, node, x, y)
            }
            _ => Rgb::mean2(a.color, b.color),
        }
    }

    fn trace_hinted(&self, sampler: &mut Sampler, node: NodeId, x: usize, y: usize) -> Rgb {
        let point = self.window_point(x, y);
        let ray = self.camera.make_ray(point + Vector2D::new(0.5, 0.5));
        let mut hit = HitInfo::NONE;
        self.shader
            .scene()
            .accelerator()
            .intersect_from_node(&ray, &mut hit, node);
        self.shade(sampler, &ray, &mut hit, point.y)
    }

    fn shade(
        &self,
        sampler: &mut Sampler,
        ray: &Ray,
        hit: &mut HitInfo,
        window_y: FreeCoordinate,
    ) -> Rgb {
        let bg = self.shader.background_at(window_y);
        self.shader.shade_hit(sampler, bg, ray, hit, false, 0, false)
    }
}

//! Division of the image into blocks traced one [`RayPacket`](crate::packet::RayPacket)
//! at a time.

use boardtrace_base::euclid::{Point2D, Vector2D, point2, size2, vec2};

use crate::camera::{ImagePixel, ImageSize};
use crate::packet::PACKET_DIM;

/// Spacing of fast preview blocks. Each preview block traces a grid of
/// `PACKET_DIM` samples 4 pixels apart, and adjacent blocks share an edge of samples.
pub(crate) const PREVIEW_STRIDE: u32 = 4 * PACKET_DIM - 4;

/// Space required around the origin of a preview block for it to be used.
const PREVIEW_FOOTPRINT: u32 = 4 * PACKET_DIM + 4;

/// The order in which blocks are traced.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum BlockOrder {
    /// Blocks nearest the center of the image first.
    #[default]
    CenterOut,
    /// Along a Z-order curve from the upper left corner.
    Morton,
}

/// A position in the render buffer, which may be larger or smaller than the window.
pub(crate) type BufferPoint = Point2D<u32, ImagePixel>;

/// How the image for one window size is divided into blocks.
///
/// The render buffer has dimensions which are multiples of [`PACKET_DIM`], and is
/// centered on the window; [`BlockLayout::offset()`] converts buffer positions to window
/// positions.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BlockLayout {
    window_size: ImageSize,
    buffer_size: ImageSize,
    offset: Vector2D<i32, ImagePixel>,
    blocks: Vec<BufferPoint>,
    preview_blocks: Vec<BufferPoint>,
}

impl BlockLayout {
    /// Computes the layout for a window of the given size.
    pub fn new(window_size: ImageSize, order: BlockOrder) -> Self {
        let preview_blocks = preview_grid(window_size);

        let buffer_size = match preview_blocks
            .iter()
            .copied()
            .reduce(|a, b| point2(a.x.max(b.x), a.y.max(b.y)))
        {
            Some(max) => size2(
                (max.x + 4 * PACKET_DIM) / PACKET_DIM * PACKET_DIM,
                (max.y + 4 * PACKET_DIM) / PACKET_DIM * PACKET_DIM,
            ),
            None => size2(
                window_size.width.max(1).div_ceil(PACKET_DIM) * PACKET_DIM,
                window_size.height.max(1).div_ceil(PACKET_DIM) * PACKET_DIM,
            ),
        };

        let offset = vec2(
            (window_size.width as i32 - buffer_size.width as i32) / 2,
            (window_size.height as i32 - buffer_size.height as i32) / 2,
        );

        let columns = buffer_size.width / PACKET_DIM;
        let rows = buffer_size.height / PACKET_DIM;
        let mut blocks: Vec<BufferPoint> = (0..rows)
            .flat_map(|row| {
                (0..columns).map(move |column| point2(column * PACKET_DIM, row * PACKET_DIM))
            })
            .collect();
        match order {
            BlockOrder::CenterOut => {
                let center_x = i64::from(buffer_size.width);
                let center_y = i64::from(buffer_size.height);
                // Doubled coordinates keep the distances integral.
                blocks.sort_by_key(|block| {
                    let dx = i64::from(block.x * 2 + PACKET_DIM) - center_x;
                    let dy = i64::from(block.y * 2 + PACKET_DIM) - center_y;
                    dx * dx + dy * dy
                });
            }
            BlockOrder::Morton => {
                blocks.sort_by_key(|block| {
                    morton_encode(block.x / PACKET_DIM, block.y / PACKET_DIM)
                });
            }
        }

        Self {
            window_size,
            buffer_size,
            offset,
            blocks,
            preview_blocks,
        }
    }

    /// Size of the window this layout was computed for.
    pub fn window_size(&self) -> ImageSize {
        self.window_size
    }

    /// Size of the render buffer.
    pub fn buffer_size(&self) -> ImageSize {
        self.buffer_size
    }

    /// Window position minus buffer position.
    pub fn offset(&self) -> Vector2D<i32, ImagePixel> {
        self.offset
    }

    /// Number of [`PACKET_DIM`]-square blocks covering the buffer.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Upper left corners of blocks, in buffer coordinates, in tracing order.
    pub(crate) fn blocks(&self) -> &[BufferPoint] {
        &self.blocks
    }

    /// Upper left corners of fast preview blocks, in buffer coordinates.
    pub(crate) fn preview_blocks(&self) -> &[BufferPoint] {
        &self.preview_blocks
    }
}

/// Origins of the fast preview blocks which fit in the window, in Morton order.
fn preview_grid(window_size: ImageSize) -> Vec<BufferPoint> {
    let fitting = |extent: u32| {
        extent
            .checked_sub(PREVIEW_FOOTPRINT)
            .map_or(0, |room| room / PREVIEW_STRIDE + 1)
    };
    let columns = fitting(window_size.width);
    let rows = fitting(window_size.height);
    let mut cells: Vec<(u32, u32)> = (0..rows)
        .flat_map(|y| (0..columns).map(move |x| (x, y)))
        .collect();
    cells.sort_by_key(|&(x, y)| morton_encode(x, y));
    cells
        .into_iter()
        .map(|(x, y)| point2(x * PREVIEW_STRIDE, y * PREVIEW_STRIDE))
        .collect()
}

/// Interleaves the bits of `x` (even bits) and `y` (odd bits).
fn morton_encode(x: u32, y: u32) -> u64 {
    fn spread(v: u32) -> u64 {
        let mut v = u64::from(v);
        v = (v | (v << 16)) & 0x0000_FFFF_0000_FFFF;
        v = (v | (v << 8)) & 0x00FF_00FF_00FF_00FF;
        v = (v | (v << 4)) & 0x0F0F_0F0F_0F0F_0F0F;
        v = (v | (v << 2)) & 0x3333_3333_3333_3333;
        v = (v | (v << 1)) & 0x5555_5555_5555_5555;
        v
    }
    spread(x) | (spread(y) << 1)
}

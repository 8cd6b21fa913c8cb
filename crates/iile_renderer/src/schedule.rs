//! Tile scheduling for the render threads.
//!
//! The image is cut into tiles (buckets) ordered from the centre outwards,
//! once per progressive pass. The [`ScheduleMonitor`] hands each work item
//! to exactly one thread and tracks completion.

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

use iile_math::PixelBounds;
use thiserror::Error;

/// A rectangular region of the image to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    /// X coordinate of the tile's top-left corner
    pub x: u32,
    /// Y coordinate of the tile's top-left corner
    pub y: u32,
    /// Width of the tile in pixels
    pub width: u32,
    /// Height of the tile in pixels
    pub height: u32,
}

impl Tile {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Get the total number of pixels in this tile.
    pub fn pixel_count(&self) -> u32 {
        self.width * self.height
    }

    pub fn bounds(&self) -> PixelBounds {
        PixelBounds::new(self.x, self.y, self.x + self.width, self.y + self.height)
    }
}

/// Cut `bounds` into tiles, sorted in spiral order from the centre.
///
/// Tiles closer to the centre come first so a progressive preview shows the
/// most important part of the image early.
pub fn generate_tiles(bounds: PixelBounds, tile_size: u32) -> Vec<Tile> {
    let tile_size = tile_size.max(1);
    let mut tiles = Vec::new();

    let mut y = bounds.y0;
    while y < bounds.y1 {
        let mut x = bounds.x0;
        while x < bounds.x1 {
            let tw = tile_size.min(bounds.x1 - x);
            let th = tile_size.min(bounds.y1 - y);
            tiles.push(Tile::new(x, y, tw, th));
            x += tile_size;
        }
        y += tile_size;
    }

    sort_spiral(&mut tiles, bounds);
    tiles
}

/// Sort tiles by distance from the centre of `bounds`. The sort is stable,
/// so equidistant tiles keep scanline order.
fn sort_spiral(tiles: &mut [Tile], bounds: PixelBounds) {
    let center_x = (bounds.x0 + bounds.x1) as f32 / 2.0;
    let center_y = (bounds.y0 + bounds.y1) as f32 / 2.0;
    let dist = |t: &Tile| {
        let cx = t.x as f32 + t.width as f32 / 2.0;
        let cy = t.y as f32 + t.height as f32 / 2.0;
        (cx - center_x).powi(2) + (cy - center_y).powi(2)
    };

    tiles.sort_by(|a, b| {
        dist(a)
            .partial_cmp(&dist(b))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// One unit of work: a tile on a given progressive pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkItem {
    /// Position of this item in the schedule
    pub index: usize,
    pub pass: u32,
    pub tile: Tile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    Pending,
    InProgress,
    Done,
}

impl ItemState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => ItemState::Pending,
            1 => ItemState::InProgress,
            _ => ItemState::Done,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            ItemState::Pending => 0,
            ItemState::InProgress => 1,
            ItemState::Done => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleState {
    Running,
    Complete,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("work item {0} does not belong to this schedule")]
    UnknownItem(usize),

    #[error("work item {index} cannot be marked done from state {state:?}")]
    NotInProgress { index: usize, state: ItemState },
}

/// Shared work queue for the render threads.
///
/// Claiming is a single atomic step, so no two callers ever get the same
/// item. Claimed items are never handed out again, even when the claiming
/// thread dies before marking them done; [`ScheduleMonitor::abandoned`]
/// reports such items once the threads have stopped.
pub struct ScheduleMonitor {
    items: Vec<WorkItem>,
    states: Vec<AtomicU8>,
    next: AtomicUsize,
    done: AtomicUsize,
}

impl ScheduleMonitor {
    /// Schedule every tile of `bounds` once per pass, pass-major.
    pub fn new(bounds: PixelBounds, tile_size: u32, passes: u32) -> Self {
        let tiles = generate_tiles(bounds, tile_size);
        let items = (0..passes.max(1))
            .flat_map(|pass| tiles.iter().map(move |&tile| (pass, tile)))
            .enumerate()
            .map(|(index, (pass, tile))| WorkItem { index, pass, tile })
            .collect();
        Self::from_items(items)
    }

    /// Schedule an explicit list of items. Indices are reassigned in order.
    pub fn from_items(mut items: Vec<WorkItem>) -> Self {
        for (i, item) in items.iter_mut().enumerate() {
            item.index = i;
        }
        let states = items
            .iter()
            .map(|_| AtomicU8::new(ItemState::Pending.as_u8()))
            .collect();
        Self {
            items,
            states,
            next: AtomicUsize::new(0),
            done: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Claim the next pending item, or `None` once every item is claimed.
    pub fn claim_next(&self) -> Option<WorkItem> {
        let len = self.items.len();
        let index = self
            .next
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < len).then(|| n + 1))
            .ok()?;
        self.states[index].store(ItemState::InProgress.as_u8(), Ordering::Release);
        Some(self.items[index])
    }

    /// Record that a claimed item has been fully rendered.
    pub fn mark_done(&self, item: &WorkItem) -> Result<(), ScheduleError> {
        let state = self
            .states
            .get(item.index)
            .ok_or(ScheduleError::UnknownItem(item.index))?;
        state
            .compare_exchange(
                ItemState::InProgress.as_u8(),
                ItemState::Done.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map_err(|current| ScheduleError::NotInProgress {
                index: item.index,
                state: ItemState::from_u8(current),
            })?;

        let done = self.done.fetch_add(1, Ordering::AcqRel) + 1;
        if done == self.items.len() {
            log::debug!("All {} work items done", done);
        }
        Ok(())
    }

    pub fn item_state(&self, index: usize) -> Option<ItemState> {
        self.states
            .get(index)
            .map(|s| ItemState::from_u8(s.load(Ordering::Acquire)))
    }

    pub fn state(&self) -> ScheduleState {
        if self.done.load(Ordering::Acquire) == self.items.len() {
            ScheduleState::Complete
        } else {
            ScheduleState::Running
        }
    }

    pub fn done_count(&self) -> usize {
        self.done.load(Ordering::Acquire)
    }

    /// Items that were claimed but never marked done.
    pub fn abandoned(&self) -> Vec<WorkItem> {
        self.items
            .iter()
            .filter(|item| self.item_state(item.index) == Some(ItemState::InProgress))
            .copied()
            .collect()
    }
}

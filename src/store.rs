//! Image and placement storage.
//!
//! The store owns every decoded image, all grid placements, and the
//! accumulation buffers for chunked transfers. Admission is bounded two
//! ways - an image-count limit and a byte budget - both enforced with LRU
//! eviction on every insert. "Not found" is never an error here: lookups
//! return `Option`/`bool` and the manager decides what is worth reporting.
//!
//! The LRU order is a plain `Vec` touched with a linear scan. At the
//! prescribed scale (at most ~1000 images) that is cheaper than it looks;
//! an ordered map would be the upgrade path if the limits ever grow.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::codec::Bitmap;
use crate::command::{Command, Compression, CropRect, PixelFormat};
use crate::config::GraphicsConfig;
use crate::error::GraphicsError;

/// Upper bound on simultaneously open chunk buffers.
const MAX_OPEN_CHUNK_BUFFERS: usize = 32;

/// Composite placement identity: (image ID, placement ID).
pub type PlacementKey = (u32, u32);

/// A decoded image with its accounting metadata.
#[derive(Debug)]
pub struct StoredImage {
    pub id: u32,
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    /// Absent while a decode is pending or after it failed; the renderer
    /// skips placements whose image has no bitmap.
    pub bitmap: Option<Bitmap>,
    /// Bytes charged against the store budget. Must match the resident
    /// bitmap exactly; the running total is reconciled on every
    /// insert/remove.
    pub byte_size: usize,
    last_access: u64,
}

impl StoredImage {
    /// Monotonic access stamp, for diagnostics; eviction order itself is
    /// kept in the store's LRU list.
    pub fn last_access(&self) -> u64 {
        self.last_access
    }
}

/// A positioned instance of a stored image on the terminal grid.
///
/// `row` is buffer-absolute (scrollback-relative), not viewport-relative,
/// so placements survive scrolling untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub image_id: u32,
    pub placement_id: u32,
    pub col: u32,
    pub row: i64,
    /// Pixel offset within the first cell.
    pub x_offset: u32,
    pub y_offset: u32,
    /// Display size in cells (resolved at creation, never zero).
    pub cols: u32,
    pub rows: u32,
    pub crop: CropRect,
    pub z_index: i32,
}

impl Placement {
    pub fn key(&self) -> PlacementKey {
        (self.image_id, self.placement_id)
    }

    /// Inclusive span of buffer rows this placement occupies.
    pub fn row_span(&self) -> (i64, i64) {
        let height = i64::from(self.rows.max(1));
        (self.row, self.row + height - 1)
    }

    fn covers_row(&self, row: i64) -> bool {
        let (top, bottom) = self.row_span();
        row >= top && row <= bottom
    }

    fn covers_column(&self, col: u32) -> bool {
        col >= self.col && col < self.col.saturating_add(self.cols.max(1))
    }

    fn covers_cell(&self, col: u32, row: i64) -> bool {
        self.covers_column(col) && self.covers_row(row)
    }
}

/// Accumulator for one multi-part transfer. Declared metadata may arrive
/// on any chunk; the first declaration wins.
#[derive(Debug, Default)]
pub struct ChunkBuffer {
    pub format: Option<PixelFormat>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub compression: Compression,
    pub chunks: Vec<String>,
    accumulated: usize,
}

/// Point-in-time store counters, surfaced in the host's debug overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub images: usize,
    pub placements: usize,
    pub bytes_used: usize,
    pub bytes_quota: usize,
    pub open_chunk_buffers: usize,
}

/// Memory-bounded cache of decoded images plus their grid placements.
#[derive(Debug)]
pub struct ImageStore {
    config: GraphicsConfig,
    images: HashMap<u32, StoredImage>,
    /// Image IDs ordered least-recently-used first.
    lru: Vec<u32>,
    placements: HashMap<PlacementKey, Placement>,
    /// Insertion order, for cap eviction of the oldest placement.
    placement_order: Vec<PlacementKey>,
    /// Secondary index: starting buffer row -> placements anchored there.
    row_index: HashMap<i64, HashSet<PlacementKey>>,
    chunks: HashMap<u32, ChunkBuffer>,
    /// Most recently opened chunk buffer; continuation chunks without an
    /// explicit ID are routed here.
    last_chunk_id: Option<u32>,
    total_bytes: usize,
    access_counter: u64,
    next_auto_id: u32,
}

impl ImageStore {
    pub fn new(config: GraphicsConfig) -> Self {
        Self {
            config,
            images: HashMap::new(),
            lru: Vec::new(),
            placements: HashMap::new(),
            placement_order: Vec::new(),
            row_index: HashMap::new(),
            chunks: HashMap::new(),
            last_chunk_id: None,
            total_bytes: 0,
            access_counter: 0,
            next_auto_id: 1,
        }
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn placement_count(&self) -> usize {
        self.placements.len()
    }

    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            images: self.images.len(),
            placements: self.placements.len(),
            bytes_used: self.total_bytes,
            bytes_quota: self.config.quota_bytes,
            open_chunk_buffers: self.chunks.len(),
        }
    }

    /// Allocate the next auto-assigned image ID (monotonic, skips 0).
    pub fn next_auto_id(&mut self) -> u32 {
        let id = self.next_auto_id;
        self.next_auto_id = self.next_auto_id.wrapping_add(1);
        if self.next_auto_id == 0 {
            self.next_auto_id = 1;
        }
        id
    }

    /// Insert a decoded image, evicting as needed.
    ///
    /// An existing entry with the same ID is replaced first (its bitmap
    /// dropped, its placements left pointing at the new pixels). Eviction
    /// runs in two passes: the count limit, then the byte budget.
    pub fn store_image(
        &mut self,
        id: u32,
        format: PixelFormat,
        bitmap: Bitmap,
    ) -> Result<&StoredImage, GraphicsError> {
        let byte_size = bitmap.byte_size();
        if byte_size > self.config.max_image_bytes {
            return Err(GraphicsError::ImageTooLarge {
                size: byte_size,
                max: self.config.max_image_bytes,
            });
        }

        if let Some(old) = self.images.remove(&id) {
            self.total_bytes = self.total_bytes.saturating_sub(old.byte_size);
            self.lru.retain(|&other| other != id);
        }

        while self.images.len() >= self.config.max_images && !self.lru.is_empty() {
            self.evict_lru();
        }
        while self.total_bytes + byte_size > self.config.quota_bytes && !self.lru.is_empty() {
            self.evict_lru();
        }

        self.access_counter += 1;
        let image = StoredImage {
            id,
            format,
            width: bitmap.width,
            height: bitmap.height,
            byte_size,
            bitmap: Some(bitmap),
            last_access: self.access_counter,
        };
        self.total_bytes += byte_size;
        self.lru.push(id);
        Ok(self.images.entry(id).or_insert(image))
    }

    /// Look up an image and mark it most recently used.
    pub fn get_image(&mut self, id: u32) -> Option<&StoredImage> {
        if !self.images.contains_key(&id) {
            return None;
        }
        if let Some(pos) = self.lru.iter().position(|&other| other == id) {
            self.lru.remove(pos);
            self.lru.push(id);
        }
        self.access_counter += 1;
        let counter = self.access_counter;
        let image = self.images.get_mut(&id)?;
        image.last_access = counter;
        Some(image)
    }

    /// Look up an image without touching the LRU order (render path runs
    /// every frame and must not pin the whole working set hot).
    pub fn peek_image(&self, id: u32) -> Option<&StoredImage> {
        self.images.get(&id)
    }

    pub fn has_image(&self, id: u32) -> bool {
        self.images.contains_key(&id)
    }

    /// Remove an image and every placement referencing it. Returns false
    /// if the ID was absent (a no-op, not an error).
    pub fn remove_image(&mut self, id: u32) -> bool {
        let Some(image) = self.images.remove(&id) else {
            return false;
        };
        self.total_bytes = self.total_bytes.saturating_sub(image.byte_size);
        self.lru.retain(|&other| other != id);
        let orphaned: Vec<PlacementKey> = self
            .placements
            .keys()
            .filter(|&&(image_id, _)| image_id == id)
            .copied()
            .collect();
        for key in orphaned {
            self.remove_placement_key(key);
        }
        true
    }

    fn evict_lru(&mut self) {
        if let Some(&oldest) = self.lru.first() {
            log::debug!(
                "evicting image {oldest} (lru), {} bytes resident",
                self.total_bytes
            );
            self.remove_image(oldest);
        }
    }

    /// Insert or replace a placement. At the placement cap, the
    /// insertion-oldest entry is evicted first.
    pub fn set_placement(&mut self, placement: Placement) {
        let key = placement.key();
        if let Some(old) = self.placements.remove(&key) {
            self.unindex(&old);
            self.placement_order.retain(|&other| other != key);
        } else if self.placements.len() >= self.config.max_placements {
            if let Some(&oldest) = self.placement_order.first() {
                log::debug!("placement cap reached, dropping oldest {oldest:?}");
                self.remove_placement_key(oldest);
            }
        }
        self.row_index
            .entry(placement.row)
            .or_default()
            .insert(key);
        self.placement_order.push(key);
        self.placements.insert(key, placement);
    }

    pub fn get_placement(&self, image_id: u32, placement_id: u32) -> Option<&Placement> {
        self.placements.get(&(image_id, placement_id))
    }

    /// Remove one placement by its composite key.
    pub fn remove_placement(&mut self, image_id: u32, placement_id: u32) -> bool {
        self.remove_placement_key((image_id, placement_id))
    }

    fn remove_placement_key(&mut self, key: PlacementKey) -> bool {
        let Some(placement) = self.placements.remove(&key) else {
            return false;
        };
        self.unindex(&placement);
        self.placement_order.retain(|&other| other != key);
        true
    }

    fn unindex(&mut self, placement: &Placement) {
        if let Some(keys) = self.row_index.get_mut(&placement.row) {
            keys.remove(&placement.key());
            if keys.is_empty() {
                self.row_index.remove(&placement.row);
            }
        }
    }

    /// All placements whose occupied row span intersects the inclusive
    /// range `[start_row, end_row]`.
    ///
    /// Multi-row placements are indexed only by their starting row, so
    /// this is a full scan over placements - fine at the prescribed scale,
    /// and the renderer is the only per-frame caller.
    pub fn placements_in_range(&self, start_row: i64, end_row: i64) -> Vec<&Placement> {
        self.placements
            .values()
            .filter(|p| {
                let (top, bottom) = p.row_span();
                top <= end_row && bottom >= start_row
            })
            .collect()
    }

    /// Remove every placement; stored images survive (delete `d=a`).
    pub fn clear_placements(&mut self) {
        self.placements.clear();
        self.placement_order.clear();
        self.row_index.clear();
    }

    /// Remove everything: images, placements, chunk buffers (delete `d=A`
    /// and the host's clear-all).
    pub fn clear(&mut self) {
        self.images.clear();
        self.lru.clear();
        self.clear_placements();
        self.chunks.clear();
        self.last_chunk_id = None;
        self.total_bytes = 0;
    }

    /// Remove placements covering the given cell. Returns how many went.
    pub fn remove_placements_at(&mut self, col: u32, row: i64) -> usize {
        self.remove_placements_where(|p| p.covers_cell(col, row))
    }

    /// Remove placements whose span intersects the given buffer row.
    pub fn remove_placements_in_row(&mut self, row: i64) -> usize {
        self.remove_placements_where(|p| p.covers_row(row))
    }

    /// Remove placements whose width intersects the given column.
    pub fn remove_placements_in_column(&mut self, col: u32) -> usize {
        self.remove_placements_where(|p| p.covers_column(col))
    }

    /// Remove placements at an exact z-index.
    pub fn remove_placements_with_z(&mut self, z: i32) -> usize {
        self.remove_placements_where(|p| p.z_index == z)
    }

    fn remove_placements_where(&mut self, predicate: impl Fn(&Placement) -> bool) -> usize {
        let doomed: Vec<PlacementKey> = self
            .placements
            .values()
            .filter(|p| predicate(p))
            .map(Placement::key)
            .collect();
        let count = doomed.len();
        for key in doomed {
            self.remove_placement_key(key);
        }
        count
    }

    /// Append a chunk of a multi-part transfer, opening a buffer on first
    /// use. Declared metadata is captured the first time it appears.
    pub fn add_chunk(&mut self, id: u32, cmd: &Command) {
        if !self.chunks.contains_key(&id) && self.chunks.len() >= MAX_OPEN_CHUNK_BUFFERS {
            // Drop the stalest open transfer rather than grow unbounded.
            if let Some(&victim) = self.chunks.keys().next() {
                log::warn!("too many open chunk buffers, dropping transfer {victim}");
                self.chunks.remove(&victim);
            }
        }
        let max_accumulation = self.config.max_image_bytes.saturating_mul(2);
        let buffer = self.chunks.entry(id).or_default();
        if buffer.format.is_none() {
            buffer.format = cmd.format;
        }
        if buffer.width.is_none() {
            buffer.width = cmd.width;
        }
        if buffer.height.is_none() {
            buffer.height = cmd.height;
        }
        if cmd.compression == Compression::Zlib {
            buffer.compression = Compression::Zlib;
        }
        if !cmd.payload.is_empty() {
            buffer.accumulated += cmd.payload.len();
            if buffer.accumulated > max_accumulation {
                log::warn!("chunked transfer {id} exceeded accumulation limit, dropping");
                self.chunks.remove(&id);
                if self.last_chunk_id == Some(id) {
                    self.last_chunk_id = None;
                }
                return;
            }
            buffer.chunks.push(cmd.payload.clone());
        }
        self.last_chunk_id = Some(id);
    }

    /// Close a chunked transfer, returning its buffer for decoding.
    pub fn take_chunks(&mut self, id: u32) -> Option<ChunkBuffer> {
        let buffer = self.chunks.remove(&id);
        if buffer.is_some() && self.last_chunk_id == Some(id) {
            self.last_chunk_id = None;
        }
        buffer
    }

    pub fn has_chunk_buffer(&self, id: u32) -> bool {
        self.chunks.contains_key(&id)
    }

    /// The most recently opened chunk buffer, if any transfer is pending.
    pub fn last_chunk_id(&self) -> Option<u32> {
        self.last_chunk_id
    }
}

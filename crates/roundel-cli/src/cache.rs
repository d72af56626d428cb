//! Content-addressed memoization of segmentation results.
//!
//! Segmentation is the expensive step and depends only on the input bytes,
//! so results are keyed by the SHA-256 of those bytes. Cutouts are held
//! PNG-encoded, and the oldest entries are evicted once the encoded total
//! passes the byte budget. Failures are never cached.

use image::{ImageFormat, RgbaImage};
use roundel_core::{SegmentationError, Segmenter};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Default ceiling on retained encoded bytes (256 MiB).
pub const DEFAULT_BUDGET_BYTES: usize = 256 * 1024 * 1024;

type ContentKey = [u8; 32];

#[derive(Default)]
struct Entries {
    encoded: HashMap<ContentKey, Vec<u8>>,
    /// Insertion order, oldest first.
    order: VecDeque<ContentKey>,
    bytes: usize,
}

impl Entries {
    fn insert(&mut self, key: ContentKey, png: Vec<u8>, budget: usize) {
        if png.len() > budget || self.encoded.contains_key(&key) {
            return;
        }
        while self.bytes + png.len() > budget {
            let Some(oldest) = self.order.pop_front() else { break };
            if let Some(evicted) = self.encoded.remove(&oldest) {
                self.bytes -= evicted.len();
            }
        }
        self.bytes += png.len();
        self.order.push_back(key);
        self.encoded.insert(key, png);
    }
}

/// Wraps a [`Segmenter`] and reuses results for identical inputs.
pub struct SegmentationCache<S> {
    inner: S,
    budget: usize,
    entries: Mutex<Entries>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<S: Segmenter> SegmentationCache<S> {
    pub fn with_budget(inner: S, budget: usize) -> Self {
        Self {
            inner,
            budget,
            entries: Mutex::new(Entries::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.entries().encoded.len()
    }

    /// Encoded bytes currently held; never above the budget.
    pub fn retained_bytes(&self) -> usize {
        self.entries().bytes
    }

    fn entries(&self) -> MutexGuard<'_, Entries> {
        // A panicking writer cannot leave a half-inserted entry behind.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<S: Segmenter> Segmenter for SegmentationCache<S> {
    fn segment(&self, bytes: &[u8]) -> Result<RgbaImage, SegmentationError> {
        let key = content_key(bytes);
        let cached = self.entries().encoded.get(&key).cloned();
        if let Some(png) = cached {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(key = %short_hex(&key), bytes = png.len(), "segmentation cache hit");
            return Ok(image::load_from_memory_with_format(&png, ImageFormat::Png)?.to_rgba8());
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        // Segment without holding the lock so other workers are not serialized.
        let cutout = self.inner.segment(bytes)?;
        match encode_png(&cutout) {
            Ok(png) => self.entries().insert(key, png, self.budget),
            Err(e) => tracing::warn!(key = %short_hex(&key), error = %e, "not caching cutout"),
        }
        Ok(cutout)
    }
}

fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageFormat::Png)?;
    Ok(buf.into_inner())
}

fn content_key(bytes: &[u8]) -> ContentKey {
    let mut key = [0u8; 32];
    key.copy_from_slice(&Sha256::digest(bytes));
    key
}

fn short_hex(key: &ContentKey) -> String {
    key[..6].iter().map(|b| format!("{b:02x}")).collect()
}

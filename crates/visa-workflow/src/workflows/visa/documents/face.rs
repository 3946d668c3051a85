use std::collections::BTreeMap;

use image::GrayImage;
use serde::Serialize;
use tracing::debug;

use super::cascade::{Cascade, IntegralImages, BASE_WINDOW};
use super::DocumentError;

/// Bounding box of a detected face, in source pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FaceRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Number of raw window hits merged into this region.
    pub neighbors: usize,
}

/// Pluggable face detection backend working on a grayscale buffer.
pub trait FaceDetector: Send + Sync {
    fn detect(&self, gray: &GrayImage) -> Vec<FaceRegion>;
}

/// Sliding-window policy. These are fixed policy values, not learned ones.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CascadeParams {
    pub scale_factor: f32,
    pub min_neighbors: usize,
    pub min_size: (u32, u32),
}

impl Default for CascadeParams {
    fn default() -> Self {
        Self {
            scale_factor: 1.1,
            min_neighbors: 5,
            min_size: (30, 30),
        }
    }
}

/// Multi-scale cascade detector with neighbor grouping.
#[derive(Debug, Clone)]
pub struct CascadeFaceDetector {
    cascade: Cascade,
    params: CascadeParams,
}

impl Default for CascadeFaceDetector {
    fn default() -> Self {
        Self::new(CascadeParams::default())
    }
}

impl CascadeFaceDetector {
    pub fn new(params: CascadeParams) -> Self {
        Self {
            cascade: Cascade::frontal(),
            params,
        }
    }

    pub fn params(&self) -> CascadeParams {
        self.params
    }

    /// Window sizes and strides for an image of the given size, smallest
    /// window first. The stride is 2 grid cells up to a 2x scale and 1 cell
    /// beyond, measured on the scaled grid, so larger windows move further
    /// per step in source pixels.
    fn scan_passes(&self, width: u32, height: u32) -> Vec<ScanPass> {
        let (min_width, min_height) = self.params.min_size;
        let scale_factor = self.params.scale_factor.max(1.01);

        let mut scale = (min_width.max(min_height) as f32 / BASE_WINDOW as f32).max(1.0);
        let mut passes = Vec::new();
        loop {
            let side = (BASE_WINDOW as f32 * scale).round() as u32;
            if side > width || side > height {
                break;
            }
            let grid_step = if scale > 2.0 { 1.0 } else { 2.0 };
            passes.push(ScanPass {
                scale,
                side,
                step: ((scale * grid_step).round() as usize).max(1),
            });
            scale *= scale_factor;
        }
        passes
    }

    fn candidate_windows(&self, gray: &GrayImage) -> Vec<Window> {
        let (width, height) = gray.dimensions();
        let integrals = IntegralImages::new(gray);

        let mut hits = Vec::new();
        for ScanPass { scale, side, step } in self.scan_passes(width, height) {
            for y in (0..=height - side).step_by(step) {
                for x in (0..=width - side).step_by(step) {
                    if self.cascade.accepts(&integrals, x, y, scale) {
                        hits.push(Window { x, y, side });
                    }
                }
            }
        }

        hits
    }
}

#[derive(Debug, Clone, Copy)]
struct ScanPass {
    scale: f32,
    side: u32,
    step: usize,
}

impl FaceDetector for CascadeFaceDetector {
    fn detect(&self, gray: &GrayImage) -> Vec<FaceRegion> {
        let hits = self.candidate_windows(gray);
        let regions = group_windows(&hits, self.params.min_neighbors, GROUPING_EPS);
        debug!(
            raw_hits = hits.len(),
            regions = regions.len(),
            "cascade pass complete"
        );
        regions
    }
}

const GROUPING_EPS: f32 = 0.2;

#[derive(Debug, Clone, Copy)]
struct Window {
    x: u32,
    y: u32,
    side: u32,
}

impl Window {
    fn similar(&self, other: &Window, eps: f32) -> bool {
        let delta = eps * self.side.min(other.side) as f32;
        let close = |a: u32, b: u32| (a as f32 - b as f32).abs() <= delta;
        close(self.x, other.x)
            && close(self.y, other.y)
            && close(self.x + self.side, other.x + other.side)
            && close(self.y + self.side, other.y + other.side)
    }
}

fn find_root(parents: &mut [usize], mut node: usize) -> usize {
    while parents[node] != node {
        parents[node] = parents[parents[node]];
        node = parents[node];
    }
    node
}

/// Clusters overlapping hits and keeps clusters with more than
/// `min_neighbors` members, reporting each as its average rectangle.
fn group_windows(hits: &[Window], min_neighbors: usize, eps: f32) -> Vec<FaceRegion> {
    let mut parents: Vec<usize> = (0..hits.len()).collect();
    for i in 0..hits.len() {
        for j in (i + 1)..hits.len() {
            if hits[i].similar(&hits[j], eps) {
                let (a, b) = (find_root(&mut parents, i), find_root(&mut parents, j));
                if a != b {
                    parents[b] = a;
                }
            }
        }
    }

    let mut clusters: BTreeMap<usize, (usize, u64, u64, u64)> = BTreeMap::new();
    for (index, hit) in hits.iter().enumerate() {
        let root = find_root(&mut parents, index);
        let entry = clusters.entry(root).or_insert((0, 0, 0, 0));
        entry.0 += 1;
        entry.1 += u64::from(hit.x);
        entry.2 += u64::from(hit.y);
        entry.3 += u64::from(hit.side);
    }

    let mut regions: Vec<FaceRegion> = clusters
        .into_values()
        .filter(|(count, ..)| *count > min_neighbors)
        .map(|(count, xs, ys, sides)| {
            let n = count as u64;
            let side = ((sides + n / 2) / n) as u32;
            FaceRegion {
                x: ((xs + n / 2) / n) as u32,
                y: ((ys + n / 2) / n) as u32,
                width: side,
                height: side,
                neighbors: count,
            }
        })
        .collect();

    regions.sort_by(|a, b| b.neighbors.cmp(&a.neighbors));
    regions
}

/// Decodes uploaded bytes to grayscale and reports whether any face region
/// was found.
pub struct FacePresence {
    detector: Box<dyn FaceDetector>,
}

impl FacePresence {
    pub fn new(detector: impl FaceDetector + 'static) -> Self {
        Self {
            detector: Box::new(detector),
        }
    }

    pub fn contains_face(&self, bytes: &[u8]) -> Result<bool, DocumentError> {
        let gray = image::load_from_memory(bytes)?.to_luma8();
        let regions = self.detector.detect(&gray);
        Ok(!regions.is_empty())
    }
}

impl Default for FacePresence {
    fn default() -> Self {
        Self::new(CascadeFaceDetector::default())
    }
}

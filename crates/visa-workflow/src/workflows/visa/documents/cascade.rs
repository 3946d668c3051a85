//! Hand-tuned frontal face cascade evaluated over integral images.
//!
//! Rectangles are expressed on a 24x24 base window and scaled with the
//! sliding window. Feature responses are the difference of two rectangle
//! means divided by the window's standard deviation, which keeps the
//! thresholds independent of exposure and contrast.

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::integral_image::{integral_image, integral_squared_image};

pub(crate) const BASE_WINDOW: u32 = 24;

/// Summed-area tables for O(1) window statistics.
pub(crate) struct IntegralImages {
    sum: ImageBuffer<Luma<u64>, Vec<u64>>,
    squared: ImageBuffer<Luma<u64>, Vec<u64>>,
}

impl IntegralImages {
    pub(crate) fn new(gray: &GrayImage) -> Self {
        Self {
            sum: integral_image::<_, u64>(gray),
            squared: integral_squared_image::<_, u64>(gray),
        }
    }

    fn area_sum(table: &ImageBuffer<Luma<u64>, Vec<u64>>, region: PixelRect) -> u64 {
        let PixelRect {
            left,
            top,
            right,
            bottom,
        } = region;
        let at = |x: u32, y: u32| table.get_pixel(x, y)[0];
        (at(right, bottom) + at(left, top)) - (at(left, bottom) + at(right, top))
    }

    fn mean(&self, region: PixelRect) -> f32 {
        Self::area_sum(&self.sum, region) as f32 / region.area() as f32
    }

    fn std_dev(&self, region: PixelRect) -> f32 {
        let n = region.area() as f64;
        let mean = Self::area_sum(&self.sum, region) as f64 / n;
        let mean_sq = Self::area_sum(&self.squared, region) as f64 / n;
        (mean_sq - mean * mean).max(0.0).sqrt() as f32
    }
}

/// Half-open pixel rectangle `[left, right) x [top, bottom)`.
#[derive(Debug, Clone, Copy)]
struct PixelRect {
    left: u32,
    top: u32,
    right: u32,
    bottom: u32,
}

impl PixelRect {
    fn area(self) -> u64 {
        u64::from(self.right - self.left) * u64::from(self.bottom - self.top)
    }
}

/// Rectangle on the base window grid.
#[derive(Debug, Clone, Copy)]
struct UnitRect {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

impl UnitRect {
    const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    fn project(self, origin_x: u32, origin_y: u32, scale: f32) -> PixelRect {
        let edge = |units: u32| (units as f32 * scale).round() as u32;
        let left = origin_x + edge(self.x);
        let top = origin_y + edge(self.y);
        PixelRect {
            left,
            top,
            right: (origin_x + edge(self.x + self.width)).max(left + 1),
            bottom: (origin_y + edge(self.y + self.height)).max(top + 1),
        }
    }
}

/// Passes when `brighter` is lighter than `darker` by at least `threshold`
/// window standard deviations.
#[derive(Debug, Clone, Copy)]
struct Feature {
    brighter: UnitRect,
    darker: UnitRect,
    threshold: f32,
}

#[derive(Debug, Clone)]
struct Stage {
    features: Vec<Feature>,
    required: usize,
}

/// Ordered rejection stages; a window is a candidate only if every stage
/// passes.
#[derive(Debug, Clone)]
pub(crate) struct Cascade {
    min_std_dev: f32,
    stages: Vec<Stage>,
}

const FOREHEAD: UnitRect = UnitRect::new(4, 1, 16, 4);
const EYE_BAND: UnitRect = UnitRect::new(3, 7, 18, 4);
const LEFT_EYE: UnitRect = UnitRect::new(3, 7, 7, 4);
const NOSE_BRIDGE: UnitRect = UnitRect::new(10, 7, 4, 4);
const RIGHT_EYE: UnitRect = UnitRect::new(14, 7, 7, 4);
const CHEEKS: UnitRect = UnitRect::new(3, 12, 18, 4);
const MOUTH: UnitRect = UnitRect::new(7, 18, 10, 3);

impl Cascade {
    pub(crate) fn frontal() -> Self {
        Self {
            min_std_dev: 8.0,
            stages: vec![
                Stage {
                    features: vec![
                        Feature {
                            brighter: FOREHEAD,
                            darker: EYE_BAND,
                            threshold: 0.5,
                        },
                        Feature {
                            brighter: CHEEKS,
                            darker: EYE_BAND,
                            threshold: 0.5,
                        },
                    ],
                    required: 2,
                },
                Stage {
                    features: vec![
                        Feature {
                            brighter: NOSE_BRIDGE,
                            darker: LEFT_EYE,
                            threshold: 0.4,
                        },
                        Feature {
                            brighter: NOSE_BRIDGE,
                            darker: RIGHT_EYE,
                            threshold: 0.4,
                        },
                    ],
                    required: 2,
                },
                Stage {
                    features: vec![Feature {
                        brighter: CHEEKS,
                        darker: MOUTH,
                        threshold: 0.3,
                    }],
                    required: 1,
                },
            ],
        }
    }

    /// Evaluates the window whose top-left corner is `(x, y)` and whose side
    /// is `BASE_WINDOW * scale` pixels.
    pub(crate) fn accepts(&self, integrals: &IntegralImages, x: u32, y: u32, scale: f32) -> bool {
        let window = UnitRect::new(0, 0, BASE_WINDOW, BASE_WINDOW).project(x, y, scale);
        let std_dev = integrals.std_dev(window);
        if std_dev < self.min_std_dev {
            return false;
        }

        self.stages.iter().all(|stage| {
            let passing = stage
                .features
                .iter()
                .filter(|feature| {
                    let brighter = integrals.mean(feature.brighter.project(x, y, scale));
                    let darker = integrals.mean(feature.darker.project(x, y, scale));
                    (brighter - darker) / std_dev >= feature.threshold
                })
                .count();
            passing >= stage.required
        })
    }
}

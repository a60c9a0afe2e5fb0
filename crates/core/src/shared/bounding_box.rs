/// Axis-aligned rectangle in frame pixel coordinates.
///
/// Always satisfies `x1 < x2` and `y1 < y2`; the only constructors check it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BoundingBox {
    x1: i32,
    y1: i32,
    x2: i32,
    y2: i32,
}

impl BoundingBox {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Option<Self> {
        (x1 < x2 && y1 < y2).then_some(Self { x1, y1, x2, y2 })
    }

    /// Maps a box detected on a frame upscaled by `scale` back to the
    /// original frame: each coordinate is truncated, divided, truncated again.
    pub fn from_scaled(x1: f32, y1: f32, x2: f32, y2: f32, scale: f64) -> Option<Self> {
        let map = |v: f32| ((v.trunc() as f64) / scale).trunc() as i32;
        Self::new(map(x1), map(y1), map(x2), map(y2))
    }

    pub fn x1(&self) -> i32 {
        self.x1
    }

    pub fn y1(&self) -> i32 {
        self.y1
    }

    pub fn x2(&self) -> i32 {
        self.x2
    }

    pub fn y2(&self) -> i32 {
        self.y2
    }

    pub fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> i64 {
        self.width() as i64 * self.height() as i64
    }

    pub fn iou(&self, other: &BoundingBox) -> f64 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);
        if ix2 <= ix1 || iy2 <= iy1 {
            return 0.0;
        }

        let inter = (ix2 - ix1) as f64 * (iy2 - iy1) as f64;
        inter / (self.area() as f64 + other.area() as f64 - inter)
    }

    /// Weighted blend toward `new`: `round(old * (1 - alpha) + new * alpha)`.
    ///
    /// Rounding is monotone, so blending two valid boxes stays valid.
    pub fn blend(&self, new: &BoundingBox, alpha: f64) -> BoundingBox {
        let mix = |old: i32, new: i32| (old as f64 * (1.0 - alpha) + new as f64 * alpha).round() as i32;
        BoundingBox {
            x1: mix(self.x1, new.x1),
            y1: mix(self.y1, new.y1),
            x2: mix(self.x2, new.x2),
            y2: mix(self.y2, new.y2),
        }
    }

    /// Part of the box that lies inside a `width` x `height` frame.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<BoundingBox> {
        let w = width.min(i32::MAX as u32) as i32;
        let h = height.min(i32::MAX as u32) as i32;
        Self::new(
            self.x1.clamp(0, w),
            self.y1.clamp(0, h),
            self.x2.clamp(0, w),
            self.y2.clamp(0, h),
        )
    }
}

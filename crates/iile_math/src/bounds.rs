/// Half-open rectangle of pixel coordinates: `[x0, x1) x [y0, y1)`.
///
/// Describes the region of the output image a render covers.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct PixelBounds {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl PixelBounds {
    /// Create bounds from two corners. The max corner is exclusive.
    pub fn new(x0: u32, y0: u32, x1: u32, y1: u32) -> Self {
        Self {
            x0,
            y0,
            x1: x1.max(x0),
            y1: y1.max(y0),
        }
    }

    /// Bounds covering a full `width x height` image.
    pub fn from_resolution(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn width(&self) -> u32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> u32 {
        self.y1 - self.y0
    }

    /// Number of pixels inside the bounds.
    pub fn area(&self) -> usize {
        self.width() as usize * self.height() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.area() == 0
    }

    /// Whether the (signed) pixel coordinate lies inside the bounds.
    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= self.x0 as i64 && x < self.x1 as i64 && y >= self.y0 as i64 && y < self.y1 as i64
    }

    /// Whether `other` lies entirely inside these bounds.
    pub fn encloses(&self, other: &PixelBounds) -> bool {
        other.x0 >= self.x0 && other.y0 >= self.y0 && other.x1 <= self.x1 && other.y1 <= self.y1
    }

    /// Row-major offset of a pixel relative to the bounds origin.
    pub fn offset(&self, x: i64, y: i64) -> Option<usize> {
        if !self.contains(x, y) {
            return None;
        }
        let lx = (x - self.x0 as i64) as usize;
        let ly = (y - self.y0 as i64) as usize;
        Some(ly * self.width() as usize + lx)
    }

    /// Overlap of two bounds (possibly empty).
    pub fn intersect(&self, other: &PixelBounds) -> PixelBounds {
        PixelBounds::new(
            self.x0.max(other.x0),
            self.y0.max(other.y0),
            self.x1.min(other.x1),
            self.y1.min(other.y1),
        )
    }

    /// Iterate over all pixels, x fastest.
    pub fn pixels(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        (self.y0..self.y1).flat_map(move |y| (self.x0..self.x1).map(move |x| (x, y)))
    }
}

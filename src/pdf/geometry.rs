use serde::Deserialize;

/// Axis-aligned box given by its origin corner and size
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SizedBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl SizedBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build from two opposite corners in any order, as PDF rectangles are stored
    pub fn from_corners(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self::new(x0.min(x1), y0.min(y1), (x1 - x0).abs(), (y1 - y0).abs())
    }

    pub fn x0(&self) -> f64 {
        self.x
    }

    pub fn x1(&self) -> f64 {
        self.x + self.width
    }

    pub fn y0(&self) -> f64 {
        self.y
    }

    pub fn y1(&self) -> f64 {
        self.y + self.height
    }

    /// Express this box as dimensionless ratios of `body`.
    ///
    /// Every component is divided by the body *width*, so a single uniform
    /// scale survives the reflow between screen layout and printed page.
    pub fn relative_to(&self, body: &SizedBox) -> SizedBox {
        let scale = 1.0 / body.width;
        SizedBox::new(
            (self.x - body.x) * scale,
            (self.y - body.y) * scale,
            self.width * scale,
            self.height * scale,
        )
    }

    /// Inverse of [`relative_to`](Self::relative_to), placing a relative box on `page`
    /// with the page width as the uniform scale.
    pub fn to_absolute(&self, page: &SizedBox) -> SizedBox {
        let scale = page.width;
        SizedBox::new(
            page.x + self.x * scale,
            page.y + self.y * scale,
            self.width * scale,
            self.height * scale,
        )
    }

    /// Convert from top-left origin (DOM) to bottom-left origin (PDF) on `page`
    pub fn flip_y(&self, page: &SizedBox) -> SizedBox {
        SizedBox::new(self.x, page.y1() - self.y - self.height, self.width, self.height)
    }

    /// `[x0, y0, x1, y1]`, the PDF `/Rect` layout
    pub fn to_rect(&self) -> [f64; 4] {
        [self.x0(), self.y0(), self.x1(), self.y1()]
    }
}

/// A hyperlink and where it sits
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub uri: String,
    pub rect: SizedBox,
}

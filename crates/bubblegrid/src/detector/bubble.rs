/// How a bubble entered the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BubbleSource {
    /// Gradient-voting circle pass.
    Circle,
    /// Contour-shape fallback pass.
    Contour,
    /// Placeholder inserted to complete a row; never observed in the image.
    Synthetic,
}

/// One answer bubble with its fill measurement.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Bubble {
    /// Center `[x, y]` in pixels of the frame the bubble currently lives in.
    pub center: [f64; 2],
    pub radius: f64,
    /// Fraction of interior-mask pixels that are foreground, in `[0, 1]`.
    pub fill_rate: f64,
    /// `fill_rate > sensitivity` at detection time.
    pub filled: bool,
    pub source: BubbleSource,
    /// Originating contour polygon, for contour-pass bubbles.
    #[serde(skip)]
    pub contour: Option<Vec<[f64; 2]>>,
}

impl Bubble {
    pub fn synthetic(center: [f64; 2], radius: f64) -> Self {
        Self {
            center,
            radius,
            fill_rate: 0.0,
            filled: false,
            source: BubbleSource::Synthetic,
            contour: None,
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.source == BubbleSource::Synthetic
    }

    pub fn x(&self) -> f64 {
        self.center[0]
    }

    pub fn y(&self) -> f64 {
        self.center[1]
    }

    /// Fill rate used for decisions: synthetic bubbles never count as ink.
    pub fn effective_fill(&self) -> f64 {
        if self.is_synthetic() {
            0.0
        } else {
            self.fill_rate
        }
    }

    pub(crate) fn distance_to(&self, other: &Bubble) -> f64 {
        let dx = self.center[0] - other.center[0];
        let dy = self.center[1] - other.center[1];
        (dx * dx + dy * dy).sqrt()
    }

    /// Shift into a parent frame (e.g. column crop → full sheet).
    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.center[0] += dx;
        self.center[1] += dy;
        if let Some(contour) = self.contour.as_mut() {
            for p in contour.iter_mut() {
                p[0] += dx;
                p[1] += dy;
            }
        }
    }
}

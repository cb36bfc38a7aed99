use bumpalo::Bump;

/// In-memory floating point image, row-major with channels interleaved
/// (channel-last). A single channel raster is the 2-D `(H, W)` case.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    pub data: Vec<f64>,
}

impl Raster {
    pub fn new(width: usize, height: usize, channels: usize, data: Vec<f64>) -> Self {
        debug_assert_eq!(data.len(), width * height * channels);
        Self {
            width,
            height,
            channels,
            data,
        }
    }

    pub fn filled(width: usize, height: usize, channels: usize, value: f64) -> Self {
        Self::new(width, height, channels, vec![value; width * height * channels])
    }

    /// Assemble a raster from one plane per channel
    pub fn from_planes(width: usize, height: usize, planes: &[Vec<f64>]) -> Self {
        let channels = planes.len();
        if channels == 1 {
            return Self::new(width, height, 1, planes[0].clone());
        }
        let mut data = Vec::with_capacity(width * height * channels);
        for i in 0..width * height {
            for plane in planes {
                data.push(plane[i]);
            }
        }
        Self::new(width, height, channels, data)
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    pub fn is_color(&self) -> bool {
        self.channels == 3
    }

    /// Shape in `(H, W)` or `(H, W, C)` form
    pub fn shape(&self) -> Vec<usize> {
        if self.channels == 1 {
            vec![self.height, self.width]
        } else {
            vec![self.height, self.width, self.channels]
        }
    }

    pub fn same_shape(&self, other: &Raster) -> bool {
        self.width == other.width && self.height == other.height && self.channels == other.channels
    }

    /// Copy one channel out as a contiguous plane
    pub fn plane(&self, channel: usize) -> Vec<f64> {
        if self.channels == 1 {
            return self.data.clone();
        }
        self.data
            .iter()
            .skip(channel)
            .step_by(self.channels)
            .copied()
            .collect()
    }

    pub fn planes(&self) -> Vec<Vec<f64>> {
        (0..self.channels).map(|c| self.plane(c)).collect()
    }

    /// Apply `f` to every plane independently and reassemble
    pub fn map_planes<F>(&self, mut f: F) -> Raster
    where
        F: FnMut(&[f64]) -> Vec<f64>,
    {
        let planes: Vec<Vec<f64>> = self.planes().iter().map(|p| f(p)).collect();
        Raster::from_planes(self.width, self.height, &planes)
    }

    pub fn map<F>(&self, f: F) -> Raster
    where
        F: Fn(f64) -> f64,
    {
        Raster::new(
            self.width,
            self.height,
            self.channels,
            self.data.iter().map(|&x| f(x)).collect(),
        )
    }

    pub fn clipped(&self) -> Raster {
        self.map(|x| x.clamp(0.0, 1.0))
    }

    pub fn min(&self) -> f64 {
        self.data.iter().copied().fold(f64::INFINITY, f64::min)
    }

    pub fn max(&self) -> f64 {
        self.data.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn mean(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.data.iter().sum::<f64>() / self.data.len() as f64
    }

    pub fn median(&self) -> f64 {
        median(&self.data)
    }

    /// Evaluate several percentiles with a single sort
    pub fn percentiles(&self, pcts: &[f64]) -> Vec<f64> {
        percentiles(&self.data, pcts)
    }
}

/// Percentiles with linear interpolation between order statistics.
/// Returns 0.0 for every request when `values` is empty.
pub fn percentiles(values: &[f64], pcts: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return vec![0.0; pcts.len()];
    }

    // Use arena for temporary allocation
    let arena = Bump::new();
    let mut sorted = bumpalo::vec![in &arena];
    sorted.extend_from_slice(values);
    sorted.sort_unstable_by(|a: &f64, b: &f64| a.total_cmp(b));

    let last = sorted.len() - 1;
    pcts.iter()
        .map(|&p| {
            let pos = (p / 100.0).clamp(0.0, 1.0) * last as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            let frac = pos - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        })
        .collect()
}

/// Median; the mean of the two middle values for even counts
pub fn median(values: &[f64]) -> f64 {
    percentiles(values, &[50.0])[0]
}

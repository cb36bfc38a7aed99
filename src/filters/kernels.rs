//! Neighbourhood operations on single planes.
//!
//! All filters treat samples outside the plane by symmetric reflection
//! (`d c b a | a b c d | d c b a`), repeating as often as needed when the
//! window is larger than the plane.

/// Map an out-of-range coordinate back into `0..n` by reflection
pub(crate) fn reflect(i: isize, n: usize) -> usize {
    let n = n as isize;
    let period = 2 * n;
    let m = i.rem_euclid(period);
    if m >= n {
        (period - 1 - m) as usize
    } else {
        m as usize
    }
}

/// Fenwick tree over ranks, counting how many samples of each rank are
/// inside the current window
struct RankCounter {
    tree: Vec<i32>,
    top_bit: usize,
}

impl RankCounter {
    fn new(len: usize) -> Self {
        let mut top_bit = 1;
        while top_bit * 2 <= len {
            top_bit *= 2;
        }
        Self {
            tree: vec![0; len + 1],
            top_bit,
        }
    }

    fn add(&mut self, rank: usize, delta: i32) {
        let mut i = rank + 1;
        while i < self.tree.len() {
            self.tree[i] += delta;
            i += i & i.wrapping_neg();
        }
    }

    /// Smallest rank with more than `k` samples at or below it
    fn kth(&self, k: usize) -> usize {
        let mut pos = 0;
        let mut remaining = k as i32;
        let mut step = self.top_bit;
        while step > 0 {
            let next = pos + step;
            if next < self.tree.len() && self.tree[next] <= remaining {
                pos = next;
                remaining -= self.tree[next];
            }
            step /= 2;
        }
        pos
    }
}

/// Square median filter of side `size`.
///
/// For even sizes the window spans `[-size/2, size/2 - 1]` and the result is
/// the sample of rank `size²/2`. Samples are replaced by their rank so a
/// sliding histogram keeps large windows affordable.
pub fn median_filter(plane: &[f64], width: usize, height: usize, size: usize) -> Vec<f64> {
    if size <= 1 || plane.is_empty() {
        return plane.to_vec();
    }

    let mut order: Vec<usize> = (0..plane.len()).collect();
    order.sort_by(|&a, &b| plane[a].total_cmp(&plane[b]));
    let sorted: Vec<f64> = order.iter().map(|&i| plane[i]).collect();
    let mut ranks = vec![0usize; plane.len()];
    for (rank, &idx) in order.iter().enumerate() {
        ranks[idx] = rank;
    }

    let half = (size / 2) as isize;
    let target = size * size / 2;
    let mut counter = RankCounter::new(plane.len());
    let mut output = vec![0.0; plane.len()];

    for y in 0..height {
        let rows: Vec<usize> = (0..size as isize)
            .map(|j| reflect(y as isize - half + j, height))
            .collect();
        let column = |x: isize| reflect(x, width);

        for i in 0..size as isize {
            let cx = column(i - half);
            for &row in &rows {
                counter.add(ranks[row * width + cx], 1);
            }
        }
        output[y * width] = sorted[counter.kth(target)];

        for x in 1..width as isize {
            let leaving = column(x - 1 - half);
            let entering = column(x - half + size as isize - 1);
            for &row in &rows {
                counter.add(ranks[row * width + leaving], -1);
                counter.add(ranks[row * width + entering], 1);
            }
            output[y * width + x as usize] = sorted[counter.kth(target)];
        }

        // Empty the window before the next row
        let last = width as isize - 1;
        for i in 0..size as isize {
            let cx = column(last - half + i);
            for &row in &rows {
                counter.add(ranks[row * width + cx], -1);
            }
        }
    }

    output
}

/// Square maximum filter of side `size` (odd sizes centre on the sample)
pub fn maximum_filter(plane: &[f64], width: usize, height: usize, size: usize) -> Vec<f64> {
    if size <= 1 || plane.is_empty() {
        return plane.to_vec();
    }
    let lo = -((size / 2) as isize);
    let hi = lo + size as isize;

    // Separable: rows, then columns
    let mut rows = vec![0.0; plane.len()];
    for y in 0..height {
        for x in 0..width {
            rows[y * width + x] = (lo..hi)
                .map(|d| plane[y * width + reflect(x as isize + d, width)])
                .fold(f64::NEG_INFINITY, f64::max);
        }
    }

    let mut output = vec![0.0; plane.len()];
    for y in 0..height {
        for x in 0..width {
            output[y * width + x] = (lo..hi)
                .map(|d| rows[reflect(y as isize + d, height) * width + x])
                .fold(f64::NEG_INFINITY, f64::max);
        }
    }
    output
}

/// Normalized 1-D Gaussian weights truncated at 4 sigma
fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    let radius = (4.0 * sigma + 0.5) as isize;
    let weights: Vec<f64> = (-radius..=radius)
        .map(|x| (-0.5 * (x as f64 / sigma).powi(2)).exp())
        .collect();
    let total: f64 = weights.iter().sum();
    weights.into_iter().map(|w| w / total).collect()
}

/// Separable Gaussian blur; `sigma <= 0` returns the plane unchanged
pub fn gaussian_blur(plane: &[f64], width: usize, height: usize, sigma: f64) -> Vec<f64> {
    if sigma <= 0.0 || plane.is_empty() {
        return plane.to_vec();
    }
    let kernel = gaussian_kernel(sigma);
    let radius = (kernel.len() / 2) as isize;

    let mut columns = vec![0.0; plane.len()];
    for y in 0..height {
        for x in 0..width {
            columns[y * width + x] = kernel
                .iter()
                .enumerate()
                .map(|(k, w)| w * plane[reflect(y as isize + k as isize - radius, height) * width + x])
                .sum();
        }
    }

    let mut output = vec![0.0; plane.len()];
    for y in 0..height {
        for x in 0..width {
            output[y * width + x] = kernel
                .iter()
                .enumerate()
                .map(|(k, w)| w * columns[y * width + reflect(x as isize + k as isize - radius, width)])
                .sum();
        }
    }
    output
}

//! Small signal-processing helpers: angle unwrapping, peak picking and
//! Savitzky-Golay smoothing.

use nalgebra::DMatrix;

/// Wrap an angle difference into `[-180, 180]` degrees.
#[inline]
pub fn wrap_degrees(diff: f64) -> f64 {
    let mut d = diff;
    while d > 180.0 {
        d -= 360.0;
    }
    while d < -180.0 {
        d += 360.0;
    }
    d
}

/// Absolute angular velocity (deg/s) between consecutive angles.
///
/// The first element is always 0 so the output aligns with the input frames.
pub fn angular_velocity(angles: &[f64], dt: f64) -> Vec<f64> {
    if angles.is_empty() {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(angles.len());
    out.push(0.0);
    for w in angles.windows(2) {
        out.push((wrap_degrees(w[1] - w[0]) / dt).abs());
    }
    out
}

/// Peak-picking options.
#[derive(Debug, Clone, Copy, Default)]
pub struct PeakOptions {
    /// Minimum peak height
    pub height: Option<f64>,
    /// Minimum horizontal distance between peaks in samples
    pub distance: Option<usize>,
}

/// Indices of local maxima in `x`, in ascending order.
///
/// A peak is strictly higher than its left neighbour and strictly higher than
/// the first differing sample on its right. Flat tops report their middle
/// sample (rounded down). The first and last samples are never peaks.
pub fn find_peaks(x: &[f64], opts: PeakOptions) -> Vec<usize> {
    let n = x.len();
    let mut peaks = Vec::new();
    if n < 3 {
        return peaks;
    }

    let mut i = 1;
    let i_max = n - 1;
    while i < i_max {
        if x[i - 1] < x[i] {
            let mut ahead = i + 1;
            while ahead < i_max && x[ahead] == x[i] {
                ahead += 1;
            }
            if x[ahead] < x[i] {
                let left = i;
                let right = ahead - 1;
                peaks.push((left + right) / 2);
                i = ahead;
            }
        }
        i += 1;
    }

    if let Some(h) = opts.height {
        peaks.retain(|&p| x[p] >= h);
    }

    if let Some(distance) = opts.distance {
        if distance > 1 && peaks.len() > 1 {
            peaks = select_by_distance(x, &peaks, distance);
        }
    }

    peaks
}

/// Drop peaks closer than `distance` to a higher one, highest first.
fn select_by_distance(x: &[f64], peaks: &[usize], distance: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..peaks.len()).collect();
    order.sort_by(|&a, &b| x[peaks[b]].total_cmp(&x[peaks[a]]).then(b.cmp(&a)));

    let mut keep = vec![true; peaks.len()];
    for &j in &order {
        if !keep[j] {
            continue;
        }
        let mut k = j;
        while k > 0 && peaks[j] - peaks[k - 1] < distance {
            keep[k - 1] = false;
            k -= 1;
        }
        let mut k = j + 1;
        while k < peaks.len() && peaks[k] - peaks[j] < distance {
            keep[k] = false;
            k += 1;
        }
    }

    peaks
        .iter()
        .zip(keep)
        .filter_map(|(&p, k)| k.then_some(p))
        .collect()
}

/// Savitzky-Golay smoothing with polynomial edge interpolation.
///
/// Interior samples use the centered least-squares fit. The first and last
/// half-windows are evaluated on the polynomial fitted to the first and last
/// full window. Returns the input unchanged when the window is even, does not
/// exceed `polyorder`, or is longer than the signal.
pub fn savgol_filter(x: &[f64], window: usize, polyorder: usize) -> Vec<f64> {
    let n = x.len();
    if window % 2 == 0 || window <= polyorder || window > n {
        return x.to_vec();
    }

    let half = (window / 2) as f64;
    let cols = polyorder + 1;
    let design = DMatrix::from_fn(window, cols, |r, c| (r as f64 - half).powi(c as i32));
    let normal = design.transpose() * &design;
    let Some(inv) = normal.try_inverse() else {
        return x.to_vec();
    };
    // Rows map window samples to polynomial coefficients.
    let projector = inv * design.transpose();

    let fit = |start: usize| -> Vec<f64> {
        (0..cols)
            .map(|c| (0..window).map(|r| projector[(c, r)] * x[start + r]).sum())
            .collect()
    };
    let eval = |coeffs: &[f64], t: f64| -> f64 {
        coeffs.iter().rev().fold(0.0, |acc, &c| acc * t + c)
    };

    let mut out = vec![0.0; n];
    let w = window / 2;
    for (i, slot) in out.iter_mut().enumerate().take(n - w).skip(w) {
        let start = i - w;
        let coeffs = fit(start);
        *slot = coeffs[0];
    }

    let head = fit(0);
    for (i, slot) in out.iter_mut().enumerate().take(w) {
        *slot = eval(&head, i as f64 - half);
    }
    let tail_start = n - window;
    let tail = fit(tail_start);
    for (i, slot) in out.iter_mut().enumerate().skip(n - w) {
        *slot = eval(&tail, (i - tail_start) as f64 - half);
    }

    out
}

/// Arithmetic mean, or `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

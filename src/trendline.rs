//! Least-squares trendlines through pivot points

use serde::{Deserialize, Serialize};

use crate::pivots::Pivot;

/// `value = slope * index + intercept`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trendline {
    pub slope: f64,
    pub intercept: f64,
}

/// Intersection of two trendlines
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Convergence {
    pub index: f64,
    pub price: f64,
}

impl Trendline {
    /// Ordinary least squares through pivots. `None` with fewer than two
    /// points, when every point shares one index, or on non-finite input.
    pub fn fit(points: &[Pivot]) -> Option<Self> {
        Self::fit_xy(points.iter().map(|p| (p.index as f64, p.value)))
    }

    /// OLS over arbitrary `(x, y)` pairs
    pub fn fit_xy<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
        I::IntoIter: Clone,
    {
        let iter = points.into_iter();
        let (mut n, mut sum_x, mut sum_y) = (0usize, 0.0, 0.0);
        for (x, y) in iter.clone() {
            if !x.is_finite() || !y.is_finite() {
                return None;
            }
            n += 1;
            sum_x += x;
            sum_y += y;
        }
        if n < 2 {
            return None;
        }

        let mean_x = sum_x / n as f64;
        let mean_y = sum_y / n as f64;
        let (mut sxx, mut sxy) = (0.0, 0.0);
        for (x, y) in iter {
            let dx = x - mean_x;
            sxx += dx * dx;
            sxy += dx * (y - mean_y);
        }
        if sxx.abs() < f64::EPSILON {
            return None;
        }

        let slope = sxy / sxx;
        Some(Self {
            slope,
            intercept: mean_y - slope * mean_x,
        })
    }

    #[inline]
    pub fn value_at(&self, index: f64) -> f64 {
        self.slope * index + self.intercept
    }

    /// Slope relative to a reference price (fraction of price per bar)
    pub fn normalized_slope(&self, reference: f64) -> f64 {
        if reference.abs() > f64::EPSILON {
            self.slope / reference
        } else {
            0.0
        }
    }

    /// Intersection with `other`, `None` for parallel lines
    pub fn convergence(&self, other: &Trendline) -> Option<Convergence> {
        let ds = self.slope - other.slope;
        if ds.abs() < f64::EPSILON {
            return None;
        }
        let index = (other.intercept - self.intercept) / ds;
        let price = self.value_at(index);
        (index.is_finite() && price.is_finite()).then_some(Convergence { index, price })
    }

    /// Coefficient of determination against the points the line was fitted to
    pub fn r_squared(&self, points: &[Pivot]) -> Option<f64> {
        if points.len() < 2 {
            return None;
        }
        let mean = points.iter().map(|p| p.value).sum::<f64>() / points.len() as f64;
        let ss_tot: f64 = points.iter().map(|p| (p.value - mean).powi(2)).sum();
        let ss_res: f64 = points
            .iter()
            .map(|p| (p.value - self.value_at(p.index as f64)).powi(2))
            .sum();
        if ss_tot < f64::EPSILON {
            // All points equal: a flat line fits perfectly
            return Some(if ss_res < f64::EPSILON { 1.0 } else { 0.0 });
        }
        Some((1.0 - ss_res / ss_tot).clamp(0.0, 1.0))
    }

    /// Number of points within `tolerance` (relative) of the line
    pub fn touches(&self, points: &[Pivot], tolerance: f64) -> usize {
        points
            .iter()
            .filter(|p| {
                let line = self.value_at(p.index as f64);
                line.abs() > f64::EPSILON && ((p.value - line) / line).abs() <= tolerance
            })
            .count()
    }
}

/// Free-function form of [`Trendline::fit`]
pub fn fit(points: &[Pivot]) -> Option<Trendline> {
    Trendline::fit(points)
}

/// Free-function form of [`Trendline::convergence`]
pub fn convergence(a: &Trendline, b: &Trendline) -> Option<Convergence> {
    a.convergence(b)
}

//! Composite Simpson quadrature.
//!
//! Distance integrals over $1/E(z)$ and the enclosed-luminosity / enclosed-mass
//! integrals of profiles are smooth on their domains, so a fixed-order
//! composite Simpson rule converges quickly and keeps every evaluation
//! deterministic (identical inputs give bit-identical outputs).

/// Number of intervals used when the caller has no better choice.
pub const DEFAULT_INTERVALS: usize = 2000;

/// Integrate `f` over `[a, b]` with the composite Simpson rule.
///
/// `intervals` is rounded up to the next even number (minimum 2). An empty
/// interval (`a == b`) integrates to zero.
pub fn simpson<F: Fn(f64) -> f64>(f: F, a: f64, b: f64, intervals: usize) -> f64 {
    if a == b {
        return 0.0;
    }
    let n = even_intervals(intervals);
    let h = (b - a) / n as f64;

    let mut sum = f(a) + f(b);
    for i in 1..n {
        let weight = if i % 2 == 1 { 4.0 } else { 2.0 };
        sum += weight * f(a + i as f64 * h);
    }
    sum * h / 3.0
}

/// Integrate `f(u, v)` over the rectangle `[u0, u1] × [v0, v1]` with nested
/// Simpson rules.
pub fn simpson_2d<F: Fn(f64, f64) -> f64>(
    f: F,
    (u0, u1): (f64, f64),
    (v0, v1): (f64, f64),
    intervals: usize,
) -> f64 {
    simpson(|u| simpson(|v| f(u, v), v0, v1, intervals), u0, u1, intervals)
}

fn even_intervals(intervals: usize) -> usize {
    let n = intervals.max(2);
    if n % 2 == 1 {
        n + 1
    } else {
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_simpson_is_exact_for_cubics() {
        let integral = simpson(|x| x * x * x - 2.0 * x + 1.0, 0.0, 2.0, 2);
        assert_relative_eq!(integral, 2.0, max_relative = 1e-12);
    }

    #[test]
    fn test_simpson_empty_interval() {
        assert_eq!(simpson(|x| x.exp(), 1.5, 1.5, 10), 0.0);
    }

    #[test]
    fn test_odd_interval_count_is_rounded_up() {
        let odd = simpson(f64::sin, 0.0, std::f64::consts::PI, 99);
        let even = simpson(f64::sin, 0.0, std::f64::consts::PI, 100);
        assert_eq!(odd, even);
    }

    #[test]
    fn test_simpson_2d_unit_disk_area() {
        // Area of the unit disk in polar coordinates: ∫∫ r dr dθ = π.
        let area = simpson_2d(|r, _theta| r, (0.0, 1.0), (0.0, 2.0 * std::f64::consts::PI), 20);
        assert_relative_eq!(area, std::f64::consts::PI, max_relative = 1e-10);
    }
}

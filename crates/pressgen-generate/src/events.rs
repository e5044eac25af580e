//! Timestamps distributed along a density curve.
//!
//! A run asks for `total` instants inside a window and gets them back in
//! ascending order, spread according to a [`Shape`] and [`Trend`]. Members
//! sign up along an ease-in curve; recipient activity decays after a send.

use chrono::{Duration, NaiveDateTime};
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

const CURVE_STEPS: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Shape {
    Flat,
    Linear,
    EaseIn,
    EaseOut,
    Exponential,
}

/// Positive trends grow towards the end of the window, negative ones decay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Trend {
    Positive,
    Negative,
}

#[derive(Debug, Clone, Copy)]
pub struct EventSpec {
    pub shape: Shape,
    pub trend: Trend,
    pub total: usize,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Shape {
    fn density(self, u: f64) -> f64 {
        match self {
            Shape::Flat => 1.0,
            Shape::Linear => u,
            Shape::EaseIn => u * u,
            Shape::EaseOut => 1.0 - (1.0 - u) * (1.0 - u),
            Shape::Exponential => (4.0 * u).exp() - 1.0,
        }
    }
}

/// Exactly `spec.total` instants in `[start, end]`, ascending.
///
/// Uses jittered stratified sampling through the inverse of the cumulative
/// density, so the output is sorted by construction. An inverted window
/// collapses onto `start`.
pub fn generate_events(spec: &EventSpec, rng: &mut dyn RngCore) -> Vec<NaiveDateTime> {
    if spec.total == 0 {
        return Vec::new();
    }
    let span = (spec.end - spec.start).num_milliseconds();
    if span <= 0 {
        return vec![spec.start; spec.total];
    }

    let cdf = cumulative(spec.shape, spec.trend);
    let total = spec.total as f64;
    (0..spec.total)
        .map(|slot| {
            let p = (slot as f64 + rng.random::<f64>()) / total;
            let offset = (span as f64 * invert(&cdf, p)).round() as i64;
            spec.start + Duration::milliseconds(offset.clamp(0, span))
        })
        .collect()
}

fn cumulative(shape: Shape, trend: Trend) -> Vec<f64> {
    let density = |u: f64| match trend {
        Trend::Positive => shape.density(u),
        Trend::Negative => shape.density(1.0 - u),
    };

    let step = 1.0 / CURVE_STEPS as f64;
    let mut cdf = Vec::with_capacity(CURVE_STEPS + 1);
    cdf.push(0.0);
    let mut area = 0.0;
    for k in 1..=CURVE_STEPS {
        let left = density((k - 1) as f64 * step);
        let right = density(k as f64 * step);
        area += (left + right) * 0.5 * step;
        cdf.push(area);
    }

    if area <= 0.0 {
        return (0..=CURVE_STEPS).map(|k| k as f64 * step).collect();
    }
    cdf.iter_mut().for_each(|value| *value /= area);
    cdf
}

/// Position in `[0, 1]` where the cumulative density reaches `p`.
fn invert(cdf: &[f64], p: f64) -> f64 {
    let k = cdf.partition_point(|&value| value < p).clamp(1, CURVE_STEPS);
    let (low, high) = (cdf[k - 1], cdf[k]);
    let fraction = if high > low {
        ((p - low) / (high - low)).clamp(0.0, 1.0)
    } else {
        0.0
    };
    ((k - 1) as f64 + fraction) / CURVE_STEPS as f64
}

/// Ascending events handed out earliest first.
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    descending: Vec<NaiveDateTime>,
}

impl EventQueue {
    pub fn new(mut events: Vec<NaiveDateTime>) -> Self {
        events.sort_unstable_by(|a, b| b.cmp(a));
        Self { descending: events }
    }

    pub fn pop_earliest(&mut self) -> Option<NaiveDateTime> {
        self.descending.pop()
    }

    pub fn len(&self) -> usize {
        self.descending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .expect("date")
    }

    fn spec(shape: Shape, trend: Trend, total: usize) -> EventSpec {
        EventSpec {
            shape,
            trend,
            total,
            start: start(),
            end: start() + Duration::days(10),
        }
    }

    fn first_half_share(events: &[NaiveDateTime]) -> f64 {
        let middle = start() + Duration::days(5);
        events.iter().filter(|at| **at < middle).count() as f64 / events.len() as f64
    }

    #[test]
    fn returns_requested_count_in_window_sorted() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for shape in [
            Shape::Flat,
            Shape::Linear,
            Shape::EaseIn,
            Shape::EaseOut,
            Shape::Exponential,
        ] {
            for trend in [Trend::Positive, Trend::Negative] {
                let spec = spec(shape, trend, 500);
                let events = generate_events(&spec, &mut rng);
                assert_eq!(events.len(), 500);
                assert!(events.iter().all(|at| *at >= spec.start && *at <= spec.end));
                assert!(events.windows(2).all(|pair| pair[0] <= pair[1]));
            }
        }
    }

    #[test]
    fn zero_total_is_empty() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        assert!(generate_events(&spec(Shape::Flat, Trend::Positive, 0), &mut rng).is_empty());
    }

    #[test]
    fn inverted_window_collapses_to_start() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut spec = spec(Shape::EaseOut, Trend::Negative, 4);
        spec.end = spec.start - Duration::days(1);
        assert_eq!(generate_events(&spec, &mut rng), vec![spec.start; 4]);
    }

    #[test]
    fn positive_trend_leans_late_and_negative_leans_early() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let rising = generate_events(&spec(Shape::EaseIn, Trend::Positive, 2000), &mut rng);
        let decaying = generate_events(&spec(Shape::EaseOut, Trend::Negative, 2000), &mut rng);
        assert!(first_half_share(&rising) < 0.2);
        assert!(first_half_share(&decaying) > 0.65);
    }

    #[test]
    fn flat_shape_is_even() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let events = generate_events(&spec(Shape::Flat, Trend::Positive, 2000), &mut rng);
        let share = first_half_share(&events);
        assert!((share - 0.5).abs() < 0.01);
    }

    #[test]
    fn queue_hands_out_earliest_first() {
        let t = start();
        let mut queue = EventQueue::new(vec![t + Duration::hours(2), t, t + Duration::hours(1)]);
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.pop_earliest(), Some(t));
        assert_eq!(queue.pop_earliest(), Some(t + Duration::hours(1)));
        assert_eq!(queue.pop_earliest(), Some(t + Duration::hours(2)));
        assert!(queue.pop_earliest().is_none());
    }
}

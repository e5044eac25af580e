use chrono::{Duration, NaiveDateTime};
use rand::seq::IndexedRandom;
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Seed holder for one run.
///
/// Every table gets a generator freshly seeded from the run seed, so adding or
/// removing tables from a run does not shift what any other table produces.
#[derive(Debug, Clone, Copy)]
pub struct RunRandom {
    seed: u64,
    explicit: bool,
}

impl RunRandom {
    /// Draws a fresh seed when none is given.
    pub fn new(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self {
                seed,
                explicit: true,
            },
            None => Self {
                seed: rand::rng().random(),
                explicit: false,
            },
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn is_explicit(&self) -> bool {
        self.explicit
    }

    /// A generator restarted from the run seed.
    ///
    /// Every table gets the same stream, so object ids are unique within a
    /// table but may repeat across tables.
    pub fn table_rng(&self) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.seed)
    }
}

/// 24 hex characters, the platform's object id format.
pub fn object_id(rng: &mut dyn RngCore) -> String {
    let bytes: [u8; 12] = rng.random();
    hex::encode(bytes)
}

pub fn uuid(rng: &mut dyn RngCore) -> String {
    let bytes: [u8; 16] = rng.random();
    uuid::Builder::from_random_bytes(bytes)
        .into_uuid()
        .to_string()
}

pub fn pick<'a, T>(values: &'a [T], rng: &mut dyn RngCore) -> Option<&'a T> {
    values.choose(rng)
}

/// Uniform instant in `[start, end]`; `start` when the window is empty or inverted.
pub fn between(start: NaiveDateTime, end: NaiveDateTime, rng: &mut dyn RngCore) -> NaiveDateTime {
    let span = (end - start).num_milliseconds();
    if span <= 0 {
        return start;
    }
    start + Duration::milliseconds(rng.random_range(0..=span))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn every_table_rng_repeats_the_run_stream() {
        let random = RunRandom::new(Some(42));
        let mut first = random.table_rng();
        let mut second = random.table_rng();
        assert_eq!(object_id(&mut first), object_id(&mut second));
        assert_eq!(uuid(&mut first), uuid(&mut second));
    }

    #[test]
    fn object_ids_are_hex() {
        let mut rng = RunRandom::new(Some(7)).table_rng();
        let id = object_id(&mut rng);
        assert_eq!(id.len(), 24);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn uuids_are_version_four() {
        let mut rng = RunRandom::new(Some(7)).table_rng();
        let value = uuid::Uuid::parse_str(&uuid(&mut rng)).expect("valid uuid");
        assert_eq!(value.get_version_num(), 4);
    }

    #[test]
    fn between_stays_in_window() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .expect("date");
        let end = start + Duration::hours(3);
        let mut rng = RunRandom::new(Some(1)).table_rng();
        for _ in 0..200 {
            let at = between(start, end, &mut rng);
            assert!(at >= start && at <= end);
        }
        assert_eq!(between(end, start, &mut rng), end);
    }
}

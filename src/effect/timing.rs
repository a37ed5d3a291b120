use std::{ops::RangeInclusive, time::Duration};

use rand::{rngs::StdRng, Rng, SeedableRng};

/// Nominal time between two color flips of one light
pub const NOMINAL_PERIOD: Duration = Duration::from_secs(2);
/// How far a single period may stray from the nominal one
const PERIOD_JITTER: Duration = Duration::from_millis(500);

pub const MIN_OFFSET: Duration = Duration::from_millis(100);
pub const MAX_OFFSET: Duration = Duration::from_millis(2000);
pub const MIN_PERIOD: Duration = NOMINAL_PERIOD.saturating_sub(PERIOD_JITTER);
pub const MAX_PERIOD: Duration = NOMINAL_PERIOD.saturating_add(PERIOD_JITTER);

/// The random ranges each light draws its phase offset and flip periods
/// from. Both are uniform.
#[derive(Clone, Debug, PartialEq)]
pub struct Timing {
    pub offset: RangeInclusive<Duration>,
    pub period: RangeInclusive<Duration>,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            offset: MIN_OFFSET..=MAX_OFFSET,
            period: MIN_PERIOD..=MAX_PERIOD,
        }
    }
}

impl Timing {
    /// Delay between effect start and a light's first flip
    pub fn sample_offset<R: Rng>(&self, rng: &mut R) -> Duration {
        sample(&self.offset, rng)
    }

    /// Delay between two flips
    pub fn sample_period<R: Rng>(&self, rng: &mut R) -> Duration {
        sample(&self.period, rng)
    }
}

fn sample<R: Rng>(range: &RangeInclusive<Duration>, rng: &mut R) -> Duration {
    let (low, high) = (range.start().as_secs_f64(), range.end().as_secs_f64());
    if high <= low {
        return *range.start();
    }
    Duration::from_secs_f64(rng.gen_range(low..=high))
}

/// Hands every light its own generator. With a seed the whole run is
/// reproducible.
pub struct RngSource {
    master: StdRng,
}

impl RngSource {
    pub fn new(seed: Option<u64>) -> Self {
        let master = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { master }
    }

    pub fn next_rng(&mut self) -> StdRng {
        StdRng::seed_from_u64(self.master.gen())
    }
}

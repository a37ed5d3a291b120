use std::{sync::Arc, time::Duration};

use log::{debug, warn};
use rand::rngs::StdRng;
use serde::Serialize;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use super::{command_light, timing::Timing};
use crate::{
    bridge::Bridge,
    lights::{LightCommand, LightId, Palette},
};

/// What one light's task did during the effect
#[derive(Clone, Debug, Serialize)]
pub struct LightRun {
    pub light: LightId,
    pub flips: usize,
    pub failures: usize,
    pub last_error: Option<String>,
}

/// Alternates one light between the palette colors until the shared
/// deadline. Owns its light and its random generator.
pub(crate) struct Worker<B: Bridge> {
    pub bridge: Arc<B>,
    pub light: LightId,
    pub palette: Palette,
    pub brightness: Option<f32>,
    pub transition: Option<Duration>,
    pub timing: Timing,
    pub rng: StdRng,
    pub effect_start: Instant,
    pub deadline: Instant,
    pub request_timeout: Duration,
    pub stop: CancellationToken,
}

impl<B: Bridge> Worker<B> {
    pub async fn run(mut self) -> LightRun {
        let mut run = LightRun {
            light: self.light.clone(),
            flips: 0,
            failures: 0,
            last_error: None,
        };

        // Every light already shows blue from the synchronized start
        let mut showing_blue = true;
        let mut next_flip = self.effect_start + self.timing.sample_offset(&mut self.rng);
        debug!(
            "Light {}: first flip {:?} after start",
            self.light,
            next_flip - self.effect_start
        );

        loop {
            if !self.wait_until(next_flip.min(self.deadline)).await {
                break;
            }
            if Instant::now() >= self.deadline {
                break;
            }

            let color = if showing_blue {
                self.palette.yellow
            } else {
                self.palette.blue
            };
            let command = LightCommand::show(color, self.brightness, self.transition);

            // A request still in flight at the deadline is abandoned
            let result = tokio::select! {
                result = command_light(
                    self.bridge.as_ref(),
                    &self.light,
                    &command,
                    self.request_timeout,
                    "flip",
                ) => result,
                _ = sleep_until(self.deadline) => break,
                _ = self.stop.cancelled() => break,
            };

            match result {
                Ok(()) => run.flips += 1,
                Err(e) => {
                    warn!("{}", e);
                    run.failures += 1;
                    run.last_error = Some(e.to_string());
                }
            }

            showing_blue = !showing_blue;
            let period = self.timing.sample_period(&mut self.rng);
            next_flip = next_flip_after(next_flip, period, Instant::now());
        }

        debug!(
            "Light {}: done after {} flips ({} failed)",
            self.light, run.flips, run.failures
        );
        run
    }

    /// Sleep until `at`. False when the effect was stopped first.
    async fn wait_until(&self, at: Instant) -> bool {
        tokio::select! {
            _ = self.stop.cancelled() => false,
            _ = sleep_until(at) => true,
        }
    }
}

/// Flips stay on their own schedule unless a slow request overran it, then
/// the next one is a full period from now. Never two flips back to back.
fn next_flip_after(scheduled: Instant, period: Duration, now: Instant) -> Instant {
    let next = scheduled + period;
    if next < now {
        now + period
    } else {
        next
    }
}

use std::{future::Future, sync::Arc, time::Duration};

use chrono::{DateTime, Local};
use futures::future::join_all;
use log::{error, info, warn};
use serde::Serialize;
use tokio::{
    task::JoinSet,
    time::{timeout, timeout_at, Instant},
};
use tokio_util::sync::CancellationToken;

use crate::{
    bridge::Bridge,
    error::{BridgeError, EffectError, LightError},
    lights::{GroupTarget, LightCommand, LightId, LightState, Palette},
};

pub mod restore;
pub mod timing;
mod worker;


pub use restore::{RestoreMode, RestoreReport};
pub use timing::{RngSource, Timing};
pub use worker::LightRun;

use restore::Restorer;
use worker::Worker;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_JOIN_GRACE: Duration = Duration::from_secs(5);

#[derive(Clone, Debug)]
pub struct EffectConfig {
    /// How long the lights alternate
    pub duration: Duration,
    /// Percentage, 0 to 100. None keeps each light's brightness.
    pub brightness: Option<f32>,
    pub timing: Timing,
    /// Bound on every single bridge call
    pub request_timeout: Duration,
    /// How long past the deadline light tasks get before they are stopped
    pub join_grace: Duration,
    pub transition: Option<Duration>,
    /// Fixes every light's offset and periods
    pub seed: Option<u64>,
}

impl Default for EffectConfig {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(30),
            brightness: Some(100.0),
            timing: Timing::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            join_grace: DEFAULT_JOIN_GRACE,
            transition: None,
            seed: None,
        }
    }
}

/// Outcome of one effect run, printed by the CLI
#[derive(Clone, Debug, Serialize)]
pub struct EffectReport {
    pub group_id: String,
    pub group_name: String,
    pub started_at: DateTime<Local>,
    pub duration_secs: f64,
    /// Time from the synchronized start until every light task was joined
    pub elapsed_secs: f64,
    pub interrupted: bool,
    pub lights_controlled: Vec<LightId>,
    pub unreachable_lights: Vec<LightId>,
    pub runs: Vec<LightRun>,
    pub restore: RestoreReport,
}

impl EffectReport {
    pub fn success(&self) -> bool {
        !self.interrupted
    }
}

/// Runs the blue/yellow effect on one group of lights and puts every light
/// back the way it found it.
///
/// Nothing is changed on any light until its state has been captured. Once
/// the first command went out, restoration runs no matter how the
/// alternation ended.
pub struct Orchestrator<B: Bridge> {
    bridge: Arc<B>,
    config: EffectConfig,
}

impl<B: Bridge> Orchestrator<B> {
    pub fn new(bridge: Arc<B>, config: EffectConfig) -> Self {
        Self { bridge, config }
    }

    pub async fn run(
        &self,
        target: &str,
        cancel: CancellationToken,
    ) -> Result<EffectReport, EffectError> {
        let group = self.discover(target).await?;
        let states = self.capture(&group).await?;
        let (captured, unreachable) = select_reachable(&group, &states);

        if captured.is_empty() {
            return Err(EffectError::NoReachableLights {
                group: group.name.clone(),
                total: group.lights.len(),
            });
        }

        if cancel.is_cancelled() {
            warn!("Interrupted before the start, no light was changed");
            return Err(EffectError::Interrupted {
                group: group.name.clone(),
            });
        }

        info!(
            "Starting effect on {} lights of '{}' for {:?}{}",
            captured.len(),
            group.name,
            self.config.duration,
            self.config
                .brightness
                .map(|b| format!(" at {}% brightness", b))
                .unwrap_or_default()
        );

        let started_at = Local::now();
        let palette = Palette::for_space(self.bridge.color_space());

        self.start(&group, &captured, &palette).await;
        let effect_start = Instant::now();

        let runs = self
            .alternate(&captured, &palette, effect_start, &cancel)
            .await;
        let elapsed = effect_start.elapsed();
        let interrupted = cancel.is_cancelled();
        if interrupted {
            warn!("Effect was interrupted, restoring lights");
        }

        let restore = Restorer {
            bridge: self.bridge.as_ref(),
            group: &group,
            captured: &captured,
            transition: self.config.transition,
            request_timeout: self.config.request_timeout,
        }
        .run()
        .await;

        if !interrupted {
            info!("Effect completed on '{}'", group.name);
        }

        Ok(EffectReport {
            group_id: group.id.clone(),
            group_name: group.name.clone(),
            started_at,
            duration_secs: self.config.duration.as_secs_f64(),
            elapsed_secs: elapsed.as_secs_f64(),
            interrupted,
            lights_controlled: captured.iter().map(|light| light.id.clone()).collect(),
            unreachable_lights: unreachable,
            runs,
            restore,
        })
    }

    async fn discover(&self, target: &str) -> Result<GroupTarget, EffectError> {
        match timed(self.config.request_timeout, self.bridge.resolve_group(target)).await {
            Ok(Some(group)) => {
                info!(
                    "{} '{}' ({}) has {} lights",
                    group.kind,
                    group.name,
                    group.id,
                    group.lights.len()
                );
                Ok(group)
            }
            Ok(None) => {
                error!("Group '{}' not found", target);
                Err(EffectError::Discovery {
                    target: target.to_string(),
                    source: None,
                })
            }
            Err(e) => {
                error!("Could not resolve group '{}': {}", target, e);
                Err(EffectError::Discovery {
                    target: target.to_string(),
                    source: Some(e),
                })
            }
        }
    }

    /// One batched read of every member. If that fails, each light is read
    /// on its own and only a total failure is fatal.
    async fn capture(&self, group: &GroupTarget) -> Result<Vec<LightState>, EffectError> {
        if group.lights.is_empty() {
            return Ok(Vec::new());
        }

        let limit = self.config.request_timeout;
        let source = match timed(limit, self.bridge.get_states(&group.lights)).await {
            Ok(states) => return Ok(states),
            Err(e) => e,
        };

        warn!(
            "Batched state read for '{}' failed ({}), reading lights one by one",
            group.name, source
        );
        let results = join_all(
            group
                .lights
                .iter()
                .map(|id| timed(limit, self.bridge.get_light_state(id))),
        )
        .await;

        let states: Vec<LightState> = group
            .lights
            .iter()
            .zip(results)
            .filter_map(|(id, result)| match result {
                Ok(state) => Some(state),
                Err(e) => {
                    warn!("Light {}: could not read state: {}", id, e);
                    None
                }
            })
            .collect();

        if states.is_empty() {
            error!("Could not read any light state of '{}'", group.name);
            return Err(EffectError::Fetch {
                group: group.name.clone(),
                source,
            });
        }
        Ok(states)
    }

    /// Everything blue at once, so the lights start in sync
    async fn start(&self, group: &GroupTarget, captured: &[LightState], palette: &Palette) {
        let ids: Vec<LightId> = captured.iter().map(|light| light.id.clone()).collect();
        let command =
            LightCommand::show(palette.blue, self.config.brightness, self.config.transition);

        let limit = self.config.request_timeout;
        match timed(limit, self.bridge.set_group_state(group, &ids, &command)).await {
            Ok(()) => info!("Group '{}': {} lights set to blue", group.name, ids.len()),
            Err(e) => {
                warn!(
                    "Batched start on '{}' failed ({}), setting lights one by one",
                    group.name, e
                );
                let results = join_all(ids.iter().map(|id| {
                    command_light(self.bridge.as_ref(), id, &command, limit, "start")
                }))
                .await;
                for error in results.into_iter().filter_map(Result::err) {
                    warn!("{}", error);
                }
            }
        }
    }

    /// One task per light, joined with a bound. Tasks still running after
    /// `duration + join_grace` are told to stop, and aborted if they do not.
    async fn alternate(
        &self,
        captured: &[LightState],
        palette: &Palette,
        effect_start: Instant,
        cancel: &CancellationToken,
    ) -> Vec<LightRun> {
        let stop = cancel.child_token();
        let deadline = effect_start + self.config.duration;
        let mut rngs = RngSource::new(self.config.seed);

        let mut tasks = JoinSet::new();
        for light in captured {
            let worker = Worker {
                bridge: self.bridge.clone(),
                light: light.id.clone(),
                palette: *palette,
                brightness: self.config.brightness,
                transition: self.config.transition,
                timing: self.config.timing.clone(),
                rng: rngs.next_rng(),
                effect_start,
                deadline,
                request_timeout: self.config.request_timeout,
                stop: stop.clone(),
            };
            tasks.spawn(worker.run());
        }
        info!("Waiting for {} light tasks to complete...", tasks.len());

        let mut runs = Vec::with_capacity(captured.len());
        let join_deadline = deadline + self.config.join_grace;
        if timeout_at(join_deadline, drain(&mut tasks, &mut runs))
            .await
            .is_err()
        {
            warn!(
                "{} light tasks still running after the deadline, stopping them",
                tasks.len()
            );
            stop.cancel();

            if timeout(self.config.join_grace, drain(&mut tasks, &mut runs))
                .await
                .is_err()
            {
                error!("{} light tasks did not stop, aborting them", tasks.len());
                tasks.abort_all();
                drain(&mut tasks, &mut runs).await;
            }
        }
        stop.cancel();

        runs
    }
}

async fn drain(tasks: &mut JoinSet<LightRun>, runs: &mut Vec<LightRun>) {
    while let Some(result) = tasks.join_next().await {
        match result {
            Ok(run) => runs.push(run),
            Err(e) if e.is_cancelled() => warn!("Light task aborted"),
            Err(e) => error!("Light task panicked: {}", e),
        }
    }
}

/// Split captured states into the lights to drive and the ids left out,
/// in group order. Members without a captured state are left out too.
fn select_reachable(group: &GroupTarget, states: &[LightState]) -> (Vec<LightState>, Vec<LightId>) {
    let mut captured = Vec::new();
    let mut unreachable = Vec::new();

    for id in &group.lights {
        match states.iter().find(|state| &state.id == id) {
            Some(state) if state.reachable => {
                info!("Light {} ({}) is ready", id, state.label());
                captured.push(state.clone());
            }
            Some(state) => {
                warn!("Light {} ({}) is unreachable, skipping", id, state.label());
                unreachable.push(id.clone());
            }
            None => {
                warn!("Light {}: no state captured, skipping", id);
                unreachable.push(id.clone());
            }
        }
    }

    (captured, unreachable)
}

/// Bound a bridge call by `limit`
pub(crate) async fn timed<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, BridgeError>>,
) -> Result<T, BridgeError> {
    timeout(limit, call)
        .await
        .unwrap_or_else(|_| Err(BridgeError::Timeout(limit)))
}

/// Send one command to one light, as a per-light error on failure
pub(crate) async fn command_light<B: Bridge>(
    bridge: &B,
    light: &LightId,
    command: &LightCommand,
    limit: Duration,
    operation: &'static str,
) -> Result<(), LightError> {
    match timed(limit, bridge.set_light_state(light, command)).await {
        Ok(()) => Ok(()),
        Err(BridgeError::Timeout(after)) => Err(LightError::Timeout {
            light: light.clone(),
            operation,
            after,
        }),
        Err(source) => Err(LightError::Command {
            light: light.clone(),
            operation,
            source,
        }),
    }
}

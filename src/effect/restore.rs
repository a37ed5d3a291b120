use std::{collections::HashMap, time::Duration};

use futures::future::join_all;
use log::{debug, error, info, warn};
use serde::Serialize;

use super::{command_light, timed};
use crate::{
    bridge::Bridge,
    error::{BridgeError, LightError},
    lights::{all_same_look, GroupTarget, LightCommand, LightId, LightState},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum RestoreMode {
    /// One command for every light, they all looked the same before
    Batched,
    PerLight,
    /// Nothing left to restore, every light went away
    Nothing,
}

/// How the restore went, light by light
#[derive(Clone, Debug, Serialize)]
pub struct RestoreReport {
    pub mode: RestoreMode,
    /// Verified back in their captured state
    pub restored: Vec<LightId>,
    /// Needed the forced retry
    pub retried: Vec<LightId>,
    /// Still wrong after the retry
    pub unresolved: Vec<LightId>,
    /// Unreachable, left to resync on their own
    pub skipped: Vec<LightId>,
    pub errors: Vec<String>,
}

impl RestoreReport {
    fn new(mode: RestoreMode) -> Self {
        Self {
            mode,
            restored: Vec::new(),
            retried: Vec::new(),
            unresolved: Vec::new(),
            skipped: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn record(&mut self, error: LightError) {
        warn!("{}", error);
        self.errors.push(error.to_string());
    }
}

/// One restore command for all lights when their captures are identical,
/// otherwise one per light.
pub fn plan(captured: &[&LightState]) -> RestoreMode {
    match captured.len() {
        0 => RestoreMode::Nothing,
        _ if all_same_look(captured) => RestoreMode::Batched,
        _ => RestoreMode::PerLight,
    }
}

/// Puts the captured lights back. Never gives up early and never waits on a
/// light that is gone.
pub(crate) struct Restorer<'a, B: Bridge> {
    pub bridge: &'a B,
    pub group: &'a GroupTarget,
    pub captured: &'a [LightState],
    pub transition: Option<Duration>,
    pub request_timeout: Duration,
}

impl<'a, B: Bridge> Restorer<'a, B> {
    pub async fn run(&self) -> RestoreReport {
        info!("Restoring {} lights", self.captured.len());

        // Lights that dropped off during the effect are not restored now
        let ids: Vec<LightId> = self.captured.iter().map(|light| light.id.clone()).collect();
        let probe = self.fetch_current(&ids).await;

        let mut skipped = Vec::new();
        let targets: Vec<&LightState> = self
            .captured
            .iter()
            .filter(|light| match probe.get(&light.id) {
                Some(current) if !current.reachable => {
                    warn!(
                        "Light {} ({}) became unreachable, skipping restore until it is back",
                        light.id,
                        light.label()
                    );
                    skipped.push(light.id.clone());
                    false
                }
                _ => true,
            })
            .collect();

        let mut report = RestoreReport::new(plan(&targets));
        report.skipped = skipped;

        match report.mode {
            RestoreMode::Nothing => {
                warn!("No reachable lights left to restore");
                return report;
            }
            RestoreMode::Batched => {
                if let Err(e) = self.restore_batched(&targets).await {
                    warn!(
                        "Batched restore on group {} failed ({}), restoring lights one by one",
                        self.group.name, e
                    );
                    report.mode = RestoreMode::PerLight;
                    self.restore_each(&targets, &mut report).await;
                }
            }
            RestoreMode::PerLight => self.restore_each(&targets, &mut report).await,
        }

        // Verify, then force one retry for whatever did not stick
        let mismatched = self.verify(&targets, &mut report).await;
        if mismatched.is_empty() {
            info!("All {} lights verified restored", report.restored.len());
            return report;
        }

        warn!(
            "{} lights do not match their captured state, retrying",
            mismatched.len()
        );
        self.restore_each(&mismatched, &mut report).await;

        let before = report.restored.len();
        let still_wrong = self.verify(&mismatched, &mut report).await;
        report
            .retried
            .extend(report.restored[before..].iter().cloned());
        for light in still_wrong {
            report.unresolved.push(light.id.clone());
            report.record(LightError::RestoreMismatch {
                light: light.id.clone(),
            });
        }

        report
    }

    async fn restore_batched(&self, targets: &[&LightState]) -> Result<(), BridgeError> {
        let ids: Vec<LightId> = targets.iter().map(|light| light.id.clone()).collect();
        let command = LightCommand::restore(targets[0], self.transition);

        debug!("Group {}: batched restore of {} lights", self.group.name, ids.len());
        timed(
            self.request_timeout,
            self.bridge.set_group_state(self.group, &ids, &command),
        )
        .await
    }

    async fn restore_each(&self, targets: &[&LightState], report: &mut RestoreReport) {
        let results = join_all(targets.iter().map(|light| {
            let command = LightCommand::restore(light, self.transition);
            async move {
                command_light(
                    self.bridge,
                    &light.id,
                    &command,
                    self.request_timeout,
                    "restore",
                )
                .await
            }
        }))
        .await;

        for error in results.into_iter().filter_map(Result::err) {
            report.record(error);
        }
    }

    /// Compare what the lights show now with their captures. Returns the
    /// ones that differ; verified lights land in `report.restored` and gone
    /// ones in `report.skipped`.
    async fn verify<'l>(
        &self,
        targets: &[&'l LightState],
        report: &mut RestoreReport,
    ) -> Vec<&'l LightState> {
        let ids: Vec<LightId> = targets.iter().map(|light| light.id.clone()).collect();
        let current = self.fetch_current(&ids).await;

        let mut mismatched = Vec::new();
        for &light in targets {
            match current.get(&light.id) {
                Some(now) if !now.reachable => {
                    warn!(
                        "Light {} ({}) is unreachable, cannot verify restore",
                        light.id,
                        light.label()
                    );
                    report.skipped.push(light.id.clone());
                }
                Some(now) if light.is_restored_in(now) => {
                    report.restored.push(light.id.clone());
                }
                Some(_) => mismatched.push(light),
                None => {
                    warn!("Light {}: no state to verify against, skipping", light.id);
                    report.skipped.push(light.id.clone());
                }
            }
        }
        mismatched
    }

    /// Current state of `ids`, batched first and light by light if that
    /// fails. Lights that cannot be read are absent.
    async fn fetch_current(&self, ids: &[LightId]) -> HashMap<LightId, LightState> {
        match timed(self.request_timeout, self.bridge.get_states(ids)).await {
            Ok(states) => states
                .into_iter()
                .map(|state| (state.id.clone(), state))
                .collect(),
            Err(e) => {
                warn!("Batched state read failed ({}), reading lights one by one", e);
                let results = join_all(
                    ids.iter()
                        .map(|id| timed(self.request_timeout, self.bridge.get_light_state(id))),
                )
                .await;

                ids.iter()
                    .zip(results)
                    .filter_map(|(id, result)| match result {
                        Ok(state) => Some((state.id.clone(), state)),
                        Err(e) => {
                            error!("Light {}: could not read state: {}", id, e);
                            None
                        }
                    })
                    .collect()
            }
        }
    }
}

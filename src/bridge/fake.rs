use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
    time::Duration,
};

use async_trait::async_trait;
use tokio::time::Instant;

use super::Bridge;
use crate::{
    error::BridgeError,
    lights::{
        ColorSpace, GroupKind, GroupSummary, GroupTarget, LightCommand, LightId, LightState,
        Palette,
    },
};

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    ResolveGroup(String),
    GetStates(Vec<LightId>),
    GetLight(LightId),
    SetGroup {
        lights: Vec<LightId>,
        command: LightCommand,
    },
    SetLight {
        light: LightId,
        command: LightCommand,
    },
}

/// A call and when it was made, relative to the bridge's creation
#[derive(Clone, Debug)]
pub struct Recorded {
    pub at: Duration,
    pub call: Call,
}

#[derive(Default)]
struct FakeState {
    groups: Vec<GroupTarget>,
    lights: HashMap<LightId, LightState>,
    calls: Vec<Recorded>,
    failing_flips: HashSet<LightId>,
    stalled_flips: HashSet<LightId>,
    slow_flips: HashMap<LightId, (Duration, usize)>,
    lost_restores: HashMap<LightId, usize>,
    drop_off_after_start: HashSet<LightId>,
    fail_bulk_get: bool,
    fail_light_get: bool,
    fail_group_set: bool,
}

/// In-memory bridge that applies commands to its lights and records every
/// call, with knobs to make specific lights misbehave.
pub struct FakeBridge {
    space: ColorSpace,
    palette: Palette,
    origin: Instant,
    state: Mutex<FakeState>,
}

impl FakeBridge {
    pub fn new(space: ColorSpace) -> Self {
        Self {
            space,
            palette: Palette::for_space(space),
            origin: Instant::now(),
            state: Mutex::new(FakeState::default()),
        }
    }

    /// Add a zone holding `lights`, with a grouped_light service
    pub fn with_group(self, name: &str, lights: Vec<LightState>) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.groups.push(GroupTarget {
                id: format!("{}-id", name.to_lowercase()),
                name: name.to_string(),
                kind: GroupKind::Zone,
                lights: lights.iter().map(|light| light.id.clone()).collect(),
                grouped_light: Some(format!("{}-grouped", name.to_lowercase())),
            });
            for light in lights {
                state.lights.insert(light.id.clone(), light);
            }
        }
        self
    }

    /// Effect commands to this light fail
    pub fn fail_flips_for(self, id: &str) -> Self {
        self.state.lock().unwrap().failing_flips.insert(id.into());
        self
    }

    /// Effect commands to this light never answer
    pub fn stall_flips_for(self, id: &str) -> Self {
        self.state.lock().unwrap().stalled_flips.insert(id.into());
        self
    }

    /// The first `count` effect commands to this light take `delay` to answer
    pub fn slow_flips_for(self, id: &str, delay: Duration, count: usize) -> Self {
        self.state
            .lock()
            .unwrap()
            .slow_flips
            .insert(id.into(), (delay, count));
        self
    }

    /// The next `count` restore commands to this light are accepted but do
    /// nothing
    pub fn lose_restores_for(self, id: &str, count: usize) -> Self {
        self.state
            .lock()
            .unwrap()
            .lost_restores
            .insert(id.into(), count);
        self
    }

    /// The light goes offline right after the synchronized start
    pub fn drop_off_after_start(self, id: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .drop_off_after_start
            .insert(id.into());
        self
    }

    pub fn fail_bulk_get(self) -> Self {
        self.state.lock().unwrap().fail_bulk_get = true;
        self
    }

    pub fn fail_light_get(self) -> Self {
        self.state.lock().unwrap().fail_light_get = true;
        self
    }

    pub fn fail_group_set(self) -> Self {
        self.state.lock().unwrap().fail_group_set = true;
        self
    }

    pub fn calls(&self) -> Vec<Recorded> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn light(&self, id: &str) -> LightState {
        self.state.lock().unwrap().lights[&LightId::from(id)].clone()
    }

    pub fn is_effect_command(&self, command: &LightCommand) -> bool {
        command
            .color
            .map(|color| self.palette.contains(&color))
            .unwrap_or(false)
    }

    fn record(&self, state: &mut FakeState, call: Call) {
        state.calls.push(Recorded {
            at: self.origin.elapsed(),
            call,
        });
    }

    fn apply(
        &self,
        state: &mut FakeState,
        id: &LightId,
        command: &LightCommand,
    ) -> Result<(), BridgeError> {
        let effect = self.is_effect_command(command);

        let light = state
            .lights
            .get(id)
            .ok_or_else(|| BridgeError::UnknownLight(id.clone()))?;
        if !light.reachable {
            return Err(BridgeError::Api(format!("light {} is unreachable", id)));
        }

        if !effect {
            if let Some(lost) = state.lost_restores.get_mut(id).filter(|lost| **lost > 0) {
                *lost -= 1;
                return Ok(());
            }
        }

        let light = state.lights.get_mut(id).expect("checked above");
        command.apply_to(light);
        if effect && state.drop_off_after_start.contains(id) {
            light.reachable = false;
        }
        Ok(())
    }
}

#[async_trait]
impl Bridge for FakeBridge {
    fn color_space(&self) -> ColorSpace {
        self.space
    }

    async fn list_groups(&self) -> Result<Vec<GroupSummary>, BridgeError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .groups
            .iter()
            .map(|group| GroupSummary {
                id: group.id.clone(),
                name: group.name.clone(),
                kind: group.kind,
                light_count: group.lights.len(),
            })
            .collect())
    }

    async fn resolve_group(&self, target: &str) -> Result<Option<GroupTarget>, BridgeError> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, Call::ResolveGroup(target.to_string()));
        Ok(state
            .groups
            .iter()
            .find(|group| group.id == target || group.name.eq_ignore_ascii_case(target))
            .cloned())
    }

    async fn get_states(&self, ids: &[LightId]) -> Result<Vec<LightState>, BridgeError> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, Call::GetStates(ids.to_vec()));
        if state.fail_bulk_get {
            return Err(BridgeError::Api("simulated bulk read failure".into()));
        }
        Ok(ids
            .iter()
            .filter_map(|id| state.lights.get(id).cloned())
            .collect())
    }

    async fn get_light_state(&self, id: &LightId) -> Result<LightState, BridgeError> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, Call::GetLight(id.clone()));
        if state.fail_light_get {
            return Err(BridgeError::Api("simulated read failure".into()));
        }
        state
            .lights
            .get(id)
            .cloned()
            .ok_or_else(|| BridgeError::UnknownLight(id.clone()))
    }

    async fn set_group_state(
        &self,
        _group: &GroupTarget,
        lights: &[LightId],
        command: &LightCommand,
    ) -> Result<(), BridgeError> {
        let mut state = self.state.lock().unwrap();
        self.record(
            &mut state,
            Call::SetGroup {
                lights: lights.to_vec(),
                command: command.clone(),
            },
        );
        if state.fail_group_set {
            return Err(BridgeError::Api("simulated group failure".into()));
        }
        for id in lights {
            // Offline members simply miss a group command
            let _ = self.apply(&mut state, id, command);
        }
        Ok(())
    }

    async fn set_light_state(
        &self,
        id: &LightId,
        command: &LightCommand,
    ) -> Result<(), BridgeError> {
        let delay = {
            let mut state = self.state.lock().unwrap();
            self.record(
                &mut state,
                Call::SetLight {
                    light: id.clone(),
                    command: command.clone(),
                },
            );

            let effect = self.is_effect_command(command);
            if effect && state.failing_flips.contains(id) {
                return Err(BridgeError::Api("simulated command failure".into()));
            }
            if effect && state.stalled_flips.contains(id) {
                None
            } else {
                let slow = match state.slow_flips.get_mut(id) {
                    Some((delay, left)) if effect && *left > 0 => {
                        *left -= 1;
                        Some(*delay)
                    }
                    _ => None,
                };
                if slow.is_none() {
                    return self.apply(&mut state, id, command);
                }
                slow
            }
        };

        match delay {
            Some(delay) => {
                tokio::time::sleep(delay).await;
                let mut state = self.state.lock().unwrap();
                self.apply(&mut state, id, command)
            }
            // Hold the request open until the caller gives up on it
            None => std::future::pending().await,
        }
    }
}

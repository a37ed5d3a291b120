use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use common::{
    ColorState, ColorTemperature, Dimming, Dynamics, GroupResource, LightResource, LightUpdate,
    On, ResourceList, ResourceRef, XyPoint, ZigbeeConnectivity, RTYPE_DEVICE, RTYPE_LIGHT,
    STATUS_CONNECTED,
};
use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{de::DeserializeOwned, Serialize};

use super::Bridge;
use crate::{
    config::BridgeConfig,
    error::BridgeError,
    lights::{
        Color, ColorSpace, GroupKind, GroupSummary, GroupTarget, LightCommand, LightId,
        LightState,
    },
};

const APPLICATION_KEY_HEADER: &str = "hue-application-key";

/// A Philips Hue bridge spoken to over the CLIP v2 REST API.
///
/// Holds one pooled HTTP client that every request, including the ones made
/// concurrently by the per-light tasks, goes through.
pub struct HueBridge {
    client: reqwest::Client,
    base_url: String,
}

impl HueBridge {
    pub fn new(host: &str, api_key: &str, timeout: Duration) -> Result<Self, BridgeError> {
        let mut key = HeaderValue::from_str(api_key)
            .map_err(|_| BridgeError::Malformed("api key is not a valid header value".into()))?;
        key.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(APPLICATION_KEY_HEADER, key);

        // The bridge serves a self-signed certificate on the local network
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .default_headers(headers)
            .timeout(timeout)
            .pool_max_idle_per_host(20)
            .build()?;

        Ok(Self {
            client,
            base_url: format!("https://{}/clip/v2", host),
        })
    }

    pub fn from_config(config: &BridgeConfig) -> Result<Self, BridgeError> {
        Self::new(
            config.host.as_deref().unwrap_or_default(),
            config.api_key.as_deref().unwrap_or_default(),
            config.request_timeout(),
        )
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, BridgeError> {
        let url = format!("{}/resource/{}", self.base_url, path);
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(BridgeError::Status { status, url });
        }

        let list: ResourceList<T> = response.json().await?;
        if let Some(error) = list.errors.first() {
            return Err(BridgeError::Api(error.description.clone()));
        }

        debug!("GET {} returned {} resources", path, list.data.len());
        Ok(list.data)
    }

    async fn put<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<(), BridgeError> {
        let url = format!("{}/resource/{}", self.base_url, path);
        let response = self.client.put(&url).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(BridgeError::Status { status, url });
        }

        let list: ResourceList<ResourceRef> = response.json().await?;
        match list.errors.first() {
            Some(error) => Err(BridgeError::Api(error.description.clone())),
            None => Ok(()),
        }
    }

    /// Connectivity per owning device. A failure here is not fatal: lights
    /// are then assumed reachable.
    async fn reachability(&self) -> HashMap<String, bool> {
        match self.get::<ZigbeeConnectivity>("zigbee_connectivity").await {
            Ok(records) => reachability_by_device(&records),
            Err(e) => {
                warn!("Could not read zigbee connectivity, assuming reachable: {}", e);
                HashMap::new()
            }
        }
    }

    /// Zones first so that a zone wins over a room with the same name
    async fn groups(
        &self,
    ) -> Result<(Vec<(GroupKind, GroupResource)>, Vec<LightResource>), BridgeError> {
        let (zones, rooms, lights) = tokio::try_join!(
            self.get::<GroupResource>("zone"),
            self.get::<GroupResource>("room"),
            self.get::<LightResource>("light"),
        )?;

        let groups = zones
            .into_iter()
            .map(|zone| (GroupKind::Zone, zone))
            .chain(rooms.into_iter().map(|room| (GroupKind::Room, room)))
            .collect();

        Ok((groups, lights))
    }
}

#[async_trait]
impl Bridge for HueBridge {
    fn color_space(&self) -> ColorSpace {
        ColorSpace::Xy
    }

    async fn list_groups(&self) -> Result<Vec<GroupSummary>, BridgeError> {
        let (groups, lights) = self.groups().await?;

        Ok(groups
            .iter()
            .map(|(kind, group)| {
                let target = group_target(*kind, group, &lights);
                GroupSummary {
                    id: target.id,
                    name: target.name,
                    kind: target.kind,
                    light_count: target.lights.len(),
                }
            })
            .collect())
    }

    async fn resolve_group(&self, target: &str) -> Result<Option<GroupTarget>, BridgeError> {
        let (groups, lights) = self.groups().await?;

        Ok(find_group(&groups, target).map(|(kind, group)| group_target(*kind, group, &lights)))
    }

    async fn get_states(&self, ids: &[LightId]) -> Result<Vec<LightState>, BridgeError> {
        let (lights, reachable) =
            tokio::join!(self.get::<LightResource>("light"), self.reachability());
        let lights = lights?;

        Ok(ids
            .iter()
            .filter_map(|id| lights.iter().find(|light| light.id == id.0))
            .map(|light| light_state(light, &reachable))
            .collect())
    }

    async fn get_light_state(&self, id: &LightId) -> Result<LightState, BridgeError> {
        let path = format!("light/{}", id);
        let (light, reachable) =
            tokio::join!(self.get::<LightResource>(&path), self.reachability());

        single_light_state(id, &light?, &reachable)
    }

    async fn set_group_state(
        &self,
        group: &GroupTarget,
        lights: &[LightId],
        command: &LightCommand,
    ) -> Result<(), BridgeError> {
        // grouped_light reaches every member, only use it when that is wanted
        if let (true, Some(grouped_light)) = (group.covered_by(lights), &group.grouped_light) {
            return self
                .put(&format!("grouped_light/{}", grouped_light), &light_update(command))
                .await;
        }

        debug!(
            "Group {}: sending to {} of {} lights one by one",
            group.name,
            lights.len(),
            group.lights.len()
        );
        let results =
            futures::future::join_all(lights.iter().map(|id| self.set_light_state(id, command)))
                .await;
        results.into_iter().collect()
    }

    async fn set_light_state(
        &self,
        id: &LightId,
        command: &LightCommand,
    ) -> Result<(), BridgeError> {
        self.put(&format!("light/{}", id), &light_update(command))
            .await
    }
}

fn reachability_by_device(records: &[ZigbeeConnectivity]) -> HashMap<String, bool> {
    records
        .iter()
        .map(|record| (record.owner.rid.clone(), record.status == STATUS_CONNECTED))
        .collect()
}

fn light_state(light: &LightResource, reachable: &HashMap<String, bool>) -> LightState {
    let temperature = light
        .color_temperature
        .filter(|ct| ct.mirek_valid)
        .and_then(|ct| ct.mirek);

    let color = match (temperature, light.color) {
        (Some(mirek), _) => Some(Color::Temperature { mirek }),
        (None, Some(color)) => Some(Color::Xy {
            x: color.xy.x,
            y: color.xy.y,
        }),
        (None, None) => None,
    };

    LightState {
        id: LightId(light.id.clone()),
        name: light.metadata.as_ref().map(|metadata| metadata.name.clone()),
        on: light.on.on,
        brightness: light.dimming.map(|dimming| dimming.brightness),
        color,
        // Lights without a connectivity record are not zigbee, trust them
        reachable: reachable.get(&light.owner.rid).copied().unwrap_or(true),
    }
}

/// The one light a `light/{id}` read returns
fn single_light_state(
    id: &LightId,
    lights: &[LightResource],
    reachable: &HashMap<String, bool>,
) -> Result<LightState, BridgeError> {
    match lights {
        [light] if light.id == id.0 => Ok(light_state(light, reachable)),
        [] => Err(BridgeError::UnknownLight(id.clone())),
        _ => Err(BridgeError::Malformed(format!(
            "expected light {} alone, got {} resources",
            id,
            lights.len()
        ))),
    }
}

fn find_group<'a>(
    groups: &'a [(GroupKind, GroupResource)],
    target: &str,
) -> Option<&'a (GroupKind, GroupResource)> {
    groups
        .iter()
        .find(|(_, group)| group.id == target)
        .or_else(|| {
            groups
                .iter()
                .find(|(_, group)| group.metadata.name.eq_ignore_ascii_case(target))
        })
}

/// Zones list lights, rooms list devices; both end up as light ids
fn group_target(kind: GroupKind, group: &GroupResource, lights: &[LightResource]) -> GroupTarget {
    let mut members: Vec<LightId> = Vec::new();
    let mut add = |id: &str| {
        if !members.iter().any(|member| member.0 == id) {
            members.push(LightId(id.to_string()));
        }
    };
    for child in &group.children {
        match child.rtype.as_str() {
            RTYPE_LIGHT => add(child.rid.as_str()),
            RTYPE_DEVICE => lights
                .iter()
                .filter(|light| light.owner.rid == child.rid)
                .for_each(|light| add(light.id.as_str())),
            _ => {}
        }
    }

    GroupTarget {
        id: group.id.clone(),
        name: group.metadata.name.clone(),
        kind,
        lights: members,
        grouped_light: group.grouped_light_id().map(str::to_string),
    }
}

fn light_update(command: &LightCommand) -> LightUpdate {
    let mut update = LightUpdate {
        on: command.on.map(|on| On { on }),
        dimming: command.brightness.map(|brightness| Dimming { brightness }),
        dynamics: command.transition.map(|transition| Dynamics {
            duration: transition.as_millis() as u32,
        }),
        ..Default::default()
    };

    match command.color {
        Some(Color::Temperature { mirek }) => {
            update.color_temperature = Some(ColorTemperature { mirek });
        }
        Some(color) => {
            if let Some((x, y)) = color.to_xy() {
                update.color = Some(ColorState {
                    xy: XyPoint { x, y },
                });
            }
        }
        None => {}
    }

    update
}

use async_trait::async_trait;

use crate::{
    error::BridgeError,
    lights::{ColorSpace, GroupSummary, GroupTarget, LightCommand, LightId, LightState},
};

pub mod hue;

#[cfg(test)]
pub(crate) mod fake;

pub use hue::HueBridge;

/// What the effect needs from a lighting bridge.
///
/// Implementations are shared between the per-light tasks, so every method
/// takes `&self` and the type must be `Send + Sync`.
#[async_trait]
pub trait Bridge: Send + Sync + 'static {
    /// The color representation this bridge reads and writes
    fn color_space(&self) -> ColorSpace;

    async fn list_groups(&self) -> Result<Vec<GroupSummary>, BridgeError>;

    /// Find a room or zone by id, or by case-insensitive name
    async fn resolve_group(&self, target: &str) -> Result<Option<GroupTarget>, BridgeError>;

    /// Fetch the state of several lights in one request. Lights the bridge
    /// does not know are left out of the result.
    async fn get_states(&self, ids: &[LightId]) -> Result<Vec<LightState>, BridgeError>;

    async fn get_light_state(&self, id: &LightId) -> Result<LightState, BridgeError>;

    /// Send one command to `lights`, all members of `group`. Lights of the
    /// group that are not listed must not be touched.
    async fn set_group_state(
        &self,
        group: &GroupTarget,
        lights: &[LightId],
        command: &LightCommand,
    ) -> Result<(), BridgeError>;

    async fn set_light_state(&self, id: &LightId, command: &LightCommand)
        -> Result<(), BridgeError>;
}

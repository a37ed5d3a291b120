use serde::{Deserialize, Serialize};

// Resource type names used in `rtype` references
pub const RTYPE_LIGHT: &str = "light";
pub const RTYPE_DEVICE: &str = "device";
pub const RTYPE_GROUPED_LIGHT: &str = "grouped_light";

// Zigbee connectivity status reported for a healthy light
pub const STATUS_CONNECTED: &str = "connected";

/// Every CLIP v2 response wraps its payload in a `data` list, alongside a
/// list of errors that may be non-empty even on a 200 response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResourceList<T> {
    #[serde(default)]
    pub errors: Vec<ApiError>,
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ApiError {
    pub description: String,
}

/// A typed pointer to another resource on the bridge
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ResourceRef {
    pub rid: String,
    pub rtype: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
}

/// A room or a zone. Zones list their lights as children directly, rooms
/// list the devices that own them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GroupResource {
    pub id: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub children: Vec<ResourceRef>,
    #[serde(default)]
    pub services: Vec<ResourceRef>,
}

impl GroupResource {
    /// The grouped_light service used to command every member at once
    pub fn grouped_light_id(&self) -> Option<&str> {
        self.services
            .iter()
            .find(|service| service.rtype == RTYPE_GROUPED_LIGHT)
            .map(|service| service.rid.as_str())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LightResource {
    pub id: String,
    pub owner: ResourceRef,
    pub metadata: Option<Metadata>,
    pub on: On,
    pub dimming: Option<Dimming>,
    pub color: Option<ColorState>,
    pub color_temperature: Option<ColorTemperatureState>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ZigbeeConnectivity {
    pub id: String,
    pub owner: ResourceRef,
    pub status: String,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct On {
    pub on: bool,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct Dimming {
    /// Percentage, 0 to 100
    pub brightness: f32,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct XyPoint {
    pub x: f32,
    pub y: f32,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct ColorState {
    pub xy: XyPoint,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct ColorTemperatureState {
    /// Null while the light is showing an xy color
    pub mirek: Option<u16>,
    #[serde(default)]
    pub mirek_valid: bool,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct ColorTemperature {
    pub mirek: u16,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct Dynamics {
    /// Transition time in milliseconds
    pub duration: u32,
}

/// Body of a PUT to `/resource/light/{id}`. Absent fields are left untouched
/// by the bridge.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct LightUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on: Option<On>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimming: Option<Dimming>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<ColorState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_temperature: Option<ColorTemperature>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dynamics: Option<Dynamics>,
}

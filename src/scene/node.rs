use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::celestial::body::{
    BodyKind, BodySpec, Decoration, OverlayDecoration, RingDecoration,
};
use crate::orbit::OrbitalElements;
use crate::scene::error::SpecError;

/// One node of the declarative scene tree, exactly as stored on disk.
///
/// Every field is optional at this level so a malformed node can be reported and skipped
/// instead of failing the whole document. A value of the wrong JSON type leaves its field
/// empty, is listed in `invalid` and is kept verbatim in `extra`, like any key this struct
/// does not know about, so it is written back on save.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>")]
pub struct SceneNode {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub radius: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orbit_radius: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eccentricity: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orbit_speed: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation_speed: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inclination: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub texture: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rings: Option<RingNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overlay: Option<OverlayNode>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SceneNode>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    /// Keys whose value had the wrong JSON type.
    #[serde(skip)]
    pub invalid: Vec<&'static str>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>")]
pub struct RingNode {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inner_radius: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outer_radius: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub texture: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation_speed: Option<f32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    #[serde(skip)]
    pub invalid: Vec<&'static str>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>")]
pub struct OverlayNode {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub texture: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tilt: Option<f32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    #[serde(skip)]
    pub invalid: Vec<&'static str>,
}

/// Pulls typed fields out of a JSON object one key at a time. Whatever is not taken,
/// including values of the wrong type and explicit nulls, stays in the map.
struct FieldReader {
    map: Map<String, Value>,
    invalid: Vec<&'static str>,
}

impl FieldReader {
    fn new(map: Map<String, Value>) -> Self {
        Self {
            map,
            invalid: Vec::new(),
        }
    }

    fn take<T: DeserializeOwned>(&mut self, key: &'static str) -> Option<T> {
        let value = self.map.remove(key)?;
        if value.is_null() {
            self.map.insert(key.to_string(), value);
            return None;
        }
        match T::deserialize(&value) {
            Ok(typed) => Some(typed),
            Err(_) => {
                self.invalid.push(key);
                self.map.insert(key.to_string(), value);
                None
            }
        }
    }

    /// Nested object read with its own lenient conversion.
    fn take_node<T: From<Map<String, Value>>>(&mut self, key: &'static str) -> Option<T> {
        self.take::<Map<String, Value>>(key).map(T::from)
    }
}

impl From<Map<String, Value>> for SceneNode {
    fn from(map: Map<String, Value>) -> Self {
        let mut fields = FieldReader::new(map);
        let children = fields
            .take::<Vec<Value>>("children")
            .unwrap_or_default()
            .into_iter()
            .map(|child| match child {
                Value::Object(map) => SceneNode::from(map),
                // nothing to keep for a child that is not even an object
                _ => SceneNode {
                    invalid: vec!["node"],
                    ..Default::default()
                },
            })
            .collect();

        Self {
            name: fields.take("name"),
            kind: fields.take("type"),
            radius: fields.take("radius"),
            orbit_radius: fields.take("orbit_radius"),
            eccentricity: fields.take("eccentricity"),
            orbit_speed: fields.take("orbit_speed"),
            rotation_speed: fields.take("rotation_speed"),
            inclination: fields.take("inclination"),
            phase: fields.take("phase"),
            texture: fields.take("texture"),
            rings: fields.take_node("rings"),
            overlay: fields.take_node("overlay"),
            children,
            extra: fields.map,
            invalid: fields.invalid,
        }
    }
}

impl From<Map<String, Value>> for RingNode {
    fn from(map: Map<String, Value>) -> Self {
        let mut fields = FieldReader::new(map);
        Self {
            inner_radius: fields.take("inner_radius"),
            outer_radius: fields.take("outer_radius"),
            texture: fields.take("texture"),
            rotation_speed: fields.take("rotation_speed"),
            extra: fields.map,
            invalid: fields.invalid,
        }
    }
}

impl From<Map<String, Value>> for OverlayNode {
    fn from(map: Map<String, Value>) -> Self {
        let mut fields = FieldReader::new(map);
        Self {
            texture: fields.take("texture"),
            speed: fields.take("speed"),
            tilt: fields.take("tilt"),
            extra: fields.map,
            invalid: fields.invalid,
        }
    }
}

fn wrong_type(prefix: &str, invalid: &[&'static str]) -> Result<(), SpecError> {
    match invalid.first() {
        Some(field) => Err(SpecError::InvalidType {
            field: format!("{prefix}{field}"),
        }),
        None => Ok(()),
    }
}

fn required<T: Copy>(value: Option<T>, field: &'static str) -> Result<T, SpecError> {
    value.ok_or(SpecError::MissingField { field })
}

fn finite(value: f32, field: &'static str) -> Result<f32, SpecError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(SpecError::OutOfRange {
            field,
            value,
            expected: "a finite number",
        })
    }
}

impl SceneNode {
    /// Label used in diagnostics when the node may not have a usable name.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }

    pub fn child(&self, name: &str) -> Option<&SceneNode> {
        self.children
            .iter()
            .find(|child| child.name.as_deref() == Some(name))
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut SceneNode> {
        self.children
            .iter_mut()
            .find(|child| child.name.as_deref() == Some(name))
    }

    pub fn has_child(&self, name: &str) -> bool {
        self.child(name).is_some()
    }

    /// Number of nodes below this one, at any depth.
    pub fn descendant_count(&self) -> usize {
        self.children
            .iter()
            .map(|child| 1 + child.descendant_count())
            .sum()
    }

    /// Checks required fields and ranges and produces the parameters of a live body.
    /// Children are not inspected.
    pub fn validate(&self) -> Result<BodySpec, SpecError> {
        wrong_type("", &self.invalid)?;
        let name = self
            .name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .ok_or(SpecError::MissingField { field: "name" })?;
        let kind_tag = self
            .kind
            .as_deref()
            .ok_or(SpecError::MissingField { field: "type" })?;
        let kind =
            BodyKind::parse(kind_tag).ok_or_else(|| SpecError::UnknownType(kind_tag.to_string()))?;

        let radius = finite(required(self.radius, "radius")?, "radius")?;
        if radius <= 0.0 {
            return Err(SpecError::OutOfRange {
                field: "radius",
                value: radius,
                expected: "> 0",
            });
        }

        let orbit_radius = finite(required(self.orbit_radius, "orbit_radius")?, "orbit_radius")?;
        if orbit_radius < 0.0 {
            return Err(SpecError::OutOfRange {
                field: "orbit_radius",
                value: orbit_radius,
                expected: ">= 0",
            });
        }

        let eccentricity = finite(self.eccentricity.unwrap_or(0.0), "eccentricity")?;
        if !(0.0..1.0).contains(&eccentricity) {
            return Err(SpecError::OutOfRange {
                field: "eccentricity",
                value: eccentricity,
                expected: "within [0, 1)",
            });
        }

        let orbit_speed = finite(required(self.orbit_speed, "orbit_speed")?, "orbit_speed")?;
        let rotation_speed = finite(
            required(self.rotation_speed, "rotation_speed")?,
            "rotation_speed",
        )?;
        let inclination = finite(self.inclination.unwrap_or(0.0), "inclination")?;
        let phase = finite(self.phase.unwrap_or(0.0), "phase")?;

        let mut decorations = Vec::new();
        if let Some(rings) = &self.rings {
            decorations.push(Decoration::Ring(rings.validate()?));
        }
        if let Some(overlay) = &self.overlay {
            decorations.push(Decoration::Overlay(overlay.validate()?));
        }

        Ok(BodySpec {
            name,
            kind,
            elements: OrbitalElements::new(
                orbit_radius,
                eccentricity,
                inclination,
                orbit_speed,
                rotation_speed,
                radius,
            ),
            phase,
            texture: self.texture.clone(),
            decorations,
        })
    }
}

impl RingNode {
    fn validate(&self) -> Result<RingDecoration, SpecError> {
        wrong_type("rings.", &self.invalid)?;
        let inner = finite(required(self.inner_radius, "rings.inner_radius")?, "rings.inner_radius")?;
        let outer = finite(required(self.outer_radius, "rings.outer_radius")?, "rings.outer_radius")?;
        if inner <= 0.0 || inner >= outer {
            return Err(SpecError::InvalidRing { inner, outer });
        }
        Ok(RingDecoration {
            inner_radius: inner,
            outer_radius: outer,
            texture: self.texture.clone(),
            rotation_speed: finite(self.rotation_speed.unwrap_or(0.0), "rings.rotation_speed")?,
        })
    }
}

impl OverlayNode {
    fn validate(&self) -> Result<OverlayDecoration, SpecError> {
        wrong_type("overlay.", &self.invalid)?;
        let texture = self
            .texture
            .clone()
            .ok_or(SpecError::MissingField { field: "overlay.texture" })?;
        Ok(OverlayDecoration {
            texture,
            speed: finite(self.speed.unwrap_or(0.0), "overlay.speed")?,
            tilt: finite(self.tilt.unwrap_or(0.0), "overlay.tilt")?,
        })
    }
}

use bevy::math::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::celestial::time::SimulationContext;
use crate::orbit::{clamp_angle, orbit_position, OrbitalElements};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyKind {
    Star,
    Planet,
    Moon,
}

impl BodyKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "star" => Some(Self::Star),
            "planet" => Some(Self::Planet),
            "moon" => Some(Self::Moon),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Star => "star",
            Self::Planet => "planet",
            Self::Moon => "moon",
        }
    }

    /// Stars emit their own light and are drawn unlit.
    pub fn is_emissive(&self) -> bool {
        matches!(self, Self::Star)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Constructing,
    Active,
    Disposed,
}

/// Per-tick mutable state of one body. Angles are in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BodyState {
    /// Wrapped to `[0, 360)`.
    pub orbit_angle: f32,
    /// Accumulates without wrapping.
    pub rotation_angle: f32,
    pub ring_angle: Option<f32>,
    pub overlay_angle: Option<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RingDecoration {
    pub inner_radius: f32,
    pub outer_radius: f32,
    pub texture: Option<String>,
    pub rotation_speed: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverlayDecoration {
    pub texture: String,
    pub speed: f32,
    /// Fixed tilt about the body's X axis, applied after the heading.
    pub tilt: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecorationKind {
    Ring,
    Overlay,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decoration {
    Ring(RingDecoration),
    Overlay(OverlayDecoration),
}

impl Decoration {
    pub fn kind(&self) -> DecorationKind {
        match self {
            Self::Ring(_) => DecorationKind::Ring,
            Self::Overlay(_) => DecorationKind::Overlay,
        }
    }

    pub fn texture(&self) -> Option<&str> {
        match self {
            Self::Ring(ring) => ring.texture.as_deref(),
            Self::Overlay(overlay) => Some(overlay.texture.as_str()),
        }
    }
}

/// Validated construction parameters for a single body.
#[derive(Debug, Clone, PartialEq)]
pub struct BodySpec {
    pub name: String,
    pub kind: BodyKind,
    pub elements: OrbitalElements,
    /// Initial orbital angle in degrees.
    pub phase: f32,
    pub texture: Option<String>,
    pub decorations: Vec<Decoration>,
}

/// A live body driven once per tick by the simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct CelestialBody {
    name: String,
    kind: BodyKind,
    elements: OrbitalElements,
    texture: Option<String>,
    decorations: Vec<Decoration>,
    state: BodyState,
    position: Vec3,
    lifecycle: Lifecycle,
}

impl CelestialBody {
    pub fn new(spec: BodySpec) -> Self {
        let mut body = Self {
            name: spec.name,
            kind: spec.kind,
            elements: spec.elements,
            texture: spec.texture,
            decorations: Vec::new(),
            state: BodyState::default(),
            position: Vec3::ZERO,
            lifecycle: Lifecycle::Constructing,
        };

        for decoration in spec.decorations {
            match decoration.kind() {
                DecorationKind::Ring => body.state.ring_angle = Some(0.0),
                DecorationKind::Overlay => body.state.overlay_angle = Some(0.0),
            }
            body.decorations.push(decoration);
        }

        body.state.orbit_angle = clamp_angle(spec.phase);
        body.position = orbit_position(&body.elements, body.state.orbit_angle);
        body.lifecycle = Lifecycle::Active;
        body
    }

    /// Moves the body forward by `dt` seconds of wall time, scaled by the context.
    pub fn advance(&mut self, dt: f32, context: &SimulationContext) {
        debug_assert!(
            self.lifecycle != Lifecycle::Disposed,
            "advance called on disposed body {}",
            self.name
        );
        if self.lifecycle != Lifecycle::Active || context.frozen {
            return;
        }

        let dt = context.effective_dt(dt);
        if dt == 0.0 {
            return;
        }

        self.state.orbit_angle =
            clamp_angle(self.state.orbit_angle + self.elements.orbit_speed * dt);
        self.position = orbit_position(&self.elements, self.state.orbit_angle);
        self.state.rotation_angle += self.elements.rotation_speed * dt;

        for decoration in &self.decorations {
            match decoration {
                Decoration::Ring(ring) => {
                    if let Some(angle) = self.state.ring_angle.as_mut() {
                        *angle += ring.rotation_speed * dt;
                    }
                }
                Decoration::Overlay(overlay) => {
                    if let Some(angle) = self.state.overlay_angle.as_mut() {
                        *angle += overlay.speed * dt;
                    }
                }
            }
        }
    }

    pub fn dispose(&mut self) {
        self.lifecycle = Lifecycle::Disposed;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> BodyKind {
        self.kind
    }

    pub fn elements(&self) -> &OrbitalElements {
        &self.elements
    }

    pub fn radius(&self) -> f32 {
        self.elements.radius
    }

    pub fn texture(&self) -> Option<&str> {
        self.texture.as_deref()
    }

    pub fn decorations(&self) -> &[Decoration] {
        &self.decorations
    }

    pub fn decoration(&self, kind: DecorationKind) -> Option<&Decoration> {
        self.decorations.iter().find(|d| d.kind() == kind)
    }

    pub fn state(&self) -> &BodyState {
        &self.state
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn is_active(&self) -> bool {
        self.lifecycle == Lifecycle::Active
    }

    /// Position relative to the parent's transform node, in the orbital frame.
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Mesh spin about the orbital Z axis.
    pub fn spin(&self) -> Quat {
        Quat::from_rotation_z(self.state.rotation_angle.to_radians())
    }

    pub fn ring_rotation(&self) -> Option<Quat> {
        self.state
            .ring_angle
            .map(|angle| Quat::from_rotation_z(angle.to_radians()))
    }

    /// Overlay heading about Z composed with its fixed tilt about X.
    pub fn overlay_rotation(&self) -> Option<Quat> {
        let tilt = match self.decoration(DecorationKind::Overlay) {
            Some(Decoration::Overlay(overlay)) => overlay.tilt,
            _ => 0.0,
        };
        self.state.overlay_angle.map(|angle| {
            Quat::from_rotation_z(angle.to_radians()) * Quat::from_rotation_x(tilt.to_radians())
        })
    }
}

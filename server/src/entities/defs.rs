//! Immutable definitions for unit and building kinds. Tagged as closed
//! enumerations with a per-kind definition table —
//! not a class hierarchy.

use crate::resources::ResourceKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitKind {
    Tank,
    Scout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildingKind {
    CommandCenter,
    MetalExtractor,
    PowerPlant,
    Turret,
    Factory,
}

/// Wire-facing numeric tag for a unit kind (matches `UnitState::type`/`unitType`).
impl UnitKind {
    pub fn wire_id(self) -> u32 {
        match self {
            UnitKind::Tank => 0,
            UnitKind::Scout => 1,
        }
    }

    pub fn from_wire_id(id: u32) -> Option<Self> {
        match id {
            0 => Some(UnitKind::Tank),
            1 => Some(UnitKind::Scout),
            _ => None,
        }
    }
}

impl BuildingKind {
    pub fn wire_id(self) -> u32 {
        match self {
            BuildingKind::CommandCenter => 0,
            BuildingKind::MetalExtractor => 1,
            BuildingKind::PowerPlant => 2,
            BuildingKind::Turret => 3,
            BuildingKind::Factory => 4,
        }
    }

    pub fn from_wire_id(id: u32) -> Option<Self> {
        match id {
            0 => Some(BuildingKind::CommandCenter),
            1 => Some(BuildingKind::MetalExtractor),
            2 => Some(BuildingKind::PowerPlant),
            3 => Some(BuildingKind::Turret),
            4 => Some(BuildingKind::Factory),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct UnitDef {
    pub kind: UnitKind,
    pub max_health: f32,
    pub size: f64,
    pub speed: f64,
    pub range: f64,
    pub damage: f32,
    pub fire_rate: f32,
    pub metal_cost: f32,
    pub energy_cost: f32,
    pub build_time: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct ResourceEffect {
    pub kind: ResourceKind,
    pub production_delta: f32,
    pub consumption_delta: f32,
    pub capacity_delta: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct BuildingDef {
    pub kind: BuildingKind,
    pub max_health: f32,
    pub size: f64,
    pub build_time: f32,
    pub metal_cost: f32,
    pub energy_cost: f32,
    pub requires_deposit: bool,
    pub can_produce: bool,
    pub offensive: bool,
    pub range: f64,
    pub damage: f32,
    pub fire_rate: f32,
    pub energy_per_shot: f32,
}

pub fn unit_def(kind: UnitKind) -> UnitDef {
    match kind {
        UnitKind::Tank => UnitDef {
            kind,
            max_health: 150.0,
            size: 24.0,
            speed: 40.0,
            range: 120.0,
            damage: 20.0,
            fire_rate: 1.0,
            metal_cost: 60.0,
            energy_cost: 10.0,
            build_time: 8.0,
        },
        UnitKind::Scout => UnitDef {
            kind,
            max_health: 50.0,
            size: 16.0,
            speed: 90.0,
            range: 80.0,
            damage: 8.0,
            fire_rate: 2.0,
            metal_cost: 25.0,
            energy_cost: 5.0,
            build_time: 4.0,
        },
    }
}

pub fn building_def(kind: BuildingKind) -> BuildingDef {
    match kind {
        BuildingKind::CommandCenter => BuildingDef {
            kind,
            max_health: 1000.0,
            size: 96.0,
            build_time: 0.1,
            metal_cost: 0.0,
            energy_cost: 0.0,
            requires_deposit: false,
            can_produce: true,
            offensive: false,
            range: 0.0,
            damage: 0.0,
            fire_rate: 0.0,
            energy_per_shot: 0.0,
        },
        BuildingKind::MetalExtractor => BuildingDef {
            kind,
            max_health: 200.0,
            size: 48.0,
            build_time: 12.0,
            metal_cost: 50.0,
            energy_cost: 20.0,
            requires_deposit: true,
            can_produce: false,
            offensive: false,
            range: 0.0,
            damage: 0.0,
            fire_rate: 0.0,
            energy_per_shot: 0.0,
        },
        BuildingKind::PowerPlant => BuildingDef {
            kind,
            max_health: 250.0,
            size: 48.0,
            build_time: 15.0,
            metal_cost: 80.0,
            energy_cost: 0.0,
            requires_deposit: false,
            can_produce: false,
            offensive: false,
            range: 0.0,
            damage: 0.0,
            fire_rate: 0.0,
            energy_per_shot: 0.0,
        },
        BuildingKind::Turret => BuildingDef {
            kind,
            max_health: 300.0,
            size: 32.0,
            build_time: 10.0,
            metal_cost: 100.0,
            energy_cost: 30.0,
            requires_deposit: false,
            can_produce: false,
            offensive: true,
            range: 160.0,
            damage: 15.0,
            fire_rate: 1.5,
            energy_per_shot: 2.0,
        },
        BuildingKind::Factory => BuildingDef {
            kind,
            max_health: 500.0,
            size: 64.0,
            build_time: 20.0,
            metal_cost: 150.0,
            energy_cost: 40.0,
            requires_deposit: false,
            can_produce: true,
            offensive: false,
            range: 0.0,
            damage: 0.0,
            fire_rate: 0.0,
            energy_per_shot: 0.0,
        },
    }
}

/// Resource effects a completed building applies. `CommandCenter` grants the
/// baseline production/capacity every player starts a match able to afford.
pub fn building_resource_effects(kind: BuildingKind) -> Vec<ResourceEffect> {
    match kind {
        BuildingKind::CommandCenter => vec![
            ResourceEffect { kind: ResourceKind::Metal, production_delta: 0.0, consumption_delta: 0.0, capacity_delta: 500.0 },
            ResourceEffect { kind: ResourceKind::Energy, production_delta: 20.0, consumption_delta: 0.0, capacity_delta: 500.0 },
        ],
        BuildingKind::MetalExtractor => vec![ResourceEffect {
            kind: ResourceKind::Metal,
            production_delta: 8.0,
            consumption_delta: 0.0,
            capacity_delta: 0.0,
        }],
        BuildingKind::PowerPlant => vec![ResourceEffect {
            kind: ResourceKind::Energy,
            production_delta: 25.0,
            consumption_delta: 0.0,
            capacity_delta: 0.0,
        }],
        BuildingKind::Turret => vec![],
        BuildingKind::Factory => vec![ResourceEffect {
            kind: ResourceKind::Energy,
            production_delta: 0.0,
            consumption_delta: 5.0,
            capacity_delta: 0.0,
        }],
    }
}

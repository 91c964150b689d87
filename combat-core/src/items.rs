//! Standard D&D 5e weapons and the slots they are wielded in.

use crate::attack::{DamageSpec, DamageType};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Weapon properties per D&D 5e.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeaponProperty {
    Finesse,
    Light,
    Heavy,
    TwoHanded,
    /// Die size when wielded in two hands.
    Versatile(u32),
    Thrown,
    Ammunition,
    Loading,
    Reach,
}

/// Simple or martial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeaponCategory {
    Simple,
    Martial,
}

/// A wieldable weapon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Weapon {
    /// Lowercase, underscore-separated identifier, e.g. `light_hammer`.
    pub key: String,
    pub name: String,
    pub damage: DamageSpec,
    pub category: WeaponCategory,
    pub properties: Vec<WeaponProperty>,
    pub range: Option<(u32, u32)>,
    /// +1/+2/+3 magic weapons add to attack and damage.
    pub magic_bonus: i32,
}

impl Weapon {
    pub fn new(name: &str, count: u32, sides: u32, damage_type: DamageType) -> Self {
        Self {
            key: weapon_key(name),
            name: name.to_string(),
            damage: DamageSpec::new(count, sides, damage_type),
            category: WeaponCategory::Simple,
            properties: Vec::new(),
            range: None,
            magic_bonus: 0,
        }
    }

    pub fn martial(mut self) -> Self {
        self.category = WeaponCategory::Martial;
        self
    }

    pub fn with_properties(mut self, properties: Vec<WeaponProperty>) -> Self {
        self.properties = properties;
        self
    }

    pub fn with_range(mut self, normal: u32, long: u32) -> Self {
        self.range = Some((normal, long));
        self
    }

    pub fn with_magic_bonus(mut self, bonus: i32) -> Self {
        self.magic_bonus = bonus;
        self
    }

    pub fn has(&self, property: WeaponProperty) -> bool {
        self.properties.contains(&property)
    }

    pub fn is_finesse(&self) -> bool {
        self.has(WeaponProperty::Finesse)
    }

    pub fn is_light(&self) -> bool {
        self.has(WeaponProperty::Light)
    }

    pub fn is_two_handed(&self) -> bool {
        self.has(WeaponProperty::TwoHanded)
    }

    /// Bows, crossbows and slings. Thrown melee weapons are still melee.
    pub fn is_ranged(&self) -> bool {
        self.has(WeaponProperty::Ammunition)
            || (self.range.is_some() && !self.has(WeaponProperty::Thrown))
    }

    pub fn is_melee(&self) -> bool {
        !self.is_ranged()
    }

    /// Shortswords and simple melee weapons without the two-handed or
    /// heavy property.
    pub fn is_monk_weapon(&self) -> bool {
        if self.key == "shortsword" {
            return true;
        }
        self.category == WeaponCategory::Simple
            && self.is_melee()
            && !self.is_two_handed()
            && !self.has(WeaponProperty::Heavy)
    }
}

/// Lowercase, underscore-separated key for a weapon name.
pub fn weapon_key(name: &str) -> String {
    name.trim().to_lowercase().replace([' ', '-'], "_")
}

/// Get a standard weapon by name or key.
pub fn get_weapon(name: &str) -> Option<Weapon> {
    let key = weapon_key(name);
    WEAPONS.iter().find(|w| w.key == key).cloned()
}

/// An unarmed strike using the given damage die (1 for a plain punch).
pub fn unarmed_strike(sides: u32) -> Weapon {
    Weapon::new("Unarmed Strike", 1, sides.max(1), DamageType::Bludgeoning)
}

lazy_static::lazy_static! {
    pub static ref WEAPONS: Vec<Weapon> = vec![
        // Simple Melee Weapons
        Weapon::new("Club", 1, 4, DamageType::Bludgeoning)
            .with_properties(vec![WeaponProperty::Light]),
        Weapon::new("Dagger", 1, 4, DamageType::Piercing)
            .with_properties(vec![WeaponProperty::Finesse, WeaponProperty::Light, WeaponProperty::Thrown])
            .with_range(20, 60),
        Weapon::new("Greatclub", 1, 8, DamageType::Bludgeoning)
            .with_properties(vec![WeaponProperty::TwoHanded]),
        Weapon::new("Handaxe", 1, 6, DamageType::Slashing)
            .with_properties(vec![WeaponProperty::Light, WeaponProperty::Thrown])
            .with_range(20, 60),
        Weapon::new("Javelin", 1, 6, DamageType::Piercing)
            .with_properties(vec![WeaponProperty::Thrown])
            .with_range(30, 120),
        Weapon::new("Light Hammer", 1, 4, DamageType::Bludgeoning)
            .with_properties(vec![WeaponProperty::Light, WeaponProperty::Thrown])
            .with_range(20, 60),
        Weapon::new("Mace", 1, 6, DamageType::Bludgeoning),
        Weapon::new("Quarterstaff", 1, 6, DamageType::Bludgeoning)
            .with_properties(vec![WeaponProperty::Versatile(8)]),
        Weapon::new("Sickle", 1, 4, DamageType::Slashing)
            .with_properties(vec![WeaponProperty::Light]),
        Weapon::new("Spear", 1, 6, DamageType::Piercing)
            .with_properties(vec![WeaponProperty::Thrown, WeaponProperty::Versatile(8)])
            .with_range(20, 60),

        // Simple Ranged Weapons
        Weapon::new("Light Crossbow", 1, 8, DamageType::Piercing)
            .with_properties(vec![WeaponProperty::Ammunition, WeaponProperty::Loading, WeaponProperty::TwoHanded])
            .with_range(80, 320),
        Weapon::new("Shortbow", 1, 6, DamageType::Piercing)
            .with_properties(vec![WeaponProperty::Ammunition, WeaponProperty::TwoHanded])
            .with_range(80, 320),

        // Martial Melee Weapons
        Weapon::new("Battleaxe", 1, 8, DamageType::Slashing)
            .martial()
            .with_properties(vec![WeaponProperty::Versatile(10)]),
        Weapon::new("Glaive", 1, 10, DamageType::Slashing)
            .martial()
            .with_properties(vec![WeaponProperty::Heavy, WeaponProperty::Reach, WeaponProperty::TwoHanded]),
        Weapon::new("Greataxe", 1, 12, DamageType::Slashing)
            .martial()
            .with_properties(vec![WeaponProperty::Heavy, WeaponProperty::TwoHanded]),
        Weapon::new("Greatsword", 2, 6, DamageType::Slashing)
            .martial()
            .with_properties(vec![WeaponProperty::Heavy, WeaponProperty::TwoHanded]),
        Weapon::new("Longsword", 1, 8, DamageType::Slashing)
            .martial()
            .with_properties(vec![WeaponProperty::Versatile(10)]),
        Weapon::new("Maul", 2, 6, DamageType::Bludgeoning)
            .martial()
            .with_properties(vec![WeaponProperty::Heavy, WeaponProperty::TwoHanded]),
        Weapon::new("Rapier", 1, 8, DamageType::Piercing)
            .martial()
            .with_properties(vec![WeaponProperty::Finesse]),
        Weapon::new("Scimitar", 1, 6, DamageType::Slashing)
            .martial()
            .with_properties(vec![WeaponProperty::Finesse, WeaponProperty::Light]),
        Weapon::new("Shortsword", 1, 6, DamageType::Piercing)
            .martial()
            .with_properties(vec![WeaponProperty::Finesse, WeaponProperty::Light]),
        Weapon::new("Warhammer", 1, 8, DamageType::Bludgeoning)
            .martial()
            .with_properties(vec![WeaponProperty::Versatile(10)]),

        // Martial Ranged Weapons
        Weapon::new("Hand Crossbow", 1, 6, DamageType::Piercing)
            .martial()
            .with_properties(vec![WeaponProperty::Ammunition, WeaponProperty::Light, WeaponProperty::Loading])
            .with_range(30, 120),
        Weapon::new("Longbow", 1, 8, DamageType::Piercing)
            .martial()
            .with_properties(vec![WeaponProperty::Ammunition, WeaponProperty::Heavy, WeaponProperty::TwoHanded])
            .with_range(150, 600),
    ];
}

/// Errors from equipping weapons.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EquipError {
    #[error("{0} needs both hands")]
    TwoHandedConflict(String),
    #[error("Unknown weapon: {0}")]
    UnknownWeapon(String),
}

/// Hand slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EquipSlot {
    MainHand,
    OffHand,
}

/// What a character is wielding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Equipment {
    pub main_hand: Option<Weapon>,
    pub off_hand: Option<Weapon>,
}

impl Equipment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a weapon in a slot, returning whatever was there.
    pub fn equip(&mut self, slot: EquipSlot, weapon: Weapon) -> Result<Option<Weapon>, EquipError> {
        match slot {
            EquipSlot::MainHand => {
                if weapon.is_two_handed() && self.off_hand.is_some() {
                    return Err(EquipError::TwoHandedConflict(weapon.name));
                }
                Ok(self.main_hand.replace(weapon))
            }
            EquipSlot::OffHand => {
                if weapon.is_two_handed() {
                    return Err(EquipError::TwoHandedConflict(weapon.name));
                }
                if let Some(main) = self.main_hand.as_ref().filter(|m| m.is_two_handed()) {
                    return Err(EquipError::TwoHandedConflict(main.name.clone()));
                }
                Ok(self.off_hand.replace(weapon))
            }
        }
    }

    pub fn unequip(&mut self, slot: EquipSlot) -> Option<Weapon> {
        match slot {
            EquipSlot::MainHand => self.main_hand.take(),
            EquipSlot::OffHand => self.off_hand.take(),
        }
    }

    /// Light melee weapons in both hands, the precondition for an off-hand
    /// bonus attack.
    pub fn dual_wields_light(&self) -> bool {
        match (&self.main_hand, &self.off_hand) {
            (Some(main), Some(off)) => {
                main.is_light() && off.is_light() && main.is_melee() && off.is_melee()
            }
            _ => false,
        }
    }

    /// A one-handed melee weapon with nothing in the other hand.
    pub fn wields_single_one_handed(&self) -> bool {
        match (&self.main_hand, &self.off_hand) {
            (Some(main), None) => main.is_melee() && !main.is_two_handed(),
            _ => false,
        }
    }
}

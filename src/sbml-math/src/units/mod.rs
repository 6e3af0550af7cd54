// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! SBML unit definitions and the algebra over them.

use std::fmt;

use float_cmp::approx_eq;

use crate::common::{Error, ErrorCode, ErrorKind, Result};

mod infer;

pub use self::infer::{InferredUnits, UnitInferer, infer_units};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UnitKind {
    Ampere,
    Avogadro,
    Becquerel,
    Candela,
    Celsius,
    Coulomb,
    Dimensionless,
    Farad,
    Gram,
    Gray,
    Henry,
    Hertz,
    Item,
    Joule,
    Katal,
    Kelvin,
    Kilogram,
    Liter,
    Litre,
    Lumen,
    Lux,
    Meter,
    Metre,
    Mole,
    Newton,
    Ohm,
    Pascal,
    Radian,
    Second,
    Siemens,
    Sievert,
    Steradian,
    Tesla,
    Volt,
    Watt,
    Weber,
}

// sorted by name for binary search
const UNIT_KINDS: &[(&str, UnitKind)] = &[
    ("ampere", UnitKind::Ampere),
    ("avogadro", UnitKind::Avogadro),
    ("becquerel", UnitKind::Becquerel),
    ("candela", UnitKind::Candela),
    ("celsius", UnitKind::Celsius),
    ("coulomb", UnitKind::Coulomb),
    ("dimensionless", UnitKind::Dimensionless),
    ("farad", UnitKind::Farad),
    ("gram", UnitKind::Gram),
    ("gray", UnitKind::Gray),
    ("henry", UnitKind::Henry),
    ("hertz", UnitKind::Hertz),
    ("item", UnitKind::Item),
    ("joule", UnitKind::Joule),
    ("katal", UnitKind::Katal),
    ("kelvin", UnitKind::Kelvin),
    ("kilogram", UnitKind::Kilogram),
    ("liter", UnitKind::Liter),
    ("litre", UnitKind::Litre),
    ("lumen", UnitKind::Lumen),
    ("lux", UnitKind::Lux),
    ("meter", UnitKind::Meter),
    ("metre", UnitKind::Metre),
    ("mole", UnitKind::Mole),
    ("newton", UnitKind::Newton),
    ("ohm", UnitKind::Ohm),
    ("pascal", UnitKind::Pascal),
    ("radian", UnitKind::Radian),
    ("second", UnitKind::Second),
    ("siemens", UnitKind::Siemens),
    ("sievert", UnitKind::Sievert),
    ("steradian", UnitKind::Steradian),
    ("tesla", UnitKind::Tesla),
    ("volt", UnitKind::Volt),
    ("watt", UnitKind::Watt),
    ("weber", UnitKind::Weber),
];

impl UnitKind {
    pub fn from_name(name: &str) -> Option<UnitKind> {
        UNIT_KINDS
            .binary_search_by(|(candidate, _)| (*candidate).cmp(name))
            .ok()
            .map(|i| UNIT_KINDS[i].1)
    }

    pub fn name(self) -> &'static str {
        // the table is in declaration order
        UNIT_KINDS[self as usize].0
    }

    /// The kind expressed in SI base kinds, with the factor that scales
    /// one of this kind to the base combination.
    fn to_si(self) -> (f64, &'static [(UnitKind, f64)]) {
        use UnitKind::*;
        match self {
            Ampere | Candela | Item | Kelvin | Kilogram | Metre | Mole | Second | Dimensionless => {
                (1.0, &[])
            }
            Avogadro => (6.022_140_76e23, &[(Dimensionless, 1.0)]),
            Becquerel | Hertz => (1.0, &[(Second, -1.0)]),
            Celsius => (1.0, &[(Kelvin, 1.0)]),
            Coulomb => (1.0, &[(Ampere, 1.0), (Second, 1.0)]),
            Farad => (
                1.0,
                &[(Metre, -2.0), (Kilogram, -1.0), (Second, 4.0), (Ampere, 2.0)],
            ),
            Gram => (0.001, &[(Kilogram, 1.0)]),
            Gray | Sievert => (1.0, &[(Metre, 2.0), (Second, -2.0)]),
            Henry => (
                1.0,
                &[(Metre, 2.0), (Kilogram, 1.0), (Second, -2.0), (Ampere, -2.0)],
            ),
            Joule => (1.0, &[(Metre, 2.0), (Kilogram, 1.0), (Second, -2.0)]),
            Katal => (1.0, &[(Mole, 1.0), (Second, -1.0)]),
            Liter | Litre => (0.001, &[(Metre, 3.0)]),
            Lumen => (1.0, &[(Candela, 1.0)]),
            Lux => (1.0, &[(Candela, 1.0), (Metre, -2.0)]),
            Meter => (1.0, &[(Metre, 1.0)]),
            Newton => (1.0, &[(Metre, 1.0), (Kilogram, 1.0), (Second, -2.0)]),
            Ohm => (
                1.0,
                &[(Metre, 2.0), (Kilogram, 1.0), (Second, -3.0), (Ampere, -2.0)],
            ),
            Pascal => (1.0, &[(Metre, -1.0), (Kilogram, 1.0), (Second, -2.0)]),
            Radian | Steradian => (1.0, &[(Dimensionless, 1.0)]),
            Siemens => (
                1.0,
                &[(Metre, -2.0), (Kilogram, -1.0), (Second, 3.0), (Ampere, 2.0)],
            ),
            Tesla => (1.0, &[(Kilogram, 1.0), (Second, -2.0), (Ampere, -1.0)]),
            Volt => (
                1.0,
                &[(Metre, 2.0), (Kilogram, 1.0), (Second, -3.0), (Ampere, -1.0)],
            ),
            Watt => (1.0, &[(Metre, 2.0), (Kilogram, 1.0), (Second, -3.0)]),
            Weber => (
                1.0,
                &[(Metre, 2.0), (Kilogram, 1.0), (Second, -2.0), (Ampere, -1.0)],
            ),
        }
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for UnitKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        UnitKind::from_name(s).ok_or_else(|| {
            Error::new(
                ErrorKind::Units,
                ErrorCode::UnknownUnitKind,
                Some(format!("'{s}' is not a base unit")),
            )
        })
    }
}

/// One factor of a unit definition:
/// `(multiplier * 10^scale * kind)^exponent`, shifted by `offset`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Unit {
    pub kind: UnitKind,
    pub exponent: f64,
    pub scale: i32,
    pub multiplier: f64,
    pub offset: f64,
}

impl Unit {
    pub fn new(kind: UnitKind) -> Self {
        Unit {
            kind,
            exponent: 1.0,
            scale: 0,
            multiplier: 1.0,
            offset: 0.0,
        }
    }

    pub fn with_exponent(mut self, exponent: f64) -> Self {
        self.exponent = exponent;
        self
    }

    pub fn with_scale(mut self, scale: i32) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// The size of one of this unit, relative to its kind.
    fn factor(&self) -> f64 {
        if self.scale >= 0 {
            self.multiplier * 10f64.powi(self.scale)
        } else {
            self.multiplier / 10f64.powi(-self.scale)
        }
    }

    fn has_unit_factor(&self) -> bool {
        self.scale == 0 && approx_eq!(f64, self.multiplier, 1.0, ulps = 4)
    }

    /// Whether the exponent is a whole number.
    pub fn has_integral_exponent(&self) -> bool {
        self.exponent.fract() == 0.0
    }

    fn is_identical(&self, other: &Unit) -> bool {
        self.kind == other.kind
            && self.scale == other.scale
            && approx_eq!(f64, self.exponent, other.exponent, epsilon = 1e-12)
            && approx_eq!(f64, self.multiplier, other.multiplier, epsilon = 1e-12)
            && approx_eq!(f64, self.offset, other.offset, epsilon = 1e-12)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct UnitDefinition {
    pub id: Option<String>,
    pub units: Vec<Unit>,
}

impl UnitDefinition {
    pub fn new(id: Option<&str>, units: Vec<Unit>) -> Self {
        UnitDefinition {
            id: id.map(|id| id.to_owned()),
            units,
        }
    }

    /// The definition of a single base unit, identified by its name.
    pub fn from_kind(kind: UnitKind) -> Self {
        UnitDefinition::new(Some(kind.name()), vec![Unit::new(kind)])
    }

    /// An empty definition: dimensionless.
    pub fn dimensionless() -> Self {
        Default::default()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Whether this definition has no dimension left once simplified.
    pub fn is_dimensionless(&self) -> bool {
        let mut simplified = self.clone();
        simplified.simplify();
        simplified
            .units
            .iter()
            .all(|unit| unit.kind == UnitKind::Dimensionless)
    }

    /// Merges units of the same kind, drops factors whose exponent
    /// cancelled out and removes redundant `dimensionless` entries.
    pub fn simplify(&mut self) {
        let mut merged: Vec<Unit> = Vec::with_capacity(self.units.len());
        for unit in self.units.drain(..) {
            match merged.iter_mut().find(|existing| existing.kind == unit.kind) {
                Some(existing) => {
                    if existing.scale == unit.scale
                        && approx_eq!(f64, existing.multiplier, unit.multiplier, ulps = 4)
                    {
                        existing.exponent += unit.exponent;
                    } else {
                        let total = existing.factor().powf(existing.exponent)
                            * unit.factor().powf(unit.exponent);
                        existing.exponent += unit.exponent;
                        existing.scale = 0;
                        existing.multiplier = if existing.exponent == 0.0 {
                            1.0
                        } else {
                            total.powf(1.0 / existing.exponent)
                        };
                    }
                }
                None => merged.push(unit),
            }
        }

        merged.retain(|unit| !approx_eq!(f64, unit.exponent, 0.0, epsilon = 1e-12));
        if merged.len() > 1 {
            merged.retain(|unit| unit.kind != UnitKind::Dimensionless || !unit.has_unit_factor());
        }
        self.units = merged;
    }

    pub fn multiply(a: &UnitDefinition, b: &UnitDefinition) -> UnitDefinition {
        let mut units = a.units.clone();
        units.extend(b.units.iter().copied());
        let mut result = UnitDefinition::new(None, units);
        result.simplify();
        result
    }

    pub fn divide(a: &UnitDefinition, b: &UnitDefinition) -> UnitDefinition {
        let mut units = a.units.clone();
        units.extend(b.units.iter().map(|unit| unit.with_exponent(-unit.exponent)));
        let mut result = UnitDefinition::new(None, units);
        result.simplify();
        result
    }

    /// Every exponent multiplied by `exponent`.
    pub fn pow(&self, exponent: f64) -> UnitDefinition {
        let units = self
            .units
            .iter()
            .map(|unit| unit.with_exponent(unit.exponent * exponent))
            .collect();
        let mut result = UnitDefinition::new(None, units);
        result.simplify();
        result
    }

    fn sorted_simplified(&self) -> Vec<Unit> {
        let mut def = self.clone();
        def.simplify();
        def.units.sort_by(|a, b| a.kind.cmp(&b.kind));
        def.units
    }

    /// Same units with the same scales and multipliers, in any order.
    pub fn are_identical(a: &UnitDefinition, b: &UnitDefinition) -> bool {
        let a = a.sorted_simplified();
        let b = b.sorted_simplified();
        a.len() == b.len() && a.iter().zip(b.iter()).all(|(a, b)| a.is_identical(b))
    }

    /// Same dimension once both sides are reduced to SI base units;
    /// scales and multipliers are ignored.
    pub fn are_equivalent(a: &UnitDefinition, b: &UnitDefinition) -> bool {
        let a = a.to_si_exponents();
        let b = b.to_si_exponents();
        a.len() == b.len()
            && a.iter().zip(b.iter()).all(|((k1, e1), (k2, e2))| {
                k1 == k2 && approx_eq!(f64, *e1, *e2, epsilon = 1e-12)
            })
    }

    fn to_si_exponents(&self) -> Vec<(UnitKind, f64)> {
        let mut exponents: Vec<(UnitKind, f64)> = vec![];
        let mut add = |kind: UnitKind, exponent: f64| {
            match exponents.iter_mut().find(|(k, _)| *k == kind) {
                Some((_, e)) => *e += exponent,
                None => exponents.push((kind, exponent)),
            }
        };
        for unit in self.units.iter() {
            let (_, base) = unit.kind.to_si();
            if base.is_empty() {
                add(unit.kind, unit.exponent);
            } else {
                for (kind, exponent) in base.iter() {
                    add(*kind, exponent * unit.exponent);
                }
            }
        }
        exponents.retain(|(kind, e)| {
            *kind != UnitKind::Dimensionless && !approx_eq!(f64, *e, 0.0, epsilon = 1e-12)
        });
        exponents.sort_by(|a, b| a.0.cmp(&b.0));
        exponents
    }

    /// The conversion factor from this unit to its SI reduction.
    pub fn si_factor(&self) -> f64 {
        self.units
            .iter()
            .map(|unit| (unit.factor() * unit.kind.to_si().0).powf(unit.exponent))
            .product()
    }

    /// A compact human readable rendering, e.g. `(0.001 metre)^3 * second^-1`.
    pub fn pretty_print(&self) -> String {
        if self.units.is_empty() {
            return "dimensionless".to_owned();
        }
        self.units
            .iter()
            .map(|unit| {
                let base = if unit.has_unit_factor() {
                    unit.kind.name().to_owned()
                } else {
                    format!("({} {})", unit.factor(), unit.kind)
                };
                if approx_eq!(f64, unit.exponent, 1.0, ulps = 4) {
                    base
                } else {
                    format!("{base}^{}", unit.exponent)
                }
            })
            .collect::<Vec<_>>()
            .join(" * ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metre() -> UnitDefinition {
        UnitDefinition::from_kind(UnitKind::Metre)
    }

    fn second() -> UnitDefinition {
        UnitDefinition::from_kind(UnitKind::Second)
    }

    #[test]
    fn test_kind_table_sorted() {
        for pair in UNIT_KINDS.windows(2) {
            assert!(pair[0].0 < pair[1].0);
        }
        for (i, (name, kind)) in UNIT_KINDS.iter().enumerate() {
            assert_eq!(i, *kind as usize);
            assert_eq!(*name, kind.name());
            assert_eq!(Some(*kind), UnitKind::from_name(name));
        }
        assert_eq!(None, UnitKind::from_name("furlong"));
        assert!("furlong".parse::<UnitKind>().is_err());
        assert_eq!(Ok(UnitKind::Mole), "mole".parse::<UnitKind>());
    }

    #[test]
    fn test_multiply_divide() {
        let area = UnitDefinition::multiply(&metre(), &metre());
        assert_eq!(1, area.units.len());
        assert_eq!(2.0, area.units[0].exponent);

        let speed = UnitDefinition::divide(&metre(), &second());
        assert_eq!(2, speed.units.len());
        assert_eq!(-1.0, speed.units[1].exponent);
        assert_eq!("metre * second^-1", speed.pretty_print());

        let nothing = UnitDefinition::divide(&metre(), &metre());
        assert!(nothing.is_empty());
        assert!(nothing.is_dimensionless());
        assert_eq!("dimensionless", nothing.pretty_print());
    }

    #[test]
    fn test_pow() {
        let volume = metre().pow(3.0);
        assert_eq!(vec![Unit::new(UnitKind::Metre).with_exponent(3.0)], volume.units);
        let root = volume.pow(1.0 / 3.0);
        assert!(UnitDefinition::are_identical(&root, &metre()));
    }

    #[test]
    fn test_simplify_mixed_scales() {
        let mut def = UnitDefinition::new(
            None,
            vec![
                Unit::new(UnitKind::Metre).with_scale(-2),
                Unit::new(UnitKind::Metre),
            ],
        );
        def.simplify();
        assert_eq!(1, def.units.len());
        assert_eq!(2.0, def.units[0].exponent);
        assert!(approx_eq!(f64, def.units[0].factor(), 0.1, epsilon = 1e-12));
    }

    #[test]
    fn test_identical_and_equivalent() {
        let a = UnitDefinition::new(
            None,
            vec![Unit::new(UnitKind::Second).with_exponent(-1.0), Unit::new(UnitKind::Mole)],
        );
        let b = UnitDefinition::new(
            Some("rate"),
            vec![Unit::new(UnitKind::Mole), Unit::new(UnitKind::Second).with_exponent(-1.0)],
        );
        assert!(UnitDefinition::are_identical(&a, &b));

        let cm = UnitDefinition::new(None, vec![Unit::new(UnitKind::Metre).with_scale(-2)]);
        assert!(!UnitDefinition::are_identical(&cm, &metre()));
        assert!(UnitDefinition::are_equivalent(&cm, &metre()));

        let litre = UnitDefinition::from_kind(UnitKind::Litre);
        assert!(UnitDefinition::are_equivalent(&litre, &metre().pow(3.0)));
        assert!(approx_eq!(f64, litre.si_factor(), 0.001, epsilon = 1e-15));

        let newton = UnitDefinition::from_kind(UnitKind::Newton);
        let derived = UnitDefinition::new(
            None,
            vec![
                Unit::new(UnitKind::Kilogram),
                Unit::new(UnitKind::Metre),
                Unit::new(UnitKind::Second).with_exponent(-2.0),
            ],
        );
        assert!(UnitDefinition::are_equivalent(&newton, &derived));
        assert!(!UnitDefinition::are_equivalent(&newton, &metre()));
    }

    #[test]
    fn test_pretty_print_scaled() {
        let def = UnitDefinition::new(
            None,
            vec![Unit::new(UnitKind::Litre).with_scale(-3).with_exponent(2.0)],
        );
        assert_eq!("(0.001 litre)^2", def.pretty_print());
    }
}

// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::common::{Error, ErrorCode, ErrorKind, Result};
use crate::model::Model;
use crate::plugin::PluginRegistry;

/// How a single-argument `log(x)` is read.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseLogType {
    #[default]
    Log10,
    Ln,
    Error,
}

/// Options for parsing and printing Level 3 infix formulas.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserSettings {
    /// Identifiers and function definitions of this model shadow the
    /// built-in names.
    #[serde(skip)]
    pub model: Option<Arc<Model>>,
    pub parse_log: ParseLogType,
    /// Fold unary minus into number literals, and `--x` into `x`.
    pub collapse_minus: bool,
    /// Read `5 mole` as a number with units.
    pub parse_units: bool,
    /// Read `avogadro` as the Avogadro csymbol instead of a plain name.
    pub avogadro_csymbol: bool,
    /// Whether built-in function and constant names must match case.
    pub case_sensitive: bool,
    /// Read `a % b` as `rem(a, b)` instead of the piecewise expansion.
    pub modulo_l3v2: bool,
    pub print_units: bool,
    #[serde(skip)]
    pub plugins: PluginRegistry,
}

impl Default for ParserSettings {
    fn default() -> Self {
        ParserSettings {
            model: None,
            parse_log: ParseLogType::Log10,
            collapse_minus: false,
            parse_units: true,
            avogadro_csymbol: true,
            case_sensitive: false,
            modulo_l3v2: false,
            print_units: true,
            plugins: PluginRegistry::new(),
        }
    }
}

impl ParserSettings {
    pub fn new() -> Self {
        Default::default()
    }

    /// Settings from a JSON object; fields that are left out keep their
    /// default values.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|err| {
            Error::new(
                ErrorKind::Formula,
                ErrorCode::InvalidAttributeValue,
                Some(err.to_string()),
            )
        })
    }

    pub fn with_model(mut self, model: Arc<Model>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_plugins(mut self, plugins: PluginRegistry) -> Self {
        self.plugins = plugins;
        self
    }

    pub fn with_parse_log(mut self, parse_log: ParseLogType) -> Self {
        self.parse_log = parse_log;
        self
    }

    pub fn with_collapse_minus(mut self, collapse_minus: bool) -> Self {
        self.collapse_minus = collapse_minus;
        self
    }

    pub fn with_parse_units(mut self, parse_units: bool) -> Self {
        self.parse_units = parse_units;
        self
    }

    pub fn with_print_units(mut self, print_units: bool) -> Self {
        self.print_units = print_units;
        self
    }

    pub fn with_case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn with_modulo_l3v2(mut self, modulo_l3v2: bool) -> Self {
        self.modulo_l3v2 = modulo_l3v2;
        self
    }

    pub fn with_avogadro_csymbol(mut self, avogadro_csymbol: bool) -> Self {
        self.avogadro_csymbol = avogadro_csymbol;
        self
    }
}

#[test]
fn test_defaults() {
    let settings = ParserSettings::default();
    assert_eq!(ParseLogType::Log10, settings.parse_log);
    assert!(!settings.collapse_minus);
    assert!(settings.parse_units);
    assert!(settings.avogadro_csymbol);
    assert!(!settings.case_sensitive);
    assert!(settings.print_units);
    assert!(settings.model.is_none());
    assert!(settings.plugins.is_empty());
}

#[test]
fn test_from_json() {
    let settings =
        ParserSettings::from_json(r#"{"parse_log": "ln", "collapse_minus": true}"#).unwrap();
    assert_eq!(ParseLogType::Ln, settings.parse_log);
    assert!(settings.collapse_minus);
    // unspecified fields fall back to defaults
    assert!(settings.parse_units);

    assert_eq!(
        ParserSettings::default(),
        ParserSettings::from_json("{}").unwrap()
    );

    let err = ParserSettings::from_json(r#"{"parse_log": "log2"}"#).unwrap_err();
    assert_eq!(ErrorCode::InvalidAttributeValue, err.code);
}

#[test]
fn test_settings_compare_by_value() {
    let model = Arc::new(Model::new().with_declaration("x", None));
    let a = ParserSettings::new().with_model(model.clone());
    let b = ParserSettings::new().with_model(Arc::new(Model::new().with_declaration("x", None)));
    assert_eq!(a, b);
    assert_ne!(a, ParserSettings::new());
    assert_ne!(a.clone().with_collapse_minus(true), a);
}

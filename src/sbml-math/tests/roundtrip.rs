// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! End-to-end tests through the public API: infix text, MathML and unit
//! inference on formulas of the kind found in SBML kinetic laws.

use std::sync::Arc;

use sbml_math::{
    ErrorCode, ErrorLog, Model, NodeKind, ParserSettings, Unit, UnitContext, UnitDefinition,
    UnitKind, formula_to_l3_string, formula_to_l3_string_with_settings, formula_to_string,
    infer_units, parse_formula, parse_l3_formula, parse_l3_formula_logged,
    parse_l3_formula_with_settings, read_mathml, write_mathml,
};

static KINETIC_LAWS: &[&str] = &[
    "compartment * k1 * S1 * S2 / (Km + S1)",
    "Vmax * S / (Km + S)",
    "kf * A^2 - kr * B",
    "piecewise(k1, time < 10, k2)",
    "exp(-k * time)",
    "delay(S, 5) + rateOf(P)",
    "Vmax * S^n / (K^n + S^n)",
    "(1 - a) * b / (c * (d + e))",
];

#[test]
fn kinetic_laws_roundtrip() {
    for &formula in KINETIC_LAWS {
        eprintln!("roundtrip: {formula}");
        let node = parse_l3_formula(formula).unwrap();
        assert_eq!(formula, formula_to_l3_string(&node));

        let xml = write_mathml(&node).unwrap();
        let mut log = ErrorLog::new();
        let read = read_mathml(&xml, &mut log);
        assert!(log.is_empty(), "{formula}: {log:?}");
        assert_eq!(node, read, "{formula}\n{xml}");
        assert_eq!(formula, formula_to_l3_string(&read));
    }
}

#[test]
fn level1_to_level3() {
    let cases = [
        ("pow(x, 2) + log(y)", "x^2 + ln(y)"),
        ("gt(a, b)", "a > b"),
        ("and(lt(a, b), geq(c, d))", "a < b && c >= d"),
        ("sqr(x) * sqrt(y)", "x^2 * sqrt(y)"),
    ];
    for (l1, l3) in cases {
        let node = parse_formula(l1).unwrap();
        assert_eq!(l3, formula_to_l3_string(&node), "{l1}");
    }

    let node = parse_l3_formula("a > b && ln(c) == 2").unwrap();
    assert_eq!("and(gt(a, b), eq(log(c), 2))", formula_to_string(&node));
}

#[test]
fn settings_from_json() {
    let settings = ParserSettings::from_json(r#"{"parse_log": "ln", "parse_units": false}"#).unwrap();

    let node = parse_l3_formula_with_settings("log(x)", &settings).unwrap();
    assert_eq!(NodeKind::FunctionLn, node.kind());
    let node = parse_l3_formula("log(x)").unwrap();
    assert_eq!("log10(x)", formula_to_l3_string(&node));

    let err = parse_l3_formula_with_settings("5 mole", &settings).unwrap_err();
    assert_eq!(ErrorCode::ExtraToken, err.code);

    let node = parse_l3_formula("5 mole").unwrap();
    assert_eq!(Some("mole"), node.units());
    let quiet = ParserSettings::new().with_print_units(false);
    assert_eq!("5", formula_to_l3_string_with_settings(&node, &quiet));
}

#[test]
fn logged_parse_keeps_going() {
    let settings = ParserSettings::new();
    let mut log = ErrorLog::new();

    let node = parse_l3_formula_logged("a + * b", &settings, &mut log);
    assert!(node.is_unknown());
    assert_eq!(1, log.len());
    assert_eq!(ErrorCode::UnrecognizedToken, log.errors()[0].code);
    assert_eq!(5, log.errors()[0].column);

    let node = parse_l3_formula_logged("a + b", &settings, &mut log);
    assert_eq!(NodeKind::Plus, node.kind());
    assert_eq!(1, log.len());
}

#[test]
fn model_ids_shadow_builtins() {
    let model = Arc::new(Model::new().with_declaration("pi", None).with_declaration("sin", None));
    let settings = ParserSettings::new().with_model(model);

    let node = parse_l3_formula_with_settings("pi * sin", &settings).unwrap();
    assert_eq!(vec!["pi", "sin"], node.list_of_names());
    let node = parse_l3_formula("pi * 2").unwrap();
    assert_eq!(NodeKind::ConstantPi, node.children()[0].kind());
}

fn kinetics_model() -> Model {
    Model::new()
        .with_unit_definition(UnitDefinition::new(
            Some("per_second"),
            vec![Unit::new(UnitKind::Second).with_exponent(-1.0)],
        ))
        .with_declaration("k", Some("per_second"))
        .with_declaration("S", Some("mole"))
        .with_declaration("V", Some("litre"))
        .with_time_units("second")
}

#[test]
fn unit_inference() {
    let mut model = kinetics_model();

    let node = parse_l3_formula("k * S").unwrap();
    let result = infer_units(&node, &mut model);
    assert!(!result.contains_undeclared_units);
    let expected = UnitDefinition::new(
        None,
        vec![
            Unit::new(UnitKind::Mole),
            Unit::new(UnitKind::Second).with_exponent(-1.0),
        ],
    );
    assert!(UnitDefinition::are_equivalent(&expected, &result.unit_definition));
    assert_eq!(Some("unitSid_0"), result.unit_definition.id.as_deref());
    assert_eq!(2, model.unit_definitions().len());

    // the same composite is found again rather than registered twice
    let node = parse_l3_formula("S * k").unwrap();
    let result = infer_units(&node, &mut model);
    assert_eq!(Some("unitSid_0"), result.unit_definition.id.as_deref());
    assert_eq!(2, model.unit_definitions().len());

    // a bare literal makes the result incomplete, but ignorably so
    let node = parse_l3_formula("2 * S / V").unwrap();
    let result = infer_units(&node, &mut model);
    assert!(result.contains_undeclared_units);
    assert!(result.can_ignore_undeclared_units);

    let node = parse_l3_formula("S / 2 second").unwrap();
    let result = infer_units(&node, &mut model);
    assert!(!result.contains_undeclared_units);
}

// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! The closed set of expression node kinds, the MathML element name table
//! and the classification predicates over kinds.
//!
//! Kinds defined by third-party packages are carried as
//! [`NodeKind::Extension`]; every predicate here takes an optional
//! [`PluginRegistry`] so that the owning package can classify them.

use crate::plugin::PluginRegistry;

/// An extension kind is owned by the package named `package`; `code` is
/// private to that package.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExtensionKind {
    pub package: &'static str,
    pub code: u16,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    // operators
    Plus,
    Minus,
    Times,
    Divide,
    Power,
    // numbers
    Integer,
    Real,
    RealE,
    Rational,
    // named references
    Name,
    NameAvogadro,
    NameTime,
    // constants
    ConstantE,
    ConstantFalse,
    ConstantPi,
    ConstantTrue,
    Lambda,
    // functions
    Function,
    FunctionAbs,
    FunctionArccos,
    FunctionArccosh,
    FunctionArccot,
    FunctionArccoth,
    FunctionArccsc,
    FunctionArccsch,
    FunctionArcsec,
    FunctionArcsech,
    FunctionArcsin,
    FunctionArcsinh,
    FunctionArctan,
    FunctionArctanh,
    FunctionCeiling,
    FunctionCos,
    FunctionCosh,
    FunctionCot,
    FunctionCoth,
    FunctionCsc,
    FunctionCsch,
    FunctionDelay,
    FunctionExp,
    FunctionFactorial,
    FunctionFloor,
    FunctionLn,
    FunctionLog,
    FunctionPiecewise,
    FunctionPower,
    FunctionRoot,
    FunctionSec,
    FunctionSech,
    FunctionSin,
    FunctionSinh,
    FunctionTan,
    FunctionTanh,
    FunctionMax,
    FunctionMin,
    FunctionQuotient,
    FunctionRem,
    FunctionRateOf,
    // logical
    LogicalAnd,
    LogicalNot,
    LogicalOr,
    LogicalXor,
    LogicalImplies,
    // relational
    RelationalEq,
    RelationalGeq,
    RelationalGt,
    RelationalLeq,
    RelationalLt,
    RelationalNeq,
    // structural packaging
    QualifierBvar,
    QualifierLogbase,
    QualifierDegree,
    ConstructorPiece,
    ConstructorOtherwise,
    Semantics,
    Unknown,
    Extension(ExtensionKind),
}

/// How a kind is classified, used for kinds the core does not know.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum KindClass {
    Number,
    Name,
    Constant,
    UnaryFunction,
    BinaryFunction,
    NaryFunction,
    Qualifier,
    Other,
}

/// The number of children a kind accepts.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    Between(usize, usize),
    AtLeast(usize),
    Any,
}

impl Arity {
    pub fn accepts(self, n: usize) -> bool {
        match self {
            Arity::Exactly(m) => n == m,
            Arity::Between(lo, hi) => lo <= n && n <= hi,
            Arity::AtLeast(m) => n >= m,
            Arity::Any => true,
        }
    }
}

// must stay sorted: kind_from_name binary searches it
const NAME_TABLE: &[(&str, NodeKind)] = &[
    ("abs", NodeKind::FunctionAbs),
    ("and", NodeKind::LogicalAnd),
    ("arccos", NodeKind::FunctionArccos),
    ("arccosh", NodeKind::FunctionArccosh),
    ("arccot", NodeKind::FunctionArccot),
    ("arccoth", NodeKind::FunctionArccoth),
    ("arccsc", NodeKind::FunctionArccsc),
    ("arccsch", NodeKind::FunctionArccsch),
    ("arcsec", NodeKind::FunctionArcsec),
    ("arcsech", NodeKind::FunctionArcsech),
    ("arcsin", NodeKind::FunctionArcsin),
    ("arcsinh", NodeKind::FunctionArcsinh),
    ("arctan", NodeKind::FunctionArctan),
    ("arctanh", NodeKind::FunctionArctanh),
    ("bvar", NodeKind::QualifierBvar),
    ("ceiling", NodeKind::FunctionCeiling),
    ("cos", NodeKind::FunctionCos),
    ("cosh", NodeKind::FunctionCosh),
    ("cot", NodeKind::FunctionCot),
    ("coth", NodeKind::FunctionCoth),
    ("csc", NodeKind::FunctionCsc),
    ("csch", NodeKind::FunctionCsch),
    ("degree", NodeKind::QualifierDegree),
    ("divide", NodeKind::Divide),
    ("eq", NodeKind::RelationalEq),
    ("exp", NodeKind::FunctionExp),
    ("exponentiale", NodeKind::ConstantE),
    ("factorial", NodeKind::FunctionFactorial),
    ("false", NodeKind::ConstantFalse),
    ("floor", NodeKind::FunctionFloor),
    ("geq", NodeKind::RelationalGeq),
    ("gt", NodeKind::RelationalGt),
    ("implies", NodeKind::LogicalImplies),
    ("lambda", NodeKind::Lambda),
    ("leq", NodeKind::RelationalLeq),
    ("ln", NodeKind::FunctionLn),
    ("log", NodeKind::FunctionLog),
    ("logbase", NodeKind::QualifierLogbase),
    ("lt", NodeKind::RelationalLt),
    ("max", NodeKind::FunctionMax),
    ("min", NodeKind::FunctionMin),
    ("minus", NodeKind::Minus),
    ("neq", NodeKind::RelationalNeq),
    ("not", NodeKind::LogicalNot),
    ("or", NodeKind::LogicalOr),
    ("otherwise", NodeKind::ConstructorOtherwise),
    ("pi", NodeKind::ConstantPi),
    ("piece", NodeKind::ConstructorPiece),
    ("piecewise", NodeKind::FunctionPiecewise),
    ("plus", NodeKind::Plus),
    ("power", NodeKind::Power),
    ("quotient", NodeKind::FunctionQuotient),
    ("rem", NodeKind::FunctionRem),
    ("root", NodeKind::FunctionRoot),
    ("sec", NodeKind::FunctionSec),
    ("sech", NodeKind::FunctionSech),
    ("semantics", NodeKind::Semantics),
    ("sin", NodeKind::FunctionSin),
    ("sinh", NodeKind::FunctionSinh),
    ("tan", NodeKind::FunctionTan),
    ("tanh", NodeKind::FunctionTanh),
    ("times", NodeKind::Times),
    ("true", NodeKind::ConstantTrue),
    ("xor", NodeKind::LogicalXor),
];

/// Look up a MathML element name.  Matching is case-sensitive, and names
/// that aren't in the table map to [`NodeKind::Unknown`].
pub fn kind_from_name(name: &str) -> NodeKind {
    match NAME_TABLE.binary_search_by(|(candidate, _)| (*candidate).cmp(name)) {
        Ok(i) => NAME_TABLE[i].1,
        Err(_) => NodeKind::Unknown,
    }
}

/// Like [`kind_from_name`], but falls back to the registered packages for
/// names the core vocabulary doesn't define.
pub fn kind_from_name_with(name: &str, plugins: &PluginRegistry) -> NodeKind {
    match kind_from_name(name) {
        NodeKind::Unknown => plugins.kind_for_name(name).unwrap_or(NodeKind::Unknown),
        kind => kind,
    }
}

pub fn name_from_kind(kind: NodeKind) -> Option<&'static str> {
    name_from_kind_with(kind, None)
}

pub fn name_from_kind_with(kind: NodeKind, plugins: Option<&PluginRegistry>) -> Option<&'static str> {
    match kind {
        NodeKind::Plus => Some("plus"),
        NodeKind::Minus => Some("minus"),
        NodeKind::Times => Some("times"),
        NodeKind::Divide => Some("divide"),
        NodeKind::Power | NodeKind::FunctionPower => Some("power"),
        NodeKind::FunctionDelay => Some("delay"),
        NodeKind::FunctionRateOf => Some("rateOf"),
        NodeKind::Extension(ext) => plugins.and_then(|p| p.name_for_kind(ext)),
        _ => NAME_TABLE
            .iter()
            .find(|(_, candidate)| *candidate == kind)
            .map(|(name, _)| *name),
    }
}

fn extension_class(kind: NodeKind, plugins: Option<&PluginRegistry>) -> Option<KindClass> {
    match kind {
        NodeKind::Extension(ext) => plugins.and_then(|p| p.classify(ext)),
        _ => None,
    }
}

pub fn represents_number(kind: NodeKind, plugins: Option<&PluginRegistry>) -> bool {
    use NodeKind::*;
    match kind {
        Integer | Real | RealE | Rational => true,
        Extension(_) => extension_class(kind, plugins) == Some(KindClass::Number),
        _ => false,
    }
}

pub fn represents_name(kind: NodeKind, plugins: Option<&PluginRegistry>) -> bool {
    use NodeKind::*;
    match kind {
        Name | NameAvogadro | NameTime => true,
        Extension(_) => extension_class(kind, plugins) == Some(KindClass::Name),
        _ => false,
    }
}

pub fn represents_constant(kind: NodeKind, plugins: Option<&PluginRegistry>) -> bool {
    use NodeKind::*;
    match kind {
        ConstantE | ConstantFalse | ConstantPi | ConstantTrue => true,
        Extension(_) => extension_class(kind, plugins) == Some(KindClass::Constant),
        _ => false,
    }
}

/// Leaf kinds never carry children.
pub fn represents_leaf(kind: NodeKind, plugins: Option<&PluginRegistry>) -> bool {
    represents_number(kind, plugins)
        || represents_name(kind, plugins)
        || represents_constant(kind, plugins)
}

pub fn is_unary_function(kind: NodeKind, plugins: Option<&PluginRegistry>) -> bool {
    use NodeKind::*;
    match kind {
        FunctionAbs | FunctionArccos | FunctionArccosh | FunctionArccot | FunctionArccoth
        | FunctionArccsc | FunctionArccsch | FunctionArcsec | FunctionArcsech | FunctionArcsin
        | FunctionArcsinh | FunctionArctan | FunctionArctanh | FunctionCeiling | FunctionCos
        | FunctionCosh | FunctionCot | FunctionCoth | FunctionCsc | FunctionCsch | FunctionExp
        | FunctionFactorial | FunctionFloor | FunctionLn | FunctionSec | FunctionSech
        | FunctionSin | FunctionSinh | FunctionTan | FunctionTanh | FunctionRateOf
        | LogicalNot => true,
        Extension(_) => extension_class(kind, plugins) == Some(KindClass::UnaryFunction),
        _ => false,
    }
}

/// Binary kinds take two operands; `minus`, `log` and `root` also accept
/// a single one.
pub fn is_binary_function(kind: NodeKind, plugins: Option<&PluginRegistry>) -> bool {
    use NodeKind::*;
    match kind {
        Minus | Divide | Power | FunctionPower | FunctionDelay | FunctionLog | FunctionRoot
        | FunctionQuotient | FunctionRem | LogicalImplies | RelationalNeq => true,
        Extension(_) => extension_class(kind, plugins) == Some(KindClass::BinaryFunction),
        _ => false,
    }
}

pub fn is_nary_function(kind: NodeKind, plugins: Option<&PluginRegistry>) -> bool {
    use NodeKind::*;
    match kind {
        Plus | Times | LogicalAnd | LogicalOr | LogicalXor | RelationalEq | RelationalGeq
        | RelationalGt | RelationalLeq | RelationalLt | FunctionMax | FunctionMin => true,
        Extension(_) => extension_class(kind, plugins) == Some(KindClass::NaryFunction),
        _ => false,
    }
}

pub fn is_qualifier(kind: NodeKind, plugins: Option<&PluginRegistry>) -> bool {
    use NodeKind::*;
    match kind {
        QualifierBvar | QualifierLogbase | QualifierDegree => true,
        Extension(_) => extension_class(kind, plugins) == Some(KindClass::Qualifier),
        _ => false,
    }
}

pub fn is_relational(kind: NodeKind) -> bool {
    use NodeKind::*;
    matches!(
        kind,
        RelationalEq | RelationalGeq | RelationalGt | RelationalLeq | RelationalLt | RelationalNeq
    )
}

pub fn is_logical(kind: NodeKind) -> bool {
    use NodeKind::*;
    matches!(
        kind,
        LogicalAnd | LogicalNot | LogicalOr | LogicalXor | LogicalImplies
    )
}

/// The trigonometric and hyperbolic functions and their inverses.
pub fn is_trigonometric(kind: NodeKind) -> bool {
    use NodeKind::*;
    matches!(
        kind,
        FunctionArccos
            | FunctionArccosh
            | FunctionArccot
            | FunctionArccoth
            | FunctionArccsc
            | FunctionArccsch
            | FunctionArcsec
            | FunctionArcsech
            | FunctionArcsin
            | FunctionArcsinh
            | FunctionArctan
            | FunctionArctanh
            | FunctionCos
            | FunctionCosh
            | FunctionCot
            | FunctionCoth
            | FunctionCsc
            | FunctionCsch
            | FunctionSec
            | FunctionSech
            | FunctionSin
            | FunctionSinh
            | FunctionTan
            | FunctionTanh
    )
}

/// Kinds that can appear in call position in infix text, `name(args)`.
pub fn is_callable(kind: NodeKind, plugins: Option<&PluginRegistry>) -> bool {
    use NodeKind::*;
    match kind {
        Plus | Minus | Times | Divide | Power | Lambda | Function | FunctionPiecewise => true,
        Integer | Real | RealE | Rational | Name | NameAvogadro | NameTime | ConstantE
        | ConstantFalse | ConstantPi | ConstantTrue | QualifierBvar | QualifierLogbase
        | QualifierDegree | ConstructorPiece | ConstructorOtherwise | Semantics | Unknown => false,
        Extension(_) => !matches!(
            extension_class(kind, plugins),
            None | Some(KindClass::Number)
                | Some(KindClass::Name)
                | Some(KindClass::Constant)
                | Some(KindClass::Qualifier)
        ),
        _ => true,
    }
}

/// The legal child counts for `kind`.  `None` means nothing can be said
/// about it: the kind is `Unknown`, or its package isn't registered.
pub fn arity(kind: NodeKind, plugins: Option<&PluginRegistry>) -> Option<Arity> {
    use NodeKind::*;
    let arity = match kind {
        Integer | Real | RealE | Rational | Name | NameAvogadro | NameTime | ConstantE
        | ConstantFalse | ConstantPi | ConstantTrue => Arity::Exactly(0),
        Minus | FunctionLog | FunctionRoot => Arity::Between(1, 2),
        Divide | Power | FunctionPower | FunctionDelay | FunctionQuotient | FunctionRem
        | LogicalImplies | RelationalNeq => Arity::Exactly(2),
        Plus | Times | LogicalAnd | LogicalOr | LogicalXor => Arity::Any,
        RelationalEq | RelationalGeq | RelationalGt | RelationalLeq | RelationalLt => {
            Arity::AtLeast(2)
        }
        FunctionMax | FunctionMin => Arity::AtLeast(1),
        Lambda => Arity::AtLeast(1),
        Function | FunctionPiecewise => Arity::Any,
        QualifierBvar | QualifierLogbase | QualifierDegree | ConstructorOtherwise | Semantics => {
            Arity::Exactly(1)
        }
        ConstructorPiece => Arity::Exactly(2),
        Unknown => return None,
        Extension(ext) => return plugins.and_then(|p| p.arity(ext)),
        _ if is_unary_function(kind, None) => Arity::Exactly(1),
        _ => Arity::Any,
    };
    Some(arity)
}

#[test]
fn test_name_table_sorted() {
    for pair in NAME_TABLE.windows(2) {
        assert!(pair[0].0 < pair[1].0, "{} >= {}", pair[0].0, pair[1].0);
    }
}

#[test]
fn test_kind_from_name() {
    assert_eq!(NodeKind::FunctionArccosh, kind_from_name("arccosh"));
    assert_eq!(NodeKind::FunctionPiecewise, kind_from_name("piecewise"));
    assert_eq!(NodeKind::QualifierBvar, kind_from_name("bvar"));
    assert_eq!(NodeKind::Plus, kind_from_name("plus"));
    assert_eq!(NodeKind::LogicalXor, kind_from_name("xor"));
    assert_eq!(NodeKind::FunctionAbs, kind_from_name("abs"));
    // the vocabulary is case-sensitive
    assert_eq!(NodeKind::Unknown, kind_from_name("Sin"));
    assert_eq!(NodeKind::Unknown, kind_from_name("sqrt"));
    assert_eq!(NodeKind::Unknown, kind_from_name(""));

    for (name, kind) in NAME_TABLE.iter() {
        assert_eq!(*kind, kind_from_name(name));
        assert_eq!(Some(*name), name_from_kind(*kind));
    }
}

#[test]
fn test_name_from_kind() {
    assert_eq!(Some("plus"), name_from_kind(NodeKind::Plus));
    assert_eq!(Some("power"), name_from_kind(NodeKind::Power));
    assert_eq!(Some("delay"), name_from_kind(NodeKind::FunctionDelay));
    assert_eq!(None, name_from_kind(NodeKind::Integer));
    assert_eq!(None, name_from_kind(NodeKind::Unknown));
}

#[test]
fn test_predicates() {
    use NodeKind::*;
    assert!(represents_number(Integer, None));
    assert!(represents_number(RealE, None));
    assert!(!represents_number(Name, None));
    assert!(is_unary_function(FunctionSin, None));
    assert!(is_unary_function(LogicalNot, None));
    assert!(!is_unary_function(FunctionLog, None));
    assert!(is_binary_function(Divide, None));
    assert!(is_binary_function(FunctionDelay, None));
    assert!(!is_binary_function(Plus, None));
    assert!(is_nary_function(Plus, None));
    assert!(is_nary_function(RelationalLt, None));
    assert!(!is_nary_function(RelationalNeq, None));
    assert!(is_qualifier(QualifierDegree, None));
    assert!(!is_qualifier(ConstructorPiece, None));

    // extension kinds are unclassified without their package
    let ext = Extension(ExtensionKind {
        package: "nowhere",
        code: 0,
    });
    assert!(!represents_number(ext, None));
    assert!(!is_unary_function(ext, None));
    assert_eq!(None, arity(ext, None));
}

#[test]
fn test_arity() {
    use NodeKind::*;
    assert_eq!(Some(Arity::Exactly(0)), arity(Integer, None));
    assert_eq!(Some(Arity::Exactly(1)), arity(FunctionCos, None));
    assert_eq!(Some(Arity::Between(1, 2)), arity(Minus, None));
    assert_eq!(Some(Arity::AtLeast(2)), arity(RelationalGt, None));
    assert_eq!(None, arity(Unknown, None));
    assert!(Arity::Any.accepts(0));
    assert!(Arity::Between(1, 2).accepts(2));
    assert!(!Arity::Between(1, 2).accepts(3));
}

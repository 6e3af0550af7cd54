// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Content MathML, the subset SBML uses for math.
//!
//! The reader never fails outright: problems go to an [`ErrorLog`], and
//! whatever couldn't be read is replaced by an `unknown` node.  Arity
//! problems are not checked while reading; see
//! [`AstNode::is_well_formed_node`](crate::ast::AstNode::is_well_formed_node).
//!
//! [`ErrorLog`]: crate::common::ErrorLog

mod reader;
mod writer;


pub use self::reader::{MAX_MATHML_DEPTH, read_mathml, read_mathml_with_plugins};
pub use self::writer::{write_mathml, write_mathml_with_plugins};

pub const MATHML_NS: &str = "http://www.w3.org/1998/Math/MathML";
pub const SBML_NS: &str = "http://www.sbml.org/sbml/level3/version1/core";

const TIME_URL: &str = "http://www.sbml.org/sbml/symbols/time";
const AVOGADRO_URL: &str = "http://www.sbml.org/sbml/symbols/avogadro";
const DELAY_URL: &str = "http://www.sbml.org/sbml/symbols/delay";
const RATE_OF_URL: &str = "http://www.sbml.org/sbml/symbols/rateOf";

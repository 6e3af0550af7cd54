// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::io::Cursor;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use super::{AVOGADRO_URL, DELAY_URL, MATHML_NS, RATE_OF_URL, SBML_NS, TIME_URL};
use crate::ast::{AstNode, NodeData};
use crate::common::{Error, ErrorCode, ErrorKind, Result};
use crate::kinds::{self, NodeKind};
use crate::plugin::PluginRegistry;

type XmlWriter = Writer<Cursor<Vec<u8>>>;

fn xml_error(err: std::io::Error) -> Error {
    Error::new(
        ErrorKind::MathML,
        ErrorCode::XmlSerialization,
        Some(err.to_string()),
    )
}

fn unwritable(details: String) -> Error {
    Error::new(ErrorKind::MathML, ErrorCode::XmlSerialization, Some(details))
}

fn write_tag_start_with_attrs(
    writer: &mut XmlWriter,
    tag_name: &str,
    attrs: &[(&str, &str)],
) -> Result<()> {
    let mut elem = BytesStart::new(tag_name);
    for attr in attrs.iter() {
        elem.push_attribute(*attr);
    }
    writer.write_event(Event::Start(elem)).map_err(xml_error)
}

fn write_tag_end(writer: &mut XmlWriter, tag_name: &str) -> Result<()> {
    writer
        .write_event(Event::End(BytesEnd::new(tag_name)))
        .map_err(xml_error)
}

fn write_tag_text(writer: &mut XmlWriter, content: &str) -> Result<()> {
    writer
        .write_event(Event::Text(BytesText::new(content)))
        .map_err(xml_error)
}

fn write_tag_with_attrs(
    writer: &mut XmlWriter,
    tag_name: &str,
    content: &str,
    attrs: &[(&str, &str)],
) -> Result<()> {
    write_tag_start_with_attrs(writer, tag_name, attrs)?;

    write_tag_text(writer, content)?;

    write_tag_end(writer, tag_name)
}

fn write_empty_with_attrs(
    writer: &mut XmlWriter,
    tag_name: &str,
    attrs: &[(&str, &str)],
) -> Result<()> {
    let mut elem = BytesStart::new(tag_name);
    for attr in attrs.iter() {
        elem.push_attribute(*attr);
    }
    writer.write_event(Event::Empty(elem)).map_err(xml_error)
}

fn write_empty(writer: &mut XmlWriter, tag_name: &str) -> Result<()> {
    write_empty_with_attrs(writer, tag_name, &[])
}

struct MathMLWriter<'a> {
    plugins: &'a PluginRegistry,
}

impl MathMLWriter<'_> {
    fn attrs<'n>(&self, node: &'n AstNode) -> Vec<(&'n str, &'n str)> {
        let mut attrs = vec![];
        if let Some(id) = node.id() {
            attrs.push(("id", id));
        }
        if let Some(class) = node.class() {
            attrs.push(("class", class));
        }
        if let Some(style) = node.style() {
            attrs.push(("style", style));
        }
        if let Some(url) = node.definition_url() {
            if matches!(node.kind(), NodeKind::Name | NodeKind::Semantics) {
                attrs.push(("definitionURL", url));
            }
        }
        if let Some(payload) = node.extension() {
            for (key, value) in payload.attributes.iter() {
                attrs.push((key.as_str(), value.as_str()));
            }
        }
        attrs
    }

    fn element_name(&self, kind: NodeKind) -> Result<&'static str> {
        kinds::name_from_kind_with(kind, Some(self.plugins))
            .ok_or_else(|| unwritable(format!("{kind:?} has no MathML element")))
    }

    fn write_node(&self, writer: &mut XmlWriter, node: &AstNode) -> Result<()> {
        let attrs = self.attrs(node);
        match node.kind() {
            NodeKind::Integer | NodeKind::Real | NodeKind::RealE | NodeKind::Rational => {
                self.write_number(writer, node, attrs)
            }
            NodeKind::Name => write_tag_with_attrs(writer, "ci", node.name().unwrap_or(""), &attrs),
            NodeKind::NameTime => self.write_csymbol(writer, node, TIME_URL, "time", attrs),
            NodeKind::NameAvogadro => {
                self.write_csymbol(writer, node, AVOGADRO_URL, "avogadro", attrs)
            }
            NodeKind::ConstantE
            | NodeKind::ConstantPi
            | NodeKind::ConstantTrue
            | NodeKind::ConstantFalse => {
                write_empty_with_attrs(writer, self.element_name(node.kind())?, &attrs)
            }
            NodeKind::Lambda => {
                write_tag_start_with_attrs(writer, "lambda", &attrs)?;
                for bvar in node.bound_variables() {
                    self.write_wrapped(writer, "bvar", &[bvar])?;
                }
                for child in node.children().iter().skip(node.num_bvars()) {
                    self.write_node(writer, child)?;
                }
                write_tag_end(writer, "lambda")
            }
            NodeKind::FunctionPiecewise => {
                write_tag_start_with_attrs(writer, "piecewise", &attrs)?;
                let mut pieces = node.children().chunks_exact(2);
                for piece in pieces.by_ref() {
                    self.write_wrapped(writer, "piece", &[&piece[0], &piece[1]])?;
                }
                if let [otherwise] = pieces.remainder() {
                    self.write_wrapped(writer, "otherwise", &[otherwise])?;
                }
                write_tag_end(writer, "piecewise")
            }
            NodeKind::Semantics => {
                write_tag_start_with_attrs(writer, "semantics", &attrs)?;
                for child in node.children() {
                    self.write_node(writer, child)?;
                }
                for annotation in node.annotations() {
                    writer
                        .write_event(Event::Text(BytesText::from_escaped(annotation.as_str())))
                        .map_err(xml_error)?;
                }
                write_tag_end(writer, "semantics")
            }
            NodeKind::QualifierBvar
            | NodeKind::QualifierLogbase
            | NodeKind::QualifierDegree
            | NodeKind::ConstructorPiece
            | NodeKind::ConstructorOtherwise => {
                let name = self.element_name(node.kind())?;
                let children: Vec<&AstNode> = node.children().iter().collect();
                self.write_wrapped(writer, name, &children)
            }
            NodeKind::Unknown => Err(unwritable("unknown nodes cannot be written".to_owned())),
            NodeKind::Extension(ext) if self.plugins.is_container(ext) => {
                let name = self.element_name(node.kind())?;
                write_tag_start_with_attrs(writer, name, &attrs)?;
                for child in node.children() {
                    self.write_node(writer, child)?;
                }
                write_tag_end(writer, name)
            }
            _ => self.write_apply(writer, node, attrs),
        }
    }

    fn write_wrapped(&self, writer: &mut XmlWriter, name: &str, children: &[&AstNode]) -> Result<()> {
        write_tag_start_with_attrs(writer, name, &[])?;
        for child in children {
            self.write_node(writer, child)?;
        }
        write_tag_end(writer, name)
    }

    fn write_csymbol<'n>(
        &self,
        writer: &mut XmlWriter,
        node: &'n AstNode,
        url: &'n str,
        default_name: &'n str,
        mut attrs: Vec<(&'n str, &'n str)>,
    ) -> Result<()> {
        attrs.push(("encoding", "text"));
        attrs.push(("definitionURL", url));
        let name = node.name().unwrap_or(default_name);
        write_tag_with_attrs(writer, "csymbol", name, &attrs)
    }

    fn write_number<'n>(
        &self,
        writer: &mut XmlWriter,
        node: &'n AstNode,
        mut attrs: Vec<(&'n str, &'n str)>,
    ) -> Result<()> {
        if let Some(units) = node.units() {
            attrs.push(("sbml:units", units));
        }
        match node.data() {
            NodeData::Integer(n) => {
                attrs.push(("type", "integer"));
                write_tag_with_attrs(writer, "cn", &n.to_string(), &attrs)
            }
            NodeData::Real(r) if r.is_nan() => write_empty_with_attrs(writer, "notanumber", &attrs),
            NodeData::Real(r) if r == f64::INFINITY => {
                write_empty_with_attrs(writer, "infinity", &attrs)
            }
            NodeData::Real(r) if r == f64::NEG_INFINITY => {
                write_tag_start_with_attrs(writer, "apply", &[])?;
                write_empty(writer, "minus")?;
                write_empty_with_attrs(writer, "infinity", &attrs)?;
                write_tag_end(writer, "apply")
            }
            NodeData::Real(r) => write_tag_with_attrs(writer, "cn", &format!("{r:?}"), &attrs),
            NodeData::RealE { mantissa, exponent } => {
                attrs.push(("type", "e-notation"));
                self.write_separated(writer, &format!("{mantissa:?}"), &exponent.to_string(), &attrs)
            }
            NodeData::Rational {
                numerator,
                denominator,
            } => {
                attrs.push(("type", "rational"));
                self.write_separated(writer, &numerator.to_string(), &denominator.to_string(), &attrs)
            }
            NodeData::None => Err(unwritable(format!("{:?} node has no value", node.kind()))),
        }
    }

    fn write_separated(
        &self,
        writer: &mut XmlWriter,
        first: &str,
        second: &str,
        attrs: &[(&str, &str)],
    ) -> Result<()> {
        write_tag_start_with_attrs(writer, "cn", attrs)?;
        write_tag_text(writer, first)?;
        write_empty(writer, "sep")?;
        write_tag_text(writer, second)?;
        write_tag_end(writer, "cn")
    }

    fn write_apply(
        &self,
        writer: &mut XmlWriter,
        node: &AstNode,
        attrs: Vec<(&str, &str)>,
    ) -> Result<()> {
        // the payload belongs on the operator element
        let (apply_attrs, op_attrs): (Vec<_>, Vec<_>) = attrs
            .into_iter()
            .partition(|(key, _)| matches!(*key, "id" | "class" | "style"));
        write_tag_start_with_attrs(writer, "apply", &apply_attrs)?;

        match node.kind() {
            NodeKind::Function => {
                write_tag_with_attrs(writer, "ci", node.name().unwrap_or(""), &[])?
            }
            NodeKind::FunctionDelay => {
                let name = node.name().unwrap_or("delay");
                let attrs = [("encoding", "text"), ("definitionURL", DELAY_URL)];
                write_tag_with_attrs(writer, "csymbol", name, &attrs)?
            }
            NodeKind::FunctionRateOf => {
                let name = node.name().unwrap_or("rateOf");
                let attrs = [("encoding", "text"), ("definitionURL", RATE_OF_URL)];
                write_tag_with_attrs(writer, "csymbol", name, &attrs)?
            }
            kind => write_empty_with_attrs(writer, self.element_name(kind)?, &op_attrs)?,
        }

        let mut children = node.children().iter();
        let qualifier = match node.kind() {
            NodeKind::FunctionLog if node.num_children() == 2 => Some("logbase"),
            NodeKind::FunctionRoot if node.num_children() == 2 => Some("degree"),
            _ => None,
        };
        if let Some(qualifier) = qualifier {
            if let Some(first) = children.next() {
                self.write_wrapped(writer, qualifier, &[first])?;
            }
        }
        for child in children {
            self.write_node(writer, child)?;
        }

        write_tag_end(writer, "apply")
    }
}

/// Serializes `node` as a standalone `<math>` document.  The `sbml`
/// namespace is declared only when some number carries units.
pub fn write_mathml(node: &AstNode) -> Result<String> {
    write_mathml_with_plugins(node, &PluginRegistry::new())
}

pub fn write_mathml_with_plugins(node: &AstNode, plugins: &PluginRegistry) -> Result<String> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_error)?;

    let mut attrs = vec![("xmlns", MATHML_NS)];
    if node.has_units() {
        attrs.push(("xmlns:sbml", SBML_NS));
    }
    write_tag_start_with_attrs(&mut writer, "math", &attrs)?;
    MathMLWriter { plugins }.write_node(&mut writer, node)?;
    write_tag_end(&mut writer, "math")?;

    let result = writer.into_inner().into_inner();

    String::from_utf8(result)
        .map_err(|_err| unwritable("problem converting to UTF-8".to_owned()))
}

// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use log::warn;
use quick_xml::escape::unescape;
use quick_xml::events::Event;
use quick_xml::reader::Reader;

use super::{AVOGADRO_URL, DELAY_URL, RATE_OF_URL, TIME_URL};
use crate::ast::AstNode;
use crate::common::{line_column, ErrorCode, ErrorLog};
use crate::kinds::{self, NodeKind};
use crate::plugin::{ExtensionPayload, PluginRegistry};

#[derive(Clone, Debug)]
struct StartTag {
    prefix: Option<String>,
    name: String,
    // qualified keys, namespace declarations dropped
    attrs: Vec<(String, String)>,
    // byte offset of the '<'
    pos: usize,
}

impl StartTag {
    fn attr(&self, local: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| local_part(key) == local)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug)]
enum XmlToken {
    Start(StartTag),
    // byte offset just past the end tag
    End(usize),
    Text(String),
}

fn local_part(key: &str) -> &str {
    key.rsplit(':').next().unwrap_or(key)
}

fn skip_whitespace(text: &str, pos: usize) -> usize {
    let rest = text.get(pos..).unwrap_or("");
    pos + rest.len() - rest.trim_start().len()
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn flush_text(tokens: &mut Vec<XmlToken>, text: &mut String) {
    if text.is_empty() {
        return;
    }
    let unescaped = match unescape(text.as_str()) {
        Ok(unescaped) => unescaped.into_owned(),
        Err(_) => text.clone(),
    };
    tokens.push(XmlToken::Text(unescaped));
    text.clear();
}

/// Flattens the document into start tags, end tags and text.  Empty
/// elements are expanded into a start and an end tag.
fn tokenize(text: &str) -> Result<Vec<XmlToken>, (usize, String)> {
    let mut reader = Reader::from_str(text);
    let config = reader.config_mut();
    config.trim_text(true);
    config.expand_empty_elements = true;

    let mut tokens = vec![];
    let mut pending = String::new();
    loop {
        let before = reader.buffer_position() as usize;
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(err) => return Err((reader.error_position() as usize, err.to_string())),
        };
        let after = reader.buffer_position() as usize;
        match event {
            Event::Start(e) => {
                flush_text(&mut tokens, &mut pending);
                let prefix = e.name().prefix().map(|prefix| lossy(prefix.as_ref()));
                let name = lossy(e.local_name().as_ref());
                let mut attrs = vec![];
                for attr in e.attributes() {
                    let attr = attr.map_err(|err| (before, err.to_string()))?;
                    let key = lossy(attr.key.as_ref());
                    if key == "xmlns" || key.starts_with("xmlns:") {
                        continue;
                    }
                    let value = attr
                        .unescape_value()
                        .map_err(|err| (before, err.to_string()))?;
                    attrs.push((key, value.into_owned()));
                }
                tokens.push(XmlToken::Start(StartTag {
                    prefix,
                    name,
                    attrs,
                    pos: skip_whitespace(text, before),
                }));
            }
            Event::End(_) => {
                flush_text(&mut tokens, &mut pending);
                tokens.push(XmlToken::End(after));
            }
            Event::Text(t) => pending.push_str(&String::from_utf8_lossy(&t)),
            Event::GeneralRef(r) => {
                pending.push('&');
                pending.push_str(&String::from_utf8_lossy(&r));
                pending.push(';');
            }
            Event::CData(c) => {
                flush_text(&mut tokens, &mut pending);
                tokens.push(XmlToken::Text(lossy(&c)));
            }
            Event::Eof => break,
            _ => {}
        }
    }
    flush_text(&mut tokens, &mut pending);

    Ok(tokens)
}

/// Elements nested deeper than this are skipped rather than read.
pub const MAX_MATHML_DEPTH: usize = 128;

/// Where we are inside an `<apply>`: the operator comes first, then any
/// qualifiers, then the arguments.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ReadState {
    Start,
    Qualifiers,
    Children,
    End,
}

struct MathMLReader<'a> {
    text: &'a str,
    tokens: Vec<XmlToken>,
    pos: usize,
    // the prefix <math> was written with; every element must share it
    prefix: Option<String>,
    plugins: &'a PluginRegistry,
    log: &'a mut ErrorLog,
    depth: usize,
}

impl MathMLReader<'_> {
    fn log_at(&mut self, code: ErrorCode, pos: usize, message: &str) {
        let (line, column) = line_column(self.text, pos);
        warn!("mathml {line}:{column}: {code}: {message}");
        self.log.log_error(code, line, column, message);
    }

    /// The next child start tag, skipping stray text.  `None` at an end
    /// tag or the end of the document.
    fn peek_child(&mut self) -> Option<StartTag> {
        loop {
            match self.tokens.get(self.pos) {
                Some(XmlToken::Text(_)) => self.pos += 1,
                Some(XmlToken::Start(tag)) => return Some(tag.clone()),
                _ => return None,
            }
        }
    }

    /// Consumes everything up to and including the end tag of the element
    /// whose start tag was just consumed.  Returns the byte offset past it.
    fn close_element(&mut self) -> usize {
        let mut depth = 0;
        while let Some(token) = self.tokens.get(self.pos) {
            self.pos += 1;
            match token {
                XmlToken::Start(_) => depth += 1,
                XmlToken::End(end) => {
                    if depth == 0 {
                        return *end;
                    }
                    depth -= 1;
                }
                XmlToken::Text(_) => {}
            }
        }
        self.text.len()
    }

    fn skip_element(&mut self) -> usize {
        self.pos += 1;
        self.close_element()
    }

    fn check_prefix(&mut self, tag: &StartTag) -> bool {
        if tag.prefix == self.prefix {
            return true;
        }
        let message = format!("<{}> does not use the namespace prefix of <math>", tag.name);
        self.log_at(ErrorCode::MathMLPrefixMismatch, tag.pos, &message);
        false
    }

    fn reject(&mut self, code: ErrorCode, tag: &StartTag, message: &str) -> AstNode {
        self.log_at(code, tag.pos, message);
        self.skip_element();
        AstNode::new(NodeKind::Unknown)
    }

    fn read_text(&mut self) -> String {
        self.pos += 1;
        let mut text = String::new();
        while let Some(token) = self.tokens.get(self.pos) {
            match token {
                XmlToken::Text(t) => {
                    text.push_str(t);
                    self.pos += 1;
                }
                XmlToken::Start(_) => {
                    self.skip_element();
                }
                XmlToken::End(_) => {
                    self.pos += 1;
                    break;
                }
            }
        }
        text.trim().to_owned()
    }

    // reads every child element of the element whose start tag is next
    fn read_children(&mut self) -> Vec<AstNode> {
        self.pos += 1;
        let mut children = vec![];
        while self.peek_child().is_some() {
            children.push(self.read_element());
        }
        self.close_element();
        children
    }

    fn read_math(&mut self) -> AstNode {
        let Some(math) = self.peek_child() else {
            self.log_at(ErrorCode::MissingMathElement, 0, "no <math> element");
            return AstNode::new(NodeKind::Unknown);
        };
        if math.name != "math" {
            let message = format!("expected <math>, not <{}>", math.name);
            return self.reject(ErrorCode::MissingMathElement, &math, &message);
        }
        self.prefix = math.prefix.clone();
        self.pos += 1;

        let node = if self.peek_child().is_some() {
            self.read_element()
        } else {
            self.log_at(ErrorCode::MissingMathElement, math.pos, "<math> is empty");
            AstNode::new(NodeKind::Unknown)
        };
        while let Some(extra) = self.peek_child() {
            let message = format!("<{}> after the expression in <math>", extra.name);
            self.reject(ErrorCode::BadMathMLElement, &extra, &message);
        }
        node
    }

    fn read_element(&mut self) -> AstNode {
        self.depth += 1;
        let node = self.read_element_inner();
        self.depth -= 1;
        node
    }

    fn read_element_inner(&mut self) -> AstNode {
        let Some(tag) = self.peek_child() else {
            return AstNode::new(NodeKind::Unknown);
        };
        if self.depth > MAX_MATHML_DEPTH {
            let message = format!("<{}> is nested too deeply", tag.name);
            return self.reject(ErrorCode::ExpressionTooDeep, &tag, &message);
        }
        if !self.check_prefix(&tag) {
            self.skip_element();
            return AstNode::new(NodeKind::Unknown);
        }

        let mut node = match tag.name.as_str() {
            "apply" => self.read_apply(&tag),
            "cn" => self.read_cn(&tag),
            "ci" => AstNode::new_name(&self.read_text()),
            "csymbol" => self.read_csymbol(&tag),
            "true" | "false" | "pi" | "exponentiale" => {
                self.skip_element();
                AstNode::new(kinds::kind_from_name(&tag.name))
            }
            "infinity" => self.read_special_real(&tag, f64::INFINITY),
            "notanumber" => self.read_special_real(&tag, f64::NAN),
            "lambda" => self.read_lambda(),
            "piecewise" => self.read_piecewise(),
            "semantics" => self.read_semantics(),
            name => match self.plugins.kind_for_name(name) {
                Some(kind @ NodeKind::Extension(ext)) if self.plugins.is_container(ext) => {
                    AstNode::build(kind, self.read_children())
                }
                Some(_) => {
                    let message = format!("<{name}> may only appear as the operator of <apply>");
                    return self.reject(ErrorCode::BadMathMLElement, &tag, &message);
                }
                None if kinds::kind_from_name(name) != NodeKind::Unknown => {
                    let message = format!("<{name}> is out of place");
                    return self.reject(ErrorCode::BadMathMLElement, &tag, &message);
                }
                None => {
                    let message = format!("unknown element <{name}>");
                    return self.reject(ErrorCode::UnknownMathMLElement, &tag, &message);
                }
            },
        };
        if !node.is_unknown() {
            self.read_attributes(&mut node, &tag);
        }
        node
    }

    fn read_attributes(&mut self, node: &mut AstNode, tag: &StartTag) {
        let mut payload = match node.kind() {
            NodeKind::Extension(ext) => Some(ExtensionPayload::new(ext.package)),
            _ => None,
        };
        for (key, value) in tag.attrs.iter() {
            match local_part(key) {
                "id" => {
                    if let Err(err) = node.set_id(value) {
                        let message = err.details.unwrap_or_default();
                        self.log_at(err.code, tag.pos, &message);
                    }
                }
                "class" => node.set_class(value),
                "style" => node.set_style(value),
                "definitionURL" if matches!(tag.name.as_str(), "ci" | "semantics") => {
                    node.set_definition_url(value)
                }
                _ => {
                    if let Some(ref mut payload) = payload {
                        payload.attributes.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        if let Some(payload) = payload.filter(|payload| !payload.attributes.is_empty()) {
            node.set_extension(payload);
        }
    }

    fn read_apply(&mut self, apply: &StartTag) -> AstNode {
        self.pos += 1;
        let mut node = AstNode::new(NodeKind::Unknown);
        let mut qualifier = None;
        let mut state = ReadState::Start;
        loop {
            state = match state {
                ReadState::Start => {
                    let Some(op) = self.peek_child() else {
                        let message = "<apply> has no operator";
                        self.log_at(ErrorCode::BadMathMLElement, apply.pos, message);
                        self.close_element();
                        return AstNode::new(NodeKind::Unknown);
                    };
                    match self.read_operator(&op) {
                        Some(operator) => node = operator,
                        None => {
                            self.close_element();
                            return AstNode::new(NodeKind::Unknown);
                        }
                    }
                    ReadState::Qualifiers
                }
                ReadState::Qualifiers => match self.peek_child() {
                    Some(tag) if tag.name == "logbase" || tag.name == "degree" => {
                        if !self.check_prefix(&tag) {
                            self.skip_element();
                        } else {
                            let mut inner = self.read_children();
                            if inner.len() != 1 {
                                let message = format!("<{}> takes exactly one child", tag.name);
                                self.log_at(ErrorCode::BadMathMLElement, tag.pos, &message);
                            }
                            if !inner.is_empty() {
                                qualifier = Some(inner.remove(0));
                            }
                        }
                        ReadState::Qualifiers
                    }
                    Some(tag) if tag.name == "bvar" => {
                        self.reject(ErrorCode::BadMathMLElement, &tag, "<bvar> outside <lambda>");
                        ReadState::Qualifiers
                    }
                    _ => ReadState::Children,
                },
                ReadState::Children => match self.peek_child() {
                    Some(_) => {
                        let child = self.read_element();
                        node.push(child);
                        ReadState::Children
                    }
                    None => ReadState::End,
                },
                ReadState::End => {
                    self.close_element();
                    break;
                }
            };
        }

        if let Some(qualifier) = qualifier {
            if let Err(err) = node.prepend_child(qualifier) {
                let message = err.details.unwrap_or_default();
                self.log_at(err.code, apply.pos, &message);
            }
        }

        // <apply><minus/><infinity/></apply> is how negative infinity is written
        if node.is_unary_minus() {
            if let Some(child) = node.child(0) {
                if child.is_real() && child.value() == f64::INFINITY {
                    let units = child.units().map(str::to_owned);
                    let mut negative = AstNode::new_real(f64::NEG_INFINITY);
                    if let Some(units) = units {
                        if let Err(err) = negative.set_units(&units) {
                            let message = err.details.unwrap_or_default();
                            self.log_at(err.code, apply.pos, &message);
                        }
                    }
                    return negative;
                }
            }
        }
        node
    }

    fn read_operator(&mut self, op: &StartTag) -> Option<AstNode> {
        if !self.check_prefix(op) {
            self.skip_element();
            return None;
        }
        match op.name.as_str() {
            "ci" => Some(AstNode::new_function(&self.read_text())),
            "csymbol" => {
                let kind = match op.attr("definitionURL") {
                    Some(DELAY_URL) => NodeKind::FunctionDelay,
                    Some(RATE_OF_URL) => NodeKind::FunctionRateOf,
                    url => {
                        let message = format!("csymbol {url:?} is not a function");
                        self.reject(ErrorCode::BadMathMLElement, op, &message);
                        return None;
                    }
                };
                Some(self.function_csymbol(kind))
            }
            name => {
                let kind = kinds::kind_from_name_with(name, self.plugins);
                let usable = !matches!(
                    kind,
                    NodeKind::Lambda | NodeKind::FunctionPiecewise | NodeKind::Function
                ) && kinds::is_callable(kind, Some(self.plugins));
                if usable {
                    let mut node = AstNode::new(kind);
                    self.read_attributes(&mut node, op);
                    self.skip_element();
                    Some(node)
                } else {
                    let code = if kind == NodeKind::Unknown {
                        ErrorCode::UnknownMathMLElement
                    } else {
                        ErrorCode::BadMathMLElement
                    };
                    let message = format!("<{name}> cannot be applied");
                    self.reject(code, op, &message);
                    None
                }
            }
        }
    }

    fn read_cn(&mut self, tag: &StartTag) -> AstNode {
        self.pos += 1;
        let mut parts = vec![String::new()];
        while let Some(token) = self.tokens.get(self.pos) {
            match token {
                XmlToken::Text(t) => {
                    if let Some(last) = parts.last_mut() {
                        last.push_str(t);
                    }
                    self.pos += 1;
                }
                XmlToken::Start(inner) if inner.name == "sep" => {
                    self.skip_element();
                    parts.push(String::new());
                }
                XmlToken::Start(inner) => {
                    let inner = inner.clone();
                    let message = format!("<{}> inside <cn>", inner.name);
                    self.reject(ErrorCode::BadMathMLElement, &inner, &message);
                }
                XmlToken::End(_) => {
                    self.pos += 1;
                    break;
                }
            }
        }

        let kind = tag.attr("type").unwrap_or("real");
        let number = match (kind, parts.as_slice()) {
            ("integer", [n]) => n.trim().parse::<i64>().ok().map(AstNode::new_integer),
            ("real", [r]) => r.trim().parse::<f64>().ok().map(AstNode::new_real),
            ("e-notation", [m, e]) => match (m.trim().parse::<f64>(), e.trim().parse::<i64>()) {
                (Ok(m), Ok(e)) => Some(AstNode::new_real_e(m, e)),
                _ => None,
            },
            ("rational", [n, d]) => match (n.trim().parse::<i64>(), d.trim().parse::<i64>()) {
                (Ok(n), Ok(d)) => Some(AstNode::new_rational(n, d)),
                _ => None,
            },
            _ => None,
        };
        let Some(mut number) = number else {
            let message = format!("bad {kind} number '{}'", parts.join(" "));
            self.log_at(ErrorCode::BadNumber, tag.pos, message.trim_end());
            return AstNode::new(NodeKind::Unknown);
        };
        self.read_units(&mut number, tag);
        number
    }

    fn read_special_real(&mut self, tag: &StartTag, value: f64) -> AstNode {
        self.skip_element();
        let mut number = AstNode::new_real(value);
        self.read_units(&mut number, tag);
        number
    }

    fn read_units(&mut self, number: &mut AstNode, tag: &StartTag) {
        if let Some(units) = tag.attr("units") {
            if let Err(err) = number.set_units(units) {
                let message = err.details.unwrap_or_default();
                self.log_at(err.code, tag.pos, &message);
            }
        }
    }

    fn read_csymbol(&mut self, tag: &StartTag) -> AstNode {
        let kind = match tag.attr("definitionURL") {
            Some(TIME_URL) => NodeKind::NameTime,
            Some(AVOGADRO_URL) => NodeKind::NameAvogadro,
            Some(DELAY_URL) => return self.function_csymbol(NodeKind::FunctionDelay),
            Some(RATE_OF_URL) => return self.function_csymbol(NodeKind::FunctionRateOf),
            url => {
                let message = format!("unknown csymbol {url:?}");
                return self.reject(ErrorCode::BadMathMLElement, tag, &message);
            }
        };
        AstNode::new(kind).with_name(&self.read_text())
    }

    // the canonical spelling is implied by the kind
    fn function_csymbol(&mut self, kind: NodeKind) -> AstNode {
        let text = self.read_text();
        let node = AstNode::new(kind);
        if text.is_empty() || Some(text.as_str()) == kinds::name_from_kind(kind) {
            node
        } else {
            node.with_name(&text)
        }
    }

    fn read_lambda(&mut self) -> AstNode {
        self.pos += 1;
        let mut node = AstNode::new(NodeKind::Lambda);
        while let Some(child) = self.peek_child() {
            let result = if child.name == "bvar" && self.check_prefix(&child) {
                let mut bvars = self.read_children();
                if bvars.len() != 1 {
                    let message = "<bvar> takes exactly one child";
                    self.log_at(ErrorCode::BadMathMLElement, child.pos, message);
                }
                if bvars.is_empty() {
                    continue;
                }
                node.add_bound_variable(bvars.remove(0))
            } else if child.name == "bvar" {
                self.skip_element();
                continue;
            } else {
                let body = self.read_element();
                node.add_child(body)
            };
            if let Err(err) = result {
                let message = err.details.unwrap_or_default();
                self.log_at(err.code, child.pos, &message);
            }
        }
        self.close_element();
        node
    }

    fn read_piecewise(&mut self) -> AstNode {
        self.pos += 1;
        let mut children = vec![];
        while let Some(child) = self.peek_child() {
            match child.name.as_str() {
                "piece" | "otherwise" => {
                    if self.check_prefix(&child) {
                        children.extend(self.read_children());
                    } else {
                        self.skip_element();
                    }
                }
                name => {
                    let message = format!("<{name}> inside <piecewise>");
                    self.reject(ErrorCode::BadMathMLElement, &child, &message);
                }
            }
        }
        self.close_element();
        AstNode::build(NodeKind::FunctionPiecewise, children)
    }

    fn read_semantics(&mut self) -> AstNode {
        self.pos += 1;
        let mut node = AstNode::new(NodeKind::Semantics);
        while let Some(child) = self.peek_child() {
            match child.name.as_str() {
                "annotation" | "annotation-xml" => {
                    let end = self.skip_element();
                    let raw = self.text.get(child.pos..end).unwrap_or("");
                    node.add_annotation(raw);
                }
                _ if node.num_children() == 0 => {
                    let expr = self.read_element();
                    node.push(expr);
                }
                name => {
                    let message = format!("<{name}> after the expression in <semantics>");
                    self.reject(ErrorCode::BadMathMLElement, &child, &message);
                }
            }
        }
        self.close_element();
        node
    }
}

/// Reads a `<math>` element.  Never fails: problems are logged and the
/// offending subtrees become `unknown` nodes.
pub fn read_mathml(text: &str, log: &mut ErrorLog) -> AstNode {
    read_mathml_with_plugins(text, &PluginRegistry::new(), log)
}

pub fn read_mathml_with_plugins(text: &str, plugins: &PluginRegistry, log: &mut ErrorLog) -> AstNode {
    let tokens = match tokenize(text) {
        Ok(tokens) => tokens,
        Err((pos, message)) => {
            let (line, column) = line_column(text, pos);
            warn!("mathml {line}:{column}: malformed xml: {message}");
            log.log_error(ErrorCode::XmlDeserialization, line, column, &message);
            return AstNode::new(NodeKind::Unknown);
        }
    };

    let mut reader = MathMLReader {
        text,
        tokens,
        pos: 0,
        prefix: None,
        plugins,
        log,
        depth: 0,
    };
    reader.read_math()
}

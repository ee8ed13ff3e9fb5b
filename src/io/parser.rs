// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! OpenSCAD-style script parser.
//!
//! Parsing runs in two stages. The pest grammar in `scad.pest` splits the
//! source into positioned tokens, skipping whitespace and comments. A
//! recursive descent over those tokens then builds the scene tree, binding
//! `name = value;` constants and `$fn/$fa/$fs` defaults in lexical scopes.

use crate::ast::{Node, TransformOp, Vec3};
use crate::error::{CsgError, Result, SourcePos};
use crate::geometry::{BooleanOp, Primitive, Resolution};
use crate::io::ImportParams;
use nalgebra::{Matrix4, Point3};
use pest::error::{InputLocation, LineColLocation};
use pest::Parser;
use pest_derive::Parser;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Parser)]
#[grammar = "io/scad.pest"]
struct ScadLexer;

/// Parse a script held in memory; imports resolve against the working directory
pub fn parse_scad(source: &str) -> Result<Node> {
    ScriptParser::new(".").parse(source)
}

/// Script parser configuration
#[derive(Debug, Clone)]
pub struct ScriptParser {
    base_dir: PathBuf,
    file: Option<PathBuf>,
    fine_verbose: bool,
}

impl ScriptParser {
    /// `base_dir` is the directory relative import paths resolve against
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            file: None,
            fine_verbose: false,
        }
    }

    /// Name the source file in error messages
    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Log every parsed construct at debug level
    pub fn with_fine_verbose(mut self, enabled: bool) -> Self {
        self.fine_verbose = enabled;
        self
    }

    /// Parse a script into its root node
    pub fn parse(&self, source: &str) -> Result<Node> {
        let result = tokenize(source).and_then(|tokens| {
            let mut cursor = Cursor {
                parser: self,
                tokens,
                index: 0,
                scopes: vec![HashMap::new()],
            };
            cursor.program()
        });

        match (&self.file, result) {
            (Some(file), Err(e)) => Err(e.in_file(file)),
            (_, result) => result,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Number(f64),
    Str(String),
    Ident(String),
    Punct(char),
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Number(n) => write!(f, "`{}`", n),
            TokenKind::Str(s) => write!(f, "`\"{}\"`", s),
            TokenKind::Ident(name) => write!(f, "`{}`", name),
            TokenKind::Punct(c) => write!(f, "`{}`", c),
            TokenKind::Eof => write!(f, "end of input"),
        }
    }
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    pos: SourcePos,
}

fn position(pair: &pest::iterators::Pair<Rule>) -> SourcePos {
    let (line, column) = pair.as_span().start_pos().line_col();
    SourcePos::new(line, column)
}

fn tokenize(source: &str) -> Result<Vec<Token>> {
    let pairs = ScadLexer::parse(Rule::tokens, source).map_err(|e| {
        let (line, column) = match e.line_col {
            LineColLocation::Pos(p) => p,
            LineColLocation::Span(start, _) => start,
        };
        let offset = match e.location {
            InputLocation::Pos(p) => p,
            InputLocation::Span((p, _)) => p,
        };
        let rest = source.get(offset..).unwrap_or_default();
        let message = if rest.starts_with('"') {
            "unterminated string".to_string()
        } else if rest.starts_with("/*") {
            "unterminated comment".to_string()
        } else {
            match rest.chars().next() {
                Some(c) => format!("unexpected character `{}`", c),
                None => "unexpected end of input".to_string(),
            }
        };
        CsgError::syntax(SourcePos::new(line, column), message)
    })?;

    let mut tokens = Vec::new();
    for pair in pairs.flat_map(|p| p.into_inner()) {
        let pos = position(&pair);
        let kind = match pair.as_rule() {
            Rule::number => TokenKind::Number(
                pair.as_str()
                    .parse()
                    .map_err(|_| CsgError::syntax(pos, format!("invalid number `{}`", pair.as_str())))?,
            ),
            Rule::string => TokenKind::Str(unescape(pair.as_str())),
            Rule::ident => TokenKind::Ident(pair.as_str().to_string()),
            Rule::punct => TokenKind::Punct(pair.as_str().chars().next().unwrap_or(' ')),
            Rule::EOI => TokenKind::Eof,
            _ => continue,
        };
        tokens.push(Token { kind, pos });
    }

    if !matches!(tokens.last(), Some(Token { kind: TokenKind::Eof, .. })) {
        let line = source.lines().count().max(1);
        tokens.push(Token {
            kind: TokenKind::Eof,
            pos: SourcePos::new(line, 1),
        });
    }
    Ok(tokens)
}

/// Strip quotes and resolve backslash escapes
fn unescape(quoted: &str) -> String {
    let inner = &quoted[1..quoted.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Undef,
    Bool(bool),
    Number(f64),
    Str(String),
    List(Vec<Value>),
}

impl Value {
    fn type_name(&self) -> &'static str {
        match self {
            Value::Undef => "undef",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::List(_) => "vector",
        }
    }
}

/// Arguments of one construct call
struct Args {
    construct: String,
    positional: Vec<Option<(Value, SourcePos)>>,
    named: HashMap<String, (Value, SourcePos)>,
}

impl Args {
    fn new(construct: &str) -> Self {
        Self {
            construct: construct.to_string(),
            positional: Vec::new(),
            named: HashMap::new(),
        }
    }

    fn check_positional(&self, max: usize) -> Result<()> {
        match self.positional.get(max) {
            Some(Some((_, pos))) => Err(CsgError::syntax(
                *pos,
                format!(
                    "`{}` takes at most {} positional argument{}",
                    self.construct,
                    max,
                    if max == 1 { "" } else { "s" }
                ),
            )),
            _ => Ok(()),
        }
    }

    /// Named argument (first matching name) or positional argument `index`.
    /// `undef` counts as absent.
    fn take(&mut self, index: usize, names: &[&str]) -> Option<(Value, SourcePos)> {
        let found = names
            .iter()
            .find_map(|name| self.named.remove(*name))
            .or_else(|| self.positional.get_mut(index).and_then(Option::take));
        found.filter(|(value, _)| *value != Value::Undef)
    }

    fn take_named(&mut self, name: &str) -> Option<(Value, SourcePos)> {
        self.take(usize::MAX, &[name])
    }

    fn number(&mut self, index: usize, names: &[&str]) -> Result<Option<f64>> {
        match self.take(index, names) {
            None => Ok(None),
            Some((Value::Number(n), _)) => Ok(Some(n)),
            Some((other, pos)) => Err(self.type_error(pos, names, "a number", &other)),
        }
    }

    fn boolean(&mut self, index: usize, names: &[&str]) -> Result<bool> {
        match self.take(index, names) {
            None => Ok(false),
            Some((Value::Bool(b), _)) => Ok(b),
            Some((Value::Number(n), _)) => Ok(n != 0.0),
            Some((other, pos)) => Err(self.type_error(pos, names, "a boolean", &other)),
        }
    }

    fn type_error(&self, pos: SourcePos, names: &[&str], expected: &str, found: &Value) -> CsgError {
        CsgError::syntax(
            pos,
            format!(
                "`{}` of {} must be {}, found {}",
                names.first().copied().unwrap_or("argument"),
                self.construct,
                expected,
                found.type_name()
            ),
        )
    }

    /// Warn about named arguments nothing consumed
    fn finish(self) {
        for (name, (_, pos)) in self.named {
            if !name.starts_with('$') {
                warn!("Ignoring unknown parameter `{}` of {} at {}", name, self.construct, pos);
            }
        }
    }
}

fn numbers(value: &Value, pos: SourcePos, what: &str) -> Result<Vec<f64>> {
    match value {
        Value::List(items) => items
            .iter()
            .map(|item| match item {
                Value::Number(n) => Ok(*n),
                other => Err(CsgError::syntax(
                    pos,
                    format!("{} must contain numbers, found {}", what, other.type_name()),
                )),
            })
            .collect(),
        other => Err(CsgError::syntax(
            pos,
            format!("{} must be a vector, found {}", what, other.type_name()),
        )),
    }
}

/// A 2- or 3-component vector; a missing z becomes `default_z`
fn vec3(value: &Value, pos: SourcePos, what: &str, default_z: f64) -> Result<Vec3> {
    let n = numbers(value, pos, what)?;
    match n.as_slice() {
        [x, y] => Ok(Vec3::new(*x, *y, default_z)),
        [x, y, z] => Ok(Vec3::new(*x, *y, *z)),
        _ => Err(CsgError::syntax(
            pos,
            format!("{} must have 2 or 3 components, found {}", what, n.len()),
        )),
    }
}

/// A vector, or a number repeated on every axis
fn vec3_or_scalar(value: &Value, pos: SourcePos, what: &str, default_z: f64) -> Result<Vec3> {
    match value {
        Value::Number(n) => Ok(Vec3::repeat(*n)),
        other => vec3(other, pos, what, default_z),
    }
}

const CONSTRUCTS: &[&str] = &[
    "sphere",
    "cube",
    "cylinder",
    "polyhedron",
    "multmatrix",
    "translate",
    "rotate",
    "scale",
    "mirror",
    "union",
    "difference",
    "intersection",
    "group",
    "render",
    "color",
    "import",
];

/// Constructs whose parentheses may be omitted
fn is_block_construct(name: &str) -> bool {
    matches!(name, "union" | "difference" | "intersection" | "group" | "render")
}

struct Cursor<'p> {
    parser: &'p ScriptParser,
    tokens: Vec<Token>,
    index: usize,
    scopes: Vec<HashMap<String, Value>>,
}

impl Cursor<'_> {
    fn peek(&self) -> &Token {
        &self.tokens[self.index.min(self.tokens.len() - 1)]
    }

    fn peek_second(&self) -> &Token {
        &self.tokens[(self.index + 1).min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.index += 1;
        }
        token
    }

    fn is_punct(&self, c: char) -> bool {
        self.peek().kind == TokenKind::Punct(c)
    }

    fn eat(&mut self, c: char) -> bool {
        let found = self.is_punct(c);
        if found {
            self.index += 1;
        }
        found
    }

    fn expect(&mut self, c: char) -> Result<()> {
        if self.eat(c) {
            return Ok(());
        }
        let token = self.peek();
        Err(CsgError::syntax(
            token.pos,
            format!("expected `{}`, found {}", c, token.kind),
        ))
    }

    fn lookup(&self, name: &str) -> Option<&Value> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    fn program(&mut self) -> Result<Node> {
        let mut nodes = Vec::new();
        loop {
            let token = self.peek();
            match token.kind {
                TokenKind::Eof => break,
                TokenKind::Punct('}') => {
                    return Err(CsgError::syntax(token.pos, "unmatched `}`"));
                }
                _ => {}
            }
            if let Some(node) = self.statement()? {
                nodes.push(node);
            }
        }

        match nodes.len() {
            0 => Err(CsgError::syntax(SourcePos::new(1, 1), "script contains no geometry")),
            1 => Ok(nodes.remove(0)),
            _ => Ok(Node::group(nodes)),
        }
    }

    /// Parse one statement; `None` for statements without geometry
    fn statement(&mut self) -> Result<Option<Node>> {
        let token = self.advance();
        match token.kind {
            TokenKind::Punct(';') => Ok(None),
            TokenKind::Punct('{') => {
                let children = self.block(token.pos)?;
                Ok(non_empty(children).map(|children| Node::group(children).at(Some(token.pos))))
            }
            TokenKind::Punct(modifier @ ('*' | '%' | '#' | '!')) => {
                let node = self.statement()?;
                Ok(match modifier {
                    '*' | '%' => None,
                    _ => node,
                })
            }
            TokenKind::Ident(name) if self.is_punct('=') => {
                self.index += 1;
                let value = self.expr()?;
                self.expect(';')?;
                if let Some(scope) = self.scopes.last_mut() {
                    scope.insert(name, value);
                }
                Ok(None)
            }
            TokenKind::Ident(name) => self.construct(&name, token.pos),
            TokenKind::Eof => Err(CsgError::syntax(token.pos, "unexpected end of input")),
            other => Err(CsgError::syntax(token.pos, format!("unexpected {}", other))),
        }
    }

    /// Statements up to the `}` matching the brace at `open`
    fn block(&mut self, open: SourcePos) -> Result<Vec<Node>> {
        self.scopes.push(HashMap::new());
        let mut nodes = Vec::new();
        loop {
            if self.eat('}') {
                break;
            }
            if self.peek().kind == TokenKind::Eof {
                return Err(CsgError::syntax(open, "unmatched `{`"));
            }
            if let Some(node) = self.statement()? {
                nodes.push(node);
            }
        }
        self.scopes.pop();
        Ok(nodes)
    }

    /// Children of a transform or boolean: `;`, one statement, or a block
    fn children(&mut self) -> Result<Vec<Node>> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Punct(';') => {
                self.index += 1;
                Ok(Vec::new())
            }
            TokenKind::Punct('{') => {
                self.index += 1;
                self.block(token.pos)
            }
            _ => {
                self.scopes.push(HashMap::new());
                let child = self.statement();
                self.scopes.pop();
                Ok(child?.into_iter().collect())
            }
        }
    }

    fn construct(&mut self, name: &str, pos: SourcePos) -> Result<Option<Node>> {
        if !CONSTRUCTS.contains(&name) {
            return Err(CsgError::UnknownConstruct {
                name: name.to_string(),
                file: None,
                line: pos.line,
                column: pos.column,
            });
        }

        let mut args = Args::new(name);
        if self.eat('(') {
            self.arguments(&mut args)?;
        } else if !is_block_construct(name) {
            let token = self.peek();
            return Err(CsgError::syntax(
                token.pos,
                format!("expected `(` after `{}`, found {}", name, token.kind),
            ));
        }

        if self.parser.fine_verbose {
            debug!("Parsed {} at {}", name, pos);
        }

        let at = Some(pos);
        let node = match name {
            "sphere" | "cube" | "cylinder" | "polyhedron" => {
                let resolution = self.resolution(&mut args, pos)?;
                let primitive = primitive(name, &mut args, pos)?;
                args.finish();
                self.expect(';')?;
                Some(Node::primitive(primitive).with_resolution(resolution).at(at))
            }
            "import" => {
                let node = self.import(&mut args, pos)?;
                args.finish();
                self.expect(';')?;
                Some(node.at(at))
            }
            "multmatrix" | "translate" | "rotate" | "scale" | "mirror" => {
                let matrix = transform(name, &mut args, pos)?.to_matrix();
                args.finish();
                non_empty(self.children()?).map(|mut children| {
                    let child = if children.len() == 1 {
                        children.remove(0)
                    } else {
                        Node::group(children)
                    };
                    Node::transform(matrix, child).at(at)
                })
            }
            "union" | "difference" | "intersection" => {
                args.check_positional(0)?;
                args.finish();
                let op = match name {
                    "union" => BooleanOp::Union,
                    "difference" => BooleanOp::Difference,
                    _ => BooleanOp::Intersection,
                };
                non_empty(self.children()?).map(|children| Node::boolean(op, children).at(at))
            }
            _ => {
                // group, render and color only affect display
                args.check_positional(if name == "color" { 2 } else { 0 })?;
                let _ = args.take(0, &["c"]);
                let _ = args.take(1, &["alpha"]);
                let _ = args.take_named("convexity");
                args.finish();
                non_empty(self.children()?).map(|children| Node::group(children).at(at))
            }
        };
        Ok(node)
    }

    /// Argument list after `(`, through the closing `)`
    fn arguments(&mut self, args: &mut Args) -> Result<()> {
        if self.eat(')') {
            return Ok(());
        }
        loop {
            let pos = self.peek().pos;
            let named = match (&self.peek().kind, &self.peek_second().kind) {
                (TokenKind::Ident(name), TokenKind::Punct('=')) => Some(name.clone()),
                _ => None,
            };

            match named {
                Some(name) => {
                    self.index += 2;
                    let value = self.expr()?;
                    if args.named.insert(name.clone(), (value, pos)).is_some() {
                        return Err(CsgError::syntax(pos, format!("duplicate argument `{}`", name)));
                    }
                }
                None => {
                    let value = self.expr()?;
                    args.positional.push(Some((value, pos)));
                }
            }

            if self.eat(',') {
                if self.eat(')') {
                    return Ok(());
                }
                continue;
            }
            return self.expect(')');
        }
    }

    fn expr(&mut self) -> Result<Value> {
        let token = self.advance();
        match token.kind {
            TokenKind::Punct('-') => negate(self.expr()?, token.pos),
            TokenKind::Punct('+') => self.expr(),
            TokenKind::Number(n) => Ok(Value::Number(n)),
            TokenKind::Str(s) => Ok(Value::Str(s)),
            TokenKind::Ident(name) => match name.as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                "undef" => Ok(Value::Undef),
                _ => self.lookup(&name).cloned().ok_or_else(|| {
                    CsgError::syntax(token.pos, format!("undefined variable `{}`", name))
                }),
            },
            TokenKind::Punct('[') => {
                let mut items = Vec::new();
                while !self.eat(']') {
                    items.push(self.expr()?);
                    if !self.eat(',') {
                        self.expect(']')?;
                        break;
                    }
                }
                Ok(Value::List(items))
            }
            other => Err(CsgError::syntax(
                token.pos,
                format!("expected a value, found {}", other),
            )),
        }
    }

    /// `$fn/$fa/$fs` from the call, falling back to the enclosing scopes
    fn resolution(&self, args: &mut Args, pos: SourcePos) -> Result<Resolution> {
        let mut resolution = Resolution::default();
        for name in ["$fn", "$fa", "$fs"] {
            let value = match args.take_named(name) {
                Some((value, pos)) => Some((value, pos)),
                None => self.lookup(name).map(|v| (v.clone(), pos)),
            };
            let n = match value {
                None | Some((Value::Undef, _)) => continue,
                Some((Value::Number(n), _)) => n,
                Some((other, pos)) => {
                    return Err(CsgError::syntax(
                        pos,
                        format!("`{}` must be a number, found {}", name, other.type_name()),
                    ))
                }
            };
            match name {
                "$fn" => resolution.fn_ = n.max(0.0) as u32,
                "$fa" => resolution.fa = n.max(0.01),
                _ => resolution.fs = n.max(0.01),
            }
        }
        Ok(resolution)
    }

    fn import(&self, args: &mut Args, pos: SourcePos) -> Result<Node> {
        args.check_positional(1)?;
        let file = match args.take(0, &["file"]) {
            Some((Value::Str(file), _)) => file,
            Some((other, at)) => {
                return Err(CsgError::syntax(
                    at,
                    format!("import file must be a string, found {}", other.type_name()),
                ))
            }
            None => return Err(CsgError::syntax(pos, "import requires a file name")),
        };
        let scale = args.number(usize::MAX, &["scale"])?.unwrap_or(1.0);
        for ignored in ["convexity", "layer", "origin"] {
            let _ = args.take_named(ignored);
        }

        let path = self.parser.base_dir.join(&file);
        if !path.is_file() {
            return Err(CsgError::ImportResolution {
                path,
                reason: "file not found".to_string(),
                position: Some(pos),
            });
        }
        Ok(Node::import(path, ImportParams::with_scale(scale)))
    }
}

fn primitive(name: &str, args: &mut Args, pos: SourcePos) -> Result<Primitive> {
    match name {
        "sphere" => {
            args.check_positional(1)?;
            let radius = match args.number(0, &["r"])? {
                Some(r) => r,
                None => args.number(usize::MAX, &["d"])?.map_or(1.0, |d| d / 2.0),
            };
            Ok(Primitive::sphere(radius))
        }
        "cube" => {
            args.check_positional(2)?;
            let size = match args.take(0, &["size"]) {
                Some((Value::List(items), pos)) if items.len() != 3 => {
                    return Err(CsgError::syntax(pos, "cube size must have 3 components"));
                }
                Some((value, pos)) => vec3_or_scalar(&value, pos, "cube size", 0.0)?,
                None => Vec3::repeat(1.0),
            };
            let center = args.boolean(1, &["center"])?;
            Ok(Primitive::cube(size, center))
        }
        "cylinder" => {
            args.check_positional(4)?;
            let height = args.number(0, &["h"])?.unwrap_or(1.0);
            let radius = match args.number(usize::MAX, &["r"])? {
                Some(r) => r,
                None => args.number(usize::MAX, &["d"])?.map_or(1.0, |d| d / 2.0),
            };
            let radius1 = match args.number(1, &["r1"])? {
                Some(r) => r,
                None => args.number(usize::MAX, &["d1"])?.map_or(radius, |d| d / 2.0),
            };
            let radius2 = match args.number(2, &["r2"])? {
                Some(r) => r,
                None => args.number(usize::MAX, &["d2"])?.map_or(radius, |d| d / 2.0),
            };
            let center = args.boolean(3, &["center"])?;
            Ok(Primitive::cylinder(height, radius1, radius2, center))
        }
        _ => {
            args.check_positional(2)?;
            let _ = args.take_named("convexity");
            let (points_value, points_pos) = args
                .take(0, &["points"])
                .ok_or_else(|| CsgError::syntax(pos, "polyhedron requires `points`"))?;
            let (faces_value, faces_pos) = args
                .take(1, &["faces", "triangles"])
                .ok_or_else(|| CsgError::syntax(points_pos, "polyhedron requires `faces`"))?;

            let points = list(&points_value, points_pos, "polyhedron points")?
                .iter()
                .map(|p| vec3(p, points_pos, "polyhedron point", 0.0).map(Point3::from))
                .collect::<Result<Vec<_>>>()?;
            let faces = list(&faces_value, faces_pos, "polyhedron faces")?
                .iter()
                .map(|face| {
                    numbers(face, faces_pos, "polyhedron face")?
                        .into_iter()
                        .map(|i| {
                            if i >= 0.0 && i.fract() == 0.0 {
                                Ok(i as usize)
                            } else {
                                Err(CsgError::syntax(faces_pos, format!("invalid point index {}", i)))
                            }
                        })
                        .collect::<Result<Vec<usize>>>()
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Primitive::polyhedron(points, faces))
        }
    }
}

fn non_empty(nodes: Vec<Node>) -> Option<Vec<Node>> {
    if nodes.is_empty() {
        None
    } else {
        Some(nodes)
    }
}

fn negate(value: Value, pos: SourcePos) -> Result<Value> {
    match value {
        Value::Number(n) => Ok(Value::Number(-n)),
        Value::List(items) => items
            .into_iter()
            .map(|item| negate(item, pos))
            .collect::<Result<Vec<_>>>()
            .map(Value::List),
        other => Err(CsgError::syntax(
            pos,
            format!("cannot negate a {}", other.type_name()),
        )),
    }
}

fn list<'v>(value: &'v Value, pos: SourcePos, what: &str) -> Result<&'v [Value]> {
    match value {
        Value::List(items) => Ok(items),
        other => Err(CsgError::syntax(
            pos,
            format!("{} must be a vector, found {}", what, other.type_name()),
        )),
    }
}

fn transform(name: &str, args: &mut Args, pos: SourcePos) -> Result<TransformOp> {
    args.check_positional(if name == "rotate" { 2 } else { 1 })?;
    let op = match name {
        "translate" => match args.take(0, &["v"]) {
            Some((value, pos)) => TransformOp::Translate(vec3(&value, pos, "translate vector", 0.0)?),
            None => TransformOp::Translate(Vec3::zeros()),
        },
        "rotate" => {
            let axis = match args.take(1, &["v"]) {
                Some((value, pos)) => Some(vec3(&value, pos, "rotation axis", 0.0)?),
                None => None,
            };
            match (args.take(0, &["a"]), axis) {
                (Some((Value::Number(angle), _)), Some(axis)) => TransformOp::RotateAxis { angle, axis },
                (Some((Value::Number(angle), _)), None) => TransformOp::Rotate(Vec3::new(0.0, 0.0, angle)),
                (Some((value, pos)), _) => TransformOp::Rotate(vec3(&value, pos, "rotation angles", 0.0)?),
                (None, _) => TransformOp::Rotate(Vec3::zeros()),
            }
        }
        "scale" => match args.take(0, &["v"]) {
            Some((value, pos)) => TransformOp::Scale(vec3_or_scalar(&value, pos, "scale vector", 1.0)?),
            None => TransformOp::Scale(Vec3::repeat(1.0)),
        },
        "mirror" => match args.take(0, &["v"]) {
            Some((value, pos)) => TransformOp::Mirror(vec3(&value, pos, "mirror normal", 0.0)?),
            None => TransformOp::Mirror(Vec3::x()),
        },
        _ => {
            let (value, at) = args
                .take(0, &["m"])
                .ok_or_else(|| CsgError::syntax(pos, "multmatrix requires a matrix"))?;
            TransformOp::Multmatrix(matrix(&value, at)?)
        }
    };
    Ok(op)
}

/// A row-major 4x4 or 3x4 matrix
fn matrix(value: &Value, pos: SourcePos) -> Result<Matrix4<f64>> {
    let rows = list(value, pos, "multmatrix")?
        .iter()
        .map(|row| numbers(row, pos, "multmatrix row"))
        .collect::<Result<Vec<_>>>()?;

    if !(rows.len() == 3 || rows.len() == 4) || rows.iter().any(|row| row.len() != 4) {
        return Err(CsgError::syntax(pos, "multmatrix must be 4x4 or 3x4"));
    }
    Ok(Matrix4::from_fn(|r, c| match rows.get(r) {
        Some(row) => row[c],
        None if c == 3 => 1.0,
        None => 0.0,
    }))
}

/// Directory of a script file, used as the import base
pub fn script_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::NodeKind;
    use nalgebra::Vector3;

    fn syntax_position(err: CsgError) -> (usize, usize) {
        match err {
            CsgError::ScriptSyntax { line, column, .. } => (line, column),
            other => panic!("expected a syntax error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_cube() {
        let node = parse_scad("cube([10, 20, 30]);").unwrap();
        assert_eq!(
            node.kind,
            NodeKind::Primitive(Primitive::cube(Vector3::new(10.0, 20.0, 30.0), false))
        );
        assert_eq!(node.position, Some(SourcePos::new(1, 1)));
    }

    #[test]
    fn test_parse_exported_csg() {
        let source = r#"
            // exported
            group() {
                multmatrix([[1, 0, 0, 5], [0, 1, 0, 0], [0, 0, 1, 0], [0, 0, 0, 1]]) {
                    cylinder($fn = 0, $fa = 12, $fs = 2, h = 10, r1 = 5, r2 = 2, center = false);
                }
            }
        "#;
        let node = parse_scad(source).unwrap();
        let NodeKind::Group(children) = &node.kind else {
            panic!("expected group, got {:?}", node.kind);
        };
        let NodeKind::Transform { matrix, child } = &children[0].kind else {
            panic!("expected multmatrix");
        };
        assert_eq!(matrix[(0, 3)], 5.0);
        assert_eq!(child.kind, NodeKind::Primitive(Primitive::cylinder(10.0, 5.0, 2.0, false)));
    }

    #[test]
    fn test_boolean_without_parentheses() {
        let node = parse_scad("difference { cube(10); sphere(8); }").unwrap();
        match node.kind {
            NodeKind::Boolean { op, children } => {
                assert_eq!(op, BooleanOp::Difference);
                assert_eq!(children.len(), 2);
            }
            other => panic!("unexpected node {:?}", other),
        }
    }

    #[test]
    fn test_unmatched_brace_reports_opening_position() {
        let source = "union() {\n  cube(1);\n  translate([1, 0, 0]) {\n    sphere(1);\n";
        let err = parse_scad(source).unwrap_err();
        assert_eq!(syntax_position(err), (3, 24));
    }

    #[test]
    fn test_unknown_construct() {
        let err = parse_scad("cube(1);\nfrobnicate(2);").unwrap_err();
        match err {
            CsgError::UnknownConstruct { name, line, column, .. } => {
                assert_eq!(name, "frobnicate");
                assert_eq!((line, column), (2, 1));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_lexical_error_position() {
        let err = parse_scad("cube(1);\n  sphere(1) @;").unwrap_err();
        assert_eq!(syntax_position(err), (2, 13));
    }

    #[test]
    fn test_wrong_argument_type() {
        let err = parse_scad("sphere(\"big\");").unwrap_err();
        assert_eq!(syntax_position(err), (1, 8));
        let err = parse_scad("cube(1, true, 3);").unwrap_err();
        assert_eq!(syntax_position(err), (1, 15));
    }

    #[test]
    fn test_empty_script_is_an_error() {
        assert!(matches!(
            parse_scad("// nothing here\n"),
            Err(CsgError::ScriptSyntax { .. })
        ));
        assert!(matches!(parse_scad("union() { }"), Err(CsgError::ScriptSyntax { .. })));
    }

    #[test]
    fn test_empty_blocks_are_pruned() {
        let node = parse_scad("union() { cube(1); group() { } translate([1,0,0]); }").unwrap();
        match node.kind {
            NodeKind::Boolean { children, .. } => assert_eq!(children.len(), 1),
            other => panic!("unexpected node {:?}", other),
        }
    }

    #[test]
    fn test_modifiers() {
        let node = parse_scad("union() { *cube(1); %sphere(2); #cylinder(1, 1, 1); !cube(3); }").unwrap();
        match node.kind {
            NodeKind::Boolean { children, .. } => {
                assert_eq!(children.len(), 2);
                assert_eq!(children[0].kind_name(), "cylinder");
                assert_eq!(children[1].kind_name(), "cube");
            }
            other => panic!("unexpected node {:?}", other),
        }
    }

    #[test]
    fn test_assignments_and_resolution_scope() {
        let source = "size = 4; $fn = 16;\nunion() { cube(size); { $fn = 8; sphere(1); } sphere(2); }";
        let node = parse_scad(source).unwrap();
        let NodeKind::Boolean { children, .. } = node.kind else {
            panic!("expected union");
        };
        assert_eq!(
            children[0].kind,
            NodeKind::Primitive(Primitive::cube(Vector3::repeat(4.0), false))
        );
        let NodeKind::Group(inner) = &children[1].kind else {
            panic!("expected group");
        };
        assert_eq!(
            inner[0].kind,
            NodeKind::Primitive(Primitive::sphere(1.0).with_resolution(Resolution::with_fragments(8)))
        );
        assert_eq!(
            children[2].kind,
            NodeKind::Primitive(Primitive::sphere(2.0).with_resolution(Resolution::with_fragments(16)))
        );
    }

    #[test]
    fn test_rotate_forms() {
        let euler = parse_scad("rotate([0, 0, 90]) cube(1);").unwrap();
        let angle = parse_scad("rotate(90) cube(1);").unwrap();
        let axis = parse_scad("rotate(a = 90, v = [0, 0, 1]) cube(1);").unwrap();
        let matrix = |node: &Node| match &node.kind {
            NodeKind::Transform { matrix, .. } => *matrix,
            other => panic!("unexpected node {:?}", other),
        };
        assert_eq!(matrix(&euler), matrix(&angle));
        assert_eq!(matrix(&euler), matrix(&axis));
    }

    #[test]
    fn test_negative_numbers_and_booleans() {
        let node = parse_scad("translate([-1, -2.5, +3]) cube(2, center = true);").unwrap();
        let NodeKind::Transform { matrix, child } = node.kind else {
            panic!("expected transform");
        };
        assert_eq!(matrix[(0, 3)], -1.0);
        assert_eq!(matrix[(1, 3)], -2.5);
        assert_eq!(matrix[(2, 3)], 3.0);
        assert_eq!(child.kind, NodeKind::Primitive(Primitive::cube(Vector3::repeat(2.0), true)));
    }

    #[test]
    fn test_polyhedron() {
        let source = "polyhedron(points = [[0,0,0],[1,0,0],[0,1,0],[0,0,1]], \
                      faces = [[0,2,1],[0,1,3],[1,2,3],[0,3,2]]);";
        let node = parse_scad(source).unwrap();
        assert_eq!(node.kind_name(), "polyhedron");
    }

    #[test]
    fn test_missing_import_carries_position() {
        let err = parse_scad("cube(1);\n  import(\"definitely-missing.stl\");").unwrap_err();
        match err {
            CsgError::ImportResolution { position, .. } => assert_eq!(position, Some(SourcePos::new(2, 3))),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_file_name_in_errors() {
        let err = ScriptParser::new(".")
            .with_file("model.csg")
            .parse("cube(1")
            .unwrap_err();
        assert!(err.to_string().starts_with("model.csg:1:7"));
    }
}

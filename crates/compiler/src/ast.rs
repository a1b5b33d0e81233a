//! Babel-shaped AST consumed by the code generator.
//!
//! Parsing is done by an external JavaScript parser; this module
//! deserializes its JSON output (`File` → `Program` → nodes
//! discriminated by `"type"`). Only the node kinds the code generator
//! understands are modelled; anything else lands in [`NodeKind::Unknown`]
//! and is rejected with its source location when visited.

use serde::Deserialize;

/// A line/column pair as the parser reports it (lines 1-indexed,
/// columns 0-indexed).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct Position {
    #[serde(default)]
    pub line: usize,
    #[serde(default)]
    pub column: usize,
}

/// Location of a node in the source, used for error framing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct SourceSpan {
    #[serde(default)]
    pub start: Position,
    #[serde(default)]
    pub end: Position,
}

/// A comment attached to a node. The parser duplicates the same comment
/// object as `trailingComments` of one node and `leadingComments` of the
/// next; consumers deduplicate on `start`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Comment {
    #[serde(rename = "type")]
    pub kind: CommentKind,
    pub value: String,
    #[serde(default)]
    pub start: usize,
    #[serde(default)]
    pub end: usize,
    #[serde(default)]
    pub loc: SourceSpan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum CommentKind {
    CommentLine,
    CommentBlock,
}

/// One chunk of a template literal. `value.cooked` falls back to
/// `value.raw` when the parser could not cook it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TemplateElement {
    pub value: TemplateChunk,
    #[serde(default)]
    pub tail: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TemplateChunk {
    #[serde(default)]
    pub cooked: Option<String>,
    #[serde(default)]
    pub raw: String,
}

impl TemplateChunk {
    pub fn text(&self) -> &str {
        self.cooked.as_deref().unwrap_or(&self.raw)
    }
}

/// An AST node: the common envelope (offsets, location, comments) plus
/// the kind-specific payload flattened from the same JSON object.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Start offset into the source text.
    #[serde(default)]
    pub start: usize,
    /// End offset into the source text (exclusive).
    #[serde(default)]
    pub end: usize,
    #[serde(default)]
    pub loc: SourceSpan,
    #[serde(default)]
    pub leading_comments: Vec<Comment>,
    #[serde(default)]
    pub trailing_comments: Vec<Comment>,
    #[serde(flatten)]
    pub kind: NodeKind,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum NodeKind {
    File {
        program: Box<Node>,
    },
    Program {
        #[serde(default)]
        body: Vec<Node>,
    },
    BlockStatement {
        #[serde(default)]
        body: Vec<Node>,
    },

    NumericLiteral {
        value: f64,
    },
    StringLiteral {
        value: String,
    },
    BooleanLiteral {
        value: bool,
    },
    NullLiteral,
    BigIntLiteral {
        value: String,
    },
    RegExpLiteral {
        pattern: String,
        #[serde(default)]
        flags: String,
    },
    TemplateLiteral {
        #[serde(default)]
        quasis: Vec<TemplateElement>,
        #[serde(default)]
        expressions: Vec<Node>,
    },

    Identifier {
        name: String,
    },
    ThisExpression,
    ArrayExpression {
        #[serde(default)]
        elements: Vec<Option<Node>>,
    },
    MemberExpression {
        object: Box<Node>,
        property: Box<Node>,
        #[serde(default)]
        computed: bool,
    },
    NewExpression {
        callee: Box<Node>,
        #[serde(default)]
        arguments: Vec<Node>,
    },
    CallExpression {
        callee: Box<Node>,
        #[serde(default)]
        arguments: Vec<Node>,
    },
    BinaryExpression {
        operator: String,
        left: Box<Node>,
        right: Box<Node>,
    },
    UnaryExpression {
        operator: String,
        argument: Box<Node>,
        #[serde(default = "default_true")]
        prefix: bool,
    },
    UpdateExpression {
        operator: String,
        argument: Box<Node>,
        #[serde(default)]
        prefix: bool,
    },
    AssignmentExpression {
        operator: String,
        left: Box<Node>,
        right: Box<Node>,
    },

    ExpressionStatement {
        expression: Box<Node>,
    },
    VariableDeclaration {
        kind: String,
        #[serde(default)]
        declarations: Vec<Node>,
    },
    VariableDeclarator {
        id: Box<Node>,
        #[serde(default)]
        init: Option<Box<Node>>,
    },
    IfStatement {
        test: Box<Node>,
        consequent: Box<Node>,
        #[serde(default)]
        alternate: Option<Box<Node>>,
    },
    WhileStatement {
        test: Box<Node>,
        body: Box<Node>,
    },
    BreakStatement {
        #[serde(default)]
        label: Option<Box<Node>>,
    },
    ReturnStatement {
        #[serde(default)]
        argument: Option<Box<Node>>,
    },
    FunctionDeclaration {
        #[serde(default)]
        id: Option<Box<Node>>,
        #[serde(default)]
        params: Vec<Node>,
        body: Box<Node>,
    },
    FunctionExpression {
        #[serde(default)]
        id: Option<Box<Node>>,
        #[serde(default)]
        params: Vec<Node>,
        body: Box<Node>,
    },

    /// Any node kind without a visitor. Kept so a modern parser feature
    /// in the input surfaces as a located compile error instead of a
    /// JSON-level one.
    #[serde(other)]
    Unknown,
}

impl Node {
    /// Build a node with no source information (used by tests and for
    /// internally synthesized nodes).
    pub fn synthetic(kind: NodeKind) -> Self {
        Node {
            start: 0,
            end: 0,
            loc: SourceSpan::default(),
            leading_comments: Vec::new(),
            trailing_comments: Vec::new(),
            kind,
        }
    }

    /// The identifier name if this node is an `Identifier`.
    pub fn identifier_name(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Identifier { name } => Some(name),
            _ => None,
        }
    }

    /// The node's own source text, from the parser's offsets. Empty when
    /// the offsets are out of range (synthetic nodes).
    pub fn source_text<'s>(&self, source: &'s str) -> &'s str {
        source.get(self.start..self.end).unwrap_or("")
    }

    /// The ESTree kind name, for error messages.
    pub fn variant_name(&self) -> &'static str {
        match &self.kind {
            NodeKind::File { .. } => "File",
            NodeKind::Program { .. } => "Program",
            NodeKind::BlockStatement { .. } => "BlockStatement",
            NodeKind::NumericLiteral { .. } => "NumericLiteral",
            NodeKind::StringLiteral { .. } => "StringLiteral",
            NodeKind::BooleanLiteral { .. } => "BooleanLiteral",
            NodeKind::NullLiteral => "NullLiteral",
            NodeKind::BigIntLiteral { .. } => "BigIntLiteral",
            NodeKind::RegExpLiteral { .. } => "RegExpLiteral",
            NodeKind::TemplateLiteral { .. } => "TemplateLiteral",
            NodeKind::Identifier { .. } => "Identifier",
            NodeKind::ThisExpression => "ThisExpression",
            NodeKind::ArrayExpression { .. } => "ArrayExpression",
            NodeKind::MemberExpression { .. } => "MemberExpression",
            NodeKind::NewExpression { .. } => "NewExpression",
            NodeKind::CallExpression { .. } => "CallExpression",
            NodeKind::BinaryExpression { .. } => "BinaryExpression",
            NodeKind::UnaryExpression { .. } => "UnaryExpression",
            NodeKind::UpdateExpression { .. } => "UpdateExpression",
            NodeKind::AssignmentExpression { .. } => "AssignmentExpression",
            NodeKind::ExpressionStatement { .. } => "ExpressionStatement",
            NodeKind::VariableDeclaration { .. } => "VariableDeclaration",
            NodeKind::VariableDeclarator { .. } => "VariableDeclarator",
            NodeKind::IfStatement { .. } => "IfStatement",
            NodeKind::WhileStatement { .. } => "WhileStatement",
            NodeKind::BreakStatement { .. } => "BreakStatement",
            NodeKind::ReturnStatement { .. } => "ReturnStatement",
            NodeKind::FunctionDeclaration { .. } => "FunctionDeclaration",
            NodeKind::FunctionExpression { .. } => "FunctionExpression",
            NodeKind::Unknown => "unsupported node",
        }
    }
}

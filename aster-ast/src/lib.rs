// AST model for the Aster language.
// Nodes are shared, reference-counted and carry source locations, analysis
// flags and an attached type projection once analyzed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, RwLock};

pub use aster_diagnostics::SourceLocation;

pub mod flags;
pub mod list;
pub mod type_info;
pub mod visit;

pub use flags::NodeFlags;
pub use list::NodeList;
pub use type_info::{FieldInfo, PrimitiveKind, TypeInfo, TypeInfoKind};
pub use visit::{walk_post, walk_pre, VisitFlow};

/// Shared handle to an AST node. The `Arc` strong count is the node's
/// reference count: cloning retains, dropping releases, and the last
/// release destroys the subtree it exclusively owns.
pub type NodeRef = Arc<Node>;

/// A single AST node: discriminated payload, source location, analysis
/// flags and the attached type projection.
pub struct Node {
    pub kind: NodeKind,
    pub loc: SourceLocation,
    flags: NodeFlags,
    type_info: RwLock<Option<Arc<TypeInfo>>>,
}

impl Node {
    pub fn new(kind: NodeKind, loc: SourceLocation) -> NodeRef {
        Arc::new(Self {
            kind,
            loc,
            flags: NodeFlags::new(),
            type_info: RwLock::new(None),
        })
    }

    pub fn program(program: Program, loc: SourceLocation) -> NodeRef {
        Self::new(NodeKind::Program(program), loc)
    }

    pub fn decl(decl: Decl, loc: SourceLocation) -> NodeRef {
        Self::new(NodeKind::Decl(decl), loc)
    }

    pub fn stmt(stmt: Stmt, loc: SourceLocation) -> NodeRef {
        Self::new(NodeKind::Stmt(stmt), loc)
    }

    pub fn expr(expr: Expr, loc: SourceLocation) -> NodeRef {
        Self::new(NodeKind::Expr(expr), loc)
    }

    pub fn type_expr(ty: TypeExpr, loc: SourceLocation) -> NodeRef {
        Self::new(NodeKind::TypeExpr(ty), loc)
    }

    pub fn match_arm(arm: MatchArm, loc: SourceLocation) -> NodeRef {
        Self::new(NodeKind::MatchArm(arm), loc)
    }

    pub fn flags(&self) -> &NodeFlags {
        &self.flags
    }

    /// The attached type projection, if this node has been typed.
    pub fn type_info(&self) -> Option<Arc<TypeInfo>> {
        self.type_info.read().ok().and_then(|slot| slot.clone())
    }

    /// Attach a type projection, replacing (and releasing) any previous one.
    pub fn attach_type_info(&self, info: Arc<TypeInfo>) {
        if let Ok(mut slot) = self.type_info.write() {
            *slot = Some(info);
        }
        self.flags.set_type_checked(true);
    }

    pub fn clear_type_info(&self) {
        if let Ok(mut slot) = self.type_info.write() {
            *slot = None;
        }
        self.flags.set_type_checked(false);
    }

    pub fn as_expr(&self) -> Option<&Expr> {
        match &self.kind {
            NodeKind::Expr(expr) => Some(expr),
            _ => None,
        }
    }

    pub fn as_stmt(&self) -> Option<&Stmt> {
        match &self.kind {
            NodeKind::Stmt(stmt) => Some(stmt),
            _ => None,
        }
    }

    pub fn as_decl(&self) -> Option<&Decl> {
        match &self.kind {
            NodeKind::Decl(decl) => Some(decl),
            _ => None,
        }
    }

    pub fn as_type_expr(&self) -> Option<&TypeExpr> {
        match &self.kind {
            NodeKind::TypeExpr(ty) => Some(ty),
            _ => None,
        }
    }

    /// Structured children of this node, in analysis order (a block's
    /// children are its statements; a binary expression's are left then
    /// right). Each returned handle is retained.
    pub fn children(&self) -> Vec<NodeRef> {
        let mut out = Vec::new();
        self.kind.collect_children(&mut out);
        out
    }

    pub fn child_count(&self) -> usize {
        self.children().len()
    }

    pub fn child(&self, index: usize) -> Option<NodeRef> {
        self.children().into_iter().nth(index)
    }

    /// Deep copy: an isomorphic subtree of fresh nodes with cleared flags
    /// and no attached type info.
    pub fn deep_clone(&self) -> NodeRef {
        Node::new(self.kind.deep_clone(), self.loc.clone())
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("kind", &self.kind)
            .field("loc", &self.loc)
            .field("flags", &self.flags.bits())
            .field("typed", &self.type_info().is_some())
            .finish()
    }
}

/// Top-level node discriminator.
#[derive(Debug)]
pub enum NodeKind {
    Program(Program),
    Decl(Decl),
    Stmt(Stmt),
    Expr(Expr),
    TypeExpr(TypeExpr),
    MatchArm(MatchArm),
}

/// Root of a compilation unit.
#[derive(Debug)]
pub struct Program {
    pub package: String,
    pub imports: NodeList,
    pub decls: NodeList,
}

/// Visibility modifier. Members without `pub` are private to their module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub fn is_public(&self) -> bool {
        matches!(self, Visibility::Public)
    }
}

/// FFI transfer annotation on extern pointer parameters: who owns the
/// pointee across the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferMode {
    Full,
    None,
    Borrowed,
}

impl TransferMode {
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "transfer_full" => Some(TransferMode::Full),
            "transfer_none" => Some(TransferMode::None),
            "borrowed" => Some(TransferMode::Borrowed),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TransferMode::Full => "transfer_full",
            TransferMode::None => "transfer_none",
            TransferMode::Borrowed => "borrowed",
        }
    }
}

/// Declaration-level annotations. Ownership tags arrive raw from the parser
/// and are validated against the closed set by the analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Annotation {
    /// `#gc`, `#c`, `#pinned` (or anything else, rejected later)
    Ownership(String),
    /// `transfer_full`, `transfer_none`, `borrowed`
    Transfer(TransferMode),
    /// Security review tag
    Security(String),
    /// Human-review marker
    HumanReview(String),
    /// Free-form semantic tag: key plus parameters
    Semantic { key: String, params: Vec<String> },
}

/// Top-level and member declarations.
#[derive(Debug)]
pub enum Decl {
    Function(FunctionDecl),
    Struct(StructDecl),
    Enum(EnumDecl),
    EnumVariant(EnumVariantDecl),
    ExternFunction(ExternFnDecl),
    Parameter(ParamDecl),
    Const(ConstDecl),
    Impl(ImplDecl),
    Import(ImportDecl),
}

/// Function or method. A method is a function declared inside an impl
/// block; an instance method has a leading `self` parameter.
#[derive(Debug)]
pub struct FunctionDecl {
    pub name: String,
    pub visibility: Visibility,
    /// Parameter declaration nodes, in order.
    pub params: NodeList,
    pub return_type: NodeRef,
    pub body: Option<NodeRef>,
    pub annotations: Vec<Annotation>,
}

impl FunctionDecl {
    /// True when the leading parameter is `self`.
    pub fn is_instance_method(&self) -> bool {
        self.params
            .get(0)
            .and_then(|p| p.as_decl().and_then(Decl::param_name))
            .map(|name| name == "self")
            .unwrap_or(false)
    }
}

#[derive(Debug)]
pub struct StructField {
    pub name: String,
    pub ty: NodeRef,
    pub visibility: Visibility,
}

#[derive(Debug)]
pub struct StructDecl {
    pub name: String,
    pub visibility: Visibility,
    pub type_params: Vec<String>,
    pub fields: Vec<StructField>,
    pub annotations: Vec<Annotation>,
}

#[derive(Debug)]
pub struct EnumDecl {
    pub name: String,
    pub visibility: Visibility,
    pub type_params: Vec<String>,
    /// Enum-variant declaration nodes, in order.
    pub variants: NodeList,
}

#[derive(Debug)]
pub struct EnumVariantDecl {
    pub name: String,
    /// Associated payload type, if any.
    pub payload: Option<NodeRef>,
}

#[derive(Debug)]
pub struct ExternFnDecl {
    pub name: String,
    pub params: NodeList,
    pub return_type: NodeRef,
    pub annotations: Vec<Annotation>,
}

#[derive(Debug)]
pub struct ParamDecl {
    pub name: String,
    pub ty: NodeRef,
    pub mutable: bool,
    pub annotations: Vec<Annotation>,
}

#[derive(Debug)]
pub struct ConstDecl {
    pub name: String,
    pub visibility: Visibility,
    /// Mandatory in well-formed programs; the analyzer rejects `None`.
    pub ty: Option<NodeRef>,
    pub value: NodeRef,
}

#[derive(Debug)]
pub struct ImplDecl {
    pub target: String,
    pub methods: NodeList,
}

#[derive(Debug)]
pub struct ImportDecl {
    pub path: String,
    pub alias: Option<String>,
}

impl Decl {
    pub fn name(&self) -> Option<&str> {
        match self {
            Decl::Function(f) => Some(&f.name),
            Decl::Struct(s) => Some(&s.name),
            Decl::Enum(e) => Some(&e.name),
            Decl::EnumVariant(v) => Some(&v.name),
            Decl::ExternFunction(f) => Some(&f.name),
            Decl::Parameter(p) => Some(&p.name),
            Decl::Const(c) => Some(&c.name),
            Decl::Impl(i) => Some(&i.target),
            Decl::Import(_) => None,
        }
    }

    fn param_name(&self) -> Option<&str> {
        match self {
            Decl::Parameter(p) => Some(&p.name),
            _ => None,
        }
    }
}

/// Statements.
#[derive(Debug)]
pub enum Stmt {
    Block {
        stmts: NodeList,
    },
    ExprStmt {
        expr: NodeRef,
    },
    Let {
        name: String,
        mutable: bool,
        /// Mandatory in well-formed programs; the analyzer rejects `None`.
        ty: Option<NodeRef>,
        init: Option<NodeRef>,
        annotations: Vec<Annotation>,
    },
    Return {
        value: Option<NodeRef>,
    },
    If {
        cond: NodeRef,
        then_block: NodeRef,
        else_block: Option<NodeRef>,
    },
    ForIn {
        binding: String,
        iterable: NodeRef,
        body: NodeRef,
    },
    Match {
        scrutinee: NodeRef,
        arms: NodeList,
    },
    IfLet {
        pattern: Pattern,
        value: NodeRef,
        then_block: NodeRef,
        else_block: Option<NodeRef>,
    },
    Spawn {
        call: NodeRef,
    },
    SpawnWithHandle {
        handle: String,
        call: NodeRef,
    },
    Unsafe {
        block: NodeRef,
    },
    Break,
    Continue,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl BinaryOp {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::NotEq
                | BinaryOp::Lt
                | BinaryOp::LtEq
                | BinaryOp::Gt
                | BinaryOp::GtEq
        )
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    pub fn is_bitwise(&self) -> bool {
        matches!(
            self,
            BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor | BinaryOp::Shl | BinaryOp::Shr
        )
    }

    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod
        )
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
        }
    }
}

/// Unary operators, including raw-pointer dereference and address-of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Negate,
    Not,
    Deref,
    AddressOf,
    AddressOfMut,
}

/// Literal values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Integer(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Char(char),
    Unit,
}

/// Expressions.
#[derive(Debug)]
pub enum Expr {
    Binary {
        op: BinaryOp,
        left: NodeRef,
        right: NodeRef,
    },
    Unary {
        op: UnaryOp,
        operand: NodeRef,
    },
    Call {
        callee: NodeRef,
        args: NodeList,
    },
    /// `Owner.member(args)`: associated functions and qualified enum
    /// constructors such as `Result.Ok(42)`.
    AssociatedCall {
        owner: String,
        member: String,
        args: NodeList,
    },
    FieldAccess {
        base: NodeRef,
        field: String,
    },
    IndexAccess {
        base: NodeRef,
        index: NodeRef,
    },
    Slice {
        base: NodeRef,
        start: Option<NodeRef>,
        end: Option<NodeRef>,
    },
    /// `expr.len` on slices, arrays and strings.
    SliceLen {
        base: NodeRef,
    },
    Assign {
        target: NodeRef,
        value: NodeRef,
    },
    StructLiteral {
        name: String,
        type_args: Vec<NodeRef>,
        fields: Vec<(String, NodeRef)>,
    },
    ArrayLiteral {
        elems: NodeList,
    },
    TupleLiteral {
        elems: NodeList,
    },
    Await {
        task: NodeRef,
    },
    Cast {
        expr: NodeRef,
        ty: NodeRef,
    },
    Identifier(String),
    Literal(Literal),
}

/// Type expressions as written in source. Whether a named type is a struct
/// or an enum is resolved against the symbol table, not decided by syntax.
#[derive(Debug)]
pub enum TypeExpr {
    Named {
        name: String,
        type_args: Vec<NodeRef>,
    },
    Slice {
        elem: NodeRef,
    },
    Array {
        elem: NodeRef,
        len: u64,
    },
    Pointer {
        pointee: NodeRef,
        mutable: bool,
    },
    OptionType {
        inner: NodeRef,
    },
    ResultType {
        ok: NodeRef,
        err: NodeRef,
    },
    Tuple {
        elems: Vec<NodeRef>,
    },
    TaskHandle {
        result: NodeRef,
    },
}

/// One arm of a match: pattern, optional boolean guard, body.
#[derive(Debug)]
pub struct MatchArm {
    pub pattern: Pattern,
    pub guard: Option<NodeRef>,
    pub body: NodeRef,
}

/// A field inside a struct pattern. `ignored` marks `field: _`; a missing
/// binding reuses the field name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldPattern {
    pub name: String,
    pub binding: Option<String>,
    pub ignored: bool,
}

/// Match patterns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Pattern {
    Wildcard,
    Identifier(String),
    Enum {
        /// Qualifier, e.g. `Option` in `Option.Some(x)`. Unqualified
        /// variant patterns leave this empty.
        enum_name: Option<String>,
        variant: String,
        inner: Option<Box<Pattern>>,
    },
    Struct {
        name: String,
        fields: Vec<FieldPattern>,
        /// `..` present: remaining fields intentionally unbound.
        partial: bool,
    },
    Tuple(Vec<Pattern>),
}

impl NodeKind {
    fn collect_children(&self, out: &mut Vec<NodeRef>) {
        match self {
            NodeKind::Program(p) => {
                out.extend(p.imports.iter().cloned());
                out.extend(p.decls.iter().cloned());
            }
            NodeKind::Decl(decl) => decl.collect_children(out),
            NodeKind::Stmt(stmt) => stmt.collect_children(out),
            NodeKind::Expr(expr) => expr.collect_children(out),
            NodeKind::TypeExpr(ty) => ty.collect_children(out),
            NodeKind::MatchArm(arm) => {
                if let Some(guard) = &arm.guard {
                    out.push(guard.clone());
                }
                out.push(arm.body.clone());
            }
        }
    }

    fn deep_clone(&self) -> NodeKind {
        match self {
            NodeKind::Program(p) => NodeKind::Program(Program {
                package: p.package.clone(),
                imports: p.imports.deep_clone(),
                decls: p.decls.deep_clone(),
            }),
            NodeKind::Decl(decl) => NodeKind::Decl(decl.deep_clone()),
            NodeKind::Stmt(stmt) => NodeKind::Stmt(stmt.deep_clone()),
            NodeKind::Expr(expr) => NodeKind::Expr(expr.deep_clone()),
            NodeKind::TypeExpr(ty) => NodeKind::TypeExpr(ty.deep_clone()),
            NodeKind::MatchArm(arm) => NodeKind::MatchArm(MatchArm {
                pattern: arm.pattern.clone(),
                guard: arm.guard.as_ref().map(|g| g.deep_clone()),
                body: arm.body.deep_clone(),
            }),
        }
    }
}

impl Decl {
    fn collect_children(&self, out: &mut Vec<NodeRef>) {
        match self {
            Decl::Function(f) => {
                out.extend(f.params.iter().cloned());
                out.push(f.return_type.clone());
                if let Some(body) = &f.body {
                    out.push(body.clone());
                }
            }
            Decl::Struct(s) => {
                out.extend(s.fields.iter().map(|f| f.ty.clone()));
            }
            Decl::Enum(e) => {
                out.extend(e.variants.iter().cloned());
            }
            Decl::EnumVariant(v) => {
                if let Some(payload) = &v.payload {
                    out.push(payload.clone());
                }
            }
            Decl::ExternFunction(f) => {
                out.extend(f.params.iter().cloned());
                out.push(f.return_type.clone());
            }
            Decl::Parameter(p) => out.push(p.ty.clone()),
            Decl::Const(c) => {
                if let Some(ty) = &c.ty {
                    out.push(ty.clone());
                }
                out.push(c.value.clone());
            }
            Decl::Impl(i) => out.extend(i.methods.iter().cloned()),
            Decl::Import(_) => {}
        }
    }

    fn deep_clone(&self) -> Decl {
        match self {
            Decl::Function(f) => Decl::Function(FunctionDecl {
                name: f.name.clone(),
                visibility: f.visibility,
                params: f.params.deep_clone(),
                return_type: f.return_type.deep_clone(),
                body: f.body.as_ref().map(|b| b.deep_clone()),
                annotations: f.annotations.clone(),
            }),
            Decl::Struct(s) => Decl::Struct(StructDecl {
                name: s.name.clone(),
                visibility: s.visibility,
                type_params: s.type_params.clone(),
                fields: s
                    .fields
                    .iter()
                    .map(|f| StructField {
                        name: f.name.clone(),
                        ty: f.ty.deep_clone(),
                        visibility: f.visibility,
                    })
                    .collect(),
                annotations: s.annotations.clone(),
            }),
            Decl::Enum(e) => Decl::Enum(EnumDecl {
                name: e.name.clone(),
                visibility: e.visibility,
                type_params: e.type_params.clone(),
                variants: e.variants.deep_clone(),
            }),
            Decl::EnumVariant(v) => Decl::EnumVariant(EnumVariantDecl {
                name: v.name.clone(),
                payload: v.payload.as_ref().map(|p| p.deep_clone()),
            }),
            Decl::ExternFunction(f) => Decl::ExternFunction(ExternFnDecl {
                name: f.name.clone(),
                params: f.params.deep_clone(),
                return_type: f.return_type.deep_clone(),
                annotations: f.annotations.clone(),
            }),
            Decl::Parameter(p) => Decl::Parameter(ParamDecl {
                name: p.name.clone(),
                ty: p.ty.deep_clone(),
                mutable: p.mutable,
                annotations: p.annotations.clone(),
            }),
            Decl::Const(c) => Decl::Const(ConstDecl {
                name: c.name.clone(),
                visibility: c.visibility,
                ty: c.ty.as_ref().map(|t| t.deep_clone()),
                value: c.value.deep_clone(),
            }),
            Decl::Impl(i) => Decl::Impl(ImplDecl {
                target: i.target.clone(),
                methods: i.methods.deep_clone(),
            }),
            Decl::Import(i) => Decl::Import(ImportDecl {
                path: i.path.clone(),
                alias: i.alias.clone(),
            }),
        }
    }
}

impl Stmt {
    fn collect_children(&self, out: &mut Vec<NodeRef>) {
        match self {
            Stmt::Block { stmts } => out.extend(stmts.iter().cloned()),
            Stmt::ExprStmt { expr } => out.push(expr.clone()),
            Stmt::Let { ty, init, .. } => {
                if let Some(ty) = ty {
                    out.push(ty.clone());
                }
                if let Some(init) = init {
                    out.push(init.clone());
                }
            }
            Stmt::Return { value } => {
                if let Some(value) = value {
                    out.push(value.clone());
                }
            }
            Stmt::If {
                cond,
                then_block,
                else_block,
            } => {
                out.push(cond.clone());
                out.push(then_block.clone());
                if let Some(else_block) = else_block {
                    out.push(else_block.clone());
                }
            }
            Stmt::ForIn { iterable, body, .. } => {
                out.push(iterable.clone());
                out.push(body.clone());
            }
            Stmt::Match { scrutinee, arms } => {
                out.push(scrutinee.clone());
                out.extend(arms.iter().cloned());
            }
            Stmt::IfLet {
                value,
                then_block,
                else_block,
                ..
            } => {
                out.push(value.clone());
                out.push(then_block.clone());
                if let Some(else_block) = else_block {
                    out.push(else_block.clone());
                }
            }
            Stmt::Spawn { call } => out.push(call.clone()),
            Stmt::SpawnWithHandle { call, .. } => out.push(call.clone()),
            Stmt::Unsafe { block } => out.push(block.clone()),
            Stmt::Break | Stmt::Continue => {}
        }
    }

    fn deep_clone(&self) -> Stmt {
        match self {
            Stmt::Block { stmts } => Stmt::Block {
                stmts: stmts.deep_clone(),
            },
            Stmt::ExprStmt { expr } => Stmt::ExprStmt {
                expr: expr.deep_clone(),
            },
            Stmt::Let {
                name,
                mutable,
                ty,
                init,
                annotations,
            } => Stmt::Let {
                name: name.clone(),
                mutable: *mutable,
                ty: ty.as_ref().map(|t| t.deep_clone()),
                init: init.as_ref().map(|i| i.deep_clone()),
                annotations: annotations.clone(),
            },
            Stmt::Return { value } => Stmt::Return {
                value: value.as_ref().map(|v| v.deep_clone()),
            },
            Stmt::If {
                cond,
                then_block,
                else_block,
            } => Stmt::If {
                cond: cond.deep_clone(),
                then_block: then_block.deep_clone(),
                else_block: else_block.as_ref().map(|e| e.deep_clone()),
            },
            Stmt::ForIn {
                binding,
                iterable,
                body,
            } => Stmt::ForIn {
                binding: binding.clone(),
                iterable: iterable.deep_clone(),
                body: body.deep_clone(),
            },
            Stmt::Match { scrutinee, arms } => Stmt::Match {
                scrutinee: scrutinee.deep_clone(),
                arms: arms.deep_clone(),
            },
            Stmt::IfLet {
                pattern,
                value,
                then_block,
                else_block,
            } => Stmt::IfLet {
                pattern: pattern.clone(),
                value: value.deep_clone(),
                then_block: then_block.deep_clone(),
                else_block: else_block.as_ref().map(|e| e.deep_clone()),
            },
            Stmt::Spawn { call } => Stmt::Spawn {
                call: call.deep_clone(),
            },
            Stmt::SpawnWithHandle { handle, call } => Stmt::SpawnWithHandle {
                handle: handle.clone(),
                call: call.deep_clone(),
            },
            Stmt::Unsafe { block } => Stmt::Unsafe {
                block: block.deep_clone(),
            },
            Stmt::Break => Stmt::Break,
            Stmt::Continue => Stmt::Continue,
        }
    }
}

impl Expr {
    fn collect_children(&self, out: &mut Vec<NodeRef>) {
        match self {
            Expr::Binary { left, right, .. } => {
                out.push(left.clone());
                out.push(right.clone());
            }
            Expr::Unary { operand, .. } => out.push(operand.clone()),
            Expr::Call { callee, args } => {
                out.push(callee.clone());
                out.extend(args.iter().cloned());
            }
            Expr::AssociatedCall { args, .. } => out.extend(args.iter().cloned()),
            Expr::FieldAccess { base, .. } => out.push(base.clone()),
            Expr::IndexAccess { base, index } => {
                out.push(base.clone());
                out.push(index.clone());
            }
            Expr::Slice { base, start, end } => {
                out.push(base.clone());
                if let Some(start) = start {
                    out.push(start.clone());
                }
                if let Some(end) = end {
                    out.push(end.clone());
                }
            }
            Expr::SliceLen { base } => out.push(base.clone()),
            Expr::Assign { target, value } => {
                out.push(target.clone());
                out.push(value.clone());
            }
            Expr::StructLiteral {
                type_args, fields, ..
            } => {
                out.extend(type_args.iter().cloned());
                out.extend(fields.iter().map(|(_, value)| value.clone()));
            }
            Expr::ArrayLiteral { elems } | Expr::TupleLiteral { elems } => {
                out.extend(elems.iter().cloned())
            }
            Expr::Await { task } => out.push(task.clone()),
            Expr::Cast { expr, ty } => {
                out.push(expr.clone());
                out.push(ty.clone());
            }
            Expr::Identifier(_) | Expr::Literal(_) => {}
        }
    }

    fn deep_clone(&self) -> Expr {
        match self {
            Expr::Binary { op, left, right } => Expr::Binary {
                op: *op,
                left: left.deep_clone(),
                right: right.deep_clone(),
            },
            Expr::Unary { op, operand } => Expr::Unary {
                op: *op,
                operand: operand.deep_clone(),
            },
            Expr::Call { callee, args } => Expr::Call {
                callee: callee.deep_clone(),
                args: args.deep_clone(),
            },
            Expr::AssociatedCall {
                owner,
                member,
                args,
            } => Expr::AssociatedCall {
                owner: owner.clone(),
                member: member.clone(),
                args: args.deep_clone(),
            },
            Expr::FieldAccess { base, field } => Expr::FieldAccess {
                base: base.deep_clone(),
                field: field.clone(),
            },
            Expr::IndexAccess { base, index } => Expr::IndexAccess {
                base: base.deep_clone(),
                index: index.deep_clone(),
            },
            Expr::Slice { base, start, end } => Expr::Slice {
                base: base.deep_clone(),
                start: start.as_ref().map(|s| s.deep_clone()),
                end: end.as_ref().map(|e| e.deep_clone()),
            },
            Expr::SliceLen { base } => Expr::SliceLen {
                base: base.deep_clone(),
            },
            Expr::Assign { target, value } => Expr::Assign {
                target: target.deep_clone(),
                value: value.deep_clone(),
            },
            Expr::StructLiteral {
                name,
                type_args,
                fields,
            } => Expr::StructLiteral {
                name: name.clone(),
                type_args: type_args.iter().map(|t| t.deep_clone()).collect(),
                fields: fields
                    .iter()
                    .map(|(name, value)| (name.clone(), value.deep_clone()))
                    .collect(),
            },
            Expr::ArrayLiteral { elems } => Expr::ArrayLiteral {
                elems: elems.deep_clone(),
            },
            Expr::TupleLiteral { elems } => Expr::TupleLiteral {
                elems: elems.deep_clone(),
            },
            Expr::Await { task } => Expr::Await {
                task: task.deep_clone(),
            },
            Expr::Cast { expr, ty } => Expr::Cast {
                expr: expr.deep_clone(),
                ty: ty.deep_clone(),
            },
            Expr::Identifier(name) => Expr::Identifier(name.clone()),
            Expr::Literal(lit) => Expr::Literal(lit.clone()),
        }
    }
}

impl TypeExpr {
    fn collect_children(&self, out: &mut Vec<NodeRef>) {
        match self {
            TypeExpr::Named { type_args, .. } => out.extend(type_args.iter().cloned()),
            TypeExpr::Slice { elem } => out.push(elem.clone()),
            TypeExpr::Array { elem, .. } => out.push(elem.clone()),
            TypeExpr::Pointer { pointee, .. } => out.push(pointee.clone()),
            TypeExpr::OptionType { inner } => out.push(inner.clone()),
            TypeExpr::ResultType { ok, err } => {
                out.push(ok.clone());
                out.push(err.clone());
            }
            TypeExpr::Tuple { elems } => out.extend(elems.iter().cloned()),
            TypeExpr::TaskHandle { result } => out.push(result.clone()),
        }
    }

    fn deep_clone(&self) -> TypeExpr {
        match self {
            TypeExpr::Named { name, type_args } => TypeExpr::Named {
                name: name.clone(),
                type_args: type_args.iter().map(|t| t.deep_clone()).collect(),
            },
            TypeExpr::Slice { elem } => TypeExpr::Slice {
                elem: elem.deep_clone(),
            },
            TypeExpr::Array { elem, len } => TypeExpr::Array {
                elem: elem.deep_clone(),
                len: *len,
            },
            TypeExpr::Pointer { pointee, mutable } => TypeExpr::Pointer {
                pointee: pointee.deep_clone(),
                mutable: *mutable,
            },
            TypeExpr::OptionType { inner } => TypeExpr::OptionType {
                inner: inner.deep_clone(),
            },
            TypeExpr::ResultType { ok, err } => TypeExpr::ResultType {
                ok: ok.deep_clone(),
                err: err.deep_clone(),
            },
            TypeExpr::Tuple { elems } => TypeExpr::Tuple {
                elems: elems.iter().map(|e| e.deep_clone()).collect(),
            },
            TypeExpr::TaskHandle { result } => TypeExpr::TaskHandle {
                result: result.deep_clone(),
            },
        }
    }
}

//! Abstract syntax tree for Artemis.
//!
//! A straightforward sum-type translation of the tagged-tuple tree the
//! source grammar describes (§3): one variant per AST tag, with no shared
//! "tag string" at runtime.

/// A type name as written in source: a primitive, `list:<elem>`, or a class
/// name. Resolved against the [`crate::types::TypeRegistry`] during codegen.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeName {
    Int,
    Float,
    Bool,
    String,
    Void,
    List(Box<TypeName>),
    Class(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub ty: TypeName,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Using {
    pub module: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: TypeName,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub ty: TypeName,
    pub name: String,
    pub default: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Method {
    pub return_type: TypeName,
    pub name: String,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClassMember {
    Field(Field),
    Method(Method),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Class {
    pub name: String,
    pub members: Vec<ClassMember>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TopLevel {
    Function(Function),
    Class(Class),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub using: Vec<Using>,
    pub items: Vec<TopLevel>,
}

/// The target of an `assign` statement: a bare name or a field access.
#[derive(Debug, Clone, PartialEq)]
pub enum AssignTarget {
    Name(String),
    Attr(Box<Expr>, String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expr(Expr),
    Return(Expr),
    ReturnVoid,
    Declare {
        ty: TypeName,
        name: String,
        value: Expr,
    },
    DeclareList {
        elem_ty: TypeName,
        name: String,
        value: Expr,
    },
    DeclareCustom {
        class_name: String,
        name: String,
        value: Expr,
    },
    Assign {
        target: AssignTarget,
        value: Expr,
    },
    IfChain {
        /// Ordered (guard, body) branches; a `None` guard marks the
        /// trailing `else` (at most one, and only as the last element).
        branches: Vec<(Option<Expr>, Vec<Stmt>)>,
    },
    While {
        guard: Expr,
        body: Vec<Stmt>,
    },
    ForIn {
        elem_ty: TypeName,
        var: String,
        list: String,
        body: Vec<Stmt>,
    },
    Break,
    Continue,
}

/// The receiver of a `call_method`: a bare local name, an explicit `var`
/// form, or `this`. The prototype's grammar folds all three into one
/// nonterminal; keeping them distinct here lets dispatch (§4.5) match on
/// the receiver shape directly.
#[derive(Debug, Clone, PartialEq)]
pub enum Receiver {
    Name(String),
    This,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Var(String),
    This,
    ListLiteral(Vec<Expr>),
    Binop {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
    CallMethod {
        receiver: Receiver,
        method: String,
        args: Vec<Expr>,
    },
    /// A method call on an arbitrary expression result (`expr.method(...)`),
    /// distinct from the bare-receiver form above.
    CallMethodExpr {
        receiver: Box<Expr>,
        method: String,
        args: Vec<Expr>,
    },
    ObjectCreation {
        class_name: String,
        args: Vec<Expr>,
    },
    GetAttr {
        object: Box<Expr>,
        field: String,
    },
    PostInc(Box<Expr>),
    PostDec(Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Eq => "==",
            BinOp::NotEq => "!=",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::LtEq => "<=",
            BinOp::GtEq => ">=",
        }
    }
}

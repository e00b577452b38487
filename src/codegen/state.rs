//! Code generation state: symbol tables, class registry, loop stack.

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;

use crate::ast::{Expr, TypeName};
use crate::mapfile::ExternFunctionTable;
use crate::types::{IrType, TypeRegistry};

use super::error::CodeGenError;

/// One declared field: its IR type, its source name, and its optional
/// default-initializer expression (§3, §4.5).
#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub ty: IrType,
    pub name: String,
    pub default: Option<Expr>,
}

/// A class's struct layout and method set (§3, §4.5).
#[derive(Debug, Clone, Default)]
pub struct ClassRecord {
    pub fields: Vec<FieldInfo>,
    pub methods: HashSet<String>,
}

impl ClassRecord {
    /// Returns the field index and type of `name`, or `None` if the class
    /// has no such field. Field index is stable across all accesses (§3
    /// invariant: "field index is stable across all accesses").
    pub fn field(&self, name: &str) -> Option<(usize, &FieldInfo)> {
        self.fields
            .iter()
            .enumerate()
            .find(|(_, f)| f.name == name)
    }
}

/// A resolved sibling Artemis module's symbol namespace (§4.4): maps each
/// exported original name to its mangled name in the merged output.
#[derive(Debug, Clone, Default)]
pub struct ModuleNamespace {
    pub mangled: HashMap<String, String>,
}

/// Per-function/method local binding: its stack-slot SSA name and IR type.
pub type SymbolTable = HashMap<String, (String, IrType)>;

/// A loop's break/continue target blocks, pushed at loop entry and popped
/// at exit (§4.5, §9 "Loop stacks").
#[derive(Debug, Clone)]
pub struct LoopLabels {
    pub break_label: String,
    pub continue_label: String,
}

pub struct CodeGen {
    /// Accumulates function bodies, struct definitions, and `main`.
    pub(super) output: String,
    /// Accumulates string-literal globals, emitted once at the top.
    pub(super) string_globals: String,
    pub(super) temp_counter: usize,
    pub(super) string_counter: usize,
    pub(super) block_counter: usize,

    pub(super) type_registry: TypeRegistry,
    pub(super) classes: HashMap<String, ClassRecord>,
    pub(super) extern_table: ExternFunctionTable,
    pub(super) extern_c_modules: HashSet<String>,
    pub(super) sibling_namespaces: HashMap<String, ModuleNamespace>,
    /// Sibling module name -> (function name -> (argument types, return
    /// type)), used to emit correctly-typed calls for §4.5 dispatch case 3.
    pub(super) sibling_signatures: HashMap<String, HashMap<String, (Vec<IrType>, IrType)>>,

    /// User functions already declared or defined, to avoid re-declaring.
    pub(super) known_functions: HashMap<String, (Vec<IrType>, IrType)>,
    /// Extern symbols already `declare`d in this module's output.
    pub(super) declared_externs: HashSet<String>,
    /// String literal content -> already-emitted global name, so repeated
    /// literals share one global.
    pub(super) string_constants: HashMap<String, String>,

    /// Per-function state, reset by `enter_function`.
    pub(super) symbols: SymbolTable,
    pub(super) loop_stack: Vec<LoopLabels>,
    pub(super) current_class: Option<String>,
    pub(super) current_return_type: IrType,
    /// Tracks whether the current basic block already ended in a
    /// terminator (`ret`/`br`), so statement lowering can skip emitting a
    /// redundant fallthrough jump after an early return inside a branch.
    pub(super) block_terminated: bool,
}

impl Default for CodeGen {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeGen {
    pub fn new() -> Self {
        CodeGen {
            output: String::new(),
            string_globals: String::new(),
            temp_counter: 0,
            string_counter: 0,
            block_counter: 0,
            type_registry: TypeRegistry::new(),
            classes: HashMap::new(),
            extern_table: ExternFunctionTable::new(),
            extern_c_modules: HashSet::new(),
            sibling_namespaces: HashMap::new(),
            sibling_signatures: HashMap::new(),
            known_functions: HashMap::new(),
            declared_externs: HashSet::new(),
            string_constants: HashMap::new(),
            symbols: HashMap::new(),
            loop_stack: Vec::new(),
            current_class: None,
            current_return_type: IrType::Void,
            block_terminated: false,
        }
    }

    pub(super) fn next_temp(&mut self) -> String {
        let name = format!("%t{}", self.temp_counter);
        self.temp_counter += 1;
        name
    }

    pub(super) fn next_block(&mut self, prefix: &str) -> String {
        let name = format!("{prefix}_{}", self.block_counter);
        self.block_counter += 1;
        name
    }

    pub(super) fn lower_type(&self, ty: &TypeName) -> IrType {
        self.type_registry.lower(ty)
    }

    pub(super) fn emit(&mut self, line: &str) -> Result<(), CodeGenError> {
        self.track_terminator(line);
        writeln!(self.output, "{line}").map_err(CodeGenError::from)
    }

    pub(super) fn emitf(&mut self, args: std::fmt::Arguments<'_>) -> Result<(), CodeGenError> {
        let rendered = args.to_string();
        self.track_terminator(&rendered);
        writeln!(self.output, "{rendered}").map_err(CodeGenError::from)
    }

    fn track_terminator(&mut self, line: &str) {
        let trimmed = line.trim_start();
        if trimmed.ends_with(':') {
            self.block_terminated = false;
        } else if trimmed.starts_with("ret ") || trimmed.starts_with("br ") || trimmed == "unreachable" {
            self.block_terminated = true;
        }
    }

    /// Emits `line` only if the current block has not already ended in a
    /// terminator, avoiding a second terminator in one basic block after an
    /// early `return` inside an `if`/`while`/`for` body.
    pub(super) fn emit_if_open(&mut self, line: &str) -> Result<(), CodeGenError> {
        if self.block_terminated {
            return Ok(());
        }
        self.emit(line)
    }

    /// Resets per-function compilation state before lowering a new
    /// function or method body (§4.5 "Function lowering").
    pub(super) fn enter_function(&mut self, return_type: IrType) {
        self.symbols.clear();
        self.loop_stack.clear();
        self.current_return_type = return_type;
        self.block_terminated = false;
    }
}

/// Looks up a local variable, consulting the active symbol table (which,
/// inside a method, already holds the synthetic `this` binding alongside
/// declared locals — §3's "parallel table" is realized as the same table).
pub(super) fn lookup_var<'a>(symbols: &'a SymbolTable, name: &str) -> Option<&'a (String, IrType)> {
    symbols.get(name)
}

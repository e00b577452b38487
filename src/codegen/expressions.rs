//! Expression lowering (§4.5 "Expression lowering").

use crate::ast::{BinOp, Expr, Receiver};
use crate::types::IrType;

use super::error::CodeGenError;
use super::state::{lookup_var, CodeGen};

/// A lowered expression: the SSA value or literal text to use in place of
/// it, and its IR type.
pub type Value = (String, IrType);

impl CodeGen {
    pub fn lower_expr(&mut self, expr: &Expr) -> Result<Value, CodeGenError> {
        match expr {
            Expr::Int(n) => Ok((n.to_string(), IrType::I32)),
            Expr::Float(f) => Ok((format!("{f:?}"), IrType::F32)),
            Expr::Bool(b) => Ok((if *b { "1".to_string() } else { "0".to_string() }, IrType::I1)),
            Expr::Str(s) => self.lower_string_literal(s),
            Expr::Var(name) => self.load_named(name),
            Expr::This => self.load_named("this"),
            Expr::ListLiteral(elements) => {
                let elem_ty = if let Some(first) = elements.first() {
                    let (_, ty) = self.lower_expr(first)?;
                    ty
                } else {
                    IrType::I32
                };
                self.lower_list_literal(elements, &elem_ty)
            }
            Expr::Binop { op, lhs, rhs } => self.lower_binop(*op, lhs, rhs),
            Expr::Call { name, args } => self.lower_call(name, args),
            Expr::CallMethod { receiver, method, args } => {
                self.lower_call_method(receiver, method, args)
            }
            Expr::CallMethodExpr { receiver, method, args } => {
                let (obj_val, obj_ty) = self.lower_expr(receiver)?;
                self.lower_method_on_value(&obj_val, &obj_ty, method, args)
            }
            Expr::ObjectCreation { class_name, args } => self.lower_object_creation(class_name, args),
            Expr::GetAttr { object, field } => self.lower_get_attr(object, field),
            Expr::PostInc(target) => self.lower_post_incdec(target, true),
            Expr::PostDec(target) => self.lower_post_incdec(target, false),
        }
    }

    fn load_named(&mut self, name: &str) -> Result<Value, CodeGenError> {
        let (slot, ty) = lookup_var(&self.symbols, name)
            .cloned()
            .ok_or_else(|| CodeGenError::from(format!("Undefined variable '{name}'")))?;
        let temp = self.next_temp();
        self.emitf(format_args!("  {temp} = load {}, {}* {slot}", ty.llvm(), ty.llvm()))?;
        Ok((temp, ty))
    }

    /// Creates (or reuses) a string-literal global and returns a bitcast
    /// `i8*` value for it, per §4.5: "exposed as `i8*` via a bitcast."
    fn lower_string_literal(&mut self, s: &str) -> Result<Value, CodeGenError> {
        let global = if let Some(existing) = self.string_constants.get(s) {
            existing.clone()
        } else {
            let name = format!(".str.{}", self.string_counter);
            self.string_counter += 1;
            let (escaped, len) = escape_c_string(s);
            use std::fmt::Write as _;
            writeln!(
                self.string_globals,
                "@{name} = private unnamed_addr constant [{len} x i8] c\"{escaped}\""
            )
            .map_err(CodeGenError::from)?;
            self.string_constants.insert(s.to_string(), name.clone());
            name
        };
        let (_, len) = escape_c_string(s);
        let temp = self.next_temp();
        self.emitf(format_args!(
            "  {temp} = bitcast [{len} x i8]* @{global} to i8*"
        ))?;
        Ok((temp, IrType::I8Ptr))
    }

    /// Lowers a `list_literal` (only legal as a `declare_list` initializer,
    /// §4.5) by `malloc`-ing a buffer sized for `elem_ty` and handing it to
    /// `core_list_create_from`.
    pub(super) fn lower_list_literal(
        &mut self,
        elements: &[Expr],
        elem_ty: &IrType,
    ) -> Result<Value, CodeGenError> {
        let elem_size = element_size_bytes(elem_ty);
        let is_pointer = if elem_ty.is_pointer() { 1 } else { 0 };
        let total = elem_size * elements.len().max(1);

        let buf = self.next_temp();
        self.emitf(format_args!("  {buf} = call i8* @malloc(i64 {total})"))?;

        for (i, element) in elements.iter().enumerate() {
            let (val, _) = self.lower_expr(element)?;
            let elem_ptr = self.next_temp();
            self.emitf(format_args!(
                "  {elem_ptr} = getelementptr i8, i8* {buf}, i64 {}",
                i * elem_size
            ))?;
            let typed_ptr = self.next_temp();
            self.emitf(format_args!(
                "  {typed_ptr} = bitcast i8* {elem_ptr} to {}*",
                elem_ty.llvm()
            ))?;
            self.emitf(format_args!(
                "  store {} {val}, {}* {typed_ptr}",
                elem_ty.llvm(),
                elem_ty.llvm()
            ))?;
        }

        let list = self.next_temp();
        self.emitf(format_args!(
            "  {list} = call %List* @core_list_create_from(i8* {buf}, i32 {}, i32 {elem_size}, i1 {is_pointer})",
            elements.len()
        ))?;
        Ok((list, IrType::ListPtr))
    }

    fn lower_binop(&mut self, op: BinOp, lhs: &Expr, rhs: &Expr) -> Result<Value, CodeGenError> {
        let (lval, lty) = self.lower_expr(lhs)?;
        let (rval, rty) = self.lower_expr(rhs)?;

        if lty == IrType::I8Ptr && rty == IrType::I8Ptr {
            return match op {
                BinOp::Add => {
                    let temp = self.next_temp();
                    self.emitf(format_args!(
                        "  {temp} = call i8* @core_string_concat(i8* {lval}, i8* {rval})"
                    ))?;
                    Ok((temp, IrType::I8Ptr))
                }
                BinOp::Eq => {
                    let temp = self.next_temp();
                    self.emitf(format_args!(
                        "  {temp} = call i1 @core_string_equal(i8* {lval}, i8* {rval})"
                    ))?;
                    Ok((temp, IrType::I1))
                }
                _ => Err(CodeGenError::from(format!(
                    "Unsupported operator '{}' on strings",
                    op.symbol()
                ))),
            };
        }

        if lty == IrType::F32 && rty == IrType::F32 {
            let temp = self.next_temp();
            let (instr, result_ty) = float_op(op);
            self.emitf(format_args!("  {temp} = {instr} float {lval}, {rval}"))?;
            return Ok((temp, result_ty));
        }

        if matches!(lty, IrType::I32 | IrType::I1) && matches!(rty, IrType::I32 | IrType::I1) {
            let temp = self.next_temp();
            let (instr, result_ty) = int_op(op);
            self.emitf(format_args!("  {temp} = {instr} i32 {lval}, {rval}"))?;
            return Ok((temp, result_ty));
        }

        Err(CodeGenError::from(format!(
            "Unsupported operator '{}' between {} and {}",
            op.symbol(),
            lty.canonical_name(),
            rty.canonical_name()
        )))
    }

    /// `call name(args)`: object creation if `name` is a registered class,
    /// otherwise a call to a known global function (§4.5).
    fn lower_call(&mut self, name: &str, args: &[Expr]) -> Result<Value, CodeGenError> {
        if self.type_registry.is_class(name) {
            return self.lower_object_creation(name, args);
        }

        let (param_types, return_type) = self
            .known_functions
            .get(name)
            .cloned()
            .ok_or_else(|| CodeGenError::from(format!("Undefined function '{name}'")))?;

        let mut arg_values = Vec::with_capacity(args.len());
        for (arg, expected) in args.iter().zip(param_types.iter()) {
            let (val, ty) = self.lower_expr(arg)?;
            arg_values.push(self.coerce_arg(val, &ty, expected)?);
        }

        self.emit_call(&format!("@{name}"), &arg_values, &param_types, &return_type)
    }

    /// Rewrites an argument value to match a parameter's type when both are
    /// pointer types but spelled differently (§4.5 "implicit pointer-to-
    /// pointer bitcast"); anything else is passed through unchanged and a
    /// real scalar mismatch will simply read wrong at the `call` site.
    fn coerce_arg(&mut self, val: String, actual: &IrType, expected: &IrType) -> Result<String, CodeGenError> {
        if actual == expected || !actual.is_pointer() || !expected.is_pointer() {
            return Ok(val);
        }
        let temp = self.next_temp();
        self.emitf(format_args!(
            "  {temp} = bitcast {} {val} to {}",
            actual.llvm(),
            expected.llvm()
        ))?;
        Ok(temp)
    }

    fn emit_call(
        &mut self,
        callee: &str,
        args: &[String],
        param_types: &[IrType],
        return_type: &IrType,
    ) -> Result<Value, CodeGenError> {
        let arg_list = args
            .iter()
            .zip(param_types.iter())
            .map(|(v, t)| format!("{} {v}", t.llvm()))
            .collect::<Vec<_>>()
            .join(", ");
        if *return_type == IrType::Void {
            self.emitf(format_args!("  call void {callee}({arg_list})"))?;
            Ok(("void".to_string(), IrType::Void))
        } else {
            let temp = self.next_temp();
            self.emitf(format_args!(
                "  {temp} = call {} {callee}({arg_list})",
                return_type.llvm()
            ))?;
            Ok((temp, return_type.clone()))
        }
    }

    /// `call_method` dispatch (§4.5): tries, in order, a local variable of a
    /// known class type, an extern-C module, and a sibling Artemis module.
    /// A receiver literally named `this` is never reached here — `this` is
    /// its own token and always parses to `Receiver::This`, handled above.
    fn lower_call_method(&mut self, receiver: &Receiver, method: &str, args: &[Expr]) -> Result<Value, CodeGenError> {
        let receiver_name = match receiver {
            Receiver::Name(n) => n.clone(),
            Receiver::This => {
                let class = self
                    .current_class
                    .clone()
                    .ok_or_else(|| CodeGenError::from("'this' used outside a method"))?;
                let (this_val, _) = self.load_named("this")?;
                return self.lower_instance_method_call(&class, this_val, method, args);
            }
        };

        // Case 1: local variable of a known class type.
        if let Some((slot, ty)) = lookup_var(&self.symbols, &receiver_name).cloned() {
            if let IrType::ClassPtr(class_name) = &ty {
                let temp = self.next_temp();
                self.emitf(format_args!(
                    "  {temp} = load {}, {}* {slot}",
                    ty.llvm(),
                    ty.llvm()
                ))?;
                return self.lower_instance_method_call(&class_name.clone(), temp, method, args);
            }
        }

        // Case 2: extern-C module.
        if self.extern_c_modules.contains(&receiver_name) {
            return self.lower_extern_call(&receiver_name, method, args);
        }

        // Case 3: sibling Artemis module.
        if let Some(namespace) = self.sibling_namespaces.get(&receiver_name).cloned() {
            let mangled = namespace
                .mangled
                .get(method)
                .ok_or_else(|| CodeGenError::from(format!("'{receiver_name}' has no function '{method}'")))?
                .clone();
            let (param_types, return_type) = self
                .sibling_signatures
                .get(&receiver_name)
                .and_then(|sigs| sigs.get(method))
                .cloned()
                .ok_or_else(|| CodeGenError::from(format!("'{receiver_name}' has no function '{method}'")))?;
            let mut arg_values = Vec::with_capacity(args.len());
            for (arg, expected) in args.iter().zip(param_types.iter()) {
                let (val, ty) = self.lower_expr(arg)?;
                arg_values.push(self.coerce_arg(val, &ty, expected)?);
            }
            return self.emit_call(&format!("@{mangled}"), &arg_values, &param_types, &return_type);
        }

        Err(CodeGenError::from("Undefined object or module"))
    }

    fn lower_method_on_value(&mut self, obj_val: &str, obj_ty: &IrType, method: &str, args: &[Expr]) -> Result<Value, CodeGenError> {
        match obj_ty {
            IrType::ClassPtr(class_name) => {
                self.lower_instance_method_call(&class_name.clone(), obj_val.to_string(), method, args)
            }
            _ => Err(CodeGenError::from("Undefined object or module")),
        }
    }

    fn lower_instance_method_call(
        &mut self,
        class_name: &str,
        this_val: String,
        method: &str,
        args: &[Expr],
    ) -> Result<Value, CodeGenError> {
        let record = self
            .classes
            .get(class_name)
            .ok_or_else(|| CodeGenError::from(format!("Unknown class '{class_name}'")))?;
        if !record.methods.contains(method) {
            return Err(CodeGenError::from(format!(
                "Method '{method}' not found on class '{class_name}'"
            )));
        }
        let mangled = format!("{class_name}_{method}");
        let (param_types, return_type) = self
            .known_functions
            .get(&mangled)
            .cloned()
            .ok_or_else(|| CodeGenError::from(format!("Method '{method}' not found on class '{class_name}'")))?;

        let mut arg_values = vec![this_val];
        for (arg, expected) in args.iter().zip(param_types.iter().skip(1)) {
            let (val, ty) = self.lower_expr(arg)?;
            arg_values.push(self.coerce_arg(val, &ty, expected)?);
        }
        self.emit_call(&format!("@{mangled}"), &arg_values, &param_types, &return_type)
    }

    /// Extern-C dispatch (§4.3, §4.5 case 2): resolves the overload whose
    /// argument-type tuple matches exactly, declares the native symbol on
    /// first use, and calls it directly (no Artemis-side name mangling).
    fn lower_extern_call(&mut self, module: &str, function: &str, args: &[Expr]) -> Result<Value, CodeGenError> {
        let mut arg_values = Vec::with_capacity(args.len());
        let mut arg_types = Vec::with_capacity(args.len());
        for arg in args {
            let (val, ty) = self.lower_expr(arg)?;
            arg_values.push(val);
            arg_types.push(ty);
        }

        let full_name = format!("{module}.{function}");
        let overload = self
            .extern_table
            .resolve(&full_name, &arg_types)
            .cloned()
            .ok_or_else(|| {
                CodeGenError::from(format!(
                    "No overload of '{full_name}' matches argument types ({})",
                    arg_types
                        .iter()
                        .map(IrType::canonical_name)
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            })?;

        if self.declared_externs.insert(overload.native_symbol.clone()) {
            let params = arg_types.iter().map(IrType::llvm).collect::<Vec<_>>().join(", ");
            let decl = format!(
                "declare {} @{}({params})",
                overload.return_type.llvm(),
                overload.native_symbol
            );
            self.string_globals.push_str(&decl);
            self.string_globals.push('\n');
        }

        self.emit_call(
            &format!("@{}", overload.native_symbol),
            &arg_values,
            &arg_types,
            &overload.return_type,
        )
    }

    /// `object_creation`: `alloca`s the struct (classes are stack-resident
    /// by construction here — see DESIGN.md) and either calls a user
    /// `_init` or runs the default field-copy constructor (§4.5, Open
    /// Question #1).
    pub(super) fn lower_object_creation(&mut self, class_name: &str, args: &[Expr]) -> Result<Value, CodeGenError> {
        let record = self
            .classes
            .get(class_name)
            .ok_or_else(|| CodeGenError::from(format!("Unknown class '{class_name}'")))?
            .clone();

        let slot = self.next_temp();
        self.emitf(format_args!("  {slot} = alloca %{class_name}"))?;
        let obj = slot;

        if record.methods.contains("_init") {
            let mangled = format!("{class_name}__init");
            let (param_types, return_type) = self
                .known_functions
                .get(&mangled)
                .cloned()
                .ok_or_else(|| CodeGenError::from(format!("Constructor '_init' not found on class '{class_name}'")))?;
            let mut arg_values = vec![obj.clone()];
            for (arg, expected) in args.iter().zip(param_types.iter().skip(1)) {
                let (val, ty) = self.lower_expr(arg)?;
                arg_values.push(self.coerce_arg(val, &ty, expected)?);
            }
            self.emit_call(&format!("@{mangled}"), &arg_values, &param_types, &return_type)?;
        } else {
            for (i, field) in record.fields.iter().enumerate() {
                let value = if let Some(arg) = args.get(i) {
                    self.lower_expr(arg)?
                } else if let Some(default) = &field.default {
                    self.lower_expr(default)?
                } else {
                    continue;
                };
                let gep = self.next_temp();
                self.emitf(format_args!(
                    "  {gep} = getelementptr %{class_name}, %{class_name}* {obj}, i32 0, i32 {i}"
                ))?;
                let (val, _) = value;
                self.emitf(format_args!("  store {} {val}, {}* {gep}", field.ty.llvm(), field.ty.llvm()))?;
            }
        }

        Ok((obj, IrType::ClassPtr(class_name.to_string())))
    }

    fn lower_get_attr(&mut self, object: &Expr, field: &str) -> Result<Value, CodeGenError> {
        let (obj_val, obj_ty) = self.lower_expr(object)?;
        let class_name = match &obj_ty {
            IrType::ClassPtr(name) => name.clone(),
            _ => return Err(CodeGenError::from("Field access on a non-object value")),
        };
        let record = self
            .classes
            .get(&class_name)
            .ok_or_else(|| CodeGenError::from(format!("Unknown class '{class_name}'")))?;
        let (idx, info) = record
            .field(field)
            .ok_or_else(|| CodeGenError::from(format!("Unknown field '{field}' on class '{class_name}'")))?;
        let field_ty = info.ty.clone();

        let gep = self.next_temp();
        self.emitf(format_args!(
            "  {gep} = getelementptr %{class_name}, %{class_name}* {obj_val}, i32 0, i32 {idx}"
        ))?;
        let temp = self.next_temp();
        self.emitf(format_args!(
            "  {temp} = load {}, {}* {gep}",
            field_ty.llvm(),
            field_ty.llvm()
        ))?;
        Ok((temp, field_ty))
    }

    /// `postinc`/`postdec`: evaluates the target's current value, stores
    /// the incremented/decremented value back, and yields the original
    /// (§4.5).
    fn lower_post_incdec(&mut self, target: &Expr, increment: bool) -> Result<Value, CodeGenError> {
        match target {
            Expr::Var(name) => {
                let (slot, ty) = lookup_var(&self.symbols, name)
                    .cloned()
                    .ok_or_else(|| CodeGenError::from(format!("Undefined variable '{name}'")))?;
                let original = self.next_temp();
                self.emitf(format_args!("  {original} = load {}, {}* {slot}", ty.llvm(), ty.llvm()))?;
                let updated = self.next_temp();
                let op = if increment { "add" } else { "sub" };
                self.emitf(format_args!("  {updated} = {op} i32 {original}, 1"))?;
                self.emitf(format_args!("  store i32 {updated}, i32* {slot}"))?;
                Ok((original, ty))
            }
            Expr::GetAttr { object, field } => {
                let (obj_val, obj_ty) = self.lower_expr(object)?;
                let class_name = match &obj_ty {
                    IrType::ClassPtr(n) => n.clone(),
                    _ => return Err(CodeGenError::from("Field access on a non-object value")),
                };
                let record = self.classes.get(&class_name).cloned().ok_or_else(|| {
                    CodeGenError::from(format!("Unknown class '{class_name}'"))
                })?;
                let (idx, info) = record
                    .field(field)
                    .ok_or_else(|| CodeGenError::from(format!("Unknown field '{field}' on class '{class_name}'")))?;
                let field_ty = info.ty.clone();
                let gep = self.next_temp();
                self.emitf(format_args!(
                    "  {gep} = getelementptr %{class_name}, %{class_name}* {obj_val}, i32 0, i32 {idx}"
                ))?;
                let original = self.next_temp();
                self.emitf(format_args!("  {original} = load {}, {}* {gep}", field_ty.llvm(), field_ty.llvm()))?;
                let updated = self.next_temp();
                let op = if increment { "add" } else { "sub" };
                self.emitf(format_args!("  {updated} = {op} i32 {original}, 1"))?;
                self.emitf(format_args!("  store i32 {updated}, i32* {gep}"))?;
                Ok((original, field_ty))
            }
            _ => Err(CodeGenError::from("Invalid target for post-increment/decrement")),
        }
    }
}

fn int_op(op: BinOp) -> (&'static str, IrType) {
    match op {
        BinOp::Add => ("add", IrType::I32),
        BinOp::Sub => ("sub", IrType::I32),
        BinOp::Mul => ("mul", IrType::I32),
        BinOp::Div => ("sdiv", IrType::I32),
        BinOp::Eq => ("icmp eq", IrType::I1),
        BinOp::NotEq => ("icmp ne", IrType::I1),
        BinOp::Lt => ("icmp slt", IrType::I1),
        BinOp::Gt => ("icmp sgt", IrType::I1),
        BinOp::LtEq => ("icmp sle", IrType::I1),
        BinOp::GtEq => ("icmp sge", IrType::I1),
    }
}

fn float_op(op: BinOp) -> (&'static str, IrType) {
    match op {
        BinOp::Add => ("fadd", IrType::F32),
        BinOp::Sub => ("fsub", IrType::F32),
        BinOp::Mul => ("fmul", IrType::F32),
        BinOp::Div => ("fdiv", IrType::F32),
        BinOp::Eq => ("fcmp oeq", IrType::I1),
        BinOp::NotEq => ("fcmp one", IrType::I1),
        BinOp::Lt => ("fcmp olt", IrType::I1),
        BinOp::Gt => ("fcmp ogt", IrType::I1),
        BinOp::LtEq => ("fcmp ole", IrType::I1),
        BinOp::GtEq => ("fcmp oge", IrType::I1),
    }
}

fn element_size_bytes(ty: &IrType) -> usize {
    match ty {
        IrType::I32 | IrType::F32 => 4,
        IrType::I1 => 1,
        IrType::I8Ptr | IrType::ListPtr | IrType::ClassPtr(_) | IrType::I32Ptr => 8,
        IrType::Void => 0,
    }
}

/// Escapes `s` as an LLVM IR C-string constant body (no surrounding
/// quotes) and returns it alongside the byte length including the NUL
/// terminator LLVM string constants require.
fn escape_c_string(s: &str) -> (String, usize) {
    let mut out = String::new();
    let mut len = 0;
    for byte in s.bytes() {
        len += 1;
        match byte {
            b'"' => out.push_str("\\22"),
            b'\\' => out.push_str("\\5C"),
            0x20..=0x7e => out.push(byte as char),
            _ => out.push_str(&format!("\\{byte:02X}")),
        }
    }
    out.push_str("\\00");
    len += 1;
    (out, len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_quotes_and_backslashes() {
        let (escaped, len) = escape_c_string("a\"b\\c");
        assert_eq!(escaped, "a\\22b\\5Cc\\00");
        assert_eq!(len, 6);
    }

    #[test]
    fn element_size_matches_pointer_width_assumption() {
        assert_eq!(element_size_bytes(&IrType::I32), 4);
        assert_eq!(element_size_bytes(&IrType::I8Ptr), 8);
    }
}

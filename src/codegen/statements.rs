//! Statement lowering (§4.5 "Statement lowering").

use crate::ast::{AssignTarget, Expr, Stmt};
use crate::types::IrType;

use super::error::CodeGenError;
use super::state::lookup_var;
use super::CodeGen;

impl CodeGen {
    pub fn lower_block(&mut self, stmts: &[Stmt]) -> Result<(), CodeGenError> {
        for stmt in stmts {
            self.lower_stmt(stmt)?;
        }
        Ok(())
    }

    fn lower_stmt(&mut self, stmt: &Stmt) -> Result<(), CodeGenError> {
        match stmt {
            Stmt::Expr(expr) => {
                self.lower_expr(expr)?;
                Ok(())
            }
            Stmt::Return(expr) => self.lower_return(expr),
            Stmt::ReturnVoid => self.lower_return_void(),
            Stmt::Declare { ty, name, value } => self.lower_declare(ty, name, value),
            Stmt::DeclareList { elem_ty, name, value } => self.lower_declare_list(elem_ty, name, value),
            Stmt::DeclareCustom { class_name, name, value } => {
                self.lower_declare_custom(class_name, name, value)
            }
            Stmt::Assign { target, value } => self.lower_assign(target, value),
            Stmt::IfChain { branches } => self.lower_if_chain(branches),
            Stmt::While { guard, body } => self.lower_while(guard, body),
            Stmt::ForIn { elem_ty, var, list, body } => self.lower_for_in(elem_ty, var, list, body),
            Stmt::Break => self.lower_break(),
            Stmt::Continue => self.lower_continue(),
        }
    }

    fn lower_return(&mut self, expr: &Expr) -> Result<(), CodeGenError> {
        if self.current_return_type == IrType::Void {
            return Err(CodeGenError::from(
                "'return <value>' used in a void function; use 'return_void'",
            ));
        }
        let (val, ty) = self.lower_expr(expr)?;
        if ty != self.current_return_type {
            return Err(CodeGenError::from(format!(
                "Return type mismatch: expected {}, found {}",
                self.current_return_type.canonical_name(),
                ty.canonical_name()
            )));
        }
        self.emitf(format_args!("  ret {} {val}", ty.llvm()))
    }

    fn lower_return_void(&mut self) -> Result<(), CodeGenError> {
        if self.current_return_type != IrType::Void {
            return Err(CodeGenError::from(
                "'return_void' used in a non-void function; use 'return <value>'",
            ));
        }
        self.emit("  ret void")
    }

    fn lower_declare(&mut self, ty: &crate::ast::TypeName, name: &str, value: &Expr) -> Result<(), CodeGenError> {
        let ir_ty = self.lower_type(ty);
        let (val, actual_ty) = self.lower_expr(value)?;
        let val = self.coerce_store_value(val, &actual_ty, &ir_ty)?;
        let slot = self.alloca_and_store(&ir_ty, &val)?;
        self.symbols.insert(name.to_string(), (slot, ir_ty));
        Ok(())
    }

    fn lower_declare_list(&mut self, elem_ty: &crate::ast::TypeName, name: &str, value: &Expr) -> Result<(), CodeGenError> {
        let ir_elem_ty = self.lower_type(elem_ty);
        let (val, ty) = match value {
            Expr::ListLiteral(elements) => self.lower_list_literal(elements, &ir_elem_ty)?,
            other => self.lower_expr(other)?,
        };
        if ty != IrType::ListPtr {
            return Err(CodeGenError::from("declare_list initializer did not produce a list"));
        }
        let slot = self.alloca_and_store(&IrType::ListPtr, &val)?;
        self.symbols.insert(name.to_string(), (slot, IrType::ListPtr));
        Ok(())
    }

    fn lower_declare_custom(&mut self, class_name: &str, name: &str, value: &Expr) -> Result<(), CodeGenError> {
        let (val, ty) = match value {
            Expr::Call { name: callee, args } if callee == class_name => {
                self.lower_object_creation(class_name, args)?
            }
            other => self.lower_expr(other)?,
        };
        let expected = IrType::ClassPtr(class_name.to_string());
        if ty != expected {
            return Err(CodeGenError::from(format!(
                "declare_custom initializer for '{name}' did not produce a {class_name}"
            )));
        }
        let slot = self.alloca_and_store(&expected, &val)?;
        self.symbols.insert(name.to_string(), (slot, expected));
        Ok(())
    }

    fn lower_assign(&mut self, target: &AssignTarget, value: &Expr) -> Result<(), CodeGenError> {
        let (val, val_ty) = self.lower_expr(value)?;
        match target {
            AssignTarget::Name(name) => {
                let (slot, ty) = lookup_var(&self.symbols, name)
                    .cloned()
                    .ok_or_else(|| CodeGenError::from(format!("Undefined variable '{name}'")))?;
                let val = self.coerce_store_value(val, &val_ty, &ty)?;
                self.emitf(format_args!("  store {} {val}, {}* {slot}", ty.llvm(), ty.llvm()))
            }
            AssignTarget::Attr(object, field) => {
                let (obj_val, obj_ty) = self.lower_expr(object)?;
                let class_name = match &obj_ty {
                    IrType::ClassPtr(n) => n.clone(),
                    _ => return Err(CodeGenError::from("Field assignment on a non-object value")),
                };
                let record = self
                    .classes
                    .get(&class_name)
                    .cloned()
                    .ok_or_else(|| CodeGenError::from(format!("Unknown class '{class_name}'")))?;
                let (idx, info) = record
                    .field(field)
                    .ok_or_else(|| CodeGenError::from(format!("Unknown field '{field}' on class '{class_name}'")))?;
                let field_ty = info.ty.clone();
                let val = self.coerce_store_value(val, &val_ty, &field_ty)?;
                let gep = self.next_temp();
                self.emitf(format_args!(
                    "  {gep} = getelementptr %{class_name}, %{class_name}* {obj_val}, i32 0, i32 {idx}"
                ))?;
                self.emitf(format_args!("  store {} {val}, {}* {gep}", field_ty.llvm(), field_ty.llvm()))
            }
        }
    }

    /// Stores attempt an implicit pointer-to-pointer bitcast on a type
    /// mismatch; a scalar mismatch is fatal (§4.5).
    fn coerce_store_value(&mut self, val: String, actual: &IrType, expected: &IrType) -> Result<String, CodeGenError> {
        if actual == expected {
            return Ok(val);
        }
        if actual.is_pointer() && expected.is_pointer() {
            let temp = self.next_temp();
            self.emitf(format_args!(
                "  {temp} = bitcast {} {val} to {}",
                actual.llvm(),
                expected.llvm()
            ))?;
            return Ok(temp);
        }
        Err(CodeGenError::from(format!(
            "Type mismatch: cannot store {} into a slot of type {}",
            actual.canonical_name(),
            expected.canonical_name()
        )))
    }

    pub(super) fn alloca_and_store(&mut self, ty: &IrType, value: &str) -> Result<String, CodeGenError> {
        let slot = self.next_temp();
        self.emitf(format_args!("  {slot} = alloca {}", ty.llvm()))?;
        self.emitf(format_args!("  store {} {value}, {}* {slot}", ty.llvm(), ty.llvm()))?;
        Ok(slot)
    }

    /// `if_chain`: each guarded branch gets a `_then` block; the final
    /// (possibly absent) `else` shares one `_end` block with everything
    /// else (§4.5, §9 "if/else-if chain block shape").
    fn lower_if_chain(&mut self, branches: &[(Option<Expr>, Vec<Stmt>)]) -> Result<(), CodeGenError> {
        let end_label = self.next_block("if_end");
        let has_trailing_else = branches.last().map(|(g, _)| g.is_none()).unwrap_or(false);
        let mut any_fallthrough = !has_trailing_else;

        for (i, (guard, body)) in branches.iter().enumerate() {
            let is_last = i + 1 == branches.len();
            match guard {
                Some(guard_expr) => {
                    let then_label = self.next_block("if_then");
                    let else_label = if is_last {
                        end_label.clone()
                    } else {
                        self.next_block("if_next")
                    };
                    let (cond, _) = self.lower_expr(guard_expr)?;
                    self.emitf(format_args!("  br i1 {cond}, label %{then_label}, label %{else_label}"))?;
                    self.emitf(format_args!("{then_label}:"))?;
                    self.lower_block(body)?;
                    if !self.block_terminated {
                        any_fallthrough = true;
                    }
                    self.emit_if_open(&format!("  br label %{end_label}"))?;
                    self.emitf(format_args!("{else_label}:"))?;
                }
                None => {
                    self.lower_block(body)?;
                    if !self.block_terminated {
                        any_fallthrough = true;
                    }
                    self.emit_if_open(&format!("  br label %{end_label}"))?;
                }
            }
        }

        self.emitf(format_args!("{end_label}:"))?;
        if !any_fallthrough {
            self.emit("  unreachable")?;
        }
        Ok(())
    }

    /// `while`: four-block shape, guard re-checked at the top of the loop
    /// (§4.5, §9).
    fn lower_while(&mut self, guard: &Expr, body: &[Stmt]) -> Result<(), CodeGenError> {
        let cond_label = self.next_block("while_cond");
        let body_label = self.next_block("while_body");
        let end_label = self.next_block("while_end");

        self.emitf(format_args!("  br label %{cond_label}"))?;
        self.emitf(format_args!("{cond_label}:"))?;
        let (cond, _) = self.lower_expr(guard)?;
        self.emitf(format_args!("  br i1 {cond}, label %{body_label}, label %{end_label}"))?;

        self.emitf(format_args!("{body_label}:"))?;
        self.loop_stack.push(super::state::LoopLabels {
            break_label: end_label.clone(),
            continue_label: cond_label.clone(),
        });
        self.lower_block(body)?;
        self.loop_stack.pop();
        self.emit_if_open(&format!("  br label %{cond_label}"))?;

        self.emitf(format_args!("{end_label}:"))
    }

    /// `for_in`: an index slot walked against `core_list_len`/`core_list_get`
    /// (§4.5, §9 "for-in loop block shape").
    fn lower_for_in(
        &mut self,
        elem_ty: &crate::ast::TypeName,
        var: &str,
        list: &str,
        body: &[Stmt],
    ) -> Result<(), CodeGenError> {
        let ir_elem_ty = self.lower_type(elem_ty);
        let (list_slot, list_ty) = lookup_var(&self.symbols, list)
            .cloned()
            .ok_or_else(|| CodeGenError::from(format!("Undefined variable '{list}'")))?;
        if list_ty != IrType::ListPtr {
            return Err(CodeGenError::from(format!("'{list}' is not a list")));
        }
        let list_val = self.next_temp();
        self.emitf(format_args!("  {list_val} = load %List*, %List** {list_slot}"))?;
        let len = self.next_temp();
        self.emitf(format_args!("  {len} = call i32 @core_list_len(%List* {list_val})"))?;

        let index_slot = self.alloca_and_store(&IrType::I32, "0")?;

        let cond_label = self.next_block("for_cond");
        let body_label = self.next_block("for_body");
        let step_label = self.next_block("for_step");
        let end_label = self.next_block("for_end");

        self.emitf(format_args!("  br label %{cond_label}"))?;
        self.emitf(format_args!("{cond_label}:"))?;
        let index = self.next_temp();
        self.emitf(format_args!("  {index} = load i32, i32* {index_slot}"))?;
        let cmp = self.next_temp();
        self.emitf(format_args!("  {cmp} = icmp slt i32 {index}, {len}"))?;
        self.emitf(format_args!("  br i1 {cmp}, label %{body_label}, label %{end_label}"))?;

        self.emitf(format_args!("{body_label}:"))?;
        let raw = self.next_temp();
        self.emitf(format_args!("  {raw} = call i8* @core_list_get(%List* {list_val}, i32 {index})"))?;
        let elem_val = if ir_elem_ty.is_pointer() {
            let temp = self.next_temp();
            self.emitf(format_args!("  {temp} = bitcast i8* {raw} to {}", ir_elem_ty.llvm()))?;
            temp
        } else {
            let typed_ptr = self.next_temp();
            self.emitf(format_args!("  {typed_ptr} = bitcast i8* {raw} to {}*", ir_elem_ty.llvm()))?;
            let loaded = self.next_temp();
            self.emitf(format_args!(
                "  {loaded} = load {}, {}* {typed_ptr}",
                ir_elem_ty.llvm(),
                ir_elem_ty.llvm()
            ))?;
            loaded
        };
        let elem_slot = self.alloca_and_store(&ir_elem_ty, &elem_val)?;
        self.symbols.insert(var.to_string(), (elem_slot, ir_elem_ty));

        self.loop_stack.push(super::state::LoopLabels {
            break_label: end_label.clone(),
            continue_label: step_label.clone(),
        });
        self.lower_block(body)?;
        self.loop_stack.pop();
        self.symbols.remove(var);
        self.emit_if_open(&format!("  br label %{step_label}"))?;

        self.emitf(format_args!("{step_label}:"))?;
        let next_index = self.next_temp();
        self.emitf(format_args!("  {next_index} = add i32 {index}, 1"))?;
        self.emitf(format_args!("  store i32 {next_index}, i32* {index_slot}"))?;
        self.emitf(format_args!("  br label %{cond_label}"))?;

        self.emitf(format_args!("{end_label}:"))
    }

    fn lower_break(&mut self) -> Result<(), CodeGenError> {
        let label = self
            .loop_stack
            .last()
            .ok_or_else(|| CodeGenError::from("'break' used outside a loop"))?
            .break_label
            .clone();
        self.emitf(format_args!("  br label %{label}"))
    }

    fn lower_continue(&mut self) -> Result<(), CodeGenError> {
        let label = self
            .loop_stack
            .last()
            .ok_or_else(|| CodeGenError::from("'continue' used outside a loop"))?
            .continue_label
            .clone();
        self.emitf(format_args!("  br label %{label}"))
    }
}

//! Function, method, and class lowering (§4.5 "Function lowering", "Class
//! lowering").

use crate::ast::{Class, ClassMember, Function, Method, Param, TypeName};
use crate::types::IrType;

use super::error::CodeGenError;
use super::state::{ClassRecord, FieldInfo};
use super::CodeGen;

impl CodeGen {
    /// Registers every top-level function's and class method's signature
    /// before any body is lowered, so forward references within the same
    /// module (a function calling one declared later) resolve without
    /// guessing a return type at the call site.
    pub fn register_signatures(&mut self, program: &crate::ast::Program) {
        for item in &program.items {
            if let crate::ast::TopLevel::Class(class) = item {
                self.type_registry.register_class(&class.name);
            }
        }
        for item in &program.items {
            match item {
                crate::ast::TopLevel::Function(f) => {
                    let param_types = f.params.iter().map(|p| self.lower_type(&p.ty)).collect();
                    let return_type = self.lower_type(&f.return_type);
                    self.known_functions.insert(f.name.clone(), (param_types, return_type));
                }
                crate::ast::TopLevel::Class(class) => {
                    self.register_class_signature(class);
                }
            }
        }
    }

    fn register_class_signature(&mut self, class: &Class) {
        let mut record = ClassRecord::default();
        for member in &class.members {
            if let ClassMember::Field(field) = member {
                record.fields.push(FieldInfo {
                    ty: self.lower_type(&field.ty),
                    name: field.name.clone(),
                    default: field.default.clone(),
                });
            }
        }
        for member in &class.members {
            if let ClassMember::Method(method) = member {
                record.methods.insert(method.name.clone());
                let mangled = format!("{}_{}", class.name, method.name);
                let mut param_types = vec![IrType::ClassPtr(class.name.clone())];
                param_types.extend(method.params.iter().map(|p| self.lower_type(&p.ty)));
                let return_type = self.lower_type(&method.return_type);
                self.known_functions.insert(mangled, (param_types, return_type));
            }
        }
        self.classes.insert(class.name.clone(), record);
    }

    /// Lowers a top-level `class` declaration: the identified struct type,
    /// then each method in declaration order (§4.5).
    pub fn lower_class(&mut self, class: &Class) -> Result<(), CodeGenError> {
        let record = self.classes.get(&class.name).cloned().unwrap_or_default();
        let field_list = record
            .fields
            .iter()
            .map(|f| f.ty.llvm())
            .collect::<Vec<_>>()
            .join(", ");
        self.emitf(format_args!("%{} = type {{ {field_list} }}", class.name))?;

        for member in &class.members {
            if let ClassMember::Method(method) = member {
                self.lower_method(&class.name, method)?;
            }
        }
        Ok(())
    }

    fn lower_method(&mut self, class_name: &str, method: &Method) -> Result<(), CodeGenError> {
        let return_type = self.lower_type(&method.return_type);
        self.enter_function(return_type.clone());
        self.current_class = Some(class_name.to_string());

        let mangled = format!("{class_name}_{}", method.name);
        let this_param = Param {
            ty: TypeName::Class(class_name.to_string()),
            name: "this".to_string(),
        };
        let mut params = vec![this_param];
        params.extend(method.params.iter().cloned());

        self.emit_function_header(&mangled, &params, &return_type)?;

        if method.name == "_init" {
            self.lower_default_field_copy(class_name)?;
        }
        self.lower_block(&method.body)?;
        self.finish_function(&method.name, &return_type)?;
        self.current_class = None;
        Ok(())
    }

    /// `_init`'s default name-matched field-copy behavior, run
    /// unconditionally before the user's constructor body (Open Question #1,
    /// DESIGN.md).
    fn lower_default_field_copy(&mut self, class_name: &str) -> Result<(), CodeGenError> {
        let record = self.classes.get(class_name).cloned().unwrap_or_default();
        let (this_slot, this_ty) = self.symbols.get("this").cloned().unwrap();
        for (i, field) in record.fields.iter().enumerate() {
            if let Some(param_name) = self.lookup_param_name_for_field(field) {
                let (val_slot, val_ty) = self.symbols.get(&param_name).cloned().unwrap();
                let loaded = self.next_temp();
                self.emitf(format_args!("  {loaded} = load {}, {}* {val_slot}", val_ty.llvm(), val_ty.llvm()))?;
                let this_val = self.next_temp();
                self.emitf(format_args!("  {this_val} = load {}, {}* {this_slot}", this_ty.llvm(), this_ty.llvm()))?;
                let gep = self.next_temp();
                self.emitf(format_args!(
                    "  {gep} = getelementptr %{class_name}, %{class_name}* {this_val}, i32 0, i32 {i}"
                ))?;
                self.emitf(format_args!("  store {} {loaded}, {}* {gep}", field.ty.llvm(), field.ty.llvm()))?;
            }
        }
        Ok(())
    }

    /// Matches a field to a same-named constructor parameter currently in
    /// scope. A field with no such parameter is left untouched by this
    /// pass; it keeps whatever the user's `_init` body assigns to it, or
    /// stays at the alloca's indeterminate contents if nothing does.
    fn lookup_param_name_for_field(&self, field: &FieldInfo) -> Option<String> {
        if self.symbols.contains_key(&field.name) {
            Some(field.name.clone())
        } else {
            None
        }
    }

    /// Lowers a top-level `function` declaration (§4.5 "Function lowering").
    pub fn lower_function(&mut self, function: &Function) -> Result<(), CodeGenError> {
        let return_type = self.lower_type(&function.return_type);
        self.enter_function(return_type.clone());
        self.emit_function_header(&function.name, &function.params, &return_type)?;
        self.lower_block(&function.body)?;
        self.finish_function(&function.name, &return_type)?;
        Ok(())
    }

    fn emit_function_header(&mut self, name: &str, params: &[Param], return_type: &IrType) -> Result<(), CodeGenError> {
        let param_list = params
            .iter()
            .map(|p| format!("{} %arg_{}", self.lower_type(&p.ty).llvm(), p.name))
            .collect::<Vec<_>>()
            .join(", ");
        self.emitf(format_args!("define {} @{name}({param_list}) {{", return_type.llvm()))?;
        self.emit("entry:")?;

        for param in params {
            let ty = self.lower_type(&param.ty);
            let slot = self.alloca_and_store(&ty, &format!("%arg_{}", param.name))?;
            self.symbols.insert(param.name.clone(), (slot, ty));
        }
        Ok(())
    }

    /// Closes the current function body, raising "Missing return in
    /// function <name>" if control can fall off the end without one
    /// (§4.5 fatal error list).
    fn finish_function(&mut self, name: &str, return_type: &IrType) -> Result<(), CodeGenError> {
        if !self.block_terminated {
            if *return_type == IrType::Void {
                self.emit("  ret void")?;
            } else {
                return Err(CodeGenError::from(format!("Missing return in function {name}")));
            }
        }
        self.emit("}")?;
        self.emit("")
    }
}

//! Type registry: canonical mapping between surface type names and IR types.
//!
//! Artemis's type universe is small: primitive scalars, `string`, `list`,
//! and user classes.

use std::collections::HashMap;

use crate::ast::TypeName;

/// An IR-level type, one step removed from the LLVM text syntax so that
/// callers don't re-derive pointer-ness by string matching.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IrType {
    I32,
    F32,
    I1,
    /// `i8*` (opaque pointers are not assumed; Artemis targets classic
    /// typed LLVM pointers throughout, matching the map-file era of IR).
    I8Ptr,
    Void,
    /// Pointer to the opaque `%List` struct.
    ListPtr,
    /// Pointer to an identified class struct, by class name.
    ClassPtr(String),
    /// `i32*`, the map-file `int*` out-parameter type (§6).
    I32Ptr,
}

impl IrType {
    /// Render this type's LLVM-IR spelling.
    pub fn llvm(&self) -> String {
        match self {
            IrType::I32 => "i32".to_string(),
            IrType::F32 => "float".to_string(),
            IrType::I1 => "i1".to_string(),
            IrType::I8Ptr => "i8*".to_string(),
            IrType::Void => "void".to_string(),
            IrType::ListPtr => "%List*".to_string(),
            IrType::ClassPtr(name) => format!("%{name}*"),
            IrType::I32Ptr => "i32*".to_string(),
        }
    }

    pub fn is_pointer(&self) -> bool {
        matches!(
            self,
            IrType::I8Ptr | IrType::ListPtr | IrType::ClassPtr(_) | IrType::I32Ptr
        )
    }

    /// The canonical name used as a key in overload tuples (§4.3, §4.5).
    /// `string` and `str` are synonyms (§9, open question #2) and both
    /// collapse to `"string"` here, never `"str"`.
    pub fn canonical_name(&self) -> String {
        match self {
            IrType::I32 => "int".to_string(),
            IrType::F32 => "float".to_string(),
            IrType::I1 => "bool".to_string(),
            IrType::I8Ptr => "string".to_string(),
            IrType::Void => "void".to_string(),
            IrType::ListPtr => "list".to_string(),
            IrType::ClassPtr(name) => name.clone(),
            IrType::I32Ptr => "int*".to_string(),
        }
    }
}

/// Tracks user-declared classes so the registry can resolve `TypeName::Class`
/// and `list:<ClassName>` element types to the right struct pointer.
#[derive(Debug, Default, Clone)]
pub struct TypeRegistry {
    known_classes: HashMap<String, ()>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        TypeRegistry::default()
    }

    pub fn register_class(&mut self, name: &str) {
        self.known_classes.insert(name.to_string(), ());
    }

    pub fn is_class(&self, name: &str) -> bool {
        self.known_classes.contains_key(name)
    }

    /// Lowers a surface `TypeName` (as produced by the parser) to its IR
    /// type. Class names that haven't been registered yet still lower to a
    /// named struct pointer; existence is validated at the use site by the
    /// class registry in codegen, not here.
    pub fn lower(&self, ty: &TypeName) -> IrType {
        match ty {
            TypeName::Int => IrType::I32,
            TypeName::Float => IrType::F32,
            TypeName::Bool => IrType::I1,
            TypeName::String => IrType::I8Ptr,
            TypeName::Void => IrType::Void,
            TypeName::List(_) => IrType::ListPtr,
            TypeName::Class(name) => IrType::ClassPtr(name.clone()),
        }
    }

    /// Maps a map-file type token (§6: `int`, `float`, `bool`, `str`,
    /// `string`, `int*`, `void`, or a name starting with `list`) to an IR
    /// type, used both for argument tuples and return types.
    pub fn lower_extern_type_name(name: &str) -> Option<IrType> {
        Some(match name {
            "int" => IrType::I32,
            "float" => IrType::F32,
            "bool" => IrType::I1,
            "str" | "string" => IrType::I8Ptr,
            "int*" => IrType::I32Ptr,
            "void" => IrType::Void,
            n if n.starts_with("list") => IrType::ListPtr,
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_and_str_are_synonyms() {
        assert_eq!(
            TypeRegistry::lower_extern_type_name("str"),
            TypeRegistry::lower_extern_type_name("string")
        );
    }

    #[test]
    fn list_prefixed_names_lower_to_list_ptr() {
        assert_eq!(
            TypeRegistry::lower_extern_type_name("list:int"),
            Some(IrType::ListPtr)
        );
    }

    #[test]
    fn canonical_name_never_emits_str() {
        assert_eq!(IrType::I8Ptr.canonical_name(), "string");
    }
}

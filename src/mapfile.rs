//! Map-file loader (§4.3, §6).
//!
//! Map files are a small INI-like format, not TOML (the value side of a
//! `[functions]` entry uses `>` and `,` in ways TOML's grammar rejects), so
//! this is a hand-written line scanner rather than a `toml`/`serde`
//! deserialization.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::types::IrType;

/// One resolved overload of an extern-C function: the native symbol to
/// call and its declared return type.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternOverload {
    pub native_symbol: String,
    pub return_type: IrType,
}

/// Extern function table: `module.fn` -> (argument type tuple -> overload).
/// Models the overload sets described in §3.
#[derive(Debug, Default, Clone)]
pub struct ExternFunctionTable {
    overloads: HashMap<String, HashMap<Vec<IrType>, ExternOverload>>,
}

impl ExternFunctionTable {
    pub fn new() -> Self {
        ExternFunctionTable::default()
    }

    pub(crate) fn insert(&mut self, full_name: String, arg_types: Vec<IrType>, overload: ExternOverload) {
        self.overloads.entry(full_name).or_default().insert(arg_types, overload);
    }

    /// Looks up the overload of `module.fn` whose argument-type tuple
    /// matches `arg_types` exactly (§4.3: "no implicit coercion").
    pub fn resolve(&self, full_name: &str, arg_types: &[IrType]) -> Option<&ExternOverload> {
        self.overloads.get(full_name)?.get(arg_types)
    }

    pub fn has_function(&self, full_name: &str) -> bool {
        self.overloads.contains_key(full_name)
    }
}

/// A single parsed `.map` file.
#[derive(Debug, Clone)]
pub struct MapFile {
    pub module_name: String,
    /// (artemis_fn, arg_type_names, native_symbol, return_type_name)
    pub entries: Vec<(String, Vec<String>, String, String)>,
}

/// Parses one `.map` file's text.
pub fn parse_map_file(text: &str) -> Result<MapFile, String> {
    let mut module_name = None;
    let mut entries = Vec::new();
    let mut section = "";

    for (lineno, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }
        if line.starts_with('[') && line.ends_with(']') {
            section = &line[1..line.len() - 1];
            continue;
        }
        match section {
            "meta" => {
                let (key, value) = split_once_eq(line, lineno)?;
                if key.trim() == "name" {
                    module_name = Some(value.trim().to_string());
                }
            }
            "functions" => {
                let (key, value) = split_once_eq(line, lineno)?;
                let (fn_name, arg_part) = key
                    .trim()
                    .split_once(':')
                    .map(|(n, a)| (n.trim().to_string(), a.trim()))
                    .unwrap_or_else(|| (key.trim().to_string(), ""));
                let arg_types: Vec<String> = if arg_part.is_empty() {
                    Vec::new()
                } else {
                    arg_part.split(',').map(|s| s.trim().to_string()).collect()
                };
                let (symbol, return_ty) = value
                    .trim()
                    .split_once('>')
                    .map(|(s, r)| (s.trim().to_string(), r.trim().to_string()))
                    .ok_or_else(|| {
                        format!("Malformed map entry at line {}: missing '>' return type", lineno + 1)
                    })?;
                entries.push((fn_name, arg_types, symbol, return_ty));
            }
            other => {
                return Err(format!(
                    "Malformed map file: unexpected content outside a section (section {other:?}) at line {}",
                    lineno + 1
                ));
            }
        }
    }

    let module_name = module_name
        .ok_or_else(|| "Malformed map file: missing [meta] name".to_string())?;
    Ok(MapFile {
        module_name,
        entries,
    })
}

fn split_once_eq(line: &str, lineno: usize) -> Result<(String, String), String> {
    line.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("Malformed map file: missing '=' at line {}", lineno + 1))
}

/// Loads every `.map` file found under `search_paths`, registering a
/// module's overloads into `table` only if its declared name is `core` or
/// is present in `using_set` (§4.3).
pub fn load_map_files(
    search_paths: &[impl AsRef<Path>],
    using_set: &std::collections::HashSet<String>,
    table: &mut ExternFunctionTable,
    extern_c_modules: &mut std::collections::HashSet<String>,
) -> Result<(), String> {
    for dir in search_paths {
        let dir = dir.as_ref();
        let Ok(read_dir) = fs::read_dir(dir) else {
            continue;
        };
        for entry in read_dir.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("map") {
                continue;
            }
            let text = fs::read_to_string(&path)
                .map_err(|e| format!("Failed to read map file {}: {e}", path.display()))?;
            let map_file = parse_map_file(&text)
                .map_err(|e| format!("{} in {}", e, path.display()))?;

            if map_file.module_name != "core" && !using_set.contains(&map_file.module_name) {
                continue;
            }
            extern_c_modules.insert(map_file.module_name.clone());

            for (fn_name, arg_type_names, symbol, return_ty_name) in &map_file.entries {
                let mut arg_types = Vec::with_capacity(arg_type_names.len());
                for name in arg_type_names {
                    let ty = crate::types::TypeRegistry::lower_extern_type_name(name)
                        .ok_or_else(|| format!("Unknown map argument type '{name}' in {}", path.display()))?;
                    arg_types.push(ty);
                }
                let return_type = crate::types::TypeRegistry::lower_extern_type_name(return_ty_name)
                    .ok_or_else(|| format!("Unknown map return type '{return_ty_name}' in {}", path.display()))?;
                let full_name = format!("{}.{}", map_file.module_name, fn_name);
                table.insert(
                    full_name,
                    arg_types,
                    ExternOverload {
                        native_symbol: symbol.clone(),
                        return_type,
                    },
                );
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::io::Write;

    #[test]
    fn parses_meta_and_functions() {
        let text = "[meta]\nname = io\n\n[functions]\nprint:str = native_print > void\n";
        let map = parse_map_file(text).unwrap();
        assert_eq!(map.module_name, "io");
        assert_eq!(
            map.entries[0],
            (
                "print".to_string(),
                vec!["str".to_string()],
                "native_print".to_string(),
                "void".to_string()
            )
        );
    }

    #[test]
    fn parses_overload_with_no_arguments() {
        let text = "[meta]\nname = io\n\n[functions]\nflush: = native_flush > void\n";
        let map = parse_map_file(text).unwrap();
        assert_eq!(map.entries[0].1, Vec::<String>::new());
    }

    #[test]
    fn core_module_loads_even_when_not_in_using_set() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = fs::File::create(dir.path().join("core.map")).unwrap();
        writeln!(f, "[meta]\nname = core\n\n[functions]\nlen:list = core_list_len > int\n").unwrap();

        let mut table = ExternFunctionTable::new();
        let mut modules = HashSet::new();
        load_map_files(&[dir.path()], &HashSet::new(), &mut table, &mut modules).unwrap();
        assert!(modules.contains("core"));
        assert!(table.has_function("core.len"));
    }

    #[test]
    fn module_not_in_using_set_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = fs::File::create(dir.path().join("io.map")).unwrap();
        writeln!(f, "[meta]\nname = io\n\n[functions]\nprint:str = native_print > void\n").unwrap();

        let mut table = ExternFunctionTable::new();
        let mut modules = HashSet::new();
        load_map_files(&[dir.path()], &HashSet::new(), &mut table, &mut modules).unwrap();
        assert!(!modules.contains("io"));
        assert!(!table.has_function("io.print"));
    }

    #[test]
    fn overload_resolution_matches_exact_argument_tuple() {
        let mut table = ExternFunctionTable::new();
        table.insert(
            "io.write".to_string(),
            vec![IrType::I8Ptr],
            ExternOverload {
                native_symbol: "native_write_str".to_string(),
                return_type: IrType::Void,
            },
        );
        table.insert(
            "io.write".to_string(),
            vec![IrType::I32],
            ExternOverload {
                native_symbol: "native_write_int".to_string(),
                return_type: IrType::Void,
            },
        );
        assert_eq!(
            table.resolve("io.write", &[IrType::I32]).unwrap().native_symbol,
            "native_write_int"
        );
        assert!(table.resolve("io.write", &[IrType::F32]).is_none());
    }
}

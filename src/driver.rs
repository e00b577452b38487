//! Top-level compilation driver: lex → parse → resolve `using` → lower →
//! merge (§4.6). A single public entry point strings the pipeline stages
//! together and turns any stage's error into one `Result<_, String>`.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::codegen::{lower_program, LoweredModule};
use crate::config::CompilerConfig;
use crate::mapfile::{load_map_files, ExternFunctionTable, ExternOverload};
use crate::resolver::{classify_using, mangle_sibling, UsingResolution};
use crate::types::IrType;

/// Compiles the `.arx` file at `entry_path` to a complete LLVM IR text
/// module, resolving every `using` dependency along the way.
pub fn compile_file(entry_path: &Path, config: &CompilerConfig) -> Result<String, String> {
    let source = std::fs::read_to_string(entry_path)
        .map_err(|e| format!("Failed to read {}: {e}", entry_path.display()))?;
    let source_dir = entry_path.parent().unwrap_or_else(|| Path::new("."));
    compile_source(&source, source_dir, config, true)
}

/// Compiles `source` (whose `using` names are resolved against
/// `source_dir`) into IR text. `is_entry` controls whether `main` is
/// synthesized (§4.6) — only ever true for the originally requested file.
fn compile_source(
    source: &str,
    source_dir: &Path,
    config: &CompilerConfig,
    is_entry: bool,
) -> Result<String, String> {
    let program = crate::parser::parse(source)?;

    let mut using_names: HashSet<String> = HashSet::new();
    for using in &program.using {
        using_names.insert(using.module.clone());
    }

    let mut sibling_sections: Vec<String> = Vec::new();
    let mut namespaces = HashMap::new();
    let mut sibling_signatures: HashMap<String, HashMap<String, (Vec<IrType>, IrType)>> = HashMap::new();
    let mut extern_only_names: HashSet<String> = HashSet::new();

    for name in &using_names {
        match classify_using(name, source_dir) {
            UsingResolution::Sibling(path) => {
                let sibling_source = std::fs::read_to_string(&path)
                    .map_err(|e| format!("Failed to read sibling module {}: {e}", path.display()))?;
                let sibling_dir = path.parent().unwrap_or(source_dir);
                let compiled = compile_module_fragment(&sibling_source, sibling_dir, config)?;
                let (rewritten, namespace) = mangle_sibling(
                    name,
                    &compiled.ir_text,
                    &compiled.defined_symbols,
                    &compiled.extern_c_modules,
                );
                sibling_sections.push(rewritten);
                namespaces.insert(name.clone(), namespace);
                sibling_signatures.insert(name.clone(), compiled.exported_functions);
            }
            UsingResolution::ExternC => {
                extern_only_names.insert(name.clone());
            }
        }
    }

    let mut extern_table = ExternFunctionTable::new();
    let mut extern_c_modules = HashSet::new();
    let mut search_paths = config.map_search_paths.clone();
    search_paths.push(source_dir.to_path_buf());
    load_map_files(&search_paths, &extern_only_names, &mut extern_table, &mut extern_c_modules)?;
    register_extra_externs(config, &mut extern_table, &mut extern_c_modules);

    let main_module = lower_program(
        &program,
        extern_table,
        extern_c_modules,
        namespaces,
        sibling_signatures,
        config,
        is_entry,
    )
    .map_err(|e| e.to_string())?;

    let mut sections = sibling_sections;
    sections.push(main_module.ir_text);
    Ok(crate::resolver::dedupe_declares(sections))
}

/// Compiles a sibling module and returns its raw (un-merged, un-mangled)
/// lowering result for the parent to mangle and fold in.
fn compile_module_fragment(
    source: &str,
    source_dir: &Path,
    config: &CompilerConfig,
) -> Result<LoweredModule, String> {
    let program = crate::parser::parse(source)?;

    let mut using_names: HashSet<String> = HashSet::new();
    for using in &program.using {
        using_names.insert(using.module.clone());
    }

    // Siblings may themselves `using` further siblings or native modules;
    // resolve exactly as the entry module does, but these nested siblings
    // are folded into THIS fragment's own IR text so the parent only ever
    // sees one already-merged fragment per direct `using` name.
    let mut nested_sections = Vec::new();
    let mut namespaces = HashMap::new();
    let mut sibling_signatures: HashMap<String, HashMap<String, (Vec<IrType>, IrType)>> = HashMap::new();
    let mut extern_only_names = HashSet::new();

    for name in &using_names {
        match classify_using(name, source_dir) {
            UsingResolution::Sibling(path) => {
                let nested_source = std::fs::read_to_string(&path)
                    .map_err(|e| format!("Failed to read sibling module {}: {e}", path.display()))?;
                let nested_dir = path.parent().unwrap_or(source_dir);
                let compiled = compile_module_fragment(&nested_source, nested_dir, config)?;
                let (rewritten, namespace) = mangle_sibling(
                    name,
                    &compiled.ir_text,
                    &compiled.defined_symbols,
                    &compiled.extern_c_modules,
                );
                nested_sections.push(rewritten);
                namespaces.insert(name.clone(), namespace);
                sibling_signatures.insert(name.clone(), compiled.exported_functions);
            }
            UsingResolution::ExternC => {
                extern_only_names.insert(name.clone());
            }
        }
    }

    let mut extern_table = ExternFunctionTable::new();
    let mut extern_c_modules = HashSet::new();
    let mut search_paths = config.map_search_paths.clone();
    search_paths.push(source_dir.to_path_buf());
    load_map_files(&search_paths, &extern_only_names, &mut extern_table, &mut extern_c_modules)?;
    register_extra_externs(config, &mut extern_table, &mut extern_c_modules);

    let mut fragment = lower_program(
        &program,
        extern_table,
        extern_c_modules,
        namespaces,
        sibling_signatures,
        config,
        false,
    )
    .map_err(|e| e.to_string())?;

    if !nested_sections.is_empty() {
        nested_sections.push(std::mem::take(&mut fragment.ir_text));
        fragment.ir_text = crate::resolver::dedupe_declares(nested_sections);
    }
    Ok(fragment)
}

/// Folds `config.extra_externs` into `table`/`extern_c_modules`, letting an
/// embedding caller register native overloads without a `.map` file on
/// disk (§4.3's module/overload model, extended per `CompilerConfig`).
fn register_extra_externs(
    config: &CompilerConfig,
    table: &mut ExternFunctionTable,
    extern_c_modules: &mut HashSet<String>,
) {
    for extra in &config.extra_externs {
        extern_c_modules.insert(extra.module.clone());
        let full_name = format!("{}.{}", extra.module, extra.function);
        table.insert(
            full_name,
            extra.arg_types.clone(),
            ExternOverload {
                native_symbol: extra.native_symbol.clone(),
                return_type: extra.return_type.clone(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn compiles_minimal_program_with_synthesized_main() {
        let dir = tempfile::tempdir().unwrap();
        let entry = dir.path().join("main.arx");
        fs::write(&entry, "int _exec() { return 0; }").unwrap();
        let ir = compile_file(&entry, &CompilerConfig::new()).unwrap();
        assert!(ir.contains("define i32 @main()"));
        assert!(ir.contains("define i32 @_exec()"));
    }

    #[test]
    fn sibling_module_is_compiled_and_mangled() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("math.arx"), "int sq(int n) { return n * n; }").unwrap();
        fs::write(
            dir.path().join("main.arx"),
            "using math\nint _exec() { return math.sq(3); }",
        )
        .unwrap();
        let ir = compile_file(&dir.path().join("main.arx"), &CompilerConfig::new()).unwrap();
        assert!(ir.contains("define i32 @math_sq(i32 %arg_n)"));
        assert!(ir.contains("call i32 @math_sq(i32"));
    }

    #[test]
    fn undefined_using_name_without_map_or_sibling_yields_no_extern_calls_error() {
        let dir = tempfile::tempdir().unwrap();
        let entry = dir.path().join("main.arx");
        fs::write(&entry, "using io\nint _exec() { io.print(1); return 0; }").unwrap();
        let err = compile_file(&entry, &CompilerConfig::new()).unwrap_err();
        assert!(err.contains("No overload"));
    }

    #[test]
    fn programmatically_registered_extern_is_callable_without_a_map_file() {
        use crate::config::ExternOverride as ConfigExternOverride;
        use crate::types::IrType;

        let dir = tempfile::tempdir().unwrap();
        let entry = dir.path().join("main.arx");
        fs::write(&entry, "using io\nint _exec() { io.print(1); return 0; }").unwrap();

        let config = CompilerConfig::new().with_extern(ConfigExternOverride {
            module: "io".to_string(),
            function: "print".to_string(),
            arg_types: vec![IrType::I32],
            native_symbol: "native_print_int".to_string(),
            return_type: IrType::Void,
        });
        let ir = compile_file(&entry, &config).unwrap();
        assert!(ir.contains("declare void @native_print_int(i32)"));
        assert!(ir.contains("call void @native_print_int(i32"));
    }
}

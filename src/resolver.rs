//! `using` resolution (§4.4): classifies each dependency as a sibling
//! Artemis module or an extern-C map-described module, and provides the
//! textual mangling/merge utilities used once a sibling has been compiled.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::codegen::ModuleNamespace;

/// How a single `using` name resolves (§4.4, §3 invariant: "sibling wins
/// when both exist").
#[derive(Debug, Clone, PartialEq)]
pub enum UsingResolution {
    Sibling(PathBuf),
    ExternC,
}

/// Classifies `name` against the directory containing the file that wrote
/// `using name`.
pub fn classify_using(name: &str, source_dir: &Path) -> UsingResolution {
    let candidate = source_dir.join(format!("{name}.arx"));
    if candidate.is_file() {
        UsingResolution::Sibling(candidate)
    } else {
        UsingResolution::ExternC
    }
}

/// Computes the mangled-name namespace for a compiled sibling module and
/// rewrites every `@<original>` occurrence of a produced symbol to
/// `@<mangled>` in its IR text (§4.4 step 1).
///
/// `produced` lists the `@`-symbols the sibling's own codegen pass defined
/// (function names and string-literal globals) — declarations of runtime
/// or other extern-C symbols are never in this list, so they pass through
/// untouched, which is exactly the "must remain un-renamed" carve-out.
pub fn mangle_sibling(
    module_name: &str,
    ir_text: &str,
    produced: &[String],
    sibling_extern_c_modules: &HashSet<String>,
) -> (String, ModuleNamespace) {
    let mut namespace = ModuleNamespace::default();
    for original in produced {
        let already_extern_prefixed = sibling_extern_c_modules
            .iter()
            .any(|cmod| original.starts_with(&format!("{cmod}_")));
        let mangled = if already_extern_prefixed {
            original.clone()
        } else {
            format!("{module_name}_{original}")
        };
        namespace.mangled.insert(original.clone(), mangled);
    }

    let mut rewritten = ir_text.to_string();
    // Rewrite longer names first so e.g. `@foo_bar` isn't partially matched
    // by a shorter produced name `@foo` that happens to be a prefix.
    let mut originals: Vec<&String> = namespace.mangled.keys().collect();
    originals.sort_by_key(|b| std::cmp::Reverse(b.len()));
    for original in originals {
        let mangled = &namespace.mangled[original];
        if mangled == original {
            continue;
        }
        let needle = format!("@{original}");
        let replacement = format!("@{mangled}");
        rewritten = replace_whole_symbol(&rewritten, &needle, &replacement);
    }
    (rewritten, namespace)
}

/// Replaces `needle` with `replacement` wherever it appears as a whole
/// symbol token (not a prefix of a longer `@name`).
fn replace_whole_symbol(text: &str, needle: &str, replacement: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let bytes = text.as_bytes();
    let needle_bytes = needle.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if text[i..].starts_with(needle) {
            let end = i + needle_bytes.len();
            let boundary_ok = bytes
                .get(end)
                .map(|c| !(c.is_ascii_alphanumeric() || *c == b'_' || *c == b'.'))
                .unwrap_or(true);
            if boundary_ok {
                result.push_str(replacement);
                i = end;
                continue;
            }
        }
        let ch = text[i..].chars().next().unwrap();
        result.push(ch);
        i += ch.len_utf8();
    }
    result
}

/// De-duplicates `declare` lines across the main module and every sibling's
/// IR, in the order they are first seen (§4.4, §8 property 7).
pub fn dedupe_declares(sections: Vec<String>) -> String {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = String::new();
    for section in sections {
        for line in section.lines() {
            if line.trim_start().starts_with("declare ") {
                if !seen.insert(line.trim().to_string()) {
                    continue;
                }
            }
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn sibling_wins_when_file_exists() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("math.arx"), "int sq(int n) { return n; }").unwrap();
        match classify_using("math", dir.path()) {
            UsingResolution::Sibling(p) => assert!(p.ends_with("math.arx")),
            _ => panic!("expected sibling"),
        }
    }

    #[test]
    fn missing_file_resolves_to_extern_c() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(classify_using("io", dir.path()), UsingResolution::ExternC);
    }

    #[test]
    fn mangling_rewrites_defined_symbols_only() {
        let ir = "define i32 @sq(i32 %n) {\n  ret i32 %n\n}\ndeclare void @native_print(i8*)\n";
        let produced = vec!["sq".to_string()];
        let (rewritten, ns) = mangle_sibling("math", ir, &produced, &HashSet::new());
        assert!(rewritten.contains("@math_sq"));
        assert!(rewritten.contains("@native_print"));
        assert_eq!(ns.mangled["sq"], "math_sq");
    }

    #[test]
    fn mangling_does_not_rename_extern_prefixed_symbols() {
        let ir = "define void @io_helper() {\n  ret void\n}\n";
        let produced = vec!["io_helper".to_string()];
        let mut extern_mods = HashSet::new();
        extern_mods.insert("io".to_string());
        let (rewritten, ns) = mangle_sibling("math", ir, &produced, &extern_mods);
        assert!(rewritten.contains("@io_helper"));
        assert_eq!(ns.mangled["io_helper"], "io_helper");
    }

    #[test]
    fn declare_lines_deduplicated_across_sections() {
        let a = "declare void @malloc(i64)\ndefine void @a() {\n  ret void\n}\n".to_string();
        let b = "declare void @malloc(i64)\ndefine void @b() {\n  ret void\n}\n".to_string();
        let merged = dedupe_declares(vec![a, b]);
        assert_eq!(merged.matches("declare void @malloc").count(), 1);
    }
}

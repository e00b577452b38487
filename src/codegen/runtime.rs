//! Runtime function declarations (§6).
//!
//! These are the symbols the downstream "core" native runtime library is
//! contractually required to provide; the compiler only ever declares and
//! calls them, never defines them (§1's explicit out-of-scope boundary).

/// Declarations every emitted module carries up front, in this fixed order.
pub const RUNTIME_DECLARATIONS: &str = "\
%List = type { i8*, i32, i32, i64, i1 }
declare i8* @malloc(i64)
declare %List* @core_list_create_from(i8*, i32, i32, i1)
declare i32 @core_list_len(%List*)
declare i8* @core_list_get(%List*, i32)
declare i1 @core_string_equal(i8*, i8*)
declare i8* @core_string_concat(i8*, i8*)
";

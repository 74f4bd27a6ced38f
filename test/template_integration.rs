//! Integration tests for the template directive: Cartesian enumeration,
//! table keys, and the runtime dispatch wrapper.

use mjit::{hash, translate_str, MjitConfig};

fn translate(src: &str) -> String {
    translate_str(src, &MjitConfig::default(), "t.cpp").unwrap()
}

fn count(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}

const TPL: &str = "MFEM_TEMPLATE void tpl(MFEM_RANGE(1-2) const int d, \
                   MFEM_RANGE(3,5) const int q, double *x)\n\
                   {\n\
                   \tx[0] = d * q;\n\
                   }\n";

// ============================================================================
// Enumeration
// ============================================================================

#[test]
fn test_cartesian_product_completeness() {
    let out = translate(TPL);
    // 2 x 2 declared points, one registration each
    assert_eq!(count(&out, "&jit_tpl<"), 4);
    for combo in ["1,3", "1,5", "2,3", "2,5"] {
        assert_eq!(count(&out, &format!("&jit_tpl<{combo}>")), 1);
    }
}

#[test]
fn test_range_span_expansion() {
    let out = translate(
        "MFEM_TEMPLATE void r(MFEM_RANGE(1-3,5) const int d, double *x) { x[0] = d; }\n",
    );
    assert_eq!(count(&out, "&jit_r<"), 4);
    for point in [1, 2, 3, 5] {
        assert_eq!(count(&out, &format!("&jit_r<{point}>")), 1);
    }
}

#[test]
fn test_table_keys_match_generation_time_hash() {
    let out = translate(TPL);
    for combo in [[1u64, 3], [1, 5], [2, 3], [2, 5]] {
        let key = hash::of_values(combo);
        assert!(
            out.contains(&format!("0x{key:x}ull")),
            "missing key for {combo:?}"
        );
    }
}

// ============================================================================
// Generated declaration and wrapper
// ============================================================================

#[test]
fn test_specialization_header_over_non_range_signature() {
    let out = translate(TPL);
    assert!(out.contains("template<const int d, const int q>\nvoid jit_tpl(double *x){"));
}

#[test]
fn test_wrapper_keeps_full_parameter_list() {
    let out = translate(TPL);
    assert!(out.contains("void tpl(const int d, const int q, double *x)"));
    assert!(out.contains("typedef void (*jit_tpl_t)(double *x);"));
}

#[test]
fn test_wrapper_hashes_range_arguments_in_order() {
    let out = translate(TPL);
    assert!(out.contains("jit_hash_args(JIT_HASH_SEED, d, q)"));
}

#[test]
fn test_wrapper_asserts_on_undeclared_combination() {
    let out = translate(TPL);
    assert!(out.contains("static const std::unordered_map<uint64_t, jit_tpl_t> table"));
    assert!(out.contains("assert(entry != table.end());"));
    assert!(out.contains("entry->second(x);"));
}

#[test]
fn test_static_storage_carried_to_wrapper_and_specialization() {
    let out = translate(
        "MFEM_TEMPLATE static void stpl(MFEM_RANGE(2,4) const int d, double *x) { x[0] = d; }\n",
    );
    assert!(out.contains("static void jit_stpl(double *x)"));
    assert!(out.contains("static void stpl(const int d, double *x)"));
    // storage class never leaks into the function-pointer type
    assert!(out.contains("typedef void (*jit_stpl_t)(double *x);"));
}

#[test]
fn test_body_copied_through_unchanged() {
    let out = translate(TPL);
    assert!(out.contains("\tx[0] = d * q;"));
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_template_without_range_argument_rejected() {
    let err = translate_str(
        "MFEM_TEMPLATE void nr(const int d, double *x) { x[0] = d; }\n",
        &MjitConfig::default(),
        "t.cpp",
    )
    .unwrap_err();
    assert!(err.to_string().contains("range-qualified"));
}

#[test]
fn test_template_descending_span_rejected() {
    let err = translate_str(
        "MFEM_TEMPLATE void bad(MFEM_RANGE(3-1) const int d, double *x) { }\n",
        &MjitConfig::default(),
        "t.cpp",
    )
    .unwrap_err();
    assert!(err.to_string().contains("descending"));
}

#[test]
fn test_template_unterminated_body_rejected() {
    let err = translate_str(
        "MFEM_TEMPLATE void u(MFEM_RANGE(1-2) const int d, double *x) { if (d) {",
        &MjitConfig::default(),
        "t.cpp",
    )
    .unwrap_err();
    assert!(err.to_string().contains("MFEM_TEMPLATE"));
}

#[test]
fn test_template_non_void_rejected() {
    let err = translate_str(
        "MFEM_TEMPLATE int bad(MFEM_RANGE(1-2) const int d) { return d; }\n",
        &MjitConfig::default(),
        "t.cpp",
    )
    .unwrap_err();
    assert!(err.to_string().contains("void or static"));
}

//! Exchange-suffix transforms for A-share stock codes.
//!
//! Market data carries suffixed codes (`600600.SH`); brokers take bare codes
//! (`600600`). Callers convert explicitly at the boundary.

/// `600600` -> `600600.SH`, `000001` -> `000001.SZ`. Suffixed codes pass through.
pub fn compile_stock_code(code: &str) -> String {
    if code.ends_with(".SH") || code.ends_with(".SZ") {
        return code.to_string();
    }
    if code.starts_with('6') {
        format!("{}.SH", code)
    } else {
        format!("{}.SZ", code)
    }
}

/// Suffixes bare six-digit codes; anything else is returned unchanged.
pub fn normalize_stock_code(code: &str) -> String {
    let code = code.trim();
    if code.len() == 6 && code.bytes().all(|b| b.is_ascii_digit()) {
        compile_stock_code(code)
    } else {
        code.to_string()
    }
}

/// `600600.SH` -> `600600`.
pub fn uncompile_stock_code(code: &str) -> &str {
    match code.find('.') {
        Some(idx) => &code[..idx],
        None => code,
    }
}

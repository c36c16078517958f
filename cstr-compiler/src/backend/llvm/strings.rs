//! String literal handling and the runtime helpers string values rely on.

pub const STRING_EQUAL: &str = "__string_equal__";
pub const STRING_NOT_EQUAL: &str = "__string_not_equal__";
pub const STRING_COPY: &str = "__string_copy__";
pub const STRING_CONCAT: &str = "__string_concat__";
pub const STRING_FREE: &str = "__string_free__";

/// Prototypes of the runtime helpers, in emission order.
pub(super) fn runtime_declarations() -> [String; 5] {
    [
        format!("declare i1 @{STRING_EQUAL}(i8*, i8*)"),
        format!("declare i1 @{STRING_NOT_EQUAL}(i8*, i8*)"),
        format!("declare i8* @{STRING_COPY}(i8*)"),
        format!("declare i8* @{STRING_CONCAT}(i8*, i8*)"),
        format!("declare void @{STRING_FREE}(i8*)"),
    ]
}

/// Resolve the escape sequences of a raw literal into the bytes it denotes.
/// Unknown escapes are kept verbatim, backslash included.
pub(super) fn decode_literal(raw: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0u8; 4];
            bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        let decoded = match chars.next() {
            Some('n') => b'\n',
            Some('t') => b'\t',
            Some('r') => b'\r',
            Some('v') => 0x0b,
            Some('0') => 0,
            Some('\\') => b'\\',
            Some('"') => b'"',
            Some('\'') => b'\'',
            Some(other) => {
                bytes.push(b'\\');
                let mut buf = [0u8; 4];
                bytes.extend_from_slice(other.encode_utf8(&mut buf).as_bytes());
                continue;
            }
            None => b'\\',
        };
        bytes.push(decoded);
    }
    bytes
}

/// Body of an IR `c"..."` array literal (without the trailing `\00`).
pub(super) fn encode_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        match b {
            0x20..=0x7e if b != b'"' && b != b'\\' => out.push(b as char),
            _ => out.push_str(&format!("\\{b:02X}")),
        }
    }
    out
}

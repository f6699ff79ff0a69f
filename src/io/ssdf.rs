//! Simple Structured Data Format.
//!
//! A self-describing tree of typed nodes used for bundled resources
//! (meshes, volumes, colormaps). Two round-trip compatible forms: a
//! human-readable text form and a zlib-compressed binary form.
//!
//! Text form, one `name = value` pair per line; nesting by two-space
//! indentation under a `name = struct:` line. Arrays carry their shape:
//! `array 2x3 float64: 1 2 3 4 5 6`.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::{Error, Result};

/// An SSDF value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Str(String),
    /// n-D numeric array: shape plus flat row-major data.
    Array { shape: Vec<usize>, data: Vec<f64> },
    List(Vec<Value>),
    /// Ordered name/value pairs.
    Struct(Vec<(String, Value)>),
}

impl Value {
    pub fn struct_get<'a>(&'a self, name: &str) -> Option<&'a Value> {
        match self {
            Value::Struct(fields) => fields
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v),
            _ => None,
        }
    }
}

// ----- text form ----------------------------------------------------------

fn write_value(out: &mut String, name: &str, value: &Value, indent: usize) {
    let pad = "  ".repeat(indent);
    match value {
        Value::Null => out.push_str(&format!("{pad}{name} = null\n")),
        Value::Int(i) => out.push_str(&format!("{pad}{name} = int {i}\n")),
        Value::Float(f) => {
            // Full round-trip precision.
            out.push_str(&format!("{pad}{name} = float {f:?}\n"));
        }
        Value::Str(s) => {
            out.push_str(&format!("{pad}{name} = str {}\n", escape(s)));
        }
        Value::Array { shape, data } => {
            let dims: Vec<String> = shape.iter().map(|d| d.to_string()).collect();
            let nums: Vec<String> = data.iter().map(|v| format!("{v:?}")).collect();
            out.push_str(&format!(
                "{pad}{name} = array {}: {}\n",
                dims.join("x"),
                nums.join(" ")
            ));
        }
        Value::List(items) => {
            out.push_str(&format!("{pad}{name} = list:\n"));
            for (i, item) in items.iter().enumerate() {
                write_value(out, &i.to_string(), item, indent + 1);
            }
        }
        Value::Struct(fields) => {
            out.push_str(&format!("{pad}{name} = struct:\n"));
            for (n, v) in fields {
                write_value(out, n, v, indent + 1);
            }
        }
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\n', "\\n")
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('\\') => out.push('\\'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Serialize to the text form. The root must be a struct.
pub fn to_text(root: &Value) -> Result<String> {
    let Value::Struct(fields) = root else {
        return Err(Error::validation("ssdf root must be a struct"));
    };
    let mut out = String::new();
    for (name, value) in fields {
        write_value(&mut out, name, value, 0);
    }
    Ok(out)
}

struct Line<'a> {
    indent: usize,
    name: &'a str,
    rhs: &'a str,
}

fn parse_lines(text: &str) -> Result<Vec<Line<'_>>> {
    let mut lines = Vec::new();
    for (lineno, raw) in text.lines().enumerate() {
        if raw.trim().is_empty() || raw.trim_start().starts_with('#') {
            continue;
        }
        let stripped = raw.trim_start_matches(' ');
        let spaces = raw.len() - stripped.len();
        if spaces % 2 != 0 {
            return Err(Error::format(format!(
                "line {}: odd indentation",
                lineno + 1
            )));
        }
        let Some((name, rhs)) = stripped.split_once('=') else {
            return Err(Error::format(format!("line {}: missing '='", lineno + 1)));
        };
        lines.push(Line {
            indent: spaces / 2,
            name: name.trim(),
            rhs: rhs.trim(),
        });
    }
    Ok(lines)
}

fn parse_scalar(rhs: &str) -> Result<Value> {
    if rhs == "null" {
        return Ok(Value::Null);
    }
    if let Some(v) = rhs.strip_prefix("int ") {
        return v
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|e| Error::format(format!("bad int: {e}")));
    }
    if let Some(v) = rhs.strip_prefix("float ") {
        return v
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|e| Error::format(format!("bad float: {e}")));
    }
    if let Some(v) = rhs.strip_prefix("str ") {
        return Ok(Value::Str(unescape(v)));
    }
    if rhs == "str" {
        return Ok(Value::Str(String::new()));
    }
    if let Some(v) = rhs.strip_prefix("array ") {
        let Some((dims, nums)) = v.split_once(':') else {
            return Err(Error::format("array without ':'"));
        };
        let shape: Vec<usize> = dims
            .trim()
            .split('x')
            .map(|d| d.trim().parse::<usize>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::format(format!("bad array shape: {e}")))?;
        let data: Vec<f64> = nums
            .split_whitespace()
            .map(|n| n.parse::<f64>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::format(format!("bad array value: {e}")))?;
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(Error::format(format!(
                "array shape {shape:?} needs {expected} values, got {}",
                data.len()
            )));
        }
        return Ok(Value::Array { shape, data });
    }
    Err(Error::format(format!("unknown value syntax {rhs:?}")))
}

fn parse_block(lines: &[Line], pos: &mut usize, indent: usize) -> Result<Vec<(String, Value)>> {
    let mut fields = Vec::new();
    while *pos < lines.len() {
        let line = &lines[*pos];
        if line.indent < indent {
            break;
        }
        if line.indent > indent {
            return Err(Error::format(format!(
                "unexpected indentation at {:?}",
                line.name
            )));
        }
        *pos += 1;
        let value = match line.rhs {
            "struct:" => Value::Struct(parse_block(lines, pos, indent + 1)?),
            "list:" => {
                let items = parse_block(lines, pos, indent + 1)?;
                Value::List(items.into_iter().map(|(_, v)| v).collect())
            }
            rhs => parse_scalar(rhs)?,
        };
        fields.push((line.name.to_string(), value));
    }
    Ok(fields)
}

/// Parse the text form back into a value tree.
pub fn from_text(text: &str) -> Result<Value> {
    let lines = parse_lines(text)?;
    let mut pos = 0;
    let fields = parse_block(&lines, &mut pos, 0)?;
    if pos != lines.len() {
        return Err(Error::format("trailing content after root block"));
    }
    Ok(Value::Struct(fields))
}

// ----- binary form --------------------------------------------------------

const MAGIC: &[u8; 4] = b"SSDF";
const VERSION: u8 = 1;

fn write_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn write_str(out: &mut Vec<u8>, s: &str) {
    write_u32(out, s.len() as u32);
    out.extend_from_slice(s.as_bytes());
}

fn encode_value(out: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Null => out.push(0),
        Value::Int(i) => {
            out.push(1);
            out.extend_from_slice(&i.to_le_bytes());
        }
        Value::Float(f) => {
            out.push(2);
            out.extend_from_slice(&f.to_le_bytes());
        }
        Value::Str(s) => {
            out.push(3);
            write_str(out, s);
        }
        Value::Array { shape, data } => {
            out.push(4);
            write_u32(out, shape.len() as u32);
            for d in shape {
                write_u32(out, *d as u32);
            }
            for v in data {
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
        Value::List(items) => {
            out.push(5);
            write_u32(out, items.len() as u32);
            for item in items {
                encode_value(out, item);
            }
        }
        Value::Struct(fields) => {
            out.push(6);
            write_u32(out, fields.len() as u32);
            for (name, v) in fields {
                write_str(out, name);
                encode_value(out, v);
            }
        }
    }
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.data.len() {
            return Err(Error::format("truncated ssdf binary data"));
        }
        let s = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn f64(&mut self) -> Result<f64> {
        Ok(f64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn string(&mut self) -> Result<String> {
        let len = self.u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| Error::format(format!("bad utf-8: {e}")))
    }
}

fn decode_value(cur: &mut Cursor) -> Result<Value> {
    match cur.u8()? {
        0 => Ok(Value::Null),
        1 => Ok(Value::Int(cur.i64()?)),
        2 => Ok(Value::Float(cur.f64()?)),
        3 => Ok(Value::Str(cur.string()?)),
        4 => {
            let ndim = cur.u32()? as usize;
            let mut shape = Vec::with_capacity(ndim);
            for _ in 0..ndim {
                shape.push(cur.u32()? as usize);
            }
            let count: usize = shape.iter().product();
            let mut data = Vec::with_capacity(count);
            for _ in 0..count {
                data.push(cur.f64()?);
            }
            Ok(Value::Array { shape, data })
        }
        5 => {
            let count = cur.u32()? as usize;
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                items.push(decode_value(cur)?);
            }
            Ok(Value::List(items))
        }
        6 => {
            let count = cur.u32()? as usize;
            let mut fields = Vec::with_capacity(count);
            for _ in 0..count {
                let name = cur.string()?;
                fields.push((name, decode_value(cur)?));
            }
            Ok(Value::Struct(fields))
        }
        tag => Err(Error::format(format!("unknown ssdf tag {tag}"))),
    }
}

/// Serialize to the compressed binary form.
pub fn to_bytes(root: &Value) -> Result<Vec<u8>> {
    if !matches!(root, Value::Struct(_)) {
        return Err(Error::validation("ssdf root must be a struct"));
    }
    let mut payload = Vec::new();
    encode_value(&mut payload, root);

    let mut out = Vec::with_capacity(payload.len() / 2 + 16);
    out.extend_from_slice(MAGIC);
    out.push(VERSION);
    let mut encoder = ZlibEncoder::new(&mut out, Compression::default());
    encoder.write_all(&payload)?;
    encoder.finish()?;
    Ok(out)
}

/// Parse the compressed binary form.
pub fn from_bytes(bytes: &[u8]) -> Result<Value> {
    if bytes.len() < 5 || &bytes[0..4] != MAGIC {
        return Err(Error::format("not an ssdf binary blob"));
    }
    if bytes[4] != VERSION {
        return Err(Error::format(format!(
            "unsupported ssdf version {}",
            bytes[4]
        )));
    }
    let mut payload = Vec::new();
    ZlibDecoder::new(&bytes[5..]).read_to_end(&mut payload)?;
    let mut cur = Cursor {
        data: &payload,
        pos: 0,
    };
    let value = decode_value(&mut cur)?;
    if cur.pos != payload.len() {
        return Err(Error::format("trailing bytes in ssdf payload"));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Value {
        Value::Struct(vec![
            ("name".into(), Value::Str("tetra".into())),
            ("count".into(), Value::Int(4)),
            ("scale".into(), Value::Float(0.25)),
            ("nothing".into(), Value::Null),
            (
                "vertices".into(),
                Value::Array {
                    shape: vec![2, 3],
                    data: vec![0.0, 1.5, -2.25, 3.125, 4.0, 5.0],
                },
            ),
            (
                "tags".into(),
                Value::List(vec![Value::Str("a".into()), Value::Int(7)]),
            ),
            (
                "nested".into(),
                Value::Struct(vec![("x".into(), Value::Float(1e-9))]),
            ),
        ])
    }

    #[test]
    fn text_roundtrip() {
        let v = sample();
        let text = to_text(&v).unwrap();
        let back = from_text(&text).unwrap();
        assert_eq!(v, back);
    }

    #[test]
    fn binary_roundtrip() {
        let v = sample();
        let bytes = to_bytes(&v).unwrap();
        let back = from_bytes(&bytes).unwrap();
        assert_eq!(v, back);
    }

    #[test]
    fn text_and_binary_agree() {
        let v = sample();
        let via_text = from_text(&to_text(&v).unwrap()).unwrap();
        let via_bin = from_bytes(&to_bytes(&v).unwrap()).unwrap();
        assert_eq!(via_text, via_bin);
    }

    #[test]
    fn strings_with_newlines_survive() {
        let v = Value::Struct(vec![(
            "s".into(),
            Value::Str("two\nlines \\ with backslash".into()),
        )]);
        assert_eq!(from_text(&to_text(&v).unwrap()).unwrap(), v);
    }

    #[test]
    fn malformed_inputs_are_format_errors() {
        assert!(from_text("x 5").is_err());
        assert!(from_text("x = array 2x2: 1 2 3").is_err());
        assert!(from_bytes(b"nope").is_err());
        assert!(matches!(
            from_text("x = wat 5"),
            Err(crate::error::Error::Format(_))
        ));
    }
}

//! 文本渲染与扩展 JSON
//!
//! 诊断用的文本形式和 `serde_json` 互转共用同一套扩展约定:
//! - ObjectId: `{"$oid":"507f1f77bcf86cd799439011"}`
//! - DateTime: `{"$date":1234567890000}`
//! - Regex: `{"$regex":"pattern", "$options":"i"}`
//! - Timestamp: `{"$timestamp":{"t":1, "i":2}}`
//! - Binary: `{"$binary":{"base64":"...", "subType":"00"}}`
//! - MinKey / MaxKey: `{"$minKey":1}` / `{"$maxKey":1}`
//! - 非有限浮点数: `{"$numberDouble":"NaN"}`
//!
//! 渲染结果只用于查看, 不保证可以解析回原值。

use crate::dispatch::{narrow_i64, narrow_u64};
use crate::doc::Doc;
use crate::spec::BinarySubtype;
use crate::value::{Binary, DateTime, Regex, Timestamp, Value};
use crate::{BsonError, BsonResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sdb_common::ObjectId;
use serde_json::{json, Map as JsonMap, Number, Value as JsonValue};
use std::fmt;

/// 需要扩展形式表示的值转换为对应的单键(或双键)文档
///
/// 普通 JSON 可以直接表示的值返回 None。
pub(crate) fn extended_doc(value: &Value) -> Option<Doc> {
    let mut doc = Doc::with_capacity(2);
    match value {
        Value::Double(v) if v.is_nan() => doc.push("$numberDouble", "NaN"),
        Value::Double(v) if v.is_infinite() => doc.push(
            "$numberDouble",
            if *v > 0.0 { "Infinity" } else { "-Infinity" },
        ),
        Value::ObjectId(id) => doc.push("$oid", id.to_hex()),
        Value::DateTime(dt) => doc.push("$date", Value::Int64(dt.timestamp_millis())),
        Value::Regex(re) => {
            doc.push("$regex", re.pattern.as_str());
            doc.push("$options", re.options.as_str());
        }
        Value::Timestamp(ts) => {
            let mut inner = Doc::with_capacity(2);
            inner.push("t", Value::Int64(ts.second as i64));
            inner.push("i", Value::Int64(ts.increment as i64));
            doc.push("$timestamp", inner);
        }
        Value::Binary(bin) => {
            let mut inner = Doc::with_capacity(2);
            inner.push("base64", STANDARD.encode(&bin.bytes));
            inner.push("subType", format!("{:02x}", u8::from(bin.subtype)));
            doc.push("$binary", inner);
        }
        Value::MinKey => doc.push("$minKey", 1),
        Value::MaxKey => doc.push("$maxKey", 1),
        _ => return None,
    }
    Some(doc)
}

/// 识别扩展形式的文档, 还原为对应的值
///
/// # Brief
/// 键名和取值都符合约定时才转换, 否则返回 None, 调用方按普通文档处理
///
/// # Arguments
/// * `doc` - 候选文档
///
/// # Returns
/// 识别成功返回对应的值
pub(crate) fn parse_extended(doc: &Doc) -> Option<Value> {
    let first = doc.first()?;
    if !first.name.starts_with('$') {
        return None;
    }
    if doc.len() == 2 {
        return parse_regex(doc);
    }
    if doc.len() != 1 {
        return None;
    }
    let value = &first.value;
    match first.name.as_str() {
        "$oid" => ObjectId::from_hex(value.as_str()?).ok().map(Value::ObjectId),
        "$date" => parse_date(value).map(|ms| Value::DateTime(DateTime::from_millis(ms))),
        "$numberLong" => value.as_str()?.parse::<i64>().ok().map(Value::Int64),
        "$numberDouble" => parse_double(value.as_str()?).map(Value::Double),
        "$timestamp" => {
            let inner = value.as_document()?;
            let t = inner.get("t")?.as_i64()?;
            let i = inner.get("i")?.as_i64()?;
            Some(Value::Timestamp(Timestamp::new(t as u32, i as u32)))
        }
        "$regex" => Some(Value::Regex(Regex::new(value.as_str()?, ""))),
        "$binary" => parse_binary(value).map(Value::Binary),
        "$minKey" => Some(Value::MinKey),
        "$maxKey" => Some(Value::MaxKey),
        _ => None,
    }
}

fn parse_regex(doc: &Doc) -> Option<Value> {
    let pattern = doc.get("$regex")?.as_str()?;
    let options = doc.get("$options")?.as_str()?;
    Some(Value::Regex(Regex::new(pattern, options)))
}

/// 毫秒数、RFC 3339 字符串或 `{"$numberLong": "..."}`
fn parse_date(value: &Value) -> Option<i64> {
    match value {
        Value::Int32(ms) => Some(*ms as i64),
        Value::Int64(ms) => Some(*ms),
        Value::Double(ms) => Some(*ms as i64),
        Value::String(s) => chrono::DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.timestamp_millis()),
        Value::Document(inner) => inner.get("$numberLong")?.as_str()?.parse().ok(),
        _ => None,
    }
}

fn parse_double(s: &str) -> Option<f64> {
    match s {
        "Infinity" => Some(f64::INFINITY),
        "-Infinity" => Some(f64::NEG_INFINITY),
        "NaN" => Some(f64::NAN),
        other => other.parse().ok(),
    }
}

/// 新格式 `{"base64": .., "subType": "hh"}`, 也接受只有 base64 字符串的旧格式
fn parse_binary(value: &Value) -> Option<Binary> {
    match value {
        Value::String(encoded) => STANDARD.decode(encoded).ok().map(Binary::generic),
        Value::Document(inner) => {
            let bytes = STANDARD.decode(inner.get("base64")?.as_str()?).ok()?;
            let subtype = u8::from_str_radix(inner.get("subType")?.as_str()?, 16).ok()?;
            Some(Binary::new(BinarySubtype::from(subtype), bytes))
        }
        _ => None,
    }
}

fn write_escaped<W: fmt::Write + ?Sized>(out: &mut W, s: &str) -> fmt::Result {
    let escaped = serde_json::to_string(s).map_err(|_| fmt::Error)?;
    out.write_str(&escaped)
}

pub(crate) fn write_value<W: fmt::Write + ?Sized>(out: &mut W, value: &Value) -> fmt::Result {
    if let Some(doc) = extended_doc(value) {
        return write_elements(out, doc.iter().map(|e| (e.name.as_str(), &e.value)));
    }
    match value {
        Value::Double(v) => write!(out, "{}", v),
        Value::String(s) => write_escaped(out, s),
        Value::Document(doc) => write_elements(out, doc.iter().map(|e| (e.name.as_str(), &e.value))),
        Value::Array(items) => write_items(out, items),
        Value::Bool(v) => write!(out, "{}", v),
        Value::Null => out.write_str("null"),
        Value::Int32(v) => write!(out, "{}", v),
        Value::Int64(v) => write!(out, "{}", v),
        // 其余类型都有扩展形式
        _ => Err(fmt::Error),
    }
}

/// `{"name":value, ...}`
pub(crate) fn write_elements<'v, W, I>(out: &mut W, elements: I) -> fmt::Result
where
    W: fmt::Write + ?Sized,
    I: Iterator<Item = (&'v str, &'v Value)>,
{
    out.write_char('{')?;
    for (i, (name, value)) in elements.enumerate() {
        if i > 0 {
            out.write_str(", ")?;
        }
        write_escaped(out, name)?;
        out.write_char(':')?;
        write_value(out, value)?;
    }
    out.write_char('}')
}

/// `[value, ...]`
pub(crate) fn write_items<W: fmt::Write + ?Sized>(out: &mut W, items: &[Value]) -> fmt::Result {
    out.write_char('[')?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.write_str(", ")?;
        }
        write_value(out, item)?;
    }
    out.write_char(']')
}

/// 将 Value 转换为 JSON
///
/// # Brief
/// JSON 无法直接表示的类型使用扩展 JSON 形式; 重名字段只保留最后一个
///
/// # Arguments
/// * `value` - 要转换的值
///
/// # Returns
/// 对应的 JSON 值
pub fn to_json(value: &Value) -> JsonValue {
    if let Some(doc) = extended_doc(value) {
        return doc_to_json(&doc);
    }
    match value {
        Value::Double(v) => Number::from_f64(*v).map_or(JsonValue::Null, JsonValue::Number),
        Value::String(s) => JsonValue::String(s.clone()),
        Value::Document(doc) => doc_to_json(doc),
        Value::Array(items) => JsonValue::Array(items.iter().map(to_json).collect()),
        Value::Bool(b) => JsonValue::Bool(*b),
        Value::Int32(n) => json!(*n),
        Value::Int64(n) => json!(*n),
        _ => JsonValue::Null,
    }
}

fn doc_to_json(doc: &Doc) -> JsonValue {
    let mut object = JsonMap::with_capacity(doc.len());
    for element in doc.iter() {
        object.insert(element.name.clone(), to_json(&element.value));
    }
    JsonValue::Object(object)
}

/// 从 JSON 转换为 Value
///
/// # Brief
/// 整数按范围收窄为 Int32 或 Int64, 对象识别扩展 JSON 形式
///
/// # Arguments
/// * `value` - JSON 值
///
/// # Returns
/// 超出 int64 的正整数返回 UnsignedOverflow
pub fn from_json(value: &JsonValue) -> BsonResult<Value> {
    match value {
        JsonValue::Null => Ok(Value::Null),
        JsonValue::Bool(b) => Ok(Value::Bool(*b)),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(narrow_i64(i))
            } else if let Some(u) = n.as_u64() {
                narrow_u64(u)
            } else if let Some(f) = n.as_f64() {
                Ok(Value::Double(f))
            } else {
                Err(BsonError::Deserialization(format!("invalid number {}", n)))
            }
        }
        JsonValue::String(s) => Ok(Value::String(s.clone())),
        JsonValue::Array(items) => items.iter().map(from_json).collect::<BsonResult<Vec<_>>>().map(Value::Array),
        JsonValue::Object(object) => {
            let mut doc = Doc::with_capacity(object.len());
            for (name, value) in object {
                doc.push(name.as_str(), from_json(value)?);
            }
            Ok(parse_extended(&doc).unwrap_or(Value::Document(doc)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    #[test]
    fn test_render_scalars() {
        assert_eq!(Value::Double(5.05).to_string(), "5.05");
        assert_eq!(Value::Double(1.0).to_string(), "1");
        assert_eq!(Value::Int64(5_000_000_000).to_string(), "5000000000");
        assert_eq!(Value::String("a\"b\n".into()).to_string(), r#""a\"b\n""#);
        assert_eq!(Value::Null.to_string(), "null");
        assert_eq!(Value::Bool(false).to_string(), "false");
        assert_eq!(Value::Double(f64::NEG_INFINITY).to_string(), r#"{"$numberDouble":"-Infinity"}"#);
    }

    #[test]
    fn test_render_extended() {
        let id = ObjectId::from_hex("507f1f77bcf86cd799439011").unwrap();
        assert_eq!(Value::ObjectId(id).to_string(), r#"{"$oid":"507f1f77bcf86cd799439011"}"#);
        assert_eq!(
            Value::DateTime(DateTime::from_millis(1500)).to_string(),
            r#"{"$date":1500}"#
        );
        assert_eq!(
            Value::Regex(Regex::new("^a.*", "im")).to_string(),
            r#"{"$regex":"^a.*", "$options":"im"}"#
        );
        assert_eq!(
            Value::Timestamp(Timestamp::new(7, 3)).to_string(),
            r#"{"$timestamp":{"t":7, "i":3}}"#
        );
        assert_eq!(
            Value::Binary(Binary::new(BinarySubtype::Md5, vec![1, 2, 3])).to_string(),
            r#"{"$binary":{"base64":"AQID", "subType":"05"}}"#
        );
        assert_eq!(Value::MinKey.to_string(), r#"{"$minKey":1}"#);
        assert_eq!(Value::MaxKey.to_string(), r#"{"$maxKey":1}"#);
    }

    #[test]
    fn test_render_nested() {
        let d = doc! {
            "outer": "hello",
            "obj": doc! { "inner": "world" },
            "array": vec![Value::from("hello world"), Value::from(123.456)],
        };
        assert_eq!(
            d.to_string(),
            r#"{"outer":"hello", "obj":{"inner":"world"}, "array":["hello world", 123.456]}"#
        );
    }

    #[test]
    fn test_parse_extended_forms() {
        assert_eq!(parse_extended(&doc! { "$minKey": 1 }), Some(Value::MinKey));
        assert_eq!(
            parse_extended(&doc! { "$options": "i", "$regex": "x" }),
            Some(Value::Regex(Regex::new("x", "i")))
        );
        assert_eq!(
            parse_extended(&doc! { "$date": "1970-01-01T00:00:01Z" }),
            Some(Value::DateTime(DateTime::from_millis(1000)))
        );
        assert_eq!(
            parse_extended(&doc! { "$date": doc! { "$numberLong": "42" } }),
            Some(Value::DateTime(DateTime::from_millis(42)))
        );
        assert_eq!(parse_extended(&doc! { "$numberLong": "9" }), Some(Value::Int64(9)));
        assert_eq!(parse_extended(&doc! { "$oid": "zz" }), None);
        assert_eq!(parse_extended(&doc! { "name": 1 }), None);
        assert_eq!(parse_extended(&doc! { "$oid": "x", "$date": 1, "$regex": "" }), None);
    }

    #[test]
    fn test_json_round_trip() {
        let original = Value::Document(doc! {
            "id": ObjectId::from_bytes([1; 12]),
            "at": DateTime::from_millis(-5),
            "ts": Timestamp::new(u32::MAX, 1),
            "re": Regex::new("a", ""),
            "bin": Binary::new(BinarySubtype::UserDefined(0x80), vec![0xFF]),
            "big": Value::Int64(1 << 40),
            "small": 7,
            "pi": 3.25,
            "list": vec![Value::MinKey, Value::MaxKey, Value::Null],
        });
        let json = to_json(&original);
        assert_eq!(json["small"], json!(7));
        assert_eq!(json["id"], json!({"$oid": "010101010101010101010101"}));
        assert_eq!(from_json(&json).unwrap(), original);
    }

    #[test]
    fn test_from_json_numbers() {
        assert_eq!(from_json(&json!(5)).unwrap(), Value::Int32(5));
        assert_eq!(from_json(&json!(-5_000_000_000i64)).unwrap(), Value::Int64(-5_000_000_000));
        assert_eq!(
            from_json(&json!(u64::MAX)).unwrap_err(),
            BsonError::UnsignedOverflow(u64::MAX)
        );
        assert_eq!(from_json(&json!(0.5)).unwrap(), Value::Double(0.5));
    }
}

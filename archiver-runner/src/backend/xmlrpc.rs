//! Minimal XML-RPC codec
//!
//! Just enough of XML-RPC to talk to rTorrent: encoding method calls and
//! decoding responses (including faults) into [`Value`] trees. Parsing is done
//! over `xmlparser` tokens.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::collections::BTreeMap;
use std::fmt::Write;
use thiserror::Error;
use xmlparser::{ElementEnd, Token, Tokenizer};

/// An XML-RPC value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int(i64),
    Bool(bool),
    Double(f64),
    Base64(Vec<u8>),
    Array(Vec<Value>),
    Struct(BTreeMap<String, Value>),
    Nil,
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integer value; rTorrent sometimes sends numbers as strings
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(i64::from(*b)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(values) => Some(values),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

/// Errors decoding an XML-RPC response
#[derive(Debug, Error, PartialEq)]
pub enum XmlRpcError {
    #[error("malformed XML: {0}")]
    Xml(String),

    #[error("malformed XML-RPC response: {0}")]
    Malformed(String),

    #[error("fault {code}: {message}")]
    Fault { code: i64, message: String },
}

/// Encodes a method call
pub fn encode_call(method: &str, params: &[Value]) -> String {
    let mut xml = String::from(r#"<?xml version="1.0"?><methodCall><methodName>"#);
    xml.push_str(&escape(method));
    xml.push_str("</methodName><params>");
    for param in params {
        xml.push_str("<param>");
        encode_value(&mut xml, param);
        xml.push_str("</param>");
    }
    xml.push_str("</params></methodCall>");
    xml
}

fn encode_value(xml: &mut String, value: &Value) {
    xml.push_str("<value>");
    match value {
        Value::String(s) => {
            let _ = write!(xml, "<string>{}</string>", escape(s));
        }
        Value::Int(i) => {
            let _ = write!(xml, "<i8>{i}</i8>");
        }
        Value::Bool(b) => {
            let _ = write!(xml, "<boolean>{}</boolean>", u8::from(*b));
        }
        Value::Double(d) => {
            let _ = write!(xml, "<double>{d}</double>");
        }
        Value::Base64(bytes) => {
            let _ = write!(xml, "<base64>{}</base64>", BASE64.encode(bytes));
        }
        Value::Array(values) => {
            xml.push_str("<array><data>");
            for v in values {
                encode_value(xml, v);
            }
            xml.push_str("</data></array>");
        }
        Value::Struct(members) => {
            xml.push_str("<struct>");
            for (name, v) in members {
                let _ = write!(xml, "<member><name>{}</name>", escape(name));
                encode_value(xml, v);
                xml.push_str("</member>");
            }
            xml.push_str("</struct>");
        }
        Value::Nil => xml.push_str("<nil/>"),
    }
    xml.push_str("</value>");
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let after = &rest[start..];
        let Some(end) = after.find(';') else {
            out.push_str(after);
            return out;
        };
        let entity = &after[1..end];
        let decoded = match entity {
            "lt" => Some('<'),
            "gt" => Some('>'),
            "amp" => Some('&'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix("#x")
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                .and_then(char::from_u32),
        };
        match decoded {
            Some(c) => out.push(c),
            None => out.push_str(&after[..=end]),
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}

/// Element tree built from the token stream
#[derive(Debug, Default)]
struct Element {
    name: String,
    text: String,
    children: Vec<Element>,
}

impl Element {
    fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    fn required(&self, name: &str) -> Result<&Element, XmlRpcError> {
        self.child(name).ok_or_else(|| {
            XmlRpcError::Malformed(format!("<{}> has no <{}>", self.name, name))
        })
    }
}

fn parse_tree(xml: &str) -> Result<Element, XmlRpcError> {
    let mut stack = vec![Element::default()];

    for token in Tokenizer::from(xml) {
        match token.map_err(|e| XmlRpcError::Xml(e.to_string()))? {
            Token::ElementStart { local, .. } => stack.push(Element {
                name: local.as_str().to_string(),
                ..Default::default()
            }),
            Token::ElementEnd { end, .. } => {
                if matches!(end, ElementEnd::Open) {
                    continue;
                }
                let element = stack
                    .pop()
                    .ok_or_else(|| XmlRpcError::Xml("unbalanced element".to_string()))?;
                stack
                    .last_mut()
                    .ok_or_else(|| XmlRpcError::Xml("unbalanced element".to_string()))?
                    .children
                    .push(element);
            }
            Token::Text { text } => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&unescape(text.as_str()));
                }
            }
            Token::Cdata { text, .. } => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(text.as_str());
                }
            }
            _ => {}
        }
    }

    if stack.len() != 1 {
        return Err(XmlRpcError::Xml("unclosed element".to_string()));
    }
    stack
        .pop()
        .and_then(|root| root.children.into_iter().next())
        .ok_or_else(|| XmlRpcError::Xml("empty document".to_string()))
}

/// Decodes a `methodResponse`, turning faults into errors
pub fn parse_response(xml: &str) -> Result<Value, XmlRpcError> {
    let root = parse_tree(xml)?;
    if root.name != "methodResponse" {
        return Err(XmlRpcError::Malformed(format!(
            "expected <methodResponse>, got <{}>",
            root.name
        )));
    }

    if let Some(fault) = root.child("fault") {
        let value = decode_value(fault.required("value")?)?;
        let (code, message) = match &value {
            Value::Struct(members) => (
                members.get("faultCode").and_then(Value::as_i64).unwrap_or(0),
                members
                    .get("faultString")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown fault")
                    .to_string(),
            ),
            _ => (0, "unknown fault".to_string()),
        };
        return Err(XmlRpcError::Fault { code, message });
    }

    let value = root.required("params")?.required("param")?.required("value")?;
    decode_value(value)
}

fn decode_value(value: &Element) -> Result<Value, XmlRpcError> {
    let Some(typed) = value.children.first() else {
        return Ok(Value::String(value.text.clone()));
    };

    let text = typed.text.trim();
    let number = |kind: &str| {
        text.parse::<i64>()
            .map_err(|_| XmlRpcError::Malformed(format!("invalid {kind} {text:?}")))
    };

    match typed.name.as_str() {
        "string" => Ok(Value::String(typed.text.clone())),
        "int" | "i4" | "i8" => number(&typed.name).map(Value::Int),
        "boolean" => Ok(Value::Bool(text == "1")),
        "double" => text
            .parse()
            .map(Value::Double)
            .map_err(|_| XmlRpcError::Malformed(format!("invalid double {text:?}"))),
        "base64" => BASE64
            .decode(text)
            .map(Value::Base64)
            .map_err(|e| XmlRpcError::Malformed(format!("invalid base64: {e}"))),
        "nil" => Ok(Value::Nil),
        "array" => typed
            .required("data")?
            .children
            .iter()
            .filter(|c| c.name == "value")
            .map(decode_value)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        "struct" => {
            let mut members = BTreeMap::new();
            for member in typed.children.iter().filter(|c| c.name == "member") {
                let name = member.required("name")?.text.clone();
                members.insert(name, decode_value(member.required("value")?)?);
            }
            Ok(Value::Struct(members))
        }
        other => Err(XmlRpcError::Malformed(format!("unknown type <{other}>"))),
    }
}

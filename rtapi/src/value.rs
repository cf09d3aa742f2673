//! In-memory form of one XML-RPC encoded value.

use crate::error::{ErrorKind, Result};

/// Wire spelling of an integer. All three carry the same 64 bit value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum IntWidth {
    #[default]
    Int,
    I4,
    I8,
}

impl IntWidth {
    pub fn tag(self) -> &'static str {
        match self {
            IntWidth::Int => "int",
            IntWidth::I4 => "i4",
            IntWidth::I8 => "i8",
        }
    }
}

/// A decoded or to-be-encoded XML-RPC value.
///
/// Arrays and records are the only composite forms. Record members keep the
/// order they were constructed or decoded in.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Text(String),
    Integer(i64, IntWidth),
    Boolean(bool),
    Array(Vec<Value>),
    Record(Vec<(String, Value)>),
}

impl Value {
    pub fn text<S: Into<String>>(s: S) -> Self {
        Value::Text(s.into())
    }

    pub fn int(i: i64) -> Self {
        Value::Integer(i, IntWidth::Int)
    }

    pub fn array<I>(values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        Value::Array(values.into_iter().map(Into::into).collect())
    }

    pub fn record<I, K>(members: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Value::Record(members.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Tag name of the variant, as used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Text(_) => "string",
            Value::Integer(_, w) => w.tag(),
            Value::Boolean(_) => "boolean",
            Value::Array(_) => "array",
            Value::Record(_) => "struct",
        }
    }

    fn mismatch(&self, expected: &'static str) -> crate::error::Error {
        crate::context!(ErrorKind::TypeMismatch {
            expected,
            found: self.kind(),
        })
    }

    pub fn as_text(&self) -> Result<&str> {
        match self {
            Value::Text(s) => Ok(s),
            _ => Err(self.mismatch("string")),
        }
    }

    pub fn into_text(self) -> Result<String> {
        match self {
            Value::Text(s) => Ok(s),
            other => Err(other.mismatch("string")),
        }
    }

    pub fn as_array(&self) -> Result<&[Value]> {
        match self {
            Value::Array(a) => Ok(a),
            _ => Err(self.mismatch("array")),
        }
    }

    pub fn into_array(self) -> Result<Vec<Value>> {
        match self {
            Value::Array(a) => Ok(a),
            other => Err(other.mismatch("array")),
        }
    }

    pub fn as_record(&self) -> Result<&[(String, Value)]> {
        match self {
            Value::Record(r) => Ok(r),
            _ => Err(self.mismatch("struct")),
        }
    }

    /// First member of a record with the given name.
    pub fn member(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Record(r) => r.iter().find(|(k, _)| k == name).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Any integer spelling, or a boolean as 0/1.
    pub fn as_i64(&self) -> Result<i64> {
        match self {
            Value::Integer(i, _) => Ok(*i),
            Value::Boolean(b) => Ok(i64::from(*b)),
            _ => Err(self.mismatch("integer")),
        }
    }

    pub fn as_u64(&self) -> Result<u64> {
        let i = self.as_i64()?;
        u64::try_from(i).map_err(|_| crate::context!(ErrorKind::Range(i)))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_accessors_accept_all_widths_and_booleans() {
        assert_eq!(Value::Integer(7, IntWidth::Int).as_i64().unwrap(), 7);
        assert_eq!(Value::Integer(-7, IntWidth::I4).as_i64().unwrap(), -7);
        assert_eq!(
            Value::Integer(1 << 40, IntWidth::I8).as_u64().unwrap(),
            1 << 40
        );
        assert_eq!(Value::Boolean(true).as_u64().unwrap(), 1);
        assert_eq!(Value::Boolean(false).as_i64().unwrap(), 0);
    }

    #[test]
    fn accessors_never_coerce() {
        let e = Value::text("12").as_i64().unwrap_err();
        assert_eq!(
            e.kind(),
            &ErrorKind::TypeMismatch {
                expected: "integer",
                found: "string"
            }
        );

        let e = Value::int(1).as_text().unwrap_err();
        assert_eq!(
            e.kind(),
            &ErrorKind::TypeMismatch {
                expected: "string",
                found: "int"
            }
        );

        assert!(Value::text("x").as_array().is_err());
        assert!(Value::array(Vec::<Value>::new()).as_record().is_err());
    }

    #[test]
    fn negative_values_are_out_of_range_for_unsigned() {
        let e = Value::Integer(-1, IntWidth::I8).as_u64().unwrap_err();
        assert_eq!(e.kind(), &ErrorKind::Range(-1));
    }

    #[test]
    fn record_member_lookup_keeps_order() {
        let r = Value::record(vec![
            ("methodName", Value::text("d.stop")),
            ("params", Value::array(vec!["HASH"])),
        ]);
        assert_eq!(r.member("methodName").unwrap().as_text().unwrap(), "d.stop");
        assert_eq!(r.as_record().unwrap()[1].0, "params");
        assert!(r.member("missing").is_none());
        assert!(Value::int(0).member("params").is_none());
    }
}

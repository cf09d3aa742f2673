//! Shaping decoded responses into rows and scalars with strict arity.

use crate::error::{Error, ErrorKind, Result};
use crate::markup::MethodResponse;
use crate::value::Value;

/// The single result value of a response, `params[0].value`.
pub fn result(response: MethodResponse) -> Result<Value> {
    match response {
        MethodResponse::Params(params) => params
            .into_iter()
            .next()
            .ok_or_else(|| crate::context!(ErrorKind::Decode("<param> in <params>".into()))),
        MethodResponse::Fault { code, message } => {
            Err(crate::context!(ErrorKind::Fault { code, message }))
        }
    }
}

/// A fault record in place of a batched sub-call result.
fn fault_of(value: &Value) -> Option<Error> {
    let code = value.member("faultCode")?;
    let message = value
        .member("faultString")
        .and_then(|m| m.as_text().ok())
        .unwrap_or_default()
        .to_string();
    Some(crate::context!(ErrorKind::Fault {
        code: code.as_i64().unwrap_or_default(),
        message,
    }))
}

fn elements(response: MethodResponse) -> Result<Vec<Value>> {
    let elements = result(response)?.into_array()?;
    if let Some(fault) = elements.iter().find_map(fault_of) {
        return Err(fault);
    }
    Ok(elements)
}

/// Multi-record results: every element is itself an array.
pub fn rows(response: MethodResponse) -> Result<Vec<Vec<Value>>> {
    elements(response)?
        .into_iter()
        .map(Value::into_array)
        .collect()
}

/// One value per batched sub-call: the first value of every element.
pub fn scalars(response: MethodResponse, what: &'static str) -> Result<Vec<Value>> {
    elements(response)?
        .into_iter()
        .map(|e| {
            e.into_array()?.into_iter().next().ok_or_else(|| {
                crate::context!(ErrorKind::Shape {
                    what,
                    expected: 1,
                    actual: 0,
                })
            })
        })
        .collect()
}

/// Check that every sub-call of a batched command succeeded.
pub fn check_batch(response: MethodResponse, expected: usize) -> Result<()> {
    let elements = elements(response)?;
    expect_len("batched command results", expected, elements.len())
}

pub fn expect_len(what: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(crate::context!(ErrorKind::Shape {
            what,
            expected,
            actual,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch_response(elements: Vec<Value>) -> MethodResponse {
        MethodResponse::Params(vec![Value::Array(elements)])
    }

    #[test]
    fn rows_require_nested_arrays() {
        let resp = batch_response(vec![
            Value::array(vec![Value::text("a"), Value::int(1)]),
            Value::array(vec![Value::text("b"), Value::int(2)]),
        ]);
        let got = rows(resp).unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got[1][0].as_text().unwrap(), "b");

        let resp = batch_response(vec![Value::text("flat")]);
        assert!(matches!(
            rows(resp).unwrap_err().kind(),
            ErrorKind::TypeMismatch { expected: "array", .. }
        ));
    }

    #[test]
    fn result_must_be_an_array() {
        let resp = MethodResponse::Params(vec![Value::int(0)]);
        assert!(matches!(
            rows(resp).unwrap_err().kind(),
            ErrorKind::TypeMismatch { expected: "array", found: "int" }
        ));

        let resp = MethodResponse::Params(vec![]);
        assert!(matches!(
            rows(resp).unwrap_err().kind(),
            ErrorKind::Decode(_)
        ));
    }

    #[test]
    fn scalars_take_the_first_value() {
        let resp = batch_response(vec![
            Value::array(vec![Value::int(336650)]),
            Value::array(vec![Value::int(593)]),
        ]);
        let values = scalars(resp, "speeds").unwrap();
        assert_eq!(values, vec![Value::int(336650), Value::int(593)]);

        let resp = batch_response(vec![Value::array(Vec::<Value>::new())]);
        assert_eq!(
            scalars(resp, "speeds").unwrap_err().kind(),
            &ErrorKind::Shape {
                what: "speeds",
                expected: 1,
                actual: 0
            }
        );
    }

    #[test]
    fn faults_surface_from_top_level_and_sub_calls() {
        let resp = MethodResponse::Fault {
            code: -501,
            message: "Unsupported target type found.".into(),
        };
        assert_eq!(
            rows(resp).unwrap_err().kind(),
            &ErrorKind::Fault {
                code: -501,
                message: "Unsupported target type found.".into()
            }
        );

        let resp = batch_response(vec![
            Value::array(vec![Value::int(0)]),
            Value::record(vec![
                ("faultCode", Value::int(-503)),
                ("faultString", Value::text("Could not find info-hash.")),
            ]),
        ]);
        assert_eq!(
            check_batch(resp, 2).unwrap_err().kind(),
            &ErrorKind::Fault {
                code: -503,
                message: "Could not find info-hash.".into()
            }
        );
    }

    #[test]
    fn arity_mismatch_is_a_shape_error() {
        assert!(expect_len("stats", 6, 6).is_ok());
        assert_eq!(
            expect_len("stats", 6, 5).unwrap_err().to_string(),
            "Shape error in stats: expected 6 values, got 5"
        );
        let resp = batch_response(vec![Value::array(vec![Value::int(0)])]);
        assert!(check_batch(resp, 2).is_err());
    }
}

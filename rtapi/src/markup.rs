//! XML-RPC markup rendering and parsing.
//!
//! Only the dialect the daemon speaks is understood: `methodCall`,
//! `methodResponse`, `params`, `param`, `value`, `array`, `data`, `struct`,
//! `member`, `name`, `fault` and the leaf kinds `string`, `int`, `i4`, `i8`
//! and `boolean`.

use crate::error::{Error, ErrorKind, Result};
use crate::request::MethodCall;
use crate::value::{IntWidth, Value};

const PROLOG: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";
const MAX_DEPTH: usize = 64;

/// A decoded `methodResponse`.
#[derive(Clone, Debug, PartialEq)]
pub enum MethodResponse {
    Params(Vec<Value>),
    Fault { code: i64, message: String },
}

fn decode_err<S: Into<String>>(expected: S) -> Error {
    crate::context!(ErrorKind::Decode(expected.into()))
}

/// Render a call as a complete XML-RPC document.
pub fn to_markup(call: &MethodCall) -> String {
    let mut out = String::from(PROLOG);
    out.push_str("<methodCall>\n<methodName>");
    escape_into(&mut out, &call.name);
    out.push_str("</methodName>\n");
    write_params(&mut out, &call.params);
    out.push_str("</methodCall>\n");
    out
}

/// Render a response document, the way the daemon would answer.
pub fn response_to_markup(response: &MethodResponse) -> String {
    let mut out = String::from(PROLOG);
    out.push_str("<methodResponse>\n");
    match response {
        MethodResponse::Params(params) => write_params(&mut out, params),
        MethodResponse::Fault { code, message } => {
            out.push_str("<fault>\n");
            write_value(
                &mut out,
                &Value::record(vec![
                    ("faultCode", Value::int(*code)),
                    ("faultString", Value::text(message.as_str())),
                ]),
            );
            out.push_str("\n</fault>\n");
        }
    }
    out.push_str("</methodResponse>\n");
    out
}

fn write_params(out: &mut String, params: &[Value]) {
    out.push_str("<params>\n");
    for p in params {
        out.push_str("<param>\n");
        write_value(out, p);
        out.push_str("\n</param>\n");
    }
    out.push_str("</params>\n");
}

fn write_value(out: &mut String, value: &Value) {
    out.push_str("<value>");
    match value {
        Value::Text(s) => {
            out.push_str("<string>");
            escape_into(out, s);
            out.push_str("</string>");
        }
        Value::Integer(i, width) => {
            out.push_str(&format!("<{t}>{i}</{t}>", t = width.tag(), i = i));
        }
        Value::Boolean(b) => {
            out.push_str(if *b {
                "<boolean>1</boolean>"
            } else {
                "<boolean>0</boolean>"
            });
        }
        Value::Array(values) => {
            out.push_str("<array><data>\n");
            for v in values {
                write_value(out, v);
                out.push('\n');
            }
            out.push_str("</data></array>");
        }
        Value::Record(members) => {
            out.push_str("<struct>\n");
            for (name, v) in members {
                out.push_str("<member><name>");
                escape_into(out, name);
                out.push_str("</name>");
                write_value(out, v);
                out.push_str("</member>\n");
            }
            out.push_str("</struct>");
        }
    }
    out.push_str("</value>");
}

fn escape_into(out: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
}

/// Parse a `methodCall` document.
pub fn parse_call(src: &str) -> Result<MethodCall> {
    let root = parse_document(src)?;
    expect_name(&root, "methodCall")?;

    let mut name = None;
    let mut params = Vec::new();
    for child in &root.children {
        match child.name {
            "methodName" => name = Some(child.text.trim().to_string()),
            "params" => params = parse_params(child)?,
            other => return Err(decode_err(format!("<methodName> or <params>, found <{}>", other))),
        }
    }
    let name = name.ok_or_else(|| decode_err("<methodName> in <methodCall>"))?;
    Ok(MethodCall::create(name, params))
}

/// Parse a `methodResponse` document.
pub fn parse_response(src: &str) -> Result<MethodResponse> {
    let root = parse_document(src)?;
    expect_name(&root, "methodResponse")?;

    match root.children.as_slice() {
        [c] if c.name == "params" => Ok(MethodResponse::Params(parse_params(c)?)),
        [c] if c.name == "fault" => {
            let v = single_value(c)?;
            let code = match v.member("faultCode") {
                Some(code) => code.as_i64()?,
                None => return Err(decode_err("faultCode in <fault>")),
            };
            let message = match v.member("faultString") {
                Some(s) => s.as_text()?.to_string(),
                None => String::new(),
            };
            Ok(MethodResponse::Fault { code, message })
        }
        _ => Err(decode_err("one <params> or <fault> in <methodResponse>")),
    }
}

fn parse_params(el: &Element) -> Result<Vec<Value>> {
    el.children
        .iter()
        .map(|p| {
            expect_name(p, "param")?;
            single_value(p)
        })
        .collect()
}

fn single_value(el: &Element) -> Result<Value> {
    match el.children.as_slice() {
        [v] => parse_value(v),
        _ => Err(decode_err(format!("one <value> in <{}>", el.name))),
    }
}

fn expect_name(el: &Element, name: &str) -> Result<()> {
    if el.name == name {
        Ok(())
    } else {
        Err(decode_err(format!("<{}>, found <{}>", name, el.name)))
    }
}

fn parse_value(el: &Element) -> Result<Value> {
    expect_name(el, "value")?;
    match el.children.as_slice() {
        // untyped content is a string
        [] => Ok(Value::Text(el.text.clone())),
        [leaf] => parse_leaf(leaf),
        _ => Err(decode_err("a single typed value inside <value>")),
    }
}

fn parse_leaf(el: &Element) -> Result<Value> {
    match el.name {
        "string" => Ok(Value::Text(leaf_text(el)?.to_string())),
        "int" => parse_integer(el, IntWidth::Int),
        "i4" => parse_integer(el, IntWidth::I4),
        "i8" => parse_integer(el, IntWidth::I8),
        "boolean" => match leaf_text(el)?.trim() {
            "" | "0" | "false" => Ok(Value::Boolean(false)),
            "1" | "true" => Ok(Value::Boolean(true)),
            other => Err(decode_err(format!("boolean, found '{}'", other))),
        },
        "array" => parse_array(el),
        "struct" => parse_struct(el),
        other => Err(decode_err(format!(
            "string, int, i4, i8, boolean, array or struct, found <{}>",
            other
        ))),
    }
}

fn leaf_text<'e>(el: &'e Element) -> Result<&'e str> {
    if el.children.is_empty() {
        Ok(&el.text)
    } else {
        Err(decode_err(format!("text content in <{}>", el.name)))
    }
}

fn parse_integer(el: &Element, width: IntWidth) -> Result<Value> {
    let text = leaf_text(el)?.trim();
    if text.is_empty() {
        return Ok(Value::Integer(0, width));
    }
    text.parse::<i64>()
        .map(|i| Value::Integer(i, width))
        .map_err(|e| {
            crate::context!(
                e,
                ErrorKind::Decode(format!("integer in <{}>, found '{}'", el.name, text))
            )
        })
}

fn parse_array(el: &Element) -> Result<Value> {
    let data = match el.children.as_slice() {
        [d] if d.name == "data" => d,
        _ => return Err(decode_err("one <data> in <array>")),
    };
    data.children
        .iter()
        .map(parse_value)
        .collect::<Result<Vec<_>>>()
        .map(Value::Array)
}

fn parse_struct(el: &Element) -> Result<Value> {
    let mut members = Vec::with_capacity(el.children.len());
    for member in &el.children {
        expect_name(member, "member")?;
        let mut name = None;
        let mut value = None;
        for part in &member.children {
            match part.name {
                "name" => name = Some(leaf_text(part)?.trim().to_string()),
                "value" => value = Some(parse_value(part)?),
                other => {
                    return Err(decode_err(format!(
                        "<name> or <value> in <member>, found <{}>",
                        other
                    )))
                }
            }
        }
        match (name, value) {
            (Some(n), Some(v)) => members.push((n, v)),
            (None, _) => return Err(decode_err("<name> in <member>")),
            (_, None) => return Err(decode_err("<value> in <member>")),
        }
    }
    Ok(Value::Record(members))
}

struct Element<'a> {
    name: &'a str,
    children: Vec<Element<'a>>,
    text: String,
}

enum Token<'a> {
    Open(&'a str, bool),
    Close(&'a str),
    Text(String),
}

struct Reader<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Reader<'a> {
    fn skip_past(&mut self, end: &str, expected: &str) -> Result<()> {
        match self.src[self.pos..].find(end) {
            Some(i) => {
                self.pos += i + end.len();
                Ok(())
            }
            None => Err(decode_err(expected)),
        }
    }

    fn next_token(&mut self) -> Result<Option<Token<'a>>> {
        loop {
            let src = self.src;
            let rest = &src[self.pos..];
            if rest.is_empty() {
                return Ok(None);
            }
            if rest.starts_with("<!--") {
                self.skip_past("-->", "end of comment")?;
                continue;
            }
            if rest.starts_with("<?") {
                self.skip_past("?>", "end of processing instruction")?;
                continue;
            }
            if let Some(cdata) = rest.strip_prefix("<![CDATA[") {
                let end = cdata
                    .find("]]>")
                    .ok_or_else(|| decode_err("end of CDATA section"))?;
                self.pos += "<![CDATA[".len() + end + "]]>".len();
                return Ok(Some(Token::Text(cdata[..end].to_string())));
            }
            if rest.starts_with("<!") {
                self.skip_past(">", "end of declaration")?;
                continue;
            }
            if let Some(close) = rest.strip_prefix("</") {
                let end = close
                    .find('>')
                    .ok_or_else(|| decode_err("'>' of closing tag"))?;
                self.pos += 2 + end + 1;
                return Ok(Some(Token::Close(close[..end].trim())));
            }
            if let Some(open) = rest.strip_prefix('<') {
                return self.open_tag(open).map(Some);
            }

            let end = rest.find('<').unwrap_or(rest.len());
            self.pos += end;
            return Ok(Some(Token::Text(unescape(&rest[..end]))));
        }
    }

    fn open_tag(&mut self, open: &'a str) -> Result<Token<'a>> {
        let name_len = open
            .find(|c: char| c.is_ascii_whitespace() || c == '/' || c == '>')
            .unwrap_or(open.len());
        let name = &open[..name_len];
        if name.is_empty() {
            return Err(decode_err("tag name after '<'"));
        }

        // attributes are skipped, quoted values may contain '>'
        let mut quote = None;
        let mut last = b' ';
        for (i, b) in open.bytes().enumerate().skip(name_len) {
            match (quote, b) {
                (Some(q), b) if b == q => quote = None,
                (Some(_), _) => {}
                (None, b'"') | (None, b'\'') => quote = Some(b),
                (None, b'>') => {
                    self.pos += 1 + i + 1;
                    return Ok(Token::Open(name, last == b'/'));
                }
                (None, b) if b.is_ascii_whitespace() => continue,
                _ => {}
            }
            last = b;
        }
        Err(decode_err(format!("end of tag <{}>", name)))
    }
}

fn parse_document(src: &str) -> Result<Element<'_>> {
    let mut reader = Reader { src, pos: 0 };
    let root = loop {
        match reader.next_token()? {
            None => return Err(decode_err("root element")),
            Some(Token::Text(t)) if t.trim().is_empty() => continue,
            Some(Token::Text(_)) => return Err(decode_err("root element, found text")),
            Some(Token::Close(n)) => {
                return Err(decode_err(format!("root element, found </{}>", n)))
            }
            Some(Token::Open(name, empty)) => break parse_element(&mut reader, name, empty, 0)?,
        }
    };
    while let Some(tok) = reader.next_token()? {
        match tok {
            Token::Text(t) if t.trim().is_empty() => {}
            _ => return Err(decode_err("end of document")),
        }
    }
    Ok(root)
}

fn parse_element<'a>(
    reader: &mut Reader<'a>,
    name: &'a str,
    empty: bool,
    depth: usize,
) -> Result<Element<'a>> {
    if depth > MAX_DEPTH {
        return Err(decode_err(format!("nesting depth below {}", MAX_DEPTH)));
    }
    let mut el = Element {
        name,
        children: Vec::new(),
        text: String::new(),
    };
    if empty {
        return Ok(el);
    }
    loop {
        match reader.next_token()? {
            None => return Err(decode_err(format!("</{}>", name))),
            Some(Token::Open(child, e)) => {
                el.children
                    .push(parse_element(reader, child, e, depth + 1)?);
            }
            Some(Token::Close(n)) if n == name => return Ok(el),
            Some(Token::Close(n)) => {
                return Err(decode_err(format!("</{}>, found </{}>", name, n)))
            }
            Some(Token::Text(t)) => el.text.push_str(&t),
        }
    }
}

fn xml_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => None,
    }
}

/// Resolve XML character and entity references.
pub fn unescape(input: &str) -> String {
    decode_entities(input)
}

/// Resolve HTML entity references, as found in names and paths the daemon
/// stored escaped.
///
/// Every HTML5 named reference is known, plus numeric references.
pub fn unescape_html(input: &str) -> String {
    html_escape::decode_html_entities(input).into_owned()
}

fn decode_entities(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];

        let resolved = rest[1..]
            .find(';')
            .filter(|&end| end > 0 && end <= 10)
            .and_then(|end| {
                let entity = &rest[1..=end];
                let c = match entity.strip_prefix('#') {
                    Some(num) => {
                        let code = match num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
                            Some(hex) => u32::from_str_radix(hex, 16).ok(),
                            None => num.parse::<u32>().ok(),
                        };
                        code.and_then(char::from_u32)
                    }
                    None => xml_entity(entity),
                };
                c.map(|c| (c, end + 2))
            });

        match resolved {
            Some((c, consumed)) => {
                out.push(c);
                rest = &rest[consumed..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request;
    use pretty_assertions::assert_eq;

    #[test]
    fn every_builder_round_trips() {
        let calls = vec![
            request::list(),
            request::download("http://example.com/a.torrent?x=1&y=<2>"),
            request::download_with_options("magnet:?xt=urn", "/home/Down loads", "Soft&ware"),
            request::batch("d.erase", vec!["AAA", "BBB"]),
            request::trackers(vec!["AAA"]),
            request::speeds(),
            request::stats(),
            request::version(),
            request::batch("d.stop", Vec::<&str>::new()),
        ];
        for call in calls {
            let text = to_markup(&call);
            assert_eq!(parse_call(&text).unwrap(), call);
        }
    }

    #[test]
    fn non_text_leaves_round_trip() {
        let call = MethodCall::create(
            "x.set",
            vec![
                Value::Integer(-5, IntWidth::I4),
                Value::Integer(1 << 40, IntWidth::I8),
                Value::int(3),
                Value::Boolean(true),
                Value::Boolean(false),
                Value::record(vec![("k", Value::array(vec![Value::text("")]))]),
            ],
        );
        assert_eq!(parse_call(&to_markup(&call)).unwrap(), call);
    }

    #[test]
    fn markup_shape_of_a_call() {
        let text = to_markup(&request::download("L"));
        assert!(text.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<methodCall>"));
        assert!(text.contains("<methodName>load.start</methodName>"));
        assert!(text.contains("<value><string>L</string></value>"));
    }

    #[test]
    fn tolerant_of_attributes_comments_and_empty_tags() {
        let doc = r#"<?xml version='1.0'?>
<!-- daemon reply -->
<methodResponse a="1" b='x>y'>
<params><param><value><array ><data>
<value><string/></value>
<value/>
<value>bare &amp; text</value>
<value><boolean>true</boolean></value>
<value><i4> 42 </i4></value>
<value><struct><member><value><int>1</int></value><name>n</name></member></struct></value>
</data></array></value></param></params>
</methodResponse>"#;
        let resp = parse_response(doc).unwrap();
        assert_eq!(
            resp,
            MethodResponse::Params(vec![Value::Array(vec![
                Value::text(""),
                Value::text(""),
                Value::text("bare & text"),
                Value::Boolean(true),
                Value::Integer(42, IntWidth::I4),
                Value::record(vec![("n", Value::int(1))]),
            ])])
        );
    }

    #[test]
    fn fault_responses_are_decoded() {
        let doc = response_to_markup(&MethodResponse::Fault {
            code: -506,
            message: "Method 'd.nope' not defined".into(),
        });
        assert_eq!(
            parse_response(&doc).unwrap(),
            MethodResponse::Fault {
                code: -506,
                message: "Method 'd.nope' not defined".into()
            }
        );
    }

    fn decode_kind(doc: &str) -> ErrorKind {
        parse_response(doc).unwrap_err().kind().clone()
    }

    #[test]
    fn unknown_leaf_is_rejected() {
        let doc = "<methodResponse><params><param><value><double>1.5</double></value></param></params></methodResponse>";
        match decode_kind(doc) {
            ErrorKind::Decode(m) => assert!(m.contains("found <double>"), "{}", m),
            k => panic!("unexpected {:?}", k),
        }
    }

    #[test]
    fn malformed_markup_is_rejected() {
        let truncated = "<methodResponse><params><param><value><string>abc";
        match decode_kind(truncated) {
            ErrorKind::Decode(m) => assert_eq!(m, "</string>"),
            k => panic!("unexpected {:?}", k),
        }

        let mismatched = "<methodResponse><params></param></methodResponse>";
        match decode_kind(mismatched) {
            ErrorKind::Decode(m) => assert_eq!(m, "</params>, found </param>"),
            k => panic!("unexpected {:?}", k),
        }

        assert!(matches!(decode_kind(""), ErrorKind::Decode(_)));
        assert!(matches!(decode_kind("<methodCall/>"), ErrorKind::Decode(_)));
        assert!(matches!(
            decode_kind("<methodResponse><params><param><value><i8>12x</i8></value></param></params></methodResponse>"),
            ErrorKind::Decode(_)
        ));
        assert!(matches!(
            decode_kind("<methodResponse><params><param><value><boolean>2</boolean></value></param></params></methodResponse>"),
            ErrorKind::Decode(_)
        ));
        assert!(matches!(
            decode_kind("<methodResponse><params/></methodResponse> trailing"),
            ErrorKind::Decode(_)
        ));
        assert!(matches!(decode_kind("<methodResponse"), ErrorKind::Decode(_)));
    }

    #[test]
    fn deep_nesting_is_bounded() {
        let doc = format!(
            "<methodResponse><params><param>{}{}</param></params></methodResponse>",
            "<value><array><data>".repeat(40),
            "</data></array></value>".repeat(40)
        );
        assert!(matches!(decode_kind(&doc), ErrorKind::Decode(_)));
    }

    #[test]
    fn entity_decoding() {
        assert_eq!(unescape("&amp;&lt;&gt;&quot;&apos;"), "&<>\"'");
        assert_eq!(unescape("&#65;&#x42;"), "AB");
        assert_eq!(unescape("a & b &unknown; c"), "a & b &unknown; c");
        assert_eq!(unescape_html("Tom &amp; Jerry&nbsp;&hellip;"), "Tom & Jerry\u{a0}…");
        assert_eq!(unescape_html("no entities"), "no entities");
        assert_eq!(
            unescape_html("Am&eacute;lie &auml; &euro; &hearts; &#x263A;"),
            "Amélie ä € ♥ ☺"
        );
        assert_eq!(unescape_html("Caf&Eacute; &lt;r&gt;"), "CafÉ <r>");
    }

    #[test]
    fn string_leaves_keep_whitespace_numbers_do_not() {
        let src = "<methodResponse><params><param><value><array><data>\n\
                   <value><string> leech\n</string></value>\n\
                   <value><i8> 42 </i8></value>\n\
                   <value><boolean>\n1\n</boolean></value>\n\
                   </data></array></value></param></params></methodResponse>";
        assert_eq!(
            parse_response(src).unwrap(),
            MethodResponse::Params(vec![Value::Array(vec![
                Value::text(" leech\n"),
                Value::Integer(42, IntWidth::I8),
                Value::Boolean(true),
            ])])
        );
    }
}

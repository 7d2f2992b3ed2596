use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::Cursor;
use orion_common::{MAX_FRAME_SIZE, ProtocolError};

/// Representação de um valor ORSP (13 tipos de wire).
///
/// Bulk string nula (`$-1`) e array nulo (`*-1`) são variantes próprias:
/// um bulk/array vazio nunca colapsa com a forma nula.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Bytes),
    NullBulk,
    Array(Vec<Value>),
    NullArray,
    Null,
    Boolean(bool),
    Double(f64),
    /// Decimal de precisão arbitrária, mantido em texto (sinal + dígitos).
    BigNumber(String),
    BulkError { code: String, message: String },
    Verbatim { format: String, value: String },
    /// Chaves de map são simple strings no wire.
    Map(Vec<(String, Value)>),
    Set(Vec<Value>),
    Push { kind: String, data: Vec<Value> },
}

impl Value {
    /// Verifica se um frame completo está disponível no buffer sem alocar.
    /// Retorna Err(Eof) com o cursor vazio, Err(Truncated) se faltam bytes.
    pub fn check(src: &mut Cursor<&[u8]>) -> Result<(), ProtocolError> {
        if !src.has_remaining() {
            return Err(ProtocolError::Eof);
        }
        check_value(src)
    }

    /// Faz o parse de um frame completo a partir do cursor, deixando a
    /// posição no byte seguinte ao CRLF terminador.
    pub fn parse(src: &mut Cursor<&[u8]>) -> Result<Value, ProtocolError> {
        if !src.has_remaining() {
            return Err(ProtocolError::Eof);
        }
        parse_value(src)
    }

    /// Encoda o valor no buffer de saída. Total: nunca falha.
    pub fn encode(&self, dst: &mut BytesMut) {
        match self {
            Value::Simple(s) => put_line(dst, b'+', s.as_bytes()),
            Value::Error(s) => put_line(dst, b'-', s.as_bytes()),
            Value::Integer(n) => put_line(dst, b':', n.to_string().as_bytes()),
            Value::Bulk(data) => {
                put_line(dst, b'$', data.len().to_string().as_bytes());
                dst.put(data.as_ref());
                dst.put(&b"\r\n"[..]);
            }
            Value::NullBulk => dst.put(&b"$-1\r\n"[..]),
            Value::Array(items) => {
                put_line(dst, b'*', items.len().to_string().as_bytes());
                for item in items {
                    item.encode(dst);
                }
            }
            Value::NullArray => dst.put(&b"*-1\r\n"[..]),
            Value::Null => dst.put(&b"_\r\n"[..]),
            Value::Boolean(true) => dst.put(&b"#t\r\n"[..]),
            Value::Boolean(false) => dst.put(&b"#f\r\n"[..]),
            Value::Double(f) => put_line(dst, b',', f.to_string().as_bytes()),
            Value::BigNumber(digits) => put_line(dst, b'(', digits.as_bytes()),
            Value::BulkError { code, message } => {
                let len = code.len() + 2 + message.len();
                put_line(dst, b'!', len.to_string().as_bytes());
                dst.put(code.as_bytes());
                dst.put(&b"\r\n"[..]);
                dst.put(message.as_bytes());
                dst.put(&b"\r\n"[..]);
            }
            Value::Verbatim { format, value } => {
                let len = format.len() + 1 + value.len();
                put_line(dst, b'=', len.to_string().as_bytes());
                dst.put(format.as_bytes());
                dst.put_u8(b':');
                dst.put(value.as_bytes());
                dst.put(&b"\r\n"[..]);
            }
            Value::Map(pairs) => {
                put_line(dst, b'%', pairs.len().to_string().as_bytes());
                for (key, value) in pairs {
                    put_line(dst, b'+', key.as_bytes());
                    value.encode(dst);
                }
            }
            Value::Set(items) => {
                put_line(dst, b'~', items.len().to_string().as_bytes());
                for item in items {
                    item.encode(dst);
                }
            }
            Value::Push { kind, data } => {
                put_line(dst, b'>', (data.len() + 1).to_string().as_bytes());
                dst.put(kind.as_bytes());
                dst.put(&b"\r\n"[..]);
                for item in data {
                    item.encode(dst);
                }
            }
        }
    }

    /// Serializa o valor em um buffer novo.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Helper: cria um Value::Bulk a partir de &str.
    pub fn bulk(s: &str) -> Value {
        Value::Bulk(Bytes::copy_from_slice(s.as_bytes()))
    }

    /// Helper: cria um Array de bulk strings a partir de &[&str].
    pub fn array_from_strs(strs: &[&str]) -> Value {
        Value::Array(strs.iter().map(|s| Value::bulk(s)).collect())
    }
}

fn put_line(dst: &mut BytesMut, tag: u8, body: &[u8]) {
    dst.put_u8(tag);
    dst.put(body);
    dst.put(&b"\r\n"[..]);
}

fn check_value(src: &mut Cursor<&[u8]>) -> Result<(), ProtocolError> {
    match get_u8(src)? {
        b'+' | b'-' | b':' | b',' | b'(' | b'_' | b'#' => {
            get_line(src)?;
            Ok(())
        }
        b'$' => {
            let len = get_decimal(src)?;
            if len == -1 {
                return Ok(());
            }
            skip_payload(src, len)
        }
        b'*' => {
            let count = get_decimal(src)?;
            if count == -1 {
                return Ok(());
            }
            if count < 0 {
                return Err(ProtocolError::InvalidLength(count));
            }
            for _ in 0..count {
                check_value(src)?;
            }
            Ok(())
        }
        b'~' => {
            let count = get_decimal(src)?;
            if count < 0 {
                return Err(ProtocolError::InvalidLength(count));
            }
            for _ in 0..count {
                check_value(src)?;
            }
            Ok(())
        }
        b'%' => {
            let pairs = get_decimal(src)?;
            if pairs < 0 {
                return Err(ProtocolError::InvalidLength(pairs));
            }
            for _ in 0..pairs {
                check_value(src)?;
                check_value(src)?;
            }
            Ok(())
        }
        b'!' | b'=' => {
            let len = get_decimal(src)?;
            skip_payload(src, len)
        }
        b'>' => {
            let count = get_decimal(src)?;
            if count < 1 {
                return Err(ProtocolError::InvalidLength(count));
            }
            get_line(src)?; // linha do kind
            for _ in 0..count - 1 {
                check_value(src)?;
            }
            Ok(())
        }
        byte => Err(ProtocolError::UnknownTypeByte(byte)),
    }
}

fn parse_value(src: &mut Cursor<&[u8]>) -> Result<Value, ProtocolError> {
    match get_u8(src)? {
        b'+' => Ok(Value::Simple(get_utf8_line(src)?)),
        b'-' => Ok(Value::Error(get_utf8_line(src)?)),
        b':' => {
            let line = get_utf8_line(src)?;
            let n = line
                .parse::<i64>()
                .map_err(|_| ProtocolError::InvalidInteger(line))?;
            Ok(Value::Integer(n))
        }
        b'$' => {
            let len = get_decimal(src)?;
            if len == -1 {
                return Ok(Value::NullBulk);
            }
            let data = get_payload(src, len)?;
            Ok(Value::Bulk(data))
        }
        b'*' => {
            let count = get_decimal(src)?;
            if count == -1 {
                return Ok(Value::NullArray);
            }
            if count < 0 {
                return Err(ProtocolError::InvalidLength(count));
            }
            let mut items = Vec::with_capacity(count as usize);
            for _ in 0..count {
                items.push(parse_value(src)?);
            }
            Ok(Value::Array(items))
        }
        b'_' => {
            get_line(src)?;
            Ok(Value::Null)
        }
        b'#' => match get_line(src)? {
            b"t" => Ok(Value::Boolean(true)),
            b"f" => Ok(Value::Boolean(false)),
            other => Err(ProtocolError::InvalidEncoding(format!(
                "invalid boolean: {}",
                String::from_utf8_lossy(other)
            ))),
        },
        b',' => {
            let line = get_utf8_line(src)?;
            let f = line
                .parse::<f64>()
                .map_err(|_| ProtocolError::InvalidEncoding(format!("invalid double: {line}")))?;
            Ok(Value::Double(f))
        }
        b'(' => {
            let line = get_utf8_line(src)?;
            let digits = line.strip_prefix(['+', '-']).unwrap_or(&line);
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return Err(ProtocolError::InvalidEncoding(format!(
                    "invalid big number: {line}"
                )));
            }
            Ok(Value::BigNumber(line))
        }
        b'!' => {
            let len = get_decimal(src)?;
            if len < 0 {
                return Err(ProtocolError::InvalidLength(len));
            }
            let code = get_utf8_line(src)?;
            let message = get_utf8_line(src)?;
            let got = code.len() + 2 + message.len();
            if got != len as usize {
                return Err(ProtocolError::LengthMismatch {
                    expected: len as usize,
                    got,
                });
            }
            Ok(Value::BulkError { code, message })
        }
        b'=' => {
            let len = get_decimal(src)?;
            let data = get_payload(src, len)?;
            let text = String::from_utf8(data.to_vec())
                .map_err(|e| ProtocolError::InvalidEncoding(e.to_string()))?;
            let (format, value) = text.split_once(':').ok_or(ProtocolError::InvalidVerbatim)?;
            Ok(Value::Verbatim {
                format: format.to_string(),
                value: value.to_string(),
            })
        }
        b'%' => {
            let pairs = get_decimal(src)?;
            if pairs < 0 {
                return Err(ProtocolError::InvalidLength(pairs));
            }
            let mut map = Vec::with_capacity(pairs as usize);
            for _ in 0..pairs {
                let key = match parse_value(src)? {
                    Value::Simple(key) => key,
                    _ => return Err(ProtocolError::InvalidMapKey),
                };
                let value = parse_value(src)?;
                map.push((key, value));
            }
            Ok(Value::Map(map))
        }
        b'~' => {
            let count = get_decimal(src)?;
            if count < 0 {
                return Err(ProtocolError::InvalidLength(count));
            }
            let mut items = Vec::with_capacity(count as usize);
            for _ in 0..count {
                items.push(parse_value(src)?);
            }
            Ok(Value::Set(items))
        }
        b'>' => {
            let count = get_decimal(src)?;
            if count < 1 {
                return Err(ProtocolError::InvalidLength(count));
            }
            let kind = get_utf8_line(src)?;
            let mut data = Vec::with_capacity(count as usize - 1);
            for _ in 0..count - 1 {
                data.push(parse_value(src)?);
            }
            Ok(Value::Push { kind, data })
        }
        byte => Err(ProtocolError::UnknownTypeByte(byte)),
    }
}

fn get_u8(src: &mut Cursor<&[u8]>) -> Result<u8, ProtocolError> {
    if !src.has_remaining() {
        return Err(ProtocolError::Truncated);
    }
    Ok(src.get_u8())
}

fn get_line<'a>(src: &mut Cursor<&'a [u8]>) -> Result<&'a [u8], ProtocolError> {
    let start = src.position() as usize;
    let end = src.get_ref().len();

    for i in start..end.saturating_sub(1) {
        if src.get_ref()[i] == b'\r' && src.get_ref()[i + 1] == b'\n' {
            src.set_position((i + 2) as u64);
            return Ok(&src.get_ref()[start..i]);
        }
    }

    Err(ProtocolError::Truncated)
}

fn get_utf8_line(src: &mut Cursor<&[u8]>) -> Result<String, ProtocolError> {
    let line = get_line(src)?;
    String::from_utf8(line.to_vec()).map_err(|e| ProtocolError::InvalidEncoding(e.to_string()))
}

fn get_decimal(src: &mut Cursor<&[u8]>) -> Result<i64, ProtocolError> {
    let line = get_line(src)?;
    let s = std::str::from_utf8(line)
        .map_err(|e| ProtocolError::InvalidInteger(e.to_string()))?;
    s.parse::<i64>()
        .map_err(|_| ProtocolError::InvalidInteger(s.to_string()))
}

/// Pula (check) `len` bytes de payload mais o CRLF terminador.
fn skip_payload(src: &mut Cursor<&[u8]>, len: i64) -> Result<(), ProtocolError> {
    if len < 0 {
        return Err(ProtocolError::InvalidLength(len));
    }
    let len = len as usize;
    if len > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge(len));
    }
    if src.remaining() < len + 2 {
        return Err(ProtocolError::Truncated);
    }
    src.set_position(src.position() + len as u64 + 2);
    Ok(())
}

/// Lê `len` bytes de payload e consome o CRLF terminador.
fn get_payload(src: &mut Cursor<&[u8]>, len: i64) -> Result<Bytes, ProtocolError> {
    if len < 0 {
        return Err(ProtocolError::InvalidLength(len));
    }
    let len = len as usize;
    if len > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge(len));
    }
    if src.remaining() < len + 2 {
        return Err(ProtocolError::Truncated);
    }
    let start = src.position() as usize;
    let data = Bytes::copy_from_slice(&src.get_ref()[start..start + len]);
    if &src.get_ref()[start + len..start + len + 2] != b"\r\n" {
        return Err(ProtocolError::InvalidEncoding(
            "payload not terminated by CRLF".into(),
        ));
    }
    src.set_position((start + len + 2) as u64);
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(value: &Value) {
        let mut buf = BytesMut::new();
        value.encode(&mut buf);
        let bytes = buf.freeze();
        let mut cursor = Cursor::new(bytes.as_ref());
        Value::check(&mut cursor).unwrap();
        assert_eq!(cursor.position() as usize, bytes.len());
        cursor.set_position(0);
        let parsed = Value::parse(&mut cursor).unwrap();
        assert_eq!(&parsed, value);
        assert_eq!(cursor.position() as usize, bytes.len());
    }

    fn decode(data: &[u8]) -> Result<Value, ProtocolError> {
        let mut cursor = Cursor::new(data);
        Value::parse(&mut cursor)
    }

    #[test]
    fn roundtrip_simple_string() {
        roundtrip(&Value::Simple("OK".into()));
    }

    #[test]
    fn roundtrip_error() {
        roundtrip(&Value::Error("ERR unknown command".into()));
    }

    #[test]
    fn roundtrip_integer() {
        roundtrip(&Value::Integer(42));
        roundtrip(&Value::Integer(-1));
        roundtrip(&Value::Integer(0));
    }

    #[test]
    fn roundtrip_bulk() {
        roundtrip(&Value::Bulk(Bytes::from("hello world")));
        roundtrip(&Value::Bulk(Bytes::new()));
    }

    #[test]
    fn roundtrip_null_forms() {
        roundtrip(&Value::Null);
        roundtrip(&Value::NullBulk);
        roundtrip(&Value::NullArray);
    }

    #[test]
    fn roundtrip_boolean() {
        roundtrip(&Value::Boolean(true));
        roundtrip(&Value::Boolean(false));
    }

    #[test]
    fn roundtrip_double() {
        roundtrip(&Value::Double(3.25));
        roundtrip(&Value::Double(-0.5));
        roundtrip(&Value::Double(10.0));
    }

    #[test]
    fn roundtrip_big_number() {
        roundtrip(&Value::BigNumber("3492890328409238509324850943850943825024385".into()));
        roundtrip(&Value::BigNumber("-123".into()));
    }

    #[test]
    fn roundtrip_bulk_error() {
        roundtrip(&Value::BulkError {
            code: "SYNTAX".into(),
            message: "invalid syntax".into(),
        });
    }

    #[test]
    fn roundtrip_verbatim() {
        roundtrip(&Value::Verbatim {
            format: "txt".into(),
            value: "Some string".into(),
        });
    }

    #[test]
    fn roundtrip_map() {
        roundtrip(&Value::Map(vec![
            ("first".into(), Value::Integer(1)),
            ("second".into(), Value::bulk("two")),
        ]));
    }

    #[test]
    fn roundtrip_set() {
        roundtrip(&Value::Set(vec![
            Value::bulk("a"),
            Value::bulk("b"),
            Value::Integer(3),
        ]));
    }

    #[test]
    fn roundtrip_push() {
        roundtrip(&Value::Push {
            kind: "message".into(),
            data: vec![Value::bulk("channel"), Value::bulk("payload")],
        });
    }

    #[test]
    fn roundtrip_nested_array() {
        roundtrip(&Value::Array(vec![
            Value::Array(vec![Value::Integer(1), Value::Integer(2)]),
            Value::Bulk(Bytes::from("test")),
            Value::Null,
            Value::Boolean(true),
        ]));
    }

    #[test]
    fn null_bulk_distinct_from_empty_bulk() {
        assert_eq!(Value::NullBulk.to_bytes().as_ref(), b"$-1\r\n");
        assert_eq!(Value::Bulk(Bytes::new()).to_bytes().as_ref(), b"$0\r\n\r\n");
        assert_eq!(Value::NullArray.to_bytes().as_ref(), b"*-1\r\n");
        assert_eq!(Value::Array(vec![]).to_bytes().as_ref(), b"*0\r\n");
    }

    #[test]
    fn parse_request_bytes() {
        let parsed = decode(b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n").unwrap();
        assert_eq!(parsed, Value::array_from_strs(&["SET", "foo", "bar"]));
    }

    #[test]
    fn empty_input_is_eof() {
        let mut cursor = Cursor::new(&b""[..]);
        assert!(matches!(Value::check(&mut cursor), Err(ProtocolError::Eof)));
        let mut cursor = Cursor::new(&b""[..]);
        assert!(matches!(Value::parse(&mut cursor), Err(ProtocolError::Eof)));
    }

    #[test]
    fn incomplete_frame_is_truncated() {
        let mut cursor = Cursor::new(&b"+OK\r"[..]);
        assert!(matches!(
            Value::check(&mut cursor),
            Err(ProtocolError::Truncated)
        ));

        let mut cursor = Cursor::new(&b"$5\r\nhel"[..]);
        assert!(matches!(
            Value::check(&mut cursor),
            Err(ProtocolError::Truncated)
        ));

        let mut cursor = Cursor::new(&b"*2\r\n$1\r\na\r\n"[..]);
        assert!(matches!(
            Value::check(&mut cursor),
            Err(ProtocolError::Truncated)
        ));
    }

    #[test]
    fn unknown_type_byte() {
        assert!(matches!(
            decode(b"?invalid\r\n"),
            Err(ProtocolError::UnknownTypeByte(b'?'))
        ));
    }

    #[test]
    fn non_numeric_length() {
        assert!(matches!(
            decode(b"$abc\r\n"),
            Err(ProtocolError::InvalidInteger(_))
        ));
    }

    #[test]
    fn negative_length_only_for_null() {
        assert!(matches!(
            decode(b"$-2\r\n"),
            Err(ProtocolError::InvalidLength(-2))
        ));
        assert!(matches!(
            decode(b"~-1\r\n"),
            Err(ProtocolError::InvalidLength(-1))
        ));
    }

    #[test]
    fn bulk_error_length_mismatch() {
        // "AB\r\nCDE" tem 7 bytes, não 5
        assert!(matches!(
            decode(b"!5\r\nAB\r\nCDE\r\n"),
            Err(ProtocolError::LengthMismatch { expected: 5, got: 7 })
        ));
    }

    #[test]
    fn verbatim_missing_separator() {
        assert!(matches!(
            decode(b"=3\r\nabc\r\n"),
            Err(ProtocolError::InvalidVerbatim)
        ));
    }

    #[test]
    fn map_key_must_be_simple_string() {
        assert!(matches!(
            decode(b"%1\r\n$1\r\na\r\n+v\r\n"),
            Err(ProtocolError::InvalidMapKey)
        ));
    }

    #[test]
    fn invalid_boolean_payload() {
        assert!(matches!(
            decode(b"#x\r\n"),
            Err(ProtocolError::InvalidEncoding(_))
        ));
    }

    #[test]
    fn invalid_big_number() {
        assert!(matches!(
            decode(b"(12a\r\n"),
            Err(ProtocolError::InvalidEncoding(_))
        ));
        assert!(matches!(
            decode(b"(\r\n"),
            Err(ProtocolError::InvalidEncoding(_))
        ));
    }

    #[test]
    fn push_counts_kind_line() {
        let parsed = decode(b">2\r\nmessage\r\n$5\r\nhello\r\n").unwrap();
        assert_eq!(
            parsed,
            Value::Push {
                kind: "message".into(),
                data: vec![Value::bulk("hello")],
            }
        );
    }

    #[test]
    fn parse_consumes_exactly_one_value() {
        let data = b"+OK\r\n:42\r\n";
        let mut cursor = Cursor::new(&data[..]);
        assert_eq!(Value::parse(&mut cursor).unwrap(), Value::Simple("OK".into()));
        assert_eq!(cursor.position(), 5);
        assert_eq!(Value::parse(&mut cursor).unwrap(), Value::Integer(42));
    }
}

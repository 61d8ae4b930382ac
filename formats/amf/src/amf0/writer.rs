use core::time;
use std::{collections::HashMap, io};

use crate::errors::{AmfError, AmfResult};

use byteorder::{BigEndian, WriteBytesExt};
use utils::traits::writer::WriteTo;

use super::{Value, amf0_marker};

#[derive(Debug)]
pub struct Writer<W> {
    inner: W,
}

impl<W> Writer<W> {
    pub fn into_inner(self) -> W {
        self.inner
    }

    pub fn inner_mut(&mut self) -> &mut W {
        &mut self.inner
    }
}

impl<W> Writer<W>
where
    W: io::Write,
{
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn write(&mut self, value: &Value) -> AmfResult<()> {
        value.write_to(&mut self.inner)
    }
}

impl<W: io::Write> WriteTo<W> for Value {
    type Error = AmfError;
    fn write_to(&self, writer: &mut W) -> Result<(), Self::Error> {
        match self {
            Value::Number(n) => Self::write_number(writer, *n),
            Value::Boolean(b) => Self::write_boolean(writer, *b),
            Value::String(ss) => Self::write_string(writer, ss),
            Value::Object { name, entries } => match name {
                Some(name) => Self::write_typed_object_arr_inner(writer, name, entries),
                None => Self::write_anonymous_object_arr(writer, entries),
            },
            Value::Null => Self::write_null(writer),
            Value::Undefined => Self::write_undefined(writer),
            Value::Reference { index } => Self::write_reference(writer, *index),
            Value::ECMAArray(arr) => Self::write_ecma_array(writer, arr),
            Value::ObjectEnd => Self::write_object_end(writer),
            Value::StrictArray(arr) => Self::write_strict_array(writer, arr),
            Value::Date {
                time_zone: _,
                millis_timestamp: unix_timestamp,
            } => Self::write_date(writer, unix_timestamp),
            Value::XMLDocument(xml) => Self::write_xml(writer, xml),
        }
    }
}

impl Value {
    pub fn write_number<W: io::Write>(writer: &mut W, v: f64) -> AmfResult<()> {
        writer.write_u8(amf0_marker::NUMBER)?;
        writer.write_f64::<BigEndian>(v)?;
        Ok(())
    }
    pub fn write_boolean<W: io::Write>(writer: &mut W, v: bool) -> AmfResult<()> {
        writer.write_u8(amf0_marker::BOOLEAN)?;
        writer.write_u8(v as u8)?;
        Ok(())
    }
    fn write_short_string_inner<W: io::Write>(writer: &mut W, v: &str) -> AmfResult<()> {
        assert!(v.len() < 0xFFFF);
        writer.write_u16::<BigEndian>(v.len() as u16)?;
        writer.write_all(v.as_bytes())?;
        Ok(())
    }
    fn write_long_string_inner<W: io::Write>(writer: &mut W, v: &str) -> AmfResult<()> {
        assert!(v.len() <= 0xFFFF_FFFF);
        writer.write_u32::<BigEndian>(v.len() as u32)?;
        writer.write_all(v.as_bytes())?;
        Ok(())
    }
    pub fn write_string<W: io::Write>(writer: &mut W, v: &str) -> AmfResult<()> {
        if v.len() < 0xFFFF {
            writer.write_u8(amf0_marker::STRING)?;
            Self::write_short_string_inner(writer, v)?;
        } else {
            writer.write_u8(amf0_marker::LONG_STRING)?;
            Self::write_long_string_inner(writer, v)?;
        }
        Ok(())
    }
    fn write_pairs_inner<W: io::Write>(
        writer: &mut W,
        entries: &[(String, Value)],
    ) -> AmfResult<()> {
        for (key, value) in entries {
            Self::write_short_string_inner(writer, key)?;
            value.write_to(writer)?;
        }
        writer.write_u16::<BigEndian>(0)?;
        writer.write_u8(amf0_marker::OBJECT_END)?;
        Ok(())
    }
    fn write_anonymous_object_arr<W: io::Write>(
        writer: &mut W,
        entries: &[(String, Value)],
    ) -> AmfResult<()> {
        assert!(entries.len() <= 0xFFFF_FFFF);
        writer.write_u8(amf0_marker::OBJECT)?;
        Self::write_pairs_inner(writer, entries)?;
        Ok(())
    }
    pub fn write_anonymous_object<W: io::Write>(
        writer: &mut W,
        entries: &HashMap<String, Value>,
    ) -> AmfResult<()> {
        let arr: Vec<(_, _)> = entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Self::write_anonymous_object_arr(writer, arr.as_slice())?;
        Ok(())
    }
    pub fn write_null<W: io::Write>(writer: &mut W) -> AmfResult<()> {
        writer.write_u8(amf0_marker::NULL)?;
        Ok(())
    }
    pub fn write_undefined<W: io::Write>(writer: &mut W) -> AmfResult<()> {
        writer.write_u8(amf0_marker::UNDEFINED)?;
        Ok(())
    }
    pub fn write_reference<W: io::Write>(writer: &mut W, index: u16) -> AmfResult<()> {
        writer.write_u8(amf0_marker::REFERENCE)?;
        writer.write_u16::<BigEndian>(index)?;
        Ok(())
    }
    pub fn write_ecma_array<W: io::Write>(
        writer: &mut W,
        arr: &[(String, Value)],
    ) -> AmfResult<()> {
        assert!(arr.len() <= 0xFFFF_FFFF);
        writer.write_u8(amf0_marker::ECMA_ARRAY)?;
        writer.write_u32::<BigEndian>(arr.len() as u32)?;
        Self::write_pairs_inner(writer, arr)?;
        Ok(())
    }
    fn write_object_end<W: io::Write>(writer: &mut W) -> AmfResult<()> {
        writer.write_u8(amf0_marker::OBJECT_END)?;
        Ok(())
    }
    pub fn write_strict_array<W: io::Write>(writer: &mut W, arr: &[Value]) -> AmfResult<()> {
        assert!(arr.len() <= 0xFFFF_FFFF);
        writer.write_u8(amf0_marker::STRICT_ARRAY)?;
        writer.write_u32::<BigEndian>(arr.len() as u32)?;
        for v in arr {
            v.write_to(writer)?;
        }
        Ok(())
    }
    pub fn write_date<W: io::Write>(writer: &mut W, date_time: &time::Duration) -> AmfResult<()> {
        writer.write_u8(amf0_marker::DATE)?;
        writer.write_f64::<BigEndian>(date_time.as_millis() as f64)?;
        // The wire offset is reserved, a zero goes out no matter what the
        // decoded value carried.
        writer.write_i16::<BigEndian>(0x0000)?;
        Ok(())
    }
    pub fn write_xml<W: io::Write>(writer: &mut W, xml: &str) -> AmfResult<()> {
        writer.write_u8(amf0_marker::XML_DOCUMENT)?;
        Self::write_long_string_inner(writer, xml)?;
        Ok(())
    }
    fn write_typed_object_arr_inner<W: io::Write>(
        writer: &mut W,
        name: &str,
        entries: &[(String, Value)],
    ) -> AmfResult<()> {
        assert!(entries.len() <= 0xFFFF_FFFF);
        writer.write_u8(amf0_marker::TYPED_OBJECT)?;
        Self::write_short_string_inner(writer, name)?;
        Self::write_pairs_inner(writer, entries)?;
        Ok(())
    }
    pub fn write_typed_object<W: io::Write>(
        writer: &mut W,
        name: &str,
        entries: &HashMap<String, Value>,
    ) -> AmfResult<()> {
        let arr: Vec<(_, _)> = entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Self::write_typed_object_arr_inner(writer, name, &arr)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use core::time;

    use crate::amf0::{Reader, Value, amf0_marker};
    use utils::traits::writer::WriteTo;

    macro_rules! encode {
        ($value:expr) => {{
            let mut buf = Vec::new();
            let res = (&$value).write_to(&mut buf);
            assert!(res.is_ok());
            buf
        }};
    }

    macro_rules! assert_round_trip {
        ($value:expr) => {{
            let buf = encode!($value);
            let decoded = Reader::new(&mut &buf[..]).read().unwrap().unwrap();
            assert_eq!(decoded, $value);
        }};
    }

    #[test]
    fn number() {
        let mut expected = vec![amf0_marker::NUMBER];
        expected.extend(3.5f64.to_be_bytes());
        assert_eq!(encode!(Value::Number(3.5)), expected);
        assert_round_trip!(Value::Number(3.5));
        assert_round_trip!(Value::Number(f64::INFINITY));
        assert_round_trip!(Value::Number(f64::NEG_INFINITY));
    }

    #[test]
    fn nan_survives_the_wire() {
        let buf = encode!(Value::Number(f64::NAN));
        let decoded = Reader::new(&mut &buf[..]).read().unwrap().unwrap();
        match decoded {
            Value::Number(v) => {
                assert!(v.is_nan());
                assert_eq!(v.to_bits(), f64::NAN.to_bits());
            }
            _ => panic!("expected a number"),
        }
    }

    #[test]
    fn boolean() {
        assert_eq!(
            encode!(Value::Boolean(true)),
            vec![amf0_marker::BOOLEAN, 0x01]
        );
        assert_eq!(
            encode!(Value::Boolean(false)),
            vec![amf0_marker::BOOLEAN, 0x00]
        );
    }

    #[test]
    fn string() {
        let mut expected = vec![amf0_marker::STRING, 0x00, 0x13];
        expected.extend("this is a テスト".as_bytes());
        assert_eq!(
            encode!(Value::String("this is a テスト".to_string())),
            expected
        );
        assert_round_trip!(Value::String("".to_string()));
        assert_round_trip!(Value::String("¡ołé 字".to_string()));
    }

    #[test]
    fn long_string_picked_by_length() {
        let body = "a".repeat(0xFFFF);
        let buf = encode!(Value::String(body.clone()));
        assert_eq!(buf[0], amf0_marker::LONG_STRING);
        assert_eq!(&buf[1..5], &(body.len() as u32).to_be_bytes()[..]);
        assert_round_trip!(Value::String(body.clone()));
    }

    #[test]
    fn anonymous_object() {
        let arr = vec![
            ("utf".to_string(), Value::String("UTF テスト".to_string())),
            ("zed".to_string(), Value::Number(5.0)),
        ];
        assert_round_trip!(Value::Object {
            name: None,
            entries: arr.clone()
        });

        let pairs = vec![
            ("foo".to_string(), Value::String("bar".to_string())),
            ("baz".to_string(), Value::Null),
        ];
        let mut expected = vec![amf0_marker::OBJECT];
        expected.extend([0x00, 0x03]);
        expected.extend(b"foo");
        expected.extend([amf0_marker::STRING, 0x00, 0x03]);
        expected.extend(b"bar");
        expected.extend([0x00, 0x03]);
        expected.extend(b"baz");
        expected.push(amf0_marker::NULL);
        expected.extend([0x00, 0x00, amf0_marker::OBJECT_END]);
        assert_eq!(
            encode!(Value::Object {
                name: None,
                entries: pairs
            }),
            expected
        );
    }

    #[test]
    fn null() {
        assert_eq!(encode!(Value::Null), vec![amf0_marker::NULL]);
    }

    #[test]
    fn undefined() {
        assert_eq!(encode!(Value::Undefined), vec![amf0_marker::UNDEFINED]);
    }

    #[test]
    fn reference() {
        assert_eq!(
            encode!(Value::Reference { index: 1 }),
            vec![amf0_marker::REFERENCE, 0x00, 0x01]
        );
    }

    #[test]
    fn ecma_array() {
        let arr = vec![
            ("0".to_string(), Value::String("a".to_string())),
            ("1".to_string(), Value::String("b".to_string())),
        ];
        let buf = encode!(Value::ECMAArray(arr.clone()));
        assert_eq!(buf[0], amf0_marker::ECMA_ARRAY);
        assert_eq!(&buf[1..5], &2u32.to_be_bytes()[..]);
        assert_round_trip!(Value::ECMAArray(arr.clone()));
    }

    #[test]
    fn strict_array() {
        let arr = vec![
            Value::Number(1.0),
            Value::String("2".to_string()),
            Value::Number(3.0),
        ];
        assert_round_trip!(Value::StrictArray(arr.clone()));
        assert_round_trip!(Value::StrictArray(vec![]));
    }

    #[test]
    fn date() {
        let value = Value::Date {
            time_zone: 0,
            millis_timestamp: time::Duration::from_millis(1_590_796_800_000),
        };
        let mut expected = vec![amf0_marker::DATE];
        expected.extend(1_590_796_800_000f64.to_be_bytes());
        expected.extend([0x00, 0x00]);
        assert_eq!(encode!(value.clone()), expected);
        assert_round_trip!(value);
    }

    #[test]
    fn date_offset_is_flattened_to_zero() {
        let shifted = Value::Date {
            time_zone: 60,
            millis_timestamp: time::Duration::from_millis(1),
        };
        let plain = Value::Date {
            time_zone: 0,
            millis_timestamp: time::Duration::from_millis(1),
        };
        assert_eq!(encode!(shifted), encode!(plain));
    }

    #[test]
    fn xml() {
        assert_round_trip!(Value::XMLDocument(
            "<parent><child prop=\"test\" /></parent>".to_string()
        ));
    }

    #[test]
    fn typed_object() {
        let pairs = vec![
            ("foo".to_string(), Value::String("bar".to_string())),
            ("baz".to_string(), Value::Null),
        ];
        assert_round_trip!(Value::Object {
            name: Some("org.amf.ASClass".to_string()),
            entries: pairs.clone()
        });
    }

    #[test]
    fn nested_round_trip() {
        let value = Value::Object {
            name: None,
            entries: vec![
                (
                    "info".to_string(),
                    Value::Object {
                        name: None,
                        entries: vec![
                            ("level".to_string(), Value::String("status".to_string())),
                            (
                                "details".to_string(),
                                Value::StrictArray(vec![Value::Number(1.0), Value::Null]),
                            ),
                        ],
                    },
                ),
                (
                    "list".to_string(),
                    Value::ECMAArray(vec![("0".to_string(), Value::Boolean(true))]),
                ),
            ],
        };
        assert_round_trip!(value);
    }
}

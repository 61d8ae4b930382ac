use core::time;
use std::{io, vec};

use byteorder::{BigEndian, ReadBytesExt};

use crate::errors::{AmfError, AmfResult};

use super::{Value, amf0_marker};

#[derive(Debug)]
struct Amf0Referenceable {
    objects: Vec<Value>,
}

#[derive(Debug)]
pub struct Reader<R> {
    inner: R,
    referenceable: Amf0Referenceable,
}
impl<R> Reader<R> {
    /// Unwraps this `Decoder`, returning the underlying reader.
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Get the reference to the underlying reader.
    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// Get the mutable reference to the underlying reader.
    pub fn inner_mut(&mut self) -> &mut R {
        &mut self.inner
    }
}
impl<R> Reader<R>
where
    R: io::Read,
{
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            referenceable: Amf0Referenceable {
                objects: Vec::new(),
            },
        }
    }
    pub fn read(&mut self) -> AmfResult<Option<Value>> {
        let marker = self.inner.read_u8();
        if marker.is_err() {
            return Ok(None);
        }
        let marker = marker.expect("this cannot be err");
        let value = match marker {
            amf0_marker::NUMBER => self.read_number(),
            amf0_marker::BOOLEAN => self.read_boolean(),
            amf0_marker::STRING => self.read_string(),
            amf0_marker::OBJECT => self.read_anonymous_object(),
            amf0_marker::MOVIECLIP => Err(AmfError::Unsupported { marker }),
            amf0_marker::NULL => Ok(Value::Null),
            amf0_marker::UNDEFINED => Ok(Value::Undefined),
            amf0_marker::REFERENCE => self.read_reference(),
            amf0_marker::ECMA_ARRAY => self.read_ecma_array(),
            amf0_marker::OBJECT_END => Ok(Value::ObjectEnd),
            amf0_marker::STRICT_ARRAY => self.read_strict_array(),
            amf0_marker::DATE => self.read_date(),
            amf0_marker::LONG_STRING => self.read_long_string(),
            amf0_marker::UNSUPPORTED => Err(AmfError::Unsupported { marker }),
            amf0_marker::RECORDSET => Err(AmfError::Unsupported { marker }),
            amf0_marker::XML_DOCUMENT => self.read_xml_document(),
            amf0_marker::TYPED_OBJECT => self.read_typed_object(),
            amf0_marker::AVMPLUS_OBJECT => Err(AmfError::Unsupported { marker }),
            _ => Err(AmfError::Unknown { marker }),
        };
        match value {
            Ok(v) => Ok(Some(v)),
            Err(err) => Err(err),
        }
    }

    pub fn read_all(&mut self) -> AmfResult<Vec<Value>> {
        let mut result = Vec::new();
        while let Ok(Some(value)) = self.read() {
            result.push(value);
        }
        Ok(result)
    }

    pub fn read_number(&mut self) -> AmfResult<Value> {
        let number = self.inner.read_f64::<BigEndian>()?;
        Ok(Value::Number(number))
    }
    pub fn read_boolean(&mut self) -> AmfResult<Value> {
        let bool = self.inner.read_u8()?;
        Ok(Value::Boolean(bool != 0))
    }
    fn read_utf8_inner(&mut self, len: usize) -> AmfResult<String> {
        let mut buffer = vec![0; len];
        self.inner.read_exact(&mut buffer)?;
        let result = String::from_utf8(buffer)?;
        Ok(result)
    }
    pub fn read_string(&mut self) -> AmfResult<Value> {
        let len = self.inner.read_u16::<BigEndian>()?;
        self.read_utf8_inner(len as usize).map(Value::String)
    }
    pub fn read_long_string(&mut self) -> AmfResult<Value> {
        let len = self.inner.read_u32::<BigEndian>()?;
        self.read_utf8_inner(len as usize).map(Value::String)
    }
    fn read_key_value_pairs_inner(&mut self) -> AmfResult<Vec<(String, Value)>> {
        let mut result: Vec<(String, Value)> = Vec::new();
        loop {
            let len: u16 = self.inner.read_u16::<BigEndian>()?;
            let key = self.read_utf8_inner(len as usize)?;
            match self.read() {
                Ok(Some(Value::ObjectEnd)) if key.is_empty() => {
                    break;
                }
                Ok(None) => {
                    return Err(AmfError::Io(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "unexpected eof",
                    )));
                }
                Ok(Some(value)) => {
                    result.push((key, value));
                }
                Err(err) => {
                    return Err(err);
                }
            }
        }
        Ok(result)
    }
    pub fn read_anonymous_object(&mut self) -> AmfResult<Value> {
        self.read_and_record_referenceable_inner(|this| {
            let pairs = this.read_key_value_pairs_inner()?;
            Ok(Value::Object {
                name: None,
                entries: pairs,
            })
        })
    }
    pub fn read_reference(&mut self) -> AmfResult<Value> {
        let index = self.inner.read_u16::<BigEndian>()? as usize;
        self.referenceable
            .objects
            .get(index)
            .ok_or(AmfError::OutOfRangeReference { index })
            .and_then(|v| match *v {
                Value::Null => Err(AmfError::CircularReference { index }),
                _ => Ok(v.clone()),
            })
    }
    pub fn read_ecma_array(&mut self) -> AmfResult<Value> {
        self.read_and_record_referenceable_inner(|this| {
            // the count is approximate, the terminator is authoritative
            let _len = this.inner.read_u32::<BigEndian>()? as usize;
            let pairs = this.read_key_value_pairs_inner()?;
            Ok(Value::ECMAArray(pairs))
        })
    }
    pub fn read_strict_array(&mut self) -> AmfResult<Value> {
        self.read_and_record_referenceable_inner(|this| {
            let len = this.inner.read_u32::<BigEndian>()? as usize;
            let values = (0..len)
                .map(|_| match this.read() {
                    Ok(None) => Err(AmfError::Io(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "expected eof",
                    ))),
                    Ok(Some(value)) => Ok(value),
                    Err(err) => Err(err),
                })
                .collect::<AmfResult<_>>()?;
            Ok(Value::StrictArray(values))
        })
    }
    pub fn read_date(&mut self) -> AmfResult<Value> {
        let timestamp = self.inner.read_f64::<BigEndian>()?;
        if !(timestamp.is_finite() && timestamp.is_sign_positive()) {
            return Err(AmfError::InvalidDate {
                milliseconds: timestamp,
            });
        }
        let time_zone = self.inner.read_i16::<BigEndian>()?;
        Ok(Value::Date {
            time_zone,
            millis_timestamp: time::Duration::from_millis(timestamp as u64),
        })
    }
    pub fn read_xml_document(&mut self) -> AmfResult<Value> {
        let len = self.inner.read_u32::<BigEndian>()?;
        self.read_utf8_inner(len as usize).map(Value::XMLDocument)
    }
    pub fn read_typed_object(&mut self) -> AmfResult<Value> {
        self.read_and_record_referenceable_inner(|this| {
            let name_len = this.inner.read_u16::<BigEndian>()?;
            let name = this.read_utf8_inner(name_len as usize)?;
            let pairs = this.read_key_value_pairs_inner()?;
            Ok(Value::Object {
                name: Some(name),
                entries: pairs,
            })
        })
    }
    fn read_and_record_referenceable_inner<F>(&mut self, f: F) -> AmfResult<Value>
    where
        F: FnOnce(&mut Self) -> AmfResult<Value>,
    {
        let len = self.referenceable.objects.len();
        self.referenceable.objects.push(Value::Null);
        let result = f(self)?;
        self.referenceable.objects[len] = result.clone();
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use core::f64;
    use std::io::{self};

    use crate::{
        amf0::{Value, amf0_marker},
        errors::AmfError,
    };

    use super::Reader;
    macro_rules! decode {
        ($bytes:expr) => {{
            let data: Vec<u8> = $bytes;
            Reader::new(&mut &data[..]).read()
        }};
    }

    macro_rules! assert_eof {
        ($bytes:expr) => {
            let err = decode!($bytes).unwrap_err();
            match err {
                AmfError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
                _ => assert!(false),
            }
        };
    }

    fn number_bytes(v: f64) -> Vec<u8> {
        let mut data = vec![amf0_marker::NUMBER];
        data.extend(v.to_be_bytes());
        data
    }

    #[test]
    fn number() {
        assert_eq!(
            decode!(number_bytes(3.5)).unwrap().unwrap(),
            Value::Number(3.5)
        );
        assert_ne!(
            decode!(number_bytes(3.5)).unwrap().unwrap(),
            Value::Number(1.)
        );
        assert_eq!(
            decode!(number_bytes(f64::NEG_INFINITY)).unwrap().unwrap(),
            Value::Number(f64::NEG_INFINITY)
        );
        assert_eq!(
            decode!(number_bytes(f64::INFINITY)).unwrap().unwrap(),
            Value::Number(f64::INFINITY)
        );

        assert_eof!(vec![amf0_marker::NUMBER, 0x40, 0x0C]);

        let is_nan = |v| match v {
            Value::Number(inner) => f64::is_nan(inner),
            _ => false,
        };
        assert!(is_nan(decode!(number_bytes(f64::NAN)).unwrap().unwrap()));
    }

    #[test]
    fn boolean() {
        assert_eq!(
            decode!(vec![amf0_marker::BOOLEAN, 0x01]).unwrap().unwrap(),
            Value::Boolean(true)
        );
        assert_eq!(
            decode!(vec![amf0_marker::BOOLEAN, 0x00]).unwrap().unwrap(),
            Value::Boolean(false)
        );

        assert_eof!(vec![amf0_marker::BOOLEAN]);
    }

    #[test]
    fn string() {
        let mut data = vec![amf0_marker::STRING, 0x00, 0x13];
        data.extend("this is a テスト".as_bytes());
        assert_eq!(
            decode!(data.clone()).unwrap().unwrap(),
            Value::String("this is a テスト".to_string())
        );
        assert_ne!(
            decode!(data).unwrap().unwrap(),
            Value::String("random utf8 字".to_string())
        );
        assert_eof!(vec![amf0_marker::STRING, 0x00, 0x04, b'a']);
    }

    #[test]
    fn long_string() {
        let body = "a".repeat(0x10013);
        let mut data = vec![amf0_marker::LONG_STRING];
        data.extend((body.len() as u32).to_be_bytes());
        data.extend(body.as_bytes());
        assert_eq!(decode!(data).unwrap().unwrap(), Value::String(body));

        assert_eof!(vec![amf0_marker::LONG_STRING, 0x00, 0x01, 0x00, 0x00]);
    }

    #[test]
    fn xml() {
        let doc = "<parent><child prop=\"test\" /></parent>";
        let mut data = vec![amf0_marker::XML_DOCUMENT];
        data.extend((doc.len() as u32).to_be_bytes());
        data.extend(doc.as_bytes());
        assert_eq!(
            decode!(data).unwrap().unwrap(),
            Value::XMLDocument(doc.to_string())
        );

        assert_eof!(vec![amf0_marker::XML_DOCUMENT, 0x00, 0x00, 0x00, 0x04]);
    }

    fn pair_bytes(key: &str, value_bytes: &[u8]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend((key.len() as u16).to_be_bytes());
        data.extend(key.as_bytes());
        data.extend(value_bytes);
        data
    }

    const OBJECT_END_BYTES: [u8; 3] = [0x00, 0x00, amf0_marker::OBJECT_END];

    #[test]
    fn object() {
        let mut data = vec![amf0_marker::OBJECT];
        data.extend(pair_bytes("foo", &[amf0_marker::STRING, 0x00, 0x03, b'b', b'a', b'z']));
        data.extend(pair_bytes("bar", &number_bytes(3.5)));
        data.extend(OBJECT_END_BYTES);

        let pairs = vec![
            ("foo".to_string(), Value::String("baz".to_string())),
            ("bar".to_string(), Value::Number(3.5)),
        ];
        assert_eq!(
            decode!(data.clone()).unwrap().unwrap(),
            Value::Object {
                name: None,
                entries: pairs
            }
        );

        data.truncate(data.len() - 2);
        assert_eof!(data);
    }

    #[test]
    fn movieclip() {
        let err = decode!(vec![amf0_marker::MOVIECLIP]).unwrap_err();
        match err {
            AmfError::Unsupported { marker } => assert_eq!(marker, amf0_marker::MOVIECLIP),
            _ => panic!("unexpected error: {:?}", err),
        }
    }

    #[test]
    fn null() {
        assert_eq!(decode!(vec![amf0_marker::NULL]).unwrap().unwrap(), Value::Null)
    }

    #[test]
    fn undefined() {
        assert_eq!(
            decode!(vec![amf0_marker::UNDEFINED]).unwrap().unwrap(),
            Value::Undefined
        )
    }

    #[test]
    fn reference() {
        // {"0": {"foo": "baz"}, "1": reference(1)}
        let mut inner = vec![amf0_marker::OBJECT];
        inner.extend(pair_bytes("foo", &[amf0_marker::STRING, 0x00, 0x03, b'b', b'a', b'z']));
        inner.extend(OBJECT_END_BYTES);

        let mut data = vec![amf0_marker::OBJECT];
        data.extend(pair_bytes("0", &inner));
        data.extend(pair_bytes("1", &[amf0_marker::REFERENCE, 0x00, 0x01]));
        data.extend(OBJECT_END_BYTES);

        let object = Value::Object {
            name: None,
            entries: vec![("foo".to_string(), Value::String("baz".to_string()))],
        };
        let reference_pairs = vec![("0".to_string(), object.clone()), ("1".to_string(), object)];

        assert_eq!(
            decode!(data).unwrap().unwrap(),
            Value::Object {
                name: None,
                entries: reference_pairs
            }
        );
    }

    #[test]
    fn circular_reference() {
        // the outer object is still a placeholder while its entries parse
        let mut data = vec![amf0_marker::OBJECT];
        data.extend(pair_bytes("self", &[amf0_marker::REFERENCE, 0x00, 0x00]));
        data.extend(OBJECT_END_BYTES);

        assert!(matches!(
            decode!(data),
            Err(AmfError::CircularReference { index: 0 })
        ));
    }

    #[test]
    fn out_of_range_reference() {
        assert!(matches!(
            decode!(vec![amf0_marker::REFERENCE, 0x00, 0x07]),
            Err(AmfError::OutOfRangeReference { index: 7 })
        ));
    }

    #[test]
    fn ecma_array() {
        let mut data = vec![amf0_marker::ECMA_ARRAY, 0x00, 0x00, 0x00, 0x02];
        data.extend(pair_bytes("c", &[amf0_marker::STRING, 0x00, 0x01, b'd']));
        data.extend(pair_bytes("a", &[amf0_marker::STRING, 0x00, 0x01, b'b']));
        data.extend(OBJECT_END_BYTES);

        let arr = vec![
            ("c".to_string(), Value::String("d".to_string())),
            ("a".to_string(), Value::String("b".to_string())),
        ];
        assert_eq!(decode!(data.clone()).unwrap().unwrap(), Value::ECMAArray(arr));

        data.truncate(data.len() - 3);
        assert_eof!(data);
    }

    #[test]
    fn strict_array() {
        let mut data = vec![amf0_marker::STRICT_ARRAY, 0x00, 0x00, 0x00, 0x03];
        data.extend(number_bytes(1.0));
        data.extend([amf0_marker::STRING, 0x00, 0x01, b'2']);
        data.extend(number_bytes(3.0));

        let arr = vec![
            Value::Number(1.0),
            Value::String("2".to_string()),
            Value::Number(3.0),
        ];
        assert_eq!(
            decode!(data.clone()).unwrap().unwrap(),
            Value::StrictArray(arr)
        );

        data.truncate(data.len() - 4);
        assert_eof!(data);
    }

    #[test]
    fn date() {
        let date_bytes = |millis: f64, time_zone: i16| {
            let mut data = vec![amf0_marker::DATE];
            data.extend(millis.to_be_bytes());
            data.extend(time_zone.to_be_bytes());
            data
        };
        assert_eq!(
            decode!(date_bytes(1_590_796_800_000.0, 0)).unwrap().unwrap(),
            Value::Date {
                time_zone: 0,
                millis_timestamp: core::time::Duration::from_millis(1_590_796_800_000)
            }
        );
        assert!(matches!(
            decode!(date_bytes(-1.0, 0)),
            Err(AmfError::InvalidDate { milliseconds: -1.0 })
        ));
        assert!(matches!(
            decode!(date_bytes(f64::INFINITY, 0)),
            Err(AmfError::InvalidDate {
                milliseconds: f64::INFINITY
            })
        ));
        // Writers are told to emit a zero offset but readers in the wild see
        // anything, so the offset is preserved rather than rejected.
        assert_eq!(
            decode!(date_bytes(1.0, 60)).unwrap().unwrap(),
            Value::Date {
                time_zone: 60,
                millis_timestamp: core::time::Duration::from_millis(1)
            }
        );

        assert_eof!(vec![amf0_marker::DATE, 0x00]);
    }

    #[test]
    fn typed_object() {
        let mut data = vec![amf0_marker::TYPED_OBJECT, 0x00, 0x0F];
        data.extend("org.amf.ASClass".as_bytes());
        data.extend(pair_bytes("foo", &[amf0_marker::STRING, 0x00, 0x03, b'b', b'a', b'r']));
        data.extend(pair_bytes("baz", &[amf0_marker::NULL]));
        data.extend(OBJECT_END_BYTES);

        let pairs = vec![
            ("foo".to_string(), Value::String("bar".to_string())),
            ("baz".to_string(), Value::Null),
        ];
        assert_eq!(
            decode!(data).unwrap().unwrap(),
            Value::Object {
                name: Some("org.amf.ASClass".to_string()),
                entries: pairs
            }
        );
    }

    #[test]
    fn unsupported() {
        assert!(matches!(
            decode!(vec![amf0_marker::RECORDSET]),
            Err(AmfError::Unsupported {
                marker: amf0_marker::RECORDSET
            })
        ));
        assert!(matches!(
            decode!(vec![amf0_marker::UNSUPPORTED]),
            Err(AmfError::Unsupported {
                marker: amf0_marker::UNSUPPORTED
            })
        ));
        assert!(matches!(
            decode!(vec![amf0_marker::AVMPLUS_OBJECT]),
            Err(AmfError::Unsupported {
                marker: amf0_marker::AVMPLUS_OBJECT
            })
        ));
    }

    #[test]
    fn unknown() {
        assert!(decode!(vec![]).unwrap().is_none());
        assert!(matches!(
            decode!(vec![0x7F]),
            Err(AmfError::Unknown { marker: 0x7F })
        ));
    }

    #[test]
    fn read_all() {
        let mut data = number_bytes(1.0);
        data.push(amf0_marker::NULL);
        data.extend([amf0_marker::STRING, 0x00, 0x02, b'o', b'k']);
        let values = Reader::new(&mut &data[..]).read_all().unwrap();
        assert_eq!(
            values,
            vec![
                Value::Number(1.0),
                Value::Null,
                Value::String("ok".to_string())
            ]
        );
    }
}

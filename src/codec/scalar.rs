//! Per-type scalar layouts.
//!
//! When `nullable` is set every value is preceded by a one-byte null flag,
//! except for [`CacheType::Null`] columns which write nothing at all.

use bigdecimal::BigDecimal;
use chrono::DateTime;
use num_bigint::{BigInt, Sign};
use num_traits::ToPrimitive;
use std::str::FromStr;

use super::{TupleInput, TupleOutput};
use crate::error::{CacheResult, EncodingError};
use crate::schema::{CacheType, Column};
use crate::value::Value;

fn mismatch(column: &Column, value: &Value) -> EncodingError {
    EncodingError::TypeMismatch {
        column: column.name.clone(),
        expected: column.ty.into(),
        found: value.kind_name(),
    }
}

pub fn write_scalar(
    out: &mut TupleOutput,
    column: &Column,
    value: &Value,
    nullable: bool,
) -> CacheResult<()> {
    let is_null = value.is_null();
    if is_null && !nullable {
        return Err(EncodingError::NullNotAllowed {
            column: column.name.clone(),
        }
        .into());
    }
    if nullable && column.ty != CacheType::Null {
        out.write(&is_null)?;
    }
    if is_null {
        return Ok(());
    }

    match (column.ty, value) {
        (CacheType::Byte, Value::Byte(v)) => out.write(v),
        (CacheType::Short, Value::Short(v)) => out.write(v),
        (CacheType::Int, Value::Int(v)) => out.write(v),
        (CacheType::Long, Value::Long(v)) => out.write(v),
        (CacheType::Float, Value::Float(v)) => out.write(v),
        (CacheType::Double, Value::Double(v)) => out.write(v),
        (CacheType::Boolean, Value::Boolean(v)) => out.write(v),
        (CacheType::Char, Value::Char(c)) => {
            let mut units = [0u16; 2];
            match c.encode_utf16(&mut units) {
                [unit] => out.write(unit),
                _ => Err(EncodingError::CharOutOfRange(*c).into()),
            }
        }
        (CacheType::Date, Value::Date(d)) => out.write(&d.timestamp_millis()),
        (CacheType::BigInteger, Value::BigInteger(v)) => {
            let (sign, magnitude) = v.to_bytes_be();
            let sign: i8 = match sign {
                Sign::Minus => -1,
                Sign::NoSign => 0,
                Sign::Plus => 1,
            };
            out.write(&sign)?;
            out.write(&magnitude)
        }
        (CacheType::BigDecimal, Value::BigDecimal(d)) => out.write(&d.to_string()),
        (CacheType::BigDecimalInt, Value::BigDecimal(d)) => {
            let truncated = d.with_scale(0).to_i32().ok_or_else(|| {
                EncodingError::IntOutOfRange {
                    column: column.name.clone(),
                    value: d.to_string(),
                }
            })?;
            out.write(&truncated)
        }
        (CacheType::String | CacheType::LongText, Value::String(s) | Value::LongText(s)) => {
            out.write(s)
        }
        // Text columns store any other scalar by its display form.
        (CacheType::String, Value::List(_)) => Err(mismatch(column, value).into()),
        (CacheType::String, other) => out.write(&other.to_string()),
        (CacheType::Null, _) => Ok(()),
        _ => Err(mismatch(column, value).into()),
    }
}

pub fn read_scalar(input: &mut TupleInput<'_>, ty: CacheType, nullable: bool) -> CacheResult<Value> {
    if nullable && ty != CacheType::Null && input.read::<bool>()? {
        return Ok(Value::Null);
    }
    let value = match ty {
        CacheType::Byte => Value::Byte(input.read()?),
        CacheType::Short => Value::Short(input.read()?),
        CacheType::Int => Value::Int(input.read()?),
        CacheType::Long => Value::Long(input.read()?),
        CacheType::Float => Value::Float(input.read()?),
        CacheType::Double => Value::Double(input.read()?),
        CacheType::Boolean => Value::Boolean(input.read()?),
        CacheType::Char => {
            let unit: u16 = input.read()?;
            let c = char::from_u32(u32::from(unit)).ok_or(EncodingError::InvalidChar(unit))?;
            Value::Char(c)
        }
        CacheType::String => Value::String(input.read()?),
        CacheType::LongText => Value::LongText(input.read()?),
        CacheType::Date => {
            let millis: i64 = input.read()?;
            let date =
                DateTime::from_timestamp_millis(millis).ok_or(EncodingError::InvalidDate(millis))?;
            Value::Date(date)
        }
        CacheType::BigInteger => {
            let sign: i8 = input.read()?;
            let magnitude: Vec<u8> = input.read()?;
            let sign = match sign {
                -1 => Sign::Minus,
                0 => Sign::NoSign,
                1 => Sign::Plus,
                other => return Err(EncodingError::InvalidSign(other).into()),
            };
            Value::BigInteger(BigInt::from_bytes_be(sign, &magnitude))
        }
        CacheType::BigDecimal => {
            let text: String = input.read()?;
            let decimal =
                BigDecimal::from_str(&text).map_err(|_| EncodingError::InvalidDecimal(text))?;
            Value::BigDecimal(decimal)
        }
        CacheType::BigDecimalInt => {
            let v: i32 = input.read()?;
            Value::BigDecimal(BigDecimal::from(v))
        }
        CacheType::Null => Value::Null,
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use quickcheck::quickcheck;

    fn round_trip(ty: CacheType, value: Value, nullable: bool) -> Value {
        let column = Column::new("c", ty);
        let mut out = TupleOutput::new();
        write_scalar(&mut out, &column, &value, nullable).unwrap();
        let bytes = out.into_bytes();
        let mut input = TupleInput::new(&bytes);
        let decoded = read_scalar(&mut input, ty, nullable).unwrap();
        assert_eq!(input.remaining(), 0);
        decoded
    }

    #[test]
    fn test_every_type_round_trips() {
        let date = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let cases = vec![
            (CacheType::Byte, Value::Byte(-7)),
            (CacheType::Short, Value::Short(-300)),
            (CacheType::Int, Value::Int(70_000)),
            (CacheType::Long, Value::Long(-9_000_000_000)),
            (CacheType::Float, Value::Float(1.25)),
            (CacheType::Double, Value::Double(-2.5e100)),
            (CacheType::Boolean, Value::Boolean(true)),
            (CacheType::Char, Value::Char('é')),
            (CacheType::String, Value::from("hello")),
            (CacheType::Date, Value::Date(date)),
            (
                CacheType::BigInteger,
                Value::BigInteger(BigInt::from_str("-123456789012345678901234567890").unwrap()),
            ),
            (CacheType::BigInteger, Value::BigInteger(BigInt::from(0))),
            (
                CacheType::BigDecimal,
                Value::BigDecimal(BigDecimal::from_str("3.14159265358979323846").unwrap()),
            ),
            (CacheType::LongText, Value::LongText("long ".repeat(100))),
        ];
        for (ty, value) in cases {
            assert_eq!(round_trip(ty, value.clone(), true), value);
            assert_eq!(round_trip(ty, value.clone(), false), value);
            assert_eq!(round_trip(ty, Value::Null, true), Value::Null);
        }
    }

    #[test]
    fn test_fixed_layouts() {
        let column = Column::new("c", CacheType::Short);
        let mut out = TupleOutput::new();
        write_scalar(&mut out, &column, &Value::Short(1), true).unwrap();
        assert_eq!(out.into_bytes(), vec![0, 0, 1]);

        let column = Column::new("c", CacheType::Char);
        let mut out = TupleOutput::new();
        write_scalar(&mut out, &column, &Value::Char('A'), false).unwrap();
        assert_eq!(out.into_bytes(), vec![0, 0x41]);
    }

    #[test]
    fn test_decimal_integer_truncates() {
        let value = Value::BigDecimal(BigDecimal::from_str("-42.9").unwrap());
        assert_eq!(
            round_trip(CacheType::BigDecimalInt, value, true),
            Value::BigDecimal(BigDecimal::from(-42))
        );
    }

    #[test]
    fn test_null_column_writes_nothing() {
        let column = Column::new("c", CacheType::Null);
        let mut out = TupleOutput::new();
        write_scalar(&mut out, &column, &Value::Null, true).unwrap();
        assert!(out.is_empty());
        let mut input = TupleInput::new(&[]);
        assert_eq!(read_scalar(&mut input, CacheType::Null, true).unwrap(), Value::Null);
    }

    #[test]
    fn test_null_rejected_when_not_nullable() {
        let column = Column::new("id", CacheType::Int);
        let mut out = TupleOutput::new();
        let err = write_scalar(&mut out, &column, &Value::Null, false).unwrap_err();
        assert!(err.to_string().contains("NULL"));
    }

    #[test]
    fn test_string_column_accepts_any_scalar() {
        assert_eq!(
            round_trip(CacheType::String, Value::Int(12), true),
            Value::from("12")
        );
        assert_eq!(
            round_trip(CacheType::LongText, Value::from("clob"), true),
            Value::LongText("clob".into())
        );
    }

    #[test]
    fn test_type_mismatch_and_wide_chars_are_rejected() {
        let column = Column::new("n", CacheType::Int);
        let mut out = TupleOutput::new();
        assert!(write_scalar(&mut out, &column, &Value::Long(1), true).is_err());

        let column = Column::new("c", CacheType::Char);
        let mut out = TupleOutput::new();
        assert!(write_scalar(&mut out, &column, &Value::Char('😀'), true).is_err());
    }

    quickcheck! {
        fn prop_long_round_trip(v: i64) -> bool {
            round_trip(CacheType::Long, Value::Long(v), true) == Value::Long(v)
        }

        fn prop_string_round_trip(s: String) -> bool {
            round_trip(CacheType::String, Value::String(s.clone()), true) == Value::String(s)
        }

        fn prop_double_round_trip(v: f64) -> bool {
            match round_trip(CacheType::Double, Value::Double(v), true) {
                Value::Double(d) => d.to_bits() == v.to_bits(),
                _ => false,
            }
        }

        fn prop_big_integer_round_trip(v: i64, shift: u8) -> bool {
            let big = BigInt::from(v) << (shift as usize);
            round_trip(CacheType::BigInteger, Value::BigInteger(big.clone()), true)
                == Value::BigInteger(big)
        }
    }
}

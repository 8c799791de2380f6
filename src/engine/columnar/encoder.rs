use std::borrow::Cow;
use std::sync::Arc;

use arrow::array::{
    ArrayRef, BinaryArray, BooleanArray, BooleanBufferBuilder, PrimitiveArray, StringArray,
};
use arrow::buffer::{Buffer, OffsetBuffer, ScalarBuffer};
use arrow::datatypes::{
    ArrowPrimitiveType, Date32Type, Date64Type, Float32Type, Float64Type, Int8Type, Int16Type,
    Int32Type, Int64Type, Time32MillisecondType, TimestampMillisecondType,
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::engine::columnar::error::EncodeError;
use crate::engine::columnar::schema::LogicalType;
use crate::engine::columnar::scratch::EncodeScratch;

/// Encodes one column of untyped driver values into a typed columnar buffer.
///
/// Unparseable or absent values fold into the validity bitmap, never into a
/// defaulted value; `Err` is reserved for contract violations. The scratch
/// mask is reset here, so callers may reuse one scratch across columns.
pub fn encode_column(
    ty: &LogicalType,
    values: &[Value],
    scratch: &mut EncodeScratch,
) -> Result<ArrayRef, EncodeError> {
    scratch.reset(values.len());

    match ty {
        LogicalType::Boolean => Ok(encode_boolean(values, scratch)),
        LogicalType::Int8 => Ok(encode_fixed::<Int8Type, _>(values, scratch, |v| {
            coerce_f64(v).map(|f| f as i8)
        })),
        LogicalType::Int16 => Ok(encode_fixed::<Int16Type, _>(values, scratch, |v| {
            coerce_f64(v).map(|f| f as i16)
        })),
        LogicalType::Int32 => Ok(encode_fixed::<Int32Type, _>(values, scratch, |v| {
            coerce_f64(v).map(|f| f as i32)
        })),
        LogicalType::Int64 => Ok(encode_fixed::<Int64Type, _>(values, scratch, coerce_i64)),
        LogicalType::Float32 => Ok(encode_fixed::<Float32Type, _>(values, scratch, |v| {
            coerce_f64(v).map(|f| f as f32)
        })),
        LogicalType::Float64 => Ok(encode_fixed::<Float64Type, _>(values, scratch, coerce_f64)),
        LogicalType::Date32 => Ok(encode_fixed::<Date32Type, _>(values, scratch, coerce_date_days)),
        LogicalType::Date64 => Ok(encode_fixed::<Date64Type, _>(
            values,
            scratch,
            coerce_datetime_millis,
        )),
        LogicalType::TimeMillis => Ok(encode_fixed::<Time32MillisecondType, _>(
            values,
            scratch,
            coerce_time_millis,
        )),
        LogicalType::Timestamp { tz } => {
            let array = encode_primitive::<TimestampMillisecondType, _>(
                values,
                scratch,
                coerce_datetime_millis,
            );
            Ok(Arc::new(array.with_timezone_opt(tz.clone())))
        }
        // Decimal and other complex source types are downgraded to text by the
        // upstream schema translator; encode whatever arrives as text.
        LogicalType::Decimal { .. } | LogicalType::Utf8 => encode_utf8(values, scratch),
        LogicalType::Binary => encode_binary(values, scratch),
    }
}

fn encode_boolean(values: &[Value], scratch: &mut EncodeScratch) -> ArrayRef {
    let mut data = BooleanBufferBuilder::new(values.len());
    for (row, value) in values.iter().enumerate() {
        match coerce_bool(value) {
            Some(b) => data.append(b),
            None => {
                scratch.set_null(row);
                data.append(false);
            }
        }
    }
    Arc::new(BooleanArray::new(data.finish(), scratch.finish_validity()))
}

fn encode_fixed<T, F>(values: &[Value], scratch: &mut EncodeScratch, coerce: F) -> ArrayRef
where
    T: ArrowPrimitiveType,
    F: Fn(&Value) -> Option<T::Native>,
{
    Arc::new(encode_primitive::<T, F>(values, scratch, coerce))
}

fn encode_primitive<T, F>(
    values: &[Value],
    scratch: &mut EncodeScratch,
    coerce: F,
) -> PrimitiveArray<T>
where
    T: ArrowPrimitiveType,
    F: Fn(&Value) -> Option<T::Native>,
{
    let mut data: Vec<T::Native> = Vec::with_capacity(values.len());
    for (row, value) in values.iter().enumerate() {
        match coerce(value) {
            Some(native) => data.push(native),
            None => {
                // The data slot still gets a placeholder; nullity lives in the
                // bitmap so a real zero stays distinguishable.
                scratch.set_null(row);
                data.push(T::Native::default());
            }
        }
    }
    PrimitiveArray::<T>::new(ScalarBuffer::from(data), scratch.finish_validity())
}

/// Two-pass UTF-8 encoding: the first pass renders values and measures the
/// payload, the second writes offsets and bytes.
fn encode_utf8(values: &[Value], scratch: &mut EncodeScratch) -> Result<ArrayRef, EncodeError> {
    let mut rendered: Vec<Option<Cow<'_, str>>> = Vec::with_capacity(values.len());
    let mut total = 0usize;
    for (row, value) in values.iter().enumerate() {
        let cell = match value {
            Value::Null => None,
            // Empty string is a real value for text columns.
            Value::String(s) => Some(Cow::Borrowed(s.as_str())),
            other => Some(Cow::Owned(other.to_string())),
        };
        match cell {
            Some(text) => {
                total += text.len();
                rendered.push(Some(text));
            }
            None => {
                scratch.set_null(row);
                rendered.push(None);
            }
        }
    }
    if total > i32::MAX as usize {
        return Err(EncodeError::PayloadTooLarge(total));
    }

    let mut offsets: Vec<i32> = Vec::with_capacity(values.len() + 1);
    offsets.push(0);
    let mut payload: Vec<u8> = Vec::with_capacity(total);
    for cell in &rendered {
        if let Some(text) = cell {
            payload.extend_from_slice(text.as_bytes());
        }
        offsets.push(payload.len() as i32);
    }

    let array = StringArray::try_new(
        OffsetBuffer::new(ScalarBuffer::from(offsets)),
        Buffer::from(payload),
        scratch.finish_validity(),
    )?;
    Ok(Arc::new(array))
}

fn encode_binary(values: &[Value], scratch: &mut EncodeScratch) -> Result<ArrayRef, EncodeError> {
    let mut rendered: Vec<Option<Vec<u8>>> = Vec::with_capacity(values.len());
    let mut total = 0usize;
    for (row, value) in values.iter().enumerate() {
        match coerce_bytes(value) {
            Some(bytes) => {
                total += bytes.len();
                rendered.push(Some(bytes));
            }
            None => {
                scratch.set_null(row);
                rendered.push(None);
            }
        }
    }
    if total > i32::MAX as usize {
        return Err(EncodeError::PayloadTooLarge(total));
    }

    let mut offsets: Vec<i32> = Vec::with_capacity(values.len() + 1);
    offsets.push(0);
    let mut payload: Vec<u8> = Vec::with_capacity(total);
    for cell in &rendered {
        if let Some(bytes) = cell {
            payload.extend_from_slice(bytes);
        }
        offsets.push(payload.len() as i32);
    }

    let array = BinaryArray::try_new(
        OffsetBuffer::new(ScalarBuffer::from(offsets)),
        Buffer::from(payload),
        scratch.finish_validity(),
    )?;
    Ok(Arc::new(array))
}

fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(num) => {
            if let Some(n) = num.as_i64() {
                Some(n != 0)
            } else if let Some(n) = num.as_u64() {
                Some(n != 0)
            } else {
                num.as_f64().map(|f| f != 0.0)
            }
        }
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(num) => num.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| !f.is_nan()),
        _ => None,
    }
}

/// 64-bit integers keep full precision: numeric strings and in-range integral
/// floats coerce, everything else folds to null.
fn coerce_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(num) => {
            if let Some(n) = num.as_i64() {
                Some(n)
            } else if let Some(n) = num.as_u64() {
                i64::try_from(n).ok()
            } else {
                num.as_f64().and_then(f64_to_i64)
            }
        }
        Value::Bool(b) => Some(if *b { 1 } else { 0 }),
        Value::String(s) => {
            let trimmed = s.trim();
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().and_then(f64_to_i64))
        }
        _ => None,
    }
}

fn f64_to_i64(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

fn coerce_date_days(value: &Value) -> Option<i32> {
    match value {
        Value::Number(num) => num.as_i64().map(|n| n as i32),
        Value::String(s) => parse_date(s.trim()).map(days_since_epoch),
        _ => None,
    }
}

fn coerce_datetime_millis(value: &Value) -> Option<i64> {
    match value {
        Value::Number(num) => num.as_i64().or_else(|| num.as_f64().and_then(f64_to_i64)),
        Value::String(s) => parse_datetime_millis(s.trim()),
        _ => None,
    }
}

fn coerce_time_millis(value: &Value) -> Option<i32> {
    match value {
        Value::Number(num) => num.as_i64().map(|n| n as i32),
        Value::String(s) if !s.trim().is_empty() => Some(parse_time_millis(s.trim())),
        _ => None,
    }
}

fn days_since_epoch(date: NaiveDate) -> i32 {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
    date.signed_duration_since(epoch).num_days() as i32
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_datetime(raw).map(|dt| dt.date()))
}

fn parse_datetime_millis(raw: &str) -> Option<i64> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp_millis());
    }
    parse_datetime(raw).map(|dt| dt.and_utc().timestamp_millis())
}

fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Field-wise `HH:MM:SS[.fff]` parse. Missing or malformed fields default to
/// zero rather than failing the row.
fn parse_time_millis(raw: &str) -> i32 {
    let mut parts = raw.splitn(3, ':');
    let hours: i64 = parse_field(parts.next());
    let minutes: i64 = parse_field(parts.next());
    let (seconds, millis) = match parts.next() {
        Some(second_part) => {
            let mut split = second_part.splitn(2, '.');
            let whole: i64 = parse_field(split.next());
            let frac = split.next().map(frac_to_millis).unwrap_or(0);
            (whole, frac)
        }
        None => (0, 0),
    };
    (((hours * 3600 + minutes * 60 + seconds) * 1000) + millis) as i32
}

fn parse_field(field: Option<&str>) -> i64 {
    field.and_then(|f| f.trim().parse::<i64>().ok()).unwrap_or(0)
}

fn frac_to_millis(frac: &str) -> i64 {
    let mut digits: String = frac.chars().take_while(|c| c.is_ascii_digit()).take(3).collect();
    while digits.len() < 3 {
        digits.push('0');
    }
    digits.parse::<i64>().unwrap_or(0)
}

fn coerce_bytes(value: &Value) -> Option<Vec<u8>> {
    match value {
        // Column sources that transport binary as text send base64.
        Value::String(s) => BASE64.decode(s).ok(),
        Value::Array(items) => {
            let mut bytes = Vec::with_capacity(items.len());
            for item in items {
                let byte = item.as_u64().filter(|&b| b <= u8::MAX as u64)?;
                bytes.push(byte as u8);
            }
            Some(bytes)
        }
        _ => None,
    }
}

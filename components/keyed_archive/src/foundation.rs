//! Built-in reinterpretation of Foundation classes

use crate::error::{ArchiveError, Result};
use crate::interpreter::{ClassContext, ObjectFields};
use crate::value::ArchiveValue;

/// Reinterpret a Foundation object, or `None` if `class_name` is not a Foundation class
pub(crate) fn reinterpret(
    class_name: &str,
    fields: &ObjectFields,
    context: &ClassContext<'_>,
) -> Result<Option<ArchiveValue>> {
    let value = match class_name {
        "NSString" | "NSMutableString" => string(class_name, fields, context)?,
        "NSData" | "NSMutableData" => data(class_name, fields, context)?,
        "NSArray" | "NSMutableArray" | "NSSet" | "NSMutableSet" => {
            array(class_name, fields, context)?
        }
        "NSDictionary" | "NSMutableDictionary" => dictionary(class_name, fields, context)?,
        "NSDecimalNumberPlaceholder" => decimal(class_name, fields, context)?,
        "_NSKeyedCoderOldStyleArray" => old_style_array(class_name, fields, context)?,
        _ => return Ok(None),
    };
    Ok(Some(value))
}

fn string(class_name: &str, fields: &ObjectFields, context: &ClassContext<'_>) -> Result<ArchiveValue> {
    if let Some(bytes) = fields.get("NS.bytes").and_then(|v| context.bytes(v)) {
        let mut bytes = bytes;
        if bytes.last() == Some(&0) {
            bytes.pop();
        }
        return String::from_utf8(bytes)
            .map(ArchiveValue::String)
            .map_err(|_| ArchiveError::malformed(class_name, "NS.bytes is not valid UTF-8"));
    }
    fields
        .get("NS.string")
        .and_then(|v| context.string(v))
        .map(ArchiveValue::String)
        .ok_or_else(|| ArchiveError::malformed(class_name, "missing NS.bytes"))
}

fn data(class_name: &str, fields: &ObjectFields, context: &ClassContext<'_>) -> Result<ArchiveValue> {
    ["NS.data", "NS.bytes"]
        .iter()
        .find_map(|key| fields.get(key).and_then(|v| context.bytes(v)))
        .map(ArchiveValue::Data)
        .ok_or_else(|| ArchiveError::malformed(class_name, "missing NS.data"))
}

fn array(class_name: &str, fields: &ObjectFields, context: &ClassContext<'_>) -> Result<ArchiveValue> {
    if let Some(objects) = fields.get("NS.objects") {
        return context
            .array(objects)
            .map(ArchiveValue::Array)
            .ok_or_else(|| ArchiveError::malformed(class_name, "NS.objects is not an array"));
    }

    let mut items = Vec::new();
    while let Some(item) = fields.indexed("NS.object.", items.len()) {
        items.push(item.clone());
    }
    Ok(ArchiveValue::Array(items))
}

fn dictionary(
    class_name: &str,
    fields: &ObjectFields,
    context: &ClassContext<'_>,
) -> Result<ArchiveValue> {
    if let (Some(keys), Some(objects)) = (fields.get("NS.keys"), fields.get("NS.objects")) {
        let keys = context
            .array(keys)
            .ok_or_else(|| ArchiveError::malformed(class_name, "NS.keys is not an array"))?;
        let objects = context
            .array(objects)
            .ok_or_else(|| ArchiveError::malformed(class_name, "NS.objects is not an array"))?;
        if keys.len() != objects.len() {
            return Err(ArchiveError::malformed(
                class_name,
                format!("{} keys but {} objects", keys.len(), objects.len()),
            ));
        }
        return Ok(ArchiveValue::Map(keys.into_iter().zip(objects).collect()));
    }

    let mut entries = Vec::new();
    loop {
        let i = entries.len();
        match (fields.indexed("NS.key.", i), fields.indexed("NS.object.", i)) {
            (Some(key), Some(object)) => entries.push((key.clone(), object.clone())),
            _ => break,
        }
    }
    Ok(ArchiveValue::Map(entries))
}

fn decimal(class_name: &str, fields: &ObjectFields, context: &ClassContext<'_>) -> Result<ArchiveValue> {
    let integer = |key: &str| {
        fields
            .get(key)
            .and_then(|v| context.integer(v))
            .ok_or_else(|| ArchiveError::malformed(class_name, format!("missing {}", key)))
    };
    let length = integer("NS.length")?;
    let exponent = integer("NS.exponent")?;
    let byte_order = integer("NS.mantissa.bo")?;
    let negative = fields
        .get("NS.negative")
        .and_then(|v| context.boolean(v))
        .ok_or_else(|| ArchiveError::malformed(class_name, "missing NS.negative"))?;
    let mantissa = fields
        .get("NS.mantissa")
        .and_then(|v| context.bytes(v))
        .ok_or_else(|| ArchiveError::malformed(class_name, "missing NS.mantissa"))?;

    let length = usize::try_from(length)
        .map_err(|_| ArchiveError::malformed(class_name, "negative NS.length"))?;
    Ok(ArchiveValue::Real(decode_decimal(
        &mantissa,
        length,
        exponent,
        negative,
        byte_order == 1,
    )))
}

/// Reconstruct an `NSDecimal` from its 16-bit mantissa digits
///
/// `value = sign * sum(digit_i * 65536^i) * 10^exponent`. Digits are stored
/// little-endian when `little_endian` is set and byte-swapped otherwise.
pub fn decode_decimal(
    mantissa: &[u8],
    length: usize,
    exponent: i64,
    negative: bool,
    little_endian: bool,
) -> f64 {
    let mut value = 0.0;
    for (i, chunk) in mantissa.chunks(2).take(length).enumerate() {
        let raw = u16::from_le_bytes([chunk[0], chunk.get(1).copied().unwrap_or(0)]);
        let digit = if little_endian { raw } else { raw.swap_bytes() };
        value += digit as f64 * 65536f64.powi(i as i32);
    }
    value *= 10f64.powi(exponent.clamp(i32::MIN as i64, i32::MAX as i64) as i32);
    if negative {
        -value
    } else {
        value
    }
}

fn old_style_array(
    class_name: &str,
    fields: &ObjectFields,
    context: &ClassContext<'_>,
) -> Result<ArchiveValue> {
    let count = fields
        .get("NS.count")
        .and_then(|v| context.integer(v))
        .ok_or_else(|| ArchiveError::malformed(class_name, "missing NS.count"))?;
    let count = usize::try_from(count)
        .ok()
        .filter(|&count| count <= fields.len())
        .ok_or_else(|| ArchiveError::malformed(class_name, format!("NS.count {} exceeds its fields", count)))?;
    let items = (0..count)
        .map(|i| {
            fields
                .indexed("$", i)
                .cloned()
                .ok_or_else(|| ArchiveError::malformed(class_name, format!("missing element ${}", i)))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(ArchiveValue::Array(items))
}

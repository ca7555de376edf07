//! Structural validation of incoming book payloads.
//!
//! Checks run against the raw JSON value, before deserialization, so that every
//! missing or mistyped property is reported at once instead of stopping at the
//! first serde error.

use serde_json::{Map, Value};

use crate::store::Book;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyType {
    String,
    /// A JSON number with no fractional part that fits in `i64`, so `200.0` counts.
    Integer,
}

impl PropertyType {
    fn name(&self) -> &'static str {
        match self {
            PropertyType::String => "string",
            PropertyType::Integer => "integer",
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            PropertyType::String => value.is_string(),
            PropertyType::Integer => as_integer(value).is_some(),
        }
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    if let Some(integer) = value.as_i64() {
        return Some(integer);
    }

    // 2^63 itself is out of range, hence the exclusive upper bound.
    value
        .as_f64()
        .filter(|float| float.is_finite() && float.fract() == 0.0)
        .filter(|float| *float >= i64::MIN as f64 && *float < i64::MAX as f64)
        .map(|float| float as i64)
}

#[derive(Debug, Clone, Copy)]
pub struct Property {
    pub name: &'static str,
    pub property_type: PropertyType,
}

impl Property {
    const fn new(name: &'static str, property_type: PropertyType) -> Self {
        Self {
            name,
            property_type,
        }
    }
}

/// A fixed object schema where every declared property is required.
pub trait ObjectSchema {
    /// Properties in declaration order.
    const PROPERTIES: &'static [Property];

    /// Returns one violation per broken constraint. Empty means valid.
    ///
    /// Missing properties are reported first, then type mismatches, each group in
    /// declaration order.
    fn violations(candidate: &Value) -> Vec<String> {
        match candidate.as_object() {
            Some(object) => object_violations(Self::PROPERTIES, object),
            None => vec!["instance is not of a type(s) object".to_string()],
        }
    }

    /// Rewrites integral floats such as `200.0` of integer properties as `i64`,
    /// so a candidate without violations deserializes into integer fields.
    fn normalize(candidate: &mut Value) {
        let Some(object) = candidate.as_object_mut() else {
            return;
        };

        for property in Self::PROPERTIES
            .iter()
            .filter(|property| property.property_type == PropertyType::Integer)
        {
            if let Some(value) = object.get_mut(property.name) {
                if let Some(integer) = as_integer(value) {
                    *value = Value::from(integer);
                }
            }
        }
    }
}

fn object_violations(properties: &[Property], object: &Map<String, Value>) -> Vec<String> {
    let missing = properties
        .iter()
        .filter(|property| !object.contains_key(property.name))
        .map(|property| format!("instance requires property \"{}\"", property.name));

    let mistyped = properties
        .iter()
        .filter_map(|property| {
            object
                .get(property.name)
                .filter(|value| !property.property_type.matches(value))
                .map(|_| property)
        })
        .map(|property| {
            format!(
                "instance.{} is not of a type(s) {}",
                property.name,
                property.property_type.name()
            )
        });

    missing.chain(mistyped).collect()
}

impl ObjectSchema for Book {
    const PROPERTIES: &'static [Property] = &[
        Property::new("isbn", PropertyType::String),
        Property::new("amazon_url", PropertyType::String),
        Property::new("author", PropertyType::String),
        Property::new("language", PropertyType::String),
        Property::new("pages", PropertyType::Integer),
        Property::new("publisher", PropertyType::String),
        Property::new("title", PropertyType::String),
        Property::new("year", PropertyType::Integer),
    ];
}

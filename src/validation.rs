//! Event and collection validation.
//!
//! Runs synchronously inside [`add_event`](crate::HatariClient::add_event),
//! before anything is composed or queued. Rules are checked in order and the
//! first violation is returned:
//!
//! ```text
//! Rule                                        | Scope        | Error
//! --------------------------------------------|--------------|------------------
//! collection non-empty, no leading '$', ≤ 256 | collection   | InvalidCollection
//! event non-empty                             | top level    | InvalidEvent
//! no reserved "hatari" key                    | top level    | InvalidEvent
//! key: no '.', no leading '$', ≤ 256          | every depth  | InvalidEvent
//! string value < 10,000 characters            | every depth  | InvalidEvent
//! ```
//!
//! Lengths are counted in characters, not bytes. Mappings and strings nested
//! inside lists are checked as well.

use crate::error::{HatariError, HatariResult};
use crate::event::{Event, PropertyValue};
use crate::METADATA_KEY;

/// Longest allowed collection or property name
pub const MAX_NAME_LENGTH: usize = 256;

/// String values must be strictly shorter than this
pub const MAX_STRING_VALUE_LENGTH: usize = 10_000;

/// Validate a collection name and the event destined for it.
pub fn validate(collection: &str, event: &Event) -> HatariResult<()> {
    validate_collection(collection)?;
    validate_event(event)
}

/// Validate an event collection name.
pub fn validate_collection(collection: &str) -> HatariResult<()> {
    if collection.is_empty() {
        return Err(HatariError::InvalidCollection(
            "you must specify a non-empty event collection".into(),
        ));
    }
    if collection.starts_with('$') {
        return Err(HatariError::InvalidCollection(
            "an event collection name cannot start with the dollar sign ($) character".into(),
        ));
    }
    if collection.chars().count() > MAX_NAME_LENGTH {
        return Err(HatariError::InvalidCollection(format!(
            "an event collection name cannot be longer than {} characters",
            MAX_NAME_LENGTH
        )));
    }
    Ok(())
}

/// Validate an event's structure, property names and string values.
pub fn validate_event(event: &Event) -> HatariResult<()> {
    if event.is_empty() {
        return Err(HatariError::InvalidEvent(
            "you must specify a non-empty event".into(),
        ));
    }
    if event.contains_key(METADATA_KEY) {
        return Err(HatariError::InvalidEvent(format!(
            "an event cannot contain a root-level property named '{}'",
            METADATA_KEY
        )));
    }
    validate_properties(event)
}

fn validate_properties(properties: &Event) -> HatariResult<()> {
    for (key, value) in properties {
        validate_key(key)?;
        validate_value(value)?;
    }
    Ok(())
}

fn validate_key(key: &str) -> HatariResult<()> {
    if key.contains('.') {
        return Err(HatariError::InvalidEvent(format!(
            "property '{}' contains the period (.) character",
            key
        )));
    }
    if key.starts_with('$') {
        return Err(HatariError::InvalidEvent(format!(
            "property '{}' starts with the dollar sign ($) character",
            key
        )));
    }
    if key.chars().count() > MAX_NAME_LENGTH {
        return Err(HatariError::InvalidEvent(format!(
            "an event cannot contain a property name longer than {} characters",
            MAX_NAME_LENGTH
        )));
    }
    Ok(())
}

fn validate_value(value: &PropertyValue) -> HatariResult<()> {
    match value {
        PropertyValue::String(s) => {
            if s.chars().count() >= MAX_STRING_VALUE_LENGTH {
                return Err(HatariError::InvalidEvent(format!(
                    "an event cannot contain a string property value of {} characters or more",
                    MAX_STRING_VALUE_LENGTH
                )));
            }
            Ok(())
        }
        PropertyValue::Map(nested) => validate_properties(nested),
        PropertyValue::List(items) => items.iter().try_for_each(validate_value),
        PropertyValue::Number(_) | PropertyValue::Boolean(_) | PropertyValue::Timestamp(_) => {
            Ok(())
        }
    }
}

//! Event composition.
//!
//! Turns a validated [`Event`] into the outbound [`ComposedPayload`] by adding
//! the metadata block and merging global properties.
//!
//! # Precedence
//!
//! ```text
//! lowest   static global properties     set_global_properties()
//!    │     evaluator output             set_global_properties_evaluator()
//!    ▼     caller event                 add_event()
//! highest  "hatari" metadata block      overrides + generated timestamp
//! ```
//!
//! The metadata block is only listed last because the validator already keeps
//! the reserved key out of caller events; it can only collide with a global
//! property, and in that case the metadata block is kept.

use crate::event::{ComposedPayload, Event};
use crate::{METADATA_KEY, TIMESTAMP_KEY};
use chrono::Utc;
use std::fmt;
use std::sync::Arc;

/// Computes global properties for an event collection.
///
/// Invoked once per event, at composition time, with the collection the event
/// is being added to. Any `Fn(&str) -> Option<Event>` closure works:
///
/// ```rust,ignore
/// client.set_global_properties_evaluator(|collection: &str| {
///     let mut props = Event::new();
///     props.insert("collection_seen".into(), collection.into());
///     Some(props)
/// });
/// ```
pub trait GlobalPropertiesEvaluator: Send + Sync {
    fn global_properties(&self, collection: &str) -> Option<Event>;
}

impl<F> GlobalPropertiesEvaluator for F
where
    F: Fn(&str) -> Option<Event> + Send + Sync,
{
    fn global_properties(&self, collection: &str) -> Option<Event> {
        self(collection)
    }
}

/// Enrichment applied to every event a client composes.
#[derive(Clone, Default)]
pub struct GlobalProperties {
    static_properties: Option<Event>,
    evaluator: Option<Arc<dyn GlobalPropertiesEvaluator>>,
}

impl GlobalProperties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the static mapping merged into every event
    pub fn with_static(mut self, properties: Event) -> Self {
        self.static_properties = Some(properties);
        self
    }

    /// Set the per-collection evaluator
    pub fn with_evaluator(mut self, evaluator: Arc<dyn GlobalPropertiesEvaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    pub fn static_properties(&self) -> Option<&Event> {
        self.static_properties.as_ref()
    }

    pub fn evaluator(&self) -> Option<Arc<dyn GlobalPropertiesEvaluator>> {
        self.evaluator.clone()
    }

    pub(crate) fn set_static(&mut self, properties: Option<Event>) {
        self.static_properties = properties;
    }

    pub(crate) fn set_evaluator(&mut self, evaluator: Option<Arc<dyn GlobalPropertiesEvaluator>>) {
        self.evaluator = evaluator;
    }
}

impl fmt::Debug for GlobalProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalProperties")
            .field("static_properties", &self.static_properties)
            .field("evaluator", &self.evaluator.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// Build the outbound payload for an already validated event.
///
/// `overrides` replaces the default metadata block; a `timestamp` entry is
/// added with the current instant unless the overrides already carry one.
/// The caller's event is cloned, never modified. A panicking evaluator
/// propagates to the caller.
pub fn compose(
    globals: &GlobalProperties,
    collection: &str,
    event: &Event,
    overrides: Option<Event>,
) -> ComposedPayload {
    let mut metadata = overrides.unwrap_or_default();
    metadata
        .entry(TIMESTAMP_KEY.to_string())
        .or_insert_with(|| Utc::now().into());

    let mut payload = Event::new();

    if let Some(static_properties) = &globals.static_properties {
        payload.extend(
            static_properties
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
    }

    if let Some(evaluator) = &globals.evaluator {
        if let Some(dynamic) = evaluator.global_properties(collection) {
            payload.extend(dynamic);
        }
    }

    payload.insert(METADATA_KEY.to_string(), metadata.into());
    payload.extend(event.iter().map(|(k, v)| (k.clone(), v.clone())));

    ComposedPayload::new(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::PropertyValue;
    use chrono::{Duration, TimeZone};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn props(pairs: &[(&str, i64)]) -> Event {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), PropertyValue::from(*v)))
            .collect()
    }

    fn without_metadata(payload: &ComposedPayload) -> Event {
        let mut properties = payload.properties().clone();
        properties.remove(METADATA_KEY);
        properties
    }

    #[test]
    fn test_precedence() {
        let globals = GlobalProperties::new()
            .with_static(props(&[("a", 1)]))
            .with_evaluator(Arc::new(|_: &str| Some(props(&[("a", 2), ("b", 2)]))));
        let event = props(&[("b", 3), ("c", 3)]);

        let payload = compose(&globals, "purchases", &event, None);

        assert_eq!(without_metadata(&payload), props(&[("a", 2), ("b", 3), ("c", 3)]));
        assert!(payload.metadata().is_some());
    }

    #[test]
    fn test_no_globals() {
        let event = props(&[("x", 1)]);
        let payload = compose(&GlobalProperties::new(), "purchases", &event, None);

        assert_eq!(payload.properties().len(), 2);
        assert_eq!(without_metadata(&payload), event);
    }

    #[test]
    fn test_evaluator_receives_collection() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let calls = Arc::new(AtomicUsize::new(0));
        let evaluator = {
            let seen = seen.clone();
            let calls = calls.clone();
            move |collection: &str| -> Option<Event> {
                calls.fetch_add(1, Ordering::SeqCst);
                seen.lock().unwrap().push(collection.to_string());
                None
            }
        };
        let globals = GlobalProperties::new().with_evaluator(Arc::new(evaluator));

        compose(&globals, "signups", &props(&[("x", 1)]), None);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(*seen.lock().unwrap(), vec!["signups".to_string()]);
    }

    #[test]
    fn test_override_timestamp_kept() {
        let ts = Utc.with_ymd_and_hms(2020, 5, 17, 8, 30, 0).unwrap();
        let mut overrides = Event::new();
        overrides.insert(TIMESTAMP_KEY.into(), ts.into());
        overrides.insert("source".into(), "import".into());

        let payload = compose(&GlobalProperties::new(), "c", &props(&[("x", 1)]), Some(overrides));

        assert_eq!(payload.timestamp(), Some(&ts));
        let metadata = payload.metadata().unwrap();
        assert_eq!(metadata.get("source").and_then(PropertyValue::as_str), Some("import"));
    }

    #[test]
    fn test_default_timestamp_is_now() {
        let before = Utc::now();
        let payload = compose(&GlobalProperties::new(), "c", &props(&[("x", 1)]), None);
        let after = Utc::now();

        let ts = *payload.timestamp().unwrap();
        assert!(ts >= before - Duration::seconds(1));
        assert!(ts <= after + Duration::seconds(1));
    }

    #[test]
    fn test_overrides_without_timestamp_get_one() {
        let mut overrides = Event::new();
        overrides.insert("source".into(), "import".into());

        let payload = compose(&GlobalProperties::new(), "c", &props(&[("x", 1)]), Some(overrides));
        assert!(payload.timestamp().is_some());
        assert_eq!(payload.metadata().unwrap().len(), 2);
    }

    #[test]
    fn test_metadata_wins_over_global_property_collision() {
        let mut statics = Event::new();
        statics.insert(METADATA_KEY.into(), "shadow".into());
        let globals = GlobalProperties::new().with_static(statics);

        let payload = compose(&globals, "c", &props(&[("x", 1)]), None);
        assert!(payload.metadata().is_some());
    }

    #[test]
    fn test_caller_event_not_mutated() {
        let event = props(&[("x", 1)]);
        let snapshot = event.clone();
        let globals = GlobalProperties::new().with_static(props(&[("g", 1)]));

        let _ = compose(&globals, "c", &event, None);
        assert_eq!(event, snapshot);
    }

    #[test]
    fn test_composition_is_idempotent_apart_from_timestamp() {
        let globals = GlobalProperties::new()
            .with_static(props(&[("a", 1)]))
            .with_evaluator(Arc::new(|_: &str| Some(props(&[("b", 2)]))));
        let event = props(&[("c", 3)]);

        let first = compose(&globals, "c", &event, None);
        let second = compose(&globals, "c", &event, None);
        assert_eq!(without_metadata(&first), without_metadata(&second));

        let ts = Utc::now();
        let mut overrides = Event::new();
        overrides.insert(TIMESTAMP_KEY.into(), ts.into());
        assert_eq!(
            compose(&globals, "c", &event, Some(overrides.clone())),
            compose(&globals, "c", &event, Some(overrides))
        );
    }

    #[test]
    #[should_panic(expected = "evaluator failed")]
    fn test_evaluator_panic_propagates() {
        let globals = GlobalProperties::new()
            .with_evaluator(Arc::new(|_: &str| -> Option<Event> { panic!("evaluator failed") }));
        compose(&globals, "c", &props(&[("x", 1)]), None);
    }
}

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{Id, Level, Subscriber};
use tracing_subscriber::{Layer, layer::Context, registry::LookupSpan};

/// One captured log event
#[derive(Debug, Clone, Serialize)]
pub struct CapturedEvent {
    pub level: String,
    pub target: String,
    pub message: String,
    /// Event fields plus the fields of every enclosing span
    pub fields: HashMap<String, serde_json::Value>,
}

impl CapturedEvent {
    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        self.fields.get(name)
    }

    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(|v| v.as_str())
    }
}

/// Shared storage for captured events
#[derive(Debug, Clone, Default)]
pub struct CapturedEvents {
    events: Arc<RwLock<Vec<CapturedEvent>>>,
}

impl CapturedEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every event captured so far
    pub fn all(&self) -> Vec<CapturedEvent> {
        self.events.read().map(|events| events.clone()).unwrap_or_default()
    }

    /// Events at exactly `level`
    pub fn at_level(&self, level: Level) -> Vec<CapturedEvent> {
        let level = level.to_string();
        self.all().into_iter().filter(|e| e.level == level).collect()
    }

    /// Whether any event at `level` has a message containing `needle`
    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.at_level(level).iter().any(|e| e.message.contains(needle))
    }

    pub fn len(&self) -> usize {
        self.events.read().map(|events| events.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.write() {
            events.clear();
        }
    }

    fn push(&self, event: CapturedEvent) {
        if let Ok(mut events) = self.events.write() {
            events.push(event);
        }
    }
}

/// A tracing layer that records events in memory
pub struct CaptureLayer {
    storage: CapturedEvents,
}

impl CaptureLayer {
    pub fn new(storage: CapturedEvents) -> Self {
        Self { storage }
    }
}

#[derive(Clone, Default)]
struct SpanFields(HashMap<String, serde_json::Value>);

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &tracing::span::Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut visitor = JsonVisitor::default();
        attrs.record(&mut visitor);

        // Inherit parent fields unless overridden
        let mut fields = span
            .parent()
            .and_then(|parent| parent.extensions().get::<SpanFields>().cloned())
            .unwrap_or_default();
        fields.0.extend(visitor.0);

        span.extensions_mut().insert(fields);
    }

    fn on_record(&self, id: &Id, values: &tracing::span::Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut extensions = span.extensions_mut();
        if let Some(fields) = extensions.get_mut::<SpanFields>() {
            let mut visitor = JsonVisitor::default();
            values.record(&mut visitor);
            fields.0.extend(visitor.0);
        }
    }

    fn on_event(&self, event: &tracing::Event<'_>, ctx: Context<'_, S>) {
        let mut fields = ctx
            .event_span(event)
            .and_then(|span| span.extensions().get::<SpanFields>().cloned())
            .unwrap_or_default()
            .0;

        let mut visitor = JsonVisitor::default();
        event.record(&mut visitor);
        fields.extend(visitor.0);

        let message = match fields.remove("message") {
            Some(serde_json::Value::String(message)) => message,
            Some(other) => other.to_string(),
            None => String::new(),
        };

        let metadata = event.metadata();
        self.storage.push(CapturedEvent {
            level: metadata.level().to_string(),
            target: metadata.target().to_string(),
            message,
            fields,
        });
    }
}

#[derive(Default)]
struct JsonVisitor(HashMap<String, serde_json::Value>);

impl tracing::field::Visit for JsonVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0.insert(field.name().to_string(), serde_json::Value::String(format!("{value:?}")));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.insert(field.name().to_string(), serde_json::Value::String(value.to_string()));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.0.insert(field.name().to_string(), serde_json::Value::Bool(value));
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_f64(&mut self, field: &tracing::field::Field, value: f64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_error(
        &mut self,
        field: &tracing::field::Field,
        value: &(dyn std::error::Error + 'static),
    ) {
        self.0.insert(field.name().to_string(), serde_json::Value::String(value.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::layer::SubscriberExt;

    #[test]
    fn captures_events_with_span_fields() {
        let events = CapturedEvents::new();
        let subscriber = tracing_subscriber::registry().with(CaptureLayer::new(events.clone()));

        tracing::subscriber::with_default(subscriber, || {
            let span = tracing::info_span!("search", query_id = 7_u64);
            let _guard = span.enter();
            tracing::warn!(stage = "lexical", elapsed_ms = 12_u64, "stage degraded");
            tracing::debug!("detail");
        });

        assert_eq!(events.len(), 2);
        let warnings = events.at_level(Level::WARN);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].message, "stage degraded");
        assert_eq!(warnings[0].field_str("stage"), Some("lexical"));
        assert_eq!(warnings[0].field("elapsed_ms"), Some(&serde_json::json!(12)));
        assert_eq!(warnings[0].field("query_id"), Some(&serde_json::json!(7)));
        assert!(events.contains(Level::DEBUG, "detail"));

        events.clear();
        assert!(events.is_empty());
    }

    #[test]
    fn display_fields_are_strings() {
        let events = CapturedEvents::new();
        let subscriber = tracing_subscriber::registry().with(CaptureLayer::new(events.clone()));

        tracing::subscriber::with_default(subscriber, || {
            let error = "boom";
            tracing::error!(error = %error, "failed");
        });

        let captured = events.all();
        assert_eq!(captured[0].level, "ERROR");
        assert_eq!(captured[0].field_str("error"), Some("boom"));
    }
}

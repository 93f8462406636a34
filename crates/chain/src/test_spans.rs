//! Span capture for asserting on resolution instrumentation.

use std::{
    collections::BTreeMap,
    fmt,
    sync::{Arc, Mutex},
};
use tracing::{
    field::{Field, Visit},
    span::{Attributes, Id, Record},
    subscriber::{set_default, DefaultGuard},
    Subscriber,
};
use tracing_subscriber::{
    layer::{Context, SubscriberExt},
    registry::LookupSpan,
    Layer,
};

/// A recorded span, with the span it was opened in.
#[derive(Debug, Clone)]
pub(crate) struct SpanRecord {
    pub(crate) name: &'static str,
    parent: Option<usize>,
    fields: BTreeMap<&'static str, String>,
}

impl SpanRecord {
    /// Recorded value of field `name`, formatted with `Display` where the
    /// span used `%`.
    pub(crate) fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

struct FieldValues<'a>(&'a mut BTreeMap<&'static str, String>);

impl Visit for FieldValues<'_> {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.0.insert(field.name(), format!("{value:?}"));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name(), value.to_string());
    }
}

/// Position of a span's record, kept in the span's extensions.
#[derive(Debug, Clone, Copy)]
struct RecordIndex(usize);

/// Layer recording every span opened while it is the default subscriber.
///
/// Parents are tracked by record position rather than span id, since the
/// registry reuses ids once a span closes.
#[derive(Debug, Clone, Default)]
pub(crate) struct SpanCollector {
    spans: Arc<Mutex<Vec<SpanRecord>>>,
}

impl SpanCollector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Installs the collector for the current thread until the guard drops.
    pub(crate) fn as_default(&self) -> DefaultGuard {
        set_default(tracing_subscriber::registry().with(self.clone()))
    }

    /// Every span named `name`, in the order they were opened.
    pub(crate) fn spans(&self, name: &str) -> Vec<SpanRecord> {
        self.spans
            .lock()
            .unwrap()
            .iter()
            .filter(|span| span.name == name)
            .cloned()
            .collect()
    }

    /// The span `span` was opened in.
    pub(crate) fn parent_of(&self, span: &SpanRecord) -> Option<SpanRecord> {
        let parent = span.parent?;
        self.spans.lock().unwrap().get(parent).cloned()
    }
}

impl<S> Layer<S> for SpanCollector
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else { return };
        let parent = span
            .parent()
            .and_then(|parent| parent.extensions().get::<RecordIndex>().map(|index| index.0));

        let mut fields = BTreeMap::new();
        attrs.record(&mut FieldValues(&mut fields));

        let mut spans = self.spans.lock().unwrap();
        span.extensions_mut().insert(RecordIndex(spans.len()));
        spans.push(SpanRecord {
            name: attrs.metadata().name(),
            parent,
            fields,
        });
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        let Some(index) = ctx
            .span(id)
            .and_then(|span| span.extensions().get::<RecordIndex>().copied())
        else {
            return;
        };
        if let Some(record) = self.spans.lock().unwrap().get_mut(index.0) {
            values.record(&mut FieldValues(&mut record.fields));
        }
    }
}

//! Turning raw log records into domain messages.
//!
//! Each record goes through parse → resolve → decode → construct → cache.
//! Any failing stage drops that one record; the enclosing stream carries on.

use crate::cache::{MessageCaches, PayloadCache};
use msgscope_core::architecture::{ArchitectureLookup, Component, Port};
use msgscope_core::codec::PayloadCodec;
use msgscope_core::error::ScopeError;
use msgscope_core::msg::Msg;
use msgscope_core::record::{FIELD_DATA, FIELD_DST, FIELD_SRC, FIELD_TIMESTAMP, LogEntry, RawRecord};
use msgscope_core::session::Session;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Why a record could not become a message.
#[derive(Error, Debug, Clone)]
pub enum RecordError {
    #[error("missing field '{0}'")]
    MissingField(&'static str),

    #[error("field '{field}' is not an integer: '{value}'")]
    NotAnInteger { field: &'static str, value: String },

    #[error("field '{field}' names unknown port {id}")]
    UnknownPort { field: &'static str, id: u32 },

    #[error("port {0} has no owning component")]
    UnknownBridge(u32),

    #[error("payload could not be decoded: {0}")]
    Payload(ScopeError),
}

/// Outcome of transforming one record.
#[derive(Debug)]
pub enum Transformed<P> {
    /// A valid message to emit.
    Msg(Arc<Msg<P>>),
    /// The record is malformed and is left out of the output.
    Dropped,
    /// The record is the session's stop sentinel.
    Stop,
}

/// The record-to-message pipeline stage shared by every stream.
pub struct RecordTransformer<P> {
    architecture: Arc<dyn ArchitectureLookup>,
    codec: Arc<dyn PayloadCodec<P>>,
    payloads: Arc<PayloadCache<P>>,
    messages: Arc<MessageCaches<P>>,
}

impl<P> RecordTransformer<P>
where
    P: Send + Sync + 'static,
{
    pub fn new(
        architecture: Arc<dyn ArchitectureLookup>,
        codec: Arc<dyn PayloadCodec<P>>,
        payloads: Arc<PayloadCache<P>>,
        messages: Arc<MessageCaches<P>>,
    ) -> Self {
        Self {
            architecture,
            codec,
            payloads,
            messages,
        }
    }

    /// Transforms one record of `session`.
    ///
    /// The stop sentinel is recognised before anything else. A cached message
    /// for `(session, id)` is returned as-is without touching the codec or the
    /// architecture. Malformed records are logged and reported as
    /// [`Transformed::Dropped`].
    pub fn transform(&self, session: &Session, entry: &LogEntry) -> Transformed<P> {
        if entry.record.is_stop() {
            tracing::debug!(%session, id = %entry.id, "Reached stop record");
            return Transformed::Stop;
        }

        if let Some(msg) = self.messages.get(session, entry.id) {
            return Transformed::Msg(msg);
        }

        match self.build(entry) {
            Ok(msg) => {
                let msg = Arc::new(msg);
                self.messages.put(session, entry.id, Arc::clone(&msg));
                Transformed::Msg(msg)
            }
            Err(e) => {
                tracing::error!(
                    %session,
                    id = %entry.id,
                    record = ?entry.record.fields(),
                    "Dropping record: {}",
                    e
                );
                Transformed::Dropped
            }
        }
    }

    /// Builds a message from a record, bypassing the message cache.
    pub fn build(&self, entry: &LogEntry) -> Result<Msg<P>, RecordError> {
        let record = &entry.record;

        let timestamp: i64 = parse_field(record, FIELD_TIMESTAMP)?;
        let src = self.resolve_port(record, FIELD_SRC)?;
        let dst = self.resolve_port(record, FIELD_DST)?;
        let src_bridge = self.resolve_bridge(&src)?;
        let dst_bridge = self.resolve_bridge(&dst)?;

        let data = record.get(FIELD_DATA).unwrap_or("");
        let payload = self
            .payloads
            .get_or_decode(data, |raw| self.codec.deserialize(raw))
            .map_err(RecordError::Payload)?;

        Ok(Msg {
            src,
            dst,
            src_bridge,
            dst_bridge,
            payload,
            timestamp,
            id: entry.id,
        })
    }

    fn resolve_port(&self, record: &RawRecord, field: &'static str) -> Result<Port, RecordError> {
        let id: u32 = parse_field(record, field)?;
        self.architecture
            .port(id)
            .ok_or(RecordError::UnknownPort { field, id })
    }

    fn resolve_bridge(&self, port: &Port) -> Result<Component, RecordError> {
        self.architecture
            .bridge(port)
            .ok_or(RecordError::UnknownBridge(port.id))
    }
}

fn parse_field<T: FromStr>(record: &RawRecord, field: &'static str) -> Result<T, RecordError> {
    let value = record.get(field).ok_or(RecordError::MissingField(field))?;
    value.parse().map_err(|_| RecordError::NotAnInteger {
        field,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use msgscope_core::record::{FIELD_STOP, RecordId};
    use msgscope_core::Result;
    use msgscope_infrastructure::StaticArchitecture;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Decodes integers and counts how often it is asked to.
    #[derive(Default)]
    struct CountingCodec {
        calls: AtomicUsize,
    }

    impl PayloadCodec<i64> for CountingCodec {
        fn serialize(&self, payload: &i64) -> Result<String> {
            Ok(payload.to_string())
        }

        fn deserialize(&self, raw: &str) -> Result<i64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            raw.parse()
                .map_err(|_| ScopeError::codec(format!("not an integer payload: '{}'", raw)))
        }
    }

    struct Fixture {
        transformer: RecordTransformer<i64>,
        codec: Arc<CountingCodec>,
        messages: Arc<MessageCaches<i64>>,
    }

    fn fixture() -> Fixture {
        let architecture = StaticArchitecture::new()
            .with_component(0, "sensor", &[(0, "out")])
            .unwrap()
            .with_component(1, "display", &[(1, "in")])
            .unwrap();
        let codec = Arc::new(CountingCodec::default());
        let payloads = Arc::new(PayloadCache::new(1_000_000, Duration::from_secs(60)));
        let messages = Arc::new(MessageCaches::new(64, Duration::from_secs(60), 8));

        Fixture {
            transformer: RecordTransformer::new(
                Arc::new(architecture),
                codec.clone(),
                payloads,
                messages.clone(),
            ),
            codec,
            messages,
        }
    }

    fn entry(id: RecordId, fields: &[(&str, &str)]) -> LogEntry {
        LogEntry::new(id, fields.iter().copied().collect())
    }

    fn good(id: RecordId, data: &str) -> LogEntry {
        let ts = id.timestamp().to_string();
        entry(
            id,
            &[("timestamp", ts.as_str()), ("src", "0"), ("dst", "1"), ("data", data)],
        )
    }

    fn expect_msg(outcome: Transformed<i64>) -> Arc<Msg<i64>> {
        match outcome {
            Transformed::Msg(msg) => msg,
            other => panic!("expected a message, got {:?}", other),
        }
    }

    #[test]
    fn test_builds_message_from_well_formed_record() {
        let f = fixture();
        let session = Session::from(1);
        let id = RecordId::new(1000, 0);

        let msg = expect_msg(f.transformer.transform(&session, &good(id, "5")));

        assert_eq!(msg.id, id);
        assert_eq!(msg.timestamp, 1000);
        assert_eq!(msg.src.name, "out");
        assert_eq!(msg.dst.name, "in");
        assert_eq!(msg.src_bridge.name, "sensor");
        assert_eq!(msg.dst_bridge.name, "display");
        assert_eq!(*msg.payload, 5);
        assert!(f.messages.get(&session, id).is_some());
    }

    #[test]
    fn test_stop_record_is_never_a_message() {
        let f = fixture();
        let stop = entry(
            RecordId::new(2000, 0),
            &[("timestamp", "2000"), (FIELD_STOP, "shutdown")],
        );

        assert!(matches!(
            f.transformer.transform(&Session::from(1), &stop),
            Transformed::Stop
        ));
        assert_eq!(f.codec.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_cached_message_skips_codec() {
        let f = fixture();
        let session = Session::from(1);
        let record = good(RecordId::new(1000, 0), "5");

        let first = expect_msg(f.transformer.transform(&session, &record));
        let second = expect_msg(f.transformer.transform(&session, &record));

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(f.codec.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_rebuild_after_eviction_is_identical() {
        let f = fixture();
        let session = Session::from(1);
        let record = good(RecordId::new(1000, 0), "5");

        let cached = expect_msg(f.transformer.transform(&session, &record));
        f.messages.evict(&session);
        let rebuilt = expect_msg(f.transformer.transform(&session, &record));

        assert!(!Arc::ptr_eq(&cached, &rebuilt));
        assert_eq!(*cached, *rebuilt);
        // The payload cache still holds "5".
        assert_eq!(f.codec.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_identical_payloads_decode_once_across_sessions() {
        let f = fixture();
        f.transformer
            .transform(&Session::from(1), &good(RecordId::new(1000, 0), "9"));
        f.transformer
            .transform(&Session::from(2), &good(RecordId::new(3000, 0), "9"));

        assert_eq!(f.codec.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_malformed_fields_are_dropped() {
        let f = fixture();
        let session = Session::from(1);
        let id = RecordId::new(1000, 0);

        let cases: Vec<Vec<(&str, &str)>> = vec![
            vec![("src", "0"), ("dst", "1"), ("data", "1")],
            vec![("timestamp", "soon"), ("src", "0"), ("dst", "1"), ("data", "1")],
            vec![("timestamp", "1"), ("src", "abc"), ("dst", "1"), ("data", "1")],
            vec![("timestamp", "1"), ("src", "0"), ("dst", "-1"), ("data", "1")],
            vec![("timestamp", "1"), ("src", "0"), ("dst", "42"), ("data", "1")],
            vec![("timestamp", "1"), ("src", "0"), ("dst", "1"), ("data", "{oops")],
            vec![("timestamp", "1"), ("src", "0"), ("dst", "1")],
        ];

        for fields in cases {
            let outcome = f.transformer.transform(&session, &entry(id, &fields));
            assert!(
                matches!(outcome, Transformed::Dropped),
                "expected {:?} to be dropped",
                fields
            );
        }
        assert!(f.messages.get(&session, id).is_none());
    }

    #[test]
    fn test_build_reports_failing_stage() {
        let f = fixture();
        let id = RecordId::new(1000, 0);

        let err = f
            .transformer
            .build(&entry(id, &[("timestamp", "1"), ("src", "abc"), ("dst", "1")]))
            .unwrap_err();
        assert!(matches!(err, RecordError::NotAnInteger { field: "src", .. }));

        let err = f
            .transformer
            .build(&entry(id, &[("timestamp", "1"), ("src", "7"), ("dst", "1")]))
            .unwrap_err();
        assert!(matches!(err, RecordError::UnknownPort { field: "src", id: 7 }));

        let err = f
            .transformer
            .build(&entry(id, &[("timestamp", "1"), ("src", "0"), ("dst", "1"), ("data", "x")]))
            .unwrap_err();
        assert!(matches!(err, RecordError::Payload(_)));
    }
}

//! Domain messages reconstructed from log records.

use crate::architecture::{Component, Port};
use crate::record::RecordId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One message observed flowing between two ports.
///
/// Messages are immutable once built. The payload is shared with the payload
/// cache, so identical payloads across records and sessions point at the same
/// decoded value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Msg<P> {
    pub src: Port,
    pub dst: Port,
    pub src_bridge: Component,
    pub dst_bridge: Component,
    pub payload: Arc<P>,
    /// Milliseconds; absolute unless projected with [`Msg::relative_to`].
    pub timestamp: i64,
    pub id: RecordId,
}

impl<P> Msg<P> {
    /// A copy of this message with its timestamp measured from `start`.
    pub fn relative_to(&self, start: i64) -> Msg<P> {
        Msg {
            src: self.src.clone(),
            dst: self.dst.clone(),
            src_bridge: self.src_bridge.clone(),
            dst_bridge: self.dst_bridge.clone(),
            payload: Arc::clone(&self.payload),
            timestamp: self.timestamp - start,
            id: self.id,
        }
    }
}

/// A payload to push into a running session through one of its ports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Injection<P> {
    pub bridge: Component,
    pub port: Port,
    pub payload: P,
}

impl<P> Injection<P> {
    pub fn new(bridge: Component, port: Port, payload: P) -> Self {
        Self {
            bridge,
            port,
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_to_shifts_only_the_timestamp() {
        let port = Port {
            id: 1,
            name: "out".to_string(),
            component: 0,
        };
        let bridge = Component {
            id: 0,
            name: "sensor".to_string(),
        };
        let msg = Msg {
            src: port.clone(),
            dst: port,
            src_bridge: bridge.clone(),
            dst_bridge: bridge,
            payload: Arc::new(42u32),
            timestamp: 1_500,
            id: RecordId::new(1_500, 0),
        };

        let relative = msg.relative_to(1_000);
        assert_eq!(relative.timestamp, 500);
        assert_eq!(relative.id, msg.id);
        assert!(Arc::ptr_eq(&relative.payload, &msg.payload));
    }
}

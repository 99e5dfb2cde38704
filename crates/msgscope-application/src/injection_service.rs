use msgscope_core::codec::PayloadCodec;
use msgscope_core::error::Result;
use msgscope_core::keys;
use msgscope_core::msg::Injection;
use msgscope_core::session::Session;
use msgscope_core::store::PubSub;
use std::sync::Arc;

/// Pushes payloads into a running session through its injection channel.
pub struct InjectionService<P> {
    pubsub: Arc<dyn PubSub>,
    codec: Arc<dyn PayloadCodec<P>>,
}

impl<P> InjectionService<P> {
    pub fn new(pubsub: Arc<dyn PubSub>, codec: Arc<dyn PayloadCodec<P>>) -> Self {
        Self { pubsub, codec }
    }

    /// Publishes `"{bridge},{port},{payload}"` on the session's injection
    /// channel.
    ///
    /// # Returns
    ///
    /// The number of listeners that received the injection.
    pub async fn inject(&self, session: &Session, injection: &Injection<P>) -> Result<usize> {
        let payload = self.codec.serialize(&injection.payload)?;
        let channel = keys::injection_channel(session);
        let message = format!("{},{},{}", injection.bridge.id, injection.port.id, payload);

        tracing::info!("Injecting {} to {}", message, channel);
        let receivers = self.pubsub.publish(&channel, &message).await?;
        if receivers == 0 {
            tracing::warn!(%session, "Injection had no listener");
        }
        Ok(receivers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use msgscope_core::architecture::{Component, Port};
    use msgscope_infrastructure::{JsonCodec, MemoryStore};

    #[tokio::test]
    async fn test_inject_publishes_on_session_channel() {
        let store = Arc::new(MemoryStore::new());
        let mut listener = store.subscribe("3-pubsub").await.unwrap();
        let service: InjectionService<Vec<u32>> =
            InjectionService::new(store.clone(), Arc::new(JsonCodec::new()));

        let injection = Injection::new(
            Component {
                id: 2,
                name: "controller".to_string(),
            },
            Port {
                id: 11,
                name: "setpoint".to_string(),
                component: 2,
            },
            vec![1, 2],
        );
        let receivers = service.inject(&Session::from(3), &injection).await.unwrap();

        assert_eq!(receivers, 1);
        assert_eq!(listener.recv().await.unwrap(), "2,11,[1,2]");
    }

    #[tokio::test]
    async fn test_inject_without_listener_still_succeeds() {
        let store = Arc::new(MemoryStore::new());
        let service: InjectionService<u32> = InjectionService::new(store, Arc::new(JsonCodec::new()));
        let injection = Injection::new(
            Component {
                id: 0,
                name: "sensor".to_string(),
            },
            Port {
                id: 0,
                name: "out".to_string(),
                component: 0,
            },
            5,
        );

        assert_eq!(service.inject(&Session::from(1), &injection).await.unwrap(), 0);
    }
}

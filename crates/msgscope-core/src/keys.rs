//! Store key naming for sessions.

use crate::session::Session;

/// Default name of the status broadcast channel.
pub const STATUS_CHANNEL: &str = "inspector-channel";

/// Default key holding the highest session number issued.
pub const SESSION_COUNTER: &str = "numSessions";

/// Key of the session's record log.
pub fn stream_key(session: &Session) -> String {
    format!("{}-stream", session)
}

/// Key of the session's start time (epoch milliseconds).
pub fn start_key(session: &Session) -> String {
    format!("{}-start", session)
}

/// Key of the session's stop time (epoch milliseconds).
pub fn stop_key(session: &Session) -> String {
    format!("{}-stop", session)
}

/// Channel the instrumented system listens on for injected payloads.
pub fn injection_channel(session: &Session) -> String {
    format!("{}-pubsub", session)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_keys() {
        let session = Session::from(4);
        assert_eq!(stream_key(&session), "4-stream");
        assert_eq!(start_key(&session), "4-start");
        assert_eq!(stop_key(&session), "4-stop");
        assert_eq!(injection_channel(&session), "4-pubsub");
    }
}

use std::sync::mpsc::Sender;
use std::thread;

use geocoin_engine::LatLng;
use tracing::{debug, warn};

use super::loop_runner::AppEvent;

/// Asynchronous position provider. Answers, if any, arrive later on `reply`
/// as [`AppEvent::Location`]; a source that cannot answer just drops it.
pub(crate) trait GeolocationSource {
    fn request(&self, reply: Sender<AppEvent>);
}

/// Answers every request with a configured position from a worker thread.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FixedGeolocation {
    position: LatLng,
}

impl FixedGeolocation {
    pub(crate) fn new(position: LatLng) -> Self {
        Self { position }
    }
}

impl GeolocationSource for FixedGeolocation {
    fn request(&self, reply: Sender<AppEvent>) {
        let position = self.position;
        let spawned = thread::Builder::new()
            .name("geolocation".to_string())
            .spawn(move || {
                debug!(position = %position, "geolocation_fix");
                if reply.send(AppEvent::Location(position)).is_err() {
                    debug!("geolocation_receiver_gone");
                }
            });
        if let Err(error) = spawned {
            warn!(error = %error, "geolocation_thread_failed");
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct NoGeolocation;

impl GeolocationSource for NoGeolocation {
    fn request(&self, _reply: Sender<AppEvent>) {
        debug!("geolocation_unavailable");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::time::Duration;

    use super::*;

    #[test]
    fn fixed_source_answers_on_the_reply_channel() {
        let (tx, rx) = mpsc::channel();
        FixedGeolocation::new(LatLng::new(1.5, -2.5)).request(tx);

        let event = rx.recv_timeout(Duration::from_secs(5)).expect("answer");
        assert_eq!(event, AppEvent::Location(LatLng::new(1.5, -2.5)));
    }

    #[test]
    fn missing_source_never_answers() {
        let (tx, rx) = mpsc::channel();
        NoGeolocation.request(tx);

        assert!(rx.recv().is_err());
    }
}

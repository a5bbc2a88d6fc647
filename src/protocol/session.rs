//! Session protocol core.
//!
//! A [`Session`] owns the state of one client connection, validates every
//! incoming envelope against it, dispatches on the payload kind, applies the
//! resulting transition, notifies the delegate and builds at most one reply.

use std::time::{Duration, Instant};

use super::ack::{AckContinuation, AckCoordinator};
use super::capabilities::{ServerInfo, SessionProperties};
use super::delegate::Delegate;
use super::message::{Envelope, ErrorPayload, Payload, PayloadKind};
use super::state::{SessionState, SessionStats, SessionStatus};
use super::types::{Camera, MotionMode, Transform};
use crate::error::{MocapError, Result};

/// Protocol core for a single session
pub struct Session {
    /// Session ID
    id: String,
    /// Authoritative session state
    state: SessionState,
    /// Description sent with `SessionStart`
    server_info: ServerInfo,
    /// Pending acknowledgments for server-initiated messages
    acks: AckCoordinator,
    /// Embedding application
    delegate: Box<dyn Delegate>,
    /// Logging handle; every dispatch runs inside it
    span: tracing::Span,
    /// Deadline applied to [`Session::send_with_ack`]
    ack_timeout: Option<Duration>,
    /// Construction time
    created: Instant,
    /// Envelopes processed
    messages_received: u64,
    /// Envelopes produced
    messages_sent: u64,
    /// Transform updates accepted
    motion_updates: u64,
    /// Transform updates dropped by the capture-mode gate
    motion_dropped: u64,
}

impl Session {
    /// Create an offline session driving `delegate`
    pub fn new(delegate: impl Delegate + 'static) -> Self {
        Self::with_boxed_delegate(Box::new(delegate))
    }

    /// Create an offline session from an already boxed delegate
    pub fn with_boxed_delegate(delegate: Box<dyn Delegate>) -> Self {
        let id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!("session", id = %id);
        Self {
            id,
            state: SessionState::new(),
            server_info: ServerInfo::default(),
            acks: AckCoordinator::new(),
            delegate,
            span,
            ack_timeout: None,
            created: Instant::now(),
            messages_received: 0,
            messages_sent: 0,
            motion_updates: 0,
            motion_dropped: 0,
        }
    }

    /// Use `span` as the logging handle for this session
    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    /// Advertise `info` in `SessionStart`
    pub fn with_server_info(mut self, info: ServerInfo) -> Self {
        self.server_info = info;
        self
    }

    /// Expire acknowledgments requested by [`Session::send_with_ack`] after `timeout`
    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = Some(timeout);
        self
    }

    /// Get session ID
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get current status
    pub fn status(&self) -> SessionStatus {
        self.state.status
    }

    /// Read-only view of the session state
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Check if the session is activated
    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// Current capture mode
    pub fn capture_mode(&self) -> MotionMode {
        self.state.capture_mode
    }

    /// Camera selected by the client
    pub fn active_camera(&self) -> Option<&Camera> {
        self.state.active_camera.as_ref()
    }

    /// Last accepted transform
    pub fn current_transform(&self) -> Transform {
        self.state.current_transform
    }

    /// Server description advertised by this session
    pub fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    /// Acknowledgments still outstanding
    pub fn pending_acks(&self) -> usize {
        self.acks.len()
    }

    /// Begin the handshake: `Offline -> Starting`.
    ///
    /// Returns the server-initiated `SessionStart` envelope.
    pub fn start(&mut self) -> Result<Envelope> {
        if self.state.status != SessionStatus::Offline {
            return Err(MocapError::InvalidMessage(format!(
                "cannot start session while {}",
                self.state.status
            )));
        }

        self.state.status = SessionStatus::Starting;
        tracing::debug!(parent: &self.span, api_version = %self.server_info.api_version, "session starting");
        Ok(Envelope::new(Payload::SessionStart {
            server_info: self.server_info.clone(),
        }))
    }

    /// Complete the handshake: `Starting -> Activated`.
    pub fn activate(&mut self, properties: &SessionProperties) -> Result<()> {
        match self.state.status {
            SessionStatus::Starting => {},
            SessionStatus::Offline => {
                return Err(MocapError::InvalidMessage(
                    "session must be started before it can be activated".to_string(),
                ));
            },
            SessionStatus::Activated => {
                return Err(MocapError::InvalidMessage(
                    "session is already activated".to_string(),
                ));
            },
        }

        if !properties.api_version.is_empty()
            && !self.server_info.is_compatible(&properties.api_version)
        {
            return Err(MocapError::ApiVersionNotSupported(format!(
                "client requested {}, server speaks {}",
                properties.api_version, self.server_info.api_version
            )));
        }

        self.state.status = SessionStatus::Activated;
        self.state.properties = Some(properties.clone());
        tracing::debug!(parent: &self.span, client = %properties.name, "session activated");
        self.delegate
            .session_did_activate(properties)
            .map_err(delegate_fault)
    }

    /// Return to `Offline`, notifying the delegate first.
    ///
    /// No-op when already offline. Pending acknowledgments are discarded and
    /// camera, mode and transform return to their initial values.
    pub fn shutdown(&mut self) {
        if self.state.status == SessionStatus::Offline {
            return;
        }

        tracing::debug!(parent: &self.span, from = %self.state.status, "session shutting down");
        self.delegate.session_will_shutdown();
        self.acks.clear();
        self.state.reset();
    }

    /// Process one incoming envelope and return the reply, if any.
    pub fn process(&mut self, envelope: &Envelope) -> Option<Envelope> {
        let span = self.span.clone();
        let _enter = span.enter();

        self.messages_received += 1;

        let Some(payload) = envelope.payload.as_ref() else {
            tracing::warn!(message_id = %envelope.id(), "message has no payload");
            let err = MocapError::MalformedMessage("message payload is missing".to_string());
            return Some(self.sent(Envelope::error(Some(envelope.id()), ErrorPayload::from(&err))));
        };

        tracing::trace!(message_id = %envelope.id(), kind = %payload.kind(), "processing message");

        match self.dispatch(envelope, payload) {
            Ok(Some(reply)) => Some(self.sent(reply)),
            Ok(None) => None,
            Err(err) => {
                let reply = Envelope::error(Some(envelope.id()), ErrorPayload::from(&err));
                if err.is_fatal() {
                    tracing::error!(message_id = %envelope.id(), error = %err, "fatal session error");
                    self.shutdown();
                } else {
                    tracing::warn!(message_id = %envelope.id(), error = %err, "message rejected");
                }
                Some(self.sent(reply))
            },
        }
    }

    fn dispatch(&mut self, envelope: &Envelope, payload: &Payload) -> Result<Option<Envelope>> {
        let id = envelope.id();

        match payload {
            Payload::SessionStart { .. } => self.start().map(Some),

            Payload::SessionActivate { properties } => {
                self.activate(properties)?;
                Ok(None)
            },

            Payload::SessionShutdown {} => {
                self.shutdown();
                Ok(None)
            },

            Payload::Acknowledge {} => {
                let target = envelope.response_id().ok_or_else(|| {
                    MocapError::InvalidMessage(
                        "acknowledgment does not name the message it acknowledges".to_string(),
                    )
                })?;
                self.acks.acknowledge(target);
                Ok(None)
            },

            Payload::Error(err) => {
                tracing::warn!(
                    message_id = %id,
                    error_type = %err.error_type,
                    fatal = err.is_fatal,
                    "peer reported error: {}",
                    err.message
                );
                Ok(None)
            },

            Payload::GetCameraList {} => {
                self.require_active(PayloadKind::GetCameraList)?;
                let cameras = self.delegate.available_cameras();
                Ok(Some(Envelope::reply(id, Payload::CameraList { cameras })))
            },

            Payload::SetActiveCamera { camera_id } => {
                self.require_active(PayloadKind::SetActiveCamera)?;
                let camera = self
                    .delegate
                    .camera_by_id(camera_id)
                    .ok_or_else(|| MocapError::CameraNotFound(camera_id.clone()))?;

                self.state.active_camera = Some(camera.clone());
                self.delegate
                    .did_set_active_camera(&camera)
                    .map_err(delegate_fault)?;
                Ok(Some(Envelope::reply(id, Payload::ActiveCameraInfo { camera })))
            },

            Payload::MotionSetMode { mode } => {
                self.require_active(PayloadKind::MotionSetMode)?;
                if let Some(next) = self.state.capture_mode.transition(*mode) {
                    self.state.capture_mode = next;
                    self.delegate
                        .did_set_motion_mode(next)
                        .map_err(delegate_fault)?;
                }
                Ok(Some(Envelope::reply(id, Payload::Acknowledge {})))
            },

            Payload::MotionGetMode {} => {
                self.require_active(PayloadKind::MotionGetMode)?;
                Ok(Some(Envelope::reply(
                    id,
                    Payload::MotionActiveMode {
                        mode: self.state.capture_mode,
                    },
                )))
            },

            Payload::MotionUpdateXForm { xform } => {
                self.require_active(PayloadKind::MotionUpdateXForm)?;
                if !self.state.capture_mode.is_capturing() {
                    self.motion_dropped += 1;
                    tracing::trace!(message_id = %id, "capture off, dropping motion update");
                    return Ok(None);
                }

                self.state.current_transform = *xform;
                self.motion_updates += 1;
                self.delegate
                    .received_motion_update(xform)
                    .map_err(delegate_fault)?;
                Ok(None)
            },

            Payload::CameraList { .. }
            | Payload::ActiveCameraInfo { .. }
            | Payload::MotionActiveMode { .. }
            | Payload::MotionInfo { .. } => {
                tracing::error!(message_id = %id, kind = %payload.kind(), "no handler for payload kind");
                Err(MocapError::UnhandledPayload(format!(
                    "no handler for {} messages",
                    payload.kind()
                )))
            },
        }
    }

    /// Send a server-initiated message that expects an acknowledgment.
    ///
    /// The continuation runs once, either when the peer acknowledges the
    /// returned envelope or when the configured ack timeout passes.
    pub fn send_with_ack(
        &mut self,
        payload: Payload,
        continuation: Option<AckContinuation>,
    ) -> Envelope {
        let envelope = Envelope::new(payload);
        match self.ack_timeout {
            Some(timeout) => {
                self.acks
                    .queue_with_deadline(envelope.id(), Instant::now() + timeout, continuation);
            },
            None => self.acks.queue(envelope.id(), continuation),
        }
        self.sent(envelope)
    }

    /// Expire acknowledgments whose deadline passed; returns how many expired
    pub fn poll_timeouts(&mut self, now: Instant) -> usize {
        self.acks.expire(now)
    }

    /// Server-initiated report of the current motion state
    pub fn motion_info(&mut self) -> Envelope {
        let envelope = Envelope::new(Payload::MotionInfo {
            mode: self.state.capture_mode,
            xform: self.state.current_transform,
        });
        self.sent(envelope)
    }

    /// Get session statistics
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            session_id: self.id.clone(),
            status: self.state.status,
            messages_received: self.messages_received,
            messages_sent: self.messages_sent,
            motion_updates: self.motion_updates,
            motion_dropped: self.motion_dropped,
            pending_acks: self.acks.len(),
            uptime_secs: self.created.elapsed().as_secs(),
        }
    }

    fn require_active(&self, kind: PayloadKind) -> Result<()> {
        if self.state.is_active() {
            Ok(())
        } else {
            Err(MocapError::SessionNotActive(format!(
                "cannot process {kind} while session is {}",
                self.state.status
            )))
        }
    }

    fn sent(&mut self, envelope: Envelope) -> Envelope {
        self.messages_sent += 1;
        envelope
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("server_info", &self.server_info)
            .field("acks", &self.acks)
            .finish_non_exhaustive()
    }
}

fn delegate_fault(err: MocapError) -> MocapError {
    match err {
        MocapError::Delegate(_) => err,
        other => MocapError::Delegate(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::delegate::{MotionDelegate, NoopDelegate, SceneDelegate, SessionDelegate};
    use crate::protocol::ErrorType;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Recorder {
        updates: Arc<Mutex<Vec<Transform>>>,
        shutdowns: Arc<Mutex<usize>>,
        fail_camera: bool,
    }

    impl SessionDelegate for Recorder {
        fn session_will_shutdown(&mut self) {
            *self.shutdowns.lock().unwrap() += 1;
        }
    }

    impl SceneDelegate for Recorder {
        fn available_cameras(&self) -> Vec<Camera> {
            vec![Camera::new("cam1"), Camera::new("cam2")]
        }

        fn did_set_active_camera(&mut self, _camera: &Camera) -> Result<()> {
            if self.fail_camera {
                Err(MocapError::Delegate("renderer offline".to_string()))
            } else {
                Ok(())
            }
        }
    }

    impl MotionDelegate for Recorder {
        fn received_motion_update(&mut self, xform: &Transform) -> Result<()> {
            self.updates.lock().unwrap().push(*xform);
            Ok(())
        }
    }

    fn active(delegate: impl Delegate + 'static) -> Session {
        let mut session = Session::new(delegate);
        session.start().unwrap();
        session.activate(&SessionProperties::default()).unwrap();
        session
    }

    fn msg(payload: Payload) -> Envelope {
        Envelope::new(payload)
    }

    fn error_type(reply: &Envelope) -> Option<ErrorType> {
        reply.get_error().and_then(|e| e.kind())
    }

    #[test]
    fn test_session_handshake() {
        let mut session = Session::new(NoopDelegate);
        assert_eq!(session.status(), SessionStatus::Offline);

        let start = session.process(&msg(Payload::SessionStart {
            server_info: ServerInfo::default(),
        }));
        let start = start.unwrap();
        assert_eq!(start.kind(), Some(PayloadKind::SessionStart));
        assert!(start.response_id().is_none());
        assert_eq!(session.status(), SessionStatus::Starting);

        let reply = session.process(&msg(Payload::SessionActivate {
            properties: SessionProperties::default(),
        }));
        assert!(reply.is_none());
        assert_eq!(session.status(), SessionStatus::Activated);
    }

    #[test]
    fn test_direct_activation_rejected() {
        let mut session = Session::new(NoopDelegate);
        let request = msg(Payload::SessionActivate {
            properties: SessionProperties::default(),
        });
        let reply = session.process(&request).unwrap();

        assert_eq!(error_type(&reply), Some(ErrorType::InvalidMessage));
        assert_eq!(reply.response_id(), Some(request.id()));
        assert_eq!(session.status(), SessionStatus::Offline);
    }

    #[test]
    fn test_api_version_mismatch_is_fatal() {
        let recorder = Recorder::default();
        let shutdowns = recorder.shutdowns.clone();
        let mut session = Session::new(recorder);
        session.start().unwrap();

        let reply = session
            .process(&msg(Payload::SessionActivate {
                properties: SessionProperties::new("ipad", "7.0"),
            }))
            .unwrap();

        let err = reply.get_error().unwrap();
        assert_eq!(err.kind(), Some(ErrorType::ApiVersionNotSupported));
        assert!(err.is_fatal);
        assert_eq!(session.status(), SessionStatus::Offline);
        assert_eq!(*shutdowns.lock().unwrap(), 1);
    }

    #[test]
    fn test_requests_require_activation() {
        let mut session = Session::new(NoopDelegate);
        session.start().unwrap();

        for payload in [
            Payload::GetCameraList {},
            Payload::SetActiveCamera {
                camera_id: "cam1".to_string(),
            },
            Payload::MotionSetMode {
                mode: MotionMode::Live,
            },
            Payload::MotionGetMode {},
        ] {
            let reply = session.process(&msg(payload)).unwrap();
            assert_eq!(error_type(&reply), Some(ErrorType::SessionNotActive));
            assert!(!reply.get_error().unwrap().is_fatal);
        }
        assert_eq!(session.status(), SessionStatus::Starting);
        assert_eq!(session.capture_mode(), MotionMode::Off);
    }

    #[test]
    fn test_set_active_camera() {
        let mut session = active(Recorder::default());
        let request = msg(Payload::SetActiveCamera {
            camera_id: "cam2".to_string(),
        });
        let reply = session.process(&request).unwrap();

        assert_eq!(reply.response_id(), Some(request.id()));
        assert_eq!(
            reply.payload,
            Some(Payload::ActiveCameraInfo {
                camera: Camera::new("cam2")
            })
        );
        assert_eq!(session.active_camera(), Some(&Camera::new("cam2")));
    }

    #[test]
    fn test_unknown_camera() {
        let mut session = active(Recorder::default());
        let reply = session
            .process(&msg(Payload::SetActiveCamera {
                camera_id: "cam9".to_string(),
            }))
            .unwrap();

        assert_eq!(error_type(&reply), Some(ErrorType::CannotProcessMessage));
        assert!(session.active_camera().is_none());
        assert!(session.is_active());
    }

    #[test]
    fn test_delegate_fault_shuts_down() {
        let recorder = Recorder {
            fail_camera: true,
            ..Default::default()
        };
        let mut session = active(recorder);
        let reply = session
            .process(&msg(Payload::SetActiveCamera {
                camera_id: "cam1".to_string(),
            }))
            .unwrap();

        assert_eq!(error_type(&reply), Some(ErrorType::UnexpectedError));
        assert_eq!(session.status(), SessionStatus::Offline);
        assert!(session.active_camera().is_none());
    }

    #[test]
    fn test_motion_gate() {
        let recorder = Recorder::default();
        let updates = recorder.updates.clone();
        let mut session = active(recorder);
        let xform = Transform::from_components([1.0, 2.0, 3.0], [4.0, 5.0, 6.0]);

        assert!(session
            .process(&msg(Payload::MotionUpdateXForm { xform }))
            .is_none());
        assert!(updates.lock().unwrap().is_empty());
        assert_eq!(session.current_transform(), Transform::zero());

        let ack = session
            .process(&msg(Payload::MotionSetMode {
                mode: MotionMode::Recording,
            }))
            .unwrap();
        assert_eq!(ack.kind(), Some(PayloadKind::Acknowledge));

        assert!(session
            .process(&msg(Payload::MotionUpdateXForm { xform }))
            .is_none());
        assert_eq!(*updates.lock().unwrap(), vec![xform]);
        assert_eq!(session.current_transform(), xform);

        let stats = session.stats();
        assert_eq!(stats.motion_updates, 1);
        assert_eq!(stats.motion_dropped, 1);
    }

    #[test]
    fn test_get_mode() {
        let mut session = active(NoopDelegate);
        session.process(&msg(Payload::MotionSetMode {
            mode: MotionMode::Live,
        }));
        let reply = session.process(&msg(Payload::MotionGetMode {})).unwrap();
        assert_eq!(
            reply.payload,
            Some(Payload::MotionActiveMode {
                mode: MotionMode::Live
            })
        );
    }

    #[test]
    fn test_acknowledge_requires_response_id() {
        let mut session = active(NoopDelegate);
        let reply = session.process(&msg(Payload::Acknowledge {})).unwrap();
        assert_eq!(error_type(&reply), Some(ErrorType::InvalidMessage));
    }

    #[test]
    fn test_send_with_ack() {
        let mut session = active(NoopDelegate);
        let fired = Arc::new(Mutex::new(0));
        let sink = fired.clone();
        let outgoing = session.send_with_ack(
            Payload::GetCameraList {},
            Some(Box::new(move |_| *sink.lock().unwrap() += 1)),
        );
        assert_eq!(session.pending_acks(), 1);

        let ack = Envelope::new(Payload::Acknowledge {}).in_response_to(outgoing.id());
        assert!(session.process(&ack).is_none());
        assert!(session.process(&ack).is_none());
        assert_eq!(*fired.lock().unwrap(), 1);
        assert_eq!(session.pending_acks(), 0);
    }

    #[test]
    fn test_ack_timeout() {
        let mut session = active(NoopDelegate).with_ack_timeout(Duration::from_millis(10));
        session.send_with_ack(Payload::MotionGetMode {}, None);

        assert_eq!(session.poll_timeouts(Instant::now()), 0);
        assert_eq!(
            session.poll_timeouts(Instant::now() + Duration::from_secs(1)),
            1
        );
        assert_eq!(session.pending_acks(), 0);
    }

    #[test]
    fn test_unhandled_payload() {
        let mut session = active(NoopDelegate);
        let reply = session
            .process(&msg(Payload::CameraList { cameras: vec![] }))
            .unwrap();
        assert_eq!(error_type(&reply), Some(ErrorType::ApplicationException));
        assert!(session.is_active());
    }

    #[test]
    fn test_shutdown_idempotent() {
        let recorder = Recorder::default();
        let shutdowns = recorder.shutdowns.clone();
        let mut session = active(recorder);

        assert!(session.process(&msg(Payload::SessionShutdown {})).is_none());
        session.shutdown();
        assert_eq!(*shutdowns.lock().unwrap(), 1);
        assert_eq!(session.status(), SessionStatus::Offline);
    }
}

//! Capability interfaces the embedding application implements.
//!
//! Each concern gets its own trait with no-op defaults, so an application
//! only overrides what it cares about. Anything implementing all three is a
//! [`Delegate`].
//!
//! Notification hooks return [`Result`]; an `Err` is treated as an
//! unexpected internal fault and shuts the session down.

use super::capabilities::SessionProperties;
use super::types::{Camera, MotionMode, Transform};
use crate::error::Result;

/// Session lifecycle notifications
pub trait SessionDelegate {
    /// Called after the client activated the session
    fn session_did_activate(&mut self, _properties: &SessionProperties) -> Result<()> {
        Ok(())
    }

    /// Called before the session returns to `Offline`
    fn session_will_shutdown(&mut self) {}
}

/// Scene and camera queries
pub trait SceneDelegate {
    /// Cameras the client can choose from
    fn available_cameras(&self) -> Vec<Camera> {
        Vec::new()
    }

    /// Resolve a camera id
    fn camera_by_id(&self, id: &str) -> Option<Camera> {
        self.available_cameras().into_iter().find(|camera| camera.id == id)
    }

    /// Called after the active camera changed
    fn did_set_active_camera(&mut self, _camera: &Camera) -> Result<()> {
        Ok(())
    }
}

/// Motion capture notifications
pub trait MotionDelegate {
    /// Called after the capture mode changed
    fn did_set_motion_mode(&mut self, _mode: MotionMode) -> Result<()> {
        Ok(())
    }

    /// Called for every accepted transform update
    fn received_motion_update(&mut self, _xform: &Transform) -> Result<()> {
        Ok(())
    }
}

/// Full delegate: every capability set, movable across threads.
pub trait Delegate: SessionDelegate + SceneDelegate + MotionDelegate + Send {}

impl<T> Delegate for T where T: SessionDelegate + SceneDelegate + MotionDelegate + Send {}

/// Delegate that ignores everything and offers no cameras
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDelegate;

impl SessionDelegate for NoopDelegate {}
impl SceneDelegate for NoopDelegate {}
impl MotionDelegate for NoopDelegate {}

/// Delegate serving a fixed camera list and logging all notifications.
///
/// Used by the `mocap serve` binary when no application is embedded.
#[derive(Debug, Clone, Default)]
pub struct StaticScene {
    cameras: Vec<Camera>,
}

impl StaticScene {
    /// Create a scene from camera ids
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cameras: ids.into_iter().map(Camera::new).collect(),
        }
    }
}

impl SessionDelegate for StaticScene {
    fn session_did_activate(&mut self, properties: &SessionProperties) -> Result<()> {
        tracing::info!(client = %properties.name, api_version = %properties.api_version, "session activated");
        Ok(())
    }

    fn session_will_shutdown(&mut self) {
        tracing::info!("session shutting down");
    }
}

impl SceneDelegate for StaticScene {
    fn available_cameras(&self) -> Vec<Camera> {
        self.cameras.clone()
    }

    fn did_set_active_camera(&mut self, camera: &Camera) -> Result<()> {
        tracing::info!(camera = %camera.id, "active camera set");
        Ok(())
    }
}

impl MotionDelegate for StaticScene {
    fn did_set_motion_mode(&mut self, mode: MotionMode) -> Result<()> {
        tracing::info!(%mode, "motion mode set");
        Ok(())
    }

    fn received_motion_update(&mut self, xform: &Transform) -> Result<()> {
        tracing::debug!(
            tx = xform.translation.x,
            ty = xform.translation.y,
            tz = xform.translation.z,
            rx = xform.orientation.x,
            ry = xform.orientation.y,
            rz = xform.orientation.z,
            "motion update"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_delegate_has_no_cameras() {
        let delegate = NoopDelegate;
        assert!(delegate.available_cameras().is_empty());
        assert!(delegate.camera_by_id("cam1").is_none());
    }

    #[test]
    fn test_static_scene_resolves_by_id() {
        let scene = StaticScene::new(["cam1", "cam2"]);
        assert_eq!(scene.available_cameras().len(), 2);
        assert_eq!(scene.camera_by_id("cam2"), Some(Camera::new("cam2")));
        assert!(scene.camera_by_id("cam3").is_none());
    }

    #[test]
    fn test_boxed_delegate() {
        let mut delegate: Box<dyn Delegate> = Box::new(StaticScene::new(["a"]));
        assert!(delegate.did_set_motion_mode(MotionMode::Live).is_ok());
        assert_eq!(delegate.available_cameras(), vec![Camera::new("a")]);
    }
}

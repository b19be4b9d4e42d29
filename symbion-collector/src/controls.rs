/**
 * CONTROLS - routage des requêtes de contrôle vers leurs handlers
 *
 * RÔLE :
 * Catalogue des contrôles exposés par la sonde (nom -> handler). Une requête
 * arrive opaque, le routeur la confie au handler déclaré et renvoie toujours
 * une `ControlResponse`, erreur comprise.
 */
use crate::error::ControlError;
use serde_json::Value;
use std::collections::HashMap;
use symbion_report::{ControlRequest, ControlResponse};
use tracing::{debug, warn};

/// Something that can execute one kind of control.
pub trait ControlHandler {
    fn handle(&self, req: &ControlRequest) -> Result<Value, ControlError>;
}

impl<F> ControlHandler for F
where
    F: Fn(&ControlRequest) -> Result<Value, ControlError>,
{
    fn handle(&self, req: &ControlRequest) -> Result<Value, ControlError> {
        self(req)
    }
}

#[derive(Default)]
pub struct ControlRouter {
    handlers: HashMap<String, Box<dyn ControlHandler + Send + Sync>>,
}

impl ControlRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any handler already registered under `name`.
    pub fn register<H: ControlHandler + Send + Sync + 'static>(&mut self, name: &str, handler: H) {
        self.handlers.insert(name.to_string(), Box::new(handler));
    }

    /// Registered control names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn handle(&self, req: &ControlRequest) -> ControlResponse {
        let Some(handler) = self.handlers.get(&req.control) else {
            warn!("[controls] contrôle inconnu: {}", req.control);
            return ControlResponse::error(ControlError::UnknownControl(req.control.clone()).to_string());
        };
        debug!("[controls] {} sur {}", req.control, req.node_id);
        match handler.handle(req) {
            Ok(value) => ControlResponse::ok(value),
            Err(e) => ControlResponse::error(e.to_string()),
        }
    }
}

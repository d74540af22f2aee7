//! Hook action vocabulary: what an outbound/inbound policy may do with a
//! parsed frame, as returned to the pipeline driven by [`crate::addon`].

use liqi_wire::LiqiValue;

/// What happens to the frame that triggered the hook.
#[derive(Debug, Clone)]
pub enum BaseAction {
    /// Emit the original bytes unchanged.
    Pass,
    /// Replace the body and rebuild; msg_id/method are preserved.
    Modify(LiqiValue),
    /// Suppress emission. Waiters on this frame's id are still resolved
    /// by the pipeline before the suppression takes effect.
    Drop,
}

/// A frame to synthesize in addition to the triggering frame's own
/// treatment, applied strictly after it.
#[derive(Debug, Clone)]
pub struct InjectSpec {
    pub method: String,
    pub body: LiqiValue,
    /// `true` for Notify/Res (server->client), `false` for Req (client->server).
    pub to_client: bool,
}

/// The full decision a hook returns for one frame.
#[derive(Debug, Clone, Default)]
pub struct HookOutcome {
    pub action: Option<BaseAction>,
    pub injects: Vec<InjectSpec>,
}

impl HookOutcome {
    pub fn pass() -> Self {
        Self {
            action: Some(BaseAction::Pass),
            injects: Vec::new(),
        }
    }

    pub fn modify(body: LiqiValue) -> Self {
        Self {
            action: Some(BaseAction::Modify(body)),
            injects: Vec::new(),
        }
    }

    pub fn drop_frame() -> Self {
        Self {
            action: Some(BaseAction::Drop),
            injects: Vec::new(),
        }
    }

    pub fn with_inject(mut self, spec: InjectSpec) -> Self {
        self.injects.push(spec);
        self
    }

    pub fn action_or_pass(&self) -> BaseAction {
        self.action.clone().unwrap_or(BaseAction::Pass)
    }
}

/// A hook callable: `from_client`-selected policy invoked on every parsed
/// frame on a flow.
pub type Hook = Box<dyn Fn(&liqi_wire::FrameView) -> HookOutcome + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_outcome_has_no_action_and_no_injects() {
        let outcome = HookOutcome::default();
        assert!(matches!(outcome.action_or_pass(), BaseAction::Pass));
        assert!(outcome.injects.is_empty());
    }
}

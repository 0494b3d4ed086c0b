use k8s_openapi::api::admissionregistration::v1::MutatingWebhook;

use crate::webhooks::SideEffects;

pub trait MutatingWebhookExt {
    fn builder(name: impl Into<String>, side_effects: SideEffects) -> MutatingWebhookBuilder;
}

impl MutatingWebhookExt for MutatingWebhook {
    fn builder(name: impl Into<String>, side_effects: SideEffects) -> MutatingWebhookBuilder {
        MutatingWebhookBuilder::new(name.into(), side_effects)
    }
}

pub struct MutatingWebhookBuilder {
    side_effects: SideEffects,
    name: String,
}

impl MutatingWebhookBuilder {
    pub fn new(name: String, side_effects: SideEffects) -> Self {
        Self { side_effects, name }
    }

    pub fn build(self) -> MutatingWebhook {
        MutatingWebhook {
            side_effects: self.side_effects.to_string(),
            name: self.name,
            ..Default::default()
        }
    }
}

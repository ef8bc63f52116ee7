//! Host-app callback surface for identity values.
//!
//! Collaborating SDK modules (crash reporting, feedback, updates,
//! authentication) need identity values from the host app: user id, name,
//! email, and an anchor for presenting their UI. Each capability is its
//! own trait so a host registers only what its enabled features need; one
//! registry aggregates whichever subset is active. No UI surface is
//! defined here — values pass through unmodified.

use std::fmt;

/// The SDK module asking for a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    CrashReporter,
    Feedback,
    Updater,
    Authenticator,
}

impl Component {
    pub fn as_str(self) -> &'static str {
        match self {
            Component::CrashReporter => "crash-reporter",
            Component::Feedback => "feedback",
            Component::Updater => "updater",
            Component::Authenticator => "authenticator",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque handle to a host-app surface that a component may present UI
/// on. The SDK core never interprets it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentationAnchor(pub String);

/// Identity values supplied by the host app, keyed by the requesting
/// component so e.g. crash reports and feedback threads can carry
/// different users.
pub trait IdentitySource: Send + Sync {
    fn user_id(&self, component: Component) -> Option<String> {
        let _ = component;
        None
    }

    fn user_name(&self, component: Component) -> Option<String> {
        let _ = component;
        None
    }

    fn user_email(&self, component: Component) -> Option<String> {
        let _ = component;
        None
    }
}

/// Presentation anchor supplied by the host app.
pub trait PresentationSource: Send + Sync {
    fn presentation_anchor(&self, component: Component) -> Option<PresentationAnchor> {
        let _ = component;
        None
    }
}

/// Aggregating dispatcher over whichever capability sources the host
/// registered at startup. Unregistered capabilities answer `None`.
#[derive(Default)]
pub struct CallbackRegistry {
    identity: Option<Box<dyn IdentitySource>>,
    presentation: Option<Box<dyn PresentationSource>>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_identity(&mut self, source: Box<dyn IdentitySource>) {
        self.identity = Some(source);
    }

    pub fn register_presentation(&mut self, source: Box<dyn PresentationSource>) {
        self.presentation = Some(source);
    }

    pub fn user_id(&self, component: Component) -> Option<String> {
        self.identity.as_ref().and_then(|s| s.user_id(component))
    }

    pub fn user_name(&self, component: Component) -> Option<String> {
        self.identity.as_ref().and_then(|s| s.user_name(component))
    }

    pub fn user_email(&self, component: Component) -> Option<String> {
        self.identity.as_ref().and_then(|s| s.user_email(component))
    }

    pub fn presentation_anchor(&self, component: Component) -> Option<PresentationAnchor> {
        self.presentation
            .as_ref()
            .and_then(|s| s.presentation_anchor(component))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct PerComponentIdentity;

    impl IdentitySource for PerComponentIdentity {
        fn user_id(&self, component: Component) -> Option<String> {
            match component {
                Component::CrashReporter => Some("crash-user".to_string()),
                Component::Feedback => Some("feedback-user".to_string()),
                _ => None,
            }
        }

        fn user_email(&self, _component: Component) -> Option<String> {
            Some("user@example.com".to_string())
        }
    }

    struct RootWindow;

    impl PresentationSource for RootWindow {
        fn presentation_anchor(&self, _component: Component) -> Option<PresentationAnchor> {
            Some(PresentationAnchor("root-window".to_string()))
        }
    }

    #[test]
    fn test_empty_registry_answers_none() {
        let registry = CallbackRegistry::new();
        assert_eq!(registry.user_id(Component::CrashReporter), None);
        assert_eq!(registry.user_name(Component::Feedback), None);
        assert_eq!(registry.user_email(Component::Updater), None);
        assert_eq!(registry.presentation_anchor(Component::Authenticator), None);
    }

    #[test]
    fn test_registry_forwards_by_component() {
        let mut registry = CallbackRegistry::new();
        registry.register_identity(Box::new(PerComponentIdentity));

        assert_eq!(
            registry.user_id(Component::CrashReporter).as_deref(),
            Some("crash-user")
        );
        assert_eq!(
            registry.user_id(Component::Feedback).as_deref(),
            Some("feedback-user")
        );
        assert_eq!(registry.user_id(Component::Updater), None);

        // Default impl: no user_name registered by this source.
        assert_eq!(registry.user_name(Component::CrashReporter), None);
        assert_eq!(
            registry.user_email(Component::CrashReporter).as_deref(),
            Some("user@example.com")
        );
    }

    #[test]
    fn test_capabilities_register_independently() {
        let mut registry = CallbackRegistry::new();
        registry.register_presentation(Box::new(RootWindow));

        assert_eq!(registry.user_id(Component::Feedback), None);
        assert_eq!(
            registry.presentation_anchor(Component::Feedback),
            Some(PresentationAnchor("root-window".to_string()))
        );
    }
}

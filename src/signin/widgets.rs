//! Headless stand-ins for the form's widgets.
//!
//! They hold the property a real toolkit widget would render and count the
//! repaints a change would trigger; nothing is drawn.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::dispatch::DispatcherHandle;
use crate::error::PropertyError;
use crate::property::{ListenerId, ObservableValue, Property};

/// Count every change of `source` as one repaint.
pub fn track_repaints<V>(source: &V, repaints: Arc<AtomicUsize>) -> ListenerId
where
    V: ObservableValue<String> + ?Sized,
{
    source.add_change_listener(Arc::new(move |_: &String, _: &String| {
        repaints.fetch_add(1, Ordering::SeqCst);
    }))
}

/// Editable single-line text input.
pub struct TextField {
    text: Property<String>,
}

impl TextField {
    pub fn new(ui: &DispatcherHandle, name: &str) -> Self {
        Self {
            text: Property::with_affinity(String::new(), ui).named(name),
        }
    }

    pub fn text(&self) -> &Property<String> {
        &self.text
    }

    /// What a keystroke handler would do: replace the field's content.
    pub fn type_text(&self, text: &str) -> Result<(), PropertyError> {
        self.text.set(text.to_string())
    }
}

/// Read-only text display.
pub struct Label {
    text: Property<String>,
    repaints: Arc<AtomicUsize>,
}

impl Label {
    pub fn new(ui: &DispatcherHandle, name: &str) -> Self {
        let text = Property::with_affinity(String::new(), ui).named(name);
        let repaints = Arc::new(AtomicUsize::new(0));
        track_repaints(&text, Arc::clone(&repaints));
        Self { text, repaints }
    }

    pub fn text(&self) -> &Property<String> {
        &self.text
    }

    pub fn displayed(&self) -> String {
        self.text.get()
    }

    pub fn repaint_count(&self) -> usize {
        self.repaints.load(Ordering::SeqCst)
    }
}

/// The widgets of the Sign-In window.
pub struct SignInView {
    pub user_field: TextField,
    pub password_field: TextField,
    pub error_label: Label,
}

impl SignInView {
    pub fn new(ui: &DispatcherHandle) -> Self {
        Self {
            user_field: TextField::new(ui, "userField.text"),
            password_field: TextField::new(ui, "passwordField.text"),
            error_label: Label::new(ui, "errorLabel.text"),
        }
    }
}

//! Headless Sign-In walkthrough.
//!
//! The controller ([`SignInForm`]) owns the form state as properties. The
//! view's text fields are bound bidirectionally to it, the error label is
//! bound one-way to the error message, and submitting verifies credentials
//! on a worker thread before re-entering the UI thread with the outcome.

mod form;
mod widgets;

pub use form::{
    AcceptListAuthenticator, Authenticator, Credentials, SignInError, SignInForm, SignInStatus,
};
pub use widgets::{track_repaints, Label, SignInView, TextField};

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::config::SignInConfig;
use crate::dispatch::{CancellationFlag, Cancelled, DispatcherHandle, WorkerHandle};
use crate::error::{DispatchError, PropertyError};
use crate::property::Property;
use crate::signin::widgets::SignInView;

const CANCEL_POLL: Duration = Duration::from_millis(10);

#[derive(Debug, Error)]
pub enum SignInError {
    #[error(transparent)]
    Property(#[from] PropertyError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInStatus {
    Idle,
    Verifying,
    SignedIn { user_id: String },
    Rejected,
}

impl SignInStatus {
    /// True once an attempt has produced an answer.
    pub fn is_settled(&self) -> bool {
        matches!(self, SignInStatus::SignedIn { .. } | SignInStatus::Rejected)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user_id: String,
    pub password: String,
}

/// Credential check run off the UI thread. May block.
pub trait Authenticator: Send + Sync {
    fn verify(&self, credentials: &Credentials, cancel: &CancellationFlag)
        -> anyhow::Result<bool>;
}

/// Accepts a fixed set of user ids with any non-empty password, after a
/// simulated round-trip.
#[derive(Debug, Clone)]
pub struct AcceptListAuthenticator {
    accepted_ids: Vec<String>,
    latency: Duration,
}

impl AcceptListAuthenticator {
    pub fn new(accepted_ids: Vec<String>, latency: Duration) -> Self {
        Self {
            accepted_ids,
            latency,
        }
    }

    pub fn from_config(config: &SignInConfig) -> Self {
        Self::new(config.accepted_ids.clone(), config.latency())
    }
}

impl Authenticator for AcceptListAuthenticator {
    fn verify(
        &self,
        credentials: &Credentials,
        cancel: &CancellationFlag,
    ) -> anyhow::Result<bool> {
        let deadline = Instant::now() + self.latency;
        loop {
            cancel.check()?;
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            std::thread::sleep(remaining.min(CANCEL_POLL));
        }

        let known = self.accepted_ids.iter().any(|id| id == &credentials.user_id);
        Ok(known && !credentials.password.is_empty())
    }
}

/// Controller of the Sign-In window.
pub struct SignInForm {
    ui: DispatcherHandle,
    user_id: Property<String>,
    password: Property<String>,
    signin_error: Property<String>,
    status: Property<SignInStatus>,
    authenticator: Arc<dyn Authenticator>,
}

impl SignInForm {
    pub fn new(ui: &DispatcherHandle, authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            ui: ui.clone(),
            user_id: Property::with_affinity(String::new(), ui).named("userId"),
            password: Property::with_affinity(String::new(), ui).named("password"),
            signin_error: Property::with_affinity(String::new(), ui).named("signinError"),
            status: Property::with_affinity(SignInStatus::Idle, ui).named("status"),
            authenticator,
        }
    }

    pub fn user_id(&self) -> &Property<String> {
        &self.user_id
    }

    pub fn password(&self) -> &Property<String> {
        &self.password
    }

    pub fn signin_error(&self) -> &Property<String> {
        &self.signin_error
    }

    pub fn status(&self) -> &Property<SignInStatus> {
        &self.status
    }

    /// Wire the view to the form: text fields both ways, error label one way.
    pub fn attach(&self, view: &SignInView) -> Result<(), PropertyError> {
        view.user_field.text().bind_bidirectional(&self.user_id)?;
        view.password_field
            .text()
            .bind_bidirectional(&self.password)?;
        view.error_label.text().bind(&self.signin_error)?;
        Ok(())
    }

    /// Start verifying the current credentials.
    ///
    /// Must be called on the UI thread. The outcome lands in `status` and
    /// `signin_error` through the UI queue; the returned handle yields
    /// whether the credentials were accepted.
    pub fn submit(&self) -> Result<WorkerHandle<bool>, SignInError> {
        self.ui.assert_ui_thread()?;

        let credentials = Credentials {
            user_id: self.user_id.get(),
            password: self.password.get(),
        };
        self.signin_error.set(String::new())?;
        self.status.set(SignInStatus::Verifying)?;
        tracing::info!(user_id = %credentials.user_id, "Sign-in submitted");

        let ui = self.ui.clone();
        let authenticator = Arc::clone(&self.authenticator);
        let error = self.signin_error.clone();
        let status = self.status.clone();

        let handle = self.ui.spawn_named_worker("signin-verify", move |cancel| {
            let accepted = match authenticator.verify(&credentials, &cancel) {
                Ok(accepted) if !cancel.is_cancelled() => accepted,
                Ok(_) => return Err(reset_on_cancel(&ui, status).into()),
                Err(err) if err.is::<Cancelled>() => {
                    return Err(reset_on_cancel(&ui, status).into())
                }
                Err(err) => {
                    report_failure(&ui, error, status, &err);
                    return Err(err);
                }
            };

            let user_id = credentials.user_id;
            ui.try_run_on_ui_thread(move || {
                if accepted {
                    error.set(String::new())?;
                    status.set(SignInStatus::SignedIn { user_id })?;
                } else {
                    error.set(format!("Wrong id:{user_id}"))?;
                    status.set(SignInStatus::Rejected)?;
                }
                Ok(())
            })?;
            Ok(accepted)
        })?;

        Ok(handle)
    }
}

/// Show a failed verification as a rejection so the form settles.
fn report_failure(
    ui: &DispatcherHandle,
    error: Property<String>,
    status: Property<SignInStatus>,
    err: &anyhow::Error,
) {
    tracing::warn!("Sign-in verification failed: {:#}", err);
    let message = format!("Sign-in failed: {err}");
    let scheduled = ui.try_run_on_ui_thread(move || {
        error.set(message)?;
        status.set(SignInStatus::Rejected)?;
        Ok(())
    });
    if let Err(err) = scheduled {
        tracing::warn!("Could not report sign-in failure: {}", err);
    }
}

/// Put the form back to idle after an abandoned attempt.
fn reset_on_cancel(ui: &DispatcherHandle, status: Property<SignInStatus>) -> Cancelled {
    let scheduled = ui.try_run_on_ui_thread(move || {
        status.set(SignInStatus::Idle)?;
        Ok(())
    });
    if let Err(err) = scheduled {
        tracing::warn!("Could not reset sign-in status: {}", err);
    }
    Cancelled
}

//! The execution orchestrator owns the session: the current image, ε, the
//! last perturbed image and the last clean/adversarial results. It decides
//! whether work happens locally or on the remote service.
//!
//! Every remote request is tagged with the image version (and ε, for
//! attacks) it was issued for. When the response arrives and the session has
//! moved on, the response is dropped rather than written over newer state.

use crate::canonical::{normalize_bytes, CanonicalImage, FormatSniffingDecoder, ImageDecoder};
use crate::config::Settings;
use crate::inference::{self, PredictionResult};
use crate::perturb::{self, Epsilon, PerturbedImage};
use crate::remote::RemoteClient;
use crate::tensor::Tensor;
use crate::{Error, Result};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Where predictions and attacks are computed. Fixed for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Mode {
    Local,
    Remote,
}

#[derive(Debug)]
pub enum Backend {
    /// Illustrative results, no network
    Local,
    Remote(RemoteClient),
}

impl Backend {
    pub fn mode(&self) -> Mode {
        match self {
            Backend::Local => Mode::Local,
            Backend::Remote(_) => Mode::Remote,
        }
    }
}

/// Placeholder shown for a clean prediction in local mode
pub fn local_clean_result() -> PredictionResult {
    PredictionResult::Class {
        label: "7".into(),
        confidence: 0.91,
    }
}

/// Placeholder shown for an attack in local mode
pub fn local_adversarial_result() -> PredictionResult {
    PredictionResult::Class {
        label: "3".into(),
        confidence: 0.74,
    }
}

/// Identity of the state a request was issued against
#[derive(Debug, Clone, Copy, PartialEq)]
struct Tag {
    version: u64,
    epsilon: Option<Epsilon>,
}

#[derive(Debug, Default)]
struct SessionState {
    image: Option<CanonicalImage>,

    /// Bumped on every upload
    version: u64,
    epsilon: Epsilon,
    perturbed: Option<PerturbedImage>,
    clean: Option<PredictionResult>,
    adversarial: Option<PredictionResult>,
    busy: bool,
}

impl SessionState {
    fn tag(&self, with_epsilon: bool) -> Tag {
        Tag {
            version: self.version,
            epsilon: with_epsilon.then_some(self.epsilon),
        }
    }
}

/// What happened to a finished request
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// The result was stored in the session
    Applied(PredictionResult),

    /// The session moved on while the request was in flight; nothing changed
    Superseded,
}

/// A point-in-time view of the session, already formatted for display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub mode: Mode,
    pub epsilon: Epsilon,
    pub busy: bool,
    pub has_image: bool,
    pub has_perturbed: bool,
    pub version: u64,
    pub clean: String,
    pub adversarial: String,

    /// The adversarial side is a local illustration, not a real attack
    pub illustrative: bool,
}

/// Clears the busy flag however the request ends, including when the future
/// is dropped
struct BusyGuard<'a> {
    state: &'a Mutex<SessionState>,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        lock(self.state).busy = false;
    }
}

fn lock(state: &Mutex<SessionState>) -> MutexGuard<'_, SessionState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct Orchestrator {
    backend: Backend,
    decoder: Box<dyn ImageDecoder>,
    state: Mutex<SessionState>,
}

impl Orchestrator {
    pub fn new(backend: Backend) -> Self {
        Orchestrator {
            backend,
            decoder: Box::new(FormatSniffingDecoder),
            state: Mutex::new(SessionState::default()),
        }
    }

    /// Remote mode if an endpoint is configured, local mode otherwise
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let backend = match settings.endpoint() {
            Some(endpoint) => {
                let timeout = Duration::from_secs(settings.timeout_secs);
                Backend::Remote(RemoteClient::new(endpoint, timeout)?)
            }
            None => Backend::Local,
        };
        info!("session runs in {:?} mode", backend.mode());
        Ok(Self::new(backend))
    }

    /// Swap the image decoding capability
    pub fn with_decoder(mut self, decoder: impl ImageDecoder + 'static) -> Self {
        self.decoder = Box::new(decoder);
        self
    }

    pub fn mode(&self) -> Mode {
        self.backend.mode()
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        lock(&self.state)
    }

    /// Replace the canonical image. Clears the perturbed image and both
    /// results; a bad upload leaves everything as it was
    pub fn upload(&self, bytes: &[u8]) -> Result<()> {
        let image = normalize_bytes(self.decoder.as_ref(), bytes)?;

        let mut state = self.state();
        state.version += 1;
        state.clean = None;
        state.adversarial = None;
        state.perturbed = None;
        if self.mode() == Mode::Local {
            state.perturbed = Some(PerturbedImage::Synthesized(perturb::synthesize(
                &image,
                state.epsilon,
            )));
        }
        state.image = Some(image);

        info!("uploaded image version {}", state.version);
        Ok(())
    }

    /// Change ε. In local mode the perturbed preview is regenerated
    pub fn set_epsilon(&self, value: f64) -> Result<Epsilon> {
        let epsilon = Epsilon::new(value)?;
        self.store_epsilon(&mut self.state(), epsilon);
        Ok(epsilon)
    }

    fn store_epsilon(&self, state: &mut SessionState, epsilon: Epsilon) {
        state.epsilon = epsilon;
        if self.mode() == Mode::Local {
            if let Some(image) = &state.image {
                let perturbed = perturb::synthesize(image, epsilon);
                state.perturbed = Some(PerturbedImage::Synthesized(perturbed));
            }
        }
        debug!("epsilon set to {}", epsilon.value());
    }

    /// Mark the session busy and take what a request needs. `epsilon` is
    /// stored only once the request is accepted, so a rejected call changes
    /// nothing
    fn begin(
        &self,
        with_epsilon: bool,
        epsilon: Option<Epsilon>,
    ) -> Result<(CanonicalImage, Epsilon, Tag, BusyGuard<'_>)> {
        let mut state = self.state();
        if state.busy {
            return Err(Error::Busy);
        }
        let image = state.image.clone().ok_or(Error::NoImage)?;
        if let Some(epsilon) = epsilon {
            self.store_epsilon(&mut state, epsilon);
        }
        state.busy = true;

        let tag = state.tag(with_epsilon);
        let guard = BusyGuard { state: &self.state };
        Ok((image, state.epsilon, tag, guard))
    }

    /// Store a finished request's outcome if its tag still matches
    fn finish(
        &self,
        tag: Tag,
        result: PredictionResult,
        apply: impl FnOnce(&mut SessionState, PredictionResult),
    ) -> Completion {
        let mut state = self.state();
        if state.tag(tag.epsilon.is_some()) != tag {
            warn!(
                "discarding response for image version {} (now {})",
                tag.version, state.version
            );
            return Completion::Superseded;
        }

        apply(&mut state, result.clone());
        info!("result: {result}");
        Completion::Applied(result)
    }

    /// Classify the current image
    pub async fn predict_clean(&self) -> Result<Completion> {
        let (image, _, tag, _busy) = self.begin(false, None)?;

        let result = match &self.backend {
            Backend::Local => local_clean_result(),
            Backend::Remote(client) => match client.predict(&Tensor::from(&image)).await {
                Ok(value) => PredictionResult::from_json(value),
                Err(err) => {
                    warn!("predict failed: {err}");
                    PredictionResult::Error(err.to_string())
                }
            },
        };

        Ok(self.finish(tag, result, |state, result| state.clean = Some(result)))
    }

    /// Attack the current image with the session's ε
    pub async fn run_attack(&self) -> Result<Completion> {
        self.attack(None).await
    }

    /// Set ε, then attack. A rejected attack leaves ε as it was
    pub async fn run_attack_with(&self, epsilon: f64) -> Result<Completion> {
        self.attack(Some(Epsilon::new(epsilon)?)).await
    }

    async fn attack(&self, epsilon: Option<Epsilon>) -> Result<Completion> {
        let (image, epsilon, tag, _busy) = self.begin(true, epsilon)?;

        let (result, perturbed) = match &self.backend {
            Backend::Local => {
                let perturbed = perturb::synthesize(&image, epsilon);
                (
                    local_adversarial_result(),
                    Some(PerturbedImage::Synthesized(perturbed)),
                )
            }
            Backend::Remote(client) => match client.attack(&Tensor::from(&image), epsilon).await {
                Ok(value) => {
                    let (result, image) = PredictionResult::from_attack_json(value);
                    (result, image.map(PerturbedImage::Remote))
                }
                Err(err) => {
                    warn!("attack failed: {err}");
                    (PredictionResult::Error(err.to_string()), None)
                }
            },
        };

        Ok(self.finish(tag, result, |state, result| {
            state.adversarial = Some(result);
            if let Some(perturbed) = perturbed {
                state.perturbed = Some(perturbed);
            }
        }))
    }

    pub fn epsilon(&self) -> Epsilon {
        self.state().epsilon
    }

    pub fn is_busy(&self) -> bool {
        self.state().busy
    }

    pub fn canonical_image(&self) -> Option<CanonicalImage> {
        self.state().image.clone()
    }

    pub fn perturbed_image(&self) -> Option<PerturbedImage> {
        self.state().perturbed.clone()
    }

    pub fn clean_result(&self) -> Option<PredictionResult> {
        self.state().clean.clone()
    }

    pub fn adversarial_result(&self) -> Option<PredictionResult> {
        self.state().adversarial.clone()
    }

    pub fn snapshot(&self) -> Snapshot {
        let state = self.state();
        Snapshot {
            mode: self.mode(),
            epsilon: state.epsilon,
            busy: state.busy,
            has_image: state.image.is_some(),
            has_perturbed: state.perturbed.is_some(),
            version: state.version,
            clean: inference::format(state.clean.as_ref()),
            adversarial: inference::format(state.adversarial.as_ref()),
            illustrative: self.mode() == Mode::Local,
        }
    }
}

use provador_contracts::chat::ChatTurn;
use provador_contracts::events::{now_utc_iso, EventPayload, SessionEvent, SessionLog};
use provador_contracts::summary::SessionSummary;
use provador_contracts::{ClothingDescription, EncodedImage, ImageAsset, Pose, TryOnError};
use serde_json::{json, Value};

use crate::client::GenerationClient;
use crate::compare::compose_before_after;
use crate::session::{
    GenerationToken, InFlight, Operation, SessionFailure, SessionPhase, SessionSnapshot,
    SessionState,
};

pub const MISSING_INPUTS_MESSAGE: &str = "Por favor, carregue a sua foto e a foto da roupa.";
pub const EMPTY_CHAT_MESSAGE: &str = "Digite uma pergunta para o estilista.";

/// Outcome of applying a remote reply to the session.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub enum Completion<T> {
    Applied(T),
    /// The inputs changed while the request was in flight; nothing was applied.
    Stale,
}

impl<T> Completion<T> {
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Stale)
    }

    pub fn applied(self) -> Option<T> {
        match self {
            Self::Applied(value) => Some(value),
            Self::Stale => None,
        }
    }
}

/// A try-on request for one pose, detached from the session.
#[derive(Debug, Clone)]
pub struct GenerationTicket {
    token: GenerationToken,
    pose: Pose,
    operation: Operation,
    person: ImageAsset,
    clothing: ImageAsset,
}

impl GenerationTicket {
    pub fn token(&self) -> GenerationToken {
        self.token
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn execute<C: GenerationClient + ?Sized>(
        &self,
        client: &C,
    ) -> Result<ImageAsset, TryOnError> {
        client.synthesize_try_on(&self.person, &self.clothing, self.pose)
    }
}

#[derive(Debug, Clone)]
pub struct DescriptionTicket {
    revision: u64,
    clothing: ImageAsset,
}

impl DescriptionTicket {
    pub fn execute<C: GenerationClient + ?Sized>(
        &self,
        client: &C,
    ) -> Result<ClothingDescription, TryOnError> {
        client.describe(&self.clothing)
    }
}

#[derive(Debug, Clone)]
pub struct AccessoryTicket {
    token: GenerationToken,
    pose: Pose,
    base: EncodedImage,
    accessory: ImageAsset,
}

impl AccessoryTicket {
    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn execute<C: GenerationClient + ?Sized>(
        &self,
        client: &C,
    ) -> Result<ImageAsset, TryOnError> {
        client.edit_with_accessory(&self.base, &self.accessory)
    }
}

#[derive(Debug, Clone)]
pub struct ChatTicket {
    token: GenerationToken,
    question: String,
    image: EncodedImage,
}

impl ChatTicket {
    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn execute<C: GenerationClient + ?Sized>(&self, client: &C) -> Result<String, TryOnError> {
        client.chat_advice(&self.image, &self.question)
    }
}

#[derive(Debug, Clone)]
pub enum PoseChange {
    /// Already generated; the selection moved with no remote call.
    Cached,
    /// Selection moved but there is nothing to generate from.
    MissingInputs,
    Pending(GenerationTicket),
}

/// Owns the session state and sequences every remote call against it.
///
/// Each remote operation is split in three: `begin_*` updates state and hands
/// back a ticket, `Ticket::execute` talks to the client, `complete_*` applies
/// the reply if the ticket is still current. The plain methods (`generate`,
/// `change_pose`, ...) run all three in a row.
pub struct Orchestrator<C> {
    client: C,
    state: SessionState,
    log: Option<SessionLog>,
    accessories_applied: u64,
}

impl<C: GenerationClient> Orchestrator<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            state: SessionState::default(),
            log: None,
            accessories_applied: 0,
        }
    }

    pub fn with_log(mut self, log: SessionLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.phase()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.snapshot()
    }

    pub fn current_result(&self) -> Option<&ImageAsset> {
        self.state.current_result()
    }

    pub fn accessories_applied(&self) -> u64 {
        self.accessories_applied
    }

    /// Both inputs present, nothing in flight and no description pending.
    pub fn can_generate(&self) -> bool {
        self.state.has_inputs() && self.state.in_flight.is_none() && !self.state.describing
    }

    pub fn upload_person(&mut self, person: ImageAsset) {
        self.emit(SessionEvent::PersonUploaded, asset_payload(&person));
        tracing::info!(label = person.label(), bytes = person.len(), "person image set");
        self.state.person = Some(person);
        self.invalidate_results();
    }

    /// Replaces the clothing image and returns the description request for it.
    pub fn upload_clothing(&mut self, clothing: ImageAsset) -> DescriptionTicket {
        self.emit(SessionEvent::ClothingUploaded, asset_payload(&clothing));
        tracing::info!(label = clothing.label(), bytes = clothing.len(), "clothing image set");
        self.state.clothing = Some(clothing.clone());
        self.state.description = None;
        self.state.describing = true;
        self.state.clothing_revision += 1;
        self.invalidate_results();
        DescriptionTicket {
            revision: self.state.clothing_revision,
            clothing,
        }
    }

    /// Never fails: any error becomes the fallback description.
    pub fn complete_description(
        &mut self,
        ticket: DescriptionTicket,
        result: Result<ClothingDescription, TryOnError>,
    ) -> Completion<ClothingDescription> {
        if ticket.revision != self.state.clothing_revision {
            self.discard_stale("description", json!({ "revision": ticket.revision }));
            return Completion::Stale;
        }
        self.state.describing = false;
        let (description, fallback) = match result {
            Ok(description) => (description, false),
            Err(err) => {
                tracing::warn!(error = %err, "clothing description failed; using fallback");
                (ClothingDescription::fallback(), true)
            }
        };
        self.emit(
            SessionEvent::DescriptionReady,
            json!({
                "name": description.name,
                "fallback": fallback,
            }),
        );
        self.state.description = Some(description.clone());
        Completion::Applied(description)
    }

    pub fn describe_clothing(&mut self, clothing: ImageAsset) -> Completion<ClothingDescription> {
        let ticket = self.upload_clothing(clothing);
        let result = ticket.execute(&self.client);
        self.complete_description(ticket, result)
    }

    /// Starts a fresh generation at the default pose, dropping every cached pose.
    pub fn begin_generate(&mut self) -> Result<GenerationTicket, TryOnError> {
        let (Some(person), Some(clothing)) = (self.state.person.clone(), self.state.clothing.clone())
        else {
            let err = TryOnError::validation(MISSING_INPUTS_MESSAGE);
            self.state.error = Some(SessionFailure {
                operation: Operation::Generate,
                error: err.clone(),
            });
            self.emit(SessionEvent::GenerationRejected, json!({ "error": err.to_string() }));
            return Err(err);
        };

        let token = self.state.invalidate();
        let pose = Pose::default();
        self.state.selected_pose = pose;
        self.state.results.clear();
        self.state.error = None;
        self.state.transcript.reset();
        self.state.chat_loading = false;
        self.state.in_flight = Some(InFlight::Generating);
        self.emit(
            SessionEvent::GenerationStarted,
            json!({
                "pose": pose.slug(),
                "operation": "generate",
                "token": token.value(),
            }),
        );
        Ok(GenerationTicket {
            token,
            pose,
            operation: Operation::Generate,
            person,
            clothing,
        })
    }

    /// Applies a try-on reply from either a fresh generation or a pose change.
    pub fn complete_generation(
        &mut self,
        ticket: GenerationTicket,
        result: Result<ImageAsset, TryOnError>,
    ) -> Result<Completion<ImageAsset>, TryOnError> {
        if ticket.token != self.state.token {
            self.discard_stale(
                "generation",
                json!({ "pose": ticket.pose.slug(), "token": ticket.token.value() }),
            );
            return Ok(Completion::Stale);
        }
        self.state.in_flight = None;
        match result {
            Ok(image) => {
                self.state.results.insert(ticket.pose, image.clone());
                self.state.transcript.seed_greeting();
                tracing::info!(pose = ticket.pose.slug(), bytes = image.len(), "try-on ready");
                let mut payload = asset_payload(&image);
                payload.insert("pose".to_string(), json!(ticket.pose.slug()));
                payload.insert("cached_poses".to_string(), json!(self.state.results.len()));
                self.emit(SessionEvent::GenerationFinished, payload);
                Ok(Completion::Applied(image))
            }
            Err(err) => {
                let failure = SessionFailure {
                    operation: ticket.operation,
                    error: err.clone(),
                };
                tracing::warn!(pose = ticket.pose.slug(), error = %err, "try-on failed");
                self.emit(
                    SessionEvent::GenerationFailed,
                    json!({
                        "pose": ticket.pose.slug(),
                        "error": failure.to_string(),
                    }),
                );
                self.state.error = Some(failure);
                Err(err)
            }
        }
    }

    pub fn generate(&mut self) -> Result<Completion<ImageAsset>, TryOnError> {
        let ticket = self.begin_generate()?;
        let result = ticket.execute(&self.client);
        self.complete_generation(ticket, result)
    }

    /// Moves the selection to `pose`; only an uncached pose needs a remote call.
    pub fn begin_change_pose(&mut self, pose: Pose) -> PoseChange {
        self.state.selected_pose = pose;
        if self.state.results.contains(pose) {
            self.emit(SessionEvent::PoseSelected, json!({ "pose": pose.slug(), "cached": true }));
            return PoseChange::Cached;
        }
        let (Some(person), Some(clothing)) = (self.state.person.clone(), self.state.clothing.clone())
        else {
            return PoseChange::MissingInputs;
        };

        self.state.error = None;
        self.state.in_flight = Some(InFlight::ChangingPose { pose });
        self.emit(
            SessionEvent::GenerationStarted,
            json!({
                "pose": pose.slug(),
                "operation": "change_pose",
                "token": self.state.token.value(),
            }),
        );
        PoseChange::Pending(GenerationTicket {
            token: self.state.token,
            pose,
            operation: Operation::ChangePose,
            person,
            clothing,
        })
    }

    pub fn change_pose(&mut self, pose: Pose) -> Result<Completion<ImageAsset>, TryOnError> {
        match self.begin_change_pose(pose) {
            PoseChange::Cached => self
                .state
                .current_result()
                .cloned()
                .map(Completion::Applied)
                .ok_or(TryOnError::MissingResult),
            PoseChange::MissingInputs => Err(TryOnError::validation(MISSING_INPUTS_MESSAGE)),
            PoseChange::Pending(ticket) => {
                let result = ticket.execute(&self.client);
                self.complete_generation(ticket, result)
            }
        }
    }

    /// Fails without touching state when the selected pose has no image yet.
    pub fn begin_accessory(&mut self, accessory: ImageAsset) -> Result<AccessoryTicket, TryOnError> {
        let pose = self.state.selected_pose;
        let base = self
            .state
            .current_result()
            .map(ImageAsset::encode)
            .ok_or(TryOnError::MissingResult)?;

        self.state.error = None;
        self.state.in_flight = Some(InFlight::AddingAccessory { pose });
        let mut payload = asset_payload(&accessory);
        payload.insert("pose".to_string(), json!(pose.slug()));
        self.emit(SessionEvent::AccessoryStarted, payload);
        Ok(AccessoryTicket {
            token: self.state.token,
            pose,
            base,
            accessory,
        })
    }

    /// On success only the ticket's pose entry is replaced.
    pub fn complete_accessory(
        &mut self,
        ticket: AccessoryTicket,
        result: Result<ImageAsset, TryOnError>,
    ) -> Result<Completion<ImageAsset>, TryOnError> {
        if ticket.token != self.state.token {
            self.discard_stale(
                "accessory",
                json!({ "pose": ticket.pose.slug(), "token": ticket.token.value() }),
            );
            return Ok(Completion::Stale);
        }
        self.state.in_flight = None;
        match result {
            Ok(image) => {
                self.state.results.insert(ticket.pose, image.clone());
                self.accessories_applied += 1;
                tracing::info!(pose = ticket.pose.slug(), "accessory applied");
                let mut payload = asset_payload(&image);
                payload.insert("pose".to_string(), json!(ticket.pose.slug()));
                self.emit(SessionEvent::AccessoryApplied, payload);
                Ok(Completion::Applied(image))
            }
            Err(err) => {
                let failure = SessionFailure {
                    operation: Operation::AddAccessory,
                    error: err.clone(),
                };
                tracing::warn!(pose = ticket.pose.slug(), error = %err, "accessory edit failed");
                self.emit(
                    SessionEvent::AccessoryFailed,
                    json!({
                        "pose": ticket.pose.slug(),
                        "error": failure.to_string(),
                    }),
                );
                self.state.error = Some(failure);
                Err(err)
            }
        }
    }

    pub fn add_accessory(
        &mut self,
        accessory: ImageAsset,
    ) -> Result<Completion<ImageAsset>, TryOnError> {
        let ticket = self.begin_accessory(accessory)?;
        let result = ticket.execute(&self.client);
        self.complete_accessory(ticket, result)
    }

    /// Records the user's turn and returns the advice request for the shown image.
    pub fn begin_chat(&mut self, text: &str) -> Result<ChatTicket, TryOnError> {
        let question = text.trim();
        if question.is_empty() {
            return Err(TryOnError::validation(EMPTY_CHAT_MESSAGE));
        }
        let image = self
            .state
            .current_result()
            .map(ImageAsset::encode)
            .ok_or(TryOnError::MissingResult)?;

        self.state.transcript.push_user(question);
        self.state.chat_loading = true;
        self.emit(SessionEvent::ChatMessage, json!({ "text": question }));
        Ok(ChatTicket {
            token: self.state.token,
            question: question.to_string(),
            image,
        })
    }

    /// Appends the reply, or the formatted error, as an assistant turn.
    pub fn complete_chat(
        &mut self,
        ticket: ChatTicket,
        result: Result<String, TryOnError>,
    ) -> Completion<ChatTurn> {
        if ticket.token != self.state.token {
            self.discard_stale("chat", json!({ "token": ticket.token.value() }));
            return Completion::Stale;
        }
        self.state.chat_loading = false;
        let turn = match result {
            Ok(reply) => {
                self.emit(SessionEvent::ChatReply, json!({ "text": reply }));
                self.state.transcript.push_assistant(reply)
            }
            Err(err) => {
                tracing::warn!(error = %err, "stylist reply failed");
                self.emit(SessionEvent::ChatFailed, json!({ "error": err.to_string() }));
                self.state.transcript.push_error(&err.to_string())
            }
        };
        Completion::Applied(turn.clone())
    }

    pub fn send_chat(&mut self, text: &str) -> Result<Completion<ChatTurn>, TryOnError> {
        let ticket = self.begin_chat(text)?;
        let result = ticket.execute(&self.client);
        Ok(self.complete_chat(ticket, result))
    }

    /// Person photo on the left of `split`, current result on the right.
    pub fn compare(&self, split: f64) -> Result<ImageAsset, TryOnError> {
        let before = self
            .state
            .person
            .as_ref()
            .ok_or_else(|| TryOnError::validation(MISSING_INPUTS_MESSAGE))?;
        let after = self
            .state
            .current_result()
            .ok_or(TryOnError::MissingResult)?;
        Ok(compose_before_after(before, after, split)?)
    }

    pub fn summary(&self, session_id: &str, started_at: &str) -> SessionSummary {
        SessionSummary {
            session_id: session_id.to_string(),
            started_at: started_at.to_string(),
            finished_at: now_utc_iso(),
            poses_generated: self.state.results.poses(),
            accessories_applied: self.accessories_applied,
            chat_turns: self.state.transcript.len() as u64,
            description: self.state.description.clone(),
        }
    }

    fn invalidate_results(&mut self) {
        self.state.invalidate();
        self.state.results.clear();
        self.state.error = None;
        self.state.in_flight = None;
        self.state.chat_loading = false;
        self.state.transcript.reset();
    }

    fn discard_stale(&self, operation: &str, mut detail: Value) {
        tracing::debug!(operation, "discarding stale reply");
        if let Value::Object(map) = &mut detail {
            map.insert("operation".to_string(), json!(operation));
        }
        self.emit(SessionEvent::StaleResultDiscarded, detail);
    }

    fn emit(&self, event: SessionEvent, payload: impl Into<Value>) {
        let Some(log) = &self.log else {
            return;
        };
        let payload = match payload.into() {
            Value::Object(map) => map,
            _ => EventPayload::new(),
        };
        if let Err(err) = log.emit(event, payload) {
            tracing::warn!(event = event.as_str(), error = %err, "session log write failed");
        }
    }
}

fn asset_payload(asset: &ImageAsset) -> EventPayload {
    let mut payload = EventPayload::new();
    payload.insert("label".to_string(), json!(asset.label()));
    payload.insert("mime_type".to_string(), json!(asset.mime_type()));
    payload.insert("bytes".to_string(), json!(asset.len()));
    payload.insert("fingerprint".to_string(), json!(asset.fingerprint()));
    payload
}

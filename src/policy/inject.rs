//! Injecting policy.
//!
//! [`Inject`] can send messages the real endpoints never wrote. Because the
//! server checks the counter of every client frame, client traffic is not
//! relayed as raw chunks: it is reassembled, each frame's counter is
//! rewritten through [`SequenceState`], and the frame is forwarded on its
//! own. Server traffic carries no counter and is relayed as soon as it is
//! read, so an injection toward the client is held back while a server
//! frame is only partly relayed and goes out once that frame completes.
//!
//! Each decoded message is queued for the persistence sink and the
//! reporter, handed to the callback and to automation, then kept in
//! history. Sinks are never awaited on the relay path.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, info};

use super::{
    BoxFuture, FrameDecoder, HandlerPolicy, History, Injection, MessageCallback, NoCallback,
    Observed, Outbound,
};
use crate::automation::{AutomationController, Reporter};
use crate::config::{
    BridgeConfig, ConsumptionPolicy, DEFAULT_HISTORY_CAPACITY, DEFAULT_SINK_QUEUE,
};
use crate::error::{BridgeError, Result};
use crate::link::Link;
use crate::pacing::Pacer;
use crate::protocol::{
    build_frame, Directional, Frame, Header, Role, StreamBuffer, MAX_PAYLOAD_SIZE,
};
use crate::registry::{Message, MessageRegistry};
use crate::sequence::SequenceState;
use crate::sink::{PersistenceSink, ReportingSink, SinkQueue};

/// Relays, observes and injects.
pub struct Inject<C = NoCallback> {
    decoder: FrameDecoder,
    buffers: Directional<StreamBuffer>,
    sequence: SequenceState,
    history: History,
    persistence: Option<Arc<dyn PersistenceSink>>,
    reporter: Option<Reporter>,
    sinks: Option<SinkQueue>,
    sink_capacity: usize,
    automation: Option<AutomationController>,
    held_for_client: VecDeque<Vec<u8>>,
    pacer: Pacer,
    callback: C,
}

impl Inject<NoCallback> {
    /// Create an inject policy without a callback.
    pub fn new(registry: Arc<MessageRegistry>) -> Self {
        Self::with_callback(registry, NoCallback)
    }
}

impl<C: MessageCallback> Inject<C> {
    /// Create an inject policy that hands every decoded message to
    /// `callback`.
    pub fn with_callback(registry: Arc<MessageRegistry>, callback: C) -> Self {
        Self {
            decoder: FrameDecoder::new(registry),
            buffers: Directional::from_fn(StreamBuffer::new),
            sequence: SequenceState::new(),
            history: History::new(DEFAULT_HISTORY_CAPACITY),
            persistence: None,
            reporter: None,
            sinks: None,
            sink_capacity: DEFAULT_SINK_QUEUE,
            automation: None,
            held_for_client: VecDeque::new(),
            pacer: Pacer::disabled(),
            callback,
        }
    }

    /// Apply the inject, automation and report sections of `config`.
    ///
    /// Reporting is only enabled when `reporting` is given.
    pub fn configure(
        mut self,
        config: &BridgeConfig,
        reporting: Option<Arc<dyn ReportingSink>>,
    ) -> Self {
        self.history = History::new(config.inject.history_capacity);
        self.pacer = Pacer::from_millis(config.inject.forward_delay_ms);
        self.decoder = self.decoder.with_consumption(config.inject.consumption);
        self.sink_capacity = config.inject.sink_queue;
        if let Some(automation) = &config.automation {
            self.automation = Some(AutomationController::new(automation.clone(), Instant::now()));
        }
        if let (Some(rule), Some(sink)) = (&config.report, reporting) {
            self.reporter = Some(Reporter::new(rule.clone(), sink));
        }
        self
    }

    /// Set the number of decoded messages kept.
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history = History::new(capacity);
        self
    }

    /// Set the accepted decode leftovers.
    pub fn with_consumption(mut self, consumption: ConsumptionPolicy) -> Self {
        self.decoder = self.decoder.with_consumption(consumption);
        self
    }

    /// Dump every decoded message to `sink`.
    pub fn with_persistence(mut self, sink: Arc<dyn PersistenceSink>) -> Self {
        self.persistence = Some(sink);
        self
    }

    /// Report matching responses.
    pub fn with_reporter(mut self, reporter: Reporter) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Run automation on observed traffic.
    pub fn with_automation(mut self, automation: AutomationController) -> Self {
        self.automation = Some(automation);
        self
    }

    /// Pause after each decoded frame.
    pub fn with_pacer(mut self, pacer: Pacer) -> Self {
        self.pacer = pacer;
        self
    }

    /// Recently decoded messages.
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Counter bookkeeping.
    pub fn sequence(&self) -> &SequenceState {
        &self.sequence
    }

    /// The automation controller, if enabled.
    pub fn automation(&self) -> Option<&AutomationController> {
        self.automation.as_ref()
    }

    /// The callback.
    pub fn callback(&self) -> &C {
        &self.callback
    }

    /// Client-bound injections waiting for the current server frame to
    /// finish.
    pub fn held_for_client(&self) -> usize {
        self.held_for_client.len()
    }

    /// Wait until every sink delivery queued so far has been attempted.
    pub async fn flush_sinks(&self) {
        if let Some(sinks) = &self.sinks {
            sinks.flush().await;
        }
    }

    /// Send a synthetic payload to the client.
    ///
    /// While a server frame is only partly relayed the payload is held and
    /// sent right after that frame.
    pub async fn send_to_primary(&mut self, link: &mut Link, payload: Outbound) -> Result<()> {
        let bytes = match payload {
            Outbound::Raw(bytes) => bytes.to_vec(),
            Outbound::Message(message) => {
                let (id, body) = self.decoder.registry().encode(&message)?;
                let bytes = encode_frame(id, None, &body)?;
                debug!("<- {} ({} Bytes) injected", message.name, body.len());
                bytes
            }
        };

        if self.buffers.get(Role::Secondary).is_empty() {
            self.deliver_to_primary(link, &bytes).await
        } else {
            self.held_for_client.push_back(bytes);
            debug!(
                held = self.held_for_client.len(),
                "server frame in flight, holding client injection"
            );
            Ok(())
        }
    }

    /// Send a synthetic payload to the server.
    ///
    /// Structured messages are stamped with the next counter. Raw payloads
    /// must already carry it (see [`SequenceState::next_counter`]).
    pub async fn send_to_secondary(&mut self, link: &mut Link, payload: Outbound) -> Result<()> {
        match payload {
            Outbound::Raw(bytes) => {
                link.send(Role::Secondary, &bytes).await?;
                self.sequence.record_raw_toward_server();
            }
            Outbound::Message(message) => {
                let (id, body) = self.decoder.registry().encode(&message)?;
                let bytes = encode_frame(id, Some(self.sequence.next_counter()), &body)?;
                let counter = self.sequence.assign_toward_server();
                debug!("-> [{}] {} ({} Bytes) injected", counter, message.name, body.len());
                link.send(Role::Secondary, &bytes).await?;
            }
        }
        Ok(())
    }

    async fn deliver_to_primary(&mut self, link: &mut Link, bytes: &[u8]) -> Result<()> {
        link.send(Role::Primary, bytes).await?;
        self.sequence.record_toward_client();
        Ok(())
    }

    async fn release_held(&mut self, link: &mut Link) -> Result<()> {
        while let Some(bytes) = self.held_for_client.pop_front() {
            self.deliver_to_primary(link, &bytes).await?;
        }
        Ok(())
    }

    async fn handle_frame(&mut self, frame: Frame, origin: Role, link: &mut Link) -> Result<()> {
        let counter = match frame.counter() {
            Some(original) if origin == Role::Primary => {
                let rewritten = self.sequence.rewrite_genuine(original);
                link.send(Role::Secondary, frame.with_counter(rewritten).raw())
                    .await?;
                Some(rewritten)
            }
            _ => None,
        };

        let Some(message) = self.decoder.decode(&frame)? else {
            // undecodable frames still advance the automation clock
            let outgoing = self.automate(None, origin);
            return self.send_all(link, outgoing).await;
        };

        match counter {
            Some(counter) => debug!(
                "-> [{}] {} ({} Bytes)",
                counter,
                message.name,
                frame.declared_len()
            ),
            None => debug!("<- {} ({} Bytes)", message.name, frame.declared_len()),
        }

        self.observe(message, origin, counter, link).await?;
        self.pacer.pause().await;
        Ok(())
    }

    async fn observe(
        &mut self,
        message: Message,
        origin: Role,
        counter: Option<u32>,
        link: &mut Link,
    ) -> Result<()> {
        if let Some(sink) = self.persistence.clone() {
            self.sink_queue().dump(sink, message.clone(), origin);
        }
        let report = self.reporter.as_ref().and_then(|reporter| {
            reporter
                .extract(&message)
                .map(|(identifier, values)| (Arc::clone(reporter.sink()), identifier, values))
        });
        if let Some((sink, identifier, values)) = report {
            info!(%identifier, ?values, "reporting response");
            self.sink_queue().report(sink, identifier, values);
        }
        self.callback.on_message(&message, origin);

        let outgoing = self.automate(Some(&message), origin);

        self.history.push(Observed {
            origin,
            counter,
            message,
        });

        self.send_all(link, outgoing).await
    }

    /// Run automation for one observed frame and render its actions.
    fn automate(&mut self, message: Option<&Message>, origin: Role) -> Vec<Message> {
        let Some(automation) = self.automation.as_mut() else {
            return Vec::new();
        };
        let now = Instant::now();
        let actions = match message {
            Some(message) => automation.observe(message, origin, now),
            None => automation.tick(now).into_iter().collect(),
        };
        actions
            .iter()
            .flat_map(|action| automation.messages_for(action))
            .collect()
    }

    async fn send_all(&mut self, link: &mut Link, outgoing: Vec<Message>) -> Result<()> {
        for message in outgoing {
            self.send_to_secondary(link, Outbound::Message(message)).await?;
        }
        Ok(())
    }

    fn sink_queue(&mut self) -> &SinkQueue {
        let capacity = self.sink_capacity;
        self.sinks.get_or_insert_with(|| SinkQueue::spawn(capacity))
    }
}

fn encode_frame(id: u16, counter: Option<u32>, body: &[u8]) -> Result<Vec<u8>> {
    if body.len() > MAX_PAYLOAD_SIZE as usize {
        return Err(BridgeError::Protocol(format!(
            "Payload size {} exceeds maximum {}",
            body.len(),
            MAX_PAYLOAD_SIZE
        )));
    }
    let header = Header::new(id, counter, body.len() as u32);
    header.validate()?;
    Ok(build_frame(&header, body))
}

impl<C: MessageCallback> HandlerPolicy for Inject<C> {
    fn on_chunk<'a>(
        &'a mut self,
        chunk: &'a [u8],
        origin: Role,
        link: &'a mut Link,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if origin == Role::Secondary {
                link.send(Role::Primary, chunk).await?;
            }
            self.buffers.get_mut(origin).append(chunk);
            while let Some(frame) = self.buffers.get_mut(origin).try_extract_frame() {
                self.handle_frame(frame, origin, link).await?;
            }
            if origin == Role::Secondary && self.buffers.get(Role::Secondary).is_empty() {
                self.release_held(link).await?;
            }
            Ok(())
        })
    }

    fn on_injection<'a>(
        &'a mut self,
        injection: Injection,
        link: &'a mut Link,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            match injection.target {
                Role::Primary => self.send_to_primary(link, injection.payload).await,
                Role::Secondary => self.send_to_secondary(link, injection.payload).await,
            }
        })
    }
}

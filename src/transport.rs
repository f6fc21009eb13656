//! # Transport Module
//!
//! Boundary between the dispatch core and whatever delivers requests, such as a
//! message-queue front end. The core never does network I/O itself; a [`Transport`]
//! hands over one event at a time and takes the finished response back.
//!
//! [`QueueTransport`] is an in-memory implementation for tests, benchmarks and
//! embedding.

use std::collections::VecDeque;

use crate::dispatcher::{Request, Response};

/// One unit of work delivered by a transport.
#[derive(Debug)]
pub enum TransportEvent {
    /// A complete request ready for dispatch
    Request(Request),
    /// The front end stopped reading a body that exceeded its own limit. Answered with
    /// 413 without running any stage.
    BodyTooLarge { request: Request, limit: usize },
}

/// Source of requests and sink for responses.
pub trait Transport {
    /// Next event, or `None` once the transport is drained or shut down.
    ///
    /// # Errors
    ///
    /// Transport-level failures end the serve loop.
    fn recv(&mut self) -> anyhow::Result<Option<TransportEvent>>;

    /// Deliver a response. Honor [`Response::close_connection`] when set.
    ///
    /// # Errors
    ///
    /// Transport-level failures end the serve loop.
    fn send(&mut self, response: Response) -> anyhow::Result<()>;
}

/// FIFO transport backed by in-memory queues.
#[derive(Debug, Default)]
pub struct QueueTransport {
    inbox: VecDeque<TransportEvent>,
    outbox: Vec<Response>,
}

impl QueueTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: TransportEvent) {
        self.inbox.push_back(event);
    }

    pub fn push_request(&mut self, request: Request) {
        self.push(TransportEvent::Request(request));
    }

    /// Responses sent so far, in send order.
    #[must_use]
    pub fn sent(&self) -> &[Response] {
        &self.outbox
    }

    pub fn take_sent(&mut self) -> Vec<Response> {
        std::mem::take(&mut self.outbox)
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.inbox.len()
    }
}

impl Transport for QueueTransport {
    fn recv(&mut self) -> anyhow::Result<Option<TransportEvent>> {
        Ok(self.inbox.pop_front())
    }

    fn send(&mut self, response: Response) -> anyhow::Result<()> {
        self.outbox.push(response);
        Ok(())
    }
}

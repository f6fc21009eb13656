use std::sync::Arc;

use http::{Method, StatusCode};
use tracing::{debug, error, info, info_span, trace, warn};

use super::fault::{catch_panic, error_backtrace, error_class};
use super::request::{Request, RequestId};
use super::response::Response;
use crate::config::AppConfig;
use crate::plugins::PluginChain;
use crate::status::{finish_with, status_permits_body, Interrupt, StageResult, StatusInfo};

/// Header carrying the correlation id in both directions.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Runs requests through a resolved plugin chain.
///
/// Every dispatch walks three stages over the chain, in chain order:
///
/// 1. pre-request fixup: each plugin receives the request by value and returns it
/// 2. handling: plugins are offered the request until one produces a response
/// 3. post-response fixup: each plugin may adjust the response
///
/// A stage that returns [`Interrupt::Finish`] stops the pipeline and the status
/// response is sent instead, without post-response fixup. Faults and panics are caught
/// here, logged, and turned into a generic 500. [`Dispatcher::dispatch`] always returns
/// a response.
#[derive(Clone, Debug)]
pub struct Dispatcher {
    chain: Arc<PluginChain>,
    config: Arc<AppConfig>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(chain: Arc<PluginChain>, config: Arc<AppConfig>) -> Self {
        Self { chain, config }
    }

    #[must_use]
    pub fn chain(&self) -> &PluginChain {
        &self.chain
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Process one request to completion.
    pub fn dispatch(&self, mut req: Request) -> Response {
        if let Some(header) = req.get_header(REQUEST_ID_HEADER) {
            req.id = RequestId::from_header_or_new(Some(header));
        }
        let span = info_span!(
            "dispatch",
            request_id = %req.id,
            method = %req.method,
            path = %req.path
        );
        let _entered = span.enter();

        let request_id = req.id;
        let method = req.method.clone();
        let received_at = req.received_at;

        if req.body.len() > self.config.max_body_size {
            warn!(
                body_size = req.body.len(),
                max_body_size = self.config.max_body_size,
                "Request body exceeds limit"
            );
            return self.reject_oversized(&req, self.config.max_body_size);
        }

        let outcome = catch_panic(|| self.run_stages(req));
        let mut res = match outcome {
            Ok(Ok(res)) => res,
            Ok(Err(Interrupt::Finish(info))) => {
                debug!(
                    status = info.status.as_u16(),
                    message = ?info.message,
                    "Dispatch finished early"
                );
                Response::from_status(request_id, method, &info)
            }
            Ok(Err(Interrupt::Fault(err))) => {
                let backtrace = error_backtrace(&err);
                error!(
                    error = %err,
                    error_class = error_class(&err),
                    root_cause = %err.root_cause(),
                    chain_len = err.chain().count(),
                    backtrace = backtrace.as_deref(),
                    "Unhandled failure during dispatch"
                );
                self.internal_error(request_id, method)
            }
            Err(panic) => {
                error!(
                    panic_message = %panic.message,
                    location = panic.location.as_deref(),
                    backtrace = panic.backtrace.as_deref(),
                    "Plugin or handler panicked"
                );
                self.internal_error(request_id, method)
            }
        };

        self.finalize(&mut res);
        info!(
            status = res.status.as_u16(),
            latency_ms = u64::try_from(received_at.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Dispatch complete"
        );
        res
    }

    /// Terminal 413 for a request whose body was too large. No stage runs, and the
    /// transport is asked to close the connection.
    #[must_use]
    pub fn reject_oversized(&self, req: &Request, limit: usize) -> Response {
        let mut res = Response::from_status(
            req.id,
            req.method.clone(),
            &StatusInfo::payload_too_large(limit),
        );
        res.close_connection = true;
        self.finalize(&mut res);
        res
    }

    fn run_stages(&self, mut req: Request) -> StageResult<Response> {
        for unit in self.chain.iter() {
            trace!(plugin = %unit.name, "Pre-request fixup");
            req = unit.plugin.fixup_request(req)?;
        }

        let mut handled = None;
        for unit in self.chain.iter() {
            if let Some(res) = unit.plugin.handle_request(&mut req)? {
                debug!(plugin = %unit.name, status = res.status.as_u16(), "Response produced");
                handled = Some(res);
                break;
            }
        }
        let Some(mut res) = handled else {
            debug!("No plugin produced a response");
            return finish_with(StatusInfo::not_found());
        };

        for unit in self.chain.iter() {
            trace!(plugin = %unit.name, "Post-response fixup");
            unit.plugin.fixup_response(&req, &mut res)?;
        }
        Ok(res)
    }

    fn internal_error(&self, request_id: RequestId, method: Method) -> Response {
        let info = StatusInfo::new(StatusCode::INTERNAL_SERVER_ERROR)
            .with_message(self.config.error_message.clone());
        Response::from_status(request_id, method, &info)
    }

    /// Normalize headers and body right before the response leaves the engine.
    fn finalize(&self, res: &mut Response) {
        if status_permits_body(res.status) {
            if res.content_type().is_none() {
                res.set_header("content-type", self.config.default_content_type.clone());
            }
            if res.method == Method::HEAD {
                res.set_header("content-length", res.body.len().to_string());
                res.body.clear();
            }
        } else {
            res.body.clear();
            res.remove_header("content-length");
        }
        res.set_header(REQUEST_ID_HEADER, res.request_id.to_string());
    }
}

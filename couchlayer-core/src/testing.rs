//! A scripted transport for unit tests.

use async_trait::async_trait;
use std::{collections::VecDeque, sync::Mutex};

use crate::{
    error::{CouchError, CouchResult},
    transport::{Method, Request, Response, Transport},
};

/// Returns queued responses in order and records every request it sees.
///
/// Once the queue is empty every further request fails with a transport error, which makes
/// unexpected extra requests show up as test failures.
#[derive(Debug, Default)]
pub(crate) struct MockTransport {
    responses: Mutex<VecDeque<CouchResult<Response>>>,
    requests: Mutex<Vec<Request>>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(self, response: Response) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(response));
        self
    }

    pub(crate) fn fail(self, message: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(CouchError::Transport(message.to_string())));
        self
    }

    pub(crate) fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn methods(&self) -> Vec<Method> {
        self.requests().into_iter().map(|r| r.method).collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(&self, request: Request) -> CouchResult<Response> {
        let uri = request.uri.clone();
        self.requests.lock().unwrap().push(request);

        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(CouchError::Transport(format!("unexpected request to {uri}"))))
    }
}

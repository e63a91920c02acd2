use std::time::Duration;

use async_trait::async_trait;

use crate::td::{Request, Response};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("{message} (TDLib error {code})")]
    Td { code: i32, message: String },
    #[error("{0} timed out after {1:?}")]
    Timeout(&'static str, Duration),
    #[error("connection to the TDLib bridge was lost")]
    Disconnected,
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Request side of a TDLib client. Updates are delivered separately through
/// the channel handed out when the client is created.
#[async_trait]
pub trait TdClient: Send + Sync {
    /// Send a request and wait for its response. TDLib `error` objects come
    /// back as [`ClientError::Td`].
    async fn send(&self, request: Request) -> Result<Response, ClientError>;

    /// Send a request without waiting for the response.
    fn post(&self, request: Request) -> Result<(), ClientError>;
}

pub async fn send_with_timeout(
    client: &dyn TdClient,
    request: Request,
    timeout: Option<Duration>,
) -> Result<Response, ClientError> {
    let name = request.name();
    match timeout {
        Some(limit) => tokio::time::timeout(limit, client.send(request))
            .await
            .map_err(|_| ClientError::Timeout(name, limit))?,
        None => client.send(request).await,
    }
}

pub fn response_result(response: Response) -> Result<Response, ClientError> {
    match response {
        Response::Error(error) => Err(ClientError::Td {
            code: error.code,
            message: error.message,
        }),
        other => Ok(other),
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::{ClientError, TdClient};
    use crate::td::{Request, Response, TdError};

    /// Scripted client: answers requests from a queue (`Ok` once the queue is
    /// empty) and records everything it was asked.
    #[derive(Default)]
    pub struct FakeClient {
        responses: Mutex<VecDeque<Result<Response, ClientError>>>,
        sent: Mutex<Vec<Request>>,
        posted: Mutex<Vec<Request>>,
    }

    impl FakeClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn respond(&self, response: Response) {
            self.responses.lock().unwrap().push_back(Ok(response));
        }

        pub fn respond_td_error(&self, code: i32, message: &str) {
            self.responses.lock().unwrap().push_back(Ok(Response::Error(TdError {
                code,
                message: message.to_string(),
            })));
        }

        pub fn fail(&self, error: ClientError) {
            self.responses.lock().unwrap().push_back(Err(error));
        }

        pub fn sent(&self) -> Vec<Request> {
            self.sent.lock().unwrap().clone()
        }

        pub fn posted(&self) -> Vec<Request> {
            self.posted.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TdClient for FakeClient {
        async fn send(&self, request: Request) -> Result<Response, ClientError> {
            self.sent.lock().unwrap().push(request);
            let next = self.responses.lock().unwrap().pop_front();
            let response = next.unwrap_or(Ok(Response::Ok {}))?;
            super::response_result(response)
        }

        fn post(&self, request: Request) -> Result<(), ClientError> {
            self.posted.lock().unwrap().push(request);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::td::TdError;

    struct Stalled;

    #[async_trait]
    impl TdClient for Stalled {
        async fn send(&self, _request: Request) -> Result<Response, ClientError> {
            std::future::pending().await
        }

        fn post(&self, _request: Request) -> Result<(), ClientError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn timeout_names_the_request() {
        let error = send_with_timeout(&Stalled, Request::Close, Some(Duration::from_millis(10)))
            .await
            .expect_err("should time out");
        assert!(matches!(error, ClientError::Timeout("close", _)));
    }

    #[test]
    fn td_errors_become_client_errors() {
        let error = response_result(Response::Error(TdError {
            code: 400,
            message: "PHONE_CODE_INVALID".to_string(),
        }))
        .expect_err("error response");
        assert_eq!(error.to_string(), "PHONE_CODE_INVALID (TDLib error 400)");
        assert!(response_result(Response::Ok {}).is_ok());
    }
}

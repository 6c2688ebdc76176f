//! Shared fixtures for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use record_collector::{ClientConfig, ParamBag, RemoteCall, RemoteError};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

type Handler = Box<dyn Fn(&Value, usize) -> Result<Value, RemoteError> + Send + Sync>;

/// One recorded invocation.
#[derive(Debug, Clone)]
pub struct Call {
    pub client: ClientConfig,
    pub method: String,
    pub params: Value,
}

/// In-memory Remote Call whose responses are scripted per method.
///
/// Handlers receive the call's params and the number of earlier calls to
/// the same method.
#[derive(Default)]
pub struct ScriptedRemote {
    handlers: HashMap<String, Handler>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `method` with `handler`.
    pub fn on(
        mut self,
        method: &str,
        handler: impl Fn(&Value, usize) -> Result<Value, RemoteError> + Send + Sync + 'static,
    ) -> Self {
        self.handlers.insert(method.to_string(), Box::new(handler));
        self
    }

    /// Answer `method` with the same response every time.
    pub fn always(self, method: &str, response: Value) -> Self {
        self.on(method, move |_, _| Ok(response.clone()))
    }

    /// Every invocation so far, in call order.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Invocations of `method`, in call order.
    pub fn calls_to(&self, method: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| call.method == method)
            .collect()
    }
}

#[async_trait]
impl RemoteCall for ScriptedRemote {
    async fn invoke(
        &self,
        client: &ClientConfig,
        method: &str,
        params: &Value,
    ) -> Result<Value, RemoteError> {
        let index = {
            let mut calls = self.calls.lock().unwrap();
            let index = calls.iter().filter(|call| call.method == method).count();
            calls.push(Call {
                client: client.clone(),
                method: method.to_string(),
                params: params.clone(),
            });
            index
        };

        // Let concurrent siblings interleave.
        tokio::task::yield_now().await;

        match self.handlers.get(method) {
            Some(handler) => handler(params, index),
            None => Err(RemoteError::fatal(format!("unscripted method {}", method))),
        }
    }
}

/// Build a parameter bag from a JSON object literal.
pub fn bag(value: Value) -> ParamBag {
    value.as_object().cloned().unwrap_or_default()
}

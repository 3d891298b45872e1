//! Scripted [`CommandRunner`] shared by the service and route tests.

use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};

use pilot_process::{CommandRunner, Invocation, ProcessError};
use tokio::sync::Notify;

type Respond = dyn Fn(&[String]) -> Result<String, ProcessError> + Send + Sync;

pub struct ScriptedRunner {
    located: Option<PathBuf>,
    respond: Box<Respond>,
    calls: Mutex<Vec<Invocation>>,
    gate: Option<(String, Arc<Notify>)>,
}

impl ScriptedRunner {
    /// `respond` receives the arguments after the program name.
    pub fn new(
        respond: impl Fn(&[String]) -> Result<String, ProcessError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            located: Some(PathBuf::from("/opt/pilot/bin/sx")),
            respond: Box::new(respond),
            calls: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    pub fn without_binary(mut self) -> Self {
        self.located = None;
        self
    }

    /// Hold invocations that have `arg` among their arguments until `gate` is notified.
    pub fn gated(mut self, arg: &str, gate: Arc<Notify>) -> Self {
        self.gate = Some((arg.to_string(), gate));
        self
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_with(&self, arg: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|inv| inv.args().iter().any(|a| a == arg))
            .count()
    }
}

impl CommandRunner for ScriptedRunner {
    fn locate(&self, _program: &str) -> Option<PathBuf> {
        self.located.clone()
    }

    async fn run(&self, invocation: &Invocation) -> Result<String, ProcessError> {
        self.calls.lock().unwrap().push(invocation.clone());
        if let Some((arg, gate)) = &self.gate
            && invocation.args().iter().any(|a| a == arg)
        {
            gate.notified().await;
        }
        (self.respond)(invocation.args())
    }
}

pub fn exited(program: &str, code: i32, stderr: &str) -> ProcessError {
    ProcessError::Exited {
        program: program.to_string(),
        code: Some(code),
        stderr: stderr.to_string(),
    }
}

pub async fn body_json(resp: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#![allow(dead_code)]

use ocr_prep::{
    cancel::CancelToken,
    exec::{RunError, Runner, ToolCommand, ToolOutput},
};
use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Stand-in for tesseract and convert. The filter tool "fails" for chosen
/// inputs and can be slowed per input to shuffle completion order.
#[derive(Default)]
pub struct ScriptedRunner {
    pub version_output: Option<String>,
    pub fail: HashSet<String>,
    pub delays: HashMap<String, Duration>,
    pub calls: Mutex<Vec<ToolCommand>>,
}

impl ScriptedRunner {
    pub fn with_version(output: &str) -> Self {
        Self {
            version_output: Some(output.to_string()),
            ..Default::default()
        }
    }

    pub fn failing(mut self, input: &str) -> Self {
        self.fail.insert(input.to_string());
        self
    }

    pub fn delayed(mut self, input: &str, delay: Duration) -> Self {
        self.delays.insert(input.to_string(), delay);
        self
    }

    pub fn filter_calls(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.args.len() > 1)
            .count()
    }
}

impl Runner for ScriptedRunner {
    fn run(&self, cmd: &ToolCommand, _cancel: &CancelToken) -> Result<ToolOutput, RunError> {
        self.calls.lock().unwrap().push(cmd.clone());

        if cmd.args.len() == 1 {
            return match &self.version_output {
                Some(text) => Ok(ToolOutput {
                    success: true,
                    code: Some(0),
                    stdout: Vec::new(),
                    stderr: text.clone().into_bytes(),
                }),
                None => Err(RunError::Spawn {
                    program: cmd.program.clone(),
                    source: io::Error::new(io::ErrorKind::NotFound, "No such file or directory"),
                }),
            };
        }

        let input = cmd.args[0].as_str();
        if let Some(d) = self.delays.get(input) {
            std::thread::sleep(*d);
        }
        if self.fail.contains(input) {
            return Ok(ToolOutput {
                success: false,
                code: Some(1),
                stdout: Vec::new(),
                stderr: format!("convert: unable to open image `{input}'").into_bytes(),
            });
        }
        Ok(ToolOutput {
            success: true,
            code: Some(0),
            ..Default::default()
        })
    }
}

/// Every run blocks until the batch is cancelled, like a long tool call
/// that gets killed.
#[derive(Default)]
pub struct BlockingRunner {
    pub started: AtomicUsize,
    pub exited: AtomicUsize,
}

impl Runner for BlockingRunner {
    fn run(&self, cmd: &ToolCommand, cancel: &CancelToken) -> Result<ToolOutput, RunError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        while !cancel.is_cancelled() {
            std::thread::sleep(Duration::from_millis(5));
        }
        std::thread::sleep(Duration::from_millis(20));
        self.exited.fetch_add(1, Ordering::SeqCst);
        Err(RunError::Cancelled {
            program: cmd.program.clone(),
        })
    }
}

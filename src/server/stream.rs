//! UI message stream encoding.
//!
//! Chat events are re-framed as the JSON chunks the browser chat client
//! consumes over Server-Sent Events: one `start`, then `reasoning-*`,
//! `text-*` and `tool-input-*` blocks, then `finish` (or a single `error`),
//! terminated by `data: [DONE]`.

use std::collections::{HashMap, VecDeque};
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use axum::response::sse::Event;
use futures_util::Stream;
use pin_project_lite::pin_project;
use serde::Serialize;

use crate::Result;
use crate::types::ChatEvent;

/// Response header announcing the stream protocol version.
pub const UI_STREAM_HEADER: &str = "x-vercel-ai-ui-message-stream";
pub const UI_STREAM_VERSION: &str = "v1";

/// Error text sent to the client for any upstream failure.
pub const GENERIC_ERROR: &str = "Failed to generate text";

/// One chunk of the UI message stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum UiChunk {
    Start { message_id: String },
    StartStep,
    ReasoningStart { id: String },
    ReasoningDelta { id: String, delta: String },
    ReasoningEnd { id: String },
    TextStart { id: String },
    TextDelta { id: String, delta: String },
    TextEnd { id: String },
    ToolInputStart { tool_call_id: String, tool_name: String },
    ToolInputDelta { tool_call_id: String, input_text_delta: String },
    FinishStep,
    Finish,
    Error { error_text: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Reasoning,
    Text,
}

/// Stateful mapping from [`ChatEvent`]s to [`UiChunk`]s.
#[derive(Debug)]
pub struct UiStreamEncoder {
    message_id: String,
    next_block: usize,
    open: Option<(BlockKind, String)>,
    tool_ids: HashMap<usize, String>,
}

impl UiStreamEncoder {
    pub fn new(message_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            next_block: 0,
            open: None,
            tool_ids: HashMap::new(),
        }
    }

    pub fn start(&self) -> Vec<UiChunk> {
        vec![
            UiChunk::Start {
                message_id: self.message_id.clone(),
            },
            UiChunk::StartStep,
        ]
    }

    pub fn event(&mut self, event: &ChatEvent) -> Vec<UiChunk> {
        let mut out = Vec::new();
        match event {
            ChatEvent::Reasoning(delta) => {
                let id = self.ensure_block(BlockKind::Reasoning, &mut out);
                out.push(UiChunk::ReasoningDelta {
                    id,
                    delta: delta.clone(),
                });
            }
            ChatEvent::Content(delta) => {
                let id = self.ensure_block(BlockKind::Text, &mut out);
                out.push(UiChunk::TextDelta {
                    id,
                    delta: delta.clone(),
                });
            }
            ChatEvent::ToolCallStart { index, id, name } => {
                self.close_block(&mut out);
                self.tool_ids.insert(*index, id.clone());
                out.push(UiChunk::ToolInputStart {
                    tool_call_id: id.clone(),
                    tool_name: name.clone(),
                });
            }
            ChatEvent::ToolCallDelta { index, arguments } => {
                if let Some(id) = self.tool_ids.get(index) {
                    out.push(UiChunk::ToolInputDelta {
                        tool_call_id: id.clone(),
                        input_text_delta: arguments.clone(),
                    });
                }
            }
            ChatEvent::ToolCallEnd { .. } | ChatEvent::Usage(_) | ChatEvent::Done => {}
        }
        out
    }

    pub fn finish(&mut self) -> Vec<UiChunk> {
        let mut out = Vec::new();
        self.close_block(&mut out);
        out.push(UiChunk::FinishStep);
        out.push(UiChunk::Finish);
        out
    }

    pub fn error(&mut self) -> Vec<UiChunk> {
        let mut out = Vec::new();
        self.close_block(&mut out);
        out.push(UiChunk::Error {
            error_text: GENERIC_ERROR.to_owned(),
        });
        out
    }

    fn ensure_block(&mut self, kind: BlockKind, out: &mut Vec<UiChunk>) -> String {
        if let Some((open_kind, id)) = &self.open {
            if *open_kind == kind {
                return id.clone();
            }
        }
        self.close_block(out);
        let id = self.next_block.to_string();
        self.next_block += 1;
        out.push(match kind {
            BlockKind::Reasoning => UiChunk::ReasoningStart { id: id.clone() },
            BlockKind::Text => UiChunk::TextStart { id: id.clone() },
        });
        self.open = Some((kind, id.clone()));
        id
    }

    fn close_block(&mut self, out: &mut Vec<UiChunk>) {
        if let Some((kind, id)) = self.open.take() {
            out.push(match kind {
                BlockKind::Reasoning => UiChunk::ReasoningEnd { id },
                BlockKind::Text => UiChunk::TextEnd { id },
            });
        }
    }
}

fn sse_event(chunk: &UiChunk) -> std::result::Result<Event, axum::Error> {
    Event::default().json_data(chunk)
}

fn done_event() -> Event {
    Event::default().data("[DONE]")
}

pin_project! {
    /// SSE body for one streamed turn.
    pub struct UiMessageStream<S> {
        #[pin]
        inner: S,
        encoder: UiStreamEncoder,
        pending: VecDeque<std::result::Result<Event, axum::Error>>,
        started: bool,
        finished: bool,
    }
}

impl<S> UiMessageStream<S> {
    pub fn new(inner: S, message_id: impl Into<String>) -> Self {
        Self {
            inner,
            encoder: UiStreamEncoder::new(message_id),
            pending: VecDeque::new(),
            started: false,
            finished: false,
        }
    }
}

impl<S> Stream for UiMessageStream<S>
where
    S: Stream<Item = Result<ChatEvent>>,
{
    type Item = std::result::Result<Event, axum::Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        if !*this.started {
            *this.started = true;
            this.pending
                .extend(this.encoder.start().iter().map(sse_event));
        }
        loop {
            if let Some(item) = this.pending.pop_front() {
                return Poll::Ready(Some(item));
            }
            if *this.finished {
                return Poll::Ready(None);
            }

            let chunks = match ready!(this.inner.as_mut().poll_next(cx)) {
                Some(Ok(event)) => this.encoder.event(&event),
                Some(Err(_)) => {
                    // detail was logged where the failure happened
                    *this.finished = true;
                    this.encoder.error()
                }
                None => {
                    *this.finished = true;
                    this.encoder.finish()
                }
            };
            this.pending.extend(chunks.iter().map(sse_event));
            if *this.finished {
                this.pending.push_back(Ok(done_event()));
            }
        }
    }
}

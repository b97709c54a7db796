//! Reasoning extraction for models that think inline.
//!
//! Some upstream models emit a `<think>...</think>` preamble inside the
//! answer text, and some variants drop the opening tag. [`ReasoningProvider`]
//! normalises this: it makes sure the opening tag is present exactly once
//! and then splits the text into reasoning and visible content.
//!
//! The streaming path is two stages over the upstream [`ChatStream`]:
//!
//! 1. [`TagInjector`] holds back leading text until it can tell whether the
//!    response opens with the tag, and synthesises one if it does not.
//! 2. [`ReasoningSplitter`] turns tagged content into `Reasoning` and
//!    `Content` events, carrying partial tags across chunk boundaries.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};

use async_trait::async_trait;
use futures_util::Stream;
use pin_project_lite::pin_project;

use super::traits::{ChatProvider, ChatStream};
use crate::Result;
use crate::types::{ChatEvent, ChatOptions, ChatResponse, Message};

pub const OPEN_TAG: &str = "<think>";
pub const CLOSE_TAG: &str = "</think>";

/// Prepend [`OPEN_TAG`] unless `text` already starts with it.
pub fn ensure_open_tag(text: &str) -> String {
    if text.trim_start().starts_with(OPEN_TAG) {
        text.to_owned()
    } else {
        format!("{OPEN_TAG}{text}")
    }
}

/// Split tagged text into `(reasoning, content)`.
///
/// ```
/// # use byok_gateway::providers::reasoning::split_reasoning;
/// let (reasoning, text) = split_reasoning("<think>add them</think>\n\n4");
/// assert_eq!(reasoning.as_deref(), Some("add them"));
/// assert_eq!(text, "4");
/// ```
pub fn split_reasoning(text: &str) -> (Option<String>, String) {
    let mut splitter = TagSplitter::default();
    let mut events = splitter.push(text);
    events.extend(splitter.finish());

    let mut reasoning = String::new();
    let mut content = String::new();
    for event in events {
        match event {
            ChatEvent::Reasoning(r) => reasoning.push_str(&r),
            ChatEvent::Content(c) => content.push_str(&c),
            _ => {}
        }
    }
    ((!reasoning.is_empty()).then_some(reasoning), content)
}

/// Incremental tag splitter shared by the batch and streaming paths.
#[derive(Debug)]
struct TagSplitter {
    inside: bool,
    carry: String,
    /// Drop leading whitespace from the next visible content.
    trim_content: bool,
}

impl Default for TagSplitter {
    fn default() -> Self {
        Self {
            inside: false,
            carry: String::new(),
            trim_content: true,
        }
    }
}

impl TagSplitter {
    fn push(&mut self, chunk: &str) -> Vec<ChatEvent> {
        self.carry.push_str(chunk);
        let mut out = Vec::new();
        loop {
            let tag = if self.inside { CLOSE_TAG } else { OPEN_TAG };
            if let Some(pos) = self.carry.find(tag) {
                let segment: String = self.carry.drain(..pos).collect();
                self.carry.drain(..tag.len());
                self.emit(segment, &mut out);
                if self.inside {
                    self.trim_content = true;
                }
                self.inside = !self.inside;
            } else {
                let keep = partial_tag_len(&self.carry, tag);
                let split = self.carry.len() - keep;
                let segment: String = self.carry.drain(..split).collect();
                self.emit(segment, &mut out);
                return out;
            }
        }
    }

    fn finish(&mut self) -> Vec<ChatEvent> {
        let mut out = Vec::new();
        let rest = std::mem::take(&mut self.carry);
        self.emit(rest, &mut out);
        out
    }

    fn emit(&mut self, segment: String, out: &mut Vec<ChatEvent>) {
        if self.inside {
            if !segment.is_empty() {
                out.push(ChatEvent::Reasoning(segment));
            }
            return;
        }
        let segment = if self.trim_content {
            let trimmed = segment.trim_start();
            if trimmed.is_empty() {
                return;
            }
            self.trim_content = false;
            trimmed.to_owned()
        } else {
            segment
        };
        if !segment.is_empty() {
            out.push(ChatEvent::Content(segment));
        }
    }
}

/// Length of the longest proper prefix of `tag` that `buf` ends with.
fn partial_tag_len(buf: &str, tag: &str) -> usize {
    (1..tag.len())
        .rev()
        .find(|&k| buf.ends_with(&tag[..k]))
        .unwrap_or(0)
}

pin_project! {
    /// Inserts one synthetic [`OPEN_TAG`] before the first real content
    /// unless the accumulated text already carries it.
    ///
    /// Leading text that is whitespace or a proper prefix of the tag is held
    /// back until the decision can be made. Non-content events pass through.
    pub struct TagInjector<S> {
        #[pin]
        inner: S,
        seen: String,
        held: String,
        decided: bool,
        finished: bool,
        pending: VecDeque<Result<ChatEvent>>,
    }
}

impl<S> TagInjector<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            seen: String::new(),
            held: String::new(),
            decided: false,
            finished: false,
            pending: VecDeque::new(),
        }
    }
}

fn release_held(
    seen: &str,
    held: &mut String,
    decided: &mut bool,
    pending: &mut VecDeque<Result<ChatEvent>>,
) {
    *decided = true;
    if !seen.trim().is_empty() && !seen.contains(OPEN_TAG) {
        pending.push_back(Ok(ChatEvent::Content(OPEN_TAG.to_owned())));
    }
    if !held.is_empty() {
        pending.push_back(Ok(ChatEvent::Content(std::mem::take(held))));
    }
}

impl<S> Stream for TagInjector<S>
where
    S: Stream<Item = Result<ChatEvent>>,
{
    type Item = Result<ChatEvent>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        loop {
            if let Some(item) = this.pending.pop_front() {
                return Poll::Ready(Some(item));
            }
            if *this.finished {
                return Poll::Ready(None);
            }
            if *this.decided {
                return this.inner.as_mut().poll_next(cx);
            }

            match ready!(this.inner.as_mut().poll_next(cx)) {
                Some(Ok(ChatEvent::Content(text))) => {
                    this.seen.push_str(&text);
                    this.held.push_str(&text);
                    let lead = this.seen.trim_start();
                    let undecidable = lead.is_empty()
                        || (lead.len() < OPEN_TAG.len() && OPEN_TAG.starts_with(lead));
                    if !undecidable {
                        release_held(this.seen, this.held, this.decided, this.pending);
                    }
                }
                Some(Ok(ChatEvent::Done)) => {
                    release_held(this.seen, this.held, this.decided, this.pending);
                    this.pending.push_back(Ok(ChatEvent::Done));
                }
                Some(other) => return Poll::Ready(Some(other)),
                None => {
                    release_held(this.seen, this.held, this.decided, this.pending);
                    *this.finished = true;
                }
            }
        }
    }
}

pin_project! {
    /// Splits tagged `Content` events into `Reasoning` and `Content`.
    ///
    /// Native `Reasoning` events and all other events pass through unchanged.
    pub struct ReasoningSplitter<S> {
        #[pin]
        inner: S,
        splitter: TagSplitter,
        finished: bool,
        pending: VecDeque<Result<ChatEvent>>,
    }
}

impl<S> ReasoningSplitter<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            splitter: TagSplitter::default(),
            finished: false,
            pending: VecDeque::new(),
        }
    }
}

impl<S> Stream for ReasoningSplitter<S>
where
    S: Stream<Item = Result<ChatEvent>>,
{
    type Item = Result<ChatEvent>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        loop {
            if let Some(item) = this.pending.pop_front() {
                return Poll::Ready(Some(item));
            }
            if *this.finished {
                return Poll::Ready(None);
            }

            match ready!(this.inner.as_mut().poll_next(cx)) {
                Some(Ok(ChatEvent::Content(text))) => {
                    this.pending
                        .extend(this.splitter.push(&text).into_iter().map(Ok));
                }
                Some(Ok(ChatEvent::Done)) => {
                    this.pending
                        .extend(this.splitter.finish().into_iter().map(Ok));
                    this.pending.push_back(Ok(ChatEvent::Done));
                }
                Some(other) => return Poll::Ready(Some(other)),
                None => {
                    this.pending
                        .extend(this.splitter.finish().into_iter().map(Ok));
                    *this.finished = true;
                }
            }
        }
    }
}

/// Wraps a provider so its inline reasoning is normalised and extracted.
///
/// Transparent to callers: it exposes the same [`ChatProvider`] interface.
pub struct ReasoningProvider {
    inner: Arc<dyn ChatProvider>,
}

impl ReasoningProvider {
    pub fn new(inner: Arc<dyn ChatProvider>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl ChatProvider for ReasoningProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn chat(&self, messages: &[Message], options: &ChatOptions) -> Result<ChatResponse> {
        let mut response = self.inner.chat(messages, options).await?;
        let (extracted, content) = split_reasoning(&ensure_open_tag(&response.content));
        response.content = content;
        response.reasoning = match (response.reasoning.take(), extracted) {
            (Some(native), Some(inline)) => Some(format!("{native}{inline}")),
            (native, inline) => native.or(inline),
        };
        Ok(response)
    }

    async fn chat_stream(&self, messages: &[Message], options: &ChatOptions) -> Result<ChatStream> {
        let stream = self.inner.chat_stream(messages, options).await?;
        Ok(Box::pin(ReasoningSplitter::new(TagInjector::new(stream))))
    }
}

//! Room and message state for one signed-in user.
//!
//! [`RoomStore`] is the only writer of the room list, the active selection and
//! the active room's messages. Views read snapshots through the getters and
//! follow [`Notice`]s on a broadcast channel.
//!
//! State lives behind a `std::sync::Mutex` that is never held across an
//! `.await`. Every network response is checked against the active room before
//! it is applied, and switching rooms cancels fetches made for the old room.

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::{DocWeave, cancellable};
use crate::config::{ClientConfig, Delivery};
use crate::error::{Error, Result};
use crate::observability::{STORE_POLLS, STORE_POLLS_UNCHANGED, STORE_STALE_RESPONSES};
use crate::render::Renderer;
use crate::reveal::Revealer;
use crate::status::{MarkerInference, ProcessingSignal, StatusInference};
use crate::types::{Message, Notice, Room, RoomId, Upload, UploadStatus};

/// Shown in place of an answer the backend withheld for content-safety reasons.
pub const GUARDRAIL_WARNING: &str =
    "⚠️ This answer was withheld because it did not meet the reliability standard. Try rephrasing your question.";

/// Shown in place of an answer that could not be produced.
pub const FAILURE_WARNING: &str =
    "⚠️ Something went wrong while generating the answer. Please try again.";

const NOTICE_CAPACITY: usize = 64;

/// Lifecycle of the active room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    /// No room is selected.
    NoRoom,
    /// A room is selected and its history is being fetched.
    Loading,
    /// The selected room's history is available.
    Ready,
}

struct State {
    rooms: Vec<Room>,
    current_room_id: Option<RoomId>,
    messages: Arc<Vec<Message>>,
    phase: RoomPhase,
    is_loading: bool,
    is_processing: bool,
    upload_status: UploadStatus,
    done_until: Option<Instant>,
    last_processed: Option<(usize, String)>,
    selection: CancellationToken,
}

impl State {
    fn new() -> Self {
        Self {
            rooms: Vec::new(),
            current_room_id: None,
            messages: Arc::new(Vec::new()),
            phase: RoomPhase::NoRoom,
            is_loading: false,
            is_processing: false,
            upload_status: UploadStatus::Idle,
            done_until: None,
            last_processed: None,
            selection: CancellationToken::new(),
        }
    }

    /// Make `room` active, dropping everything tied to the previous selection.
    fn select(&mut self, room: Option<RoomId>) -> CancellationToken {
        self.selection.cancel();
        self.selection = CancellationToken::new();
        self.current_room_id = room;
        self.messages = Arc::new(Vec::new());
        self.phase = match room {
            Some(_) => RoomPhase::Loading,
            None => RoomPhase::NoRoom,
        };
        self.is_processing = false;
        self.upload_status = UploadStatus::Idle;
        self.done_until = None;
        self.last_processed = None;
        self.selection.clone()
    }

    fn is_current(&self, room: RoomId) -> bool {
        self.current_room_id == Some(room)
    }

    fn move_to_top(&mut self, room: RoomId) {
        if let Some(idx) = self.rooms.iter().position(|r| r.id == room) {
            let target = self.rooms.remove(idx);
            self.rooms.insert(0, target);
        }
    }

    fn mark_uploading(&mut self) {
        self.is_processing = true;
        self.upload_status = UploadStatus::Uploading;
        self.done_until = None;
        // A re-upload repeats the same completion text; it must count again.
        self.last_processed = None;
    }

    fn streaming_tail(&mut self) -> Option<&mut Message> {
        Arc::make_mut(&mut self.messages)
            .last_mut()
            .filter(|m| m.is_streaming)
    }
}

fn same_tail(cached: &[Message], fetched: &[Message]) -> bool {
    cached.len() == fetched.len()
        && cached.last().map(|m| &m.content) == fetched.last().map(|m| &m.content)
}

/// Rooms, the active conversation and document-processing status.
pub struct RoomStore {
    client: DocWeave,
    inference: Arc<dyn StatusInference>,
    delivery: Delivery,
    poll_interval: Duration,
    done_clear_delay: Duration,
    state: Mutex<State>,
    notices: broadcast::Sender<Notice>,
}

impl RoomStore {
    /// Create an empty store.
    pub fn new(client: DocWeave, config: &ClientConfig) -> Self {
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        Self {
            client,
            inference: Arc::new(MarkerInference::default()),
            delivery: config.delivery,
            poll_interval: config.poll_interval,
            done_clear_delay: config.done_clear_delay,
            state: Mutex::new(State::new()),
            notices,
        }
    }

    /// Replace the processing-status recogniser.
    pub fn with_inference(mut self, inference: Arc<dyn StatusInference>) -> Self {
        self.inference = inference;
        self
    }

    /// The gateway this store talks through.
    pub fn client(&self) -> &DocWeave {
        &self.client
    }

    ////////////////////////////////////////// Observers //////////////////////////////////////////

    /// Subscribe to notices.
    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    /// The room list, most recent first.
    pub fn rooms(&self) -> Vec<Room> {
        self.lock().rooms.clone()
    }

    /// Messages of the active room.
    ///
    /// The same `Arc` is returned until the list actually changes.
    pub fn messages(&self) -> Arc<Vec<Message>> {
        Arc::clone(&self.lock().messages)
    }

    /// The active room's id.
    pub fn current_room_id(&self) -> Option<RoomId> {
        self.lock().current_room_id
    }

    /// The active room.
    pub fn current_room(&self) -> Option<Room> {
        let state = self.lock();
        let id = state.current_room_id?;
        state.rooms.iter().find(|r| r.id == id).cloned()
    }

    /// Upload badge state; `Done` reverts to `Idle` after the clear delay.
    pub fn upload_status(&self) -> UploadStatus {
        let mut state = self.lock();
        if state.upload_status == UploadStatus::Done
            && state.done_until.is_some_and(|until| Instant::now() >= until)
        {
            state.upload_status = UploadStatus::Idle;
            state.done_until = None;
        }
        state.upload_status
    }

    /// True while a document in the active room is being analysed.
    pub fn is_processing(&self) -> bool {
        self.lock().is_processing
    }

    /// True while a chat request is outstanding.
    pub fn is_loading(&self) -> bool {
        self.lock().is_loading
    }

    /// Lifecycle of the active room.
    pub fn phase(&self) -> RoomPhase {
        self.lock().phase
    }

    ////////////////////////////////////////// Rooms //////////////////////////////////////////

    /// Load the room list.
    pub async fn refresh_rooms(&self) -> Result<()> {
        match self.client.fetch_rooms().await {
            Ok(rooms) => {
                debug!(count = rooms.len(), "rooms loaded");
                self.lock().rooms = rooms;
                Ok(())
            }
            Err(err) => Err(self.report("Could not load the room list", err)),
        }
    }

    /// Switch to `room`, or clear the selection with `None`.
    pub async fn select_room(&self, room: Option<RoomId>) -> Result<()> {
        let token = self.lock().select(room);
        debug!(?room, "room selected");
        match room {
            Some(room) => self.load_messages(room, false, &token).await,
            None => Ok(()),
        }
    }

    /// Move `room` to the front of the room list.
    pub fn move_room_to_top(&self, room: RoomId) {
        self.lock().move_to_top(room);
    }

    /// Delete a room after `confirm` approves it.
    ///
    /// Returns false when the user declined.
    pub async fn delete_room<F>(&self, room: RoomId, confirm: F) -> Result<bool>
    where
        F: FnOnce(&Room) -> bool,
    {
        let target = self.lock().rooms.iter().find(|r| r.id == room).cloned();
        let Some(target) = target else {
            let err = Error::not_found(
                "no such room",
                Some("room".to_string()),
                Some(room.to_string()),
            );
            return Err(self.report("Could not delete the room", err));
        };
        if !confirm(&target) {
            return Ok(false);
        }
        if let Err(err) = self.client.delete_room(room).await {
            return Err(self.report("Could not delete the room", err));
        }
        {
            let mut state = self.lock();
            state.rooms.retain(|r| r.id != room);
            if state.is_current(room) {
                state.select(None);
            }
        }
        info!(room, "room deleted");
        self.notify(Notice::success(format!("Deleted \"{}\"", target.title)));
        Ok(true)
    }

    ////////////////////////////////////////// Messages //////////////////////////////////////////

    /// Fetch the history of `room`.
    ///
    /// A silent fetch is skipped while a chat request is outstanding, and keeps
    /// the cached list when nothing changed.
    pub async fn fetch_messages(&self, room: RoomId, silent: bool) -> Result<()> {
        let token = {
            let state = self.lock();
            if silent && state.is_loading {
                debug!(room, "silent fetch skipped while loading");
                return Ok(());
            }
            state.selection.clone()
        };
        self.load_messages(room, silent, &token).await
    }

    async fn load_messages(
        &self,
        room: RoomId,
        silent: bool,
        token: &CancellationToken,
    ) -> Result<()> {
        match cancellable(token, self.client.fetch_messages(room)).await {
            Ok(messages) => {
                self.apply_messages(room, messages, silent);
                Ok(())
            }
            Err(err) if err.is_abort() => {
                STORE_STALE_RESPONSES.click();
                debug!(room, "message fetch cancelled by room switch");
                Ok(())
            }
            Err(err) => {
                {
                    let mut state = self.lock();
                    if state.is_current(room) && state.phase == RoomPhase::Loading {
                        state.phase = RoomPhase::Ready;
                    }
                }
                if silent {
                    debug!(room, error = %err, "background fetch failed");
                    Err(err)
                } else {
                    Err(self.report("Could not load messages", err))
                }
            }
        }
    }

    /// Install a fetched history if it still belongs to the active room.
    ///
    /// Returns true if the message list changed.
    fn apply_messages(&self, room: RoomId, messages: Vec<Message>, silent: bool) -> bool {
        let notice = {
            let mut state = self.lock();
            if !state.is_current(room) || (silent && state.is_loading) {
                STORE_STALE_RESPONSES.click();
                debug!(room, "discarding stale message list");
                return false;
            }
            state.phase = RoomPhase::Ready;
            if silent && same_tail(&state.messages, &messages) {
                STORE_POLLS_UNCHANGED.click();
                return false;
            }
            state.messages = Arc::new(messages);
            self.derive_status(&mut state)
        };
        if let Some(notice) = notice {
            self.notify(notice);
        }
        true
    }

    /// Update processing status from the last message.
    fn derive_status(&self, state: &mut State) -> Option<Notice> {
        let last = state.messages.last()?;
        if !last.is_ai() {
            state.is_processing = false;
            return None;
        }
        if last.is_streaming {
            return None;
        }
        let key = (state.messages.len(), last.content.clone());
        if state.last_processed.as_ref() == Some(&key) {
            return None;
        }
        let signal = self.inference.infer(last);
        state.last_processed = Some(key);
        match signal? {
            ProcessingSignal::Starting => {
                state.mark_uploading();
                None
            }
            ProcessingSignal::Complete => {
                state.is_processing = false;
                state.upload_status = UploadStatus::Done;
                state.done_until = Some(Instant::now() + self.done_clear_delay);
                Some(Notice::success("Document analysis complete. Ask away!"))
            }
            ProcessingSignal::Failed => {
                state.is_processing = false;
                state.upload_status = UploadStatus::Idle;
                state.done_until = None;
                Some(Notice::error(
                    "Something went wrong while analysing the document.",
                ))
            }
        }
    }

    ////////////////////////////////////////// Polling //////////////////////////////////////////

    /// Poll the active room in the background.
    ///
    /// The task ends once the store is dropped.
    pub fn spawn_poller(self: &Arc<Self>) -> JoinHandle<()> {
        let store: Weak<Self> = Arc::downgrade(self);
        let period = self.poll_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(store) = store.upgrade() else {
                    debug!("room store dropped; poller exiting");
                    break;
                };
                store.poll_once().await;
            }
        })
    }

    /// Run one poll if a document is processing and nothing else is in flight.
    ///
    /// Returns true if a fetch was issued.
    pub async fn poll_once(&self) -> bool {
        let room = {
            let state = self.lock();
            match state.current_room_id {
                Some(room) if !state.is_loading && state.is_processing => room,
                _ => return false,
            }
        };
        if !self.client.session().is_authenticated() {
            return false;
        }
        STORE_POLLS.click();
        debug!(room, "polling messages");
        let _ = self.fetch_messages(room, true).await;
        true
    }

    ////////////////////////////////////////// Upload //////////////////////////////////////////

    /// Upload a PDF into the active room, or into a new room if none is active.
    pub async fn upload(&self, path: &utf8path::Path<'_>) -> Result<Room> {
        let upload = match Upload::from_path(path).await {
            Ok(upload) => upload,
            Err(err) => return Err(self.report("Could not upload", err)),
        };
        let current = self.lock().current_room_id;
        let result = match current {
            None => self.upload_new_room(&upload).await,
            Some(room) => self.upload_into(room, &upload).await,
        };
        match result {
            Ok(room) => {
                info!(room = room.id, file = upload.file_name(), "document uploaded");
                self.notify(Notice::info(format!(
                    "Uploaded {}; analysis has started",
                    upload.file_name()
                )));
                Ok(room)
            }
            Err(err) => {
                {
                    let mut state = self.lock();
                    if state.current_room_id == current {
                        state.is_processing = false;
                        state.upload_status = UploadStatus::Idle;
                    }
                }
                Err(self.report("Could not upload", err))
            }
        }
    }

    async fn upload_new_room(&self, upload: &Upload) -> Result<Room> {
        {
            let mut state = self.lock();
            state.mark_uploading();
        }
        let room = self.client.create_room(upload).await?;
        let token = {
            let mut state = self.lock();
            state.rooms.retain(|r| r.id != room.id);
            state.rooms.insert(0, room.clone());
            let token = state.select(Some(room.id));
            state.mark_uploading();
            token
        };
        self.load_messages(room.id, false, &token).await?;
        Ok(room)
    }

    async fn upload_into(&self, room: RoomId, upload: &Upload) -> Result<Room> {
        let token = {
            let mut state = self.lock();
            state.mark_uploading();
            state.selection.clone()
        };
        cancellable(&token, self.client.add_file(room, upload)).await?;
        self.load_messages(room, false, &token).await?;
        let mut state = self.lock();
        state.move_to_top(room);
        Ok(state
            .rooms
            .iter()
            .find(|r| r.id == room)
            .cloned()
            .unwrap_or_else(|| Room::new(room, upload.file_name())))
    }

    ////////////////////////////////////////// Chat //////////////////////////////////////////

    /// Ask a question in the active room and deliver the answer through `renderer`.
    ///
    /// Returns false without doing anything when no room is active, the text is
    /// blank, a request is already outstanding, or a document is processing. A
    /// failed answer is replaced by a warning in the conversation and the error
    /// is returned.
    pub async fn send(&self, text: &str, renderer: &mut dyn Renderer) -> Result<bool> {
        let text = text.trim();
        let (room, token) = {
            let mut state = self.lock();
            let Some(room) = state.current_room_id else {
                return Ok(false);
            };
            if text.is_empty() || state.is_loading || state.is_processing {
                return Ok(false);
            }
            state.is_loading = true;
            let messages = Arc::make_mut(&mut state.messages);
            messages.push(Message::user(text));
            messages.push(Message::pending_ai());
            state.move_to_top(room);
            (room, state.selection.clone())
        };
        debug!(room, "sending message");

        renderer.start_response();
        let result = match self.delivery {
            Delivery::Reveal(revealer) => {
                self.deliver_revealed(room, text, revealer, renderer, &token)
                    .await
            }
            Delivery::Stream => self.deliver_streamed(room, text, renderer, &token).await,
        };
        match &result {
            Err(err) if err.is_abort() => {
                debug!(room, "answer abandoned after a room change");
                self.discard_pending(room);
            }
            Err(err) => {
                warn!(room, error = %err, "answer failed");
                let warning = if err.is_guardrail() {
                    GUARDRAIL_WARNING
                } else {
                    FAILURE_WARNING
                };
                self.finish_answer(room, warning.to_string());
                renderer.print_warning(warning);
            }
            Ok(()) => {}
        }
        renderer.finish_response();
        self.lock().is_loading = false;
        result.map(|()| true)
    }

    async fn deliver_revealed(
        &self,
        room: RoomId,
        text: &str,
        revealer: Revealer,
        renderer: &mut dyn Renderer,
        token: &CancellationToken,
    ) -> Result<()> {
        let answer = cancellable(token, self.client.send_message(room, text))
            .await?
            .answer;
        let shown = revealer
            .reveal(&answer, |chunk| {
                if !self.append_to_answer(room, chunk) {
                    return false;
                }
                renderer.print_text(chunk);
                !renderer.should_interrupt()
            })
            .await;
        if shown < answer.len() && self.lock().is_current(room) {
            renderer.print_interrupted();
            renderer.print_text(&answer[shown..]);
        }
        self.finish_answer(room, answer);
        Ok(())
    }

    async fn deliver_streamed(
        &self,
        room: RoomId,
        text: &str,
        renderer: &mut dyn Renderer,
        token: &CancellationToken,
    ) -> Result<()> {
        let mut stream = cancellable(token, self.client.stream_message(room, text)).await?;
        let mut answer = String::new();
        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => return Err(Error::abort("room changed")),
                next = stream.next() => next,
            };
            let Some(fragment) = next else {
                break;
            };
            let fragment = fragment?;
            answer.push_str(&fragment);
            if self.append_to_answer(room, &fragment) {
                renderer.print_text(&fragment);
            }
        }
        self.finish_answer(room, answer);
        Ok(())
    }

    /// Append to the pending answer; false if it no longer exists.
    fn append_to_answer(&self, room: RoomId, fragment: &str) -> bool {
        let mut state = self.lock();
        if !state.is_current(room) {
            return false;
        }
        match state.streaming_tail() {
            Some(message) => {
                message.content.push_str(fragment);
                true
            }
            None => false,
        }
    }

    /// Drop the pending answer if its room is still active.
    fn discard_pending(&self, room: RoomId) {
        let mut state = self.lock();
        if state.is_current(room) && state.streaming_tail().is_some() {
            Arc::make_mut(&mut state.messages).pop();
        }
    }

    /// Set the pending answer's final content and clear its streaming flag.
    fn finish_answer(&self, room: RoomId, content: String) {
        let notice = {
            let mut state = self.lock();
            if !state.is_current(room) {
                STORE_STALE_RESPONSES.click();
                return;
            }
            let Some(message) = state.streaming_tail() else {
                return;
            };
            message.content = content;
            message.is_streaming = false;
            self.derive_status(&mut state)
        };
        if let Some(notice) = notice {
            self.notify(notice);
        }
    }

    ////////////////////////////////////////// Helpers //////////////////////////////////////////

    fn notify(&self, notice: Notice) {
        let _ = self.notices.send(notice);
    }

    /// Publish `err` as an error notice and hand it back.
    fn report(&self, context: &str, err: Error) -> Error {
        if !err.is_abort() {
            self.notify(Notice::error(format!("{context}: {err}")));
        }
        err
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

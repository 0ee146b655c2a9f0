//! crates/playlist_core/src/playback.rs
//!
//! A single audio session over the listen-later queue, modelled as an explicit
//! state machine. Commands go out through `AudioOutput`; everything the audio
//! resource reports comes back in through `handle_event`. Writes to the store
//! are returned as `PlaybackEffect`s for the host to apply through
//! `ListenQueueService::apply_playback_effects`.

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::ListenQueueEntry;
use crate::ports::AudioOutput;

/// Elapsed time between two progress checkpoints, in whole seconds.
pub const CHECKPOINT_INTERVAL_SECONDS: u32 = 5;

pub const DEFAULT_PLAYBACK_RATE: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// No queue, or nothing selected.
    Idle,
    /// Source attached, waiting for the resource to report its metadata.
    Loading,
    /// Metadata known, not playing.
    Loaded,
    Playing,
    Paused,
    /// The last entry finished.
    Completed,
    /// The current entry has no audio source.
    Unplayable { entry_id: Uuid },
}

/// Inputs reported by the audio resource.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioEvent {
    MetadataLoaded { duration_seconds: f64 },
    /// The resource's current time changed. This is the controller's tick.
    TimeUpdate { position_seconds: f64 },
    Ended,
    Failed { reason: String },
}

/// A write the controller wants persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEffect {
    SaveProgress { entry_id: Uuid, seconds: u32 },
    MarkPlayed { entry_id: Uuid },
}

/// A read-only view of the session for UIs.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSnapshot {
    pub state: PlaybackState,
    pub current_index: Option<usize>,
    pub current_entry_id: Option<Uuid>,
    pub is_playing: bool,
    pub elapsed_seconds: f64,
    pub duration_seconds: f64,
    pub progress_percentage: f64,
    pub playback_rate: f32,
    pub queue_len: usize,
}

pub struct PlaybackController<A: AudioOutput> {
    audio: A,
    queue: Vec<ListenQueueEntry>,
    current_index: Option<usize>,
    state: PlaybackState,
    elapsed_seconds: f64,
    duration_seconds: f64,
    playback_rate: f32,
    // play as soon as the pending source reports its metadata
    autoplay: bool,
    last_checkpoint: Option<u32>,
}

impl<A: AudioOutput> PlaybackController<A> {
    pub fn new(audio: A) -> Self {
        Self {
            audio,
            queue: Vec::new(),
            current_index: None,
            state: PlaybackState::Idle,
            elapsed_seconds: 0.0,
            duration_seconds: 0.0,
            playback_rate: DEFAULT_PLAYBACK_RATE,
            autoplay: false,
            last_checkpoint: None,
        }
    }

    //=====================================================================================
    // Accessors
    //=====================================================================================

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn queue(&self) -> &[ListenQueueEntry] {
        &self.queue
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    pub fn current_entry(&self) -> Option<&ListenQueueEntry> {
        self.current_index.and_then(|i| self.queue.get(i))
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed_seconds
    }

    pub fn duration_seconds(&self) -> f64 {
        self.duration_seconds
    }

    pub fn progress_percentage(&self) -> f64 {
        if self.duration_seconds > 0.0 {
            (self.elapsed_seconds / self.duration_seconds * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        }
    }

    pub fn playback_rate(&self) -> f32 {
        self.playback_rate
    }

    pub fn audio(&self) -> &A {
        &self.audio
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            state: self.state,
            current_index: self.current_index,
            current_entry_id: self.current_entry().map(|e| e.id),
            is_playing: self.is_playing(),
            elapsed_seconds: self.elapsed_seconds,
            duration_seconds: self.duration_seconds,
            progress_percentage: self.progress_percentage(),
            playback_rate: self.playback_rate,
            queue_len: self.queue.len(),
        }
    }

    //=====================================================================================
    // Queue
    //=====================================================================================

    /// Replaces the queue.
    ///
    /// The current entry is tracked by id, so patches to the same entries never
    /// reload the source, unless the entry was unplayable and now has audio. If
    /// the current entry is gone, whatever now sits at the same (clamped) index
    /// is loaded. An empty queue resets the session.
    pub fn set_queue(&mut self, queue: Vec<ListenQueueEntry>) {
        let current_id = self.current_entry().map(|e| e.id);
        self.queue = queue;

        if self.queue.is_empty() {
            if self.current_index.is_some() {
                debug!("Queue emptied, resetting playback session");
            }
            self.reset();
            return;
        }

        if let Some(position) =
            current_id.and_then(|id| self.queue.iter().position(|e| e.id == id))
        {
            self.current_index = Some(position);
            let now_playable = self.current_entry().and_then(|e| e.source_url()).is_some();
            if matches!(self.state, PlaybackState::Unplayable { .. }) && now_playable {
                debug!(entry_id = ?current_id, "Current entry gained an audio source");
                self.load_current();
            }
            return;
        }

        let was_playing = self.is_playing() || self.autoplay;
        let index = self
            .current_index
            .map_or(0, |i| i.min(self.queue.len() - 1));
        self.current_index = Some(index);
        self.autoplay = current_id.is_some() && was_playing;
        self.load_current();
    }

    //=====================================================================================
    // Commands
    //=====================================================================================

    pub fn play(&mut self) {
        match self.state {
            PlaybackState::Playing => {}
            PlaybackState::Loaded | PlaybackState::Paused => {
                self.audio.play();
                self.state = PlaybackState::Playing;
            }
            PlaybackState::Loading => self.autoplay = true,
            PlaybackState::Completed => {
                self.autoplay = true;
                self.load(false);
            }
            PlaybackState::Idle => debug!("Play requested with nothing loaded"),
            PlaybackState::Unplayable { entry_id } => {
                warn!(%entry_id, "Play requested for an entry without audio")
            }
        }
    }

    pub fn pause(&mut self) {
        match self.state {
            PlaybackState::Playing => {
                self.audio.pause();
                self.state = PlaybackState::Paused;
            }
            PlaybackState::Loading => self.autoplay = false,
            _ => {}
        }
    }

    pub fn next(&mut self) {
        match self.current_index {
            Some(i) if i + 1 < self.queue.len() => self.move_to(i + 1),
            _ => {}
        }
    }

    pub fn previous(&mut self) {
        match self.current_index {
            Some(i) if i > 0 => self.move_to(i - 1),
            _ => {}
        }
    }

    /// Jumps to `index` and starts playing once the source is attached.
    pub fn play_item(&mut self, index: usize) {
        if index >= self.queue.len() {
            warn!(index, queue_len = self.queue.len(), "play_item index out of range");
            return;
        }
        self.current_index = Some(index);
        self.autoplay = true;
        self.load_current();
    }

    /// Repositions to `percentage` (0-100) of the current duration.
    pub fn seek(&mut self, percentage: f64) {
        if !percentage.is_finite() || self.duration_seconds <= 0.0 {
            return;
        }
        match self.state {
            PlaybackState::Loading
            | PlaybackState::Loaded
            | PlaybackState::Playing
            | PlaybackState::Paused => {}
            PlaybackState::Completed => self.state = PlaybackState::Paused,
            _ => return,
        }
        let percentage = percentage.clamp(0.0, 100.0);
        let position = percentage * self.duration_seconds / 100.0;
        self.audio.seek(position);
        self.elapsed_seconds = position;
    }

    /// Changes the rate for the current and every later entry. Position is kept.
    pub fn change_speed(&mut self, rate: f32) {
        if !rate.is_finite() || rate <= 0.0 {
            warn!(rate, "Ignoring invalid playback rate");
            return;
        }
        self.playback_rate = rate;
        if self.has_source() {
            self.audio.set_rate(rate);
        }
    }

    /// Stops playback and frees the resource. The controller is left idle.
    pub fn teardown(&mut self) {
        if self.has_source() {
            self.audio.pause();
        }
        self.reset();
        self.queue.clear();
    }

    //=====================================================================================
    // Events
    //=====================================================================================

    pub fn handle_event(&mut self, event: AudioEvent) -> Vec<PlaybackEffect> {
        match event {
            AudioEvent::MetadataLoaded { duration_seconds } => {
                self.on_metadata(duration_seconds);
                Vec::new()
            }
            AudioEvent::TimeUpdate { position_seconds } => self.on_tick(position_seconds),
            AudioEvent::Ended => self.on_ended(),
            AudioEvent::Failed { reason } => {
                self.on_failed(&reason);
                Vec::new()
            }
        }
    }

    fn on_metadata(&mut self, duration_seconds: f64) {
        if duration_seconds.is_finite() && duration_seconds > 0.0 {
            self.duration_seconds = duration_seconds;
        }
        if self.state != PlaybackState::Loading {
            return;
        }
        self.state = PlaybackState::Loaded;
        if self.autoplay {
            self.autoplay = false;
            self.audio.play();
            self.state = PlaybackState::Playing;
        }
    }

    fn on_tick(&mut self, position_seconds: f64) -> Vec<PlaybackEffect> {
        if !position_seconds.is_finite() || position_seconds < 0.0 {
            return Vec::new();
        }
        match self.state {
            PlaybackState::Loaded | PlaybackState::Paused => {
                self.elapsed_seconds = position_seconds;
                Vec::new()
            }
            PlaybackState::Playing => {
                self.elapsed_seconds = position_seconds;
                self.checkpoint().into_iter().collect()
            }
            _ => Vec::new(),
        }
    }

    fn checkpoint(&mut self) -> Option<PlaybackEffect> {
        let whole = self.elapsed_seconds.floor() as u32;
        if whole == 0 || whole % CHECKPOINT_INTERVAL_SECONDS != 0 {
            return None;
        }
        if self.last_checkpoint == Some(whole) {
            return None;
        }
        self.last_checkpoint = Some(whole);
        let entry_id = self.current_entry()?.id;
        Some(PlaybackEffect::SaveProgress { entry_id, seconds: whole })
    }

    fn on_ended(&mut self) -> Vec<PlaybackEffect> {
        match self.state {
            PlaybackState::Loaded | PlaybackState::Playing | PlaybackState::Paused => {}
            _ => return Vec::new(),
        }
        let Some(index) = self.current_index else {
            return Vec::new();
        };
        let mut effects = Vec::new();
        if let Some(entry) = self.queue.get_mut(index) {
            entry.is_played = true;
            info!(entry_id = %entry.id, "Queue entry finished");
            effects.push(PlaybackEffect::MarkPlayed { entry_id: entry.id });
        }
        self.advance_or_complete(index);
        effects
    }

    /// Resource errors skip ahead like a completion but leave the entry unplayed.
    fn on_failed(&mut self, reason: &str) {
        match self.state {
            PlaybackState::Loading
            | PlaybackState::Loaded
            | PlaybackState::Playing
            | PlaybackState::Paused => {}
            _ => return,
        }
        let Some(index) = self.current_index else {
            return;
        };
        error!(
            entry_id = ?self.current_entry().map(|e| e.id),
            reason,
            "Audio resource failed, skipping entry"
        );
        self.advance_or_complete(index);
    }

    //=====================================================================================
    // Internals
    //=====================================================================================

    fn advance_or_complete(&mut self, index: usize) {
        if index + 1 < self.queue.len() {
            self.current_index = Some(index + 1);
            self.autoplay = true;
            self.load_current();
        } else {
            self.autoplay = false;
            self.state = PlaybackState::Completed;
            info!("Reached the end of the queue");
        }
    }

    fn move_to(&mut self, index: usize) {
        let keep_playing = self.is_playing() || self.autoplay;
        self.current_index = Some(index);
        self.autoplay = keep_playing;
        self.load_current();
    }

    /// Attaches the current entry's chosen rendition and resumes from its
    /// checkpoint. Playback starts only after `MetadataLoaded`.
    fn load_current(&mut self) {
        self.load(true);
    }

    /// Played entries always start over; so does everything when `resume` is off.
    fn load(&mut self, resume: bool) {
        self.elapsed_seconds = 0.0;
        self.duration_seconds = 0.0;
        self.last_checkpoint = None;

        let Some(entry) = self.current_entry() else {
            self.state = PlaybackState::Idle;
            return;
        };
        let entry_id = entry.id;
        let resume_at = if resume && !entry.is_played {
            entry.progress_seconds
        } else {
            0
        };
        let expected_duration = entry.duration_seconds();

        let Some(url) = entry.source_url().map(str::to_owned) else {
            warn!(%entry_id, version = %entry.audio_version, "Queue entry has no audio source");
            if self.has_source() {
                self.audio.release();
            }
            self.autoplay = false;
            self.state = PlaybackState::Unplayable { entry_id };
            return;
        };

        debug!(%entry_id, %url, resume_at, "Attaching audio source");
        self.audio.attach(&url);
        self.audio.set_rate(self.playback_rate);
        if resume_at > 0 {
            self.audio.seek(f64::from(resume_at));
            self.elapsed_seconds = f64::from(resume_at);
            self.last_checkpoint = Some(resume_at);
        }
        self.duration_seconds = f64::from(expected_duration);
        self.state = PlaybackState::Loading;
    }

    fn has_source(&self) -> bool {
        matches!(
            self.state,
            PlaybackState::Loading
                | PlaybackState::Loaded
                | PlaybackState::Playing
                | PlaybackState::Paused
                | PlaybackState::Completed
        )
    }

    fn reset(&mut self) {
        if self.has_source() {
            self.audio.release();
        }
        self.current_index = None;
        self.state = PlaybackState::Idle;
        self.elapsed_seconds = 0.0;
        self.duration_seconds = 0.0;
        self.autoplay = false;
        self.last_checkpoint = None;
    }
}

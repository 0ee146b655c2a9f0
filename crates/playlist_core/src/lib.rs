pub mod domain;
pub mod listen_queue;
pub mod playback;
pub mod ports;
pub mod reading_list;

#[cfg(test)]
pub(crate) mod testing;

pub use domain::{
    ArticleAudio, ArticleCard, AudioRendition, AudioVersion, CategoryTag, ListenQueueEntry,
    MutationOutcome, NewListenQueueEntry, Notice, NoticeKind, ReadingListEntry,
};
pub use listen_queue::ListenQueueService;
pub use playback::{AudioEvent, PlaybackController, PlaybackEffect, PlaybackSnapshot, PlaybackState};
pub use ports::{
    AudioOutput, ListenQueueStore, NoticeSink, PortError, PortResult, ReadingListStore,
};
pub use reading_list::ReadingListService;

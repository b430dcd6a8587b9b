//! Playlist controller
//!
//! Ordered queue of videos with a cursor. The cursor always points inside
//! the queue, so an empty queue is refused at construction.
//!
//! Unlike a consuming play queue, entries are never removed: advancing past
//! the last video wraps to the first, and a one-video playlist loops on
//! itself.

use crate::catalog::{dedupe, VideoCatalog, VideoRef};
use crate::error::{Error, Result};

/// Ordered videos plus the current position
#[derive(Debug, Clone)]
pub struct PlaylistController {
    videos: Vec<VideoRef>,
    current_index: usize,
}

impl PlaylistController {
    /// Build from a list of videos (deduplicated, order kept)
    pub fn new(videos: Vec<VideoRef>) -> Result<Self> {
        let videos = dedupe(videos);
        if videos.is_empty() {
            return Err(Error::Playlist("Playlist requires at least one video".to_string()));
        }
        Ok(Self {
            videos,
            current_index: 0,
        })
    }

    /// Load from a catalog
    pub async fn load(catalog: &dyn VideoCatalog) -> Result<Self> {
        Self::new(catalog.load().await?)
    }

    /// Move forward one entry, wrapping to the start
    ///
    /// Returns the new current video.
    pub fn advance(&mut self) -> &VideoRef {
        self.current_index = (self.current_index + 1) % self.videos.len();
        &self.videos[self.current_index]
    }

    /// Move back one entry, wrapping to the end
    pub fn previous(&mut self) -> &VideoRef {
        let len = self.videos.len();
        self.current_index = (self.current_index + len - 1) % len;
        &self.videos[self.current_index]
    }

    /// Jump to an index
    pub fn select(&mut self, index: usize) -> Result<&VideoRef> {
        if index >= self.videos.len() {
            return Err(Error::Playlist(format!(
                "Index {} out of range (playlist has {} videos)",
                index,
                self.videos.len()
            )));
        }
        self.current_index = index;
        Ok(&self.videos[index])
    }

    pub fn current(&self) -> &VideoRef {
        &self.videos[self.current_index]
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn videos(&self) -> &[VideoRef] {
        &self.videos
    }

    pub fn len(&self) -> usize {
        self.videos.len()
    }

    /// Never true once constructed
    pub fn is_empty(&self) -> bool {
        self.videos.is_empty()
    }

    /// Index of a video id, if queued
    pub fn position_of(&self, video_id: &str) -> Option<usize> {
        self.videos.iter().position(|v| v.video_id == video_id)
    }

    /// Record a duration learned from the player
    pub fn update_duration(&mut self, video_id: &str, duration_seconds: u32) {
        if let Some(video) = self.videos.iter_mut().find(|v| v.video_id == video_id) {
            video.duration_seconds = duration_seconds;
        }
    }
}

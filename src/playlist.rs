//! Playlist collaborator.

use async_trait::async_trait;

use crate::canvas::Canvas;

/// External program source for channels in playlist mode.
///
/// The scheduler calls [`Playlist::advance`] once per rendered frame for
/// every channel delegated to the playlist; the implementation decides
/// what to paint, typically by switching between stored effect programs
/// on a schedule. Implementations must not block the render loop.
#[async_trait]
pub trait Playlist: Send + Sync {
    /// Paint channel `channel` for the frame at tick `now`.
    async fn advance(&mut self, now: u64, channel: usize, canvas: &Canvas);
}

/// Playlist that paints nothing, for installations driven purely by the
/// network or static modes.
#[derive(Debug, Default)]
pub struct NoPlaylist;

#[async_trait]
impl Playlist for NoPlaylist {
    async fn advance(&mut self, _now: u64, _channel: usize, _canvas: &Canvas) {}
}

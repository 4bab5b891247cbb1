//! Movie detail records from the metadata API
//!
//! Only the fields needed to pick an episode stream are modeled; unknown
//! fields are ignored.

use crate::{Error, PlaybackSource, Result};
use serde::{Deserialize, Serialize};

/// Response of the movie detail endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MovieDetailResponse {
    pub status: bool,
    pub msg: String,
    pub movie: MovieDetail,
    pub episodes: Vec<EpisodeServer>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MovieDetail {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub slug: String,
    pub origin_name: String,
    pub poster_url: String,
    pub thumb_url: String,
    pub year: Option<u32>,
    pub quality: String,
    pub lang: String,
    pub episode_current: String,
    pub episode_total: String,
}

impl MovieDetail {
    /// Poster for the player, preferring the wide thumbnail
    pub fn player_poster(&self) -> Option<&str> {
        [&self.thumb_url, &self.poster_url]
            .into_iter()
            .map(|url| url.trim())
            .find(|url| !url.is_empty())
    }
}

/// One streaming server and its episode list
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EpisodeServer {
    pub server_name: String,
    pub server_data: Vec<EpisodeData>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EpisodeData {
    pub name: String,
    pub slug: String,
    pub filename: String,
    pub link_embed: String,
    pub link_m3u8: String,
}

/// Where an episode can be played
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "url", rename_all = "lowercase")]
pub enum StreamTarget {
    /// Manifest URL the player can attach
    Hls(String),
    /// Third-party page to embed instead
    Embed(String),
}

impl EpisodeData {
    pub fn stream_target(&self) -> Option<StreamTarget> {
        let m3u8 = self.link_m3u8.trim();
        if !m3u8.is_empty() {
            return Some(StreamTarget::Hls(m3u8.to_string()));
        }
        let embed = self.link_embed.trim();
        if !embed.is_empty() {
            return Some(StreamTarget::Embed(embed.to_string()));
        }
        None
    }
}

/// Neighbours of an episode within its server's list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AdjacentEpisodes {
    pub previous: Option<usize>,
    pub next: Option<usize>,
}

impl MovieDetailResponse {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn server(&self, server: usize) -> Option<&EpisodeServer> {
        self.episodes.get(server)
    }

    pub fn episode(&self, server: usize, episode: usize) -> Option<&EpisodeData> {
        self.server(server)?.server_data.get(episode)
    }

    /// Build the source for one episode, with the movie poster attached
    pub fn playback_source(&self, server: usize, episode: usize, auto_play: bool) -> Result<PlaybackSource> {
        let data = self.episode(server, episode).ok_or_else(|| {
            Error::InvalidSource(format!("no episode {} on server {}", episode, server))
        })?;

        match data.stream_target() {
            Some(StreamTarget::Hls(url)) => {
                let mut source = PlaybackSource::new(url).with_auto_play(auto_play);
                if let Some(poster) = self.movie.player_poster() {
                    source = source.with_poster(poster);
                }
                Ok(source)
            }
            Some(StreamTarget::Embed(_)) => Err(Error::InvalidSource(format!(
                "episode '{}' only has an embed link",
                data.name
            ))),
            None => Err(Error::InvalidSource(format!("episode '{}' has no link", data.name))),
        }
    }

    /// Previous and next episode indices, clamped to the server's list
    pub fn adjacent_episodes(&self, server: usize, episode: usize) -> AdjacentEpisodes {
        let count = self.server(server).map(|s| s.server_data.len()).unwrap_or(0);
        if episode >= count {
            return AdjacentEpisodes {
                previous: None,
                next: None,
            };
        }

        AdjacentEpisodes {
            previous: episode.checked_sub(1),
            next: Some(episode + 1).filter(|next| *next < count),
        }
    }
}

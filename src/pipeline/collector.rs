//! Reads every listed channel and keeps the election posts.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::channels::source::load_channel_list;
use crate::channels::ChannelReader;
use crate::config::CollectorConfig;
use crate::pipeline::filter::KeywordFilter;

/// Reads the channel list, each channel's recent history, and filters.
pub struct Collector {
    reader: Arc<dyn ChannelReader>,
    channels_file: PathBuf,
    posts_per_channel: usize,
    filter: KeywordFilter,
}

impl Collector {
    pub fn new(reader: Arc<dyn ChannelReader>, config: &CollectorConfig) -> Self {
        Self {
            reader,
            channels_file: config.channels_file.clone(),
            posts_per_channel: config.posts_per_channel,
            filter: KeywordFilter::election(),
        }
    }

    pub fn with_filter(mut self, filter: KeywordFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Filtered post texts, in channel-list order.
    ///
    /// The channel list is re-read on every call. A missing list yields no
    /// posts; a failing channel is skipped.
    pub async fn collect(&self) -> Vec<String> {
        let channels = match load_channel_list(&self.channels_file).await {
            Ok(channels) => channels,
            Err(e) => {
                error!(
                    file = %self.channels_file.display(),
                    error = %e,
                    "Channel list unavailable"
                );
                return Vec::new();
            }
        };

        info!(channels = channels.len(), "Collecting posts");

        let posts = self.read_all(&channels).await;
        let total = posts.len();
        let kept = self.filter.apply(posts);

        info!(kept = kept.len(), total, "Filtered election posts");
        kept
    }

    async fn read_all(&self, channels: &[String]) -> Vec<String> {
        let mut posts = Vec::new();

        for channel in channels {
            match self.reader.read_recent(channel, self.posts_per_channel).await {
                Ok(messages) => {
                    let read = messages.len();
                    posts.extend(
                        messages
                            .into_iter()
                            .filter_map(|m| m.text)
                            .filter(|t| !t.trim().is_empty()),
                    );
                    info!(%channel, read, "Channel read");
                }
                Err(e) => {
                    warn!(%channel, error = %e, "Skipping channel");
                }
            }
        }

        posts
    }
}

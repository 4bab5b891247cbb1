//! User-facing strings

use serde::{Deserialize, Serialize};

/// Language for overlay messages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    Vietnamese,
    English,
}

/// Localized message set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Messages {
    pub unsupported: &'static str,
    pub playback_failed: &'static str,
    pub loading: &'static str,
    pub error_title: &'static str,
    pub unknown_error: &'static str,
}

impl Messages {
    pub const VIETNAMESE: Messages = Messages {
        unsupported: "Trình duyệt không hỗ trợ phát video HLS",
        playback_failed: "Không thể phát video. Vui lòng thử lại sau.",
        loading: "Đang tải video...",
        error_title: "Lỗi phát video",
        unknown_error: "Unknown error",
    };

    pub const ENGLISH: Messages = Messages {
        unsupported: "This browser cannot play HLS video",
        playback_failed: "The video could not be played. Please try again later.",
        loading: "Loading video...",
        error_title: "Playback error",
        unknown_error: "Unknown error",
    };

    pub fn for_locale(locale: Locale) -> Messages {
        match locale {
            Locale::Vietnamese => Self::VIETNAMESE,
            Locale::English => Self::ENGLISH,
        }
    }

    /// Overlay text for an error reported by the surface itself
    pub fn surface_error(&self, media_message: Option<&str>) -> String {
        let detail = media_message
            .filter(|m| !m.is_empty())
            .unwrap_or(self.unknown_error);
        format!("Video error: {}", detail)
    }
}

impl Default for Messages {
    fn default() -> Self {
        Self::for_locale(Locale::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surface_error_fallback() {
        let messages = Messages::default();
        assert_eq!(messages.surface_error(Some("MEDIA_ERR_DECODE")), "Video error: MEDIA_ERR_DECODE");
        assert_eq!(messages.surface_error(Some("")), "Video error: Unknown error");
        assert_eq!(messages.surface_error(None), "Video error: Unknown error");
    }

    #[test]
    fn test_locale_selection() {
        assert_eq!(Messages::for_locale(Locale::English).loading, "Loading video...");
        assert_eq!(Messages::default(), Messages::VIETNAMESE);
    }
}

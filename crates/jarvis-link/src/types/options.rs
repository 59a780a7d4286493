//! Per-send options forwarded verbatim to the backend.
//!
//! Each option is a closed set of known values plus a pass-through variant.
//! The link never interprets them; unknown strings survive a round trip.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $wire:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum $name {
            $($variant,)+
            Other(String),
        }

        impl $name {
            pub fn as_str(&self) -> &str {
                match self {
                    $($name::$variant => $wire,)+
                    $name::Other(s) => s.as_str(),
                }
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                match value.as_str() {
                    $($wire => $name::$variant,)+
                    _ => $name::Other(value),
                }
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                $name::from(value.to_string())
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                match value {
                    $name::Other(s) => s,
                    known => known.as_str().to_string(),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

wire_enum! {
    /// Language model that answers the turn.
    AiModel { Deepseek => "deepseek", Gemini => "gemini" }
}

wire_enum! {
    /// Speech-to-text model size used for voice turns.
    SpeechModel {
        Tiny => "tiny",
        Base => "base",
        Small => "small",
        Medium => "medium",
        Large => "large",
    }
}

wire_enum! {
    /// Text-to-speech voice for the reply, `none` disables playback.
    TtsVoice {
        None => "none",
        Xiaoxiao => "zh-CN-XiaoxiaoNeural",
        Yunxi => "zh-CN-YunxiNeural",
        Yunyang => "zh-CN-YunyangNeural",
    }
}

/// Options attached to one outbound turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOptions {
    pub model: AiModel,
    pub whisper_model: SpeechModel,
    pub tts_voice: TtsVoice,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            model: AiModel::Gemini,
            whisper_model: SpeechModel::Small,
            tts_voice: TtsVoice::Xiaoxiao,
        }
    }
}

impl SendOptions {
    #[must_use]
    pub fn with_model(mut self, model: impl Into<AiModel>) -> Self {
        self.model = model.into();
        self
    }

    #[must_use]
    pub fn with_whisper_model(mut self, model: impl Into<SpeechModel>) -> Self {
        self.whisper_model = model.into();
        self
    }

    #[must_use]
    pub fn with_tts_voice(mut self, voice: impl Into<TtsVoice>) -> Self {
        self.tts_voice = voice.into();
        self
    }
}

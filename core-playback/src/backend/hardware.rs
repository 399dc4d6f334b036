//! Hardware pipeline tuning.
//!
//! Decodes through the platform codec and renders through an overlay. Strict
//! about formats, cheap on CPU. Ready is reported on the first rendered frame
//! because hardware decoders can sit on a prepared stream for a while before
//! producing output.

use bridge_traits::{EngineFlavor, EngineOption, OptionCategory};

use super::{ReadySignal, TuningProfile};
use crate::config::PlayerConfig;
use crate::traits::BackendKind;

/// `SDL_FCC_RV32`
const OVERLAY_FORMAT_RV32: i64 = 0x3233_5652;

const PROTOCOL_WHITELIST: &str = "async,cache,crypto,file,http,https,rtp,rtsp,tcp,tls,udp";

pub(crate) fn profile(config: &PlayerConfig) -> TuningProfile {
    let hw_decode = i64::from(!config.force_software_decode);

    let options = vec![
        EngineOption::int(OptionCategory::Player, "mediacodec", hw_decode),
        EngineOption::int(OptionCategory::Player, "mediacodec-auto-rotate", hw_decode),
        EngineOption::int(
            OptionCategory::Player,
            "mediacodec-handle-resolution-change",
            hw_decode,
        ),
        EngineOption::int(OptionCategory::Player, "opensles", 1),
        EngineOption::int(OptionCategory::Player, "overlay-format", OVERLAY_FORMAT_RV32),
        EngineOption::int(OptionCategory::Player, "framedrop", 1),
        EngineOption::int(OptionCategory::Player, "start-on-prepared", 0),
        EngineOption::string(OptionCategory::Format, "protocol_whitelist", PROTOCOL_WHITELIST),
        EngineOption::string(OptionCategory::Format, "rtsp_transport", "tcp"),
        EngineOption::int(OptionCategory::Format, "dns_cache_clear", 1),
        EngineOption::int(OptionCategory::Format, "timeout", config.load_timeout_micros()),
    ];

    TuningProfile {
        kind: BackendKind::HardwarePipeline,
        flavor: EngineFlavor::HardwareAccelerated,
        ready_on: ReadySignal::FirstFrame,
        options,
    }
}

//! Software tolerant tuning.
//!
//! ffmpeg decode with low-latency demuxing and aggressive reconnects, for
//! IPTV and camera feeds that drop packets or stall. Never uses the platform
//! codec, whatever the config says.

use bridge_traits::{EngineFlavor, EngineOption, OptionCategory};

use super::{ReadySignal, TuningProfile};
use crate::config::PlayerConfig;
use crate::traits::BackendKind;

const PROTOCOL_WHITELIST: &str =
    "async,cache,crypto,file,http,https,hls,rtmp,rtp,rtsp,tcp,tls,udp";

/// `AVDISCARD_ALL`: skip the loop filter on every frame.
const SKIP_LOOP_FILTER_ALL: i64 = 48;

pub(crate) fn profile(config: &PlayerConfig) -> TuningProfile {
    use OptionCategory::{Codec, Format, Player};

    let timeout = config.load_timeout_micros();

    let options = vec![
        EngineOption::int(Player, "mediacodec", 0),
        EngineOption::int(Player, "opensles", 0),
        EngineOption::int(Player, "packet-buffering", 0),
        EngineOption::int(Player, "infbuf", 1),
        EngineOption::int(Player, "framedrop", 5),
        EngineOption::int(Player, "max-fps", 30),
        EngineOption::int(Player, "min-frames", 2),
        EngineOption::int(Player, "enable-accurate-seek", 1),
        EngineOption::int(Player, "start-on-prepared", 0),
        EngineOption::string(Format, "fflags", "nobuffer"),
        EngineOption::string(Format, "protocol_whitelist", PROTOCOL_WHITELIST),
        EngineOption::string(Format, "rtsp_transport", "tcp"),
        EngineOption::string(Format, "rtsp_flags", "prefer_tcp"),
        EngineOption::int(Format, "stimeout", timeout),
        EngineOption::int(Format, "timeout", timeout),
        EngineOption::int(Format, "reconnect", 1),
        EngineOption::int(Format, "reconnect_streamed", 1),
        EngineOption::int(Format, "reconnect_delay_max", 4),
        EngineOption::int(Format, "dns_cache_clear", 1),
        EngineOption::int(Format, "analyzemaxduration", 100),
        EngineOption::int(Format, "probesize", 10_240),
        EngineOption::int(Format, "flush_packets", 1),
        EngineOption::int(Format, "safe", 0),
        EngineOption::int(Codec, "skip_loop_filter", SKIP_LOOP_FILTER_ALL),
        EngineOption::int(Codec, "skip_frame", 0),
        EngineOption::string(Codec, "threads", "auto"),
    ];

    TuningProfile {
        kind: BackendKind::SoftwareTolerant,
        flavor: EngineFlavor::Software,
        ready_on: ReadySignal::Prepared,
        options,
    }
}

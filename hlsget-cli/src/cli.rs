use std::path::PathBuf;

use clap::{Parser, Subcommand};
use hlsget_engine::IvPolicy;
use hlsget_engine::broadcaster::VoiceFormat;

/// Define CLI arguments
#[derive(Parser)]
#[command(
    version,
    about = "Download HLS media and merge it into a single file",
    long_about = "Resolves an HLS playlist (following nested variant playlists), downloads\n\
                  every segment with bounded retries, decrypts AES-128 segments and writes\n\
                  the merged result atomically. Broadcaster voice and video clips can be\n\
                  fetched by identifier."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true, help = "Enable detailed debug logging")]
    pub verbose: bool,

    /// Print the download record as JSON
    #[arg(long, global = true, help = "Print the download record as JSON on stdout")]
    pub json: bool,

    /// Custom HTTP headers for download requests
    #[arg(
        long = "header",
        short = 'H',
        global = true,
        help = "Add custom HTTP header to requests (can be used multiple times). Format: 'Name: Value'",
        value_name = "HEADER"
    )]
    pub headers: Vec<String>,

    /// Per-attempt timeout in seconds
    #[arg(
        long,
        global = true,
        default_value = "90",
        help = "Timeout in seconds for a single HTTP attempt (0 disables it)"
    )]
    pub timeout: u64,

    /// Connection timeout in seconds
    #[arg(
        long,
        global = true,
        default_value = "30",
        help = "Connection timeout in seconds (time to establish initial connection)"
    )]
    pub connect_timeout: u64,

    /// Delay between retries in milliseconds
    #[arg(
        long,
        global = true,
        default_value = "100",
        help = "Delay in milliseconds slept between attempts of one request"
    )]
    pub retry_delay: u64,

    /// Retries after the first attempt
    #[arg(
        long,
        global = true,
        default_value = "100",
        help = "Number of times a timed out or dropped request is retried"
    )]
    pub max_retries: u32,

    /// Segments in flight at once
    #[arg(
        short = 'c',
        long,
        global = true,
        default_value = "1",
        help = "Maximum number of segments fetched ahead of assembly (1 = sequential)"
    )]
    pub concurrency: usize,

    /// Maximum variant playlist nesting
    #[arg(
        long,
        global = true,
        default_value = "16",
        help = "Maximum nesting of variant playlists before giving up"
    )]
    pub max_depth: usize,

    /// IV selection for AES-128 segments
    #[arg(
        long,
        global = true,
        value_enum,
        default_value = "zero",
        help = "How the AES-128 IV is chosen: 'zero' (all-zero) or 'playlist' (IV attribute or media sequence)"
    )]
    pub iv: IvPolicy,

    /// Ignore system proxy settings
    #[arg(
        long,
        global = true,
        help = "Ignore system proxy settings (HTTP_PROXY and friends) for downloads"
    )]
    pub no_proxy: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Download the media behind a playlist URL
    Save {
        /// Root playlist URL
        url: String,

        /// Output file
        #[arg(
            short,
            long,
            help = "File to write the merged media to (default: derived from the URL)"
        )]
        output: Option<PathBuf>,
    },

    /// Download a broadcaster voice clip by identifier
    Voice {
        /// Voice identifier, with or without its file extension
        id: String,

        /// Directory voice clips are saved into
        #[arg(long, default_value = "voices")]
        dir: PathBuf,

        /// Only try this rendition
        #[arg(long, value_enum)]
        format: Option<VoiceFormat>,
    },

    /// Download a broadcaster video clip by identifier
    Video {
        /// Video identifier
        id: String,

        /// Directory videos are saved into
        #[arg(long, default_value = "videos")]
        dir: PathBuf,
    },
}

impl Command {
    /// Whether requests should look like they come from the broadcaster's site.
    pub fn is_broadcaster(&self) -> bool {
        matches!(self, Command::Voice { .. } | Command::Video { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_with_global_flags() {
        let args = CliArgs::parse_from([
            "hlsget",
            "voice",
            "k100.m4a",
            "--format",
            "mp4",
            "-H",
            "X-Test: 1",
            "--max-retries",
            "3",
            "--json",
        ]);

        assert!(args.json);
        assert_eq!(args.max_retries, 3);
        assert_eq!(args.headers, vec!["X-Test: 1"]);
        match args.command {
            Command::Voice { id, dir, format } => {
                assert_eq!(id, "k100.m4a");
                assert_eq!(dir, PathBuf::from("voices"));
                assert_eq!(format, Some(VoiceFormat::Mp4));
            }
            _ => panic!("expected voice command"),
        }
    }

    #[test]
    fn test_save_defaults() {
        let args = CliArgs::parse_from(["hlsget", "save", "https://a/b/index.m3u8"]);
        assert_eq!(args.timeout, 90);
        assert_eq!(args.retry_delay, 100);
        assert_eq!(args.concurrency, 1);
        assert_eq!(args.iv, IvPolicy::Zero);
        assert!(!args.command.is_broadcaster());
        assert!(!args.no_proxy);
    }

    #[test]
    fn test_only_system_proxy_switch_is_accepted() {
        let args = CliArgs::parse_from(["hlsget", "--no-proxy", "save", "https://a/index.m3u8"]);
        assert!(args.no_proxy);

        assert!(
            CliArgs::try_parse_from([
                "hlsget",
                "--proxy",
                "http://proxy.example.com:8080",
                "save",
                "https://a/index.m3u8",
            ])
            .is_err()
        );
    }
}

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};

use crate::{
    model_download::default_style_model_path,
    types::{PhotoQuality, SensorOrientation},
};

pub const MODEL_URL_ENV: &str = "STARRY_MODEL_URL";

const DEFAULT_INPUT_SIZE: u32 = 224;
const DEFAULT_INTRA_THREADS: usize = 2;

pub const USAGE: &str = "Usage: starry-camera [--model <path>] [--model-url <url>] \
[--input-size <px>] [--quality <speed|balanced|quality>] \
[--orientation <up|right|down|left>] [--camera <index>] [--threads <n>] \
[--list-cameras]\n\nThe model URL can also be set through STARRY_MODEL_URL.";

#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub model_path: PathBuf,
    pub model_url: Option<String>,
    pub input_size: u32,
    pub quality: PhotoQuality,
    pub orientation: SensorOrientation,
    pub camera_index: u32,
    pub intra_threads: usize,
    pub list_cameras: bool,
    pub show_help: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            model_path: default_style_model_path(),
            model_url: None,
            input_size: DEFAULT_INPUT_SIZE,
            quality: PhotoQuality::default(),
            orientation: SensorOrientation::default(),
            camera_index: 0,
            intra_threads: DEFAULT_INTRA_THREADS,
            list_cameras: false,
            show_help: false,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let args: Vec<String> = std::env::args().skip(1).collect();
        let env_url = std::env::var(MODEL_URL_ENV).ok();
        Self::from_args(&args, env_url)
    }

    /// `args` excludes the program name. A `--model-url` flag wins over
    /// `env_url`.
    pub fn from_args(args: &[String], env_url: Option<String>) -> Result<Self> {
        let mut config = AppConfig {
            model_url: env_url.filter(|url| !url.trim().is_empty()),
            ..AppConfig::default()
        };

        let mut idx = 0;
        while idx < args.len() {
            let flag = args[idx].as_str();
            match flag {
                "--help" | "-h" => config.show_help = true,
                "--list-cameras" => config.list_cameras = true,
                "--model" => config.model_path = PathBuf::from(take_value(args, &mut idx, flag)?),
                "--model-url" => config.model_url = Some(take_value(args, &mut idx, flag)?),
                "--input-size" => {
                    let value = take_value(args, &mut idx, flag)?;
                    config.input_size = value
                        .parse()
                        .with_context(|| format!("invalid --input-size '{value}'"))?;
                }
                "--quality" => config.quality = take_value(args, &mut idx, flag)?.parse()?,
                "--orientation" => {
                    config.orientation = take_value(args, &mut idx, flag)?.parse()?
                }
                "--camera" => {
                    let value = take_value(args, &mut idx, flag)?;
                    config.camera_index = value
                        .parse()
                        .with_context(|| format!("invalid --camera '{value}'"))?;
                }
                "--threads" => {
                    let value = take_value(args, &mut idx, flag)?;
                    config.intra_threads = value
                        .parse()
                        .with_context(|| format!("invalid --threads '{value}'"))?;
                }
                other => bail!("unknown argument '{other}'\n\n{USAGE}"),
            }
            idx += 1;
        }

        if config.input_size == 0 {
            bail!("--input-size must be greater than zero");
        }
        if config.intra_threads == 0 {
            bail!("--threads must be greater than zero");
        }

        Ok(config)
    }
}

fn take_value(args: &[String], idx: &mut usize, flag: &str) -> Result<String> {
    *idx += 1;
    args.get(*idx)
        .cloned()
        .ok_or_else(|| anyhow!("{flag} requires a value"))
}

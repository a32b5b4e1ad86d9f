use std::{
    fs,
    io::{Read, Write},
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, bail};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::Client;

const STYLE_MODEL_FILENAME: &str = "fast_neural_style_starry_night.onnx";
const BUNDLED_MODEL_DIR: &str = "assets";

pub fn default_style_model_path() -> PathBuf {
    PathBuf::from("models").join(STYLE_MODEL_FILENAME)
}

fn bundled_style_model_path() -> PathBuf {
    PathBuf::from(BUNDLED_MODEL_DIR).join(STYLE_MODEL_FILENAME)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModelDownloadEvent {
    AlreadyPresent,
    CopiedBundled,
    Started { total: Option<u64> },
    Progress { downloaded: u64, total: Option<u64> },
    Finished,
}

pub fn ensure_style_model_ready<F>(
    model_path: &Path,
    source_url: Option<&str>,
    on_event: F,
) -> anyhow::Result<()>
where
    F: FnMut(ModelDownloadEvent),
{
    ensure_model_ready_from(model_path, &bundled_style_model_path(), source_url, on_event)
}

fn ensure_model_ready_from<F>(
    model_path: &Path,
    bundled: &Path,
    source_url: Option<&str>,
    mut on_event: F,
) -> anyhow::Result<()>
where
    F: FnMut(ModelDownloadEvent),
{
    if model_path.exists() {
        on_event(ModelDownloadEvent::AlreadyPresent);
        on_event(ModelDownloadEvent::Finished);
        return Ok(());
    }

    if let Some(parent) = model_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create model directory {}", parent.display())
            })?;
        }
    }

    if bundled.exists() {
        log::info!(
            "copying bundled style model from {} to {}",
            bundled.display(),
            model_path.display()
        );
        copy_into_place(bundled, model_path)?;
        on_event(ModelDownloadEvent::CopiedBundled);
        on_event(ModelDownloadEvent::Finished);
        return Ok(());
    }

    let Some(url) = source_url else {
        bail!(
            "style model not found at {} and no download url configured",
            model_path.display()
        );
    };

    let mut progress: Option<ProgressBar> = None;
    download_to_path(url, model_path, &mut |event| {
        match &event {
            ModelDownloadEvent::Started { total } => {
                progress = Some(create_progress_bar(*total));
            }
            ModelDownloadEvent::Progress { downloaded, .. } => {
                if let Some(pb) = progress.as_ref() {
                    pb.set_position(*downloaded);
                }
            }
            ModelDownloadEvent::Finished => {
                if let Some(pb) = progress.take() {
                    pb.finish_with_message("style model ready");
                }
            }
            ModelDownloadEvent::AlreadyPresent | ModelDownloadEvent::CopiedBundled => {}
        }
        on_event(event);
    })
    .with_context(|| format!("failed to download style model to {}", model_path.display()))
}

// `dest` only ever holds a complete copy.
fn copy_into_place(src: &Path, dest: &Path) -> anyhow::Result<()> {
    let tmp_path = dest.with_extension("download");
    fs::copy(src, &tmp_path).with_context(|| {
        format!(
            "failed to copy bundled style model from {} to {}",
            src.display(),
            tmp_path.display()
        )
    })?;
    fs::rename(&tmp_path, dest).with_context(|| {
        format!(
            "failed to move bundled model {} into place at {}",
            tmp_path.display(),
            dest.display()
        )
    })
}

fn download_to_path<F>(url: &str, dest: &Path, on_event: &mut F) -> anyhow::Result<()>
where
    F: FnMut(ModelDownloadEvent),
{
    log::info!("downloading style model from {url} to {}", dest.display());

    let client = Client::new();
    let mut response = client
        .get(url)
        .send()
        .context("failed to start model download")?
        .error_for_status()
        .context("model download returned error status")?;

    let total = response.content_length();
    on_event(ModelDownloadEvent::Started { total });

    let tmp_path = dest.with_extension("download");
    let mut file = fs::File::create(&tmp_path)
        .with_context(|| format!("failed to create {}", tmp_path.display()))?;

    let mut downloaded: u64 = 0;
    let mut buffer = [0u8; 16 * 1024];
    loop {
        let bytes_read = response
            .read(&mut buffer)
            .context("failed while reading model bytes")?;
        if bytes_read == 0 {
            break;
        }

        file.write_all(&buffer[..bytes_read])
            .context("failed while writing model to disk")?;
        downloaded += bytes_read as u64;
        on_event(ModelDownloadEvent::Progress { downloaded, total });
    }

    file.sync_all()
        .context("failed to flush downloaded model to disk")?;
    fs::rename(&tmp_path, dest).with_context(|| {
        format!(
            "failed to move temp model {} into place at {}",
            tmp_path.display(),
            dest.display()
        )
    })?;

    on_event(ModelDownloadEvent::Finished);
    Ok(())
}

fn create_progress_bar(total: Option<u64>) -> ProgressBar {
    match total {
        Some(total) if total > 0 => {
            let pb = ProgressBar::new(total);
            if let Ok(style) = ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({eta})",
            ) {
                pb.set_style(style.progress_chars("=>-"));
            }
            pb
        }
        _ => {
            let pb = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::with_template("{spinner:.green} downloading model") {
                pb.set_style(style);
            }
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        }
    }
}

use crate::{SCENE_NAME, logw};
use anyhow::Result;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Folder the renderer uses for `-ql` output.
pub const QUALITY_DIR: &str = "480p15";
pub const VIDEO_EXT: &str = ".mp4";

async fn dir_exists(path: &Path) -> bool {
    fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false)
}

async fn sorted_entries(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut out = Vec::new();
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        out.push((name, entry.path()));
    }
    out.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(out)
}

fn is_scene_video(file_name: &str) -> bool {
    file_name.ends_with(VIDEO_EXT) && file_name.contains(SCENE_NAME)
}

async fn scan(output_dir: &Path) -> Result<Vec<PathBuf>> {
    let media_dir = output_dir.join("media").join("videos");
    let mut found = Vec::new();
    if !dir_exists(&media_dir).await {
        return Ok(found);
    }

    for (_, script_dir) in sorted_entries(&media_dir).await? {
        let video_dir = script_dir.join(QUALITY_DIR);
        if !dir_exists(&video_dir).await {
            continue;
        }
        let first = sorted_entries(&video_dir)
            .await?
            .into_iter()
            .find(|(name, _)| is_scene_video(name));
        if let Some((_, path)) = first {
            found.push(path);
        }
    }

    Ok(found)
}

/// Rendered scene videos under `<output_dir>/media/videos/*/480p15/`, at most
/// one per script folder. Scan errors are logged and yield an empty list.
pub async fn find_video_files(output_dir: &Path) -> Vec<PathBuf> {
    match scan(output_dir).await {
        Ok(found) => found,
        Err(err) => {
            logw(format!("Error reading video directories: {}", err));
            Vec::new()
        }
    }
}

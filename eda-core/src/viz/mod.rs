//! Chart dashboard rendering and presentation.
//!
//! A [`Visualizer`] turns a [`Table`] into a self-contained HTML
//! [`Artifact`]. [`present`] stages the artifact in a temporary file that is
//! kept after the process exits, then hands its location to a [`Viewer`].

mod dashboard;

use std::fmt::Debug;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info, instrument};
use url::Url;

use crate::analysis::CorrelationMatrix;
use crate::prelude::*;

pub use self::dashboard::PlotlyDashboard;

/// A rendered dashboard.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub title: String,
    pub html: String,
}

/// Renders a table into a dashboard artifact.
///
/// `correlation` is the Pearson matrix of the table's numeric columns, absent
/// when there are fewer than two.
pub trait Visualizer: Debug + Send + Sync {
    fn render(&self, table: &Table, correlation: Option<&CorrelationMatrix>) -> Result<Artifact>;
}

/// Displays a staged artifact file.
pub trait Viewer: Debug + Send + Sync {
    fn open(&self, path: &Path) -> Result<()>;
}

/// Opens files with the platform's default handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemViewer;

impl Viewer for SystemViewer {
    fn open(&self, path: &Path) -> Result<()> {
        let url = Url::from_file_path(path).map_err(|_| {
            EdaError::Visualization(format!("not an absolute path: {}", path.display()))
        })?;
        launch(url.as_str())
    }
}

/// Opens a URL or path with `open`, `xdg-open` or `cmd /C start`.
pub fn launch(target: &str) -> Result<()> {
    let output = if cfg!(target_os = "macos") {
        Command::new("open").arg(target).output()
    } else if cfg!(target_os = "windows") {
        Command::new("cmd").args(["/C", "start", "", target]).output()
    } else {
        Command::new("xdg-open").arg(target).output()
    }
    .map_err(|e| EdaError::Visualization(format!("failed to run the system opener: {e}")))?;

    if output.status.success() {
        debug!(target, "Launched system opener");
        Ok(())
    } else {
        Err(EdaError::Visualization(format!(
            "system opener failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )))
    }
}

/// Writes `artifact` to a kept `.html` temp file and opens it.
///
/// The file is fully written and flushed before the viewer runs, and it is
/// not deleted afterwards so the viewer can still read it.
#[instrument(skip(artifact, viewer), fields(title = %artifact.title))]
pub fn present(artifact: &Artifact, viewer: &dyn Viewer) -> Result<PathBuf> {
    let mut file = tempfile::Builder::new()
        .prefix("eda-dashboard-")
        .suffix(".html")
        .tempfile()?;
    file.write_all(artifact.html.as_bytes())?;
    file.flush()?;

    let (_, path) = file
        .keep()
        .map_err(|e| EdaError::Visualization(format!("failed to keep dashboard file: {e}")))?;
    info!(path = %path.display(), "Dashboard written");

    viewer.open(&path)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct RecordingViewer {
        opened: Mutex<Vec<(PathBuf, String)>>,
    }

    impl Viewer for RecordingViewer {
        fn open(&self, path: &Path) -> Result<()> {
            let contents = std::fs::read_to_string(path)?;
            self.opened
                .lock()
                .unwrap()
                .push((path.to_path_buf(), contents));
            Ok(())
        }
    }

    #[test]
    fn test_present_writes_before_opening_and_keeps_file() {
        let artifact = Artifact {
            title: "t".into(),
            html: "<html>dashboard</html>".into(),
        };
        let viewer = RecordingViewer::default();

        let path = present(&artifact, &viewer).unwrap();

        let opened = viewer.opened.lock().unwrap();
        assert_eq!(opened.len(), 1);
        assert_eq!(opened[0].0, path);
        assert_eq!(opened[0].1, "<html>dashboard</html>");
        assert!(path.exists());
        assert_eq!(path.extension().unwrap(), "html");

        std::fs::remove_file(path).unwrap();
    }
}

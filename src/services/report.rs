use crate::error::AppError;
use crate::models::fs_types::CandidateFile;
use crate::models::predict_types::{BatchRow, BatchStats, PredictionResult};
use crate::services::api::ApiClient;
use crate::services::preview;
use chrono::Local;
use futures::StreamExt;
use rand::Rng;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

// One stalled conversion must not stall the whole report, so the per-image
// fan-out is capped and timed.
const EMBED_CONCURRENCY: usize = 4;
const EMBED_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TabularFormat {
    Csv,
    Spreadsheet,
}

impl TabularFormat {
    pub fn query_value(&self) -> &'static str {
        match self {
            TabularFormat::Csv => "csv",
            TabularFormat::Spreadsheet => "spreadsheet",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            TabularFormat::Csv => "csv",
            TabularFormat::Spreadsheet => "xlsx",
        }
    }
}

/// Aggregate statistics over a result set. The empty set is `{0, 0.0}` by
/// definition, never a division by zero.
pub fn compute_stats(rows: &[BatchRow]) -> BatchStats {
    if rows.is_empty() {
        return BatchStats {
            total: 0,
            average_confidence_percent: 0.0,
        };
    }

    let sum: f64 = rows.iter().map(|r| r.result.confidence as f64).sum();
    let mean = sum / rows.len() as f64;

    BatchStats {
        total: rows.len(),
        average_confidence_percent: (mean * 1000.0).round() / 10.0,
    }
}

/// Produces the three exportable artifacts from one batch result set: two
/// backend-rendered tabular formats and a self-contained HTML report
/// assembled locally. One export at a time; a second request while one runs
/// is rejected, not queued.
#[derive(Clone)]
pub struct ReportExporter {
    exporting: Arc<AtomicBool>,
}

impl ReportExporter {
    pub fn new() -> Self {
        Self {
            exporting: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_exporting(&self) -> bool {
        self.exporting.load(Ordering::SeqCst)
    }

    fn begin(&self) -> Result<(), AppError> {
        if self.exporting.swap(true, Ordering::SeqCst) {
            return Err("An export is already running.".into());
        }
        Ok(())
    }

    /// Request a backend-rendered artifact and stream it to
    /// `telltale_report_<date>.<ext>` in `out_dir`. The payload is the bare
    /// result set; previews are not part of the serialized type at all, so
    /// no client-local handle can leak to the server.
    pub async fn export_tabular(
        &self,
        api: &ApiClient,
        rows: &[BatchRow],
        format: TabularFormat,
        out_dir: &Path,
    ) -> Result<PathBuf, AppError> {
        self.begin()?;
        let result = self.do_export_tabular(api, rows, format, out_dir).await;
        self.exporting.store(false, Ordering::SeqCst);
        result
    }

    async fn do_export_tabular(
        &self,
        api: &ApiClient,
        rows: &[BatchRow],
        format: TabularFormat,
        out_dir: &Path,
    ) -> Result<PathBuf, AppError> {
        let payload: Vec<PredictionResult> = rows.iter().map(|r| r.result.clone()).collect();
        let response = api.export_report(&payload, format.query_value()).await?;

        let filename = format!(
            "telltale_report_{}.{}",
            Local::now().format("%Y-%m-%d"),
            format.extension()
        );
        let path = out_dir.join(filename);

        let mut file = tokio::fs::File::create(&path).await.map_err(|e| AppError {
            message: format!("Failed to create file {}: {}", path.display(), e),
        })?;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            tokio::io::AsyncWriteExt::write_all(&mut file, &chunk)
                .await
                .map_err(|e| AppError {
                    message: format!("Failed to write to file: {}", e),
                })?;
        }

        Ok(path)
    }

    /// Assemble the self-contained visual report entirely client-side and
    /// write it to `telltale_production_report_<timestamp>.html` in
    /// `out_dir`. Every matched image is re-encoded to an inline form before
    /// assembly; if any single conversion fails the whole export fails and
    /// the result set is left untouched.
    pub async fn export_visual(
        &self,
        rows: &[BatchRow],
        candidates: &[CandidateFile],
        current_model: &str,
        out_dir: &Path,
    ) -> Result<PathBuf, AppError> {
        self.begin()?;
        let result = self
            .do_export_visual(rows, candidates, current_model, out_dir)
            .await;
        self.exporting.store(false, Ordering::SeqCst);
        result
    }

    async fn do_export_visual(
        &self,
        rows: &[BatchRow],
        candidates: &[CandidateFile],
        current_model: &str,
        out_dir: &Path,
    ) -> Result<PathBuf, AppError> {
        let embedded = embed_previews(rows, candidates).await?;

        // Display-only session identifier, not a content hash.
        let session_id = format!("{:08X}", rand::rng().random::<u32>());
        let stats = compute_stats(rows);
        let html = build_report_html(&session_id, current_model, &stats, rows, &embedded);

        let filename = format!(
            "telltale_production_report_{}.html",
            Local::now().format("%Y%m%d_%H%M%S")
        );
        let path = out_dir.join(filename);

        tokio::fs::write(&path, html).await.map_err(|e| AppError {
            message: format!("Failed to write report {}: {}", path.display(), e),
        })?;

        Ok(path)
    }
}

impl Default for ReportExporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Re-encode every matched local file to an inline data URI, in parallel but
/// bounded, joined before assembly. Unmatched rows stay `None` and get a
/// placeholder; any conversion failure aborts the whole embed step.
async fn embed_previews(
    rows: &[BatchRow],
    candidates: &[CandidateFile],
) -> Result<Vec<Option<String>>, AppError> {
    let tasks = rows.iter().enumerate().map(|(idx, row)| {
        let matched = preview::match_candidate(&row.result.filename, candidates).cloned();
        async move {
            let inline = match matched {
                Some(file) => {
                    let name = file.name.clone();
                    let path = file.path.clone();
                    let encoded = tokio::time::timeout(
                        EMBED_TIMEOUT,
                        tokio::task::spawn_blocking(move || preview::encode_inline_png(&path)),
                    )
                    .await
                    .map_err(|_| AppError {
                        message: format!("Timed out embedding {}", name),
                    })?
                    .map_err(|e| AppError {
                        message: format!("Embedding task failed: {}", e),
                    })??;
                    Some(encoded)
                }
                None => None,
            };
            Ok::<(usize, Option<String>), AppError>((idx, inline))
        }
    });

    let mut embedded: Vec<Option<String>> = vec![None; rows.len()];
    let mut stream = futures::stream::iter(tasks).buffer_unordered(EMBED_CONCURRENCY);
    while let Some(item) = stream.next().await {
        let (idx, inline) = item?;
        embedded[idx] = inline;
    }

    Ok(embedded)
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// One self-contained document: header with session id, active model and
/// stats, then one row per result in result-set order.
fn build_report_html(
    session_id: &str,
    current_model: &str,
    stats: &BatchStats,
    rows: &[BatchRow],
    embedded: &[Option<String>],
) -> String {
    let mut body = String::new();

    for (row, inline) in rows.iter().zip(embedded) {
        let percent = row.result.confidence as f64 * 100.0;
        let thumb = match inline {
            Some(uri) => format!(
                "<img class=\"thumb\" src=\"{}\" alt=\"{}\">",
                uri,
                html_escape(&row.result.filename)
            ),
            None => "<span class=\"missing\">not available</span>".to_string(),
        };

        body.push_str(&format!(
            concat!(
                "<tr>",
                "<td>{thumb}</td>",
                "<td>{filename}</td>",
                "<td>{prediction}</td>",
                "<td>{percent:.1}%<div class=\"bar\"><div class=\"fill\" ",
                "style=\"width:{percent:.1}%\"></div></div></td>",
                "</tr>\n"
            ),
            thumb = thumb,
            filename = html_escape(&row.result.filename),
            prediction = html_escape(&row.result.prediction),
            percent = percent,
        ));
    }

    format!(
        concat!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n",
            "<title>Telltale Production Report</title>\n",
            "<style>\n",
            "body{{font-family:sans-serif;margin:2em}}\n",
            "table{{border-collapse:collapse;width:100%}}\n",
            "td,th{{border:1px solid #ccc;padding:6px;text-align:left}}\n",
            ".thumb{{max-width:80px;max-height:80px}}\n",
            ".missing{{color:#999;font-style:italic}}\n",
            ".bar{{background:#eee;height:8px;width:120px}}\n",
            ".fill{{background:#4a90d9;height:8px}}\n",
            "</style>\n</head>\n<body>\n",
            "<h1>Telltale Production Report</h1>\n",
            "<p>Session: {session_id} &middot; Model: {model}</p>\n",
            "<p>Total images: {total} &middot; Average confidence: {avg:.1}%</p>\n",
            "<table>\n",
            "<tr><th>Preview</th><th>File</th><th>Prediction</th><th>Confidence</th></tr>\n",
            "{body}",
            "</table>\n</body>\n</html>\n"
        ),
        session_id = html_escape(session_id),
        model = html_escape(current_model),
        total = stats.total,
        avg = stats.average_confidence_percent,
        body = body,
    )
}

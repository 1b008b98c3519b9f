// src/tradestat/client.rs
use crate::tradestat::models::{Flow, ReportQuery, SubmitOutcome};
use crate::utils::error::SessionError;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::{header, Url};
use scraper::{Html, Selector};
use std::path::PathBuf;
use std::time::Duration;

// IMPORTANT: Replace with your actual details or make configurable
const PORTAL_USER_AGENT: &str = "tradestat_scraper/0.1 (data pipeline; ops@example.org)";
// The portal is a shared government service. Be conservative between requests.
const REQUEST_DELAY_MS: u64 = 500;

/// Bounded wait for the report tool to serve its query form.
const FORM_WAIT: Duration = Duration::from_secs(10);
/// Bounded wait for report generation and the export fetch. Deliberately
/// longer than FORM_WAIT: building the report is slower than serving the form.
const EXPORT_WAIT: Duration = Duration::from_secs(20);

/// Fallback name when the portal sends no Content-Disposition filename.
const DEFAULT_DOWNLOAD_NAME: &str = "meidb_report.xlsx";

// Abstract names of the three query fields. The concrete portal markup is
// treated as a form with a code input plus month/year selectors.
const CODE_FIELD: &str = "hscode";
const MONTH_FIELD: &str = "month";
const YEAR_FIELD: &str = "year";

// --- CSS Selectors (Lazy Static) ---
static FORM_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("form").expect("Failed to compile FORM_SELECTOR"));

static CODE_INPUT_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"input[name="hscode"]"#).expect("Failed to compile CODE_INPUT_SELECTOR")
});

// The excel-export control only appears when the query returned rows.
static EXPORT_LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("a.buttons-excel[href], .buttons-excel a[href]")
        .expect("Failed to compile EXPORT_LINK_SELECTOR")
});

/// Narrow seam over the portal's form-driven report tool. The crawl driver
/// depends only on this trait, so tests substitute a canned session and run
/// without any network or browser.
#[async_trait]
pub trait ReportSession: Send + Sync {
    /// Submits one (code, period) query. Returns `NoData` when the portal
    /// has no rows for the period; errors only signal a navigation or
    /// interaction failure for this single request.
    async fn submit(&self, query: &ReportQuery) -> Result<SubmitOutcome, SessionError>;
}

/// Drives the live portal over HTTP: fetch the tool page, post the query
/// form, and stream the export (if offered) into the staging directory.
pub struct HttpReportSession {
    client: reqwest::Client,
    report_url: Url,
    staging_dir: PathBuf,
    form_timeout: Duration,
    export_timeout: Duration,
}

impl HttpReportSession {
    pub fn new(
        base_url: &str,
        flow: Flow,
        staging_dir: impl Into<PathBuf>,
    ) -> Result<Self, SessionError> {
        // A trailing slash keeps Url::join from eating the last path segment.
        let mut base = base_url.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base = Url::parse(&base).map_err(|e| SessionError::Parse(e.to_string()))?;
        let report_url = base
            .join(flow.tool_slug())
            .map_err(|e| SessionError::Parse(e.to_string()))?;

        let client = reqwest::Client::builder()
            .user_agent(PORTAL_USER_AGENT)
            .cookie_store(true) // the report tool is session-stateful
            .build()?;

        Ok(Self {
            client,
            report_url,
            staging_dir: staging_dir.into(),
            form_timeout: FORM_WAIT,
            export_timeout: EXPORT_WAIT,
        })
    }

    /// Fetches the export URL and lands the spreadsheet in the staging
    /// directory. Written under a `.part` name first; the rename marks the
    /// transfer complete for the reconciler.
    async fn download_export(&self, url: Url) -> Result<(), SessionError> {
        let response = self
            .client
            .get(url.clone())
            .timeout(self.export_timeout)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            tracing::error!("HTTP error status: {} for export URL: {}", status, url);
            return Err(SessionError::Http(status));
        }

        let filename = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(filename_from_disposition)
            .or_else(|| {
                url.path_segments()
                    .and_then(|mut segments| segments.next_back())
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| DEFAULT_DOWNLOAD_NAME.to_string());

        tokio::fs::create_dir_all(&self.staging_dir).await?;
        let final_path = self.staging_dir.join(&filename);
        let part_path = self.staging_dir.join(format!("{filename}.part"));

        let bytes = response.bytes().await?;
        tokio::fs::write(&part_path, &bytes).await?;
        tokio::fs::rename(&part_path, &final_path).await?;
        tracing::debug!(
            "Download landed in staging: {} ({} bytes)",
            final_path.display(),
            bytes.len()
        );
        Ok(())
    }
}

#[async_trait]
impl ReportSession for HttpReportSession {
    async fn submit(&self, query: &ReportQuery) -> Result<SubmitOutcome, SessionError> {
        // --- Basic Rate Limiting ---
        tokio::time::sleep(Duration::from_millis(REQUEST_DELAY_MS)).await;

        // 1. Navigate to the report tool, bounded by the form-readiness wait.
        tracing::debug!("Fetching report tool page: {}", self.report_url);
        let response = self
            .client
            .get(self.report_url.clone())
            .timeout(self.form_timeout)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            tracing::error!("HTTP error status: {} for {}", status, self.report_url);
            return Err(SessionError::Http(status));
        }
        let page = response.text().await?;
        let action = find_form_action(&page, &self.report_url)?;

        // 2. Populate the three query fields and submit.
        let month = query.period.month.to_string();
        let year = query.period.year.to_string();
        let fields = [
            (CODE_FIELD, query.hs_code.as_str()),
            (MONTH_FIELD, month.as_str()),
            (YEAR_FIELD, year.as_str()),
        ];
        tracing::debug!("Submitting query {} / {}", query.hs_code, query.period);
        let response = self
            .client
            .post(action)
            .form(&fields)
            .timeout(self.export_timeout)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            tracing::error!("HTTP error status: {} submitting query", status);
            return Err(SessionError::Http(status));
        }
        let result_page = response.text().await?;

        // 3. No export affordance means the query returned zero rows. That
        //    is an expected outcome, not a session failure.
        let Some(export_url) = find_export_link(&result_page, &self.report_url) else {
            return Ok(SubmitOutcome::NoData);
        };

        // 4. Trigger the download.
        self.download_export(export_url).await?;
        Ok(SubmitOutcome::Exported)
    }
}

/// Locates the query form on the tool page and resolves its action URL.
/// Kept synchronous so the parsed DOM never crosses an await point.
fn find_form_action(html: &str, page_url: &Url) -> Result<Url, SessionError> {
    let document = Html::parse_document(html);
    for form in document.select(&FORM_SELECTOR) {
        if form.select(&CODE_INPUT_SELECTOR).next().is_none() {
            continue;
        }
        // A missing or empty action posts back to the tool page itself.
        return match form.value().attr("action") {
            Some(action) if !action.trim().is_empty() => page_url
                .join(action.trim())
                .map_err(|e| SessionError::Parse(e.to_string())),
            _ => Ok(page_url.clone()),
        };
    }
    Err(SessionError::FormNotFound)
}

/// Finds the excel-export affordance on the result page, if the portal
/// rendered one.
fn find_export_link(html: &str, page_url: &Url) -> Option<Url> {
    let document = Html::parse_document(html);
    let href = document
        .select(&EXPORT_LINK_SELECTOR)
        .next()?
        .value()
        .attr("href")?;
    page_url.join(href.trim()).ok()
}

/// Extracts the filename token from a Content-Disposition header value,
/// e.g. `attachment; filename="MEIDB_Import.xlsx"`.
fn filename_from_disposition(value: &str) -> Option<String> {
    let start = value.find("filename=")? + "filename=".len();
    let name = value[start..]
        .split(';')
        .next()?
        .trim()
        .trim_matches('"')
        .to_string();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

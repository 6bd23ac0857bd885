//! Offline build of a GeoDirectory import file from exported CSVs.
//!
//! Inputs live in one directory: `gd.csv` (ISO-8859-1, the directory export),
//! `scrape.csv` (scraped business data) and `images.csv` (screenshot URLs).
//! The result is `gd_upload.csv` plus one `<title>.jpg` per matched image.

use crate::clients::ensure_success;
use crate::domain::category;
use crate::utils::error::{DataError, Result};
use crate::utils::retry::{retry, RetryPolicy};
use crate::utils::validation::is_valid_website;
use regex::Regex;
use serde::Serialize;
use serde_json::ser::Formatter;
use std::collections::{BTreeSet, HashMap};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub const GD_FILE: &str = "gd.csv";
pub const SCRAPE_FILE: &str = "scrape.csv";
pub const IMAGES_FILE: &str = "images.csv";
pub const OUTPUT_FILE: &str = "gd_upload.csv";

const GD_COLUMNS: [&str; 4] = ["ID", "post_title", "website", "post_category"];
const SCRAPE_COLUMNS: [&str; 5] = [
    "ID",
    "working_hours",
    "site.company_insights.description",
    "city",
    "subtypes",
];
const IMAGES_COLUMNS: [&str; 2] = ["query", "screenshot"];

/// A CSV file held as strings, header order preserved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl CsvTable {
    pub fn parse(text: &str) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(text.as_bytes());
        let headers = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            rows.push(record?.iter().map(str::to_string).collect());
        }
        Ok(Self { headers, rows })
    }

    /// Case-insensitive column index.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.eq_ignore_ascii_case(name))
    }

    /// Indexes of the required columns, or a validation error naming the missing ones.
    pub fn require(&self, columns: &[&str], file_name: &str) -> Result<Vec<usize>> {
        tracing::info!("Validating columns for {}", file_name);
        let missing: Vec<&str> = columns
            .iter()
            .copied()
            .filter(|c| self.column(c).is_none())
            .collect();
        if !missing.is_empty() {
            let message = format!(
                "Missing required columns in {}: {}",
                file_name,
                missing.join(", ")
            );
            tracing::error!("{}", message);
            return Err(DataError::validation(message));
        }
        Ok(columns.iter().filter_map(|c| self.column(c)).collect())
    }

    fn ensure_column(&mut self, name: &str) -> usize {
        match self.column(name) {
            Some(idx) => idx,
            None => {
                self.headers.push(name.to_string());
                self.headers.len() - 1
            }
        }
    }

    pub fn to_csv(&self) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            let mut padded = row.clone();
            padded.resize(self.headers.len(), String::new());
            writer.write_record(&padded)?;
        }
        writer
            .into_inner()
            .map_err(|e| DataError::processing(format!("Failed to flush CSV: {}", e)))
    }
}

fn cell(row: &[String], idx: usize) -> &str {
    row.get(idx).map(|s| s.trim()).unwrap_or_default()
}

fn set_cell(row: &mut Vec<String>, idx: usize, value: String) {
    if row.len() <= idx {
        row.resize(idx + 1, String::new());
    }
    row[idx] = value;
}

/// ISO-8859-1 maps every byte to the code point of the same value.
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Host without `www.`, first label: `https://www.smith.com.au/x` → `smith`.
pub fn clean_domain(url: &str) -> String {
    url::Url::parse(url.trim())
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .map(|host| {
            host.replace("www.", "")
                .split('.')
                .next()
                .unwrap_or_default()
                .to_string()
        })
        .unwrap_or_default()
}

/// Valid websites lose their query string, anything else becomes empty.
pub fn clean_website(url: &str) -> String {
    if is_valid_website(url) {
        url.trim().split('?').next().unwrap_or_default().to_string()
    } else {
        String::new()
    }
}

fn time_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{1,2}:\d{2}").expect("valid time regex"))
}

/// `{'Monday': '9am-5pm', 'Sunday': 'Closed'}` → `["Mo 9:00-5:00"]`
pub fn parse_business_hours(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let hours: serde_json::Map<String, serde_json::Value> =
        match serde_json::from_str(&raw.replace('\'', "\"")) {
            Ok(hours) => hours,
            Err(e) => {
                tracing::error!("Error parsing business hours: {}", e);
                return None;
            }
        };

    let mut entries = Vec::new();
    for (day, value) in &hours {
        let Some(time) = value.as_str() else {
            tracing::warn!("Invalid time format for {}: {}", day, value);
            continue;
        };
        if time.contains("Closed") {
            continue;
        }

        let time = time.to_lowercase().replace("am", ":00").replace("pm", ":00");
        if !time_regex().is_match(&time) {
            tracing::warn!("Invalid time format for {}: {}", day, time);
            continue;
        }

        let abbrev: String = day.chars().take(2).collect();
        entries.push(format!("{} {}", abbrev, time));
    }

    if entries.is_empty() {
        return None;
    }
    // 與既有匯入檔一致：`["Mo 9:00-5:00", "Tu ..."]`
    let mut out = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, ImportListFormatter);
    if let Err(e) = entries.serialize(&mut serializer) {
        tracing::error!("Error encoding business hours: {}", e);
        return None;
    }
    String::from_utf8(out).ok()
}

/// Compact JSON with `", "` between list items and non-ASCII written as
/// `\uXXXX` escapes, the form the import plugin expects.
struct ImportListFormatter;

impl Formatter for ImportListFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        for ch in fragment.chars() {
            if ch.is_ascii() {
                writer.write_all(&[ch as u8])?;
                continue;
            }
            // BMP 以外的字元拆成 surrogate pair
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units).iter() {
                write!(writer, "\\u{:04x}", unit)?;
            }
        }
        Ok(())
    }
}

/// Drops sentences that were cut off with `...`.
pub fn clean_description(content: &str) -> String {
    content
        .split(". ")
        .filter(|s| !s.contains("..."))
        .collect::<Vec<_>>()
        .join(". ")
}

/// `Smith Jewellers Sydney CBD` with city `Sydney` → `smith jewellers`.
/// The shortened title is lowercased, matching existing uploads.
pub fn shorten_title(title: &str, city: &str) -> Option<String> {
    let city = city.trim().to_lowercase();
    if city.is_empty() {
        return None;
    }
    let title = title.to_lowercase();
    let found = title.find(&city)?;
    let prefix = title[..found].trim();
    (!prefix.is_empty()).then(|| prefix.to_string())
}

/// Maps comma-separated subtypes to `",id,id,"`, collecting unknown ones.
pub fn map_subtypes(subtypes: &str, missing: &mut BTreeSet<String>) -> String {
    let mut ids = Vec::new();
    for subtype in subtypes.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match category::category_for_types(&[subtype]) {
            Some(found) => ids.push(found.id),
            None => {
                missing.insert(subtype.to_string());
            }
        }
    }
    category::format_post_category(&ids)
}

fn image_file_name(title: &str) -> String {
    let safe: String = title
        .chars()
        .map(|c| if matches!(c, '/' | '\\') { '-' } else { c })
        .collect();
    format!("{}.jpg", safe.trim())
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DirectorySummary {
    pub processed: usize,
    pub image_downloads: usize,
    pub errors: usize,
    pub missing_subtypes: BTreeSet<String>,
    pub output_file: PathBuf,
}

impl DirectorySummary {
    pub fn log(&self) {
        tracing::info!("📊 Processing Summary:");
        tracing::info!("Total rows processed: {}", self.processed);
        tracing::info!("Successful image downloads: {}", self.image_downloads);
        tracing::info!("Errors encountered: {}", self.errors);
        if !self.missing_subtypes.is_empty() {
            tracing::info!("Missing subtypes: {:?}", self.missing_subtypes);
        }
        tracing::info!("Output file saved as: {}", self.output_file.display());
    }
}

pub struct DirectoryBuilder {
    input_dir: PathBuf,
    output_dir: PathBuf,
    client: reqwest::Client,
    max_image_bytes: usize,
    retry_policy: RetryPolicy,
}

impl DirectoryBuilder {
    pub fn new(
        input_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            client,
            max_image_bytes: 250 * 1024,
            retry_policy: RetryPolicy::download(),
        }
    }

    pub fn with_max_image_kb(mut self, kb: usize) -> Self {
        self.max_image_bytes = kb * 1024;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    async fn load(&self, name: &str, latin1: bool) -> Result<CsvTable> {
        let path = self.input_dir.join(name);
        tracing::info!("Loading {}", path.display());
        let bytes = tokio::fs::read(&path).await?;
        let text = if latin1 {
            decode_latin1(&bytes)
        } else {
            String::from_utf8_lossy(&bytes).into_owned()
        };
        let table = CsvTable::parse(&text)?;
        tracing::info!("Loaded {} rows from {}", table.rows.len(), name);
        Ok(table)
    }

    /// Downloads one screenshot, rejecting bodies over the size cap.
    pub async fn download_image(&self, url: &str, target: &Path) -> Result<()> {
        tracing::info!("⬇️  Downloading image from {}", url);
        let bytes = retry(&self.retry_policy, "image download", || async move {
            let response = self.client.get(url).send().await?;
            Ok(ensure_success("Image host", response).await?.bytes().await?)
        })
        .await?;

        if bytes.len() > self.max_image_bytes {
            return Err(DataError::validation(format!(
                "Image too large ({:.2}KB > {}KB): {}",
                bytes.len() as f64 / 1024.0,
                self.max_image_bytes / 1024,
                target.display()
            )));
        }

        tokio::fs::write(target, &bytes).await?;
        tracing::info!("Successfully downloaded image: {}", target.display());
        Ok(())
    }

    pub async fn run(&self) -> Result<DirectorySummary> {
        tracing::info!("🚀 Starting directory processing");
        tokio::fs::create_dir_all(&self.output_dir).await?;

        let mut gd = self.load(GD_FILE, true).await?;
        let gd_cols = gd.require(&GD_COLUMNS, GD_FILE)?;
        let scrape = self.load(SCRAPE_FILE, false).await?;
        let scrape_cols = scrape.require(&SCRAPE_COLUMNS, SCRAPE_FILE)?;
        let images = self.load(IMAGES_FILE, false).await?;
        let image_cols = images.require(&IMAGES_COLUMNS, IMAGES_FILE)?;

        let (gd_id, gd_title, gd_website, gd_category) =
            (gd_cols[0], gd_cols[1], gd_cols[2], gd_cols[3]);
        let (sc_id, sc_hours, sc_description, sc_city, sc_subtypes) = (
            scrape_cols[0],
            scrape_cols[1],
            scrape_cols[2],
            scrape_cols[3],
            scrape_cols[4],
        );
        let hours_col = gd.ensure_column("business_hours");
        let content_col = gd.ensure_column("post_content");

        let mut scrape_by_id: HashMap<&str, &Vec<String>> = HashMap::new();
        for row in &scrape.rows {
            scrape_by_id.entry(cell(row, sc_id)).or_insert(row);
        }
        let image_by_domain: Vec<(String, &str)> = images
            .rows
            .iter()
            .map(|row| (clean_domain(cell(row, image_cols[0])), cell(row, image_cols[1])))
            .collect();

        let mut summary = DirectorySummary {
            output_file: self.output_dir.join(OUTPUT_FILE),
            ..Default::default()
        };
        let total = gd.rows.len();

        for (index, row) in gd.rows.iter_mut().enumerate() {
            let id = cell(row, gd_id).to_string();
            tracing::info!("Processing row {}/{} - ID: {}", index + 1, total, id);

            if row.len() < GD_COLUMNS.len() {
                tracing::error!("Error processing row {} (ID: {}): row is truncated", index + 1, id);
                summary.errors += 1;
                continue;
            }

            let website = clean_website(cell(row, gd_website));
            set_cell(row, gd_website, website.clone());

            let Some(scraped) = scrape_by_id.get(id.as_str()) else {
                tracing::warn!("No matching scrape data for ID {}", id);
                continue;
            };

            if let Some(hours) = parse_business_hours(cell(scraped, sc_hours)) {
                set_cell(row, hours_col, hours);
            }

            let description = cell(scraped, sc_description);
            if !description.is_empty() {
                set_cell(row, content_col, clean_description(description));
            }

            if let Some(title) = shorten_title(cell(row, gd_title), cell(scraped, sc_city)) {
                set_cell(row, gd_title, title);
            }

            if !website.is_empty() {
                let domain = clean_domain(&website);
                if let Some((_, image_url)) = image_by_domain
                    .iter()
                    .find(|(d, url)| !d.is_empty() && *d == domain && !url.is_empty())
                {
                    let target = self.output_dir.join(image_file_name(cell(row, gd_title)));
                    match self.download_image(image_url, &target).await {
                        Ok(()) => summary.image_downloads += 1,
                        Err(e) => tracing::error!(
                            "Error downloading image {}: {}",
                            target.display(),
                            e
                        ),
                    }
                }
            }

            let categories = map_subtypes(cell(scraped, sc_subtypes), &mut summary.missing_subtypes);
            set_cell(row, gd_category, categories);

            summary.processed += 1;
        }

        tokio::fs::write(&summary.output_file, gd.to_csv()?).await?;
        summary.log();
        Ok(summary)
    }
}

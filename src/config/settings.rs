use crate::utils::error::{DataError, Result};
use crate::utils::retry::RetryPolicy;
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Countries with a GeoDirectory WordPress site.
pub const WORDPRESS_COUNTRIES: [&str; 9] = ["AU", "CA", "IE", "NZ", "IN", "UK", "US", "SG", "ZA"];

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub data_dir: String,
    pub snapshot_file: String,
    /// Caps clusters / listings handled per stage run when testing.
    pub testing_limit: Option<usize>,
    pub retry: RetrySettings,
    pub cluster: ClusterSettings,
    pub places: PlacesSettings,
    pub enrich: EnrichSettings,
    pub screenshot: ScreenshotSettings,
    pub publish: PublishSettings,
    pub directory: DirectorySettings,
    pub wordpress: BTreeMap<String, WordPressSite>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub min_delay_secs: u64,
    pub max_delay_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterSettings {
    pub radius_km: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacesSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub search_radius_meters: u32,
    pub keywords: Vec<String>,
    pub rescrape_after_days: i64,
    pub request_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichSettings {
    pub openai_base_url: String,
    pub openai_api_key: Option<String>,
    pub model: String,
    pub batch_size: usize,
    pub request_timeout_secs: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenshotSettings {
    pub chrome_bin: String,
    pub output_dir: String,
    pub batch_size: usize,
    pub window_width: u32,
    pub window_height: u32,
    pub settle_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishSettings {
    pub batch_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectorySettings {
    pub input_dir: String,
    pub output_dir: String,
    pub max_image_kb: usize,
    pub image_timeout_secs: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordPressSite {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub site: String,
}

impl WordPressSite {
    pub fn is_complete(&self) -> bool {
        !self.username.trim().is_empty()
            && !self.password.trim().is_empty()
            && !self.site.trim().is_empty()
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.site.trim_end_matches('/'), path)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            data_dir: "./data".to_string(),
            snapshot_file: crate::store::DEFAULT_SNAPSHOT_FILE.to_string(),
            testing_limit: None,
            retry: RetrySettings::default(),
            cluster: ClusterSettings::default(),
            places: PlacesSettings::default(),
            enrich: EnrichSettings::default(),
            screenshot: ScreenshotSettings::default(),
            publish: PublishSettings::default(),
            directory: DirectorySettings::default(),
            wordpress: BTreeMap::new(),
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            min_delay_secs: 4,
            max_delay_secs: 10,
        }
    }
}

impl Default for ClusterSettings {
    fn default() -> Self {
        Self { radius_km: 5.0 }
    }
}

impl Default for PlacesSettings {
    fn default() -> Self {
        Self {
            base_url: "https://maps.googleapis.com/maps/api/place".to_string(),
            api_key: None,
            search_radius_meters: 5000,
            keywords: vec![
                "jeweler".to_string(),
                "jeweller".to_string(),
                "jewelry store".to_string(),
            ],
            rescrape_after_days: 7,
            request_delay_ms: 2000,
        }
    }
}

impl Default for EnrichSettings {
    fn default() -> Self {
        Self {
            openai_base_url: "https://api.openai.com/v1".to_string(),
            openai_api_key: None,
            model: "gpt-3.5-turbo".to_string(),
            batch_size: 10,
            request_timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl Default for ScreenshotSettings {
    fn default() -> Self {
        Self {
            chrome_bin: "chromium".to_string(),
            output_dir: "screenshots".to_string(),
            batch_size: 5,
            window_width: 1400,
            window_height: 800,
            settle_ms: 5000,
        }
    }
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self { batch_size: 50 }
    }
}

impl Default for DirectorySettings {
    fn default() -> Self {
        Self {
            input_dir: ".".to_string(),
            output_dir: "output".to_string(),
            max_image_kb: 250,
            image_timeout_secs: 10,
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match env_var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| DataError::InvalidConfigValueError {
                field: name.to_string(),
                value: raw.clone(),
                reason: "could not be parsed".to_string(),
            }),
        None => Ok(None),
    }
}

impl Settings {
    /// 從 TOML 檔案載入設定
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析設定
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = Self::substitute_env_vars(content);
        Ok(toml::from_str(&processed)?)
    }

    /// `.env`、設定檔、環境變數依序套用
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut settings = match path {
            Some(path) => {
                tracing::info!("📁 Loading configuration from: {}", path.display());
                Self::from_file(path)?
            }
            None => Self::default(),
        };
        settings.apply_env()?;
        Ok(settings)
    }

    // 替換 ${VAR_NAME}，未設定的保留原字串
    fn substitute_env_vars(content: &str) -> String {
        use regex::Regex;
        use std::sync::OnceLock;

        static RE: OnceLock<Regex> = OnceLock::new();
        let re = RE.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("valid env regex"));

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .to_string()
    }

    pub fn apply_env(&mut self) -> Result<()> {
        if let Some(host) = env_var("HOST") {
            self.server.host = host;
        }
        if let Some(port) = parse_env("PORT")? {
            self.server.port = port;
        }
        if let Some(dir) = env_var("DATA_DIR") {
            self.data_dir = dir;
        }
        if let Some(limit) = parse_env("TESTING_LIMIT")? {
            self.testing_limit = Some(limit);
        }
        if let Some(key) = env_var("GOOGLE_PLACES_API_KEY") {
            self.places.api_key = Some(key);
        }
        if let Some(key) = env_var("CHATGPT_API_KEY").or_else(|| env_var("OPENAI_API_KEY")) {
            self.enrich.openai_api_key = Some(key);
        }
        if let Some(bin) = env_var("CHROME_BIN") {
            self.screenshot.chrome_bin = bin;
        }

        for country in WORDPRESS_COUNTRIES {
            let username = env_var(&format!("WP_{}_USERNAME", country));
            let password = env_var(&format!("WP_{}_PASS", country));
            let site = env_var(&format!("WP_{}_SITE", country));
            if username.is_none() && password.is_none() && site.is_none() {
                continue;
            }
            let entry = self.wordpress.entry(country.to_string()).or_default();
            if let Some(username) = username {
                entry.username = username;
            }
            if let Some(password) = password {
                entry.password = password;
            }
            if let Some(site) = site {
                entry.site = site;
            }
        }
        Ok(())
    }

    /// WordPress credentials for a country code. `GB` is served by the `UK` site.
    pub fn wordpress_site(&self, country: &str) -> Option<&WordPressSite> {
        let mut code = country.trim().to_uppercase();
        if code == "GB" {
            code = "UK".to_string();
        }

        let Some(site) = self.wordpress.get(&code) else {
            tracing::error!("No WordPress configuration found for country: {}", country);
            return None;
        };
        if !site.is_complete() {
            tracing::error!("Incomplete WordPress configuration for country: {}", country);
            return None;
        }
        Some(site)
    }

    pub fn retry_policy(&self, max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            multiplier: Duration::from_secs(1),
            min_delay: Duration::from_secs(self.retry.min_delay_secs),
            max_delay: Duration::from_secs(self.retry.max_delay_secs),
        }
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.places.request_delay_ms)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Validate for Settings {
    fn validate(&self) -> Result<()> {
        validation::validate_non_empty_string("server.host", &self.server.host)?;
        validation::validate_positive_number("server.port", self.server.port as usize, 1)?;
        validation::validate_path("data_dir", &self.data_dir)?;
        validation::validate_path("snapshot_file", &self.snapshot_file)?;
        validation::validate_range("cluster.radius_km", self.cluster.radius_km, 0.1, 100.0)?;
        validation::validate_url("places.base_url", &self.places.base_url)?;
        validation::validate_range("places.search_radius_meters", self.places.search_radius_meters, 1, 50_000)?;
        if self.places.keywords.is_empty() {
            return Err(DataError::InvalidConfigValueError {
                field: "places.keywords".to_string(),
                value: String::new(),
                reason: "At least one search keyword is required".to_string(),
            });
        }
        validation::validate_url("enrich.openai_base_url", &self.enrich.openai_base_url)?;
        validation::validate_positive_number("enrich.batch_size", self.enrich.batch_size, 1)?;
        validation::validate_positive_number("screenshot.batch_size", self.screenshot.batch_size, 1)?;
        validation::validate_path("screenshot.output_dir", &self.screenshot.output_dir)?;
        validation::validate_positive_number("publish.batch_size", self.publish.batch_size, 1)?;
        validation::validate_path("directory.output_dir", &self.directory.output_dir)?;
        if let Some(limit) = self.testing_limit {
            validation::validate_positive_number("testing_limit", limit, 1)?;
        }
        for (country, site) in &self.wordpress {
            if !site.site.is_empty() {
                validation::validate_url(&format!("wordpress.{}.site", country), &site.site)?;
            }
        }
        Ok(())
    }
}

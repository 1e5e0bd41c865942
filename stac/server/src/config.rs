//! Service settings loaded from the process environment.
//!
//! Every setting has a literal default. Values found in the environment
//! override the defaults, so a deployment only exports what it changes.

use serde::Deserialize;

/// The recognized settings and their default values, in export order.
pub const ENV_DEFAULTS: [(&str, &str); 19] = [
    ("postgres_user", "username"),
    ("postgres_pass", "password"),
    ("postgres_host_reader", "localhost"),
    ("postgres_host_writer", "localhost"),
    ("postgres_port", "5432"),
    ("postgres_dbname", "postgis"),
    ("stac_fastapi_title", "stac-fastapi"),
    ("stac_fastapi_description", "stac-fastapi"),
    ("stac_fastapi_version", "6.0.0"),
    ("stac_version", "1.0.0"),
    ("stac_fastapi_landing_id", "stac-fastapi"),
    ("app_host", "0.0.0.0"),
    ("app_port", "8080"),
    ("reload", "True"),
    ("enable_response_models", "False"),
    ("enable_direct_response", "False"),
    ("openapi_url", "/api"),
    ("docs_url", "/api.html"),
    ("root_path", ""),
];

/// Route prefixes the API itself serves; the OpenAPI and docs routes must stay clear of them.
const CORE_ROUTES: [&str; 4] = ["/conformance", "/_mgmt", "/collections", "/search"];

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub postgres_user: String,
    pub postgres_pass: String,
    pub postgres_host_reader: String,
    pub postgres_host_writer: String,
    pub postgres_port: u16,
    pub postgres_dbname: String,
    pub stac_fastapi_title: String,
    pub stac_fastapi_description: String,
    pub stac_fastapi_version: String,
    pub stac_version: String,
    pub stac_fastapi_landing_id: String,
    pub app_host: String,
    pub app_port: u16,
    pub reload: bool,
    pub enable_response_models: bool,
    pub enable_direct_response: bool,
    pub openapi_url: String,
    pub docs_url: String,
    pub root_path: String,
}

/// How handlers treat the STAC documents they are about to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    /// Documents are serialized as built.
    Direct,
    /// Documents are checked against the STAC structural rules first.
    Validated,
}

impl Config {
    /// Loads configuration from environment variables layered over [`ENV_DEFAULTS`].
    /// Variable names match in any case, so `APP_PORT` sets `app_port`.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let variables = std::env::vars_os()
            .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)));
        Self::from_source(variables)
    }

    /// Loads configuration from an explicit key/value map instead of the process environment.
    /// Keys are matched case-insensitively and unknown keys are ignored.
    pub fn from_source<I, K, V>(source: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map: config::Map<String, String> = source
            .into_iter()
            .map(|(key, value)| (key.into().to_lowercase(), value.into()))
            .filter(|(key, _)| ENV_DEFAULTS.iter().any(|(known, _)| known == key))
            .collect();
        Self::build(config::Environment::default().source(Some(map)))
    }

    fn build(environment: config::Environment) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        for (key, value) in ENV_DEFAULTS {
            builder = builder.set_default(key, value)?;
        }
        let settings = builder.add_source(environment).build()?;
        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the OpenAPI and docs routes do not shadow an API route.
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        let routes = [
            ("openapi_url", self.openapi_path()),
            ("docs_url", self.docs_path()),
        ];
        for (key, path) in routes {
            let Some(path) = path else { continue };
            if let Some(core) = CORE_ROUTES.iter().find(|core| is_within(&path, core)) {
                return Err(config::ConfigError::Message(format!(
                    "{} '{}' collides with the API route '{}'",
                    key, path, core
                )));
            }
        }
        if let (Some(openapi), Some(docs)) = (self.openapi_path(), self.docs_path()) {
            if is_within(&openapi, &docs) {
                return Err(config::ConfigError::Message(format!(
                    "openapi_url '{}' must not be nested under docs_url '{}'",
                    openapi, docs
                )));
            }
        }
        Ok(())
    }

    /// Connection string for the read-only database host.
    pub fn reader_connection_string(&self) -> String {
        self.connection_string(&self.postgres_host_reader)
    }

    /// Connection string for the database host that accepts writes.
    pub fn writer_connection_string(&self) -> String {
        self.connection_string(&self.postgres_host_writer)
    }

    fn connection_string(&self, host: &str) -> String {
        format!(
            "postgresql://{}:{}@{}:{}/{}",
            self.postgres_user, self.postgres_pass, host, self.postgres_port, self.postgres_dbname
        )
    }

    /// The mount prefix with a leading slash and no trailing slash.
    /// Empty when the application is served from the root.
    pub fn root_path(&self) -> String {
        let trimmed = self.root_path.trim().trim_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{}", trimmed)
        }
    }

    /// Route of the OpenAPI document, `None` when `openapi_url` is empty.
    pub fn openapi_path(&self) -> Option<String> {
        route_path(&self.openapi_url)
    }

    /// Route of the docs UI. The UI needs the OpenAPI document, so it is
    /// `None` when either URL is empty or both name the same route.
    pub fn docs_path(&self) -> Option<String> {
        let openapi = self.openapi_path()?;
        route_path(&self.docs_url).filter(|docs| *docs != openapi)
    }

    pub fn response_mode(&self) -> ResponseMode {
        if self.enable_direct_response {
            if self.enable_response_models {
                tracing::warn!(
                    "enable_direct_response is set; response model validation is disabled"
                );
            }
            ResponseMode::Direct
        } else if self.enable_response_models {
            ResponseMode::Validated
        } else {
            ResponseMode::Direct
        }
    }

    /// Renders the effective settings as a sourceable shell script.
    ///
    /// Values come from the parsed settings, not the raw overrides: numbers are
    /// printed canonically (`05432` exports as `5432`) and flags as `True`/`False`.
    pub fn to_env_exports(&self) -> String {
        let mut script = String::from("# database\n");
        for (key, value) in self.values() {
            if key == "stac_fastapi_title" {
                script.push_str("\n# application\n");
            }
            script.push_str(&format!("export {}=\"{}\"\n", key, shell_escape(&value)));
        }
        script
    }

    /// The effective value of every setting, in [`ENV_DEFAULTS`] order.
    pub fn values(&self) -> Vec<(&'static str, String)> {
        vec![
            ("postgres_user", self.postgres_user.clone()),
            ("postgres_pass", self.postgres_pass.clone()),
            ("postgres_host_reader", self.postgres_host_reader.clone()),
            ("postgres_host_writer", self.postgres_host_writer.clone()),
            ("postgres_port", self.postgres_port.to_string()),
            ("postgres_dbname", self.postgres_dbname.clone()),
            ("stac_fastapi_title", self.stac_fastapi_title.clone()),
            ("stac_fastapi_description", self.stac_fastapi_description.clone()),
            ("stac_fastapi_version", self.stac_fastapi_version.clone()),
            ("stac_version", self.stac_version.clone()),
            ("stac_fastapi_landing_id", self.stac_fastapi_landing_id.clone()),
            ("app_host", self.app_host.clone()),
            ("app_port", self.app_port.to_string()),
            ("reload", render_flag(self.reload)),
            ("enable_response_models", render_flag(self.enable_response_models)),
            ("enable_direct_response", render_flag(self.enable_direct_response)),
            ("openapi_url", self.openapi_url.clone()),
            ("docs_url", self.docs_url.clone()),
            ("root_path", self.root_path.clone()),
        ]
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            postgres_user: "username".to_string(),
            postgres_pass: "password".to_string(),
            postgres_host_reader: "localhost".to_string(),
            postgres_host_writer: "localhost".to_string(),
            postgres_port: 5432,
            postgres_dbname: "postgis".to_string(),
            stac_fastapi_title: "stac-fastapi".to_string(),
            stac_fastapi_description: "stac-fastapi".to_string(),
            stac_fastapi_version: "6.0.0".to_string(),
            stac_version: "1.0.0".to_string(),
            stac_fastapi_landing_id: "stac-fastapi".to_string(),
            app_host: "0.0.0.0".to_string(),
            app_port: 8080,
            reload: true,
            enable_response_models: false,
            enable_direct_response: false,
            openapi_url: "/api".to_string(),
            docs_url: "/api.html".to_string(),
            root_path: String::new(),
        }
    }
}

fn route_path(url: &str) -> Option<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        None
    } else if trimmed.starts_with('/') {
        Some(trimmed.to_string())
    } else {
        Some(format!("/{}", trimmed))
    }
}

/// `path` is `prefix` itself or a route below it.
fn is_within(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

fn render_flag(value: bool) -> String {
    if value { "True" } else { "False" }.to_string()
}

/// Escapes the characters that stay special inside a double-quoted shell word.
fn shell_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
